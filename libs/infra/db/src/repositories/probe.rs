// [libs/infra/db/src/repositories/probe.rs]
/*!
 * =================================================================
 * APARATO: PROBE REPOSITORY (V3.5 - TARGET ORDERED)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: SONDAS, DESTINOS ORDENADOS Y PARES REVERSOS
 *
 * # Logic:
 * Las sondas AGENT bidireccionales se emparejan mediante la columna
 * `reverse_of_probe_id`. Ninguna consulta derreferencia el par de forma
 * cíclica: ambas direcciones resuelven por id en esta misma tabla.
 * El borrado de una sonda arrastra sus destinos y su baseline de ruta.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{parse_label_map, parse_timestamp};
use crate::DbClient;
use chrono::Utc;
use libsql::{params, Row};
use netwatcher_domain_models::probe::{Probe, ProbeTarget, ProbeType};
use std::collections::HashMap;
use tracing::{info, instrument};

const PROBE_COLUMNS: &str = "id, workspace_id, agent_id, type, name, interval_seconds, \
     duration_seconds, count, notifications, server_mode, reverse_of_probe_id, \
     labels_json, metadata_json, created_at";

/// Especificación de un destino en la creación/edición de sondas.
#[derive(Debug, Clone)]
pub struct TargetSpec {
    pub host: Option<String>,
    pub target_agent_id: Option<i64>,
}

/// Parámetros de alta/edición de una sonda.
#[derive(Debug, Clone)]
pub struct ProbeSpec {
    pub probe_type: ProbeType,
    pub name: String,
    pub interval_seconds: i64,
    pub duration_seconds: i64,
    pub count: i64,
    pub notifications: bool,
    pub server_mode: bool,
    pub reverse_of_probe_id: Option<i64>,
    pub labels: HashMap<String, String>,
    pub metadata: HashMap<String, String>,
    pub targets: Vec<TargetSpec>,
}

/// Repositorio de autoridad única para las mediciones configuradas.
pub struct ProbeRepository {
    database_client: DbClient,
}

impl ProbeRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Registra una sonda y sus destinos ordenados en una transacción.
     */
    #[instrument(skip(self, spec), fields(agent = agent_id, probe_type = spec.probe_type.as_str()))]
    pub async fn create_probe(
        &self,
        workspace_id: i64,
        agent_id: i64,
        spec: ProbeSpec,
    ) -> Result<Probe, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await?;

        let labels_json = serde_json::to_string(&spec.labels)
            .map_err(|fault| DbError::MappingError(format!("LABELS_SERIALIZATION: {}", fault)))?;
        let metadata_json = serde_json::to_string(&spec.metadata)
            .map_err(|fault| DbError::MappingError(format!("METADATA_SERIALIZATION: {}", fault)))?;

        let mut inserted = transaction
            .query(
                "INSERT INTO probes (workspace_id, agent_id, type, name, interval_seconds,
                                     duration_seconds, count, notifications, server_mode,
                                     reverse_of_probe_id, labels_json, metadata_json, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                 RETURNING id",
                params![
                    workspace_id,
                    agent_id,
                    spec.probe_type.as_str(),
                    spec.name.clone(),
                    spec.interval_seconds,
                    spec.duration_seconds,
                    spec.count,
                    spec.notifications as i64,
                    spec.server_mode as i64,
                    spec.reverse_of_probe_id,
                    labels_json,
                    metadata_json,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        let probe_id: i64 = inserted
            .next()
            .await?
            .ok_or(DbError::TransactionError)?
            .get(0)?;
        drop(inserted);

        for (position, target) in spec.targets.iter().enumerate() {
            transaction
                .execute(
                    "INSERT INTO probe_targets (probe_id, host, target_agent_id, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![probe_id, target.host.clone(), target.target_agent_id, position as i64],
                )
                .await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("🛰️ [PROBE_FORGE]: Probe {} ({}) configured on agent {}.",
            probe_id, spec.probe_type.as_str(), agent_id);
        self.fetch_probe(probe_id).await
    }

    pub async fn fetch_probe(&self, probe_id: i64) -> Result<Probe, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {PROBE_COLUMNS} FROM probes WHERE id = ?1"),
                params![probe_id],
            )
            .await?;

        let mut probe = match rows.next().await? {
            Some(row) => map_row_to_probe(row)?,
            None => return Err(DbError::NotFound),
        };
        probe.targets = self.fetch_targets(probe_id).await?;
        Ok(probe)
    }

    pub async fn list_by_agent(&self, agent_id: i64) -> Result<Vec<Probe>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {PROBE_COLUMNS} FROM probes WHERE agent_id = ?1 ORDER BY id ASC"
                ),
                params![agent_id],
            )
            .await?;

        let mut probes = Vec::new();
        while let Some(row) = rows.next().await? {
            probes.push(map_row_to_probe(row)?);
        }
        for probe in probes.iter_mut() {
            probe.targets = self.fetch_targets(probe.id).await?;
        }
        Ok(probes)
    }

    /**
     * Actualiza los parámetros editables de una sonda y reemplaza sus destinos.
     * El tipo es inmutable tras la creación.
     */
    #[instrument(skip(self, spec))]
    pub async fn update_probe(&self, probe_id: i64, spec: ProbeSpec) -> Result<Probe, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await?;

        let labels_json = serde_json::to_string(&spec.labels)
            .map_err(|fault| DbError::MappingError(format!("LABELS_SERIALIZATION: {}", fault)))?;
        let metadata_json = serde_json::to_string(&spec.metadata)
            .map_err(|fault| DbError::MappingError(format!("METADATA_SERIALIZATION: {}", fault)))?;

        let updated = transaction
            .execute(
                "UPDATE probes SET name = ?2, interval_seconds = ?3, duration_seconds = ?4,
                                   count = ?5, notifications = ?6, server_mode = ?7,
                                   reverse_of_probe_id = ?8, labels_json = ?9, metadata_json = ?10
                 WHERE id = ?1",
                params![
                    probe_id,
                    spec.name.clone(),
                    spec.interval_seconds,
                    spec.duration_seconds,
                    spec.count,
                    spec.notifications as i64,
                    spec.server_mode as i64,
                    spec.reverse_of_probe_id,
                    labels_json,
                    metadata_json
                ],
            )
            .await?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }

        transaction
            .execute("DELETE FROM probe_targets WHERE probe_id = ?1", params![probe_id])
            .await?;
        for (position, target) in spec.targets.iter().enumerate() {
            transaction
                .execute(
                    "INSERT INTO probe_targets (probe_id, host, target_agent_id, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![probe_id, target.host.clone(), target.target_agent_id, position as i64],
                )
                .await?;
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        self.fetch_probe(probe_id).await
    }

    /**
     * Elimina una sonda arrastrando destinos y baseline de ruta.
     */
    #[instrument(skip(self))]
    pub async fn delete_probe(&self, probe_id: i64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await?;

        transaction
            .execute("DELETE FROM probe_targets WHERE probe_id = ?1", params![probe_id])
            .await?;
        transaction
            .execute("DELETE FROM route_baselines WHERE probe_id = ?1", params![probe_id])
            .await?;
        let deleted = transaction
            .execute("DELETE FROM probes WHERE id = ?1", params![probe_id])
            .await?;

        if deleted == 0 {
            return Err(DbError::NotFound);
        }

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        info!("🗑️ [PROBE_RETIRE]: Probe {} and its baseline removed.", probe_id);
        Ok(())
    }

    /// Destino legible primario, denormalizado en las alertas disparadas.
    pub async fn primary_target_display(&self, probe_id: i64) -> Result<Option<String>, DbError> {
        let targets = self.fetch_targets(probe_id).await?;
        Ok(targets.first().map(|target| {
            target
                .host
                .clone()
                .unwrap_or_else(|| format!("agent:{}", target.target_agent_id.unwrap_or_default()))
        }))
    }

    async fn fetch_targets(&self, probe_id: i64) -> Result<Vec<ProbeTarget>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, probe_id, host, target_agent_id, position
                 FROM probe_targets WHERE probe_id = ?1 ORDER BY position ASC",
                params![probe_id],
            )
            .await?;

        let mut targets = Vec::new();
        while let Some(row) = rows.next().await? {
            targets.push(ProbeTarget {
                id: row.get(0)?,
                probe_id: row.get(1)?,
                host: row.get::<Option<String>>(2)?,
                target_agent_id: row.get::<Option<i64>>(3)?,
                position: row.get(4)?,
            });
        }
        Ok(targets)
    }
}

// --- ESTRATO DE MAPEO (PRIVATE SSoT) ---

fn map_row_to_probe(row: Row) -> Result<Probe, DbError> {
    let type_raw: String = row.get(3)?;
    let probe_type = ProbeType::parse(&type_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_PROBE_TYPE: {}", type_raw)))?;

    Ok(Probe {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        agent_id: row.get(2)?,
        probe_type,
        name: row.get(4)?,
        interval_seconds: row.get(5)?,
        duration_seconds: row.get(6)?,
        count: row.get(7)?,
        notifications: row.get::<i64>(8)? != 0,
        server_mode: row.get::<i64>(9)? != 0,
        reverse_of_probe_id: row.get::<Option<i64>>(10)?,
        labels: parse_label_map(&row.get::<String>(11)?)?,
        metadata: parse_label_map(&row.get::<String>(12)?)?,
        targets: Vec::new(),
        created_at: parse_timestamp(&row.get::<String>(13)?)?,
    })
}
