// [libs/infra/db/src/repositories/agent.rs]
/*!
 * =================================================================
 * APARATO: AGENT REPOSITORY (V4.4 - TOMBSTONE AWARE)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CICLO DE VIDA DE AGENTES Y VIVACIDAD (LAST SEEN)
 *
 * # Logic:
 * Toda consulta por defecto filtra la tombstone `deleted_at`. La ruta
 * Unscoped existe exclusivamente para que la capa de autenticación
 * distinga *gone* (410 terminal) de *not found* (404): un agente borrado
 * que reintenta conectar debe recibir la orden de detenerse.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{parse_label_map, parse_optional_timestamp, parse_timestamp};
use crate::DbClient;
use chrono::Utc;
use libsql::{params, Row};
use netwatcher_domain_models::agent::{Agent, TrafficSimServer};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

const AGENT_COLUMNS: &str = "id, workspace_id, name, description, location, last_seen_at, \
     version, labels_json, metadata_json, initialized, psk_hash, \
     trafficsim_enabled, trafficsim_host, trafficsim_port, created_at, deleted_at";

/// Repositorio de autoridad única para los endpoints de medición.
pub struct AgentRepository {
    database_client: DbClient,
}

impl AgentRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Registra un agente nuevo (no inicializado, sin PSK).
     */
    #[instrument(skip(self, labels, metadata), fields(workspace = workspace_id, name = %name))]
    pub async fn create_agent(
        &self,
        workspace_id: i64,
        name: &str,
        description: &str,
        location: &str,
        labels: &HashMap<String, String>,
        metadata: &HashMap<String, String>,
    ) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;

        let labels_json = serde_json::to_string(labels)
            .map_err(|fault| DbError::MappingError(format!("LABELS_SERIALIZATION: {}", fault)))?;
        let metadata_json = serde_json::to_string(metadata)
            .map_err(|fault| DbError::MappingError(format!("METADATA_SERIALIZATION: {}", fault)))?;

        let mut rows = connection
            .query(
                &format!(
                    "INSERT INTO agents (workspace_id, name, description, location,
                                         labels_json, metadata_json, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     RETURNING {AGENT_COLUMNS}"
                ),
                params![
                    workspace_id,
                    name,
                    description,
                    location,
                    labels_json,
                    metadata_json,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        let agent = match rows.next().await? {
            Some(row) => map_row_to_agent(row)?,
            None => return Err(DbError::TransactionError),
        };

        info!("📡 [AGENT_FORGE]: Agent [{}] registered in workspace {}.", agent.name, workspace_id);
        Ok(agent)
    }

    /**
     * Recupera un agente activo por (workspace, id).
     *
     * # Errors:
     * - `DbError::AgentGone`: La fila existe con tombstone activa.
     * - `DbError::NotFound`: La fila no existe.
     */
    pub async fn fetch_scoped(&self, workspace_id: i64, agent_id: i64) -> Result<Agent, DbError> {
        let agent = self.fetch_unscoped(workspace_id, agent_id).await?;
        if agent.is_deleted() {
            warn!("🪦 [AGENT_GONE]: Agent {} attempted access past its tombstone.", agent_id);
            return Err(DbError::AgentGone);
        }
        Ok(agent)
    }

    /// Ruta Unscoped: retorna la fila incluso con tombstone, para que la
    /// autenticación traduzca a la señal terminal.
    pub async fn fetch_unscoped(&self, workspace_id: i64, agent_id: i64) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {AGENT_COLUMNS} FROM agents WHERE workspace_id = ?1 AND id = ?2"),
                params![workspace_id, agent_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_agent(row),
            None => Err(DbError::NotFound),
        }
    }

    /// Resolución por id global (rutas de visor `/agents/:id/...`).
    /// Filtra tombstones: los visores jamás ven agentes retirados.
    pub async fn fetch_by_id(&self, agent_id: i64) -> Result<Agent, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {AGENT_COLUMNS} FROM agents WHERE id = ?1 AND deleted_at IS NULL"
                ),
                params![agent_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_agent(row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn list_by_workspace(&self, workspace_id: i64) -> Result<Vec<Agent>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {AGENT_COLUMNS} FROM agents
                     WHERE workspace_id = ?1 AND deleted_at IS NULL
                     ORDER BY id ASC"
                ),
                params![workspace_id],
            )
            .await?;

        let mut agents = Vec::new();
        while let Some(row) = rows.next().await? {
            agents.push(map_row_to_agent(row)?);
        }
        Ok(agents)
    }

    /**
     * Sella el bootstrap: almacena el digest del PSK y marca `initialized`.
     */
    #[instrument(skip(self, psk_hash))]
    pub async fn seal_bootstrap(
        &self,
        workspace_id: i64,
        agent_id: i64,
        psk_hash: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE agents SET psk_hash = ?3, initialized = 1
                 WHERE workspace_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                params![workspace_id, agent_id, psk_hash],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Rotación administrativa del PSK: sobrescribe el digest almacenado.
    pub async fn rotate_psk_hash(
        &self,
        workspace_id: i64,
        agent_id: i64,
        psk_hash: &str,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE agents SET psk_hash = ?3
                 WHERE workspace_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                params![workspace_id, agent_id, psk_hash],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        info!("🔁 [PSK_ROTATION]: Agent {} credential digest overwritten.", agent_id);
        Ok(())
    }

    /**
     * Latido de vivacidad: escritura condicional de `last_seen_at` y versión.
     */
    pub async fn bump_liveness(
        &self,
        workspace_id: i64,
        agent_id: i64,
        reported_version: Option<&str>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let now = Utc::now().to_rfc3339();

        let updated = match reported_version {
            Some(version) => {
                connection
                    .execute(
                        "UPDATE agents SET last_seen_at = ?3, version = ?4
                         WHERE workspace_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                        params![workspace_id, agent_id, now, version],
                    )
                    .await?
            }
            None => {
                connection
                    .execute(
                        "UPDATE agents SET last_seen_at = ?3
                         WHERE workspace_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                        params![workspace_id, agent_id, now],
                    )
                    .await?
            }
        };

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /// Configura el servidor TrafficSim embebido del agente.
    pub async fn update_trafficsim_server(
        &self,
        workspace_id: i64,
        agent_id: i64,
        server: &TrafficSimServer,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE agents
                 SET trafficsim_enabled = ?3, trafficsim_host = ?4, trafficsim_port = ?5
                 WHERE workspace_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                params![
                    workspace_id,
                    agent_id,
                    server.enabled as i64,
                    server.host.clone(),
                    server.port as i64
                ],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    /**
     * Borrado lógico. La fila se conserva para que el siguiente intento de
     * autenticación reciba la señal terminal *gone*.
     */
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, workspace_id: i64, agent_id: i64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE agents SET deleted_at = ?3
                 WHERE workspace_id = ?1 AND id = ?2 AND deleted_at IS NULL",
                params![workspace_id, agent_id, Utc::now().to_rfc3339()],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        info!("🪦 [AGENT_RETIRE]: Agent {} tombstoned in workspace {}.", agent_id, workspace_id);
        Ok(())
    }
}

// --- ESTRATO DE MAPEO (PRIVATE SSoT) ---

fn map_row_to_agent(row: Row) -> Result<Agent, DbError> {
    Ok(Agent {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        location: row.get(4)?,
        last_seen_at: parse_optional_timestamp(row.get::<Option<String>>(5)?)?,
        version: row.get(6)?,
        labels: parse_label_map(&row.get::<String>(7)?)?,
        metadata: parse_label_map(&row.get::<String>(8)?)?,
        initialized: row.get::<i64>(9)? != 0,
        psk_hash: row.get::<Option<String>>(10)?,
        trafficsim: TrafficSimServer {
            enabled: row.get::<i64>(11)? != 0,
            host: row.get(12)?,
            port: row.get::<i64>(13)? as u16,
        },
        created_at: parse_timestamp(&row.get::<String>(14)?)?,
        deleted_at: parse_optional_timestamp(row.get::<Option<String>>(15)?)?,
    })
}
