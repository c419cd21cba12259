// [libs/infra/db/src/repositories/route_baseline.rs]
/*!
 * =================================================================
 * APARATO: ROUTE BASELINE REPOSITORY (V2.0 - REALITY TRACKING)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: UNA FILA POR SONDA CON LA HUELLA DE RUTA VIGENTE
 *
 * # Logic:
 * La primera MTR exitosa crea la fila en silencio (sin disparo). Tras un
 * disparo de `route_change`, el upsert avanza el baseline a la nueva
 * huella para que la siguiente divergencia sea detectable.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::parse_timestamp;
use crate::DbClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use tracing::{debug, instrument};

/// Baseline de ruta persistido de una sonda MTR.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteBaselineRecord {
    pub probe_id: i64,
    pub fingerprint: String,
    pub path_human: String,
    pub hop_count: i64,
    pub updated_at: DateTime<Utc>,
}

/// Repositorio de autoridad única de los baselines de ruta.
pub struct RouteBaselineRepository {
    database_client: DbClient,
}

impl RouteBaselineRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    pub async fn fetch(&self, probe_id: i64) -> Result<Option<RouteBaselineRecord>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT probe_id, fingerprint, path_human, hop_count, updated_at
                 FROM route_baselines WHERE probe_id = ?1",
                params![probe_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_baseline(row)?)),
            None => Ok(None),
        }
    }

    /**
     * Crea o avanza el baseline de una sonda a la huella dada.
     */
    #[instrument(skip(self, path_human), fields(probe = probe_id, fingerprint = %fingerprint))]
    pub async fn upsert(
        &self,
        probe_id: i64,
        fingerprint: &str,
        path_human: &str,
        hop_count: i64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO route_baselines (probe_id, fingerprint, path_human, hop_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(probe_id) DO UPDATE SET
                     fingerprint = excluded.fingerprint,
                     path_human = excluded.path_human,
                     hop_count = excluded.hop_count,
                     updated_at = excluded.updated_at",
                params![probe_id, fingerprint, path_human, hop_count, Utc::now().to_rfc3339()],
            )
            .await?;

        debug!("🧭 [BASELINE_SYNC]: Probe {} baseline now {}.", probe_id, fingerprint);
        Ok(())
    }

    pub async fn delete(&self, probe_id: i64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute("DELETE FROM route_baselines WHERE probe_id = ?1", params![probe_id])
            .await?;
        Ok(())
    }
}

fn map_row_to_baseline(row: Row) -> Result<RouteBaselineRecord, DbError> {
    Ok(RouteBaselineRecord {
        probe_id: row.get(0)?,
        fingerprint: row.get(1)?,
        path_human: row.get(2)?,
        hop_count: row.get(3)?,
        updated_at: parse_timestamp(&row.get::<String>(4)?)?,
    })
}
