// [libs/infra/db/src/repositories/pin.rs]
/*!
 * =================================================================
 * APARATO: BOOTSTRAP PIN REPOSITORY (V3.2 - ONE SHOT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CREDENCIALES DE BOOTSTRAP DE UN SOLO USO
 *
 * # Mathematical Proof (Single Consumption):
 * El consumo ejecuta un UPDATE condicionado a `consumed_at IS NULL` que
 * limpia el plaintext y estampa consumed_at en la MISMA sentencia. El
 * motor actúa como semáforo de fila: dos consumos concurrentes del mismo
 * PIN producen exactamente una fila afectada.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{parse_optional_timestamp, parse_timestamp};
use crate::DbClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use netwatcher_domain_models::agent::AgentPin;
use tracing::{info, instrument};

const PIN_COLUMNS: &str =
    "id, workspace_id, agent_id, pin_hash, pin_plaintext, expires_at, consumed_at, created_at";

/// Repositorio de autoridad única para los PIN de bootstrap.
pub struct PinRepository {
    database_client: DbClient,
}

impl PinRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Emite un PIN nuevo para un agente.
     *
     * El plaintext se conserva únicamente hasta el consumo, para que el
     * administrador pueda releerlo y transmitirlo a un humano.
     */
    #[instrument(skip(self, pin_hash, pin_plaintext))]
    pub async fn issue_pin(
        &self,
        workspace_id: i64,
        agent_id: i64,
        pin_hash: &str,
        pin_plaintext: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AgentPin, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                &format!(
                    "INSERT INTO agent_pins (workspace_id, agent_id, pin_hash, pin_plaintext,
                                             expires_at, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                     RETURNING {PIN_COLUMNS}"
                ),
                params![
                    workspace_id,
                    agent_id,
                    pin_hash,
                    pin_plaintext,
                    expires_at.map(|expiry| expiry.to_rfc3339()),
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        let pin = match rows.next().await? {
            Some(row) => map_row_to_pin(row)?,
            None => return Err(DbError::TransactionError),
        };

        info!("🔑 [PIN_ISSUE]: Bootstrap PIN issued for agent {} (workspace {}).", agent_id, workspace_id);
        Ok(pin)
    }

    /// Enumera los PIN sin consumir de un agente, más reciente primero.
    /// Los expirados se incluyen: el que llama decide si rechazarlos.
    pub async fn unconsumed_pins(
        &self,
        workspace_id: i64,
        agent_id: i64,
    ) -> Result<Vec<AgentPin>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {PIN_COLUMNS} FROM agent_pins
                     WHERE workspace_id = ?1 AND agent_id = ?2 AND consumed_at IS NULL
                     ORDER BY created_at DESC"
                ),
                params![workspace_id, agent_id],
            )
            .await?;

        let mut pins = Vec::new();
        while let Some(row) = rows.next().await? {
            pins.push(map_row_to_pin(row)?);
        }
        Ok(pins)
    }

    /// El PIN pendiente (sin consumir, sin expirar) visible para el panel.
    /// A lo sumo uno se expone, el más reciente.
    pub async fn surface_pending_pin(
        &self,
        workspace_id: i64,
        agent_id: i64,
    ) -> Result<Option<AgentPin>, DbError> {
        let now = Utc::now();
        Ok(self
            .unconsumed_pins(workspace_id, agent_id)
            .await?
            .into_iter()
            .find(|pin| pin.is_pending(now)))
    }

    /**
     * Consume un PIN: limpia el plaintext y estampa consumed_at en la misma
     * sentencia. Retorna false si el PIN ya estaba consumido.
     */
    #[instrument(skip(self))]
    pub async fn consume_pin(&self, pin_id: i64) -> Result<bool, DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE agent_pins
                 SET consumed_at = ?2, pin_plaintext = NULL
                 WHERE id = ?1 AND consumed_at IS NULL",
                params![pin_id, Utc::now().to_rfc3339()],
            )
            .await?;

        Ok(updated == 1)
    }
}

// --- ESTRATO DE MAPEO (PRIVATE SSoT) ---

fn map_row_to_pin(row: Row) -> Result<AgentPin, DbError> {
    Ok(AgentPin {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        agent_id: row.get(2)?,
        pin_hash: row.get(3)?,
        pin_plaintext: row.get::<Option<String>>(4)?,
        expires_at: parse_optional_timestamp(row.get::<Option<String>>(5)?)?,
        consumed_at: parse_optional_timestamp(row.get::<Option<String>>(6)?)?,
        created_at: parse_timestamp(&row.get::<String>(7)?)?,
    })
}
