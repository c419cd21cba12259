// [libs/infra/db/src/repositories/share_link.rs]
/*!
 * =================================================================
 * APARATO: SHARE LINK REPOSITORY (V2.3 - TOKENIZED READ)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: CONCESIONES PÚBLICAS DE SÓLO-LECTURA POR AGENTE
 *
 * # Logic:
 * El token de 256 bits se genera con el RNG del sistema y viaja en la URL.
 * La contraseña opcional se almacena como hash bcrypt; la verificación
 * ocurre en cada petición (el gateway no mantiene sesión). La expiración
 * es absoluta y produce una señal distinta de *not found*.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::parse_timestamp;
use crate::DbClient;
use chrono::{DateTime, Utc};
use libsql::{params, Row};
use netwatcher_domain_models::share::ShareLink;
use rand::RngCore;
use tracing::{info, instrument};

const SHARE_COLUMNS: &str =
    "id, token, workspace_id, agent_id, password_hash, expires_at, allow_speedtest, created_at";

/// Repositorio de autoridad única de las concesiones públicas.
pub struct ShareLinkRepository {
    database_client: DbClient,
}

impl ShareLinkRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /// Genera un token URL-safe de 256 bits con el RNG del sistema.
    pub fn generate_token() -> String {
        let mut token_bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut token_bytes);
        hex::encode(token_bytes)
    }

    /**
     * Registra una concesión nueva sobre un agente.
     *
     * @param password_hash Hash bcrypt ya calculado por la capa de servicio,
     *                      o None para shares sin contraseña.
     */
    #[instrument(skip(self, password_hash), fields(agent = agent_id))]
    pub async fn create_share(
        &self,
        workspace_id: i64,
        agent_id: i64,
        password_hash: Option<String>,
        expires_at: DateTime<Utc>,
        allow_speedtest: bool,
    ) -> Result<ShareLink, DbError> {
        let connection = self.database_client.get_connection()?;
        let token = Self::generate_token();

        let mut rows = connection
            .query(
                &format!(
                    "INSERT INTO share_links (token, workspace_id, agent_id, password_hash,
                                              expires_at, allow_speedtest, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     RETURNING {SHARE_COLUMNS}"
                ),
                params![
                    token,
                    workspace_id,
                    agent_id,
                    password_hash,
                    expires_at.to_rfc3339(),
                    allow_speedtest as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        let share = match rows.next().await? {
            Some(row) => map_row_to_share(row)?,
            None => return Err(DbError::TransactionError),
        };

        info!("🔗 [SHARE_FORGE]: Public grant created for agent {} (expires {}).",
            agent_id, share.expires_at);
        Ok(share)
    }

    /**
     * Recupera una concesión por token. La expiración NO se evalúa aquí:
     * el gateway la traduce a su señal distinta (410).
     */
    pub async fn fetch_by_token(&self, token: &str) -> Result<ShareLink, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {SHARE_COLUMNS} FROM share_links WHERE token = ?1"),
                params![token],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_share(row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn revoke(&self, token: &str) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let deleted = connection
            .execute("DELETE FROM share_links WHERE token = ?1", params![token])
            .await?;

        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        info!("✂️ [SHARE_REVOKE]: Public grant revoked.");
        Ok(())
    }
}

fn map_row_to_share(row: Row) -> Result<ShareLink, DbError> {
    Ok(ShareLink {
        id: row.get(0)?,
        token: row.get(1)?,
        workspace_id: row.get(2)?,
        agent_id: row.get(3)?,
        password_hash: row.get::<Option<String>>(4)?,
        expires_at: parse_timestamp(&row.get::<String>(5)?)?,
        allow_speedtest: row.get::<i64>(6)? != 0,
        created_at: parse_timestamp(&row.get::<String>(7)?)?,
    })
}
