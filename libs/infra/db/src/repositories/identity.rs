// [libs/infra/db/src/repositories/identity.rs]
/*!
 * =================================================================
 * APARATO: TENANT IDENTITY REPOSITORY (V4.2 - OWNER INVARIANT)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: WORKSPACES, USUARIOS, SESIONES Y MEMBRESÍAS
 *
 * # Mathematical Proof (Owner Atomicity):
 * La transferencia de propiedad ejecuta demote-then-promote dentro de una
 * única transacción libSQL: en ningún instante observable existe un
 * workspace con cero o dos OWNER. El conteo se verifica antes del commit
 * y cualquier divergencia aborta la ráfaga completa.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{parse_optional_timestamp, parse_timestamp};
use crate::DbClient;
use chrono::Utc;
use libsql::{params, Row};
use netwatcher_domain_models::workspace::{normalize_email, Member, MemberRole, Workspace};
use tracing::{info, instrument, warn};

/// Repositorio de autoridad única para la identidad multi-tenant.
pub struct IdentityRepository {
    database_client: DbClient,
}

impl IdentityRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    // --- ESTRATO DE WORKSPACES ---

    /**
     * Crea un workspace y su membresía OWNER en una sola transacción.
     *
     * # Errors:
     * - `DbError::Conflict`: El nombre ya existe en el plano de control.
     */
    #[instrument(skip(self), fields(name = %workspace_name))]
    pub async fn create_workspace(
        &self,
        workspace_name: &str,
        owner_user_id: i64,
        owner_email: &str,
    ) -> Result<Workspace, DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await?;
        let now = Utc::now().to_rfc3339();

        let mut inserted = transaction
            .query(
                "INSERT INTO workspaces (name, owner_user_id, created_at)
                 VALUES (?1, ?2, ?3)
                 RETURNING id",
                params![workspace_name, owner_user_id, now.clone()],
            )
            .await
            .map_err(|fault| {
                if fault.to_string().contains("UNIQUE") {
                    DbError::Conflict(format!("workspace name '{}'", workspace_name))
                } else {
                    DbError::QueryError(fault)
                }
            })?;

        let workspace_id: i64 = inserted
            .next()
            .await?
            .ok_or(DbError::TransactionError)?
            .get(0)?;

        transaction
            .execute(
                "INSERT INTO members (workspace_id, user_id, email, role, accepted_at)
                 VALUES (?1, ?2, ?3, 'OWNER', ?4)",
                params![workspace_id, owner_user_id, normalize_email(owner_email), now],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;

        info!("🏢 [TENANT_FORGE]: Workspace [{}] crystallized with single OWNER.", workspace_name);
        self.fetch_workspace(workspace_id).await
    }

    pub async fn fetch_workspace(&self, workspace_id: i64) -> Result<Workspace, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, name, owner_user_id, created_at, deleted_at
                 FROM workspaces
                 WHERE id = ?1 AND deleted_at IS NULL",
                params![workspace_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_workspace(row),
            None => Err(DbError::NotFound),
        }
    }

    /// Inventario de workspaces visibles para un usuario (sus membresías).
    pub async fn list_workspaces_for_user(&self, user_id: i64) -> Result<Vec<Workspace>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT w.id, w.name, w.owner_user_id, w.created_at, w.deleted_at
                 FROM workspaces w
                 JOIN members m ON m.workspace_id = w.id
                 WHERE m.user_id = ?1 AND m.revoked_at IS NULL AND w.deleted_at IS NULL
                 ORDER BY w.created_at ASC",
                params![user_id],
            )
            .await?;

        let mut workspaces = Vec::new();
        while let Some(row) = rows.next().await? {
            workspaces.push(map_row_to_workspace(row)?);
        }
        Ok(workspaces)
    }

    // --- ESTRATO DE USUARIOS Y SESIONES ---

    /// Registra (o recupera) un usuario por email normalizado.
    pub async fn upsert_user(&self, email: &str) -> Result<i64, DbError> {
        let connection = self.database_client.get_connection()?;
        let normalized = normalize_email(email);

        let mut rows = connection
            .query(
                "INSERT INTO users (email, created_at) VALUES (?1, ?2)
                 ON CONFLICT(email) DO UPDATE SET email = excluded.email
                 RETURNING id",
                params![normalized, Utc::now().to_rfc3339()],
            )
            .await?;

        rows.next()
            .await?
            .ok_or(DbError::TransactionError)?
            .get::<i64>(0)
            .map_err(DbError::QueryError)
    }

    /// Registra una sesión de visor emitida por la tubería de usuarios externa.
    pub async fn register_session(
        &self,
        session_token: &str,
        user_id: i64,
        expires_at: chrono::DateTime<Utc>,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        connection
            .execute(
                "INSERT INTO user_sessions (token, user_id, expires_at, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![session_token, user_id, expires_at.to_rfc3339(), Utc::now().to_rfc3339()],
            )
            .await?;
        Ok(())
    }

    /**
     * Resuelve un token de sesión a su usuario.
     *
     * # Errors:
     * - `DbError::NotFound`: Token desconocido o expirado.
     */
    pub async fn resolve_session(&self, session_token: &str) -> Result<i64, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT user_id FROM user_sessions
                 WHERE token = ?1 AND expires_at > ?2",
                params![session_token, Utc::now().to_rfc3339()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => row.get::<i64>(0).map_err(DbError::QueryError),
            None => Err(DbError::NotFound),
        }
    }

    // --- ESTRATO DE MEMBRESÍAS ---

    /**
     * Rol efectivo de un usuario dentro de un workspace.
     *
     * # Errors:
     * - `DbError::NotFound`: El usuario no es miembro vigente.
     */
    pub async fn member_role(&self, workspace_id: i64, user_id: i64) -> Result<MemberRole, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT role FROM members
                 WHERE workspace_id = ?1 AND user_id = ?2 AND revoked_at IS NULL",
                params![workspace_id, user_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let role_raw: String = row.get(0)?;
                MemberRole::parse(&role_raw)
                    .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_ROLE: {}", role_raw)))
            }
            None => Err(DbError::NotFound),
        }
    }

    /**
     * Registra una invitación pendiente con token y expiración.
     *
     * Unicidad: (workspace, email) mientras la invitación siga pendiente.
     */
    #[instrument(skip(self, invite_token))]
    pub async fn create_invite(
        &self,
        workspace_id: i64,
        email: &str,
        role: MemberRole,
        invite_token: &str,
        invite_expires_at: chrono::DateTime<Utc>,
    ) -> Result<Member, DbError> {
        if role == MemberRole::Owner {
            return Err(DbError::OwnershipViolation(
                "OWNER membership is only granted via ownership transfer".into(),
            ));
        }

        let connection = self.database_client.get_connection()?;
        let now = Utc::now().to_rfc3339();

        let mut rows = connection
            .query(
                "INSERT INTO members (workspace_id, email, role, invite_token, invite_expires_at, invited_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 RETURNING id, workspace_id, user_id, email, role, invite_token,
                           invite_expires_at, invited_at, accepted_at, revoked_at",
                params![
                    workspace_id,
                    normalize_email(email),
                    role.as_str(),
                    invite_token,
                    invite_expires_at.to_rfc3339(),
                    now
                ],
            )
            .await
            .map_err(|fault| {
                if fault.to_string().contains("UNIQUE") {
                    DbError::Conflict(format!("membership for '{}'", email))
                } else {
                    DbError::QueryError(fault)
                }
            })?;

        match rows.next().await? {
            Some(row) => map_row_to_member(row),
            None => Err(DbError::TransactionError),
        }
    }

    pub async fn list_members(&self, workspace_id: i64) -> Result<Vec<Member>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                "SELECT id, workspace_id, user_id, email, role, invite_token,
                        invite_expires_at, invited_at, accepted_at, revoked_at
                 FROM members
                 WHERE workspace_id = ?1 AND revoked_at IS NULL
                 ORDER BY id ASC",
                params![workspace_id],
            )
            .await?;

        let mut members = Vec::new();
        while let Some(row) = rows.next().await? {
            members.push(map_row_to_member(row)?);
        }
        Ok(members)
    }

    /**
     * Transfiere la propiedad del workspace de forma atómica
     * (demote-then-promote en una sola transacción).
     *
     * # Errors:
     * - `DbError::OwnershipViolation`: El origen no es OWNER, el destino no
     *   es miembro vigente, o el conteo post-transferencia divergió de 1.
     */
    #[instrument(skip(self))]
    pub async fn transfer_ownership(
        &self,
        workspace_id: i64,
        from_user_id: i64,
        to_user_id: i64,
    ) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let transaction = connection.transaction().await?;

        // 1. DEGRADACIÓN DEL OWNER VIGENTE
        let demoted = transaction
            .execute(
                "UPDATE members SET role = 'ADMIN'
                 WHERE workspace_id = ?1 AND user_id = ?2 AND role = 'OWNER' AND revoked_at IS NULL",
                params![workspace_id, from_user_id],
            )
            .await?;
        if demoted != 1 {
            return Err(DbError::OwnershipViolation("source member is not the OWNER".into()));
        }

        // 2. PROMOCIÓN DEL DESTINO
        let promoted = transaction
            .execute(
                "UPDATE members SET role = 'OWNER'
                 WHERE workspace_id = ?1 AND user_id = ?2 AND revoked_at IS NULL",
                params![workspace_id, to_user_id],
            )
            .await?;
        if promoted != 1 {
            return Err(DbError::OwnershipViolation("target is not an active member".into()));
        }

        // 3. VERIFICACIÓN DEL INVARIANTE ANTES DEL SELLADO
        let mut owner_count_rows = transaction
            .query(
                "SELECT COUNT(*) FROM members
                 WHERE workspace_id = ?1 AND role = 'OWNER' AND revoked_at IS NULL",
                params![workspace_id],
            )
            .await?;
        let owner_count: i64 = owner_count_rows
            .next()
            .await?
            .ok_or(DbError::TransactionError)?
            .get(0)?;

        if owner_count != 1 {
            warn!("⛔ [GOVERNANCE]: Owner invariant drifted to {} during transfer.", owner_count);
            return Err(DbError::OwnershipViolation(format!("owner count = {}", owner_count)));
        }

        transaction
            .execute(
                "UPDATE workspaces SET owner_user_id = ?2 WHERE id = ?1",
                params![workspace_id, to_user_id],
            )
            .await?;

        transaction.commit().await.map_err(|_| DbError::TransactionError)?;
        info!("👑 [GOVERNANCE]: Ownership of workspace {} transferred atomically.", workspace_id);
        Ok(())
    }
}

// --- ESTRATO DE MAPEO (PRIVATE SSoT) ---

fn map_row_to_workspace(row: Row) -> Result<Workspace, DbError> {
    Ok(Workspace {
        id: row.get(0)?,
        name: row.get(1)?,
        owner_user_id: row.get::<Option<i64>>(2)?,
        created_at: parse_timestamp(&row.get::<String>(3)?)?,
        deleted_at: parse_optional_timestamp(row.get::<Option<String>>(4)?)?,
    })
}

fn map_row_to_member(row: Row) -> Result<Member, DbError> {
    let role_raw: String = row.get(4)?;
    let role = MemberRole::parse(&role_raw)
        .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_ROLE: {}", role_raw)))?;

    Ok(Member {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        user_id: row.get::<Option<i64>>(2)?,
        email: row.get(3)?,
        role,
        invite_token: row.get::<Option<String>>(5)?,
        invite_expires_at: parse_optional_timestamp(row.get::<Option<String>>(6)?)?,
        invited_at: parse_optional_timestamp(row.get::<Option<String>>(7)?)?,
        accepted_at: parse_optional_timestamp(row.get::<Option<String>>(8)?)?,
        revoked_at: parse_optional_timestamp(row.get::<Option<String>>(9)?)?,
    })
}
