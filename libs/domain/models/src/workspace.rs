// [libs/domain/models/src/workspace.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Contenedor de inquilino (tenant). Agentes y miembros cuelgan de él.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    /// Nombre único dentro del plano de control.
    pub name: String,

    #[serde(rename = "owner_user_identifier")]
    #[typeshare(serialized_as = "number")]
    pub owner_user_id: Option<i64>,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,

    /// Tombstone de borrado lógico. Todas las consultas por defecto lo filtran.
    #[typeshare(serialized_as = "String")]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Rol de un usuario dentro de un workspace.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MemberRole {
    /// Lectura pura (paneles y datos).
    ReadOnly,
    /// Lectura y escritura de sondas y reglas.
    ReadWrite,
    /// Administración de agentes, shares y miembros.
    Admin,
    /// Propietario único del workspace. Invariante: exactamente uno por workspace.
    Owner,
}

impl MemberRole {
    /// Determina si el rol autoriza mutaciones administrativas (agentes, PINs, shares).
    pub fn can_administrate(&self) -> bool {
        matches!(self, MemberRole::Admin | MemberRole::Owner)
    }

    /// Determina si el rol autoriza escritura de sondas y reglas de alerta.
    pub fn can_write(&self) -> bool {
        !matches!(self, MemberRole::ReadOnly)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MemberRole::ReadOnly => "READ_ONLY",
            MemberRole::ReadWrite => "READ_WRITE",
            MemberRole::Admin => "ADMIN",
            MemberRole::Owner => "OWNER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            // El panel histórico usaba VIEWER/USER como alias de lectura/escritura.
            "READ_ONLY" | "VIEWER" => Some(MemberRole::ReadOnly),
            "READ_WRITE" | "USER" => Some(MemberRole::ReadWrite),
            "ADMIN" => Some(MemberRole::Admin),
            "OWNER" => Some(MemberRole::Owner),
            _ => None,
        }
    }
}

/// Membresía de un usuario en un workspace, o una invitación pendiente.
///
/// Unicidad: (workspace, user) cuando hay usuario; (workspace, email) cuando
/// la invitación está pendiente.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    /// Ausente mientras la invitación no haya sido aceptada.
    #[serde(rename = "user_identifier")]
    #[typeshare(serialized_as = "number")]
    pub user_id: Option<i64>,

    /// Email normalizado (minúsculas, sin espacios perimetrales).
    pub email: String,

    pub role: MemberRole,

    /// Token de invitación vigente, si la membresía sigue pendiente.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invite_token: Option<String>,

    #[typeshare(serialized_as = "String")]
    pub invite_expires_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub invited_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub accepted_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub revoked_at: Option<DateTime<Utc>>,
}

impl Member {
    /// Una invitación es pendiente si aún no tiene usuario ni fue revocada.
    pub fn is_pending_invite(&self) -> bool {
        self.user_id.is_none() && self.revoked_at.is_none()
    }
}

/// Normaliza un email para las comparaciones de unicidad de membresía.
pub fn normalize_email(raw_email: &str) -> String {
    raw_email.trim().to_lowercase()
}
