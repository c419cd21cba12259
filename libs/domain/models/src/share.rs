// [libs/domain/models/src/share.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Concesión pública de sólo-lectura sobre un agente.
///
/// El token es de 256 bits, URL-safe (hex). La contraseña opcional se
/// almacena como hash bcrypt y se verifica en cada petición; el servidor no
/// mantiene sesión alguna para visitantes de share.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLink {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    pub token: String,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    #[serde(rename = "agent_identifier")]
    #[typeshare(serialized_as = "number")]
    pub agent_id: i64,

    /// Hash bcrypt de la contraseña de acceso. Jamás viaja al visitante.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    #[typeshare(serialized_as = "String")]
    pub expires_at: DateTime<Utc>,

    /// Habilita el disparo de speedtests bajo demanda en shares de corta vida.
    pub allow_speedtest: bool,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
}

impl ShareLink {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Respuesta de `GET /share/:token/info`: metadatos sin material sensible.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareInfo {
    pub has_password: bool,
    pub expired: bool,
    #[typeshare(serialized_as = "String")]
    pub expires_at: DateTime<Utc>,
    pub allow_speedtest: bool,
}
