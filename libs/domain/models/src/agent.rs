// [libs/domain/models/src/agent.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use typeshare::typeshare;

/// Configuración del servidor de simulación de tráfico embebido en el agente.
#[typeshare]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrafficSimServer {
    pub enabled: bool,
    #[serde(default)]
    pub host: String,
    #[typeshare(serialized_as = "number")]
    #[serde(default)]
    pub port: u16,
}

/// Un endpoint de medición desplegado, autenticado por PSK.
///
/// Ciclo de vida: creado por un administrador junto con un PIN; tras el
/// primer intercambio PIN->PSK transiciona a `initialized=true`. El borrado
/// es lógico: un agente eliminado que reintenta conectar recibe una señal
/// terminal *gone*, no *unauthorised*.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub location: String,

    #[serde(rename = "last_seen_at")]
    #[typeshare(serialized_as = "String")]
    pub last_seen_at: Option<DateTime<Utc>>,

    /// Versión reportada por el agente en su último latido.
    #[serde(default)]
    pub version: String,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    pub initialized: bool,

    /// Digest SHA-256 del PSK vigente. Jamás viaja hacia el panel.
    #[serde(skip_serializing)]
    pub psk_hash: Option<String>,

    #[serde(rename = "trafficsim_server", default)]
    pub trafficsim: TrafficSimServer,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,

    /// Tombstone de borrado lógico, leída únicamente por la ruta Unscoped.
    #[typeshare(serialized_as = "String")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Credencial de bootstrap de un solo uso.
///
/// Invariante: el plaintext se conserva sólo hasta el consumo y se limpia en
/// la misma transacción que estampa `consumed_at`.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPin {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    #[serde(rename = "agent_identifier")]
    #[typeshare(serialized_as = "number")]
    pub agent_id: i64,

    /// Hash bcrypt del PIN. Jamás viaja hacia el panel.
    #[serde(skip_serializing)]
    pub pin_hash: String,

    /// Plaintext visible para el administrador hasta que el PIN sea consumido.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin_plaintext: Option<String>,

    #[typeshare(serialized_as = "String")]
    pub expires_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub consumed_at: Option<DateTime<Utc>>,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
}

impl AgentPin {
    /// Un PIN es pendiente si no fue consumido y no ha expirado.
    pub fn is_pending(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none()
            && self.expires_at.map(|expiry| expiry > now).unwrap_or(true)
    }
}
