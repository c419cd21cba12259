// [libs/domain/models/src/wire.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sobre de autenticación que acompaña toda petición originada por un agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEnvelope {
    pub workspace_id: i64,
    pub agent_id: i64,
    /// PSK en claro; el controlador lo compara contra el digest almacenado.
    pub psk: String,
}

/// Cuerpo de `POST /agents/:id/bootstrap`: intercambio PIN -> PSK.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapRequest {
    pub workspace_id: i64,
    pub agent_id: i64,
    pub pin: String,
}

/// Respuesta del bootstrap. El PSK en claro viaja exactamente una vez.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapResponse {
    pub psk: String,
}

/// Cuerpo de `POST /agents/:id/heartbeat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    #[serde(flatten)]
    pub envelope: AgentEnvelope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Cuerpo de `POST /probes/:id/data`: una medición con reloj del agente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleSubmission {
    #[serde(flatten)]
    pub envelope: AgentEnvelope,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
}

/// Trama del canal WebSocket de ingesta de alta frecuencia (`/ws/agent`).
/// El sobre viaja en la query de la negociación; cada trama sólo lleva
/// la sonda, el reloj y el payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentIngestFrame {
    pub probe_id: i64,
    pub created_at: DateTime<Utc>,
    pub payload: Value,
}
