// [libs/infra/agent-client/src/errors.rs]
//! =================================================================
//! APARATO: AGENT CLIENT ERRORS (V3.0 - TERMINAL AWARE)
//! RESPONSABILIDAD: CATALOGACIÓN DE FALLOS DE COMUNICACIÓN
//! =================================================================

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("NETWORK_UNREACHABLE: Failed to connect to the control plane: {0}")]
    NetworkFault(#[from] reqwest::Error),

    #[error("ENVELOPE_CORRUPTION: Failed to decode controller response: {0}")]
    DecodingFault(#[from] serde_json::Error),

    #[error("COMMAND_REJECTION: Controller returned status {0}")]
    ServerRejection(String),

    /// 401: El PSK presentado no coincide con el digest almacenado.
    #[error("PSK_REJECTED: Credential digest mismatch")]
    Unauthorized,

    /// 410: El agente fue retirado por un administrador. Señal terminal:
    /// un agente bien educado deja de reintentar definitivamente.
    #[error("AGENT_RETIRED: Controller signalled gone; stop retrying")]
    Gone,

    /// 400: El PIN de bootstrap fue rechazado (inválido o expirado).
    #[error("PIN_REJECTED: Bootstrap PIN invalid or expired")]
    PinRejected,
}
