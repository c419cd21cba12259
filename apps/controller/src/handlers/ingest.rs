// [apps/controller/src/handlers/ingest.rs]
/*!
 * =================================================================
 * APARATO: AGENT INGEST SOCKET (V4.3 - HIGH RATE UPLINK)
 * CLASIFICACIÓN: API HANDLER (ESTRATO L4)
 * RESPONSABILIDAD: INGESTA WEBSOCKET PARA TRAFICSIM DE ALTA FRECUENCIA
 *
 * # Logic:
 * Canal alternativo a POST /probes/:id/data para agentes con ciclos
 * TrafficSim de alta tasa. El sobre (workspace, agente, PSK) viaja en la
 * query de la negociación; la autorización ocurre UNA vez en el upgrade.
 * Las tramas se procesan secuencialmente: FIFO por sonda garantizado por
 * construcción. El fallo de una trama se reporta y el canal continúa.
 * =================================================================
 */

use crate::services::ingestion;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
};
use netwatcher_domain_models::wire::{AgentEnvelope, AgentIngestFrame};
use serde::Deserialize;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Intervalo de keep-alive físico (ping-pong RFC 6455).
const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;

/// Sobre de autenticación en la query de la negociación WebSocket.
#[derive(Deserialize)]
pub struct AgentSocketQuery {
    pub workspace_id: i64,
    pub agent_id: i64,
    pub psk: String,
}

/**
 * Endpoint: GET /api/v1/ws/agent?workspace_id&agent_id&psk
 * Negociación del canal de ingesta de alta frecuencia.
 */
#[instrument(skip(websocket_upgrade, application_state, socket_query), fields(agent = socket_query.agent_id))]
pub async fn establish_agent_uplink(
    websocket_upgrade: WebSocketUpgrade,
    State(application_state): State<AppState>,
    Query(socket_query): Query<AgentSocketQuery>,
) -> impl IntoResponse {
    let envelope = AgentEnvelope {
        workspace_id: socket_query.workspace_id,
        agent_id: socket_query.agent_id,
        psk: socket_query.psk,
    };

    // La autorización ocurre en el upgrade, nunca por trama.
    let session = match application_state.authenticator.authenticate(&envelope).await {
        Ok(session) => session,
        Err(auth_fault) => {
            warn!("❌ [AGENT_SOCKET_REJECTION]: {}", auth_fault);
            return crate::errors::ApiError::from(auth_fault).into_response();
        }
    };

    websocket_upgrade
        .on_upgrade(move |socket| drive_agent_ingest_link(socket, application_state, session))
        .into_response()
}

async fn drive_agent_ingest_link(
    mut socket: WebSocket,
    application_state: AppState,
    session: crate::services::authenticator::AgentSession,
) {
    info!("⚡ [AGENT_UPLINK_OPEN]: High-rate ingest link for agent {}.", session.agent_id);

    let mut keepalive_timer = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));

    loop {
        tokio::select! {
            // Brazo 1: Pulso de vida físico.
            _ = keepalive_timer.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            },

            // Brazo 2: Tramas de medición entrantes.
            network_read = socket.recv() => {
                match network_read {
                    Some(Ok(Message::Text(raw_frame_json))) => {
                        let frame: AgentIngestFrame = match serde_json::from_str(&raw_frame_json) {
                            Ok(frame) => frame,
                            Err(decode_fault) => {
                                debug!("⚠️ [FRAME_REJECTED]: Agent {} sent malformed frame: {}",
                                    session.agent_id, decode_fault);
                                let rejection = serde_json::json!({
                                    "error": "FRAME_VALIDATION",
                                    "detail": decode_fault.to_string(),
                                });
                                let _ = socket.send(Message::Text(rejection.to_string())).await;
                                continue;
                            }
                        };

                        // Fallo de una trama: se reporta y el canal continúa.
                        if let Err(ingest_fault) = ingestion::ingest_sample(
                            &application_state,
                            &session,
                            frame.probe_id,
                            frame.created_at,
                            frame.payload,
                        ).await {
                            warn!("⚠️ [FRAME_FAULT]: Agent {} probe {} rejected: {}",
                                session.agent_id, frame.probe_id, ingest_fault);
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("🔌 [AGENT_SOCKET_CLOSE]: Agent {} terminated link.", session.agent_id);
                        break;
                    },
                    Some(Ok(_)) => {} // Binary/Pong se descartan en este estrato.
                    Some(Err(physical_fault)) => {
                        error!("❌ [AGENT_UPLINK_FAULT]: Agent {} network error: {}",
                            session.agent_id, physical_fault);
                        break;
                    },
                }
            },
        }
    }

    info!("💀 [AGENT_UPLINK_TERMINATED]: Agent {} ingest link released.", session.agent_id);
}

/// Sonda de salud del plano de control.
pub async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, "STATUS_OK")
}
