// [apps/controller/src/handlers/stream.rs]
/*!
 * =================================================================
 * APARATO: VIEWER STREAM SOCKET (V5.4 - COOPERATIVE LOOP)
 * CLASIFICACIÓN: API HANDLER (ESTRATO L4/C8)
 * RESPONSABILIDAD: SESIÓN WEBSOCKET DE VISOR Y AUTORIZACIÓN DE TÓPICOS
 *
 * # Mathematical Proof (Serialized Writes):
 * Cada conexión corre un único bucle cooperativo: las escrituras salen
 * serializadas por la cola saliente de la sesión, los comandos entrantes
 * se procesan entre escrituras y el keep-alive comparte el mismo select.
 * La autorización ocurre en el momento de la suscripción, jamás por
 * trama. Al desconectar, el registro expulsa la sesión dentro del mismo
 * ciclo de publicación.
 * =================================================================
 */

use crate::middleware::ViewerIdentity;
use crate::state::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, State,
    },
    response::IntoResponse,
};
use netwatcher_domain_models::share::ShareLink;
use netwatcher_domain_models::stream::{Topic, ViewerCommandFrame, ViewerDataFrame};
use netwatcher_domain_models::workspace::MemberRole;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info, instrument, warn};

/// Intervalo de keep-alive físico (ping-pong RFC 6455).
const KEEPALIVE_INTERVAL_SECONDS: u64 = 25;

/// Principal de una sesión de streaming: visor autenticado o share público.
#[derive(Clone)]
pub enum StreamPrincipal {
    Viewer(ViewerIdentity),
    Share(ShareLink),
}

/**
 * Endpoint: GET /api/v1/ws/viewer?token=<session>
 * Negociación del enlace de visor autenticado.
 */
#[instrument(skip(websocket_upgrade, application_state, viewer))]
pub async fn establish_viewer_uplink(
    websocket_upgrade: WebSocketUpgrade,
    State(application_state): State<AppState>,
    Extension(viewer): Extension<ViewerIdentity>,
) -> impl IntoResponse {
    debug!("🔌 [SOCKET_UPGRADE]: Viewer {} negotiating protocol transition.", viewer.user_id);
    websocket_upgrade.on_upgrade(move |socket| {
        drive_subscription_link(socket, application_state, StreamPrincipal::Viewer(viewer))
    })
}

/**
 * Autoriza una suscripción para el principal dado.
 *
 * - Visores: membresía del workspace del agente/sonda.
 * - Shares: el tópico debe referenciar exactamente al agente concedido.
 */
async fn authorize_topic(
    application_state: &AppState,
    principal: &StreamPrincipal,
    topic: Topic,
) -> Result<(), String> {
    match principal {
        StreamPrincipal::Viewer(viewer) => {
            let workspace_id = match topic {
                Topic::Agent { workspace_id, .. } => workspace_id,
                Topic::Probe { probe_id } => {
                    let probe = application_state
                        .probe_repository
                        .fetch_probe(probe_id)
                        .await
                        .map_err(|_| format!("unknown probe in topic {}", topic))?;
                    probe.workspace_id
                }
            };

            let role = application_state
                .identity_repository
                .member_role(workspace_id, viewer.user_id)
                .await
                .map_err(|_| format!("not a member of workspace {}", workspace_id))?;

            if role < MemberRole::ReadOnly {
                return Err("insufficient role".into());
            }
            Ok(())
        }
        StreamPrincipal::Share(share) => match topic {
            Topic::Agent { workspace_id, agent_id } => {
                if workspace_id == share.workspace_id && agent_id == share.agent_id {
                    Ok(())
                } else {
                    Err("share grant does not cover this agent".into())
                }
            }
            Topic::Probe { probe_id } => {
                let probe = application_state
                    .probe_repository
                    .fetch_probe(probe_id)
                    .await
                    .map_err(|_| format!("unknown probe in topic {}", topic))?;
                if probe.agent_id == share.agent_id {
                    Ok(())
                } else {
                    Err("share grant does not cover this probe".into())
                }
            }
        },
    }
}

/**
 * Bucle cooperativo de una sesión de streaming (visor o share).
 */
pub async fn drive_subscription_link(
    mut socket: WebSocket,
    application_state: AppState,
    principal: StreamPrincipal,
) {
    let hub = application_state.subscription_hub.clone();
    let (session_id, frame_sender, mut frame_receiver) = hub.open_session();

    let mut keepalive_timer = interval(Duration::from_secs(KEEPALIVE_INTERVAL_SECONDS));

    loop {
        tokio::select! {
            // Brazo 1: Pulso de vida físico.
            _ = keepalive_timer.tick() => {
                if socket.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            },

            // Brazo 2: Tramas publicadas por la tubería de ingesta.
            published_frame = frame_receiver.recv() => {
                match published_frame {
                    Some(frame) => {
                        let serialized = match serde_json::to_string(&frame) {
                            Ok(json) => json,
                            Err(serialization_fault) => {
                                error!("❌ [FRAME_SERIALIZATION]: {}", serialization_fault);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(serialized)).await.is_err() {
                            warn!("⚠️ [UPLINK_SEVERED]: Session {} lost downstream strata.", session_id);
                            break;
                        }
                    },
                    None => break, // La sesión fue expulsada del registro.
                }
            },

            // Brazo 3: Comandos del visor (subscribe/unsubscribe).
            network_read = socket.recv() => {
                match network_read {
                    Some(Ok(Message::Text(raw_command_json))) => {
                        let command = match serde_json::from_str::<ViewerCommandFrame>(&raw_command_json) {
                            Ok(command) => command,
                            Err(decode_fault) => {
                                let rejection = ViewerDataFrame::Error {
                                    detail: format!("malformed command: {}", decode_fault),
                                };
                                if let Ok(json) = serde_json::to_string(&rejection) {
                                    let _ = socket.send(Message::Text(json)).await;
                                }
                                continue;
                            }
                        };

                        let response_frame = process_viewer_command(
                            &application_state,
                            &principal,
                            session_id,
                            &frame_sender,
                            command,
                        ).await;

                        if let Ok(json) = serde_json::to_string(&response_frame) {
                            if socket.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("🔌 [SOCKET_CLOSE]: Session {} terminated by remote host.", session_id);
                        break;
                    },
                    Some(Ok(_)) => {} // Binary/Pong se descartan en este estrato.
                    Some(Err(physical_fault)) => {
                        error!("❌ [UPLINK_FAULT]: Session {} network error: {}", session_id, physical_fault);
                        break;
                    },
                }
            },
        }
    }

    // La evicción libera la sesión de todos sus tópicos.
    hub.evict_session(session_id);
    info!("💀 [UPLINK_TERMINATED]: Session {} resources released.", session_id);
}

async fn process_viewer_command(
    application_state: &AppState,
    principal: &StreamPrincipal,
    session_id: u64,
    frame_sender: &tokio::sync::mpsc::Sender<ViewerDataFrame>,
    command: ViewerCommandFrame,
) -> ViewerDataFrame {
    match command {
        ViewerCommandFrame::Subscribe { topics } => {
            let mut accepted_topics = Vec::new();

            for raw_topic in topics {
                let topic = match Topic::parse(&raw_topic) {
                    Ok(topic) => topic,
                    Err(grammar_fault) => {
                        return ViewerDataFrame::Error { detail: grammar_fault.to_string() };
                    }
                };

                if let Err(authorization_fault) =
                    authorize_topic(application_state, principal, topic).await
                {
                    warn!("⛔ [SUBSCRIBE_VETO]: Session {} on {}: {}",
                        session_id, raw_topic, authorization_fault);
                    return ViewerDataFrame::Error { detail: authorization_fault };
                }

                application_state
                    .subscription_hub
                    .subscribe(session_id, topic, frame_sender.clone());
                accepted_topics.push(raw_topic);
            }

            ViewerDataFrame::Subscribed { topics: accepted_topics }
        }
        ViewerCommandFrame::Unsubscribe { topics } => {
            let mut released_topics = Vec::new();
            for raw_topic in topics {
                if let Ok(topic) = Topic::parse(&raw_topic) {
                    application_state.subscription_hub.unsubscribe(session_id, topic);
                    released_topics.push(raw_topic);
                }
            }
            ViewerDataFrame::Subscribed { topics: released_topics }
        }
    }
}
