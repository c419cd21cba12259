// [apps/controller/src/services/hub.rs]
/*!
 * =================================================================
 * APARATO: SUBSCRIPTION HUB (V5.3 - TOPIC FAN-OUT)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4/C8)
 * RESPONSABILIDAD: REGISTRO DE VISORES Y DIFUSIÓN POR TÓPICO
 *
 * # Mathematical Proof (Non-Blocking Publication):
 * Cada conexión posee una cola saliente acotada; el publicador toma un
 * snapshot del conjunto de suscriptores bajo cerrojo de lectura y emite
 * con `try_send`. Una cola llena descarta la trama para ESE visor lento
 * y suma al contador de backpressure: la tubería de ingesta jamás se
 * bloquea. La vista en vivo es best-effort; la historia durable vive en
 * el adaptador de series temporales.
 * =================================================================
 */

use netwatcher_domain_models::alert::Alert;
use netwatcher_domain_models::sample::ProbeSample;
use netwatcher_domain_models::stream::{Topic, ViewerDataFrame};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Capacidad de la cola saliente por conexión de visor.
/// Dimensionada para absorber ráfagas de ingesta sin retener memoria.
const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Identificador interno de una sesión de visor conectada.
pub type ViewerSessionId = u64;

/// Registro proceso-global de sesiones de visores y sus suscripciones.
///
/// Se inicializa en la ignición y se cierra con el proceso; mutado por
/// accept/close de conexiones, leído por cada publicación.
pub struct SubscriptionHub {
    /// topic -> (session -> emisor de la cola saliente de esa conexión).
    registry: RwLock<HashMap<Topic, HashMap<ViewerSessionId, mpsc::Sender<ViewerDataFrame>>>>,
    next_session_identifier: AtomicU64,
    /// Tramas descartadas por colas llenas (visores lentos).
    backpressure_drop_counter: AtomicU64,
}

impl SubscriptionHub {
    pub fn new() -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            next_session_identifier: AtomicU64::new(1),
            backpressure_drop_counter: AtomicU64::new(0),
        }
    }

    /// Abre una sesión de visor: retorna su identificador y la cola saliente.
    pub fn open_session(&self) -> (ViewerSessionId, mpsc::Sender<ViewerDataFrame>, mpsc::Receiver<ViewerDataFrame>) {
        let session_id = self.next_session_identifier.fetch_add(1, Ordering::Relaxed);
        let (frame_sender, frame_receiver) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        info!("⚡ [HUB_SESSION]: Viewer session {} opened.", session_id);
        (session_id, frame_sender, frame_receiver)
    }

    /// Registra una suscripción ya autorizada. La autorización ocurre en el
    /// handler ANTES de llegar aquí, nunca por trama.
    pub fn subscribe(
        &self,
        session_id: ViewerSessionId,
        topic: Topic,
        frame_sender: mpsc::Sender<ViewerDataFrame>,
    ) {
        match self.registry.write() {
            Ok(mut registry_guard) => {
                registry_guard
                    .entry(topic)
                    .or_default()
                    .insert(session_id, frame_sender);
                debug!("📻 [HUB_SUBSCRIBE]: Session {} bound to {}.", session_id, topic);
            }
            Err(poison_fault) => {
                error!("💀 [HUB_LOCK_COLLAPSE]: Registry poisoned on subscribe: {}", poison_fault);
            }
        }
    }

    pub fn unsubscribe(&self, session_id: ViewerSessionId, topic: Topic) {
        if let Ok(mut registry_guard) = self.registry.write() {
            if let Some(topic_subscribers) = registry_guard.get_mut(&topic) {
                topic_subscribers.remove(&session_id);
                if topic_subscribers.is_empty() {
                    registry_guard.remove(&topic);
                }
            }
        }
    }

    /// Expulsa una sesión de todos sus tópicos (desconexión).
    pub fn evict_session(&self, session_id: ViewerSessionId) {
        match self.registry.write() {
            Ok(mut registry_guard) => {
                registry_guard.retain(|_, topic_subscribers| {
                    topic_subscribers.remove(&session_id);
                    !topic_subscribers.is_empty()
                });
                info!("💀 [HUB_EVICT]: Viewer session {} released.", session_id);
            }
            Err(poison_fault) => {
                error!("💀 [HUB_LOCK_COLLAPSE]: Registry poisoned on evict: {}", poison_fault);
            }
        }
    }

    /**
     * Publica una medición en sus dos tópicos: la sonda y el agente.
     * FIFO por tópico por visor; best-effort ante colas llenas.
     */
    pub fn publish_sample(&self, workspace_id: i64, sample: &ProbeSample) {
        let probe_topic = Topic::Probe { probe_id: sample.probe_id };
        let agent_topic = Topic::Agent { workspace_id, agent_id: sample.agent_id };

        self.publish_frame(probe_topic, ViewerDataFrame::Data {
            topic: probe_topic.to_string(),
            sample: sample.clone(),
        });
        self.publish_frame(agent_topic, ViewerDataFrame::Data {
            topic: agent_topic.to_string(),
            sample: sample.clone(),
        });
    }

    /// Publica una transición de alerta en el tópico del agente afectado
    /// (canal de panel implícito).
    pub fn publish_alert(&self, workspace_id: i64, agent_id: Option<i64>, alert: &Alert) {
        let Some(agent_id) = agent_id else { return };
        let agent_topic = Topic::Agent { workspace_id, agent_id };

        self.publish_frame(agent_topic, ViewerDataFrame::Alert {
            topic: agent_topic.to_string(),
            alert: alert.clone(),
        });
    }

    fn publish_frame(&self, topic: Topic, frame: ViewerDataFrame) {
        // Snapshot bajo cerrojo de lectura: la publicación no retiene el
        // registro mientras emite.
        let subscriber_snapshot: Vec<(ViewerSessionId, mpsc::Sender<ViewerDataFrame>)> =
            match self.registry.read() {
                Ok(registry_guard) => registry_guard
                    .get(&topic)
                    .map(|topic_subscribers| {
                        topic_subscribers
                            .iter()
                            .map(|(session_id, sender)| (*session_id, sender.clone()))
                            .collect()
                    })
                    .unwrap_or_default(),
                Err(poison_fault) => {
                    error!("💀 [HUB_LOCK_COLLAPSE]: Registry poisoned on publish: {}", poison_fault);
                    return;
                }
            };

        if subscriber_snapshot.is_empty() {
            return;
        }

        let mut severed_sessions = Vec::new();

        for (session_id, frame_sender) in subscriber_snapshot {
            match frame_sender.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Visor lento: se descarta SU trama, no se bloquea la ingesta.
                    let total_drops =
                        self.backpressure_drop_counter.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!("🐢 [HUB_BACKPRESSURE]: Frame dropped for session {} on {} (total drops {}).",
                        session_id, topic, total_drops);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    severed_sessions.push(session_id);
                }
            }
        }

        // La evicción ocurre dentro del mismo ciclo de publicación.
        for session_id in severed_sessions {
            self.evict_session(session_id);
        }
    }

    /// Contador acumulado de tramas descartadas por backpressure.
    pub fn backpressure_drops(&self) -> u64 {
        self.backpressure_drop_counter.load(Ordering::Relaxed)
    }

    /// Cantidad de suscriptores vigentes de un tópico (diagnóstico).
    pub fn subscriber_count(&self, topic: Topic) -> usize {
        self.registry
            .read()
            .map(|registry_guard| {
                registry_guard
                    .get(&topic)
                    .map(|subscribers| subscribers.len())
                    .unwrap_or(0)
            })
            .unwrap_or(0)
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new()
    }
}
