// [libs/infra/agent-client/src/client.rs]
/*!
 * =================================================================
 * APARATO: AGENT UPLINK CLIENT (V3.2 - PSK SESSION)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: NEGOCIACIÓN PIN->PSK Y ENVÍO DE MEDICIONES
 *
 * # Logic:
 * Implementa el túnel HTTP entre el agente desplegado y el plano de
 * control. El bootstrap intercambia el PIN de un solo uso por el PSK de
 * larga vida; cada petición posterior transporta el sobre
 * (workspace_id, agent_id, psk). El estado 410 es terminal: el cliente
 * lo traduce a `ClientError::Gone` para que el bucle del agente se
 * detenga en vez de martillar el controlador.
 * =================================================================
 */

use crate::errors::ClientError;
use chrono::{DateTime, Utc};
use netwatcher_domain_models::wire::{
    AgentEnvelope, BootstrapRequest, BootstrapResponse, HeartbeatPayload, SampleSubmission,
};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Cliente de enlace del agente hacia el controlador.
pub struct ControllerClient {
    network_session_client: Client,
    controller_base_endpoint: String,
    envelope: AgentEnvelope,
}

impl ControllerClient {
    /**
     * Inicializa el cliente de red con identidad de agente.
     *
     * @param base_url Endpoint raíz del controlador.
     * @param envelope Sobre de autenticación (workspace, agente, PSK).
     */
    pub fn new(base_url: String, envelope: AgentEnvelope) -> Self {
        Self {
            network_session_client: Client::builder()
                .user_agent("NetWatcher-Agent/V3.2")
                .timeout(Duration::from_secs(30))
                .tcp_keepalive(Some(Duration::from_secs(60)))
                .build()
                .expect("FATAL: Client initialization failed."),
            controller_base_endpoint: base_url.trim_end_matches('/').to_string(),
            envelope,
        }
    }

    /**
     * Intercambia un PIN de un solo uso por el PSK de larga vida.
     *
     * El PSK retornado viaja exactamente una vez; el agente debe
     * persistirlo de inmediato.
     *
     * # Errors:
     * - `ClientError::PinRejected`: PIN inválido, consumido o expirado.
     * - `ClientError::Gone`: El agente fue retirado por un administrador.
     */
    #[instrument(skip(base_url, pin))]
    pub async fn bootstrap(
        base_url: &str,
        workspace_id: i64,
        agent_id: i64,
        pin: &str,
    ) -> Result<String, ClientError> {
        let bootstrap_client = Client::builder()
            .user_agent("NetWatcher-Agent/V3.2")
            .timeout(Duration::from_secs(30))
            .build()
            .expect("FATAL: Client initialization failed.");

        let target_url = format!(
            "{}/api/v1/agents/{}/bootstrap",
            base_url.trim_end_matches('/'),
            agent_id
        );

        let response = bootstrap_client
            .post(&target_url)
            .json(&BootstrapRequest {
                workspace_id,
                agent_id,
                pin: pin.to_string(),
            })
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let material = response.json::<BootstrapResponse>().await?;
                info!("🔐 [BOOTSTRAP]: PSK material received for agent {}.", agent_id);
                Ok(material.psk)
            }
            StatusCode::BAD_REQUEST => Err(ClientError::PinRejected),
            StatusCode::GONE => Err(ClientError::Gone),
            other => Err(ClientError::ServerRejection(format!("HTTP_{}", other))),
        }
    }

    /**
     * Latido de vivacidad con versión opcional del binario del agente.
     */
    #[instrument(skip(self))]
    pub async fn send_heartbeat(&self, version: Option<String>) -> Result<(), ClientError> {
        let target_url = format!(
            "{}/api/v1/agents/{}/heartbeat",
            self.controller_base_endpoint, self.envelope.agent_id
        );

        let response = self
            .network_session_client
            .post(&target_url)
            .json(&HeartbeatPayload {
                envelope: self.envelope.clone(),
                version,
            })
            .send()
            .await?;

        self.interpret_status(response.status())
    }

    /**
     * Envía una medición con el reloj de pared del agente.
     */
    #[instrument(skip(self, payload), fields(probe = probe_id))]
    pub async fn submit_sample(
        &self,
        probe_id: i64,
        created_at: DateTime<Utc>,
        payload: Value,
    ) -> Result<(), ClientError> {
        let target_url = format!(
            "{}/api/v1/probes/{}/data",
            self.controller_base_endpoint, probe_id
        );

        let response = self
            .network_session_client
            .post(&target_url)
            .json(&SampleSubmission {
                envelope: self.envelope.clone(),
                created_at,
                payload,
            })
            .send()
            .await?;

        self.interpret_status(response.status())
    }

    fn interpret_status(&self, status: StatusCode) -> Result<(), ClientError> {
        match status {
            status if status.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED => Err(ClientError::Unauthorized),
            StatusCode::GONE => {
                warn!("🪦 [UPLINK_TERMINAL]: Controller signalled agent retirement.");
                Err(ClientError::Gone)
            }
            other => Err(ClientError::ServerRejection(format!("HTTP_{}", other))),
        }
    }
}
