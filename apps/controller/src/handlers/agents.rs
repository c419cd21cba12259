// [apps/controller/src/handlers/agents.rs]
/*!
 * =================================================================
 * APARATO: AGENT LIFECYCLE HANDLER (V5.2 - ADMIN + WIRE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: ALTA, BOOTSTRAP, ROTACIÓN, LATIDO Y RETIRO DE AGENTES
 *
 * # Logic:
 * Alta y rotación son acciones administrativas (rol ADMIN del workspace);
 * bootstrap y latido son tráfico de agentes autenticado por PIN o PSK.
 * El PIN y el PSK en claro viajan exactamente una vez cada uno.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::{require_role, ViewerIdentity};
use crate::services::ingestion;
use crate::state::AppState;
use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use netwatcher_domain_models::agent::{Agent, TrafficSimServer};
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::share::ShareLink;
use netwatcher_domain_models::wire::{BootstrapRequest, BootstrapResponse, HeartbeatPayload, SampleSubmission};
use netwatcher_domain_models::workspace::MemberRole;
use netwatcher_infra_db::repositories::probe::{ProbeSpec, TargetSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Alta administrativa de un agente.
#[derive(Deserialize)]
pub struct CreateAgentPayload {
    pub workspace_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    /// Vigencia opcional del PIN emitido, en horas.
    #[serde(default)]
    pub pin_expires_in_hours: Option<i64>,
}

/// Respuesta de alta: el PIN en claro se exhibe UNA vez.
#[derive(Serialize)]
pub struct CreateAgentEnvelope {
    pub agent: Agent,
    pub pin: String,
}

#[derive(Serialize)]
pub struct RotatePskEnvelope {
    pub psk: String,
}

/// Alta/edición de sondas sobre un agente.
#[derive(Deserialize)]
pub struct ProbePayload {
    #[serde(rename = "type")]
    pub probe_type: ProbeType,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_interval")]
    pub interval_seconds: i64,
    #[serde(default)]
    pub duration_seconds: i64,
    #[serde(default)]
    pub count: i64,
    #[serde(default)]
    pub notifications: bool,
    #[serde(default)]
    pub server_mode: bool,
    #[serde(default)]
    pub reverse_of_probe_id: Option<i64>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub targets: Vec<TargetPayload>,
}

fn default_interval() -> i64 {
    60
}

#[derive(Deserialize)]
pub struct TargetPayload {
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub target_agent_id: Option<i64>,
}

impl ProbePayload {
    fn into_spec(self) -> ProbeSpec {
        ProbeSpec {
            probe_type: self.probe_type,
            name: self.name,
            interval_seconds: self.interval_seconds,
            duration_seconds: self.duration_seconds,
            count: self.count,
            notifications: self.notifications,
            server_mode: self.server_mode,
            reverse_of_probe_id: self.reverse_of_probe_id,
            labels: self.labels,
            metadata: self.metadata,
            targets: self
                .targets
                .into_iter()
                .map(|target| TargetSpec {
                    host: target.host,
                    target_agent_id: target.target_agent_id,
                })
                .collect(),
        }
    }
}

/// Alta administrativa de una concesión pública.
#[derive(Deserialize)]
pub struct CreateSharePayload {
    #[serde(default)]
    pub password: Option<String>,
    /// Vigencia absoluta de la concesión, en minutos.
    pub expires_in_minutes: i64,
    #[serde(default)]
    pub allow_speedtest: bool,
}

pub struct AgentLifecycleHandler;

impl AgentLifecycleHandler {
    /**
     * Endpoint: POST /api/v1/agents
     * Alta de agente + emisión del PIN de bootstrap (transición PIN_ISSUED).
     */
    #[instrument(skip(application_state, viewer, payload), fields(workspace = payload.workspace_id))]
    pub async fn handle_create_agent(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Json(payload): Json<CreateAgentPayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        require_role(&application_state, viewer, payload.workspace_id, MemberRole::Admin).await?;

        if payload.name.trim().is_empty() {
            return Err(ApiError::Validation("agent name must not be empty".into()));
        }

        let agent = application_state
            .agent_repository
            .create_agent(
                payload.workspace_id,
                payload.name.trim(),
                &payload.description,
                &payload.location,
                &payload.labels,
                &payload.metadata,
            )
            .await?;

        let pin_plaintext = application_state
            .authenticator
            .issue_pin(payload.workspace_id, agent.id, payload.pin_expires_in_hours)
            .await?;

        Ok((StatusCode::CREATED, Json(CreateAgentEnvelope { agent, pin: pin_plaintext })))
    }

    /**
     * Endpoint: POST /api/v1/agents/:id/bootstrap
     * Intercambio PIN -> PSK. El PSK viaja exactamente una vez.
     */
    #[instrument(skip(application_state, payload), fields(agent = agent_id))]
    pub async fn handle_bootstrap(
        State(application_state): State<AppState>,
        Path(agent_id): Path<i64>,
        Json(payload): Json<BootstrapRequest>,
    ) -> Result<impl IntoResponse, ApiError> {
        if payload.agent_id != agent_id {
            return Err(ApiError::Validation("path and body agent_id diverge".into()));
        }

        let psk_plaintext = application_state
            .authenticator
            .bootstrap(payload.workspace_id, payload.agent_id, &payload.pin)
            .await?;

        Ok((StatusCode::OK, Json(BootstrapResponse { psk: psk_plaintext })))
    }

    /**
     * Endpoint: POST /api/v1/agents/:id/rotate-psk
     * Rotación administrativa: el PSK anterior muere en el mismo commit.
     */
    #[instrument(skip(application_state, viewer, payload))]
    pub async fn handle_rotate_psk(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(agent_id): Path<i64>,
        Json(payload): Json<serde_json::Value>,
    ) -> Result<impl IntoResponse, ApiError> {
        let workspace_id = payload
            .get("workspace_id")
            .and_then(|value| value.as_i64())
            .ok_or_else(|| ApiError::Validation("workspace_id required".into()))?;

        require_role(&application_state, viewer, workspace_id, MemberRole::Admin).await?;

        let psk_plaintext = application_state
            .authenticator
            .rotate_psk(workspace_id, agent_id)
            .await?;

        Ok((StatusCode::OK, Json(RotatePskEnvelope { psk: psk_plaintext })))
    }

    /**
     * Endpoint: POST /api/v1/agents/:id/heartbeat
     * Latido de vivacidad con versión opcional del binario.
     */
    #[instrument(skip(application_state, payload), fields(agent = agent_id))]
    pub async fn handle_heartbeat(
        State(application_state): State<AppState>,
        Path(agent_id): Path<i64>,
        Json(payload): Json<HeartbeatPayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        if payload.envelope.agent_id != agent_id {
            return Err(ApiError::Validation("path and body agent_id diverge".into()));
        }

        let session = application_state
            .authenticator
            .authenticate(&payload.envelope)
            .await?;

        application_state
            .agent_repository
            .bump_liveness(session.workspace_id, session.agent_id, payload.version.as_deref())
            .await?;

        Ok(StatusCode::OK)
    }

    /**
     * Endpoint: DELETE /api/v1/agents/:id
     * Retiro lógico: el agente recibirá 410 en su siguiente contacto.
     */
    #[instrument(skip(application_state, viewer))]
    pub async fn handle_retire_agent(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(agent_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        let agent = application_state.agent_repository.fetch_by_id(agent_id).await?;
        require_role(&application_state, viewer, agent.workspace_id, MemberRole::Admin).await?;

        application_state
            .agent_repository
            .soft_delete(agent.workspace_id, agent_id)
            .await?;

        Ok(StatusCode::NO_CONTENT)
    }

    /**
     * Endpoint: PUT /api/v1/agents/:id/trafficsim
     * Configura el servidor TrafficSim embebido del agente.
     */
    #[instrument(skip(application_state, viewer, server_config), fields(agent = agent_id))]
    pub async fn handle_update_trafficsim(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(agent_id): Path<i64>,
        Json(server_config): Json<TrafficSimServer>,
    ) -> Result<impl IntoResponse, ApiError> {
        let agent = application_state.agent_repository.fetch_by_id(agent_id).await?;
        require_role(&application_state, viewer, agent.workspace_id, MemberRole::Admin).await?;

        application_state
            .agent_repository
            .update_trafficsim_server(agent.workspace_id, agent_id, &server_config)
            .await?;

        Ok(StatusCode::OK)
    }

    /**
     * Endpoint: POST /api/v1/agents/:id/probes
     * Alta de una medición configurada (rol ADMIN).
     */
    #[instrument(skip(application_state, viewer, payload), fields(agent = agent_id))]
    pub async fn handle_create_probe(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(agent_id): Path<i64>,
        Json(payload): Json<ProbePayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        let agent = application_state.agent_repository.fetch_by_id(agent_id).await?;
        require_role(&application_state, viewer, agent.workspace_id, MemberRole::Admin).await?;

        let probe = application_state
            .probe_repository
            .create_probe(agent.workspace_id, agent_id, payload.into_spec())
            .await?;

        Ok((StatusCode::CREATED, Json(probe)))
    }

    /**
     * Endpoint: POST /api/v1/agents/:id/share
     * Concesión pública de sólo-lectura sobre el agente.
     */
    #[instrument(skip(application_state, viewer, payload), fields(agent = agent_id))]
    pub async fn handle_create_share(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(agent_id): Path<i64>,
        Json(payload): Json<CreateSharePayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        let agent = application_state.agent_repository.fetch_by_id(agent_id).await?;
        require_role(&application_state, viewer, agent.workspace_id, MemberRole::Admin).await?;

        if payload.expires_in_minutes <= 0 {
            return Err(ApiError::Validation("expires_in_minutes must be positive".into()));
        }

        let password_hash = match payload.password.as_deref() {
            Some(password) if !password.is_empty() => Some(
                bcrypt::hash(password, application_state.config.password_hash_cost)
                    .map_err(|fault| ApiError::Internal(format!("SHARE_HASH_FAULT: {}", fault)))?,
            ),
            _ => None,
        };

        let share: ShareLink = application_state
            .share_link_repository
            .create_share(
                agent.workspace_id,
                agent_id,
                password_hash,
                Utc::now() + chrono::Duration::minutes(payload.expires_in_minutes),
                payload.allow_speedtest,
            )
            .await?;

        info!("🔗 [SHARE_ISSUED]: Agent {} grant minted by viewer {}.", agent_id, viewer.user_id);
        Ok((StatusCode::CREATED, Json(share)))
    }
}

/// Mutaciones administrativas sobre sondas existentes.
pub struct ProbeAdministrationHandler;

impl ProbeAdministrationHandler {
    /**
     * Endpoint: PUT /api/v1/probes/:id
     * Edita parámetros y destinos. El tipo de sonda es inmutable.
     */
    #[instrument(skip(application_state, viewer, payload), fields(probe = probe_id))]
    pub async fn handle_update_probe(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(probe_id): Path<i64>,
        Json(payload): Json<ProbePayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        let probe = application_state.probe_repository.fetch_probe(probe_id).await?;
        require_role(&application_state, viewer, probe.workspace_id, MemberRole::Admin).await?;

        if payload.probe_type != probe.probe_type {
            return Err(ApiError::Validation("probe type is immutable".into()));
        }

        let updated = application_state
            .probe_repository
            .update_probe(probe_id, payload.into_spec())
            .await?;

        Ok((StatusCode::OK, Json(updated)))
    }

    /**
     * Endpoint: DELETE /api/v1/probes/:id
     * Borra la sonda, sus destinos y su baseline de ruta.
     */
    #[instrument(skip(application_state, viewer), fields(probe = probe_id))]
    pub async fn handle_delete_probe(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(probe_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        let probe = application_state.probe_repository.fetch_probe(probe_id).await?;
        require_role(&application_state, viewer, probe.workspace_id, MemberRole::Admin).await?;

        application_state.probe_repository.delete_probe(probe_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

/// Tráfico de ingesta HTTP de los agentes (C7, entrada REST).
pub struct AgentIngestHandler;

impl AgentIngestHandler {
    /**
     * Endpoint: POST /api/v1/probes/:id/data
     * Ingesta de una medición: autentica el sobre y recorre la tubería
     * completa (validar, persistir, evaluar, publicar).
     */
    #[instrument(skip(application_state, submission), fields(probe = probe_id))]
    pub async fn handle_probe_data(
        State(application_state): State<AppState>,
        Path(probe_id): Path<i64>,
        Json(submission): Json<SampleSubmission>,
    ) -> Result<impl IntoResponse, ApiError> {
        let session = application_state
            .authenticator
            .authenticate(&submission.envelope)
            .await?;

        let sample = ingestion::ingest_sample(
            &application_state,
            &session,
            probe_id,
            submission.created_at,
            submission.payload,
        )
        .await?;

        Ok((StatusCode::ACCEPTED, Json(sample)))
    }
}
