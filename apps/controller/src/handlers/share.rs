// [apps/controller/src/handlers/share.rs]
/*!
 * =================================================================
 * APARATO: PUBLIC SHARE GATEWAY (V4.2 - TOKENIZED SCOPE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4/C9)
 * RESPONSABILIDAD: LECTURA PÚBLICA ACOTADA A UN AGENTE POR TOKEN
 *
 * # Logic:
 * El token concede lectura sobre UN agente. La contraseña (si existe) se
 * verifica con bcrypt en CADA petición: el gateway no mantiene sesión
 * del lado del servidor. La expiración es absoluta y produce una señal
 * distinta (410) de *not found* (404). El WebSocket de share reutiliza
 * el bucle del hub con el principal acotado al agente concedido.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::handlers::stream::{drive_subscription_link, StreamPrincipal};
use crate::handlers::viewer::{execute_series_query, SeriesQueryParams};
use crate::middleware::{require_role, ViewerIdentity};
use crate::state::AppState;
use axum::{
    extract::{
        ws::WebSocketUpgrade,
        Extension, Json, Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use netwatcher_domain_models::share::{ShareInfo, ShareLink};
use netwatcher_domain_models::workspace::MemberRole;
use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

/// Cabecera alternativa para la contraseña del share.
const SHARE_PASSWORD_HEADER: &str = "x-share-password";

// Los parámetros de serie van desplegados (sin flatten): el deserializador
// de query strings no soporta estructuras anidadas.
#[derive(Deserialize)]
pub struct ShareAccessQuery {
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub from: Option<chrono::DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<chrono::DateTime<Utc>>,
    #[serde(rename = "type", default)]
    pub probe_type: Option<netwatcher_domain_models::probe::ProbeType>,
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl ShareAccessQuery {
    fn series_params(&self) -> SeriesQueryParams {
        SeriesQueryParams {
            from: self.from,
            to: self.to,
            probe_type: self.probe_type,
            aggregate: self.aggregate,
            limit: self.limit,
        }
    }
}

#[derive(Serialize)]
pub struct ShareAgentEnvelope {
    pub agent: netwatcher_domain_models::agent::Agent,
    pub probes: Vec<netwatcher_domain_models::probe::Probe>,
}

#[derive(Serialize)]
pub struct AgentNameEnvelope {
    pub id: i64,
    pub name: String,
}

pub struct ShareGatewayHandler;

impl ShareGatewayHandler {
    /**
     * Endpoint: GET /share/:token/info
     * Metadatos de la concesión sin exigir contraseña.
     */
    #[instrument(skip(application_state, token))]
    pub async fn handle_share_info(
        State(application_state): State<AppState>,
        Path(token): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        let share = application_state.share_link_repository.fetch_by_token(&token).await?;
        let now = Utc::now();

        Ok(Json(ShareInfo {
            has_password: share.has_password(),
            expired: share.is_expired(now),
            expires_at: share.expires_at,
            allow_speedtest: share.allow_speedtest,
        }))
    }

    /**
     * Endpoint: GET /share/:token/agent?password=
     * Agente + inventario de sondas bajo el alcance del token.
     */
    #[instrument(skip(application_state, token, headers, access_query))]
    pub async fn handle_share_agent(
        State(application_state): State<AppState>,
        Path(token): Path<String>,
        headers: HeaderMap,
        Query(access_query): Query<ShareAccessQuery>,
    ) -> Result<impl IntoResponse, ApiError> {
        let share = resolve_authorized_share(
            &application_state,
            &token,
            access_query.password.as_deref(),
            &headers,
        )
        .await?;

        let agent = application_state.agent_repository.fetch_by_id(share.agent_id).await?;
        let probes = application_state.probe_repository.list_by_agent(share.agent_id).await?;

        Ok(Json(ShareAgentEnvelope { agent, probes }))
    }

    /**
     * Endpoint: GET /share/:token/probe/:id/data?from&to&type&aggregate&limit
     * Consulta histórica acotada a las sondas del agente concedido.
     */
    #[instrument(skip(application_state, headers, access_query), fields(probe = probe_id))]
    pub async fn handle_share_probe_data(
        State(application_state): State<AppState>,
        Path((token, probe_id)): Path<(String, i64)>,
        headers: HeaderMap,
        Query(access_query): Query<ShareAccessQuery>,
    ) -> Result<impl IntoResponse, ApiError> {
        let share = resolve_authorized_share(
            &application_state,
            &token,
            access_query.password.as_deref(),
            &headers,
        )
        .await?;

        let probe = application_state.probe_repository.fetch_probe(probe_id).await?;
        if probe.agent_id != share.agent_id {
            warn!("⛔ [SHARE_SCOPE_VETO]: Probe {} outside grant for agent {}.", probe_id, share.agent_id);
            return Err(ApiError::Forbidden);
        }

        let series =
            execute_series_query(&application_state, &probe, &access_query.series_params()).await?;
        Ok(Json(series))
    }

    /**
     * Endpoint: GET /share/:token/agent-name/:id
     * Resolución de nombres para destinos de sondas AGENT del concedido.
     */
    #[instrument(skip(application_state, headers, access_query), fields(target = target_agent_id))]
    pub async fn handle_share_agent_name(
        State(application_state): State<AppState>,
        Path((token, target_agent_id)): Path<(String, i64)>,
        headers: HeaderMap,
        Query(access_query): Query<ShareAccessQuery>,
    ) -> Result<impl IntoResponse, ApiError> {
        let share = resolve_authorized_share(
            &application_state,
            &token,
            access_query.password.as_deref(),
            &headers,
        )
        .await?;

        // El nombre sólo se revela si el agente es destino de alguna sonda
        // del agente concedido (pares AGENT forward/reverse).
        let probes = application_state.probe_repository.list_by_agent(share.agent_id).await?;
        let is_referenced_target = probes.iter().any(|probe| {
            probe
                .targets
                .iter()
                .any(|target| target.target_agent_id == Some(target_agent_id))
        });

        if !is_referenced_target {
            return Err(ApiError::Forbidden);
        }

        let target_agent = application_state.agent_repository.fetch_by_id(target_agent_id).await?;
        Ok(Json(AgentNameEnvelope { id: target_agent.id, name: target_agent.name }))
    }

    /**
     * Endpoint: GET /share/:token/ws?password=
     * Suscripción en vivo equivalente a C8, acotada al agente concedido.
     */
    #[instrument(skip(websocket_upgrade, application_state, headers, access_query))]
    pub async fn establish_share_uplink(
        websocket_upgrade: WebSocketUpgrade,
        State(application_state): State<AppState>,
        Path(token): Path<String>,
        headers: HeaderMap,
        Query(access_query): Query<ShareAccessQuery>,
    ) -> Result<impl IntoResponse, ApiError> {
        let share = resolve_authorized_share(
            &application_state,
            &token,
            access_query.password.as_deref(),
            &headers,
        )
        .await?;

        Ok(websocket_upgrade.on_upgrade(move |socket| {
            drive_subscription_link(socket, application_state, StreamPrincipal::Share(share))
        }))
    }

    /**
     * Endpoint: DELETE /share/:token (administrativo, fuera del gateway
     * público: exige sesión de visor con rol ADMIN).
     */
    #[instrument(skip(application_state, viewer))]
    pub async fn handle_revoke_share(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(token): Path<String>,
    ) -> Result<impl IntoResponse, ApiError> {
        let share = application_state.share_link_repository.fetch_by_token(&token).await?;
        require_role(&application_state, viewer, share.workspace_id, MemberRole::Admin).await?;

        application_state.share_link_repository.revoke(&token).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}

/**
 * Resuelve un token a su concesión verificando expiración y contraseña.
 *
 * # Errors:
 * - `ApiError::NotFound`: Token desconocido.
 * - `ApiError::ShareExpired`: Expiración absoluta alcanzada (410).
 * - `ApiError::PasswordRequired` / `ApiError::InvalidPassword`: 401.
 */
pub async fn resolve_authorized_share(
    application_state: &AppState,
    token: &str,
    query_password: Option<&str>,
    headers: &HeaderMap,
) -> Result<ShareLink, ApiError> {
    let share = application_state.share_link_repository.fetch_by_token(token).await?;

    if share.is_expired(Utc::now()) {
        return Err(ApiError::ShareExpired);
    }

    if let Some(password_hash) = &share.password_hash {
        let provided_password = query_password
            .map(str::to_string)
            .or_else(|| {
                headers
                    .get(SHARE_PASSWORD_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_string)
            })
            .ok_or(ApiError::PasswordRequired)?;

        let verified = bcrypt::verify(&provided_password, password_hash)
            .map_err(|fault| ApiError::Internal(format!("SHARE_VERIFY_FAULT: {}", fault)))?;

        if !verified {
            return Err(ApiError::InvalidPassword);
        }
    }

    Ok(share)
}
