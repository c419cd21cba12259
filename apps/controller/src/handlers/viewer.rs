// [apps/controller/src/handlers/viewer.rs]
/*!
 * =================================================================
 * APARATO: VIEWER QUERY HANDLER (V5.0 - HISTORICAL RANGE)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: INVENTARIOS Y CONSULTAS HISTÓRICAS CON CUBETAS
 *
 * # Logic:
 * La agregación histórica es distinta del flujo en vivo: la cubeta se
 * elige del rango temporal apuntando a ~500 puntos (escalera de §C4).
 * MTR y SYSINFO jamás se agregan: la petición degrada a filas crudas.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::{require_role, ViewerIdentity};
use crate::state::AppState;
use axum::{
    extract::{Extension, Json, Path, Query, State},
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use netwatcher_domain_models::probe::{Probe, ProbeType};
use netwatcher_domain_models::workspace::MemberRole;
use netwatcher_infra_db::repositories::timeseries::{choose_bucket_seconds, SeriesQueryResult};
use serde::Deserialize;
use tracing::instrument;

/// Parámetros de una consulta histórica de serie temporal.
#[derive(Deserialize)]
pub struct SeriesQueryParams {
    #[serde(default)]
    pub from: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to: Option<DateTime<Utc>>,
    /// Tipo a consultar; por defecto, el tipo de la sonda.
    #[serde(rename = "type", default)]
    pub probe_type: Option<ProbeType>,
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Ventana por defecto de una consulta sin rango explícito.
const DEFAULT_QUERY_WINDOW_SECONDS: i64 = 3600;

/// Tope de filas crudas por consulta.
const DEFAULT_RAW_LIMIT: i64 = 500;

pub struct ViewerQueryHandler;

impl ViewerQueryHandler {
    /**
     * Endpoint: GET /api/v1/workspaces
     * Inventario de workspaces con membresía vigente del visor.
     */
    #[instrument(skip(application_state, viewer))]
    pub async fn handle_list_workspaces(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
    ) -> Result<impl IntoResponse, ApiError> {
        let workspaces = application_state
            .identity_repository
            .list_workspaces_for_user(viewer.user_id)
            .await?;
        Ok(Json(workspaces))
    }

    /**
     * Endpoint: GET /api/v1/workspaces/:id/agents
     */
    #[instrument(skip(application_state, viewer), fields(workspace = workspace_id))]
    pub async fn handle_list_agents(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(workspace_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        require_role(&application_state, viewer, workspace_id, MemberRole::ReadOnly).await?;

        let agents = application_state
            .agent_repository
            .list_by_workspace(workspace_id)
            .await?;
        Ok(Json(agents))
    }

    /**
     * Endpoint: GET /api/v1/agents/:id/probes
     */
    #[instrument(skip(application_state, viewer), fields(agent = agent_id))]
    pub async fn handle_list_probes(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(agent_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        let agent = application_state.agent_repository.fetch_by_id(agent_id).await?;
        require_role(&application_state, viewer, agent.workspace_id, MemberRole::ReadOnly).await?;

        let probes = application_state.probe_repository.list_by_agent(agent_id).await?;
        Ok(Json(probes))
    }

    /**
     * Endpoint: GET /api/v1/probes/:id/data?from&to&type&aggregate&limit
     * Consulta histórica con selección automática de cubeta.
     */
    #[instrument(skip(application_state, viewer, query_params), fields(probe = probe_id))]
    pub async fn handle_probe_data(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(probe_id): Path<i64>,
        Query(query_params): Query<SeriesQueryParams>,
    ) -> Result<impl IntoResponse, ApiError> {
        let probe = application_state.probe_repository.fetch_probe(probe_id).await?;
        require_role(&application_state, viewer, probe.workspace_id, MemberRole::ReadOnly).await?;

        let series = execute_series_query(&application_state, &probe, &query_params).await?;
        Ok(Json(series))
    }
}

/**
 * Ejecuta una consulta histórica sobre una sonda ya autorizada.
 *
 * Compartido entre el API autenticado y el gateway de shares: la
 * autorización es responsabilidad del que llama.
 */
pub async fn execute_series_query(
    application_state: &AppState,
    probe: &Probe,
    query_params: &SeriesQueryParams,
) -> Result<SeriesQueryResult, ApiError> {
    let to = query_params.to.unwrap_or_else(Utc::now);
    let from = query_params
        .from
        .unwrap_or_else(|| to - chrono::Duration::seconds(DEFAULT_QUERY_WINDOW_SECONDS));
    let limit = query_params.limit.unwrap_or(DEFAULT_RAW_LIMIT).clamp(1, 10_000);
    let queried_type = query_params.probe_type.unwrap_or(probe.probe_type);

    let range_seconds = (to - from).num_seconds();

    // MTR/SYSINFO jamás se agregan: la petición degrada a filas crudas.
    if query_params.aggregate && queried_type.supports_aggregation() {
        if let Some(bucket_seconds) = choose_bucket_seconds(range_seconds) {
            return match queried_type {
                ProbeType::Ping => Ok(SeriesQueryResult::PingBuckets(
                    application_state
                        .timeseries_repository
                        .aggregate_ping(probe.id, from, to, bucket_seconds)
                        .await?,
                )),
                ProbeType::TrafficSim => Ok(SeriesQueryResult::TrafficSimBuckets(
                    application_state
                        .timeseries_repository
                        .aggregate_trafficsim(probe.id, from, to, bucket_seconds)
                        .await?,
                )),
                _ => unreachable!("supports_aggregation() guards the variants"),
            };
        }
        // Rango <= 60 s: crudo aunque se haya pedido agregación.
    }

    Ok(SeriesQueryResult::Raw(
        application_state
            .timeseries_repository
            .range(probe.id, queried_type, from, to, limit)
            .await?,
    ))
}
