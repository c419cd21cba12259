// [apps/controller/src/handlers/alerts.rs]
/*!
 * =================================================================
 * APARATO: ALERT API HANDLER (V4.1 - LIFECYCLE ACTIONS)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: INVENTARIO, RECONOCIMIENTO Y RESOLUCIÓN MANUAL
 *
 * # Logic:
 * El reconocimiento es idempotente y registra al operador; la resolución
 * es terminal. La edición de reglas conserva intactos los campos
 * denormalizados de las alertas ya disparadas.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::middleware::{require_role, ViewerIdentity};
use crate::state::AppState;
use axum::{
    extract::{Extension, Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use netwatcher_domain_models::alert::{
    AlertMetric, AlertSeverity, AlertStatus, CompareOp, LogicalOp, RuleClause,
};
use netwatcher_domain_models::workspace::MemberRole;
use netwatcher_infra_db::repositories::alert_rule::AlertRuleSpec;
use serde::Deserialize;
use tracing::instrument;

#[derive(Deserialize)]
pub struct AlertListQuery {
    pub workspace_id: i64,
    #[serde(default)]
    pub status: Option<AlertStatus>,
    #[serde(default)]
    pub limit: Option<i64>,
}

/// Cláusula textual de una regla en el API (se valida al parsear).
#[derive(Deserialize)]
pub struct ClausePayload {
    pub metric: String,
    pub op: String,
    pub threshold: f64,
}

impl ClausePayload {
    fn parse(&self) -> Result<RuleClause, ApiError> {
        Ok(RuleClause {
            metric: AlertMetric::parse(&self.metric)
                .ok_or_else(|| ApiError::Validation(format!("unknown metric '{}'", self.metric)))?,
            op: CompareOp::parse(&self.op)
                .ok_or_else(|| ApiError::Validation(format!("unknown operator '{}'", self.op)))?,
            threshold: self.threshold,
        })
    }
}

#[derive(Deserialize)]
pub struct AlertRulePayload {
    pub workspace_id: i64,
    #[serde(default)]
    pub probe_id: Option<i64>,
    #[serde(default)]
    pub agent_id: Option<i64>,
    pub primary_clause: ClausePayload,
    #[serde(default)]
    pub secondary_clause: Option<ClausePayload>,
    #[serde(default)]
    pub logical_op: Option<String>,
    pub severity: String,
    #[serde(default)]
    pub notify_email: bool,
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl AlertRulePayload {
    fn into_spec(self) -> Result<AlertRuleSpec, ApiError> {
        let secondary_clause = self
            .secondary_clause
            .as_ref()
            .map(ClausePayload::parse)
            .transpose()?;

        let logical_op = self
            .logical_op
            .as_deref()
            .map(|raw| {
                LogicalOp::parse(raw)
                    .ok_or_else(|| ApiError::Validation(format!("unknown logical operator '{}'", raw)))
            })
            .transpose()?;

        // Cláusula secundaria declarada sin conector (o viceversa) es ambigua.
        if secondary_clause.is_some() != logical_op.is_some() {
            return Err(ApiError::Validation(
                "secondary_clause and logical_op must be provided together".into(),
            ));
        }

        Ok(AlertRuleSpec {
            probe_id: self.probe_id,
            agent_id: self.agent_id,
            primary_clause: self.primary_clause.parse()?,
            secondary_clause,
            logical_op,
            severity: AlertSeverity::parse(&self.severity)
                .ok_or_else(|| ApiError::Validation(format!("unknown severity '{}'", self.severity)))?,
            notify_email: self.notify_email,
            webhook_url: self.webhook_url,
            webhook_secret: self.webhook_secret,
            enabled: self.enabled,
        })
    }
}

pub struct AlertHandler;

impl AlertHandler {
    /**
     * Endpoint: GET /api/v1/alerts?workspace_id&status&limit
     */
    #[instrument(skip(application_state, viewer, list_query), fields(workspace = list_query.workspace_id))]
    pub async fn handle_list_alerts(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Query(list_query): Query<AlertListQuery>,
    ) -> Result<impl IntoResponse, ApiError> {
        require_role(&application_state, viewer, list_query.workspace_id, MemberRole::ReadOnly).await?;

        let alerts = application_state
            .alert_repository
            .list_alerts(
                list_query.workspace_id,
                list_query.status,
                list_query.limit.unwrap_or(100).clamp(1, 1_000),
            )
            .await?;
        Ok(Json(alerts))
    }

    /**
     * Endpoint: POST /api/v1/alerts/:id/ack
     * Acción de operador: active -> acknowledged. Idempotente.
     */
    #[instrument(skip(application_state, viewer), fields(alert = alert_id))]
    pub async fn handle_acknowledge(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(alert_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        let alert = application_state.alert_repository.fetch_alert(alert_id).await?;
        require_role(&application_state, viewer, alert.workspace_id, MemberRole::ReadWrite).await?;

        let acknowledged = application_state
            .alert_repository
            .acknowledge(alert_id, viewer.user_id)
            .await?;

        application_state
            .subscription_hub
            .publish_alert(acknowledged.workspace_id, acknowledged.agent_id, &acknowledged);

        Ok(Json(acknowledged))
    }

    /**
     * Endpoint: POST /api/v1/alerts/:id/resolve
     * Resolución manual. Terminal.
     */
    #[instrument(skip(application_state, viewer), fields(alert = alert_id))]
    pub async fn handle_resolve(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(alert_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        let alert = application_state.alert_repository.fetch_alert(alert_id).await?;
        require_role(&application_state, viewer, alert.workspace_id, MemberRole::ReadWrite).await?;

        let resolved = application_state.alert_repository.resolve_by_id(alert_id).await?;

        application_state
            .subscription_hub
            .publish_alert(resolved.workspace_id, resolved.agent_id, &resolved);

        Ok(Json(resolved))
    }
}

pub struct AlertRuleAdministrationHandler;

impl AlertRuleAdministrationHandler {
    /**
     * Endpoint: POST /api/v1/alert-rules
     */
    #[instrument(skip(application_state, viewer, payload), fields(workspace = payload.workspace_id))]
    pub async fn handle_create_rule(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Json(payload): Json<AlertRulePayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        require_role(&application_state, viewer, payload.workspace_id, MemberRole::ReadWrite).await?;

        let workspace_id = payload.workspace_id;
        let rule = application_state
            .alert_rule_repository
            .create_rule(workspace_id, payload.into_spec()?)
            .await?;

        Ok((StatusCode::CREATED, Json(rule)))
    }

    /**
     * Endpoint: PUT /api/v1/alert-rules/:id
     * Las alertas ya disparadas conservan su contexto denormalizado.
     */
    #[instrument(skip(application_state, viewer, payload), fields(rule = rule_id))]
    pub async fn handle_update_rule(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(rule_id): Path<i64>,
        Json(payload): Json<AlertRulePayload>,
    ) -> Result<impl IntoResponse, ApiError> {
        let existing = application_state.alert_rule_repository.fetch_rule(rule_id).await?;
        require_role(&application_state, viewer, existing.workspace_id, MemberRole::ReadWrite).await?;

        if payload.workspace_id != existing.workspace_id {
            return Err(ApiError::Validation("rules cannot change workspace".into()));
        }

        let updated = application_state
            .alert_rule_repository
            .update_rule(rule_id, payload.into_spec()?)
            .await?;

        Ok(Json(updated))
    }

    /**
     * Endpoint: DELETE /api/v1/alert-rules/:id
     */
    #[instrument(skip(application_state, viewer), fields(rule = rule_id))]
    pub async fn handle_delete_rule(
        State(application_state): State<AppState>,
        Extension(viewer): Extension<ViewerIdentity>,
        Path(rule_id): Path<i64>,
    ) -> Result<impl IntoResponse, ApiError> {
        let existing = application_state.alert_rule_repository.fetch_rule(rule_id).await?;
        require_role(&application_state, viewer, existing.workspace_id, MemberRole::ReadWrite).await?;

        application_state.alert_rule_repository.delete_rule(rule_id).await?;
        Ok(StatusCode::NO_CONTENT)
    }
}
