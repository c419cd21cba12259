// [apps/controller/src/middleware.rs]
/*!
 * =================================================================
 * APARATO: VIEWER AUTHENTICATION GUARD (V4.0 - SESSION CAPABILITY)
 * CLASIFICACIÓN: SECURITY STRATUM (ESTRATO L4)
 * RESPONSABILIDAD: RESOLUCIÓN DE SESIÓN E INYECCIÓN DE IDENTIDAD
 *
 * # Logic:
 * El token de sesión viaja como `Authorization: Bearer <token>` o como
 * query `?token=` (negociaciones WebSocket del panel). La emisión de
 * sesiones pertenece a la tubería de usuarios externa; aquí sólo se
 * valida el token contra la tabla de sesiones y se inyecta la identidad
 * en el flujo de la petición. Los chequeos de rol ocurren por workspace
 * en cada handler.
 * =================================================================
 */

use crate::errors::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use netwatcher_domain_models::workspace::MemberRole;
use tracing::{debug, warn};

/// Identidad de visor resuelta desde el túnel de seguridad.
#[derive(Debug, Clone, Copy)]
pub struct ViewerIdentity {
    pub user_id: i64,
}

/**
 * Guardia de visores: resuelve el token de sesión e inyecta la identidad.
 */
pub async fn viewer_guard(
    State(application_state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let bearer_token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header_value| header_value.to_str().ok())
        .and_then(|header_value| header_value.strip_prefix("Bearer "))
        .map(str::to_string);

    let query_token = request.uri().query().and_then(extract_token_from_query);

    let session_token = bearer_token.or(query_token).ok_or(ApiError::Unauthenticated)?;

    let user_id = application_state
        .identity_repository
        .resolve_session(&session_token)
        .await
        .map_err(|_| {
            warn!("❌ [SESSION_REJECTION]: Unknown or expired viewer token.");
            ApiError::Unauthenticated
        })?;

    debug!("👤 [SESSION]: Viewer {} authenticated.", user_id);
    request.extensions_mut().insert(ViewerIdentity { user_id });
    Ok(next.run(request).await)
}

/**
 * Chequeo de rol por workspace: el visor debe ser miembro con al menos el
 * rol mínimo requerido.
 *
 * # Errors:
 * - `ApiError::Forbidden`: No es miembro o su rol es insuficiente.
 */
pub async fn require_role(
    application_state: &AppState,
    viewer: ViewerIdentity,
    workspace_id: i64,
    minimum_role: MemberRole,
) -> Result<MemberRole, ApiError> {
    let effective_role = application_state
        .identity_repository
        .member_role(workspace_id, viewer.user_id)
        .await
        .map_err(|_| ApiError::Forbidden)?;

    if effective_role < minimum_role {
        warn!("⛔ [ROLE_VETO]: Viewer {} holds {:?}, needs {:?} in workspace {}.",
            viewer.user_id, effective_role, minimum_role, workspace_id);
        return Err(ApiError::Forbidden);
    }

    Ok(effective_role)
}

fn extract_token_from_query(raw_query: &str) -> Option<String> {
    raw_query.split('&').find_map(|pair| {
        pair.strip_prefix("token=").map(str::to_string)
    })
}
