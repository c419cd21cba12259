// [apps/controller/src/errors.rs]
/*!
 * =================================================================
 * APARATO: API ERROR EDGE (V4.0 - SINGLE MAPPING POINT)
 * CLASIFICACIÓN: API ADAPTER LAYER (ESTRATO L4)
 * RESPONSABILIDAD: TAXONOMÍA DE FALLOS Y SU ÚNICO MAPEO A HTTP
 *
 * # Logic:
 * Los componentes declaran errores semánticos en sus fronteras; el mapeo
 * a estados HTTP ocurre exactamente una vez, aquí. 410 es terminal para
 * agentes retirados y shares expirados: los clientes bien educados dejan
 * de reintentar.
 * =================================================================
 */

use crate::services::authenticator::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use netwatcher_infra_db::DbError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    // --- VALIDACIÓN Y AUTENTICACIÓN ---
    #[error("[L4_API_FAULT]: PAYLOAD_VALIDATION -> {0}")]
    Validation(String),

    #[error("[L4_API_FAULT]: PIN_REJECTED")]
    InvalidPin,

    #[error("[L4_API_FAULT]: PIN_EXPIRED")]
    PinExpired,

    #[error("[L4_API_FAULT]: PSK_REJECTED")]
    InvalidPsk,

    #[error("[L4_API_FAULT]: SESSION_REJECTED")]
    Unauthenticated,

    #[error("[L4_API_FAULT]: SHARE_PASSWORD_REQUIRED")]
    PasswordRequired,

    #[error("[L4_API_FAULT]: SHARE_PASSWORD_REJECTED")]
    InvalidPassword,

    // --- AUTORIZACIÓN Y EXISTENCIA ---
    #[error("[L4_API_FAULT]: ROLE_FORBIDDEN")]
    Forbidden,

    #[error("[L4_API_FAULT]: RESOURCE_NOT_FOUND")]
    NotFound,

    #[error("[L4_API_FAULT]: UNIQUENESS_CONFLICT -> {0}")]
    Conflict(String),

    // --- SEÑALES TERMINALES ---
    #[error("[L4_API_FAULT]: AGENT_RETIRED")]
    AgentDeleted,

    #[error("[L4_API_FAULT]: SHARE_EXPIRED")]
    ShareExpired,

    // --- COLAPSO INTERNO ---
    #[error("[L4_API_FAULT]: INTERNAL_COLLAPSE -> {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::InvalidPin | ApiError::PinExpired => {
                StatusCode::BAD_REQUEST
            }
            ApiError::InvalidPsk
            | ApiError::Unauthenticated
            | ApiError::PasswordRequired
            | ApiError::InvalidPassword => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::AgentDeleted | ApiError::ShareExpired => StatusCode::GONE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_label(&self) -> &'static str {
        match self {
            ApiError::Validation(_) => "VALIDATION",
            ApiError::InvalidPin => "INVALID_PIN",
            ApiError::PinExpired => "PIN_EXPIRED",
            ApiError::InvalidPsk => "INVALID_PSK",
            ApiError::Unauthenticated => "UNAUTHENTICATED",
            ApiError::PasswordRequired => "PASSWORD_REQUIRED",
            ApiError::InvalidPassword => "INVALID_PASSWORD",
            ApiError::Forbidden => "FORBIDDEN",
            ApiError::NotFound => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::AgentDeleted => "AGENT_DELETED",
            ApiError::ShareExpired => "SHARE_EXPIRED",
            ApiError::Internal(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            // El detalle interno va al rastro, jamás al cliente.
            error!("💀 [API_EDGE]: {}", self);
        }

        let body = json!({
            "error": self.error_label(),
            "detail": match &self {
                ApiError::Internal(_) => "internal error".to_string(),
                other => other.to_string(),
            },
        });

        (status, Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(fault: DbError) -> Self {
        match fault {
            DbError::NotFound => ApiError::NotFound,
            DbError::AgentGone => ApiError::AgentDeleted,
            DbError::Conflict(detail) => ApiError::Conflict(detail),
            DbError::OwnershipViolation(detail) => ApiError::Conflict(detail),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(fault: AuthError) -> Self {
        match fault {
            AuthError::NotFound => ApiError::NotFound,
            AuthError::InvalidPin | AuthError::PinMismatch => ApiError::InvalidPin,
            AuthError::PinExpired => ApiError::PinExpired,
            AuthError::InvalidPsk => ApiError::InvalidPsk,
            AuthError::AgentDeleted => ApiError::AgentDeleted,
            AuthError::Storage(detail) => ApiError::Internal(detail),
        }
    }
}
