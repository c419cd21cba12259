// [libs/infra/db/src/repositories/mod.rs]
/*!
 * =================================================================
 * APARATO: REPOSITORY REGISTRY (V4.0 - ACCESS MATRIX)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: REGISTRO NOMINAL DE AUTORIDADES DE PERSISTENCIA
 * =================================================================
 */

pub mod identity;
pub mod agent;
pub mod pin;
pub mod probe;
pub mod alert_rule;
pub mod alert;
pub mod route_baseline;
pub mod share_link;
pub mod timeseries;

pub use identity::IdentityRepository;
pub use agent::AgentRepository;
pub use pin::PinRepository;
pub use probe::ProbeRepository;
pub use alert_rule::AlertRuleRepository;
pub use alert::AlertRepository;
pub use route_baseline::RouteBaselineRepository;
pub use share_link::ShareLinkRepository;
pub use timeseries::TimeSeriesRepository;

use crate::errors::DbError;
use chrono::{DateTime, Utc};

/// Interpreta una marca temporal RFC 3339 persistida como TEXT.
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|fault| DbError::MappingError(format!("TIMESTAMP_DRIFT [{}]: {}", raw, fault)))
}

/// Interpreta una marca temporal opcional (columna NULLable).
pub(crate) fn parse_optional_timestamp(raw: Option<String>) -> Result<Option<DateTime<Utc>>, DbError> {
    raw.map(|text| parse_timestamp(&text)).transpose()
}

/// Interpreta un mapa de etiquetas persistido como JSON TEXT.
pub(crate) fn parse_label_map(
    raw_json: &str,
) -> Result<std::collections::HashMap<String, String>, DbError> {
    if raw_json.trim().is_empty() {
        return Ok(Default::default());
    }
    serde_json::from_str(raw_json)
        .map_err(|fault| DbError::MappingError(format!("LABEL_MAP_DRIFT: {}", fault)))
}
