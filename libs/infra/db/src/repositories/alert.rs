// [libs/infra/db/src/repositories/alert.rs]
/*!
 * =================================================================
 * APARATO: ALERT LIFECYCLE REPOSITORY (V4.0 - ROW GUARD)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: DISPARO DEDUPLICADO, RESOLUCIÓN Y RECONOCIMIENTO
 *
 * # Mathematical Proof (Lifecycle Linearization):
 * El índice único parcial (rule_id, scope_key) WHERE status='active'
 * lineariza el ciclo de vida por (regla, alcance): el INSERT con
 * ON CONFLICT DO NOTHING convierte los disparos concurrentes en
 * exactamente una alerta activa, sin candados en RAM.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::{parse_optional_timestamp, parse_timestamp};
use crate::DbClient;
use chrono::Utc;
use libsql::{params, Row};
use netwatcher_domain_models::alert::{
    Alert, AlertMetric, AlertScope, AlertSeverity, AlertStatus,
};
use tracing::{debug, info, instrument};

const ALERT_COLUMNS: &str = "id, rule_id, workspace_id, probe_id, agent_id, probe_type, \
     probe_name, probe_target, agent_name, metric, value, threshold, severity, status, \
     message, triggered_at, acknowledged_at, acknowledged_by, resolved_at";

/// Contexto denormalizado capturado en el momento del disparo.
#[derive(Debug, Clone, Default)]
pub struct TriggerContext {
    pub probe_type: Option<String>,
    pub probe_name: Option<String>,
    pub probe_target: Option<String>,
    pub agent_name: Option<String>,
}

/// Repositorio de autoridad única del ciclo de vida de alertas.
pub struct AlertRepository {
    database_client: DbClient,
}

impl AlertRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    /**
     * Intenta disparar una alerta para (regla, alcance).
     *
     * Retorna `Some(alert)` con la alerta recién creada, o `None` cuando ya
     * existe una activa para el alcance (deduplicación por guardia de fila).
     */
    #[allow(clippy::too_many_arguments)]
    #[instrument(skip(self, context, message), fields(rule = rule_id, scope = %scope.storage_key()))]
    pub async fn try_trigger(
        &self,
        rule_id: i64,
        workspace_id: i64,
        scope: AlertScope,
        metric: AlertMetric,
        observed_value: f64,
        threshold: f64,
        severity: AlertSeverity,
        message: &str,
        context: TriggerContext,
    ) -> Result<Option<Alert>, DbError> {
        let connection = self.database_client.get_connection()?;

        let (probe_id, agent_id) = match scope {
            AlertScope::Probe(probe_id) => (Some(probe_id), None),
            AlertScope::Agent(agent_id) => (None, Some(agent_id)),
        };

        let mut rows = connection
            .query(
                &format!(
                    "INSERT INTO alerts (rule_id, workspace_id, probe_id, agent_id, scope_key,
                                         probe_type, probe_name, probe_target, agent_name,
                                         metric, value, threshold, severity, status, message,
                                         triggered_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                             'active', ?14, ?15)
                     ON CONFLICT(rule_id, scope_key) WHERE status = 'active' DO NOTHING
                     RETURNING {ALERT_COLUMNS}"
                ),
                params![
                    rule_id,
                    workspace_id,
                    probe_id,
                    agent_id,
                    scope.storage_key(),
                    context.probe_type,
                    context.probe_name,
                    context.probe_target,
                    context.agent_name,
                    metric.as_str(),
                    observed_value,
                    threshold,
                    severity.as_str(),
                    message,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let alert = map_row_to_alert(row)?;
                info!("🚨 [ALERT_TRIGGER]: Alert {} raised for rule {} ({}).",
                    alert.id, rule_id, scope.storage_key());
                Ok(Some(alert))
            }
            None => {
                debug!("♻️ [ALERT_DEDUP]: Active alert already covers rule {} ({}).",
                    rule_id, scope.storage_key());
                Ok(None)
            }
        }
    }

    /// Alerta activa o reconocida vigente para (regla, alcance), si existe.
    pub async fn find_open(
        &self,
        rule_id: i64,
        scope: AlertScope,
    ) -> Result<Option<Alert>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {ALERT_COLUMNS} FROM alerts
                     WHERE rule_id = ?1 AND scope_key = ?2
                       AND status IN ('active', 'acknowledged')
                     ORDER BY triggered_at DESC LIMIT 1"
                ),
                params![rule_id, scope.storage_key()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row_to_alert(row)?)),
            None => Ok(None),
        }
    }

    /**
     * Resuelve la alerta abierta de (regla, alcance) si existe.
     * Retorna la alerta resuelta, o `None` si no había nada abierto.
     *
     * La resolución es terminal: una alerta resuelta jamás vuelve a activa.
     */
    #[instrument(skip(self), fields(rule = rule_id, scope = %scope.storage_key()))]
    pub async fn resolve_open(
        &self,
        rule_id: i64,
        scope: AlertScope,
    ) -> Result<Option<Alert>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                &format!(
                    "UPDATE alerts
                     SET status = 'resolved', resolved_at = ?3
                     WHERE rule_id = ?1 AND scope_key = ?2
                       AND status IN ('active', 'acknowledged')
                     RETURNING {ALERT_COLUMNS}"
                ),
                params![rule_id, scope.storage_key(), Utc::now().to_rfc3339()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => {
                let alert = map_row_to_alert(row)?;
                info!("✅ [ALERT_RESOLVE]: Alert {} auto-resolved on healthy value.", alert.id);
                Ok(Some(alert))
            }
            None => Ok(None),
        }
    }

    /**
     * Reconocimiento por un operador. Idempotente: reconocer una alerta ya
     * reconocida conserva el primer reconocimiento.
     *
     * # Errors:
     * - `DbError::NotFound`: La alerta no existe o ya está resuelta.
     */
    #[instrument(skip(self))]
    pub async fn acknowledge(&self, alert_id: i64, acknowledger_user_id: i64) -> Result<Alert, DbError> {
        let connection = self.database_client.get_connection()?;

        // Primer reconocimiento: transición active -> acknowledged.
        let mut rows = connection
            .query(
                &format!(
                    "UPDATE alerts
                     SET status = 'acknowledged', acknowledged_at = ?2, acknowledged_by = ?3
                     WHERE id = ?1 AND status = 'active'
                     RETURNING {ALERT_COLUMNS}"
                ),
                params![alert_id, Utc::now().to_rfc3339(), acknowledger_user_id],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            return map_row_to_alert(row);
        }

        // Idempotencia: si ya estaba reconocida, se retorna sin mutar.
        let existing = self.fetch_alert(alert_id).await?;
        match existing.status {
            AlertStatus::Acknowledged => Ok(existing),
            _ => Err(DbError::NotFound),
        }
    }

    /**
     * Resolución manual desde el panel. Terminal.
     */
    pub async fn resolve_by_id(&self, alert_id: i64) -> Result<Alert, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "UPDATE alerts
                     SET status = 'resolved', resolved_at = ?2
                     WHERE id = ?1 AND status IN ('active', 'acknowledged')
                     RETURNING {ALERT_COLUMNS}"
                ),
                params![alert_id, Utc::now().to_rfc3339()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_alert(row),
            None => Err(DbError::NotFound),
        }
    }

    pub async fn fetch_alert(&self, alert_id: i64) -> Result<Alert, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"),
                params![alert_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_alert(row),
            None => Err(DbError::NotFound),
        }
    }

    /// Inventario de alertas del workspace, más recientes primero.
    pub async fn list_alerts(
        &self,
        workspace_id: i64,
        status_filter: Option<AlertStatus>,
        limit: i64,
    ) -> Result<Vec<Alert>, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = match status_filter {
            Some(status) => {
                connection
                    .query(
                        &format!(
                            "SELECT {ALERT_COLUMNS} FROM alerts
                             WHERE workspace_id = ?1 AND status = ?2
                             ORDER BY triggered_at DESC LIMIT ?3"
                        ),
                        params![workspace_id, status.as_str(), limit],
                    )
                    .await?
            }
            None => {
                connection
                    .query(
                        &format!(
                            "SELECT {ALERT_COLUMNS} FROM alerts
                             WHERE workspace_id = ?1
                             ORDER BY triggered_at DESC LIMIT ?2"
                        ),
                        params![workspace_id, limit],
                    )
                    .await?
            }
        };

        let mut alerts = Vec::new();
        while let Some(row) = rows.next().await? {
            alerts.push(map_row_to_alert(row)?);
        }
        Ok(alerts)
    }
}

// --- ESTRATO DE MAPEO (PRIVATE SSoT) ---

fn map_row_to_alert(row: Row) -> Result<Alert, DbError> {
    let metric_raw: String = row.get(9)?;
    let severity_raw: String = row.get(12)?;
    let status_raw: String = row.get(13)?;

    Ok(Alert {
        id: row.get(0)?,
        rule_id: row.get(1)?,
        workspace_id: row.get(2)?,
        probe_id: row.get::<Option<i64>>(3)?,
        agent_id: row.get::<Option<i64>>(4)?,
        probe_type: row.get::<Option<String>>(5)?,
        probe_name: row.get::<Option<String>>(6)?,
        probe_target: row.get::<Option<String>>(7)?,
        agent_name: row.get::<Option<String>>(8)?,
        metric: AlertMetric::parse(&metric_raw)
            .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_METRIC: {}", metric_raw)))?,
        value: row.get(10)?,
        threshold: row.get(11)?,
        severity: AlertSeverity::parse(&severity_raw)
            .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_SEVERITY: {}", severity_raw)))?,
        status: AlertStatus::parse(&status_raw)
            .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_STATUS: {}", status_raw)))?,
        message: row.get(14)?,
        triggered_at: parse_timestamp(&row.get::<String>(15)?)?,
        acknowledged_at: parse_optional_timestamp(row.get::<Option<String>>(16)?)?,
        acknowledged_by: row.get::<Option<i64>>(17)?,
        resolved_at: parse_optional_timestamp(row.get::<Option<String>>(18)?)?,
    })
}
