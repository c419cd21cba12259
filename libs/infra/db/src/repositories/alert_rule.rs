// [libs/infra/db/src/repositories/alert_rule.rs]
/*!
 * =================================================================
 * APARATO: ALERT RULE REPOSITORY (V3.1 - SCOPE RESOLUTION)
 * CLASIFICACIÓN: INFRASTRUCTURE ADAPTER (ESTRATO L3)
 * RESPONSABILIDAD: ESPECIFICACIONES DE DISPARO Y SU RESOLUCIÓN DE ALCANCE
 *
 * # Logic:
 * Para una muestra de la sonda P en el workspace W aplican las reglas
 * habilitadas con `probe_id = P OR probe_id IS NULL` (default del
 * workspace). La edición de una regla JAMÁS reescribe los campos
 * denormalizados de alertas ya disparadas.
 * =================================================================
 */

use crate::errors::DbError;
use crate::repositories::parse_timestamp;
use crate::DbClient;
use chrono::Utc;
use libsql::{params, Row};
use netwatcher_domain_models::alert::{
    AlertMetric, AlertRule, AlertSeverity, CompareOp, LogicalOp, RuleClause,
};
use tracing::{info, instrument};

const RULE_COLUMNS: &str = "id, workspace_id, probe_id, agent_id, metric, op, threshold, \
     secondary_metric, secondary_op, secondary_threshold, logical_op, severity, \
     notify_email, webhook_url, webhook_secret, enabled, created_at";

/// Parámetros de alta/edición de una regla.
#[derive(Debug, Clone)]
pub struct AlertRuleSpec {
    pub probe_id: Option<i64>,
    pub agent_id: Option<i64>,
    pub primary_clause: RuleClause,
    pub secondary_clause: Option<RuleClause>,
    pub logical_op: Option<LogicalOp>,
    pub severity: AlertSeverity,
    pub notify_email: bool,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub enabled: bool,
}

/// Repositorio de autoridad única para las especificaciones de disparo.
pub struct AlertRuleRepository {
    database_client: DbClient,
}

impl AlertRuleRepository {
    pub fn new(client: DbClient) -> Self {
        Self { database_client: client }
    }

    #[instrument(skip(self, spec), fields(workspace = workspace_id, metric = spec.primary_clause.metric.as_str()))]
    pub async fn create_rule(
        &self,
        workspace_id: i64,
        spec: AlertRuleSpec,
    ) -> Result<AlertRule, DbError> {
        let connection = self.database_client.get_connection()?;

        let mut rows = connection
            .query(
                &format!(
                    "INSERT INTO alert_rules (workspace_id, probe_id, agent_id, metric, op,
                                              threshold, secondary_metric, secondary_op,
                                              secondary_threshold, logical_op, severity,
                                              notify_email, webhook_url, webhook_secret,
                                              enabled, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
                     RETURNING {RULE_COLUMNS}"
                ),
                params![
                    workspace_id,
                    spec.probe_id,
                    spec.agent_id,
                    spec.primary_clause.metric.as_str(),
                    spec.primary_clause.op.as_str(),
                    spec.primary_clause.threshold,
                    spec.secondary_clause.map(|clause| clause.metric.as_str().to_string()),
                    spec.secondary_clause.map(|clause| clause.op.as_str().to_string()),
                    spec.secondary_clause.map(|clause| clause.threshold),
                    spec.logical_op.map(|op| op.as_str().to_string()),
                    spec.severity.as_str(),
                    spec.notify_email as i64,
                    spec.webhook_url.clone(),
                    spec.webhook_secret.clone(),
                    spec.enabled as i64,
                    Utc::now().to_rfc3339()
                ],
            )
            .await?;

        let rule = match rows.next().await? {
            Some(row) => map_row_to_rule(row)?,
            None => return Err(DbError::TransactionError),
        };

        info!("📐 [RULE_FORGE]: Rule {} ({}) armed in workspace {}.",
            rule.id, rule.primary_clause.metric.as_str(), workspace_id);
        Ok(rule)
    }

    pub async fn fetch_rule(&self, rule_id: i64) -> Result<AlertRule, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!("SELECT {RULE_COLUMNS} FROM alert_rules WHERE id = ?1"),
                params![rule_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => map_row_to_rule(row),
            None => Err(DbError::NotFound),
        }
    }

    /**
     * Reglas habilitadas aplicables a una muestra de la sonda dada:
     * específicas de la sonda más los defaults del workspace.
     */
    pub async fn applicable_rules(
        &self,
        workspace_id: i64,
        probe_id: i64,
    ) -> Result<Vec<AlertRule>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM alert_rules
                     WHERE workspace_id = ?1 AND enabled = 1
                       AND (probe_id = ?2 OR probe_id IS NULL)
                     ORDER BY id ASC"
                ),
                params![workspace_id, probe_id],
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(map_row_to_rule(row)?);
        }
        Ok(rules)
    }

    /// Reglas offline habilitadas de todo el plano de control, para el
    /// barrido periódico de vivacidad. Vienen ordenadas por workspace.
    pub async fn enabled_offline_rules(&self) -> Result<Vec<AlertRule>, DbError> {
        let connection = self.database_client.get_connection()?;
        let mut rows = connection
            .query(
                &format!(
                    "SELECT {RULE_COLUMNS} FROM alert_rules
                     WHERE enabled = 1 AND metric = 'offline'
                     ORDER BY workspace_id ASC, id ASC"
                ),
                (),
            )
            .await?;

        let mut rules = Vec::new();
        while let Some(row) = rows.next().await? {
            rules.push(map_row_to_rule(row)?);
        }
        Ok(rules)
    }

    /**
     * Edita una regla. Las alertas ya disparadas conservan su contexto
     * denormalizado intacto.
     */
    #[instrument(skip(self, spec))]
    pub async fn update_rule(&self, rule_id: i64, spec: AlertRuleSpec) -> Result<AlertRule, DbError> {
        let connection = self.database_client.get_connection()?;
        let updated = connection
            .execute(
                "UPDATE alert_rules
                 SET probe_id = ?2, agent_id = ?3, metric = ?4, op = ?5, threshold = ?6,
                     secondary_metric = ?7, secondary_op = ?8, secondary_threshold = ?9,
                     logical_op = ?10, severity = ?11, notify_email = ?12,
                     webhook_url = ?13, webhook_secret = ?14, enabled = ?15
                 WHERE id = ?1",
                params![
                    rule_id,
                    spec.probe_id,
                    spec.agent_id,
                    spec.primary_clause.metric.as_str(),
                    spec.primary_clause.op.as_str(),
                    spec.primary_clause.threshold,
                    spec.secondary_clause.map(|clause| clause.metric.as_str().to_string()),
                    spec.secondary_clause.map(|clause| clause.op.as_str().to_string()),
                    spec.secondary_clause.map(|clause| clause.threshold),
                    spec.logical_op.map(|op| op.as_str().to_string()),
                    spec.severity.as_str(),
                    spec.notify_email as i64,
                    spec.webhook_url.clone(),
                    spec.webhook_secret.clone(),
                    spec.enabled as i64
                ],
            )
            .await?;

        if updated == 0 {
            return Err(DbError::NotFound);
        }
        self.fetch_rule(rule_id).await
    }

    pub async fn delete_rule(&self, rule_id: i64) -> Result<(), DbError> {
        let connection = self.database_client.get_connection()?;
        let deleted = connection
            .execute("DELETE FROM alert_rules WHERE id = ?1", params![rule_id])
            .await?;

        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

// --- ESTRATO DE MAPEO (PRIVATE SSoT) ---

fn map_row_to_rule(row: Row) -> Result<AlertRule, DbError> {
    let metric_raw: String = row.get(4)?;
    let op_raw: String = row.get(5)?;

    let primary_clause = RuleClause {
        metric: AlertMetric::parse(&metric_raw)
            .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_METRIC: {}", metric_raw)))?,
        op: CompareOp::parse(&op_raw)
            .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_OPERATOR: {}", op_raw)))?,
        threshold: row.get(6)?,
    };

    let secondary_clause = match (
        row.get::<Option<String>>(7)?,
        row.get::<Option<String>>(8)?,
        row.get::<Option<f64>>(9)?,
    ) {
        (Some(metric_raw), Some(op_raw), Some(threshold)) => Some(RuleClause {
            metric: AlertMetric::parse(&metric_raw)
                .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_METRIC: {}", metric_raw)))?,
            op: CompareOp::parse(&op_raw)
                .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_OPERATOR: {}", op_raw)))?,
            threshold,
        }),
        _ => None,
    };

    let logical_op = row
        .get::<Option<String>>(10)?
        .and_then(|raw| LogicalOp::parse(&raw));

    let severity_raw: String = row.get(11)?;

    Ok(AlertRule {
        id: row.get(0)?,
        workspace_id: row.get(1)?,
        probe_id: row.get::<Option<i64>>(2)?,
        agent_id: row.get::<Option<i64>>(3)?,
        primary_clause,
        secondary_clause,
        logical_op,
        severity: AlertSeverity::parse(&severity_raw)
            .ok_or_else(|| DbError::MappingError(format!("UNKNOWN_SEVERITY: {}", severity_raw)))?,
        notify_email: row.get::<i64>(12)? != 0,
        webhook_url: row.get::<Option<String>>(13)?,
        webhook_secret: row.get::<Option<String>>(14)?,
        enabled: row.get::<i64>(15)? != 0,
        created_at: parse_timestamp(&row.get::<String>(16)?)?,
    })
}
