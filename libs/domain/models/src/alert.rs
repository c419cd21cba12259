// [libs/domain/models/src/alert.rs]
/*!
 * =================================================================
 * APARATO: ALERT RULE CONTRACTS (V3.0 - COMPOUND CLAUSES)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA DE REGLAS, ALERTAS Y CUERPO DE WEBHOOK
 *
 * # Logic:
 * Una regla tiene una cláusula primaria (métrica, operador, umbral) y una
 * secundaria opcional combinada con AND/OR. Las alertas disparadas se
 * denormalizan (tipo/nombre/destino de sonda, nombre de agente) para que la
 * edición posterior de la regla no reescriba la historia.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typeshare::typeshare;

/// Métricas evaluables sobre payloads heterogéneos o ticks de vivacidad.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlertMetric {
    PacketLoss,
    Latency,
    Jitter,
    Offline,
    EndHopLoss,
    EndHopLatency,
    RouteChange,
    WorstHopLoss,
    CpuUsage,
    MemoryUsage,
}

impl AlertMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertMetric::PacketLoss => "packet_loss",
            AlertMetric::Latency => "latency",
            AlertMetric::Jitter => "jitter",
            AlertMetric::Offline => "offline",
            AlertMetric::EndHopLoss => "end_hop_loss",
            AlertMetric::EndHopLatency => "end_hop_latency",
            AlertMetric::RouteChange => "route_change",
            AlertMetric::WorstHopLoss => "worst_hop_loss",
            AlertMetric::CpuUsage => "cpu_usage",
            AlertMetric::MemoryUsage => "memory_usage",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "packet_loss" => Some(AlertMetric::PacketLoss),
            "latency" => Some(AlertMetric::Latency),
            "jitter" => Some(AlertMetric::Jitter),
            "offline" => Some(AlertMetric::Offline),
            "end_hop_loss" => Some(AlertMetric::EndHopLoss),
            "end_hop_latency" => Some(AlertMetric::EndHopLatency),
            "route_change" => Some(AlertMetric::RouteChange),
            "worst_hop_loss" => Some(AlertMetric::WorstHopLoss),
            "cpu_usage" => Some(AlertMetric::CpuUsage),
            "memory_usage" => Some(AlertMetric::MemoryUsage),
            _ => None,
        }
    }
}

/// Operadores de comparación con semántica de flotante estricta.
///
/// `Eq` compara con igualdad exacta (`a == b`); no se aplica redondeo ni
/// tolerancia. Política documentada del plano de control.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Gt => "gt",
            CompareOp::Gte => "gte",
            CompareOp::Lt => "lt",
            CompareOp::Lte => "lte",
            CompareOp::Eq => "eq",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "gt" => Some(CompareOp::Gt),
            "gte" => Some(CompareOp::Gte),
            "lt" => Some(CompareOp::Lt),
            "lte" => Some(CompareOp::Lte),
            "eq" => Some(CompareOp::Eq),
            _ => None,
        }
    }
}

/// Conector lógico entre la cláusula primaria y la secundaria.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "AND" => Some(LogicalOp::And),
            "OR" => Some(LogicalOp::Or),
            _ => None,
        }
    }
}

#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "warning" => Some(AlertSeverity::Warning),
            "critical" => Some(AlertSeverity::Critical),
            _ => None,
        }
    }
}

/// Una cláusula (métrica, operador, umbral).
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RuleClause {
    pub metric: AlertMetric,
    pub op: CompareOp,
    pub threshold: f64,
}

/// Especificación de disparo de alertas.
///
/// Alcance: workspace completo cuando `probe_id` y `agent_id` son nulos;
/// una sonda o un agente concretos en caso contrario.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    #[serde(rename = "probe_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub probe_id: Option<i64>,

    #[serde(rename = "agent_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub agent_id: Option<i64>,

    pub primary_clause: RuleClause,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_clause: Option<RuleClause>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logical_op: Option<LogicalOp>,

    pub severity: AlertSeverity,

    /// El canal del panel es implícito (el hub observa escrituras de alertas).
    pub notify_email: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook_url: Option<String>,

    /// Secreto HMAC para firmar cuerpos de webhook. Jamás viaja al panel.
    #[serde(skip_serializing)]
    pub webhook_secret: Option<String>,

    pub enabled: bool,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
}

#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Resolved,
}

impl AlertStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertStatus::Active => "active",
            AlertStatus::Acknowledged => "acknowledged",
            AlertStatus::Resolved => "resolved",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(AlertStatus::Active),
            "acknowledged" => Some(AlertStatus::Acknowledged),
            "resolved" => Some(AlertStatus::Resolved),
            _ => None,
        }
    }
}

/// Tupla de deduplicación: (regla, sonda) para reglas de sonda,
/// (regla, agente) para reglas offline.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase", tag = "kind", content = "id")]
pub enum AlertScope {
    Probe(i64),
    Agent(i64),
}

impl AlertScope {
    /// Llave textual usada por el guardia de unicidad parcial en la tabla de alertas.
    pub fn storage_key(&self) -> String {
        match self {
            AlertScope::Probe(probe_id) => format!("probe:{}", probe_id),
            AlertScope::Agent(agent_id) => format!("agent:{}", agent_id),
        }
    }
}

/// Instancia disparada de una regla, denormalizada para exactitud histórica.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "rule_identifier")]
    #[typeshare(serialized_as = "number")]
    pub rule_id: i64,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    #[serde(rename = "probe_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub probe_id: Option<i64>,

    #[serde(rename = "agent_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub agent_id: Option<i64>,

    // --- CONTEXTO DENORMALIZADO EN EL MOMENTO DEL DISPARO ---
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,

    pub metric: AlertMetric,
    pub value: f64,
    pub threshold: f64,
    pub severity: AlertSeverity,
    pub status: AlertStatus,
    pub message: String,

    #[typeshare(serialized_as = "String")]
    pub triggered_at: DateTime<Utc>,

    #[typeshare(serialized_as = "String")]
    pub acknowledged_at: Option<DateTime<Utc>>,

    #[serde(rename = "acknowledged_by_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub acknowledged_by: Option<i64>,

    #[typeshare(serialized_as = "String")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Alcance de deduplicación de esta alerta.
    pub fn scope(&self) -> Option<AlertScope> {
        match (self.probe_id, self.agent_id, self.metric) {
            (_, Some(agent_id), AlertMetric::Offline) => Some(AlertScope::Agent(agent_id)),
            (Some(probe_id), _, _) => Some(AlertScope::Probe(probe_id)),
            (None, Some(agent_id), _) => Some(AlertScope::Agent(agent_id)),
            _ => None,
        }
    }
}

/// Cuerpo JSON del POST de webhook, firmado con HMAC-SHA256 cuando la regla
/// lleva secreto (`X-NetWatcher-Signature: sha256=<hex>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAlertBody {
    pub rule_id: i64,
    pub alert_id: i64,
    pub workspace_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<i64>,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub triggered_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
}

impl WebhookAlertBody {
    /// Construye el cuerpo de webhook a partir de una alerta disparada.
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            rule_id: alert.rule_id,
            alert_id: alert.id,
            workspace_id: alert.workspace_id,
            probe_id: alert.probe_id,
            agent_id: alert.agent_id,
            metric: alert.metric.as_str().to_string(),
            value: alert.value,
            threshold: alert.threshold,
            severity: alert.severity.as_str().to_string(),
            status: alert.status.as_str().to_string(),
            message: alert.message.clone(),
            triggered_at: alert.triggered_at,
            probe_type: alert.probe_type.clone(),
            probe_name: alert.probe_name.clone(),
            probe_target: alert.probe_target.clone(),
            agent_name: alert.agent_name.clone(),
        }
    }
}
