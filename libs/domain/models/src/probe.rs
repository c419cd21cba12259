// [libs/domain/models/src/probe.rs]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use typeshare::typeshare;

/// Tipos de medición soportados por el plano de control.
#[typeshare]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeType {
    Ping,
    Mtr,
    #[serde(rename = "TRAFFICSIM")]
    TrafficSim,
    /// Sonda bidireccional contra otro agente (par forward/reverse).
    Agent,
    #[serde(rename = "NETINFO")]
    NetInfo,
    #[serde(rename = "SYSINFO")]
    SysInfo,
    #[serde(rename = "SPEEDTEST")]
    SpeedTest,
    #[serde(rename = "SPEEDTEST_SERVERS")]
    SpeedTestServers,
}

impl ProbeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeType::Ping => "PING",
            ProbeType::Mtr => "MTR",
            ProbeType::TrafficSim => "TRAFFICSIM",
            ProbeType::Agent => "AGENT",
            ProbeType::NetInfo => "NETINFO",
            ProbeType::SysInfo => "SYSINFO",
            ProbeType::SpeedTest => "SPEEDTEST",
            ProbeType::SpeedTestServers => "SPEEDTEST_SERVERS",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PING" => Some(ProbeType::Ping),
            "MTR" => Some(ProbeType::Mtr),
            "TRAFFICSIM" => Some(ProbeType::TrafficSim),
            "AGENT" => Some(ProbeType::Agent),
            "NETINFO" => Some(ProbeType::NetInfo),
            "SYSINFO" => Some(ProbeType::SysInfo),
            "SPEEDTEST" => Some(ProbeType::SpeedTest),
            "SPEEDTEST_SERVERS" => Some(ProbeType::SpeedTestServers),
            _ => None,
        }
    }

    /// Sólo PING y TRAFFICSIM admiten agregación por cubetas en el servidor.
    pub fn supports_aggregation(&self) -> bool {
        matches!(self, ProbeType::Ping | ProbeType::TrafficSim)
    }
}

/// Destino de una sonda: un host DNS/IP[:puerto] o un agente foráneo.
///
/// El par se almacena como columnas opcionales excluyentes; las sondas de
/// tipo AGENT referencian agentes, el resto referencia hosts.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeTarget {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "probe_identifier")]
    #[typeshare(serialized_as = "number")]
    pub probe_id: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(rename = "target_agent_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub target_agent_id: Option<i64>,

    /// Posición dentro del conjunto ordenado de destinos.
    #[typeshare(serialized_as = "number")]
    pub position: i64,
}

/// Una medición recurrente configurada sobre un agente.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Probe {
    #[typeshare(serialized_as = "number")]
    pub id: i64,

    #[serde(rename = "workspace_identifier")]
    #[typeshare(serialized_as = "number")]
    pub workspace_id: i64,

    #[serde(rename = "agent_identifier")]
    #[typeshare(serialized_as = "number")]
    pub agent_id: i64,

    #[serde(rename = "type")]
    pub probe_type: ProbeType,

    /// Nombre descriptivo para el panel; denormalizado en alertas disparadas.
    #[serde(default)]
    pub name: String,

    #[typeshare(serialized_as = "number")]
    pub interval_seconds: i64,

    #[typeshare(serialized_as = "number")]
    pub duration_seconds: i64,

    #[typeshare(serialized_as = "number")]
    pub count: i64,

    /// Habilita la evaluación de reglas con canal de notificación.
    pub notifications: bool,

    /// Modo servidor (el agente escucha en vez de emitir; TrafficSim).
    pub server_mode: bool,

    /// Pareja inversa de una sonda AGENT bidireccional. Nunca se derreferencia
    /// cíclicamente: ambas direcciones resuelven por id en la misma tabla.
    #[serde(rename = "reverse_of_probe_identifier", skip_serializing_if = "Option::is_none")]
    #[typeshare(serialized_as = "number")]
    pub reverse_of_probe_id: Option<i64>,

    #[serde(default)]
    pub labels: HashMap<String, String>,

    #[serde(default)]
    pub metadata: HashMap<String, String>,

    #[serde(default)]
    pub targets: Vec<ProbeTarget>,

    #[typeshare(serialized_as = "String")]
    pub created_at: DateTime<Utc>,
}
