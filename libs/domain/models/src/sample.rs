// [libs/domain/models/src/sample.rs]
/*!
 * =================================================================
 * APARATO: PROBE SAMPLE CONTRACTS (V2.4 - TYPED PAYLOADS)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GRAMÁTICA INMUTABLE DE MEDICIONES HETEROGÉNEAS
 *
 * # Logic:
 * Cada medición viaja como JSON con forma dependiente del tipo de sonda.
 * El aparato modela esas formas como una variante etiquetada y rechaza
 * payloads desconocidos en la frontera de ingesta, nunca dentro del
 * evaluador. Las marcas de tiempo del agente (created_at) se preservan
 * sin reordenamiento; el controlador estampa received_at.
 * =================================================================
 */

use crate::probe::ProbeType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Fallos de interpretación de payloads en la frontera de ingesta.
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("[L2_PAYLOAD_FAULT]: UNKNOWN_PROBE_TYPE -> {0}")]
    UnknownType(String),

    #[error("[L2_PAYLOAD_FAULT]: SCHEMA_VIOLATION ({probe_type}) -> {detail}")]
    SchemaViolation {
        probe_type: &'static str,
        detail: String,
    },
}

/// Medición PING cruda tal y como la emite el agente.
///
/// Los RTT llegan en nanosegundos; las filas agregadas del adaptador de
/// series temporales los exponen en milisegundos.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PingPayload {
    pub start_timestamp: DateTime<Utc>,
    pub stop_timestamp: DateTime<Utc>,
    pub packets_sent: i64,
    pub packets_recv: i64,
    pub packet_loss: f64,
    pub min_rtt: f64,
    pub avg_rtt: f64,
    pub max_rtt: f64,
    pub std_dev_rtt: f64,
    #[serde(default)]
    pub addr: String,
}

/// Host observado en un salto MTR. IP `*` denota salto sin respuesta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MtrHost {
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
}

/// Un salto del reporte MTR. Las métricas llegan como strings decimales
/// (herencia del formato de reporte del agente) y se parsean en el evaluador.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MtrHop {
    pub ttl: i64,
    #[serde(default)]
    pub hosts: Vec<MtrHost>,
    #[serde(default)]
    pub loss_pct: String,
    #[serde(default)]
    pub avg: String,
    #[serde(default)]
    pub best: String,
    #[serde(default)]
    pub worst: String,
    #[serde(default)]
    pub sent: i64,
    #[serde(default)]
    pub recv: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MtrTargetInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub hostname: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MtrInfo {
    pub target: MtrTargetInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MtrReport {
    pub info: MtrInfo,
    #[serde(default)]
    pub hops: Vec<MtrHop>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MtrPayload {
    pub start_timestamp: DateTime<Utc>,
    pub stop_timestamp: DateTime<Utc>,
    pub report: MtrReport,
}

/// Estadísticas de un ciclo de simulación de tráfico UDP.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrafficSimPayload {
    pub lost_packets: i64,
    pub loss_percentage: f64,
    pub out_of_sequence: i64,
    pub duplicate_packets: i64,
    pub total_packets: i64,
    #[serde(rename = "averageRTT")]
    pub average_rtt: f64,
    #[serde(rename = "minRTT")]
    pub min_rtt: f64,
    #[serde(rename = "maxRTT")]
    pub max_rtt: f64,
    #[serde(rename = "stdDevRTT")]
    pub std_dev_rtt: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_range: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flows: Option<Value>,
    #[serde(default)]
    pub report_time: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// Contadores de tiempo de CPU acumulados del host del agente.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuTimes {
    pub user: f64,
    pub system: f64,
    pub idle: f64,
    pub iowait: f64,
    pub irq: f64,
    pub nice: f64,
    #[serde(rename = "softIRQ")]
    pub soft_irq: f64,
    pub steal: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub available_bytes: u64,
    // Capitalización heredada del contrato de reporte del agente.
    #[serde(rename = "free_Bytes")]
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SysInfoPayload {
    #[serde(rename = "hostInfo", default)]
    pub host_info: Value,
    #[serde(rename = "memoryInfo")]
    pub memory_info: MemoryInfo,
    #[serde(rename = "CPUTimes")]
    pub cpu_times: CpuTimes,
}

/// Variante etiquetada de payloads de medición.
///
/// Los tipos que el evaluador no inspecciona (NETINFO, SPEEDTEST, inventario
/// AGENT) se preservan opacos: válidos en la frontera, sin extracción de
/// métricas.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SamplePayload {
    Ping(PingPayload),
    Mtr(MtrPayload),
    TrafficSim(TrafficSimPayload),
    SysInfo(SysInfoPayload),
    Opaque(Value),
}

impl SamplePayload {
    /**
     * Interpreta un payload JSON según el tipo de sonda declarado.
     *
     * # Errors:
     * - `PayloadError::SchemaViolation`: El JSON no satisface la forma del tipo.
     */
    pub fn parse(probe_type: ProbeType, raw_payload: Value) -> Result<Self, PayloadError> {
        let violation = |probe_type: &'static str| {
            move |fault: serde_json::Error| PayloadError::SchemaViolation {
                probe_type,
                detail: fault.to_string(),
            }
        };

        match probe_type {
            ProbeType::Ping => serde_json::from_value::<PingPayload>(raw_payload)
                .map(SamplePayload::Ping)
                .map_err(violation("PING")),
            ProbeType::Mtr => serde_json::from_value::<MtrPayload>(raw_payload)
                .map(SamplePayload::Mtr)
                .map_err(violation("MTR")),
            ProbeType::TrafficSim => serde_json::from_value::<TrafficSimPayload>(raw_payload)
                .map(SamplePayload::TrafficSim)
                .map_err(violation("TRAFFICSIM")),
            ProbeType::SysInfo => serde_json::from_value::<SysInfoPayload>(raw_payload)
                .map(SamplePayload::SysInfo)
                .map_err(violation("SYSINFO")),
            // Tipos sin extracción de métricas: se validan como JSON y se preservan.
            ProbeType::Agent
            | ProbeType::NetInfo
            | ProbeType::SpeedTest
            | ProbeType::SpeedTestServers => Ok(SamplePayload::Opaque(raw_payload)),
        }
    }

    /// Serializa el payload de vuelta a JSON para persistencia y difusión.
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Fila inmutable de la serie temporal de mediciones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeSample {
    #[serde(rename = "probe_identifier")]
    pub probe_id: i64,

    #[serde(rename = "agent_identifier")]
    pub agent_id: i64,

    #[serde(rename = "type")]
    pub probe_type: ProbeType,

    /// Reloj de pared del agente. Se preserva sin reordenamiento.
    pub created_at: DateTime<Utc>,

    /// Reloj de pared del controlador, estampado en la ingesta.
    pub received_at: DateTime<Utc>,

    pub payload: SamplePayload,

    /// Marcada cuando la evaluación de reglas disparó al menos una alerta.
    #[serde(default)]
    pub triggered: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggered_reason: Option<String>,
}
