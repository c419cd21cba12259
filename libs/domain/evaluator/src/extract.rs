// [libs/domain/evaluator/src/extract.rs]
/*!
 * =================================================================
 * APARATO: METRIC EXTRACTION MATRIX (V2.5 - PAYLOAD AWARE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: PROYECCIÓN (MÉTRICA, PAYLOAD) -> FLOTANTE OPCIONAL
 *
 * # Logic:
 * La matriz mapea deterministamente cada métrica a un flotante según la
 * forma del payload. Una extracción vacía significa "regla no aplicable a
 * esta muestra" y el que llama la salta; nunca se degrada a cero.
 *
 * Unidades: los RTT crudos de PING llegan en nanosegundos y se normalizan
 * a milisegundos aquí, de modo que los umbrales de latencia/jitter se
 * expresan siempre en ms. TRAFFICSIM ya reporta en ms.
 * =================================================================
 */

use chrono::{DateTime, Utc};
use netwatcher_domain_models::alert::AlertMetric;
use netwatcher_domain_models::sample::{MtrHop, SamplePayload};

/// Nanosegundos por milisegundo, para la normalización de RTT de PING.
const NANOSECONDS_PER_MILLISECOND: f64 = 1_000_000.0;

/// Contexto externo que la extracción no puede derivar del payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext {
    /// Veredicto de comparación de huella de ruta, inyectado por el pipeline
    /// cuando existe baseline: 0.0 si la huella coincide, 1.0 si divergió.
    pub route_change_value: Option<f64>,
}

/**
 * Proyecta una métrica sobre un payload tipado.
 *
 * Retorna `None` cuando la métrica no aplica a la forma del payload (la
 * regla se salta) o cuando el material del reporte es inservible (campos
 * MTR no numéricos, totales en cero).
 */
pub fn extract_metric(
    metric: AlertMetric,
    payload: &SamplePayload,
    context: &EvalContext,
) -> Option<f64> {
    match (metric, payload) {
        // --- PING ---
        (AlertMetric::PacketLoss, SamplePayload::Ping(ping)) => Some(ping.packet_loss),
        (AlertMetric::Latency, SamplePayload::Ping(ping)) => {
            // El reporte crudo trae avg_rtt; min_rtt>0 certifica que hubo respuesta.
            let average_rtt_nanoseconds = if ping.avg_rtt > 0.0 {
                ping.avg_rtt
            } else {
                return None;
            };
            Some(average_rtt_nanoseconds / NANOSECONDS_PER_MILLISECOND)
        }
        (AlertMetric::Jitter, SamplePayload::Ping(ping)) => {
            Some(ping.std_dev_rtt / NANOSECONDS_PER_MILLISECOND)
        }

        // --- TRAFFICSIM ---
        (AlertMetric::PacketLoss, SamplePayload::TrafficSim(cycle)) => {
            if cycle.total_packets <= 0 {
                return None;
            }
            Some(100.0 * cycle.lost_packets as f64 / cycle.total_packets as f64)
        }
        (AlertMetric::Latency, SamplePayload::TrafficSim(cycle)) => Some(cycle.average_rtt),
        (AlertMetric::Jitter, SamplePayload::TrafficSim(cycle)) => Some(cycle.std_dev_rtt),

        // --- MTR ---
        (AlertMetric::EndHopLoss, SamplePayload::Mtr(mtr)) => {
            parse_hop_field(mtr.report.hops.last()?, |hop| &hop.loss_pct)
        }
        (AlertMetric::EndHopLatency, SamplePayload::Mtr(mtr)) => {
            parse_hop_field(mtr.report.hops.last()?, |hop| &hop.avg)
        }
        (AlertMetric::WorstHopLoss, SamplePayload::Mtr(mtr)) => mtr
            .report
            .hops
            .iter()
            .filter_map(|hop| hop.loss_pct.trim().parse::<f64>().ok())
            .fold(None, |worst, loss| {
                Some(worst.map_or(loss, |current: f64| current.max(loss)))
            }),
        (AlertMetric::RouteChange, SamplePayload::Mtr(_)) => context.route_change_value,

        // --- SYSINFO ---
        (AlertMetric::CpuUsage, SamplePayload::SysInfo(inventory)) => {
            let times = &inventory.cpu_times;
            let busy = times.user + times.system + times.nice + times.irq + times.soft_irq + times.steal;
            let total = busy + times.idle + times.iowait;
            if total <= 0.0 {
                return None;
            }
            Some(100.0 * busy / total)
        }
        (AlertMetric::MemoryUsage, SamplePayload::SysInfo(inventory)) => {
            let memory = &inventory.memory_info;
            if memory.total_bytes == 0 {
                return None;
            }
            Some(100.0 * memory.used_bytes as f64 / memory.total_bytes as f64)
        }

        // Offline se evalúa por tick de vivacidad, jamás por muestra.
        (AlertMetric::Offline, _) => None,

        // Toda otra combinación (métrica, forma) es no-aplicable.
        _ => None,
    }
}

fn parse_hop_field<'hop>(
    hop: &'hop MtrHop,
    selector: impl Fn(&'hop MtrHop) -> &'hop String,
) -> Option<f64> {
    selector(hop).trim().parse::<f64>().ok()
}

/**
 * Minutos transcurridos desde el último latido de un agente.
 *
 * Un agente jamás visto reporta infinito: toda regla offline `gt` lo
 * considera caído desde el primer tick.
 */
pub fn offline_minutes(last_seen_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match last_seen_at {
        Some(last_seen) => {
            let elapsed_seconds = (now - last_seen).num_seconds().max(0) as f64;
            elapsed_seconds / 60.0
        }
        None => f64::INFINITY,
    }
}
