// [libs/domain/evaluator/src/lib.rs]
/*!
 * =================================================================
 * APARATO: ALERT EVALUATION ENGINE (V2.3 - DETERMINISTIC CORE)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: EVALUACIÓN PURA DE REGLAS SOBRE PAYLOADS HETEROGÉNEOS
 *
 * # Mathematical Proof (Deterministic Evaluation):
 * Toda función de este crate es pura: (regla, payload, contexto) -> veredicto.
 * Los efectos secundarios (ciclo de vida de alertas, baselines, despacho)
 * viven en el controlador; esto permite certificar la matriz de extracción
 * métrica por métrica sin infraestructura.
 * =================================================================
 */

pub mod compare;
pub mod extract;
pub mod fingerprint;
pub mod decision;

pub use compare::compare;
pub use extract::{extract_metric, offline_minutes, EvalContext};
pub use fingerprint::{compute_route_fingerprint, RouteFingerprint};
pub use decision::{evaluate_rule, format_alert_message, RuleVerdict};
