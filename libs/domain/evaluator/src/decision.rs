// [libs/domain/evaluator/src/decision.rs]
/*!
 * =================================================================
 * APARATO: TRIGGER DECISION ENGINE (V2.1 - COMPOUND STRICT)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: VEREDICTO DE DISPARO POR REGLA Y PLANTILLA DE MENSAJE
 *
 * # Logic:
 * Cláusula primaria sin valor extraíble => la regla se salta. Cláusula
 * secundaria declarada pero sin valor extraíble => la regla también se
 * salta (jamás se degrada silenciosamente a evaluación simple).
 * =================================================================
 */

use crate::compare::{combine, compare};
use netwatcher_domain_models::alert::{AlertMetric, AlertRule, CompareOp};

/// Veredicto de una regla sobre una muestra o un tick.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleVerdict {
    pub triggered: bool,
    /// Valor observado de la cláusula primaria (el que se denormaliza).
    pub observed_value: f64,
    pub threshold: f64,
    pub metric: AlertMetric,
    pub message: String,
}

/**
 * Evalúa una regla contra un extractor de métricas.
 *
 * El extractor cierra sobre (payload, contexto) o sobre el tick de
 * vivacidad; retornar `None` marca la métrica como no-aplicable.
 *
 * Retorna `None` cuando la regla debe saltarse por completo.
 */
pub fn evaluate_rule(
    rule: &AlertRule,
    extract: impl Fn(AlertMetric) -> Option<f64>,
) -> Option<RuleVerdict> {
    let primary = rule.primary_clause;
    let primary_value = extract(primary.metric)?;
    let primary_triggered = compare(primary_value, primary.threshold, primary.op);

    let triggered = match (rule.secondary_clause, rule.logical_op) {
        (Some(secondary), Some(logical_operator)) => {
            // Métrica secundaria no aplicable => regla saltada, no degradada.
            let secondary_value = extract(secondary.metric)?;
            let secondary_triggered = compare(secondary_value, secondary.threshold, secondary.op);
            combine(primary_triggered, secondary_triggered, logical_operator)
        }
        // Cláusula secundaria sin conector declarado se ignora por contrato.
        _ => primary_triggered,
    };

    Some(RuleVerdict {
        triggered,
        observed_value: primary_value,
        threshold: primary.threshold,
        metric: primary.metric,
        message: format_alert_message(primary.metric, primary.op, primary_value, primary.threshold),
    })
}

/// Plantilla del mensaje denormalizado en la alerta.
pub fn format_alert_message(
    metric: AlertMetric,
    operator: CompareOp,
    observed_value: f64,
    threshold: f64,
) -> String {
    format!(
        "{} {} {:.2} (observed {:.2})",
        metric.as_str(),
        operator.as_str(),
        threshold,
        observed_value
    )
}
