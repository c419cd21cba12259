// [libs/domain/evaluator/src/compare.rs]

use netwatcher_domain_models::alert::{CompareOp, LogicalOp};

/// Aplica un operador de comparación con semántica de flotante estricta.
///
/// `Eq` es igualdad exacta (`a == b`): sin redondeo ni tolerancia. Los
/// valores NaN nunca disparan (toda comparación con NaN es falsa), lo que
/// convierte extracciones degeneradas en no-disparos en vez de alertas
/// fantasma.
pub fn compare(observed_value: f64, threshold: f64, operator: CompareOp) -> bool {
    match operator {
        CompareOp::Gt => observed_value > threshold,
        CompareOp::Gte => observed_value >= threshold,
        CompareOp::Lt => observed_value < threshold,
        CompareOp::Lte => observed_value <= threshold,
        CompareOp::Eq => observed_value == threshold,
    }
}

/// Combina el veredicto primario y secundario de una regla compuesta.
pub fn combine(primary_triggered: bool, secondary_triggered: bool, operator: LogicalOp) -> bool {
    match operator {
        LogicalOp::And => primary_triggered && secondary_triggered,
        LogicalOp::Or => primary_triggered || secondary_triggered,
    }
}
