// [apps/controller/src/services/alerting.rs]
/*!
 * =================================================================
 * APARATO: ALERT LIFECYCLE ORCHESTRATOR (V5.2 - SCOPE LINEARIZED)
 * CLASIFICACIÓN: APPLICATION SERVICES (ESTRATO L4/C5)
 * RESPONSABILIDAD: EFECTOS DEL VEREDICTO SOBRE ALERTAS Y BASELINES
 *
 * # Logic:
 * El veredicto puro viene del motor de evaluación (L2); aquí se aplican
 * sus efectos: disparo deduplicado por la guardia de fila, resolución
 * automática en valor sano, mantenimiento del baseline de ruta y fan-out
 * de notificaciones. El fallo de UNA regla se registra y se continúa con
 * la siguiente: la evaluación jamás revierte el append durable.
 * =================================================================
 */

use crate::state::AppState;
use chrono::{DateTime, Utc};
use netwatcher_domain_evaluator::{
    compute_route_fingerprint, evaluate_rule, extract_metric, offline_minutes, EvalContext,
    RouteFingerprint, RuleVerdict,
};
use netwatcher_domain_models::agent::Agent;
use netwatcher_domain_models::alert::{AlertMetric, AlertRule, AlertScope};
use netwatcher_domain_models::probe::Probe;
use netwatcher_domain_models::sample::{ProbeSample, SamplePayload};
use netwatcher_infra_db::repositories::alert::TriggerContext;
use tracing::{debug, error, info, instrument, warn};

/// Resultado agregado de la evaluación de una muestra.
#[derive(Debug, Default)]
pub struct SampleEvaluation {
    /// Mensajes de las reglas que dispararon (razón denormalizada).
    pub triggered_reasons: Vec<String>,
}

impl SampleEvaluation {
    pub fn any_triggered(&self) -> bool {
        !self.triggered_reasons.is_empty()
    }
}

/**
 * Evalúa todas las reglas aplicables a una muestra recién durable.
 *
 * Orden del contrato: la muestra YA está comprometida en el adaptador de
 * series temporales; los errores de evaluación se registran sin revertir.
 */
#[instrument(skip(state, probe, sample), fields(probe = probe.id))]
pub async fn evaluate_sample(
    state: &AppState,
    probe: &Probe,
    sample: &ProbeSample,
) -> SampleEvaluation {
    let mut evaluation = SampleEvaluation::default();

    // --- CASO ESPECIAL MTR: LA HUELLA SE CALCULA SIEMPRE ---
    // El baseline sigue a la realidad exista o no una regla route_change.
    let route_state = match &sample.payload {
        SamplePayload::Mtr(mtr) => {
            match resolve_route_state(state, probe.id, compute_route_fingerprint(&mtr.report)).await
            {
                Ok(resolved) => resolved,
                Err(route_fault) => {
                    error!("⚠️ [ROUTE_FAULT]: Baseline resolution failed for probe {}: {}",
                        probe.id, route_fault);
                    RouteState::default()
                }
            }
        }
        _ => RouteState::default(),
    };

    let evaluation_context = EvalContext {
        route_change_value: route_state.change_value,
    };

    // --- REGLAS APLICABLES: ESPECÍFICAS DE LA SONDA + DEFAULTS ---
    let applicable_rules = match state
        .alert_rule_repository
        .applicable_rules(probe.workspace_id, probe.id)
        .await
    {
        Ok(rules) => rules,
        Err(rules_fault) => {
            error!("⚠️ [RULE_FETCH_FAULT]: Probe {} evaluation skipped: {}", probe.id, rules_fault);
            return evaluation;
        }
    };

    for rule in applicable_rules {
        let verdict = evaluate_rule(&rule, |metric| {
            extract_metric(metric, &sample.payload, &evaluation_context)
        });

        let Some(verdict) = verdict else {
            // Métrica no aplicable a esta forma de payload: regla saltada.
            continue;
        };

        let scope = AlertScope::Probe(probe.id);
        match apply_verdict(state, &rule, scope, &verdict, probe, sample.agent_id).await {
            Ok(true) => evaluation.triggered_reasons.push(verdict.message.clone()),
            Ok(false) => {}
            Err(lifecycle_fault) => {
                // Fatal para la regla, no para la tubería.
                error!("⚠️ [LIFECYCLE_FAULT]: Rule {} on probe {} failed: {}",
                    rule.id, probe.id, lifecycle_fault);
            }
        }
    }

    // --- AVANCE DEL BASELINE TRAS EL CICLO DE VIDA ---
    // La siguiente divergencia debe ser detectable contra la ruta vigente.
    if let Some(fingerprint) = route_state.pending_upsert {
        if let Err(baseline_fault) = state
            .route_baseline_repository
            .upsert(probe.id, &fingerprint.fingerprint, &fingerprint.path_human, fingerprint.hop_count as i64)
            .await
        {
            error!("⚠️ [BASELINE_FAULT]: Probe {} baseline advance failed: {}", probe.id, baseline_fault);
        }
    }

    evaluation
}

/**
 * Evalúa una regla offline contra un agente (tick de vivacidad).
 * Alcance de deduplicación: (regla, agente).
 */
#[instrument(skip(state, rule, agent), fields(rule = rule.id, agent = agent.id))]
pub async fn evaluate_offline_rule_for_agent(
    state: &AppState,
    rule: &AlertRule,
    agent: &Agent,
    now: DateTime<Utc>,
) -> anyhow::Result<bool> {
    let minutes_since_last_seen = offline_minutes(agent.last_seen_at, now);

    let verdict = evaluate_rule(rule, |metric| {
        (metric == AlertMetric::Offline).then_some(minutes_since_last_seen)
    });

    let Some(verdict) = verdict else {
        return Ok(false);
    };

    let scope = AlertScope::Agent(agent.id);
    let context = TriggerContext {
        agent_name: Some(agent.name.clone()),
        ..TriggerContext::default()
    };

    apply_scoped_verdict(state, rule, scope, &verdict, context, agent.workspace_id, Some(agent.id)).await
}

// --- ESTRATO INTERNO ---

/// Estado de ruta resuelto para una muestra MTR.
#[derive(Debug, Default)]
struct RouteState {
    /// 0.0 (estable) / 1.0 (divergente) cuando existe baseline; None si la
    /// huella acaba de establecerse (la regla route_change se salta).
    change_value: Option<f64>,
    /// Huella a la que avanzar el baseline tras el ciclo de vida.
    pending_upsert: Option<RouteFingerprint>,
}

async fn resolve_route_state(
    state: &AppState,
    probe_id: i64,
    current: RouteFingerprint,
) -> anyhow::Result<RouteState> {
    match state.route_baseline_repository.fetch(probe_id).await? {
        None => {
            // Primera MTR: el baseline se establece en silencio, sin disparo.
            info!("🧭 [BASELINE_GENESIS]: Probe {} route recorded as {}.", probe_id, current.fingerprint);
            Ok(RouteState {
                change_value: None,
                pending_upsert: Some(current),
            })
        }
        Some(baseline) if baseline.fingerprint == current.fingerprint => Ok(RouteState {
            change_value: Some(0.0),
            pending_upsert: None,
        }),
        Some(baseline) => {
            warn!("🔀 [ROUTE_DIVERGENCE]: Probe {} path drifted {} -> {}.",
                probe_id, baseline.fingerprint, current.fingerprint);
            Ok(RouteState {
                change_value: Some(1.0),
                pending_upsert: Some(current),
            })
        }
    }
}

/// Aplica el veredicto de una regla de sonda, denormalizando su contexto.
async fn apply_verdict(
    state: &AppState,
    rule: &AlertRule,
    scope: AlertScope,
    verdict: &RuleVerdict,
    probe: &Probe,
    agent_id: i64,
) -> anyhow::Result<bool> {
    let agent_name = state
        .agent_repository
        .fetch_unscoped(probe.workspace_id, agent_id)
        .await
        .map(|agent| agent.name)
        .ok();

    let probe_target = state
        .probe_repository
        .primary_target_display(probe.id)
        .await
        .unwrap_or(None);

    let context = TriggerContext {
        probe_type: Some(probe.probe_type.as_str().to_string()),
        probe_name: Some(probe.name.clone()),
        probe_target,
        agent_name,
    };

    apply_scoped_verdict(state, rule, scope, verdict, context, probe.workspace_id, Some(agent_id)).await
}

/**
 * Ciclo de vida por (regla, alcance):
 * - disparo con alerta activa existente  => no-op (deduplicación);
 * - disparo sin alerta activa            => crear + notificar;
 * - valor sano con alerta abierta        => resolver (sin notificación);
 * - reconocimiento                       => acción de operador, fuera de aquí.
 *
 * Retorna si la regla quedó disparada para esta evaluación.
 */
async fn apply_scoped_verdict(
    state: &AppState,
    rule: &AlertRule,
    scope: AlertScope,
    verdict: &RuleVerdict,
    context: TriggerContext,
    workspace_id: i64,
    publish_agent_id: Option<i64>,
) -> anyhow::Result<bool> {
    if verdict.triggered {
        let created_alert = state
            .alert_repository
            .try_trigger(
                rule.id,
                workspace_id,
                scope,
                verdict.metric,
                verdict.observed_value,
                verdict.threshold,
                rule.severity,
                &verdict.message,
                context,
            )
            .await?;

        if let Some(alert) = created_alert {
            // Canal de panel: el hub observa la escritura.
            state
                .subscription_hub
                .publish_alert(workspace_id, publish_agent_id, &alert);

            // Email + webhook en fan-out desprendido.
            let workspace_members = state
                .identity_repository
                .list_members(workspace_id)
                .await
                .unwrap_or_default();
            state
                .notification_dispatcher
                .dispatch_alert(&alert, rule, workspace_members);
        } else {
            debug!("♻️ [ALERT_DEDUP]: Rule {} already active for {}.", rule.id, scope.storage_key());
        }

        return Ok(true);
    }

    // Valor sano: la alerta abierta (si existe) se resuelve. Terminal.
    if let Some(resolved_alert) = state.alert_repository.resolve_open(rule.id, scope).await? {
        state
            .subscription_hub
            .publish_alert(workspace_id, publish_agent_id, &resolved_alert);
    }

    Ok(false)
}
