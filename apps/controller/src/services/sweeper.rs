// [apps/controller/src/services/sweeper.rs]
/*!
 * =================================================================
 * APARATO: LIVENESS SWEEPER (V4.1 - FAULT ISOLATED)
 * CLASIFICACIÓN: BACKGROUND INFRASTRUCTURE (ESTRATO L4/C10)
 * RESPONSABILIDAD: EVALUACIÓN PERIÓDICA DE REGLAS OFFLINE POR AGENTE
 *
 * # Logic:
 * Cada tick enumera las reglas offline habilitadas agrupadas por
 * workspace, lista los agentes no retirados y ejecuta el ciclo de vida
 * por (regla, agente). El fallo de UN agente se captura y registra; el
 * barrido continúa. El daemon honra la señal de apagado del proceso.
 * =================================================================
 */

use crate::services::alerting;
use crate::state::AppState;
use chrono::Utc;
use netwatcher_domain_models::agent::Agent;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, error, info, instrument};

/**
 * Inicia el daemon de barrido de vivacidad en el runtime de Tokio.
 *
 * @param shutdown_signal Receptor de la señal de apagado del proceso.
 */
pub fn spawn_sweeper(application_state: AppState, mut shutdown_signal: watch::Receiver<bool>) {
    let sweep_interval_seconds = application_state.config.offline_sweep_interval_seconds;

    tokio::spawn(async move {
        let mut sweep_ticker = interval(Duration::from_secs(sweep_interval_seconds));
        info!("🧹 [SWEEPER_ACTIVE]: Liveness daemon initiated ({}s cadence).", sweep_interval_seconds);

        loop {
            tokio::select! {
                _ = sweep_ticker.tick() => {
                    execute_sweep_cycle(&application_state).await;
                }
                _ = shutdown_signal.changed() => {
                    info!("🛑 [SWEEPER_SHUTDOWN]: Liveness daemon honoring process signal.");
                    break;
                }
            }
        }
    });
}

/**
 * Un ciclo completo de barrido. Expuesto para el Proving Grounds.
 */
#[instrument(skip(application_state))]
pub async fn execute_sweep_cycle(application_state: &AppState) {
    let offline_rules = match application_state.alert_rule_repository.enabled_offline_rules().await {
        Ok(rules) => rules,
        Err(rules_fault) => {
            error!("⚠️ [SWEEP_FAULT]: Offline rule enumeration failed: {}", rules_fault);
            return;
        }
    };

    if offline_rules.is_empty() {
        return;
    }

    let now = Utc::now();
    // Cache de inventario por workspace dentro del tick.
    let mut workspace_agents_cache: HashMap<i64, Vec<Agent>> = HashMap::new();

    for rule in offline_rules {
        let agents = match workspace_agents_cache.get(&rule.workspace_id) {
            Some(cached) => cached.clone(),
            None => {
                let listed = match application_state
                    .agent_repository
                    .list_by_workspace(rule.workspace_id)
                    .await
                {
                    Ok(agents) => agents,
                    Err(listing_fault) => {
                        error!("⚠️ [SWEEP_FAULT]: Workspace {} agent listing failed: {}",
                            rule.workspace_id, listing_fault);
                        continue;
                    }
                };
                workspace_agents_cache.insert(rule.workspace_id, listed.clone());
                listed
            }
        };

        // Regla con agente explícito: el barrido se restringe a él.
        let scoped_agents: Vec<&Agent> = match rule.agent_id {
            Some(target_agent_id) => {
                agents.iter().filter(|agent| agent.id == target_agent_id).collect()
            }
            None => agents.iter().collect(),
        };

        for agent in scoped_agents {
            // El fallo de un agente no cascada: se captura y se continúa.
            match alerting::evaluate_offline_rule_for_agent(application_state, &rule, agent, now).await {
                Ok(triggered) => {
                    if triggered {
                        debug!("🧹 [SWEEP_TRIGGER]: Rule {} fired for agent {}.", rule.id, agent.id);
                    }
                }
                Err(agent_fault) => {
                    error!("⚠️ [SWEEP_AGENT_FAULT]: Rule {} on agent {} failed: {}",
                        rule.id, agent.id, agent_fault);
                }
            }
        }
    }
}
