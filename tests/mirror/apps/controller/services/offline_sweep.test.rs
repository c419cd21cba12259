// [tests/mirror/apps/controller/services/offline_sweep.test.rs]
/**
 * =================================================================
 * APARATO: OFFLINE SWEEP TEST (V4.0 - LIVENESS TICK)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: DISPARO Y RESOLUCIÓN POR (REGLA, AGENTE)
 *
 * # Scenario (Contract):
 * Agente visto hace 12 min; regla offline > 10 crea la alerta. El
 * siguiente tick con last_seen refrescado a 30 s la resuelve. Un agente
 * jamás visto cuenta como infinito.
 * =================================================================
 */

use chrono::{Duration, Utc};
use netwatcher_controller::config::ControllerConfig;
use netwatcher_controller::services::sweeper::execute_sweep_cycle;
use netwatcher_controller::state::AppState;
use netwatcher_domain_models::alert::{
    AlertMetric, AlertSeverity, AlertStatus, CompareOp, RuleClause,
};
use netwatcher_infra_db::repositories::alert_rule::AlertRuleSpec;
use netwatcher_infra_db::DbClient;
use std::collections::HashMap;

async fn set_last_seen(state: &AppState, agent_id: i64, minutes_ago: i64) {
    let connection = state.database_client.get_connection().unwrap();
    connection
        .execute(
            "UPDATE agents SET last_seen_at = ?2 WHERE id = ?1",
            libsql::params![
                agent_id,
                (Utc::now() - Duration::minutes(minutes_ago)).to_rfc3339()
            ],
        )
        .await
        .unwrap();
}

async fn forge_offline_rule(state: &AppState, agent_id: Option<i64>) {
    state
        .alert_rule_repository
        .create_rule(
            1,
            AlertRuleSpec {
                probe_id: None,
                agent_id,
                primary_clause: RuleClause {
                    metric: AlertMetric::Offline,
                    op: CompareOp::Gt,
                    threshold: 10.0,
                },
                secondary_clause: None,
                logical_op: None,
                severity: AlertSeverity::Critical,
                notify_email: false,
                webhook_url: None,
                webhook_secret: None,
                enabled: true,
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn certify_offline_trigger_and_recovery() {
    println!("\n🧹 [PROVING_GROUNDS]: Auditing liveness sweep...");

    let client = DbClient::connect("file:sweep_cycle_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let state = AppState::new(
        client,
        ControllerConfig { password_hash_cost: 4, ..ControllerConfig::default() },
    );

    let agent = state
        .agent_repository
        .create_agent(1, "edge-sweep-01", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    forge_offline_rule(&state, None).await;

    // --- TICK 1: 12 minutos de silencio > umbral de 10 ---
    set_last_seen(&state, agent.id, 12).await;
    execute_sweep_cycle(&state).await;

    let active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(active.len(), 1, "12 silent minutes must breach the 10-minute rule.");
    assert_eq!(active[0].metric, AlertMetric::Offline);
    assert_eq!(active[0].agent_id, Some(agent.id));
    assert_eq!(active[0].agent_name.as_deref(), Some("edge-sweep-01"));
    assert!(active[0].value > 10.0 && active[0].value < 15.0);

    // --- TICK 2: sin cambios -> deduplicación ---
    execute_sweep_cycle(&state).await;
    let still_active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(still_active.len(), 1, "An unchanged outage must not duplicate.");

    // --- TICK 3: latido fresco (30 s) -> resolución ---
    let connection = state.database_client.get_connection().unwrap();
    connection
        .execute(
            "UPDATE agents SET last_seen_at = ?2 WHERE id = ?1",
            libsql::params![agent.id, (Utc::now() - Duration::seconds(30)).to_rfc3339()],
        )
        .await
        .unwrap();
    execute_sweep_cycle(&state).await;

    assert!(state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap().is_empty());
    let resolved = state.alert_repository.list_alerts(1, Some(AlertStatus::Resolved), 10).await.unwrap();
    assert_eq!(resolved.len(), 1);

    println!("   ✅ [SUCCESS]: Offline trigger/recovery certified.");
}

#[tokio::test]
async fn certify_never_seen_agent_counts_as_infinite() {
    let client = DbClient::connect("file:sweep_neverseen_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let state = AppState::new(
        client,
        ControllerConfig { password_hash_cost: 4, ..ControllerConfig::default() },
    );

    // Agente recién creado: last_seen_at NULL.
    let agent = state
        .agent_repository
        .create_agent(1, "edge-ghost-02", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    forge_offline_rule(&state, None).await;

    execute_sweep_cycle(&state).await;

    let active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(active.len(), 1, "A never-seen agent is offline since forever.");
    assert_eq!(active[0].agent_id, Some(agent.id));
    assert!(active[0].value.is_infinite());
}

#[tokio::test]
async fn certify_agent_scoped_rule_restricts_sweep() {
    let client = DbClient::connect("file:sweep_scoped_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let state = AppState::new(
        client,
        ControllerConfig { password_hash_cost: 4, ..ControllerConfig::default() },
    );

    let watched = state
        .agent_repository
        .create_agent(1, "edge-watched", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    let ignored = state
        .agent_repository
        .create_agent(1, "edge-ignored", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    // Regla acotada al agente vigilado; ambos llevan 30 min de silencio.
    forge_offline_rule(&state, Some(watched.id)).await;
    set_last_seen(&state, watched.id, 30).await;
    set_last_seen(&state, ignored.id, 30).await;

    execute_sweep_cycle(&state).await;

    let active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].agent_id, Some(watched.id), "Scoped rules must ignore foreign agents.");
}
