// [tests/mirror/apps/controller/services/route_change_lifecycle.test.rs]
/**
 * =================================================================
 * APARATO: ROUTE CHANGE LIFECYCLE TEST (V5.0 - BASELINE TRACKING)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: GÉNESIS SILENCIOSO, DISPARO Y AVANCE DE BASELINE
 *
 * # Scenario (Contract):
 * Rutas 10.0.0.1 -> 10.0.0.2 -> 1.1.1.1 y luego 10.0.0.1 -> 10.0.9.9 ->
 * 1.1.1.1. La primera establece F1 sin disparar; la segunda dispara y
 * avanza el baseline a F2; una tercera con F2 no vuelve a disparar.
 * =================================================================
 */

use chrono::{Duration, Utc};
use netwatcher_controller::config::ControllerConfig;
use netwatcher_controller::services::authenticator::AgentSession;
use netwatcher_controller::services::ingestion;
use netwatcher_controller::state::AppState;
use netwatcher_domain_evaluator::compute_route_fingerprint;
use netwatcher_domain_models::alert::{
    AlertMetric, AlertSeverity, AlertStatus, CompareOp, RuleClause,
};
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::sample::SamplePayload;
use netwatcher_infra_db::repositories::alert_rule::AlertRuleSpec;
use netwatcher_infra_db::repositories::probe::{ProbeSpec, TargetSpec};
use netwatcher_infra_db::DbClient;
use serde_json::json;
use std::collections::HashMap;

fn mtr_payload(middle_hop_ip: &str) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "start_timestamp": now - Duration::seconds(30),
        "stop_timestamp": now,
        "report": {
            "info": { "target": { "ip": "1.1.1.1", "hostname": "one.one.one.one" } },
            "hops": [
                { "ttl": 1, "hosts": [{"ip": "10.0.0.1", "hostname": ""}],
                  "loss_pct": "0.0", "avg": "0.8", "best": "0.5", "worst": "1.2",
                  "sent": 10, "recv": 10 },
                { "ttl": 2, "hosts": [{"ip": middle_hop_ip, "hostname": ""}],
                  "loss_pct": "0.0", "avg": "4.1", "best": "3.0", "worst": "6.0",
                  "sent": 10, "recv": 10 },
                { "ttl": 3, "hosts": [{"ip": "1.1.1.1", "hostname": ""}],
                  "loss_pct": "0.0", "avg": "11.9", "best": "10.0", "worst": "15.0",
                  "sent": 10, "recv": 10 }
            ]
        }
    })
}

fn expected_fingerprint(middle_hop_ip: &str) -> String {
    let payload = SamplePayload::parse(ProbeType::Mtr, mtr_payload(middle_hop_ip)).unwrap();
    let SamplePayload::Mtr(mtr) = payload else { unreachable!() };
    compute_route_fingerprint(&mtr.report).fingerprint
}

#[tokio::test]
async fn certify_route_change_detection_cycle() {
    println!("\n🧭 [PROVING_GROUNDS]: Auditing route-change lifecycle...");

    let client = DbClient::connect("file:route_cycle_v5?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let state = AppState::new(
        client,
        ControllerConfig { password_hash_cost: 4, ..ControllerConfig::default() },
    );

    let agent = state
        .agent_repository
        .create_agent(1, "edge-route-01", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    let probe = state
        .probe_repository
        .create_probe(
            1,
            agent.id,
            ProbeSpec {
                probe_type: ProbeType::Mtr,
                name: "core-path".into(),
                interval_seconds: 300,
                duration_seconds: 0,
                count: 10,
                notifications: true,
                server_mode: false,
                reverse_of_probe_id: None,
                labels: HashMap::new(),
                metadata: HashMap::new(),
                targets: vec![TargetSpec { host: Some("1.1.1.1".into()), target_agent_id: None }],
            },
        )
        .await
        .unwrap();

    state
        .alert_rule_repository
        .create_rule(
            1,
            AlertRuleSpec {
                probe_id: Some(probe.id),
                agent_id: None,
                primary_clause: RuleClause {
                    metric: AlertMetric::RouteChange,
                    op: CompareOp::Gt,
                    threshold: 0.0,
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

    let session = AgentSession { workspace_id: 1, agent_id: agent.id };
    let fingerprint_alpha = expected_fingerprint("10.0.0.2");
    let fingerprint_beta = expected_fingerprint("10.0.9.9");

    // --- MUESTRA A: génesis silencioso del baseline (F1, sin disparo) ---
    ingestion::ingest_sample(&state, &session, probe.id, Utc::now(), mtr_payload("10.0.0.2"))
        .await
        .unwrap();

    let genesis_baseline = state.route_baseline_repository.fetch(probe.id).await.unwrap().unwrap();
    assert_eq!(genesis_baseline.fingerprint, fingerprint_alpha);
    assert_eq!(genesis_baseline.hop_count, 3);

    let alerts = state.alert_repository.list_alerts(1, None, 10).await.unwrap();
    assert!(alerts.is_empty(), "First-ever MTR must NOT fire route_change.");

    // --- MUESTRA B: divergencia -> disparo + avance del baseline a F2 ---
    ingestion::ingest_sample(&state, &session, probe.id, Utc::now(), mtr_payload("10.0.9.9"))
        .await
        .unwrap();

    let active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(active.len(), 1, "Divergence must raise exactly one alert.");
    assert_eq!(active[0].metric, AlertMetric::RouteChange);
    assert_eq!(active[0].value, 1.0);

    let advanced_baseline = state.route_baseline_repository.fetch(probe.id).await.unwrap().unwrap();
    assert_eq!(advanced_baseline.fingerprint, fingerprint_beta,
        "Baseline must advance to the new route after the alert.");

    // --- MUESTRA C: la nueva ruta es ahora la norma -> sin nuevo disparo ---
    ingestion::ingest_sample(&state, &session, probe.id, Utc::now(), mtr_payload("10.0.9.9"))
        .await
        .unwrap();

    let inventory = state.alert_repository.list_alerts(1, None, 10).await.unwrap();
    assert_eq!(inventory.len(), 1, "A stable route must not mint a second alert.");
    // El valor sano (0) resuelve la alerta de divergencia previa.
    assert_eq!(inventory[0].status, AlertStatus::Resolved);

    let settled_baseline = state.route_baseline_repository.fetch(probe.id).await.unwrap().unwrap();
    assert_eq!(settled_baseline.fingerprint, fingerprint_beta);

    println!("   ✅ [SUCCESS]: Route-change lifecycle certified.");
}
