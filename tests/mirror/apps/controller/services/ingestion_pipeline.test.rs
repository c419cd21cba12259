// [tests/mirror/apps/controller/services/ingestion_pipeline.test.rs]
/**
 * =================================================================
 * APARATO: INGESTION PIPELINE TEST (V5.1 - TRIGGER & RESOLVE)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: VALIDAR -> PERSISTIR -> EVALUAR -> PUBLICAR
 *
 * # Scenario (Contract):
 * Regla latency gt 100. S1 (150 ms) dispara UNA alerta activa; S2
 * (120 ms) no duplica; S3 (40 ms) resuelve. La muestra es durable antes
 * de que el hub la difunda.
 * =================================================================
 */

use chrono::{Duration, Utc};
use netwatcher_controller::config::ControllerConfig;
use netwatcher_controller::errors::ApiError;
use netwatcher_controller::services::authenticator::AgentSession;
use netwatcher_controller::services::ingestion;
use netwatcher_controller::state::AppState;
use netwatcher_domain_models::alert::{
    AlertMetric, AlertSeverity, AlertStatus, CompareOp, RuleClause,
};
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::stream::{Topic, ViewerDataFrame};
use netwatcher_infra_db::repositories::alert_rule::AlertRuleSpec;
use netwatcher_infra_db::repositories::probe::{ProbeSpec, TargetSpec};
use netwatcher_infra_db::DbClient;
use serde_json::json;
use std::collections::HashMap;

async fn ignite_state(ledger_name: &str) -> AppState {
    let client = DbClient::connect(
        &format!("file:{}?mode=memory&cache=shared", ledger_name),
        None,
    )
    .await
    .unwrap();
    AppState::new(client, ControllerConfig { password_hash_cost: 4, ..ControllerConfig::default() })
}

async fn forge_ping_probe(state: &AppState) -> (i64, i64) {
    let agent = state
        .agent_repository
        .create_agent(1, "edge-ingest-01", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    let probe = state
        .probe_repository
        .create_probe(
            1,
            agent.id,
            ProbeSpec {
                probe_type: ProbeType::Ping,
                name: "cloudflare-latency".into(),
                interval_seconds: 60,
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

    (agent.id, probe.id)
}

fn ping_payload(avg_rtt_milliseconds: f64) -> serde_json::Value {
    let now = Utc::now();
    json!({
        "start_timestamp": now - Duration::seconds(5),
        "stop_timestamp": now,
        "packets_sent": 10, "packets_recv": 10, "packet_loss": 0.0,
        "min_rtt": avg_rtt_milliseconds * 0.8 * 1_000_000.0,
        "avg_rtt": avg_rtt_milliseconds * 1_000_000.0,
        "max_rtt": avg_rtt_milliseconds * 1.5 * 1_000_000.0,
        "std_dev_rtt": 1_000_000.0,
        "addr": "1.1.1.1"
    })
}

#[tokio::test]
async fn certify_trigger_dedup_and_resolution_cycle() {
    println!("\n📥 [PROVING_GROUNDS]: Auditing ingest -> evaluate -> publish...");

    let state = ignite_state("ingest_cycle_v5").await;
    let (agent_id, probe_id) = forge_ping_probe(&state).await;
    let session = AgentSession { workspace_id: 1, agent_id };

    state
        .alert_rule_repository
        .create_rule(
            1,
            AlertRuleSpec {
                probe_id: Some(probe_id),
                agent_id: None,
                primary_clause: RuleClause {
                    metric: AlertMetric::Latency,
                    op: CompareOp::Gt,
                    threshold: 100.0,
                },
                secondary_clause: None,
                logical_op: None,
                severity: AlertSeverity::Warning,
                notify_email: false,
                webhook_url: None,
                webhook_secret: None,
                enabled: true,
            },
        )
        .await
        .unwrap();

    // Suscripción al tópico de la sonda ANTES de la ráfaga.
    let hub = state.subscription_hub.clone();
    let (viewer_session, frame_sender, mut frame_receiver) = hub.open_session();
    hub.subscribe(viewer_session, Topic::Probe { probe_id }, frame_sender);

    // --- S1: 150 ms -> dispara ---
    let published = ingestion::ingest_sample(&state, &session, probe_id, Utc::now(), ping_payload(150.0))
        .await
        .unwrap();
    assert!(published.triggered, "S1 must be flagged as triggering.");

    let active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(active.len(), 1, "S1 creates exactly one active alert.");
    assert_eq!(active[0].value, 150.0);
    assert_eq!(active[0].probe_name.as_deref(), Some("cloudflare-latency"));
    assert_eq!(active[0].probe_target.as_deref(), Some("1.1.1.1"));

    // El hub difundió la muestra durable.
    let frame = frame_receiver.recv().await.expect("Hub must broadcast S1.");
    match frame {
        ViewerDataFrame::Data { topic, sample } => {
            assert_eq!(topic, format!("probe:{}", probe_id));
            assert!(sample.triggered);
        }
        other => panic!("INTEGRITY_FAULT: Unexpected frame {:?}", other),
    }

    // --- S2: 120 ms -> deduplicación, sigue UNA activa ---
    ingestion::ingest_sample(&state, &session, probe_id, Utc::now(), ping_payload(120.0))
        .await
        .unwrap();
    let still_active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert_eq!(still_active.len(), 1, "S2 must not duplicate the active alert.");
    assert_eq!(still_active[0].value, 150.0, "Denormalized context is frozen at trigger time.");

    // --- S3: 40 ms -> resolución automática ---
    let healthy = ingestion::ingest_sample(&state, &session, probe_id, Utc::now(), ping_payload(40.0))
        .await
        .unwrap();
    assert!(!healthy.triggered);

    let remaining_active = state.alert_repository.list_alerts(1, Some(AlertStatus::Active), 10).await.unwrap();
    assert!(remaining_active.is_empty(), "S3 must resolve the alert.");

    let resolved = state.alert_repository.list_alerts(1, Some(AlertStatus::Resolved), 10).await.unwrap();
    assert_eq!(resolved.len(), 1);
    assert!(resolved[0].resolved_at.is_some());

    // La historia durable contiene las tres muestras.
    let history = state
        .timeseries_repository
        .range(probe_id, ProbeType::Ping, Utc::now() - Duration::hours(1), Utc::now() + Duration::seconds(1), 10)
        .await
        .unwrap();
    assert_eq!(history.len(), 3);

    println!("   ✅ [SUCCESS]: Trigger/dedup/resolve cycle certified.");
}

#[tokio::test]
async fn certify_boundary_rejections() {
    let state = ignite_state("ingest_boundary_v5").await;
    let (agent_id, probe_id) = forge_ping_probe(&state).await;
    let session = AgentSession { workspace_id: 1, agent_id };

    // Payload malformado: muere en la frontera, jamás en el evaluador.
    let verdict = ingestion::ingest_sample(
        &state, &session, probe_id, Utc::now(), json!({ "garbage": true }),
    )
    .await;
    assert!(matches!(verdict, Err(ApiError::Validation(_))));

    // Sonda ajena: el agente de la sesión no es dueño.
    let foreign_session = AgentSession { workspace_id: 1, agent_id: agent_id + 999 };
    let verdict = ingestion::ingest_sample(
        &state, &foreign_session, probe_id, Utc::now(), ping_payload(10.0),
    )
    .await;
    assert!(matches!(verdict, Err(ApiError::Forbidden)));

    // Sonda inexistente.
    let verdict = ingestion::ingest_sample(
        &state, &session, 424_242, Utc::now(), ping_payload(10.0),
    )
    .await;
    assert!(matches!(verdict, Err(ApiError::NotFound)));

    // Nada de lo anterior dejó rastro durable.
    let history = state
        .timeseries_repository
        .range(probe_id, ProbeType::Ping, Utc::now() - Duration::hours(1), Utc::now() + Duration::seconds(1), 10)
        .await
        .unwrap();
    assert!(history.is_empty());
}
