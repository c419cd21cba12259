// [tests/mirror/libs/domain/evaluator/evaluation_matrix.test.rs]
/**
 * =================================================================
 * APARATO: EVALUATION MATRIX TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L2-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DE LA MATRIZ (MÉTRICA, PAYLOAD, REGLA)
 * =================================================================
 */

use chrono::Utc;
use netwatcher_domain_evaluator::{evaluate_rule, extract_metric, EvalContext};
use netwatcher_domain_models::alert::{
    AlertMetric, AlertRule, AlertSeverity, CompareOp, LogicalOp, RuleClause,
};
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::sample::SamplePayload;
use serde_json::json;

fn rule_with(
    primary: RuleClause,
    secondary: Option<RuleClause>,
    logical_op: Option<LogicalOp>,
) -> AlertRule {
    AlertRule {
        id: 1,
        workspace_id: 1,
        probe_id: Some(7),
        agent_id: None,
        primary_clause: primary,
        secondary_clause: secondary,
        logical_op,
        severity: AlertSeverity::Critical,
        notify_email: false,
        webhook_url: None,
        webhook_secret: None,
        enabled: true,
        created_at: Utc::now(),
    }
}

/**
 * CERTIFICACIÓN: Escenario de contrato — latencia 150 ms contra umbral
 * 100 ms dispara; 40 ms no dispara. Los RTT crudos llegan en ns.
 */
#[test]
fn certify_ping_latency_threshold_scenario() {
    println!("\n🧪 [PROVING_GROUNDS]: Auditing PING latency scenario...");

    let payload = SamplePayload::parse(
        ProbeType::Ping,
        json!({
            "start_timestamp": "2026-03-01T10:00:00Z",
            "stop_timestamp": "2026-03-01T10:00:05Z",
            "packets_sent": 10, "packets_recv": 10, "packet_loss": 0.0,
            "min_rtt": 90_000_000.0, "avg_rtt": 150_000_000.0,
            "max_rtt": 210_000_000.0, "std_dev_rtt": 5_000_000.0,
            "addr": "1.1.1.1"
        }),
    )
    .unwrap();

    let latency_rule = rule_with(
        RuleClause { metric: AlertMetric::Latency, op: CompareOp::Gt, threshold: 100.0 },
        None,
        None,
    );
    let context = EvalContext::default();

    let verdict = evaluate_rule(&latency_rule, |metric| extract_metric(metric, &payload, &context))
        .expect("Applicable rule must yield a verdict.");

    assert!(verdict.triggered, "150 ms must breach a 100 ms gt threshold.");
    assert_eq!(verdict.observed_value, 150.0);
    assert_eq!(verdict.message, "latency gt 100.00 (observed 150.00)");

    println!("   ✅ [VERDICT]: Latency scenario certified.");
}

/**
 * CERTIFICACIÓN: La regla compuesta con secundaria inaplicable se salta
 * por completo, jamás se degrada a evaluación simple.
 */
#[test]
fn certify_compound_rule_strictness_over_payload() {
    let payload = SamplePayload::parse(
        ProbeType::Ping,
        json!({
            "start_timestamp": "2026-03-01T10:00:00Z",
            "stop_timestamp": "2026-03-01T10:00:05Z",
            "packets_sent": 10, "packets_recv": 5, "packet_loss": 50.0,
            "min_rtt": 90_000_000.0, "avg_rtt": 500_000_000.0,
            "max_rtt": 900_000_000.0, "std_dev_rtt": 80_000_000.0,
            "addr": "10.0.0.9"
        }),
    )
    .unwrap();
    let context = EvalContext::default();

    // Secundaria cpu_usage no existe en un payload PING.
    let skipped_rule = rule_with(
        RuleClause { metric: AlertMetric::Latency, op: CompareOp::Gt, threshold: 100.0 },
        Some(RuleClause { metric: AlertMetric::CpuUsage, op: CompareOp::Gt, threshold: 90.0 }),
        Some(LogicalOp::And),
    );
    assert!(
        evaluate_rule(&skipped_rule, |metric| extract_metric(metric, &payload, &context)).is_none(),
        "Inapplicable secondary must skip the whole rule."
    );

    // Compuesta aplicable: latency>100 AND packet_loss>=25 -> dispara.
    let compound_rule = rule_with(
        RuleClause { metric: AlertMetric::Latency, op: CompareOp::Gt, threshold: 100.0 },
        Some(RuleClause { metric: AlertMetric::PacketLoss, op: CompareOp::Gte, threshold: 25.0 }),
        Some(LogicalOp::And),
    );
    let verdict = evaluate_rule(&compound_rule, |metric| extract_metric(metric, &payload, &context))
        .expect("Applicable compound rule must yield a verdict.");
    assert!(verdict.triggered);
}

/**
 * CERTIFICACIÓN: Métricas MTR del último salto y del peor salto.
 */
#[test]
fn certify_mtr_hop_metrics_matrix() {
    let payload = SamplePayload::parse(
        ProbeType::Mtr,
        json!({
            "start_timestamp": "2026-03-01T10:00:00Z",
            "stop_timestamp": "2026-03-01T10:00:30Z",
            "report": {
                "info": { "target": { "ip": "1.1.1.1", "hostname": "" } },
                "hops": [
                    { "ttl": 1, "hosts": [{"ip": "10.0.0.1", "hostname": ""}],
                      "loss_pct": "30.0", "avg": "2.0", "best": "1.0", "worst": "4.0",
                      "sent": 10, "recv": 7 },
                    { "ttl": 2, "hosts": [{"ip": "1.1.1.1", "hostname": ""}],
                      "loss_pct": "10.0", "avg": "18.5", "best": "12.0", "worst": "40.0",
                      "sent": 10, "recv": 9 }
                ]
            }
        }),
    )
    .unwrap();
    let context = EvalContext::default();

    assert_eq!(extract_metric(AlertMetric::EndHopLoss, &payload, &context), Some(10.0));
    assert_eq!(extract_metric(AlertMetric::EndHopLatency, &payload, &context), Some(18.5));
    assert_eq!(extract_metric(AlertMetric::WorstHopLoss, &payload, &context), Some(30.0));
}

/**
 * CERTIFICACIÓN: SYSINFO — fórmulas de uso de CPU y memoria sobre el
 * contrato de inventario del agente.
 */
#[test]
fn certify_sysinfo_usage_matrix() {
    let payload = SamplePayload::parse(
        ProbeType::SysInfo,
        json!({
            "hostInfo": { "hostname": "edge-07" },
            "memoryInfo": {
                "total_bytes": 16_000_000_000u64,
                "used_bytes": 12_000_000_000u64,
                "available_bytes": 4_000_000_000u64,
                "free_Bytes": 2_000_000_000u64
            },
            "CPUTimes": {
                "user": 400.0, "system": 100.0, "idle": 400.0, "iowait": 50.0,
                "irq": 10.0, "nice": 20.0, "softIRQ": 10.0, "steal": 10.0
            }
        }),
    )
    .unwrap();
    let context = EvalContext::default();

    // busy = 400+100+20+10+10+10 = 550 ; total = 550+400+50 = 1000.
    assert_eq!(extract_metric(AlertMetric::CpuUsage, &payload, &context), Some(55.0));
    assert_eq!(extract_metric(AlertMetric::MemoryUsage, &payload, &context), Some(75.0));
}

/**
 * CERTIFICACIÓN: `eq` es igualdad exacta de flotantes (política documentada).
 */
#[test]
fn certify_eq_operator_exactness() {
    let payload = SamplePayload::parse(
        ProbeType::TrafficSim,
        json!({
            "lostPackets": 0, "lossPercentage": 0.0, "outOfSequence": 0,
            "duplicatePackets": 0, "totalPackets": 100,
            "averageRTT": 25.0, "minRTT": 20.0, "maxRTT": 30.0, "stdDevRTT": 1.5,
            "timestamp": "2026-03-01T10:00:00Z"
        }),
    )
    .unwrap();
    let context = EvalContext::default();

    let exact_rule = rule_with(
        RuleClause { metric: AlertMetric::Latency, op: CompareOp::Eq, threshold: 25.0 },
        None,
        None,
    );
    assert!(evaluate_rule(&exact_rule, |m| extract_metric(m, &payload, &context)).unwrap().triggered);

    let near_rule = rule_with(
        RuleClause { metric: AlertMetric::Latency, op: CompareOp::Eq, threshold: 25.000001 },
        None,
        None,
    );
    assert!(!evaluate_rule(&near_rule, |m| extract_metric(m, &payload, &context)).unwrap().triggered);
}
