// [tests/mirror/apps/controller/handlers/viewer_aggregation.test.rs]
/**
 * =================================================================
 * APARATO: VIEWER AGGREGATION TEST (V4.0 - BUCKET GRID)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: SELECCIÓN DE CUBETA POR RANGO Y DEGRADACIONES
 *
 * # Scenario (Contract):
 * Un rango de 3 h con agregación elige cubeta de 30 s y cada cubeta
 * promedia los avg_rtt crudos de su ventana. MTR jamás se agrega.
 * =================================================================
 */

use chrono::{Duration, TimeZone, Utc};
use netwatcher_controller::config::ControllerConfig;
use netwatcher_controller::handlers::viewer::{execute_series_query, SeriesQueryParams};
use netwatcher_controller::state::AppState;
use netwatcher_domain_models::probe::ProbeType;
use netwatcher_domain_models::sample::{ProbeSample, SamplePayload};
use netwatcher_infra_db::repositories::probe::{ProbeSpec, TargetSpec};
use netwatcher_infra_db::repositories::timeseries::SeriesQueryResult;
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

async fn forge_probe(state: &AppState, probe_type: ProbeType) -> netwatcher_domain_models::probe::Probe {
    let agent = state
        .agent_repository
        .create_agent(1, "edge-agg-01", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    state
        .probe_repository
        .create_probe(
            1,
            agent.id,
            ProbeSpec {
                probe_type,
                name: "historical".into(),
                interval_seconds: 60,
                duration_seconds: 0,
                count: 10,
                notifications: false,
                server_mode: false,
                reverse_of_probe_id: None,
                labels: HashMap::new(),
                metadata: HashMap::new(),
                targets: vec![TargetSpec { host: Some("1.1.1.1".into()), target_agent_id: None }],
            },
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn certify_three_hour_range_selects_thirty_second_buckets() {
    println!("\n📊 [PROVING_GROUNDS]: Auditing viewer bucket selection...");

    let state = ignite_state("viewer_agg_v4").await;
    let probe = forge_probe(&state, ProbeType::Ping).await;

    let window_start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    // 3 h de mediciones a 60 s de cadencia, avg_rtt constante de 20 ms.
    for minute in 0..180 {
        let created_at = window_start + Duration::minutes(minute);
        let payload = SamplePayload::parse(
            ProbeType::Ping,
            json!({
                "start_timestamp": created_at,
                "stop_timestamp": created_at + Duration::seconds(5),
                "packets_sent": 10, "packets_recv": 10, "packet_loss": 0.0,
                "min_rtt": 15_000_000.0, "avg_rtt": 20_000_000.0,
                "max_rtt": 30_000_000.0, "std_dev_rtt": 1_000_000.0,
                "addr": "1.1.1.1"
            }),
        )
        .unwrap();

        state
            .timeseries_repository
            .append(&ProbeSample {
                probe_id: probe.id,
                agent_id: probe.agent_id,
                probe_type: ProbeType::Ping,
                created_at,
                received_at: created_at,
                payload,
                triggered: false,
                triggered_reason: None,
            })
            .await
            .unwrap();
    }

    let query = SeriesQueryParams {
        from: Some(window_start),
        to: Some(window_start + Duration::hours(3)),
        probe_type: None,
        aggregate: true,
        limit: None,
    };

    let series = execute_series_query(&state, &probe, &query).await.unwrap();
    let SeriesQueryResult::PingBuckets(buckets) = series else {
        panic!("INTEGRITY_FAULT: A 3-hour aggregate query must yield PING buckets.");
    };

    // 180 muestras a 60 s con cubeta de 30 s: una cubeta poblada por minuto.
    assert_eq!(buckets.len(), 180);

    for bucket in &buckets {
        // Rejilla de 30 s: cada llave es múltiplo de la cubeta.
        assert_eq!(bucket.bucket % 30, 0);
        // El promedio de la cubeta es la media aritmética de sus crudos (ms).
        assert!((bucket.avg_latency - 20.0).abs() < 1e-9,
            "Observed {} ms", bucket.avg_latency);
        assert_eq!(bucket.packets_sent, 10);
        assert_eq!(bucket.packet_loss, 0.0);
    }

    // Conservación de paquetes a lo largo del rango completo.
    let total_sent: i64 = buckets.iter().map(|bucket| bucket.packets_sent).sum();
    assert_eq!(total_sent, 1_800);

    println!("   ✅ [SUCCESS]: Bucket grid selection certified.");
}

#[tokio::test]
async fn certify_short_range_stays_raw() {
    let state = ignite_state("viewer_raw_v4").await;
    let probe = forge_probe(&state, ProbeType::Ping).await;
    let window_start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    // Rango de 45 s: crudo aunque el visor pida agregación.
    let query = SeriesQueryParams {
        from: Some(window_start),
        to: Some(window_start + Duration::seconds(45)),
        probe_type: None,
        aggregate: true,
        limit: None,
    };

    let series = execute_series_query(&state, &probe, &query).await.unwrap();
    assert!(matches!(series, SeriesQueryResult::Raw(_)),
        "Ranges <= 60 s must be served raw.");
}

#[tokio::test]
async fn certify_mtr_never_aggregates() {
    let state = ignite_state("viewer_mtr_v4").await;
    let probe = forge_probe(&state, ProbeType::Mtr).await;
    let window_start = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

    // Agregación solicitada sobre un rango de 30 días: MTR degrada a crudo.
    let query = SeriesQueryParams {
        from: Some(window_start),
        to: Some(window_start + Duration::days(30)),
        probe_type: None,
        aggregate: true,
        limit: None,
    };

    let series = execute_series_query(&state, &probe, &query).await.unwrap();
    assert!(matches!(series, SeriesQueryResult::Raw(_)),
        "MTR aggregation must degrade to raw rows.");
}
