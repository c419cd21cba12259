// [tests/mirror/libs/infra/db/route_baseline.test.rs]
/**
 * =================================================================
 * APARATO: ROUTE BASELINE TEST (V2.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: UNA FILA POR SONDA, UPSERT Y BORRADO EN CASCADA
 * =================================================================
 */

use netwatcher_domain_models::probe::ProbeType;
use netwatcher_infra_db::repositories::probe::{ProbeSpec, TargetSpec};
use netwatcher_infra_db::repositories::{ProbeRepository, RouteBaselineRepository};
use netwatcher_infra_db::DbClient;
use std::collections::HashMap;

fn mtr_probe_spec() -> ProbeSpec {
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
    }
}

#[tokio::test]
async fn certify_baseline_upsert_uniqueness() {
    println!("\n🧭 [PROVING_GROUNDS]: Auditing route baseline strata...");

    let client = DbClient::connect("file:baseline_v2?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let baselines = RouteBaselineRepository::new(client.clone());

    assert!(baselines.fetch(50).await.unwrap().is_none(), "Genesis: no baseline.");

    // 1. GÉNESIS: primera huella registrada.
    baselines.upsert(50, "aaaa111122223333", "10.0.0.1 -> 1.1.1.1", 2).await.unwrap();
    let genesis = baselines.fetch(50).await.unwrap().unwrap();
    assert_eq!(genesis.fingerprint, "aaaa111122223333");
    assert_eq!(genesis.hop_count, 2);

    // 2. AVANCE: el upsert reemplaza, jamás duplica (una fila por sonda).
    baselines.upsert(50, "bbbb444455556666", "10.0.0.1 -> 10.0.9.9 -> 1.1.1.1", 3).await.unwrap();
    let advanced = baselines.fetch(50).await.unwrap().unwrap();
    assert_eq!(advanced.fingerprint, "bbbb444455556666");
    assert_eq!(advanced.hop_count, 3);

    let connection = client.get_connection().unwrap();
    let mut rows = connection
        .query("SELECT COUNT(*) FROM route_baselines WHERE probe_id = 50", ())
        .await
        .unwrap();
    let count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
    assert_eq!(count, 1, "Exactly one baseline row per probe.");

    println!("   ✅ [SUCCESS]: Baseline uniqueness certified.");
}

#[tokio::test]
async fn certify_baseline_dies_with_probe() {
    let client = DbClient::connect("file:baseline_cascade_v2?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let probes = ProbeRepository::new(client.clone());
    let baselines = RouteBaselineRepository::new(client.clone());

    let probe = probes.create_probe(1, 1, mtr_probe_spec()).await.unwrap();
    baselines.upsert(probe.id, "cccc777788889999", "10.0.0.1 -> 1.1.1.1", 2).await.unwrap();

    probes.delete_probe(probe.id).await.unwrap();

    assert!(baselines.fetch(probe.id).await.unwrap().is_none(),
        "Deleting the probe must drag its baseline.");
}
