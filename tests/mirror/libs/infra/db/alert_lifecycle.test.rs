// [tests/mirror/libs/infra/db/alert_lifecycle.test.rs]
/**
 * =================================================================
 * APARATO: ALERT LIFECYCLE TEST (V4.0 - ROW GUARD)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: DEDUP POR (REGLA, ALCANCE), RESOLUCIÓN Y ACK
 * =================================================================
 */

use netwatcher_domain_models::alert::{AlertMetric, AlertScope, AlertSeverity, AlertStatus};
use netwatcher_infra_db::repositories::alert::TriggerContext;
use netwatcher_infra_db::repositories::AlertRepository;
use netwatcher_infra_db::{DbClient, DbError};

async fn trigger_once(
    alerts: &AlertRepository,
    rule_id: i64,
    scope: AlertScope,
) -> Option<netwatcher_domain_models::alert::Alert> {
    alerts
        .try_trigger(
            rule_id,
            1,
            scope,
            AlertMetric::Latency,
            150.0,
            100.0,
            AlertSeverity::Warning,
            "latency gt 100.00 (observed 150.00)",
            TriggerContext::default(),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn certify_single_active_alert_per_scope() {
    println!("\n🚨 [PROVING_GROUNDS]: Auditing alert deduplication guard...");

    let client = DbClient::connect("file:alert_dedup_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let alerts = AlertRepository::new(client.clone());
    let scope = AlertScope::Probe(10);

    // 1. PRIMER DISPARO: crea la alerta activa.
    let first = trigger_once(&alerts, 5, scope).await.expect("First trigger must create.");
    assert_eq!(first.status, AlertStatus::Active);

    // 2. SEGUNDO DISPARO: la guardia de fila lo convierte en no-op.
    assert!(trigger_once(&alerts, 5, scope).await.is_none(), "Dedup must suppress.");

    // 3. ALCANCE DISTINTO: la misma regla sobre otra sonda sí dispara.
    assert!(trigger_once(&alerts, 5, AlertScope::Probe(11)).await.is_some());

    // 4. RESOLUCIÓN AUTOMÁTICA: valor sano cierra la alerta abierta.
    let resolved = alerts.resolve_open(5, scope).await.unwrap().expect("Open alert must resolve.");
    assert_eq!(resolved.status, AlertStatus::Resolved);
    assert!(resolved.resolved_at.is_some());

    // 5. RE-DISPARO POST-RESOLUCIÓN: permitido (nueva instancia histórica).
    assert!(trigger_once(&alerts, 5, scope).await.is_some());

    println!("   ✅ [SUCCESS]: Row-guard linearization certified.");
}

#[tokio::test]
async fn certify_acknowledge_is_idempotent_and_resolve_terminal() {
    let client = DbClient::connect("file:alert_ack_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let alerts = AlertRepository::new(client.clone());
    let scope = AlertScope::Agent(42);

    let alert = trigger_once(&alerts, 9, scope).await.unwrap();

    // 1. RECONOCIMIENTO: active -> acknowledged, operador registrado.
    let acknowledged = alerts.acknowledge(alert.id, 777).await.unwrap();
    assert_eq!(acknowledged.status, AlertStatus::Acknowledged);
    assert_eq!(acknowledged.acknowledged_by, Some(777));
    let first_stamp = acknowledged.acknowledged_at;

    // 2. IDEMPOTENCIA: el segundo ack conserva el primer sello.
    let re_acknowledged = alerts.acknowledge(alert.id, 888).await.unwrap();
    assert_eq!(re_acknowledged.acknowledged_by, Some(777));
    assert_eq!(re_acknowledged.acknowledged_at, first_stamp);

    // 3. UNA ALERTA RECONOCIDA SIGUE ABIERTA: el valor sano la resuelve.
    let resolved = alerts.resolve_open(9, scope).await.unwrap().expect("Acknowledged is open.");
    assert_eq!(resolved.status, AlertStatus::Resolved);

    // 4. TERMINAL: ni ack ni resolve aplican sobre una resuelta.
    assert!(matches!(alerts.acknowledge(alert.id, 999).await, Err(DbError::NotFound)));
    assert!(matches!(alerts.resolve_by_id(alert.id).await, Err(DbError::NotFound)));
}

#[tokio::test]
async fn certify_workspace_listing_filters() {
    let client = DbClient::connect("file:alert_list_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let alerts = AlertRepository::new(client.clone());

    trigger_once(&alerts, 1, AlertScope::Probe(1)).await.unwrap();
    let second = trigger_once(&alerts, 2, AlertScope::Probe(2)).await.unwrap();
    alerts.resolve_by_id(second.id).await.unwrap();

    let active_only = alerts.list_alerts(1, Some(AlertStatus::Active), 100).await.unwrap();
    assert_eq!(active_only.len(), 1);

    let full_inventory = alerts.list_alerts(1, None, 100).await.unwrap();
    assert_eq!(full_inventory.len(), 2);
}
