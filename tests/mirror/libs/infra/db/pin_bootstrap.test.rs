// [tests/mirror/libs/infra/db/pin_bootstrap.test.rs]
/**
 * =================================================================
 * APARATO: PIN BOOTSTRAP PERSISTENCE TEST (V3.0)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: CERTIFICACIÓN DEL CICLO PIN -> CONSUMO -> PSK
 * =================================================================
 */

use netwatcher_infra_db::repositories::{AgentRepository, PinRepository};
use netwatcher_infra_db::{DbClient, DbError};
use std::collections::HashMap;

#[tokio::test]
async fn certify_pin_single_consumption_and_plaintext_clearing() {
    println!("\n🔑 [PROVING_GROUNDS]: Auditing PIN bootstrap strata...");

    // 1. SETUP: Ledger en memoria compartida
    let client = DbClient::connect("file:pin_boot_v3?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let agents = AgentRepository::new(client.clone());
    let pins = PinRepository::new(client.clone());

    let agent = agents
        .create_agent(1, "edge-probe-01", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    assert!(!agent.initialized);

    // 2. EMISIÓN: el plaintext queda visible para el administrador.
    let issued = pins
        .issue_pin(1, agent.id, "$2b$10$fakehashfakehashfakehash", "492015777", None)
        .await
        .unwrap();
    assert_eq!(issued.pin_plaintext.as_deref(), Some("492015777"));

    let surfaced = pins.surface_pending_pin(1, agent.id).await.unwrap();
    assert!(surfaced.is_some(), "A pending PIN must surface for the panel.");

    // 3. CONSUMO: consumed_at estampado y plaintext limpiado en la MISMA sentencia.
    assert!(pins.consume_pin(issued.id).await.unwrap(), "First consumption must succeed.");
    assert!(!pins.consume_pin(issued.id).await.unwrap(), "Second consumption must be inert.");

    let remaining = pins.unconsumed_pins(1, agent.id).await.unwrap();
    assert!(remaining.is_empty(), "Consumed PINs must leave the unconsumed set.");

    // Verificación directa del invariante de limpieza.
    let connection = client.get_connection().unwrap();
    let mut rows = connection
        .query("SELECT pin_plaintext, consumed_at FROM agent_pins WHERE id = ?1", libsql::params![issued.id])
        .await
        .unwrap();
    let row = rows.next().await.unwrap().unwrap();
    assert!(row.get::<Option<String>>(0).unwrap().is_none(), "Plaintext must be cleared.");
    assert!(row.get::<Option<String>>(1).unwrap().is_some(), "consumed_at must be stamped.");

    // 4. SELLADO DE BOOTSTRAP: initialized + digest de PSK.
    agents.seal_bootstrap(1, agent.id, "a".repeat(64).as_str()).await.unwrap();
    let sealed = agents.fetch_scoped(1, agent.id).await.unwrap();
    assert!(sealed.initialized);
    assert_eq!(sealed.psk_hash.as_deref().map(str::len), Some(64));

    println!("   ✅ [SUCCESS]: PIN lifecycle and bootstrap seal certified.");
}

#[tokio::test]
async fn certify_tombstone_produces_gone_signal() {
    let client = DbClient::connect("file:pin_gone_v3?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let agents = AgentRepository::new(client.clone());

    let agent = agents
        .create_agent(1, "edge-probe-02", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    agents.soft_delete(1, agent.id).await.unwrap();

    // Ruta por defecto: señal *gone*, distinta de *not found*.
    assert!(matches!(agents.fetch_scoped(1, agent.id).await, Err(DbError::AgentGone)));

    // Ruta Unscoped: la fila sigue visible con su tombstone.
    let tombstoned = agents.fetch_unscoped(1, agent.id).await.unwrap();
    assert!(tombstoned.is_deleted());

    // Inexistente: *not found* genuino.
    assert!(matches!(agents.fetch_scoped(1, 9_999).await, Err(DbError::NotFound)));

    // El inventario del workspace oculta las tombstones.
    assert!(agents.list_by_workspace(1).await.unwrap().is_empty());
}
