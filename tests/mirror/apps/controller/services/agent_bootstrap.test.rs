// [tests/mirror/apps/controller/services/agent_bootstrap.test.rs]
/**
 * =================================================================
 * APARATO: AGENT BOOTSTRAP TEST (V5.0 - STATE MACHINE)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L4-MIRROR
 * RESPONSABILIDAD: UNINITIALISED -> PIN_ISSUED -> INITIALISED
 * =================================================================
 */

use netwatcher_controller::config::ControllerConfig;
use netwatcher_controller::services::authenticator::AuthError;
use netwatcher_controller::state::AppState;
use netwatcher_domain_models::wire::AgentEnvelope;
use netwatcher_infra_db::DbClient;
use std::collections::HashMap;

fn fast_hash_config() -> ControllerConfig {
    // Coste bcrypt mínimo para el Proving Grounds; producción usa DEFAULT_COST.
    ControllerConfig { password_hash_cost: 4, ..ControllerConfig::default() }
}

async fn ignite_state(ledger_name: &str) -> AppState {
    let client = DbClient::connect(
        &format!("file:{}?mode=memory&cache=shared", ledger_name),
        None,
    )
    .await
    .expect("FALLO_CRÍTICO: No se pudo anclar el Ledger en RAM.");
    AppState::new(client, fast_hash_config())
}

#[tokio::test]
async fn certify_bootstrap_state_machine() {
    println!("\n🔐 [PROVING_GROUNDS]: Auditing PIN -> PSK exchange...");

    let state = ignite_state("bootstrap_sm_v5").await;

    let agent = state
        .agent_repository
        .create_agent(1, "edge-eu-01", "", "Frankfurt", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    // 1. EMISIÓN: PIN de 9 dígitos uniformes, exhibido una vez.
    let pin_plaintext = state.authenticator.issue_pin(1, agent.id, None).await.unwrap();
    assert_eq!(pin_plaintext.len(), 9);
    assert!(pin_plaintext.chars().all(|c| c.is_ascii_digit()));

    // 2. BOOTSTRAP: PSK de 64 hex retorna exactamente una vez.
    let psk_plaintext = state
        .authenticator
        .bootstrap(1, agent.id, &pin_plaintext)
        .await
        .expect("Valid PIN must exchange for a PSK.");
    assert_eq!(psk_plaintext.len(), 64);
    assert!(psk_plaintext.chars().all(|c| c.is_ascii_hexdigit()));

    let initialized = state.agent_repository.fetch_scoped(1, agent.id).await.unwrap();
    assert!(initialized.initialized, "Bootstrap must flip the initialized flag.");
    assert!(initialized.psk_hash.is_some(), "Bootstrap must store the PSK digest.");

    // 3. REUTILIZACIÓN: el mismo PIN consumido es InvalidPin, no PinExpired.
    let replay = state.authenticator.bootstrap(1, agent.id, &pin_plaintext).await;
    assert!(matches!(replay, Err(AuthError::InvalidPin)));

    // 4. SESIÓN: el PSK emitido autentica; uno ajeno no.
    let valid_envelope = AgentEnvelope { workspace_id: 1, agent_id: agent.id, psk: psk_plaintext.clone() };
    let session = state.authenticator.authenticate(&valid_envelope).await.unwrap();
    assert_eq!(session.agent_id, agent.id);

    let foreign_envelope = AgentEnvelope { workspace_id: 1, agent_id: agent.id, psk: "f".repeat(64) };
    assert!(matches!(
        state.authenticator.authenticate(&foreign_envelope).await,
        Err(AuthError::InvalidPsk)
    ));

    println!("   ✅ [SUCCESS]: Bootstrap state machine certified.");
}

#[tokio::test]
async fn certify_psk_rotation_atomically_invalidates() {
    let state = ignite_state("bootstrap_rotate_v5").await;

    let agent = state
        .agent_repository
        .create_agent(1, "edge-us-02", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    let pin = state.authenticator.issue_pin(1, agent.id, None).await.unwrap();
    let original_psk = state.authenticator.bootstrap(1, agent.id, &pin).await.unwrap();

    // Rotación: el digest anterior muere en el mismo commit.
    let rotated_psk = state.authenticator.rotate_psk(1, agent.id).await.unwrap();
    assert_ne!(original_psk, rotated_psk);

    let stale_envelope = AgentEnvelope { workspace_id: 1, agent_id: agent.id, psk: original_psk };
    assert!(matches!(
        state.authenticator.authenticate(&stale_envelope).await,
        Err(AuthError::InvalidPsk)
    ));

    let fresh_envelope = AgentEnvelope { workspace_id: 1, agent_id: agent.id, psk: rotated_psk };
    assert!(state.authenticator.authenticate(&fresh_envelope).await.is_ok());
}

#[tokio::test]
async fn certify_retired_agent_receives_terminal_signal() {
    let state = ignite_state("bootstrap_retired_v5").await;

    let agent = state
        .agent_repository
        .create_agent(1, "edge-apac-03", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();
    let pin = state.authenticator.issue_pin(1, agent.id, None).await.unwrap();
    let psk = state.authenticator.bootstrap(1, agent.id, &pin).await.unwrap();

    state.agent_repository.soft_delete(1, agent.id).await.unwrap();

    // La tombstone precede a la verificación de PSK: señal terminal 410.
    let envelope = AgentEnvelope { workspace_id: 1, agent_id: agent.id, psk };
    assert!(matches!(
        state.authenticator.authenticate(&envelope).await,
        Err(AuthError::AgentDeleted)
    ));

    // El bootstrap de un retirado también es terminal.
    let second_pin_attempt = state.authenticator.bootstrap(1, agent.id, "000000000").await;
    assert!(matches!(second_pin_attempt, Err(AuthError::AgentDeleted)));
}

#[tokio::test]
async fn certify_expired_pin_is_distinct_from_invalid() {
    let state = ignite_state("bootstrap_expiry_v5").await;

    let agent = state
        .agent_repository
        .create_agent(1, "edge-sa-04", "", "", &HashMap::new(), &HashMap::new())
        .await
        .unwrap();

    // PIN con vigencia negativa: nace expirado.
    let expired_pin = state.authenticator.issue_pin(1, agent.id, Some(-1)).await.unwrap();

    let verdict = state.authenticator.bootstrap(1, agent.id, &expired_pin).await;
    assert!(matches!(verdict, Err(AuthError::PinExpired)),
        "A matching-but-expired PIN must report PinExpired, not InvalidPin.");

    // Material que no coincide con ningún PIN: InvalidPin.
    let verdict = state.authenticator.bootstrap(1, agent.id, "123456789").await;
    assert!(matches!(verdict, Err(AuthError::InvalidPin)));
}
