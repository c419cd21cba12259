// [tests/mirror/libs/infra/db/identity_governance.test.rs]
/**
 * =================================================================
 * APARATO: IDENTITY GOVERNANCE TEST (V4.0 - OWNER INVARIANT)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: OWNER ÚNICO, TRANSFERENCIA ATÓMICA Y SESIONES
 * =================================================================
 */

use chrono::{Duration, Utc};
use netwatcher_domain_models::workspace::MemberRole;
use netwatcher_infra_db::repositories::IdentityRepository;
use netwatcher_infra_db::{DbClient, DbError};

#[tokio::test]
async fn certify_single_owner_invariant_across_transfer() {
    println!("\n👑 [PROVING_GROUNDS]: Auditing ownership governance...");

    let client = DbClient::connect("file:identity_gov_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let identity = IdentityRepository::new(client.clone());

    // 1. GÉNESIS: workspace con su OWNER fundacional.
    let founder_id = identity.upsert_user("founder@netwatcher.io").await.unwrap();
    let workspace = identity
        .create_workspace("observability-hq", founder_id, "founder@netwatcher.io")
        .await
        .unwrap();

    assert_eq!(
        identity.member_role(workspace.id, founder_id).await.unwrap(),
        MemberRole::Owner
    );

    // 2. SEGUNDO MIEMBRO: invitación + aceptación simulada por SQL directo
    // (la tubería de aceptación de invites es colaborador externo).
    let successor_id = identity.upsert_user("successor@netwatcher.io").await.unwrap();
    identity
        .create_invite(
            workspace.id,
            "successor@netwatcher.io",
            MemberRole::Admin,
            "invite-token-001",
            Utc::now() + Duration::hours(168),
        )
        .await
        .unwrap();

    let connection = client.get_connection().unwrap();
    connection
        .execute(
            "UPDATE members SET user_id = ?1, accepted_at = ?2 WHERE workspace_id = ?3 AND email = 'successor@netwatcher.io'",
            libsql::params![successor_id, Utc::now().to_rfc3339(), workspace.id],
        )
        .await
        .unwrap();

    // 3. TRANSFERENCIA ATÓMICA: demote-then-promote en una transacción.
    identity
        .transfer_ownership(workspace.id, founder_id, successor_id)
        .await
        .unwrap();

    assert_eq!(identity.member_role(workspace.id, founder_id).await.unwrap(), MemberRole::Admin);
    assert_eq!(identity.member_role(workspace.id, successor_id).await.unwrap(), MemberRole::Owner);

    // 4. INVARIANTE: exactamente un OWNER en todo instante observable.
    let mut rows = connection
        .query(
            "SELECT COUNT(*) FROM members WHERE workspace_id = ?1 AND role = 'OWNER' AND revoked_at IS NULL",
            libsql::params![workspace.id],
        )
        .await
        .unwrap();
    let owner_count: i64 = rows.next().await.unwrap().unwrap().get(0).unwrap();
    assert_eq!(owner_count, 1);

    // 5. TRANSFERENCIA ILEGAL: el origen ya no es OWNER.
    let verdict = identity.transfer_ownership(workspace.id, founder_id, successor_id).await;
    assert!(matches!(verdict, Err(DbError::OwnershipViolation(_))));

    println!("   ✅ [SUCCESS]: Owner invariant preserved across transfer.");
}

#[tokio::test]
async fn certify_owner_invites_are_rejected() {
    let client = DbClient::connect("file:identity_invite_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let identity = IdentityRepository::new(client.clone());

    let founder_id = identity.upsert_user("root@netwatcher.io").await.unwrap();
    let workspace = identity
        .create_workspace("edge-fleet", founder_id, "root@netwatcher.io")
        .await
        .unwrap();

    // La propiedad sólo se concede vía transferencia, jamás por invite.
    let verdict = identity
        .create_invite(
            workspace.id,
            "usurper@netwatcher.io",
            MemberRole::Owner,
            "invite-token-002",
            Utc::now() + Duration::hours(1),
        )
        .await;
    assert!(matches!(verdict, Err(DbError::OwnershipViolation(_))));

    // Unicidad (workspace, email): el duplicado de invitación colisiona.
    identity
        .create_invite(workspace.id, "viewer@netwatcher.io", MemberRole::ReadOnly,
            "invite-token-003", Utc::now() + Duration::hours(1))
        .await
        .unwrap();
    let duplicate = identity
        .create_invite(workspace.id, "viewer@netwatcher.io", MemberRole::ReadOnly,
            "invite-token-004", Utc::now() + Duration::hours(1))
        .await;
    assert!(matches!(duplicate, Err(DbError::Conflict(_))));
}

#[tokio::test]
async fn certify_session_resolution_and_expiry() {
    let client = DbClient::connect("file:identity_session_v4?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let identity = IdentityRepository::new(client.clone());

    let operator_id = identity.upsert_user("operator@netwatcher.io").await.unwrap();

    identity
        .register_session("live-session-token", operator_id, Utc::now() + Duration::hours(8))
        .await
        .unwrap();
    identity
        .register_session("dead-session-token", operator_id, Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    assert_eq!(identity.resolve_session("live-session-token").await.unwrap(), operator_id);
    assert!(matches!(identity.resolve_session("dead-session-token").await, Err(DbError::NotFound)));
    assert!(matches!(identity.resolve_session("phantom-token").await, Err(DbError::NotFound)));
}
