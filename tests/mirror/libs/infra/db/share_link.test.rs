// [tests/mirror/libs/infra/db/share_link.test.rs]
/**
 * =================================================================
 * APARATO: SHARE LINK PERSISTENCE TEST (V2.1)
 * CLASIFICACIÓN: TRINITY EVIDENCE // ESTRATO L3-MIRROR
 * RESPONSABILIDAD: TOKENS DE 256 BITS, EXPIRACIÓN Y REVOCACIÓN
 * =================================================================
 */

use chrono::{Duration, Utc};
use netwatcher_infra_db::repositories::ShareLinkRepository;
use netwatcher_infra_db::{DbClient, DbError};

#[tokio::test]
async fn certify_share_token_shape_and_roundtrip() {
    println!("\n🔗 [PROVING_GROUNDS]: Auditing share link strata...");

    let client = DbClient::connect("file:share_v2?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let shares = ShareLinkRepository::new(client.clone());

    let share = shares
        .create_share(1, 42, Some("$2b$10$fakedigestfakedigest".into()),
            Utc::now() + Duration::hours(1), true)
        .await
        .unwrap();

    // Token de 256 bits URL-safe: 64 caracteres hexadecimales.
    assert_eq!(share.token.len(), 64);
    assert!(share.token.chars().all(|c| c.is_ascii_hexdigit()));
    assert!(share.has_password());
    assert!(share.allow_speedtest);
    assert!(!share.is_expired(Utc::now()));

    let recovered = shares.fetch_by_token(&share.token).await.unwrap();
    assert_eq!(recovered.agent_id, 42);
    assert_eq!(recovered.password_hash, share.password_hash);
}

#[tokio::test]
async fn certify_expiry_is_absolute_and_revocation_final() {
    let client = DbClient::connect("file:share_expiry_v2?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let shares = ShareLinkRepository::new(client.clone());

    // Concesión nacida muerta: expiración en el pasado.
    let expired = shares
        .create_share(1, 7, None, Utc::now() - Duration::minutes(5), false)
        .await
        .unwrap();

    // El repositorio NO evalúa la expiración: esa señal (410) es del gateway.
    let fetched = shares.fetch_by_token(&expired.token).await.unwrap();
    assert!(fetched.is_expired(Utc::now()));

    // Revocación: el token deja de existir (404 genuino).
    shares.revoke(&expired.token).await.unwrap();
    assert!(matches!(shares.fetch_by_token(&expired.token).await, Err(DbError::NotFound)));
    assert!(matches!(shares.revoke(&expired.token).await, Err(DbError::NotFound)));
}

#[tokio::test]
async fn certify_token_uniqueness_across_mints() {
    let client = DbClient::connect("file:share_unique_v2?mode=memory&cache=shared", None)
        .await
        .unwrap();
    let shares = ShareLinkRepository::new(client.clone());

    let mut minted_tokens = std::collections::HashSet::new();
    for _ in 0..16 {
        let share = shares
            .create_share(1, 1, None, Utc::now() + Duration::hours(1), false)
            .await
            .unwrap();
        assert!(minted_tokens.insert(share.token), "OS RNG must not repeat tokens.");
    }
}
