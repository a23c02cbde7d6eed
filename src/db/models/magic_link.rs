//! Single-use magic-link tokens for passwordless member login.

use sqlx::SqlitePool;

use crate::crypto::{generate_token, hash_token};
use crate::db::Client;

/// Magic links are short-lived compared to sessions.
pub const MAGIC_LINK_TTL_MINUTES: i64 = 60;

/// Issue a magic-link token for a client and return the raw token for
/// out-of-band delivery. Only the digest is stored.
pub async fn issue_magic_link(db: &SqlitePool, client_id: &str) -> Result<String, sqlx::Error> {
    let (raw, token_hash) = generate_token();
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let expires_at = now + chrono::Duration::minutes(MAGIC_LINK_TTL_MINUTES);

    sqlx::query(
        r#"
        INSERT INTO magic_link_tokens (id, client_id, token_hash, expires_at, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(client_id)
    .bind(&token_hash)
    .bind(expires_at.to_rfc3339())
    .bind(now.to_rfc3339())
    .execute(db)
    .await?;

    Ok(raw)
}

/// Redeem a magic-link token, consuming it.
///
/// The row is deleted in the same statement that matches it, so a token can
/// be redeemed at most once even under concurrent requests. Returns the
/// owning active client, or None for an unknown, expired, or already-used
/// token; callers cannot tell which.
pub async fn redeem_magic_link(
    db: &SqlitePool,
    raw_token: &str,
) -> Result<Option<Client>, sqlx::Error> {
    let token_hash = hash_token(raw_token);
    let now = chrono::Utc::now().to_rfc3339();

    let client_id: Option<(String,)> = sqlx::query_as(
        "DELETE FROM magic_link_tokens WHERE token_hash = ? AND expires_at > ? RETURNING client_id",
    )
    .bind(&token_hash)
    .bind(&now)
    .fetch_optional(db)
    .await?;

    let Some((client_id,)) = client_id else {
        return Ok(None);
    };

    sqlx::query_as("SELECT * FROM clients WHERE id = ? AND is_active = 1")
        .bind(&client_id)
        .fetch_optional(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{self, PlanTier};

    async fn test_db() -> SqlitePool {
        db::connect("sqlite::memory:").await.unwrap()
    }

    async fn seed_client(db: &SqlitePool) -> Client {
        db::create_client(db, "member@example.com", "Example LLC", PlanTier::Essential)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_link_redeems_before_expiry() {
        let db = test_db().await;
        let client = seed_client(&db).await;

        let raw = issue_magic_link(&db, &client.id).await.unwrap();
        let redeemed = redeem_magic_link(&db, &raw).await.unwrap().unwrap();
        assert_eq!(redeemed.id, client.id);
    }

    #[tokio::test]
    async fn test_link_is_single_use() {
        let db = test_db().await;
        let client = seed_client(&db).await;

        let raw = issue_magic_link(&db, &client.id).await.unwrap();
        assert!(redeem_magic_link(&db, &raw).await.unwrap().is_some());
        assert!(redeem_magic_link(&db, &raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_link_is_rejected() {
        let db = test_db().await;
        let client = seed_client(&db).await;

        let raw = issue_magic_link(&db, &client.id).await.unwrap();

        let past = (chrono::Utc::now() - chrono::Duration::minutes(1)).to_rfc3339();
        sqlx::query("UPDATE magic_link_tokens SET expires_at = ?")
            .bind(&past)
            .execute(&db)
            .await
            .unwrap();

        assert!(redeem_magic_link(&db, &raw).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_garbage_token_is_rejected() {
        let db = test_db().await;
        seed_client(&db).await;
        assert!(redeem_magic_link(&db, "ffffffff").await.unwrap().is_none());
    }
}
