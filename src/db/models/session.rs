//! Server-side session stores for admin and member logins.
//!
//! Both stores use the same scheme: the cookie carries a raw bearer token,
//! the database carries its SHA-256 digest with an expiry. Resolution checks
//! digest equality, expiry, and that the owning identity is still active; a
//! miss never says which of those failed.

use sqlx::SqlitePool;

use crate::crypto::{generate_token, hash_token};
use crate::db::{Admin, Client};

/// Session lifetime for both admin and member sessions.
pub const SESSION_TTL_HOURS: i64 = 24;

/// Create a session for an admin and return the raw bearer token.
/// The raw token is never persisted.
pub async fn create_admin_session(
    db: &SqlitePool,
    admin_id: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<String, sqlx::Error> {
    let (raw, token_hash) = generate_token();
    insert_session(db, "admin_sessions", "admin_id", admin_id, &token_hash, ip_address, user_agent)
        .await?;
    Ok(raw)
}

/// Resolve a presented admin token to its active owner, or None.
pub async fn resolve_admin_session(
    db: &SqlitePool,
    raw_token: &str,
) -> Result<Option<Admin>, sqlx::Error> {
    let token_hash = hash_token(raw_token);
    sqlx::query_as(
        r#"
        SELECT a.* FROM admins a
        JOIN admin_sessions s ON s.admin_id = a.id
        WHERE s.token_hash = ? AND s.expires_at > ? AND a.is_active = 1
        "#,
    )
    .bind(&token_hash)
    .bind(chrono::Utc::now().to_rfc3339())
    .fetch_optional(db)
    .await
}

/// Delete the session matching the presented token. Idempotent.
pub async fn destroy_admin_session(db: &SqlitePool, raw_token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM admin_sessions WHERE token_hash = ?")
        .bind(hash_token(raw_token))
        .execute(db)
        .await?;
    Ok(())
}

/// Create a session for a client and return the raw bearer token.
pub async fn create_member_session(
    db: &SqlitePool,
    client_id: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<String, sqlx::Error> {
    let (raw, token_hash) = generate_token();
    insert_session(
        db,
        "member_sessions",
        "client_id",
        client_id,
        &token_hash,
        ip_address,
        user_agent,
    )
    .await?;
    Ok(raw)
}

pub async fn resolve_member_session(
    db: &SqlitePool,
    raw_token: &str,
) -> Result<Option<Client>, sqlx::Error> {
    let token_hash = hash_token(raw_token);
    sqlx::query_as(
        r#"
        SELECT c.* FROM clients c
        JOIN member_sessions s ON s.client_id = c.id
        WHERE s.token_hash = ? AND s.expires_at > ? AND c.is_active = 1
        "#,
    )
    .bind(&token_hash)
    .bind(chrono::Utc::now().to_rfc3339())
    .fetch_optional(db)
    .await
}

pub async fn destroy_member_session(db: &SqlitePool, raw_token: &str) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM member_sessions WHERE token_hash = ?")
        .bind(hash_token(raw_token))
        .execute(db)
        .await?;
    Ok(())
}

/// Revoke every session belonging to an admin. Used when the account is
/// deactivated so the change takes effect immediately.
pub async fn destroy_sessions_for_admin(
    db: &SqlitePool,
    admin_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM admin_sessions WHERE admin_id = ?")
        .bind(admin_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// Revoke every session belonging to a client.
pub async fn destroy_sessions_for_client(
    db: &SqlitePool,
    client_id: &str,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM member_sessions WHERE client_id = ?")
        .bind(client_id)
        .execute(db)
        .await?;
    Ok(result.rows_affected())
}

/// Delete every expired session and magic-link token.
/// Housekeeping only; never called on the request path.
pub async fn sweep_expired_sessions(db: &SqlitePool) -> Result<u64, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let mut swept = 0u64;

    for table in ["admin_sessions", "member_sessions", "magic_link_tokens"] {
        let sql = format!("DELETE FROM {} WHERE expires_at <= ?", table);
        let result = sqlx::query(&sql).bind(&now).execute(db).await?;
        swept += result.rows_affected();
    }

    Ok(swept)
}

async fn insert_session(
    db: &SqlitePool,
    table: &str,
    owner_column: &str,
    owner_id: &str,
    token_hash: &str,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now();
    let expires_at = now + chrono::Duration::hours(SESSION_TTL_HOURS);

    let sql = format!(
        r#"
        INSERT INTO {} (id, {}, token_hash, expires_at, ip_address, user_agent, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        table, owner_column
    );

    sqlx::query(&sql)
        .bind(&id)
        .bind(owner_id)
        .bind(token_hash)
        .bind(expires_at.to_rfc3339())
        .bind(ip_address)
        .bind(user_agent)
        .bind(now.to_rfc3339())
        .execute(db)
        .await?;

    Ok(())
}
