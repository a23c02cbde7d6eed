//! Audit log models for security-relevant actions.

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Append-only audit log entry
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditLog {
    pub id: String,
    pub actor_type: String,
    pub actor_id: Option<String>,
    pub action: String,
    pub target_type: Option<String>,
    pub target_id: Option<String>,
    pub details: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: String,
}

/// Response for listing audit logs with pagination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogListResponse {
    pub items: Vec<AuditLog>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

/// Query parameters for filtering audit logs
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    /// Filter by action (e.g., "auth.login")
    pub action: Option<String>,
    /// Filter by actor type ("admin", "client", "system")
    pub actor_type: Option<String>,
    /// Filter by actor ID
    pub actor_id: Option<String>,
    /// Filter by target type (e.g., "client", "case")
    pub target_type: Option<String>,
    /// Filter by target ID
    pub target_id: Option<String>,
    /// Start date for filtering (ISO 8601)
    pub start_date: Option<String>,
    /// End date for filtering (ISO 8601)
    pub end_date: Option<String>,
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

/// Who performed an audited action
pub mod actor_types {
    pub const ADMIN: &str = "admin";
    pub const CLIENT: &str = "client";
    pub const SYSTEM: &str = "system";
}

/// Common audit action types
pub mod actions {
    // Auth actions
    pub const AUTH_LOGIN: &str = "auth.login";
    pub const AUTH_LOGIN_FAILED: &str = "auth.login_failed";
    pub const AUTH_LOGOUT: &str = "auth.logout";

    // Magic-link actions
    pub const MAGIC_LINK_REQUEST: &str = "magic_link.request";
    pub const MAGIC_LINK_VERIFY: &str = "magic_link.verify";
    pub const MEMBER_LOGOUT: &str = "member.logout";

    // Admin account actions
    pub const ADMIN_CREATE: &str = "admin.create";
    pub const ADMIN_UPDATE: &str = "admin.update";

    // Client actions
    pub const CLIENT_CREATE: &str = "client.create";
    pub const CLIENT_UPDATE: &str = "client.update";
    pub const CLIENT_DEACTIVATE: &str = "client.deactivate";

    // Case actions
    pub const CASE_CREATE: &str = "case.create";
    pub const CASE_UPDATE: &str = "case.update";

    // Audit reads (used by the recursion guard, not normally logged)
    pub const AUDIT_VIEW: &str = "audit.view";
}

/// Common target types
pub mod target_types {
    pub const ADMIN: &str = "admin";
    pub const CLIENT: &str = "client";
    pub const CASE: &str = "case";
    pub const SESSION: &str = "session";
}

/// Log an audit event to the database
#[allow(clippy::too_many_arguments)]
pub async fn log_audit(
    db: &SqlitePool,
    actor_type: &str,
    actor_id: Option<&str>,
    action: &str,
    target_type: Option<&str>,
    target_id: Option<&str>,
    details: Option<serde_json::Value>,
    ip_address: Option<&str>,
    user_agent: Option<&str>,
) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();
    let details_json = details.map(|d| d.to_string());

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, actor_type, actor_id, action, target_type, target_id, details, ip_address, user_agent, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(actor_type)
    .bind(actor_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(&details_json)
    .bind(ip_address)
    .bind(user_agent)
    .bind(&now)
    .execute(db)
    .await?;

    tracing::debug!(
        actor_type = actor_type,
        actor_id = actor_id,
        action = action,
        target_type = target_type,
        "Audit log recorded"
    );

    Ok(())
}

/// List audit logs with filtering and pagination
pub async fn list_audit_logs(
    db: &SqlitePool,
    query: &AuditLogQuery,
) -> Result<AuditLogListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // Build dynamic WHERE clause
    let mut conditions = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(action) = &query.action {
        conditions.push("action = ?");
        bindings.push(action.clone());
    }

    if let Some(actor_type) = &query.actor_type {
        conditions.push("actor_type = ?");
        bindings.push(actor_type.clone());
    }

    if let Some(actor_id) = &query.actor_id {
        conditions.push("actor_id = ?");
        bindings.push(actor_id.clone());
    }

    if let Some(target_type) = &query.target_type {
        conditions.push("target_type = ?");
        bindings.push(target_type.clone());
    }

    if let Some(target_id) = &query.target_id {
        conditions.push("target_id = ?");
        bindings.push(target_id.clone());
    }

    if let Some(start_date) = &query.start_date {
        conditions.push("created_at >= ?");
        bindings.push(start_date.clone());
    }

    if let Some(end_date) = &query.end_date {
        conditions.push("created_at <= ?");
        bindings.push(end_date.clone());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // Build and execute count query
    let count_sql = format!("SELECT COUNT(*) as count FROM audit_logs {}", where_clause);
    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(db).await?;

    // Build and execute main query
    let sql = format!(
        "SELECT * FROM audit_logs {} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        where_clause
    );
    let mut query_builder = sqlx::query_as::<_, AuditLog>(&sql);
    for binding in &bindings {
        query_builder = query_builder.bind(binding);
    }
    query_builder = query_builder.bind(per_page).bind(offset);

    let items = query_builder.fetch_all(db).await?;

    let total_pages = (total as f64 / per_page as f64).ceil() as i64;

    Ok(AuditLogListResponse {
        items,
        total,
        page,
        per_page,
        total_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn test_db() -> SqlitePool {
        db::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_log_and_filter_by_action() {
        let db = test_db().await;

        log_audit(
            &db,
            actor_types::ADMIN,
            Some("admin-1"),
            actions::AUTH_LOGIN,
            None,
            None,
            Some(serde_json::json!({"email": "ops@example.com"})),
            Some("10.0.0.1"),
            None,
        )
        .await
        .unwrap();

        log_audit(
            &db,
            actor_types::ADMIN,
            Some("admin-1"),
            actions::CLIENT_UPDATE,
            Some(target_types::CLIENT),
            Some("client-1"),
            None,
            None,
            None,
        )
        .await
        .unwrap();

        let query = AuditLogQuery {
            action: Some(actions::AUTH_LOGIN.to_string()),
            ..Default::default()
        };
        let result = list_audit_logs(&db, &query).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].action, actions::AUTH_LOGIN);
        assert_eq!(result.items[0].actor_id.as_deref(), Some("admin-1"));
    }

    #[tokio::test]
    async fn test_pagination_clamps_per_page() {
        let db = test_db().await;

        for i in 0..3 {
            log_audit(
                &db,
                actor_types::SYSTEM,
                None,
                actions::AUTH_LOGIN_FAILED,
                None,
                None,
                Some(serde_json::json!({"attempt": i})),
                None,
                None,
            )
            .await
            .unwrap();
        }

        let query = AuditLogQuery {
            per_page: Some(1000),
            ..Default::default()
        };
        let result = list_audit_logs(&db, &query).await.unwrap();
        assert_eq!(result.per_page, 100);
        assert_eq!(result.total, 3);
        assert_eq!(result.total_pages, 1);
    }
}
