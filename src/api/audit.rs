//! Audit log API endpoints and helpers.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use std::{net::SocketAddr, sync::Arc};

use crate::db::{list_audit_logs, log_audit, AuditLogListResponse, AuditLogQuery, Permission};
use crate::AppState;

use super::auth::CurrentAdmin;
use super::error::ApiError;

/// Extract client IP address from request headers or connection info.
/// Checks X-Forwarded-For, X-Real-IP headers first (for reverse proxy scenarios),
/// then falls back to the connection info.
pub fn extract_client_ip(headers: &HeaderMap, conn_info: Option<&SocketAddr>) -> Option<String> {
    // Check X-Forwarded-For header first (comma-separated list, first is client)
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first_ip) = forwarded.split(',').next() {
            let ip = first_ip.trim();
            if !ip.is_empty() {
                return Some(ip.to_string());
            }
        }
    }

    // Check X-Real-IP header
    if let Some(real_ip) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let ip = real_ip.trim();
        if !ip.is_empty() {
            return Some(ip.to_string());
        }
    }

    // Fall back to connection info
    conn_info.map(|addr| addr.ip().to_string())
}

pub fn extract_user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}

/// Record an audit event without blocking the caller.
///
/// The write runs on a spawned task; a persistence failure is logged
/// server-side and never aborts or delays the primary operation.
#[allow(clippy::too_many_arguments)]
pub fn audit_log(
    state: &AppState,
    actor_type: &'static str,
    actor_id: Option<String>,
    action: &'static str,
    target_type: Option<&'static str>,
    target_id: Option<String>,
    details: Option<serde_json::Value>,
    ip_address: Option<String>,
    user_agent: Option<String>,
) {
    let db = state.db.clone();
    tokio::spawn(async move {
        if let Err(e) = log_audit(
            &db,
            actor_type,
            actor_id.as_deref(),
            action,
            target_type,
            target_id.as_deref(),
            details,
            ip_address.as_deref(),
            user_agent.as_deref(),
        )
        .await
        {
            tracing::warn!(
                action = action,
                actor_type = actor_type,
                error = %e,
                "Failed to create audit log entry"
            );
        }
    });
}

/// List audit logs with filtering and pagination
///
/// Requires the `read` permission. Reads of the audit log are themselves
/// auditable, except when the request is already filtering audit/log reads;
/// logging those again would snowball one forensic query into many rows.
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    headers: HeaderMap,
    Query(query): Query<AuditLogQuery>,
) -> Result<Json<AuditLogListResponse>, ApiError> {
    admin.require_permission(Permission::Read)?;

    let filter_mentions_audit = query
        .action
        .as_deref()
        .map(|a| a.contains("audit") || a.contains("logs"))
        .unwrap_or(false);

    if !filter_mentions_audit {
        audit_log(
            &state,
            crate::db::actor_types::ADMIN,
            Some(admin.admin.id.clone()),
            crate::db::actions::AUDIT_VIEW,
            None,
            None,
            None,
            extract_client_ip(&headers, None),
            extract_user_agent(&headers),
        );
    }

    let result = list_audit_logs(&state.db, &query).await?;
    Ok(Json(result))
}

/// Get distinct action types for filtering UI
pub async fn list_action_types(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
) -> Result<Json<Vec<String>>, ApiError> {
    admin.require_permission(Permission::Read)?;

    let actions: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT action FROM audit_logs ORDER BY action")
            .fetch_all(&state.db)
            .await?;

    Ok(Json(actions.into_iter().map(|(a,)| a).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", "203.0.113.9, 10.0.0.1".parse().unwrap());
        headers.insert("x-real-ip", "10.0.0.2".parse().unwrap());

        assert_eq!(
            extract_client_ip(&headers, None),
            Some("203.0.113.9".to_string())
        );
    }

    #[test]
    fn test_extract_client_ip_falls_back_to_conn_info() {
        let headers = HeaderMap::new();
        let addr: SocketAddr = "192.0.2.4:55555".parse().unwrap();

        assert_eq!(
            extract_client_ip(&headers, Some(&addr)),
            Some("192.0.2.4".to_string())
        );
        assert_eq!(extract_client_ip(&headers, None), None);
    }

    async fn test_admin_state() -> (Arc<AppState>, CurrentAdmin) {
        let db = crate::db::connect("sqlite::memory:").await.unwrap();
        let state = Arc::new(AppState::new(crate::config::Config::default(), db));
        let hash = crate::crypto::hash_password("a-long-test-password").unwrap();
        let admin = crate::db::create_admin(
            &state.db,
            "ops@example.com",
            "Ops",
            crate::db::AdminRole::Viewer,
            &hash,
        )
        .await
        .unwrap();
        (state, CurrentAdmin { admin })
    }

    async fn audit_row_count(state: &AppState) -> i64 {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(&state.db)
            .await
            .unwrap();
        count.0
    }

    #[tokio::test]
    async fn test_listing_is_audited_once() {
        let (state, admin) = test_admin_state().await;

        list_logs(
            State(state.clone()),
            admin,
            HeaderMap::new(),
            Query(AuditLogQuery::default()),
        )
        .await
        .unwrap();

        // The entry is written by a spawned task
        for _ in 0..50 {
            if audit_row_count(&state).await == 1 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("audit entry for the listing never appeared");
    }

    #[tokio::test]
    async fn test_audit_filtered_listing_is_not_audited() {
        let (state, admin) = test_admin_state().await;

        let query = AuditLogQuery {
            action: Some(crate::db::actions::AUDIT_VIEW.to_string()),
            ..Default::default()
        };
        list_logs(State(state.clone()), admin, HeaderMap::new(), Query(query))
            .await
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(audit_row_count(&state).await, 0);
    }
}
