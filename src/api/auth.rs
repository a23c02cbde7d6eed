//! Admin authentication and request authorization.
//!
//! Login verifies credentials, issues a server-stored session token, and
//! audits every attempt. Authenticated requests present the token in an
//! HTTP-only cookie; the `CurrentAdmin` extractor resolves it (or the static
//! admin API key) to an identity whose role gates each route.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts, State},
    http::{request::Parts, HeaderMap},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::crypto::{hash_password, verify_password};
use crate::db::{
    self, actions, actor_types, target_types, Admin, AdminResponse, AdminRole, LoginRequest,
    LoginResponse, Permission,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip, extract_user_agent};
use super::error::{ApiError, ValidationErrorBuilder};
use super::rate_limit::RateLimitTier;

pub const ADMIN_SESSION_COOKIE: &str = "veilport_admin_session";
pub const MEMBER_SESSION_COOKIE: &str = "veilport_member_session";

/// Admin cookies are scoped to the admin route tree
pub const ADMIN_COOKIE_PATH: &str = "/api/admin";

/// Build a session cookie: HTTP-only, SameSite=Lax, 24 h max-age.
pub fn session_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::hours(db::SESSION_TTL_HOURS))
        .build()
}

/// Build the expired twin of a session cookie (Max-Age=0)
pub fn removal_cookie(name: &'static str, path: &'static str) -> Cookie<'static> {
    let mut cookie = Cookie::new(name, "");
    cookie.set_path(path);
    cookie.set_max_age(time::Duration::ZERO);
    cookie
}

/// Verify credentials and establish a session.
///
/// Unknown email, deactivated account, and wrong password all produce the
/// same generic error; the distinction exists only in the audit trail.
/// Every attempt, success or failure, records exactly one audit entry.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password: &str,
    ip_address: Option<String>,
    user_agent: Option<String>,
) -> Result<(Admin, String), ApiError> {
    let admin = db::find_active_admin_by_email(&state.db, email).await?;

    let Some(admin) = admin else {
        audit_log(
            state,
            actor_types::SYSTEM,
            None,
            actions::AUTH_LOGIN_FAILED,
            None,
            None,
            Some(json!({ "email": email, "reason": "not_found" })),
            ip_address,
            user_agent,
        );
        return Err(ApiError::invalid_credentials());
    };

    if !verify_password(password, &admin.password_hash) {
        audit_log(
            state,
            actor_types::ADMIN,
            Some(admin.id.clone()),
            actions::AUTH_LOGIN_FAILED,
            None,
            None,
            Some(json!({ "email": email, "reason": "bad_password" })),
            ip_address,
            user_agent,
        );
        return Err(ApiError::invalid_credentials());
    }

    let token = db::create_admin_session(
        &state.db,
        &admin.id,
        ip_address.as_deref(),
        user_agent.as_deref(),
    )
    .await?;
    db::touch_admin_last_login(&state.db, &admin.id).await?;

    audit_log(
        state,
        actor_types::ADMIN,
        Some(admin.id.clone()),
        actions::AUTH_LOGIN,
        Some(target_types::SESSION),
        None,
        Some(json!({ "email": email })),
        ip_address,
        user_agent,
    );

    Ok((admin, token))
}

/// Login endpoint
///
/// POST /api/admin/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), ApiError> {
    // Proxy headers first, then the peer address, so direct deployments
    // still get per-client rate limit buckets
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let ip = extract_client_ip(&headers, peer.as_ref());
    let user_agent = extract_user_agent(&headers);

    let rate_key = ip.clone().unwrap_or_else(|| "unknown".to_string());
    if let Err(retry_after) = state.rate_limiter.check(&rate_key, RateLimitTier::Auth) {
        return Err(ApiError::rate_limited(retry_after));
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = super::validation::validate_email(&request.email) {
        errors.add("email", e);
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    let (admin, token) = authenticate(&state, &request.email, &request.password, ip, user_agent).await?;

    let jar = jar.add(session_cookie(
        ADMIN_SESSION_COOKIE,
        token,
        ADMIN_COOKIE_PATH,
        state.config.server.secure_cookies,
    ));

    Ok((
        jar,
        Json(LoginResponse {
            success: true,
            admin: AdminResponse::from(admin),
        }),
    ))
}

/// Logout endpoint: deletes the server-side session and clears the cookie.
///
/// POST /api/admin/auth/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(cookie) = jar.get(ADMIN_SESSION_COOKIE) {
        let token = cookie.value().to_string();

        // Resolve first so the audit entry can name the actor
        let admin = db::resolve_admin_session(&state.db, &token).await?;
        db::destroy_admin_session(&state.db, &token).await?;

        audit_log(
            &state,
            actor_types::ADMIN,
            admin.map(|a| a.id),
            actions::AUTH_LOGOUT,
            Some(target_types::SESSION),
            None,
            None,
            extract_client_ip(&headers, None),
            extract_user_agent(&headers),
        );
    }

    let jar = jar.remove(removal_cookie(ADMIN_SESSION_COOKIE, ADMIN_COOKIE_PATH));
    Ok((jar, Json(json!({ "success": true }))))
}

/// Current admin endpoint
///
/// GET /api/admin/auth/me
pub async fn me(admin: CurrentAdmin) -> Json<AdminResponse> {
    Json(AdminResponse::from(admin.admin))
}

/// Create the bootstrap super_admin if no admin accounts exist yet.
/// Runs at startup; a no-op on every start after the first.
pub async fn ensure_bootstrap_admin(
    db: &db::DbPool,
    config: &crate::config::AuthConfig,
) -> anyhow::Result<()> {
    if db::count_admins(db).await? > 0 {
        return Ok(());
    }

    let password = match &config.bootstrap_admin_password {
        Some(p) => p.clone(),
        None => {
            let (generated, _) = crate::crypto::generate_token();
            let generated = generated[..24].to_string();
            tracing::warn!(
                email = %config.bootstrap_admin_email,
                password = %generated,
                "No bootstrap password configured; generated one (shown once)"
            );
            generated
        }
    };

    let password_hash =
        hash_password(&password).map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

    db::create_admin(
        db,
        &config.bootstrap_admin_email,
        "Bootstrap Admin",
        AdminRole::SuperAdmin,
        &password_hash,
    )
    .await?;

    tracing::info!(email = %config.bootstrap_admin_email, "Created bootstrap super_admin");
    Ok(())
}

/// The authenticated admin behind a request.
///
/// Resolution order: static admin API key as a Bearer header (constant-time
/// compare, yields a synthetic super_admin), then the admin session cookie.
/// Any miss is a bare 401 with no cause attached.
pub struct CurrentAdmin {
    pub admin: Admin,
}

impl CurrentAdmin {
    pub fn require_permission(&self, permission: Permission) -> Result<(), ApiError> {
        if self.admin.role().has_permission(permission) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Synthetic identity for requests authorized by the static API key
fn api_key_admin() -> Admin {
    let now = chrono::Utc::now().to_rfc3339();
    Admin {
        id: "system".to_string(),
        email: "system@veilport.local".to_string(),
        name: "System".to_string(),
        role: AdminRole::SuperAdmin.to_string(),
        password_hash: String::new(),
        is_active: true,
        last_login_at: None,
        created_at: now.clone(),
        updated_at: now,
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        // Static API key path, timing-safe
        if let (Some(presented), Some(configured)) = (
            bearer_token(&parts.headers),
            state.config.auth.admin_api_key.as_deref(),
        ) {
            let presented = presented.as_bytes();
            let configured = configured.as_bytes();
            if presented.len() == configured.len() && bool::from(presented.ct_eq(configured)) {
                return Ok(CurrentAdmin {
                    admin: api_key_admin(),
                });
            }
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(ADMIN_SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(ApiError::unauthorized)?;

        let admin = db::resolve_admin_session(&state.db, &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(CurrentAdmin { admin })
    }
}

/// The authenticated client (member) behind a request.
pub struct CurrentMember {
    pub client: db::Client,
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for CurrentMember {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(MEMBER_SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(ApiError::unauthorized)?;

        let client = db::resolve_member_session(&state.db, &token)
            .await?
            .ok_or_else(ApiError::unauthorized)?;

        Ok(CurrentMember { client })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::crypto::hash_token;

    async fn test_state() -> Arc<AppState> {
        let db = db::connect("sqlite::memory:").await.unwrap();
        Arc::new(AppState::new(Config::default(), db))
    }

    async fn seed_admin(state: &AppState, email: &str, role: AdminRole, password: &str) -> Admin {
        let hash = hash_password(password).unwrap();
        db::create_admin(&state.db, email, "Test Admin", role, &hash)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_authenticate_success_creates_matching_session_row() {
        let state = test_state().await;
        let admin = seed_admin(&state, "ops@example.com", AdminRole::Admin, "a-long-password").await;

        let (returned, token) =
            authenticate(&state, "ops@example.com", "a-long-password", None, None)
                .await
                .unwrap();
        assert_eq!(returned.id, admin.id);

        // The issued token's hash matches a newly created session row
        let row: Option<(String,)> =
            sqlx::query_as("SELECT admin_id FROM admin_sessions WHERE token_hash = ?")
                .bind(hash_token(&token))
                .fetch_optional(&state.db)
                .await
                .unwrap();
        assert_eq!(row.unwrap().0, admin.id);

        // Last login was recorded
        let refreshed = db::get_admin(&state.db, &admin.id).await.unwrap().unwrap();
        assert!(refreshed.last_login_at.is_some());
    }

    #[tokio::test]
    async fn test_login_rate_limit_is_per_peer() {
        let db = db::connect("sqlite::memory:").await.unwrap();
        let mut config = Config::default();
        config.rate_limit.login_attempts_per_window = 2;
        let state = Arc::new(AppState::new(config, db));
        seed_admin(&state, "ops@example.com", AdminRole::Admin, "a-long-password").await;

        let peer_a: SocketAddr = "198.51.100.10:40000".parse().unwrap();
        let peer_b: SocketAddr = "198.51.100.20:40000".parse().unwrap();

        // No proxy headers: the peer address is the bucket key
        for _ in 0..2 {
            let _ = login(
                State(state.clone()),
                Some(ConnectInfo(peer_a)),
                CookieJar::new(),
                HeaderMap::new(),
                Json(LoginRequest {
                    email: "ops@example.com".to_string(),
                    password: "wrong-password".to_string(),
                }),
            )
            .await;
        }

        let err = login(
            State(state.clone()),
            Some(ConnectInfo(peer_a)),
            CookieJar::new(),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "ops@example.com".to_string(),
                password: "a-long-password".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), crate::api::error::ErrorCode::TooManyRequests);

        // A different peer has its own bucket
        login(
            State(state.clone()),
            Some(ConnectInfo(peer_b)),
            CookieJar::new(),
            HeaderMap::new(),
            Json(LoginRequest {
                email: "ops@example.com".to_string(),
                password: "a-long-password".to_string(),
            }),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_failures_are_indistinguishable() {
        let state = test_state().await;
        seed_admin(&state, "ops@example.com", AdminRole::Admin, "a-long-password").await;

        let unknown_email = authenticate(&state, "ghost@example.com", "whatever", None, None)
            .await
            .unwrap_err();
        let bad_password = authenticate(&state, "ops@example.com", "wrong-password", None, None)
            .await
            .unwrap_err();

        assert_eq!(unknown_email.to_string(), bad_password.to_string());
    }

    #[tokio::test]
    async fn test_deactivated_admin_is_treated_as_missing() {
        let state = test_state().await;
        let admin = seed_admin(&state, "ops@example.com", AdminRole::Admin, "a-long-password").await;

        sqlx::query("UPDATE admins SET is_active = 0 WHERE id = ?")
            .bind(&admin.id)
            .execute(&state.db)
            .await
            .unwrap();

        let err = authenticate(&state, "ops@example.com", "a-long-password", None, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), ApiError::invalid_credentials().to_string());

        // No session row appeared
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admin_sessions")
            .fetch_one(&state.db)
            .await
            .unwrap();
        assert_eq!(count.0, 0);
    }

    #[tokio::test]
    async fn test_every_attempt_leaves_one_audit_entry() {
        let state = test_state().await;
        seed_admin(&state, "ops@example.com", AdminRole::Admin, "a-long-password").await;

        let _ = authenticate(&state, "ops@example.com", "a-long-password", None, None).await;
        let _ = authenticate(&state, "ops@example.com", "wrong", None, None).await;
        let _ = authenticate(&state, "ghost@example.com", "wrong", None, None).await;

        // Audit writes are fire-and-forget; give the spawned tasks a moment
        let mut total = 0i64;
        for _ in 0..50 {
            let count: (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM audit_logs WHERE action IN ('auth.login', 'auth.login_failed')",
            )
            .fetch_one(&state.db)
            .await
            .unwrap();
            total = count.0;
            if total == 3 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(total, 3);
    }

    #[tokio::test]
    async fn test_bootstrap_admin_is_idempotent() {
        let state = test_state().await;
        let config = crate::config::AuthConfig {
            admin_api_key: None,
            bootstrap_admin_email: "root@example.com".to_string(),
            bootstrap_admin_password: Some("a-bootstrap-password".to_string()),
        };

        ensure_bootstrap_admin(&state.db, &config).await.unwrap();
        ensure_bootstrap_admin(&state.db, &config).await.unwrap();

        assert_eq!(db::count_admins(&state.db).await.unwrap(), 1);
        let admin = db::find_active_admin_by_email(&state.db, "root@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.role(), AdminRole::SuperAdmin);
    }
}
