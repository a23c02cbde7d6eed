//! Member (client) endpoints: passwordless magic-link login, session
//! management, and read access to the member's own cases.
//!
//! Link requests are deliberately non-enumerating: the response is the same
//! generic acknowledgement whether or not the email belongs to a client.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::db::{self, actions, actor_types, target_types, ClientCase, MAGIC_LINK_TTL_MINUTES};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip, extract_user_agent};
use super::auth::{removal_cookie, session_cookie, CurrentMember, MEMBER_SESSION_COOKIE};
use super::error::{ApiError, ErrorCode, ValidationErrorBuilder};
use super::rate_limit::RateLimitTier;

/// Member session cookies cover the whole member surface
pub const MEMBER_COOKIE_PATH: &str = "/";

#[derive(Debug, Deserialize)]
pub struct RequestLinkRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub token: String,
}

/// Request a magic sign-in link
///
/// POST /api/members/request-link
pub async fn request_link(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RequestLinkRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = super::validation::validate_email(&request.email) {
        errors.add("email", e);
    }
    errors.finish()?;

    // Rate limit keyed by the requested address, not the caller's IP, so a
    // single mailbox cannot be flooded from many sources
    let email = request.email.trim().to_lowercase();
    if let Err(retry_after) = state.rate_limiter.check(&email, RateLimitTier::MagicLink) {
        return Err(ApiError::rate_limited(retry_after));
    }

    let ip = extract_client_ip(&headers, None);
    let user_agent = extract_user_agent(&headers);

    if let Some(client) = db::find_active_client_by_email(&state.db, &email).await? {
        let token = db::issue_magic_link(&state.db, &client.id).await?;
        let link_url = format!(
            "{}/members/verify?token={}",
            state.config.server.public_origin, token
        );

        if let Err(e) = state
            .email
            .send_magic_link_email(
                &client.email,
                &client.organization,
                &link_url,
                MAGIC_LINK_TTL_MINUTES,
            )
            .await
        {
            // The token stays valid; the client can retry after the window
            tracing::error!(client_id = %client.id, error = %e, "Failed to send magic-link email");
        }

        audit_log(
            &state,
            actor_types::CLIENT,
            Some(client.id.clone()),
            actions::MAGIC_LINK_REQUEST,
            Some(target_types::CLIENT),
            Some(client.id),
            None,
            ip,
            user_agent,
        );
    } else {
        audit_log(
            &state,
            actor_types::SYSTEM,
            None,
            actions::MAGIC_LINK_REQUEST,
            None,
            None,
            Some(json!({ "email": email, "reason": "unknown_email" })),
            ip,
            user_agent,
        );
    }

    Ok(Json(json!({
        "success": true,
        "message": "If that email is registered, a sign-in link has been sent"
    })))
}

/// Redeem a magic link and establish a member session
///
/// GET /api/members/verify?token=...
pub async fn verify(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(query): Query<VerifyQuery>,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    let ip = extract_client_ip(&headers, None);
    let user_agent = extract_user_agent(&headers);

    let client = db::redeem_magic_link(&state.db, &query.token)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "Invalid or expired sign-in link"))?;

    let token =
        db::create_member_session(&state.db, &client.id, ip.as_deref(), user_agent.as_deref())
            .await?;
    db::touch_client_last_login(&state.db, &client.id).await?;

    audit_log(
        &state,
        actor_types::CLIENT,
        Some(client.id.clone()),
        actions::MAGIC_LINK_VERIFY,
        Some(target_types::SESSION),
        None,
        None,
        ip,
        user_agent,
    );

    let jar = jar.add(session_cookie(
        MEMBER_SESSION_COOKIE,
        token,
        MEMBER_COOKIE_PATH,
        state.config.server.secure_cookies,
    ));

    Ok((jar, Json(json!({ "success": true, "client": client }))))
}

/// Member logout
///
/// POST /api/members/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<(CookieJar, Json<serde_json::Value>), ApiError> {
    if let Some(cookie) = jar.get(MEMBER_SESSION_COOKIE) {
        let token = cookie.value().to_string();

        let client = db::resolve_member_session(&state.db, &token).await?;
        db::destroy_member_session(&state.db, &token).await?;

        audit_log(
            &state,
            actor_types::CLIENT,
            client.map(|c| c.id),
            actions::MEMBER_LOGOUT,
            Some(target_types::SESSION),
            None,
            None,
            extract_client_ip(&headers, None),
            extract_user_agent(&headers),
        );
    }

    let jar = jar.remove(removal_cookie(MEMBER_SESSION_COOKIE, MEMBER_COOKIE_PATH));
    Ok((jar, Json(json!({ "success": true }))))
}

/// Current member endpoint
///
/// GET /api/members/me
pub async fn me(member: CurrentMember) -> Json<db::Client> {
    Json(member.client)
}

/// List the member's own cases
///
/// GET /api/members/cases
pub async fn list_my_cases(
    State(state): State<Arc<AppState>>,
    member: CurrentMember,
) -> Result<Json<Vec<ClientCase>>, ApiError> {
    let cases = db::list_cases_for_client(&state.db, &member.client.id).await?;
    Ok(Json(cases))
}
