//! Client and case management for the admin surface.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use serde_json::json;

use crate::db::{
    self, actions, actor_types, target_types, CaseKind, CaseStatus, Client, ClientCase,
    ClientListQuery, ClientListResponse, CreateCaseRequest, CreateClientRequest, Permission,
    PlanTier, UpdateCaseRequest, UpdateClientRequest,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip, extract_user_agent};
use super::auth::CurrentAdmin;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_title};

/// List clients, paginated
///
/// GET /api/admin/clients
pub async fn list(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Query(query): Query<ClientListQuery>,
) -> Result<Json<ClientListResponse>, ApiError> {
    admin.require_permission(Permission::Read)?;

    let clients = db::list_clients(&state.db, &query).await?;
    Ok(Json(clients))
}

/// Fetch a single client
///
/// GET /api/admin/clients/:id
pub async fn get(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<Client>, ApiError> {
    admin.require_permission(Permission::Read)?;

    let client = db::get_client(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;
    Ok(Json(client))
}

/// Create a client
///
/// POST /api/admin/clients
pub async fn create(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    headers: HeaderMap,
    Json(request): Json<CreateClientRequest>,
) -> Result<Json<Client>, ApiError> {
    admin.require_permission(Permission::Write)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_name(&request.organization) {
        errors.add("organization", e);
    }
    let plan: Option<PlanTier> = match &request.plan {
        Some(raw) => match raw.parse() {
            Ok(plan) => Some(plan),
            Err(e) => {
                errors.add("plan", e);
                None
            }
        },
        None => Some(PlanTier::Free),
    };
    errors.finish()?;

    let plan = plan.ok_or_else(|| ApiError::internal("Plan validated but missing"))?;
    let email = request.email.trim().to_lowercase();

    let created = db::create_client(&state.db, &email, &request.organization, plan).await?;

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::CLIENT_CREATE,
        Some(target_types::CLIENT),
        Some(created.id.clone()),
        Some(json!({ "email": created.email, "plan": created.plan })),
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(created))
}

/// Update a client
///
/// PUT /api/admin/clients/:id
pub async fn update(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateClientRequest>,
) -> Result<Json<Client>, ApiError> {
    admin.require_permission(Permission::Write)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(organization) = &request.organization {
        if let Err(e) = validate_name(organization) {
            errors.add("organization", e);
        }
    }
    let plan: Option<PlanTier> = match &request.plan {
        Some(raw) => match raw.parse() {
            Ok(plan) => Some(plan),
            Err(e) => {
                errors.add("plan", e);
                None
            }
        },
        None => None,
    };
    errors.finish()?;

    let updated = db::update_client(&state.db, &id, &request, plan).await?;

    // Deactivation through update also revokes member sessions
    if request.is_active == Some(false) {
        db::destroy_sessions_for_client(&state.db, &id).await?;
    }

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::CLIENT_UPDATE,
        Some(target_types::CLIENT),
        Some(updated.id.clone()),
        Some(json!({ "plan": updated.plan, "is_active": updated.is_active })),
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(updated))
}

/// Deactivate a client. Rows are never deleted; the audit trail keeps a
/// resolvable target and reactivation is an update away.
///
/// DELETE /api/admin/clients/:id
pub async fn deactivate(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    admin.require_permission(Permission::Delete)?;

    if !db::deactivate_client(&state.db, &id).await? {
        return Err(ApiError::not_found("Client not found"));
    }

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::CLIENT_DEACTIVATE,
        Some(target_types::CLIENT),
        Some(id),
        None,
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(json!({ "success": true })))
}

/// List a client's cases
///
/// GET /api/admin/clients/:id/cases
pub async fn list_cases(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
) -> Result<Json<Vec<ClientCase>>, ApiError> {
    admin.require_permission(Permission::Read)?;

    // 404 for an unknown client rather than an empty list
    db::get_client(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;

    let cases = db::list_cases_for_client(&state.db, &id).await?;
    Ok(Json(cases))
}

/// Open a case for a client
///
/// POST /api/admin/clients/:id/cases
pub async fn create_case(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<CreateCaseRequest>,
) -> Result<Json<ClientCase>, ApiError> {
    admin.require_permission(Permission::Write)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_title(&request.title) {
        errors.add("title", e);
    }
    let kind: Option<CaseKind> = match request.kind.parse() {
        Ok(kind) => Some(kind),
        Err(e) => {
            errors.add("kind", e);
            None
        }
    };
    errors.finish()?;

    let kind = kind.ok_or_else(|| ApiError::internal("Kind validated but missing"))?;

    db::get_client(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Client not found"))?;

    let created =
        db::create_case(&state.db, &id, kind, &request.title, request.notes.as_deref()).await?;

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::CASE_CREATE,
        Some(target_types::CASE),
        Some(created.id.clone()),
        Some(json!({ "client_id": id, "kind": created.kind })),
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(created))
}

/// Update a case
///
/// PUT /api/admin/cases/:id
pub async fn update_case(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateCaseRequest>,
) -> Result<Json<ClientCase>, ApiError> {
    admin.require_permission(Permission::Write)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &request.title {
        if let Err(e) = validate_title(title) {
            errors.add("title", e);
        }
    }
    let status: Option<CaseStatus> = match &request.status {
        Some(raw) => match raw.parse() {
            Ok(status) => Some(status),
            Err(e) => {
                errors.add("status", e);
                None
            }
        },
        None => None,
    };
    errors.finish()?;

    let updated = db::update_case(
        &state.db,
        &id,
        request.title.as_deref(),
        status,
        request.notes.as_deref(),
    )
    .await?;

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::CASE_UPDATE,
        Some(target_types::CASE),
        Some(updated.id.clone()),
        Some(json!({ "status": updated.status })),
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(updated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::config::Config;
    use crate::crypto::hash_password;
    use crate::db::{Admin, AdminRole};

    async fn test_state() -> Arc<AppState> {
        let db = db::connect("sqlite::memory:").await.unwrap();
        Arc::new(AppState::new(Config::default(), db))
    }

    async fn seed_admin(state: &AppState, role: AdminRole) -> CurrentAdmin {
        let hash = hash_password("a-long-test-password").unwrap();
        let admin: Admin = db::create_admin(&state.db, "ops@example.com", "Ops", role, &hash)
            .await
            .unwrap();
        CurrentAdmin { admin }
    }

    #[tokio::test]
    async fn test_viewer_cannot_create_client() {
        let state = test_state().await;
        let viewer = seed_admin(&state, AdminRole::Viewer).await;

        let err = create(
            State(state.clone()),
            viewer,
            HeaderMap::new(),
            Json(CreateClientRequest {
                email: "member@example.com".to_string(),
                organization: "Example LLC".to_string(),
                plan: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_create_defaults_to_free_plan_and_lowercases_email() {
        let state = test_state().await;
        let admin = seed_admin(&state, AdminRole::Admin).await;

        let created = create(
            State(state.clone()),
            admin,
            HeaderMap::new(),
            Json(CreateClientRequest {
                email: "Member@Example.com".to_string(),
                organization: "Example LLC".to_string(),
                plan: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(created.0.plan, "free");
        assert_eq!(created.0.email, "member@example.com");
    }

    #[tokio::test]
    async fn test_deactivate_requires_delete_permission() {
        let state = test_state().await;
        let support = seed_admin(&state, AdminRole::Support).await;
        let client = db::create_client(&state.db, "member@example.com", "Example LLC", PlanTier::Free)
            .await
            .unwrap();

        let err = deactivate(
            State(state.clone()),
            support,
            Path(client.id),
            HeaderMap::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[tokio::test]
    async fn test_deactivate_revokes_member_sessions() {
        let state = test_state().await;
        let admin = seed_admin(&state, AdminRole::Admin).await;
        let client = db::create_client(&state.db, "member@example.com", "Example LLC", PlanTier::Free)
            .await
            .unwrap();
        let token = db::create_member_session(&state.db, &client.id, None, None)
            .await
            .unwrap();

        deactivate(
            State(state.clone()),
            admin,
            Path(client.id.clone()),
            HeaderMap::new(),
        )
        .await
        .unwrap();

        assert!(db::resolve_member_session(&state.db, &token)
            .await
            .unwrap()
            .is_none());
        let refreshed = db::get_client(&state.db, &client.id).await.unwrap().unwrap();
        assert!(!refreshed.is_active);
    }

    #[tokio::test]
    async fn test_case_lifecycle() {
        let state = test_state().await;
        let admin = seed_admin(&state, AdminRole::Admin).await;
        let client = db::create_client(&state.db, "member@example.com", "Example LLC", PlanTier::Free)
            .await
            .unwrap();

        let case = create_case(
            State(state.clone()),
            CurrentAdmin {
                admin: admin.admin.clone(),
            },
            Path(client.id.clone()),
            HeaderMap::new(),
            Json(CreateCaseRequest {
                kind: "takedown".to_string(),
                title: "Remove listing from data broker".to_string(),
                notes: None,
            }),
        )
        .await
        .unwrap();
        assert_eq!(case.0.status, "open");

        let updated = update_case(
            State(state.clone()),
            admin,
            Path(case.0.id.clone()),
            HeaderMap::new(),
            Json(UpdateCaseRequest {
                title: None,
                status: Some("resolved".to_string()),
                notes: Some("Broker confirmed removal".to_string()),
            }),
        )
        .await
        .unwrap();
        assert_eq!(updated.0.status, "resolved");
        assert_eq!(updated.0.title, case.0.title);
    }

    #[tokio::test]
    async fn test_create_case_rejects_unknown_kind() {
        let state = test_state().await;
        let admin = seed_admin(&state, AdminRole::Admin).await;
        let client = db::create_client(&state.db, "member@example.com", "Example LLC", PlanTier::Free)
            .await
            .unwrap();

        let err = create_case(
            State(state.clone()),
            admin,
            Path(client.id),
            HeaderMap::new(),
            Json(CreateCaseRequest {
                kind: "lawsuit".to_string(),
                title: "A case".to_string(),
                notes: None,
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }
}
