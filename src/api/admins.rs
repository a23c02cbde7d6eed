//! Admin account management. Every route requires the manage_admins
//! permission, which only super_admins hold.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use serde_json::json;

use crate::crypto::hash_password;
use crate::db::{
    self, actions, actor_types, target_types, AdminResponse, AdminRole, CreateAdminRequest,
    Permission, UpdateAdminRequest,
};
use crate::AppState;

use super::audit::{audit_log, extract_client_ip, extract_user_agent};
use super::auth::CurrentAdmin;
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_email, validate_name, validate_password};

/// List all admin accounts
///
/// GET /api/admin/admins
pub async fn list(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
) -> Result<Json<Vec<AdminResponse>>, ApiError> {
    admin.require_permission(Permission::ManageAdmins)?;

    let admins = db::list_admins(&state.db).await?;
    Ok(Json(admins.into_iter().map(AdminResponse::from).collect()))
}

/// Create an admin account
///
/// POST /api/admin/admins
pub async fn create(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    headers: HeaderMap,
    Json(request): Json<CreateAdminRequest>,
) -> Result<Json<AdminResponse>, ApiError> {
    admin.require_permission(Permission::ManageAdmins)?;

    let mut errors = ValidationErrorBuilder::new();
    if let Err(e) = validate_email(&request.email) {
        errors.add("email", e);
    }
    if let Err(e) = validate_name(&request.name) {
        errors.add("name", e);
    }
    if let Err(e) = validate_password(&request.password) {
        errors.add("password", e);
    }
    let role: Option<AdminRole> = match request.role.parse() {
        Ok(role) => Some(role),
        Err(e) => {
            errors.add("role", e);
            None
        }
    };
    errors.finish()?;

    let role = role.ok_or_else(|| ApiError::internal("Role validated but missing"))?;
    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;

    let created = db::create_admin(
        &state.db,
        &request.email,
        &request.name,
        role,
        &password_hash,
    )
    .await?;

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::ADMIN_CREATE,
        Some(target_types::ADMIN),
        Some(created.id.clone()),
        Some(json!({ "email": created.email, "role": created.role })),
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(AdminResponse::from(created)))
}

/// Update an admin account
///
/// PUT /api/admin/admins/:id
///
/// Accounts are deactivated rather than deleted so audit entries keep a
/// resolvable actor. An admin cannot change their own role or deactivate
/// themselves; that always requires a second super_admin.
pub async fn update(
    State(state): State<Arc<AppState>>,
    admin: CurrentAdmin,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(request): Json<UpdateAdminRequest>,
) -> Result<Json<AdminResponse>, ApiError> {
    admin.require_permission(Permission::ManageAdmins)?;

    if admin.admin.id == id && (request.role.is_some() || request.is_active == Some(false)) {
        return Err(ApiError::bad_request(
            "Cannot change your own role or deactivate your own account",
        ));
    }

    let mut errors = ValidationErrorBuilder::new();
    if let Some(name) = &request.name {
        if let Err(e) = validate_name(name) {
            errors.add("name", e);
        }
    }
    if let Some(password) = &request.password {
        if let Err(e) = validate_password(password) {
            errors.add("password", e);
        }
    }
    let role: Option<AdminRole> = match &request.role {
        Some(raw) => match raw.parse() {
            Ok(role) => Some(role),
            Err(e) => {
                errors.add("role", e);
                None
            }
        },
        None => None,
    };
    errors.finish()?;

    let password_hash = match &request.password {
        Some(password) => Some(
            hash_password(password)
                .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?,
        ),
        None => None,
    };

    let updated = db::update_admin(
        &state.db,
        &id,
        request.name.as_deref(),
        role,
        request.is_active,
        password_hash.as_deref(),
    )
    .await?;

    // A deactivated admin loses every live session immediately
    if request.is_active == Some(false) {
        db::destroy_sessions_for_admin(&state.db, &id).await?;
    }

    audit_log(
        &state,
        actor_types::ADMIN,
        Some(admin.admin.id.clone()),
        actions::ADMIN_UPDATE,
        Some(target_types::ADMIN),
        Some(updated.id.clone()),
        Some(json!({
            "role": updated.role,
            "is_active": updated.is_active,
            "password_changed": request.password.is_some(),
        })),
        extract_client_ip(&headers, None),
        extract_user_agent(&headers),
    );

    Ok(Json(AdminResponse::from(updated)))
}
