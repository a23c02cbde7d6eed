//! Admin identities and role-based access control.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Admin roles with hierarchical permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// Full access, including admin account management and system configuration
    SuperAdmin,
    /// Manage clients and cases, including deletion
    Admin,
    /// Day-to-day client and case edits
    Support,
    /// Read-only access
    Viewer,
}

/// Named capabilities gating admin routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Read,
    Write,
    Delete,
    ManageAdmins,
    SystemConfig,
}

impl AdminRole {
    /// The fixed permission set granted to this role. Pure lookup,
    /// monotonically non-decreasing from viewer to super_admin.
    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            AdminRole::SuperAdmin => &[
                Permission::Read,
                Permission::Write,
                Permission::Delete,
                Permission::ManageAdmins,
                Permission::SystemConfig,
            ],
            AdminRole::Admin => &[Permission::Read, Permission::Write, Permission::Delete],
            AdminRole::Support => &[Permission::Read, Permission::Write],
            AdminRole::Viewer => &[Permission::Read],
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }

    /// Get the permission level (higher = more permissions)
    pub fn level(&self) -> u8 {
        match self {
            AdminRole::SuperAdmin => 4,
            AdminRole::Admin => 3,
            AdminRole::Support => 2,
            AdminRole::Viewer => 1,
        }
    }
}

impl std::fmt::Display for AdminRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AdminRole::SuperAdmin => write!(f, "super_admin"),
            AdminRole::Admin => write!(f, "admin"),
            AdminRole::Support => write!(f, "support"),
            AdminRole::Viewer => write!(f, "viewer"),
        }
    }
}

impl std::str::FromStr for AdminRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "super_admin" => Ok(AdminRole::SuperAdmin),
            "admin" => Ok(AdminRole::Admin),
            "support" => Ok(AdminRole::Support),
            "viewer" => Ok(AdminRole::Viewer),
            _ => Err(format!("Unknown admin role: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Admin {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub password_hash: String,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Admin {
    /// Parsed role; unknown values fall back to read-only.
    pub fn role(&self) -> AdminRole {
        self.role.parse().unwrap_or(AdminRole::Viewer)
    }
}

/// Admin representation returned by the API (password hash stripped)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl From<Admin> for AdminResponse {
    fn from(admin: Admin) -> Self {
        Self {
            id: admin.id,
            email: admin.email,
            name: admin.name,
            role: admin.role,
            is_active: admin.is_active,
            last_login_at: admin.last_login_at,
            created_at: admin.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub success: bool,
    pub admin: AdminResponse,
}

#[derive(Debug, Deserialize)]
pub struct CreateAdminRequest {
    pub email: String,
    pub name: String,
    pub role: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateAdminRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub is_active: Option<bool>,
    pub password: Option<String>,
}

/// Look up an admin by email among active identities only.
/// A deactivated admin is indistinguishable from a missing one.
pub async fn find_active_admin_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM admins WHERE email = ? AND is_active = 1")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn get_admin(db: &SqlitePool, id: &str) -> Result<Option<Admin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM admins WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_admins(db: &SqlitePool) -> Result<Vec<Admin>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM admins ORDER BY created_at ASC")
        .fetch_all(db)
        .await
}

pub async fn create_admin(
    db: &SqlitePool,
    email: &str,
    name: &str,
    role: AdminRole,
    password_hash: &str,
) -> Result<Admin, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO admins (id, email, name, role, password_hash, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(email)
    .bind(name)
    .bind(role.to_string())
    .bind(password_hash)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as("SELECT * FROM admins WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Update an admin account, merging unset fields from the existing row.
pub async fn update_admin(
    db: &SqlitePool,
    id: &str,
    name: Option<&str>,
    role: Option<AdminRole>,
    is_active: Option<bool>,
    password_hash: Option<&str>,
) -> Result<Admin, sqlx::Error> {
    let existing = get_admin(db, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    let new_name = name.unwrap_or(&existing.name);
    let new_role = role
        .map(|r| r.to_string())
        .unwrap_or_else(|| existing.role.clone());
    let new_is_active = is_active.unwrap_or(existing.is_active);
    let new_password_hash = password_hash.unwrap_or(&existing.password_hash);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE admins
        SET name = ?, role = ?, is_active = ?, password_hash = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(new_name)
    .bind(&new_role)
    .bind(new_is_active)
    .bind(new_password_hash)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;

    get_admin(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Record a successful login on the admin row.
pub async fn touch_admin_last_login(db: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE admins SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn count_admins(db: &SqlitePool) -> Result<i64, sqlx::Error> {
    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM admins")
        .fetch_one(db)
        .await?;
    Ok(count.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_is_read_only() {
        assert!(AdminRole::Viewer.has_permission(Permission::Read));
        assert!(!AdminRole::Viewer.has_permission(Permission::Write));
        assert!(!AdminRole::Viewer.has_permission(Permission::Delete));
        assert!(!AdminRole::Viewer.has_permission(Permission::ManageAdmins));
    }

    #[test]
    fn test_super_admin_reserved_permissions() {
        assert!(AdminRole::SuperAdmin.has_permission(Permission::ManageAdmins));
        assert!(AdminRole::SuperAdmin.has_permission(Permission::SystemConfig));
        for role in [AdminRole::Admin, AdminRole::Support, AdminRole::Viewer] {
            assert!(!role.has_permission(Permission::ManageAdmins), "{role}");
            assert!(!role.has_permission(Permission::SystemConfig), "{role}");
        }
    }

    #[test]
    fn test_permissions_grow_monotonically() {
        let ordered = [
            AdminRole::Viewer,
            AdminRole::Support,
            AdminRole::Admin,
            AdminRole::SuperAdmin,
        ];
        for pair in ordered.windows(2) {
            let (lower, higher) = (pair[0], pair[1]);
            assert!(higher.level() > lower.level());
            for p in lower.permissions() {
                assert!(
                    higher.has_permission(*p),
                    "{higher} should keep {lower}'s {p:?}"
                );
            }
        }
    }

    #[test]
    fn test_role_round_trip() {
        for role in [
            AdminRole::SuperAdmin,
            AdminRole::Admin,
            AdminRole::Support,
            AdminRole::Viewer,
        ] {
            assert_eq!(role.to_string().parse::<AdminRole>(), Ok(role));
        }
        assert!("root".parse::<AdminRole>().is_err());
    }
}
