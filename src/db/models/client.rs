//! Client (member) identities.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Subscription plan tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanTier {
    Free,
    Essential,
    Concierge,
}

impl std::fmt::Display for PlanTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanTier::Free => write!(f, "free"),
            PlanTier::Essential => write!(f, "essential"),
            PlanTier::Concierge => write!(f, "concierge"),
        }
    }
}

impl std::str::FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "free" => Ok(PlanTier::Free),
            "essential" => Ok(PlanTier::Essential),
            "concierge" => Ok(PlanTier::Concierge),
            _ => Err(format!("Unknown plan tier: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Client {
    pub id: String,
    pub email: String,
    pub organization: String,
    pub plan: String,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub intake_completed: bool,
    pub is_active: bool,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub email: String,
    pub organization: String,
    #[serde(default)]
    pub plan: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateClientRequest {
    pub organization: Option<String>,
    pub plan: Option<String>,
    pub billing_customer_id: Option<String>,
    pub billing_subscription_id: Option<String>,
    pub intake_completed: Option<bool>,
    pub is_active: Option<bool>,
}

/// Response for listing clients with pagination
#[derive(Debug, Serialize)]
pub struct ClientListResponse {
    pub items: Vec<Client>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct ClientListQuery {
    /// Page number (1-indexed, defaults to 1)
    pub page: Option<i64>,
    /// Items per page (defaults to 50, max 100)
    pub per_page: Option<i64>,
}

pub async fn find_active_client_by_email(
    db: &SqlitePool,
    email: &str,
) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM clients WHERE email = ? AND is_active = 1")
        .bind(email)
        .fetch_optional(db)
        .await
}

pub async fn get_client(db: &SqlitePool, id: &str) -> Result<Option<Client>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM clients WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn list_clients(
    db: &SqlitePool,
    query: &ClientListQuery,
) -> Result<ClientListResponse, sqlx::Error> {
    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(50).clamp(1, 100);
    let offset = (page - 1) * per_page;

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM clients")
        .fetch_one(db)
        .await?;

    let items = sqlx::query_as("SELECT * FROM clients ORDER BY created_at DESC LIMIT ? OFFSET ?")
        .bind(per_page)
        .bind(offset)
        .fetch_all(db)
        .await?;

    Ok(ClientListResponse {
        items,
        total: total.0,
        page,
        per_page,
    })
}

pub async fn create_client(
    db: &SqlitePool,
    email: &str,
    organization: &str,
    plan: PlanTier,
) -> Result<Client, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO clients (id, email, organization, plan, intake_completed, is_active, created_at, updated_at)
        VALUES (?, ?, ?, ?, 0, 1, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(email)
    .bind(organization)
    .bind(plan.to_string())
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as("SELECT * FROM clients WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Update a client, merging unset fields from the existing row.
pub async fn update_client(
    db: &SqlitePool,
    id: &str,
    request: &UpdateClientRequest,
    plan: Option<PlanTier>,
) -> Result<Client, sqlx::Error> {
    let existing = get_client(db, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    let organization = request
        .organization
        .as_deref()
        .unwrap_or(&existing.organization);
    let plan = plan
        .map(|p| p.to_string())
        .unwrap_or_else(|| existing.plan.clone());
    let billing_customer_id = request
        .billing_customer_id
        .as_deref()
        .or(existing.billing_customer_id.as_deref());
    let billing_subscription_id = request
        .billing_subscription_id
        .as_deref()
        .or(existing.billing_subscription_id.as_deref());
    let intake_completed = request.intake_completed.unwrap_or(existing.intake_completed);
    let is_active = request.is_active.unwrap_or(existing.is_active);
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE clients
        SET organization = ?, plan = ?, billing_customer_id = ?, billing_subscription_id = ?,
            intake_completed = ?, is_active = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(organization)
    .bind(&plan)
    .bind(billing_customer_id)
    .bind(billing_subscription_id)
    .bind(intake_completed)
    .bind(is_active)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;

    get_client(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Deactivate a client. Existing member sessions are removed so the
/// deactivation takes effect immediately.
pub async fn deactivate_client(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    let result = sqlx::query("UPDATE clients SET is_active = 0, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?;

    super::session::destroy_sessions_for_client(db, id).await?;

    Ok(result.rows_affected() > 0)
}

pub async fn touch_client_last_login(db: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    let now = chrono::Utc::now().to_rfc3339();
    sqlx::query("UPDATE clients SET last_login_at = ?, updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
