//! Client case tracking: CBP filings, takedown cases, anonymity checks.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// The kinds of engagement the practice tracks per client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseKind {
    CbpFiling,
    Takedown,
    AnonymityCheck,
}

impl std::fmt::Display for CaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseKind::CbpFiling => write!(f, "cbp_filing"),
            CaseKind::Takedown => write!(f, "takedown"),
            CaseKind::AnonymityCheck => write!(f, "anonymity_check"),
        }
    }
}

impl std::str::FromStr for CaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cbp_filing" => Ok(CaseKind::CbpFiling),
            "takedown" => Ok(CaseKind::Takedown),
            "anonymity_check" => Ok(CaseKind::AnonymityCheck),
            _ => Err(format!("Unknown case kind: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl std::fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaseStatus::Open => write!(f, "open"),
            CaseStatus::InProgress => write!(f, "in_progress"),
            CaseStatus::Resolved => write!(f, "resolved"),
            CaseStatus::Closed => write!(f, "closed"),
        }
    }
}

impl std::str::FromStr for CaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "open" => Ok(CaseStatus::Open),
            "in_progress" => Ok(CaseStatus::InProgress),
            "resolved" => Ok(CaseStatus::Resolved),
            "closed" => Ok(CaseStatus::Closed),
            _ => Err(format!("Unknown case status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ClientCase {
    pub id: String,
    pub client_id: String,
    pub kind: String,
    pub title: String,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCaseRequest {
    pub kind: String,
    pub title: String,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCaseRequest {
    pub title: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

pub async fn list_cases_for_client(
    db: &SqlitePool,
    client_id: &str,
) -> Result<Vec<ClientCase>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM client_cases WHERE client_id = ? ORDER BY created_at DESC")
        .bind(client_id)
        .fetch_all(db)
        .await
}

pub async fn get_case(db: &SqlitePool, id: &str) -> Result<Option<ClientCase>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM client_cases WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn create_case(
    db: &SqlitePool,
    client_id: &str,
    kind: CaseKind,
    title: &str,
    notes: Option<&str>,
) -> Result<ClientCase, sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO client_cases (id, client_id, kind, title, status, notes, created_at, updated_at)
        VALUES (?, ?, ?, ?, 'open', ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(client_id)
    .bind(kind.to_string())
    .bind(title)
    .bind(notes)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    sqlx::query_as("SELECT * FROM client_cases WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await
}

/// Update a case, merging unset fields from the existing row.
pub async fn update_case(
    db: &SqlitePool,
    id: &str,
    title: Option<&str>,
    status: Option<CaseStatus>,
    notes: Option<&str>,
) -> Result<ClientCase, sqlx::Error> {
    let existing = get_case(db, id).await?.ok_or(sqlx::Error::RowNotFound)?;

    let new_title = title.unwrap_or(&existing.title);
    let new_status = status
        .map(|s| s.to_string())
        .unwrap_or_else(|| existing.status.clone());
    let new_notes = notes.or(existing.notes.as_deref());
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query(
        r#"
        UPDATE client_cases
        SET title = ?, status = ?, notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(new_title)
    .bind(&new_status)
    .bind(new_notes)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;

    get_case(db, id).await?.ok_or(sqlx::Error::RowNotFound)
}
