/// Role model
///
/// A role groups permissions and carries a `scope` naming the application
/// surface it is valid for (`app` for end users, `dashboard` for admins).
/// System roles cannot be modified or deleted by the CRUD surface.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: i64,
    pub uuid: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub scope: String,
    pub is_system: bool,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
