use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

/// Stored OAuth tokens for the tenant's accounting platform
#[derive(Debug, Clone, FromRow)]
pub struct AccountingConnection {
    pub id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub external_tenant_id: Option<String>,
    pub connected_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
