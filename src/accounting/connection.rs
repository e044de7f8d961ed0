//! Stored platform tokens, one row per provider in the tenant database.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::client::{AccountingProvider, TokenSet};
use super::AccountingError;
use crate::database::models::accounting::AccountingConnection;

/// Tokens this close to expiry are refreshed before use
pub const REFRESH_WINDOW_SECS: i64 = 60;

const CONNECTION_COLUMNS: &str = "id, provider, access_token, refresh_token, expires_at, \
    external_tenant_id, connected_by, created_at, updated_at";

pub fn needs_refresh(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    expires_at - now <= Duration::seconds(REFRESH_WINDOW_SECS)
}

/// Connection summary shown to administrators; never includes tokens
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStatus {
    pub provider: String,
    pub configured: bool,
    pub connected: bool,
    pub external_tenant_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub connected_by: Option<Uuid>,
    pub connected_at: Option<DateTime<Utc>>,
}

impl ConnectionStatus {
    pub fn new(provider: &str, configured: bool, connection: Option<&AccountingConnection>) -> Self {
        ConnectionStatus {
            provider: provider.to_string(),
            configured,
            connected: connection.is_some(),
            external_tenant_id: connection.and_then(|c| c.external_tenant_id.clone()),
            expires_at: connection.map(|c| c.expires_at),
            connected_by: connection.and_then(|c| c.connected_by),
            connected_at: connection.map(|c| c.created_at),
        }
    }
}

pub async fn load(pool: &PgPool, provider: &str) -> Result<Option<AccountingConnection>, AccountingError> {
    let sql = format!("SELECT {CONNECTION_COLUMNS} FROM accounting_connections WHERE provider = $1");
    let connection = sqlx::query_as::<_, AccountingConnection>(&sql)
        .bind(provider)
        .fetch_optional(pool)
        .await?;
    Ok(connection)
}

/// Store freshly granted tokens, replacing any previous connection
pub async fn save(
    pool: &PgPool,
    provider: &str,
    tokens: &TokenSet,
    connected_by: Uuid,
) -> Result<AccountingConnection, AccountingError> {
    let sql = format!(
        "INSERT INTO accounting_connections
             (id, provider, access_token, refresh_token, expires_at, external_tenant_id, connected_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (provider) DO UPDATE SET
             access_token = EXCLUDED.access_token,
             refresh_token = EXCLUDED.refresh_token,
             expires_at = EXCLUDED.expires_at,
             external_tenant_id = EXCLUDED.external_tenant_id,
             connected_by = EXCLUDED.connected_by,
             created_at = NOW(),
             updated_at = NOW()
         RETURNING {CONNECTION_COLUMNS}"
    );
    let connection = sqlx::query_as::<_, AccountingConnection>(&sql)
        .bind(Uuid::new_v4())
        .bind(provider)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at(Utc::now()))
        .bind(&tokens.external_tenant_id)
        .bind(connected_by)
        .fetch_one(pool)
        .await?;

    tracing::info!("Accounting platform '{}' connected by {}", provider, connected_by);
    Ok(connection)
}

/// Replace the tokens of an existing connection after a refresh
async fn update_tokens(
    pool: &PgPool,
    id: Uuid,
    tokens: &TokenSet,
) -> Result<AccountingConnection, AccountingError> {
    let sql = format!(
        "UPDATE accounting_connections
         SET access_token = $2, refresh_token = $3, expires_at = $4,
             external_tenant_id = COALESCE($5, external_tenant_id), updated_at = NOW()
         WHERE id = $1
         RETURNING {CONNECTION_COLUMNS}"
    );
    let connection = sqlx::query_as::<_, AccountingConnection>(&sql)
        .bind(id)
        .bind(&tokens.access_token)
        .bind(&tokens.refresh_token)
        .bind(tokens.expires_at(Utc::now()))
        .bind(&tokens.external_tenant_id)
        .fetch_optional(pool)
        .await?;
    connection.ok_or(AccountingError::NotConnected)
}

/// Forget the stored tokens; `false` when there was nothing to remove
pub async fn delete(pool: &PgPool, provider: &str) -> Result<bool, AccountingError> {
    let result = sqlx::query("DELETE FROM accounting_connections WHERE provider = $1")
        .bind(provider)
        .execute(pool)
        .await?;
    if result.rows_affected() > 0 {
        tracing::info!("Accounting platform '{}' disconnected", provider);
    }
    Ok(result.rows_affected() > 0)
}

/// Stored connection with usable tokens, refreshing them when close to expiry
pub async fn active(
    pool: &PgPool,
    provider_name: &str,
    provider: &dyn AccountingProvider,
) -> Result<AccountingConnection, AccountingError> {
    let connection = load(pool, provider_name)
        .await?
        .ok_or(AccountingError::NotConnected)?;

    if !needs_refresh(connection.expires_at, Utc::now()) {
        return Ok(connection);
    }

    tracing::debug!("Refreshing accounting tokens for '{}'", provider_name);
    let tokens = provider.refresh_token(&connection.refresh_token).await?;
    update_tokens(pool, connection.id, &tokens).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(expires_at: DateTime<Utc>) -> AccountingConnection {
        let now = Utc::now();
        AccountingConnection {
            id: Uuid::new_v4(),
            provider: "xero".into(),
            access_token: "access".into(),
            refresh_token: "refresh".into(),
            expires_at,
            external_tenant_id: Some("org-1".into()),
            connected_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn tokens_inside_refresh_window_need_refresh() {
        let now = Utc::now();
        assert!(needs_refresh(now + Duration::seconds(30), now));
        assert!(needs_refresh(now + Duration::seconds(60), now));
        assert!(needs_refresh(now - Duration::seconds(5), now));
        assert!(!needs_refresh(now + Duration::seconds(61), now));
        assert!(!needs_refresh(now + Duration::minutes(30), now));
    }

    #[test]
    fn status_without_connection() {
        let status = ConnectionStatus::new("xero", true, None);
        assert!(status.configured);
        assert!(!status.connected);
        assert!(status.expires_at.is_none());
    }

    #[test]
    fn status_never_exposes_tokens() {
        let conn = connection(Utc::now());
        let body = serde_json::to_value(ConnectionStatus::new("xero", true, Some(&conn))).unwrap();
        assert_eq!(body["connected"], true);
        assert_eq!(body["external_tenant_id"], "org-1");
        assert!(body.get("access_token").is_none());
        assert!(body.get("refresh_token").is_none());
    }
}
