//! Server-side sessions stored in the main database.
//!
//! The browser holds a random token; only its SHA-256 digest is persisted.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use super::AuthError;
use crate::config;
use crate::database::models::session::SessionRecord;

/// 32 random bytes, URL-safe base64
pub fn new_session_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hex SHA-256 of a session token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn session_ttl() -> Duration {
    Duration::hours(config::config().security.session_ttl_hours as i64)
}

/// Persist a new session and return the raw token for the cookie
pub async fn create_session(
    main_pool: &PgPool,
    tenant_id: Uuid,
    user_id: Uuid,
) -> Result<(String, DateTime<Utc>), AuthError> {
    let token = new_session_token();
    let expires_at = Utc::now() + session_ttl();

    sqlx::query(
        "INSERT INTO sessions (id, token_hash, tenant_id, user_id, expires_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(hash_token(&token))
    .bind(tenant_id)
    .bind(user_id)
    .bind(expires_at)
    .execute(main_pool)
    .await?;

    Ok((token, expires_at))
}

/// Resolve a session token to its live session, rejecting expired ones
pub async fn find_session(main_pool: &PgPool, token: &str) -> Result<SessionRecord, AuthError> {
    let record = sqlx::query_as::<_, SessionRecord>(
        "SELECT s.id, s.user_id, s.expires_at, t.name AS tenant_name, t.database AS tenant_database
         FROM sessions s
         JOIN tenants t ON t.id = s.tenant_id
         WHERE s.token_hash = $1",
    )
    .bind(hash_token(token))
    .fetch_optional(main_pool)
    .await?
    .ok_or(AuthError::MissingCredentials)?;

    if record.expires_at <= Utc::now() {
        delete_session(main_pool, token).await?;
        return Err(AuthError::SessionExpired);
    }
    Ok(record)
}

pub async fn delete_session(main_pool: &PgPool, token: &str) -> Result<(), AuthError> {
    sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
        .bind(hash_token(token))
        .execute(main_pool)
        .await?;
    Ok(())
}

/// Drop expired sessions; returns how many were removed
pub async fn purge_expired(main_pool: &PgPool) -> Result<u64, AuthError> {
    let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= NOW()")
        .execute(main_pool)
        .await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_random_and_url_safe() {
        let a = new_session_token();
        let b = new_session_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn token_hash_is_stable_hex() {
        let h = hash_token("abc");
        assert_eq!(h, "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");
        assert_eq!(hash_token("abc"), h);
    }
}
