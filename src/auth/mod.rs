pub mod cookies;
pub mod password;
pub mod roles;
pub mod session;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config;
use crate::database::manager::DatabaseError;

pub use roles::{require_role, Role};

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("no session or token presented")]
    MissingCredentials,

    #[error("session expired")]
    SessionExpired,

    #[error("{0}")]
    InvalidToken(String),

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("JWT generation error: {0}")]
    TokenGeneration(String),

    #[error("JWT secret not configured")]
    InvalidSecret,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        AuthError::Database(err.into())
    }
}

/// JWT claims carried by the fallback token cookie and Bearer header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub tenant: String,
    pub database: String,
    pub user_id: Uuid,
    pub email: String,
    pub role: String,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(tenant: String, database: String, user_id: Uuid, email: String, role: String) -> Self {
        let now = Utc::now();
        let expiry_hours = config::config().security.jwt_expiry_hours;
        let exp = (now + Duration::hours(expiry_hours as i64)).timestamp();

        Self {
            tenant,
            database,
            user_id,
            email,
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

fn jwt_secret() -> Result<&'static str, AuthError> {
    let secret = &config::config().security.jwt_secret;
    if secret.is_empty() {
        return Err(AuthError::InvalidSecret);
    }
    Ok(secret)
}

pub fn generate_jwt(claims: &Claims) -> Result<String, AuthError> {
    let encoding_key = EncodingKey::from_secret(jwt_secret()?.as_bytes());

    encode(&Header::default(), claims, &encoding_key)
        .map_err(|e| AuthError::TokenGeneration(e.to_string()))
}

/// Validate signature and expiry, returning the claims
pub fn validate_jwt(token: &str) -> Result<Claims, AuthError> {
    let decoding_key = DecodingKey::from_secret(jwt_secret()?.as_bytes());

    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::SessionExpired,
            _ => AuthError::InvalidToken(format!("Invalid JWT token: {}", e)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims::new(
            "acme".into(),
            "tenant_0123456789abcdef".into(),
            Uuid::new_v4(),
            "ops@acme.test".into(),
            "manager".into(),
        )
    }

    #[test]
    fn jwt_round_trip() {
        let original = claims();
        let token = generate_jwt(&original).unwrap();
        let decoded = validate_jwt(&token).unwrap();
        assert_eq!(decoded.user_id, original.user_id);
        assert_eq!(decoded.tenant, "acme");
        assert_eq!(decoded.role, "manager");
    }

    #[test]
    fn tampered_jwt_is_rejected() {
        let token = generate_jwt(&claims()).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(validate_jwt(&tampered), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn expired_jwt_reports_expiry() {
        let mut expired = claims();
        expired.iat -= 7200;
        expired.exp = Utc::now().timestamp() - 3600;
        let token = generate_jwt(&expired).unwrap();
        assert!(matches!(validate_jwt(&token), Err(AuthError::SessionExpired)));
    }
}
