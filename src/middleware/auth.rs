use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use crate::auth::cookies::{read_cookie, SESSION_COOKIE, TOKEN_COOKIE};
use crate::auth::{session, validate_jwt, AuthError, Claims};
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;

/// Which credential authenticated the request
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthSource {
    /// Server-side session; carries the raw cookie token so logout can revoke it
    Session(String),
    TokenCookie,
    Bearer,
}

/// Identity resolved from a session or JWT, before tenant and user validation
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub tenant: String,
    pub database: String,
    pub user_id: Uuid,
    /// Role and email asserted by a JWT; sessions always read them from the database
    pub claimed_role: Option<String>,
    pub source: AuthSource,
}

impl AuthUser {
    fn from_claims(claims: Claims, source: AuthSource) -> Self {
        Self {
            tenant: claims.tenant,
            database: claims.database,
            user_id: claims.user_id,
            claimed_role: Some(claims.role),
            source,
        }
    }
}

/// Resolve the caller from, in order: the session cookie, the JWT cookie,
/// then an `Authorization: Bearer` header.
pub async fn authenticate_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = resolve(request.headers()).await?;
    tracing::debug!(
        "Authenticated user {} for tenant '{}' via {:?}",
        auth_user.user_id,
        auth_user.tenant,
        auth_user.source
    );
    request.extensions_mut().insert(auth_user);
    Ok(next.run(request).await)
}

async fn resolve(headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    if let Some(token) = read_cookie(headers, SESSION_COOKIE) {
        let main_pool = DatabaseManager::main_pool().await?;
        match session::find_session(&main_pool, &token).await {
            Ok(record) => {
                return Ok(AuthUser {
                    tenant: record.tenant_name,
                    database: record.tenant_database,
                    user_id: record.user_id,
                    claimed_role: None,
                    source: AuthSource::Session(token),
                });
            }
            // Stale session cookie: fall through to the JWT fallback
            Err(AuthError::MissingCredentials) | Err(AuthError::SessionExpired) => {
                tracing::debug!("Session cookie did not resolve; trying token fallback");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(token) = read_cookie(headers, TOKEN_COOKIE) {
        let claims = validate_jwt(&token)?;
        return Ok(AuthUser::from_claims(claims, AuthSource::TokenCookie));
    }

    if let Some(token) = extract_bearer(headers)? {
        let claims = validate_jwt(&token)?;
        return Ok(AuthUser::from_claims(claims, AuthSource::Bearer));
    }

    Err(AuthError::MissingCredentials.into())
}

/// Bearer token from the Authorization header, if one was sent
fn extract_bearer(headers: &HeaderMap) -> Result<Option<String>, ApiError> {
    let Some(auth_header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let auth_str = auth_header
        .to_str()
        .map_err(|_| ApiError::unauthorized("Invalid Authorization header format"))?;

    match auth_str.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(Some(token.trim().to_string())),
        Some(_) => Err(ApiError::unauthorized("Empty JWT token")),
        None => Err(ApiError::unauthorized("Authorization header must use Bearer token format")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_extraction() {
        let mut headers = HeaderMap::new();
        assert!(extract_bearer(&headers).unwrap().is_none());

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers).unwrap().as_deref(), Some("abc.def.ghi"));

        headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(extract_bearer(&headers).is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer   "));
        assert!(extract_bearer(&headers).is_err());
    }

    #[tokio::test]
    async fn no_credentials_is_unauthorized() {
        let err = resolve(&HeaderMap::new()).await.unwrap_err();
        assert_eq!(err.status_code(), 401);
    }
}
