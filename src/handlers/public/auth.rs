use axum::{
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::cookies::{build_cookie, clear_cookie, read_cookie, set_cookies, SESSION_COOKIE, TOKEN_COOKIE};
use crate::auth::{generate_jwt, session, AuthError, Claims};
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::error::ApiError;
use crate::middleware::ApiResponse;
use crate::services::{users, TenantService};
use crate::validation::FieldErrors;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub tenant: String,
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("tenant", &self.tenant)
            .require("email", &self.email)
            .require("password", &self.password);
        errors.into_result()
    }
}

#[derive(Debug, Serialize)]
pub struct LoginUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// JWT for API clients that cannot hold cookies
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub tenant: String,
    pub user: LoginUser,
}

/// POST /auth/login - Verify credentials, open a session and set both cookies
///
/// Unknown tenants, unknown users and wrong passwords all produce the same
/// 401 so the response does not reveal which part was wrong.
pub async fn login_post(Json(input): Json<LoginRequest>) -> Result<Response, ApiError> {
    input.validate()?;

    let main_pool = DatabaseManager::main_pool().await?;
    let tenant_name = input.tenant.trim().to_lowercase();
    let tenant = TenantService::with_pool(main_pool.clone())
        .find_active(&tenant_name)
        .await?
        .ok_or_else(|| {
            tracing::info!("Login attempt for unknown or inactive tenant '{}'", tenant_name);
            AuthError::InvalidCredentials
        })?;

    let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
    let user = users::authenticate(&pool, &input.email, &input.password).await?;

    let (session_token, expires_at) = session::create_session(&main_pool, tenant.id, user.id).await?;
    let claims = Claims::new(
        tenant.name.clone(),
        tenant.database.clone(),
        user.id,
        user.email.clone(),
        user.role.clone(),
    );
    let jwt = generate_jwt(&claims)?;

    tracing::info!("User {} logged in to tenant '{}'", user.email, tenant.name);

    let security = &config::config().security;
    let session_max_age = session::session_ttl().num_seconds();
    let token_max_age = (security.jwt_expiry_hours * 3600) as i64;

    let body = LoginResponse {
        token: jwt.clone(),
        expires_at,
        tenant: tenant.name,
        user: LoginUser {
            id: user.id,
            email: user.email,
            name: user.name,
            role: user.role,
        },
    };

    let mut response = ApiResponse::success(body).into_response();
    set_cookies(
        response.headers_mut(),
        [
            build_cookie(SESSION_COOKIE, &session_token, session_max_age),
            build_cookie(TOKEN_COOKIE, &jwt, token_max_age),
        ],
    );
    Ok(response)
}

#[derive(Debug, Serialize)]
pub struct LogoutResponse {
    pub logged_out: bool,
}

/// POST /auth/logout - Revoke the server-side session and clear both cookies
pub async fn logout_post(headers: HeaderMap) -> Result<Response, ApiError> {
    if let Some(token) = read_cookie(&headers, SESSION_COOKIE) {
        let main_pool = DatabaseManager::main_pool().await?;
        session::delete_session(&main_pool, &token).await?;
    }

    let mut response = ApiResponse::success(LogoutResponse { logged_out: true }).into_response();
    set_cookies(
        response.headers_mut(),
        [clear_cookie(SESSION_COOKIE), clear_cookie(TOKEN_COOKIE)],
    );
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_requires_every_field() {
        let input = LoginRequest {
            tenant: " ".into(),
            email: "ops@acme.test".into(),
            password: String::new(),
        };
        let err = input.validate().unwrap_err();
        let body = err.to_json();
        assert_eq!(err.status_code(), 400);
        assert!(body["field_errors"].get("tenant").is_some());
        assert!(body["field_errors"].get("password").is_some());
        assert!(body["field_errors"].get("email").is_none());
    }
}
