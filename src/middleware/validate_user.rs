use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

use super::auth::{AuthSource, AuthUser};
use super::validate_tenant::{TenantPool, ValidatedTenant};
use crate::auth::Role;
use crate::database::models::user::User;
use crate::error::ApiError;

/// Authenticated, active user of a validated tenant; what handlers extract
#[derive(Clone, Debug)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub tenant_id: Uuid,
    pub tenant: String,
    pub database: String,
    pub source: AuthSource,
}

/// Ensures the user exists and is active in the tenant database
pub async fn validate_user_middleware(mut request: Request, next: Next) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("Authentication required before user validation"))?;

    let tenant = request
        .extensions()
        .get::<ValidatedTenant>()
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("Tenant required before user validation"))?;

    let TenantPool(pool) = request
        .extensions()
        .get::<TenantPool>()
        .cloned()
        .ok_or_else(|| ApiError::internal_server_error("Tenant pool required before user validation"))?;

    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, name, role, password_hash, last_login_at, is_active, created_at, updated_at
         FROM users
         WHERE id = $1 AND is_active = true",
    )
    .bind(auth_user.user_id)
    .fetch_optional(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Database error validating user in tenant '{}': {}", tenant.database, e);
        ApiError::internal_server_error("Failed to validate user")
    })?
    .ok_or_else(|| {
        tracing::warn!("User {} not found or inactive in tenant '{}'", auth_user.user_id, tenant.name);
        ApiError::forbidden(format!("User is not active in tenant '{}'", tenant.name))
    })?;

    // A JWT minted before a role change must not keep the old role
    if let Some(claimed) = &auth_user.claimed_role {
        if *claimed != user.role {
            tracing::warn!("JWT role '{}' doesn't match database role '{}' for {}", claimed, user.role, user.email);
            return Err(ApiError::forbidden("User access level mismatch"));
        }
    }

    let role: Role = user.role.parse().map_err(|_| {
        tracing::error!("User {} has unknown role '{}'", user.email, user.role);
        ApiError::forbidden("User role is not recognised")
    })?;

    tracing::debug!("User validation successful: {} ({}) in tenant '{}'", user.email, role, tenant.name);

    request.extensions_mut().insert(CurrentUser {
        id: user.id,
        email: user.email,
        name: user.name,
        role,
        tenant_id: tenant.id,
        tenant: tenant.name,
        database: tenant.database,
        source: auth_user.source,
    });

    Ok(next.run(request).await)
}
