use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::user::User;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::users::{self, NewUser, UserUpdate};
use crate::types::ListParams;

/// GET /api/users - Admins and managers
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<User>> {
    require_role(&user, allow::MANAGEMENT)?;
    let inactive = include_inactive(&user, &params);
    Ok(ApiResponse::success(users::list(&pool, &params, inactive).await?))
}

/// GET /api/users/:id - Admins, managers, or the user themselves
pub async fn get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<User> {
    if id != user.id {
        require_role(&user, allow::MANAGEMENT)?;
    }
    Ok(ApiResponse::success(users::get(&pool, id).await?))
}

/// POST /api/users
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewUser>,
) -> ApiResult<User> {
    require_role(&user, allow::USER_ADMIN)?;
    input.validate()?;
    let created = users::create(&pool, input, Some(user.id)).await?;
    Ok(ApiResponse::created(created))
}

/// PUT /api/users/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<UserUpdate>,
) -> ApiResult<User> {
    require_role(&user, allow::USER_ADMIN)?;
    input.validate()?;
    Ok(ApiResponse::success(users::update(&pool, id, input, user.id).await?))
}

/// DELETE /api/users/:id - Deactivate
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::USER_ADMIN)?;
    users::deactivate(&pool, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}
