use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::party::Client;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::parties::{self, NewParty, PartyKind, PartyUpdate};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

/// GET /api/clients
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Client>> {
    let inactive = include_inactive(&user, &params);
    let clients = parties::list(&pool, PartyKind::Client, &params, inactive).await?;
    Ok(ApiResponse::success(clients))
}

/// GET /api/clients/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Client> {
    let client = parties::get(&pool, PartyKind::Client, id).await?;
    Ok(ApiResponse::success(client))
}

/// POST /api/clients - Create with the next `AE-C-NNN` number
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewParty>,
) -> ApiResult<Client> {
    require_role(&user, allow::CLIENT_WRITE)?;
    input.validate()?;
    let client = parties::create(&pool, PartyKind::Client, input, user.id).await?;
    Ok(ApiResponse::created(client))
}

/// PUT /api/clients/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<PartyUpdate>,
) -> ApiResult<Client> {
    require_role(&user, allow::CLIENT_WRITE)?;
    input.validate()?;
    let client = parties::update(&pool, PartyKind::Client, id, input, user.id).await?;
    Ok(ApiResponse::success(client))
}

/// DELETE /api/clients/:id - Soft delete
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::CLIENT_WRITE)?;
    soft_delete(&pool, EntityType::Client, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}
