use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::party::Vendor;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::parties::{self, NewParty, PartyKind, PartyUpdate};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

/// GET /api/vendors
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Vendor>> {
    let vendors = parties::list(&pool, PartyKind::Vendor, &params, include_inactive(&user, &params)).await?;
    Ok(ApiResponse::success(vendors))
}

/// GET /api/vendors/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vendor> {
    Ok(ApiResponse::success(parties::get(&pool, PartyKind::Vendor, id).await?))
}

/// POST /api/vendors - Create with the next `AE-V-NNN` number
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewParty>,
) -> ApiResult<Vendor> {
    require_role(&user, allow::VENDOR_WRITE)?;
    input.validate()?;
    let vendor = parties::create(&pool, PartyKind::Vendor, input, user.id).await?;
    Ok(ApiResponse::created(vendor))
}

/// PUT /api/vendors/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<PartyUpdate>,
) -> ApiResult<Vendor> {
    require_role(&user, allow::VENDOR_WRITE)?;
    input.validate()?;
    let vendor = parties::update(&pool, PartyKind::Vendor, id, input, user.id).await?;
    Ok(ApiResponse::success(vendor))
}

/// DELETE /api/vendors/:id - Soft delete
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::VENDOR_WRITE)?;
    soft_delete(&pool, EntityType::Vendor, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}
