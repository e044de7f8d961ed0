use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::project::Tender;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::projects::{self, NewTender, TenderUpdate};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

#[derive(Debug, Default, Deserialize)]
pub struct TenderQuery {
    pub status: Option<String>,
}

/// GET /api/tenders?status=
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(query): Query<TenderQuery>,
) -> ApiResult<Vec<Tender>> {
    let inactive = include_inactive(&user, &params);
    let tenders = projects::list_tenders(&pool, &params, query.status.as_deref(), inactive).await?;
    Ok(ApiResponse::success(tenders))
}

/// GET /api/tenders/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Tender> {
    Ok(ApiResponse::success(projects::get_tender(&pool, id).await?))
}

/// POST /api/tenders
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewTender>,
) -> ApiResult<Tender> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    Ok(ApiResponse::created(projects::create_tender(&pool, input, user.id).await?))
}

/// PUT /api/tenders/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<TenderUpdate>,
) -> ApiResult<Tender> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    Ok(ApiResponse::success(projects::update_tender(&pool, id, input, user.id).await?))
}

/// DELETE /api/tenders/:id - Soft delete
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::SALES_WRITE)?;
    soft_delete(&pool, EntityType::Tender, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}
