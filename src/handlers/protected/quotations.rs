use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::invoice::ClientInvoice;
use crate::database::models::quotation::{Quotation, QuotationDetail};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::quotations::{self, NewQuotation, QuotationFilter, QuotationUpdate, StatusChange};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

/// GET /api/quotations?client_id=&status=
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<QuotationFilter>,
) -> ApiResult<Vec<Quotation>> {
    let inactive = include_inactive(&user, &params);
    Ok(ApiResponse::success(quotations::list(&pool, &params, &filter, inactive).await?))
}

/// GET /api/quotations/:id - Header with line items
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<QuotationDetail> {
    Ok(ApiResponse::success(quotations::get(&pool, id).await?))
}

/// POST /api/quotations - Price the lines and number the quotation
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewQuotation>,
) -> ApiResult<QuotationDetail> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    let quotation = quotations::create(&pool, input, user.id).await?;
    Ok(ApiResponse::created(quotation))
}

/// PUT /api/quotations/:id - Draft quotations only; `items` replaces every line
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<QuotationUpdate>,
) -> ApiResult<QuotationDetail> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    Ok(ApiResponse::success(quotations::update(&pool, id, input, user.id).await?))
}

/// DELETE /api/quotations/:id - Soft delete
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::SALES_WRITE)?;
    soft_delete(&pool, EntityType::Quotation, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}

/// POST /api/quotations/:id/status
pub async fn set_status(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<StatusChange>,
) -> ApiResult<Quotation> {
    require_role(&user, allow::SALES_WRITE)?;
    let quotation = quotations::set_status(&pool, id, input.status.trim(), user.id).await?;
    Ok(ApiResponse::success(quotation))
}

/// POST /api/quotations/:id/convert - Accepted quotation becomes a draft invoice
pub async fn convert(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientInvoice> {
    require_role(&user, allow::QUOTATION_CONVERT)?;
    let invoice = quotations::convert(&pool, id, user.id).await?;
    Ok(ApiResponse::created(invoice))
}
