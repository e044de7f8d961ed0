// Client, vendor and legacy invoices share one route prefix: /api/invoices/{kind}

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::invoice::{ClientInvoice, LegacyInvoice, VendorInvoice};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::invoices::{
    self, ClientInvoiceUpdate, InvoiceFilter, NewClientInvoice, NewVendorInvoice, VendorInvoiceUpdate,
};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

/// GET /api/invoices/client?status=&client_id=
pub async fn client_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<InvoiceFilter>,
) -> ApiResult<Vec<ClientInvoice>> {
    let inactive = include_inactive(&user, &params);
    Ok(ApiResponse::success(invoices::list_client(&pool, &params, &filter, inactive).await?))
}

/// GET /api/invoices/client/:id
pub async fn client_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ClientInvoice> {
    Ok(ApiResponse::success(invoices::get_client(&pool, id).await?))
}

/// POST /api/invoices/client
pub async fn client_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewClientInvoice>,
) -> ApiResult<ClientInvoice> {
    require_role(&user, allow::FINANCE)?;
    input.validate()?;
    Ok(ApiResponse::created(invoices::create_client(&pool, input, user.id).await?))
}

/// PUT /api/invoices/client/:id
pub async fn client_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<ClientInvoiceUpdate>,
) -> ApiResult<ClientInvoice> {
    require_role(&user, allow::FINANCE)?;
    input.validate()?;
    Ok(ApiResponse::success(invoices::update_client(&pool, id, input, user.id).await?))
}

/// DELETE /api/invoices/client/:id - Soft delete
pub async fn client_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::FINANCE)?;
    soft_delete(&pool, EntityType::ClientInvoice, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}

/// GET /api/invoices/vendor?status=&vendor_id=
pub async fn vendor_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<InvoiceFilter>,
) -> ApiResult<Vec<VendorInvoice>> {
    let inactive = include_inactive(&user, &params);
    Ok(ApiResponse::success(invoices::list_vendor(&pool, &params, &filter, inactive).await?))
}

/// GET /api/invoices/vendor/:id
pub async fn vendor_get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<VendorInvoice> {
    Ok(ApiResponse::success(invoices::get_vendor(&pool, id).await?))
}

/// POST /api/invoices/vendor - Record a bill received from a vendor
pub async fn vendor_create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewVendorInvoice>,
) -> ApiResult<VendorInvoice> {
    require_role(&user, allow::FINANCE)?;
    input.validate()?;
    Ok(ApiResponse::created(invoices::create_vendor(&pool, input, user.id).await?))
}

/// PUT /api/invoices/vendor/:id
pub async fn vendor_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<VendorInvoiceUpdate>,
) -> ApiResult<VendorInvoice> {
    require_role(&user, allow::FINANCE)?;
    input.validate()?;
    Ok(ApiResponse::success(invoices::update_vendor(&pool, id, input, user.id).await?))
}

/// DELETE /api/invoices/vendor/:id - Soft delete
pub async fn vendor_delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::FINANCE)?;
    soft_delete(&pool, EntityType::VendorInvoice, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}

/// GET /api/invoices/legacy - Imported history, read-only
pub async fn legacy_list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<LegacyInvoice>> {
    require_role(&user, allow::FINANCE)?;
    Ok(ApiResponse::success(invoices::list_legacy(&pool, &params).await?))
}

/// GET /api/invoices/legacy/:id
pub async fn legacy_get(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<LegacyInvoice> {
    require_role(&user, allow::FINANCE)?;
    Ok(ApiResponse::success(invoices::get_legacy(&pool, id).await?))
}
