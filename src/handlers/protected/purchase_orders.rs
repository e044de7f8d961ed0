use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::purchase_order::{PurchaseOrder, PurchaseOrderDetail};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::purchase_orders::{self, NewPurchaseOrder, PurchaseOrderFilter, PurchaseOrderUpdate};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

/// GET /api/purchase-orders?vendor_id=&status=
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<PurchaseOrderFilter>,
) -> ApiResult<Vec<PurchaseOrder>> {
    let inactive = include_inactive(&user, &params);
    Ok(ApiResponse::success(purchase_orders::list(&pool, &params, &filter, inactive).await?))
}

/// GET /api/purchase-orders/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseOrderDetail> {
    Ok(ApiResponse::success(purchase_orders::get(&pool, id).await?))
}

/// POST /api/purchase-orders - Raise a PO; approvers are notified
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewPurchaseOrder>,
) -> ApiResult<PurchaseOrderDetail> {
    require_role(&user, allow::PURCHASING)?;
    input.validate()?;
    let order = purchase_orders::create(&pool, input, user.id).await?;
    Ok(ApiResponse::created(order))
}

/// PUT /api/purchase-orders/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<PurchaseOrderUpdate>,
) -> ApiResult<PurchaseOrderDetail> {
    require_role(&user, allow::PURCHASING)?;
    input.validate()?;
    Ok(ApiResponse::success(purchase_orders::update(&pool, id, input, user.id).await?))
}

/// DELETE /api/purchase-orders/:id - Soft delete
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::PURCHASING)?;
    soft_delete(&pool, EntityType::PurchaseOrder, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}

/// POST /api/purchase-orders/:id/approve
pub async fn approve(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<PurchaseOrder> {
    require_role(&user, allow::MANAGEMENT)?;
    Ok(ApiResponse::success(purchase_orders::approve(&pool, id, user.id).await?))
}
