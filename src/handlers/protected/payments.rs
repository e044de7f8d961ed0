use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::invoice::Payment;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::payments::{self, NewPayment, PaymentFilter};
use crate::types::ListParams;

/// GET /api/payments?direction=&client_invoice_id=&vendor_invoice_id=
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<PaymentFilter>,
) -> ApiResult<Vec<Payment>> {
    Ok(ApiResponse::success(payments::list(&pool, &params, &filter).await?))
}

/// GET /api/payments/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Payment> {
    Ok(ApiResponse::success(payments::get(&pool, id).await?))
}

/// POST /api/payments - Record a payment against one invoice
///
/// The invoice's `amount_paid` and status move in the same transaction;
/// payments larger than the outstanding balance are rejected.
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewPayment>,
) -> ApiResult<Payment> {
    require_role(&user, allow::FINANCE)?;
    input.validate()?;
    let payment = payments::create(&pool, input, user.id).await?;
    Ok(ApiResponse::created(payment))
}
