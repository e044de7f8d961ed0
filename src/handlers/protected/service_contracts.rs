use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::service::{ServiceContract, ServiceContractDetail, ServiceJob};
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::service_contracts::{self, JobFilter, JobUpdate, NewServiceContract};
use crate::types::ListParams;

/// GET /api/service-contracts
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<ServiceContract>> {
    let inactive = include_inactive(&user, &params);
    Ok(ApiResponse::success(service_contracts::list(&pool, &params, inactive).await?))
}

/// GET /api/service-contracts/:id - Contract with its scheduled jobs
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<ServiceContractDetail> {
    Ok(ApiResponse::success(service_contracts::get(&pool, id).await?))
}

/// POST /api/service-contracts - Create and expand the visit schedule into jobs
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewServiceContract>,
) -> ApiResult<ServiceContractDetail> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    let contract = service_contracts::create(&pool, input, user.id).await?;
    Ok(ApiResponse::created(contract))
}

/// DELETE /api/service-contracts/:id - Archive; outstanding visits are cancelled
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::SALES_WRITE)?;
    service_contracts::archive(&pool, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}

/// GET /api/service-contracts/:id/jobs
pub async fn jobs(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Vec<ServiceJob>> {
    // 404 for unknown contracts rather than an empty list
    service_contracts::get(&pool, id).await?;
    Ok(ApiResponse::success(service_contracts::jobs_for_contract(&pool, id).await?))
}

/// GET /api/service-jobs?contract_id=&technician_id=&status=&from=&to=
pub async fn job_list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<JobFilter>,
) -> ApiResult<Vec<ServiceJob>> {
    Ok(ApiResponse::success(service_contracts::list_jobs(&pool, &params, &filter).await?))
}

/// PUT /api/service-jobs/:id - Technicians may only touch their own jobs
pub async fn job_update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<JobUpdate>,
) -> ApiResult<ServiceJob> {
    require_role(&user, allow::FIELD_SERVICE)?;
    input.validate()?;
    let job = service_contracts::update_job(&pool, id, input, user.id, user.role).await?;
    Ok(ApiResponse::success(job))
}
