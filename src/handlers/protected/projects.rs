use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::{include_inactive, Deleted};
use crate::auth::roles::allow;
use crate::auth::require_role;
use crate::database::models::project::Project;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::projects::{self, NewProject, ProjectFilter, ProjectUpdate};
use crate::services::soft_delete;
use crate::types::{EntityType, ListParams};

/// GET /api/projects?client_id=&status=
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<ProjectFilter>,
) -> ApiResult<Vec<Project>> {
    let inactive = include_inactive(&user, &params);
    let projects = projects::list_projects(&pool, &params, &filter, inactive).await?;
    Ok(ApiResponse::success(projects))
}

/// GET /api/projects/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Project> {
    Ok(ApiResponse::success(projects::get_project(&pool, id).await?))
}

/// POST /api/projects
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewProject>,
) -> ApiResult<Project> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    let project = projects::create_project(&pool, input, user.id).await?;
    Ok(ApiResponse::created(project))
}

/// PUT /api/projects/:id
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<ProjectUpdate>,
) -> ApiResult<Project> {
    require_role(&user, allow::SALES_WRITE)?;
    input.validate()?;
    let project = projects::update_project(&pool, id, input, user.id).await?;
    Ok(ApiResponse::success(project))
}

/// DELETE /api/projects/:id - Soft delete
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    require_role(&user, allow::SALES_WRITE)?;
    soft_delete(&pool, EntityType::Project, id, user.id).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}
