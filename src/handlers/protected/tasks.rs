use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use uuid::Uuid;

use super::utils::Deleted;
use crate::database::models::task::Task;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::tasks::{self, Actor, NewTask, TaskFilter, TaskUpdate};
use crate::types::ListParams;

fn actor(user: &CurrentUser) -> Actor {
    Actor {
        id: user.id,
        role: user.role,
    }
}

/// GET /api/tasks?status=&assignee_id=&project_id=&mine=true
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(filter): Query<TaskFilter>,
) -> ApiResult<Vec<Task>> {
    Ok(ApiResponse::success(tasks::list(&pool, &params, &filter, user.id).await?))
}

/// GET /api/tasks/:id
pub async fn get(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Task> {
    Ok(ApiResponse::success(tasks::get(&pool, id).await?))
}

/// POST /api/tasks - Any user; the assignee is notified
pub async fn create(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Json(input): Json<NewTask>,
) -> ApiResult<Task> {
    input.validate()?;
    let task = tasks::create(&pool, input, actor(&user), &user.name).await?;
    Ok(ApiResponse::created(task))
}

/// PUT /api/tasks/:id - Creator, assignee, admin or manager
pub async fn update(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
    Json(input): Json<TaskUpdate>,
) -> ApiResult<Task> {
    input.validate()?;
    let task = tasks::update(&pool, id, input, actor(&user), &user.name).await?;
    Ok(ApiResponse::success(task))
}

/// DELETE /api/tasks/:id - Soft delete, same permission as update
pub async fn delete(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<Deleted> {
    tasks::delete(&pool, id, actor(&user)).await?;
    Ok(ApiResponse::success(Deleted::new(id)))
}
