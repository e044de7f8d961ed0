use axum::{
    extract::{Path, Query},
    Extension,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::models::activity::Notification;
use crate::middleware::{ApiResponse, ApiResult, CurrentUser, TenantPool};
use crate::services::activity;
use crate::types::ListParams;

#[derive(Debug, Default, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// GET /api/notifications?unread=true - The caller's own notifications
pub async fn list(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Vec<Notification>> {
    let notifications =
        activity::list_notifications(&pool, user.id, query.unread, params.limit(), params.offset()).await?;
    Ok(ApiResponse::success(notifications))
}

/// POST /api/notifications/:id/read
pub async fn mark_read(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Path(id): Path<Uuid>,
) -> ApiResult<MarkedRead> {
    activity::mark_read(&pool, user.id, id).await?;
    Ok(ApiResponse::success(MarkedRead { updated: 1 }))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    Extension(user): Extension<CurrentUser>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<MarkedRead> {
    let updated = activity::mark_all_read(&pool, user.id).await?;
    Ok(ApiResponse::success(MarkedRead { updated }))
}
