use axum::{extract::Query, Extension};
use serde::Deserialize;
use uuid::Uuid;

use crate::database::models::activity::ActivityLog;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, TenantPool};
use crate::services::activity;
use crate::types::{EntityType, ListParams};

#[derive(Debug, Default, Deserialize)]
pub struct ActivityQuery {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
}

/// GET /api/activity?entity_type=&entity_id= - One record's history, or the
/// tenant-wide feed when no record is named
pub async fn list(
    Extension(TenantPool(pool)): Extension<TenantPool>,
    Query(params): Query<ListParams>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<Vec<ActivityLog>> {
    let entries = match (query.entity_type, query.entity_id) {
        (Some(entity), Some(id)) => {
            activity::list_for_entity(&pool, entity, id, params.limit(), params.offset()).await?
        }
        (None, None) => activity::list_recent(&pool, params.limit(), params.offset()).await?,
        _ => {
            return Err(ApiError::bad_request(
                "entity_type and entity_id must be given together",
            ))
        }
    };
    Ok(ApiResponse::success(entries))
}
