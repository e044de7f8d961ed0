//! Activity log and in-app notifications written alongside business records.

use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::ServiceError;
use crate::auth::Role;
use crate::database::manager::DatabaseError;
use crate::database::models::activity::{ActivityLog, Notification};
use crate::types::EntityType;

pub async fn log(
    conn: &mut PgConnection,
    entity: EntityType,
    entity_id: Uuid,
    action: &str,
    summary: impl Into<String>,
    user_id: Option<Uuid>,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO activity_logs (id, entity_type, entity_id, action, summary, user_id)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(Uuid::new_v4())
    .bind(entity.as_str())
    .bind(entity_id)
    .bind(action)
    .bind(summary.into())
    .bind(user_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn notify(
    conn: &mut PgConnection,
    user_id: Uuid,
    title: &str,
    body: &str,
    link: Option<&str>,
) -> Result<(), DatabaseError> {
    sqlx::query(
        "INSERT INTO notifications (id, user_id, title, body, link)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .bind(body)
    .bind(link)
    .execute(conn)
    .await?;
    Ok(())
}

/// Notify every active user holding one of `roles`, except `exclude`
pub async fn notify_roles(
    conn: &mut PgConnection,
    roles: &[Role],
    exclude: Option<Uuid>,
    title: &str,
    body: &str,
    link: Option<&str>,
) -> Result<u64, DatabaseError> {
    let roles: Vec<String> = roles.iter().map(|r| r.as_str().to_string()).collect();
    let result = sqlx::query(
        "INSERT INTO notifications (id, user_id, title, body, link)
         SELECT gen_random_uuid(), id, $2, $3, $4
         FROM users
         WHERE role = ANY($1) AND is_active = true AND ($5::uuid IS NULL OR id <> $5)",
    )
    .bind(roles)
    .bind(title)
    .bind(body)
    .bind(link)
    .bind(exclude)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

pub async fn list_for_entity(
    pool: &PgPool,
    entity: EntityType,
    entity_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ActivityLog>, ServiceError> {
    let rows = sqlx::query_as::<_, ActivityLog>(
        "SELECT id, entity_type, entity_id, action, summary, user_id, created_at
         FROM activity_logs
         WHERE entity_type = $1 AND entity_id = $2
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(entity.as_str())
    .bind(entity_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Most recent activity across the tenant
pub async fn list_recent(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<ActivityLog>, ServiceError> {
    let rows = sqlx::query_as::<_, ActivityLog>(
        "SELECT id, entity_type, entity_id, action, summary, user_id, created_at
         FROM activity_logs
         ORDER BY created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn list_notifications(
    pool: &PgPool,
    user_id: Uuid,
    unread_only: bool,
    limit: i64,
    offset: i64,
) -> Result<Vec<Notification>, ServiceError> {
    let rows = sqlx::query_as::<_, Notification>(
        "SELECT id, user_id, title, body, link, is_read, created_at
         FROM notifications
         WHERE user_id = $1 AND (NOT $2 OR is_read = false)
         ORDER BY created_at DESC
         LIMIT $3 OFFSET $4",
    )
    .bind(user_id)
    .bind(unread_only)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Users may only mark their own notifications
pub async fn mark_read(pool: &PgPool, user_id: Uuid, id: Uuid) -> Result<(), ServiceError> {
    let result = sqlx::query("UPDATE notifications SET is_read = true WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::NotFound("Notification not found".to_string()));
    }
    Ok(())
}

pub async fn mark_all_read(pool: &PgPool, user_id: Uuid) -> Result<u64, ServiceError> {
    let result = sqlx::query("UPDATE notifications SET is_read = true WHERE user_id = $1 AND is_read = false")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
