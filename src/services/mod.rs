pub mod activity;
pub mod invoices;
pub mod parties;
pub mod payments;
pub mod pricing;
pub mod projects;
pub mod purchase_orders;
pub mod quotations;
pub mod service_contracts;
pub mod tasks;
pub mod tenant_service;
pub mod users;

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::database::manager::DatabaseError;
use crate::schedule::ScheduleError;
use crate::types::EntityType;

pub use tenant_service::{TenantError, TenantService};

/// Errors from business operations; converted to HTTP errors at the edge
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::Database(err.into())
    }
}

impl ServiceError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        ServiceError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: EntityType) -> Self {
        ServiceError::NotFound(format!("{} not found", entity.label()))
    }
}

/// Mark a record inactive and log it; 404 when missing or already inactive
pub async fn soft_delete(
    pool: &PgPool,
    entity: EntityType,
    id: Uuid,
    user_id: Uuid,
) -> Result<(), ServiceError> {
    let mut tx = pool.begin().await?;

    let sql = format!(
        "UPDATE {} SET is_active = false, updated_at = NOW() WHERE id = $1 AND is_active = true",
        entity.table()
    );
    let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
    if result.rows_affected() == 0 {
        return Err(ServiceError::not_found(entity));
    }

    activity::log(
        &mut tx,
        entity,
        id,
        "deleted",
        format!("{} archived", entity.label()),
        Some(user_id),
    )
    .await?;

    tx.commit().await?;
    tracing::info!("Soft-deleted {} {}", entity, id);
    Ok(())
}

/// 400 unless the referenced row exists and is active
pub(crate) async fn ensure_active(
    conn: &mut sqlx::PgConnection,
    entity: EntityType,
    field: &str,
    id: Uuid,
) -> Result<(), ServiceError> {
    let sql = format!("SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1 AND is_active = true)", entity.table());
    let exists: bool = sqlx::query_scalar(&sql).bind(id).fetch_one(&mut *conn).await?;
    if exists {
        Ok(())
    } else {
        Err(ServiceError::validation(field, format!("{} does not exist or is archived", entity.label())))
    }
}
