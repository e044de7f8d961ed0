//! Service contracts and the scheduled jobs they expand into.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{activity, ensure_active, pricing, ServiceError};
use crate::auth::Role;
use crate::database::models::service::{ServiceContract, ServiceContractDetail, ServiceJob};
use crate::database::sequence;
use crate::error::ApiError;
use crate::schedule::{self, Frequency};
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const JOB_STATUSES: &[&str] = &["scheduled", "in_progress", "completed", "cancelled"];

const CONTRACT_COLUMNS: &str = "id, contract_number, client_id, title, frequency, start_date, end_date, \
                                contract_value, status, is_active, created_by, created_at, updated_at";
const JOB_COLUMNS: &str = "id, job_number, contract_id, scheduled_date, status, technician_id, completed_at, \
                           notes, is_active, created_at, updated_at";

#[derive(Debug, Clone, Deserialize)]
pub struct NewServiceContract {
    pub client_id: Uuid,
    pub title: String,
    pub frequency: Frequency,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub contract_value: Option<Decimal>,
}

impl NewServiceContract {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("title", &self.title)
            .max_len("title", Some(&self.title), 200)
            .check(self.end_date >= self.start_date, "end_date", "End date cannot be before start date");
        pricing::validate_money(&mut errors, "contract_value", self.contract_value);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobFilter {
    pub contract_id: Option<Uuid>,
    pub technician_id: Option<Uuid>,
    pub status: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdate {
    pub status: Option<String>,
    pub technician_id: Option<Uuid>,
    pub scheduled_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

impl JobUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors.one_of("status", self.status.as_deref(), JOB_STATUSES);
        errors.into_result()
    }
}

pub async fn list(pool: &PgPool, params: &ListParams, include_inactive: bool) -> Result<Vec<ServiceContract>, ServiceError> {
    let sql = format!(
        "SELECT {CONTRACT_COLUMNS} FROM service_contracts
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR title ILIKE $2 OR contract_number ILIKE $2)
         ORDER BY contract_number DESC
         LIMIT $3 OFFSET $4"
    );
    let rows = sqlx::query_as::<_, ServiceContract>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<ServiceContractDetail, ServiceError> {
    let sql = format!("SELECT {CONTRACT_COLUMNS} FROM service_contracts WHERE id = $1");
    let contract = sqlx::query_as::<_, ServiceContract>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::ServiceContract))?;
    let jobs = jobs_for_contract(pool, id).await?;
    Ok(ServiceContractDetail { contract, jobs })
}

pub async fn jobs_for_contract(pool: &PgPool, contract_id: Uuid) -> Result<Vec<ServiceJob>, ServiceError> {
    let sql = format!("SELECT {JOB_COLUMNS} FROM service_jobs WHERE contract_id = $1 ORDER BY scheduled_date, job_number");
    let jobs = sqlx::query_as::<_, ServiceJob>(&sql)
        .bind(contract_id)
        .fetch_all(pool)
        .await?;
    Ok(jobs)
}

/// Insert the contract and one job per scheduled visit (`-J01`, `-J02`, ...)
pub async fn create(pool: &PgPool, input: NewServiceContract, user_id: Uuid) -> Result<ServiceContractDetail, ServiceError> {
    let visits = schedule::expand(input.start_date, input.end_date, input.frequency)?;

    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, EntityType::Client, "client_id", input.client_id).await?;

    let today = Utc::now().date_naive();
    let number =
        sequence::allocate(&mut tx, "service_contracts", "contract_number", &sequence::SERVICE_CONTRACT, today).await?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO service_contracts (id, contract_number, client_id, title, frequency, start_date, end_date, contract_value, status, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'active', $9)
         RETURNING {CONTRACT_COLUMNS}"
    );
    let contract = sqlx::query_as::<_, ServiceContract>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.client_id)
        .bind(input.title.trim())
        .bind(input.frequency.as_str())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.contract_value)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    let insert_job = format!(
        "INSERT INTO service_jobs (id, job_number, contract_id, scheduled_date, status)
         VALUES ($1, $2, $3, $4, 'scheduled')
         RETURNING {JOB_COLUMNS}"
    );
    let mut jobs = Vec::with_capacity(visits.len());
    for (visit, date) in visits.iter().enumerate() {
        let job = sqlx::query_as::<_, ServiceJob>(&insert_job)
            .bind(Uuid::new_v4())
            .bind(sequence::service_job_number(&number, visit + 1))
            .bind(id)
            .bind(*date)
            .fetch_one(&mut *tx)
            .await?;
        jobs.push(job);
    }

    activity::log(
        &mut tx,
        EntityType::ServiceContract,
        id,
        "created",
        format!("Contract {} created with {} {} visits", number, jobs.len(), input.frequency),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Created service contract {} with {} jobs", number, jobs.len());
    Ok(ServiceContractDetail { contract, jobs })
}

/// Archive the contract and cancel visits that have not happened yet
pub async fn archive(pool: &PgPool, id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
    let mut tx = pool.begin().await?;
    let number: String = sqlx::query_scalar(
        "UPDATE service_contracts SET is_active = false, status = 'cancelled', updated_at = NOW()
         WHERE id = $1 AND is_active = true
         RETURNING contract_number",
    )
    .bind(id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| ServiceError::not_found(EntityType::ServiceContract))?;

    let cancelled = sqlx::query(
        "UPDATE service_jobs SET status = 'cancelled', updated_at = NOW()
         WHERE contract_id = $1 AND status = 'scheduled'",
    )
    .bind(id)
    .execute(&mut *tx)
    .await?
    .rows_affected();

    activity::log(
        &mut tx,
        EntityType::ServiceContract,
        id,
        "deleted",
        format!("Contract {} archived, {} scheduled visits cancelled", number, cancelled),
        Some(user_id),
    )
    .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn list_jobs(pool: &PgPool, params: &ListParams, filter: &JobFilter) -> Result<Vec<ServiceJob>, ServiceError> {
    let sql = format!(
        "SELECT {JOB_COLUMNS} FROM service_jobs
         WHERE is_active = true
         AND ($1::text IS NULL OR job_number ILIKE $1 OR notes ILIKE $1)
         AND ($2::uuid IS NULL OR contract_id = $2)
         AND ($3::uuid IS NULL OR technician_id = $3)
         AND ($4::text IS NULL OR status = $4)
         AND ($5::date IS NULL OR scheduled_date >= $5)
         AND ($6::date IS NULL OR scheduled_date <= $6)
         ORDER BY scheduled_date, job_number
         LIMIT $7 OFFSET $8"
    );
    let rows = sqlx::query_as::<_, ServiceJob>(&sql)
        .bind(params.search_pattern())
        .bind(filter.contract_id)
        .bind(filter.technician_id)
        .bind(filter.status.as_deref())
        .bind(filter.from)
        .bind(filter.to)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Technicians may only touch jobs assigned to them and cannot reassign
pub fn technician_may_update(job_technician: Option<Uuid>, user_id: Uuid, update: &JobUpdate) -> bool {
    job_technician == Some(user_id) && update.technician_id.map_or(true, |t| t == user_id)
}

pub async fn update_job(
    pool: &PgPool,
    id: Uuid,
    input: JobUpdate,
    user_id: Uuid,
    role: Role,
) -> Result<ServiceJob, ServiceError> {
    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {JOB_COLUMNS} FROM service_jobs WHERE id = $1 AND is_active = true FOR UPDATE");
    let current = sqlx::query_as::<_, ServiceJob>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::ServiceJob))?;

    if role == Role::Technician && !technician_may_update(current.technician_id, user_id, &input) {
        return Err(ServiceError::Forbidden(format!("Job {} is not assigned to you", current.job_number)));
    }
    if let Some(technician_id) = input.technician_id {
        ensure_active(&mut tx, EntityType::User, "technician_id", technician_id).await?;
    }

    let sql = format!(
        "UPDATE service_jobs SET
            status = COALESCE($2, status),
            technician_id = COALESCE($3, technician_id),
            scheduled_date = COALESCE($4, scheduled_date),
            notes = COALESCE($5, notes),
            completed_at = CASE
                WHEN $2 = 'completed' THEN COALESCE(completed_at, NOW())
                WHEN $2 IS NOT NULL THEN NULL
                ELSE completed_at
            END,
            updated_at = NOW()
         WHERE id = $1
         RETURNING {JOB_COLUMNS}"
    );
    let job = sqlx::query_as::<_, ServiceJob>(&sql)
        .bind(id)
        .bind(input.status.as_deref())
        .bind(input.technician_id)
        .bind(input.scheduled_date)
        .bind(clean(input.notes))
        .fetch_one(&mut *tx)
        .await?;

    let summary = match input.status.as_deref() {
        Some(status) if status != current.status => format!("Job {} {} -> {}", job.job_number, current.status, status),
        _ => format!("Job {} updated", job.job_number),
    };
    activity::log(&mut tx, EntityType::ServiceJob, id, "updated", summary, Some(user_id)).await?;

    if let Some(technician_id) = input.technician_id.filter(|t| Some(*t) != current.technician_id && *t != user_id) {
        let link = format!("/app/service-jobs/{}", id);
        activity::notify(
            &mut tx,
            technician_id,
            "Service job assigned",
            &format!("{} on {}", job.job_number, job.scheduled_date),
            Some(&link),
        )
        .await?;
    }

    tx.commit().await?;
    Ok(job)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_dates_are_checked() {
        let input = NewServiceContract {
            client_id: Uuid::new_v4(),
            title: "Quarterly HVAC service".into(),
            frequency: Frequency::Quarterly,
            start_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            contract_value: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["end_date"].is_string());
    }

    #[test]
    fn frequency_deserializes_from_snake_case() {
        let input: NewServiceContract = serde_json::from_value(serde_json::json!({
            "client_id": Uuid::new_v4(),
            "title": "Lift inspection",
            "frequency": "half_yearly",
            "start_date": "2024-01-31",
            "end_date": "2025-01-31"
        }))
        .unwrap();
        assert_eq!(input.frequency, Frequency::HalfYearly);
        assert!(input.validate().is_ok());
    }

    #[test]
    fn technicians_only_update_their_own_jobs() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let update = JobUpdate { status: Some("completed".into()), ..Default::default() };

        assert!(technician_may_update(Some(me), me, &update));
        assert!(!technician_may_update(Some(other), me, &update));
        assert!(!technician_may_update(None, me, &update));

        let reassign = JobUpdate { technician_id: Some(other), ..Default::default() };
        assert!(!technician_may_update(Some(me), me, &reassign));
    }
}
