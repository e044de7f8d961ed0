//! Projects and tenders, both owned by a client.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{activity, ensure_active, pricing, ServiceError};
use crate::database::models::project::{Project, Tender};
use crate::database::sequence;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const PROJECT_STATUSES: &[&str] = &["planned", "active", "on_hold", "completed", "cancelled"];
pub const TENDER_STATUSES: &[&str] = &["open", "submitted", "won", "lost", "cancelled"];

const PROJECT_COLUMNS: &str = "id, project_number, client_id, name, description, status, start_date, end_date, \
                               budget, is_active, created_by, created_at, updated_at";
const TENDER_COLUMNS: &str = "id, tender_number, client_id, project_id, title, status, submission_deadline, \
                              estimated_value, notes, is_active, created_by, created_at, updated_at";

fn check_dates(errors: &mut FieldErrors, start: Option<NaiveDate>, end: Option<NaiveDate>) {
    if let (Some(start), Some(end)) = (start, end) {
        errors.check(end >= start, "end_date", "End date cannot be before start date");
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub client_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
}

impl NewProject {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("name", &self.name)
            .max_len("name", Some(&self.name), 200)
            .one_of("status", self.status.as_deref(), PROJECT_STATUSES);
        check_dates(&mut errors, self.start_date, self.end_date);
        pricing::validate_money(&mut errors, "budget", self.budget);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub budget: Option<Decimal>,
}

impl ProjectUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name).max_len("name", Some(name), 200);
        }
        errors.one_of("status", self.status.as_deref(), PROJECT_STATUSES);
        check_dates(&mut errors, self.start_date, self.end_date);
        pricing::validate_money(&mut errors, "budget", self.budget);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectFilter {
    pub client_id: Option<Uuid>,
    pub status: Option<String>,
}

pub async fn list_projects(
    pool: &PgPool,
    params: &ListParams,
    filter: &ProjectFilter,
    include_inactive: bool,
) -> Result<Vec<Project>, ServiceError> {
    let sql = format!(
        "SELECT {PROJECT_COLUMNS} FROM projects
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR name ILIKE $2 OR project_number ILIKE $2)
         AND ($3::uuid IS NULL OR client_id = $3)
         AND ($4::text IS NULL OR status = $4)
         ORDER BY project_number DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, Project>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(filter.client_id)
        .bind(filter.status.as_deref())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_project(pool: &PgPool, id: Uuid) -> Result<Project, ServiceError> {
    let sql = format!("SELECT {PROJECT_COLUMNS} FROM projects WHERE id = $1");
    sqlx::query_as::<_, Project>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Project))
}

pub async fn create_project(pool: &PgPool, input: NewProject, user_id: Uuid) -> Result<Project, ServiceError> {
    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, EntityType::Client, "client_id", input.client_id).await?;

    let today = Utc::now().date_naive();
    let number = sequence::allocate(&mut tx, "projects", "project_number", &sequence::PROJECT, today).await?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO projects (id, project_number, client_id, name, description, status, start_date, end_date, budget, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {PROJECT_COLUMNS}"
    );
    let project = sqlx::query_as::<_, Project>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.client_id)
        .bind(input.name.trim())
        .bind(clean(input.description))
        .bind(input.status.as_deref().unwrap_or("planned"))
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(&mut tx, EntityType::Project, id, "created", format!("Project {} created", number), Some(user_id))
        .await?;
    tx.commit().await?;

    tracing::info!("Created project {}", number);
    Ok(project)
}

pub async fn update_project(
    pool: &PgPool,
    id: Uuid,
    input: ProjectUpdate,
    user_id: Uuid,
) -> Result<Project, ServiceError> {
    let mut tx = pool.begin().await?;
    let sql = format!(
        "UPDATE projects SET
            name = COALESCE($2, name),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            start_date = COALESCE($5, start_date),
            end_date = COALESCE($6, end_date),
            budget = COALESCE($7, budget),
            updated_at = NOW()
         WHERE id = $1 AND is_active = true
         RETURNING {PROJECT_COLUMNS}"
    );
    let project = sqlx::query_as::<_, Project>(&sql)
        .bind(id)
        .bind(clean(input.name))
        .bind(clean(input.description))
        .bind(input.status.as_deref())
        .bind(input.start_date)
        .bind(input.end_date)
        .bind(input.budget)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Project))?;

    // Merged dates may still conflict when only one side was sent
    if let (Some(start), Some(end)) = (project.start_date, project.end_date) {
        if end < start {
            return Err(ServiceError::validation("end_date", "End date cannot be before start date"));
        }
    }

    let summary = match &input.status {
        Some(status) => format!("Project {} set to {}", project.project_number, status),
        None => format!("Project {} updated", project.project_number),
    };
    activity::log(&mut tx, EntityType::Project, id, "updated", summary, Some(user_id)).await?;
    tx.commit().await?;
    Ok(project)
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTender {
    pub client_id: Uuid,
    pub project_id: Option<Uuid>,
    pub title: String,
    pub status: Option<String>,
    pub submission_deadline: Option<NaiveDate>,
    pub estimated_value: Option<Decimal>,
    pub notes: Option<String>,
}

impl NewTender {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("title", &self.title)
            .max_len("title", Some(&self.title), 200)
            .one_of("status", self.status.as_deref(), TENDER_STATUSES);
        pricing::validate_money(&mut errors, "estimated_value", self.estimated_value);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TenderUpdate {
    pub title: Option<String>,
    pub status: Option<String>,
    pub submission_deadline: Option<NaiveDate>,
    pub estimated_value: Option<Decimal>,
    pub notes: Option<String>,
}

impl TenderUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.require("title", title).max_len("title", Some(title), 200);
        }
        errors.one_of("status", self.status.as_deref(), TENDER_STATUSES);
        pricing::validate_money(&mut errors, "estimated_value", self.estimated_value);
        errors.into_result()
    }
}

pub async fn list_tenders(
    pool: &PgPool,
    params: &ListParams,
    status: Option<&str>,
    include_inactive: bool,
) -> Result<Vec<Tender>, ServiceError> {
    let sql = format!(
        "SELECT {TENDER_COLUMNS} FROM tenders
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR title ILIKE $2 OR tender_number ILIKE $2)
         AND ($3::text IS NULL OR status = $3)
         ORDER BY tender_number DESC
         LIMIT $4 OFFSET $5"
    );
    let rows = sqlx::query_as::<_, Tender>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(status)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get_tender(pool: &PgPool, id: Uuid) -> Result<Tender, ServiceError> {
    let sql = format!("SELECT {TENDER_COLUMNS} FROM tenders WHERE id = $1");
    sqlx::query_as::<_, Tender>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Tender))
}

pub async fn create_tender(pool: &PgPool, input: NewTender, user_id: Uuid) -> Result<Tender, ServiceError> {
    let mut tx = pool.begin().await?;
    ensure_active(&mut tx, EntityType::Client, "client_id", input.client_id).await?;
    if let Some(project_id) = input.project_id {
        ensure_active(&mut tx, EntityType::Project, "project_id", project_id).await?;
    }

    let today = Utc::now().date_naive();
    let number = sequence::allocate(&mut tx, "tenders", "tender_number", &sequence::TENDER, today).await?;

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO tenders (id, tender_number, client_id, project_id, title, status, submission_deadline, estimated_value, notes, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING {TENDER_COLUMNS}"
    );
    let tender = sqlx::query_as::<_, Tender>(&sql)
        .bind(id)
        .bind(&number)
        .bind(input.client_id)
        .bind(input.project_id)
        .bind(input.title.trim())
        .bind(input.status.as_deref().unwrap_or("open"))
        .bind(input.submission_deadline)
        .bind(input.estimated_value)
        .bind(clean(input.notes))
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(&mut tx, EntityType::Tender, id, "created", format!("Tender {} created", number), Some(user_id))
        .await?;
    tx.commit().await?;

    tracing::info!("Created tender {}", number);
    Ok(tender)
}

pub async fn update_tender(pool: &PgPool, id: Uuid, input: TenderUpdate, user_id: Uuid) -> Result<Tender, ServiceError> {
    let mut tx = pool.begin().await?;
    let sql = format!(
        "UPDATE tenders SET
            title = COALESCE($2, title),
            status = COALESCE($3, status),
            submission_deadline = COALESCE($4, submission_deadline),
            estimated_value = COALESCE($5, estimated_value),
            notes = COALESCE($6, notes),
            updated_at = NOW()
         WHERE id = $1 AND is_active = true
         RETURNING {TENDER_COLUMNS}"
    );
    let tender = sqlx::query_as::<_, Tender>(&sql)
        .bind(id)
        .bind(clean(input.title))
        .bind(input.status.as_deref())
        .bind(input.submission_deadline)
        .bind(input.estimated_value)
        .bind(clean(input.notes))
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Tender))?;

    let summary = match &input.status {
        Some(status) => format!("Tender {} marked {}", tender.tender_number, status),
        None => format!("Tender {} updated", tender.tender_number),
    };
    activity::log(&mut tx, EntityType::Tender, id, "updated", summary, Some(user_id)).await?;
    tx.commit().await?;
    Ok(tender)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    #[test]
    fn project_dates_must_be_ordered() {
        let input = NewProject {
            client_id: Uuid::new_v4(),
            name: "Fit-out".into(),
            description: None,
            status: Some("active".into()),
            start_date: date(2024, 5, 1),
            end_date: date(2024, 4, 1),
            budget: None,
        };
        let body = input.validate().unwrap_err().to_json();
        assert!(body["field_errors"]["end_date"].is_string());
    }

    #[test]
    fn unknown_statuses_are_rejected() {
        let update = ProjectUpdate { status: Some("paused".into()), ..Default::default() };
        assert!(update.validate().is_err());

        let update = TenderUpdate { status: Some("won".into()), ..Default::default() };
        assert!(update.validate().is_ok());
    }

    #[test]
    fn negative_tender_value_is_rejected() {
        let input = NewTender {
            client_id: Uuid::new_v4(),
            project_id: None,
            title: "Annual maintenance".into(),
            status: None,
            submission_deadline: None,
            estimated_value: Some(Decimal::NEGATIVE_ONE),
            notes: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn budgets_must_fit_money_columns() {
        let update = ProjectUpdate { budget: Some("1000000000000".parse().unwrap()), ..Default::default() };
        assert!(update.validate().is_err());

        let update = ProjectUpdate { budget: Some("250000.50".parse().unwrap()), ..Default::default() };
        assert!(update.validate().is_ok());
    }
}
