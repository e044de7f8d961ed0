//! Internal to-do items with assignee notifications.

use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{activity, ensure_active, ServiceError};
use crate::auth::Role;
use crate::database::models::task::Task;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::{clean, FieldErrors};

pub const TASK_STATUSES: &[&str] = &["todo", "in_progress", "done"];
pub const TASK_PRIORITIES: &[&str] = &["low", "normal", "high"];

const COLUMNS: &str = "id, title, description, status, priority, due_date, assignee_id, project_id, is_active, \
                       created_by, created_at, updated_at";

/// The caller acting on a task
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    /// Creator, assignee, admins and managers may change a task
    pub fn may_modify(&self, task: &Task) -> bool {
        matches!(self.role, Role::Admin | Role::Manager)
            || task.created_by == Some(self.id)
            || task.assignee_id == Some(self.id)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

impl NewTask {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("title", &self.title)
            .max_len("title", Some(&self.title), 200)
            .one_of("status", self.status.as_deref(), TASK_STATUSES)
            .one_of("priority", self.priority.as_deref(), TASK_PRIORITIES);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub assignee_id: Option<Uuid>,
}

impl TaskUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(title) = &self.title {
            errors.require("title", title).max_len("title", Some(title), 200);
        }
        errors
            .one_of("status", self.status.as_deref(), TASK_STATUSES)
            .one_of("priority", self.priority.as_deref(), TASK_PRIORITIES);
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskFilter {
    pub status: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    /// Only tasks assigned to the caller
    #[serde(default)]
    pub mine: bool,
}

pub async fn list(pool: &PgPool, params: &ListParams, filter: &TaskFilter, caller: Uuid) -> Result<Vec<Task>, ServiceError> {
    let assignee = if filter.mine { Some(caller) } else { filter.assignee_id };
    let sql = format!(
        "SELECT {COLUMNS} FROM tasks
         WHERE is_active = true
         AND ($1::text IS NULL OR title ILIKE $1 OR description ILIKE $1)
         AND ($2::text IS NULL OR status = $2)
         AND ($3::uuid IS NULL OR assignee_id = $3)
         AND ($4::uuid IS NULL OR project_id = $4)
         ORDER BY (status = 'done'), due_date NULLS LAST, created_at DESC
         LIMIT $5 OFFSET $6"
    );
    let rows = sqlx::query_as::<_, Task>(&sql)
        .bind(params.search_pattern())
        .bind(filter.status.as_deref())
        .bind(assignee)
        .bind(filter.project_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<Task, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1 AND is_active = true");
    sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Task))
}

async fn notify_assignee(tx: &mut sqlx::PgConnection, task: &Task, assigner: &str) -> Result<(), ServiceError> {
    if let Some(assignee) = task.assignee_id {
        let link = format!("/app/tasks/{}", task.id);
        activity::notify(
            tx,
            assignee,
            "Task assigned to you",
            &format!("{} assigned you \"{}\"", assigner, task.title),
            Some(&link),
        )
        .await?;
    }
    Ok(())
}

pub async fn create(pool: &PgPool, input: NewTask, actor: Actor, actor_name: &str) -> Result<Task, ServiceError> {
    let mut tx = pool.begin().await?;
    if let Some(assignee_id) = input.assignee_id {
        ensure_active(&mut tx, EntityType::User, "assignee_id", assignee_id).await?;
    }
    if let Some(project_id) = input.project_id {
        ensure_active(&mut tx, EntityType::Project, "project_id", project_id).await?;
    }

    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO tasks (id, title, description, status, priority, due_date, assignee_id, project_id, created_by)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
         RETURNING {COLUMNS}"
    );
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .bind(input.title.trim())
        .bind(clean(input.description))
        .bind(input.status.as_deref().unwrap_or("todo"))
        .bind(input.priority.as_deref().unwrap_or("normal"))
        .bind(input.due_date)
        .bind(input.assignee_id)
        .bind(input.project_id)
        .bind(actor.id)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(&mut tx, EntityType::Task, id, "created", format!("Task \"{}\" created", task.title), Some(actor.id))
        .await?;
    if task.assignee_id.is_some_and(|a| a != actor.id) {
        notify_assignee(&mut tx, &task, actor_name).await?;
    }

    tx.commit().await?;
    Ok(task)
}

pub async fn update(
    pool: &PgPool,
    id: Uuid,
    input: TaskUpdate,
    actor: Actor,
    actor_name: &str,
) -> Result<Task, ServiceError> {
    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {COLUMNS} FROM tasks WHERE id = $1 AND is_active = true FOR UPDATE");
    let current = sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::Task))?;

    if !actor.may_modify(&current) {
        return Err(ServiceError::Forbidden("Only the creator, assignee or a manager can change this task".to_string()));
    }
    if let Some(assignee_id) = input.assignee_id {
        ensure_active(&mut tx, EntityType::User, "assignee_id", assignee_id).await?;
    }

    let sql = format!(
        "UPDATE tasks SET
            title = COALESCE($2, title),
            description = COALESCE($3, description),
            status = COALESCE($4, status),
            priority = COALESCE($5, priority),
            due_date = COALESCE($6, due_date),
            assignee_id = COALESCE($7, assignee_id),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {COLUMNS}"
    );
    let task = sqlx::query_as::<_, Task>(&sql)
        .bind(id)
        .bind(clean(input.title))
        .bind(clean(input.description))
        .bind(input.status.as_deref())
        .bind(input.priority.as_deref())
        .bind(input.due_date)
        .bind(input.assignee_id)
        .fetch_one(&mut *tx)
        .await?;

    let summary = match input.status.as_deref() {
        Some(status) if status != current.status => format!("Task \"{}\" {} -> {}", task.title, current.status, status),
        _ => format!("Task \"{}\" updated", task.title),
    };
    activity::log(&mut tx, EntityType::Task, id, "updated", summary, Some(actor.id)).await?;

    let reassigned = input.assignee_id.is_some_and(|a| Some(a) != current.assignee_id && a != actor.id);
    if reassigned {
        notify_assignee(&mut tx, &task, actor_name).await?;
    }

    tx.commit().await?;
    Ok(task)
}

pub async fn delete(pool: &PgPool, id: Uuid, actor: Actor) -> Result<(), ServiceError> {
    let task = get(pool, id).await?;
    if !actor.may_modify(&task) {
        return Err(ServiceError::Forbidden("Only the creator, assignee or a manager can delete this task".to_string()));
    }
    super::soft_delete(pool, EntityType::Task, id, actor.id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task(created_by: Option<Uuid>, assignee_id: Option<Uuid>) -> Task {
        Task {
            id: Uuid::new_v4(),
            title: "Chase supplier".into(),
            description: None,
            status: "todo".into(),
            priority: "normal".into(),
            due_date: None,
            assignee_id,
            project_id: None,
            is_active: true,
            created_by,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn modify_permissions() {
        let me = Uuid::new_v4();
        let someone = Uuid::new_v4();
        let staff = Actor { id: me, role: Role::Staff };

        assert!(staff.may_modify(&task(Some(me), None)));
        assert!(staff.may_modify(&task(Some(someone), Some(me))));
        assert!(!staff.may_modify(&task(Some(someone), Some(someone))));

        let manager = Actor { id: me, role: Role::Manager };
        assert!(manager.may_modify(&task(Some(someone), None)));
    }

    #[test]
    fn priority_vocabulary() {
        let update = TaskUpdate { priority: Some("urgent".into()), ..Default::default() };
        assert!(update.validate().is_err());
        let update = TaskUpdate { priority: Some("high".into()), status: Some("done".into()), ..Default::default() };
        assert!(update.validate().is_ok());
    }
}
