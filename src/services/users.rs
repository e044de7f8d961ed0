//! Tenant users: administration and credential checks.

use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{activity, ServiceError};
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LENGTH};
use crate::auth::{AuthError, Role};
use crate::database::models::user::User;
use crate::error::ApiError;
use crate::types::{EntityType, ListParams};
use crate::validation::FieldErrors;

const COLUMNS: &str = "id, email, name, role, password_hash, last_login_at, is_active, created_at, updated_at";

fn role_names() -> Vec<&'static str> {
    Role::ALL.iter().map(Role::as_str).collect()
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: String,
    pub password: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        errors
            .require("email", &self.email)
            .email("email", Some(&self.email))
            .require("name", &self.name)
            .max_len("name", Some(&self.name), 200)
            .one_of("role", Some(self.role.as_str()), &role_names())
            .check(
                self.password.chars().count() >= MIN_PASSWORD_LENGTH,
                "password",
                "Password must be at least 8 characters",
            );
        errors.into_result()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub role: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), ApiError> {
        let mut errors = FieldErrors::new();
        if let Some(name) = &self.name {
            errors.require("name", name).max_len("name", Some(name), 200);
        }
        errors.one_of("role", self.role.as_deref(), &role_names());
        if let Some(password) = &self.password {
            errors.check(
                password.chars().count() >= MIN_PASSWORD_LENGTH,
                "password",
                "Password must be at least 8 characters",
            );
        }
        errors.into_result()
    }
}

pub async fn list(pool: &PgPool, params: &ListParams, include_inactive: bool) -> Result<Vec<User>, ServiceError> {
    let sql = format!(
        "SELECT {COLUMNS} FROM users
         WHERE ($1 OR is_active = true)
         AND ($2::text IS NULL OR name ILIKE $2 OR email ILIKE $2)
         ORDER BY name
         LIMIT $3 OFFSET $4"
    );
    let rows = sqlx::query_as::<_, User>(&sql)
        .bind(include_inactive)
        .bind(params.search_pattern())
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn get(pool: &PgPool, id: Uuid) -> Result<User, ServiceError> {
    let sql = format!("SELECT {COLUMNS} FROM users WHERE id = $1");
    sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::User))
}

/// Emails are stored lower-cased; a duplicate surfaces as 409
pub async fn create(pool: &PgPool, input: NewUser, created_by: Option<Uuid>) -> Result<User, ServiceError> {
    let password_hash = hash_password(&input.password).map_err(|e| {
        tracing::error!("Password hashing failed: {}", e);
        ServiceError::validation("password", "Password could not be processed")
    })?;

    let mut tx = pool.begin().await?;
    let id = Uuid::new_v4();
    let sql = format!(
        "INSERT INTO users (id, email, name, role, password_hash)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(input.email.trim().to_lowercase())
        .bind(input.name.trim())
        .bind(&input.role)
        .bind(password_hash)
        .fetch_one(&mut *tx)
        .await?;

    activity::log(
        &mut tx,
        EntityType::User,
        id,
        "created",
        format!("User {} added as {}", user.email, user.role),
        created_by,
    )
    .await?;
    tx.commit().await?;

    tracing::info!("Created user {} ({})", user.email, user.role);
    Ok(user)
}

pub async fn update(pool: &PgPool, id: Uuid, input: UserUpdate, actor_id: Uuid) -> Result<User, ServiceError> {
    if id == actor_id && (input.is_active == Some(false) || input.role.is_some()) {
        return Err(ServiceError::InvalidState("You cannot change your own role or deactivate yourself".to_string()));
    }

    let password_hash = match &input.password {
        Some(password) => Some(hash_password(password).map_err(|e| {
            tracing::error!("Password hashing failed: {}", e);
            ServiceError::validation("password", "Password could not be processed")
        })?),
        None => None,
    };

    let mut tx = pool.begin().await?;
    let sql = format!(
        "UPDATE users SET
            name = COALESCE($2, name),
            role = COALESCE($3, role),
            password_hash = COALESCE($4, password_hash),
            is_active = COALESCE($5, is_active),
            updated_at = NOW()
         WHERE id = $1
         RETURNING {COLUMNS}"
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(id)
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.role.as_deref())
        .bind(password_hash)
        .bind(input.is_active)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ServiceError::not_found(EntityType::User))?;

    activity::log(
        &mut tx,
        EntityType::User,
        id,
        "updated",
        format!("User {} updated", user.email),
        Some(actor_id),
    )
    .await?;
    tx.commit().await?;
    Ok(user)
}

pub async fn deactivate(pool: &PgPool, id: Uuid, actor_id: Uuid) -> Result<(), ServiceError> {
    if id == actor_id {
        return Err(ServiceError::InvalidState("You cannot deactivate yourself".to_string()));
    }
    super::soft_delete(pool, EntityType::User, id, actor_id).await
}

/// Check credentials for an active user and stamp the login time.
///
/// Unknown emails and wrong passwords are indistinguishable to the caller.
pub async fn authenticate(pool: &PgPool, email: &str, password: &str) -> Result<User, AuthError> {
    let sql = format!("SELECT {COLUMNS} FROM users WHERE email = $1 AND is_active = true");
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email.trim().to_lowercase())
        .fetch_optional(pool)
        .await?;

    let Some(user) = user else {
        // Same work as a real check so timing does not reveal unknown emails
        let _ = verify_password(password, DUMMY_HASH);
        return Err(AuthError::InvalidCredentials);
    };
    if !verify_password(password, &user.password_hash) {
        return Err(AuthError::InvalidCredentials);
    }

    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(pool)
        .await?;
    Ok(user)
}

/// Argon2id hash of a random string; only used to equalise timing
const DUMMY_HASH: &str =
    "$argon2id$v=19$m=19456,t=2,p=1$c29tZXNhbHRzb21lc2FsdA$0wQyWQ2c0ZP2mBDbtsqzGhqnsXkxQh4ZAv0y0G2K7Fg";

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(role: &str, password: &str) -> NewUser {
        NewUser {
            email: "ops@example.com".into(),
            name: "Ops".into(),
            role: role.into(),
            password: password.into(),
        }
    }

    #[test]
    fn new_user_validation() {
        assert!(new_user("sales", "correct horse").validate().is_ok());

        let body = new_user("owner", "short").validate().unwrap_err().to_json();
        assert!(body["field_errors"]["role"].is_string());
        assert!(body["field_errors"]["password"].is_string());
    }

    #[test]
    fn update_validation() {
        assert!(UserUpdate::default().validate().is_ok());
        let update = UserUpdate { role: Some("technician".into()), ..Default::default() };
        assert!(update.validate().is_ok());
        let update = UserUpdate { password: Some("1234".into()), ..Default::default() };
        assert!(update.validate().is_err());
    }

    #[test]
    fn dummy_hash_never_verifies_a_guess() {
        assert!(!verify_password("password123", DUMMY_HASH));
    }
}
