use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::config;
use crate::database::manager::{DatabaseError, DatabaseManager};
use crate::database::models::tenant::Tenant;

const COLUMNS: &str = "id, name, display_name, database, is_active, created_at, updated_at, trashed_at";

#[derive(Debug, thiserror::Error)]
pub enum TenantError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("Database manager error: {0}")]
    DatabaseManager(#[from] DatabaseError),
    #[error("Tenant already exists: {0}")]
    AlreadyExists(String),
    #[error("Template database not found: {0}")]
    TemplateNotFound(String),
    #[error("Invalid tenant name: {0}")]
    InvalidName(String),
    #[error("Tenant not found: {0}")]
    NotFound(String),
}

/// Tenant registry in the main database
pub struct TenantService {
    main_pool: PgPool,
}

impl TenantService {
    pub async fn new() -> Result<Self, TenantError> {
        let main_pool = DatabaseManager::main_pool().await?;
        Ok(Self { main_pool })
    }

    pub fn with_pool(main_pool: PgPool) -> Self {
        Self { main_pool }
    }

    /// Create a tenant by cloning the template database and registering it
    pub async fn create_tenant(&self, name: &str, display_name: Option<&str>) -> Result<Tenant, TenantError> {
        validate_tenant_name(name)?;

        let tenant_db = database_name_for(name);
        let template_db = &config::config().database.template_database;

        if self.find(name).await?.is_some() {
            return Err(TenantError::AlreadyExists(name.to_string()));
        }
        if !self.database_exists(template_db).await? {
            return Err(TenantError::TemplateNotFound(template_db.clone()));
        }

        DatabaseManager::clone_database(template_db, &tenant_db).await?;

        let display_name = display_name
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or(name);
        let sql = format!(
            "INSERT INTO tenants (id, name, display_name, database, is_active)
             VALUES ($1, $2, $3, $4, true)
             RETURNING {COLUMNS}"
        );
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(Uuid::new_v4())
            .bind(name)
            .bind(display_name)
            .bind(&tenant_db)
            .fetch_one(&self.main_pool)
            .await?;

        tracing::info!("Registered tenant '{}' in database {}", tenant.name, tenant.database);
        Ok(tenant)
    }

    /// Tenant by name, including inactive ones
    pub async fn find(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        let sql = format!("SELECT {COLUMNS} FROM tenants WHERE name = $1 AND trashed_at IS NULL");
        let tenant = sqlx::query_as::<_, Tenant>(&sql)
            .bind(name)
            .fetch_optional(&self.main_pool)
            .await?;
        Ok(tenant)
    }

    /// Tenant that may currently sign in
    pub async fn find_active(&self, name: &str) -> Result<Option<Tenant>, TenantError> {
        Ok(self.find(name).await?.filter(|t| t.is_active))
    }

    pub async fn list_tenants(&self) -> Result<Vec<Tenant>, TenantError> {
        let sql = format!("SELECT {COLUMNS} FROM tenants WHERE trashed_at IS NULL ORDER BY name");
        let tenants = sqlx::query_as::<_, Tenant>(&sql)
            .fetch_all(&self.main_pool)
            .await?;
        Ok(tenants)
    }

    /// Pool for a registered tenant's database
    pub async fn tenant_pool(&self, name: &str) -> Result<(Tenant, PgPool), TenantError> {
        let tenant = self
            .find(name)
            .await?
            .ok_or_else(|| TenantError::NotFound(name.to_string()))?;
        let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
        Ok((tenant, pool))
    }

    async fn database_exists(&self, name: &str) -> Result<bool, TenantError> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&self.main_pool)
            .await?;
        Ok(exists)
    }
}

/// `tenant_` plus the first 16 hex digits of SHA-256(name)
pub fn database_name_for(name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(name.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    format!("tenant_{}", &hash[..16])
}

/// Lower-case letters, digits, hyphens and underscores; 2 to 63 characters
pub fn validate_tenant_name(name: &str) -> Result<(), TenantError> {
    if name.len() < 2 {
        return Err(TenantError::InvalidName("Tenant name must be at least 2 characters".to_string()));
    }
    if name.len() > 63 {
        return Err(TenantError::InvalidName("Tenant name must be at most 63 characters".to_string()));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
    {
        return Err(TenantError::InvalidName(
            "Tenant name can only contain lower-case letters, numbers, hyphens, and underscores".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_names_are_stable_and_prefixed() {
        let a = database_name_for("acme");
        assert_eq!(a, database_name_for("acme"));
        assert_ne!(a, database_name_for("acme-2"));
        assert!(a.starts_with("tenant_"));
        assert_eq!(a.len(), "tenant_".len() + 16);
        assert!(a["tenant_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn tenant_name_rules() {
        assert!(validate_tenant_name("acme").is_ok());
        assert!(validate_tenant_name("acme_engineering-2").is_ok());
        assert!(validate_tenant_name("a").is_err());
        assert!(validate_tenant_name("Acme").is_err());
        assert!(validate_tenant_name("acme corp").is_err());
        assert!(validate_tenant_name(&"x".repeat(64)).is_err());
    }
}
