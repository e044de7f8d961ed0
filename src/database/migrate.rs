use sqlx::migrate::Migrator;
use sqlx::PgPool;
use tracing::info;

use crate::config;
use crate::database::manager::{DatabaseError, DatabaseManager};

/// Tenant registry and sessions
static MAIN_MIGRATIONS: Migrator = sqlx::migrate!("./migrations/main");

/// Business schema; applied to the template that new tenants are cloned from
static TENANT_MIGRATIONS: Migrator = sqlx::migrate!("./migrations/tenant");

/// Create (if needed) and migrate the main control database
pub async fn migrate_main() -> Result<(), DatabaseError> {
    DatabaseManager::ensure_database(&config::config().database.main_database).await?;
    let pool = DatabaseManager::main_pool().await?;
    MAIN_MIGRATIONS.run(&pool).await?;
    info!("Main database migrated");
    Ok(())
}

/// Create (if needed) and migrate the tenant template database
pub async fn migrate_template() -> Result<(), DatabaseError> {
    let template = &config::config().database.template_database;
    DatabaseManager::ensure_database(template).await?;
    let pool = DatabaseManager::tenant_pool(template).await?;
    migrate_tenant(&pool).await?;
    // Open connections would block CREATE DATABASE ... WITH TEMPLATE
    DatabaseManager::release_pool(template).await;
    info!("Template database {} migrated", template);
    Ok(())
}

/// Apply pending business migrations to an existing tenant database
pub async fn migrate_tenant(pool: &PgPool) -> Result<(), DatabaseError> {
    TENANT_MIGRATIONS.run(pool).await?;
    Ok(())
}
