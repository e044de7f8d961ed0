use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::manager::DatabaseManager;
use crate::database::migrate;
use crate::services::TenantService;

#[derive(Subcommand)]
pub enum MigrateCommands {
    #[command(about = "Create and migrate the main control database")]
    Main,

    #[command(about = "Create and migrate the tenant template database")]
    Template,

    #[command(about = "Apply pending business migrations to every registered tenant")]
    Tenants,
}

pub async fn handle(cmd: MigrateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        MigrateCommands::Main => {
            migrate::migrate_main().await?;
            output_success(&output_format, "Main database migrated", None)
        }
        MigrateCommands::Template => {
            migrate::migrate_template().await?;
            output_success(&output_format, "Template database migrated", None)
        }
        MigrateCommands::Tenants => {
            let service = TenantService::new().await?;
            let tenants = service.list_tenants().await?;
            let mut migrated = Vec::with_capacity(tenants.len());
            for tenant in tenants {
                let pool = DatabaseManager::tenant_pool(&tenant.database).await?;
                migrate::migrate_tenant(&pool).await?;
                tracing::info!("Tenant {} migrated", tenant.name);
                migrated.push(tenant.name);
            }
            output_success(
                &output_format,
                &format!("Migrated {} tenant database(s)", migrated.len()),
                Some(json!({ "tenants": migrated })),
            )
        }
    }
}
