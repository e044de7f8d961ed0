use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_empty_collection, output_success, yes_no};
use crate::cli::OutputFormat;
use crate::services::TenantService;

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List all tenants")]
    List,

    #[command(about = "Create a tenant by cloning the template database")]
    Create {
        #[arg(help = "Tenant name (lowercase letters, digits, '-' and '_')")]
        name: String,

        #[arg(long, help = "Human-readable name; defaults to the tenant name")]
        display_name: Option<String>,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let service = TenantService::new().await?;

    match cmd {
        TenantCommands::List => {
            let tenants = service.list_tenants().await?;
            if tenants.is_empty() {
                return output_empty_collection(&output_format, "tenants", "No tenants registered");
            }

            match output_format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&json!({ "tenants": tenants }))?);
                }
                OutputFormat::Text => {
                    println!("{:<20} {:<28} {:<26} {:<7} {}", "NAME", "DISPLAY NAME", "DATABASE", "ACTIVE", "CREATED");
                    println!("{}", "-".repeat(100));
                    for tenant in &tenants {
                        println!(
                            "{:<20} {:<28} {:<26} {:<7} {}",
                            tenant.name,
                            tenant.display_name,
                            tenant.database,
                            yes_no(tenant.is_active),
                            tenant.created_at.format("%Y-%m-%d %H:%M")
                        );
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Create { name, display_name } => {
            let tenant = service.create_tenant(&name, display_name.as_deref()).await?;
            output_success(
                &output_format,
                &format!("Tenant '{}' created in database {}", tenant.name, tenant.database),
                Some(json!({ "tenant": tenant })),
            )
        }
    }
}
