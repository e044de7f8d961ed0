use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::services::users::{self, NewUser};
use crate::services::TenantService;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user inside a tenant (use this to bootstrap the first admin)")]
    Create {
        #[arg(long, help = "Tenant name")]
        tenant: String,

        #[arg(long)]
        email: String,

        #[arg(long)]
        name: String,

        #[arg(long, default_value = "admin", help = "admin, manager, accounts, sales, procurement, technician or staff")]
        role: String,

        #[arg(long, env = "BIZOPS_USER_PASSWORD", hide_env_values = true)]
        password: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create {
            tenant,
            email,
            name,
            role,
            password,
        } => {
            let input = NewUser {
                email,
                name,
                role,
                password,
            };
            input.validate()?;

            let (tenant, pool) = TenantService::new().await?.tenant_pool(&tenant.to_lowercase()).await?;
            let user = users::create(&pool, input, None).await?;
            output_success(
                &output_format,
                &format!("User {} ({}) created in tenant '{}'", user.email, user.role, tenant.name),
                Some(json!({ "user": user })),
            )
        }
    }
}
