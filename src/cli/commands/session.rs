use clap::Subcommand;
use serde_json::json;

use crate::auth::session;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::manager::DatabaseManager;

#[derive(Subcommand)]
pub enum SessionCommands {
    #[command(about = "Delete expired login sessions")]
    Purge,
}

pub async fn handle(cmd: SessionCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SessionCommands::Purge => {
            let main_pool = DatabaseManager::main_pool().await?;
            let purged = session::purge_expired(&main_pool).await?;
            output_success(
                &output_format,
                &format!("Purged {} expired session(s)", purged),
                Some(json!({ "purged": purged })),
            )
        }
    }
}
