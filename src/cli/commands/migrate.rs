use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::tenancy::{QueryRouter, TenantError};

#[derive(Subcommand)]
pub enum MigrateCommands {
    #[command(about = "Check whether schema changes may run against a database; exits non-zero if not")]
    Check {
        #[arg(help = "Target database identifier")]
        target: String,
    },
}

pub async fn handle(cmd: MigrateCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        MigrateCommands::Check { target } => {
            let router = QueryRouter::global()?;
            match router.ensure_schema_change(&target) {
                Ok(()) => output_success(
                    output_format,
                    &format!("Schema changes allowed on '{}'", target),
                    Some(json!({ "target": target, "allowed": true })),
                ),
                Err(err @ TenantError::SchemaChangeRejected { .. }) => {
                    output_error(output_format, &err.to_string(), "SCHEMA_CHANGE_REJECTED")?;
                    Err(err.into())
                }
                Err(err) => Err(err.into()),
            }
        }
    }
}
