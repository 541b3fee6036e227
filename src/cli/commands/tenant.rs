use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::{output_success, print_json};
use crate::cli::OutputFormat;
use crate::config;
use crate::tenancy::{context, QueryRouter, TenantDirectory};

#[derive(Subcommand)]
pub enum TenantCommands {
    #[command(about = "List selectable tenant databases")]
    List {
        #[arg(long, help = "Only databases for this company code")]
        company: Option<String>,
    },

    #[command(about = "Register a tenant's connection profile ahead of first use")]
    Resolve {
        #[arg(help = "Tenant database identifier")]
        tenant: String,
    },

    #[command(about = "Show where reads and writes of an entity kind are routed")]
    Route {
        #[arg(help = "Entity kind, e.g. invoice or session")]
        entity_kind: String,
        #[arg(long, help = "Tenant bound to the slot while routing")]
        tenant: Option<String>,
    },
}

pub async fn handle(cmd: TenantCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TenantCommands::List { company } => {
            let tenancy = &config::config().tenancy;
            let directory = TenantDirectory::load(&tenancy.directory_file, &tenancy.default_selector)?;
            let entries = directory.databases_for(company.as_deref());

            match output_format {
                OutputFormat::Json => print_json(&json!({ "databases": entries }))?,
                OutputFormat::Text => {
                    if entries.is_empty() {
                        println!("No databases configured");
                        return Ok(());
                    }
                    println!("{:<15} {:<25} {}", "COMPANY", "DATABASE", "DESCRIPTION");
                    println!("{}", "-".repeat(70));
                    for entry in entries {
                        println!("{:<15} {:<25} {}", entry.company_code, entry.db_name, entry.description);
                    }
                }
            }
            Ok(())
        }
        TenantCommands::Resolve { tenant } => {
            let router = QueryRouter::global()?;
            let profile = router.registry().resolve(&tenant)?;

            match output_format {
                OutputFormat::Json => print_json(&json!({ "tenant": tenant, "profile": &*profile }))?,
                OutputFormat::Text => println!("{} -> {}", tenant, profile),
            }
            Ok(())
        }
        TenantCommands::Route { entity_kind, tenant } => {
            let router = QueryRouter::global()?;

            let (read, write) = context::scope(async {
                if let Some(tenant) = &tenant {
                    context::set(tenant.as_str());
                }
                Ok::<_, anyhow::Error>((
                    router.route_for_read(&entity_kind)?,
                    router.route_for_write(&entity_kind)?,
                ))
            })
            .await?;

            let message = format!("{} reads from '{}', writes to '{}'", entity_kind, read, write);
            output_success(
                output_format,
                &message,
                Some(json!({
                    "entity_kind": entity_kind,
                    "tenant_independent": router.is_tenant_independent(&entity_kind),
                    "read": read,
                    "write": write,
                })),
            )
        }
    }
}
