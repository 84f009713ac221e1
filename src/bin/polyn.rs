//! Polyn CLI
//!
//! Loads schemas into the Polyn schema registry and scaffolds new schemas and
//! consumers.
//!
//! Usage:
//!   polyn schemas load --dir ./schemas
//!   polyn gen schema widgets/app.widgets.created
//!   polyn --help

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use polyn_schemas::{scaffold, source, sync, PolynConfig, SyncReport};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "polyn")]
#[command(about = "Manage the Polyn schema registry")]
struct Cli {
    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Work with the schema registry
    Schemas {
        #[command(subcommand)]
        command: SchemaCommands,
    },

    /// Generate new files
    Gen {
        #[command(subcommand)]
        command: GenCommands,
    },

    /// Print the effective configuration
    Config,
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Mirror the schema directory into the registry
    Load {
        /// Schema directory (defaults to registry.schemas_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Validate and plan without connecting
        #[arg(long)]
        dry_run: bool,
    },

    /// Validate the schema directory without connecting
    Check {
        /// Schema directory (defaults to registry.schemas_dir)
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum GenCommands {
    /// Create a new JSON Schema file for a message
    Schema {
        /// Message name, optionally prefixed with subdirectories
        message_name: String,

        /// Project root
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },

    /// Append a consumer configuration to a stream's Terraform file
    Consumer {
        /// Stream to consume from
        stream_name: String,
        /// Application, service, or component consuming the message
        destination_name: String,
        /// Message being consumed
        message_name: String,

        /// Project root
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = PolynConfig::load_from(cli.config.as_deref()).context("loading configuration")?;

    match cli.command {
        Commands::Schemas { command } => match command {
            SchemaCommands::Load { dir, dry_run } => {
                let dir = dir.unwrap_or_else(|| config.registry.schemas_dir.clone());
                println!(
                    "Loading schemas into the Polyn schema registry from '{}'",
                    dir.display()
                );

                let report = if dry_run {
                    sync::dry_run(&config, &dir).await?
                } else {
                    sync::run(&config, &dir).await?
                };
                print_report(&report, dry_run);
                Ok(())
            }

            SchemaCommands::Check { dir } => {
                let dir = dir.unwrap_or_else(|| config.registry.schemas_dir.clone());
                let desired = source::discover(&dir)?;
                println!("{} schemas are valid", desired.len());
                Ok(())
            }
        },

        Commands::Gen { command } => match command {
            GenCommands::Schema { message_name, dir } => {
                let path = scaffold::generate_schema(&dir, &message_name)?;
                println!("Created new schema {}", path.display());
                Ok(())
            }

            GenCommands::Consumer {
                stream_name,
                destination_name,
                message_name,
                dir,
            } => {
                let path = scaffold::generate_consumer(
                    &dir,
                    &stream_name,
                    &destination_name,
                    &message_name,
                )?;
                println!("Added consumer for {} to {}", message_name, path.display());
                Ok(())
            }
        },

        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

fn print_report(report: &SyncReport, dry_run: bool) {
    let (put, deleted) = if dry_run {
        ("Would put", "Would delete")
    } else {
        ("Put", "Deleted")
    };

    for name in &report.put {
        println!("  {} {}", put, name);
    }
    for name in &report.deleted {
        println!("  {} {}", deleted, name);
    }
    println!(
        "{} schemas written, {} deleted",
        report.put.len(),
        report.deleted.len()
    );
}
