//! Insight CLI - run index insight tasks against a fixture cluster.
//!
//! # Usage
//!
//! ```bash
//! # Generate the statistical profile of one index
//! insight run --fixture cluster.json --index logs-otel-v1-000001 --task-type statistical_data
//!
//! # Correlate a trace index with its log and metric siblings
//! insight run --fixture cluster.json --index jaeger-span-2025-12-19 --task-type index_correlation
//!
//! # Storage id of a record
//! insight doc-id logs-otel-v1-000001 FIELD_DESCRIPTION
//!
//! # Effective configuration
//! insight config show
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "insight")]
#[command(about = "Index insight - cached, model-assisted index analysis", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "INSIGHT_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task (or ALL) for an index of a fixture cluster
    Run {
        /// JSON fixture describing indices, documents and model replies
        #[arg(short, long)]
        fixture: PathBuf,

        /// Source index name
        #[arg(short, long)]
        index: String,

        /// Task type, case-insensitive
        #[arg(short, long, default_value = "STATISTICAL_DATA")]
        task_type: String,

        /// Tenant the record belongs to
        #[arg(long)]
        tenant: Option<String>,

        /// Print the whole record as JSON instead of the content only
        #[arg(long)]
        json: bool,
    },

    /// Print the storage id of an (index, task type) record
    DocId {
        index: String,
        task_type: String,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective configuration as TOML
    Show,

    /// Write the default configuration to a file
    Init {
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref()).await?;

    init_logging(cli.verbose, &config.general.log_level);

    match cli.command {
        Commands::Run {
            fixture,
            index,
            task_type,
            tenant,
            json,
        } => {
            commands::run_task(config, &fixture, &index, &task_type, tenant.as_deref(), json).await?;
        }
        Commands::DocId { index, task_type } => {
            commands::print_doc_id(&index, &task_type)?;
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => commands::show_config(&config)?,
            ConfigCommands::Init { path, force } => commands::init_config(&path, force).await?,
        },
    }

    Ok(())
}

fn init_logging(verbose: bool, level: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = if verbose {
        EnvFilter::new("insight_core=debug,insight_storage=debug,insight_tasks=debug,insight_cli=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "insight_core={level},insight_storage={level},insight_tasks={level},insight_cli={level},warn"
            ))
        })
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}
