//! flavorctl
//!
//! A command-line tool for inspecting the flavor catalog, checking pods
//! against it locally and sending test reviews to a running webhook.

mod client;
mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use commands::{check, flavors, health, review, settings};
use flavor_lib::admission::Operation;

/// Resource flavor admission CLI
#[derive(Parser)]
#[command(name = "flavorctl")]
#[command(author, version, about = "CLI for the resource flavor admission webhook", long_about = None)]
pub struct Cli {
    /// Flavor catalog file (can also be set via FLAVOR_CATALOG env var)
    #[arg(long, env = "FLAVOR_CATALOG", global = true)]
    pub catalog: Option<PathBuf>,

    /// Admission control config file holding a flavor.config=<path> line
    #[arg(long, env = "FLAVOR_ADMISSION_CONFIG", global = true, conflicts_with = "catalog")]
    pub admission_config: Option<PathBuf>,

    /// Output format
    #[arg(long, short, default_value = "table", global = true)]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the catalog's flavors in match order
    Flavors,

    /// Check a pod manifest (JSON) against the catalog locally
    Check {
        /// Pod manifest file
        pod: PathBuf,

        /// Operation to admit the pod under
        #[arg(long, default_value = "create")]
        operation: OperationArg,

        /// Print the pod with backfilled requests
        #[arg(long)]
        show_pod: bool,
    },

    /// Send a pod manifest to a running webhook as an AdmissionReview
    Review {
        /// Pod manifest file
        pod: PathBuf,

        /// Webhook base URL (can also be set via FLAVOR_WEBHOOK_URL env var)
        #[arg(long, env = "FLAVOR_WEBHOOK_URL")]
        url: Option<String>,

        /// Operation to put in the review
        #[arg(long, default_value = "create")]
        operation: OperationArg,

        /// Accept self-signed webhook certificates
        #[arg(long)]
        insecure: bool,
    },

    /// Show webhook health from its health/metrics port
    Health {
        /// Health API base URL, e.g. http://flavor-webhook:8080
        #[arg(long, env = "FLAVOR_WEBHOOK_API_URL")]
        api_url: Option<String>,
    },

    /// Manage saved defaults
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show saved defaults
    Show,

    /// Save defaults used when flags and env vars are absent
    Set {
        /// Default flavor catalog file
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Default webhook URL for `review`
        #[arg(long)]
        webhook_url: Option<String>,

        /// Default health API URL for `health`
        #[arg(long)]
        api_url: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OperationArg {
    Create,
    Update,
}

impl From<OperationArg> for Operation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Create => Operation::Create,
            OperationArg::Update => Operation::Update,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let saved = config::Config::load()?;
    let source = commands::CatalogSource::resolve(
        cli.catalog.clone(),
        cli.admission_config.clone(),
        &saved,
    );

    let passed = match cli.command {
        Commands::Flavors => {
            flavors::list_flavors(&source, cli.format)?;
            true
        }
        Commands::Check {
            pod,
            operation,
            show_pod,
        } => {
            check::check_pod(&source, &pod, operation.into(), show_pod, cli.format)?
        }
        Commands::Review {
            pod,
            url,
            operation,
            insecure,
        } => {
            let url = config::resolve_url(url, saved.webhook_url.clone(), "webhook")?;
            let client = client::ApiClient::new(&url, insecure)?;
            review::send_review(&client, &pod, operation.into(), cli.verbose, cli.format).await?
        }
        Commands::Health { api_url } => {
            let url = config::resolve_url(api_url, saved.api_url.clone(), "health API")?;
            let client = client::ApiClient::new(&url, false)?;
            health::show_health(&client, cli.format).await?
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Show => {
                settings::show_config(&saved, cli.format)?;
                true
            }
            ConfigCommands::Set {
                catalog,
                webhook_url,
                api_url,
            } => {
                settings::set_config(saved, catalog, webhook_url, api_url)?;
                true
            }
        },
    };

    // Rejected pods and unready webhooks exit non-zero for use in scripts
    if !passed {
        std::process::exit(1);
    }
    Ok(())
}
