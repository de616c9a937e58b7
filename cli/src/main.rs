mod commands;
mod config;
mod openfoodfacts;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::commands::{cmd_foods, cmd_plan, parse_date};
use crate::config::Config;
use crate::openfoodfacts::OpenFoodFactsClient;
use platter_core::catalog::Catalog;
use platter_core::service::Planner;

#[derive(Parser)]
#[command(
    name = "platter",
    version,
    about = "Plan daily meals that hit your macro targets"
)]
struct Cli {
    /// Food catalog CSV (overrides `catalog_path` from config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    catalog: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
    /// Generate a meal plan for one day and print it
    Plan {
        /// Date to plan (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Plan against the rest-day profile
        #[arg(long)]
        rest: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List or search the food catalog
    Foods {
        /// Search query (name or product code)
        #[arg(short, long)]
        search: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let catalog_path = cli.catalog.unwrap_or(config.catalog_path);
    let catalog = Catalog::from_path(&catalog_path)?;
    let planner = Planner::with_catalog(catalog, config.planner);

    match cli.command {
        Commands::Serve { port, bind } => {
            let lookup = Arc::new(OpenFoodFactsClient::new()?);
            server::start_server(planner, lookup, catalog_path, port, &bind).await
        }
        Commands::Plan { date, rest, json } => {
            let date = parse_date(date)?;
            cmd_plan(&planner, date, rest, json)
        }
        Commands::Foods { search, json } => cmd_foods(&planner, search.as_deref(), json),
    }
}
