use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use basednews_api::config::Config;
use basednews_api::ingest_metrics::DEFAULT_WINDOW_DAYS;
use basednews_api::server::{self, AppState};
use basednews_api::{logging, metrics};

#[derive(Parser)]
#[command(name = "basednews-api")]
#[command(about = "Read-only dashboard API over basednews ingestion data")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the dashboard HTTP API
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the per-outlet daily ingest counts as JSON
    IngestMetrics {
        /// Window size in days, ending at the latest ingested day
        #[arg(long, default_value_t = DEFAULT_WINDOW_DAYS, allow_negative_numbers = true)]
        days: i64,
        /// Only include this country (case-insensitive)
        #[arg(long)]
        country: Option<String>,
    },
    /// Print the outlet catalog as JSON
    Outlets,
    /// Print data directory status as JSON
    Status,
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    match cli.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            if config.metrics.enabled {
                metrics::init_metrics();
            }
            server::start_server(&config).await?;
        }
        Commands::IngestMetrics { days, country } => {
            server::check_window_days(days, config.server.max_days)?;
            let state = AppState::from_config(&config);
            let response = state.ingest_metrics.get_metrics(days, country.as_deref());
            info!(days = response.days.len(), series = response.series.len(), "ingest metrics computed");
            print_json(&response)?;
        }
        Commands::Outlets => {
            let state = AppState::from_config(&config);
            print_json(&state.outlets.load_outlets())?;
        }
        Commands::Status => {
            let state = AppState::from_config(&config);
            print_json(&state.status.get_status())?;
        }
    }
    Ok(())
}
