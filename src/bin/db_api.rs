//! Database API Server
//!
//! Serves `/register_bots` and `/balance_of` over the chainsync database.
//!
//! Usage:
//!     cargo run --release --bin db-api -- --host 0.0.0.0 --port 5002

use anyhow::Result;
use clap::Parser;
use hyperdrive_bots::api::server::{DEFAULT_HOST, DEFAULT_PORT};
use hyperdrive_bots::api::{serve, AppState, ServerConfig, State};
use hyperdrive_bots::chainsync::Database;
use hyperdrive_bots::config::{load_env, PostgresConfig};
use hyperdrive_bots::logging::init_logging;

#[derive(Parser)]
#[command(name = "db-api", about = "REST API over the chainsync database")]
struct Args {
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Environment file (default: .env when present)
    #[arg(long)]
    env_file: Option<String>,

    /// Emit JSON logs
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.json);
    load_env(args.env_file.as_deref())?;

    let postgres = PostgresConfig::from_env()?;
    let database = Database::connect(&postgres.database_url()).await?;
    let state = AppState::new(State { database });

    let config = ServerConfig {
        host: args.host,
        port: args.port,
    };
    serve(state, &config).await?;
    Ok(())
}
