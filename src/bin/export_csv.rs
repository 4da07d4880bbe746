//! Chainsync CSV Export
//!
//! Writes every chainsync table to `<out-dir>/<table>.csv`.

use anyhow::Result;
use clap::Parser;
use hyperdrive_bots::chainsync::export::export_tables;
use hyperdrive_bots::chainsync::Database;
use hyperdrive_bots::config::{load_env, PostgresConfig};
use hyperdrive_bots::logging::init_logging;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "export-csv", about = "Dump chainsync tables to CSV")]
struct Args {
    #[arg(long, default_value = "export")]
    out_dir: PathBuf,

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
    let db = Database::connect(&postgres.database_url()).await?;
    export_tables(&db, &args.out_dir).await
}
