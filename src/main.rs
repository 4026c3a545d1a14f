//! Northstar - goal-tracking service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use northstar::{config::Args, db::Database, logging, server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    logging::init(&args.log_level, args.log_format).map_err(anyhow::Error::msg)?;

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let database_path = args.database_path();

    info!("======================================");
    info!("  Northstar - goal tracking service");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Database: {}", database_path.display());
    info!("CORS origin: {}", args.cors_origin);
    info!("Token expiry: {}s", args.jwt_expiry_seconds);
    info!("======================================");

    let db = Database::open(&database_path)?;
    let state = Arc::new(server::AppState::new(args, db)?);

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
