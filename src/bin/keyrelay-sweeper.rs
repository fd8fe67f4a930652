// ABOUTME: Background sweeper binary deleting expired grants and sessions
// ABOUTME: Runs on an interval or once, against any supported database URL
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Keyrelay Contributors

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use keyrelay::constants::limits;
use keyrelay::database_plugins::{factory, DatabaseProvider};
use keyrelay::logging;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "keyrelay-sweeper",
    about = "Deletes expired grants and sessions from the keyrelay store"
)]
struct Args {
    /// Database connection URL
    #[arg(long, env = "KEYRELAY_DATABASE_URL", default_value = "sqlite:./data/keyrelay.db")]
    database_url: String,

    /// Seconds between sweep passes
    #[arg(long, default_value_t = limits::DEFAULT_SWEEP_INTERVAL_SECS)]
    interval_secs: u64,

    /// Run a single sweep pass and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    logging::init_from_env()?;

    let database = factory::Database::new(&args.database_url).await?;
    database.migrate().await?;
    info!(backend = database.backend_info(), "sweeper connected");

    if args.once {
        sweep_once(&database).await;
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval_secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => sweep_once(&database).await,
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn sweep_once(database: &factory::Database) {
    let now = Utc::now();

    match database.sweep_expired_grants(now).await {
        Ok(count) => info!(count, "grant sweep complete"),
        Err(e) => error!(error = %e, "grant sweep failed"),
    }

    match database.sweep_expired_sessions(now).await {
        Ok(count) => info!(count, "session sweep complete"),
        Err(e) => error!(error = %e, "session sweep failed"),
    }
}
