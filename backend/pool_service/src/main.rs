//! Deposit pool service entry point.
//!
//! Hosts a single pool engine in memory, exposes it over an Axum REST API and
//! spawns a background recorder that persists every engine event to SQLite.

mod api;
mod config;
mod db;
mod errors;
mod events;
mod recorder;

use std::sync::Arc;

use deposit_pool::{DepositContract, FundingAsset, PoolCreator, Registrar};
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

/// Token deposits are denominated so that one token stakes 32 units.
const TOKEN_AMOUNT_MULTIPLIER: u64 = 32;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging (RUST_LOG controls verbosity).
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Load optional .env file (ignored if missing).
    let _ = dotenvy::dotenv();

    let config = Config::from_env()?;
    let engine_config = config.engine_config();

    // Set up the SQLite connection pool and run migrations.
    let pool = db::init_pool(&config.database_url).await?;

    // Pool indices restart at 0 with every process, so rows are keyed by run.
    let instance_id = chrono::Utc::now().timestamp_millis();

    // ─── Background recorder ──────────────────────────────
    let (sink, rx) = recorder::channel();
    tokio::spawn(recorder::run(pool.clone(), instance_id, rx));

    // ─── Engine ───────────────────────────────────────────
    let registrar: Arc<dyn Registrar> = match engine_config.funding {
        FundingAsset::Native => Arc::new(DepositContract::new()),
        FundingAsset::Token(_) => {
            Arc::new(DepositContract::with_amount_multiplier(TOKEN_AMOUNT_MULTIPLIER))
        }
    };
    info!(
        admin = %engine_config.admin,
        target = %engine_config.target_amount,
        funding = ?engine_config.funding,
        instance_id,
        "Starting deposit pool engine"
    );
    let engine = PoolCreator::new(engine_config, registrar, Arc::new(sink))?;

    // ─── REST API ─────────────────────────────────────────
    let api_state = Arc::new(api::ApiState {
        engine: Arc::new(engine),
        pool,
        instance_id,
    });
    let app = api::router(api_state);

    let addr = format!("0.0.0.0:{}", config.api_port);
    info!("API listening on http://{addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
