mod config;
mod core;
mod db;
mod errors;
mod ledger;
mod oracle;
mod rpc;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::pipeline::{Pipeline, supervise_feed};
use crate::db::{STATUS_FAILED, STATUS_REPORTED, SharedDatabase};
use crate::errors::StartupError;
use crate::ledger::LedgerClient;
use crate::ledger::gate::check_authorized;
use crate::oracle::OracleClient;
use crate::rpc::{FeedProvider, feed, http_provider};

const DEFAULT_CONFIG_PATH: &str = "fraudwatch.toml";

fn main() -> ExitCode {
    // A missing .env is fine; settings may come from the real environment.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fraudwatch=info")),
        )
        .init();

    info!("fraudwatch starting...");

    let result = tokio::runtime::Runtime::new()
        .map_err(StartupError::from)
        .and_then(|rt| rt.block_on(run()));

    match result {
        Ok(()) => {
            info!("fraudwatch stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Startup failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), StartupError> {
    let config_path =
        std::env::var("FRAUDWATCH_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut config = Config::load(&config_path)?;
    config.apply_env()?;
    let chain = config.validate()?;
    info!("Config: {:?}", config);

    let oracle = OracleClient::new(&config.oracle)?;
    info!(url = oracle.url(), "Fraud oracle configured");

    let ledger = Arc::new(LedgerClient::new(
        http_provider(&chain.rpc_url)?,
        &chain.contract_address,
        &chain.private_key,
        chain.chain_id,
    )?);
    info!(
        reporter = ?ledger.reporter(),
        contract = %chain.contract_address,
        chain_id = ?ledger.chain_id(),
        "Ledger client ready"
    );
    check_authorized(ledger.as_ref(), ledger.reporter()).await;

    let journal = if config.database.enabled {
        open_journal(&config.database.path)
    } else {
        None
    };

    let lookups = FeedProvider::new();
    let mut pipeline = Pipeline::new(
        Arc::new(lookups.clone()),
        Arc::new(oracle),
        ledger,
        config.pipeline.clone(),
    );
    if let Some(db) = journal.clone() {
        pipeline = pipeline.with_journal(db);
    }
    let pipeline = Arc::new(pipeline);

    let cancel = CancellationToken::new();
    let (feed_tx, feed_rx) = mpsc::unbounded_channel();

    let ws_url = chain.ws_url.clone();
    let feed_handle = tokio::spawn(supervise_feed(
        move |events, cancel| feed::run_session(ws_url.clone(), lookups.clone(), events, cancel),
        Duration::from_secs(config.chain.reconnect_delay_secs),
        feed_tx,
        cancel.clone(),
    ));
    info!(endpoint = %chain.ws_url, "Listening to pending transactions...");

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutting down fraud monitor...");
        signal_cancel.cancel();
    });

    pipeline.run(feed_rx, cancel.clone()).await;
    cancel.cancel();
    if let Err(e) = feed_handle.await {
        warn!("Feed supervisor ended abnormally: {e}");
    }

    if let Some(db) = journal {
        match (db.count_by_status(STATUS_REPORTED), db.count_by_status(STATUS_FAILED)) {
            (Ok(reported), Ok(failed)) => info!(reported, failed, "Findings journal totals"),
            (Err(e), _) | (_, Err(e)) => warn!("Failed to read findings journal: {e}"),
        }
    }
    Ok(())
}

/// Open the findings journal. Failure only disables journaling.
fn open_journal(path: &str) -> Option<SharedDatabase> {
    let db_path = Path::new(path);
    if let Some(parent) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            warn!("Failed to create journal directory {}: {e}", parent.display());
            return None;
        }
    }
    match SharedDatabase::open(db_path) {
        Ok(db) => {
            match db.summary() {
                Ok((count, last)) => info!(
                    findings = count,
                    last_finding = last.as_deref().unwrap_or("never"),
                    "Findings journal opened at {path}"
                ),
                Err(e) => warn!("Findings journal opened at {path} but could not be read: {e}"),
            }
            Some(db)
        }
        Err(e) => {
            warn!("Failed to open findings journal at {path}, continuing without it: {e}");
            None
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
