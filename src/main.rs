use anyhow::{Context, Result};
use clap::Parser;
use lottery_agency::cli::Cli;
use lottery_agency::{cancel_pair, run_agency, AgencyConfig, CancelHandle, PartialConfig, TracingReporter};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancel the session on SIGTERM or Ctrl-C.
fn spawn_signal_listener(cancel: CancelHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut term = match signal(SignalKind::terminate()) {
                Ok(term) => term,
                Err(e) => {
                    tracing::warn!(error = %e, "cannot install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                    cancel.cancel();
                    return;
                }
            };
            tokio::select! {
                _ = term.recv() => tracing::info!("action: sigterm | result: received"),
                _ = tokio::signal::ctrl_c() => tracing::info!("action: sigint | result: received"),
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("action: sigint | result: received");
        }
        cancel.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let file = match &cli.config {
        Some(path) => PartialConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PartialConfig::default(),
    };
    let config = AgencyConfig::resolve(cli.overrides().or(file)).context("Invalid configuration")?;

    init_logging(&config.log_level);
    tracing::debug!(?config, "configuration resolved");

    let (cancel, token) = cancel_pair();
    spawn_signal_listener(cancel.clone());

    let reporter = TracingReporter;
    match run_agency(&config, token, &reporter).await {
        Ok(summary) => {
            tracing::info!(
                "action: exit | result: success | agency_id: {} | batches: {} | bets: {} | winners: {}",
                config.id,
                summary.frames,
                summary.records,
                summary.winners.len()
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_cancelled() && cancel.is_cancelled() => {
            tracing::info!("action: exit | result: cancelled | agency_id: {}", config.id);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            tracing::error!("action: exit | result: fail | agency_id: {} | error: {}", config.id, e);
            Ok(ExitCode::FAILURE)
        }
    }
}
