//! # Token Rotator
//!
//! Rotates Linode API tokens before they expire and stores the new values
//! in Vault.
//!
//! ## Usage
//!
//! ```bash
//! # Run as configured (daemon by default)
//! token-rotator --config /etc/token-rotator/config.yaml
//!
//! # Merge every file in a directory and run a single cycle
//! token-rotator --config '/etc/token-rotator/*.yaml' --once
//!
//! # Log what would change without touching Linode or Vault
//! token-rotator --config config.yaml --dry-run --once
//!
//! # Check configuration only
//! token-rotator --config config.yaml validate
//! ```

use anyhow::{Context, Result};
use api_token_rotator::config::{self, RotatorConfig, RunMode, RuntimeConfig};
use api_token_rotator::model::{Clock, SecretValue, SystemClock};
use api_token_rotator::observability::{self, LogFormat, PrometheusEventSink};
use api_token_rotator::provider::{CredentialIssuer, LinodeIssuer, SecretStore, VaultSecretStore};
use api_token_rotator::rotation::{EventSink, RotationEngine};
use api_token_rotator::scheduler::Scheduler;
use api_token_rotator::server::{start_server, ServerState};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BUILD_GIT_HASH"),
    ", built ",
    env!("BUILD_DATETIME"),
    ")"
);

/// Rotate expiring Linode API tokens and store them in Vault
#[derive(Parser)]
#[command(name = "token-rotator", version = VERSION, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file path or glob pattern (files are merged in path order)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: String,

    /// Evaluate tokens and log intended actions without changing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Run a single cycle and exit, regardless of the configured mode
    #[arg(long, global = true)]
    once: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run rotation cycles (default)
    Run,
    /// Load and validate the configuration, then exit
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cfg = config::load_and_validate(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config))?;
    let runtime = RuntimeConfig::from_env();

    let log_format = runtime
        .log_format
        .as_deref()
        .unwrap_or(&cfg.observability.log_format);
    observability::init_logging(&cfg.observability.log_level, LogFormat::parse(log_format))?;

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Validate => {
            info!(
                "Configuration is valid: {} tokens, mode {}, check interval {}",
                cfg.tokens.len(),
                cfg.daemon.mode,
                cfg.daemon.check_interval
            );
            Ok(())
        }
        Commands::Run => run(cfg, runtime, cli.dry_run, cli.once).await,
    }
}

async fn run(cfg: RotatorConfig, runtime: RuntimeConfig, dry_run: bool, once: bool) -> Result<()> {
    info!("Starting token rotator {}", VERSION);

    let mode = if once { RunMode::OneShot } else { cfg.run_mode()? };
    let interval = cfg.check_interval()?;
    let dry_run = dry_run || cfg.daemon.dry_run;
    if dry_run {
        warn!("Dry-run mode: no tokens will be created, stored or revoked");
    }
    if !cfg.observability.otel_endpoint.is_empty() {
        warn!(
            "observability.otel_endpoint is set ({}) but trace export is not supported; ignoring",
            cfg.observability.otel_endpoint
        );
    }

    let linode_token = runtime
        .linode_token
        .clone()
        .context("LINODE_TOKEN environment variable is required")?;
    let issuer = LinodeIssuer::new(&runtime.linode_api_url, SecretValue::new(linode_token))?;
    let store = VaultSecretStore::login(&cfg.vault)
        .await
        .context("Failed to authenticate with Vault")?;

    observability::register_metrics()?;

    let engine = RotationEngine::new(
        Arc::new(issuer) as Arc<dyn CredentialIssuer>,
        Arc::new(store) as Arc<dyn SecretStore>,
        Arc::new(SystemClock) as Arc<dyn Clock>,
        Arc::new(PrometheusEventSink) as Arc<dyn EventSink>,
    )
    .with_default_threshold(cfg.rotation.threshold_percent)
    .with_dry_run(dry_run);

    let scheduler = Scheduler::new(engine, cfg.tokens, mode, interval)
        .with_pruning(cfg.rotation.prune_expired);

    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_on_signal(cancel.clone()));

    let server_state = Arc::new(ServerState::default());
    if mode == RunMode::Daemon {
        let state = Arc::clone(&server_state);
        let shutdown = cancel.clone();
        let port = runtime.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(port, state, shutdown).await {
                error!("HTTP server error: {}", e);
            }
        });
    }

    server_state.set_ready(true);
    let report = scheduler.run(&cancel).await;
    server_state.set_ready(false);

    info!(
        "Token rotator stopped after {} cycle(s), {} token failure(s)",
        report.cycles, report.failed
    );

    if mode == RunMode::OneShot && report.failed > 0 {
        anyhow::bail!("{} token(s) failed to process", report.failed);
    }
    Ok(())
}

/// Cancel `token` on Ctrl-C or SIGTERM
async fn shutdown_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl-C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
    token.cancel();
}
