//! hostvars daemon
//!
//! Serves an in-memory host inventory over HTTP and periodically flushes it
//! to a datastore file.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use hostvars_core::Inventory;

mod api;
mod config;
mod router;
mod state;

use config::{Config, DaemonConfig, LogFormat};
use state::AppState;

/// Host inventory daemon
#[derive(Parser, Debug)]
#[command(name = "hostvars", version, about)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address and port to listen on
    #[arg(long)]
    bind: Option<String>,

    /// Path of the datastore file
    #[arg(long)]
    datastore: Option<PathBuf>,

    /// Interval between datastore flushes, in milliseconds
    #[arg(long)]
    flush_interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Apply command-line overrides on top of the file configuration
    fn apply(self, config: &mut Config) {
        if let Some(bind) = self.bind {
            config.daemon.bind = bind;
        }
        if let Some(datastore) = self.datastore {
            config.inventory.datastore_path = datastore;
        }
        if let Some(interval) = self.flush_interval_ms {
            config.inventory.flush_interval_ms = interval;
        }
        if let Some(level) = self.log_level {
            config.daemon.log_level = level;
        }
    }
}

fn init_tracing(daemon: &DaemonConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&daemon.log_level));
    let registry = tracing_subscriber::registry().with(filter);

    match daemon.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
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
                warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();
    let config_path = Config::locate(args.config.as_deref());
    let mut config = Config::load_or_default(config_path.as_deref())?;
    args.apply(&mut config);

    init_tracing(&config.daemon);
    match &config_path {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => warn!("no config file found, using defaults"),
    }

    let inventory = Inventory::open(&config.inventory)
        .await
        .wrap_err("failed to open inventory")?;

    let listener = TcpListener::bind(&config.daemon.bind)
        .await
        .wrap_err_with(|| format!("failed to bind {}", config.daemon.bind))?;
    info!(
        bind = %config.daemon.bind,
        datastore = %config.inventory.datastore_path.display(),
        flush_interval_ms = config.inventory.flush_interval_ms,
        "hostvars daemon listening"
    );

    let app = router::create_router(Arc::new(AppState::new(Arc::clone(&inventory))));
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    let stopped = inventory.stop().await;
    served.wrap_err("http server failed")?;
    stopped.wrap_err("inventory shutdown failed")?;

    info!("hostvars daemon stopped");
    Ok(())
}
