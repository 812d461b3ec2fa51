//! Startup orchestration.
//!
//! # Responsibilities
//! - Load configuration and apply command-line overrides
//! - Initialize logging and metrics
//! - Bind the listener, start the config watcher and signal handler
//! - Run the server until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Overrides are re-applied to every reloaded config

use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::config::watcher::ConfigWatcher;
use crate::config::{load_config, validate_config, ConfigError, RelayConfig};
use crate::http::server::{RelayServer, ServerError};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::{logging, metrics};

/// Settings supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    /// TOML config file; watched for changes when given.
    pub config_path: Option<PathBuf>,
    pub bind_address: Option<String>,
    pub backend_origin: Option<String>,
    pub log_level: Option<String>,
}

impl StartupOptions {
    /// Overwrite config fields with any values given here.
    pub fn apply_overrides(&self, config: &mut RelayConfig) {
        if let Some(bind_address) = &self.bind_address {
            config.listener.bind_address = bind_address.clone();
        }
        if let Some(origin) = &self.backend_origin {
            config.backend.origin = origin.clone();
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),
    #[error("server: {0}")]
    Server(#[from] ServerError),
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Build the effective configuration: file (or defaults), then overrides,
/// then validation.
pub fn resolve_config(options: &StartupOptions) -> Result<RelayConfig, ConfigError> {
    let mut config = match &options.config_path {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    options.apply_overrides(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Run the relay until a termination signal arrives.
pub async fn run(options: StartupOptions) -> Result<(), StartupError> {
    let config = resolve_config(&options)?;
    logging::init_logging(&config.observability)?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "site-relay starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backend_origin = %config.backend.origin,
        clone_path = %config.backend.clone_path,
        response_timeout_secs = config.timeouts.response_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = RelayServer::new(config.clone())?;

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "Listening for connections");

    let (_watcher, config_updates) = watch_config(&options);

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Start watching the config file, if there is one. The returned watcher
/// handle must outlive the server.
fn watch_config(
    options: &StartupOptions,
) -> (
    Option<notify::RecommendedWatcher>,
    mpsc::UnboundedReceiver<RelayConfig>,
) {
    let (forward_tx, forward_rx) = mpsc::unbounded_channel();

    let Some(path) = &options.config_path else {
        return (None, forward_rx);
    };

    let (watcher, mut raw_updates) = ConfigWatcher::new(path);
    let handle = match watcher.run() {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(error = %e, "Config hot reload disabled");
            return (None, forward_rx);
        }
    };

    let options = options.clone();
    tokio::spawn(async move {
        while let Some(mut config) = raw_updates.recv().await {
            options.apply_overrides(&mut config);
            if forward_tx.send(config).is_err() {
                break;
            }
        }
    });

    (Some(handle), forward_rx)
}
