//! Daemon assembly and lifecycle management.
//!
//! The [`Daemon`] owns the loaded configuration and the scan orchestrator.
//! It wires the module registry, background tasks, and the HTTP API.
//!
//! # Startup Order
//!
//! 1. Validate configuration
//! 2. Install the metrics recorder (when enabled)
//! 3. Build the module registry and orchestrator
//! 4. Bind the API listener, spawn the sweeper and uptime updater
//!
//! # Shutdown Order
//!
//! 1. Stop accepting connections (axum graceful shutdown)
//! 2. Cancel every in-flight scan
//! 3. Wait for background tasks to finish

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::Router;
use tokio::net::TcpListener;

use reconpost_core::CancellationToken;
use reconpost_core::config::ReconpostConfig;
use reconpost_engine::ScanOrchestrator;

use crate::api::{self, AppState};
use crate::cli::DaemonCli;
use crate::metrics_server;

/// The reconpost daemon.
pub struct Daemon {
    /// Loaded and validated configuration.
    config: ReconpostConfig,
    /// Scan orchestrator shared with the API handlers.
    orchestrator: ScanOrchestrator,
    /// Daemon start time (for uptime reporting).
    start_time: Instant,
}

impl Daemon {
    /// Load configuration and build the daemon.
    ///
    /// A missing configuration file falls back to defaults plus
    /// environment overrides.
    pub async fn build(config_path: &Path) -> Result<Self> {
        let config = ReconpostConfig::load_or_default(config_path)
            .await
            .map_err(|e| anyhow::anyhow!("failed to load config: {}", e))?;
        Self::build_from_config(config)
    }

    /// Build from an already-loaded configuration.
    pub fn build_from_config(config: ReconpostConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("config validation failed: {}", e))?;

        if config.metrics.enabled {
            metrics_server::install_metrics_recorder(&config.metrics)?;
            tracing::info!(port = config.metrics.port, "metrics endpoint enabled");
        }

        let registry = reconpost_modules::default_registry(&config.modules)
            .map_err(|e| anyhow::anyhow!("failed to build module registry: {}", e))?;
        if registry.is_empty() {
            tracing::warn!("every module is disabled; scans will be rejected");
        }
        tracing::info!(modules = ?registry, "modules registered");

        if config.metrics.enabled {
            metrics_server::record_daemon_metrics(registry.count());
        }

        let orchestrator = ScanOrchestrator::new(Arc::new(registry), config.scan.clone());
        Ok(Self {
            config,
            orchestrator,
            start_time: Instant::now(),
        })
    }

    /// Get a reference to the loaded configuration.
    pub fn config(&self) -> &ReconpostConfig {
        &self.config
    }

    /// Get the scan orchestrator.
    pub fn orchestrator(&self) -> &ScanOrchestrator {
        &self.orchestrator
    }

    /// Build the HTTP router for this daemon.
    pub fn router(&self) -> Router {
        api::router(AppState {
            orchestrator: self.orchestrator.clone(),
            started: self.start_time,
        })
    }

    /// Bind the configured address and serve until SIGINT or SIGTERM.
    pub async fn run(self) -> Result<()> {
        let addr = self.config.server.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| anyhow::anyhow!("failed to bind {}: {}", addr, e))?;
        let signal = shutdown_signal()?;
        self.serve(listener, signal).await
    }

    /// Serve the API on `listener` until `shutdown` resolves.
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let local_addr = listener.local_addr()?;
        let tasks_token = CancellationToken::new();

        let sweeper = self.orchestrator.spawn_sweeper();
        let uptime = self.config.metrics.enabled.then(|| {
            metrics_server::spawn_uptime_updater(self.start_time, tasks_token.clone())
        });

        tracing::info!(listen_addr = %local_addr, "reconpost-daemon listening");
        let served = axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await;

        tracing::info!("stopping background tasks");
        self.orchestrator.shutdown();
        tasks_token.cancel();
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "sweeper task ended abnormally");
        }
        if let Some(task) = uptime {
            let _ = task.await;
        }

        served.map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;
        tracing::info!("reconpost-daemon shut down");
        Ok(())
    }
}

/// Apply command-line overrides on top of file and environment settings.
pub fn apply_cli_overrides(config: &mut ReconpostConfig, cli: &DaemonCli) -> Result<()> {
    if let Some(level) = &cli.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format.clone_from(format);
    }
    if let Some(listen) = &cli.listen {
        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| anyhow::anyhow!("invalid --listen '{}': expected host:port", listen))?;
        config.server.port = port
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid --listen port '{}': {}", port, e))?;
        config.server.listen_addr = host.trim_start_matches('[').trim_end_matches(']').to_owned();
    }
    Ok(())
}

/// Install signal handlers and return a future that resolves on the first
/// SIGTERM or SIGINT.
///
/// # Errors
///
/// Returns an error if signal handlers cannot be installed.
#[cfg(unix)]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("failed to install SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("failed to install SIGINT handler: {}", e))?;

    Ok(async move {
        let signal = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        tracing::info!(signal = signal, "shutdown signal received");
    })
}

#[cfg(not(unix))]
fn shutdown_signal() -> Result<impl Future<Output = ()> + Send + 'static> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!(signal = "ctrl-c", "shutdown signal received");
    })
}
