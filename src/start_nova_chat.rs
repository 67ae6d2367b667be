//! Startup helpers for the Nova chat proxy and terminal client.

use std::process::ExitCode;
use std::sync::Arc;

use crate::chat::core::errors::ChatResult;
use crate::server::{self, AppState};

/// Install the global `tracing` subscriber, logging to stderr.
///
/// `RUST_LOG` overrides `default_directive`. Calling it twice is harmless.
pub fn init_tracing(default_directive: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));
    match tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        Ok(()) => {}
        Err(e) => tracing::debug!("Tracing subscriber already installed: {e}"),
    }
}

/// Run the proxy server (used by the `nova-server` binary).
///
/// # Returns
/// `ExitCode::SUCCESS` on graceful shutdown, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    init_tracing("info");
    tracing::info!("Starting Nova chat proxy v{}", env!("CARGO_PKG_VERSION"));

    let state = match initialize() {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("Failed to create state: {e}");
            return ExitCode::from(1);
        }
    };

    let port = state.config.port;

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!("Failed to create runtime: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = rt.block_on(server::run_server_with_shutdown(state, port, shutdown_signal())) {
        tracing::error!("Server error: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("Nova chat proxy stopped");
    ExitCode::SUCCESS
}

/// Initialize application state without starting the server.
///
/// # Errors
/// Returns an error if the configuration is invalid or the HTTP client cannot be built.
pub fn initialize() -> ChatResult<Arc<AppState>> {
    let state = AppState::from_env()?;
    tracing::info!("Completion upstream: {}", state.config.completion_url);
    Ok(state)
}

/// Resolves on Ctrl+C.
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Ctrl+C handler unavailable: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice_is_harmless() {
        init_tracing("debug");
        init_tracing("warn");
        tracing::debug!("still logging");
    }
}
