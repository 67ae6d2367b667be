//! HTTP proxy for the Nova chat assistant.
//!
//! Provides REST endpoints for:
//! - Chat completions, forwarded to the upstream provider with the server-side key
//! - YouTube Data API search and video details
//! - Health checks

pub mod routes;
pub mod state;
pub mod youtube;

pub use routes::create_router;
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Router with CORS (any origin) and request tracing applied.
pub fn build_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Start the HTTP server with graceful shutdown support.
///
/// The server will stop accepting new connections when `shutdown_signal` completes.
///
/// # Errors
/// Returns an error if the server fails to start.
pub async fn run_server_with_shutdown<F>(
    state: Arc<AppState>,
    port: u16,
    shutdown_signal: F,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Nova chat proxy listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use super::*;
    use crate::chat::core::config::ServerConfig;

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        let app = build_app(AppState::new(ServerConfig::default()).unwrap());
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/api/chat")
            .header("origin", "https://example.org")
            .header("access-control-request-method", "POST")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
    }

    #[tokio::test]
    async fn test_shutdown_signal_stops_server() {
        let state = AppState::new(ServerConfig::default()).unwrap();
        let result = run_server_with_shutdown(state, 0, async {}).await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_state_carries_configured_port() {
        let config = ServerConfig {
            port: 8123,
            ..ServerConfig::default()
        };
        assert_eq!(AppState::new(config).unwrap().config.port, 8123);
    }
}
