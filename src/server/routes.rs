//! HTTP route handlers for the Nova chat proxy.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{debug, error, warn};

use super::state::AppState;
use super::youtube::{YoutubeRequest, YoutubeRequestError, build_url};

/// Create the API router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route(
            "/api/chat",
            post(chat_proxy)
                .options(preflight)
                .fallback(method_not_allowed),
        )
        .route(
            "/api/youtube",
            post(youtube_post).get(youtube_get).options(preflight),
        )
        .with_state(state)
}

fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn upstream_status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::BAD_GATEWAY)
}

fn internal_error(err: &impl std::fmt::Display) -> Response {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({"error": "Internal server error", "message": err.to_string()}),
    )
}

/// Health check endpoint.
async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "nova-chat",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}

async fn method_not_allowed() -> Response {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        json!({"error": "Method not allowed"}),
    )
}

/// Forward a chat completion body to the upstream provider.
async fn chat_proxy(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let Some(api_key) = state
        .config
        .completion_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
    else {
        error!("Completion API key is not configured");
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "error": "Server configuration error",
                "message": "API key not configured on server"
            }),
        );
    };

    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    if payload.get("messages").is_none_or(Value::is_null) {
        return json_response(
            StatusCode::BAD_REQUEST,
            json!({"error": "Invalid request", "message": "Messages array is required"}),
        );
    }

    debug!("Forwarding completion request to {}", state.config.completion_url);
    let response = match state
        .http
        .post(&state.config.completion_url)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            error!("Completion upstream unreachable: {err}");
            return internal_error(&err);
        }
    };

    let status = response.status();
    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        warn!("Completion upstream returned {status}: {text}");
        let message = if text.is_empty() {
            status.canonical_reason().unwrap_or_default().to_string()
        } else {
            text
        };
        return json_response(
            upstream_status(status.as_u16()),
            json!({"error": "API request failed", "message": message}),
        );
    }

    match response.json::<Value>().await {
        Ok(data) => json_response(StatusCode::OK, data),
        Err(err) => internal_error(&err),
    }
}

async fn youtube_post(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request = serde_json::from_slice(&body).unwrap_or_default();
    youtube(&state, request).await
}

async fn youtube_get(
    State(state): State<Arc<AppState>>,
    query: Result<Query<YoutubeRequest>, QueryRejection>,
) -> Response {
    let request = query.map(|Query(q)| q).unwrap_or_default();
    youtube(&state, request).await
}

/// Relay a YouTube Data API call.
async fn youtube(state: &AppState, request: YoutubeRequest) -> Response {
    let Some(api_key) = state
        .config
        .youtube_api_key
        .as_deref()
        .filter(|k| !k.is_empty())
    else {
        error!("YouTube API key is not configured");
        return json_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "YouTube API key not configured"}),
        );
    };

    let action = match request.action() {
        Ok(action) => action,
        Err(YoutubeRequestError::InvalidAction) => {
            return json_response(StatusCode::BAD_REQUEST, json!({"error": "Invalid action"}));
        }
        Err(err) => {
            return json_response(
                StatusCode::BAD_REQUEST,
                json!({"error": "Invalid request", "message": err.to_string()}),
            );
        }
    };

    let url = match build_url(&state.config.youtube_api_base, &action, api_key) {
        Ok(Some(url)) => url,
        Ok(None) => {
            return json_response(
                StatusCode::OK,
                json!({"error": "Transcript feature requires additional setup"}),
            );
        }
        Err(err) => return internal_error(&err),
    };

    let response = match state.http.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            error!("YouTube upstream unreachable: {err}");
            return internal_error(&err);
        }
    };

    let status = response.status();
    let data = match response.json::<Value>().await {
        Ok(data) => data,
        Err(err) => return internal_error(&err),
    };

    if !status.is_success() {
        warn!("YouTube upstream returned {status}");
        let upstream_error = data.get("error").cloned().unwrap_or(Value::Null);
        return json_response(
            upstream_status(status.as_u16()),
            json!({"error": upstream_error}),
        );
    }

    json_response(StatusCode::OK, data)
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::{HeaderMap, Request};
    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;
    use crate::chat::core::config::{LlmConfig, ServerConfig};
    use crate::chat::core::message::Role;
    use crate::llm::completion::{
        CompletionClient, CompletionError, CompletionMessage, CompletionRequest,
        HttpCompletionClient,
    };

    fn state(config: ServerConfig) -> Arc<AppState> {
        AppState::new(config).unwrap()
    }

    fn keyed() -> ServerConfig {
        ServerConfig {
            completion_api_key: Some("groq-key".to_string()),
            youtube_api_key: Some("yt-key".to_string()),
            ..ServerConfig::default()
        }
    }

    async fn call(app: Router, method: &str, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    async fn spawn(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// Fake completion provider: echoes the bearer token, or fails when asked to.
    fn fake_upstream() -> Router {
        Router::new().route(
            "/v1/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<Value>| async move {
                if body["model"] == "overloaded" {
                    return (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response();
                }
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({"choices": [{"message": {"role": "assistant", "content": auth}}]}))
                    .into_response()
            }),
        )
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = call(create_router(state(keyed())), "GET", "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_chat_requires_api_key() {
        let app = create_router(state(ServerConfig::default()));
        let (status, body) = call(app, "POST", "/api/chat", r#"{"messages":[]}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Server configuration error");
    }

    #[tokio::test]
    async fn test_chat_requires_messages() {
        let app = create_router(state(keyed()));
        let (status, body) = call(app, "POST", "/api/chat", r#"{"model":"m"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Messages array is required");

        let app = create_router(state(keyed()));
        let (status, _) = call(app, "POST", "/api/chat", "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_chat_method_handling() {
        let app = create_router(state(keyed()));
        let (status, body) = call(app, "GET", "/api/chat", "").await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method not allowed");

        let app = create_router(state(keyed()));
        let (status, _) = call(app, "OPTIONS", "/api/chat", "").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_chat_forwards_and_maps_upstream_status() {
        let upstream = spawn(fake_upstream()).await;
        let config = ServerConfig {
            completion_url: format!("{upstream}/v1/chat/completions"),
            ..keyed()
        };

        let app = create_router(state(config.clone()));
        let (status, body) =
            call(app, "POST", "/api/chat", r#"{"model":"m","messages":[]}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["choices"][0]["message"]["content"], "Bearer groq-key");

        let app = create_router(state(config));
        let (status, body) = call(
            app,
            "POST",
            "/api/chat",
            r#"{"model":"overloaded","messages":[]}"#,
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], "API request failed");
        assert_eq!(body["message"], "slow down");
    }

    #[tokio::test]
    async fn test_http_client_through_proxy() {
        let upstream = spawn(fake_upstream()).await;
        let proxy = spawn(create_router(state(ServerConfig {
            completion_url: format!("{upstream}/v1/chat/completions"),
            ..keyed()
        })))
        .await;

        let client = HttpCompletionClient::new(&LlmConfig {
            endpoint: format!("{proxy}/api/chat"),
            ..LlmConfig::default()
        })
        .unwrap();

        let ok = CompletionRequest::new("m", vec![CompletionMessage::new(Role::User, "hi")]);
        assert_eq!(client.complete(&ok).await.unwrap(), "Bearer groq-key");

        let overloaded = CompletionRequest::new("overloaded", Vec::new());
        let err = client.complete(&overloaded).await.unwrap_err();
        assert!(matches!(err, CompletionError::Status { code: 429, .. }));
    }

    #[tokio::test]
    async fn test_youtube_errors() {
        let app = create_router(state(ServerConfig::default()));
        let search = r#"{"action":"search","query":"q"}"#;
        let (status, body) = call(app, "POST", "/api/youtube", search).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "YouTube API key not configured");

        let app = create_router(state(keyed()));
        let (status, body) = call(app, "POST", "/api/youtube", r#"{"action":"download"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid action");

        let app = create_router(state(keyed()));
        let (status, body) = call(app, "POST", "/api/youtube", r#"{"action":"search"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request");

        let app = create_router(state(keyed()));
        let (status, body) = call(app, "GET", "/api/youtube?action=transcript", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "Transcript feature requires additional setup");
    }

    #[tokio::test]
    async fn test_youtube_relays_upstream() {
        let upstream = spawn(Router::new().route(
            "/search",
            get(|Query(params): Query<std::collections::HashMap<String, String>>| async move {
                if params.get("q").map(String::as_str) == Some("forbidden") {
                    return (
                        StatusCode::FORBIDDEN,
                        Json(json!({"error": {"code": 403, "message": "quota"}})),
                    );
                }
                (StatusCode::OK, Json(json!({"items": [], "maxResults": params.get("maxResults")})))
            }),
        ))
        .await;
        let config = ServerConfig {
            youtube_api_base: upstream,
            ..keyed()
        };

        let app = create_router(state(config.clone()));
        let (status, body) = call(
            app,
            "POST",
            "/api/youtube",
            r#"{"action":"search","query":"rust"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["maxResults"], "10");

        let app = create_router(state(config));
        let (status, body) = call(
            app,
            "POST",
            "/api/youtube",
            r#"{"action":"search","query":"forbidden"}"#,
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["message"], "quota");
    }
}
