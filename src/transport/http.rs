//! HTTP transport for the query gateway.
//!
//! Routes:
//! - `POST /query` with `Authorization: Bearer <token>` and body `{"query": "..."}`
//! - `GET /health`

use crate::auth::{extract_bearer_token, mask_token};
use crate::db::QueryExecutor;
use crate::error::{GatewayError, GatewayResult};
use crate::models::QueryRequest;
use crate::transport::Transport;
use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

/// HTTP transport implementation.
pub struct HttpTransport {
    executor: QueryExecutor,
    /// Host to bind to
    host: String,
    /// Port to bind to
    port: u16,
    /// Upper bound on draining in-flight requests after a shutdown signal
    graceful_timeout: Duration,
}

impl HttpTransport {
    pub fn new(
        executor: QueryExecutor,
        host: impl Into<String>,
        port: u16,
        graceful_timeout: Duration,
    ) -> Self {
        Self {
            executor,
            host: host.into(),
            port,
            graceful_timeout,
        }
    }

    /// Get the bind address.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> GatewayResult<()> {
        let bind_addr = self.bind_addr();
        info!("Starting query gateway on {}", bind_addr);

        let app = router(self.executor.clone());

        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            GatewayError::configuration(format!("Failed to bind to {}: {}", bind_addr, e))
        })?;

        // Use a notify to coordinate shutdown timing
        let shutdown_notify = Arc::new(tokio::sync::Notify::new());
        let shutdown_notify_clone = shutdown_notify.clone();

        let shutdown_signal = async move {
            wait_for_signal().await;
            shutdown_notify_clone.notify_one();
        };

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal);

        // Race between: server completing normally vs forced timeout/second signal after shutdown
        tokio::select! {
            result = server => {
                match result {
                    Ok(()) => info!("HTTP server stopped"),
                    Err(e) => {
                        error!(error = %e, "HTTP server error");
                        return Err(GatewayError::internal(format!("HTTP server error: {}", e)));
                    }
                }
            }
            _ = async {
                shutdown_notify.notified().await;
                info!(
                    timeout_secs = self.graceful_timeout.as_secs(),
                    "Waiting for in-flight queries to finish (send signal again to force exit)..."
                );

                tokio::select! {
                    _ = tokio::time::sleep(self.graceful_timeout) => {
                        warn!("Graceful shutdown timeout, forcing exit");
                    }
                    _ = wait_for_signal() => {
                        warn!("Received second signal, forcing immediate exit");
                    }
                }
            } => {}
        }

        info!("Closing backend connections");
        self.executor.connections().close_all().await;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }
}

// =============================================================================
// Routes
// =============================================================================

#[derive(Clone)]
struct AppState {
    executor: QueryExecutor,
}

/// Build the gateway router.
pub fn router(executor: QueryExecutor) -> Router {
    Router::new()
        .route("/query", post(query_handler))
        .route("/health", get(health_handler))
        .with_state(AppState { executor })
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn query_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<QueryRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("query", request_id = %request_id);

    async move {
        let token = match extract_bearer_token(&headers) {
            Ok(token) => token,
            Err(msg) => {
                warn!("Rejected request without usable bearer token");
                return unauthorized_response(msg);
            }
        };

        let request = match body {
            Ok(Json(request)) => request,
            Err(rejection) => {
                return GatewayError::invalid_input(rejection.body_text()).into_response();
            }
        };

        match state.executor.execute(token, &request.query).await {
            Ok(result) => Json(result).into_response(),
            Err(e) => {
                warn!(token = %mask_token(token), code = e.code(), error = %e, "Query failed");
                e.into_response()
            }
        }
    }
    .instrument(span)
    .await
}

// =============================================================================
// Error Responses
// =============================================================================

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    suggestion: Option<String>,
}

fn error_response(status: StatusCode, detail: ErrorDetail) -> Response {
    (status, Json(ErrorResponse { error: detail })).into_response()
}

fn unauthorized_response(message: &str) -> Response {
    let mut response = error_response(
        StatusCode::UNAUTHORIZED,
        ErrorDetail {
            code: "unauthorized",
            message: message.to_string(),
            suggestion: Some("Use the format: 'Authorization: Bearer <your-token>'".to_string()),
        },
    );
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        header::HeaderValue::from_static("Bearer"),
    );
    response
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        error_response(
            status,
            ErrorDetail {
                code: self.code(),
                message: self.to_string(),
                suggestion: self.suggestion().map(str::to_string),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{ConnectionManager, SqlxConnector};
    use crate::registry::BackendRegistry;
    use crate::tokens::TokenTable;
    use axum::http::HeaderValue;
    use serde_json::Value as JsonValue;

    fn state() -> AppState {
        let manager = ConnectionManager::new(
            SqlxConnector::default(),
            BackendRegistry::default(),
            Arc::new(TokenTable::default()),
        );
        AppState {
            executor: QueryExecutor::new(Arc::new(manager), Duration::from_secs(5)),
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    fn query(sql: &str) -> Result<Json<QueryRequest>, JsonRejection> {
        Ok(Json(QueryRequest {
            query: sql.to_string(),
        }))
    }

    async fn body_json(response: Response) -> JsonValue {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_http_transport_bind_addr() {
        let transport = HttpTransport::new(
            state().executor,
            "0.0.0.0",
            1999,
            Duration::from_secs(30),
        );
        assert_eq!(transport.name(), "http");
        assert_eq!(transport.bind_addr(), "0.0.0.0:1999");
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health_handler().await, "ok");
    }

    #[tokio::test]
    async fn test_missing_authorization_is_unauthorized() {
        let response = query_handler(State(state()), HeaderMap::new(), query("SELECT 1")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "unauthorized");
    }

    #[tokio::test]
    async fn test_unknown_token_is_unauthorized() {
        let response = query_handler(State(state()), bearer("nope"), query("SELECT 1")).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "invalid_token");
        assert!(body["error"].get("suggestion").is_some());
    }

    #[tokio::test]
    async fn test_gateway_error_body() {
        let response = GatewayError::unsupported_driver("oracle").into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "unsupported_driver");
        assert!(
            body["error"]["message"]
                .as_str()
                .unwrap()
                .contains("oracle")
        );
    }

    #[tokio::test]
    async fn test_timeout_maps_to_gateway_timeout() {
        let response = GatewayError::timeout("query execution", 30).into_response();
        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    }
}
