//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the secret-path route
//! - Wire up middleware (tracing, timeout, request ID, loopback gate)
//! - Bind server to listener
//! - Hand requests to the config service off the async executor

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::middleware::loopback_only;
use crate::http::request::{self, UserPath, X_REQUEST_ID};
use crate::http::response::{ApiError, HeaderRuleError, ResponseHeaders};
use crate::service::{ConfigService, ServiceError};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ConfigService>,
    pub headers: Arc<ResponseHeaders>,
}

/// HTTP server for the subscription endpoint.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: AppConfig, service: Arc<ConfigService>) -> Result<Self, HeaderRuleError> {
        let state = AppState {
            service,
            headers: Arc::new(ResponseHeaders::from_config(&config.http)?),
        };
        let router = Self::build_router(&config, state);
        Ok(Self { router, config })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(config: &AppConfig, state: AppState) -> Router {
        let route = format!("/{}/{{*user_path}}", config.http.secret_path);

        Router::new()
            .route(&route, get(config_handler))
            .with_state(state)
            .layer(axum::middleware::from_fn(loopback_only))
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.listener.request_timeout_secs,
                    ))),
            )
    }

    /// Run the server until `shutdown` fires, then drain in-flight
    /// requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            secret_path_len = self.config.http.secret_path.len(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Render the configuration named by the path after the secret segment.
async fn config_handler(
    State(state): State<AppState>,
    Path(user_path): Path<String>,
    headers: HeaderMap,
) -> Response {
    let request_id = request::request_id(&headers).to_string();
    let user_agent = request::user_agent(&headers).to_string();

    let Some(UserPath {
        link_segment,
        format_token,
    }) = UserPath::parse(&user_path)
    else {
        tracing::warn!(request_id = %request_id, "Empty user path");
        return ApiError(ServiceError::NotFound(String::new())).into_response();
    };

    tracing::debug!(
        request_id = %request_id,
        user_agent = %user_agent,
        format = %format_token,
        "Config requested"
    );

    let service = Arc::clone(&state.service);
    let link = link_segment.clone();
    let result = tokio::task::spawn_blocking(move || service.get(&link, &format_token)).await;

    match result {
        Ok(Ok(rendered)) => {
            if let Some(fallback) = &rendered.template_fallback {
                tracing::warn!(
                    request_id = %request_id,
                    template = %fallback.requested,
                    reason = %fallback.reason,
                    "Served default template instead of custom one"
                );
            }
            state.headers.respond(rendered, &user_agent)
        }
        Ok(Err(err)) => {
            match &err {
                ServiceError::NotFound(_) | ServiceError::UnknownFormat(_) => {
                    tracing::info!(request_id = %request_id, link = %link_segment, error = %err, "Request rejected")
                }
                ServiceError::NoAccessibleServers => {
                    tracing::warn!(request_id = %request_id, link = %link_segment, error = %err, "Request rejected")
                }
                _ => tracing::error!(request_id = %request_id, link = %link_segment, error = %err, "Config build failed"),
            }
            ApiError(err).into_response()
        }
        Err(join_err) => {
            tracing::error!(request_id = %request_id, error = %join_err, "Config task failed");
            ApiError(ServiceError::BuildFailed {
                reason: join_err.to_string(),
                source: None,
            })
            .into_response()
        }
    }
}
