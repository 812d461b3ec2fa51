//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, body limit)
//! - Bind server to listener
//! - Apply configuration updates to the backend target
//! - Stop on the shutdown signal, letting in-flight streams finish

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::Request,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::RelayConfig;
use crate::http::request::{request_id, UuidRequestId, X_REQUEST_ID};
use crate::http::{page, response};
use crate::relay::upstream::{self, InvalidTarget, UpstreamTarget};
use crate::relay::clone_relay;

/// Path of the relay endpoint.
pub const CLONE_PATH: &str = "/api/clone";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Current backend target; replaced on config reload.
    pub upstream: Arc<ArcSwap<UpstreamTarget>>,
    pub client: reqwest::Client,
    /// Time allowed until the backend sends response headers.
    pub response_timeout: Duration,
}

/// Error building the server from a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("failed to build backend client: {0}")]
    Client(#[from] reqwest::Error),
    #[error(transparent)]
    Target(#[from] InvalidTarget),
}

/// HTTP server for the relay.
pub struct RelayServer {
    router: Router,
    config: RelayConfig,
    state: AppState,
}

impl RelayServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let target = UpstreamTarget::from_config(&config.backend)?;
        let client = upstream::build_client(&config)?;

        tracing::info!(backend = %target.clone_url(), "Backend target configured");

        let state = AppState {
            upstream: Arc::new(ArcSwap::from_pointee(target)),
            client,
            response_timeout: Duration::from_secs(config.timeouts.response_secs),
        };

        let router = Self::build_router(&config, state.clone());
        Ok(Self {
            router,
            config,
            state,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        Router::new()
            .route("/", get(page::index))
            .route("/healthz", get(response::health))
            .route(CLONE_PATH, get(clone_relay).post(clone_relay))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(request_span))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, UuidRequestId))
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reloader = tokio::spawn(apply_config_updates(
            self.state.upstream.clone(),
            self.config.clone(),
            config_updates,
        ));

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

fn request_span(request: &Request<Body>) -> tracing::Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id(request.headers()),
    )
}

/// Swap in the backend target of every valid config update.
async fn apply_config_updates(
    upstream: Arc<ArcSwap<UpstreamTarget>>,
    mut current: RelayConfig,
    mut updates: mpsc::UnboundedReceiver<RelayConfig>,
) {
    while let Some(next) = updates.recv().await {
        match UpstreamTarget::from_config(&next.backend) {
            Ok(target) => {
                tracing::info!(backend = %target.clone_url(), "Backend target updated");
                upstream.store(Arc::new(target));
            }
            Err(e) => {
                tracing::error!(error = %e, "Ignoring config update");
                continue;
            }
        }

        if requires_restart(&current, &next) {
            tracing::warn!("Only [backend] origin and clone_path apply live; restart to apply other changes");
        }
        current = next;
    }
}

fn requires_restart(current: &RelayConfig, next: &RelayConfig) -> bool {
    current.listener != next.listener
        || current.timeouts != next.timeouts
        || current.limits != next.limits
        || current.observability != next.observability
        || current.backend.use_system_proxy != next.backend.use_system_proxy
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{header::CONTENT_TYPE, StatusCode};
    use tower::ServiceExt;

    fn server() -> RelayServer {
        RelayServer::new(RelayConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn serves_page_with_request_id() {
        let response = server()
            .router()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn caller_request_id_is_echoed() {
        let response = server()
            .router()
            .oneshot(
                Request::get("/healthz")
                    .header(X_REQUEST_ID, "trace-me")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[X_REQUEST_ID], "trace-me");

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["backend_origin"], "http://127.0.0.1:8000/");
    }

    #[tokio::test]
    async fn missing_url_is_rejected_before_any_backend_call() {
        let response = server()
            .router()
            .oneshot(
                Request::post(CLONE_PATH)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let mut config = RelayConfig::default();
        config.limits.max_body_size = 16;
        let router = RelayServer::new(config).unwrap().router();

        let body = format!(r#"{{"url":"https://example.com/{}"}}"#, "a".repeat(64));
        let response = router
            .oneshot(
                Request::post(CLONE_PATH)
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn config_updates_swap_backend_target() {
        let upstream = Arc::new(ArcSwap::from_pointee(
            UpstreamTarget::from_config(&RelayConfig::default().backend).unwrap(),
        ));
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(apply_config_updates(
            upstream.clone(),
            RelayConfig::default(),
            rx,
        ));

        let mut invalid = RelayConfig::default();
        invalid.backend.origin = "not a url".into();
        tx.send(invalid).unwrap();

        let mut next = RelayConfig::default();
        next.backend.origin = "http://10.0.0.5:9000".into();
        tx.send(next).unwrap();
        drop(tx);
        task.await.unwrap();

        assert_eq!(
            upstream.load().clone_url().as_str(),
            "http://10.0.0.5:9000/clone"
        );
    }

    #[test]
    fn restart_detection_ignores_live_backend_fields() {
        let current = RelayConfig::default();
        let mut next = current.clone();
        next.backend.origin = "http://elsewhere:1".into();
        next.backend.clone_path = "/other".into();
        assert!(!requires_restart(&current, &next));

        next.timeouts.connect_secs = 1;
        assert!(requires_restart(&current, &next));
    }
}
