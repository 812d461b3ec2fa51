//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use site_relay::config::RelayConfig;
use site_relay::http::RelayServer;
use site_relay::lifecycle::Shutdown;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// Serve `router` as a mock backend on an ephemeral port.
pub async fn start_mock_backend(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub fn closed_port() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// A running relay.
pub struct RelayHandle {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    #[allow(dead_code)]
    pub config_updates: mpsc::UnboundedSender<RelayConfig>,
}

impl RelayHandle {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a relay forwarding to `backend_origin`.
pub async fn start_relay(backend_origin: &str) -> RelayHandle {
    start_relay_with(relay_config(backend_origin)).await
}

/// Default test configuration forwarding to `backend_origin`.
pub fn relay_config(backend_origin: &str) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.backend.origin = backend_origin.to_string();
    config.timeouts.connect_secs = 2;
    config
}

/// Start a relay with a fully specified configuration.
pub async fn start_relay_with(config: RelayConfig) -> RelayHandle {
    let server = RelayServer::new(config).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    // Listener is already bound; give the accept loop a moment.
    tokio::time::sleep(Duration::from_millis(50)).await;

    RelayHandle {
        addr,
        shutdown,
        config_updates,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}
