//! Outbound call to the backend origin.
//!
//! # Responsibilities
//! - Resolve the clone endpoint from the configured origin
//! - Build the HTTP client (timeouts, proxy policy)
//! - Issue exactly one POST per clone request
//!
//! # Design Decisions
//! - No retries: the backend call is expensive and not idempotent
//! - The target URL travels in the query string, injections in the JSON body
//! - The response is returned unread so the caller can stream it

use std::time::Duration;

use axum::http::header::{HeaderValue, ACCEPT};
use url::Url;

use crate::config::{BackendConfig, RelayConfig};
use crate::config::validation::validate_origin;
use crate::http::request::X_REQUEST_ID;
use crate::relay::extract::CloneRequest;

/// The backend section of a config could not be turned into a target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid backend target: {0}")]
pub struct InvalidTarget(String);

/// Resolved backend endpoint. Swapped atomically on config reload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    origin: Url,
    clone_url: Url,
}

impl UpstreamTarget {
    pub fn from_config(config: &BackendConfig) -> Result<Self, InvalidTarget> {
        let origin = validate_origin(&config.origin).map_err(InvalidTarget)?;
        let clone_url = origin
            .join(&config.clone_path)
            .map_err(|e| InvalidTarget(format!("clone_path '{}': {}", config.clone_path, e)))?;
        Ok(Self { origin, clone_url })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn clone_url(&self) -> &Url {
        &self.clone_url
    }

    /// Clone endpoint with the target page as the `url` query parameter.
    pub fn request_url(&self, target: &str) -> Url {
        let mut url = self.clone_url.clone();
        url.query_pairs_mut().append_pair("url", target);
        url
    }
}

/// Build the shared outbound client.
pub fn build_client(config: &RelayConfig) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
        .user_agent(concat!("site-relay/", env!("CARGO_PKG_VERSION")));
    if !config.backend.use_system_proxy {
        builder = builder.no_proxy();
    }
    builder.build()
}

/// Forward one clone request. Non-success statuses are returned as `Ok`;
/// only transport failures are errors.
pub async fn send(
    client: &reqwest::Client,
    target: &UpstreamTarget,
    request: &CloneRequest,
    request_id: &str,
) -> Result<reqwest::Response, reqwest::Error> {
    let mut outbound = client
        .post(target.request_url(&request.url))
        .header(ACCEPT, HeaderValue::from_static("text/html"));

    if let Ok(value) = HeaderValue::from_str(request_id) {
        outbound = outbound.header(X_REQUEST_ID, value);
    }
    if !request.injections.is_empty() {
        outbound = outbound.json(&request.injections);
    }

    outbound.send().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(origin: &str, clone_path: &str) -> BackendConfig {
        BackendConfig {
            origin: origin.into(),
            clone_path: clone_path.into(),
            use_system_proxy: false,
        }
    }

    #[test]
    fn clone_path_is_resolved_from_origin_root() {
        let target = UpstreamTarget::from_config(&backend("http://127.0.0.1:8000", "/clone")).unwrap();
        assert_eq!(target.clone_url().as_str(), "http://127.0.0.1:8000/clone");

        let target =
            UpstreamTarget::from_config(&backend("https://cloner.example/", "/api/v2/clone")).unwrap();
        assert_eq!(target.clone_url().as_str(), "https://cloner.example/api/v2/clone");
        assert_eq!(target.origin().as_str(), "https://cloner.example/");
    }

    #[test]
    fn origin_with_path_is_rejected() {
        let err = UpstreamTarget::from_config(&backend("https://cloner.example/api/", "/clone"))
            .unwrap_err();
        assert!(err.to_string().contains("backend.clone_path"), "{err}");
    }

    #[test]
    fn target_url_is_query_encoded() {
        let target = UpstreamTarget::from_config(&BackendConfig::default()).unwrap();
        let url = target.request_url("https://example.com/a b?x=1&y=2");
        assert_eq!(
            url.as_str(),
            "http://127.0.0.1:8000/clone?url=https%3A%2F%2Fexample.com%2Fa+b%3Fx%3D1%26y%3D2"
        );
        let (key, value) = url.query_pairs().next().unwrap();
        assert_eq!(key, "url");
        assert_eq!(value, "https://example.com/a b?x=1&y=2");
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let err = UpstreamTarget::from_config(&backend("cloner:8000", "/clone")).unwrap_err();
        assert!(err.to_string().starts_with("invalid backend target"));
    }
}
