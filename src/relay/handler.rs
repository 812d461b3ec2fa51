use std::time::Instant;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{
        header::{HeaderName, HeaderValue, CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap,
    },
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::relay::error::RelayError;
use crate::relay::{extract, stream, upstream};

const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";
const X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

/// Relay handler for `GET|POST /api/clone`.
pub async fn clone_relay(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&headers).to_string();

    match relay(&state, query.as_deref(), &body, &request_id).await {
        Ok(response) => {
            metrics::record_relay("streamed", response.status(), start_time);
            response
        }
        Err(err) => {
            match &err {
                RelayError::MissingUrl => {
                    tracing::warn!(request_id = %request_id, "Clone request without url");
                }
                RelayError::Backend { status, .. } => {
                    tracing::warn!(request_id = %request_id, status = %status, "Backend rejected clone request");
                }
                RelayError::Transport(e) => {
                    tracing::error!(request_id = %request_id, error = %e, "Backend unreachable");
                }
                RelayError::Timeout(limit) => {
                    tracing::error!(request_id = %request_id, limit = ?limit, "Backend sent no headers in time");
                }
            }
            metrics::record_relay(err.outcome(), err.status(), start_time);
            err.into_response()
        }
    }
}

async fn relay(
    state: &AppState,
    query: Option<&str>,
    body: &[u8],
    request_id: &str,
) -> Result<Response, RelayError> {
    let request = extract::clone_request(query, body)?;
    let target = state.upstream.load_full();

    tracing::info!(
        request_id = %request_id,
        url = %request.url,
        backend = %target.clone_url(),
        script_tags = request.injections.add_script_tag.len(),
        style_tags = request.injections.add_style_tag.len(),
        "Relaying clone request"
    );

    let response = tokio::time::timeout(
        state.response_timeout,
        upstream::send(&state.client, &target, &request, request_id),
    )
    .await
    .map_err(|_| RelayError::Timeout(state.response_timeout))??;
    let status = response.status();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_else(|e| {
            tracing::warn!(request_id = %request_id, error = %e, "Failed to read backend error body");
            format!("failed to read backend error body: {e}")
        });
        return Err(RelayError::Backend { status, body });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));

    tracing::debug!(request_id = %request_id, status = %status, "Streaming backend response");

    Ok((
        status,
        [
            (CONTENT_TYPE, content_type),
            (CACHE_CONTROL, HeaderValue::from_static("no-cache")),
            (X_ACCEL_BUFFERING, HeaderValue::from_static("no")),
        ],
        stream::relay_body(response, request_id.to_string()),
    )
        .into_response())
}
