//! Embedded client page.
//!
//! A single document with inline CSS and script: URL form, sandboxed
//! preview frame fed incrementally from the streamed relay response, and a
//! debug transcript.

use axum::{
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Serve the client page.
pub async fn index() -> Response {
    (
        [
            (CONTENT_TYPE, "text/html; charset=utf-8"),
            (CACHE_CONTROL, "no-cache"),
        ],
        INDEX_HTML,
    )
        .into_response()
}
