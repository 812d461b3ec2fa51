//! Relay errors and their HTTP mapping.

use std::error::Error as _;
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

/// Why a clone request could not be relayed.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Neither the JSON body nor the query string carried a `url`.
    #[error("Missing 'url' in JSON body or query string")]
    MissingUrl,

    /// The backend answered, but not with a success status.
    #[error("backend responded with {status}")]
    Backend { status: StatusCode, body: String },

    /// The backend could not be reached or failed before sending headers.
    #[error("{}", describe_transport(.0))]
    Transport(#[from] reqwest::Error),

    /// The backend accepted the connection but sent no headers in time.
    #[error("backend did not respond within {}s", .0.as_secs())]
    Timeout(Duration),
}

impl RelayError {
    /// Status code returned to the caller.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl => StatusCode::BAD_REQUEST,
            RelayError::Backend { status, .. } => *status,
            RelayError::Transport(_) | RelayError::Timeout(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Label used for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match self {
            RelayError::MissingUrl => "bad_request",
            RelayError::Backend { .. } => "backend_error",
            RelayError::Transport(_) => "transport_error",
            RelayError::Timeout(_) => "timeout",
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            RelayError::Backend { body, .. } => body,
            other => other.to_string(),
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}

/// Render a transport error with its cause chain, e.g.
/// `error sending request for url (...): client error (Connect): tcp connect error: Connection refused`.
fn describe_transport(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
