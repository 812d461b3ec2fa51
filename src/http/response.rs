//! Non-relay responses: health report.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
    /// Origin currently receiving clone requests.
    pub backend_origin: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthStatus> {
    let target = state.upstream.load();
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        backend_origin: target.origin().to_string(),
    })
}
