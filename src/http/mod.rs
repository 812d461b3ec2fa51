//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID assigned, or kept if the caller sent one)
//!     → GET /            → page.rs (client page)
//!     → GET /healthz     → response.rs (health report)
//!     → GET|POST /api/clone → relay subsystem
//!     → Send to client
//! ```

pub mod page;
pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::{AppState, RelayServer, ServerError, CLONE_PATH};
