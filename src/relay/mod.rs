//! Clone relay subsystem.
//!
//! # Data Flow
//! ```text
//! GET|POST /api/clone
//!     → extract.rs (url: JSON body first, then query string)
//!     → upstream.rs (one POST to <origin><clone_path>?url=...)
//!     → backend answers 2xx: stream.rs pipes the body through unbuffered
//!     → backend answers non-2xx: error.rs relays its status and body text
//!     → transport failure: error.rs answers 500 with the error message
//! ```
//!
//! # Design Decisions
//! - Stateless: nothing is cached or retried
//! - The backend target is read from an `ArcSwap` per request so config
//!   reloads take effect without restarting

pub mod error;
pub mod extract;
pub mod handler;
pub mod stream;
pub mod upstream;

pub use error::RelayError;
pub use extract::{clone_request, CloneRequest, Injections};
pub use handler::clone_relay;
pub use upstream::UpstreamTarget;
