//! Site relay (v1)
//!
//! Serves a small client page and a single relay endpoint that forwards
//! "clone this URL" requests to a backend service and streams its HTML back.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌───────────────────────────────────────────────┐
//!                      │                  SITE RELAY                   │
//!                      │                                               │
//!   Browser            │  ┌─────────┐     ┌──────────┐                 │
//!   ───── GET / ───────┼─▶│  http   │────▶│   page   │                 │
//!                      │  │ server  │     └──────────┘                 │
//!   ── POST /api/clone ┼─▶│         │     ┌──────────┐   POST /clone   │
//!                      │  │         │────▶│  relay   │─────────────────┼──▶ Backend
//!   ◀── streamed HTML ─┼──│         │◀────│ (stream) │◀────────────────┼─── Origin
//!                      │  └─────────┘     └──────────┘                 │
//!                      │                                               │
//!                      │  config (+ hot reload) · observability ·      │
//!                      │  lifecycle (startup, signals, shutdown)       │
//!                      └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use site_relay::lifecycle::{self, StartupOptions};

#[derive(Parser)]
#[command(name = "site-relay", version)]
#[command(about = "Client page and streaming relay to a site cloning backend", long_about = None)]
struct Cli {
    /// TOML configuration file (watched for backend changes).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:3000.
    #[arg(short, long)]
    bind: Option<String>,

    /// Base address of the cloning backend.
    #[arg(long, env = "RELAY_BACKEND_ORIGIN")]
    backend_origin: Option<String>,

    /// Log level when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let options = StartupOptions {
        config_path: cli.config,
        bind_address: cli.bind,
        backend_origin: cli.backend_origin,
        log_level: cli.log_level,
    };

    match lifecycle::run(options).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Logging may not be initialized yet.
            eprintln!("site-relay: {e}");
            ExitCode::FAILURE
        }
    }
}
