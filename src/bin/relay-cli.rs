use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Terminal client for the site relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clone a page and stream the generated HTML
    Clone {
        /// Page to clone
        target: String,

        /// Write the HTML to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Suppress the per-chunk debug log on stderr
        #[arg(short, long)]
        quiet: bool,
    },
    /// Check relay health
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Clone { target, out, quiet } => {
            let res = client
                .post(format!("{}/api/clone", base))
                .json(&serde_json::json!({ "url": target }))
                .send()
                .await?;

            if !res.status().is_success() {
                report_error(res).await;
                return Ok(ExitCode::FAILURE);
            }

            let log = Transcript { quiet };
            log.line(&format!(
                "HTTP {} (request id {})",
                res.status(),
                res.headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("n/a")
            ));

            match out {
                Some(path) => {
                    let mut file = tokio::fs::File::create(&path).await?;
                    stream_to(res, &mut file, &log).await?;
                    log.line(&format!("Wrote {}", path.display()));
                }
                None => {
                    let mut stdout = tokio::io::stdout();
                    stream_to(res, &mut stdout, &log).await?;
                }
            }
        }
        Commands::Health => {
            let res = client.get(format!("{}/healthz", base)).send().await?;
            if !res.status().is_success() {
                report_error(res).await;
                return Ok(ExitCode::FAILURE);
            }
            let json: Value = res.json().await?;
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Debug transcript on stderr.
struct Transcript {
    quiet: bool,
}

impl Transcript {
    fn line(&self, message: &str) {
        if !self.quiet {
            eprintln!("[relay-cli] {}", message);
        }
    }
}

async fn stream_to<W>(
    res: reqwest::Response,
    out: &mut W,
    log: &Transcript,
) -> Result<(), Box<dyn std::error::Error>>
where
    W: AsyncWrite + Unpin,
{
    let started = Instant::now();
    let mut chunks = 0u64;
    let mut total = 0usize;
    let mut stream = res.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        chunks += 1;
        total += chunk.len();
        out.write_all(&chunk).await?;
        out.flush().await?;
        log.line(&format!("chunk #{}: {} bytes (total {})", chunks, chunk.len(), total));
    }

    log.line(&format!(
        "Done: {} chunks, {} bytes in {:.2}s",
        chunks,
        total,
        started.elapsed().as_secs_f64()
    ));
    Ok(())
}

async fn report_error(res: reqwest::Response) {
    eprintln!("Error: relay returned status {}", res.status());
    if let Ok(text) = res.text().await {
        if !text.is_empty() {
            eprintln!("Response: {}", text);
        }
    }
}
