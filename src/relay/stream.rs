//! Streaming the backend body through to the caller.

use axum::body::{Body, Bytes};
use futures_util::StreamExt;

use crate::observability::metrics;

/// Wrap a successful backend response as an unbuffered response body.
///
/// Chunks are forwarded as reqwest yields them. A mid-stream failure ends the
/// body with an error, which aborts the client connection.
pub fn relay_body(upstream: reqwest::Response, request_id: String) -> Body {
    let mut tally = StreamTally::open(request_id);
    let stream = upstream.bytes_stream().map(move |chunk| {
        tally.observe(&chunk);
        chunk
    });
    Body::from_stream(stream)
}

/// Per-stream accounting; reports when the body is dropped, whether it
/// completed, failed, or the client went away.
struct StreamTally {
    request_id: String,
    chunks: u64,
    bytes: u64,
    failed: bool,
}

impl StreamTally {
    fn open(request_id: String) -> Self {
        metrics::stream_opened();
        Self {
            request_id,
            chunks: 0,
            bytes: 0,
            failed: false,
        }
    }

    fn observe(&mut self, chunk: &Result<Bytes, reqwest::Error>) {
        match chunk {
            Ok(bytes) => {
                self.chunks += 1;
                self.bytes += bytes.len() as u64;
                tracing::trace!(
                    request_id = %self.request_id,
                    chunk = self.chunks,
                    size = bytes.len(),
                    total = self.bytes,
                    "Relayed chunk"
                );
            }
            Err(e) => {
                self.failed = true;
                tracing::warn!(
                    request_id = %self.request_id,
                    error = %e,
                    bytes = self.bytes,
                    "Backend stream failed mid-response"
                );
            }
        }
    }
}

impl Drop for StreamTally {
    fn drop(&mut self) {
        metrics::stream_closed(self.bytes);
        tracing::debug!(
            request_id = %self.request_id,
            chunks = self.chunks,
            bytes = self.bytes,
            failed = self.failed,
            "Relay stream closed"
        );
    }
}
