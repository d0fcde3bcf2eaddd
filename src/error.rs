// src/error.rs
// Per-stage failure taxonomy. Every variant is non-fatal to a run: the
// orchestrator logs it and moves on to the next source/batch.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DigestError {
    /// Upstream answered but rejected the request (non-2xx or a non-"ok"
    /// payload code).
    #[error("upstream rejected request: {0}")]
    Upstream(String),

    /// Timeout or connection failure on the wire.
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),

    /// The bot API accepted the connection but reported failure.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Nothing to publish for this source (empty formatted batch).
    #[error("empty digest for source {0}")]
    EmptyDigest(String),
}

pub type DigestResult<T> = Result<T, DigestError>;
