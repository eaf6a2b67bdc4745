//! Error taxonomy
//!
//! Kinds, not type names: every failure mode the core can produce maps to
//! one of these variants, matching the taxonomy in the design document.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    /// A referenced id does not exist. Never retried.
    #[error("not found: {kind} {id}")]
    NotFound { kind: &'static str, id: Uuid },

    /// Two writers raced on an invariant (e.g. a second active goal).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An operation attempted to break an invariant (e.g. archive a pinned chunk).
    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    /// IO/lock failure in the store. Caller retries with backoff.
    #[error("transient store error: {0}")]
    TransientStoreError(String),

    /// The executor returned malformed output or timed out.
    #[error("executor failure: {0}")]
    ExecutorFailure(String),

    /// A chunk was stored without an embedding; retrievable lexically/graph-wise only.
    #[error("embedding failure: {0}")]
    EmbeddingFailure(String),

    /// Archive exists but the live row is missing, or a checksum mismatch was found.
    #[error("corruption detected: {0}")]
    Corruption(String),
}

impl Error {
    pub fn not_found(kind: &'static str, id: Uuid) -> Self {
        Error::NotFound { kind, id }
    }

    /// One-line reason suitable for the activity log, per spec §7.
    pub fn activity_reason(&self) -> String {
        self.to_string()
    }

    /// Whether this error is worth retrying with backoff within the same cycle.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientStoreError(_))
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(ref sqlite_err, _)
                if sqlite_err.code == rusqlite::ErrorCode::DatabaseBusy
                    || sqlite_err.code == rusqlite::ErrorCode::DatabaseLocked =>
            {
                Error::TransientStoreError(e.to_string())
            }
            rusqlite::Error::QueryReturnedNoRows => {
                Error::NotFound { kind: "row", id: Uuid::nil() }
            }
            other => Error::Corruption(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::TransientStoreError(format!("blocking task join failed: {e}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Corruption(format!("serialization error: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Retry a store operation with bounded exponential backoff on transient errors.
pub async fn with_retry<T, F, Fut>(mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut delay_ms: u64 = 20;
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt < 2 => {
                attempt += 1;
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                delay_ms *= 2;
            }
            Err(e) => return Err(e),
        }
    }
}
