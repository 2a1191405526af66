//! Error types shared across the store, the remote client and the sync engine.

use std::path::PathBuf;
use thiserror::Error;

/// Local persistence failure. Never swallowed inside the store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to prepare data directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("database lock poisoned")]
    Lock,
}

/// Failure talking to the remote catalog API.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connect, timeout, TLS or request-building failures.
    #[error("{0}")]
    Transport(String),

    /// Non-2xx status. The body is kept for diagnostics only.
    #[error("remote rejected request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid response from catalog API: {0}")]
    InvalidResponse(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to create HTTP client: {0}")]
    Build(String),
}

impl RemoteError {
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Failure that aborts a whole sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("remote: {0}")]
    Remote(#[from] RemoteError),

    #[error("store: {0}")]
    Store(#[from] StoreError),

    #[error("a sync cycle is already running")]
    AlreadyRunning,
}

/// Image storage and JSON export/import failures.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("cart is empty")]
    EmptyCart,

    #[error("store: {0}")]
    Store(#[from] StoreError),
}
