// src/infra/errors.rs — Error types for Foresight

use thiserror::Error;

/// Errors surfaced by adapters, configuration, and runtime wiring.
///
/// The engine's recording and query operations never return these; storage
/// failures are logged at the persistence boundary instead.
#[derive(Error, Debug)]
pub enum ForesightError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt stored record '{id}': {message}")]
    CorruptRecord { id: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No tokio runtime available to run the learning loop")]
    NoRuntime,

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForesightError {
    /// Whether retrying the same storage call could plausibly succeed.
    /// Drives the retry loop at the engine's persistence boundary.
    pub fn is_transient(&self) -> bool {
        match self {
            ForesightError::Database(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            ForesightError::Io(_) => true,
            _ => false,
        }
    }
}
