//! Error types for the indexer.

use herostat_core::HerostatError;
use thiserror::Error;

/// Errors raised while feeding events to the engine.
#[derive(Error, Debug)]
pub enum IndexerError {
    /// The engine refused an event for a reason other than ordering.
    #[error(transparent)]
    Engine(#[from] HerostatError),

    /// A source line is not a valid event envelope.
    #[error("Malformed event on line {line}: {source}")]
    Decode {
        /// 1-based line number.
        line: usize,
        /// Underlying parse error.
        source: serde_json::Error,
    },

    /// Reading the source failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking worker panicked or was cancelled.
    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// The tracing subscriber could not be installed.
    #[error("Telemetry error: {0}")]
    Telemetry(String),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, IndexerError>;
