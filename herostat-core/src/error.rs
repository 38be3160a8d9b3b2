//! Error types for the herostat engine.
//!
//! The variants follow the failure taxonomy of the aggregation engine:
//! ordering violations are fatal for a single event, counter underflow is only
//! an error under the `reject` clamp policy, and storage conflicts are
//! transient and retried from scratch.

use thiserror::Error;

use crate::entity::RecordKind;
use crate::types::EventId;

/// Top-level error type for all herostat operations.
#[derive(Error, Debug)]
pub enum HerostatError {
    /// A record the event requires does not exist (upstream ordering bug).
    #[error("Missing {kind} record {id:?} required by event {event}")]
    MissingEntity {
        /// Record family.
        kind: RecordKind,
        /// Record identifier.
        id: String,
        /// Event being applied.
        event: EventId,
    },

    /// A decrement would take an unsigned counter below zero and the clamp
    /// policy is `reject`.
    #[error("Counter underflow on {field}: {current} - {requested}")]
    CounterUnderflow {
        /// Dotted field path, e.g. `global.active_heroes`.
        field: &'static str,
        /// Value before the decrement.
        current: u128,
        /// Requested decrement.
        requested: u128,
    },

    /// A raw rarity outside `0..7`.
    #[error("Invalid rarity: {0}")]
    InvalidRarity(u8),

    /// A raw zone outside `0..4`.
    #[error("Invalid zone: {0}")]
    InvalidZone(u8),

    /// A record changed between read and commit.
    #[error("Write conflict on {kind} record {id:?}")]
    Conflict {
        /// Record family.
        kind: RecordKind,
        /// Record identifier.
        id: String,
    },

    /// Every attempt to apply an event failed transiently.
    #[error("Event {event} failed after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Event that could not be applied.
        event: EventId,
        /// Attempts made.
        attempts: u32,
        /// Last transient error.
        last_error: String,
    },

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HerostatError {
    /// Whether re-running the event from prefetch may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Conflict { .. } => true,
            Self::Database(rusqlite::Error::SqliteFailure(err, _)) => matches!(
                err.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    /// Whether this is an ordering violation (a required record is missing,
    /// or a counter underflowed under the `reject` policy).
    #[must_use]
    pub fn is_ordering_violation(&self) -> bool {
        matches!(
            self,
            Self::MissingEntity { .. } | Self::CounterUnderflow { .. }
        )
    }
}

impl From<serde_json::Error> for HerostatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, HerostatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_is_transient() {
        let err = HerostatError::Conflict {
            kind: RecordKind::Hero,
            id: "1".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_ordering_violation());
    }

    #[test]
    fn busy_database_is_transient() {
        let err = HerostatError::Database(rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn missing_entity_is_ordering_violation() {
        let err = HerostatError::MissingEntity {
            kind: RecordKind::Hero,
            id: "7".into(),
            event: EventId::new(1, 10, 0),
        };
        assert!(err.is_ordering_violation());
        assert!(!err.is_transient());
        assert!(err.to_string().contains("hero"));
    }
}
