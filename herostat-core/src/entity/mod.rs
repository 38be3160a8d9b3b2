//! Entity records and their factories.
//!
//! Every record type persisted by the engine implements [`Record`]. Records
//! that may be created on first reference also implement [`Factory`], whose
//! `with_defaults` returns a fully-populated zero record so every code path
//! that first observes an entity produces the same starting state.

pub mod hero;
pub mod player;
pub mod request;
pub mod weapon;

pub use hero::Hero;
pub use player::Player;
pub use request::{RequestKind, WeaponRequest};
pub use weapon::Weapon;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::EventId;

/// The record families held by the entity store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// [`Player`].
    Player,
    /// [`Hero`].
    Hero,
    /// [`Weapon`].
    Weapon,
    /// [`WeaponRequest`].
    Request,
    /// [`crate::stats::GlobalStats`].
    GlobalStats,
    /// [`crate::stats::UserStats`].
    UserStats,
    /// [`crate::stats::ZoneStats`].
    ZoneStats,
    /// [`crate::stats::LevelStats`].
    LevelStats,
    /// [`crate::audit::AuditRecord`].
    Audit,
    /// [`AppliedEvent`].
    AppliedEvent,
}

impl RecordKind {
    /// Every kind, in storage order.
    pub const ALL: [Self; 10] = [
        Self::Player,
        Self::Hero,
        Self::Weapon,
        Self::Request,
        Self::GlobalStats,
        Self::UserStats,
        Self::ZoneStats,
        Self::LevelStats,
        Self::Audit,
        Self::AppliedEvent,
    ];

    /// Stable name used as the storage namespace.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::Hero => "hero",
            Self::Weapon => "weapon",
            Self::Request => "request",
            Self::GlobalStats => "global_stats",
            Self::UserStats => "user_stats",
            Self::ZoneStats => "zone_stats",
            Self::LevelStats => "level_stats",
            Self::Audit => "audit",
            Self::AppliedEvent => "applied_event",
        }
    }

    /// Parse a storage namespace.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of a record in the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordKey {
    /// Record family.
    pub kind: RecordKind,
    /// Identifier within the family.
    pub id: String,
}

impl RecordKey {
    /// Build a key.
    #[must_use]
    pub fn new(kind: RecordKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// A value persisted in the entity store.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + 'static {
    /// Family this record belongs to.
    const KIND: RecordKind;

    /// Identifier within the family.
    fn id(&self) -> String;

    /// Full store key.
    fn record_key(&self) -> RecordKey {
        RecordKey::new(Self::KIND, self.id())
    }
}

/// A record that can be synthesised with zero values on first reference.
pub trait Factory: Record {
    /// A fully-populated zero record for `id`.
    fn with_defaults(id: &str) -> Self;
}

/// Marker written alongside an event's effects so redelivery is a no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedEvent {
    /// The event that was committed.
    pub event: EventId,
    /// Block timestamp of the event.
    pub timestamp: u64,
}

impl Record for AppliedEvent {
    const KIND: RecordKind = RecordKind::AppliedEvent;

    fn id(&self) -> String {
        self.event.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names_round_trip() {
        for kind in RecordKind::ALL {
            assert_eq!(RecordKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(RecordKind::parse("nope"), None);
    }

    #[test]
    fn applied_event_keyed_by_event_id() {
        let marker = AppliedEvent {
            event: EventId::new(1, 2, 3),
            timestamp: 10,
        };
        assert_eq!(marker.record_key().to_string(), "applied_event/1-2-3");
    }
}
