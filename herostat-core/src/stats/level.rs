//! Per-level aggregates, including the level × rarity layer.

use serde::{Deserialize, Serialize};

use crate::entity::{Factory, Record, RecordKind};
use crate::tally::Tally;
use crate::types::RARITY_BUCKETS;

/// Counters for heroes at one level, keyed by the level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    /// Level in decimal.
    pub id: String,
    /// Owned heroes at this level.
    pub heroes: u32,
    /// Sum of their damage.
    pub total_damage: u64,
    /// Sum of their daily reward (wei).
    pub total_daily_reward: u128,
    /// Equipped weapons by rarity.
    pub equipped_by_rarity: Tally<u32>,
    /// Damage contributed by heroes wielding each rarity.
    pub damage_by_rarity: Tally<u64>,
}

impl LevelStats {
    /// Store id for `level`.
    #[must_use]
    pub fn key(level: u8) -> String {
        level.to_string()
    }

    /// Zero stats for the record stored under `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            heroes: 0,
            total_damage: 0,
            total_daily_reward: 0,
            equipped_by_rarity: Tally::flat(RARITY_BUCKETS),
            damage_by_rarity: Tally::flat(RARITY_BUCKETS),
        }
    }
}

impl Record for LevelStats {
    const KIND: RecordKind = RecordKind::LevelStats;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl Factory for LevelStats {
    fn with_defaults(id: &str) -> Self {
        Self::new(id)
    }
}
