//! Per-zone aggregates.

use serde::{Deserialize, Serialize};

use crate::entity::{Factory, Record, RecordKind};
use crate::tally::Tally;
use crate::types::{LEVEL_BUCKETS, REWARD_ITEM_BUCKETS, Zone};

/// Counters for one staking zone, keyed by the zone index.
///
/// Each scalar mirrors the matching cell of the global zone arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneStats {
    /// Zone index in decimal.
    pub id: String,
    /// Heroes staked here and alive.
    pub active_heroes: u32,
    /// Active heroes by level.
    pub active_by_level: Tally<u32>,
    /// Heroes that died here.
    pub dead_heroes: u32,
    /// Dead heroes by death level.
    pub dead_by_level: Tally<u32>,
    /// Lifetime stakes into this zone.
    pub total_stakes: u64,
    /// Lifetime stakes by hero level at stake time.
    pub stakes_by_level: Tally<u64>,
    /// Completed sessions.
    pub completed_sessions: u64,
    /// Rewards paid out here (wei).
    pub rewards_amount: u128,
    /// Reward items paid out here, by item bucket.
    pub reward_items: Tally<u64>,
}

impl ZoneStats {
    /// Store id for `zone`.
    #[must_use]
    pub fn key(zone: Zone) -> String {
        zone.to_string()
    }

    /// Zero stats for the record stored under `id`.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active_heroes: 0,
            active_by_level: Tally::flat(LEVEL_BUCKETS),
            dead_heroes: 0,
            dead_by_level: Tally::flat(LEVEL_BUCKETS),
            total_stakes: 0,
            stakes_by_level: Tally::flat(LEVEL_BUCKETS),
            completed_sessions: 0,
            rewards_amount: 0,
            reward_items: Tally::flat(REWARD_ITEM_BUCKETS),
        }
    }

    /// Distribution-vs-scalar violations, if any.
    #[must_use]
    pub fn distribution_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.active_by_level.sum() != self.active_heroes {
            out.push(format!("zone {}: active_by_level != active_heroes", self.id));
        }
        if self.dead_by_level.sum() != self.dead_heroes {
            out.push(format!("zone {}: dead_by_level != dead_heroes", self.id));
        }
        if self.stakes_by_level.sum() != self.total_stakes {
            out.push(format!("zone {}: stakes_by_level != total_stakes", self.id));
        }
        out
    }
}

impl Record for ZoneStats {
    const KIND: RecordKind = RecordKind::ZoneStats;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl Factory for ZoneStats {
    fn with_defaults(id: &str) -> Self {
        Self::new(id)
    }
}
