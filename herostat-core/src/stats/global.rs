//! The singleton global aggregate.

use serde::{Deserialize, Serialize};

use super::{Activity, Economy, Holdings};
use crate::entity::{Factory, Record, RecordKind};
use crate::tally::Tally;
use crate::types::LEVEL_BUCKETS;

/// Whole-game totals, stored under the constant id [`GlobalStats::ID`].
///
/// `holdings` and `economy` equal the field-wise sum over every
/// [`crate::entity::Player`]; `activity` equals the sum over every
/// [`super::UserStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Always [`GlobalStats::ID`].
    pub id: String,
    /// Distinct players seen.
    pub total_players: u64,
    /// Heroes minted over the lifetime of the game.
    pub heroes_minted: u64,
    /// Heroes burned.
    pub heroes_burned: u64,
    /// Weapons minted.
    pub weapons_minted: u64,
    /// Weapons burned.
    pub weapons_burned: u64,
    /// Sum of every player's holdings.
    pub holdings: Holdings,
    /// Sum of every player's economy.
    pub economy: Economy,
    /// Sum of every user's activity.
    pub activity: Activity,
    /// Active heroes by level, across zones.
    pub active_by_level: Tally<u32>,
    /// Dead heroes by death level, across zones.
    pub dead_by_level: Tally<u32>,
}

impl GlobalStats {
    /// Store id of the singleton.
    pub const ID: &'static str = "global";

    /// A zero global record.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Self::ID.to_string(),
            total_players: 0,
            heroes_minted: 0,
            heroes_burned: 0,
            weapons_minted: 0,
            weapons_burned: 0,
            holdings: Holdings::new(),
            economy: Economy::default(),
            activity: Activity::new(),
            active_by_level: Tally::flat(LEVEL_BUCKETS),
            dead_by_level: Tally::flat(LEVEL_BUCKETS),
        }
    }

    /// Distribution-vs-scalar violations of the global record.
    #[must_use]
    pub fn distribution_violations(&self) -> Vec<String> {
        let mut out = self.holdings.distribution_violations("global.holdings");
        out.extend(self.activity.distribution_violations("global.activity"));
        if self.active_by_level.sum() != self.activity.active_heroes {
            out.push(format!(
                "global: active_by_level sums to {} but active_heroes is {}",
                self.active_by_level.sum(),
                self.activity.active_heroes
            ));
        }
        if self.dead_by_level.sum() != self.activity.dead_heroes {
            out.push(format!(
                "global: dead_by_level sums to {} but dead_heroes is {}",
                self.dead_by_level.sum(),
                self.activity.dead_heroes
            ));
        }
        out
    }
}

impl Default for GlobalStats {
    fn default() -> Self {
        Self::new()
    }
}

impl Record for GlobalStats {
    const KIND: RecordKind = RecordKind::GlobalStats;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl Factory for GlobalStats {
    fn with_defaults(_id: &str) -> Self {
        Self::new()
    }
}
