//! Aggregate statistics records.
//!
//! Aggregates are pure derived state. The same sub-structures are embedded at
//! every tier that mirrors them, so "sum of the per-user records equals the
//! global record" is a field-by-field comparison of identical types:
//!
//! - [`Holdings`]: in [`crate::entity::Player`] and [`GlobalStats`]
//! - [`Economy`]: in [`crate::entity::Player`] and [`GlobalStats`]
//! - [`Activity`]: in [`UserStats`] and [`GlobalStats`]
//!
//! [`ZoneStats`] and [`LevelStats`] slice the global record by zone and level.

pub mod global;
pub mod level;
pub mod user;
pub mod zone;

pub use global::GlobalStats;
pub use level::LevelStats;
pub use user::UserStats;
pub use zone::ZoneStats;

use serde::{Deserialize, Serialize};

use crate::tally::Tally;
use crate::types::{
    LEVEL_BUCKETS, RARITY_BUCKETS, REMIX_OUTCOMES, REMIX_TYPES, REWARD_ITEM_BUCKETS, ZONE_COUNT,
};

/// Heroes and weapons attributed to an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holdings {
    /// Heroes owned.
    pub hero_count: u32,
    /// Heroes owned, by level.
    pub heroes_by_level: Tally<u32>,
    /// Heroes revealed (staked at least once).
    pub revealed_heroes: u32,
    /// Heroes currently staked.
    pub heroes_staked: u32,
    /// Free (unequipped) weapons.
    pub weapon_count: u32,
    /// Free weapons whose rarity is not known yet.
    pub unrevealed_weapons: u32,
    /// Free weapons by rarity.
    pub weapons_by_rarity: Tally<u32>,
    /// Weapons equipped on owned heroes.
    pub equipped_weapons: u32,
    /// Equipped weapons by rarity.
    pub equipped_by_rarity: Tally<u32>,
    /// Sum of hero damage.
    pub total_damage: u64,
    /// Sum of hero daily reward (wei).
    pub total_daily_reward: u128,
    /// Sum of hero hourly reward (wei).
    pub total_hourly_reward: u128,
}

impl Holdings {
    /// Zero holdings with every distribution sized.
    #[must_use]
    pub fn new() -> Self {
        Self {
            hero_count: 0,
            heroes_by_level: Tally::flat(LEVEL_BUCKETS),
            revealed_heroes: 0,
            heroes_staked: 0,
            weapon_count: 0,
            unrevealed_weapons: 0,
            weapons_by_rarity: Tally::flat(RARITY_BUCKETS),
            equipped_weapons: 0,
            equipped_by_rarity: Tally::flat(RARITY_BUCKETS),
            total_damage: 0,
            total_daily_reward: 0,
            total_hourly_reward: 0,
        }
    }

    /// Accumulate another owner's holdings into this one.
    pub fn accumulate(&mut self, other: &Self) {
        self.hero_count += other.hero_count;
        self.heroes_by_level.accumulate(&other.heroes_by_level);
        self.revealed_heroes += other.revealed_heroes;
        self.heroes_staked += other.heroes_staked;
        self.weapon_count += other.weapon_count;
        self.unrevealed_weapons += other.unrevealed_weapons;
        self.weapons_by_rarity.accumulate(&other.weapons_by_rarity);
        self.equipped_weapons += other.equipped_weapons;
        self.equipped_by_rarity.accumulate(&other.equipped_by_rarity);
        self.total_damage += other.total_damage;
        self.total_daily_reward += other.total_daily_reward;
        self.total_hourly_reward += other.total_hourly_reward;
    }

    /// Distribution-vs-scalar violations, prefixed with `scope`.
    #[must_use]
    pub fn distribution_violations(&self, scope: &str) -> Vec<String> {
        let mut out = Vec::new();
        if self.heroes_by_level.sum() != self.hero_count {
            out.push(format!(
                "{scope}: heroes_by_level sums to {} but hero_count is {}",
                self.heroes_by_level.sum(),
                self.hero_count
            ));
        }
        if self.weapons_by_rarity.sum() + self.unrevealed_weapons != self.weapon_count {
            out.push(format!(
                "{scope}: weapons_by_rarity + unrevealed ({} + {}) != weapon_count {}",
                self.weapons_by_rarity.sum(),
                self.unrevealed_weapons,
                self.weapon_count
            ));
        }
        if self.equipped_by_rarity.sum() > self.equipped_weapons {
            out.push(format!(
                "{scope}: equipped_by_rarity sums past equipped_weapons {}",
                self.equipped_weapons
            ));
        }
        out
    }
}

impl Default for Holdings {
    fn default() -> Self {
        Self::new()
    }
}

/// Spend broken down by category, in wei.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spend {
    /// Hero training.
    pub training: u128,
    /// Weapon repairs.
    pub repair: u128,
    /// Weapon sharpening.
    pub sharpen: u128,
    /// Gacha rolls.
    pub gacha: u128,
    /// Remix requests.
    pub remix: u128,
    /// Hero revivals.
    pub revival: u128,
}

impl Spend {
    /// Sum over every category.
    #[must_use]
    pub fn total(&self) -> u128 {
        self.training
            .saturating_add(self.repair)
            .saturating_add(self.sharpen)
            .saturating_add(self.gacha)
            .saturating_add(self.remix)
            .saturating_add(self.revival)
    }
}

/// Purchases made by an owner (or by everyone, at the global tier).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Economy {
    /// Spend by category.
    pub spent: Spend,
    /// Training steps purchased.
    pub train_count: u32,
    /// Repairs purchased.
    pub repair_count: u32,
    /// Sharpenings purchased.
    pub sharpen_count: u32,
}

impl Economy {
    /// Accumulate another owner's economy into this one.
    pub fn accumulate(&mut self, other: &Self) {
        self.spent.training += other.spent.training;
        self.spent.repair += other.spent.repair;
        self.spent.sharpen += other.spent.sharpen;
        self.spent.gacha += other.spent.gacha;
        self.spent.remix += other.spent.remix;
        self.spent.revival += other.spent.revival;
        self.train_count += other.train_count;
        self.repair_count += other.repair_count;
        self.sharpen_count += other.sharpen_count;
    }
}

/// Staking, combat and crafting activity of an owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Activity {
    /// Heroes currently staked and alive.
    pub active_heroes: u32,
    /// Active heroes by zone.
    pub active_by_zone: Tally<u32>,
    /// Dead heroes with a known zone.
    pub dead_heroes: u32,
    /// Dead heroes by zone.
    pub dead_by_zone: Tally<u32>,

    /// Lifetime stakes.
    pub total_stakes: u64,
    /// Lifetime stakes by zone.
    pub stakes_by_zone: Tally<u64>,
    /// Lifetime unstake events.
    pub total_unstakes: u64,
    /// Completed staking sessions.
    pub completed_sessions: u64,
    /// Completed sessions by zone.
    pub sessions_by_zone: Tally<u64>,
    /// Lifetime deaths.
    pub total_deaths: u64,
    /// Lifetime revivals.
    pub total_revivals: u64,

    /// Reward claims.
    pub claims: u64,
    /// Rewards paid (wei).
    pub rewards_amount: u128,
    /// Rewards paid by zone (wei).
    pub rewards_by_zone: Tally<u128>,
    /// Shards earned.
    pub shards_earned: u64,
    /// Gacha tickets earned.
    pub gacha_tickets_earned: u64,
    /// Reward items earned, zone × item bucket.
    pub reward_items_by_zone: Tally<u64>,

    /// Gacha requests made.
    pub gacha_requests: u64,
    /// Weapons generated by the gacha machine.
    pub gacha_weapons: u64,
    /// Gacha weapons by rarity.
    pub gacha_by_rarity: Tally<u64>,
    /// Remix requests made.
    pub remix_requests: u64,
    /// Remix outcomes, remix type × input rarity × outcome.
    pub remix_outcomes: Tally<u64>,
    /// Repairs by weapon rarity.
    pub repairs_by_rarity: Tally<u64>,
    /// Sharpenings by weapon rarity.
    pub sharpens_by_rarity: Tally<u64>,
}

impl Activity {
    /// Zero activity with every distribution sized.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active_heroes: 0,
            active_by_zone: Tally::flat(ZONE_COUNT),
            dead_heroes: 0,
            dead_by_zone: Tally::flat(ZONE_COUNT),
            total_stakes: 0,
            stakes_by_zone: Tally::flat(ZONE_COUNT),
            total_unstakes: 0,
            completed_sessions: 0,
            sessions_by_zone: Tally::flat(ZONE_COUNT),
            total_deaths: 0,
            total_revivals: 0,
            claims: 0,
            rewards_amount: 0,
            rewards_by_zone: Tally::flat(ZONE_COUNT),
            shards_earned: 0,
            gacha_tickets_earned: 0,
            reward_items_by_zone: Tally::zeros(&[ZONE_COUNT, REWARD_ITEM_BUCKETS]),
            gacha_requests: 0,
            gacha_weapons: 0,
            gacha_by_rarity: Tally::flat(RARITY_BUCKETS),
            remix_requests: 0,
            remix_outcomes: Tally::zeros(&[REMIX_TYPES, RARITY_BUCKETS, REMIX_OUTCOMES]),
            repairs_by_rarity: Tally::flat(RARITY_BUCKETS),
            sharpens_by_rarity: Tally::flat(RARITY_BUCKETS),
        }
    }

    /// Accumulate another owner's activity into this one.
    pub fn accumulate(&mut self, other: &Self) {
        self.active_heroes += other.active_heroes;
        self.active_by_zone.accumulate(&other.active_by_zone);
        self.dead_heroes += other.dead_heroes;
        self.dead_by_zone.accumulate(&other.dead_by_zone);
        self.total_stakes += other.total_stakes;
        self.stakes_by_zone.accumulate(&other.stakes_by_zone);
        self.total_unstakes += other.total_unstakes;
        self.completed_sessions += other.completed_sessions;
        self.sessions_by_zone.accumulate(&other.sessions_by_zone);
        self.total_deaths += other.total_deaths;
        self.total_revivals += other.total_revivals;
        self.claims += other.claims;
        self.rewards_amount += other.rewards_amount;
        self.rewards_by_zone.accumulate(&other.rewards_by_zone);
        self.shards_earned += other.shards_earned;
        self.gacha_tickets_earned += other.gacha_tickets_earned;
        self.reward_items_by_zone.accumulate(&other.reward_items_by_zone);
        self.gacha_requests += other.gacha_requests;
        self.gacha_weapons += other.gacha_weapons;
        self.gacha_by_rarity.accumulate(&other.gacha_by_rarity);
        self.remix_requests += other.remix_requests;
        self.remix_outcomes.accumulate(&other.remix_outcomes);
        self.repairs_by_rarity.accumulate(&other.repairs_by_rarity);
        self.sharpens_by_rarity.accumulate(&other.sharpens_by_rarity);
    }

    /// Zone-array-vs-scalar violations, prefixed with `scope`.
    #[must_use]
    pub fn distribution_violations(&self, scope: &str) -> Vec<String> {
        let mut out = Vec::new();
        let mut check = |name: &str, sum: u128, scalar: u128| {
            if sum != scalar {
                out.push(format!("{scope}: {name} sums to {sum} but scalar is {scalar}"));
            }
        };
        check(
            "active_by_zone",
            u128::from(self.active_by_zone.sum()),
            u128::from(self.active_heroes),
        );
        check(
            "dead_by_zone",
            u128::from(self.dead_by_zone.sum()),
            u128::from(self.dead_heroes),
        );
        check(
            "stakes_by_zone",
            u128::from(self.stakes_by_zone.sum()),
            u128::from(self.total_stakes),
        );
        check(
            "sessions_by_zone",
            u128::from(self.sessions_by_zone.sum()),
            u128::from(self.completed_sessions),
        );
        check("rewards_by_zone", self.rewards_by_zone.sum(), self.rewards_amount);
        check(
            "gacha_by_rarity",
            u128::from(self.gacha_by_rarity.sum()),
            u128::from(self.gacha_weapons),
        );
        out
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tally::{ClampGuard, ClampPolicy};

    #[test]
    fn fresh_structures_have_no_violations() {
        assert!(Holdings::new().distribution_violations("h").is_empty());
        assert!(Activity::new().distribution_violations("a").is_empty());
    }

    #[test]
    fn activity_detects_zone_mismatch() {
        let mut guard = ClampGuard::new(ClampPolicy::Saturate);
        let mut a = Activity::new();
        a.active_heroes = 2;
        a.active_by_zone.bump(&[1], &mut guard, "a");
        let v = a.distribution_violations("user");
        assert_eq!(v.len(), 1);
        assert!(v[0].contains("active_by_zone"));
    }

    #[test]
    fn accumulate_sums_fields() {
        let mut guard = ClampGuard::new(ClampPolicy::Saturate);
        let mut a = Holdings::new();
        a.hero_count = 1;
        a.heroes_by_level.bump(&[1], &mut guard, "h");
        let mut total = Holdings::new();
        total.accumulate(&a);
        total.accumulate(&a);
        assert_eq!(total.hero_count, 2);
        assert_eq!(total.heroes_by_level.get(&[1]), 2);
    }
}
