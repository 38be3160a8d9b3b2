//! Training cost, damage and reward formulas.
//!
//! Pure integer arithmetic that must match the on-chain contracts bit for bit:
//! every division truncates toward zero and no intermediate value is rounded.

use serde::{Deserialize, Serialize};

use crate::types::{RARITY_BUCKETS, Rarity};

/// One whole token in wei.
pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// Damage multiplier per rarity tier (Fibonacci).
pub const DAMAGE_COEFFICIENTS: [u64; RARITY_BUCKETS] = [1, 2, 3, 5, 8, 13, 21];

/// Flat daily reward every hero earns, in whole tokens.
pub const BASE_DAILY_TOKENS: u128 = 50;

/// Cost in wei to train a hero from `level` to `level + 1`.
///
/// `floor(level * 10000 * 10^18 / (69 + level))`.
#[must_use]
pub fn training_cost(level: u8) -> u128 {
    let level = u128::from(level);
    level * 10_000 * WEI_PER_TOKEN / (69 + level)
}

/// Total cost to train from `from` up to `to` (exclusive of `to`'s own step).
#[must_use]
pub fn training_cost_between(from: u8, to: u8) -> u128 {
    (from..to).map(training_cost).sum()
}

/// Damage of a hero at `level` wielding a weapon of `rarity`.
#[must_use]
pub fn damage(level: u8, rarity: Rarity) -> u64 {
    u64::from(level) * DAMAGE_COEFFICIENTS[rarity.index()]
}

/// Maximum reward per day in whole tokens; zero without damage or level.
#[must_use]
pub fn max_reward_per_day(damage: u64, level: u8) -> u128 {
    if damage == 0 || level == 0 {
        return 0;
    }
    u128::from(damage) * 400 / (20 + u128::from(level))
}

/// Guaranteed share of the max reward: 80%.
#[must_use]
pub fn base_reward_per_day(max_reward: u128) -> u128 {
    max_reward * 8 / 10
}

/// Sharpness-scaled share of the max reward, up to 20%.
#[must_use]
pub fn bonus_reward_per_day(max_reward: u128, sharpness: u32, max_sharpness: u32) -> u128 {
    if max_sharpness == 0 {
        return 0;
    }
    max_reward * 2 * u128::from(sharpness) / (10 * u128::from(max_sharpness))
}

/// The derived combat and reward fields of a hero.
///
/// Always recomputed as a unit; never set field by field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RewardProfile {
    /// Hero damage.
    pub damage: u64,
    /// Max reward per day, whole tokens.
    pub max_reward_per_day: u128,
    /// Base reward per day, whole tokens.
    pub base_reward_per_day: u128,
    /// Bonus reward per day, whole tokens.
    pub bonus_reward_per_day: u128,
    /// Daily reward in wei.
    pub daily_reward: u128,
    /// Hourly reward in wei.
    pub hourly_reward: u128,
}

/// The wielded weapon's inputs to [`RewardProfile::compute`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armament {
    /// Weapon rarity.
    pub rarity: Rarity,
    /// Current sharpness.
    pub sharpness: u32,
    /// Max sharpness.
    pub max_sharpness: u32,
}

impl RewardProfile {
    /// Compute the profile for a hero at `level`, optionally armed.
    #[must_use]
    pub fn compute(level: u8, armament: Option<Armament>) -> Self {
        let (damage, sharpness, max_sharpness) = match armament {
            Some(a) => (damage(level, a.rarity), a.sharpness, a.max_sharpness),
            None => (0, 0, 0),
        };
        let max_reward = max_reward_per_day(damage, level);
        let base = base_reward_per_day(max_reward);
        let bonus = bonus_reward_per_day(max_reward, sharpness, max_sharpness);
        let daily = (BASE_DAILY_TOKENS + base + bonus) * WEI_PER_TOKEN;
        Self {
            damage,
            max_reward_per_day: max_reward,
            base_reward_per_day: base,
            bonus_reward_per_day: bonus,
            daily_reward: daily,
            hourly_reward: daily / 24,
        }
    }

    /// The profile of an unarmed hero (the starting/reset value).
    #[must_use]
    pub fn unarmed(level: u8) -> Self {
        Self::compute(level, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn training_cost_zero_at_level_zero() {
        assert_eq!(training_cost(0), 0);
    }

    #[test]
    fn training_cost_matches_contract_truncation() {
        // 1 * 10000e18 / 70 = 142857142857142857142.857... -> truncated
        assert_eq!(training_cost(1), 142_857_142_857_142_857_142);
        // 31 * 10000e18 / 100
        assert_eq!(training_cost(31), 3_100 * WEI_PER_TOKEN);
    }

    #[test]
    fn training_cost_monotonic() {
        for level in 1..100u8 {
            assert!(training_cost(level + 1) > training_cost(level), "level {level}");
        }
    }

    #[test]
    fn training_cost_between_sums_steps() {
        assert_eq!(training_cost_between(1, 3), training_cost(1) + training_cost(2));
        assert_eq!(training_cost_between(5, 5), 0);
    }

    #[test]
    fn damage_uses_fibonacci_coefficients() {
        assert_eq!(damage(10, Rarity::Common), 10);
        assert_eq!(damage(10, Rarity::Epic), 50);
        assert_eq!(damage(100, Rarity::Mythic), 2_100);
    }

    #[test]
    fn max_reward_zero_cases() {
        assert_eq!(max_reward_per_day(0, 10), 0);
        assert_eq!(max_reward_per_day(10, 0), 0);
        assert_eq!(max_reward_per_day(30, 10), 400);
    }

    #[test]
    fn bonus_zero_without_max_sharpness() {
        assert_eq!(bonus_reward_per_day(400, 50, 0), 0);
        assert_eq!(bonus_reward_per_day(400, 100, 100), 80);
        assert_eq!(bonus_reward_per_day(400, 50, 100), 40);
    }

    #[test]
    fn unarmed_profile_is_flat_reward() {
        let p = RewardProfile::unarmed(7);
        assert_eq!(p.damage, 0);
        assert_eq!(p.bonus_reward_per_day, 0);
        assert_eq!(p.daily_reward, 50 * WEI_PER_TOKEN);
        assert_eq!(p.hourly_reward, 50 * WEI_PER_TOKEN / 24);
    }

    #[test]
    fn armed_profile_combines_parts() {
        let p = RewardProfile::compute(
            10,
            Some(Armament {
                rarity: Rarity::Rare,
                sharpness: 50,
                max_sharpness: 100,
            }),
        );
        assert_eq!(p.damage, 30);
        assert_eq!(p.max_reward_per_day, 400);
        assert_eq!(p.base_reward_per_day, 320);
        assert_eq!(p.bonus_reward_per_day, 40);
        assert_eq!(p.daily_reward, 410 * WEI_PER_TOKEN);
        assert_eq!(p.hourly_reward, p.daily_reward / 24);
    }
}
