//! Hero records: staking lifecycle, lifetime counters and derived rewards.

use serde::{Deserialize, Serialize};

use super::weapon::Weapon;
use super::{Factory, Record, RecordKind};
use crate::formula::RewardProfile;
use crate::tally::Tally;
use crate::types::{Address, Rarity, StakingType, TokenId, ZONE_COUNT, Zone};

/// A hero token.
///
/// `rewards` is derived from `level` and the equipped weapon; it is only ever
/// written through [`Hero::recompute`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hero {
    /// Token id.
    pub id: TokenId,
    /// Current owner. `None` until the mint is applied.
    pub owner: Option<Address>,
    /// Current level.
    pub level: u8,
    /// Block time of the mint.
    pub minted_at: Option<u64>,
    /// Flipped once, on the first stake.
    pub revealed: bool,

    /// Whether the hero is currently staked.
    pub staked: bool,
    /// Activity the hero is staked into.
    pub staking_type: Option<StakingType>,
    /// Block time the current session started.
    pub staked_at: Option<u64>,
    /// Block time rewards were last settled in the current session.
    pub last_reward_at: Option<u64>,
    /// Block time an unstake was requested in the current session.
    pub unstake_requested_at: Option<u64>,
    /// Rewards claimed during the current session (wei).
    pub session_rewards: u128,

    /// Whether the hero is dead.
    pub dead: bool,
    /// Zone the hero died in, when known.
    pub death_zone: Option<Zone>,
    /// Level the hero died at.
    pub death_level: Option<u8>,

    /// Equipped weapon, if any.
    pub equipped_weapon: Option<TokenId>,
    /// Rarity of the equipped weapon, cached for aggregate bookkeeping.
    pub equipped_rarity: Option<Rarity>,
    /// Derived damage and reward rates.
    pub rewards: RewardProfile,

    /// Reward claims made.
    pub claim_count: u32,
    /// Stakes made.
    pub stake_count: u32,
    /// Unstakes completed.
    pub unstake_count: u32,
    /// Deaths suffered.
    pub death_count: u32,
    /// Revivals received.
    pub revival_count: u32,
    /// Training steps taken.
    pub train_count: u32,
    /// Spent on training (wei).
    pub training_spent: u128,
    /// Lifetime rewards earned (wei).
    pub total_rewards: u128,

    /// Completed sessions per zone.
    pub sessions_by_zone: Tally<u32>,
    /// Deaths per zone.
    pub deaths_by_zone: Tally<u32>,
    /// Rewards earned per zone (wei).
    pub rewards_by_zone: Tally<u128>,
}

impl Hero {
    /// A freshly minted level-1 hero with no owner yet.
    #[must_use]
    pub fn new(id: TokenId) -> Self {
        Self {
            id,
            owner: None,
            level: 1,
            minted_at: None,
            revealed: false,
            staked: false,
            staking_type: None,
            staked_at: None,
            last_reward_at: None,
            unstake_requested_at: None,
            session_rewards: 0,
            dead: false,
            death_zone: None,
            death_level: None,
            equipped_weapon: None,
            equipped_rarity: None,
            rewards: RewardProfile::unarmed(1),
            claim_count: 0,
            stake_count: 0,
            unstake_count: 0,
            death_count: 0,
            revival_count: 0,
            train_count: 0,
            training_spent: 0,
            total_rewards: 0,
            sessions_by_zone: Tally::flat(ZONE_COUNT),
            deaths_by_zone: Tally::flat(ZONE_COUNT),
            rewards_by_zone: Tally::flat(ZONE_COUNT),
        }
    }

    /// Recompute the derived reward profile from the current level and the
    /// equipped weapon. A missing weapon, or one whose rarity is not yet
    /// known, yields the unarmed profile.
    pub fn recompute(&mut self, weapon: Option<&Weapon>) {
        let armament = weapon.and_then(Weapon::armament);
        self.equipped_rarity = weapon.and_then(|w| w.rarity);
        self.rewards = RewardProfile::compute(self.level, armament);
    }

    /// Enter a staking session.
    pub fn begin_session(&mut self, staking_type: StakingType, at: u64) {
        self.staked = true;
        self.staking_type = Some(staking_type);
        self.staked_at = Some(at);
        self.last_reward_at = Some(at);
        self.unstake_requested_at = None;
        self.session_rewards = 0;
    }

    /// Leave the staking session, restoring every session field to its reset
    /// value.
    pub fn end_session(&mut self) {
        self.staked = false;
        self.staking_type = None;
        self.staked_at = None;
        self.last_reward_at = None;
        self.unstake_requested_at = None;
        self.session_rewards = 0;
    }

    /// Whether the mint has been applied. A hero record with no owner is a
    /// placeholder created ahead of its mint.
    #[must_use]
    pub fn is_minted(&self) -> bool {
        self.owner.is_some()
    }

    /// Zone the hero is currently staked in.
    #[must_use]
    pub fn staked_zone(&self) -> Option<Zone> {
        if self.staked && !self.dead {
            self.staking_type.map(StakingType::zone)
        } else {
            None
        }
    }

    /// Zone a dead hero is counted under: the recorded death zone, falling
    /// back to the staking-type mapping for records that predate it.
    #[must_use]
    pub fn resolved_death_zone(&self) -> Option<Zone> {
        if !self.dead {
            return None;
        }
        self.death_zone
            .or_else(|| self.staking_type.map(StakingType::zone))
    }

    /// Level a dead hero is counted under.
    #[must_use]
    pub fn resolved_death_level(&self) -> u8 {
        self.death_level.unwrap_or(self.level)
    }

    /// Violations of the staking-session invariant, if any.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if !self.staked {
            if self.staking_type.is_some() {
                out.push(format!("hero {}: unstaked with staking type", self.id));
            }
            if self.staked_at.is_some()
                || self.last_reward_at.is_some()
                || self.unstake_requested_at.is_some()
            {
                out.push(format!("hero {}: unstaked with session timestamps", self.id));
            }
            if self.session_rewards != 0 {
                out.push(format!("hero {}: unstaked with session rewards", self.id));
            }
        }
        if self.equipped_weapon.is_none() && self.rewards != RewardProfile::unarmed(self.level) {
            out.push(format!("hero {}: unarmed with armed reward profile", self.id));
        }
        out
    }
}

impl Record for Hero {
    const KIND: RecordKind = RecordKind::Hero;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

impl Factory for Hero {
    fn with_defaults(id: &str) -> Self {
        Self::new(TokenId::from(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::WEI_PER_TOKEN;

    #[test]
    fn factory_hero_is_level_one_and_unarmed() {
        let h = Hero::with_defaults("1");
        assert_eq!(h.level, 1);
        assert!(h.owner.is_none());
        assert_eq!(h.rewards.daily_reward, 50 * WEI_PER_TOKEN);
        assert!(h.invariant_violations().is_empty());
    }

    #[test]
    fn end_session_resets_every_session_field() {
        let mut h = Hero::new(TokenId::from(1));
        h.begin_session(StakingType::Mountain, 1000);
        h.session_rewards = 5;
        h.unstake_requested_at = Some(1500);
        assert_eq!(h.staked_zone(), Zone::try_from(2).ok());
        h.end_session();
        assert!(h.invariant_violations().is_empty());
        assert_eq!(h.staked_zone(), None);
    }

    #[test]
    fn death_zone_falls_back_to_staking_type() {
        let mut h = Hero::new(TokenId::from(1));
        h.dead = true;
        h.staking_type = Some(StakingType::Forest);
        assert_eq!(h.resolved_death_zone(), Zone::try_from(1).ok());
        h.death_zone = Zone::try_from(3).ok();
        assert_eq!(h.resolved_death_zone(), Zone::try_from(3).ok());
        h.dead = false;
        assert_eq!(h.resolved_death_zone(), None);
    }

    #[test]
    fn placeholder_hero_is_not_minted() {
        let mut h = Hero::with_defaults("4");
        assert!(!h.is_minted());
        h.owner = Some(Address::new("0xA"));
        assert!(h.is_minted());
    }

    #[test]
    fn stray_staking_type_is_reported() {
        let mut h = Hero::new(TokenId::from(9));
        h.staking_type = Some(StakingType::Abyss);
        assert_eq!(h.invariant_violations().len(), 1);
    }
}
