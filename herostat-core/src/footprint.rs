//! Aggregate footprints of heroes and weapons.
//!
//! A footprint is everything a record contributes to the aggregate tiers,
//! computed purely from the record. Rules never adjust gauges by hand: they
//! take the footprint before and after mutating a record and call
//! [`swap_hero`] / [`swap_weapon`], which remove the old contribution and add
//! the new one to every tier in the same apply step. A burn is a swap to
//! `None`, so whatever the record contributed is retracted exactly.
//!
//! Tiers touched by a hero footprint:
//!
//! | Tier | Fields |
//! |------|--------|
//! | `Player` | holdings |
//! | `UserStats` | active/dead gauges |
//! | `GlobalStats` | holdings, active/dead gauges, by-level gauges |
//! | `ZoneStats` | active/dead gauges by level |
//! | `LevelStats` | heroes, damage, rewards, equipped rarity |
//!
//! A free weapon only touches `Player` and `GlobalStats` holdings.

use crate::engine::context::ApplyContext;
use crate::entity::{Hero, Weapon};
use crate::error::Result;
use crate::stats::{Activity, GlobalStats, Holdings, LevelStats, UserStats, ZoneStats};
use crate::tally::{ClampGuard, Sign};
use crate::types::{Address, Rarity, Zone};

/// What an owned hero contributes to the aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeroFootprint {
    /// Owner the contribution is attributed to.
    pub owner: Address,
    /// Current level.
    pub level: u8,
    /// Revealed flag.
    pub revealed: bool,
    /// Zone the hero is actively staked in.
    pub active_zone: Option<Zone>,
    /// Zone and level a dead hero is counted under.
    pub dead_at: Option<(Zone, u8)>,
    /// Whether a weapon is equipped.
    pub equipped: bool,
    /// Rarity of the equipped weapon, when known.
    pub equipped_rarity: Option<Rarity>,
    /// Derived damage.
    pub damage: u64,
    /// Derived daily reward (wei).
    pub daily_reward: u128,
    /// Derived hourly reward (wei).
    pub hourly_reward: u128,
}

impl HeroFootprint {
    /// Footprint of `hero`; `None` for a hero without an owner.
    #[must_use]
    pub fn of(hero: &Hero) -> Option<Self> {
        let owner = hero.owner.clone()?;
        let dead_at = hero
            .resolved_death_zone()
            .map(|z| (z, hero.resolved_death_level()));
        Some(Self {
            owner,
            level: hero.level,
            revealed: hero.revealed,
            active_zone: hero.staked_zone(),
            dead_at,
            equipped: hero.equipped_weapon.is_some(),
            equipped_rarity: hero.equipped_rarity,
            damage: hero.rewards.damage,
            daily_reward: hero.rewards.daily_reward,
            hourly_reward: hero.rewards.hourly_reward,
        })
    }
}

/// What a free weapon contributes to its holder's aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeaponFootprint {
    /// Free holder.
    pub owner: Address,
    /// Rarity, `None` while unrevealed.
    pub rarity: Option<Rarity>,
}

impl WeaponFootprint {
    /// Footprint of `weapon`; `None` when equipped or unowned.
    #[must_use]
    pub fn of(weapon: &Weapon) -> Option<Self> {
        weapon.free_owner().map(|owner| Self {
            owner: owner.clone(),
            rarity: weapon.rarity,
        })
    }
}

// ---------------------------------------------------------------------------
// Swaps
// ---------------------------------------------------------------------------

/// Replace a hero's contribution `before` with `after`.
///
/// # Errors
/// Returns storage or encode errors.
pub fn swap_hero(
    ctx: &mut ApplyContext<'_>,
    before: Option<&HeroFootprint>,
    after: Option<&HeroFootprint>,
) -> Result<()> {
    if before == after {
        return Ok(());
    }
    if let Some(fp) = before {
        apply_hero(ctx, fp, Sign::Remove)?;
    }
    if let Some(fp) = after {
        apply_hero(ctx, fp, Sign::Add)?;
    }
    Ok(())
}

/// Replace a weapon's contribution `before` with `after`.
///
/// # Errors
/// Returns storage or encode errors.
pub fn swap_weapon(
    ctx: &mut ApplyContext<'_>,
    before: Option<&WeaponFootprint>,
    after: Option<&WeaponFootprint>,
) -> Result<()> {
    if before == after {
        return Ok(());
    }
    if let Some(fp) = before {
        apply_weapon(ctx, fp, Sign::Remove)?;
    }
    if let Some(fp) = after {
        apply_weapon(ctx, fp, Sign::Add)?;
    }
    Ok(())
}

fn apply_hero(ctx: &mut ApplyContext<'_>, fp: &HeroFootprint, sign: Sign) -> Result<()> {
    let mut player = ctx.player(&fp.owner)?;
    shift_hero_holdings(&mut player.holdings, fp, sign, &mut ctx.guard);
    ctx.put(&player)?;

    let mut global: GlobalStats = ctx.load_or_default(GlobalStats::ID)?;
    shift_hero_holdings(&mut global.holdings, fp, sign, &mut ctx.guard);
    shift_hero_gauges(&mut global.activity, fp, sign, &mut ctx.guard);
    let g = &mut ctx.guard;
    if fp.active_zone.is_some() {
        global
            .active_by_level
            .shift(&[usize::from(fp.level)], 1, sign, g, "global.active_by_level");
    }
    if let Some((_, level)) = fp.dead_at {
        global
            .dead_by_level
            .shift(&[usize::from(level)], 1, sign, g, "global.dead_by_level");
    }
    ctx.put(&global)?;

    if fp.active_zone.is_some() || fp.dead_at.is_some() {
        let mut user: UserStats = ctx.load_or_default(fp.owner.as_str())?;
        shift_hero_gauges(&mut user.activity, fp, sign, &mut ctx.guard);
        ctx.put(&user)?;
    }

    if let Some(zone) = fp.active_zone {
        let mut stats: ZoneStats = ctx.load_or_default(&ZoneStats::key(zone))?;
        let g = &mut ctx.guard;
        g.shift(&mut stats.active_heroes, 1, sign, "zone.active_heroes");
        stats
            .active_by_level
            .shift(&[usize::from(fp.level)], 1, sign, g, "zone.active_by_level");
        ctx.put(&stats)?;
    }
    if let Some((zone, level)) = fp.dead_at {
        let mut stats: ZoneStats = ctx.load_or_default(&ZoneStats::key(zone))?;
        let g = &mut ctx.guard;
        g.shift(&mut stats.dead_heroes, 1, sign, "zone.dead_heroes");
        stats
            .dead_by_level
            .shift(&[usize::from(level)], 1, sign, g, "zone.dead_by_level");
        ctx.put(&stats)?;
    }

    let mut level: LevelStats = ctx.load_or_default(&LevelStats::key(fp.level))?;
    let g = &mut ctx.guard;
    g.shift(&mut level.heroes, 1, sign, "level.heroes");
    g.shift(&mut level.total_damage, fp.damage, sign, "level.total_damage");
    g.shift(
        &mut level.total_daily_reward,
        fp.daily_reward,
        sign,
        "level.total_daily_reward",
    );
    if let Some(rarity) = fp.equipped_rarity {
        let idx = [rarity.index()];
        level
            .equipped_by_rarity
            .shift(&idx, 1, sign, g, "level.equipped_by_rarity");
        level
            .damage_by_rarity
            .shift(&idx, fp.damage, sign, g, "level.damage_by_rarity");
    }
    ctx.put(&level)
}

fn shift_hero_holdings(h: &mut Holdings, fp: &HeroFootprint, sign: Sign, g: &mut ClampGuard) {
    g.shift(&mut h.hero_count, 1, sign, "holdings.hero_count");
    h.heroes_by_level
        .shift(&[usize::from(fp.level)], 1, sign, g, "holdings.heroes_by_level");
    if fp.revealed {
        g.shift(&mut h.revealed_heroes, 1, sign, "holdings.revealed_heroes");
    }
    if fp.active_zone.is_some() {
        g.shift(&mut h.heroes_staked, 1, sign, "holdings.heroes_staked");
    }
    if fp.equipped {
        g.shift(&mut h.equipped_weapons, 1, sign, "holdings.equipped_weapons");
    }
    if let Some(rarity) = fp.equipped_rarity {
        h.equipped_by_rarity
            .shift(&[rarity.index()], 1, sign, g, "holdings.equipped_by_rarity");
    }
    g.shift(&mut h.total_damage, fp.damage, sign, "holdings.total_damage");
    g.shift(
        &mut h.total_daily_reward,
        fp.daily_reward,
        sign,
        "holdings.total_daily_reward",
    );
    g.shift(
        &mut h.total_hourly_reward,
        fp.hourly_reward,
        sign,
        "holdings.total_hourly_reward",
    );
}

fn shift_hero_gauges(a: &mut Activity, fp: &HeroFootprint, sign: Sign, g: &mut ClampGuard) {
    if let Some(zone) = fp.active_zone {
        g.shift(&mut a.active_heroes, 1, sign, "activity.active_heroes");
        a.active_by_zone
            .shift(&[zone.index()], 1, sign, g, "activity.active_by_zone");
    }
    if let Some((zone, _)) = fp.dead_at {
        g.shift(&mut a.dead_heroes, 1, sign, "activity.dead_heroes");
        a.dead_by_zone
            .shift(&[zone.index()], 1, sign, g, "activity.dead_by_zone");
    }
}

fn apply_weapon(ctx: &mut ApplyContext<'_>, fp: &WeaponFootprint, sign: Sign) -> Result<()> {
    let mut player = ctx.player(&fp.owner)?;
    shift_weapon_holdings(&mut player.holdings, fp, sign, &mut ctx.guard);
    ctx.put(&player)?;

    let mut global: GlobalStats = ctx.load_or_default(GlobalStats::ID)?;
    shift_weapon_holdings(&mut global.holdings, fp, sign, &mut ctx.guard);
    ctx.put(&global)
}

fn shift_weapon_holdings(
    h: &mut Holdings,
    fp: &WeaponFootprint,
    sign: Sign,
    g: &mut ClampGuard,
) {
    g.shift(&mut h.weapon_count, 1, sign, "holdings.weapon_count");
    match fp.rarity {
        Some(rarity) => h
            .weapons_by_rarity
            .shift(&[rarity.index()], 1, sign, g, "holdings.weapons_by_rarity"),
        None => g.shift(&mut h.unrevealed_weapons, 1, sign, "holdings.unrevealed_weapons"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{StakingType, TokenId};

    fn owned_hero() -> Hero {
        let mut hero = Hero::new(TokenId::from(1));
        hero.owner = Some(Address::new("0xa"));
        hero
    }

    #[test]
    fn unowned_records_have_no_footprint() {
        assert!(HeroFootprint::of(&Hero::new(TokenId::from(1))).is_none());
        assert!(WeaponFootprint::of(&Weapon::new(TokenId::from(1))).is_none());
    }

    #[test]
    fn staked_hero_is_active_in_its_zone() {
        let mut hero = owned_hero();
        hero.begin_session(StakingType::Mountain, 10);
        let fp = HeroFootprint::of(&hero).expect("owned");
        assert_eq!(fp.active_zone, Zone::try_from(2).ok());
        assert!(fp.dead_at.is_none());
    }

    #[test]
    fn dead_hero_without_zone_is_not_counted_dead() {
        let mut hero = owned_hero();
        hero.dead = true;
        let fp = HeroFootprint::of(&hero).expect("owned");
        assert!(fp.dead_at.is_none());

        hero.death_zone = Zone::try_from(1).ok();
        hero.death_level = Some(4);
        let fp = HeroFootprint::of(&hero).expect("owned");
        assert_eq!(fp.dead_at, Zone::try_from(1).ok().map(|z| (z, 4)));
    }

    #[test]
    fn equipped_weapon_has_no_free_footprint() {
        let mut weapon = Weapon::new(TokenId::from(5));
        weapon.owner = Some(Address::new("0xa"));
        assert!(WeaponFootprint::of(&weapon).is_some());
        weapon.owner = None;
        weapon.equipped_hero = Some(TokenId::from(1));
        assert!(WeaponFootprint::of(&weapon).is_none());
    }
}
