//! Aggregation rules, one module per event family.
//!
//! Rules run inside an [`ApplyContext`]: they load records, mutate them,
//! and stage the results. Hero and weapon mutations go through [`HeroEdit`]
//! and [`WeaponEdit`], which carry the footprint taken at load time and swap
//! it for the new one on commit, so no rule adjusts a gauge by hand.

mod equipment;
mod maintenance;
mod minting;
mod staking;
mod training;
mod transfer;

use tracing::warn;

use crate::engine::context::ApplyContext;
use crate::entity::{Hero, RecordKind, Weapon};
use crate::error::Result;
use crate::events::DomainEvent;
use crate::footprint::{HeroFootprint, WeaponFootprint, swap_hero, swap_weapon};
use crate::stats::{Activity, Economy, GlobalStats, UserStats};
use crate::tally::ClampGuard;
use crate::types::{Address, TokenId};

/// Run the rule for `event` against `ctx`.
///
/// # Errors
/// Returns [`crate::HerostatError::MissingEntity`] when a required record is
/// absent, and storage or encode errors.
pub fn dispatch(ctx: &mut ApplyContext<'_>, event: &DomainEvent) -> Result<()> {
    touch_players(ctx, event)?;

    match event {
        DomainEvent::HeroTransfer { from, to, token_id } => {
            transfer::hero(ctx, from, to, token_id)
        }
        DomainEvent::WeaponTransfer { from, to, token_id } => {
            transfer::weapon(ctx, from, to, token_id)
        }
        DomainEvent::WeaponMetadata { token_id, stats } => {
            minting::metadata(ctx, token_id, *stats)
        }
        DomainEvent::Staked {
            hero,
            owner,
            staking_type,
        } => staking::stake(ctx, hero, owner, *staking_type),
        DomainEvent::UnstakeRequested { hero, owner } => {
            staking::request_unstake(ctx, hero, owner)
        }
        DomainEvent::Unstaked {
            hero,
            owner,
            staking_type,
            reward_amount,
            shards,
            gacha_tickets,
            reward_items,
        } => staking::unstake(
            ctx,
            hero,
            owner,
            *staking_type,
            &staking::Payout {
                amount: *reward_amount,
                shards: *shards,
                gacha_tickets: *gacha_tickets,
                items: reward_items,
            },
        ),
        DomainEvent::RewardsClaimed {
            hero,
            owner,
            staking_type,
            amount,
        } => staking::claim(ctx, hero, owner, *staking_type, *amount),
        DomainEvent::HeroDied { hero } => training::die(ctx, hero),
        DomainEvent::HeroRevived { hero, owner, cost } => {
            training::revive(ctx, hero, owner, *cost)
        }
        DomainEvent::HeroTrained {
            hero,
            owner,
            new_level,
        } => training::train(ctx, hero, owner, *new_level),
        DomainEvent::WeaponEquipped {
            hero,
            weapon,
            owner,
        } => equipment::equip(ctx, hero, weapon, owner),
        DomainEvent::WeaponUnequipped {
            hero,
            weapon,
            owner,
        } => equipment::unequip(ctx, hero, weapon, owner),
        DomainEvent::WeaponRepaired {
            weapon,
            owner,
            cost,
        } => maintenance::repair(ctx, weapon, owner, *cost),
        DomainEvent::WeaponSharpened {
            weapon,
            owner,
            cost,
        } => maintenance::sharpen(ctx, weapon, owner, *cost),
        DomainEvent::WeaponWearUpdated {
            weapon,
            durability,
            sharpness,
        } => maintenance::wear(ctx, weapon, *durability, *sharpness),
        DomainEvent::GachaRequested {
            request_id,
            requester,
            rolls,
            price,
            tickets_used,
        } => minting::gacha_requested(ctx, request_id, requester, *rolls, *price, *tickets_used),
        DomainEvent::GachaWeaponGenerated {
            request_id,
            weapon,
            stats,
        } => minting::gacha_generated(ctx, request_id, weapon, *stats),
        DomainEvent::RemixRequested {
            request_id,
            requester,
            weapons_used,
            request_rarity,
            price,
        } => minting::remix_requested(
            ctx,
            request_id,
            requester,
            *weapons_used,
            *request_rarity,
            *price,
        ),
        DomainEvent::RemixWeaponGenerated {
            request_id,
            weapon,
            stats,
        } => minting::remix_generated(ctx, request_id, weapon, *stats),
    }
}

/// Stamp every player the event names as seen.
fn touch_players(ctx: &mut ApplyContext<'_>, event: &DomainEvent) -> Result<()> {
    for reference in event.references() {
        if reference.key.kind == RecordKind::Player {
            ctx.player(&Address::new(&reference.key.id))?;
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Footprint-tracked edits
// ---------------------------------------------------------------------------

/// A hero loaded for mutation, remembering its footprint at load time.
pub(crate) struct HeroEdit {
    pub hero: Hero,
    before: Option<HeroFootprint>,
}

impl HeroEdit {
    fn new(hero: Hero) -> Self {
        Self {
            before: HeroFootprint::of(&hero),
            hero,
        }
    }

    /// Load a hero the event cannot proceed without.
    pub fn require(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Self> {
        ctx.require::<Hero>(id.as_str()).map(Self::new)
    }

    /// Load a hero whose mint has been applied. A placeholder created by a
    /// speculative prefetch counts as absent.
    pub fn require_minted(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Self> {
        let hero = ctx.require::<Hero>(id.as_str())?;
        if !hero.is_minted() {
            return Err(ctx.missing::<Hero>(id.as_str()));
        }
        Ok(Self::new(hero))
    }

    /// Load a hero whose absence is tolerated.
    pub fn load(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Option<Self>> {
        Ok(ctx.load::<Hero>(id.as_str())?.map(Self::new))
    }

    /// Recompute the reward profile from the currently equipped weapon.
    pub fn rearm(&mut self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        let weapon = match &self.hero.equipped_weapon {
            Some(id) => {
                let weapon = ctx.load::<Weapon>(id.as_str())?;
                if weapon.is_none() {
                    warn!(hero = %self.hero.id, weapon = %id, "Equipped weapon missing, computing unarmed");
                }
                weapon
            }
            None => None,
        };
        self.hero.recompute(weapon.as_ref());
        Ok(())
    }

    /// Swap the footprint and stage the hero.
    pub fn commit(self, ctx: &mut ApplyContext<'_>) -> Result<Hero> {
        let after = HeroFootprint::of(&self.hero);
        swap_hero(ctx, self.before.as_ref(), after.as_ref())?;
        ctx.put(&self.hero)?;
        Ok(self.hero)
    }

    /// Retract the footprint and stage a delete.
    pub fn retire(self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        swap_hero(ctx, self.before.as_ref(), None)?;
        ctx.delete::<Hero>(self.hero.id.as_str());
        Ok(())
    }
}

/// A weapon loaded for mutation, remembering its footprint at load time.
pub(crate) struct WeaponEdit {
    pub weapon: Weapon,
    before: Option<WeaponFootprint>,
}

impl WeaponEdit {
    fn new(weapon: Weapon) -> Self {
        Self {
            before: WeaponFootprint::of(&weapon),
            weapon,
        }
    }

    /// Load a weapon the event cannot proceed without.
    pub fn require(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Self> {
        ctx.require::<Weapon>(id.as_str()).map(Self::new)
    }

    /// Load a weapon whose mint has been applied. A placeholder created by a
    /// speculative prefetch counts as absent.
    pub fn require_minted(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Self> {
        let weapon = ctx.require::<Weapon>(id.as_str())?;
        if !weapon.is_minted() {
            return Err(ctx.missing::<Weapon>(id.as_str()));
        }
        Ok(Self::new(weapon))
    }

    /// Load a weapon, starting from factory defaults when absent.
    pub fn load_or_default(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Self> {
        ctx.load_or_default::<Weapon>(id.as_str()).map(Self::new)
    }

    /// Load a weapon whose absence is tolerated.
    pub fn load(ctx: &mut ApplyContext<'_>, id: &TokenId) -> Result<Option<Self>> {
        Ok(ctx.load::<Weapon>(id.as_str())?.map(Self::new))
    }

    /// Swap the footprint and stage the weapon.
    pub fn commit(self, ctx: &mut ApplyContext<'_>) -> Result<Weapon> {
        let after = WeaponFootprint::of(&self.weapon);
        swap_weapon(ctx, self.before.as_ref(), after.as_ref())?;
        ctx.put(&self.weapon)?;
        Ok(self.weapon)
    }

    /// Retract the footprint and stage a delete.
    pub fn retire(self, ctx: &mut ApplyContext<'_>) -> Result<()> {
        swap_weapon(ctx, self.before.as_ref(), None)?;
        ctx.delete::<Weapon>(self.weapon.id.as_str());
        Ok(())
    }
}

/// Recompute the hero wielding `weapon`, if any, after its stats changed.
pub(crate) fn refresh_wielder(ctx: &mut ApplyContext<'_>, weapon: &Weapon) -> Result<()> {
    let Some(hero_id) = &weapon.equipped_hero else {
        return Ok(());
    };
    let Some(mut edit) = HeroEdit::load(ctx, hero_id)? else {
        warn!(weapon = %weapon.id, hero = %hero_id, "Wielder missing, not recomputed");
        return Ok(());
    };
    edit.hero.recompute(Some(weapon));
    edit.commit(ctx)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Two-tier counters
// ---------------------------------------------------------------------------

/// Apply the same activity delta to `user`'s stats and to the global record.
pub(crate) fn bump_activity<F>(ctx: &mut ApplyContext<'_>, user: &Address, f: F) -> Result<()>
where
    F: Fn(&mut Activity, &mut ClampGuard),
{
    let mut stats: UserStats = ctx.load_or_default(user.as_str())?;
    f(&mut stats.activity, &mut ctx.guard);
    ctx.put(&stats)?;

    let mut global: GlobalStats = ctx.load_or_default(GlobalStats::ID)?;
    f(&mut global.activity, &mut ctx.guard);
    ctx.put(&global)
}

/// Spend categories.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Purchase {
    Training { steps: u32 },
    Repair,
    Sharpen,
    Gacha,
    Remix,
    Revival,
}

impl Purchase {
    fn record(self, economy: &mut Economy, cost: u128, g: &mut ClampGuard) {
        let spent = &mut economy.spent;
        match self {
            Self::Training { steps } => {
                g.add(&mut spent.training, cost, "economy.spent.training");
                g.add(&mut economy.train_count, steps, "economy.train_count");
            }
            Self::Repair => {
                g.add(&mut spent.repair, cost, "economy.spent.repair");
                g.add(&mut economy.repair_count, 1, "economy.repair_count");
            }
            Self::Sharpen => {
                g.add(&mut spent.sharpen, cost, "economy.spent.sharpen");
                g.add(&mut economy.sharpen_count, 1, "economy.sharpen_count");
            }
            Self::Gacha => g.add(&mut spent.gacha, cost, "economy.spent.gacha"),
            Self::Remix => g.add(&mut spent.remix, cost, "economy.spent.remix"),
            Self::Revival => g.add(&mut spent.revival, cost, "economy.spent.revival"),
        }
    }
}

/// Debit `payer` and record the spend at player and global scope.
pub(crate) fn charge(
    ctx: &mut ApplyContext<'_>,
    payer: &Address,
    cost: u128,
    purchase: Purchase,
) -> Result<()> {
    let mut player = ctx.player(payer)?;
    let shortfall = player.debit(cost);
    if shortfall > 0 {
        warn!(
            player = %payer,
            cost = %cost,
            shortfall = %shortfall,
            ?purchase,
            "Purchase exceeds tracked balance, balance clamped to zero"
        );
        ctx.guard.clamped();
    }
    purchase.record(&mut player.economy, cost, &mut ctx.guard);
    ctx.put(&player)?;

    let mut global: GlobalStats = ctx.load_or_default(GlobalStats::ID)?;
    purchase.record(&mut global.economy, cost, &mut ctx.guard);
    ctx.put(&global)
}
