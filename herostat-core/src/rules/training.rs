//! Hero lifecycle outside staking: death, revival and training.

use serde_json::json;
use tracing::{debug, warn};

use super::{HeroEdit, Purchase, bump_activity, charge};
use crate::audit::{AuditEntry, AuditKind};
use crate::engine::context::ApplyContext;
use crate::error::Result;
use crate::formula::training_cost_between;
use crate::types::{Address, MAX_LEVEL, StakingType, TokenId};

pub(super) fn die(ctx: &mut ApplyContext<'_>, hero_id: &TokenId) -> Result<()> {
    let mut edit = HeroEdit::require_minted(ctx, hero_id)?;
    if edit.hero.dead {
        debug!(hero = %hero_id, "Death of an already dead hero, no change");
        return Ok(());
    }

    let staking_type = edit.hero.staking_type;
    let zone = staking_type.map(StakingType::zone);
    if zone.is_none() {
        warn!(hero = %hero_id, "Hero died outside any activity, not counted in zone gauges");
    }
    let hero = &mut edit.hero;
    hero.dead = true;
    hero.death_zone = zone;
    hero.death_level = Some(hero.level);
    ctx.guard.add(&mut hero.death_count, 1, "hero.death_count");
    if let Some(zone) = zone {
        hero.deaths_by_zone
            .bump(&[zone.index()], &mut ctx.guard, "hero.deaths_by_zone");
    }
    hero.end_session();
    let level = hero.level;
    let hero = edit.commit(ctx)?;

    if let Some(owner) = &hero.owner {
        bump_activity(ctx, owner, |a, g| {
            g.add(&mut a.total_deaths, 1, "activity.total_deaths");
        })?;
    }
    let mut entry = AuditEntry::new(AuditKind::HeroDied)
        .related(hero_id)
        .details(json!({ "level": level, "zone": zone.map(|z| z.index()) }))
        .staking(staking_type);
    if let Some(owner) = &hero.owner {
        entry = entry.actor(owner);
    }
    ctx.audit(entry);
    Ok(())
}

pub(super) fn revive(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    owner: &Address,
    cost: u128,
) -> Result<()> {
    let mut edit = HeroEdit::require_minted(ctx, hero_id)?;
    if !edit.hero.dead {
        warn!(hero = %hero_id, "Revival of a living hero ignored");
        return Ok(());
    }
    let zone = edit.hero.resolved_death_zone();
    let hero = &mut edit.hero;
    hero.dead = false;
    hero.death_zone = None;
    hero.death_level = None;
    hero.end_session();
    ctx.guard
        .add(&mut hero.revival_count, 1, "hero.revival_count");
    edit.commit(ctx)?;

    charge(ctx, owner, cost, Purchase::Revival)?;
    bump_activity(ctx, owner, |a, g| {
        g.add(&mut a.total_revivals, 1, "activity.total_revivals");
    })?;
    ctx.audit(
        AuditEntry::new(AuditKind::HeroRevived)
            .actor(owner)
            .related(hero_id)
            .details(json!({ "cost": cost.to_string(), "zone": zone.map(|z| z.index()) })),
    );
    Ok(())
}

pub(super) fn train(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    owner: &Address,
    new_level: u8,
) -> Result<()> {
    let mut edit = HeroEdit::require_minted(ctx, hero_id)?;
    let old_level = edit.hero.level;
    if new_level > MAX_LEVEL {
        warn!(hero = %hero_id, new_level, "Training beyond the level cap ignored");
        ctx.guard.skipped();
        return Ok(());
    }
    if new_level <= old_level {
        warn!(hero = %hero_id, old_level, new_level, "Training does not raise the level, ignored");
        return Ok(());
    }

    let cost = training_cost_between(old_level, new_level);
    let steps = u32::from(new_level - old_level);
    edit.hero.level = new_level;
    if edit.hero.dead {
        edit.hero.death_level.get_or_insert(old_level);
    }
    let g = &mut ctx.guard;
    g.add(&mut edit.hero.train_count, steps, "hero.train_count");
    g.add(&mut edit.hero.training_spent, cost, "hero.training_spent");
    edit.rearm(ctx)?;
    edit.commit(ctx)?;

    charge(ctx, owner, cost, Purchase::Training { steps })?;
    ctx.audit(
        AuditEntry::new(AuditKind::HeroTrained)
            .actor(owner)
            .related(hero_id)
            .details(json!({
                "from_level": old_level,
                "to_level": new_level,
                "cost": cost.to_string(),
            })),
    );
    Ok(())
}
