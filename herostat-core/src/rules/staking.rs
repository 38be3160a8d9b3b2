//! Staking sessions: stake, unstake request, unstake and claim.

use serde_json::json;
use tracing::{debug, warn};

use super::{HeroEdit, bump_activity};
use crate::audit::{AuditEntry, AuditKind};
use crate::engine::context::ApplyContext;
use crate::error::Result;
use crate::events::RewardItem;
use crate::stats::ZoneStats;
use crate::tally::{ClampGuard, Sign};
use crate::types::{Address, StakingType, TokenId, Zone};

/// What an unstake or claim pays out.
#[derive(Debug)]
pub(super) struct Payout<'e> {
    pub amount: u128,
    pub shards: u64,
    pub gacha_tickets: u64,
    pub items: &'e [RewardItem],
}

impl Payout<'_> {
    fn tokens(amount: u128) -> Self {
        Payout {
            amount,
            shards: 0,
            gacha_tickets: 0,
            items: &[],
        }
    }
}

pub(super) fn stake(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    owner: &Address,
    staking_type: StakingType,
) -> Result<()> {
    let mut edit = HeroEdit::require_minted(ctx, hero_id)?;
    if edit.hero.dead {
        warn!(hero = %hero_id, "Stake of a dead hero ignored");
        return Ok(());
    }
    if edit.hero.staked {
        debug!(hero = %hero_id, "Hero already staked, no change");
        return Ok(());
    }

    let revealing = !edit.hero.revealed;
    edit.hero.revealed = true;
    edit.hero.begin_session(staking_type, ctx.timestamp());
    ctx.guard
        .add(&mut edit.hero.stake_count, 1, "hero.stake_count");
    let hero = edit.commit(ctx)?;

    let zone = staking_type.zone();
    let staker = attributed(&hero.owner, owner);
    bump_activity(ctx, &staker, |a, g| {
        g.add(&mut a.total_stakes, 1, "activity.total_stakes");
        a.stakes_by_zone
            .bump(&[zone.index()], g, "activity.stakes_by_zone");
    })?;
    let mut stats: ZoneStats = ctx.load_or_default(&ZoneStats::key(zone))?;
    ctx.guard
        .add(&mut stats.total_stakes, 1, "zone.total_stakes");
    stats
        .stakes_by_level
        .bump(&[usize::from(hero.level)], &mut ctx.guard, "zone.stakes_by_level");
    ctx.put(&stats)?;

    ctx.audit(
        AuditEntry::new(AuditKind::HeroStaked)
            .actor(&staker)
            .related(hero_id)
            .details(json!({ "level": hero.level, "zone": zone.index() }))
            .staking(Some(staking_type)),
    );
    if revealing {
        ctx.audit(
            AuditEntry::new(AuditKind::HeroRevealed)
                .actor(&staker)
                .related(hero_id),
        );
    }
    Ok(())
}

pub(super) fn request_unstake(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    owner: &Address,
) -> Result<()> {
    let Some(mut edit) = HeroEdit::load(ctx, hero_id)? else {
        debug!(hero = %hero_id, "Unstake request for unknown hero ignored");
        return Ok(());
    };
    if !edit.hero.staked {
        debug!(hero = %hero_id, "Unstake request for unstaked hero ignored");
        return Ok(());
    }
    edit.hero.unstake_requested_at = Some(ctx.timestamp());
    let staking_type = edit.hero.staking_type;
    edit.commit(ctx)?;

    ctx.audit(
        AuditEntry::new(AuditKind::UnstakeRequested)
            .actor(owner)
            .related(hero_id)
            .staking(staking_type),
    );
    Ok(())
}

pub(super) fn unstake(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    owner: &Address,
    staking_type: StakingType,
    payout: &Payout<'_>,
) -> Result<()> {
    let mut edit = HeroEdit::require_minted(ctx, hero_id)?;
    let session_type = edit.hero.staking_type.unwrap_or(staking_type);
    if session_type != staking_type {
        warn!(
            hero = %hero_id,
            recorded = ?session_type,
            reported = ?staking_type,
            "Unstake activity disagrees with session, using session"
        );
    }
    let zone = session_type.zone();

    if edit.hero.staked {
        edit.hero.end_session();
    } else {
        debug!(hero = %hero_id, "Unstake of a hero with no open session");
    }
    let g = &mut ctx.guard;
    g.add(&mut edit.hero.unstake_count, 1, "hero.unstake_count");
    edit.hero
        .sessions_by_zone
        .bump(&[zone.index()], g, "hero.sessions_by_zone");
    credit_hero(&mut edit, zone, payout.amount, g);
    let hero = edit.commit(ctx)?;
    let owner = &attributed(&hero.owner, owner);

    bump_activity(ctx, owner, |a, g| {
        g.add(&mut a.total_unstakes, 1, "activity.total_unstakes");
        g.add(&mut a.completed_sessions, 1, "activity.completed_sessions");
        a.sessions_by_zone
            .bump(&[zone.index()], g, "activity.sessions_by_zone");
    })?;
    let mut stats: ZoneStats = ctx.load_or_default(&ZoneStats::key(zone))?;
    ctx.guard
        .add(&mut stats.completed_sessions, 1, "zone.completed_sessions");
    ctx.put(&stats)?;

    pay(ctx, owner, zone, payout)?;

    ctx.audit(
        AuditEntry::new(AuditKind::HeroUnstaked)
            .actor(owner)
            .related(hero_id)
            .details(json!({
                "reward_amount": payout.amount.to_string(),
                "shards": payout.shards,
                "gacha_tickets": payout.gacha_tickets,
                "reward_items": payout.items.len(),
            }))
            .staking(Some(session_type)),
    );
    Ok(())
}

pub(super) fn claim(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    owner: &Address,
    staking_type: StakingType,
    amount: u128,
) -> Result<()> {
    let mut edit = HeroEdit::require_minted(ctx, hero_id)?;
    let session_type = edit.hero.staking_type.unwrap_or(staking_type);
    let zone = session_type.zone();

    let g = &mut ctx.guard;
    g.add(&mut edit.hero.claim_count, 1, "hero.claim_count");
    if edit.hero.staked {
        g.add(&mut edit.hero.session_rewards, amount, "hero.session_rewards");
        edit.hero.last_reward_at = Some(ctx.timestamp());
    }
    credit_hero(&mut edit, zone, amount, &mut ctx.guard);
    let hero = edit.commit(ctx)?;
    let owner = &attributed(&hero.owner, owner);

    bump_activity(ctx, owner, |a, g| {
        g.add(&mut a.claims, 1, "activity.claims");
    })?;
    pay(ctx, owner, zone, &Payout::tokens(amount))?;

    ctx.audit(
        AuditEntry::new(AuditKind::RewardsClaimed)
            .actor(owner)
            .related(hero_id)
            .details(json!({ "amount": amount.to_string() }))
            .staking(Some(session_type)),
    );
    Ok(())
}

fn credit_hero(edit: &mut HeroEdit, zone: Zone, amount: u128, g: &mut ClampGuard) {
    g.add(&mut edit.hero.total_rewards, amount, "hero.total_rewards");
    edit.hero
        .rewards_by_zone
        .shift(&[zone.index()], amount, Sign::Add, g, "hero.rewards_by_zone");
}

/// Credit `recipient` and mirror the payout into user, global and zone
/// aggregates.
fn pay(ctx: &mut ApplyContext<'_>, recipient: &Address, zone: Zone, payout: &Payout<'_>) -> Result<()> {
    let buckets = &ctx.config().reward_items;
    let mut items = Vec::with_capacity(payout.items.len());
    for item in payout.items {
        match buckets.bucket(&item.token_id) {
            Some(bucket) => items.push((bucket, item.amount)),
            None => {
                warn!(token = %item.token_id, "Unmapped reward item, bucket skipped");
                ctx.guard.skipped();
            }
        }
    }

    let mut player = ctx.player(recipient)?;
    player.credit(payout.amount);
    let g = &mut ctx.guard;
    g.add(&mut player.shards, payout.shards, "player.shards");
    g.add(&mut player.gacha_tickets, payout.gacha_tickets, "player.gacha_tickets");
    ctx.put(&player)?;

    bump_activity(ctx, recipient, |a, g| {
        g.add(&mut a.rewards_amount, payout.amount, "activity.rewards_amount");
        a.rewards_by_zone.shift(
            &[zone.index()],
            payout.amount,
            Sign::Add,
            g,
            "activity.rewards_by_zone",
        );
        g.add(&mut a.shards_earned, payout.shards, "activity.shards_earned");
        g.add(
            &mut a.gacha_tickets_earned,
            payout.gacha_tickets,
            "activity.gacha_tickets_earned",
        );
        for &(bucket, amount) in &items {
            a.reward_items_by_zone.shift(
                &[zone.index(), bucket],
                amount,
                Sign::Add,
                g,
                "activity.reward_items_by_zone",
            );
        }
    })?;

    let mut stats: ZoneStats = ctx.load_or_default(&ZoneStats::key(zone))?;
    let g = &mut ctx.guard;
    g.add(&mut stats.rewards_amount, payout.amount, "zone.rewards_amount");
    for &(bucket, amount) in &items {
        stats
            .reward_items
            .shift(&[bucket], amount, Sign::Add, g, "zone.reward_items");
    }
    ctx.put(&stats)
}

/// The address a hero's activity is attributed to: its recorded owner,
/// falling back to the address the event names.
fn attributed(recorded: &Option<Address>, reported: &Address) -> Address {
    match recorded {
        Some(owner) if owner != reported => {
            warn!(%reported, recorded = %owner, "Event owner differs from recorded owner");
            owner.clone()
        }
        Some(owner) => owner.clone(),
        None => reported.clone(),
    }
}
