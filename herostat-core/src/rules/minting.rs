//! Weapon provenance: direct-mint metadata, gacha rolls and remixes.
//!
//! Gacha and remix mints span a request event and one or more generation
//! events; the request record lives between them and is deleted once every
//! expected weapon has been generated.

use serde_json::json;
use tracing::warn;

use super::{Purchase, WeaponEdit, bump_activity, charge, refresh_wielder};
use crate::audit::{AuditEntry, AuditKind};
use crate::engine::context::ApplyContext;
use crate::entity::weapon::WeaponStats;
use crate::entity::{RequestKind, WeaponRequest};
use crate::error::Result;
use crate::types::{Address, REMIX_MIN_WEAPONS, Rarity, TokenId, WeaponSource};

pub(super) fn metadata(ctx: &mut ApplyContext<'_>, token_id: &TokenId, stats: WeaponStats) -> Result<()> {
    let mut edit = WeaponEdit::require(ctx, token_id)?;
    edit.weapon.merge_stats(stats, WeaponSource::Direct);
    let weapon = edit.commit(ctx)?;
    refresh_wielder(ctx, &weapon)
}

pub(super) fn gacha_requested(
    ctx: &mut ApplyContext<'_>,
    request_id: &str,
    requester: &Address,
    rolls: u32,
    price: u128,
    tickets_used: u64,
) -> Result<()> {
    let Some(mut request) = open_request(ctx, request_id)? else {
        return Ok(());
    };
    request.kind = RequestKind::Gacha;
    request.requester = Some(requester.clone());
    request.expected_weapons = rolls;
    request.price = price;
    request.requested_at = Some(ctx.timestamp());
    ctx.put(&request)?;

    charge(ctx, requester, price, Purchase::Gacha)?;
    if tickets_used > 0 {
        let mut player = ctx.player(requester)?;
        ctx.guard
            .sub(&mut player.gacha_tickets, tickets_used, "player.gacha_tickets");
        ctx.put(&player)?;
    }
    bump_activity(ctx, requester, |a, g| {
        g.add(&mut a.gacha_requests, 1, "activity.gacha_requests");
    })?;

    ctx.audit(
        AuditEntry::new(AuditKind::GachaRequested)
            .actor(requester)
            .related(request_id)
            .details(json!({
                "rolls": rolls,
                "price": price.to_string(),
                "tickets_used": tickets_used,
            })),
    );
    Ok(())
}

pub(super) fn gacha_generated(
    ctx: &mut ApplyContext<'_>,
    request_id: &str,
    weapon_id: &TokenId,
    stats: WeaponStats,
) -> Result<()> {
    let request = require_open(ctx, request_id)?;
    let weapon = generate(ctx, weapon_id, request_id, stats, WeaponSource::Gacha)?;

    if let Some(requester) = &request.requester {
        let rarity = stats.rarity;
        bump_activity(ctx, requester, |a, g| {
            g.add(&mut a.gacha_weapons, 1, "activity.gacha_weapons");
            a.gacha_by_rarity
                .bump(&[rarity.index()], g, "activity.gacha_by_rarity");
        })?;
    } else {
        warn!(request = request_id, "Gacha request has no requester, rarity tally skipped");
        ctx.guard.skipped();
    }
    close_generated(ctx, request, &weapon.id)?;

    let mut entry = AuditEntry::new(AuditKind::GachaFulfilled)
        .related(weapon_id)
        .details(json!({ "request": request_id, "rarity": stats.rarity }));
    if let Some(owner) = &weapon.owner {
        entry = entry.actor(owner);
    }
    ctx.audit(entry);
    Ok(())
}

pub(super) fn remix_requested(
    ctx: &mut ApplyContext<'_>,
    request_id: &str,
    requester: &Address,
    weapons_used: u32,
    request_rarity: Rarity,
    price: u128,
) -> Result<()> {
    let Some(mut request) = open_request(ctx, request_id)? else {
        return Ok(());
    };
    request.kind = RequestKind::Remix;
    request.requester = Some(requester.clone());
    request.expected_weapons = 1;
    request.weapons_used = weapons_used;
    request.request_rarity = Some(request_rarity);
    request.price = price;
    request.requested_at = Some(ctx.timestamp());
    ctx.put(&request)?;

    charge(ctx, requester, price, Purchase::Remix)?;
    bump_activity(ctx, requester, |a, g| {
        g.add(&mut a.remix_requests, 1, "activity.remix_requests");
    })?;

    ctx.audit(
        AuditEntry::new(AuditKind::RemixRequested)
            .actor(requester)
            .related(request_id)
            .details(json!({
                "weapons_used": weapons_used,
                "request_rarity": request_rarity,
                "price": price.to_string(),
            })),
    );
    Ok(())
}

pub(super) fn remix_generated(
    ctx: &mut ApplyContext<'_>,
    request_id: &str,
    weapon_id: &TokenId,
    stats: WeaponStats,
) -> Result<()> {
    let request = require_open(ctx, request_id)?;
    let weapon = generate(ctx, weapon_id, request_id, stats, WeaponSource::Remixer)?;

    let outcome = remix_bucket(&request, stats.rarity);
    match (&request.requester, outcome) {
        (Some(requester), Some(bucket)) => {
            bump_activity(ctx, requester, |a, g| {
                a.remix_outcomes.bump(&bucket, g, "activity.remix_outcomes");
            })?;
        }
        _ => ctx.guard.skipped(),
    }
    close_generated(ctx, request, &weapon.id)?;

    let mut entry = AuditEntry::new(AuditKind::RemixFulfilled)
        .related(weapon_id)
        .details(json!({
            "request": request_id,
            "rarity": stats.rarity,
            "outcome": outcome.map(|b| b[2]),
        }));
    if let Some(owner) = &weapon.owner {
        entry = entry.actor(owner);
    }
    ctx.audit(entry);
    Ok(())
}

/// Load a request placeholder for filling in; a request that was already
/// filled is left alone.
fn open_request(ctx: &mut ApplyContext<'_>, request_id: &str) -> Result<Option<WeaponRequest>> {
    let request: WeaponRequest = ctx.load_or_default(request_id)?;
    if request.requested_at.is_some() {
        warn!(request = request_id, "Request id reused, ignored");
        return Ok(None);
    }
    Ok(Some(request))
}

/// Load a request whose request event has been applied.
fn require_open(ctx: &mut ApplyContext<'_>, request_id: &str) -> Result<WeaponRequest> {
    let request = ctx.require::<WeaponRequest>(request_id)?;
    if !request.is_open() {
        return Err(ctx.missing::<WeaponRequest>(request_id));
    }
    Ok(request)
}

/// Merge generated stats onto the weapon and refresh any wielder.
fn generate(
    ctx: &mut ApplyContext<'_>,
    weapon_id: &TokenId,
    request_id: &str,
    stats: WeaponStats,
    source: WeaponSource,
) -> Result<crate::entity::Weapon> {
    let mut edit = WeaponEdit::load_or_default(ctx, weapon_id)?;
    edit.weapon.merge_stats(stats, source);
    edit.weapon.request_id = Some(request_id.to_string());
    let weapon = edit.commit(ctx)?;
    refresh_wielder(ctx, &weapon)?;
    Ok(weapon)
}

/// Record a generated weapon on its request, deleting the request once
/// complete.
fn close_generated(ctx: &mut ApplyContext<'_>, mut request: WeaponRequest, weapon: &TokenId) -> Result<()> {
    if request.record_generated(weapon.clone()) {
        ctx.delete::<WeaponRequest>(&request.id);
        Ok(())
    } else {
        ctx.put(&request)
    }
}

/// `(type, source rarity, outcome)` of a remix, where type is weapons used
/// minus two and outcome is the rarity gain (0, 1 or 2).
fn remix_bucket(request: &WeaponRequest, generated: Rarity) -> Option<[usize; 3]> {
    let Some(source) = request.request_rarity else {
        warn!(request = %request.id, "Remix request has no source rarity, outcome skipped");
        return None;
    };
    let Some(kind) = request.weapons_used.checked_sub(REMIX_MIN_WEAPONS) else {
        warn!(request = %request.id, weapons_used = request.weapons_used, "Remix used too few weapons, outcome skipped");
        return None;
    };
    let Some(gain) = generated.index().checked_sub(source.index()) else {
        warn!(request = %request.id, ?source, ?generated, "Remix downgrade, outcome skipped");
        return None;
    };
    let kind = usize::try_from(kind).unwrap_or(usize::MAX);
    Some([kind, source.index(), gain])
}
