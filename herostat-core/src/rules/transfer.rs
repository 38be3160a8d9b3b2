//! Hero and weapon NFT transfers: mint, burn and change of holder.

use serde_json::json;
use tracing::{debug, warn};

use super::{HeroEdit, WeaponEdit};
use crate::audit::{AuditEntry, AuditKind};
use crate::engine::context::ApplyContext;
use crate::error::Result;
use crate::stats::GlobalStats;
use crate::types::{Address, TokenId};

pub(super) fn hero(
    ctx: &mut ApplyContext<'_>,
    from: &Address,
    to: &Address,
    token_id: &TokenId,
) -> Result<()> {
    if from.is_zero() && to.is_zero() {
        warn!(hero = %token_id, "Transfer between null addresses ignored");
        return Ok(());
    }
    if is_custody_move(ctx, from, to) {
        debug!(hero = %token_id, %from, %to, "Custody transfer ignored");
        return Ok(());
    }

    let mut edit = if from.is_zero() {
        HeroEdit::require(ctx, token_id)?
    } else {
        HeroEdit::require_minted(ctx, token_id)?
    };

    if to.is_zero() {
        detach_weapon_on_burn(ctx, &mut edit)?;
        edit.retire(ctx)?;
        count(ctx, Lifecycle::HeroBurned)?;
        ctx.audit(
            AuditEntry::new(AuditKind::HeroBurned)
                .actor(from)
                .related(token_id),
        );
        return Ok(());
    }

    let minting = from.is_zero();
    if minting {
        if edit.hero.owner.is_some() {
            warn!(hero = %token_id, "Mint of an already owned hero, treated as transfer");
        } else {
            edit.hero.minted_at = Some(ctx.timestamp());
        }
    } else if edit.hero.owner.as_ref() != Some(from) {
        warn!(
            hero = %token_id,
            %from,
            recorded = ?edit.hero.owner,
            "Transfer sender is not the recorded owner"
        );
    }
    edit.hero.owner = Some(to.clone());
    edit.commit(ctx)?;

    if minting {
        count(ctx, Lifecycle::HeroMinted)?;
        ctx.audit(
            AuditEntry::new(AuditKind::HeroMinted)
                .actor(to)
                .related(token_id),
        );
    } else {
        ctx.audit(
            AuditEntry::new(AuditKind::HeroTransferred)
                .actor(from)
                .related(token_id)
                .details(json!({ "from": from, "to": to })),
        );
    }
    Ok(())
}

pub(super) fn weapon(
    ctx: &mut ApplyContext<'_>,
    from: &Address,
    to: &Address,
    token_id: &TokenId,
) -> Result<()> {
    if from.is_zero() && to.is_zero() {
        warn!(weapon = %token_id, "Transfer between null addresses ignored");
        return Ok(());
    }
    if is_custody_move(ctx, from, to) {
        debug!(weapon = %token_id, %from, %to, "Custody transfer ignored");
        return Ok(());
    }

    let mut edit = if from.is_zero() {
        WeaponEdit::require(ctx, token_id)?
    } else {
        WeaponEdit::require_minted(ctx, token_id)?
    };

    if to.is_zero() {
        if edit.weapon.equipped_hero.is_some() {
            warn!(weapon = %token_id, "Burned weapon was still equipped, detaching");
            unequip_from_wielder(ctx, &mut edit)?;
        }
        edit.retire(ctx)?;
        count(ctx, Lifecycle::WeaponBurned)?;
        ctx.audit(
            AuditEntry::new(AuditKind::WeaponBurned)
                .actor(from)
                .related(token_id),
        );
        return Ok(());
    }

    let minting = from.is_zero();
    if minting {
        if edit.weapon.minted {
            warn!(weapon = %token_id, "Mint of an already minted weapon, treated as transfer");
        } else {
            edit.weapon.minted = true;
            edit.weapon.minted_at = Some(ctx.timestamp());
        }
    }
    if edit.weapon.equipped_hero.is_some() {
        warn!(weapon = %token_id, "Transfer of an equipped weapon, detaching");
        unequip_from_wielder(ctx, &mut edit)?;
    }
    edit.weapon.owner = Some(to.clone());
    edit.commit(ctx)?;

    if minting {
        count(ctx, Lifecycle::WeaponMinted)?;
        ctx.audit(
            AuditEntry::new(AuditKind::WeaponMinted)
                .actor(to)
                .related(token_id),
        );
    } else {
        ctx.audit(
            AuditEntry::new(AuditKind::WeaponTransferred)
                .actor(from)
                .related(token_id)
                .details(json!({ "from": from, "to": to })),
        );
    }
    Ok(())
}

/// Moves into or out of a custody contract are equip plumbing, not ownership
/// changes.
fn is_custody_move(ctx: &ApplyContext<'_>, from: &Address, to: &Address) -> bool {
    let contracts = &ctx.config().contracts;
    contracts.is_custody(from) || contracts.is_custody(to)
}

/// A burned hero hands its equipped weapon back to its last owner.
fn detach_weapon_on_burn(ctx: &mut ApplyContext<'_>, edit: &mut HeroEdit) -> Result<()> {
    let Some(weapon_id) = edit.hero.equipped_weapon.take() else {
        return Ok(());
    };
    match WeaponEdit::load(ctx, &weapon_id)? {
        Some(mut weapon) => {
            warn!(hero = %edit.hero.id, weapon = %weapon_id, "Burned hero had a weapon equipped, returned to owner");
            weapon.weapon.equipped_hero = None;
            weapon.weapon.owner.clone_from(&edit.hero.owner);
            weapon.commit(ctx)?;
        }
        None => {
            warn!(hero = %edit.hero.id, weapon = %weapon_id, "Burned hero referenced a missing weapon");
        }
    }
    edit.hero.recompute(None);
    Ok(())
}

/// Take `edit`'s weapon off the hero wielding it.
fn unequip_from_wielder(ctx: &mut ApplyContext<'_>, edit: &mut WeaponEdit) -> Result<()> {
    let Some(hero_id) = edit.weapon.equipped_hero.take() else {
        return Ok(());
    };
    if let Some(mut hero) = HeroEdit::load(ctx, &hero_id)? {
        if hero.hero.equipped_weapon.as_ref() == Some(&edit.weapon.id) {
            hero.hero.equipped_weapon = None;
            hero.hero.recompute(None);
            hero.commit(ctx)?;
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Lifecycle {
    HeroMinted,
    HeroBurned,
    WeaponMinted,
    WeaponBurned,
}

fn count(ctx: &mut ApplyContext<'_>, what: Lifecycle) -> Result<()> {
    let mut global: GlobalStats = ctx.load_or_default(GlobalStats::ID)?;
    let (slot, field) = match what {
        Lifecycle::HeroMinted => (&mut global.heroes_minted, "global.heroes_minted"),
        Lifecycle::HeroBurned => (&mut global.heroes_burned, "global.heroes_burned"),
        Lifecycle::WeaponMinted => (&mut global.weapons_minted, "global.weapons_minted"),
        Lifecycle::WeaponBurned => (&mut global.weapons_burned, "global.weapons_burned"),
    };
    ctx.guard.add(slot, 1, field);
    ctx.put(&global)
}
