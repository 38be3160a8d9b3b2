//! Equipping and unequipping weapons.
//!
//! An equipped weapon leaves its holder's free holdings and feeds the hero's
//! reward profile instead; both moves happen through footprint swaps, so
//! equip followed by unequip nets to zero on every tier.

use serde_json::json;
use tracing::{debug, warn};

use super::{HeroEdit, WeaponEdit};
use crate::audit::{AuditEntry, AuditKind};
use crate::engine::context::ApplyContext;
use crate::error::Result;
use crate::types::{Address, TokenId};

pub(super) fn equip(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    weapon_id: &TokenId,
    owner: &Address,
) -> Result<()> {
    let mut hero = HeroEdit::require_minted(ctx, hero_id)?;
    let mut weapon = WeaponEdit::require_minted(ctx, weapon_id)?;

    if hero.hero.equipped_weapon.as_ref() == Some(weapon_id)
        && weapon.weapon.equipped_hero.as_ref() == Some(hero_id)
    {
        debug!(hero = %hero_id, weapon = %weapon_id, "Weapon already equipped, no change");
        return Ok(());
    }

    if let Some(other) = weapon.weapon.equipped_hero.clone() {
        if &other != hero_id {
            warn!(weapon = %weapon_id, from = %other, to = %hero_id, "Weapon moved between heroes without unequip");
            release_hero(ctx, &other, weapon_id)?;
        }
    }
    if let Some(previous) = hero.hero.equipped_weapon.clone() {
        if &previous != weapon_id {
            warn!(hero = %hero_id, previous = %previous, "Implicit unequip of previous weapon");
            return_weapon(ctx, &previous, hero.hero.owner.as_ref().unwrap_or(owner))?;
        }
    }

    weapon.weapon.owner = None;
    weapon.weapon.equipped_hero = Some(hero_id.clone());
    let weapon = weapon.commit(ctx)?;

    hero.hero.equipped_weapon = Some(weapon_id.clone());
    hero.hero.recompute(Some(&weapon));
    let hero = hero.commit(ctx)?;

    ctx.audit(
        AuditEntry::new(AuditKind::WeaponEquipped)
            .actor(owner)
            .related(hero_id)
            .details(json!({
                "weapon": weapon_id,
                "rarity": weapon.rarity,
                "damage": hero.rewards.damage,
            })),
    );
    Ok(())
}

pub(super) fn unequip(
    ctx: &mut ApplyContext<'_>,
    hero_id: &TokenId,
    weapon_id: &TokenId,
    owner: &Address,
) -> Result<()> {
    let mut hero = HeroEdit::require_minted(ctx, hero_id)?;
    let mut weapon = WeaponEdit::require_minted(ctx, weapon_id)?;

    let hero_holds = hero.hero.equipped_weapon.as_ref() == Some(weapon_id);
    let weapon_on_hero = weapon.weapon.equipped_hero.as_ref() == Some(hero_id);
    if !hero_holds && !weapon_on_hero {
        warn!(hero = %hero_id, weapon = %weapon_id, "Unequip of a weapon that is not equipped, ignored");
        return Ok(());
    }
    if hero_holds != weapon_on_hero {
        warn!(hero = %hero_id, weapon = %weapon_id, hero_holds, weapon_on_hero, "Equip links disagree, clearing both");
    }

    let holder = hero.hero.owner.clone().unwrap_or_else(|| owner.clone());
    if hero_holds {
        hero.hero.equipped_weapon = None;
        hero.hero.recompute(None);
        hero.commit(ctx)?;
    }
    if weapon_on_hero {
        weapon.weapon.equipped_hero = None;
        weapon.weapon.owner = Some(holder);
        weapon.commit(ctx)?;
    }

    ctx.audit(
        AuditEntry::new(AuditKind::WeaponUnequipped)
            .actor(owner)
            .related(hero_id)
            .details(json!({ "weapon": weapon_id })),
    );
    Ok(())
}

/// Clear `hero_id`'s link to `weapon_id`.
fn release_hero(ctx: &mut ApplyContext<'_>, hero_id: &TokenId, weapon_id: &TokenId) -> Result<()> {
    let Some(mut edit) = HeroEdit::load(ctx, hero_id)? else {
        return Ok(());
    };
    if edit.hero.equipped_weapon.as_ref() == Some(weapon_id) {
        edit.hero.equipped_weapon = None;
        edit.hero.recompute(None);
        edit.commit(ctx)?;
    }
    Ok(())
}

/// Hand a weapon taken off a hero back to `holder`.
fn return_weapon(ctx: &mut ApplyContext<'_>, weapon_id: &TokenId, holder: &Address) -> Result<()> {
    let Some(mut edit) = WeaponEdit::load(ctx, weapon_id)? else {
        warn!(weapon = %weapon_id, "Previously equipped weapon missing");
        return Ok(());
    };
    edit.weapon.equipped_hero = None;
    edit.weapon.owner = Some(holder.clone());
    edit.commit(ctx)?;
    Ok(())
}
