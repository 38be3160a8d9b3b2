//! Weapon upkeep: repair, sharpening and reported wear.

use serde_json::json;
use tracing::{debug, warn};

use super::{Purchase, WeaponEdit, bump_activity, charge, refresh_wielder};
use crate::audit::{AuditEntry, AuditKind};
use crate::engine::context::ApplyContext;
use crate::error::Result;
use crate::types::{Address, TokenId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upkeep {
    Repair,
    Sharpen,
}

pub(super) fn repair(
    ctx: &mut ApplyContext<'_>,
    weapon_id: &TokenId,
    owner: &Address,
    cost: u128,
) -> Result<()> {
    upkeep(ctx, weapon_id, owner, cost, Upkeep::Repair)
}

pub(super) fn sharpen(
    ctx: &mut ApplyContext<'_>,
    weapon_id: &TokenId,
    owner: &Address,
    cost: u128,
) -> Result<()> {
    upkeep(ctx, weapon_id, owner, cost, Upkeep::Sharpen)
}

fn upkeep(
    ctx: &mut ApplyContext<'_>,
    weapon_id: &TokenId,
    owner: &Address,
    cost: u128,
    kind: Upkeep,
) -> Result<()> {
    let mut edit = WeaponEdit::require_minted(ctx, weapon_id)?;
    let w = &mut edit.weapon;
    let g = &mut ctx.guard;
    match kind {
        Upkeep::Repair => {
            if w.has_metadata() && w.max_durability > 0 {
                w.set_durability(w.max_durability);
            } else {
                warn!(weapon = %weapon_id, "Max durability unknown, durability left as is");
            }
            g.add(&mut w.repaired_count, 1, "weapon.repaired_count");
            g.add(&mut w.repair_spent, cost, "weapon.repair_spent");
        }
        Upkeep::Sharpen => {
            if w.has_metadata() {
                w.sharpness = Some(w.max_sharpness);
            } else {
                warn!(weapon = %weapon_id, "Max sharpness unknown, sharpness left as is");
            }
            g.add(&mut w.sharpened_count, 1, "weapon.sharpened_count");
            g.add(&mut w.sharpen_spent, cost, "weapon.sharpen_spent");
        }
    }
    let rarity = w.rarity;
    let weapon = edit.commit(ctx)?;
    if kind == Upkeep::Sharpen {
        refresh_wielder(ctx, &weapon)?;
    }

    let purchase = match kind {
        Upkeep::Repair => Purchase::Repair,
        Upkeep::Sharpen => Purchase::Sharpen,
    };
    charge(ctx, owner, cost, purchase)?;

    match rarity {
        Some(rarity) => bump_activity(ctx, owner, |a, g| match kind {
            Upkeep::Repair => a
                .repairs_by_rarity
                .bump(&[rarity.index()], g, "activity.repairs_by_rarity"),
            Upkeep::Sharpen => a
                .sharpens_by_rarity
                .bump(&[rarity.index()], g, "activity.sharpens_by_rarity"),
        })?,
        None => {
            warn!(weapon = %weapon_id, ?kind, "Weapon rarity unknown, rarity bucket skipped");
            ctx.guard.skipped();
        }
    }

    let audit = match kind {
        Upkeep::Repair => AuditKind::WeaponRepaired,
        Upkeep::Sharpen => AuditKind::WeaponSharpened,
    };
    ctx.audit(
        AuditEntry::new(audit)
            .actor(owner)
            .related(weapon_id)
            .details(json!({
                "cost": cost.to_string(),
                "rarity": rarity,
                "durability": weapon.durability,
                "sharpness": weapon.sharpness,
            })),
    );
    Ok(())
}

pub(super) fn wear(
    ctx: &mut ApplyContext<'_>,
    weapon_id: &TokenId,
    durability: Option<u32>,
    sharpness: Option<u32>,
) -> Result<()> {
    if durability.is_none() && sharpness.is_none() {
        debug!(weapon = %weapon_id, "Wear update carries no values");
        return Ok(());
    }
    let mut edit = WeaponEdit::require_minted(ctx, weapon_id)?;
    if let Some(durability) = durability {
        edit.weapon.set_durability(durability);
    }
    let sharpness_changed = sharpness.is_some_and(|s| edit.weapon.sharpness != Some(s));
    if let Some(sharpness) = sharpness {
        edit.weapon.sharpness = Some(sharpness);
    }
    let weapon = edit.commit(ctx)?;
    if sharpness_changed {
        refresh_wielder(ctx, &weapon)?;
    }
    Ok(())
}
