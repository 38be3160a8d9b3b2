//! Weapon records: holder, rarity, wear and provenance.

use serde::{Deserialize, Serialize};

use super::{Factory, Record, RecordKind};
use crate::formula::Armament;
use crate::types::{Address, Rarity, TokenId, WeaponSource};

/// Stats announced by a metadata or generation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponStats {
    /// Rarity tier.
    pub rarity: Rarity,
    /// Weapon type id.
    pub weapon_type: u8,
    /// Maximum durability.
    pub max_durability: u32,
    /// Maximum sharpness.
    pub max_sharpness: u32,
}

/// A weapon token.
///
/// A weapon is either held freely by `owner` or equipped on `equipped_hero`;
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weapon {
    /// Token id.
    pub id: TokenId,
    /// Free holder.
    pub owner: Option<Address>,
    /// Hero the weapon is equipped on.
    pub equipped_hero: Option<TokenId>,
    /// Whether the mint transfer has been applied.
    pub minted: bool,
    /// Block time of the mint.
    pub minted_at: Option<u64>,

    /// Rarity; unset until metadata arrives.
    pub rarity: Option<Rarity>,
    /// Weapon type id; unset until metadata arrives.
    pub weapon_type: Option<u8>,
    /// Current durability; unset until metadata arrives.
    pub durability: Option<u32>,
    /// Maximum durability.
    pub max_durability: u32,
    /// Current sharpness; unset until metadata arrives.
    pub sharpness: Option<u32>,
    /// Maximum sharpness.
    pub max_sharpness: u32,
    /// `durability == Some(0)`.
    pub broken: bool,

    /// Where the weapon came from.
    pub source: WeaponSource,
    /// Gacha or remix request that produced it.
    pub request_id: Option<String>,

    /// Repairs performed.
    pub repaired_count: u32,
    /// Sharpenings performed.
    pub sharpened_count: u32,
    /// Spent on repairs (wei).
    pub repair_spent: u128,
    /// Spent on sharpening (wei).
    pub sharpen_spent: u128,
}

impl Weapon {
    /// A zero weapon with no holder and no metadata.
    #[must_use]
    pub fn new(id: TokenId) -> Self {
        Self {
            id,
            owner: None,
            equipped_hero: None,
            minted: false,
            minted_at: None,
            rarity: None,
            weapon_type: None,
            durability: None,
            max_durability: 0,
            sharpness: None,
            max_sharpness: 0,
            broken: false,
            source: WeaponSource::Direct,
            request_id: None,
            repaired_count: 0,
            sharpened_count: 0,
            repair_spent: 0,
            sharpen_spent: 0,
        }
    }

    /// Merge announced stats onto the record. Current durability and
    /// sharpness are initialised to max only if not already set.
    pub fn merge_stats(&mut self, stats: WeaponStats, source: WeaponSource) {
        self.rarity = Some(stats.rarity);
        self.weapon_type = Some(stats.weapon_type);
        self.max_durability = stats.max_durability;
        self.max_sharpness = stats.max_sharpness;
        self.source = source;
        if self.durability.is_none() {
            self.durability = Some(stats.max_durability);
        }
        if self.sharpness.is_none() {
            self.sharpness = Some(stats.max_sharpness);
        }
        self.sync_broken();
    }

    /// Set current durability and keep `broken` in step.
    pub fn set_durability(&mut self, durability: u32) {
        self.durability = Some(durability);
        self.sync_broken();
    }

    fn sync_broken(&mut self) {
        self.broken = self.durability == Some(0);
    }

    /// Inputs to the reward formula, if the rarity is known.
    #[must_use]
    pub fn armament(&self) -> Option<Armament> {
        self.rarity.map(|rarity| Armament {
            rarity,
            sharpness: self.sharpness.unwrap_or(0),
            max_sharpness: self.max_sharpness,
        })
    }

    /// Whether the mint has been applied. A record that was never minted,
    /// has no holder and no wielder is a placeholder created ahead of its
    /// mint.
    #[must_use]
    pub fn is_minted(&self) -> bool {
        self.minted || self.owner.is_some() || self.equipped_hero.is_some()
    }

    /// Whether metadata (rarity and max stats) has arrived.
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        self.rarity.is_some()
    }

    /// The player this weapon is attributed to while free.
    #[must_use]
    pub fn free_owner(&self) -> Option<&Address> {
        if self.equipped_hero.is_some() {
            None
        } else {
            self.owner.as_ref()
        }
    }

    /// Violations of the durability and holder invariants, if any.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.broken != (self.durability == Some(0)) {
            out.push(format!("weapon {}: broken flag disagrees with durability", self.id));
        }
        if self.owner.is_some() && self.equipped_hero.is_some() {
            out.push(format!("weapon {}: both owned and equipped", self.id));
        }
        out
    }
}

impl Record for Weapon {
    const KIND: RecordKind = RecordKind::Weapon;

    fn id(&self) -> String {
        self.id.to_string()
    }
}

impl Factory for Weapon {
    fn with_defaults(id: &str) -> Self {
        Self::new(TokenId::from(id))
    }
}
