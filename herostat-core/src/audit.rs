//! Append-only audit records, one per meaningful domain action.
//!
//! Audit records are write-only from the engine's point of view. They are
//! keyed by the originating event id so a redelivered event overwrites its
//! own records instead of adding new ones.

use serde::{Deserialize, Serialize};

use crate::entity::{Record, RecordKind};
use crate::types::{Address, EventId, StakingType};

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// Hero minted.
    HeroMinted,
    /// Hero changed owner.
    HeroTransferred,
    /// Hero burned.
    HeroBurned,
    /// Weapon minted.
    WeaponMinted,
    /// Weapon changed owner.
    WeaponTransferred,
    /// Weapon burned.
    WeaponBurned,
    /// Hero entered an activity.
    HeroStaked,
    /// Hero revealed on its first stake.
    HeroRevealed,
    /// Unstake requested.
    UnstakeRequested,
    /// Hero left its activity.
    HeroUnstaked,
    /// Rewards claimed.
    RewardsClaimed,
    /// Hero died.
    HeroDied,
    /// Hero revived.
    HeroRevived,
    /// Hero trained.
    HeroTrained,
    /// Weapon equipped.
    WeaponEquipped,
    /// Weapon unequipped.
    WeaponUnequipped,
    /// Weapon repaired.
    WeaponRepaired,
    /// Weapon sharpened.
    WeaponSharpened,
    /// Gacha rolls purchased.
    GachaRequested,
    /// Gacha weapon delivered.
    GachaFulfilled,
    /// Remix requested.
    RemixRequested,
    /// Remix weapon delivered.
    RemixFulfilled,
}

/// One audit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// `"{event}"` for the first record of an event, `"{event}/{n}"` after.
    pub id: String,
    /// Block timestamp.
    pub timestamp: u64,
    /// Account that performed the action, when there is one.
    pub actor: Option<Address>,
    /// Action.
    pub kind: AuditKind,
    /// Free-form details. Wei amounts are decimal strings.
    pub details: serde_json::Value,
    /// Token or request the action concerns.
    pub related_entity: Option<String>,
    /// Contract that emitted the event.
    pub origin_contract: Address,
    /// Activity the hero was in, for staking actions.
    pub staking_context: Option<StakingType>,
}

impl AuditRecord {
    /// Id of the `seq`-th audit record produced by `event`.
    #[must_use]
    pub fn id_for(event: EventId, seq: u32) -> String {
        if seq == 0 {
            event.to_string()
        } else {
            format!("{event}/{seq}")
        }
    }
}

impl Record for AuditRecord {
    const KIND: RecordKind = RecordKind::Audit;

    fn id(&self) -> String {
        self.id.clone()
    }
}

/// The parts of an audit record a rule supplies; the engine fills in id,
/// timestamp and origin.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    /// Action.
    pub kind: AuditKind,
    /// Acting account.
    pub actor: Option<Address>,
    /// Related token or request.
    pub related_entity: Option<String>,
    /// Details blob.
    pub details: serde_json::Value,
    /// Staking activity, if relevant.
    pub staking_context: Option<StakingType>,
}

impl AuditEntry {
    /// An entry with empty details.
    #[must_use]
    pub fn new(kind: AuditKind) -> Self {
        Self {
            kind,
            actor: None,
            related_entity: None,
            details: serde_json::Value::Null,
            staking_context: None,
        }
    }

    /// Set the actor.
    #[must_use]
    pub fn actor(mut self, actor: &Address) -> Self {
        self.actor = Some(actor.clone());
        self
    }

    /// Set the related entity.
    #[must_use]
    pub fn related(mut self, id: impl ToString) -> Self {
        self.related_entity = Some(id.to_string());
        self
    }

    /// Set the details blob.
    #[must_use]
    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Set the staking context.
    #[must_use]
    pub fn staking(mut self, staking_type: Option<StakingType>) -> Self {
        self.staking_context = staking_type;
        self
    }
}
