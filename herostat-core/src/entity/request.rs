//! Ephemeral multi-step mint requests (gacha rolls and remixes).

use serde::{Deserialize, Serialize};

use super::{Factory, Record, RecordKind};
use crate::types::{Address, Rarity, TokenId};

/// Which machine a request was made to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// Gacha machine roll.
    #[default]
    Gacha,
    /// Remixer combination.
    Remix,
}

/// A pending request, deleted once every expected weapon was generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeaponRequest {
    /// Request id as emitted by the contract.
    pub id: String,
    /// Machine.
    pub kind: RequestKind,
    /// Account that paid for the request.
    pub requester: Option<Address>,
    /// Weapons the request will produce.
    pub expected_weapons: u32,
    /// Weapons generated so far.
    pub generated_weapons: u32,
    /// Rarity of the remix inputs.
    pub request_rarity: Option<Rarity>,
    /// Number of weapons consumed by a remix.
    pub weapons_used: u32,
    /// Price paid (wei).
    pub price: u128,
    /// Block time of the request.
    pub requested_at: Option<u64>,
    /// Weapons generated so far.
    pub generated_ids: Vec<TokenId>,
}

impl WeaponRequest {
    /// An empty request placeholder.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: RequestKind::Gacha,
            requester: None,
            expected_weapons: 0,
            generated_weapons: 0,
            request_rarity: None,
            weapons_used: 0,
            price: 0,
            requested_at: None,
            generated_ids: Vec::new(),
        }
    }

    /// Record one generated weapon; returns `true` once the request is
    /// complete.
    pub fn record_generated(&mut self, weapon: TokenId) -> bool {
        if !self.generated_ids.contains(&weapon) {
            self.generated_ids.push(weapon);
            self.generated_weapons = self.generated_weapons.saturating_add(1);
        }
        self.is_complete()
    }

    /// Whether the request event has been applied, as opposed to a
    /// placeholder created ahead of it.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.requested_at.is_some()
    }

    /// Whether every expected weapon has been generated.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.expected_weapons > 0 && self.generated_weapons >= self.expected_weapons
    }
}

impl Record for WeaponRequest {
    const KIND: RecordKind = RecordKind::Request;

    fn id(&self) -> String {
        self.id.clone()
    }
}

impl Factory for WeaponRequest {
    fn with_defaults(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_after_expected_weapons() {
        let mut r = WeaponRequest::new("req-1");
        r.expected_weapons = 2;
        assert!(!r.record_generated(TokenId::from(10)));
        assert!(r.record_generated(TokenId::from(11)));
    }

    #[test]
    fn duplicate_weapon_not_counted_twice() {
        let mut r = WeaponRequest::new("req-1");
        r.expected_weapons = 2;
        r.record_generated(TokenId::from(10));
        assert!(!r.record_generated(TokenId::from(10)));
        assert_eq!(r.generated_weapons, 1);
    }

    #[test]
    fn placeholder_is_never_complete() {
        let r = WeaponRequest::with_defaults("x");
        assert!(!r.is_complete());
        assert!(!r.is_open());
    }
}
