//! Core type definitions shared by every herostat module.
//!
//! Identifiers are string-backed so they can be used directly as store keys.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HerostatError;

// ---------------------------------------------------------------------------
// Cardinalities
// ---------------------------------------------------------------------------

/// Number of level buckets (levels `0..=100`).
pub const LEVEL_BUCKETS: usize = 101;
/// Number of rarity tiers.
pub const RARITY_BUCKETS: usize = 7;
/// Number of staking zones.
pub const ZONE_COUNT: usize = 4;
/// Remix recipes: 2, 3 or 4 weapons consumed.
pub const REMIX_TYPES: usize = 3;
/// Fewest weapons a remix can consume.
pub const REMIX_MIN_WEAPONS: u32 = 2;
/// Remix outcomes: equal rarity, +1, +2.
pub const REMIX_OUTCOMES: usize = 3;
/// Reward-item buckets per zone.
pub const REWARD_ITEM_BUCKETS: usize = 8;
/// Highest level a hero can reach.
pub const MAX_LEVEL: u8 = 100;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// A lowercased account address.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The null address used as `from` on mint and `to` on burn.
    pub const ZERO_STR: &'static str = "0x0000000000000000000000000000000000000000";

    /// Create an address, lowercasing it.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().to_ascii_lowercase())
    }

    /// The null address.
    #[must_use]
    pub fn zero() -> Self {
        Self(Self::ZERO_STR.to_string())
    }

    /// Whether this is the null address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == Self::ZERO_STR
    }

    /// Borrow the lowercased string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A token id in its canonical decimal string form.
///
/// Decimal ids are stored without leading zeros, so `"007"` and `7` name the
/// same token. Ids that are not decimal are kept verbatim. Decodes from a
/// JSON string or integer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "RawTokenId", into = "String")]
pub struct TokenId(String);

impl TokenId {
    /// Create a token id, canonicalising decimal forms.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        let raw = raw.as_ref().trim();
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            let digits = raw.trim_start_matches('0');
            Self(if digits.is_empty() { "0" } else { digits }.to_string())
        } else {
            Self(raw.to_string())
        }
    }

    /// Borrow the decimal string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Wire forms a token id may arrive in.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawTokenId {
    Number(u64),
    Text(String),
}

impl From<RawTokenId> for TokenId {
    fn from(raw: RawTokenId) -> Self {
        match raw {
            RawTokenId::Number(n) => Self::from(n),
            RawTokenId::Text(text) => Self::new(text),
        }
    }
}

impl From<u64> for TokenId {
    fn from(raw: u64) -> Self {
        Self(raw.to_string())
    }
}

impl From<&str> for TokenId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for TokenId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of a delivered event: `(chain, block, log index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId {
    /// Chain the log was emitted on.
    pub chain_id: u64,
    /// Block number.
    pub block_number: u64,
    /// Log index within the block.
    pub log_index: u32,
}

impl EventId {
    /// Create an event id.
    #[must_use]
    pub const fn new(chain_id: u64, block_number: u64, log_index: u32) -> Self {
        Self {
            chain_id,
            block_number,
            log_index,
        }
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.chain_id, self.block_number, self.log_index)
    }
}

// ---------------------------------------------------------------------------
// Rarity
// ---------------------------------------------------------------------------

/// Weapon rarity tier, `0 = Common` through `6 = Mythic`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Rarity {
    /// Tier 0.
    Common,
    /// Tier 1.
    Uncommon,
    /// Tier 2.
    Rare,
    /// Tier 3.
    Epic,
    /// Tier 4.
    Legendary,
    /// Tier 5.
    Ancient,
    /// Tier 6.
    Mythic,
}

impl Rarity {
    /// All tiers in ascending order.
    pub const ALL: [Self; RARITY_BUCKETS] = [
        Self::Common,
        Self::Uncommon,
        Self::Rare,
        Self::Epic,
        Self::Legendary,
        Self::Ancient,
        Self::Mythic,
    ];

    /// Bucket index of this tier.
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Rarity {
    type Error = HerostatError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(usize::from(raw))
            .copied()
            .ok_or(HerostatError::InvalidRarity(raw))
    }
}

impl From<Rarity> for u8 {
    fn from(rarity: Rarity) -> Self {
        rarity as u8
    }
}

// ---------------------------------------------------------------------------
// Zones & staking types
// ---------------------------------------------------------------------------

/// A staking zone, `0..ZONE_COUNT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Zone(u8);

impl Zone {
    /// Bucket index of this zone.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for Zone {
    type Error = HerostatError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        if usize::from(raw) < ZONE_COUNT {
            Ok(Self(raw))
        } else {
            Err(HerostatError::InvalidZone(raw))
        }
    }
}

impl From<Zone> for u8 {
    fn from(zone: Zone) -> Self {
        zone.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The activity a hero is staked into. Each maps to exactly one zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingType {
    /// Zone 0.
    Meadow,
    /// Zone 1.
    Forest,
    /// Zone 2.
    Mountain,
    /// Zone 3.
    Abyss,
}

impl StakingType {
    /// The zone this activity rewards into.
    #[must_use]
    pub fn zone(self) -> Zone {
        Zone(self as u8)
    }

    /// The activity for a zone.
    #[must_use]
    pub fn from_zone(zone: Zone) -> Self {
        match zone.0 {
            0 => Self::Meadow,
            1 => Self::Forest,
            2 => Self::Mountain,
            _ => Self::Abyss,
        }
    }
}

/// Where a weapon came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeaponSource {
    /// Minted directly by the weapon contract.
    #[default]
    Direct,
    /// Rolled from the gacha machine.
    Gacha,
    /// Produced by the remixer.
    Remixer,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_is_lowercased() {
        let a = Address::new("0xABCdef");
        assert_eq!(a.as_str(), "0xabcdef");
        assert_eq!(a, Address::from("0xabcDEF"));
    }

    #[test]
    fn address_deserialize_lowercases() {
        let a: Address = serde_json::from_str("\"0xDEAD\"").expect("parse");
        assert_eq!(a.as_str(), "0xdead");
    }

    #[test]
    fn zero_address_detected() {
        assert!(Address::zero().is_zero());
        assert!(Address::new(Address::ZERO_STR.to_uppercase()).is_zero());
        assert!(!Address::new("0x1").is_zero());
    }

    #[test]
    fn token_id_drops_leading_zeros() {
        assert_eq!(TokenId::from("007"), TokenId::from(7));
        assert_eq!(TokenId::from("000").as_str(), "0");
        assert_eq!(TokenId::from("abc").as_str(), "abc");
    }

    #[test]
    fn token_id_decodes_from_string_or_integer() {
        let text: TokenId = serde_json::from_str("\"0042\"").expect("string");
        let number: TokenId = serde_json::from_str("42").expect("integer");
        assert_eq!(text, number);
        assert_eq!(serde_json::to_string(&number).expect("encode"), "\"42\"");
    }

    #[test]
    fn event_id_orders_by_block_then_log() {
        let a = EventId::new(1, 10, 5);
        let b = EventId::new(1, 11, 0);
        let c = EventId::new(1, 11, 1);
        assert!(a < b && b < c);
        assert_eq!(a.to_string(), "1-10-5");
    }

    #[test]
    fn rarity_bounds() {
        assert_eq!(Rarity::try_from(6).expect("mythic"), Rarity::Mythic);
        assert!(matches!(
            Rarity::try_from(7),
            Err(HerostatError::InvalidRarity(7))
        ));
        assert!(serde_json::from_str::<Rarity>("9").is_err());
    }

    #[test]
    fn staking_type_zone_mapping_is_total() {
        for z in 0..ZONE_COUNT as u8 {
            let zone = Zone::try_from(z).expect("zone");
            assert_eq!(StakingType::from_zone(zone).zone(), zone);
        }
        assert!(Zone::try_from(4).is_err());
    }
}
