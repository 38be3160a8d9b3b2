//! Typed domain events.
//!
//! One variant per contract event family. Events arrive already decoded; the
//! engine never sees raw log bytes. Each event can list the records it will
//! touch ([`DomainEvent::references`]) so they can be prefetched ahead of
//! application.

use serde::{Deserialize, Serialize};

use crate::entity::weapon::WeaponStats;
use crate::entity::{RecordKey, RecordKind};
use crate::types::{Address, EventId, Rarity, StakingType, TokenId};

/// A decoded event with its delivery metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Stable identifier `(chain, block, log index)`.
    pub id: EventId,
    /// Block timestamp, seconds.
    pub timestamp: u64,
    /// Contract that emitted the log.
    pub contract: Address,
    /// The decoded event.
    pub event: DomainEvent,
}

/// One reward item paid out on unstake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardItem {
    /// Item token id.
    pub token_id: TokenId,
    /// Quantity.
    pub amount: u64,
}

/// Every event family the engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    /// Hero NFT transfer. `from` zero is a mint, `to` zero is a burn.
    HeroTransfer {
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Hero token.
        token_id: TokenId,
    },
    /// Weapon NFT transfer. `from` zero is a mint, `to` zero is a burn.
    WeaponTransfer {
        /// Sender.
        from: Address,
        /// Recipient.
        to: Address,
        /// Weapon token.
        token_id: TokenId,
    },
    /// Stats of a directly minted weapon.
    WeaponMetadata {
        /// Weapon token.
        token_id: TokenId,
        /// Announced stats.
        stats: WeaponStats,
    },
    /// A hero entered a staking activity.
    Staked {
        /// Hero token.
        hero: TokenId,
        /// Staker.
        owner: Address,
        /// Activity.
        staking_type: StakingType,
    },
    /// The owner asked to leave the activity.
    UnstakeRequested {
        /// Hero token.
        hero: TokenId,
        /// Staker.
        owner: Address,
    },
    /// A hero left its activity and was paid out.
    Unstaked {
        /// Hero token.
        hero: TokenId,
        /// Staker.
        owner: Address,
        /// Activity the payout belongs to.
        staking_type: StakingType,
        /// Reward tokens paid (wei).
        #[serde(with = "wei")]
        reward_amount: u128,
        /// Shards paid.
        #[serde(default)]
        shards: u64,
        /// Gacha tickets paid.
        #[serde(default)]
        gacha_tickets: u64,
        /// Reward items paid.
        #[serde(default)]
        reward_items: Vec<RewardItem>,
    },
    /// Rewards claimed without leaving the activity.
    RewardsClaimed {
        /// Hero token.
        hero: TokenId,
        /// Staker.
        owner: Address,
        /// Activity the payout belongs to.
        staking_type: StakingType,
        /// Reward tokens paid (wei).
        #[serde(with = "wei")]
        amount: u128,
    },
    /// A hero died in its activity.
    HeroDied {
        /// Hero token.
        hero: TokenId,
    },
    /// A dead hero was revived.
    HeroRevived {
        /// Hero token.
        hero: TokenId,
        /// Payer.
        owner: Address,
        /// Revival price (wei).
        #[serde(with = "wei", default)]
        cost: u128,
    },
    /// A hero was trained to a new level.
    HeroTrained {
        /// Hero token.
        hero: TokenId,
        /// Payer.
        owner: Address,
        /// Level after training.
        new_level: u8,
    },
    /// A weapon was equipped on a hero.
    WeaponEquipped {
        /// Hero token.
        hero: TokenId,
        /// Weapon token.
        weapon: TokenId,
        /// Owner of both.
        owner: Address,
    },
    /// A weapon was taken off a hero.
    WeaponUnequipped {
        /// Hero token.
        hero: TokenId,
        /// Weapon token.
        weapon: TokenId,
        /// Owner of both.
        owner: Address,
    },
    /// Durability restored to max.
    WeaponRepaired {
        /// Weapon token.
        weapon: TokenId,
        /// Payer.
        owner: Address,
        /// Price (wei).
        #[serde(with = "wei")]
        cost: u128,
    },
    /// Sharpness restored to max.
    WeaponSharpened {
        /// Weapon token.
        weapon: TokenId,
        /// Payer.
        owner: Address,
        /// Price (wei).
        #[serde(with = "wei")]
        cost: u128,
    },
    /// Wear reported by the game (durability or sharpness dropped).
    WeaponWearUpdated {
        /// Weapon token.
        weapon: TokenId,
        /// New durability, if reported.
        #[serde(default)]
        durability: Option<u32>,
        /// New sharpness, if reported.
        #[serde(default)]
        sharpness: Option<u32>,
    },
    /// Gacha rolls purchased.
    GachaRequested {
        /// Request id.
        request_id: String,
        /// Buyer.
        requester: Address,
        /// Weapons the request will produce.
        rolls: u32,
        /// Price (wei).
        #[serde(with = "wei")]
        price: u128,
        /// Tickets consumed instead of (or as well as) tokens.
        #[serde(default)]
        tickets_used: u64,
    },
    /// One gacha weapon produced.
    GachaWeaponGenerated {
        /// Request id.
        request_id: String,
        /// Weapon token.
        weapon: TokenId,
        /// Rolled stats.
        stats: WeaponStats,
    },
    /// A remix was requested.
    RemixRequested {
        /// Request id.
        request_id: String,
        /// Buyer.
        requester: Address,
        /// Weapons consumed (2, 3 or 4).
        weapons_used: u32,
        /// Rarity of the consumed weapons.
        request_rarity: Rarity,
        /// Price (wei).
        #[serde(with = "wei")]
        price: u128,
    },
    /// A remix produced its weapon.
    RemixWeaponGenerated {
        /// Request id.
        request_id: String,
        /// Weapon token.
        weapon: TokenId,
        /// Rolled stats.
        stats: WeaponStats,
    },
}

/// How prefetch treats a referenced record that does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    /// Create it with factory defaults.
    CreateIfAbsent,
    /// Required; absence is an ordering violation at apply time.
    MustExist,
    /// Absence is expected and tolerated.
    Optional,
}

/// A record an event will touch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Record address.
    pub key: RecordKey,
    /// Creation policy.
    pub presence: Presence,
}

impl Reference {
    fn new(kind: RecordKind, id: impl Into<String>, presence: Presence) -> Self {
        Self {
            key: RecordKey::new(kind, id),
            presence,
        }
    }

    fn player(address: &Address) -> Option<Self> {
        (!address.is_zero())
            .then(|| Self::new(RecordKind::Player, address.as_str(), Presence::CreateIfAbsent))
    }
}

impl DomainEvent {
    /// Stable family name, used in logs and audit details.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::HeroTransfer { .. } => "hero_transfer",
            Self::WeaponTransfer { .. } => "weapon_transfer",
            Self::WeaponMetadata { .. } => "weapon_metadata",
            Self::Staked { .. } => "staked",
            Self::UnstakeRequested { .. } => "unstake_requested",
            Self::Unstaked { .. } => "unstaked",
            Self::RewardsClaimed { .. } => "rewards_claimed",
            Self::HeroDied { .. } => "hero_died",
            Self::HeroRevived { .. } => "hero_revived",
            Self::HeroTrained { .. } => "hero_trained",
            Self::WeaponEquipped { .. } => "weapon_equipped",
            Self::WeaponUnequipped { .. } => "weapon_unequipped",
            Self::WeaponRepaired { .. } => "weapon_repaired",
            Self::WeaponSharpened { .. } => "weapon_sharpened",
            Self::WeaponWearUpdated { .. } => "weapon_wear_updated",
            Self::GachaRequested { .. } => "gacha_requested",
            Self::GachaWeaponGenerated { .. } => "gacha_weapon_generated",
            Self::RemixRequested { .. } => "remix_requested",
            Self::RemixWeaponGenerated { .. } => "remix_weapon_generated",
        }
    }

    /// Records this event touches directly, with their creation policy.
    ///
    /// Second-level references (a hero's owner, its equipped weapon, a
    /// weapon's holder) are discovered by prefetch from the fetched records.
    #[must_use]
    pub fn references(&self) -> Vec<Reference> {
        use Presence::{CreateIfAbsent, MustExist, Optional};
        use RecordKind::{Hero, Request, Weapon};

        let mut refs = Vec::new();
        match self {
            Self::HeroTransfer { from, to, token_id } => {
                let presence = if from.is_zero() { CreateIfAbsent } else { MustExist };
                refs.push(Reference::new(Hero, token_id.as_str(), presence));
                refs.extend(Reference::player(from));
                refs.extend(Reference::player(to));
            }
            Self::WeaponTransfer { from, to, token_id } => {
                let presence = if from.is_zero() { CreateIfAbsent } else { MustExist };
                refs.push(Reference::new(Weapon, token_id.as_str(), presence));
                refs.extend(Reference::player(from));
                refs.extend(Reference::player(to));
            }
            Self::WeaponMetadata { token_id, .. } => {
                refs.push(Reference::new(Weapon, token_id.as_str(), CreateIfAbsent));
            }
            Self::Staked { hero, owner, .. }
            | Self::Unstaked { hero, owner, .. }
            | Self::RewardsClaimed { hero, owner, .. }
            | Self::HeroRevived { hero, owner, .. }
            | Self::HeroTrained { hero, owner, .. } => {
                refs.push(Reference::new(Hero, hero.as_str(), MustExist));
                refs.extend(Reference::player(owner));
            }
            Self::UnstakeRequested { hero, .. } => {
                refs.push(Reference::new(Hero, hero.as_str(), Optional));
            }
            Self::HeroDied { hero } => {
                refs.push(Reference::new(Hero, hero.as_str(), MustExist));
            }
            Self::WeaponEquipped { hero, weapon, owner }
            | Self::WeaponUnequipped { hero, weapon, owner } => {
                refs.push(Reference::new(Hero, hero.as_str(), MustExist));
                refs.push(Reference::new(Weapon, weapon.as_str(), MustExist));
                refs.extend(Reference::player(owner));
            }
            Self::WeaponRepaired { weapon, owner, .. }
            | Self::WeaponSharpened { weapon, owner, .. } => {
                refs.push(Reference::new(Weapon, weapon.as_str(), MustExist));
                refs.extend(Reference::player(owner));
            }
            Self::WeaponWearUpdated { weapon, .. } => {
                refs.push(Reference::new(Weapon, weapon.as_str(), MustExist));
            }
            Self::GachaRequested {
                request_id,
                requester,
                ..
            }
            | Self::RemixRequested {
                request_id,
                requester,
                ..
            } => {
                refs.push(Reference::new(Request, request_id.as_str(), CreateIfAbsent));
                refs.extend(Reference::player(requester));
            }
            Self::GachaWeaponGenerated {
                request_id, weapon, ..
            }
            | Self::RemixWeaponGenerated {
                request_id, weapon, ..
            } => {
                refs.push(Reference::new(Request, request_id.as_str(), MustExist));
                refs.push(Reference::new(Weapon, weapon.as_str(), CreateIfAbsent));
            }
        }
        refs
    }
}

/// Wei amounts travel as decimal strings; plain JSON integers up to
/// `u64::MAX` are accepted as well.
pub mod wei {
    use std::fmt;

    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};

    /// Serialize as a decimal string.
    ///
    /// # Errors
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    /// Deserialize from a decimal string or an unsigned integer.
    ///
    /// # Errors
    /// Fails on negative numbers and non-decimal strings.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        deserializer.deserialize_any(WeiVisitor)
    }

    struct WeiVisitor;

    impl Visitor<'_> for WeiVisitor {
        type Value = u128;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a wei amount as a decimal string or unsigned integer")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u128, E> {
            Ok(u128::from(v))
        }

        fn visit_u128<E: de::Error>(self, v: u128) -> Result<u128, E> {
            Ok(v)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u128, E> {
            v.parse().map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staked() -> DomainEvent {
        DomainEvent::Staked {
            hero: TokenId::from(1),
            owner: Address::new("0xA"),
            staking_type: StakingType::Mountain,
        }
    }

    #[test]
    fn mint_creates_hero_transfer_requires_it() {
        let mint = DomainEvent::HeroTransfer {
            from: Address::zero(),
            to: Address::new("0xa"),
            token_id: TokenId::from(1),
        };
        let refs = mint.references();
        assert_eq!(refs[0].presence, Presence::CreateIfAbsent);
        assert_eq!(refs.len(), 2, "zero address is never a player");

        let transfer = DomainEvent::HeroTransfer {
            from: Address::new("0xa"),
            to: Address::new("0xb"),
            token_id: TokenId::from(1),
        };
        let refs = transfer.references();
        assert_eq!(refs[0].presence, Presence::MustExist);
        assert_eq!(refs.len(), 3);
    }

    #[test]
    fn unstake_request_tolerates_missing_hero() {
        let e = DomainEvent::UnstakeRequested {
            hero: TokenId::from(3),
            owner: Address::new("0xa"),
        };
        assert_eq!(e.references()[0].presence, Presence::Optional);
    }

    #[test]
    fn json_is_internally_tagged() {
        let json = serde_json::to_value(&staked()).expect("ser");
        assert_eq!(json["type"], "Staked");
        assert_eq!(json["staking_type"], "mountain");
    }

    #[test]
    fn wei_accepts_strings_and_integers() {
        let big = r#"{"type":"RewardsClaimed","hero":"1","owner":"0xa","staking_type":"meadow","amount":"340282366920938463463374607431768211455"}"#;
        let e: DomainEvent = serde_json::from_str(big).expect("string amount");
        assert!(matches!(e, DomainEvent::RewardsClaimed { amount, .. } if amount == u128::MAX));

        let small = r#"{"type":"RewardsClaimed","hero":"1","owner":"0xa","staking_type":"meadow","amount":500}"#;
        let e: DomainEvent = serde_json::from_str(small).expect("integer amount");
        assert!(matches!(e, DomainEvent::RewardsClaimed { amount: 500, .. }));
    }

    #[test]
    fn unstaked_optional_fields_default() {
        let json = r#"{"type":"Unstaked","hero":"1","owner":"0xa","staking_type":"forest","reward_amount":"10"}"#;
        let e: DomainEvent = serde_json::from_str(json).expect("parse");
        match e {
            DomainEvent::Unstaked {
                shards,
                reward_items,
                ..
            } => {
                assert_eq!(shards, 0);
                assert!(reward_items.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
