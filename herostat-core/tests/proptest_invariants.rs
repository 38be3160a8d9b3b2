//! Property-based tests for herostat core.
//!
//! Random event sequences over a small pool of heroes, weapons and players
//! must leave every aggregate tier consistent after every event, whether the
//! event applied or was rejected as an ordering violation. The formula
//! properties pin down the monotonicity the reward tables rely on.

use proptest::prelude::*;

use herostat_core::consistency;
use herostat_core::entity::weapon::WeaponStats;
use herostat_core::entity::Hero;
use herostat_core::formula::{
    Armament, BASE_DAILY_TOKENS, RewardProfile, WEI_PER_TOKEN, damage, training_cost, training_cost_between,
};
use herostat_core::stats::{GlobalStats, UserStats, ZoneStats};
use herostat_core::{
    Address, ApplyStatus, DomainEvent, Engine, EventEnvelope, EventId, HerostatConfig, MemoryStore,
    Rarity, RecordStoreExt, StakingType, TokenId,
};

const PLAYERS: [&str; 3] = ["0xaaa", "0xbbb", "0xccc"];

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_player() -> impl Strategy<Value = Address> {
    (0..PLAYERS.len()).prop_map(|i| Address::new(PLAYERS[i]))
}

fn arb_hero() -> impl Strategy<Value = TokenId> {
    (1..=4u64).prop_map(TokenId::from)
}

fn arb_weapon() -> impl Strategy<Value = TokenId> {
    (10..=13u64).prop_map(TokenId::from)
}

fn arb_request() -> impl Strategy<Value = String> {
    prop_oneof![Just("q1".to_string()), Just("q2".to_string())]
}

fn arb_stats() -> impl Strategy<Value = WeaponStats> {
    (arb_rarity(), 0..=100u32, 0..=100u32).prop_map(|(rarity, max_durability, max_sharpness)| WeaponStats {
        rarity,
        weapon_type: 1,
        max_durability,
        max_sharpness,
    })
}

fn arb_rarity() -> impl Strategy<Value = Rarity> {
    (0..7u8).prop_map(|r| Rarity::try_from(r).expect("rarity"))
}

fn arb_staking_type() -> impl Strategy<Value = StakingType> {
    prop_oneof![
        Just(StakingType::Meadow),
        Just(StakingType::Forest),
        Just(StakingType::Mountain),
        Just(StakingType::Abyss),
    ]
}

fn arb_event() -> impl Strategy<Value = DomainEvent> {
    prop_oneof![
        (arb_hero(), arb_player()).prop_map(|(token_id, to)| DomainEvent::HeroTransfer {
            from: Address::zero(),
            to,
            token_id,
        }),
        (arb_hero(), arb_player(), arb_player()).prop_map(|(token_id, from, to)| {
            DomainEvent::HeroTransfer { from, to, token_id }
        }),
        (arb_hero(), arb_player()).prop_map(|(token_id, from)| DomainEvent::HeroTransfer {
            from,
            to: Address::zero(),
            token_id,
        }),
        (arb_weapon(), arb_player()).prop_map(|(token_id, to)| DomainEvent::WeaponTransfer {
            from: Address::zero(),
            to,
            token_id,
        }),
        (arb_weapon(), arb_player(), arb_player()).prop_map(|(token_id, from, to)| {
            DomainEvent::WeaponTransfer { from, to, token_id }
        }),
        (arb_weapon(), arb_rarity()).prop_map(|(token_id, rarity)| DomainEvent::WeaponMetadata {
            token_id,
            stats: WeaponStats {
                rarity,
                weapon_type: 0,
                max_durability: 100,
                max_sharpness: 100,
            },
        }),
        (arb_hero(), arb_player(), arb_staking_type()).prop_map(|(hero, owner, staking_type)| {
            DomainEvent::Staked {
                hero,
                owner,
                staking_type,
            }
        }),
        (arb_hero(), arb_player(), arb_staking_type(), 0..1_000u128).prop_map(
            |(hero, owner, staking_type, reward_amount)| DomainEvent::Unstaked {
                hero,
                owner,
                staking_type,
                reward_amount,
                shards: 1,
                gacha_tickets: 0,
                reward_items: Vec::new(),
            }
        ),
        arb_hero().prop_map(|hero| DomainEvent::HeroDied { hero }),
        (arb_hero(), arb_player()).prop_map(|(hero, owner)| DomainEvent::HeroRevived {
            hero,
            owner,
            cost: 10,
        }),
        (arb_hero(), arb_player(), 1..=12u8).prop_map(|(hero, owner, new_level)| {
            DomainEvent::HeroTrained {
                hero,
                owner,
                new_level,
            }
        }),
        (arb_hero(), arb_weapon(), arb_player()).prop_map(|(hero, weapon, owner)| {
            DomainEvent::WeaponEquipped {
                hero,
                weapon,
                owner,
            }
        }),
        (arb_hero(), arb_weapon(), arb_player()).prop_map(|(hero, weapon, owner)| {
            DomainEvent::WeaponUnequipped {
                hero,
                weapon,
                owner,
            }
        }),
        (arb_weapon(), 0..=100u32, 0..=100u32).prop_map(|(weapon, d, s)| {
            DomainEvent::WeaponWearUpdated {
                weapon,
                durability: Some(d),
                sharpness: Some(s),
            }
        }),
        (arb_weapon(), arb_player()).prop_map(|(weapon, owner)| DomainEvent::WeaponRepaired {
            weapon,
            owner,
            cost: 5,
        }),
        (arb_weapon(), arb_player()).prop_map(|(weapon, owner)| DomainEvent::WeaponSharpened {
            weapon,
            owner,
            cost: 5,
        }),
        (arb_hero(), arb_player()).prop_map(|(hero, owner)| DomainEvent::UnstakeRequested { hero, owner }),
        (arb_hero(), arb_player(), arb_staking_type(), 0..1_000u128).prop_map(
            |(hero, owner, staking_type, amount)| DomainEvent::RewardsClaimed {
                hero,
                owner,
                staking_type,
                amount,
            }
        ),
        (arb_request(), arb_player(), 1..=3u32).prop_map(|(request_id, requester, rolls)| {
            DomainEvent::GachaRequested {
                request_id,
                requester,
                rolls,
                price: 30,
                tickets_used: 1,
            }
        }),
        (arb_request(), arb_weapon(), arb_stats()).prop_map(|(request_id, weapon, stats)| {
            DomainEvent::GachaWeaponGenerated {
                request_id,
                weapon,
                stats,
            }
        }),
        (arb_request(), arb_player(), 2..=4u32, arb_rarity()).prop_map(
            |(request_id, requester, weapons_used, request_rarity)| DomainEvent::RemixRequested {
                request_id,
                requester,
                weapons_used,
                request_rarity,
                price: 40,
            }
        ),
        (arb_request(), arb_weapon(), arb_stats()).prop_map(|(request_id, weapon, stats)| {
            DomainEvent::RemixWeaponGenerated {
                request_id,
                weapon,
                stats,
            }
        }),
    ]
}

fn envelope(block: u64, event: DomainEvent) -> EventEnvelope {
    EventEnvelope {
        id: EventId::new(1, block, 0),
        timestamp: block * 12,
        contract: Address::new("0xc0ffee"),
        event,
    }
}

// ---------------------------------------------------------------------------
// Aggregate consistency
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every prefix of a random event stream leaves the store consistent.
    #[test]
    fn random_streams_stay_consistent(events in prop::collection::vec(arb_event(), 1..40)) {
        let engine = Engine::new(MemoryStore::new(), HerostatConfig::default());
        for (i, event) in events.into_iter().enumerate() {
            let env = envelope(i as u64 + 1, event);
            match engine.process(&env) {
                Ok(_) => {}
                Err(err) => prop_assert!(err.is_ordering_violation(), "unexpected error: {err}"),
            }
            let report = consistency::check(engine.store()).expect("check");
            prop_assert!(
                report.is_consistent(),
                "after {:?}: {:#?}",
                env.event,
                report.violations
            );
        }
    }

    /// Matched stakes and unstakes of one hero net every active counter to zero.
    #[test]
    fn balanced_sessions_leave_nothing_active(
        sessions in prop::collection::vec((arb_staking_type(), 0..1_000u128), 1..8),
    ) {
        let engine = Engine::new(MemoryStore::new(), HerostatConfig::default());
        let owner = Address::new(PLAYERS[0]);
        let hero = TokenId::from(1);
        let mut block = 1;
        let mut next = |event| {
            let env = envelope(block, event);
            block += 1;
            engine.process(&env).map(|_| ())
        };
        next(DomainEvent::HeroTransfer {
            from: Address::zero(),
            to: owner.clone(),
            token_id: hero.clone(),
        })
        .expect("mint");
        for (staking_type, reward_amount) in &sessions {
            next(DomainEvent::Staked {
                hero: hero.clone(),
                owner: owner.clone(),
                staking_type: *staking_type,
            })
            .expect("stake");
            next(DomainEvent::Unstaked {
                hero: hero.clone(),
                owner: owner.clone(),
                staking_type: *staking_type,
                reward_amount: *reward_amount,
                shards: 0,
                gacha_tickets: 0,
                reward_items: Vec::new(),
            })
            .expect("unstake");
        }

        let store = engine.store();
        let global: GlobalStats = store.load(GlobalStats::ID).expect("load").expect("global");
        let user: UserStats = store.load(owner.as_str()).expect("load").expect("user");
        prop_assert_eq!(global.activity.active_heroes, 0);
        prop_assert_eq!(user.activity.active_heroes, 0);
        prop_assert_eq!(global.activity.total_stakes, sessions.len() as u64);
        for (staking_type, _) in &sessions {
            let zone: Option<ZoneStats> = store.load(&ZoneStats::key(staking_type.zone())).expect("load");
            prop_assert_eq!(zone.map_or(0, |z| z.active_heroes), 0);
        }
        let hero: Hero = store.load(hero.as_str()).expect("load").expect("hero");
        prop_assert!(!hero.staked);
    }

    /// Re-delivering any applied event changes nothing.
    #[test]
    fn redelivery_is_idempotent(events in prop::collection::vec(arb_event(), 1..20)) {
        let engine = Engine::new(MemoryStore::new(), HerostatConfig::default());
        let envelopes: Vec<_> = events
            .into_iter()
            .enumerate()
            .map(|(i, e)| envelope(i as u64 + 1, e))
            .collect();
        let mut applied = Vec::new();
        for env in &envelopes {
            if engine.process(env).is_ok() {
                applied.push(env);
            }
        }
        let before = engine.store().len();
        for env in applied {
            let outcome = engine.process(env).expect("redelivery");
            prop_assert_eq!(outcome.status, ApplyStatus::Duplicate);
        }
        prop_assert_eq!(engine.store().len(), before);
    }
}

// ---------------------------------------------------------------------------
// Formula properties
// ---------------------------------------------------------------------------

proptest! {
    /// Training cost never decreases with level.
    #[test]
    fn training_cost_is_monotonic(level in 0..100u8) {
        prop_assert!(training_cost(level + 1) >= training_cost(level));
    }

    /// Training in two hops costs the same as training in one.
    #[test]
    fn training_cost_is_additive(a in 0..=100u8, b in 0..=100u8, c in 0..=100u8) {
        let mut lv = [a, b, c];
        lv.sort_unstable();
        prop_assert_eq!(
            training_cost_between(lv[0], lv[2]),
            training_cost_between(lv[0], lv[1]) + training_cost_between(lv[1], lv[2])
        );
    }

    /// Higher rarity never deals less damage.
    #[test]
    fn damage_grows_with_rarity(level in 0..=100u8, r in 0..6u8) {
        let low = Rarity::try_from(r).expect("rarity");
        let high = Rarity::try_from(r + 1).expect("rarity");
        prop_assert!(damage(level, high) >= damage(level, low));
    }

    /// Base and bonus never exceed the max reward, and sharper is never worse.
    #[test]
    fn reward_parts_are_bounded(
        level in 1..=100u8,
        rarity in arb_rarity(),
        max_sharpness in 0..=200u32,
        s in 0..=200u32,
    ) {
        let sharpness = s.min(max_sharpness);
        let profile = RewardProfile::compute(level, Some(Armament { rarity, sharpness, max_sharpness }));
        prop_assert!(profile.base_reward_per_day + profile.bonus_reward_per_day <= profile.max_reward_per_day);
        prop_assert_eq!(
            profile.daily_reward,
            (BASE_DAILY_TOKENS + profile.base_reward_per_day + profile.bonus_reward_per_day) * WEI_PER_TOKEN
        );
        prop_assert_eq!(profile.hourly_reward, profile.daily_reward / 24);
        if max_sharpness == 0 {
            prop_assert_eq!(profile.bonus_reward_per_day, 0);
        }

        let sharper = RewardProfile::compute(
            level,
            Some(Armament { rarity, sharpness: max_sharpness, max_sharpness }),
        );
        prop_assert!(sharper.daily_reward >= profile.daily_reward);
    }
}
