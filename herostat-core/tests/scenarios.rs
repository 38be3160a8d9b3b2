//! End-to-end scenarios through the engine.
//!
//! Each test drives an [`Engine`] over a fresh store and checks both the
//! records it touched and that the whole store stays consistent afterwards.

use herostat_core::audit::{AuditKind, AuditRecord};
use herostat_core::config::PersistenceConfig;
use herostat_core::consistency;
use herostat_core::entity::weapon::WeaponStats;
use herostat_core::entity::{Hero, Player, Weapon, WeaponRequest};
use herostat_core::events::RewardItem;
use herostat_core::formula::training_cost_between;
use herostat_core::stats::{GlobalStats, UserStats, ZoneStats};
use herostat_core::{
    Address, ApplyOutcome, ApplyStatus, DomainEvent, Engine, EntityStore, EventEnvelope, EventId,
    HerostatConfig, HerostatError, MemoryStore, Rarity, RecordStoreExt, SqliteStore, StakingType,
    TokenId, Zone,
};

const ALICE: &str = "0xA11CE";
const BOB: &str = "0xB0B";

struct Harness<S: EntityStore> {
    engine: Engine<S>,
    block: u64,
}

impl Harness<MemoryStore> {
    fn new() -> Self {
        Self::over(MemoryStore::new())
    }
}

impl<S: EntityStore> Harness<S> {
    fn over(store: S) -> Self {
        Self {
            engine: Engine::new(store, HerostatConfig::default()),
            block: 0,
        }
    }

    fn envelope(&mut self, timestamp: u64, event: DomainEvent) -> EventEnvelope {
        self.block += 1;
        EventEnvelope {
            id: EventId::new(1, self.block, 0),
            timestamp,
            contract: Address::new("0xc0ffee"),
            event,
        }
    }

    fn at(&mut self, timestamp: u64, event: DomainEvent) -> ApplyOutcome {
        let env = self.envelope(timestamp, event);
        let outcome = self.engine.process(&env).expect("process");
        self.assert_consistent();
        outcome
    }

    fn apply(&mut self, event: DomainEvent) -> ApplyOutcome {
        let ts = self.block * 10;
        self.at(ts, event)
    }

    fn assert_consistent(&self) {
        let report = consistency::check(self.engine.store()).expect("check");
        assert!(report.is_consistent(), "{:#?}", report.violations);
    }

    fn global(&self) -> GlobalStats {
        self.engine
            .store()
            .load(GlobalStats::ID)
            .expect("load")
            .expect("global stats exist")
    }

    fn user(&self, who: &str) -> UserStats {
        self.engine
            .store()
            .load(Address::new(who).as_str())
            .expect("load")
            .expect("user stats exist")
    }

    fn zone(&self, raw: u8) -> ZoneStats {
        let zone = Zone::try_from(raw).expect("zone");
        self.engine
            .store()
            .load(&ZoneStats::key(zone))
            .expect("load")
            .unwrap_or_else(|| ZoneStats::new(ZoneStats::key(zone)))
    }

    fn hero(&self, id: u64) -> Hero {
        self.engine
            .store()
            .load(TokenId::from(id).as_str())
            .expect("load")
            .expect("hero exists")
    }

    fn weapon(&self, id: u64) -> Weapon {
        self.engine
            .store()
            .load(TokenId::from(id).as_str())
            .expect("load")
            .expect("weapon exists")
    }

    fn audits(&self) -> Vec<AuditRecord> {
        self.engine.store().load_all().expect("load audits")
    }

    fn mint_hero(&mut self, id: u64, to: &str) {
        self.apply(DomainEvent::HeroTransfer {
            from: Address::zero(),
            to: Address::new(to),
            token_id: TokenId::from(id),
        });
    }

    fn mint_weapon(&mut self, id: u64, to: &str, rarity: Rarity) {
        self.mint_bare_weapon(id, to);
        self.apply(DomainEvent::WeaponMetadata {
            token_id: TokenId::from(id),
            stats: stats(rarity),
        });
    }

    fn mint_bare_weapon(&mut self, id: u64, to: &str) {
        self.apply(DomainEvent::WeaponTransfer {
            from: Address::zero(),
            to: Address::new(to),
            token_id: TokenId::from(id),
        });
    }

    fn stake(&mut self, ts: u64, hero: u64, staking_type: StakingType) {
        self.at(
            ts,
            DomainEvent::Staked {
                hero: TokenId::from(hero),
                owner: Address::new(ALICE),
                staking_type,
            },
        );
    }
}

fn stats(rarity: Rarity) -> WeaponStats {
    WeaponStats {
        rarity,
        weapon_type: 1,
        max_durability: 100,
        max_sharpness: 100,
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn mint_counts_hero_and_player() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);

    let hero = h.hero(1);
    assert_eq!(hero.owner, Some(Address::new(ALICE)));
    assert_eq!(hero.level, 1);

    let global = h.global();
    assert_eq!(global.heroes_minted, 1);
    assert_eq!(global.total_players, 1);
    assert_eq!(global.holdings.hero_count, 1);
    assert_eq!(global.holdings.heroes_by_level.get(&[1]), 1);

    let player: Player = h
        .engine
        .store()
        .load(Address::new(ALICE).as_str())
        .expect("load")
        .expect("player");
    assert_eq!(player.holdings.hero_count, 1);
    assert!(h.audits().iter().any(|a| a.kind == AuditKind::HeroMinted));
}

#[test]
fn transfer_moves_holdings_between_players() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.apply(DomainEvent::HeroTransfer {
        from: Address::new(ALICE),
        to: Address::new(BOB),
        token_id: TokenId::from(1),
    });

    let store = h.engine.store();
    let alice: Player = store.load(Address::new(ALICE).as_str()).expect("load").expect("alice");
    let bob: Player = store.load(Address::new(BOB).as_str()).expect("load").expect("bob");
    assert_eq!(alice.holdings.hero_count, 0);
    assert_eq!(bob.holdings.hero_count, 1);
    assert_eq!(h.global().holdings.hero_count, 1);
    assert_eq!(h.global().total_players, 2);
}

#[test]
fn burn_retracts_every_contribution() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.apply(DomainEvent::HeroTransfer {
        from: Address::new(ALICE),
        to: Address::zero(),
        token_id: TokenId::from(1),
    });

    let global = h.global();
    assert_eq!(global.heroes_burned, 1);
    assert_eq!(global.holdings.hero_count, 0);
    assert_eq!(global.holdings.heroes_by_level.sum(), 0);
    let hero: Option<Hero> = h.engine.store().load("1").expect("load");
    assert!(hero.is_none());
}

// ---------------------------------------------------------------------------
// Staking
// ---------------------------------------------------------------------------

#[test]
fn stake_then_unstake_pays_out_and_frees_zone() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.stake(1_000, 1, StakingType::Mountain);

    assert_eq!(h.zone(2).active_heroes, 1);
    assert_eq!(h.global().activity.active_by_zone.get(&[2]), 1);
    let hero = h.hero(1);
    assert!(hero.staked && hero.revealed);
    assert_eq!(hero.staked_at, Some(1_000));

    h.at(
        2_000,
        DomainEvent::Unstaked {
            hero: TokenId::from(1),
            owner: Address::new(ALICE),
            staking_type: StakingType::Mountain,
            reward_amount: 500,
            shards: 3,
            gacha_tickets: 1,
            reward_items: vec![RewardItem {
                token_id: TokenId::from(2),
                amount: 4,
            }],
        },
    );

    let global = h.global();
    assert_eq!(global.activity.rewards_amount, 500);
    assert_eq!(global.activity.rewards_by_zone.get(&[2]), 500);
    assert_eq!(global.activity.active_by_zone.get(&[2]), 0);
    assert_eq!(global.activity.completed_sessions, 1);
    assert_eq!(global.activity.reward_items_by_zone.get(&[2, 1]), 4);

    let zone = h.zone(2);
    assert_eq!(zone.active_heroes, 0);
    assert_eq!(zone.rewards_amount, 500);

    let hero = h.hero(1);
    assert!(!hero.staked);
    assert_eq!(hero.staking_type, None);
    assert_eq!(hero.total_rewards, 500);

    let user = h.user(ALICE);
    assert_eq!(user.activity.rewards_amount, 500);
    assert_eq!(user.activity.shards_earned, 3);
    assert_eq!(user.activity.gacha_tickets_earned, 1);
}

#[test]
fn claim_keeps_the_session_open() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.stake(1_000, 1, StakingType::Forest);
    h.at(
        1_500,
        DomainEvent::RewardsClaimed {
            hero: TokenId::from(1),
            owner: Address::new(ALICE),
            staking_type: StakingType::Forest,
            amount: 120,
        },
    );

    let hero = h.hero(1);
    assert!(hero.staked);
    assert_eq!(hero.claim_count, 1);
    assert_eq!(hero.last_reward_at, Some(1_500));
    assert_eq!(h.global().activity.claims, 1);
    assert_eq!(h.zone(1).active_heroes, 1);
}

#[test]
fn death_and_revival_move_the_hero_between_gauges() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.stake(1_000, 1, StakingType::Abyss);
    h.apply(DomainEvent::HeroDied {
        hero: TokenId::from(1),
    });

    let global = h.global();
    assert_eq!(global.activity.dead_by_zone.get(&[3]), 1);
    assert_eq!(global.activity.active_by_zone.get(&[3]), 0);
    assert_eq!(h.zone(3).dead_heroes, 1);
    let hero = h.hero(1);
    assert!(hero.dead && !hero.staked);
    assert_eq!(hero.death_zone, Some(Zone::try_from(3).expect("zone")));

    h.apply(DomainEvent::HeroRevived {
        hero: TokenId::from(1),
        owner: Address::new(ALICE),
        cost: 0,
    });
    let global = h.global();
    assert_eq!(global.activity.dead_heroes, 0);
    assert_eq!(global.activity.total_revivals, 1);
    assert_eq!(h.zone(3).dead_heroes, 0);
    assert!(!h.hero(1).dead);
}

#[test]
fn training_raises_level_and_records_spend() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.apply(DomainEvent::HeroTrained {
        hero: TokenId::from(1),
        owner: Address::new(ALICE),
        new_level: 3,
    });

    let hero = h.hero(1);
    assert_eq!(hero.level, 3);
    assert_eq!(hero.train_count, 2);
    let global = h.global();
    assert_eq!(global.holdings.heroes_by_level.get(&[1]), 0);
    assert_eq!(global.holdings.heroes_by_level.get(&[3]), 1);
    assert_eq!(global.economy.spent.training, training_cost_between(1, 3));
    assert_eq!(global.economy.train_count, 2);
}

// ---------------------------------------------------------------------------
// Equipment and maintenance
// ---------------------------------------------------------------------------

#[test]
fn equip_links_both_sides_and_rearms_hero() {
    let mut h = Harness::new();
    h.mint_hero(1, ALICE);
    h.mint_weapon(10, ALICE, Rarity::Epic);
    let unarmed = h.hero(1).rewards;

    h.apply(DomainEvent::WeaponEquipped {
        hero: TokenId::from(1),
        weapon: TokenId::from(10),
        owner: Address::new(ALICE),
    });

    let hero = h.hero(1);
    let weapon = h.weapon(10);
    assert_eq!(hero.equipped_weapon, Some(TokenId::from(10)));
    assert_eq!(hero.equipped_rarity, Some(Rarity::Epic));
    assert_eq!(weapon.equipped_hero, Some(TokenId::from(1)));
    assert!(hero.rewards.damage > unarmed.damage);

    let holdings = h.global().holdings;
    assert_eq!(holdings.weapon_count, 0);
    assert_eq!(holdings.equipped_weapons, 1);
    assert_eq!(holdings.equipped_by_rarity.get(&[Rarity::Epic.index()]), 1);

    h.apply(DomainEvent::WeaponUnequipped {
        hero: TokenId::from(1),
        weapon: TokenId::from(10),
        owner: Address::new(ALICE),
    });
    assert_eq!(h.hero(1).equipped_weapon, None);
    assert_eq!(h.weapon(10).owner, Some(Address::new(ALICE)));
    assert_eq!(h.global().holdings.weapon_count, 1);
}

#[test]
fn repair_restores_durability() {
    let mut h = Harness::new();
    h.mint_weapon(10, ALICE, Rarity::Rare);
    h.apply(DomainEvent::WeaponWearUpdated {
        weapon: TokenId::from(10),
        durability: Some(0),
        sharpness: None,
    });
    assert!(h.weapon(10).broken);

    h.apply(DomainEvent::WeaponRepaired {
        weapon: TokenId::from(10),
        owner: Address::new(ALICE),
        cost: 0,
    });

    let weapon = h.weapon(10);
    assert_eq!(weapon.durability, Some(100));
    assert!(!weapon.broken);
    assert_eq!(weapon.repaired_count, 1);
    assert_eq!(
        h.global().activity.repairs_by_rarity.get(&[Rarity::Rare.index()]),
        1
    );
}

#[test]
fn upkeep_without_metadata_leaves_wear_alone() {
    let mut h = Harness::new();
    h.mint_bare_weapon(5, ALICE);
    h.apply(DomainEvent::WeaponRepaired {
        weapon: TokenId::from(5),
        owner: Address::new(ALICE),
        cost: 3,
    });
    h.apply(DomainEvent::WeaponSharpened {
        weapon: TokenId::from(5),
        owner: Address::new(ALICE),
        cost: 4,
    });

    let weapon = h.weapon(5);
    assert_eq!(weapon.durability, None);
    assert_eq!(weapon.sharpness, None);
    assert!(!weapon.broken);
    assert_eq!(weapon.repaired_count, 1);
    assert_eq!(weapon.sharpened_count, 1);
    assert_eq!(weapon.repair_spent, 3);
    assert_eq!(weapon.sharpen_spent, 4);

    h.apply(DomainEvent::WeaponMetadata {
        token_id: TokenId::from(5),
        stats: stats(Rarity::Common),
    });
    let weapon = h.weapon(5);
    assert_eq!(weapon.durability, Some(100));
    assert!(!weapon.broken);
}

// ---------------------------------------------------------------------------
// Gacha and remix
// ---------------------------------------------------------------------------

#[test]
fn gacha_request_closes_after_every_roll() {
    let mut h = Harness::new();
    h.apply(DomainEvent::GachaRequested {
        request_id: "g1".to_string(),
        requester: Address::new(ALICE),
        rolls: 2,
        price: 0,
        tickets_used: 0,
    });
    for (id, rarity) in [(20, Rarity::Common), (21, Rarity::Legendary)] {
        h.mint_bare_weapon(id, ALICE);
        h.apply(DomainEvent::GachaWeaponGenerated {
            request_id: "g1".to_string(),
            weapon: TokenId::from(id),
            stats: stats(rarity),
        });
    }

    let request: Option<WeaponRequest> = h.engine.store().load("g1").expect("load");
    assert!(request.is_none());
    let activity = h.user(ALICE).activity;
    assert_eq!(activity.gacha_requests, 1);
    assert_eq!(activity.gacha_weapons, 2);
    assert_eq!(activity.gacha_by_rarity.get(&[Rarity::Legendary.index()]), 1);
    assert_eq!(h.weapon(21).request_id.as_deref(), Some("g1"));
}

#[test]
fn remix_outcome_lands_in_its_bucket() {
    let mut h = Harness::new();
    h.apply(DomainEvent::RemixRequested {
        request_id: "r1".to_string(),
        requester: Address::new(ALICE),
        weapons_used: 3,
        request_rarity: Rarity::Uncommon,
        price: 0,
    });
    h.mint_bare_weapon(30, ALICE);
    h.apply(DomainEvent::RemixWeaponGenerated {
        request_id: "r1".to_string(),
        weapon: TokenId::from(30),
        stats: stats(Rarity::Epic),
    });

    assert_eq!(h.user(ALICE).activity.remix_outcomes.get(&[1, 1, 2]), 1);
    assert_eq!(h.global().activity.remix_outcomes.get(&[1, 1, 2]), 1);
    let request: Option<WeaponRequest> = h.engine.store().load("r1").expect("load");
    assert!(request.is_none());
}

// ---------------------------------------------------------------------------
// Delivery semantics
// ---------------------------------------------------------------------------

#[test]
fn duplicate_delivery_is_absorbed() {
    let mut h = Harness::new();
    let env = h.envelope(
        100,
        DomainEvent::HeroTransfer {
            from: Address::zero(),
            to: Address::new(ALICE),
            token_id: TokenId::from(1),
        },
    );
    let first = h.engine.process(&env).expect("first");
    let second = h.engine.process(&env).expect("second");

    assert_eq!(first.status, ApplyStatus::Applied);
    assert_eq!(second.status, ApplyStatus::Duplicate);
    assert_eq!(second.records_written, 0);
    assert_eq!(h.global().heroes_minted, 1);
    assert_eq!(h.audits().len(), 1);
    assert_eq!(h.engine.counters().snapshot().duplicates, 1);
    h.assert_consistent();
}

#[test]
fn stake_of_unknown_hero_is_an_ordering_violation() {
    let mut h = Harness::new();
    let env = h.envelope(
        100,
        DomainEvent::Staked {
            hero: TokenId::from(9),
            owner: Address::new(ALICE),
            staking_type: StakingType::Meadow,
        },
    );
    let err = h.engine.process(&env).expect_err("missing hero");

    assert!(matches!(err, HerostatError::MissingEntity { .. }));
    assert!(err.is_ordering_violation());
    assert_eq!(h.engine.counters().snapshot().ordering_violations, 1);
    let hero: Option<Hero> = h.engine.store().load("9").expect("load");
    assert!(hero.is_none());
    assert!(h.audits().is_empty());
    h.assert_consistent();
}

#[test]
fn placeholder_hero_counts_as_absent() {
    let mut h = Harness::new();
    h.engine
        .store()
        .save(&Hero::new(TokenId::from(7)))
        .expect("save placeholder");
    let env = h.envelope(
        100,
        DomainEvent::Staked {
            hero: TokenId::from(7),
            owner: Address::new(ALICE),
            staking_type: StakingType::Forest,
        },
    );
    let err = h.engine.process(&env).expect_err("unminted hero");

    assert!(matches!(err, HerostatError::MissingEntity { .. }));
    assert!(!h.hero(7).staked);
    assert!(h.audits().is_empty());
    h.assert_consistent();

    h.mint_hero(7, ALICE);
    assert_eq!(h.hero(7).owner, Some(Address::new(ALICE)));
    assert_eq!(h.global().activity.total_stakes, 0);
}

#[test]
fn generation_for_unknown_request_leaves_no_weapon() {
    let mut h = Harness::new();
    let env = h.envelope(
        100,
        DomainEvent::GachaWeaponGenerated {
            request_id: "nope".to_string(),
            weapon: TokenId::from(40),
            stats: stats(Rarity::Rare),
        },
    );
    let err = h.engine.process(&env).expect_err("missing request");

    assert!(err.is_ordering_violation());
    let weapon: Option<Weapon> = h.engine.store().load("40").expect("load");
    assert!(weapon.is_none());
    h.assert_consistent();
}

#[test]
fn sqlite_store_runs_the_same_flow() {
    let store = SqliteStore::open_in_memory(&PersistenceConfig::default()).expect("open");
    let mut h = Harness::over(store);
    h.mint_hero(1, ALICE);
    h.stake(1_000, 1, StakingType::Meadow);

    assert_eq!(h.zone(0).active_heroes, 1);
    assert_eq!(h.global().activity.total_stakes, 1);
    assert!(h.engine.store().integrity_check().expect("integrity"));
}
