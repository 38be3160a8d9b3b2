//! Cross-record consistency checks.
//!
//! [`check`] scans the whole store and verifies the sum invariants that tie
//! the aggregate tiers together, plus the per-record invariants of heroes
//! and weapons. It only reads, so it can run against a live store between
//! events.

use std::collections::HashMap;

use tracing::{Level, info, span, warn};

use crate::entity::{Hero, Player, Weapon};
use crate::error::Result;
use crate::metrics::spans;
use crate::stats::{Activity, Economy, GlobalStats, Holdings, LevelStats, UserStats, ZoneStats};
use crate::store::{EntityStore, RecordStoreExt};
use crate::tally::Counter;
use crate::types::{LEVEL_BUCKETS, RARITY_BUCKETS, ZONE_COUNT, Zone};

/// Result of a consistency scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Players scanned.
    pub players: usize,
    /// Per-user stats records scanned.
    pub users: usize,
    /// Heroes scanned.
    pub heroes: usize,
    /// Weapons scanned.
    pub weapons: usize,
    /// Human-readable violations; empty when consistent.
    pub violations: Vec<String>,
}

impl ConsistencyReport {
    /// Whether no violation was found.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Scan `store` and verify every aggregate invariant.
///
/// # Errors
/// Returns storage or decode errors; invariant violations are reported, not
/// raised.
pub fn check(store: &dyn EntityStore) -> Result<ConsistencyReport> {
    let span = span!(Level::DEBUG, spans::CONSISTENCY);
    let _enter = span.enter();

    let global: GlobalStats = store.load(GlobalStats::ID)?.unwrap_or_default();
    let players: Vec<Player> = store.load_all()?;
    let users: Vec<UserStats> = store.load_all()?;
    let heroes: Vec<Hero> = store.load_all()?;
    let weapons: Vec<Weapon> = store.load_all()?;

    let mut report = ConsistencyReport {
        players: players.len(),
        users: users.len(),
        heroes: heroes.len(),
        weapons: weapons.len(),
        violations: global.distribution_violations(),
    };
    let v = &mut report.violations;

    check_players(&global, &players, v);
    check_users(&global, &users, v);
    check_zones(store, &global, v)?;
    check_levels(store, &global, v)?;
    check_entities(&global, &heroes, &weapons, v);

    if report.is_consistent() {
        info!(players = report.players, heroes = report.heroes, "Store is consistent");
    } else {
        warn!(violations = report.violations.len(), "Store has consistency violations");
    }
    Ok(report)
}

fn check_players(global: &GlobalStats, players: &[Player], v: &mut Vec<String>) {
    let mut holdings = Holdings::new();
    let mut economy = Economy::default();
    let mut seen = 0u64;
    for player in players {
        v.extend(
            player
                .holdings
                .distribution_violations(&format!("player {}", player.id)),
        );
        holdings.accumulate(&player.holdings);
        economy.accumulate(&player.economy);
        if player.first_seen_at.is_some() {
            seen += 1;
        }
    }
    if holdings != global.holdings {
        v.push("sum of player holdings differs from global holdings".to_string());
    }
    if economy != global.economy {
        v.push("sum of player spend differs from global spend".to_string());
    }
    if seen != global.total_players {
        v.push(format!(
            "{seen} players seen but global total_players is {}",
            global.total_players
        ));
    }
}

fn check_users(global: &GlobalStats, users: &[UserStats], v: &mut Vec<String>) {
    let mut activity = Activity::new();
    for user in users {
        v.extend(
            user.activity
                .distribution_violations(&format!("user {}", user.id)),
        );
        activity.accumulate(&user.activity);
    }
    if activity != global.activity {
        v.push("sum of user activity differs from global activity".to_string());
    }
}

fn check_zones(store: &dyn EntityStore, global: &GlobalStats, v: &mut Vec<String>) -> Result<()> {
    let a = &global.activity;
    let mut active_by_level = vec![0u32; LEVEL_BUCKETS];
    let mut dead_by_level = vec![0u32; LEVEL_BUCKETS];
    for raw in 0..ZONE_COUNT {
        let zone = Zone::try_from(u8::try_from(raw).unwrap_or(u8::MAX))?;
        let key = ZoneStats::key(zone);
        let stats: ZoneStats = store.load(&key)?.unwrap_or_else(|| ZoneStats::new(key));
        v.extend(stats.distribution_violations());

        let z = [zone.index()];
        compare(v, &stats.id, "active_heroes", stats.active_heroes, a.active_by_zone.get(&z));
        compare(v, &stats.id, "dead_heroes", stats.dead_heroes, a.dead_by_zone.get(&z));
        compare(v, &stats.id, "total_stakes", stats.total_stakes, a.stakes_by_zone.get(&z));
        compare(
            v,
            &stats.id,
            "completed_sessions",
            stats.completed_sessions,
            a.sessions_by_zone.get(&z),
        );
        compare(v, &stats.id, "rewards_amount", stats.rewards_amount, a.rewards_by_zone.get(&z));
        for (level, (active, dead)) in active_by_level.iter_mut().zip(&mut dead_by_level).enumerate() {
            *active += stats.active_by_level.get(&[level]);
            *dead += stats.dead_by_level.get(&[level]);
        }
    }
    if active_by_level.as_slice() != global.active_by_level.cells() {
        v.push("zone active_by_level does not sum to global active_by_level".to_string());
    }
    if dead_by_level.as_slice() != global.dead_by_level.cells() {
        v.push("zone dead_by_level does not sum to global dead_by_level".to_string());
    }
    Ok(())
}

fn check_levels(store: &dyn EntityStore, global: &GlobalStats, v: &mut Vec<String>) -> Result<()> {
    let levels: HashMap<String, LevelStats> = store
        .load_all::<LevelStats>()?
        .into_iter()
        .map(|l| (l.id.clone(), l))
        .collect();
    let h = &global.holdings;
    let mut damage = 0u64;
    let mut daily = 0u128;
    let mut equipped = vec![0u32; RARITY_BUCKETS];
    for level in 0..LEVEL_BUCKETS {
        let raw = u8::try_from(level).unwrap_or(u8::MAX);
        let key = LevelStats::key(raw);
        let heroes = levels.get(&key).map_or(0, |l| l.heroes);
        compare(v, &key, "heroes", heroes, h.heroes_by_level.get(&[level]));
        if let Some(stats) = levels.get(&key) {
            damage = damage.saturating_add(stats.total_damage);
            daily = daily.saturating_add(stats.total_daily_reward);
            for (r, slot) in equipped.iter_mut().enumerate() {
                *slot += stats.equipped_by_rarity.get(&[r]);
            }
        }
    }
    compare(v, "levels", "total_damage", damage, h.total_damage);
    compare(v, "levels", "total_daily_reward", daily, h.total_daily_reward);
    if equipped.as_slice() != h.equipped_by_rarity.cells() {
        v.push("level equipped_by_rarity does not sum to global equipped_by_rarity".to_string());
    }
    Ok(())
}

fn check_entities(global: &GlobalStats, heroes: &[Hero], weapons: &[Weapon], v: &mut Vec<String>) {
    let by_id: HashMap<&str, &Weapon> = weapons.iter().map(|w| (w.id.as_str(), w)).collect();
    let mut owned_heroes = 0u32;
    for hero in heroes {
        v.extend(hero.invariant_violations());
        if hero.owner.is_some() {
            owned_heroes += 1;
        }
        if let Some(weapon_id) = &hero.equipped_weapon {
            match by_id.get(weapon_id.as_str()) {
                Some(w) if w.equipped_hero.as_ref() == Some(&hero.id) => {}
                Some(_) => v.push(format!(
                    "hero {}: weapon {weapon_id} does not point back",
                    hero.id
                )),
                None => v.push(format!("hero {}: equipped weapon {weapon_id} missing", hero.id)),
            }
        }
    }
    compare(v, "global", "hero_count", owned_heroes, global.holdings.hero_count);

    let mut free_weapons = 0u32;
    for weapon in weapons {
        v.extend(weapon.invariant_violations());
        if weapon.free_owner().is_some() {
            free_weapons += 1;
        }
    }
    compare(v, "global", "weapon_count", free_weapons, global.holdings.weapon_count);
}

fn compare<T: Counter + std::fmt::Display>(
    v: &mut Vec<String>,
    scope: &str,
    field: &str,
    actual: T,
    expected: T,
) {
    if actual != expected {
        v.push(format!("{scope}: {field} is {actual}, expected {expected}"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{Address, TokenId};

    #[test]
    fn empty_store_is_consistent() {
        let store = MemoryStore::new();
        let report = check(&store).expect("check");
        assert!(report.is_consistent(), "{:?}", report.violations);
    }

    #[test]
    fn orphan_holdings_are_reported() {
        let store = MemoryStore::new();
        let mut player = Player::new(Address::new("0xA"));
        player.first_seen_at = Some(1);
        player.holdings.hero_count = 1;
        store.save(&player).expect("save");

        let report = check(&store).expect("check");
        assert!(!report.is_consistent());
        assert!(report.violations.iter().any(|v| v.contains("heroes_by_level")));
        assert!(report.violations.iter().any(|v| v.contains("total_players")));
    }

    #[test]
    fn broken_equip_link_is_reported() {
        let store = MemoryStore::new();
        let mut hero = Hero::new(TokenId::from(1));
        hero.equipped_weapon = Some(TokenId::from(2));
        store.save(&hero).expect("save");
        store.save(&Weapon::new(TokenId::from(2))).expect("save");

        let report = check(&store).expect("check");
        assert!(report.violations.iter().any(|v| v.contains("does not point back")));
    }
}
