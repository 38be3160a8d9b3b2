//! Prefetch: resolve every record an event will touch.
//!
//! Prefetch only reads, plus `create_if_absent` for references whose policy
//! allows it, so any number of upcoming events may prefetch concurrently.
//! Records found on the event's direct references are followed one level
//! further (a hero's owner and weapon, a weapon's holder or wielder).
//! An event that is already applied resolves nothing, so a redelivery never
//! recreates records a later event removed. An event with a required record
//! missing creates nothing either: it will fail at apply, and must not leave
//! placeholders behind.

use std::collections::{HashMap, VecDeque};

use tracing::trace;

use crate::entity::{Factory, Hero, Player, RecordKey, RecordKind, Weapon, WeaponRequest};
use crate::error::Result;
use crate::events::{EventEnvelope, Presence, Reference};
use crate::stats::{GlobalStats, LevelStats, UserStats, ZoneStats};
use crate::store::{EntityStore, Stored, decode};
use crate::types::EventId;

/// Direct references are depth 1; records they point at are depth 2.
const MAX_DEPTH: u8 = 2;

/// The snapshots gathered for one event.
#[derive(Debug, Clone)]
pub struct Prefetched {
    event: EventId,
    snapshots: HashMap<RecordKey, Option<Stored>>,
    created: usize,
}

impl Prefetched {
    /// Event the snapshots were gathered for.
    #[must_use]
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Number of records resolved (present or absent).
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether nothing was resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Records synthesised with factory defaults.
    #[must_use]
    pub fn created(&self) -> usize {
        self.created
    }

    /// The snapshot for `key`: `None` if not resolved, `Some(None)` if absent.
    #[must_use]
    pub fn snapshot(&self, key: &RecordKey) -> Option<Option<&Stored>> {
        self.snapshots.get(key).map(Option::as_ref)
    }

    pub(crate) fn into_snapshots(self) -> HashMap<RecordKey, Option<Stored>> {
        self.snapshots
    }
}

/// Resolve the references of `envelope` against `store`.
///
/// # Errors
/// Returns storage errors, or a decode error for a corrupt record.
pub fn prefetch(store: &dyn EntityStore, envelope: &EventEnvelope) -> Result<Prefetched> {
    let mut snapshots: HashMap<RecordKey, Option<Stored>> = HashMap::new();
    let mut created = 0;
    let marker = RecordKey::new(RecordKind::AppliedEvent, envelope.id.to_string());
    if store.get(&marker)?.is_some() {
        trace!(event = %envelope.id, "Already applied, nothing to prefetch");
        return Ok(Prefetched {
            event: envelope.id,
            snapshots,
            created,
        });
    }
    let references = envelope.event.references();
    let mut withhold = false;
    for reference in &references {
        if reference.presence == Presence::MustExist && store.revision(&reference.key)?.is_none() {
            trace!(event = %envelope.id, key = %reference.key, "Required record absent, creating nothing");
            withhold = true;
            break;
        }
    }
    let mut frontier: VecDeque<(Reference, u8)> = references.into_iter().map(|r| (r, 1)).collect();

    while let Some((reference, depth)) = frontier.pop_front() {
        match snapshots.get(&reference.key) {
            Some(Some(_)) => continue,
            Some(None) if reference.presence != Presence::CreateIfAbsent => continue,
            _ => {}
        }

        let stored = resolve(store, &reference, withhold, &mut created)?;
        if depth < MAX_DEPTH {
            if let Some(stored) = &stored {
                frontier.extend(follow(&reference.key, stored)?.into_iter().map(|r| (r, depth + 1)));
            }
        }
        snapshots.insert(reference.key, stored);
    }

    trace!(event = %envelope.id, records = snapshots.len(), created, "Prefetched");
    Ok(Prefetched {
        event: envelope.id,
        snapshots,
        created,
    })
}

fn resolve(
    store: &dyn EntityStore,
    reference: &Reference,
    withhold: bool,
    created: &mut usize,
) -> Result<Option<Stored>> {
    if reference.presence == Presence::CreateIfAbsent && !withhold {
        if let Some(stored) = store.get(&reference.key)? {
            return Ok(Some(stored));
        }
        if let Some(defaults) = default_bytes(&reference.key)? {
            *created += 1;
            return store.create_if_absent(&reference.key, defaults).map(Some);
        }
    }
    store.get(&reference.key)
}

/// Second-level references found on a fetched record.
fn follow(key: &RecordKey, stored: &Stored) -> Result<Vec<Reference>> {
    let mut refs = Vec::new();
    match key.kind {
        RecordKind::Hero => {
            let hero: Hero = decode(&stored.data)?;
            if let Some(owner) = &hero.owner {
                refs.push(reference(RecordKind::Player, owner.as_str(), Presence::CreateIfAbsent));
            }
            if let Some(weapon) = &hero.equipped_weapon {
                refs.push(reference(RecordKind::Weapon, weapon.as_str(), Presence::Optional));
            }
        }
        RecordKind::Weapon => {
            let weapon: Weapon = decode(&stored.data)?;
            if let Some(owner) = &weapon.owner {
                refs.push(reference(RecordKind::Player, owner.as_str(), Presence::CreateIfAbsent));
            }
            if let Some(hero) = &weapon.equipped_hero {
                refs.push(reference(RecordKind::Hero, hero.as_str(), Presence::Optional));
            }
        }
        RecordKind::Request => {
            let request: WeaponRequest = decode(&stored.data)?;
            if let Some(requester) = &request.requester {
                refs.push(reference(RecordKind::Player, requester.as_str(), Presence::CreateIfAbsent));
            }
        }
        _ => {}
    }
    Ok(refs)
}

fn reference(kind: RecordKind, id: &str, presence: Presence) -> Reference {
    Reference {
        key: RecordKey::new(kind, id),
        presence,
    }
}

/// JSON of the factory record for `key`, for kinds that have one.
fn default_bytes(key: &RecordKey) -> Result<Option<Vec<u8>>> {
    let id = key.id.as_str();
    let bytes = match key.kind {
        RecordKind::Player => serde_json::to_vec(&Player::with_defaults(id))?,
        RecordKind::Hero => serde_json::to_vec(&Hero::with_defaults(id))?,
        RecordKind::Weapon => serde_json::to_vec(&Weapon::with_defaults(id))?,
        RecordKind::Request => serde_json::to_vec(&WeaponRequest::with_defaults(id))?,
        RecordKind::GlobalStats => serde_json::to_vec(&GlobalStats::with_defaults(id))?,
        RecordKind::UserStats => serde_json::to_vec(&UserStats::with_defaults(id))?,
        RecordKind::ZoneStats => serde_json::to_vec(&ZoneStats::with_defaults(id))?,
        RecordKind::LevelStats => serde_json::to_vec(&LevelStats::with_defaults(id))?,
        RecordKind::Audit | RecordKind::AppliedEvent => return Ok(None),
    };
    Ok(Some(bytes))
}
