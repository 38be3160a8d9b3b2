//! The per-event working set used by rules during apply.
//!
//! Reads go through the validated prefetch snapshots first, then the store.
//! Every read records the revision it saw; writes are staged and become a
//! single [`CommitBatch`] guarded by those revisions. Rules never touch the
//! store directly, so a failed rule leaves nothing behind.

use std::collections::{BTreeMap, HashMap};

use crate::audit::{AuditEntry, AuditRecord};
use crate::config::HerostatConfig;
use crate::entity::{AppliedEvent, Factory, Player, Record, RecordKey};
use crate::error::{HerostatError, Result};
use crate::events::EventEnvelope;
use crate::stats::GlobalStats;
use crate::store::{CommitBatch, EntityStore, Stored, WriteOp, decode};
use crate::tally::ClampGuard;
use crate::types::{Address, EventId};

#[derive(Debug)]
enum Staged {
    Put(Vec<u8>),
    Delete,
}

/// Mutable view of the store for one apply step.
pub struct ApplyContext<'a> {
    store: &'a dyn EntityStore,
    envelope: &'a EventEnvelope,
    config: &'a HerostatConfig,
    snapshots: HashMap<RecordKey, Option<Stored>>,
    expected: BTreeMap<RecordKey, Option<u64>>,
    originals: HashMap<RecordKey, Option<Vec<u8>>>,
    staged: BTreeMap<RecordKey, Staged>,
    audits: Vec<AuditRecord>,
    /// Clamp bookkeeping for this step.
    pub guard: ClampGuard,
}

impl std::fmt::Debug for ApplyContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplyContext")
            .field("event", &self.envelope.id)
            .field("reads", &self.expected.len())
            .field("staged", &self.staged.len())
            .finish_non_exhaustive()
    }
}

impl<'a> ApplyContext<'a> {
    /// A context over `store`, seeded with validated snapshots.
    #[must_use]
    pub fn new(
        store: &'a dyn EntityStore,
        envelope: &'a EventEnvelope,
        config: &'a HerostatConfig,
        snapshots: HashMap<RecordKey, Option<Stored>>,
    ) -> Self {
        Self {
            store,
            envelope,
            config,
            snapshots,
            expected: BTreeMap::new(),
            originals: HashMap::new(),
            staged: BTreeMap::new(),
            audits: Vec::new(),
            guard: ClampGuard::new(config.engine.clamp_policy),
        }
    }

    /// The event being applied.
    #[must_use]
    pub fn envelope(&self) -> &EventEnvelope {
        self.envelope
    }

    /// Id of the event being applied.
    #[must_use]
    pub fn event_id(&self) -> EventId {
        self.envelope.id
    }

    /// Block timestamp of the event being applied.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        self.envelope.timestamp
    }

    /// Engine configuration.
    #[must_use]
    pub fn config(&self) -> &'a HerostatConfig {
        self.config
    }

    fn read(&mut self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        if let Some(staged) = self.staged.get(key) {
            return Ok(match staged {
                Staged::Put(data) => Some(data.clone()),
                Staged::Delete => None,
            });
        }
        if let Some(original) = self.originals.get(key) {
            return Ok(original.clone());
        }
        let stored = match self.snapshots.remove(key) {
            Some(snapshot) => snapshot,
            None => self.store.get(key)?,
        };
        self.expected
            .insert(key.clone(), stored.as_ref().map(|s| s.revision));
        let data = stored.map(|s| s.data);
        self.originals.insert(key.clone(), data.clone());
        Ok(data)
    }

    /// Load a record, `None` when absent.
    ///
    /// # Errors
    /// Returns storage or decode errors.
    pub fn load<T: Record>(&mut self, id: &str) -> Result<Option<T>> {
        self.read(&RecordKey::new(T::KIND, id))?
            .map(|data| decode(&data))
            .transpose()
    }

    /// Load a record the event cannot proceed without.
    ///
    /// # Errors
    /// Returns [`HerostatError::MissingEntity`] when absent.
    pub fn require<T: Record>(&mut self, id: &str) -> Result<T> {
        match self.load(id)? {
            Some(record) => Ok(record),
            None => Err(self.missing::<T>(id)),
        }
    }

    /// The ordering violation for a required `T` that is absent.
    #[must_use]
    pub fn missing<T: Record>(&self, id: &str) -> HerostatError {
        HerostatError::MissingEntity {
            kind: T::KIND,
            id: id.to_string(),
            event: self.envelope.id,
        }
    }

    /// Load a record, falling back to its factory defaults.
    ///
    /// # Errors
    /// Returns storage or decode errors.
    pub fn load_or_default<T: Factory>(&mut self, id: &str) -> Result<T> {
        Ok(self.load(id)?.unwrap_or_else(|| T::with_defaults(id)))
    }

    /// Load a player, stamping `first_seen_at` and counting it in the global
    /// record the first time any event touches it.
    ///
    /// # Errors
    /// Returns storage or decode errors.
    pub fn player(&mut self, address: &Address) -> Result<Player> {
        let mut player: Player = self.load_or_default(address.as_str())?;
        if player.first_seen_at.is_none() {
            player.first_seen_at = Some(self.timestamp());
            let mut global: GlobalStats = self.load_or_default(GlobalStats::ID)?;
            self.guard
                .add(&mut global.total_players, 1, "global.total_players");
            self.put(&global)?;
            self.put(&player)?;
        }
        Ok(player)
    }

    /// Stage an upsert.
    ///
    /// # Errors
    /// Returns `HerostatError::Serialization` if encoding fails.
    pub fn put<T: Record>(&mut self, record: &T) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.staged.insert(record.record_key(), Staged::Put(data));
        Ok(())
    }

    /// Stage a delete.
    pub fn delete<T: Record>(&mut self, id: &str) {
        self.staged
            .insert(RecordKey::new(T::KIND, id), Staged::Delete);
    }

    /// Append an audit record for this event.
    pub fn audit(&mut self, entry: AuditEntry) {
        let seq = u32::try_from(self.audits.len()).unwrap_or(u32::MAX);
        self.audits.push(AuditRecord {
            id: AuditRecord::id_for(self.envelope.id, seq),
            timestamp: self.envelope.timestamp,
            actor: entry.actor,
            kind: entry.kind,
            details: entry.details,
            related_entity: entry.related_entity,
            origin_contract: self.envelope.contract.clone(),
            staking_context: entry.staking_context,
        });
    }

    /// Whether the event has already been committed.
    ///
    /// # Errors
    /// Returns storage errors.
    pub fn already_applied(&mut self) -> Result<bool> {
        let id = self.envelope.id.to_string();
        Ok(self.load::<AppliedEvent>(&id)?.is_some())
    }

    /// Turn the staged writes into a commit batch, plus the number of audit
    /// records it carries.
    ///
    /// Records staged back unchanged are dropped from the write set but keep
    /// their revision expectation.
    ///
    /// # Errors
    /// Returns `HerostatError::Serialization` if encoding fails.
    pub fn into_batch(self) -> Result<(CommitBatch, usize)> {
        let mut batch = CommitBatch::for_event(self.envelope.id);
        let marker = AppliedEvent {
            event: self.envelope.id,
            timestamp: self.envelope.timestamp,
        };
        batch.expect(marker.record_key(), None);
        for (key, revision) in &self.expected {
            if *key != marker.record_key() {
                batch.expect(key.clone(), *revision);
            }
        }

        for (key, staged) in self.staged {
            let original = self.originals.get(&key);
            match staged {
                Staged::Put(data) => {
                    if original.is_some_and(|o| o.as_ref() == Some(&data)) {
                        continue;
                    }
                    batch.ops.push(WriteOp::Put { key, data });
                }
                Staged::Delete => {
                    if original.is_some_and(Option::is_none) {
                        continue;
                    }
                    batch.ops.push(WriteOp::Delete { key });
                }
            }
        }

        let audits = self.audits.len();
        for record in &self.audits {
            batch.put(record)?;
        }
        batch.put(&marker)?;
        Ok((batch, audits))
    }
}
