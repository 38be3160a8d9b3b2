//! The entity store contract and its implementations.
//!
//! The engine treats storage as a key-value map of JSON-encoded records with
//! per-record revisions. There are no transactions beyond [`EntityStore::commit`],
//! which atomically checks the revisions an apply step read and writes its
//! results, failing with [`HerostatError::Conflict`] when anything moved.
//!
//! - [`MemoryStore`]: process-local, backed by `DashMap`
//! - [`SqliteStore`]: durable, backed by `rusqlite`

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::sync::Arc;

use tracing::info;

use crate::config::{PersistenceConfig, StoreBackend};
use crate::entity::{Record, RecordKey, RecordKind};
use crate::error::{HerostatError, Result};
use crate::types::EventId;

/// A record as held by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stored {
    /// Store-wide monotonic revision of the last write.
    pub revision: u64,
    /// JSON encoding of the record.
    pub data: Vec<u8>,
}

/// A single write in a commit batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    /// Insert or replace.
    Put {
        /// Target record.
        key: RecordKey,
        /// JSON encoding.
        data: Vec<u8>,
    },
    /// Remove if present.
    Delete {
        /// Target record.
        key: RecordKey,
    },
}

impl WriteOp {
    /// The record this op targets.
    #[must_use]
    pub fn key(&self) -> &RecordKey {
        match self {
            Self::Put { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Everything one apply step wants to write, guarded by the revisions it read.
#[derive(Debug, Clone, Default)]
pub struct CommitBatch {
    /// Event the batch belongs to, when there is one.
    pub event: Option<EventId>,
    /// `(key, revision read)`; `None` means the record was absent.
    pub expectations: Vec<(RecordKey, Option<u64>)>,
    /// Writes, applied in order.
    pub ops: Vec<WriteOp>,
}

impl CommitBatch {
    /// A batch for `event`.
    #[must_use]
    pub fn for_event(event: EventId) -> Self {
        Self {
            event: Some(event),
            ..Self::default()
        }
    }

    /// Require `key` to still be at `revision` when committing.
    pub fn expect(&mut self, key: RecordKey, revision: Option<u64>) {
        self.expectations.push((key, revision));
    }

    /// Stage a typed upsert.
    ///
    /// # Errors
    /// Returns `HerostatError::Serialization` if encoding fails.
    pub fn put<T: Record>(&mut self, record: &T) -> Result<()> {
        let data = serde_json::to_vec(record)?;
        self.ops.push(WriteOp::Put {
            key: record.record_key(),
            data,
        });
        Ok(())
    }

    /// Whether the batch writes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// The storage collaborator consumed by the engine.
pub trait EntityStore: Send + Sync {
    /// Fetch a record.
    ///
    /// # Errors
    /// Returns storage errors.
    fn get(&self, key: &RecordKey) -> Result<Option<Stored>>;

    /// Current revision of a record, `None` when absent.
    ///
    /// # Errors
    /// Returns storage errors.
    fn revision(&self, key: &RecordKey) -> Result<Option<u64>>;

    /// Insert `data` under `key` unless a record already exists; return
    /// whichever record is stored afterwards.
    ///
    /// # Errors
    /// Returns storage errors.
    fn create_if_absent(&self, key: &RecordKey, data: Vec<u8>) -> Result<Stored>;

    /// Atomically verify every expectation and apply every op.
    ///
    /// # Errors
    /// Returns `HerostatError::Conflict` when an expectation no longer
    /// holds; nothing is written in that case.
    fn commit(&self, batch: CommitBatch) -> Result<()>;

    /// Every record of `kind`, ordered by id.
    ///
    /// # Errors
    /// Returns storage errors.
    fn scan(&self, kind: RecordKind) -> Result<Vec<(String, Stored)>>;
}

impl<T: EntityStore + ?Sized> EntityStore for Box<T> {
    fn get(&self, key: &RecordKey) -> Result<Option<Stored>> {
        (**self).get(key)
    }
    fn revision(&self, key: &RecordKey) -> Result<Option<u64>> {
        (**self).revision(key)
    }
    fn create_if_absent(&self, key: &RecordKey, data: Vec<u8>) -> Result<Stored> {
        (**self).create_if_absent(key, data)
    }
    fn commit(&self, batch: CommitBatch) -> Result<()> {
        (**self).commit(batch)
    }
    fn scan(&self, kind: RecordKind) -> Result<Vec<(String, Stored)>> {
        (**self).scan(kind)
    }
}

impl<T: EntityStore + ?Sized> EntityStore for Arc<T> {
    fn get(&self, key: &RecordKey) -> Result<Option<Stored>> {
        (**self).get(key)
    }
    fn revision(&self, key: &RecordKey) -> Result<Option<u64>> {
        (**self).revision(key)
    }
    fn create_if_absent(&self, key: &RecordKey, data: Vec<u8>) -> Result<Stored> {
        (**self).create_if_absent(key, data)
    }
    fn commit(&self, batch: CommitBatch) -> Result<()> {
        (**self).commit(batch)
    }
    fn scan(&self, kind: RecordKind) -> Result<Vec<(String, Stored)>> {
        (**self).scan(kind)
    }
}

/// Typed helpers over any [`EntityStore`].
pub trait RecordStoreExt {
    /// Fetch and decode a record.
    ///
    /// # Errors
    /// Returns storage or decode errors.
    fn load<T: Record>(&self, id: &str) -> Result<Option<T>>;

    /// Decode every record of `T`'s kind.
    ///
    /// # Errors
    /// Returns storage or decode errors.
    fn load_all<T: Record>(&self) -> Result<Vec<T>>;

    /// Unconditionally upsert one record.
    ///
    /// # Errors
    /// Returns storage or encode errors.
    fn save<T: Record>(&self, record: &T) -> Result<()>;
}

impl<S: EntityStore + ?Sized> RecordStoreExt for S {
    fn load<T: Record>(&self, id: &str) -> Result<Option<T>> {
        self.get(&RecordKey::new(T::KIND, id))?
            .map(|stored| decode(&stored.data))
            .transpose()
    }

    fn load_all<T: Record>(&self) -> Result<Vec<T>> {
        self.scan(T::KIND)?
            .into_iter()
            .map(|(_, stored)| decode(&stored.data))
            .collect()
    }

    fn save<T: Record>(&self, record: &T) -> Result<()> {
        let mut batch = CommitBatch::default();
        batch.put(record)?;
        self.commit(batch)
    }
}

/// Decode a JSON-encoded record.
///
/// # Errors
/// Returns `HerostatError::Serialization` on malformed data.
pub fn decode<T: Record>(data: &[u8]) -> Result<T> {
    serde_json::from_slice(data).map_err(HerostatError::from)
}

/// Open the store selected by `config`.
///
/// # Errors
/// Returns `HerostatError::Database` if the `SQLite` file cannot be opened.
pub fn open_store(config: &PersistenceConfig) -> Result<Box<dyn EntityStore>> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory entity store");
            Ok(Box::new(MemoryStore::new()))
        }
        StoreBackend::Sqlite => Ok(Box::new(SqliteStore::open(&config.path, config)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Player;
    use crate::types::Address;

    #[test]
    fn typed_round_trip_through_boxed_store() {
        let store = open_store(&PersistenceConfig::default()).expect("open");
        let mut player = Player::new(Address::new("0xA"));
        player.balance = 42;
        store.save(&player).expect("save");

        let loaded: Player = store.load("0xa").expect("load").expect("present");
        assert_eq!(loaded.balance, 42);
        assert_eq!(store.load_all::<Player>().expect("all").len(), 1);
        assert!(store.load::<Player>("0xb").expect("load").is_none());
    }

    #[test]
    fn write_op_key() {
        let key = RecordKey::new(RecordKind::Hero, "1");
        assert_eq!(WriteOp::Delete { key: key.clone() }.key(), &key);
    }
}
