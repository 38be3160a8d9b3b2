//! Process-local entity store.
//!
//! Reads are lock-free through `DashMap`. Writers (`create_if_absent` and
//! `commit`) serialise on a single `parking_lot::Mutex`, so an expectation
//! check and the writes that follow it are atomic with respect to every
//! other writer.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use super::{CommitBatch, EntityStore, Stored, WriteOp};
use crate::entity::{RecordKey, RecordKind};
use crate::error::{HerostatError, Result};

/// In-memory [`EntityStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<RecordKey, Stored>,
    write_lock: Mutex<()>,
    sequence: AtomicU64,
}

impl MemoryStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn next_revision(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Stored>> {
        Ok(self.records.get(key).map(|r| r.value().clone()))
    }

    fn revision(&self, key: &RecordKey) -> Result<Option<u64>> {
        Ok(self.records.get(key).map(|r| r.value().revision))
    }

    fn create_if_absent(&self, key: &RecordKey, data: Vec<u8>) -> Result<Stored> {
        let _guard = self.write_lock.lock();
        if let Some(existing) = self.records.get(key) {
            return Ok(existing.value().clone());
        }
        let stored = Stored {
            revision: self.next_revision(),
            data,
        };
        self.records.insert(key.clone(), stored.clone());
        debug!(key = %key, "Created record with defaults");
        Ok(stored)
    }

    fn commit(&self, batch: CommitBatch) -> Result<()> {
        let _guard = self.write_lock.lock();

        for (key, expected) in &batch.expectations {
            let current = self.records.get(key).map(|r| r.value().revision);
            if current != *expected {
                return Err(HerostatError::Conflict {
                    kind: key.kind,
                    id: key.id.clone(),
                });
            }
        }

        for op in batch.ops {
            match op {
                WriteOp::Put { key, data } => {
                    let revision = self.next_revision();
                    self.records.insert(key, Stored { revision, data });
                }
                WriteOp::Delete { key } => {
                    self.records.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn scan(&self, kind: RecordKind) -> Result<Vec<(String, Stored)>> {
        let mut out: Vec<(String, Stored)> = self
            .records
            .iter()
            .filter(|r| r.key().kind == kind)
            .map(|r| (r.key().id.clone(), r.value().clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: &str) -> RecordKey {
        RecordKey::new(RecordKind::Hero, id)
    }

    fn put(id: &str, data: &[u8]) -> WriteOp {
        WriteOp::Put {
            key: key(id),
            data: data.to_vec(),
        }
    }

    #[test]
    fn create_if_absent_keeps_existing() {
        let store = MemoryStore::new();
        let first = store.create_if_absent(&key("1"), b"a".to_vec()).expect("create");
        let second = store.create_if_absent(&key("1"), b"b".to_vec()).expect("create");
        assert_eq!(first, second);
        assert_eq!(second.data, b"a");
    }

    #[test]
    fn commit_bumps_revision() {
        let store = MemoryStore::new();
        let created = store.create_if_absent(&key("1"), b"a".to_vec()).expect("create");

        let mut batch = CommitBatch::default();
        batch.expect(key("1"), Some(created.revision));
        batch.ops.push(put("1", b"b"));
        store.commit(batch).expect("commit");

        let now = store.get(&key("1")).expect("get").expect("present");
        assert!(now.revision > created.revision);
        assert_eq!(now.data, b"b");
    }

    #[test]
    fn stale_expectation_conflicts_and_writes_nothing() {
        let store = MemoryStore::new();
        store.create_if_absent(&key("1"), b"a".to_vec()).expect("create");

        let mut batch = CommitBatch::default();
        batch.expect(key("1"), None);
        batch.ops.push(put("2", b"x"));
        let err = store.commit(batch).expect_err("conflict");
        assert!(err.is_transient());
        assert!(store.get(&key("2")).expect("get").is_none());
    }

    #[test]
    fn delete_then_recreate_gets_fresh_revision() {
        let store = MemoryStore::new();
        let first = store.create_if_absent(&key("1"), b"a".to_vec()).expect("create");
        store
            .commit(CommitBatch {
                ops: vec![WriteOp::Delete { key: key("1") }],
                ..CommitBatch::default()
            })
            .expect("delete");
        assert!(store.revision(&key("1")).expect("rev").is_none());
        let again = store.create_if_absent(&key("1"), b"a".to_vec()).expect("create");
        assert_ne!(first.revision, again.revision);
    }

    #[test]
    fn scan_filters_by_kind_and_sorts() {
        let store = MemoryStore::new();
        store.create_if_absent(&key("2"), b"x".to_vec()).expect("create");
        store.create_if_absent(&key("1"), b"y".to_vec()).expect("create");
        store
            .create_if_absent(&RecordKey::new(RecordKind::Weapon, "9"), b"z".to_vec())
            .expect("create");
        let heroes = store.scan(RecordKind::Hero).expect("scan");
        let ids: Vec<&str> = heroes.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(store.len(), 3);
    }
}
