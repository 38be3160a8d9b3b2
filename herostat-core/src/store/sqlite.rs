//! `SQLite` entity store.
//!
//! Every record is stored as JSON in a single table:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS records (
//!     kind       TEXT    NOT NULL,
//!     id         TEXT    NOT NULL,
//!     revision   INTEGER NOT NULL,
//!     data       BLOB    NOT NULL,
//!     updated_at TEXT    NOT NULL,
//!     checksum   TEXT,
//!     PRIMARY KEY (kind, id)
//! );
//! ```
//!
//! - WAL mode for concurrent readers
//! - JSON inside a BLOB column keeps the schema stable as record shapes grow
//! - Optional CRC-32 checksum detects on-disk corruption
//! - Backup via `SQLite`'s online-backup API

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info, warn};

use super::{CommitBatch, EntityStore, Stored, WriteOp};
use crate::config::PersistenceConfig;
use crate::entity::{RecordKey, RecordKind};
use crate::error::{HerostatError, Result};

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS records (
    kind       TEXT    NOT NULL,
    id         TEXT    NOT NULL,
    revision   INTEGER NOT NULL,
    data       BLOB    NOT NULL,
    updated_at TEXT    NOT NULL,
    checksum   TEXT,
    PRIMARY KEY (kind, id)
);";

// ---------------------------------------------------------------------------
// CRC-32 checksum helper
// ---------------------------------------------------------------------------

/// CRC-32 of `data` as a lowercase hex string.
fn crc32_hex(data: &[u8]) -> String {
    format!("{:08x}", crc32_compute(data))
}

/// CRC-32 (ISO 3309 / ITU-T V.42).
fn crc32_compute(data: &[u8]) -> u32 {
    const POLY: u32 = 0xEDB8_8320;
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            if crc & 1 == 1 {
                crc = (crc >> 1) ^ POLY;
            } else {
                crc >>= 1;
            }
        }
    }
    !crc
}

fn to_sql_revision(revision: u64) -> i64 {
    i64::try_from(revision).unwrap_or(i64::MAX)
}

fn from_sql_revision(revision: i64) -> u64 {
    u64::try_from(revision).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Durable [`EntityStore`] on a single `SQLite` connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    config: PersistenceConfig,
    db_path: PathBuf,
    sequence: AtomicU64,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) a database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled when
    /// `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`HerostatError::Database`] on `SQLite` failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &PersistenceConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        conn.execute_batch(SCHEMA)?;

        let store = Self::with_connection(conn, config, db_path)?;
        info!(
            path = %store.db_path.display(),
            wal = config.wal_mode,
            records = store.record_count()?,
            "Herostat entity store opened"
        );
        Ok(store)
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`HerostatError::Database`] on `SQLite` failures.
    pub fn open_in_memory(config: &PersistenceConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Self::with_connection(conn, config, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, config: &PersistenceConfig, db_path: PathBuf) -> Result<Self> {
        let max: i64 =
            conn.query_row("SELECT COALESCE(MAX(revision), 0) FROM records", [], |row| {
                row.get(0)
            })?;
        Ok(Self {
            conn: Mutex::new(conn),
            config: config.clone(),
            db_path,
            sequence: AtomicU64::new(from_sql_revision(max)),
        })
    }

    fn next_revision(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn checksum(&self, data: &[u8]) -> Option<String> {
        self.config.checksum_enabled.then(|| crc32_hex(data))
    }

    fn verify(&self, key: &RecordKey, data: &[u8], stored_checksum: Option<&str>) {
        if !self.config.checksum_enabled {
            return;
        }
        if let Some(expected) = stored_checksum {
            let actual = crc32_hex(data);
            if expected != actual {
                warn!(
                    key = %key,
                    expected = %expected,
                    actual = %actual,
                    "Checksum mismatch, possible record corruption"
                );
            }
        }
    }

    fn current_revision(conn: &Connection, key: &RecordKey) -> Result<Option<u64>> {
        let mut stmt =
            conn.prepare_cached("SELECT revision FROM records WHERE kind = ?1 AND id = ?2")?;
        let revision: Option<i64> = stmt
            .query_row(params![key.kind.as_str(), key.id], |row| row.get(0))
            .optional()?;
        Ok(revision.map(from_sql_revision))
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Total number of stored records.
    ///
    /// # Errors
    ///
    /// Returns [`HerostatError::Database`] on `SQLite` failures.
    pub fn record_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .lock()
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Create a backup of the database at `dest_path` using `SQLite`'s
    /// online-backup API.
    ///
    /// # Errors
    ///
    /// Returns [`HerostatError::Database`] on `SQLite` failures.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let conn = self.conn.lock();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&conn, &mut dest)?;
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "Database backup completed"
        );
        Ok(())
    }

    /// Path to the database file (or `:memory:`).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run `PRAGMA integrity_check`. `Ok(false)` means corruption.
    ///
    /// # Errors
    ///
    /// Returns [`HerostatError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .lock()
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }
}

impl EntityStore for SqliteStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Stored>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT revision, data, checksum FROM records WHERE kind = ?1 AND id = ?2",
        )?;
        let row: Option<(i64, Vec<u8>, Option<String>)> = stmt
            .query_row(params![key.kind.as_str(), key.id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .optional()?;

        Ok(row.map(|(revision, data, checksum)| {
            self.verify(key, &data, checksum.as_deref());
            Stored {
                revision: from_sql_revision(revision),
                data,
            }
        }))
    }

    fn revision(&self, key: &RecordKey) -> Result<Option<u64>> {
        Self::current_revision(&self.conn.lock(), key)
    }

    fn create_if_absent(&self, key: &RecordKey, data: Vec<u8>) -> Result<Stored> {
        {
            let conn = self.conn.lock();
            if Self::current_revision(&conn, key)?.is_none() {
                let revision = self.next_revision();
                conn.execute(
                    "INSERT INTO records (kind, id, revision, data, updated_at, checksum)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        key.kind.as_str(),
                        key.id,
                        to_sql_revision(revision),
                        data,
                        Utc::now().to_rfc3339(),
                        self.checksum(&data),
                    ],
                )?;
                debug!(key = %key, "Created record with defaults");
                return Ok(Stored { revision, data });
            }
        }
        self.get(key)?.ok_or_else(|| HerostatError::Conflict {
            kind: key.kind,
            id: key.id.clone(),
        })
    }

    fn commit(&self, batch: CommitBatch) -> Result<()> {
        let start = Instant::now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        for (key, expected) in &batch.expectations {
            if Self::current_revision(&tx, key)? != *expected {
                return Err(HerostatError::Conflict {
                    kind: key.kind,
                    id: key.id.clone(),
                });
            }
        }

        let now = Utc::now().to_rfc3339();
        let writes = batch.ops.len();
        for op in &batch.ops {
            match op {
                WriteOp::Put { key, data } => {
                    tx.execute(
                        "INSERT INTO records (kind, id, revision, data, updated_at, checksum)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(kind, id) DO UPDATE SET
                            revision = excluded.revision,
                            data = excluded.data,
                            updated_at = excluded.updated_at,
                            checksum = excluded.checksum",
                        params![
                            key.kind.as_str(),
                            key.id,
                            to_sql_revision(self.next_revision()),
                            data,
                            now,
                            self.checksum(data),
                        ],
                    )?;
                }
                WriteOp::Delete { key } => {
                    tx.execute(
                        "DELETE FROM records WHERE kind = ?1 AND id = ?2",
                        params![key.kind.as_str(), key.id],
                    )?;
                }
            }
        }
        tx.commit()?;

        debug!(
            event = ?batch.event,
            writes,
            elapsed_us = start.elapsed().as_micros(),
            "Committed batch"
        );
        Ok(())
    }

    fn scan(&self, kind: RecordKind) -> Result<Vec<(String, Stored)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT id, revision, data, checksum FROM records WHERE kind = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![kind.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Vec<u8>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (id, revision, data, checksum) = row?;
            self.verify(&RecordKey::new(kind, id.clone()), &data, checksum.as_deref());
            out.push((
                id,
                Stored {
                    revision: from_sql_revision(revision),
                    data,
                },
            ));
        }
        Ok(out)
    }
}

/// Extension trait that adds an `.optional()` combinator to `rusqlite::Result`.
///
/// Converts `Err(QueryReturnedNoRows)` into `Ok(None)`.
trait OptionalExt<T> {
    /// Convert `QueryReturnedNoRows` into `Ok(None)`.
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Hero;
    use crate::store::RecordStoreExt;
    use crate::types::TokenId;

    fn test_config() -> PersistenceConfig {
        PersistenceConfig {
            checksum_enabled: true,
            ..PersistenceConfig::default()
        }
    }

    fn hero_key(id: &str) -> RecordKey {
        RecordKey::new(RecordKind::Hero, id)
    }

    #[test]
    fn typed_round_trip() {
        let store = SqliteStore::open_in_memory(&test_config()).expect("open");
        let mut hero = Hero::new(TokenId::from(7));
        hero.level = 12;
        store.save(&hero).expect("save");

        let loaded: Hero = store.load("7").expect("load").expect("Some");
        assert_eq!(loaded.level, 12);
        assert!(store.load::<Hero>("8").expect("load").is_none());
    }

    #[test]
    fn create_if_absent_then_cas_commit() {
        let store = SqliteStore::open_in_memory(&test_config()).expect("open");
        let created = store
            .create_if_absent(&hero_key("1"), b"{}".to_vec())
            .expect("create");
        let again = store
            .create_if_absent(&hero_key("1"), b"other".to_vec())
            .expect("create");
        assert_eq!(created, again);

        let mut stale = CommitBatch::default();
        stale.expect(hero_key("1"), Some(created.revision + 100));
        stale.ops.push(WriteOp::Delete { key: hero_key("1") });
        assert!(store.commit(stale).expect_err("conflict").is_transient());
        assert!(store.get(&hero_key("1")).expect("get").is_some());

        let mut fresh = CommitBatch::default();
        fresh.expect(hero_key("1"), Some(created.revision));
        fresh.ops.push(WriteOp::Delete { key: hero_key("1") });
        store.commit(fresh).expect("commit");
        assert!(store.revision(&hero_key("1")).expect("rev").is_none());
    }

    #[test]
    fn scan_is_ordered_by_id() {
        let store = SqliteStore::open_in_memory(&test_config()).expect("open");
        for id in ["b", "a", "c"] {
            store
                .create_if_absent(&hero_key(id), b"{}".to_vec())
                .expect("create");
        }
        let ids: Vec<String> = store
            .scan(RecordKind::Hero)
            .expect("scan")
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(store.record_count().expect("count"), 3);
    }

    #[test]
    fn checksum_mismatch_still_loads() {
        let store = SqliteStore::open_in_memory(&test_config()).expect("open");
        store.save(&Hero::new(TokenId::from(1))).expect("save");
        store
            .conn
            .lock()
            .execute("UPDATE records SET checksum = 'deadbeef'", [])
            .expect("corrupt checksum");
        assert!(store.load::<Hero>("1").expect("load").is_some());
    }

    #[test]
    fn integrity_check_passes() {
        let store = SqliteStore::open_in_memory(&test_config()).expect("open");
        assert!(store.integrity_check().expect("check"));
    }

    #[test]
    fn file_backed_reopen_resumes_revisions() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("herostat.db");
        let first = {
            let store = SqliteStore::open(&path, &test_config()).expect("open");
            store
                .create_if_absent(&hero_key("1"), b"{}".to_vec())
                .expect("create")
        };
        let store = SqliteStore::open(&path, &test_config()).expect("reopen");
        let second = store
            .create_if_absent(&hero_key("2"), b"{}".to_vec())
            .expect("create");
        assert!(second.revision > first.revision);
    }

    #[test]
    fn file_based_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store =
            SqliteStore::open(dir.path().join("live.db"), &test_config()).expect("open");
        store.save(&Hero::new(TokenId::from(3))).expect("save");

        let backup_path = dir.path().join("backup.db");
        store.backup(&backup_path).expect("backup");

        let restored = SqliteStore::open(&backup_path, &test_config()).expect("open backup");
        assert!(restored.load::<Hero>("3").expect("load").is_some());
    }

    #[test]
    fn crc32_basic() {
        assert_eq!(crc32_compute(b"123456789"), 0xCBF4_3926);
    }
}
