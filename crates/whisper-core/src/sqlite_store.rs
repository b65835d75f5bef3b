//! SQLite-based persistent storage for message history and the scan checkpoint.
//!
//! Records are keyed by transaction signature and inserted with
//! `INSERT OR IGNORE`, so replays of an already-recorded transaction leave a
//! single row. Scan checkpoints are keyed by local address.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::store::{Store, StoreError};
use crate::types::{Address, Direction, MessageRecord, ScanCheckpoint, TxSignature};

// ============================================================================
// Schema Version
// ============================================================================

/// Current schema version for migrations.
/// Increment this when adding new migrations.
const SCHEMA_VERSION: i32 = 2;

// ============================================================================
// SQLite Store Implementation
// ============================================================================

/// SQLite-based persistent store.
///
/// The connection is guarded by an async mutex; each operation runs as a
/// single statement so no explicit transaction is needed.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and run migrations.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    /// * `Ok(SqliteStore)` on success
    /// * `Err(StoreError)` if the database cannot be opened or migrated
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::OperationFailed(format!("failed to open database: {}", e))
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| StoreError::OperationFailed(format!("failed to set pragmas: {}", e)))?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory database, for tests.
    pub fn new_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|e| {
            StoreError::OperationFailed(format!("failed to open in-memory database: {}", e))
        })?;

        Self::run_migrations(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            [],
        )
        .map_err(|e| StoreError::OperationFailed(format!("failed to create schema_version: {}", e)))?;

        let current_version: i32 = conn
            .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
                row.get(0)
            })
            .map_err(|e| StoreError::OperationFailed(format!("failed to read schema version: {}", e)))?;

        if current_version > SCHEMA_VERSION {
            return Err(StoreError::DataCorruption(format!(
                "database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            )));
        }

        if current_version < 1 {
            Self::migrate_v1(conn)?;
        }
        if current_version < 2 {
            Self::migrate_v2(conn)?;
        }

        Ok(())
    }

    /// Migration to schema version 1 - initial schema.
    fn migrate_v1(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                signature TEXT PRIMARY KEY,
                local_address TEXT NOT NULL,
                counterparty TEXT NOT NULL,
                timestamp_ms INTEGER NOT NULL,
                body TEXT NOT NULL,
                direction TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages(timestamp_ms);

            CREATE TABLE IF NOT EXISTS scan_checkpoint (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                last_seen_signature TEXT
            );

            INSERT INTO schema_version (version) VALUES (1);
            "#,
        )
        .map_err(|e| StoreError::OperationFailed(format!("migration v1 failed: {}", e)))?;

        Ok(())
    }

    /// Migration to schema version 2 - one checkpoint per local address.
    ///
    /// The old singleton row cannot be attributed to an identity and is
    /// dropped; the next pass rescans and duplicate records are ignored.
    fn migrate_v2(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            DROP TABLE IF EXISTS scan_checkpoint;

            CREATE TABLE scan_checkpoint (
                local_address TEXT PRIMARY KEY,
                last_seen_signature TEXT
            );

            INSERT INTO schema_version (version) VALUES (2);
            "#,
        )
        .map_err(|e| StoreError::OperationFailed(format!("migration v2 failed: {}", e)))?;

        Ok(())
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
        Ok(RawRecord {
            signature: row.get(0)?,
            local_address: row.get(1)?,
            counterparty: row.get(2)?,
            timestamp_ms: row.get(3)?,
            body: row.get(4)?,
            direction: row.get(5)?,
        })
    }
}

/// Row as stored, before address and direction parsing.
struct RawRecord {
    signature: String,
    local_address: String,
    counterparty: String,
    timestamp_ms: i64,
    body: String,
    direction: String,
}

impl TryFrom<RawRecord> for MessageRecord {
    type Error = StoreError;

    fn try_from(raw: RawRecord) -> Result<Self, Self::Error> {
        let parse_addr = |s: &str| {
            s.parse::<Address>().map_err(|e| {
                StoreError::DataCorruption(format!("bad address in {}: {}", raw.signature, e))
            })
        };
        let local_address = parse_addr(&raw.local_address)?;
        let counterparty = parse_addr(&raw.counterparty)?;
        let direction: Direction = raw
            .direction
            .parse()
            .map_err(StoreError::DataCorruption)?;

        Ok(MessageRecord {
            signature: TxSignature::new(raw.signature),
            local_address,
            counterparty,
            timestamp_ms: raw.timestamp_ms,
            text: raw.body,
            direction,
        })
    }
}

// ============================================================================
// Store Trait Implementation
// ============================================================================

#[async_trait]
impl Store for SqliteStore {
    async fn insert_message(&self, record: MessageRecord) -> Result<bool, StoreError> {
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO messages
                    (signature, local_address, counterparty, timestamp_ms, body, direction)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.signature.as_str(),
                    record.local_address.to_string(),
                    record.counterparty.to_string(),
                    record.timestamp_ms,
                    record.text,
                    record.direction.as_str(),
                ],
            )
            .map_err(|e| StoreError::OperationFailed(format!("failed to insert message: {}", e)))?;
        Ok(inserted == 1)
    }

    async fn list_messages(&self) -> Result<Vec<MessageRecord>, StoreError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT signature, local_address, counterparty, timestamp_ms, body, direction
                 FROM messages ORDER BY timestamp_ms ASC, signature ASC",
            )
            .map_err(|e| StoreError::OperationFailed(format!("failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], Self::row_to_record)
            .map_err(|e| StoreError::OperationFailed(format!("failed to list messages: {}", e)))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::OperationFailed(format!("failed to collect messages: {}", e)))?;

        rows.into_iter().map(MessageRecord::try_from).collect()
    }

    async fn load_checkpoint(&self, local: &Address) -> Result<ScanCheckpoint, StoreError> {
        let conn = self.conn.lock().await;
        let last_seen: Option<Option<String>> = conn
            .query_row(
                "SELECT last_seen_signature FROM scan_checkpoint WHERE local_address = ?1",
                params![local.to_string()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::OperationFailed(format!("failed to load checkpoint: {}", e)))?;

        Ok(ScanCheckpoint {
            last_seen_signature: last_seen.flatten().map(TxSignature::new),
        })
    }

    async fn save_checkpoint(
        &self,
        local: &Address,
        checkpoint: &ScanCheckpoint,
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO scan_checkpoint (local_address, last_seen_signature)
             VALUES (?1, ?2)",
            params![
                local.to_string(),
                checkpoint.last_seen_signature.as_ref().map(|s| s.as_str())
            ],
        )
        .map_err(|e| StoreError::OperationFailed(format!("failed to save checkpoint: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sig: &str, ts: i64, direction: Direction) -> MessageRecord {
        MessageRecord {
            signature: TxSignature::new(sig),
            local_address: Address::new([1u8; 32]),
            counterparty: Address::new([2u8; 32]),
            timestamp_ms: ts,
            text: format!("hello from {sig}"),
            direction,
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let store = SqliteStore::new_in_memory().unwrap();

        assert!(store.insert_message(record("b", 20, Direction::Outgoing)).await.unwrap());
        assert!(store.insert_message(record("a", 10, Direction::Incoming)).await.unwrap());

        let all = store.list_messages().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], record("a", 10, Direction::Incoming));
        assert_eq!(all[1], record("b", 20, Direction::Outgoing));
    }

    #[tokio::test]
    async fn test_duplicate_signature_ignored() {
        let store = SqliteStore::new_in_memory().unwrap();

        assert!(store.insert_message(record("dup", 1, Direction::Incoming)).await.unwrap());
        assert!(!store.insert_message(record("dup", 2, Direction::Incoming)).await.unwrap());

        let all = store.list_messages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].timestamp_ms, 1);
    }

    #[tokio::test]
    async fn test_checkpoint_round_trip() {
        let store = SqliteStore::new_in_memory().unwrap();
        let local = Address::new([1u8; 32]);
        assert_eq!(store.load_checkpoint(&local).await.unwrap(), ScanCheckpoint::default());

        store
            .save_checkpoint(&local, &ScanCheckpoint::at(TxSignature::new("first")))
            .await
            .unwrap();
        store
            .save_checkpoint(&local, &ScanCheckpoint::at(TxSignature::new("second")))
            .await
            .unwrap();

        assert_eq!(
            store.load_checkpoint(&local).await.unwrap(),
            ScanCheckpoint::at(TxSignature::new("second"))
        );
    }

    #[tokio::test]
    async fn test_checkpoints_are_per_identity() {
        let store = SqliteStore::new_in_memory().unwrap();
        let alice = Address::new([1u8; 32]);
        let bob = Address::new([2u8; 32]);

        store
            .save_checkpoint(&alice, &ScanCheckpoint::at(TxSignature::new("alice-newest")))
            .await
            .unwrap();

        assert_eq!(store.load_checkpoint(&bob).await.unwrap(), ScanCheckpoint::default());
        assert_eq!(
            store.load_checkpoint(&alice).await.unwrap().last_seen_signature,
            Some(TxSignature::new("alice-newest"))
        );
    }

    #[tokio::test]
    async fn test_v1_database_upgrades() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute_batch("CREATE TABLE schema_version (version INTEGER PRIMARY KEY);")
                .unwrap();
            SqliteStore::migrate_v1(&conn).unwrap();
            conn.execute(
                "INSERT INTO scan_checkpoint (id, last_seen_signature) VALUES (0, 'old')",
                [],
            )
            .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        let local = Address::new([1u8; 32]);
        assert_eq!(store.load_checkpoint(&local).await.unwrap(), ScanCheckpoint::default());

        store
            .save_checkpoint(&local, &ScanCheckpoint::at(TxSignature::new("new")))
            .await
            .unwrap();
        assert_eq!(
            store.load_checkpoint(&local).await.unwrap().last_seen_signature,
            Some(TxSignature::new("new"))
        );
    }

    #[tokio::test]
    async fn test_persistence_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("messages.db");

        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert_message(record("kept", 5, Direction::Incoming)).await.unwrap();
            store
                .save_checkpoint(&Address::new([1u8; 32]), &ScanCheckpoint::at(TxSignature::new("kept")))
                .await
                .unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        let all = store.list_messages().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].signature.as_str(), "kept");
        assert_eq!(
            store
                .load_checkpoint(&Address::new([1u8; 32]))
                .await
                .unwrap()
                .last_seen_signature,
            Some(TxSignature::new("kept"))
        );
    }

    #[tokio::test]
    async fn test_corrupt_direction_reported() {
        let store = SqliteStore::new_in_memory().unwrap();
        {
            let conn = store.conn.lock().await;
            conn.execute(
                "INSERT INTO messages VALUES ('x', ?1, ?1, 0, 'body', 'sideways')",
                params![Address::new([3u8; 32]).to_string()],
            )
            .unwrap();
        }
        assert!(matches!(
            store.list_messages().await,
            Err(StoreError::DataCorruption(_))
        ));
    }
}
