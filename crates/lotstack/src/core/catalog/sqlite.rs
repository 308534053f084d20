//! SQLite Record Store
//!
//! Durable catalog record persistence backed by SQLite. Asset lists and
//! metadata are stored as JSON columns; the schema is created on first use.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::broadcast;

use crate::core::{CoreError, CoreResult, OwnerId, RecordId};

use super::models::{CatalogChange, CatalogRecord, RecordPatch, RecordStatus};
use super::store::RecordStore;

/// Broadcast channel capacity for catalog change notifications
const CHANGE_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// SQLite Record Store
// =============================================================================

/// SQLite-backed catalog record store
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    subscribers: Mutex<HashMap<OwnerId, broadcast::Sender<CatalogChange>>>,
}

impl SqliteRecordStore {
    /// Creates (or opens) a record database at the specified path
    pub fn create<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            CoreError::RecordStoreFailed(format!("Failed to open record database: {}", e))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(HashMap::new()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Creates an in-memory database (for testing)
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory().map_err(|e| {
            CoreError::RecordStoreFailed(format!("Failed to create in-memory database: {}", e))
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            subscribers: Mutex::new(HashMap::new()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Initializes the database schema
    fn init_schema(&self) -> CoreResult<()> {
        let conn = self.lock_conn()?;
        conn.execute_batch(
            r#"
            -- Records table: one row per catalog record
            CREATE TABLE IF NOT EXISTS records (
                id TEXT PRIMARY KEY,
                owner_id TEXT NOT NULL,
                status TEXT NOT NULL,
                assets TEXT NOT NULL,
                metadata TEXT NOT NULL,
                notes TEXT NOT NULL DEFAULT '',
                failure_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                analyzed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner_id);
            "#,
        )
        .map_err(|e| CoreError::RecordStoreFailed(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    fn lock_conn(&self) -> CoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Internal("record database lock poisoned".to_string()))
    }

    fn snapshot(conn: &Connection, owner_id: &str) -> CoreResult<Vec<CatalogRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, owner_id, status, assets, metadata, notes, failure_reason,
                        created_at, updated_at, analyzed_at
                 FROM records WHERE owner_id = ? ORDER BY created_at, id",
            )
            .map_err(|e| {
                CoreError::RecordStoreFailed(format!("Failed to prepare listing: {}", e))
            })?;

        let rows = stmt
            .query_map([owner_id], row_to_raw)
            .map_err(|e| CoreError::RecordStoreFailed(format!("Failed to list records: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(|e| {
                CoreError::RecordStoreFailed(format!("Failed to read record row: {}", e))
            })?;
            records.push(raw.into_record()?);
        }
        Ok(records)
    }

    fn fetch(conn: &Connection, record_id: &str) -> CoreResult<CatalogRecord> {
        let raw = conn
            .query_row(
                "SELECT id, owner_id, status, assets, metadata, notes, failure_reason,
                        created_at, updated_at, analyzed_at
                 FROM records WHERE id = ?",
                [record_id],
                row_to_raw,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => {
                    CoreError::RecordNotFound(record_id.to_string())
                }
                other => CoreError::RecordStoreFailed(format!("Failed to fetch record: {}", other)),
            })?;
        raw.into_record()
    }

    fn write(conn: &Connection, record: &CatalogRecord) -> CoreResult<()> {
        let assets = serde_json::to_string(&record.assets)?;
        let metadata = serde_json::to_string(&record.metadata)?;
        conn.execute(
            "INSERT INTO records (id, owner_id, status, assets, metadata, notes,
                                  failure_reason, created_at, updated_at, analyzed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(id) DO UPDATE SET
                 status = excluded.status,
                 assets = excluded.assets,
                 metadata = excluded.metadata,
                 notes = excluded.notes,
                 failure_reason = excluded.failure_reason,
                 updated_at = excluded.updated_at,
                 analyzed_at = excluded.analyzed_at",
            params![
                record.id,
                record.owner_id,
                record.status.as_str(),
                assets,
                metadata,
                record.notes,
                record.failure_reason,
                record.created_at,
                record.updated_at,
                record.analyzed_at,
            ],
        )
        .map_err(|e| CoreError::RecordStoreFailed(format!("Failed to write record: {}", e)))?;
        Ok(())
    }

    fn notify(&self, owner_id: &str, records: Vec<CatalogRecord>) {
        let subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        if let Some(tx) = subscribers.get(owner_id) {
            let _ = tx.send(CatalogChange {
                owner_id: owner_id.to_string(),
                records,
            });
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn create(&self, owner_id: &str) -> CoreResult<RecordId> {
        let record = CatalogRecord::new(owner_id);
        let record_id = record.id.clone();

        let snapshot = {
            let conn = self.lock_conn()?;
            Self::write(&conn, &record)?;
            Self::snapshot(&conn, owner_id)?
        };
        self.notify(owner_id, snapshot);
        Ok(record_id)
    }

    async fn get(&self, record_id: &str) -> CoreResult<CatalogRecord> {
        let conn = self.lock_conn()?;
        Self::fetch(&conn, record_id)
    }

    async fn update(&self, record_id: &str, patch: RecordPatch) -> CoreResult<()> {
        let (owner_id, snapshot) = {
            let conn = self.lock_conn()?;
            let mut record = Self::fetch(&conn, record_id)?;
            patch.apply(&mut record);
            Self::write(&conn, &record)?;
            let snapshot = Self::snapshot(&conn, &record.owner_id)?;
            (record.owner_id, snapshot)
        };
        self.notify(&owner_id, snapshot);
        Ok(())
    }

    async fn delete(&self, record_id: &str) -> CoreResult<()> {
        let (owner_id, snapshot) = {
            let conn = self.lock_conn()?;
            let record = Self::fetch(&conn, record_id)?;
            conn.execute("DELETE FROM records WHERE id = ?", [record_id])
                .map_err(|e| {
                    CoreError::RecordStoreFailed(format!("Failed to delete record: {}", e))
                })?;
            let snapshot = Self::snapshot(&conn, &record.owner_id)?;
            (record.owner_id, snapshot)
        };
        self.notify(&owner_id, snapshot);
        Ok(())
    }

    async fn list(&self, owner_id: &str) -> CoreResult<Vec<CatalogRecord>> {
        let conn = self.lock_conn()?;
        Self::snapshot(&conn, owner_id)
    }

    fn subscribe(&self, owner_id: &str) -> broadcast::Receiver<CatalogChange> {
        let mut subscribers = self.subscribers.lock().expect("subscribers lock poisoned");
        subscribers
            .entry(owner_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANGE_CHANNEL_CAPACITY).0)
            .subscribe()
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

/// Raw column values before JSON and status decoding
struct RawRecordRow {
    id: String,
    owner_id: String,
    status: String,
    assets: String,
    metadata: String,
    notes: String,
    failure_reason: Option<String>,
    created_at: String,
    updated_at: String,
    analyzed_at: Option<String>,
}

fn row_to_raw(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecordRow> {
    Ok(RawRecordRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        status: row.get(2)?,
        assets: row.get(3)?,
        metadata: row.get(4)?,
        notes: row.get(5)?,
        failure_reason: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        analyzed_at: row.get(9)?,
    })
}

impl RawRecordRow {
    fn into_record(self) -> CoreResult<CatalogRecord> {
        let status = RecordStatus::parse(&self.status).ok_or_else(|| {
            CoreError::RecordStoreFailed(format!("Unknown record status: {}", self.status))
        })?;
        Ok(CatalogRecord {
            id: self.id,
            owner_id: self.owner_id,
            status,
            assets: serde_json::from_str(&self.assets)?,
            metadata: serde_json::from_str(&self.metadata)?,
            notes: self.notes,
            failure_reason: self.failure_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            analyzed_at: self.analyzed_at,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
