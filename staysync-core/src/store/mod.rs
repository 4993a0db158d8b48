//! Sqlite-backed persistence.
//!
//! The store is the engine's persistence boundary: bookings keyed by
//! (uid, unit), feed sources, control-string mappings, the audit trail
//! of applied and held-back remote changes, and a small key-value meta
//! table used by the sync-run guard.

mod audit;
mod bookings;
mod mappings;
mod sources;
mod units;

pub use audit::AuditEntry;
pub use sources::SourceFilter;

use std::path::Path;

use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use crate::error::SyncResult;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    property_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    rate_formula TEXT
);

CREATE TABLE IF NOT EXISTS sources (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id INTEGER NOT NULL,
    url TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    last_synced_at TEXT,
    last_error TEXT
);

CREATE TABLE IF NOT EXISTS bookings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    unit_id INTEGER NOT NULL,
    uid TEXT NOT NULL,
    guest_name TEXT,
    check_in TEXT NOT NULL,
    check_out TEXT NOT NULL,
    status TEXT NOT NULL,
    adults INTEGER,
    children INTEGER,
    group_id TEXT,
    notes TEXT,
    price REAL,
    commission REAL,
    is_manual INTEGER NOT NULL DEFAULT 0,
    metadata TEXT NOT NULL DEFAULT '{}',
    ledger TEXT NOT NULL DEFAULT '{}',
    deleted_at TEXT,
    UNIQUE (uid, unit_id)
);

CREATE TABLE IF NOT EXISTS source_mappings (
    control TEXT PRIMARY KEY,
    booking_id INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sync_audit (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    booking_id INTEGER NOT NULL,
    source_key TEXT NOT NULL,
    field TEXT NOT NULL,
    old_value TEXT,
    new_value TEXT,
    baseline TEXT,
    applied INTEGER NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (and create if needed) the database at `path`.
    pub async fn open(path: &Path) -> SyncResult<Store> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let url = format!("sqlite://{}?mode=rwc", path.display());
        let pool = SqlitePool::connect(&url).await?;
        Store::init(pool).await
    }

    /// In-memory store for tests. Pinned to a single connection: every
    /// sqlite :memory: connection is its own empty database.
    pub async fn open_in_memory() -> SyncResult<Store> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Store::init(pool).await
    }

    async fn init(pool: SqlitePool) -> SyncResult<Store> {
        sqlx::raw_sql(SCHEMA).execute(&pool).await?;
        Ok(Store { pool })
    }

    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn meta_get(&self, key: &str) -> SyncResult<Option<String>> {
        use sqlx::Row;
        let row = sqlx::query("SELECT value FROM meta WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    pub async fn meta_set(&self, key: &str, value: &str) -> SyncResult<()> {
        sqlx::query(
            "INSERT INTO meta (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
