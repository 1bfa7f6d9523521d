//! The embedded relational store (spec §4.1, component C1).
//!
//! A single SQLite file in WAL mode, behind a fixed-size connection pool.
//! Every query acquires a connection, runs, and releases it; there is no
//! cross-query transaction exposed to callers other than inside the price
//! book's upsert-plus-history write.

mod limits;
mod pricing;
mod usage;
mod users;

pub mod models;

pub use models::{PriceHistoryRow, PriceRow, RateLimits, UsageInsert, UsageRecord, User};

use std::path::Path;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store is busy")]
    Busy,
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StoreError {
    /// True for a `UNIQUE`/`FOREIGN KEY`/etc. constraint violation — a
    /// client-caused 4xx (e.g. a duplicate user id or credential, spec §3
    /// invariant), not a server fault.
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::Sqlite(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: rusqlite::ErrorCode::ConstraintViolation,
                    ..
                },
                _,
            ))
        )
    }
}

#[derive(Clone)]
pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Opens (or creates) the store file at `path`, runs migrations, and
    /// returns a handle backed by a pool of `pool_size` connections.
    ///
    /// A corrupted store is fatal at startup, per spec §4.1.
    pub fn open(path: impl AsRef<Path>, pool_size: u32) -> anyhow::Result<Self> {
        let path_buf = path.as_ref().to_path_buf();
        let manager = SqliteConnectionManager::file(&path_buf).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });

        let pool = Pool::builder()
            .max_size(pool_size.max(1))
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        let store = Self { pool };
        store.migrate()?;
        Ok(store)
    }

    fn acquire(&self) -> Result<PooledConnection, StoreError> {
        self.pool.get().map_err(|_| StoreError::Busy)
    }

    /// Round-trips a connection through the pool. Used by the readiness probe.
    pub fn ping(&self) -> Result<(), StoreError> {
        let conn = self.acquire()?;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    fn migrate(&self) -> anyhow::Result<()> {
        let conn = self.acquire()?;
        run_migrations(&conn)?;
        Ok(())
    }
}

fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            api_key TEXT NOT NULL UNIQUE,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            model TEXT NOT NULL,
            input_tokens INTEGER NOT NULL,
            output_tokens INTEGER NOT NULL,
            total_tokens INTEGER NOT NULL,
            timestamp INTEGER NOT NULL,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS rate_limits (
            user_id TEXT PRIMARY KEY,
            requests_per_minute INTEGER,
            requests_per_day INTEGER,
            tokens_per_minute INTEGER,
            tokens_per_day INTEGER,
            lifetime_token_cap INTEGER,
            FOREIGN KEY(user_id) REFERENCES users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS price_book (
            model TEXT PRIMARY KEY,
            input_cost_per_million REAL NOT NULL,
            output_cost_per_million REAL NOT NULL
        );

        CREATE TABLE IF NOT EXISTS price_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            model TEXT NOT NULL,
            input_cost_per_million REAL NOT NULL,
            output_cost_per_million REAL NOT NULL,
            changed_at INTEGER NOT NULL,
            actor TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_usage_user_ts ON usage(user_id, timestamp);
        CREATE INDEX IF NOT EXISTS idx_price_book_model ON price_book(model);
        CREATE INDEX IF NOT EXISTS idx_price_history_model_ts ON price_history(model, changed_at DESC);
        ",
    )?;

    // Additive, idempotent: these three columns post-date the original
    // `usage` table. Restarts against an older file must not fail, so the
    // "duplicate column name" error from an already-migrated file is
    // swallowed (spec §4.1).
    for stmt in [
        "ALTER TABLE usage ADD COLUMN cost REAL NOT NULL DEFAULT 0",
        "ALTER TABLE usage ADD COLUMN request_id TEXT NOT NULL DEFAULT ''",
        "ALTER TABLE usage ADD COLUMN prompt_preview TEXT NOT NULL DEFAULT ''",
    ] {
        if let Err(err) = conn.execute(stmt, []) {
            let msg = err.to_string();
            if !msg.contains("duplicate column name") {
                return Err(err);
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::open(&path, 4).unwrap();
        // Re-opening (and thus re-running migrations) against the same file
        // must not error, even though the ALTER TABLE columns already exist.
        let store2 = Store::open(&path, 4).unwrap();
        drop(store);
        drop(store2);
    }
}
