use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::rusqlite::{params, OpenFlags, OptionalExtension};
use r2d2_sqlite::SqliteConnectionManager;

use crate::storage::area::ConfigArea;

/// SQLite-backed config area, one row per key.
pub struct SqliteConfigArea {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteConfigArea {
    /// Opens (creating if needed) the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_flags(
                OpenFlags::SQLITE_OPEN_READ_WRITE
                    | OpenFlags::SQLITE_OPEN_CREATE
                    | OpenFlags::SQLITE_OPEN_URI,
            )
            .with_init(|c| {
                c.busy_timeout(Duration::from_millis(500))?;
                c.pragma_update(None, "journal_mode", "WAL")?;
                c.execute_batch(
                    "CREATE TABLE IF NOT EXISTS config_entries (
                        key TEXT NOT NULL PRIMARY KEY,
                        value TEXT NOT NULL,
                        updated_at INTEGER NOT NULL DEFAULT (strftime('%s','now'))
                    );",
                )?;
                Ok(())
            });

        let pool = Pool::builder()
            .max_size(4)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }
}

impl ConfigArea for SqliteConfigArea {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_entries WHERE key=?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO config_entries(key,value) VALUES (?1,?2)
             ON CONFLICT(key) DO UPDATE
             SET value=excluded.value, updated_at=strftime('%s','now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM config_entries WHERE key=?1", params![key])?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM config_entries", [])?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM config_entries", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(count.max(0) as usize)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT key FROM config_entries ORDER BY key")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
