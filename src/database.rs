use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::Entry;

const ENTRY_COLUMNS: &str = "ROWID, ip, label, expiration";

/// Durable allow-list table backed by SQLite.
///
/// Every call runs as its own statement or transaction and is committed
/// before returning, so the store never holds unsaved writes.
#[derive(Clone)]
pub struct WhitelistStore {
    conn: Arc<Mutex<Connection>>,
}

impl WhitelistStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        debug!("Opened whitelist store at {}", path.as_ref().display());

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory store (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let mut conn = self.conn.lock();

        let existing: Option<String> = conn
            .query_row(
                "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = 'white_list'",
                [],
                |row| row.get(0),
            )
            .optional()?;

        if let Some(sql) = existing {
            if !sql.to_uppercase().contains("AUTOINCREMENT") {
                migrate_legacy_table(&mut conn)?;
            }
        }

        // AUTOINCREMENT keeps row ids monotonic: a deleted id is never handed out again.
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS white_list (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ip TEXT,
                label TEXT,
                expiration INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_white_list_expiration ON white_list(expiration);
            "#,
        )?;

        Ok(())
    }

    // ==================== Queries ====================

    /// All entries in insertion order
    pub fn list(&self) -> Result<Vec<Entry>> {
        let conn = self.conn.lock();
        list_entries(&conn)
    }

    /// Entries whose expiration is set and strictly before `now`
    pub fn list_expired(&self, now: i64) -> Result<Vec<Entry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM white_list
             WHERE expiration > 0 AND expiration < ?
             ORDER BY ROWID"
        ))?;

        let entries = stmt
            .query_map([now], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(entries)
    }

    /// Get a single entry by id
    pub fn get(&self, id: i64) -> Result<Option<Entry>> {
        let conn = self.conn.lock();

        conn.query_row(
            &format!("SELECT {ENTRY_COLUMNS} FROM white_list WHERE ROWID = ?"),
            [id],
            row_to_entry,
        )
        .optional()
        .map_err(Into::into)
    }

    // ==================== Mutations ====================

    /// Insert a new entry and return its store-assigned id.
    ///
    /// The caller is responsible for validating `ip` and sanitizing `label`.
    pub fn insert(&self, ip: &str, label: &str, expiration: i64) -> Result<i64> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO white_list (ip, label, expiration) VALUES (?, ?, ?)",
            params![ip, label, expiration],
        )?;

        Ok(conn.last_insert_rowid())
    }

    /// Delete an entry by id. Returns false when no such entry exists.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM white_list WHERE ROWID = ?", [id])?;
        Ok(rows > 0)
    }

    /// Delete every entry expired as of `now` in one transaction and
    /// return how many rows were removed.
    pub fn delete_expired(&self, now: i64) -> Result<usize> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let rows = tx.execute(
            "DELETE FROM white_list WHERE expiration > 0 AND expiration < ?",
            [now],
        )?;
        tx.commit()?;
        Ok(rows)
    }
    // ==================== Published mutations ====================

    /// Insert an entry and hand the resulting table to `publish` before
    /// committing.
    ///
    /// The row stays in an open transaction while `publish` runs, so no
    /// other caller can observe it, and it is rolled back if `publish` or
    /// the commit fails.
    pub fn insert_published<F>(
        &self,
        ip: &str,
        label: &str,
        expiration: i64,
        publish: F,
    ) -> Result<i64>
    where
        F: FnOnce(&[Entry]) -> Result<()>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO white_list (ip, label, expiration) VALUES (?, ?, ?)",
            params![ip, label, expiration],
        )?;
        let id = tx.last_insert_rowid();

        publish(&list_entries(&tx)?)?;
        tx.commit()?;

        Ok(id)
    }

    /// Delete an entry and hand the remaining table to `publish` before
    /// committing. Returns false, without calling `publish`, when no such
    /// entry exists.
    pub fn delete_published<F>(&self, id: i64, publish: F) -> Result<bool>
    where
        F: FnOnce(&[Entry]) -> Result<()>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        if tx.execute("DELETE FROM white_list WHERE ROWID = ?", [id])? == 0 {
            return Ok(false);
        }

        publish(&list_entries(&tx)?)?;
        tx.commit()?;

        Ok(true)
    }
}

fn list_entries(conn: &Connection) -> Result<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {ENTRY_COLUMNS} FROM white_list ORDER BY ROWID"
    ))?;

    let entries = stmt
        .query_map([], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(entries)
}

/// Rebuild a `white_list` table created without an AUTOINCREMENT key.
/// Existing row ids are kept as the new `id` values.
fn migrate_legacy_table(conn: &mut Connection) -> Result<()> {
    let tx = conn.transaction()?;

    tx.execute_batch(
        r#"
        CREATE TABLE white_list_migrated (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip TEXT,
            label TEXT,
            expiration INTEGER
        );
        INSERT INTO white_list_migrated (id, ip, label, expiration)
            SELECT ROWID, ip, label, expiration FROM white_list ORDER BY ROWID;
        DROP TABLE white_list;
        ALTER TABLE white_list_migrated RENAME TO white_list;
        "#,
    )?;
    let rows: i64 = tx.query_row("SELECT COUNT(*) FROM white_list", [], |row| row.get(0))?;
    tx.commit()?;

    warn!(
        "Rebuilt legacy white_list table with monotonic ids ({} rows kept)",
        rows
    );
    Ok(())
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        ip: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        label: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        expiration: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
    })
}
