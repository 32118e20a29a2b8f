//! SQLite backend.
//!
//! The [`SqliteStore`] owns a [`rusqlite::Connection`] and guarantees that
//! migrations are run before any other operation. Several processes may
//! open the same file; each one is a "tab" of the same origin. WAL mode and
//! a busy timeout let their whole-document writes serialize instead of
//! failing, but nothing stops one tab's write from replacing another's.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::broadcast;

use crate::backend::{KeyValueStore, StoreChange, CHANGE_FEED_CAPACITY};
use crate::error::{Result, StoreError};
use crate::migrations;

/// How long a write waits for another process holding the write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteStore {
    conn: Mutex<Connection>,
    changes: broadcast::Sender<StoreChange>,
}

impl SqliteStore {
    /// Open (or create) the default application database.
    ///
    /// The database file is placed in the platform-appropriate data directory:
    /// - Linux:   `~/.local/share/huddle/huddle.db`
    /// - macOS:   `~/Library/Application Support/app.huddle.huddle/huddle.db`
    /// - Windows: `{FOLDERID_RoamingAppData}\huddle\huddle\data\huddle.db`
    pub fn open_default() -> Result<Self> {
        let path = default_path()?;
        tracing::info!(path = %path.display(), "opening database");
        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;

        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        migrations::run_migrations(&conn)?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        Ok(Self {
            conn: Mutex::new(conn),
            changes,
        })
    }

    /// Filesystem path of the open database (if any).
    pub fn path(&self) -> Option<PathBuf> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.path().map(PathBuf::from)
    }

    /// Number of times `key` has been written, by any process.
    pub fn revision(&self, key: &str) -> Result<u64> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let revision: Option<i64> = conn
            .query_row(
                "SELECT revision FROM collections WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(revision.unwrap_or(0) as u64)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        let value = conn
            .query_row(
                "SELECT value FROM collections WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn put(&self, key: &str, value: &str) -> Result<()> {
        {
            let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
            conn.execute(
                "INSERT INTO collections (key, value, revision, updated_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                     value = excluded.value,
                     revision = collections.revision + 1,
                     updated_at = excluded.updated_at",
                params![key, value, Utc::now().to_rfc3339()],
            )?;
        }
        let _ = self.changes.send(StoreChange {
            key: key.to_string(),
        });
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

fn default_path() -> Result<PathBuf> {
    let project_dirs = ProjectDirs::from("app", "huddle", "huddle").ok_or(StoreError::NoDataDir)?;
    Ok(project_dirs.data_dir().join("huddle.db"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");

        let db = SqliteStore::open_at(&path).expect("should open");
        assert!(db.path().is_some());
        assert!(db.get("conversations").unwrap().is_none());

        db.put("conversations", "[]").unwrap();
        assert_eq!(db.get("conversations").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn second_handle_sees_first_handles_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shared.db");

        let tab1 = SqliteStore::open_at(&path).unwrap();
        let tab2 = SqliteStore::open_at(&path).unwrap();

        tab1.put("teams", r#"[{"id":"t1"}]"#).unwrap();
        tab1.put("teams", r#"[{"id":"t2"}]"#).unwrap();

        assert_eq!(tab2.get("teams").unwrap().as_deref(), Some(r#"[{"id":"t2"}]"#));
        assert_eq!(tab2.revision("teams").unwrap(), 2);
        assert_eq!(tab2.revision("user").unwrap(), 0);
    }

    #[test]
    fn writes_are_announced_locally() {
        let dir = tempfile::tempdir().unwrap();
        let db = SqliteStore::open_at(&dir.path().join("feed.db")).unwrap();
        let mut feed = db.subscribe();

        db.put("user", "{}").unwrap();
        assert_eq!(feed.try_recv().unwrap().key, "user");
    }

    #[test]
    fn reopening_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        {
            let db = SqliteStore::open_at(&path).unwrap();
            db.put("notifications", "[1]").unwrap();
        }
        let db = SqliteStore::open_at(&path).unwrap();
        assert_eq!(db.get("notifications").unwrap().as_deref(), Some("[1]"));
    }
}
