// SQLite-backed store for Polymart account links

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::GatewayError;

/// One row of the `polymart_links` table.
///
/// A row starts out pending (`token` is NULL) when the user initiates the
/// handshake, and becomes a completed link once the provider calls back
/// with a matching state.
#[derive(Debug, Clone)]
pub struct LinkRecord {
    pub id: i64,
    pub user_id: i64,
    pub random_state: String,
    pub token: Option<String>,
}

pub struct LinkStore {
    conn: Mutex<Connection>,
}

impl LinkStore {
    pub fn open(path: &Path) -> Result<Self, GatewayError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, GatewayError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, GatewayError> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             CREATE TABLE IF NOT EXISTS polymart_links (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 user_id INTEGER NOT NULL,
                 random_state TEXT NOT NULL,
                 token TEXT
             );
             CREATE INDEX IF NOT EXISTS idx_polymart_links_user
                 ON polymart_links (user_id);
             CREATE INDEX IF NOT EXISTS idx_polymart_links_state
                 ON polymart_links (random_state);",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, GatewayError> {
        let conn = self.conn.lock().expect("link store mutex poisoned");
        Ok(f(&conn)?)
    }

    /// Record a pending link: the user initiated the handshake but the
    /// provider has not called back yet.
    pub fn insert_pending(&self, user_id: i64, random_state: &str) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO polymart_links (user_id, random_state) VALUES (?1, ?2)",
                params![user_id, random_state],
            )?;
            Ok(())
        })
    }

    /// The most recent row carrying this state; older rows with a reused
    /// state are never considered valid for callback matching.
    pub fn find_by_state(&self, random_state: &str) -> Result<Option<LinkRecord>, GatewayError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, random_state, token FROM polymart_links
                 WHERE random_state = ?1 ORDER BY id DESC LIMIT 1",
                params![random_state],
                |row| {
                    Ok(LinkRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        random_state: row.get(2)?,
                        token: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    /// Complete a pending link with the token from the provider callback.
    pub fn set_token(&self, id: i64, token: &str) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE polymart_links SET token = ?1 WHERE id = ?2",
                params![token, id],
            )?;
            Ok(())
        })
    }

    pub fn delete(&self, id: i64) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM polymart_links WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    /// All links of a user, newest first.
    pub fn links_for_user(&self, user_id: i64) -> Result<Vec<LinkRecord>, GatewayError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, random_state, token FROM polymart_links
                 WHERE user_id = ?1 ORDER BY id DESC",
            )?;
            let rows = stmt.query_map(params![user_id], |row| {
                Ok(LinkRecord {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    random_state: row.get(2)?,
                    token: row.get(3)?,
                })
            })?;
            rows.collect()
        })
    }

    /// The most recent completed link token of a user, if any. Pending
    /// rows are skipped.
    pub fn token_for_user(&self, user_id: i64) -> Result<Option<String>, GatewayError> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT token FROM polymart_links
                 WHERE user_id = ?1 AND token IS NOT NULL ORDER BY id DESC LIMIT 1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()
        })
    }

    pub fn is_linked(&self, user_id: i64) -> Result<bool, GatewayError> {
        Ok(self.token_for_user(user_id)?.is_some())
    }

    /// Remove every link of a user, pending or completed.
    pub fn delete_for_user(&self, user_id: i64) -> Result<(), GatewayError> {
        self.with_conn(|conn| {
            conn.execute(
                "DELETE FROM polymart_links WHERE user_id = ?1",
                params![user_id],
            )?;
            Ok(())
        })
    }
}
