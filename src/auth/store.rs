// Credential storage
// The in-memory view is authoritative for the session; the SQLite file is
// best-effort persistence and its failures are logged, never propagated.

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, RwLock};

use super::types::TokenPair;

/// Key the current credential pair is stored under
const TOKENS_KEY: &str = "journal:auth:tokens";

/// Key used by pre-0.3 releases for the bare access token
const LEGACY_TOKEN_KEY: &str = "journal:auth:access-token";

/// Durable, synchronous storage of the credential pair
pub struct CredentialStore {
    tokens: RwLock<Option<TokenPair>>,
    conn: Option<Mutex<Connection>>,
}

impl CredentialStore {
    /// Session-only store with no persistence
    pub fn in_memory() -> Self {
        Self {
            tokens: RwLock::new(None),
            conn: None,
        }
    }

    /// Store backed by a SQLite file; loads any previously saved pair
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create credential directory: {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open credential database: {}", path.display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .context("Failed to initialize credential database")?;

        let tokens = load_tokens(&conn);
        Ok(Self {
            tokens: RwLock::new(tokens),
            conn: Some(Mutex::new(conn)),
        })
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap()
            .as_ref()
            .map(|pair| pair.access_token.clone())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.tokens
            .read()
            .unwrap()
            .as_ref()
            .map(|pair| pair.refresh_token.clone())
    }

    /// Overwrite both tokens together
    pub fn set_tokens(&self, access: &str, refresh: &str) {
        let pair = TokenPair {
            access_token: access.to_string(),
            refresh_token: refresh.to_string(),
        };

        // Persist under the write lock so the file never reorders against the
        // in-memory view.
        let mut tokens = self.tokens.write().unwrap();
        *tokens = Some(pair.clone());
        if let Err(e) = self.persist(Some(&pair)) {
            tracing::warn!("Failed to persist credentials: {:#}", e);
        }
    }

    /// Remove both tokens, plus the legacy key so no previous-format
    /// credential can be read back afterwards
    pub fn clear_tokens(&self) {
        let mut tokens = self.tokens.write().unwrap();
        *tokens = None;
        if let Err(e) = self.persist(None) {
            tracing::warn!("Failed to clear persisted credentials: {:#}", e);
        }
    }

    fn persist(&self, pair: Option<&TokenPair>) -> Result<()> {
        let Some(conn) = &self.conn else {
            return Ok(());
        };
        let conn = conn.lock().unwrap();

        match pair {
            Some(pair) => {
                let value =
                    serde_json::to_string(pair).context("Failed to serialize credentials")?;
                conn.execute(
                    "INSERT OR REPLACE INTO auth_kv (key, value) VALUES (?1, ?2)",
                    rusqlite::params![TOKENS_KEY, value],
                )
                .context("Failed to write credentials")?;
            }
            None => {
                conn.execute(
                    "DELETE FROM auth_kv WHERE key IN (?1, ?2)",
                    rusqlite::params![TOKENS_KEY, LEGACY_TOKEN_KEY],
                )
                .context("Failed to delete credentials")?;
            }
        }
        Ok(())
    }
}

fn load_tokens(conn: &Connection) -> Option<TokenPair> {
    let value: String = conn
        .query_row(
            "SELECT value FROM auth_kv WHERE key = ?1",
            [TOKENS_KEY],
            |row| row.get(0),
        )
        .ok()?;

    match serde_json::from_str(&value) {
        Ok(pair) => Some(pair),
        Err(e) => {
            tracing::warn!("Ignoring malformed stored credentials: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_clear_are_atomic() {
        let store = CredentialStore::in_memory();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());

        store.set_tokens("a-1", "r-1");
        assert_eq!(store.access_token().as_deref(), Some("a-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r-1"));

        store.set_tokens("a-2", "r-2");
        assert_eq!(store.access_token().as_deref(), Some("a-2"));
        assert_eq!(store.refresh_token().as_deref(), Some("r-2"));

        store.clear_tokens();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.sqlite3");

        {
            let store = CredentialStore::open(&path).unwrap();
            store.set_tokens("a-1", "r-1");
        }

        let store = CredentialStore::open(&path).unwrap();
        assert_eq!(store.access_token().as_deref(), Some("a-1"));
        assert_eq!(store.refresh_token().as_deref(), Some("r-1"));

        store.clear_tokens();
        drop(store);

        let store = CredentialStore::open(&path).unwrap();
        assert!(store.access_token().is_none());
        assert!(store.refresh_token().is_none());
    }

    #[test]
    fn test_clear_removes_legacy_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.sqlite3");

        let store = CredentialStore::open(&path).unwrap();
        {
            let conn = store.conn.as_ref().unwrap().lock().unwrap();
            conn.execute(
                "INSERT OR REPLACE INTO auth_kv (key, value) VALUES (?1, ?2)",
                rusqlite::params![LEGACY_TOKEN_KEY, "stale-access-token"],
            )
            .unwrap();
        }

        store.clear_tokens();

        let conn = store.conn.as_ref().unwrap().lock().unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM auth_kv", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_open_ignores_malformed_stored_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.sqlite3");

        {
            let conn = Connection::open(&path).unwrap();
            conn.execute(
                "CREATE TABLE IF NOT EXISTS auth_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO auth_kv (key, value) VALUES (?1, ?2)",
                rusqlite::params![TOKENS_KEY, "not json"],
            )
            .unwrap();
        }

        let store = CredentialStore::open(&path).unwrap();
        assert!(store.access_token().is_none());
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/dirs/credentials.sqlite3");

        let store = CredentialStore::open(&path).unwrap();
        store.set_tokens("a", "r");
        assert!(path.exists());
    }
}
