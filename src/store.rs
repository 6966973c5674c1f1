//! Session store
//!
//! SQLite-backed key-value persistence for conversation positions and the
//! shared commerce credential.

mod schema;

use schema::{session_key, CREDENTIAL_EXPIRES_KEY, CREDENTIAL_TOKEN_KEY, SCHEMA};

use crate::credentials::{now_epoch, Credential};
use crate::runtime::{CredentialStore, SessionStore};
use crate::state_machine::state::UnknownState;
use crate::state_machine::{ConversationId, SessionState};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    UnknownState(#[from] UnknownState),
    #[error("Corrupt value for {key}: {value:?}")]
    Corrupt { key: String, value: String },
    #[error("Store task failed: {0}")]
    Background(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe store handle
#[derive(Clone)]
pub struct SqliteSessionStore {
    conn: Arc<Mutex<Connection>>,
    /// Sessions untouched for longer than this read as absent
    session_ttl: Option<i64>,
}

impl SqliteSessionStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Open an in-memory store (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            session_ttl: None,
        })
    }

    pub fn with_session_ttl(mut self, ttl_secs: Option<i64>) -> Self {
        self.session_ttl = ttl_secs.filter(|ttl| *ttl > 0);
        self
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Background(e.to_string()))?
    }

    // ==================== Synchronous operations ====================

    fn read_session(
        conn: &Connection,
        conversation_id: ConversationId,
        ttl: Option<i64>,
    ) -> StoreResult<Option<SessionState>> {
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT value, updated_at FROM kv WHERE key = ?1",
                params![session_key(conversation_id)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((value, updated_at)) = row else {
            return Ok(None);
        };

        if let Some(ttl) = ttl {
            if now_epoch().saturating_sub(updated_at) > ttl {
                return Ok(None);
            }
        }

        Ok(Some(value.parse()?))
    }

    fn write_session(
        conn: &Connection,
        conversation_id: ConversationId,
        state: SessionState,
    ) -> StoreResult<()> {
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![session_key(conversation_id), state.as_str(), now_epoch()],
        )?;
        Ok(())
    }

    fn read_credential(conn: &Connection) -> StoreResult<Option<Credential>> {
        let mut stmt = conn.prepare("SELECT key, value FROM kv WHERE key IN (?1, ?2)")?;
        let rows = stmt
            .query_map(params![CREDENTIAL_TOKEN_KEY, CREDENTIAL_EXPIRES_KEY], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut token = None;
        let mut expires = None;
        for (key, value) in rows {
            if key == CREDENTIAL_TOKEN_KEY {
                token = Some(value);
            } else {
                expires = Some(value);
            }
        }

        let (Some(token), Some(expires)) = (token, expires) else {
            return Ok(None);
        };
        let expires_at = expires.parse::<i64>().map_err(|_| StoreError::Corrupt {
            key: CREDENTIAL_EXPIRES_KEY.to_string(),
            value: expires.clone(),
        })?;

        Ok(Some(Credential::new(token, expires_at)))
    }

    fn write_credential(conn: &mut Connection, credential: &Credential) -> StoreResult<()> {
        let now = now_epoch();
        let tx = conn.transaction()?;
        for (key, value) in [
            (CREDENTIAL_TOKEN_KEY, credential.value.clone()),
            (CREDENTIAL_EXPIRES_KEY, credential.expires_at.to_string()),
        ] {
            tx.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, now],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Overwrite a raw value, bypassing state validation
    #[cfg(test)]
    fn put_raw(&self, key: &str, value: &str, updated_at: i64) -> StoreResult<()> {
        let conn = self.conn.lock().unwrap_or_else(PoisonError::into_inner);
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, updated_at],
        )?;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn get(&self, conversation_id: ConversationId) -> StoreResult<Option<SessionState>> {
        let ttl = self.session_ttl;
        self.with_conn(move |conn| Self::read_session(conn, conversation_id, ttl))
            .await
    }

    async fn set(&self, conversation_id: ConversationId, state: SessionState) -> StoreResult<()> {
        self.with_conn(move |conn| Self::write_session(conn, conversation_id, state))
            .await
    }
}

#[async_trait]
impl CredentialStore for SqliteSessionStore {
    async fn get_credential(&self) -> StoreResult<Option<Credential>> {
        self.with_conn(|conn| Self::read_credential(conn)).await
    }

    async fn set_credential(&self, credential: &Credential) -> StoreResult<()> {
        let credential = credential.clone();
        self.with_conn(move |conn| Self::write_credential(conn, &credential))
            .await
    }
}
