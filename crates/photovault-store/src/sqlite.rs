//! SQLite implementation of the Store trait.
//!
//! The primary storage backend. Uses rusqlite with bundled SQLite, wrapped
//! in async via `tokio::task::spawn_blocking`.
//!
//! Capability transitions are single conditional statements run inside
//! `IMMEDIATE` transactions, so they stay atomic even when several processes
//! open the same database file. Lock contention between processes is
//! absorbed by SQLite's busy timeout rather than surfaced to callers.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use photovault_core::{AlbumId, CapabilityId, TokenHash, UserId, WrappedKey};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::records::{CapabilityState, ShareCapability, UserKeyRecord};
use crate::traits::{ConsumeOutcome, InsertResult, RevokeOutcome, Store};

/// How long a statement waits on another connection's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const CAPABILITY_COLUMNS: &str =
    "id, token_hash, album_id, owner_id, created_at, expires_at, max_views, view_count, revoked";

/// SQLite-based store implementation.
///
/// Thread-safe via an internal Mutex; every operation runs on the blocking
/// pool so the async runtime is never stalled on disk I/O.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed. File databases use
    /// WAL journaling so readers do not block the writer.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(journal_mode = %mode, "opened sqlite store");
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory SQLite database. Useful for testing.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

fn row_to_user_key(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserKeyRecord> {
    let user_id: String = row.get("user_id")?;
    let wrapped_hex: String = row.get("wrapped_dek")?;
    let wrapped_dek = WrappedKey::from_hex(&wrapped_hex).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(UserKeyRecord {
        user_id: UserId::new(user_id),
        wrapped_dek,
        created_at: row.get("created_at")?,
    })
}

fn row_to_capability(row: &rusqlite::Row<'_>) -> rusqlite::Result<ShareCapability> {
    let id: Vec<u8> = row.get("id")?;
    let token_hash: Vec<u8> = row.get("token_hash")?;
    let album_id: String = row.get("album_id")?;
    let owner_id: String = row.get("owner_id")?;

    Ok(ShareCapability {
        id: CapabilityId::from_bytes(id.try_into().map_err(|_| {
            rusqlite::Error::InvalidColumnType(0, "id".into(), rusqlite::types::Type::Blob)
        })?),
        token_hash: TokenHash::from_bytes(token_hash.try_into().map_err(|_| {
            rusqlite::Error::InvalidColumnType(1, "token_hash".into(), rusqlite::types::Type::Blob)
        })?),
        album_id: AlbumId::new(album_id),
        owner_id: UserId::new(owner_id),
        created_at: row.get("created_at")?,
        expires_at: row.get("expires_at")?,
        max_views: row.get("max_views")?,
        view_count: row.get("view_count")?,
        revoked: row.get("revoked")?,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl Store for SqliteStore {
    async fn get_user_key(&self, user: &UserId) -> Result<Option<UserKeyRecord>> {
        let user = user.clone();
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT user_id, wrapped_dek, created_at FROM user_keys WHERE user_id = ?1",
                params![user.as_str()],
                row_to_user_key,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn insert_user_key_if_absent(&self, record: &UserKeyRecord) -> Result<InsertResult> {
        let record = record.clone();
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let inserted = tx.execute(
                "INSERT INTO user_keys (user_id, wrapped_dek, created_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO NOTHING",
                params![
                    record.user_id.as_str(),
                    record.wrapped_dek.to_hex(),
                    record.created_at
                ],
            )?;

            let result = if inserted == 1 {
                InsertResult::Inserted
            } else {
                let existing = tx.query_row(
                    "SELECT user_id, wrapped_dek, created_at FROM user_keys WHERE user_id = ?1",
                    params![record.user_id.as_str()],
                    row_to_user_key,
                )?;
                InsertResult::AlreadyExists { existing }
            };

            tx.commit()?;
            Ok(result)
        })
        .await
    }

    async fn delete_user_key(&self, user: &UserId) -> Result<bool> {
        let user = user.clone();
        self.blocking(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM user_keys WHERE user_id = ?1",
                params![user.as_str()],
            )?;
            Ok(deleted > 0)
        })
        .await
    }

    async fn insert_capability(&self, capability: &ShareCapability) -> Result<()> {
        let cap = capability.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO share_capabilities (
                    id, token_hash, album_id, owner_id, created_at, expires_at,
                    max_views, view_count, revoked
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    cap.id.as_bytes().as_slice(),
                    cap.token_hash.as_bytes().as_slice(),
                    cap.album_id.as_str(),
                    cap.owner_id.as_str(),
                    cap.created_at,
                    cap.expires_at,
                    cap.max_views,
                    cap.view_count,
                    cap.revoked,
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    StoreError::Conflict(format!("capability {} already exists", cap.id))
                } else {
                    StoreError::from(e)
                }
            })?;
            Ok(())
        })
        .await
    }

    async fn get_capability(&self, id: &CapabilityId) -> Result<Option<ShareCapability>> {
        let id = *id;
        self.blocking(move |conn| {
            conn.query_row(
                &format!("SELECT {CAPABILITY_COLUMNS} FROM share_capabilities WHERE id = ?1"),
                params![id.as_bytes().as_slice()],
                row_to_capability,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn get_capability_by_hash(&self, hash: &TokenHash) -> Result<Option<ShareCapability>> {
        let hash = *hash;
        self.blocking(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {CAPABILITY_COLUMNS} FROM share_capabilities WHERE token_hash = ?1"
                ),
                params![hash.as_bytes().as_slice()],
                row_to_capability,
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn consume_view(
        &self,
        hash: &TokenHash,
        owner: &UserId,
        album: &AlbumId,
        now: i64,
    ) -> Result<ConsumeOutcome> {
        let hash = *hash;
        let (owner, album) = (owner.clone(), album.clone());
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            // The WHERE clause is the Active predicate plus the binding; the
            // increment only happens if both hold at the moment of the write.
            let consumed = tx
                .query_row(
                    &format!(
                        "UPDATE share_capabilities SET view_count = view_count + 1
                         WHERE token_hash = ?1
                           AND owner_id = ?3
                           AND album_id = ?4
                           AND revoked = 0
                           AND expires_at > ?2
                           AND (max_views IS NULL OR view_count < max_views)
                         RETURNING {CAPABILITY_COLUMNS}"
                    ),
                    params![hash.as_bytes().as_slice(), now, owner.as_str(), album.as_str()],
                    row_to_capability,
                )
                .optional()?;

            let outcome = match consumed {
                Some(cap) => ConsumeOutcome::Consumed(cap),
                None => {
                    let existing = tx
                        .query_row(
                            &format!(
                                "SELECT {CAPABILITY_COLUMNS} FROM share_capabilities
                                 WHERE token_hash = ?1"
                            ),
                            params![hash.as_bytes().as_slice()],
                            row_to_capability,
                        )
                        .optional()?;

                    match existing {
                        Some(cap) if cap.owner_id != owner || cap.album_id != album => {
                            ConsumeOutcome::Mismatched(cap)
                        }
                        Some(cap) => match cap.state(now) {
                            CapabilityState::Active => {
                                return Err(StoreError::InvalidData(format!(
                                    "capability {} is active but was not consumed",
                                    cap.id
                                )))
                            }
                            state => ConsumeOutcome::Rejected(state),
                        },
                        None => ConsumeOutcome::NotFound,
                    }
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn revoke_capability(&self, id: &CapabilityId) -> Result<RevokeOutcome> {
        let id = *id;
        self.blocking(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let updated = tx.execute(
                "UPDATE share_capabilities SET revoked = 1 WHERE id = ?1 AND revoked = 0",
                params![id.as_bytes().as_slice()],
            )?;

            let outcome = if updated == 1 {
                RevokeOutcome::Revoked
            } else {
                let exists: Option<i64> = tx
                    .query_row(
                        "SELECT 1 FROM share_capabilities WHERE id = ?1",
                        params![id.as_bytes().as_slice()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if exists.is_some() {
                    RevokeOutcome::AlreadyRevoked
                } else {
                    RevokeOutcome::NotFound
                }
            };

            tx.commit()?;
            Ok(outcome)
        })
        .await
    }

    async fn list_capabilities(
        &self,
        owner: &UserId,
        album: &AlbumId,
    ) -> Result<Vec<ShareCapability>> {
        let owner = owner.clone();
        let album = album.clone();
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {CAPABILITY_COLUMNS} FROM share_capabilities
                 WHERE owner_id = ?1 AND album_id = ?2
                 ORDER BY created_at, id"
            ))?;

            let caps = stmt
                .query_map(params![owner.as_str(), album.as_str()], row_to_capability)?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(caps)
        })
        .await
    }
}
