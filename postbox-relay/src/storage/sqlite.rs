//! SQLite storage backend for postbox-relay.

use super::{ClientRecord, ClientStore, MessageRecord, MessageStore};
use crate::error::StorageError;
use async_trait::async_trait;
use postbox_types::{ClientId, MessageId, MessageType};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// SQLite-based client and message storage.
///
/// Uses WAL mode for concurrent reads. Every mutation takes `write_lock`
/// first, so one logical write completes before the next begins.
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for SqliteStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStorage")
            .field("connections", &self.pool.size())
            .finish_non_exhaustive()
    }
}

impl SqliteStorage {
    /// Create a new SQLite storage from a database path.
    ///
    /// Creates the database file if it doesn't exist.
    pub async fn new(path: &Path) -> Result<Self, StorageError> {
        let path_str = path.to_str().ok_or_else(|| StorageError::InvalidPath {
            path: path.to_path_buf(),
        })?;

        let options = SqliteConnectOptions::from_str(path_str)
            .map_err(StorageError::Database)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self::from_pool(pool);
        storage.run_migrations().await?;
        tracing::info!("Opened database {}", path.display());
        Ok(storage)
    }

    /// Create an in-memory SQLite storage (for testing).
    pub async fn in_memory() -> Result<Self, StorageError> {
        let options = SqliteConnectOptions::from_str(":memory:")
            .map_err(StorageError::Database)?
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal);

        // A single connection that is never recycled, or the database vanishes.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(StorageError::Database)?;

        let storage = Self::from_pool(pool);
        storage.run_migrations().await?;
        Ok(storage)
    }

    fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Close the pool, waiting for open connections to finish.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Run database migrations.
    async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id BLOB PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                public_key BLOB NOT NULL,
                last_seen INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id BLOB PRIMARY KEY,
                to_client BLOB NOT NULL,
                from_client BLOB NOT NULL,
                msg_type INTEGER NOT NULL,
                content BLOB NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_to_client ON messages(to_client)")
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(())
    }
}

#[async_trait]
impl ClientStore for SqliteStorage {
    async fn insert_client(&self, record: &ClientRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            r#"
            INSERT INTO clients (id, username, public_key, last_seen)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(record.id.as_bytes().as_slice())
        .bind(&record.username)
        .bind(&record.public_key)
        .bind(record.last_seen)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StorageError::DuplicateUsername {
                    username: record.username.clone(),
                })
            }
            Err(e) => Err(StorageError::Database(e)),
        }
    }

    async fn get_client(&self, id: &ClientId) -> Result<Option<ClientRecord>, StorageError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT id, username, public_key, last_seen FROM clients WHERE id = ?1",
        )
        .bind(id.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(ClientRecord::try_from).transpose()
    }

    async fn get_client_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ClientRecord>, StorageError> {
        let row = sqlx::query_as::<_, ClientRow>(
            "SELECT id, username, public_key, last_seen FROM clients WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        row.map(ClientRecord::try_from).transpose()
    }

    async fn list_clients(&self) -> Result<Vec<ClientRecord>, StorageError> {
        let rows = sqlx::query_as::<_, ClientRow>(
            "SELECT id, username, public_key, last_seen FROM clients ORDER BY rowid ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        rows.into_iter().map(|row| row.try_into()).collect()
    }

    async fn touch_client(&self, id: &ClientId, last_seen: i64) -> Result<bool, StorageError> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("UPDATE clients SET last_seen = ?1 WHERE id = ?2")
            .bind(last_seen)
            .bind(id.as_bytes().as_slice())
            .execute(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(result.rows_affected() > 0)
    }

    async fn client_count(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM clients")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count as u64)
    }
}

#[async_trait]
impl MessageStore for SqliteStorage {
    async fn save_message(&self, record: &MessageRecord) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;

        sqlx::query(
            r#"
            INSERT INTO messages (id, to_client, from_client, msg_type, content)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(record.id.as_bytes().as_slice())
        .bind(record.to_client.as_bytes().as_slice())
        .bind(record.from_client.as_bytes().as_slice())
        .bind(record.msg_type as u8 as i64)
        .bind(&record.content)
        .execute(&self.pool)
        .await
        .map_err(StorageError::Database)?;

        Ok(())
    }

    async fn pull_batch(
        &self,
        to: &ClientId,
        max_bytes: u64,
    ) -> Result<Vec<MessageRecord>, StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await.map_err(StorageError::Database)?;

        let rows = sqlx::query_as::<_, MessageRow>(
            r#"
            SELECT id, to_client, from_client, msg_type, content
            FROM messages
            WHERE to_client = ?1
            ORDER BY rowid ASC
            "#,
        )
        .bind(to.as_bytes().as_slice())
        .fetch_all(&mut *tx)
        .await
        .map_err(StorageError::Database)?;

        // Decode before deleting so a corrupt row leaves the mailbox intact.
        let mut records = Vec::new();
        let mut batch_bytes = 0u64;
        for row in rows {
            let record = MessageRecord::try_from(row)?;
            batch_bytes += record.wire_len();
            if !records.is_empty() && batch_bytes > max_bytes {
                break;
            }
            records.push(record);
        }

        for record in &records {
            sqlx::query("DELETE FROM messages WHERE id = ?1")
                .bind(record.id.as_bytes().as_slice())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::Database)?;
        }

        tx.commit().await.map_err(StorageError::Database)?;
        Ok(records)
    }

    async fn pending_count(&self, to: &ClientId) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE to_client = ?1")
            .bind(to.as_bytes().as_slice())
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count as u64)
    }

    async fn total_pending(&self) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::Database)?;

        Ok(count as u64)
    }
}

/// Internal row type for the clients table.
#[derive(sqlx::FromRow)]
struct ClientRow {
    id: Vec<u8>,
    username: String,
    public_key: Vec<u8>,
    last_seen: i64,
}

impl TryFrom<ClientRow> for ClientRecord {
    type Error = StorageError;

    fn try_from(row: ClientRow) -> Result<Self, Self::Error> {
        Ok(ClientRecord {
            id: ClientId::from_bytes(&row.id).ok_or_else(|| StorageError::Corrupt {
                reason: format!("invalid client id {}", hex::encode(&row.id)),
            })?,
            username: row.username,
            public_key: row.public_key,
            last_seen: row.last_seen,
        })
    }
}

/// Internal row type for the messages table.
#[derive(sqlx::FromRow)]
struct MessageRow {
    id: Vec<u8>,
    to_client: Vec<u8>,
    from_client: Vec<u8>,
    msg_type: i64,
    content: Vec<u8>,
}

impl TryFrom<MessageRow> for MessageRecord {
    type Error = StorageError;

    fn try_from(row: MessageRow) -> Result<Self, Self::Error> {
        let msg_type = u8::try_from(row.msg_type)
            .ok()
            .and_then(|raw| MessageType::try_from(raw).ok())
            .ok_or_else(|| StorageError::Corrupt {
                reason: format!("invalid message type {}", row.msg_type),
            })?;

        Ok(MessageRecord {
            id: MessageId::from_bytes(&row.id).ok_or_else(|| StorageError::Corrupt {
                reason: format!("invalid message id {}", hex::encode(&row.id)),
            })?,
            to_client: ClientId::from_bytes(&row.to_client).ok_or_else(|| {
                StorageError::Corrupt {
                    reason: format!("invalid recipient {}", hex::encode(&row.to_client)),
                }
            })?,
            from_client: ClientId::from_bytes(&row.from_client).ok_or_else(|| {
                StorageError::Corrupt {
                    reason: format!("invalid sender {}", hex::encode(&row.from_client)),
                }
            })?,
            msg_type,
            content: row.content,
        })
    }
}
