//! Storage layer for postbox-relay.
//!
//! Two tables back the relay: registered clients and pending messages.
//! Both are reached through traits so the registry and mailbox never see
//! SQLite directly.

mod sqlite;

pub use sqlite::SqliteStorage;

use crate::error::StorageError;
use async_trait::async_trait;
use postbox_types::{ClientId, MessageId, MessageType, PENDING_MESSAGE_PREFIX_SIZE};

/// Largest PendingMessages payload one pull may produce.
///
/// The response header carries the payload size as a `u32`.
pub const MAX_PULL_BYTES: u64 = u32::MAX as u64;

/// A registered client as stored by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    /// Relay-assigned id.
    pub id: ClientId,
    /// Unique, case-sensitive ASCII username.
    pub username: String,
    /// Opaque public key bytes.
    pub public_key: Vec<u8>,
    /// Unix timestamp of the client's last request.
    pub last_seen: i64,
}

/// A message waiting in a recipient's mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    /// Relay-assigned id.
    pub id: MessageId,
    /// Recipient.
    pub to_client: ClientId,
    /// Sender.
    pub from_client: ClientId,
    /// Content kind.
    pub msg_type: MessageType,
    /// Opaque content (relay cannot decrypt).
    pub content: Vec<u8>,
}

impl MessageRecord {
    /// Bytes this message occupies inside a PendingMessages payload.
    pub fn wire_len(&self) -> u64 {
        (PENDING_MESSAGE_PREFIX_SIZE + self.content.len()) as u64
    }
}

/// Trait for client table backends.
#[async_trait]
pub trait ClientStore: Send + Sync {
    /// Insert a new client.
    ///
    /// Fails with [`StorageError::DuplicateUsername`] without writing
    /// anything if the username is taken.
    async fn insert_client(&self, record: &ClientRecord) -> Result<(), StorageError>;

    /// Get a client by id.
    async fn get_client(&self, id: &ClientId) -> Result<Option<ClientRecord>, StorageError>;

    /// Get a client by exact username.
    async fn get_client_by_username(
        &self,
        username: &str,
    ) -> Result<Option<ClientRecord>, StorageError>;

    /// All clients in registration order.
    async fn list_clients(&self) -> Result<Vec<ClientRecord>, StorageError>;

    /// Set `last_seen` for a client.
    ///
    /// Returns `false` if no such client exists.
    async fn touch_client(&self, id: &ClientId, last_seen: i64) -> Result<bool, StorageError>;

    /// Number of registered clients.
    async fn client_count(&self) -> Result<u64, StorageError>;
}

/// Trait for mailbox backends.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Persist a message. The recipient is not checked.
    async fn save_message(&self, record: &MessageRecord) -> Result<(), StorageError>;

    /// Remove and return the oldest messages for `to` whose encoded
    /// PendingMessages entries fit in `max_bytes`.
    ///
    /// The oldest message is always taken, whatever its size. Selection and
    /// deletion happen in one transaction, so a message is returned at most
    /// once. Messages left behind stay queued for the next pull.
    async fn pull_batch(
        &self,
        to: &ClientId,
        max_bytes: u64,
    ) -> Result<Vec<MessageRecord>, StorageError>;

    /// Remove and return messages for `to`, oldest first, as many as fit in
    /// one response.
    async fn pull_and_clear(&self, to: &ClientId) -> Result<Vec<MessageRecord>, StorageError> {
        self.pull_batch(to, MAX_PULL_BYTES).await
    }

    /// Number of messages waiting for `to`.
    async fn pending_count(&self, to: &ClientId) -> Result<u64, StorageError>;

    /// Number of messages waiting across all mailboxes.
    async fn total_pending(&self) -> Result<u64, StorageError>;
}
