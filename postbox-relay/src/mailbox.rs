//! Per-recipient mailboxes of pending messages.

use crate::error::StorageResult;
use crate::storage::{MessageRecord, MessageStore};
use postbox_types::{ClientId, MessageId, MessageType};
use std::sync::Arc;

/// Store of messages waiting to be pulled.
pub struct Mailbox {
    store: Arc<dyn MessageStore>,
}

impl std::fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox").finish_non_exhaustive()
    }
}

impl Mailbox {
    /// Create a mailbox over the given store.
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self { store }
    }

    /// Store a message for `to`. Once this returns, the message is durable.
    pub async fn save(
        &self,
        from: ClientId,
        to: ClientId,
        msg_type: MessageType,
        content: Vec<u8>,
    ) -> StorageResult<MessageRecord> {
        let record = MessageRecord {
            id: MessageId::new(),
            to_client: to,
            from_client: from,
            msg_type,
            content,
        };

        self.store.save_message(&record).await?;
        tracing::debug!(
            "Stored {:?} message {} for {} ({} bytes)",
            record.msg_type,
            record.id,
            record.to_client,
            record.content.len()
        );
        Ok(record)
    }

    /// Remove and return what is waiting for `client`, oldest first.
    ///
    /// One call takes at most a single response's worth of messages; the
    /// rest stay queued for the next pull.
    pub async fn pull_and_clear(&self, client: &ClientId) -> StorageResult<Vec<MessageRecord>> {
        self.store.pull_and_clear(client).await
    }

    /// Number of messages waiting for `client`.
    pub async fn pending_count(&self, client: &ClientId) -> StorageResult<u64> {
        self.store.pending_count(client).await
    }

    /// Number of messages waiting across all clients.
    pub async fn total_pending(&self) -> StorageResult<u64> {
        self.store.total_pending().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteStorage;

    async fn mailbox() -> Mailbox {
        Mailbox::new(Arc::new(SqliteStorage::in_memory().await.unwrap()))
    }

    #[tokio::test]
    async fn save_then_pull_once() {
        let mailbox = mailbox().await;
        let alice = ClientId::new();
        let bob = ClientId::new();

        let first = mailbox
            .save(alice, bob, MessageType::RequestSymKey, vec![])
            .await
            .unwrap();
        let second = mailbox
            .save(alice, bob, MessageType::Text, b"hi".to_vec())
            .await
            .unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(mailbox.pending_count(&bob).await.unwrap(), 2);

        let pulled = mailbox.pull_and_clear(&bob).await.unwrap();
        assert_eq!(pulled, vec![first, second]);
        assert!(mailbox.pull_and_clear(&bob).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_does_not_check_recipient() {
        let mailbox = mailbox().await;
        let nobody = ClientId::new();

        mailbox
            .save(ClientId::new(), nobody, MessageType::File, vec![0; 64])
            .await
            .unwrap();
        assert_eq!(mailbox.total_pending().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn empty_mailbox_pulls_nothing() {
        let mailbox = mailbox().await;
        assert!(mailbox.pull_and_clear(&ClientId::new()).await.unwrap().is_empty());
    }
}
