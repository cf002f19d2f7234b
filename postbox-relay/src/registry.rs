//! Registered clients.
//!
//! The durable [`ClientStore`] is authoritative. Records fetched by id are
//! cached in memory since ids and keys never change after registration.

use crate::error::StorageResult;
use crate::storage::{ClientRecord, ClientStore};
use dashmap::DashMap;
use postbox_types::ClientId;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Directory of registered clients.
pub struct ClientRegistry {
    store: Arc<dyn ClientStore>,
    cache: DashMap<ClientId, ClientRecord>,
}

impl std::fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("cached", &self.cache.len())
            .finish_non_exhaustive()
    }
}

impl ClientRegistry {
    /// Create a registry over the given store.
    pub fn new(store: Arc<dyn ClientStore>) -> Self {
        Self {
            store,
            cache: DashMap::new(),
        }
    }

    /// Register a new client under `username`.
    ///
    /// The uniqueness check and the insert are one store operation, so two
    /// registrations racing for the same name cannot both succeed.
    pub async fn register(
        &self,
        username: &str,
        public_key: Vec<u8>,
    ) -> StorageResult<ClientRecord> {
        let record = ClientRecord {
            id: ClientId::new(),
            username: username.to_string(),
            public_key,
            last_seen: current_timestamp(),
        };

        self.store.insert_client(&record).await?;
        self.cache.insert(record.id, record.clone());

        tracing::info!("Registered client {} as {}", record.username, record.id);
        Ok(record)
    }

    /// Look up a client by id.
    pub async fn lookup_by_id(&self, id: &ClientId) -> StorageResult<Option<ClientRecord>> {
        if let Some(record) = self.cache.get(id) {
            return Ok(Some(record.clone()));
        }

        let record = self.store.get_client(id).await?;
        if let Some(record) = &record {
            self.cache.insert(record.id, record.clone());
        }
        Ok(record)
    }

    /// Look up a client by exact username.
    pub async fn lookup_by_username(&self, username: &str) -> StorageResult<Option<ClientRecord>> {
        self.store.get_client_by_username(username).await
    }

    /// Every client except `requester`, in registration order.
    pub async fn list_except(&self, requester: &ClientId) -> StorageResult<Vec<ClientRecord>> {
        let clients = self.store.list_clients().await?;
        Ok(clients.into_iter().filter(|c| c.id != *requester).collect())
    }

    /// Refresh `last_seen` for a client.
    ///
    /// Returns `false` if the client is not registered.
    pub async fn touch(&self, id: &ClientId) -> StorageResult<bool> {
        let now = current_timestamp();
        let found = self.store.touch_client(id, now).await?;
        if let Some(mut cached) = self.cache.get_mut(id) {
            cached.last_seen = now;
        }
        Ok(found)
    }

    /// Number of registered clients.
    pub async fn count(&self) -> StorageResult<u64> {
        self.store.client_count().await
    }
}

fn current_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
