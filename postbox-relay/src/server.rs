//! Main PostboxRelay server coordination.
//!
//! PostboxRelay owns storage, the client registry, the mailbox, and the
//! operational counters shared by every connection.

use crate::config::Config;
use crate::mailbox::Mailbox;
use crate::registry::ClientRegistry;
use crate::storage::SqliteStorage;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

/// Operational metrics for monitoring relay activity.
///
/// All counters are monotonically increasing (reset only on restart).
/// Thread-safe via `AtomicU64`, no locks needed for incrementing.
#[derive(Debug, Default)]
pub struct RelayMetrics {
    /// Total connections accepted.
    pub connections_total: AtomicU64,
    /// Total requests dispatched, failed ones included.
    pub requests_total: AtomicU64,
    /// Total successful registrations.
    pub registrations_total: AtomicU64,
    /// Total messages accepted into a mailbox.
    pub messages_stored_total: AtomicU64,
    /// Total PullMessages requests handled successfully.
    pub pulls_total: AtomicU64,
    /// Total messages handed out by pulls.
    pub messages_delivered_total: AtomicU64,
    /// Total request bytes read, headers included.
    pub bytes_received: AtomicU64,
    /// Total response bytes written, headers included.
    pub bytes_sent: AtomicU64,
    /// Total requests answered with GeneralError.
    pub errors_total: AtomicU64,
}

/// Main relay server.
pub struct PostboxRelay {
    config: Config,
    storage: Arc<SqliteStorage>,
    registry: ClientRegistry,
    mailbox: Mailbox,
    /// Operational metrics (counters, gauges).
    metrics: RelayMetrics,
    active_connections: AtomicUsize,
}

impl std::fmt::Debug for PostboxRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostboxRelay")
            .field("config", &self.config)
            .field("metrics", &self.metrics)
            .field("active_connections", &self.active_connections())
            .finish_non_exhaustive()
    }
}

impl PostboxRelay {
    /// Create a new PostboxRelay with the given config and storage.
    pub fn new(config: Config, storage: SqliteStorage) -> Self {
        let storage = Arc::new(storage);
        Self {
            config,
            registry: ClientRegistry::new(storage.clone()),
            mailbox: Mailbox::new(storage.clone()),
            storage,
            metrics: RelayMetrics::default(),
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Get the relay configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get access to the storage layer.
    pub fn storage(&self) -> &SqliteStorage {
        &self.storage
    }

    /// Get access to the client registry.
    pub fn registry(&self) -> &ClientRegistry {
        &self.registry
    }

    /// Get access to the mailbox.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Get access to the operational metrics.
    pub fn metrics(&self) -> &RelayMetrics {
        &self.metrics
    }

    /// Number of connections currently open.
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Count a connection as open until the returned guard is dropped.
    pub fn track_connection(self: &Arc<Self>) -> ConnectionGuard {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        ConnectionGuard {
            relay: Arc::clone(self),
        }
    }
}

/// Keeps a connection counted in [`PostboxRelay::active_connections`].
#[derive(Debug)]
pub struct ConnectionGuard {
    relay: Arc<PostboxRelay>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.relay.active_connections.fetch_sub(1, Ordering::Relaxed);
    }
}
