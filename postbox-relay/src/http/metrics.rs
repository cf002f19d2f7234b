//! Prometheus metrics endpoint.

use crate::server::PostboxRelay;
use axum::{http::header::CONTENT_TYPE, response::IntoResponse, Extension};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Prometheus metrics handler.
///
/// Returns metrics in Prometheus text format.
/// Includes both gauges (current state) and counters (monotonic since startup).
pub async fn metrics_handler(Extension(relay): Extension<Arc<PostboxRelay>>) -> impl IntoResponse {
    let m = relay.metrics();

    // Gauges
    let connections = relay.active_connections();

    // Counters
    let conns_total = m.connections_total.load(Ordering::Relaxed);
    let requests = m.requests_total.load(Ordering::Relaxed);
    let registrations = m.registrations_total.load(Ordering::Relaxed);
    let stored = m.messages_stored_total.load(Ordering::Relaxed);
    let pulls = m.pulls_total.load(Ordering::Relaxed);
    let delivered = m.messages_delivered_total.load(Ordering::Relaxed);
    let bytes_rx = m.bytes_received.load(Ordering::Relaxed);
    let bytes_tx = m.bytes_sent.load(Ordering::Relaxed);
    let errors = m.errors_total.load(Ordering::Relaxed);

    // Storage stats (best effort)
    let clients = relay.registry().count().await.unwrap_or(0);
    let pending = relay.mailbox().total_pending().await.unwrap_or(0);

    let body = format!(
        r#"# HELP postbox_relay_connections_active Number of open connections
# TYPE postbox_relay_connections_active gauge
postbox_relay_connections_active {connections}

# HELP postbox_relay_info Server information
# TYPE postbox_relay_info gauge
postbox_relay_info{{version="{version}"}} 1

# HELP postbox_relay_connections_total Total connections accepted
# TYPE postbox_relay_connections_total counter
postbox_relay_connections_total {conns_total}

# HELP postbox_relay_requests_total Total requests dispatched
# TYPE postbox_relay_requests_total counter
postbox_relay_requests_total {requests}

# HELP postbox_relay_registrations_total Total successful registrations
# TYPE postbox_relay_registrations_total counter
postbox_relay_registrations_total {registrations}

# HELP postbox_relay_messages_stored_total Total messages accepted into mailboxes
# TYPE postbox_relay_messages_stored_total counter
postbox_relay_messages_stored_total {stored}

# HELP postbox_relay_pulls_total Total PullMessages requests handled
# TYPE postbox_relay_pulls_total counter
postbox_relay_pulls_total {pulls}

# HELP postbox_relay_messages_delivered_total Total messages handed out by pulls
# TYPE postbox_relay_messages_delivered_total counter
postbox_relay_messages_delivered_total {delivered}

# HELP postbox_relay_bytes_received_total Total request bytes read
# TYPE postbox_relay_bytes_received_total counter
postbox_relay_bytes_received_total {bytes_rx}

# HELP postbox_relay_bytes_sent_total Total response bytes written
# TYPE postbox_relay_bytes_sent_total counter
postbox_relay_bytes_sent_total {bytes_tx}

# HELP postbox_relay_errors_total Total requests answered with GeneralError
# TYPE postbox_relay_errors_total counter
postbox_relay_errors_total {errors}

# HELP postbox_relay_clients Number of registered clients
# TYPE postbox_relay_clients gauge
postbox_relay_clients {clients}

# HELP postbox_relay_pending_messages Number of messages waiting to be pulled
# TYPE postbox_relay_pending_messages gauge
postbox_relay_pending_messages {pending}
"#,
        version = env!("CARGO_PKG_VERSION"),
    );

    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}
