//! TCP accept loop.
//!
//! Every accepted connection gets its own [`Session`] task.

use crate::error::RelayError;
use crate::server::PostboxRelay;
use crate::session::Session;
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Pause after a failed accept.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Sessions already running keep going after the loop stops; they end when
/// their peers disconnect or the runtime shuts down.
pub async fn serve<F>(
    listener: TcpListener,
    relay: Arc<PostboxRelay>,
    shutdown: F,
) -> Result<(), RelayError>
where
    F: Future<Output = ()>,
{
    tracing::info!("Listening on {}", listener.local_addr()?);
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    relay.metrics().connections_total.fetch_add(1, Ordering::Relaxed);
                    if let Err(e) = stream.set_nodelay(true) {
                        tracing::debug!("Failed to set TCP_NODELAY for {}: {}", peer, e);
                    }

                    let session = Session::new(relay.clone(), stream, peer.to_string());
                    // Spawn session handler - don't block the accept loop
                    tokio::spawn(async move {
                        if let Err(e) = session.run().await {
                            tracing::warn!("Session {} ended abnormally: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(ACCEPT_BACKOFF).await;
                }
            },
        }
    }

    Ok(())
}
