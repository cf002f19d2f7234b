//! Per-connection session management.
//!
//! Each connection gets a Session that reads one request at a time, hands
//! it to the [`Dispatcher`] and writes the response before reading the next.

use crate::dispatcher::Dispatcher;
use crate::error::{ProtocolError, ProtocolResult, RelayError};
use crate::server::PostboxRelay;
use postbox_types::{RequestHeader, Response, WireError, REQUEST_HEADER_SIZE};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Session state machine states.
#[derive(Debug, Clone)]
pub enum SessionState {
    /// Waiting for the next 23-byte request header.
    AwaitHeader,
    /// Header read, waiting for its payload.
    AwaitPayload(RequestHeader),
    /// Full request read, ready to dispatch.
    Dispatch {
        /// The request header.
        header: RequestHeader,
        /// The request payload.
        payload: Vec<u8>,
    },
    /// Response ready to be written.
    Respond(Response),
    /// Stream ended; nothing more to do.
    Closed,
}

/// A per-connection session.
pub struct Session<S> {
    relay: Arc<PostboxRelay>,
    dispatcher: Dispatcher,
    stream: S,
    peer: String,
    state: SessionState,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a new session for a connection.
    pub fn new(relay: Arc<PostboxRelay>, stream: S, peer: impl Into<String>) -> Self {
        Self {
            dispatcher: Dispatcher::new(relay.clone()),
            relay,
            stream,
            peer: peer.into(),
            state: SessionState::AwaitHeader,
        }
    }

    /// Current state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Run the session until the peer disconnects.
    ///
    /// A clean disconnect between requests returns `Ok`. A stream that ends
    /// mid-header or mid-payload returns an error; no response is sent.
    pub async fn run(mut self) -> Result<(), RelayError> {
        let _connection = self.relay.track_connection();
        tracing::info!("New connection from {}", self.peer);

        self.drive().await?;

        tracing::info!("Connection from {} closed", self.peer);
        Ok(())
    }

    async fn drive(&mut self) -> ProtocolResult<()> {
        loop {
            let state = std::mem::replace(&mut self.state, SessionState::Closed);
            self.state = match state {
                SessionState::AwaitHeader => match self.read_header().await? {
                    Some(header) => SessionState::AwaitPayload(header),
                    None => SessionState::Closed,
                },
                SessionState::AwaitPayload(header) => self.read_payload(header).await?,
                SessionState::Dispatch { header, payload } => {
                    SessionState::Respond(self.dispatcher.dispatch(&header, &payload).await)
                }
                SessionState::Respond(response) => {
                    self.write_response(&response).await?;
                    SessionState::AwaitHeader
                }
                SessionState::Closed => return Ok(()),
            };
        }
    }

    /// Read one request header.
    ///
    /// Returns `None` if the stream ends before the first byte.
    async fn read_header(&mut self) -> ProtocolResult<Option<RequestHeader>> {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        let mut filled = 0;

        while filled < buf.len() {
            let n = self
                .stream
                .read(&mut buf[filled..])
                .await
                .map_err(|e| ProtocolError::Stream(e.to_string()))?;
            if n == 0 {
                if filled == 0 {
                    return Ok(None);
                }
                return Err(WireError::MalformedHeader {
                    expected: REQUEST_HEADER_SIZE,
                    actual: filled,
                }
                .into());
            }
            filled += n;
        }

        self.relay
            .metrics()
            .bytes_received
            .fetch_add(REQUEST_HEADER_SIZE as u64, Ordering::Relaxed);
        Ok(Some(RequestHeader::decode(&buf)?))
    }

    /// Read the payload announced by `header`.
    ///
    /// Oversized payloads are discarded unread and answered with GeneralError.
    async fn read_payload(&mut self, header: RequestHeader) -> ProtocolResult<SessionState> {
        let size = header.payload_size;
        let limit = self.relay.config().storage.max_payload_size;

        if size > limit {
            let drained = tokio::io::copy(
                &mut (&mut self.stream).take(u64::from(size)),
                &mut tokio::io::sink(),
            )
            .await
            .map_err(|e| ProtocolError::Stream(e.to_string()))?;

            if drained < u64::from(size) {
                return Err(ProtocolError::Stream(format!(
                    "stream ended after {drained} of {size} payload bytes"
                )));
            }
            self.relay
                .metrics()
                .bytes_received
                .fetch_add(drained, Ordering::Relaxed);

            let err = ProtocolError::PayloadTooLarge { size, limit };
            return Ok(SessionState::Respond(self.dispatcher.reject(&header, &err)));
        }

        // Grows with the bytes that actually arrive, not the declared size.
        let mut payload = Vec::new();
        (&mut self.stream)
            .take(u64::from(size))
            .read_to_end(&mut payload)
            .await
            .map_err(|e| ProtocolError::Stream(format!("payload of {size} bytes: {e}")))?;
        if payload.len() < size as usize {
            return Err(ProtocolError::Stream(format!(
                "stream ended after {} of {size} payload bytes",
                payload.len()
            )));
        }

        self.relay
            .metrics()
            .bytes_received
            .fetch_add(u64::from(size), Ordering::Relaxed);
        Ok(SessionState::Dispatch { header, payload })
    }

    async fn write_response(&mut self, response: &Response) -> ProtocolResult<()> {
        let version = self.relay.config().server.protocol_version;
        let bytes = match response.to_bytes(version) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!("Cannot frame {:?} for {}: {}", response.code(), self.peer, e);
                Response::GeneralError.to_bytes(version)?
            }
        };

        self.stream
            .write_all(&bytes)
            .await
            .map_err(|e| ProtocolError::Stream(e.to_string()))?;
        self.stream
            .flush()
            .await
            .map_err(|e| ProtocolError::Stream(e.to_string()))?;

        self.relay
            .metrics()
            .bytes_sent
            .fetch_add(bytes.len() as u64, Ordering::Relaxed);
        tracing::debug!(
            "Sent {:?} ({} bytes) to {}",
            response.code(),
            bytes.len(),
            self.peer
        );
        Ok(())
    }
}
