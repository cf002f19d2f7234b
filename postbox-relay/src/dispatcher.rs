//! Request handling.
//!
//! [`Dispatcher::dispatch`] turns one decoded header and its payload into
//! exactly one [`Response`]. It never touches the connection; the session
//! owns all I/O. Every failure is logged and answered with GeneralError.

use crate::error::{ProtocolError, ProtocolResult};
use crate::server::PostboxRelay;
use postbox_types::{
    ClientEntry, ClientId, MessageType, PendingMessage, Request, RequestHeader, Response,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// Routes requests to the registry and mailbox.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    relay: Arc<PostboxRelay>,
}

impl Dispatcher {
    /// Create a dispatcher backed by `relay`.
    pub fn new(relay: Arc<PostboxRelay>) -> Self {
        Self { relay }
    }

    /// Handle one request and produce its response.
    pub async fn dispatch(&self, header: &RequestHeader, payload: &[u8]) -> Response {
        self.relay
            .metrics()
            .requests_total
            .fetch_add(1, Ordering::Relaxed);

        match self.handle(header, payload).await {
            Ok(response) => {
                self.touch_requester(&header.client_id).await;
                response
            }
            Err(e) => self.reject(header, &e),
        }
    }

    /// Answer a request with GeneralError, logging why.
    pub fn reject(&self, header: &RequestHeader, err: &ProtocolError) -> Response {
        tracing::warn!(
            "Request {} from {} failed: {}",
            header.code,
            header.client_id,
            err
        );
        self.relay
            .metrics()
            .errors_total
            .fetch_add(1, Ordering::Relaxed);
        Response::GeneralError
    }

    async fn handle(&self, header: &RequestHeader, payload: &[u8]) -> ProtocolResult<Response> {
        let request = Request::decode(header.code, payload)?;
        tracing::debug!(
            "Dispatching {:?} from {} ({} byte payload)",
            request.code(),
            header.client_id,
            payload.len()
        );

        match request {
            Request::Register {
                username,
                public_key,
            } => self.handle_register(&username, public_key).await,
            Request::ClientList => self.handle_client_list(&header.client_id).await,
            Request::PublicKey { target } => self.handle_public_key(&target).await,
            Request::SendMessage {
                destination,
                msg_type,
                content,
            } => {
                self.handle_send(header.client_id, destination, msg_type, content)
                    .await
            }
            Request::PullMessages => self.handle_pull(&header.client_id).await,
        }
    }

    async fn handle_register(&self, username: &str, public_key: Vec<u8>) -> ProtocolResult<Response> {
        let record = self.relay.registry().register(username, public_key).await?;
        self.relay
            .metrics()
            .registrations_total
            .fetch_add(1, Ordering::Relaxed);

        Ok(Response::RegisterSuccess {
            client_id: record.id,
        })
    }

    async fn handle_client_list(&self, requester: &ClientId) -> ProtocolResult<Response> {
        let clients = self
            .relay
            .registry()
            .list_except(requester)
            .await?
            .into_iter()
            .map(|record| ClientEntry {
                id: record.id,
                username: record.username,
            })
            .collect();

        Ok(Response::ClientList { clients })
    }

    async fn handle_public_key(&self, target: &ClientId) -> ProtocolResult<Response> {
        let record = self
            .relay
            .registry()
            .lookup_by_id(target)
            .await?
            .ok_or(ProtocolError::UnknownClient { client_id: *target })?;

        Ok(Response::PublicKey {
            client_id: record.id,
            public_key: record.public_key,
        })
    }

    async fn handle_send(
        &self,
        from: ClientId,
        destination: ClientId,
        msg_type: u8,
        content: Vec<u8>,
    ) -> ProtocolResult<Response> {
        if self
            .relay
            .registry()
            .lookup_by_id(&destination)
            .await?
            .is_none()
        {
            return Err(ProtocolError::UnknownClient {
                client_id: destination,
            });
        }

        let msg_type = MessageType::try_from(msg_type)
            .map_err(|_| ProtocolError::UnsupportedMessageType(msg_type))?;

        let record = self
            .relay
            .mailbox()
            .save(from, destination, msg_type, content)
            .await?;
        self.relay
            .metrics()
            .messages_stored_total
            .fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "Stored message {} from {} for {}",
            record.id,
            from,
            destination
        );
        Ok(Response::MessageStored {
            destination,
            message_id: record.id.wire_id(),
        })
    }

    async fn handle_pull(&self, requester: &ClientId) -> ProtocolResult<Response> {
        let records = self.relay.mailbox().pull_and_clear(requester).await?;

        let metrics = self.relay.metrics();
        metrics.pulls_total.fetch_add(1, Ordering::Relaxed);
        metrics
            .messages_delivered_total
            .fetch_add(records.len() as u64, Ordering::Relaxed);

        if !records.is_empty() {
            tracing::info!("Delivering {} messages to {}", records.len(), requester);
        }

        let messages = records
            .into_iter()
            .map(|record| PendingMessage {
                from: record.from_client,
                message_id: record.id.wire_id(),
                msg_type: record.msg_type as u8,
                content: record.content,
            })
            .collect();

        Ok(Response::PendingMessages { messages })
    }

    /// Refresh `last_seen` after a successful request. Failures are logged only.
    async fn touch_requester(&self, client_id: &ClientId) {
        if client_id.is_nil() {
            return;
        }
        if let Err(e) = self.relay.registry().touch(client_id).await {
            tracing::debug!("Failed to touch {}: {}", client_id, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::storage::{ClientStore, MessageStore, SqliteStorage};
    use postbox_types::{CLIENT_VERSION, SEND_MESSAGE_PREFIX_SIZE};

    async fn dispatcher() -> Dispatcher {
        let storage = SqliteStorage::in_memory().await.unwrap();
        Dispatcher::new(Arc::new(PostboxRelay::new(Config::default(), storage)))
    }

    async fn send(dispatcher: &Dispatcher, from: ClientId, request: &Request) -> Response {
        let payload = request.encode();
        let header = RequestHeader {
            client_id: from,
            version: CLIENT_VERSION,
            code: request.code() as u16,
            payload_size: payload.len() as u32,
        };
        dispatcher.dispatch(&header, &payload).await
    }

    async fn register(dispatcher: &Dispatcher, name: &str, key: &[u8]) -> ClientId {
        let request = Request::Register {
            username: name.to_string(),
            public_key: key.to_vec(),
        };
        match send(dispatcher, ClientId::nil(), &request).await {
            Response::RegisterSuccess { client_id } => client_id,
            other => panic!("expected RegisterSuccess, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn register_then_duplicate() {
        let dispatcher = dispatcher().await;
        register(&dispatcher, "alice", b"key").await;

        let again = Request::Register {
            username: "alice".into(),
            public_key: b"other".to_vec(),
        };
        assert_eq!(
            send(&dispatcher, ClientId::nil(), &again).await,
            Response::GeneralError
        );

        let metrics = dispatcher.relay.metrics();
        assert_eq!(metrics.registrations_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.errors_total.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn rejected_requests_leave_last_seen_alone() {
        let dispatcher = dispatcher().await;
        let alice = register(&dispatcher, "alice", b"key").await;
        let storage = dispatcher.relay.storage();
        storage.touch_client(&alice, 0).await.unwrap();

        let header = RequestHeader {
            client_id: alice,
            version: CLIENT_VERSION,
            code: 999,
            payload_size: 0,
        };
        assert_eq!(dispatcher.dispatch(&header, &[]).await, Response::GeneralError);

        let to_nobody = Request::SendMessage {
            destination: ClientId::new(),
            msg_type: 3,
            content: b"lost".to_vec(),
        };
        assert_eq!(send(&dispatcher, alice, &to_nobody).await, Response::GeneralError);

        let stored = storage.get_client(&alice).await.unwrap().unwrap();
        assert_eq!(stored.last_seen, 0);
    }

    #[tokio::test]
    async fn end_to_end_exchange() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "Alice", &[b'A'; 160]).await;
        let b1 = register(&dispatcher, "Bob", &[b'B'; 160]).await;

        assert_eq!(
            send(&dispatcher, a1, &Request::PublicKey { target: b1 }).await,
            Response::PublicKey {
                client_id: b1,
                public_key: vec![b'B'; 160],
            }
        );

        let stored = send(
            &dispatcher,
            a1,
            &Request::SendMessage {
                destination: b1,
                msg_type: 2,
                content: b"K".to_vec(),
            },
        )
        .await;
        let stored_id = match stored {
            Response::MessageStored {
                destination,
                message_id,
            } => {
                assert_eq!(destination, b1);
                message_id
            }
            other => panic!("expected MessageStored, got {other:?}"),
        };

        assert_eq!(
            send(&dispatcher, b1, &Request::PullMessages).await,
            Response::PendingMessages {
                messages: vec![PendingMessage {
                    from: a1,
                    message_id: stored_id,
                    msg_type: 2,
                    content: b"K".to_vec(),
                }],
            }
        );
        assert_eq!(
            send(&dispatcher, b1, &Request::PullMessages).await,
            Response::PendingMessages { messages: vec![] }
        );
    }

    #[tokio::test]
    async fn client_list_excludes_requester() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "A1", b"a").await;
        let b1 = register(&dispatcher, "B1", b"b").await;
        let c1 = register(&dispatcher, "C1", b"c").await;

        assert_eq!(
            send(&dispatcher, b1, &Request::ClientList).await,
            Response::ClientList {
                clients: vec![
                    ClientEntry {
                        id: a1,
                        username: "A1".into(),
                    },
                    ClientEntry {
                        id: c1,
                        username: "C1".into(),
                    },
                ],
            }
        );
    }

    #[tokio::test]
    async fn client_list_for_lone_client_is_empty() {
        let dispatcher = dispatcher().await;
        let alone = register(&dispatcher, "alone", b"k").await;

        assert_eq!(
            send(&dispatcher, alone, &Request::ClientList).await,
            Response::ClientList { clients: vec![] }
        );
    }

    #[tokio::test]
    async fn public_key_of_unknown_client_fails() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "alice", b"k").await;

        let request = Request::PublicKey {
            target: ClientId::new(),
        };
        assert_eq!(send(&dispatcher, a1, &request).await, Response::GeneralError);
    }

    #[tokio::test]
    async fn send_to_unknown_destination_stores_nothing() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "alice", b"k").await;

        let request = Request::SendMessage {
            destination: ClientId::new(),
            msg_type: 3,
            content: b"lost".to_vec(),
        };
        assert_eq!(send(&dispatcher, a1, &request).await, Response::GeneralError);
        assert_eq!(
            dispatcher.relay.storage().total_pending().await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn send_with_unsupported_type_fails() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "alice", b"k").await;
        let b1 = register(&dispatcher, "bob", b"k").await;

        for bad_type in [0u8, 5, 255] {
            let request = Request::SendMessage {
                destination: b1,
                msg_type: bad_type,
                content: b"x".to_vec(),
            };
            assert_eq!(send(&dispatcher, a1, &request).await, Response::GeneralError);
        }
        assert_eq!(dispatcher.relay.storage().pending_count(&b1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_general_error() {
        let dispatcher = dispatcher().await;
        let b1 = register(&dispatcher, "bob", b"k").await;

        let mut payload = Request::SendMessage {
            destination: b1,
            msg_type: 3,
            content: b"abc".to_vec(),
        }
        .encode();
        payload.truncate(SEND_MESSAGE_PREFIX_SIZE + 1);

        let header = RequestHeader {
            client_id: b1,
            version: CLIENT_VERSION,
            code: 603,
            payload_size: payload.len() as u32,
        };
        assert_eq!(
            dispatcher.dispatch(&header, &payload).await,
            Response::GeneralError
        );
    }

    #[tokio::test]
    async fn unknown_request_code_is_general_error() {
        let dispatcher = dispatcher().await;
        let header = RequestHeader {
            client_id: ClientId::nil(),
            version: CLIENT_VERSION,
            code: 605,
            payload_size: 0,
        };
        assert_eq!(dispatcher.dispatch(&header, &[]).await, Response::GeneralError);
        assert_eq!(dispatcher.relay.storage().client_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn messages_keep_send_order() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "alice", b"k").await;
        let b1 = register(&dispatcher, "bob", b"k").await;

        for (msg_type, content) in [(1u8, &b""[..]), (3, b"first"), (4, b"file")] {
            let request = Request::SendMessage {
                destination: b1,
                msg_type,
                content: content.to_vec(),
            };
            assert!(matches!(
                send(&dispatcher, a1, &request).await,
                Response::MessageStored { .. }
            ));
        }

        match send(&dispatcher, b1, &Request::PullMessages).await {
            Response::PendingMessages { messages } => {
                let types: Vec<u8> = messages.iter().map(|m| m.msg_type).collect();
                assert_eq!(types, vec![1, 3, 4]);
            }
            other => panic!("expected PendingMessages, got {other:?}"),
        }
        assert_eq!(
            dispatcher
                .relay
                .metrics()
                .messages_delivered_total
                .load(Ordering::Relaxed),
            3
        );
    }

    #[tokio::test]
    async fn requests_refresh_last_seen() {
        let dispatcher = dispatcher().await;
        let a1 = register(&dispatcher, "alice", b"k").await;
        dispatcher.relay.storage().touch_client(&a1, 0).await.unwrap();

        send(&dispatcher, a1, &Request::ClientList).await;

        let stored = dispatcher.relay.storage().get_client(&a1).await.unwrap().unwrap();
        assert!(stored.last_seen > 0);
    }
}
