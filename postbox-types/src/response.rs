//! Canonical responses and their byte form.
//!
//! The relay builds a [`Response`] and calls [`Response::to_bytes`]; peers
//! read a [`ResponseHeader`] and hand the payload to [`Response::decode`].

use crate::codes::ResponseCode;
use crate::entry::{ClientEntry, PendingMessage};
use crate::header::{ResponseHeader, RESPONSE_HEADER_SIZE};
use crate::ids::{ClientId, ID_SIZE};
use crate::WireError;

/// A response sent by the relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// 2100: id assigned to the new client.
    RegisterSuccess {
        /// The new client's id.
        client_id: ClientId,
    },
    /// 2101: every client except the requester.
    ClientList {
        /// Clients in registration order.
        clients: Vec<ClientEntry>,
    },
    /// 2102: a client's public key.
    PublicKey {
        /// Owner of the key.
        client_id: ClientId,
        /// Key bytes as registered.
        public_key: Vec<u8>,
    },
    /// 2103: message accepted into the destination's mailbox.
    MessageStored {
        /// Recipient of the stored message.
        destination: ClientId,
        /// Low 32 bits of the message id.
        message_id: u32,
    },
    /// 2104: drained mailbox contents, possibly empty.
    PendingMessages {
        /// Messages in the order they were stored.
        messages: Vec<PendingMessage>,
    },
    /// 9000: any failure.
    GeneralError,
}

impl Response {
    /// Response code for this variant.
    pub fn code(&self) -> ResponseCode {
        match self {
            Response::RegisterSuccess { .. } => ResponseCode::RegisterSuccess,
            Response::ClientList { .. } => ResponseCode::ClientList,
            Response::PublicKey { .. } => ResponseCode::PublicKey,
            Response::MessageStored { .. } => ResponseCode::MessageStored,
            Response::PendingMessages { .. } => ResponseCode::PendingMessages,
            Response::GeneralError => ResponseCode::GeneralError,
        }
    }

    /// Encode the payload bytes (without header).
    pub fn payload(&self) -> Vec<u8> {
        match self {
            Response::RegisterSuccess { client_id } => client_id.as_bytes().to_vec(),
            Response::ClientList { clients } => {
                let mut buf = Vec::with_capacity(clients.len() * crate::CLIENT_ENTRY_SIZE);
                for client in clients {
                    client.to_wire(&mut buf);
                }
                buf
            }
            Response::PublicKey {
                client_id,
                public_key,
            } => {
                let mut buf = Vec::with_capacity(ID_SIZE + public_key.len());
                buf.extend_from_slice(client_id.as_bytes());
                buf.extend_from_slice(public_key);
                buf
            }
            Response::MessageStored {
                destination,
                message_id,
            } => {
                let mut buf = Vec::with_capacity(ID_SIZE + 4);
                buf.extend_from_slice(destination.as_bytes());
                buf.extend_from_slice(&message_id.to_le_bytes());
                buf
            }
            Response::PendingMessages { messages } => {
                let size = messages.iter().map(PendingMessage::wire_len).sum();
                let mut buf = Vec::with_capacity(size);
                for message in messages {
                    message.to_wire(&mut buf);
                }
                buf
            }
            Response::GeneralError => Vec::new(),
        }
    }

    /// Encode header and payload, stamping `version` into the header.
    ///
    /// Fails if the payload is too long for the header's size field.
    pub fn to_bytes(&self, version: u8) -> Result<Vec<u8>, WireError> {
        let payload = self.payload();
        let payload_size = u32::try_from(payload.len())
            .map_err(|_| WireError::PayloadTooLarge { size: payload.len() })?;
        let header = ResponseHeader {
            version,
            code: self.code() as u16,
            payload_size,
        };

        let mut bytes = Vec::with_capacity(RESPONSE_HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&header.encode());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode a payload according to the code in `header`.
    pub fn decode(header: &ResponseHeader, payload: &[u8]) -> Result<Self, WireError> {
        if payload.len() != header.payload_size as usize {
            return Err(WireError::malformed(format!(
                "payload size mismatch: header says {}, got {}",
                header.payload_size,
                payload.len()
            )));
        }

        match ResponseCode::try_from(header.code)? {
            ResponseCode::RegisterSuccess => Ok(Response::RegisterSuccess {
                client_id: exact_id(payload)?,
            }),
            ResponseCode::ClientList => {
                let mut clients = Vec::new();
                let mut rest = payload;
                while !rest.is_empty() {
                    let (entry, used) = ClientEntry::from_wire(rest)?;
                    clients.push(entry);
                    rest = &rest[used..];
                }
                Ok(Response::ClientList { clients })
            }
            ResponseCode::PublicKey => {
                let client_id = leading_id(payload)?;
                Ok(Response::PublicKey {
                    client_id,
                    public_key: payload[ID_SIZE..].to_vec(),
                })
            }
            ResponseCode::MessageStored => {
                if payload.len() != ID_SIZE + 4 {
                    return Err(WireError::malformed("message stored payload size"));
                }
                Ok(Response::MessageStored {
                    destination: leading_id(payload)?,
                    message_id: u32::from_le_bytes([
                        payload[16],
                        payload[17],
                        payload[18],
                        payload[19],
                    ]),
                })
            }
            ResponseCode::PendingMessages => {
                let mut messages = Vec::new();
                let mut rest = payload;
                while !rest.is_empty() {
                    let (message, used) = PendingMessage::from_wire(rest)?;
                    messages.push(message);
                    rest = &rest[used..];
                }
                Ok(Response::PendingMessages { messages })
            }
            ResponseCode::GeneralError => Ok(Response::GeneralError),
        }
    }
}

fn leading_id(payload: &[u8]) -> Result<ClientId, WireError> {
    payload
        .get(..ID_SIZE)
        .and_then(ClientId::from_bytes)
        .ok_or_else(|| WireError::malformed("client id truncated"))
}

fn exact_id(payload: &[u8]) -> Result<ClientId, WireError> {
    ClientId::from_bytes(payload).ok_or_else(|| WireError::malformed("expected a bare client id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SERVER_VERSION;

    fn reparse(response: &Response) -> Response {
        let bytes = response.to_bytes(SERVER_VERSION).unwrap();
        let header = ResponseHeader::decode(&bytes).unwrap();
        assert_eq!(header.version, SERVER_VERSION);
        assert_eq!(header.code, response.code() as u16);
        Response::decode(&header, &bytes[RESPONSE_HEADER_SIZE..]).unwrap()
    }

    #[test]
    fn general_error_is_bare_header() {
        let bytes = Response::GeneralError.to_bytes(2).unwrap();
        assert_eq!(bytes, vec![2, 0x28, 0x23, 0, 0, 0, 0]);
    }

    #[test]
    fn register_success_carries_id() {
        let client_id = ClientId::new();
        let response = Response::RegisterSuccess { client_id };
        assert_eq!(response.payload(), client_id.as_bytes().to_vec());
        assert_eq!(reparse(&response), response);
    }

    #[test]
    fn client_list_concatenates_entries() {
        let response = Response::ClientList {
            clients: vec![
                ClientEntry {
                    id: ClientId::new(),
                    username: "Alice".into(),
                },
                ClientEntry {
                    id: ClientId::new(),
                    username: "Carol".into(),
                },
            ],
        };
        assert_eq!(response.payload().len(), 2 * crate::CLIENT_ENTRY_SIZE);
        assert_eq!(reparse(&response), response);
    }

    #[test]
    fn empty_lists_have_empty_payloads() {
        let list = Response::ClientList { clients: vec![] };
        assert!(list.payload().is_empty());
        assert_eq!(reparse(&list), list);

        let pending = Response::PendingMessages { messages: vec![] };
        assert_eq!(pending.to_bytes(2).unwrap().len(), RESPONSE_HEADER_SIZE);
        assert_eq!(reparse(&pending), pending);
    }

    #[test]
    fn public_key_payload_is_id_then_key() {
        let client_id = ClientId::new();
        let response = Response::PublicKey {
            client_id,
            public_key: vec![b'B'; 160],
        };
        let payload = response.payload();
        assert_eq!(payload.len(), 176);
        assert_eq!(&payload[..16], client_id.as_bytes());
        assert_eq!(reparse(&response), response);
    }

    #[test]
    fn message_stored_payload() {
        let response = Response::MessageStored {
            destination: ClientId::new(),
            message_id: 77,
        };
        assert_eq!(response.payload().len(), 20);
        assert_eq!(&response.payload()[16..], &[77, 0, 0, 0]);
        assert_eq!(reparse(&response), response);
    }

    #[test]
    fn pending_messages_roundtrip() {
        let response = Response::PendingMessages {
            messages: vec![
                PendingMessage {
                    from: ClientId::new(),
                    message_id: 1,
                    msg_type: 1,
                    content: vec![],
                },
                PendingMessage {
                    from: ClientId::new(),
                    message_id: 2,
                    msg_type: 4,
                    content: vec![0xAA; 1000],
                },
            ],
        };
        assert_eq!(reparse(&response), response);
    }

    #[test]
    fn decode_rejects_size_mismatch() {
        let header = ResponseHeader {
            version: 2,
            code: 2100,
            payload_size: 16,
        };
        assert!(Response::decode(&header, &[0u8; 15]).is_err());
    }

    #[test]
    fn decode_rejects_unknown_code() {
        let header = ResponseHeader {
            version: 2,
            code: 1234,
            payload_size: 0,
        };
        assert_eq!(
            Response::decode(&header, &[]),
            Err(WireError::UnknownResponseCode(1234))
        );
    }
}
