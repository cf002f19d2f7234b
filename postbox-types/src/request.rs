//! Request payload grammar.
//!
//! | Code | Request      | Payload                                                     |
//! |------|--------------|-------------------------------------------------------------|
//! | 600  | Register     | username, NUL, public key (rest of payload)                 |
//! | 601  | ClientList   | empty                                                       |
//! | 602  | PublicKey    | target id (16)                                              |
//! | 603  | SendMessage  | dest id (16), type (1), content length (4, LE), content     |
//! | 604  | PullMessages | empty                                                       |
//!
//! Decoding is pure: it never consults the registry or the mailbox.

use crate::codes::{RequestCode, CLIENT_VERSION};
use crate::header::RequestHeader;
use crate::ids::{ClientId, ID_SIZE};
use crate::WireError;

/// Longest accepted username, excluding the NUL terminator.
pub const MAX_USERNAME_LEN: usize = 254;

/// Fixed part of a SendMessage payload (dest id, type, length).
pub const SEND_MESSAGE_PREFIX_SIZE: usize = ID_SIZE + 1 + 4;

/// A decoded request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Register a username with its public key.
    Register {
        /// ASCII username, 1 to 254 bytes.
        username: String,
        /// Opaque public key bytes.
        public_key: Vec<u8>,
    },
    /// List every other registered client.
    ClientList,
    /// Fetch a client's public key.
    PublicKey {
        /// Client whose key is requested.
        target: ClientId,
    },
    /// Store a message for another client.
    SendMessage {
        /// Recipient.
        destination: ClientId,
        /// Raw message type byte; validated by the dispatcher.
        msg_type: u8,
        /// Opaque content, usually ciphertext.
        content: Vec<u8>,
    },
    /// Drain the requester's mailbox.
    PullMessages,
}

impl Request {
    /// Decode the payload of a request with the given raw code.
    pub fn decode(code: u16, payload: &[u8]) -> Result<Self, WireError> {
        match RequestCode::try_from(code)? {
            RequestCode::Register => decode_register(payload),
            RequestCode::ClientList => Ok(Request::ClientList),
            RequestCode::PublicKey => {
                let target = read_id(payload, "target id")?;
                Ok(Request::PublicKey { target })
            }
            RequestCode::SendMessage => decode_send_message(payload),
            RequestCode::PullMessages => Ok(Request::PullMessages),
        }
    }

    /// Request code for this payload.
    pub fn code(&self) -> RequestCode {
        match self {
            Request::Register { .. } => RequestCode::Register,
            Request::ClientList => RequestCode::ClientList,
            Request::PublicKey { .. } => RequestCode::PublicKey,
            Request::SendMessage { .. } => RequestCode::SendMessage,
            Request::PullMessages => RequestCode::PullMessages,
        }
    }

    /// Encode header and payload as one frame, as a peer would send it.
    pub fn to_frame(&self, client_id: ClientId) -> Vec<u8> {
        let payload = self.encode();
        let header = RequestHeader {
            client_id,
            version: CLIENT_VERSION,
            code: self.code() as u16,
            payload_size: payload.len() as u32,
        };

        let mut frame = header.encode().to_vec();
        frame.extend_from_slice(&payload);
        frame
    }

    /// Encode the payload bytes (without header).
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Request::Register {
                username,
                public_key,
            } => {
                let mut buf = Vec::with_capacity(username.len() + 1 + public_key.len());
                buf.extend_from_slice(username.as_bytes());
                buf.push(0);
                buf.extend_from_slice(public_key);
                buf
            }
            Request::ClientList | Request::PullMessages => Vec::new(),
            Request::PublicKey { target } => target.as_bytes().to_vec(),
            Request::SendMessage {
                destination,
                msg_type,
                content,
            } => {
                let mut buf = Vec::with_capacity(SEND_MESSAGE_PREFIX_SIZE + content.len());
                buf.extend_from_slice(destination.as_bytes());
                buf.push(*msg_type);
                buf.extend_from_slice(&(content.len() as u32).to_le_bytes());
                buf.extend_from_slice(content);
                buf
            }
        }
    }
}

fn decode_register(payload: &[u8]) -> Result<Request, WireError> {
    let nul = payload
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| WireError::malformed("username is not NUL-terminated"))?;

    let name = &payload[..nul];
    if name.is_empty() {
        return Err(WireError::malformed("username is empty"));
    }
    if name.len() > MAX_USERNAME_LEN {
        return Err(WireError::malformed(format!(
            "username too long: {} > {}",
            name.len(),
            MAX_USERNAME_LEN
        )));
    }
    if !name.is_ascii() {
        return Err(WireError::malformed("username is not ASCII"));
    }

    let public_key = &payload[nul + 1..];
    if public_key.is_empty() {
        return Err(WireError::malformed("public key is empty"));
    }

    Ok(Request::Register {
        username: name.iter().map(|&b| b as char).collect(),
        public_key: public_key.to_vec(),
    })
}

fn decode_send_message(payload: &[u8]) -> Result<Request, WireError> {
    if payload.len() < SEND_MESSAGE_PREFIX_SIZE {
        return Err(WireError::malformed(format!(
            "send message payload truncated: {} < {}",
            payload.len(),
            SEND_MESSAGE_PREFIX_SIZE
        )));
    }

    let destination = read_id(payload, "destination id")?;
    let msg_type = payload[ID_SIZE];
    let declared = u32::from_le_bytes([
        payload[ID_SIZE + 1],
        payload[ID_SIZE + 2],
        payload[ID_SIZE + 3],
        payload[ID_SIZE + 4],
    ]) as usize;

    let content = &payload[SEND_MESSAGE_PREFIX_SIZE..];
    if content.len() != declared {
        return Err(WireError::malformed(format!(
            "content length mismatch: declared {}, got {}",
            declared,
            content.len()
        )));
    }

    Ok(Request::SendMessage {
        destination,
        msg_type,
        content: content.to_vec(),
    })
}

fn read_id(payload: &[u8], field: &str) -> Result<ClientId, WireError> {
    payload
        .get(..ID_SIZE)
        .and_then(ClientId::from_bytes)
        .ok_or_else(|| WireError::malformed(format!("{field} truncated")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register_payload(name: &[u8], key: &[u8]) -> Vec<u8> {
        let mut buf = name.to_vec();
        buf.push(0);
        buf.extend_from_slice(key);
        buf
    }

    #[test]
    fn register_decodes_name_and_key() {
        let payload = register_payload(b"Alice", &[b'A'; 160]);
        let request = Request::decode(600, &payload).unwrap();

        assert_eq!(
            request,
            Request::Register {
                username: "Alice".into(),
                public_key: vec![b'A'; 160],
            }
        );
        assert_eq!(request.encode(), payload);
    }

    #[test]
    fn register_key_may_contain_nul_bytes() {
        let payload = register_payload(b"bob", &[0, 1, 0, 2]);
        match Request::decode(600, &payload).unwrap() {
            Request::Register { username, public_key } => {
                assert_eq!(username, "bob");
                assert_eq!(public_key, vec![0, 1, 0, 2]);
            }
            other => panic!("expected Register, got {other:?}"),
        }
    }

    #[test]
    fn register_without_terminator_is_malformed() {
        let err = Request::decode(600, b"Alice").unwrap_err();
        assert!(matches!(err, WireError::MalformedPayload { .. }));
    }

    #[test]
    fn register_rejects_empty_name_and_key() {
        assert!(Request::decode(600, &register_payload(b"", b"key")).is_err());
        assert!(Request::decode(600, &register_payload(b"carol", b"")).is_err());
    }

    #[test]
    fn register_username_length_limit() {
        let longest = vec![b'x'; MAX_USERNAME_LEN];
        assert!(Request::decode(600, &register_payload(&longest, b"k")).is_ok());

        let too_long = vec![b'x'; MAX_USERNAME_LEN + 1];
        assert!(Request::decode(600, &register_payload(&too_long, b"k")).is_err());
    }

    #[test]
    fn register_rejects_non_ascii_name() {
        let payload = register_payload("zoë".as_bytes(), b"k");
        assert!(Request::decode(600, &payload).is_err());
    }

    #[test]
    fn empty_bodied_requests_ignore_payload() {
        assert_eq!(Request::decode(601, &[]).unwrap(), Request::ClientList);
        assert_eq!(Request::decode(604, &[]).unwrap(), Request::PullMessages);
        assert_eq!(
            Request::decode(604, ClientId::new().as_bytes()).unwrap(),
            Request::PullMessages
        );
    }

    #[test]
    fn public_key_request_needs_full_id() {
        let target = ClientId::new();
        assert_eq!(
            Request::decode(602, target.as_bytes()).unwrap(),
            Request::PublicKey { target }
        );
        assert!(Request::decode(602, &target.as_bytes()[..15]).is_err());
    }

    #[test]
    fn send_message_decodes_fields() {
        let destination = ClientId::new();
        let request = Request::SendMessage {
            destination,
            msg_type: 3,
            content: b"ciphertext".to_vec(),
        };
        let payload = request.encode();
        assert_eq!(payload.len(), SEND_MESSAGE_PREFIX_SIZE + 10);
        assert_eq!(Request::decode(603, &payload).unwrap(), request);
    }

    #[test]
    fn send_message_keeps_unknown_type_byte() {
        let request = Request::SendMessage {
            destination: ClientId::new(),
            msg_type: 42,
            content: vec![],
        };
        assert_eq!(Request::decode(603, &request.encode()).unwrap(), request);
    }

    #[test]
    fn send_message_length_mismatch_is_malformed() {
        let mut payload = Request::SendMessage {
            destination: ClientId::new(),
            msg_type: 3,
            content: b"hello".to_vec(),
        }
        .encode();

        payload.push(b'!');
        assert!(Request::decode(603, &payload).is_err());

        payload.truncate(payload.len() - 2);
        assert!(Request::decode(603, &payload).is_err());
    }

    #[test]
    fn send_message_truncated_prefix_is_malformed() {
        let payload = vec![0u8; SEND_MESSAGE_PREFIX_SIZE - 1];
        assert!(matches!(
            Request::decode(603, &payload),
            Err(WireError::MalformedPayload { .. })
        ));
    }

    #[test]
    fn unknown_code_is_reported() {
        assert_eq!(
            Request::decode(700, &[]),
            Err(WireError::UnknownRequestCode(700))
        );
    }

    #[test]
    fn frame_starts_with_header() {
        let sender = ClientId::new();
        let frame = Request::PullMessages.to_frame(sender);
        assert_eq!(frame.len(), 23);

        let header = RequestHeader::decode(&frame).unwrap();
        assert_eq!(header.client_id, sender);
        assert_eq!(header.version, CLIENT_VERSION);
        assert_eq!(header.code, 604);
        assert_eq!(header.payload_size, 0);
    }

    #[test]
    fn code_matches_variant() {
        assert_eq!(Request::ClientList.code(), RequestCode::ClientList);
        assert_eq!(
            Request::PublicKey {
                target: ClientId::nil()
            }
            .code() as u16,
            602
        );
    }
}
