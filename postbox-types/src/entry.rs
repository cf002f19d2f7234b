//! Repeated entries inside list-shaped responses.
//!
//! A ClientList payload is a run of [`ClientEntry`] values, a
//! PendingMessages payload a run of [`PendingMessage`] values. Each type
//! owns its own `to_wire`/`from_wire` pair; there is no shared record trait.

use crate::ids::{ClientId, ID_SIZE};
use crate::WireError;

/// Width of the username field in a client list entry, terminator included.
pub const USERNAME_FIELD_SIZE: usize = 255;

/// Size of one client list entry on the wire.
pub const CLIENT_ENTRY_SIZE: usize = ID_SIZE + USERNAME_FIELD_SIZE;

/// Fixed part of a pending message entry (sender, id, type, length).
pub const PENDING_MESSAGE_PREFIX_SIZE: usize = ID_SIZE + 4 + 1 + 4;

/// One client in a ClientList response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEntry {
    /// Client id.
    pub id: ClientId,
    /// Username without terminator.
    pub username: String,
}

impl ClientEntry {
    /// Encode as id followed by the NUL-padded username field.
    ///
    /// Usernames longer than the field are truncated; registration keeps
    /// them short enough that a terminator always fits.
    pub fn to_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.id.as_bytes());

        let mut field = [0u8; USERNAME_FIELD_SIZE];
        let name = self.username.as_bytes();
        let len = name.len().min(USERNAME_FIELD_SIZE);
        field[..len].copy_from_slice(&name[..len]);
        out.extend_from_slice(&field);
    }

    /// Decode one entry from the start of `bytes`.
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn from_wire(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if bytes.len() < CLIENT_ENTRY_SIZE {
            return Err(WireError::malformed(format!(
                "client entry truncated: {} < {}",
                bytes.len(),
                CLIENT_ENTRY_SIZE
            )));
        }

        let id = ClientId::from_bytes(&bytes[..ID_SIZE])
            .ok_or_else(|| WireError::malformed("client entry id"))?;
        let field = &bytes[ID_SIZE..CLIENT_ENTRY_SIZE];
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let username = String::from_utf8_lossy(&field[..end]).into_owned();

        Ok((Self { id, username }, CLIENT_ENTRY_SIZE))
    }
}

/// One message in a PendingMessages response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMessage {
    /// Sender's client id.
    pub from: ClientId,
    /// Low 32 bits of the stored message id.
    pub message_id: u32,
    /// Raw message type byte.
    pub msg_type: u8,
    /// Opaque content exactly as the sender submitted it.
    pub content: Vec<u8>,
}

impl PendingMessage {
    /// Size of this entry on the wire.
    pub fn wire_len(&self) -> usize {
        PENDING_MESSAGE_PREFIX_SIZE + self.content.len()
    }

    /// Encode as sender, message id, type, content length, content.
    pub fn to_wire(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.from.as_bytes());
        out.extend_from_slice(&self.message_id.to_le_bytes());
        out.push(self.msg_type);
        out.extend_from_slice(&(self.content.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.content);
    }

    /// Decode one entry from the start of `bytes`.
    ///
    /// Returns the entry and the number of bytes consumed.
    pub fn from_wire(bytes: &[u8]) -> Result<(Self, usize), WireError> {
        if bytes.len() < PENDING_MESSAGE_PREFIX_SIZE {
            return Err(WireError::malformed("pending message header truncated"));
        }

        let from = ClientId::from_bytes(&bytes[..ID_SIZE])
            .ok_or_else(|| WireError::malformed("pending message sender"))?;
        let message_id = u32::from_le_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
        let msg_type = bytes[20];
        let len = u32::from_le_bytes([bytes[21], bytes[22], bytes[23], bytes[24]]) as usize;

        let end = PENDING_MESSAGE_PREFIX_SIZE
            .checked_add(len)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                WireError::malformed(format!("pending message content truncated: need {len}"))
            })?;

        let message = Self {
            from,
            message_id,
            msg_type,
            content: bytes[PENDING_MESSAGE_PREFIX_SIZE..end].to_vec(),
        };
        Ok((message, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_entry_is_fixed_width() {
        let entry = ClientEntry {
            id: ClientId::new(),
            username: "Alice".into(),
        };
        let mut buf = Vec::new();
        entry.to_wire(&mut buf);

        assert_eq!(buf.len(), CLIENT_ENTRY_SIZE);
        assert_eq!(&buf[16..21], b"Alice");
        assert!(buf[21..].iter().all(|&b| b == 0));

        let (decoded, used) = ClientEntry::from_wire(&buf).unwrap();
        assert_eq!(decoded, entry);
        assert_eq!(used, CLIENT_ENTRY_SIZE);
    }

    #[test]
    fn client_entry_truncates_oversized_name() {
        let entry = ClientEntry {
            id: ClientId::new(),
            username: "n".repeat(300),
        };
        let mut buf = Vec::new();
        entry.to_wire(&mut buf);
        assert_eq!(buf.len(), CLIENT_ENTRY_SIZE);

        let (decoded, _) = ClientEntry::from_wire(&buf).unwrap();
        assert_eq!(decoded.username.len(), USERNAME_FIELD_SIZE);
    }

    #[test]
    fn client_entry_short_input_fails() {
        assert!(ClientEntry::from_wire(&[0u8; CLIENT_ENTRY_SIZE - 1]).is_err());
    }

    #[test]
    fn pending_message_layout() {
        let message = PendingMessage {
            from: ClientId::from_array([7; 16]),
            message_id: 0xDEAD_BEEF,
            msg_type: 2,
            content: b"K".to_vec(),
        };
        let mut buf = Vec::new();
        message.to_wire(&mut buf);

        assert_eq!(buf.len(), message.wire_len());
        assert_eq!(&buf[..16], &[7; 16]);
        assert_eq!(&buf[16..20], &[0xEF, 0xBE, 0xAD, 0xDE]);
        assert_eq!(buf[20], 2);
        assert_eq!(&buf[21..25], &[1, 0, 0, 0]);
        assert_eq!(&buf[25..], b"K");

        let (decoded, used) = PendingMessage::from_wire(&buf).unwrap();
        assert_eq!(decoded, message);
        assert_eq!(used, buf.len());
    }

    #[test]
    fn pending_message_with_short_content_fails() {
        let message = PendingMessage {
            from: ClientId::new(),
            message_id: 1,
            msg_type: 3,
            content: vec![9; 10],
        };
        let mut buf = Vec::new();
        message.to_wire(&mut buf);
        buf.pop();

        assert!(PendingMessage::from_wire(&buf).is_err());
    }
}
