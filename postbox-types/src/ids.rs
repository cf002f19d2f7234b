//! Identity types for Postbox.
//!
//! Both ids are 128-bit UUIDs serialized on the wire as 16 raw bytes.

use std::fmt;
use uuid::Uuid;

/// Size of an id on the wire.
pub const ID_SIZE: usize = 16;

/// A unique identifier for a registered client.
///
/// Assigned by the relay at registration and never changed afterwards.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Create a new random ClientId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero id, sent by peers that are not registered yet.
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Create a ClientId from raw bytes.
    ///
    /// Returns `None` unless exactly 16 bytes are given.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Create a ClientId from a fixed-size array.
    pub fn from_array(bytes: [u8; ID_SIZE]) -> Self {
        Self(Uuid::from_bytes(bytes))
    }

    /// Get the raw bytes of this ClientId.
    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        self.0.as_bytes()
    }

    /// Get the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Whether this is the all-zero id.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for ClientId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientId({})", &self.to_string()[..8])
    }
}

/// A unique identifier for a stored message.
///
/// Only the low 32 bits travel on the wire, see [`MessageId::wire_id`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId(Uuid);

impl MessageId {
    /// Create a new random MessageId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a MessageId from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        Uuid::from_slice(bytes).ok().map(Self)
    }

    /// Get the raw bytes of this MessageId.
    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        self.0.as_bytes()
    }

    /// The 32-bit id exposed to peers.
    ///
    /// The UUID is read as a big-endian 128-bit integer and truncated, which
    /// keeps the last four bytes of the raw id.
    pub fn wire_id(&self) -> u32 {
        self.0.as_u128() as u32
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}
