//! Numeric codes carried in headers and payloads.

use crate::WireError;

/// Protocol version written by the relay in response headers.
pub const SERVER_VERSION: u8 = 2;

/// Protocol version written by current peers in request headers.
pub const CLIENT_VERSION: u8 = 1;

/// Request code in a request header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RequestCode {
    /// Register a new username and public key.
    Register = 600,
    /// List every other registered client.
    ClientList = 601,
    /// Fetch one client's public key.
    PublicKey = 602,
    /// Store a message in another client's mailbox.
    SendMessage = 603,
    /// Drain the requester's mailbox.
    PullMessages = 604,
}

impl TryFrom<u16> for RequestCode {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            600 => Ok(RequestCode::Register),
            601 => Ok(RequestCode::ClientList),
            602 => Ok(RequestCode::PublicKey),
            603 => Ok(RequestCode::SendMessage),
            604 => Ok(RequestCode::PullMessages),
            _ => Err(WireError::UnknownRequestCode(value)),
        }
    }
}

/// Response code in a response header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ResponseCode {
    /// Registration succeeded.
    RegisterSuccess = 2100,
    /// List of other clients.
    ClientList = 2101,
    /// A client's public key.
    PublicKey = 2102,
    /// Message accepted into the mailbox.
    MessageStored = 2103,
    /// Messages drained from the mailbox.
    PendingMessages = 2104,
    /// Catch-all failure; the protocol has no finer-grained error codes.
    GeneralError = 9000,
}

impl TryFrom<u16> for ResponseCode {
    type Error = WireError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2100 => Ok(ResponseCode::RegisterSuccess),
            2101 => Ok(ResponseCode::ClientList),
            2102 => Ok(ResponseCode::PublicKey),
            2103 => Ok(ResponseCode::MessageStored),
            2104 => Ok(ResponseCode::PendingMessages),
            9000 => Ok(ResponseCode::GeneralError),
            _ => Err(WireError::UnknownResponseCode(value)),
        }
    }
}

/// Kind of content carried by a message.
///
/// The relay never looks inside the content; the type only tells the
/// recipient how to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageType {
    /// Ask the recipient for a symmetric key.
    RequestSymKey = 1,
    /// Symmetric key encrypted with the recipient's public key.
    SendSymKey = 2,
    /// Text encrypted with a shared symmetric key.
    Text = 3,
    /// File contents encrypted with a shared symmetric key.
    File = 4,
}

impl TryFrom<u8> for MessageType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(MessageType::RequestSymKey),
            2 => Ok(MessageType::SendSymKey),
            3 => Ok(MessageType::Text),
            4 => Ok(MessageType::File),
            _ => Err(WireError::UnsupportedMessageType(value)),
        }
    }
}
