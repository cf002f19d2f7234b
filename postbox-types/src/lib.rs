//! # postbox-types
//!
//! Wire format for the Postbox store-and-forward relay.
//!
//! This crate provides the byte-level protocol shared by the relay and its
//! peers:
//! - [`ClientId`], [`MessageId`] - 128-bit identities
//! - [`RequestHeader`], [`ResponseHeader`] - fixed 23/7-byte headers
//! - [`Request`] - per-code request payload grammar
//! - [`Response`] - canonical responses, built by the relay
//! - [`WireError`] - framing and decoding failures
//!
//! Message content is opaque here: the codecs move ciphertext around and
//! never interpret it.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod codes;
mod entry;
mod error;
mod header;
mod ids;
mod request;
mod response;

pub use codes::{MessageType, RequestCode, ResponseCode, CLIENT_VERSION, SERVER_VERSION};
pub use entry::{
    ClientEntry, PendingMessage, CLIENT_ENTRY_SIZE, PENDING_MESSAGE_PREFIX_SIZE,
    USERNAME_FIELD_SIZE,
};
pub use error::WireError;
pub use header::{RequestHeader, ResponseHeader, REQUEST_HEADER_SIZE, RESPONSE_HEADER_SIZE};
pub use ids::{ClientId, MessageId, ID_SIZE};
pub use request::{Request, MAX_USERNAME_LEN, SEND_MESSAGE_PREFIX_SIZE};
pub use response::Response;
