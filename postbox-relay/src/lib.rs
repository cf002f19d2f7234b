//! # postbox-relay
//!
//! Store-and-forward relay for end-to-end encrypted messaging.
//!
//! This crate implements a relay server that:
//! - Registers clients under a unique username with their public key
//! - Hands out public keys and the list of registered clients
//! - Holds opaque messages in per-recipient mailboxes until pulled
//! - Never interprets message content
//!
//! ## Architecture
//!
//! ```text
//! Client A ──┐                    ┌── Client B
//!            │    TCP, binary     │
//!            ├───────────────────►│
//!            │                    │
//!        ┌───┴────────────────────┴───┐
//!        │       postbox-relay        │
//!        │  ┌─────────────────────┐   │
//!        │  │ SQLite (clients,    │   │
//!        │  │         messages)   │   │
//!        │  └─────────────────────┘   │
//!        └────────────────────────────┘
//! ```
//!
//! ## Protocol
//!
//! One request, then one response, per round trip:
//! - Register (600) → RegisterSuccess (2100)
//! - ClientList (601) → ClientList (2101)
//! - PublicKey (602) → PublicKey (2102)
//! - SendMessage (603) → MessageStored (2103)
//! - PullMessages (604) → PendingMessages (2104)
//!
//! Any failure is answered with GeneralError (9000).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod logging;
pub mod mailbox;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod storage;
