//! Error types for the Postbox wire format.

use thiserror::Error;

/// Errors raised while framing or decoding protocol bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    /// Fewer bytes than a fixed-size header requires.
    #[error("malformed header: need {expected} bytes, got {actual}")]
    MalformedHeader {
        /// Header size in bytes.
        expected: usize,
        /// Bytes actually available.
        actual: usize,
    },

    /// Payload does not match the grammar of its request or response code.
    #[error("malformed payload: {reason}")]
    MalformedPayload {
        /// What was wrong with the payload.
        reason: String,
    },

    /// Request code outside the known range.
    #[error("unknown request code: {0}")]
    UnknownRequestCode(u16),

    /// Response code outside the known range.
    #[error("unknown response code: {0}")]
    UnknownResponseCode(u16),

    /// Message type byte outside the defined enum values.
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(u8),

    /// Payload longer than the 32-bit size field can describe.
    #[error("payload of {size} bytes does not fit a frame")]
    PayloadTooLarge {
        /// Encoded payload length.
        size: usize,
    },
}

impl WireError {
    /// Shorthand for a [`WireError::MalformedPayload`].
    pub fn malformed(reason: impl Into<String>) -> Self {
        WireError::MalformedPayload {
            reason: reason.into(),
        }
    }
}
