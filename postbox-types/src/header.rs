//! Fixed-size request and response headers.
//!
//! ```text
//! request:  client_id:16 | version:1 | code:2 | payload_size:4   (23 bytes)
//! response: version:1 | code:2 | payload_size:4                  (7 bytes)
//! ```
//!
//! All integers are little-endian. Decoding only slices the input; it does
//! not look at the code or check the payload size against it.

use crate::ids::{ClientId, ID_SIZE};
use crate::WireError;

/// Request header size in bytes.
pub const REQUEST_HEADER_SIZE: usize = ID_SIZE + 1 + 2 + 4;

/// Response header size in bytes.
pub const RESPONSE_HEADER_SIZE: usize = 1 + 2 + 4;

/// Header preceding every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Id of the requesting client (nil before registration).
    pub client_id: ClientId,
    /// Client protocol version.
    pub version: u8,
    /// Raw request code; see [`crate::RequestCode`].
    pub code: u16,
    /// Number of payload bytes following the header.
    pub payload_size: u32,
}

impl RequestHeader {
    /// Encode to the 23-byte wire form.
    pub fn encode(&self) -> [u8; REQUEST_HEADER_SIZE] {
        let mut buf = [0u8; REQUEST_HEADER_SIZE];
        buf[..16].copy_from_slice(self.client_id.as_bytes());
        buf[16] = self.version;
        buf[17..19].copy_from_slice(&self.code.to_le_bytes());
        buf[19..23].copy_from_slice(&self.payload_size.to_le_bytes());
        buf
    }

    /// Decode from the first 23 bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < REQUEST_HEADER_SIZE {
            return Err(WireError::MalformedHeader {
                expected: REQUEST_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let mut id = [0u8; ID_SIZE];
        id.copy_from_slice(&bytes[..16]);

        Ok(Self {
            client_id: ClientId::from_array(id),
            version: bytes[16],
            code: u16::from_le_bytes([bytes[17], bytes[18]]),
            payload_size: u32::from_le_bytes([bytes[19], bytes[20], bytes[21], bytes[22]]),
        })
    }
}

/// Header preceding every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    /// Server protocol version.
    pub version: u8,
    /// Raw response code; see [`crate::ResponseCode`].
    pub code: u16,
    /// Number of payload bytes following the header.
    pub payload_size: u32,
}

impl ResponseHeader {
    /// Encode to the 7-byte wire form.
    pub fn encode(&self) -> [u8; RESPONSE_HEADER_SIZE] {
        let mut buf = [0u8; RESPONSE_HEADER_SIZE];
        buf[0] = self.version;
        buf[1..3].copy_from_slice(&self.code.to_le_bytes());
        buf[3..7].copy_from_slice(&self.payload_size.to_le_bytes());
        buf
    }

    /// Decode from the first 7 bytes of `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < RESPONSE_HEADER_SIZE {
            return Err(WireError::MalformedHeader {
                expected: RESPONSE_HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            version: bytes[0],
            code: u16::from_le_bytes([bytes[1], bytes[2]]),
            payload_size: u32::from_le_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        })
    }
}
