//! Response APDU parsing

use bytes::Bytes;

use crate::error::ApduError;
use crate::status::StatusWord;
use crate::tlv::{TlvError, TlvMap};

/// A parsed response APDU: payload bytes plus the trailing status word
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseApdu {
    /// Payload preceding the status word; may be empty
    pub payload: Bytes,
    /// Status word from the final two bytes
    pub status: StatusWord,
}

impl ResponseApdu {
    /// Assemble a response from parts
    pub fn new(payload: impl Into<Bytes>, status: StatusWord) -> Self {
        Self {
            payload: payload.into(),
            status,
        }
    }

    /// Split raw bytes into payload and status word.
    ///
    /// The status word is the big-endian `u16` in the last two bytes;
    /// everything before it is payload.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ApduError> {
        if data.len() < 2 {
            return Err(ApduError::ResponseTooShort { length: data.len() });
        }
        let (payload, status) = data.split_at(data.len() - 2);
        Ok(Self {
            payload: Bytes::copy_from_slice(payload),
            status: StatusWord::from_u16(u16::from_be_bytes([status[0], status[1]])),
        })
    }

    /// Serialize back to wire bytes
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.payload.len() + 2);
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.status.to_u16().to_be_bytes());
        buf.into()
    }

    /// Whether the status word reports success
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the payload as a TLV list
    pub fn tlvs(&self) -> Result<TlvMap, TlvError> {
        TlvMap::parse(&self.payload)
    }
}
