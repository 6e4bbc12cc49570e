//! Frame-level error types

use crate::tlv::TlvError;

/// Errors produced by the APDU frame codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApduError {
    /// Response shorter than the two-byte status word
    #[error("response of {length} bytes is shorter than a status word")]
    ResponseTooShort {
        /// Length of the truncated response
        length: usize,
    },

    /// Command payload exceeds what any link can carry
    #[error("command payload of {length} bytes cannot be framed")]
    PayloadTooLong {
        /// Length of the offending payload
        length: usize,
    },

    /// Command frame whose header or length fields are inconsistent
    #[error("command frame of {length} bytes is malformed")]
    MalformedCommand {
        /// Length of the rejected frame
        length: usize,
    },

    /// TLV payload error
    #[error(transparent)]
    Tlv(#[from] TlvError),
}
