//! Error types for TLV encoding and decoding

use super::TlvTag;

/// Errors produced by the TLV codec
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TlvError {
    /// Input ended inside a record
    #[error("malformed TLV stream at offset {offset}")]
    Truncated {
        /// Byte offset of the record whose header or value overran the input
        offset: usize,
    },

    /// Value does not fit the two-byte length field
    #[error("TLV value of {length} bytes exceeds the encodable maximum")]
    ValueTooLong {
        /// Length of the offending value
        length: usize,
    },

    /// A required tag was absent from the decoded list
    #[error("missing required tag {0}")]
    MissingTag(TlvTag),

    /// A value failed typed interpretation
    #[error("invalid value for tag {tag}: expected {expected}")]
    InvalidValue {
        /// Tag whose value was rejected
        tag: TlvTag,
        /// What the caller asked the value to be
        expected: &'static str,
    },
}
