//! Wire-level codecs for contactless tapcard tokens
//!
//! This crate holds everything the protocol engine needs to talk bytes with a
//! token: the one-byte-tag TLV encoding used for command and response
//! payloads, the ISO/IEC 7816-4 style APDU framing around those payloads, the
//! token's status word table, and the [`Transceiver`] trait behind which the
//! platform NFC stack lives.
//!
//! ## Overview
//!
//! - [`tlv`] - TLV records, list codec and the typed [`tlv::TlvMap`] view
//! - [`CommandApdu`] / [`ResponseApdu`] - request and response frames
//! - [`StatusWord`] - the token's two-byte status vocabulary
//! - [`Instruction`] - instruction byte registry
//! - [`Transceiver`] - RF session and single-APDU exchange, with a
//!   crossbeam-channel tag event stream
//!
//! Encrypted payloads are opaque ciphertext at this layer; the secure channel
//! lives in the protocol crate.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

// Re-export bytes for convenience
pub use bytes::{Bytes, BytesMut};

// Main modules
pub mod command;
pub mod error;
pub mod instruction;
pub mod response;
pub mod status;
pub mod tlv;
pub mod transceiver;

pub use command::CommandApdu;
pub use error::ApduError;
pub use instruction::Instruction;
pub use response::ResponseApdu;
pub use status::StatusWord;
pub use tlv::{Tlv, TlvError, TlvMap, TlvTag};
pub use transceiver::{TagEvent, TagKind, TagStream, Transceiver, TransceiverError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{Bytes, BytesMut};

    pub use crate::command::CommandApdu;
    pub use crate::error::ApduError;
    pub use crate::instruction::Instruction;
    pub use crate::response::ResponseApdu;
    pub use crate::status::StatusWord;
    pub use crate::tlv::{Tlv, TlvError, TlvMap, TlvTag};
    pub use crate::transceiver::{
        TagEvent, TagEventSender, TagKind, TagStream, Transceiver, TransceiverError,
        tag_event_channel,
    };
}
