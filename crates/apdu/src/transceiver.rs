//! Transceiver abstraction over the platform NFC stack
//!
//! A transceiver owns RF discovery and the exchange of single APDUs with
//! whatever tag is currently in the field. It has no knowledge of TLV
//! content, secure channels or retry policy; that all lives above, in the
//! protocol crate's session.

use std::fmt;

use bytes::Bytes;
use crossbeam_channel::{Receiver, Sender, unbounded};
use tracing::{debug, trace};

/// What kind of tag entered the field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// ISO-DEP (ISO 14443-4) tag, the only kind the protocol speaks
    IsoDep,
    /// Tag technology the protocol cannot address
    Unsupported,
}

/// Tag presence transitions observed by the transceiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagEvent {
    /// A tag entered the field
    Connected(TagKind),
    /// The tag left the field
    Lost,
}

/// Sender for tag events
pub type TagEventSender = Sender<TagEvent>;
/// Receiving side of the tag event stream
pub type TagStream = Receiver<TagEvent>;

/// Create an unbounded channel for tag events
pub fn tag_event_channel() -> (TagEventSender, TagStream) {
    unbounded()
}

/// Errors surfaced by a transceiver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransceiverError {
    /// The tag left the field mid-exchange
    #[error("tag left the field")]
    TagLost,
    /// The RF session is closed or was never opened
    #[error("transceiver session is closed")]
    SessionClosed,
    /// Anything the underlying stack reports beyond presence
    #[error("transport failure: {0}")]
    Transport(String),
}

/// Trait for NFC transceivers
///
/// Implementations bridge to a platform reader stack or, in tests, to a
/// simulated token. The caller guarantees at most one `transceive` is in
/// flight at a time; implementations may assert it but need not tolerate
/// concurrency.
pub trait Transceiver: Send + fmt::Debug {
    /// Open the RF session and return the tag event stream.
    ///
    /// Events begin flowing immediately; the first `Connected` may arrive
    /// before the caller reads the stream.
    fn open(&mut self) -> Result<TagStream, TransceiverError>;

    /// Tear down the RF session. Idempotent; pending `transceive` calls and
    /// the event stream terminate with [`TransceiverError::SessionClosed`].
    fn close(&mut self);

    /// Suspend RF polling without dropping the session
    fn pause(&mut self) {}

    /// Resume RF polling after [`Transceiver::pause`]
    fn resume(&mut self) {}

    /// Whether the link carries extended-length APDUs (payloads over 255
    /// bytes)
    fn supports_extended_length(&self) -> bool {
        false
    }

    /// Exchange one APDU with the tag currently in the field
    fn transceive(&mut self, apdu: &[u8]) -> Result<Bytes, TransceiverError> {
        trace!(command = %hex::encode(apdu), "transceiving APDU");
        let result = self.do_transceive(apdu);
        match &result {
            Ok(response) => trace!(response = %hex::encode(response), "received response"),
            Err(e) => debug!(error = %e, "transceive failed"),
        }
        result
    }

    /// Internal implementation of `transceive`.
    /// This is the method that concrete implementations should override.
    fn do_transceive(&mut self, apdu: &[u8]) -> Result<Bytes, TransceiverError>;
}
