//! Simulated reader plumbing.
//!
//! [`SimTransceiver`] is the reader the session drives; its paired
//! [`TagHandle`] is the hand moving the card on and off it. Scripted tag
//! drops happen from inside an exchange, exactly where hardware loses the
//! field.

use std::{
    fmt,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering},
    },
};

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use tapcard_apdu::{
    TagEvent, TagKind, TagStream, Transceiver, TransceiverError,
    transceiver::{TagEventSender, tag_event_channel},
};

use crate::card::TokenSim;

struct SimShared {
    card: Mutex<TokenSim>,
    sender: Mutex<Option<TagEventSender>>,
    tag_present: AtomicBool,
    closed: AtomicBool,
    exchanges: AtomicU64,
    drop_at: Mutex<Option<u64>>,
    reconnect_after_drop: AtomicBool,
    pause_count: AtomicU32,
    resume_count: AtomicU32,
}

impl SimShared {
    fn send(&self, event: TagEvent) {
        if let Some(sender) = self.sender.lock().as_ref() {
            // the session side may already be gone
            let _ = sender.send(event);
        }
    }
}

/// Reader side of the simulator, handed to [`Session::new`].
///
/// [`Session::new`]: tapcard_protocol::Session::new
pub struct SimTransceiver {
    shared: Arc<SimShared>,
}

impl fmt::Debug for SimTransceiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimTransceiver")
            .field("tag_present", &self.shared.tag_present.load(Ordering::SeqCst))
            .field("closed", &self.shared.closed.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl SimTransceiver {
    /// Put `card` on a fresh reader. The tag starts in the field.
    pub fn new(card: TokenSim) -> (Self, TagHandle) {
        let shared = Arc::new(SimShared {
            card: Mutex::new(card),
            sender: Mutex::new(None),
            tag_present: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            exchanges: AtomicU64::new(0),
            drop_at: Mutex::new(None),
            reconnect_after_drop: AtomicBool::new(false),
            pause_count: AtomicU32::new(0),
            resume_count: AtomicU32::new(0),
        });
        (
            Self {
                shared: Arc::clone(&shared),
            },
            TagHandle { shared },
        )
    }
}

impl Transceiver for SimTransceiver {
    fn open(&mut self) -> Result<TagStream, TransceiverError> {
        let (sender, stream) = tag_event_channel();
        if self.shared.tag_present.load(Ordering::SeqCst) {
            // the tag was on the reader before discovery started
            let _ = sender.send(TagEvent::Connected(TagKind::IsoDep));
        }
        *self.shared.sender.lock() = Some(sender);
        self.shared.closed.store(false, Ordering::SeqCst);
        Ok(stream)
    }

    fn close(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        *self.shared.sender.lock() = None;
    }

    fn pause(&mut self) {
        self.shared.pause_count.fetch_add(1, Ordering::SeqCst);
    }

    fn resume(&mut self) {
        self.shared.resume_count.fetch_add(1, Ordering::SeqCst);
    }

    fn supports_extended_length(&self) -> bool {
        true
    }

    fn do_transceive(&mut self, apdu: &[u8]) -> Result<Bytes, TransceiverError> {
        if self.shared.closed.load(Ordering::SeqCst) {
            return Err(TransceiverError::SessionClosed);
        }
        if !self.shared.tag_present.load(Ordering::SeqCst) {
            return Err(TransceiverError::TagLost);
        }

        let exchange = self.shared.exchanges.fetch_add(1, Ordering::SeqCst) + 1;
        let mut drop_at = self.shared.drop_at.lock();
        if *drop_at == Some(exchange) {
            *drop_at = None;
            drop(drop_at);
            debug!(exchange, "scripted tag drop");
            self.shared.tag_present.store(false, Ordering::SeqCst);
            self.shared.card.lock().reset_applet();
            self.shared.send(TagEvent::Lost);
            if self.shared.reconnect_after_drop.load(Ordering::SeqCst) {
                self.shared.tag_present.store(true, Ordering::SeqCst);
                self.shared.send(TagEvent::Connected(TagKind::IsoDep));
            }
            return Err(TransceiverError::TagLost);
        }
        drop(drop_at);

        Ok(self.shared.card.lock().handle_apdu(apdu))
    }
}

/// The hand holding the card.
pub struct TagHandle {
    shared: Arc<SimShared>,
}

impl fmt::Debug for TagHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagHandle")
            .field("tag_present", &self.shared.tag_present.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl TagHandle {
    /// Put the tag (back) on the reader.
    pub fn connect(&self) {
        self.shared.tag_present.store(true, Ordering::SeqCst);
        self.shared.send(TagEvent::Connected(TagKind::IsoDep));
    }

    /// Take the tag off the reader.
    pub fn disconnect(&self) {
        self.shared.tag_present.store(false, Ordering::SeqCst);
        self.shared.card.lock().reset_applet();
        self.shared.send(TagEvent::Lost);
    }

    /// Wave something that is not an ISO-DEP tag over the reader.
    pub fn connect_unsupported(&self) {
        self.shared.send(TagEvent::Connected(TagKind::Unsupported));
    }

    /// Script a tag drop during the `n`-th exchange from now.
    pub fn drop_after_exchanges(&self, n: u64) {
        let current = self.shared.exchanges.load(Ordering::SeqCst);
        *self.shared.drop_at.lock() = Some(current + n);
    }

    /// Whether a scripted drop bounces straight back into the field.
    pub fn reconnect_after_drop(&self, reconnect: bool) {
        self.shared
            .reconnect_after_drop
            .store(reconnect, Ordering::SeqCst);
    }

    /// Direct access to the token, for configuration and assertions.
    pub fn card(&self) -> MutexGuard<'_, TokenSim> {
        self.shared.card.lock()
    }

    /// Another reader over the same card, for a follow-up session.
    pub fn reader(&self) -> SimTransceiver {
        SimTransceiver {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether a session currently holds the reader open.
    pub fn reader_open(&self) -> bool {
        self.shared.sender.lock().is_some()
    }

    /// Exchanges the reader has carried so far.
    pub fn exchange_count(&self) -> u64 {
        self.shared.exchanges.load(Ordering::SeqCst)
    }

    /// How often the session paused the radio.
    pub fn pause_count(&self) -> u32 {
        self.shared.pause_count.load(Ordering::SeqCst)
    }

    /// How often the session resumed the radio.
    pub fn resume_count(&self) -> u32 {
        self.shared.resume_count.load(Ordering::SeqCst)
    }
}
