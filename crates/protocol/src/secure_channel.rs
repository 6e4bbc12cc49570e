//! Encryption modes and per-session channel state.
//!
//! A session starts in the configured mode with no key. The first protected
//! exchange negotiates a key lazily; a card that answers `NeedEncryption`
//! pushes the session one mode up, which throws the current key away. Keys
//! also never survive the tag leaving the field.

use derive_more::Display;
use tapcard_apdu::{CommandApdu, ResponseApdu};

use crate::{
    crypto::{self, SessionKey},
    error::{ProtocolError, Result},
};

/// Link protection mode, ordered weakest to strongest.
///
/// The active mode is written into `p2` of every sealed command so the card
/// knows how to open the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Display)]
pub enum EncryptionMode {
    /// Plaintext APDUs.
    #[default]
    #[display("none")]
    None,
    /// AES-256-CBC with a fresh IV per frame. Confidentiality only.
    #[display("fast")]
    Fast,
    /// AES-256-CCM with a fresh nonce per frame. Authenticated.
    #[display("strong")]
    Strong,
}

impl EncryptionMode {
    /// Wire byte carried in `p2`.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::None => 0x00,
            Self::Fast => 0x01,
            Self::Strong => 0x02,
        }
    }

    /// Parse a `p2` wire byte.
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x00 => Some(Self::None),
            0x01 => Some(Self::Fast),
            0x02 => Some(Self::Strong),
            _ => None,
        }
    }

    /// The next stronger mode, or `None` from [`Strong`](Self::Strong).
    pub const fn escalate(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Fast),
            Self::Fast => Some(Self::Strong),
            Self::Strong => None,
        }
    }

    /// Whether frames in this mode carry ciphertext.
    pub const fn is_encrypted(self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Mutable channel state of one session.
#[derive(Debug)]
pub struct EncryptionState {
    mode: EncryptionMode,
    key: Option<SessionKey>,
}

impl EncryptionState {
    /// Start in `mode` with no negotiated key.
    pub const fn new(mode: EncryptionMode) -> Self {
        Self { mode, key: None }
    }

    /// The current mode.
    pub const fn mode(&self) -> EncryptionMode {
        self.mode
    }

    /// Move up one mode, discarding the current key.
    ///
    /// Returns the new mode, or `None` when the state is already at
    /// [`EncryptionMode::Strong`] and cannot satisfy the card.
    pub fn escalate(&mut self) -> Option<EncryptionMode> {
        let next = self.mode.escalate()?;
        self.mode = next;
        self.key = None;
        Some(next)
    }

    /// Install a freshly negotiated key.
    pub fn install_key(&mut self, key: SessionKey) {
        self.key = Some(key);
    }

    /// Discard the key, forcing renegotiation before the next sealed frame.
    pub fn clear_key(&mut self) {
        self.key = None;
    }

    /// The negotiated key, if any.
    pub const fn key(&self) -> Option<&SessionKey> {
        self.key.as_ref()
    }

    /// Whether a sealed exchange must negotiate a key first.
    pub const fn needs_negotiation(&self) -> bool {
        self.mode.is_encrypted() && self.key.is_none()
    }
}

/// Seal a logical command for the wire.
///
/// Plaintext mode passes the payload through; encrypted modes replace it
/// with a sealed frame. Either way the mode byte lands in `p2`.
pub(crate) fn seal_apdu(apdu: &CommandApdu, state: &EncryptionState) -> Result<CommandApdu> {
    let mode = state.mode();
    let sealed = match mode {
        EncryptionMode::None => apdu.clone(),
        EncryptionMode::Fast => {
            let key = channel_key(state)?;
            let mut sealed = apdu.clone();
            sealed.payload = crypto::seal_fast(key, &apdu.payload);
            sealed
        }
        EncryptionMode::Strong => {
            let key = channel_key(state)?;
            let mut sealed = apdu.clone();
            sealed.payload = crypto::seal_strong(key, &apdu.payload)?;
            sealed
        }
    };
    Ok(sealed.with_p2(mode.to_byte()))
}

/// Open a response received over the channel.
///
/// Only successful responses carry sealed payloads; flow-control and error
/// statuses answer in plaintext and pass through unchanged.
pub(crate) fn open_response(
    response: ResponseApdu,
    state: &EncryptionState,
) -> Result<ResponseApdu> {
    if !state.mode().is_encrypted() || !response.status.is_success() || response.payload.is_empty()
    {
        return Ok(response);
    }

    let key = channel_key(state)?;
    let payload = match state.mode() {
        EncryptionMode::Fast => crypto::open_fast(key, &response.payload)?,
        EncryptionMode::Strong => crypto::open_strong(key, &response.payload)?,
        EncryptionMode::None => unreachable!("checked above"),
    };
    Ok(ResponseApdu::new(payload, response.status))
}

fn channel_key(state: &EncryptionState) -> Result<&SessionKey> {
    state
        .key()
        .ok_or(ProtocolError::CryptoFailed("channel key not negotiated"))
}
