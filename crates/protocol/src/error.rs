//! The single error surface of the protocol stack.
//!
//! Every failure a session can produce is one [`ProtocolError`]. Callers get a
//! stable numeric [`code`](ProtocolError::code) for analytics, a human-readable
//! message via [`Display`](std::fmt::Display), and a [`silent`](ProtocolError::is_silent)
//! flag for errors that end a session without deserving an error dialog.

use tapcard_apdu::{ApduError, StatusWord, TlvError, TlvTag, TransceiverError};

/// Result alias used throughout the protocol crate.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// All errors the protocol stack reports.
///
/// Codes are grouped by origin: 1xxx codec, 2xxx card-reported, 3xxx
/// session and link, 4xxx user codes, 5xxx cryptography.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolError {
    /// A command payload could not be built.
    #[error("failed to build command: {0}")]
    SerializeFailed(String),

    /// A response payload could not be decoded.
    #[error("failed to decode response: {0}")]
    DeserializeFailed(String),

    /// A response is missing a TLV tag the command requires.
    #[error("response missing required tag {0}")]
    MissingTag(TlvTag),

    /// A TLV payload is malformed.
    #[error("malformed TLV payload at offset {offset}")]
    InvalidTlv {
        /// Byte offset at which decoding failed.
        offset: usize,
    },

    /// A response was shorter than a status word.
    #[error("response shorter than a status word")]
    ResponseTooShort,

    /// The card answered with a status word this stack does not know.
    #[error("card returned unknown status {0:#06X}")]
    UnknownStatus(u16),

    /// The card failed while processing the command.
    #[error("card failed processing the command")]
    ErrorProcessingCommand,

    /// The command is not valid in the card's current state.
    #[error("command not valid in the current card state")]
    InvalidState,

    /// The card firmware does not implement this instruction.
    #[error("instruction not supported by this firmware")]
    InsNotSupported,

    /// The card rejected the command parameters.
    #[error("card rejected the command parameters")]
    InvalidParams,

    /// The card demands a stronger encryption mode than the session can offer.
    #[error("card requires a stronger encryption mode")]
    NeedEncryption,

    /// The requested file does not exist on the card.
    #[error("requested file not found on the card")]
    FileNotFound,

    /// The referenced wallet does not exist on the card.
    #[error("referenced wallet not found on the card")]
    WalletNotFound,

    /// The card cannot hold any more wallets.
    #[error("maximum number of wallets already created")]
    MaxNumberOfWalletsCreated,

    /// The tag left the field and did not return in time.
    #[error("tag lost")]
    TagLost,

    /// The session is already running or has already finished.
    #[error("session is busy or already finished")]
    Busy,

    /// A command required card data but no preflight read has run.
    #[error("command requires a preflight read that did not run")]
    MissingPreflightRead,

    /// The presented card does not match the expected card id.
    #[error("presented card does not match the expected card id")]
    WrongCardNumber,

    /// The presented card was rejected by the acceptance filter.
    #[error("presented card is not of the expected type")]
    WrongCardType,

    /// The underlying reader session was closed.
    #[error("reader session closed")]
    SessionClosed,

    /// The command needs extended length APDUs the link cannot carry.
    #[error("command exceeds the link's APDU length limit")]
    ExtendedLengthNotSupported,

    /// The transport failed below the protocol layer.
    #[error("transport failure: {0}")]
    Transport(String),

    /// An access code is required and none is available.
    #[error("access code required")]
    AccessCodeRequired,

    /// The card rejected the supplied access code.
    #[error("wrong access code")]
    WrongAccessCode,

    /// A passcode is required and none is available.
    #[error("passcode required")]
    PasscodeRequired,

    /// The card rejected the supplied passcode.
    #[error("wrong passcode")]
    WrongPasscode,

    /// The user dismissed a code prompt. Ends the session silently.
    #[error("cancelled by the user")]
    UserCancelled,

    /// Card settings forbid changing the access code.
    #[error("card settings forbid changing the access code")]
    AccessCodeCannotBeChanged,

    /// Card settings forbid changing the passcode.
    #[error("card settings forbid changing the passcode")]
    PasscodeCannotBeChanged,

    /// A cryptographic operation failed.
    #[error("cryptographic operation failed: {0}")]
    CryptoFailed(&'static str),

    /// The card uses an elliptic curve this stack does not implement.
    #[error("unsupported elliptic curve {0:#04X}")]
    UnsupportedCurve(u8),

    /// The card firmware is too old for the requested operation.
    #[error("card firmware does not support this operation")]
    FirmwareNotSupported,
}

impl ProtocolError {
    /// Stable numeric code, suitable for logs and analytics.
    pub const fn code(&self) -> u32 {
        match self {
            Self::SerializeFailed(_) => 1001,
            Self::DeserializeFailed(_) => 1002,
            Self::MissingTag(_) => 1003,
            Self::InvalidTlv { .. } => 1004,
            Self::ResponseTooShort => 1005,
            Self::UnknownStatus(_) => 2001,
            Self::ErrorProcessingCommand => 2002,
            Self::InvalidState => 2003,
            Self::InsNotSupported => 2004,
            Self::InvalidParams => 2005,
            Self::NeedEncryption => 2006,
            Self::FileNotFound => 2007,
            Self::WalletNotFound => 2008,
            Self::MaxNumberOfWalletsCreated => 2009,
            Self::TagLost => 3001,
            Self::Busy => 3002,
            Self::MissingPreflightRead => 3003,
            Self::WrongCardNumber => 3004,
            Self::WrongCardType => 3005,
            Self::SessionClosed => 3006,
            Self::ExtendedLengthNotSupported => 3007,
            Self::Transport(_) => 3008,
            Self::AccessCodeRequired => 4001,
            Self::WrongAccessCode => 4002,
            Self::PasscodeRequired => 4003,
            Self::WrongPasscode => 4004,
            Self::UserCancelled => 4005,
            Self::AccessCodeCannotBeChanged => 4006,
            Self::PasscodeCannotBeChanged => 4007,
            Self::CryptoFailed(_) => 5001,
            Self::UnsupportedCurve(_) => 5002,
            Self::FirmwareNotSupported => 5003,
        }
    }

    /// Whether this error ends a session without an error callback.
    pub const fn is_silent(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }

    /// Whether this error is recoverable by asking the user for a code.
    pub const fn is_credential(&self) -> bool {
        matches!(
            self,
            Self::AccessCodeRequired
                | Self::WrongAccessCode
                | Self::PasscodeRequired
                | Self::WrongPasscode
        )
    }

    /// Map a non-success status word to the error it reports.
    ///
    /// `NeedPause` and `NeedEncryption` are flow control and are intercepted
    /// by the engine before this runs; they fall through to their literal
    /// meaning here so the mapping stays total.
    pub(crate) const fn from_status(status: StatusWord) -> Self {
        match status {
            StatusWord::NeedEncryption => Self::NeedEncryption,
            StatusWord::InvalidParams => Self::InvalidParams,
            StatusWord::InvalidState => Self::InvalidState,
            StatusWord::InsNotSupported => Self::InsNotSupported,
            StatusWord::ErrorProcessingCommand => Self::ErrorProcessingCommand,
            StatusWord::FileNotFound => Self::FileNotFound,
            _ => Self::UnknownStatus(status.to_u16()),
        }
    }
}

impl From<TlvError> for ProtocolError {
    fn from(error: TlvError) -> Self {
        match error {
            TlvError::Truncated { offset } => Self::InvalidTlv { offset },
            TlvError::ValueTooLong { .. } => Self::SerializeFailed(error.to_string()),
            TlvError::MissingTag(tag) => Self::MissingTag(tag),
            TlvError::InvalidValue { .. } => Self::DeserializeFailed(error.to_string()),
        }
    }
}

impl From<ApduError> for ProtocolError {
    fn from(error: ApduError) -> Self {
        match error {
            ApduError::ResponseTooShort { .. } => Self::ResponseTooShort,
            ApduError::MalformedCommand { .. } => Self::DeserializeFailed(error.to_string()),
            ApduError::PayloadTooLong { .. } => Self::SerializeFailed(error.to_string()),
            ApduError::Tlv(inner) => inner.into(),
        }
    }
}

impl From<TransceiverError> for ProtocolError {
    fn from(error: TransceiverError) -> Self {
        match error {
            TransceiverError::TagLost => Self::TagLost,
            TransceiverError::SessionClosed => Self::SessionClosed,
            TransceiverError::Transport(message) => Self::Transport(message),
        }
    }
}
