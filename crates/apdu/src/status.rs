//! Status word vocabulary of the token

use std::fmt;

use tracing::Level;

/// Two-byte status word closing every response APDU
///
/// The token's vocabulary is small and closed; anything else arrives as
/// [`StatusWord::Unknown`] with the raw value preserved for diagnostics.
/// Note that the three `*Changed` words report success of a user-code
/// change, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusWord {
    /// Command completed (`9000`)
    ProcessCompleted,
    /// Access code changed (`9001`)
    Pin1Changed,
    /// Passcode changed (`9002`)
    Pin2Changed,
    /// Both codes changed (`9003`)
    Pins12Changed,
    /// Security delay in progress; re-send the same APDU (`9789`)
    NeedPause,
    /// Command refused at the current encryption mode (`6982`)
    NeedEncryption,
    /// Parameters rejected, including wrong user codes (`6A86`)
    InvalidParams,
    /// Command valid but not in this card state (`6985`)
    InvalidState,
    /// Instruction not supported by this firmware (`6D00`)
    InsNotSupported,
    /// Card failed internally while processing (`6286`)
    ErrorProcessingCommand,
    /// Named data file does not exist (`6A82`)
    FileNotFound,
    /// Status word outside the documented vocabulary
    Unknown(u16),
}

impl StatusWord {
    /// Decode a raw status word. Total; undocumented values become
    /// [`Self::Unknown`].
    pub const fn from_u16(raw: u16) -> Self {
        match raw {
            0x9000 => Self::ProcessCompleted,
            0x9001 => Self::Pin1Changed,
            0x9002 => Self::Pin2Changed,
            0x9003 => Self::Pins12Changed,
            0x9789 => Self::NeedPause,
            0x6982 => Self::NeedEncryption,
            0x6A86 => Self::InvalidParams,
            0x6985 => Self::InvalidState,
            0x6D00 => Self::InsNotSupported,
            0x6286 => Self::ErrorProcessingCommand,
            0x6A82 => Self::FileNotFound,
            other => Self::Unknown(other),
        }
    }

    /// The raw two-byte value
    pub const fn to_u16(self) -> u16 {
        match self {
            Self::ProcessCompleted => 0x9000,
            Self::Pin1Changed => 0x9001,
            Self::Pin2Changed => 0x9002,
            Self::Pins12Changed => 0x9003,
            Self::NeedPause => 0x9789,
            Self::NeedEncryption => 0x6982,
            Self::InvalidParams => 0x6A86,
            Self::InvalidState => 0x6985,
            Self::InsNotSupported => 0x6D00,
            Self::ErrorProcessingCommand => 0x6286,
            Self::FileNotFound => 0x6A82,
            Self::Unknown(raw) => raw,
        }
    }

    /// Whether this word reports success. Covers completion and the three
    /// code-changed acknowledgements.
    pub const fn is_success(self) -> bool {
        matches!(
            self,
            Self::ProcessCompleted | Self::Pin1Changed | Self::Pin2Changed | Self::Pins12Changed
        )
    }

    /// Whether this word acknowledges a user-code change
    pub const fn is_code_changed(self) -> bool {
        matches!(self, Self::Pin1Changed | Self::Pin2Changed | Self::Pins12Changed)
    }

    /// Whether the card is asking the host to wait out a security delay
    pub const fn is_need_pause(self) -> bool {
        matches!(self, Self::NeedPause)
    }

    /// Get the appropriate tracing level for this status word
    pub const fn tracing_level(self) -> Level {
        if self.is_success() {
            Level::DEBUG
        } else if matches!(self, Self::NeedPause | Self::NeedEncryption) {
            // Flow control, not failure
            Level::INFO
        } else {
            Level::WARN
        }
    }

    /// Get a description of this status word
    pub const fn description(self) -> &'static str {
        match self {
            Self::ProcessCompleted => "Process completed",
            Self::Pin1Changed => "Access code changed",
            Self::Pin2Changed => "Passcode changed",
            Self::Pins12Changed => "Access code and passcode changed",
            Self::NeedPause => "Security delay in progress",
            Self::NeedEncryption => "Encryption required",
            Self::InvalidParams => "Invalid parameters",
            Self::InvalidState => "Command not valid in this card state",
            Self::InsNotSupported => "Instruction not supported",
            Self::ErrorProcessingCommand => "Error processing command",
            Self::FileNotFound => "File not found",
            Self::Unknown(_) => "Unknown status word",
        }
    }
}

impl From<u16> for StatusWord {
    fn from(raw: u16) -> Self {
        Self::from_u16(raw)
    }
}

impl From<StatusWord> for u16 {
    fn from(status: StatusWord) -> Self {
        status.to_u16()
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04X}", self.to_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_word_from_to_u16() {
        let table = [
            (0x9000, StatusWord::ProcessCompleted),
            (0x9001, StatusWord::Pin1Changed),
            (0x9002, StatusWord::Pin2Changed),
            (0x9003, StatusWord::Pins12Changed),
            (0x9789, StatusWord::NeedPause),
            (0x6982, StatusWord::NeedEncryption),
            (0x6A86, StatusWord::InvalidParams),
            (0x6985, StatusWord::InvalidState),
            (0x6D00, StatusWord::InsNotSupported),
            (0x6286, StatusWord::ErrorProcessingCommand),
            (0x6A82, StatusWord::FileNotFound),
        ];
        for (raw, word) in table {
            assert_eq!(StatusWord::from_u16(raw), word);
            assert_eq!(word.to_u16(), raw);
        }
        assert_eq!(StatusWord::from_u16(0x6F42), StatusWord::Unknown(0x6F42));
        assert_eq!(StatusWord::Unknown(0x6F42).to_u16(), 0x6F42);
    }

    #[test]
    fn test_status_word_is_methods() {
        assert!(StatusWord::ProcessCompleted.is_success());
        assert!(StatusWord::Pin1Changed.is_success());
        assert!(StatusWord::Pin2Changed.is_code_changed());
        assert!(StatusWord::Pins12Changed.is_success());
        assert!(!StatusWord::ProcessCompleted.is_code_changed());
        assert!(!StatusWord::NeedPause.is_success());
        assert!(StatusWord::NeedPause.is_need_pause());
        assert!(!StatusWord::InvalidParams.is_success());
        assert!(!StatusWord::Unknown(0x9999).is_success());
    }

    #[test]
    fn test_status_word_display() {
        assert_eq!(StatusWord::ProcessCompleted.to_string(), "9000");
        assert_eq!(StatusWord::NeedPause.to_string(), "9789");
        assert_eq!(StatusWord::Unknown(0x0042).to_string(), "0042");
    }
}
