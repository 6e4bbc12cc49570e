//! Tag registry for the token's TLV vocabulary

use std::fmt;

/// One-byte TLV tag.
///
/// Tags the firmware does not document are carried through as
/// [`TlvTag::Unknown`] rather than dropped, so a payload survives a
/// decode/encode round trip unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TlvTag {
    /// Card identifier (8 bytes)
    CardId,
    /// Card life-cycle status byte
    Status,
    /// Identity public key of the card (SEC1)
    CardPublicKey,
    /// Signature made with the card identity key
    CardSignature,
    /// Elliptic curve identifier byte
    CurveId,
    /// Maximum number of wallets the card can hold
    MaxWallets,
    /// Access code hash (historically "PIN1")
    Pin,
    /// Passcode hash (historically "PIN2")
    Pin2,
    /// Card verification code
    Cvc,
    /// Replacement access code hash
    NewPin,
    /// Replacement passcode hash
    NewPin2,
    /// Host-chosen challenge
    Challenge,
    /// Card-chosen salt
    Salt,
    /// Remaining security delay, milliseconds
    Pause,
    /// Total configured security delay, milliseconds
    SecurityDelay,
    /// Card settings bit mask
    SettingsMask,
    /// Card UID used as the KDF salt
    Uid,
    /// Host ephemeral public key for channel negotiation
    SessionKeyA,
    /// Card ephemeral public key for channel negotiation
    SessionKeyB,
    /// Index of a named data file
    FileIndex,
    /// Contents of a named data file
    IssuerData,
    /// Digest(s) to sign, concatenated 32-byte words
    TransactionOutHash,
    /// Wallet public key (SEC1)
    WalletPublicKey,
    /// Signature produced by a wallet key
    Signature,
    /// Wallet slot index
    WalletIndex,
    /// Nested record describing one wallet
    WalletRecord,
    /// Firmware version string
    Firmware,
    /// Tag outside the documented vocabulary
    Unknown(u8),
}

impl TlvTag {
    /// Decode a tag byte. Total; undocumented bytes become [`Self::Unknown`].
    pub const fn from_u8(byte: u8) -> Self {
        match byte {
            0x01 => Self::CardId,
            0x02 => Self::Status,
            0x03 => Self::CardPublicKey,
            0x04 => Self::CardSignature,
            0x05 => Self::CurveId,
            0x08 => Self::MaxWallets,
            0x10 => Self::Pin,
            0x11 => Self::Pin2,
            0x12 => Self::Cvc,
            0x13 => Self::NewPin,
            0x14 => Self::NewPin2,
            0x16 => Self::Challenge,
            0x17 => Self::Salt,
            0x1C => Self::Pause,
            0x1D => Self::SecurityDelay,
            0x1E => Self::SettingsMask,
            0x20 => Self::Uid,
            0x21 => Self::SessionKeyA,
            0x22 => Self::SessionKeyB,
            0x25 => Self::FileIndex,
            0x32 => Self::IssuerData,
            0x50 => Self::TransactionOutHash,
            0x60 => Self::WalletPublicKey,
            0x61 => Self::Signature,
            0x62 => Self::WalletIndex,
            0x63 => Self::WalletRecord,
            0x80 => Self::Firmware,
            other => Self::Unknown(other),
        }
    }

    /// The wire byte for this tag
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::CardId => 0x01,
            Self::Status => 0x02,
            Self::CardPublicKey => 0x03,
            Self::CardSignature => 0x04,
            Self::CurveId => 0x05,
            Self::MaxWallets => 0x08,
            Self::Pin => 0x10,
            Self::Pin2 => 0x11,
            Self::Cvc => 0x12,
            Self::NewPin => 0x13,
            Self::NewPin2 => 0x14,
            Self::Challenge => 0x16,
            Self::Salt => 0x17,
            Self::Pause => 0x1C,
            Self::SecurityDelay => 0x1D,
            Self::SettingsMask => 0x1E,
            Self::Uid => 0x20,
            Self::SessionKeyA => 0x21,
            Self::SessionKeyB => 0x22,
            Self::FileIndex => 0x25,
            Self::IssuerData => 0x32,
            Self::TransactionOutHash => 0x50,
            Self::WalletPublicKey => 0x60,
            Self::Signature => 0x61,
            Self::WalletIndex => 0x62,
            Self::WalletRecord => 0x63,
            Self::Firmware => 0x80,
            Self::Unknown(byte) => byte,
        }
    }
}

impl From<u8> for TlvTag {
    fn from(byte: u8) -> Self {
        Self::from_u8(byte)
    }
}

impl From<TlvTag> for u8 {
    fn from(tag: TlvTag) -> Self {
        tag.to_u8()
    }
}

impl fmt::Display for TlvTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(byte) => write!(f, "Unknown({byte:#04X})"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_byte_round_trip() {
        for byte in 0x00..=0xFFu8 {
            assert_eq!(TlvTag::from_u8(byte).to_u8(), byte);
        }
    }

    #[test]
    fn test_known_tags() {
        assert_eq!(TlvTag::from_u8(0x01), TlvTag::CardId);
        assert_eq!(TlvTag::from_u8(0x10), TlvTag::Pin);
        assert_eq!(TlvTag::from_u8(0x1C), TlvTag::Pause);
        assert_eq!(TlvTag::from_u8(0x21), TlvTag::SessionKeyA);
        assert_eq!(TlvTag::from_u8(0x7F), TlvTag::Unknown(0x7F));
    }
}
