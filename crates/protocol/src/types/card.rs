use std::fmt;

use k256::PublicKey;
use tapcard_apdu::{TlvMap, TlvTag};

use crate::error::{ProtocolError, Result};

use super::{FirmwareVersion, Wallet, parse_public_key};

/// Personalization state of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardStatus {
    /// No wallets created yet.
    Empty,
    /// At least one wallet exists.
    Loaded,
}

impl CardStatus {
    /// Parse the wire byte.
    pub(crate) fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x00 => Ok(Self::Empty),
            0x01 => Ok(Self::Loaded),
            other => Err(ProtocolError::DeserializeFailed(format!(
                "unknown card status {other:#04X}"
            ))),
        }
    }

    /// Wire byte of this state.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Empty => 0x00,
            Self::Loaded => 0x01,
        }
    }
}

/// Settings flags a card carries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsFlag {
    /// The owner may replace the access code.
    AllowSetAccessCode = 0x0001,
    /// The owner may replace the passcode.
    AllowSetPasscode = 0x0002,
    /// Wallets can never be purged.
    ProhibitPurgeWallet = 0x0004,
    /// The card exposes issuer file storage.
    AllowFiles = 0x0008,
}

/// Settings flags container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSettingsMask(u32);

impl fmt::Display for CardSettingsMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut flags = Vec::new();
        if self.contains(SettingsFlag::AllowSetAccessCode) {
            flags.push("AllowSetAccessCode");
        }
        if self.contains(SettingsFlag::AllowSetPasscode) {
            flags.push("AllowSetPasscode");
        }
        if self.contains(SettingsFlag::ProhibitPurgeWallet) {
            flags.push("ProhibitPurgeWallet");
        }
        if self.contains(SettingsFlag::AllowFiles) {
            flags.push("AllowFiles");
        }
        write!(f, "{}", flags.join(", "))
    }
}

impl CardSettingsMask {
    /// Combine flags into a mask.
    pub fn new(flags: &[SettingsFlag]) -> Self {
        Self(flags.iter().fold(0, |mask, &flag| mask | flag as u32))
    }

    /// Whether the mask carries `flag`.
    pub const fn contains(self, flag: SettingsFlag) -> bool {
        self.0 & flag as u32 != 0
    }

    /// Raw bits as they appear on the wire.
    pub const fn bits(self) -> u32 {
        self.0
    }
}

impl From<u32> for CardSettingsMask {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Operational settings of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardSettings {
    /// Configured security delay in milliseconds.
    pub security_delay_ms: u32,
    /// Wallet slots the card can hold.
    pub max_wallets: u8,
    /// Settings flags.
    pub mask: CardSettingsMask,
}

/// Everything the preflight read learns about a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Card {
    /// Card identifier, uppercase hex of the printed serial.
    pub card_id: String,
    /// Long-lived card key, attested by the vendor at issuance.
    pub public_key: PublicKey,
    /// Firmware version.
    pub firmware: FirmwareVersion,
    /// Personalization state.
    pub status: CardStatus,
    /// Whether a non-default access code is set.
    pub is_access_code_set: bool,
    /// Whether a non-default passcode is set. Old firmware does not report
    /// this.
    pub is_passcode_set: Option<bool>,
    /// Operational settings.
    pub settings: CardSettings,
    /// Wallets on the card, filled in by enumeration where firmware
    /// supports it.
    pub wallets: Vec<Wallet>,
}

impl Card {
    /// Assemble a snapshot from a read response.
    pub(crate) fn from_tlvs(map: &TlvMap) -> Result<Self> {
        Ok(Self {
            card_id: hex::encode_upper(map.required(TlvTag::CardId)?),
            public_key: parse_public_key(map.required(TlvTag::CardPublicKey)?)?,
            firmware: map.required_string(TlvTag::Firmware)?.parse()?,
            status: CardStatus::from_byte(map.required_byte(TlvTag::Status)?)?,
            is_access_code_set: map.flag(TlvTag::Pin),
            is_passcode_set: map
                .get(TlvTag::Pin2)
                .map(|value| value.last().is_none_or(|&b| b != 0)),
            settings: CardSettings {
                security_delay_ms: map.required_uint(TlvTag::SecurityDelay)? as u32,
                max_wallets: map.required_byte(TlvTag::MaxWallets)?,
                mask: CardSettingsMask::from(map.required_uint(TlvTag::SettingsMask)? as u32),
            },
            wallets: Vec::new(),
        })
    }

    /// The wallet in slot `index`, if enumerated.
    pub fn wallet(&self, index: u8) -> Option<&Wallet> {
        self.wallets.iter().find(|wallet| wallet.index == index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapcard_apdu::Tlv;

    fn read_response_tlvs() -> Vec<Tlv> {
        let generator =
            hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap();
        vec![
            Tlv::new(TlvTag::CardId, vec![0xCB, 0x42, 0x00, 0x00, 0x00, 0x00, 0x11, 0x22]),
            Tlv::new(TlvTag::CardPublicKey, generator),
            Tlv::new(TlvTag::Firmware, b"4.12".to_vec()),
            Tlv::new(TlvTag::Status, vec![0x01]),
            Tlv::new(TlvTag::Pin, vec![0x01]),
            Tlv::new(TlvTag::Pin2, vec![0x00]),
            Tlv::new(TlvTag::SecurityDelay, 15_000u32.to_be_bytes().to_vec()),
            Tlv::new(TlvTag::MaxWallets, vec![20]),
            Tlv::new(TlvTag::SettingsMask, 0x0000_000Bu32.to_be_bytes().to_vec()),
        ]
    }

    #[test]
    fn test_snapshot_from_read_response() {
        let payload = Tlv::serialize_list(&read_response_tlvs()).unwrap();
        let card = Card::from_tlvs(&TlvMap::parse(&payload).unwrap()).unwrap();

        assert_eq!(card.card_id, "CB42000000001122");
        assert_eq!(card.firmware, FirmwareVersion::new(4, 12));
        assert_eq!(card.status, CardStatus::Loaded);
        assert!(card.is_access_code_set);
        assert_eq!(card.is_passcode_set, Some(false));
        assert_eq!(card.settings.security_delay_ms, 15_000);
        assert_eq!(card.settings.max_wallets, 20);
        assert!(card.settings.mask.contains(SettingsFlag::AllowSetAccessCode));
        assert!(card.settings.mask.contains(SettingsFlag::AllowSetPasscode));
        assert!(card.settings.mask.contains(SettingsFlag::AllowFiles));
        assert!(
            !card
                .settings
                .mask
                .contains(SettingsFlag::ProhibitPurgeWallet)
        );
        assert!(card.wallets.is_empty());
    }

    #[test]
    fn test_snapshot_without_passcode_flag() {
        let tlvs: Vec<Tlv> = read_response_tlvs()
            .into_iter()
            .filter(|tlv| tlv.tag() != TlvTag::Pin2)
            .collect();
        let payload = Tlv::serialize_list(&tlvs).unwrap();
        let card = Card::from_tlvs(&TlvMap::parse(&payload).unwrap()).unwrap();
        assert_eq!(card.is_passcode_set, None);
    }

    #[test]
    fn test_snapshot_missing_identity_fails() {
        let tlvs: Vec<Tlv> = read_response_tlvs()
            .into_iter()
            .filter(|tlv| tlv.tag() != TlvTag::CardId)
            .collect();
        let payload = Tlv::serialize_list(&tlvs).unwrap();
        let error = Card::from_tlvs(&TlvMap::parse(&payload).unwrap()).unwrap_err();
        assert_eq!(error, ProtocolError::MissingTag(TlvTag::CardId));
    }

    #[test]
    fn test_settings_mask_display() {
        let mask = CardSettingsMask::new(&[
            SettingsFlag::AllowSetAccessCode,
            SettingsFlag::AllowFiles,
        ]);
        assert_eq!(mask.to_string(), "AllowSetAccessCode, AllowFiles");
    }

    #[test]
    fn test_wallet_lookup() {
        let payload = Tlv::serialize_list(&read_response_tlvs()).unwrap();
        let mut card = Card::from_tlvs(&TlvMap::parse(&payload).unwrap()).unwrap();
        card.wallets.push(Wallet {
            index: 5,
            curve: crate::types::EllipticCurve::Secp256k1,
            public_key: card.public_key,
        });

        assert!(card.wallet(5).is_some());
        assert!(card.wallet(0).is_none());
    }
}
