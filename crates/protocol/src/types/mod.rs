//! Data the protocol reads off a card.

mod card;
mod firmware;
mod wallet;

pub use card::{Card, CardSettings, CardSettingsMask, CardStatus, SettingsFlag};
pub use firmware::FirmwareVersion;
pub use wallet::{EllipticCurve, Wallet};

use k256::PublicKey;

use crate::error::{ProtocolError, Result};

/// Parse a SEC1 public key, compressed or uncompressed.
pub(crate) fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    PublicKey::from_sec1_bytes(bytes)
        .map_err(|_| ProtocolError::CryptoFailed("invalid sec1 public key"))
}

/// A loaded card snapshot for command tests.
#[cfg(test)]
pub(crate) fn test_card() -> Card {
    let generator =
        hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
            .unwrap();
    let public_key = PublicKey::from_sec1_bytes(&generator).unwrap();
    Card {
        card_id: "CB42000000001122".into(),
        public_key,
        firmware: FirmwareVersion::new(4, 12),
        status: CardStatus::Loaded,
        is_access_code_set: false,
        is_passcode_set: Some(true),
        settings: CardSettings {
            security_delay_ms: 3_000,
            max_wallets: 2,
            mask: CardSettingsMask::from(0x0000_000B),
        },
        wallets: vec![Wallet {
            index: 0,
            curve: EllipticCurve::Secp256k1,
            public_key,
        }],
    }
}
