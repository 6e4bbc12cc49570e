use derive_more::Display;
use k256::PublicKey;
use tapcard_apdu::{TlvMap, TlvTag};

use crate::error::{ProtocolError, Result};

/// Elliptic curves a wallet key can live on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display)]
pub enum EllipticCurve {
    /// secp256k1, the only curve current firmware ships.
    #[default]
    #[display("secp256k1")]
    Secp256k1,
}

impl EllipticCurve {
    /// Wire identifier of the curve.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Secp256k1 => 0x01,
        }
    }

    /// Parse a wire identifier.
    pub const fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            0x01 => Ok(Self::Secp256k1),
            other => Err(ProtocolError::UnsupportedCurve(other)),
        }
    }
}

/// One wallet slot on the card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Wallet {
    /// Slot index, unique per card.
    pub index: u8,
    /// Curve the key pair lives on.
    pub curve: EllipticCurve,
    /// Public half of the wallet key.
    pub public_key: PublicKey,
}

impl Wallet {
    /// Parse one wallet record: a nested TLV list carrying index, curve
    /// and public key.
    pub(crate) fn from_record(record: &[u8]) -> Result<Self> {
        let map = TlvMap::parse(record)?;
        Ok(Self {
            index: map.required_byte(TlvTag::WalletIndex)?,
            curve: EllipticCurve::from_byte(map.required_byte(TlvTag::CurveId)?)?,
            public_key: super::parse_public_key(map.required(TlvTag::WalletPublicKey)?)?,
        })
    }
}
