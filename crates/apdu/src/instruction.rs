//! Instruction byte registry

use std::fmt;

/// Instruction byte of a command APDU
///
/// `Select` is the ISO 7816-4 SELECT used to activate the applet; everything
/// else lives in the token's proprietary range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Instruction {
    /// ISO SELECT (applet activation)
    Select,
    /// Read the card identity block
    Read,
    /// Enumerate wallet slots
    ReadWallets,
    /// Create a wallet in a free slot
    CreateWallet,
    /// Erase a wallet slot
    PurgeWallet,
    /// Sign digests with a wallet key
    Sign,
    /// Change access code and/or passcode
    SetUserCode,
    /// Read a named data file
    ReadFileData,
    /// Write a named data file
    WriteFileData,
    /// Sign a host challenge with the card identity key
    AttestCardKey,
    /// Begin secure channel negotiation
    OpenSession,
    /// Instruction outside the documented set
    Unknown(u8),
}

impl Instruction {
    /// Decode an instruction byte. Total; undocumented bytes become
    /// [`Self::Unknown`].
    pub const fn from_u8(byte: u8) -> Self {
        match byte {
            0xA4 => Self::Select,
            0xF2 => Self::Read,
            0xF3 => Self::ReadWallets,
            0xF6 => Self::CreateWallet,
            0xF7 => Self::PurgeWallet,
            0xFB => Self::Sign,
            0xFA => Self::SetUserCode,
            0xE2 => Self::ReadFileData,
            0xE1 => Self::WriteFileData,
            0xE8 => Self::AttestCardKey,
            0xF1 => Self::OpenSession,
            other => Self::Unknown(other),
        }
    }

    /// The wire byte for this instruction
    pub const fn to_u8(self) -> u8 {
        match self {
            Self::Select => 0xA4,
            Self::Read => 0xF2,
            Self::ReadWallets => 0xF3,
            Self::CreateWallet => 0xF6,
            Self::PurgeWallet => 0xF7,
            Self::Sign => 0xFB,
            Self::SetUserCode => 0xFA,
            Self::ReadFileData => 0xE2,
            Self::WriteFileData => 0xE1,
            Self::AttestCardKey => 0xE8,
            Self::OpenSession => 0xF1,
            Self::Unknown(byte) => byte,
        }
    }
}

impl From<u8> for Instruction {
    fn from(byte: u8) -> Self {
        Self::from_u8(byte)
    }
}

impl From<Instruction> for u8 {
    fn from(ins: Instruction) -> Self {
        ins.to_u8()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown(byte) => write!(f, "Unknown({byte:#04X})"),
            other => write!(f, "{other:?}"),
        }
    }
}
