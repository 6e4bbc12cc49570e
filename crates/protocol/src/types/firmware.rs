use std::str::FromStr;

use derive_more::Display;

use crate::error::ProtocolError;

/// Firmware version reported by the card (major.minor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[display("{major}.{minor}")]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl FirmwareVersion {
    /// First firmware that can enumerate wallets in one response.
    pub const WALLET_LIST_MIN: Self = Self::new(4, 0);

    /// Build a version from its parts.
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Whether this version is at least `other`.
    pub const fn at_least(self, other: Self) -> bool {
        self.major > other.major || (self.major == other.major && self.minor >= other.minor)
    }

    /// Whether this firmware answers the wallet enumeration command.
    pub const fn supports_wallet_list(self) -> bool {
        self.at_least(Self::WALLET_LIST_MIN)
    }
}

impl FromStr for FirmwareVersion {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || ProtocolError::DeserializeFailed(format!("bad firmware version `{s}`"));
        let (major, minor) = s.split_once('.').ok_or_else(bad)?;
        Ok(Self {
            major: major.parse().map_err(|_| bad())?,
            minor: minor.parse().map_err(|_| bad())?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let version: FirmwareVersion = "4.12".parse().unwrap();
        assert_eq!(version, FirmwareVersion::new(4, 12));
        assert_eq!(version.to_string(), "4.12");

        assert!("4".parse::<FirmwareVersion>().is_err());
        assert!("4.x".parse::<FirmwareVersion>().is_err());
        assert!("four.two".parse::<FirmwareVersion>().is_err());
    }

    #[test]
    fn test_ordering() {
        assert!(FirmwareVersion::new(4, 0) > FirmwareVersion::new(3, 45));
        assert!(FirmwareVersion::new(4, 1) > FirmwareVersion::new(4, 0));
    }

    #[test]
    fn test_wallet_list_gate() {
        assert!(FirmwareVersion::new(4, 0).supports_wallet_list());
        assert!(FirmwareVersion::new(5, 2).supports_wallet_list());
        assert!(!FirmwareVersion::new(3, 45).supports_wallet_list());
    }
}
