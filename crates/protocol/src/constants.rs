//! Protocol-wide constants.

/// Application identifier of the tapcard applet, sent in the SELECT command.
pub const APPLET_AID: [u8; 9] = [0xA0, 0x00, 0x00, 0x08, 0x12, 0x54, 0x50, 0x43, 0x44];

/// Access code assumed when the user never set one.
pub const DEFAULT_ACCESS_CODE: &str = "000000";

/// Passcode assumed when the user never set one.
pub const DEFAULT_PASSCODE: &str = "000";

/// PBKDF2 iteration count for the protocol key derivation.
pub const PROTOCOL_KEY_ITERATIONS: u32 = 50;
