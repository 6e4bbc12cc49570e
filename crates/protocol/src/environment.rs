//! Session-scoped protocol state: the card snapshot, user codes and the
//! secure channel.

use std::fmt;

use derive_more::Display;
use zeroize::Zeroize;

use crate::{
    constants::{DEFAULT_ACCESS_CODE, DEFAULT_PASSCODE},
    crypto::hash_user_code,
    error::{ProtocolError, Result},
    secure_channel::{EncryptionMode, EncryptionState},
    types::Card,
};

/// Which of the two user codes is meant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum UserCodeType {
    /// Gates reading the card at all.
    #[display("access code")]
    AccessCode,
    /// Gates signing and other privileged operations.
    #[display("passcode")]
    Passcode,
}

/// Where the code currently held by the session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOrigin {
    /// Built-in default, assumed until something better is known.
    Default,
    /// Typed in by the user during this session.
    Entered,
    /// Recovered from the configured repository.
    Stored,
}

/// One user code, held only as its SHA-256 hash. Wiped on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct UserCode {
    #[zeroize(skip)]
    code_type: UserCodeType,
    #[zeroize(skip)]
    origin: CodeOrigin,
    hash: [u8; 32],
}

impl UserCode {
    /// The built-in default for `code_type`.
    pub fn default_for(code_type: UserCodeType) -> Self {
        let code = match code_type {
            UserCodeType::AccessCode => DEFAULT_ACCESS_CODE,
            UserCodeType::Passcode => DEFAULT_PASSCODE,
        };
        Self {
            code_type,
            origin: CodeOrigin::Default,
            hash: hash_user_code(code),
        }
    }

    /// A code the user typed in.
    pub fn entered(code_type: UserCodeType, code: &str) -> Self {
        Self {
            code_type,
            origin: CodeOrigin::Entered,
            hash: hash_user_code(code),
        }
    }

    /// An already-hashed code the user chose.
    pub(crate) const fn entered_hash(code_type: UserCodeType, hash: [u8; 32]) -> Self {
        Self {
            code_type,
            origin: CodeOrigin::Entered,
            hash,
        }
    }

    /// A code hash recovered from a repository.
    pub const fn stored(code_type: UserCodeType, hash: [u8; 32]) -> Self {
        Self {
            code_type,
            origin: CodeOrigin::Stored,
            hash,
        }
    }

    /// Which code this is.
    pub const fn code_type(&self) -> UserCodeType {
        self.code_type
    }

    /// Where the code came from.
    pub const fn origin(&self) -> CodeOrigin {
        self.origin
    }

    /// The SHA-256 hash sent to the card.
    pub const fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    /// Whether this is still the built-in default.
    pub const fn is_default(&self) -> bool {
        matches!(self.origin, CodeOrigin::Default)
    }
}

impl fmt::Debug for UserCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserCode")
            .field("code_type", &self.code_type)
            .field("origin", &self.origin)
            .finish_non_exhaustive()
    }
}

/// Mutable protocol state of one running session.
///
/// Commands read it while serializing and update it while deserializing;
/// the engine and recovery flow mutate the codes and channel in between.
#[derive(Debug)]
pub struct SessionEnvironment {
    /// Card snapshot installed by the preflight read.
    pub card: Option<Card>,
    /// Access code sent with every protocol command.
    pub access_code: UserCode,
    /// Passcode sent by privileged commands.
    pub passcode: UserCode,
    /// Secure channel mode and key.
    pub encryption: EncryptionState,
}

impl SessionEnvironment {
    /// Fresh state for a session starting in `mode`.
    pub fn new(mode: EncryptionMode) -> Self {
        Self {
            card: None,
            access_code: UserCode::default_for(UserCodeType::AccessCode),
            passcode: UserCode::default_for(UserCodeType::Passcode),
            encryption: EncryptionState::new(mode),
        }
    }

    /// The held code of the given type.
    pub const fn code(&self, code_type: UserCodeType) -> &UserCode {
        match code_type {
            UserCodeType::AccessCode => &self.access_code,
            UserCodeType::Passcode => &self.passcode,
        }
    }

    /// Replace a code.
    ///
    /// Replacing the access code also drops the channel key, which was
    /// derived from the old one.
    pub fn set_code(&mut self, code: UserCode) {
        match code.code_type() {
            UserCodeType::AccessCode => {
                self.access_code = code;
                self.encryption.clear_key();
            }
            UserCodeType::Passcode => self.passcode = code,
        }
    }

    /// The card snapshot, or the error commands report without one.
    pub fn card(&self) -> Result<&Card> {
        self.card.as_ref().ok_or(ProtocolError::MissingPreflightRead)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_codes() {
        let access = UserCode::default_for(UserCodeType::AccessCode);
        assert!(access.is_default());
        assert_eq!(access.hash(), &hash_user_code(DEFAULT_ACCESS_CODE));

        let passcode = UserCode::default_for(UserCodeType::Passcode);
        assert_eq!(passcode.hash(), &hash_user_code(DEFAULT_PASSCODE));
    }

    #[test]
    fn test_entered_code_origin() {
        let code = UserCode::entered(UserCodeType::AccessCode, "meadow");
        assert_eq!(code.origin(), CodeOrigin::Entered);
        assert!(!code.is_default());
        assert_eq!(code.hash(), &hash_user_code("meadow"));
    }

    #[test]
    fn test_access_code_change_drops_channel_key() {
        use crate::crypto::SessionKey;

        let mut env = SessionEnvironment::new(EncryptionMode::Fast);
        env.encryption.install_key(SessionKey::from_bytes([0x42; 32]));

        env.set_code(UserCode::entered(UserCodeType::Passcode, "9911"));
        assert!(env.encryption.key().is_some());

        env.set_code(UserCode::entered(UserCodeType::AccessCode, "meadow"));
        assert!(env.encryption.key().is_none());
    }

    #[test]
    fn test_debug_hides_hash() {
        let code = UserCode::entered(UserCodeType::Passcode, "9911");
        let rendered = format!("{code:?}");
        assert!(!rendered.contains("9911"));
        assert!(rendered.contains("Passcode"));
    }

    #[test]
    fn test_missing_card_reported() {
        let env = SessionEnvironment::new(EncryptionMode::None);
        assert_eq!(
            env.card().unwrap_err(),
            ProtocolError::MissingPreflightRead
        );
    }
}
