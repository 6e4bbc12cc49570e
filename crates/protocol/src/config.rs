//! Session configuration.

use std::{fmt, sync::Arc};

use crate::{
    command::PreflightMode,
    environment::UserCodeType,
    error::Result,
    secure_channel::EncryptionMode,
    types::Card,
};

/// Predicate deciding whether a presented card is acceptable.
pub type CardFilterFn = Box<dyn Fn(&Card) -> bool + Send>;

/// Hook handling a "forgot code" reply; yields a replacement code.
pub type CodeResetFn = Box<dyn Fn(UserCodeType) -> Result<String> + Send>;

/// Long-term storage for user code hashes, keyed by card id.
///
/// Typically backed by a biometric-protected keystore. Only hashes ever
/// reach it; plaintext codes stay in the UI layer.
pub trait UserCodeRepository: Send + Sync {
    /// The stored hash for a card and code type, if any.
    fn fetch(&self, card_id: &str, code_type: UserCodeType) -> Option<[u8; 32]>;

    /// Store a hash after a session used it successfully.
    fn store(&self, card_id: &str, code_type: UserCodeType, hash: &[u8; 32]);
}

/// Knobs a caller sets before starting a session.
pub struct SessionConfig {
    /// Initial encryption mode. The card may still force escalation.
    pub encryption_mode: EncryptionMode,
    /// Card id the session insists on, if any. A mismatching card gets one
    /// chance to be swapped for the right one.
    pub expected_card_id: Option<String>,
    /// Acceptance filter applied to the preflight snapshot.
    pub filter: Option<CardFilterFn>,
    /// Overrides the preflight mode requested by the task, if set.
    pub preflight_override: Option<PreflightMode>,
    /// Whether codes entered this session are persisted on success.
    pub persist_codes: bool,
    /// Storage for user code hashes.
    pub repository: Option<Arc<dyn UserCodeRepository>>,
    /// Hook handling "forgot code" replies.
    pub code_reset: Option<CodeResetFn>,
    /// Whether a scan also attests the card key.
    pub attest_on_scan: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encryption_mode: EncryptionMode::default(),
            expected_card_id: None,
            filter: None,
            preflight_override: None,
            persist_codes: false,
            repository: None,
            code_reset: None,
            attest_on_scan: false,
        }
    }
}

impl SessionConfig {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial encryption mode.
    #[must_use]
    pub const fn with_encryption(mut self, mode: EncryptionMode) -> Self {
        self.encryption_mode = mode;
        self
    }

    /// Insist on a specific card id.
    #[must_use]
    pub fn with_expected_card_id(mut self, card_id: impl Into<String>) -> Self {
        self.expected_card_id = Some(card_id.into());
        self
    }

    /// Reject cards the filter declines.
    #[must_use]
    pub fn with_filter(mut self, filter: impl Fn(&Card) -> bool + Send + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Override the preflight mode requested by the task.
    #[must_use]
    pub const fn with_preflight_override(mut self, mode: PreflightMode) -> Self {
        self.preflight_override = Some(mode);
        self
    }

    /// Attach a code repository, optionally persisting entered codes.
    #[must_use]
    pub fn with_repository(
        mut self,
        repository: Arc<dyn UserCodeRepository>,
        persist_codes: bool,
    ) -> Self {
        self.repository = Some(repository);
        self.persist_codes = persist_codes;
        self
    }

    /// Install a "forgot code" reset hook.
    #[must_use]
    pub fn with_code_reset(
        mut self,
        reset: impl Fn(UserCodeType) -> Result<String> + Send + 'static,
    ) -> Self {
        self.code_reset = Some(Box::new(reset));
        self
    }

    /// Attest the card key during scans.
    #[must_use]
    pub const fn with_attest_on_scan(mut self, attest: bool) -> Self {
        self.attest_on_scan = attest;
        self
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("encryption_mode", &self.encryption_mode)
            .field("expected_card_id", &self.expected_card_id)
            .field("filter", &self.filter.is_some())
            .field("preflight_override", &self.preflight_override)
            .field("persist_codes", &self.persist_codes)
            .field("repository", &self.repository.is_some())
            .field("code_reset", &self.code_reset.is_some())
            .field("attest_on_scan", &self.attest_on_scan)
            .finish()
    }
}
