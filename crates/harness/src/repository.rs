//! An in-memory user code repository.

use std::collections::HashMap;

use parking_lot::Mutex;

use tapcard_protocol::{UserCodeRepository, UserCodeType, hash_user_code};

/// [`UserCodeRepository`] backed by a map, for tests.
#[derive(Debug, Default)]
pub struct MemoryRepository {
    codes: Mutex<HashMap<(String, UserCodeType), [u8; 32]>>,
}

impl MemoryRepository {
    /// An empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-load the hash of `code` for a card.
    pub fn seed(&self, card_id: &str, code_type: UserCodeType, code: &str) {
        self.codes
            .lock()
            .insert((card_id.to_owned(), code_type), hash_user_code(code));
    }

    /// The stored hash, if any. For asserting what a session persisted.
    pub fn stored(&self, card_id: &str, code_type: UserCodeType) -> Option<[u8; 32]> {
        self.codes
            .lock()
            .get(&(card_id.to_owned(), code_type))
            .copied()
    }
}

impl UserCodeRepository for MemoryRepository {
    fn fetch(&self, card_id: &str, code_type: UserCodeType) -> Option<[u8; 32]> {
        self.stored(card_id, code_type)
    }

    fn store(&self, card_id: &str, code_type: UserCodeType, hash: &[u8; 32]) {
        self.codes
            .lock()
            .insert((card_id.to_owned(), code_type), *hash);
    }
}
