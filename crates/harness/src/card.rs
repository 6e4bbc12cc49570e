//! The simulated token.
//!
//! [`TokenSim`] implements the card side of the protocol with the same
//! primitives the host uses: real ECDH negotiation, real sealing, real
//! signatures. A host talking to it exercises every path it would against
//! hardware, including the ones scripted to go wrong.

use std::{collections::BTreeMap, fmt};

use bytes::Bytes;
use k256::{
    PublicKey, SecretKey,
    ecdsa::{
        Signature, SigningKey,
        signature::{Signer, hazmat::PrehashSigner},
    },
};
use rand_v8::RngCore;
use tracing::debug;

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, StatusWord, Tlv, TlvMap, TlvTag};
use tapcard_protocol::{APPLET_AID, EncryptionMode, SessionKey, crypto, hash_user_code};

const DEFAULT_CARD_ID: [u8; 8] = [0xCB, 0x42, 0x00, 0x00, 0x00, 0x00, 0x11, 0x22];
const DEFAULT_UID: [u8; 12] = [
    0x5A, 0x1B, 0x2C, 0x3D, 0x4E, 0x5F, 0x60, 0x71, 0x82, 0x93, 0xA4, 0xB5,
];

struct SimWallet {
    index: u8,
    signing: SigningKey,
}

struct SimChannel {
    key: SessionKey,
    mode: EncryptionMode,
}

/// A scriptable in-memory token.
///
/// Fresh instances hold the default codes, an empty wallet table and no
/// scripted faults. Builders configure personalization; `stall_polls` and
/// friends script the card's awkward moods.
pub struct TokenSim {
    identity: SigningKey,
    card_id: [u8; 8],
    uid: [u8; 12],
    firmware: (u8, u8),
    access_code_hash: [u8; 32],
    passcode_hash: [u8; 32],
    access_code_set: bool,
    passcode_set: bool,
    security_delay_ms: u32,
    max_wallets: u8,
    settings_bits: u32,
    wallets: Vec<SimWallet>,
    files: BTreeMap<u8, Bytes>,
    selected: bool,
    channel: Option<SimChannel>,
    min_mode: EncryptionMode,
    never_satisfied: bool,
    delay_polls: u32,
    open_session_count: u32,
    processed: Vec<Instruction>,
}

impl fmt::Debug for TokenSim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenSim")
            .field("card_id", &self.card_id_hex())
            .field("selected", &self.selected)
            .field("wallets", &self.wallets.len())
            .field("open_session_count", &self.open_session_count)
            .finish_non_exhaustive()
    }
}

impl Default for TokenSim {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenSim {
    /// A factory-fresh token with default codes and no wallets.
    pub fn new() -> Self {
        Self {
            identity: SigningKey::random(&mut rand_v8::thread_rng()),
            card_id: DEFAULT_CARD_ID,
            uid: DEFAULT_UID,
            firmware: (4, 12),
            access_code_hash: hash_user_code(tapcard_protocol::DEFAULT_ACCESS_CODE),
            passcode_hash: hash_user_code(tapcard_protocol::DEFAULT_PASSCODE),
            access_code_set: false,
            passcode_set: false,
            security_delay_ms: 0,
            max_wallets: 20,
            // everything allowed, purge permitted
            settings_bits: 0x0000_000B,
            wallets: Vec::new(),
            files: BTreeMap::new(),
            selected: false,
            channel: None,
            min_mode: EncryptionMode::None,
            never_satisfied: false,
            delay_polls: 0,
            open_session_count: 0,
            processed: Vec::new(),
        }
    }

    /// Personalize with `card_id`.
    #[must_use]
    pub const fn with_card_id(mut self, card_id: [u8; 8]) -> Self {
        self.card_id = card_id;
        self
    }

    /// Personalize with a user-chosen access code.
    #[must_use]
    pub fn with_access_code(mut self, code: &str) -> Self {
        self.access_code_hash = hash_user_code(code);
        self.access_code_set = true;
        self
    }

    /// Personalize with a user-chosen passcode.
    #[must_use]
    pub fn with_passcode(mut self, code: &str) -> Self {
        self.passcode_hash = hash_user_code(code);
        self.passcode_set = true;
        self
    }

    /// Report `major.minor` as the firmware version.
    #[must_use]
    pub const fn with_firmware(mut self, major: u8, minor: u8) -> Self {
        self.firmware = (major, minor);
        self
    }

    /// Cap the wallet table at `max_wallets` slots.
    #[must_use]
    pub const fn with_max_wallets(mut self, max_wallets: u8) -> Self {
        self.max_wallets = max_wallets;
        self
    }

    /// Replace the settings mask bits.
    #[must_use]
    pub const fn with_settings_bits(mut self, bits: u32) -> Self {
        self.settings_bits = bits;
        self
    }

    /// Report `delay_ms` as the configured security delay.
    #[must_use]
    pub const fn with_security_delay_ms(mut self, delay_ms: u32) -> Self {
        self.security_delay_ms = delay_ms;
        self
    }

    /// Create a wallet in the next free slot.
    #[must_use]
    pub fn with_wallet(mut self) -> Self {
        let index = self.next_free_slot().unwrap_or(0);
        self.wallets.push(SimWallet {
            index,
            signing: SigningKey::random(&mut rand_v8::thread_rng()),
        });
        self
    }

    /// Store `data` as the issuer file in `slot`.
    #[must_use]
    pub fn with_file(mut self, slot: u8, data: impl Into<Bytes>) -> Self {
        self.files.insert(slot, data.into());
        self
    }

    /// Refuse anything below `mode` with `NeedEncryption`.
    #[must_use]
    pub const fn with_minimum_mode(mut self, mode: EncryptionMode) -> Self {
        self.min_mode = mode;
        self
    }

    /// Answer `NeedEncryption` at every mode, including the strongest.
    #[must_use]
    pub const fn with_unsatisfiable_encryption(mut self) -> Self {
        self.never_satisfied = true;
        self
    }

    /// Answer the next `polls` commands with `NeedPause`.
    pub fn stall_polls(&mut self, polls: u32) {
        self.delay_polls = polls;
    }

    /// Swap the printed serial, for wrong-card scenarios.
    pub const fn set_card_id(&mut self, card_id: [u8; 8]) {
        self.card_id = card_id;
    }

    /// Uppercase hex of the card id, as the host reports it.
    pub fn card_id_hex(&self) -> String {
        hex::encode_upper(self.card_id)
    }

    /// Public half of the card identity key.
    pub fn identity_public(&self) -> PublicKey {
        self.identity.verifying_key().into()
    }

    /// Public half of the wallet key in `slot`, if the slot is taken.
    pub fn wallet_public_key(&self, slot: u8) -> Option<PublicKey> {
        self.wallets
            .iter()
            .find(|wallet| wallet.index == slot)
            .map(|wallet| wallet.signing.verifying_key().into())
    }

    /// How many wallets the token holds.
    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    /// The issuer file in `slot`, if written.
    pub fn file(&self, slot: u8) -> Option<&Bytes> {
        self.files.get(&slot)
    }

    /// Current access code hash.
    pub const fn access_code_hash(&self) -> &[u8; 32] {
        &self.access_code_hash
    }

    /// How many channel negotiations the token served.
    pub const fn open_session_count(&self) -> u32 {
        self.open_session_count
    }

    /// Instructions that made it past the gates, in arrival order.
    pub fn processed(&self) -> &[Instruction] {
        &self.processed
    }

    /// Field loss wipes the applet session.
    pub fn reset_applet(&mut self) {
        self.selected = false;
        self.channel = None;
    }

    /// Process one wire frame and produce the wire response.
    pub fn handle_apdu(&mut self, frame: &[u8]) -> Bytes {
        let Ok(apdu) = CommandApdu::from_bytes(frame) else {
            return status_only(StatusWord::ErrorProcessingCommand);
        };
        debug!(instruction = %apdu.instruction, "token received command");
        match apdu.instruction {
            Instruction::Select => self.handle_select(&apdu),
            Instruction::OpenSession => self.handle_open_session(&apdu),
            instruction => self.handle_command(instruction, &apdu),
        }
    }

    fn handle_select(&mut self, apdu: &CommandApdu) -> Bytes {
        if apdu.payload.as_ref() != APPLET_AID.as_slice() {
            return status_only(StatusWord::FileNotFound);
        }
        // selection starts the applet session over
        self.reset_applet();
        self.selected = true;
        status_only(StatusWord::ProcessCompleted)
    }

    fn handle_open_session(&mut self, apdu: &CommandApdu) -> Bytes {
        if !self.selected {
            return status_only(StatusWord::InvalidState);
        }
        let Some(mode) = EncryptionMode::from_byte(apdu.p2) else {
            return status_only(StatusWord::InvalidParams);
        };
        let Ok(map) = TlvMap::parse(&apdu.payload) else {
            return status_only(StatusWord::InvalidParams);
        };
        let Ok(host_public) = map
            .required(TlvTag::SessionKeyA)
            .map_err(|_| ())
            .and_then(|raw| PublicKey::from_sec1_bytes(raw).map_err(|_| ()))
        else {
            return status_only(StatusWord::InvalidParams);
        };

        let card_secret = SecretKey::random(&mut rand_v8::thread_rng());
        let protocol_key = crypto::derive_protocol_key(&self.access_code_hash, &self.uid);
        let secret = crypto::generate_ecdh_shared_secret(&card_secret, &host_public);
        let key = crypto::derive_session_key(&secret, &protocol_key);

        self.channel = Some(SimChannel { key, mode });
        self.open_session_count += 1;
        debug!(%mode, count = self.open_session_count, "token negotiated a channel");

        let tlvs = [
            Tlv::new(
                TlvTag::SessionKeyB,
                card_secret.public_key().to_sec1_bytes().to_vec(),
            ),
            Tlv::new(TlvTag::Uid, self.uid.to_vec()),
        ];
        // negotiation always answers in plaintext
        plain_response(&tlvs, StatusWord::ProcessCompleted)
    }

    fn handle_command(&mut self, instruction: Instruction, apdu: &CommandApdu) -> Bytes {
        if !self.selected {
            return status_only(StatusWord::InvalidState);
        }
        if self.delay_polls > 0 {
            let remaining = u64::from(self.delay_polls) * 1000;
            self.delay_polls -= 1;
            return plain_response(
                &[Tlv::new(TlvTag::Pause, remaining.to_be_bytes().to_vec())],
                StatusWord::NeedPause,
            );
        }
        let Some(mode) = EncryptionMode::from_byte(apdu.p2) else {
            return status_only(StatusWord::InvalidParams);
        };
        if self.never_satisfied || mode < self.min_mode {
            return status_only(StatusWord::NeedEncryption);
        }

        let plain = match mode {
            EncryptionMode::None => apdu.payload.clone(),
            EncryptionMode::Fast | EncryptionMode::Strong => {
                let Some(channel) = self.channel.as_ref() else {
                    return status_only(StatusWord::InvalidState);
                };
                if channel.mode != mode {
                    return status_only(StatusWord::InvalidState);
                }
                let opened = match mode {
                    EncryptionMode::Fast => crypto::open_fast(&channel.key, &apdu.payload),
                    _ => crypto::open_strong(&channel.key, &apdu.payload),
                };
                match opened {
                    Ok(plain) => plain,
                    // a key derived from the wrong access code ends up here
                    Err(_) => return status_only(StatusWord::InvalidParams),
                }
            }
        };

        let Ok(map) = TlvMap::parse(&plain) else {
            return status_only(StatusWord::InvalidParams);
        };
        if map.required_array::<32>(TlvTag::Pin) != Ok(self.access_code_hash) {
            return status_only(StatusWord::InvalidParams);
        }
        if needs_passcode(instruction)
            && map.required_array::<32>(TlvTag::Pin2) != Ok(self.passcode_hash)
        {
            return status_only(StatusWord::InvalidParams);
        }

        self.processed.push(instruction);
        let (tlvs, status) = match instruction {
            Instruction::Read => self.read_snapshot(),
            Instruction::ReadWallets => self.read_wallets(),
            Instruction::CreateWallet => self.create_wallet(),
            Instruction::PurgeWallet => self.purge_wallet(&map),
            Instruction::Sign => match self.sign(&map) {
                Ok(reply) => reply,
                Err(status) => return status_only(status),
            },
            Instruction::SetUserCode => self.set_user_code(&map),
            Instruction::ReadFileData => self.read_file(&map),
            Instruction::WriteFileData => self.write_file(&map),
            Instruction::AttestCardKey => match self.attest(&map) {
                Ok(reply) => reply,
                Err(status) => return status_only(status),
            },
            _ => return status_only(StatusWord::InsNotSupported),
        };
        self.seal_response(mode, &tlvs, status)
    }

    fn read_snapshot(&self) -> (Vec<Tlv>, StatusWord) {
        let (major, minor) = self.firmware;
        let status = if self.wallets.is_empty() { 0x00 } else { 0x01 };
        let mut tlvs = vec![
            Tlv::new(TlvTag::CardId, self.card_id.to_vec()),
            Tlv::new(
                TlvTag::CardPublicKey,
                self.identity_public().to_sec1_bytes().to_vec(),
            ),
            Tlv::new(TlvTag::Firmware, format!("{major}.{minor}").into_bytes()),
            Tlv::new(TlvTag::Status, vec![status]),
            Tlv::new(TlvTag::Pin, vec![u8::from(self.access_code_set)]),
            Tlv::new(
                TlvTag::SecurityDelay,
                self.security_delay_ms.to_be_bytes().to_vec(),
            ),
            Tlv::new(TlvTag::MaxWallets, vec![self.max_wallets]),
            Tlv::new(TlvTag::SettingsMask, self.settings_bits.to_be_bytes().to_vec()),
        ];
        // firmware before 4.0 never reported the passcode flag
        if self.firmware >= (4, 0) {
            tlvs.push(Tlv::new(TlvTag::Pin2, vec![u8::from(self.passcode_set)]));
        }
        (tlvs, StatusWord::ProcessCompleted)
    }

    fn read_wallets(&self) -> (Vec<Tlv>, StatusWord) {
        // firmware before 4.0 does not know this instruction
        if self.firmware < (4, 0) {
            return (Vec::new(), StatusWord::InsNotSupported);
        }
        let mut tlvs = Vec::with_capacity(self.wallets.len());
        for wallet in &self.wallets {
            let public: PublicKey = wallet.signing.verifying_key().into();
            let Ok(record) = Tlv::serialize_list(&[
                Tlv::new(TlvTag::WalletIndex, vec![wallet.index]),
                Tlv::new(TlvTag::CurveId, vec![0x01]),
                Tlv::new(TlvTag::WalletPublicKey, public.to_sec1_bytes().to_vec()),
            ]) else {
                return (Vec::new(), StatusWord::ErrorProcessingCommand);
            };
            tlvs.push(Tlv::new(TlvTag::WalletRecord, record));
        }
        (tlvs, StatusWord::ProcessCompleted)
    }

    fn create_wallet(&mut self) -> (Vec<Tlv>, StatusWord) {
        let Some(index) = self.next_free_slot() else {
            return (Vec::new(), StatusWord::InvalidState);
        };
        let signing = SigningKey::random(&mut rand_v8::thread_rng());
        let public: PublicKey = signing.verifying_key().into();
        self.wallets.push(SimWallet { index, signing });
        (
            vec![
                Tlv::new(TlvTag::WalletIndex, vec![index]),
                Tlv::new(TlvTag::WalletPublicKey, public.to_sec1_bytes().to_vec()),
            ],
            StatusWord::ProcessCompleted,
        )
    }

    fn purge_wallet(&mut self, map: &TlvMap) -> (Vec<Tlv>, StatusWord) {
        let Ok(index) = map.required_byte(TlvTag::WalletIndex) else {
            return (Vec::new(), StatusWord::InvalidParams);
        };
        let before = self.wallets.len();
        self.wallets.retain(|wallet| wallet.index != index);
        if self.wallets.len() == before {
            return (Vec::new(), StatusWord::InvalidParams);
        }
        (Vec::new(), StatusWord::ProcessCompleted)
    }

    fn sign(&mut self, map: &TlvMap) -> Result<(Vec<Tlv>, StatusWord), StatusWord> {
        let index = map
            .required_byte(TlvTag::WalletIndex)
            .map_err(|_| StatusWord::InvalidParams)?;
        let wallet = self
            .wallets
            .iter()
            .find(|wallet| wallet.index == index)
            .ok_or(StatusWord::InvalidParams)?;

        let mut tlvs = Vec::new();
        for digest in map.all(TlvTag::TransactionOutHash) {
            let signature: Signature = wallet
                .signing
                .sign_prehash(digest)
                .map_err(|_| StatusWord::InvalidParams)?;
            tlvs.push(Tlv::new(TlvTag::Signature, signature.to_vec()));
        }
        if tlvs.is_empty() {
            return Err(StatusWord::InvalidParams);
        }
        Ok((tlvs, StatusWord::ProcessCompleted))
    }

    fn set_user_code(&mut self, map: &TlvMap) -> (Vec<Tlv>, StatusWord) {
        let new_access = map.required_array::<32>(TlvTag::NewPin).ok();
        let new_passcode = map.required_array::<32>(TlvTag::NewPin2).ok();
        if let Some(hash) = new_access {
            self.access_code_hash = hash;
            self.access_code_set = true;
        }
        if let Some(hash) = new_passcode {
            self.passcode_hash = hash;
            self.passcode_set = true;
        }
        let status = match (new_access, new_passcode) {
            (Some(_), Some(_)) => StatusWord::Pins12Changed,
            (Some(_), None) => StatusWord::Pin1Changed,
            (None, Some(_)) => StatusWord::Pin2Changed,
            (None, None) => StatusWord::InvalidParams,
        };
        (Vec::new(), status)
    }

    fn read_file(&self, map: &TlvMap) -> (Vec<Tlv>, StatusWord) {
        let Ok(slot) = map.required_byte(TlvTag::FileIndex) else {
            return (Vec::new(), StatusWord::InvalidParams);
        };
        match self.files.get(&slot) {
            Some(data) => (
                vec![Tlv::new(TlvTag::IssuerData, data.clone())],
                StatusWord::ProcessCompleted,
            ),
            None => (Vec::new(), StatusWord::FileNotFound),
        }
    }

    fn write_file(&mut self, map: &TlvMap) -> (Vec<Tlv>, StatusWord) {
        let (Ok(slot), Ok(data)) = (
            map.required_byte(TlvTag::FileIndex),
            map.required_bytes(TlvTag::IssuerData),
        ) else {
            return (Vec::new(), StatusWord::InvalidParams);
        };
        self.files.insert(slot, data);
        (Vec::new(), StatusWord::ProcessCompleted)
    }

    fn attest(&self, map: &TlvMap) -> Result<(Vec<Tlv>, StatusWord), StatusWord> {
        let challenge = map
            .required_array::<32>(TlvTag::Challenge)
            .map_err(|_| StatusWord::InvalidParams)?;
        let mut salt = [0u8; 16];
        rand_v8::thread_rng().fill_bytes(&mut salt);

        let mut message = challenge.to_vec();
        message.extend_from_slice(&salt);
        let signature: Signature = self.identity.sign(&message);

        Ok((
            vec![
                Tlv::new(TlvTag::Salt, salt.to_vec()),
                Tlv::new(TlvTag::CardSignature, signature.to_vec()),
            ],
            StatusWord::ProcessCompleted,
        ))
    }

    fn next_free_slot(&self) -> Option<u8> {
        (0..self.max_wallets).find(|slot| self.wallets.iter().all(|wallet| wallet.index != *slot))
    }

    fn seal_response(&self, mode: EncryptionMode, tlvs: &[Tlv], status: StatusWord) -> Bytes {
        let Ok(payload) = Tlv::serialize_list(tlvs) else {
            return status_only(StatusWord::ErrorProcessingCommand);
        };
        if !status.is_success() || payload.is_empty() || !mode.is_encrypted() {
            return ResponseApdu::new(payload, status).to_bytes();
        }
        let Some(channel) = self.channel.as_ref() else {
            return status_only(StatusWord::InvalidState);
        };
        let sealed = match mode {
            EncryptionMode::Fast => crypto::seal_fast(&channel.key, &payload),
            _ => match crypto::seal_strong(&channel.key, &payload) {
                Ok(sealed) => sealed,
                Err(_) => return status_only(StatusWord::ErrorProcessingCommand),
            },
        };
        ResponseApdu::new(sealed, status).to_bytes()
    }
}

const fn needs_passcode(instruction: Instruction) -> bool {
    matches!(
        instruction,
        Instruction::Sign
            | Instruction::CreateWallet
            | Instruction::PurgeWallet
            | Instruction::SetUserCode
            | Instruction::WriteFileData
    )
}

fn status_only(status: StatusWord) -> Bytes {
    ResponseApdu::new(Bytes::new(), status).to_bytes()
}

fn plain_response(tlvs: &[Tlv], status: StatusWord) -> Bytes {
    match Tlv::serialize_list(tlvs) {
        Ok(payload) => ResponseApdu::new(payload, status).to_bytes(),
        Err(_) => status_only(StatusWord::ErrorProcessingCommand),
    }
}
