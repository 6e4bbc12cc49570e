//! Cryptographic primitives for the tapcard secure channel.
//!
//! Key material flows in three steps. A user code is normalized (NFKD) and
//! hashed once with SHA-256. The code hash is stretched into a protocol key
//! with PBKDF2-HMAC-SHA256 salted by the card's unique die id. Per tap, an
//! ephemeral ECDH agreement over secp256k1 is hashed together with the
//! protocol key into the session key, so the key binds possession of the
//! card, knowledge of the code and the current radio session at once.

use aes::Aes256;
use bytes::{Bytes, BytesMut};
use cbc::{Decryptor, Encryptor};
use ccm::{
    Ccm,
    aead::{Aead, KeyInit},
};
use cipher::{
    BlockDecryptMut, BlockEncryptMut, Iv, IvSizeUser, Key, KeyIvInit, KeySizeUser,
    block_padding::Iso7816,
};
use generic_array::{
    GenericArray,
    typenum::{U12, U16, U32},
};
use k256::{PublicKey, SecretKey, ecdh::SharedSecret, elliptic_curve::ecdh::diffie_hellman};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;
use zeroize::Zeroize;

use crate::{
    constants::PROTOCOL_KEY_ITERATIONS,
    error::{ProtocolError, Result},
};

/// Marker type fixing key and IV sizes for the session ciphers.
#[derive(Debug, Clone, Copy)]
pub struct SessionScp;

impl KeySizeUser for SessionScp {
    type KeySize = U32;
}

impl IvSizeUser for SessionScp {
    type IvSize = U16;
}

/// AES-256-CCM with a 16-byte tag and a 12-byte nonce, used by strong mode.
type StrongCipher = Ccm<Aes256, U16, U12>;

/// Nonce length of a strong-mode frame.
pub const STRONG_NONCE_LEN: usize = 12;

/// Authentication tag length of a strong-mode frame.
pub const STRONG_TAG_LEN: usize = 16;

/// Block and IV length of a fast-mode frame.
pub const FAST_BLOCK_LEN: usize = 16;

/// Symmetric key protecting one negotiated channel.
///
/// Wiped on drop. A new one is derived on every channel negotiation.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SessionKey(Key<SessionScp>);

impl SessionKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(Key::<SessionScp>::from(bytes))
    }

    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_slice()
    }

    fn as_key(&self) -> &Key<SessionScp> {
        &self.0
    }
}

impl std::fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

impl PartialEq for SessionKey {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for SessionKey {}

/// Hash a user code: NFKD normalization, then a single SHA-256.
pub fn hash_user_code(code: &str) -> [u8; 32] {
    let normalized: String = code.nfkd().collect();
    Sha256::digest(normalized.as_bytes()).into()
}

/// Stretch a code hash into the protocol key, salted by the card uid.
pub fn derive_protocol_key(code_hash: &[u8; 32], uid: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(code_hash, uid, PROTOCOL_KEY_ITERATIONS, &mut key);
    key
}

/// Perform the ECDH agreement between an ephemeral secret and a peer key.
pub fn generate_ecdh_shared_secret(private: &SecretKey, public: &PublicKey) -> SharedSecret {
    diffie_hellman(private.to_nonzero_scalar(), public.as_affine())
}

/// Derive the session key: SHA-256 over the ECDH x-coordinate followed by
/// the protocol key.
pub fn derive_session_key(secret: &SharedSecret, protocol_key: &[u8; 32]) -> SessionKey {
    let mut hasher = Sha256::new();
    hasher.update(secret.raw_secret_bytes());
    hasher.update(protocol_key);
    SessionKey(hasher.finalize())
}

/// Pad in place and report the unpadded length.
///
/// Padding is applied unconditionally, so an aligned payload grows by a
/// whole block. The card strips it the same way.
fn prepare_padding(data: &mut BytesMut) -> usize {
    let unpadded_len = data.len();
    let padding_len = FAST_BLOCK_LEN - (data.len() % FAST_BLOCK_LEN);
    data.resize(unpadded_len + padding_len, 0);
    unpadded_len
}

fn cbc_encrypt(key: &Key<SessionScp>, iv: &Iv<SessionScp>, data: &mut BytesMut) -> Bytes {
    let encryptor = Encryptor::<Aes256>::new(key, iv);
    let unpadded_len = prepare_padding(data);
    // Cannot fail: prepare_padding sized the buffer for a full final block.
    let ciphertext = encryptor
        .encrypt_padded_mut::<Iso7816>(data, unpadded_len)
        .unwrap();
    Bytes::copy_from_slice(ciphertext)
}

fn cbc_decrypt(key: &Key<SessionScp>, iv: &Iv<SessionScp>, data: &mut BytesMut) -> Result<Bytes> {
    let decryptor = Decryptor::<Aes256>::new(key, iv);
    let plaintext = decryptor
        .decrypt_padded_mut::<Iso7816>(data)
        .map_err(|_| ProtocolError::CryptoFailed("invalid cbc padding"))?;
    Ok(Bytes::copy_from_slice(plaintext))
}

/// Encrypt a payload into a fast-mode frame: random IV, then AES-256-CBC
/// ciphertext with ISO 7816 padding.
pub fn seal_fast(key: &SessionKey, plaintext: &[u8]) -> Bytes {
    let mut iv = Iv::<SessionScp>::default();
    rand::rng().fill_bytes(iv.as_mut_slice());

    let mut buffer = BytesMut::from(plaintext);
    let ciphertext = cbc_encrypt(key.as_key(), &iv, &mut buffer);

    let mut frame = BytesMut::with_capacity(iv.len() + ciphertext.len());
    frame.extend_from_slice(&iv);
    frame.extend_from_slice(&ciphertext);
    frame.freeze()
}

/// Decrypt a fast-mode frame produced by [`seal_fast`].
pub fn open_fast(key: &SessionKey, frame: &[u8]) -> Result<Bytes> {
    if frame.len() < 2 * FAST_BLOCK_LEN || (frame.len() - FAST_BLOCK_LEN) % FAST_BLOCK_LEN != 0 {
        return Err(ProtocolError::CryptoFailed("truncated cbc frame"));
    }
    let (iv, ciphertext) = frame.split_at(FAST_BLOCK_LEN);
    let mut buffer = BytesMut::from(ciphertext);
    cbc_decrypt(key.as_key(), Iv::<SessionScp>::from_slice(iv), &mut buffer)
}

/// Encrypt a payload into a strong-mode frame: random nonce, then
/// AES-256-CCM ciphertext with the authentication tag appended.
pub fn seal_strong(key: &SessionKey, plaintext: &[u8]) -> Result<Bytes> {
    let cipher = StrongCipher::new(key.as_key());
    let mut nonce = [0u8; STRONG_NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = cipher
        .encrypt(GenericArray::from_slice(&nonce), plaintext)
        .map_err(|_| ProtocolError::CryptoFailed("ccm encryption"))?;

    let mut frame = BytesMut::with_capacity(STRONG_NONCE_LEN + ciphertext.len());
    frame.extend_from_slice(&nonce);
    frame.extend_from_slice(&ciphertext);
    Ok(frame.freeze())
}

/// Decrypt and authenticate a strong-mode frame produced by [`seal_strong`].
pub fn open_strong(key: &SessionKey, frame: &[u8]) -> Result<Bytes> {
    if frame.len() < STRONG_NONCE_LEN + STRONG_TAG_LEN {
        return Err(ProtocolError::CryptoFailed("truncated ccm frame"));
    }
    let (nonce, ciphertext) = frame.split_at(STRONG_NONCE_LEN);
    let cipher = StrongCipher::new(key.as_key());
    let plaintext = cipher
        .decrypt(GenericArray::from_slice(nonce), ciphertext)
        .map_err(|_| ProtocolError::CryptoFailed("ccm authentication"))?;
    Ok(Bytes::from(plaintext))
}
