//! Channel negotiation exchange.
//!
//! Not a [`CardCommand`](crate::command::CardCommand): the session drives
//! it directly whenever an encrypted mode holds no key, and the exchange
//! itself always travels in plaintext.

use k256::SecretKey;
use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    crypto::{self, SessionKey},
    error::Result,
    secure_channel::EncryptionMode,
    types::parse_public_key,
};

/// Build the negotiation request carrying the host's ephemeral public key.
///
/// `p2` names the mode being negotiated so the card binds the key to it.
pub(crate) fn request(
    host_public: &k256::PublicKey,
    mode: EncryptionMode,
) -> Result<CommandApdu> {
    let apdu = CommandApdu::with_tlvs(
        Instruction::OpenSession,
        &[Tlv::new(
            TlvTag::SessionKeyA,
            host_public.to_sec1_bytes().to_vec(),
        )],
    )?;
    Ok(apdu.with_p2(mode.to_byte()))
}

/// Derive the channel key from the card's half of the negotiation.
pub(crate) fn complete(
    host_secret: &SecretKey,
    access_code_hash: &[u8; 32],
    response: &ResponseApdu,
) -> Result<SessionKey> {
    let map = response.tlvs()?;
    let card_public = parse_public_key(map.required(TlvTag::SessionKeyB)?)?;
    let uid = map.required_bytes(TlvTag::Uid)?;

    let protocol_key = crypto::derive_protocol_key(access_code_hash, &uid);
    let secret = crypto::generate_ecdh_shared_secret(host_secret, &card_public);
    Ok(crypto::derive_session_key(&secret, &protocol_key))
}

#[cfg(test)]
mod tests {
    use tapcard_apdu::StatusWord;

    use super::*;
    use crate::crypto::hash_user_code;

    #[test]
    fn test_request_frame() {
        let host_secret = SecretKey::random(&mut rand_v8::thread_rng());
        let apdu = request(&host_secret.public_key(), EncryptionMode::Strong).unwrap();

        assert_eq!(apdu.instruction, Instruction::OpenSession);
        assert_eq!(apdu.p2, 0x02);
        let map = tapcard_apdu::TlvMap::parse(&apdu.payload).unwrap();
        assert_eq!(
            map.required(TlvTag::SessionKeyA).unwrap().len(),
            33,
            "host key travels compressed"
        );
    }

    #[test]
    fn test_both_ends_derive_the_same_key() {
        let host_secret = SecretKey::random(&mut rand_v8::thread_rng());
        let card_secret = SecretKey::random(&mut rand_v8::thread_rng());
        let uid = hex::decode("5a1b2c3d4e5f60718293a4b5").unwrap();
        let code_hash = hash_user_code("meadow");

        // card side
        let protocol_key = crypto::derive_protocol_key(&code_hash, &uid);
        let secret =
            crypto::generate_ecdh_shared_secret(&card_secret, &host_secret.public_key());
        let card_key = crypto::derive_session_key(&secret, &protocol_key);

        let payload = Tlv::serialize_list(&[
            Tlv::new(
                TlvTag::SessionKeyB,
                card_secret.public_key().to_sec1_bytes().to_vec(),
            ),
            Tlv::new(TlvTag::Uid, uid),
        ])
        .unwrap();
        let response = ResponseApdu::new(payload, StatusWord::ProcessCompleted);

        let host_key = complete(&host_secret, &code_hash, &response).unwrap();
        assert_eq!(host_key, card_key);
    }

    #[test]
    fn test_complete_requires_card_key_and_uid() {
        let host_secret = SecretKey::random(&mut rand_v8::thread_rng());
        let payload = Tlv::serialize_list(&[Tlv::new(
            TlvTag::Uid,
            hex::decode("5a1b2c3d4e5f60718293a4b5").unwrap(),
        )])
        .unwrap();
        let response = ResponseApdu::new(payload, StatusWord::ProcessCompleted);

        assert!(complete(&host_secret, &hash_user_code("000000"), &response).is_err());
    }
}
