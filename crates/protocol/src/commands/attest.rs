//! Card key attestation.

use bytes::Bytes;
use k256::ecdsa::{Signature, VerifyingKey, signature::Verifier};
use rand::RngCore;
use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::{CardCommand, PreflightMode},
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
};

/// Proof that the card holds the private half of its published key.
#[derive(Debug, Clone, PartialEq)]
pub struct Attestation {
    /// Card signature over challenge and salt.
    pub signature: Signature,
    /// Salt the card mixed into the signed message.
    pub salt: Bytes,
}

/// Challenge the card to sign with its identity key.
///
/// The card signs the host challenge concatenated with a salt of its own,
/// so neither side fully controls the signed message. Verification happens
/// right here in `deserialize`; a forged card fails the command rather
/// than returning a bad proof.
#[derive(Debug, Clone, Copy)]
pub struct AttestCardKeyCommand {
    challenge: [u8; 32],
}

impl AttestCardKeyCommand {
    /// Attest with a caller-chosen challenge.
    pub const fn new(challenge: [u8; 32]) -> Self {
        Self { challenge }
    }

    /// Attest with a fresh random challenge.
    pub fn new_random() -> Self {
        let mut challenge = [0u8; 32];
        rand::rng().fill_bytes(&mut challenge);
        Self::new(challenge)
    }
}

impl CardCommand for AttestCardKeyCommand {
    type Output = Attestation;

    fn instruction(&self) -> Instruction {
        Instruction::AttestCardKey
    }

    fn preflight(&self) -> PreflightMode {
        PreflightMode::ReadCardOnly
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::AttestCardKey,
            &[
                Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
                Tlv::new(TlvTag::Challenge, self.challenge.to_vec()),
            ],
        )?)
    }

    fn deserialize(
        &self,
        environment: &mut SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Attestation> {
        let map = response.tlvs()?;
        let salt = map.required_bytes(TlvTag::Salt)?;
        let signature = Signature::from_slice(map.required(TlvTag::CardSignature)?)
            .map_err(|_| ProtocolError::CryptoFailed("malformed signature"))?;

        let mut message = Vec::with_capacity(self.challenge.len() + salt.len());
        message.extend_from_slice(&self.challenge);
        message.extend_from_slice(&salt);

        let card = environment.card()?;
        VerifyingKey::from(&card.public_key)
            .verify(&message, &signature)
            .map_err(|_| ProtocolError::CryptoFailed("card key attestation"))?;

        Ok(Attestation { signature, salt })
    }
}
