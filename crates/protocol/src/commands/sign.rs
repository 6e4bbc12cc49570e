//! Digest signing.

use k256::ecdsa::Signature;
use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::CardCommand,
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::Card,
};

/// Sign a batch of 32-byte digests with one wallet key.
#[derive(Debug, Clone)]
pub struct SignCommand {
    wallet_index: u8,
    hashes: Vec<[u8; 32]>,
}

impl SignCommand {
    /// Sign `hashes` with the wallet in slot `wallet_index`.
    pub const fn new(wallet_index: u8, hashes: Vec<[u8; 32]>) -> Self {
        Self {
            wallet_index,
            hashes,
        }
    }
}

impl CardCommand for SignCommand {
    type Output = Vec<Signature>;

    fn instruction(&self) -> Instruction {
        Instruction::Sign
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        if self.hashes.is_empty() {
            return Err(ProtocolError::SerializeFailed(
                "no digests to sign".to_owned(),
            ));
        }
        // Without enumeration the card itself is the only index check.
        if card.firmware.supports_wallet_list() && card.wallet(self.wallet_index).is_none() {
            return Err(ProtocolError::WalletNotFound);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        let mut tlvs = vec![
            Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
            Tlv::new(TlvTag::Pin2, environment.passcode.hash().to_vec()),
            Tlv::new(TlvTag::WalletIndex, vec![self.wallet_index]),
        ];
        for hash in &self.hashes {
            tlvs.push(Tlv::new(TlvTag::TransactionOutHash, hash.to_vec()));
        }
        Ok(CommandApdu::with_tlvs(Instruction::Sign, &tlvs)?)
    }

    fn deserialize(
        &self,
        _environment: &mut SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Vec<Signature>> {
        let map = response.tlvs()?;
        let signatures = map
            .all(TlvTag::Signature)
            .map(|raw| {
                Signature::from_slice(raw)
                    .map_err(|_| ProtocolError::CryptoFailed("malformed signature"))
            })
            .collect::<Result<Vec<_>>>()?;
        if signatures.len() != self.hashes.len() {
            return Err(ProtocolError::DeserializeFailed(format!(
                "{} digests in, {} signatures out",
                self.hashes.len(),
                signatures.len()
            )));
        }
        Ok(signatures)
    }

    fn map_error(&self, _card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        match error {
            ProtocolError::InvalidParams => ProtocolError::WrongPasscode,
            other => other,
        }
    }
}
