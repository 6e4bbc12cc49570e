//! Wallet enumeration.

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::{CardCommand, PreflightMode},
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::{Card, Wallet},
};

/// List every wallet the card holds.
///
/// Firmware older than the wallet-list cutoff answers this with an unknown
/// instruction, so the precheck refuses it up front.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadWalletsCommand;

impl ReadWalletsCommand {
    /// Build the command.
    pub const fn new() -> Self {
        Self
    }
}

impl CardCommand for ReadWalletsCommand {
    type Output = Vec<Wallet>;

    fn instruction(&self) -> Instruction {
        Instruction::ReadWallets
    }

    fn preflight(&self) -> PreflightMode {
        PreflightMode::ReadCardOnly
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        if !card.firmware.supports_wallet_list() {
            return Err(ProtocolError::FirmwareNotSupported);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::ReadWallets,
            &[Tlv::new(
                TlvTag::Pin,
                environment.access_code.hash().to_vec(),
            )],
        )?)
    }

    fn deserialize(
        &self,
        environment: &mut SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Vec<Wallet>> {
        let map = response.tlvs()?;
        let wallets = map
            .all(TlvTag::WalletRecord)
            .map(Wallet::from_record)
            .collect::<Result<Vec<_>>>()?;
        if let Some(card) = environment.card.as_mut() {
            card.wallets = wallets.clone();
        }
        Ok(wallets)
    }
}

#[cfg(test)]
mod tests {
    use tapcard_apdu::StatusWord;

    use super::*;
    use crate::{
        secure_channel::EncryptionMode,
        types::{EllipticCurve, FirmwareVersion},
    };

    fn wallet_record(index: u8) -> Tlv {
        let generator =
            hex::decode("0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798")
                .unwrap();
        let nested = Tlv::serialize_list(&[
            Tlv::new(TlvTag::WalletIndex, vec![index]),
            Tlv::new(TlvTag::CurveId, vec![EllipticCurve::Secp256k1.to_byte()]),
            Tlv::new(TlvTag::WalletPublicKey, generator),
        ])
        .unwrap();
        Tlv::new(TlvTag::WalletRecord, nested)
    }

    #[test]
    fn test_deserialize_collects_every_record() {
        let mut environment = SessionEnvironment::new(EncryptionMode::None);
        let payload =
            Tlv::serialize_list(&[wallet_record(0), wallet_record(3), wallet_record(7)]).unwrap();
        let response = ResponseApdu::new(payload, StatusWord::ProcessCompleted);

        let wallets = ReadWalletsCommand::new()
            .deserialize(&mut environment, &response)
            .unwrap();

        let indices: Vec<u8> = wallets.iter().map(|wallet| wallet.index).collect();
        assert_eq!(indices, vec![0, 3, 7]);
    }

    #[test]
    fn test_empty_card_yields_no_wallets() {
        let mut environment = SessionEnvironment::new(EncryptionMode::None);
        let response = ResponseApdu::new(Vec::new(), StatusWord::ProcessCompleted);

        let wallets = ReadWalletsCommand::new()
            .deserialize(&mut environment, &response)
            .unwrap();
        assert!(wallets.is_empty());
    }

    #[test]
    fn test_precheck_refuses_old_firmware() {
        let mut card = crate::types::test_card();
        card.firmware = FirmwareVersion::new(3, 9);
        assert_eq!(
            ReadWalletsCommand::new().precheck(&card),
            Err(ProtocolError::FirmwareNotSupported)
        );
    }
}
