//! Wallet creation.

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::CardCommand,
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::{Card, CardStatus, EllipticCurve, Wallet},
};

/// Create a wallet key pair in the card's next free slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateWalletCommand {
    curve: EllipticCurve,
}

impl CreateWalletCommand {
    /// Create a wallet on `curve`.
    pub const fn new(curve: EllipticCurve) -> Self {
        Self { curve }
    }
}

impl CardCommand for CreateWalletCommand {
    type Output = Wallet;

    fn instruction(&self) -> Instruction {
        Instruction::CreateWallet
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        if card.firmware.supports_wallet_list()
            && card.wallets.len() >= usize::from(card.settings.max_wallets)
        {
            return Err(ProtocolError::MaxNumberOfWalletsCreated);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::CreateWallet,
            &[
                Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
                Tlv::new(TlvTag::Pin2, environment.passcode.hash().to_vec()),
                Tlv::new(TlvTag::CurveId, vec![self.curve.to_byte()]),
            ],
        )?)
    }

    fn deserialize(
        &self,
        environment: &mut SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Wallet> {
        let map = response.tlvs()?;
        let wallet = Wallet {
            index: map.required_byte(TlvTag::WalletIndex)?,
            curve: self.curve,
            public_key: crate::types::parse_public_key(
                map.required(TlvTag::WalletPublicKey)?,
            )?,
        };
        if let Some(card) = environment.card.as_mut() {
            card.wallets.push(wallet.clone());
            card.status = CardStatus::Loaded;
        }
        Ok(wallet)
    }

    fn map_error(&self, _card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        match error {
            ProtocolError::InvalidParams => ProtocolError::WrongPasscode,
            // The card only rejects the state when every slot is taken.
            ProtocolError::InvalidState => ProtocolError::MaxNumberOfWalletsCreated,
            other => other,
        }
    }
}
