//! Wallet deletion.

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::CardCommand,
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::{Card, CardStatus, SettingsFlag},
};

/// Destroy the wallet key pair in one slot.
#[derive(Debug, Clone, Copy)]
pub struct PurgeWalletCommand {
    wallet_index: u8,
}

impl PurgeWalletCommand {
    /// Purge the wallet in slot `wallet_index`.
    pub const fn new(wallet_index: u8) -> Self {
        Self { wallet_index }
    }
}

impl CardCommand for PurgeWalletCommand {
    type Output = ();

    fn instruction(&self) -> Instruction {
        Instruction::PurgeWallet
    }

    fn requires_passcode(&self) -> bool {
        true
    }

    fn precheck(&self, card: &Card) -> Result<()> {
        if card.settings.mask.contains(SettingsFlag::ProhibitPurgeWallet) {
            return Err(ProtocolError::InvalidState);
        }
        if card.firmware.supports_wallet_list() && card.wallet(self.wallet_index).is_none() {
            return Err(ProtocolError::WalletNotFound);
        }
        Ok(())
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::PurgeWallet,
            &[
                Tlv::new(TlvTag::Pin, environment.access_code.hash().to_vec()),
                Tlv::new(TlvTag::Pin2, environment.passcode.hash().to_vec()),
                Tlv::new(TlvTag::WalletIndex, vec![self.wallet_index]),
            ],
        )?)
    }

    fn deserialize(
        &self,
        environment: &mut SessionEnvironment,
        _response: &ResponseApdu,
    ) -> Result<()> {
        if let Some(card) = environment.card.as_mut() {
            card.wallets.retain(|wallet| wallet.index != self.wallet_index);
            if card.wallets.is_empty() {
                card.status = CardStatus::Empty;
            }
        }
        Ok(())
    }

    fn map_error(&self, _card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        match error {
            ProtocolError::InvalidParams => ProtocolError::WrongPasscode,
            other => other,
        }
    }
}
