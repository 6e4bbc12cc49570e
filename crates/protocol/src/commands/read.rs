//! The preflight read.

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu, Tlv, TlvTag};

use crate::{
    command::{CardCommand, PreflightMode},
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::Card,
};

/// Read the card's full state snapshot.
///
/// This is the one command that runs before any card state is known, so it
/// carries no preflight requirement of its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadCommand;

impl ReadCommand {
    /// Build the command.
    pub const fn new() -> Self {
        Self
    }
}

impl CardCommand for ReadCommand {
    type Output = Card;

    fn instruction(&self) -> Instruction {
        Instruction::Read
    }

    fn preflight(&self) -> PreflightMode {
        PreflightMode::None
    }

    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu> {
        Ok(CommandApdu::with_tlvs(
            Instruction::Read,
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
    ) -> Result<Card> {
        let card = Card::from_tlvs(&response.tlvs()?)?;
        environment.card = Some(card.clone());
        Ok(card)
    }

    fn map_error(&self, _card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        match error {
            // The only parameter this command carries is the access code.
            ProtocolError::InvalidParams => ProtocolError::WrongAccessCode,
            other => other,
        }
    }
}
