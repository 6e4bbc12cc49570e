//! The contract every card operation implements.

use tapcard_apdu::{CommandApdu, Instruction, ResponseApdu};

use crate::{
    environment::SessionEnvironment,
    error::{ProtocolError, Result},
    types::Card,
};

/// How much preflight a command needs when it starts a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightMode {
    /// None; the command runs against an unknown card.
    None,
    /// Read the card snapshot only.
    ReadCardOnly,
    /// Read the card and enumerate wallets where firmware allows.
    FullCard,
}

/// One card operation: how to build its request, decode its response and
/// shape its errors.
///
/// The engine owns the conversation. Implementations stay pure apart from
/// the environment updates done in [`deserialize`](Self::deserialize), so
/// retries can rebuild the request from fresh state at any time.
pub trait CardCommand {
    /// What a successful run yields.
    type Output;

    /// Instruction code of the request.
    fn instruction(&self) -> Instruction;

    /// Preflight this command needs.
    fn preflight(&self) -> PreflightMode {
        PreflightMode::FullCard
    }

    /// Whether the request carries the passcode.
    fn requires_passcode(&self) -> bool {
        false
    }

    /// Validate against the card snapshot before anything hits the wire.
    fn precheck(&self, card: &Card) -> Result<()> {
        let _ = card;
        Ok(())
    }

    /// Build the logical APDU from the environment.
    fn serialize(&self, environment: &SessionEnvironment) -> Result<CommandApdu>;

    /// Decode a successful response, updating the environment as needed.
    fn deserialize(
        &self,
        environment: &mut SessionEnvironment,
        response: &ResponseApdu,
    ) -> Result<Self::Output>;

    /// Refine an error with card knowledge, for example mapping a blanket
    /// parameter rejection to the code that actually caused it.
    fn map_error(&self, card: Option<&Card>, error: ProtocolError) -> ProtocolError {
        let _ = card;
        error
    }
}
