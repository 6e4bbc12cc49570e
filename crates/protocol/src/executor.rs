//! The command execution engine.
//!
//! One command runs as: precheck, serialize, send, classify. `NeedPause`
//! re-sends the identical frame after notifying the observer, because the
//! card is only stalling through its security delay. `NeedEncryption`
//! escalates the channel one mode and rebuilds the frame. A credential
//! rejection runs recovery and rebuilds. Everything else is final.

use tracing::{debug, trace};

use tapcard_apdu::StatusWord;

use crate::{
    command::{CardCommand, PreflightMode},
    environment::UserCodeType,
    error::{ProtocolError, Result},
    recovery,
    session::Session,
};

pub(crate) fn execute<C: CardCommand>(command: &C, session: &mut Session) -> Result<C::Output> {
    let span = tracing::debug_span!("command", instruction = %command.instruction());
    let _entered = span.enter();

    if command.preflight() != PreflightMode::None && session.environment().card.is_none() {
        return Err(ProtocolError::MissingPreflightRead);
    }
    if let Some(card) = session.environment().card.as_ref() {
        command.precheck(card)?;
    }
    if command.requires_passcode() && session.should_collect_passcode() {
        recovery::request_code(session, UserCodeType::Passcode)?;
    }

    'rebuild: loop {
        let apdu = command.serialize(session.environment())?;
        loop {
            let response = session.send(&apdu)?;
            match response.status {
                status if status.is_success() => {
                    trace!(%status, "command finished");
                    return command.deserialize(session.environment_mut(), &response);
                }
                StatusWord::NeedPause => {
                    session.handle_security_delay(&response);
                    // identical frame goes out again
                }
                StatusWord::NeedEncryption => {
                    session.escalate_encryption()?;
                    continue 'rebuild;
                }
                status => {
                    let error = command.map_error(
                        session.environment().card.as_ref(),
                        ProtocolError::from_status(status),
                    );
                    if error.is_credential() {
                        debug!(%status, code = error.code(), "credential rejected, recovering");
                        recovery::recover(session, &error)?;
                        continue 'rebuild;
                    }
                    return Err(error);
                }
            }
        }
    }
}
