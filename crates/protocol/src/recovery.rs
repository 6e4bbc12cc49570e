//! User code recovery.
//!
//! When the card rejects a code, the session pauses the radio, obtains a
//! replacement and retries. A configured repository is consulted once per
//! code before the user is bothered.

use tracing::debug;

use crate::{
    delegate::UserCodeReply,
    environment::{CodeOrigin, UserCode, UserCodeType},
    error::{ProtocolError, Result},
    session::Session,
};

/// Handle a credential rejection by obtaining a replacement code.
pub(crate) fn recover(session: &mut Session, error: &ProtocolError) -> Result<()> {
    let code_type = match error {
        ProtocolError::AccessCodeRequired | ProtocolError::WrongAccessCode => {
            UserCodeType::AccessCode
        }
        ProtocolError::PasscodeRequired | ProtocolError::WrongPasscode => UserCodeType::Passcode,
        _ => return Err(error.clone()),
    };

    // A code the user entered bounced; later prompts must say so.
    if session.environment().code(code_type).origin() == CodeOrigin::Entered {
        session.mark_entered_code_rejected(code_type);
    }

    request_code(session, code_type)
}

/// Obtain a code of `code_type`: repository first, then the user.
pub(crate) fn request_code(session: &mut Session, code_type: UserCodeType) -> Result<()> {
    if try_repository(session, code_type) {
        return Ok(());
    }

    let is_first_attempt = !session.entered_code_rejected(code_type);
    session.pause();
    let reply = session
        .delegate()
        .request_user_code(code_type, is_first_attempt);
    session.resume();

    match reply {
        UserCodeReply::Code(code) => {
            session
                .environment_mut()
                .set_code(UserCode::entered(code_type, &code));
            Ok(())
        }
        UserCodeReply::Forgot => reset_code(session, code_type),
        UserCodeReply::Cancelled => Err(ProtocolError::UserCancelled),
    }
}

/// Install a stored code if the repository knows one for this card.
fn try_repository(session: &mut Session, code_type: UserCodeType) -> bool {
    if session.repository_code_tried(code_type) {
        return false;
    }
    if !session.environment().code(code_type).is_default() {
        return false;
    }
    let Some(card_id) = session
        .environment()
        .card
        .as_ref()
        .map(|card| card.card_id.clone())
    else {
        return false;
    };
    let Some(repository) = session.config().repository.clone() else {
        return false;
    };

    session.mark_repository_code_tried(code_type);
    let Some(hash) = repository.fetch(&card_id, code_type) else {
        return false;
    };
    debug!(%code_type, "using stored code");
    session
        .environment_mut()
        .set_code(UserCode::stored(code_type, hash));
    true
}

/// Drive the configured reset hook for a forgotten code.
fn reset_code(session: &mut Session, code_type: UserCodeType) -> Result<()> {
    let code = {
        let Some(reset) = session.config().code_reset.as_ref() else {
            debug!(%code_type, "code forgotten and no reset hook configured");
            return Err(ProtocolError::UserCancelled);
        };
        reset(code_type)?
    };
    session
        .environment_mut()
        .set_code(UserCode::entered(code_type, &code));
    Ok(())
}
