//! Preflight: what runs between tag arrival and the session's task.
//!
//! Reads the card snapshot, enforces the expected card id and acceptance
//! filter, and enumerates wallets on firmware that can. A mismatching card
//! id grants exactly one chance to present a different card.

use tracing::debug;

use crate::{
    command::PreflightMode,
    commands::{ReadCommand, ReadWalletsCommand},
    environment::{UserCode, UserCodeType},
    error::{ProtocolError, Result},
    executor,
    session::Session,
};

pub(crate) fn run(session: &mut Session, mode: PreflightMode) -> Result<()> {
    if mode == PreflightMode::None {
        return Ok(());
    }
    let span = tracing::debug_span!("preflight");
    let _entered = span.enter();

    seed_access_code(session);

    let mut represented = false;
    loop {
        let card = executor::execute(&ReadCommand::new(), session)?;

        if let Some(expected) = session.config().expected_card_id.as_deref() {
            if !card.card_id.eq_ignore_ascii_case(expected) {
                if represented {
                    return Err(ProtocolError::WrongCardNumber);
                }
                debug!(present = %card.card_id, %expected, "unexpected card, allowing one more tap");
                represented = true;
                session.delegate().on_wrong_card();
                session.await_replacement_tag()?;
                continue;
            }
        }

        if let Some(filter) = session.config().filter.as_ref() {
            if !filter(&card) {
                return Err(ProtocolError::WrongCardType);
            }
        }

        if mode == PreflightMode::FullCard && card.firmware.supports_wallet_list() {
            executor::execute(&ReadWalletsCommand::new(), session)?;
        }
        return Ok(());
    }
}

/// Install a stored access code for the expected card before the first
/// read, so a personalized card is readable without prompting.
fn seed_access_code(session: &mut Session) {
    if !session.environment().access_code.is_default() {
        return;
    }
    let Some(expected) = session.config().expected_card_id.clone() else {
        return;
    };
    let Some(repository) = session.config().repository.clone() else {
        return;
    };
    let Some(hash) = repository.fetch(&expected, UserCodeType::AccessCode) else {
        return;
    };
    debug!("seeding stored access code for the expected card");
    session.mark_repository_code_tried(UserCodeType::AccessCode);
    session
        .environment_mut()
        .set_code(UserCode::stored(UserCodeType::AccessCode, hash));
}
