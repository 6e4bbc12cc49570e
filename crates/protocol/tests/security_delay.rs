//! Security delay handling: the card stalls, the session waits it out.

use std::sync::Arc;

use tapcard_harness::{DelegateEvent, RecordingDelegate, SimTransceiver, TagHandle, TokenSim};
use tapcard_protocol::{
    AttestCardKeyCommand, ProtocolError, ScanTask, Session, SessionConfig, SessionRunnable,
};

#[test]
fn test_polls_run_until_the_card_is_ready() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new());
    tag.card().stall_polls(3);
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let card = session.run(&ScanTask::new()).unwrap();

    assert_eq!(card.card_id, "CB42000000001122");
    assert_eq!(delegate.security_delays(), vec![3000, 2000, 1000]);
    // select, three stalled polls of the read, the read, wallet enumeration
    assert_eq!(tag.exchange_count(), 6);
}

/// Stalls the card after preflight, then runs one attestation.
struct StallThenAttest {
    tag: TagHandle,
}

impl SessionRunnable for StallThenAttest {
    type Output = ();

    fn run(&self, session: &mut Session) -> Result<(), ProtocolError> {
        self.tag.card().stall_polls(1);
        AttestCardKeyCommand::new_random().run(session)?;
        Ok(())
    }
}

#[test]
fn test_delay_total_comes_from_card_settings_once_known() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) =
        SimTransceiver::new(TokenSim::new().with_security_delay_ms(45_000));
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    session.run(&StallThenAttest { tag }).unwrap();

    assert_eq!(
        delegate
            .events()
            .into_iter()
            .find(|event| matches!(event, DelegateEvent::SecurityDelay { .. })),
        Some(DelegateEvent::SecurityDelay {
            remaining_ms: 1000,
            total_secs: 45,
        })
    );
}
