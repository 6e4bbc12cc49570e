//! Tag loss mid-session: the session waits for the card to come back and
//! renegotiates the channel before carrying on.

use std::sync::Arc;

use tapcard_harness::{DelegateEvent, RecordingDelegate, SimTransceiver, TokenSim};
use tapcard_protocol::{EncryptionMode, ScanTask, Session, SessionConfig};

#[test]
fn test_a_lost_tag_resumes_with_a_fresh_channel() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new());
    // bounce the tag during the first sealed command, after negotiation
    tag.drop_after_exchanges(3);
    tag.reconnect_after_drop(true);
    let config = SessionConfig::new().with_encryption(EncryptionMode::Fast);
    let mut session = Session::new(transceiver, delegate.clone(), config);

    let card = session.run(&ScanTask::new()).unwrap();

    assert_eq!(card.card_id, tag.card().card_id_hex());
    // the old session key died with the field; a second negotiation ran
    assert_eq!(tag.card().open_session_count(), 2);

    let events = delegate.events();
    let lost = events
        .iter()
        .filter(|event| **event == DelegateEvent::TagLost)
        .count();
    let connected = events
        .iter()
        .filter(|event| **event == DelegateEvent::TagConnected)
        .count();
    assert_eq!(lost, 1);
    assert_eq!(connected, 2);
}

#[test]
fn test_a_tag_lost_during_negotiation_is_retried() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new());
    // the negotiation frame itself never reaches the card
    tag.drop_after_exchanges(2);
    tag.reconnect_after_drop(true);
    let config = SessionConfig::new().with_encryption(EncryptionMode::Fast);
    let mut session = Session::new(transceiver, delegate.clone(), config);

    session.run(&ScanTask::new()).unwrap();

    assert_eq!(tag.card().open_session_count(), 1);
    assert_eq!(
        delegate
            .events()
            .iter()
            .filter(|event| **event == DelegateEvent::TagLost)
            .count(),
        1
    );
}

#[test]
fn test_a_tag_lost_during_selection_keeps_waiting() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new());
    // the select frame bounces; the replacement tap goes through
    tag.drop_after_exchanges(1);
    tag.reconnect_after_drop(true);
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let card = session.run(&ScanTask::new()).unwrap();

    assert_eq!(card.card_id, tag.card().card_id_hex());
    // the bounced selection never reported the tag as connected
    assert_eq!(
        delegate
            .events()
            .iter()
            .filter(|event| **event == DelegateEvent::TagConnected)
            .count(),
        1
    );
    assert!(!delegate.events().contains(&DelegateEvent::TagLost));
}
