//! Channel negotiation and mode escalation.

use std::sync::Arc;

use tapcard_harness::{RecordingDelegate, SimTransceiver, TokenSim};
use tapcard_protocol::{
    EncryptionMode, ProtocolError, ScanTask, Session, SessionConfig, SessionState,
};

#[test]
fn test_configured_mode_negotiates_once_and_talks_sealed() {
    for mode in [EncryptionMode::Fast, EncryptionMode::Strong] {
        let delegate = Arc::new(RecordingDelegate::new());
        let (transceiver, tag) =
            SimTransceiver::new(TokenSim::new().with_minimum_mode(mode).with_wallet());
        let config = SessionConfig::new().with_encryption(mode);
        let mut session = Session::new(transceiver, delegate, config);

        let card = session.run(&ScanTask::new()).unwrap();

        assert_eq!(card.card_id, "CB42000000001122", "mode {mode}");
        assert_eq!(card.wallets.len(), 1, "mode {mode}");
        assert_eq!(tag.card().open_session_count(), 1, "mode {mode}");
    }
}

#[test]
fn test_card_escalates_the_session_to_the_mode_it_demands() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) =
        SimTransceiver::new(TokenSim::new().with_minimum_mode(EncryptionMode::Strong));
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let card = session.run(&ScanTask::new()).unwrap();

    assert_eq!(card.card_id, "CB42000000001122");
    // plaintext refused, fast refused, strong accepted
    assert_eq!(tag.card().open_session_count(), 2);
}

#[test]
fn test_a_card_never_satisfied_is_terminal() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) =
        SimTransceiver::new(TokenSim::new().with_unsatisfiable_encryption());
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let error = session.run(&ScanTask::new()).unwrap_err();

    assert_eq!(error, ProtocolError::NeedEncryption);
    assert_eq!(error.code(), 2006);
    assert_eq!(session.state(), SessionState::Stopped);
    assert_eq!(delegate.error_codes(), vec![2006]);
    // both encrypted modes were tried before giving up
    assert_eq!(tag.card().open_session_count(), 2);
}
