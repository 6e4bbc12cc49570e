//! User code recovery: wrong codes, stored codes, forgotten codes.

use std::sync::Arc;

use k256::ecdsa::{VerifyingKey, signature::hazmat::PrehashVerifier};
use tapcard_harness::{
    DelegateEvent, MemoryRepository, RecordingDelegate, SimTransceiver, TokenSim,
};
use tapcard_protocol::{
    ProtocolError, ScanTask, Session, SessionConfig, SignHashesTask, UserCodeReply, UserCodeType,
    hash_user_code,
};

#[test]
fn test_wrong_code_prompts_again_without_first_attempt() {
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Code("garden".into()));
    delegate.push_reply(UserCodeReply::Code("meadow".into()));
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let card = session.run(&ScanTask::new()).unwrap();

    assert!(card.is_access_code_set);
    assert_eq!(
        delegate.code_requests(),
        vec![
            // the default code bounced, not one the user typed
            (UserCodeType::AccessCode, true),
            // now an entered code bounced
            (UserCodeType::AccessCode, false),
        ]
    );
    // the radio pauses for every prompt
    assert_eq!(tag.pause_count(), 2);
    assert_eq!(tag.resume_count(), 2);
}

#[test]
fn test_passcode_collected_before_the_command_needing_it() {
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Code("454545".into()));
    let (transceiver, tag) =
        SimTransceiver::new(TokenSim::new().with_passcode("454545").with_wallet());
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let digest = [0x5A; 32];
    let signatures = session
        .run(&SignHashesTask::new(vec![digest]))
        .unwrap();

    assert_eq!(signatures.len(), 1);
    let wallet_key = tag.card().wallet_public_key(0).unwrap();
    VerifyingKey::from(&wallet_key)
        .verify_prehash(&digest, &signatures[0])
        .unwrap();
    // asked exactly once, before anything hit the wire
    assert_eq!(delegate.code_requests(), vec![(UserCodeType::Passcode, true)]);
}

#[test]
fn test_cancellation_is_silent() {
    let delegate = Arc::new(RecordingDelegate::new());
    // no scripted replies: the prompt answers Cancelled
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let error = session.run(&ScanTask::new()).unwrap_err();

    assert_eq!(error, ProtocolError::UserCancelled);
    assert!(error.is_silent());
    assert!(delegate.error_codes().is_empty(), "silent errors skip on_error");
    assert!(
        delegate
            .events()
            .contains(&DelegateEvent::SessionStopped { message: None }),
        "the stop callback still fires"
    );
}

#[test]
fn test_stored_code_for_the_expected_card_skips_the_prompt() {
    let repository = Arc::new(MemoryRepository::new());
    repository.seed("CB42000000001122", UserCodeType::AccessCode, "meadow");

    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let config = SessionConfig::new()
        .with_expected_card_id("CB42000000001122")
        .with_repository(repository, false);
    let mut session = Session::new(transceiver, delegate.clone(), config);

    let card = session.run(&ScanTask::new()).unwrap();

    assert_eq!(card.card_id, "CB42000000001122");
    assert!(delegate.code_requests().is_empty());
}

#[test]
fn test_stored_passcode_found_by_actual_card_id() {
    let repository = Arc::new(MemoryRepository::new());
    repository.seed("CB42000000001122", UserCodeType::Passcode, "454545");

    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, _tag) =
        SimTransceiver::new(TokenSim::new().with_passcode("454545").with_wallet());
    let config = SessionConfig::new().with_repository(repository, false);
    let mut session = Session::new(transceiver, delegate.clone(), config);

    let signatures = session
        .run(&SignHashesTask::new(vec![[0x11; 32]]))
        .unwrap();

    assert_eq!(signatures.len(), 1);
    assert!(delegate.code_requests().is_empty());
}

#[test]
fn test_entered_codes_persist_only_on_success() {
    let repository = Arc::new(MemoryRepository::new());
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Code("meadow".into()));
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let config = SessionConfig::new().with_repository(repository.clone(), true);
    let mut session = Session::new(transceiver, delegate, config);

    session.run(&ScanTask::new()).unwrap();

    assert_eq!(
        repository.stored("CB42000000001122", UserCodeType::AccessCode),
        Some(hash_user_code("meadow"))
    );
    // the passcode stayed at its default and never persists
    assert_eq!(
        repository.stored("CB42000000001122", UserCodeType::Passcode),
        None
    );
}

#[test]
fn test_nothing_persists_when_the_session_fails() {
    let repository = Arc::new(MemoryRepository::new());
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Code("garden".into()));
    // second prompt finds the script empty and cancels
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let config = SessionConfig::new().with_repository(repository.clone(), true);
    let mut session = Session::new(transceiver, delegate, config);

    assert_eq!(
        session.run(&ScanTask::new()).unwrap_err(),
        ProtocolError::UserCancelled
    );
    assert_eq!(
        repository.stored("CB42000000001122", UserCodeType::AccessCode),
        None
    );
}

#[test]
fn test_forgot_reply_runs_the_reset_hook() {
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Forgot);
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let config =
        SessionConfig::new().with_code_reset(|_code_type| Ok("meadow".to_owned()));
    let mut session = Session::new(transceiver, delegate.clone(), config);

    let card = session.run(&ScanTask::new()).unwrap();

    assert!(card.is_access_code_set);
    assert_eq!(delegate.code_requests().len(), 1);
}

#[test]
fn test_forgot_without_a_hook_cancels() {
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Forgot);
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new().with_access_code("meadow"));
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    assert_eq!(
        session.run(&ScanTask::new()).unwrap_err(),
        ProtocolError::UserCancelled
    );
}
