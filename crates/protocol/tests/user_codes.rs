//! Changing user codes, and what a change does to a live secure channel.

use std::sync::Arc;

use tapcard_apdu::Bytes;
use tapcard_harness::{MemoryRepository, RecordingDelegate, SimTransceiver, TokenSim};
use tapcard_protocol::{
    EncryptionMode, ProtocolError, Session, SessionConfig, SessionRunnable, SetUserCodeCommand,
    SignCommand, UserCodeReply, UserCodeType, WriteFileCommand, hash_user_code,
};

/// Replaces both codes, then writes a file to prove the channel recovers.
struct RotateCodes;

impl SessionRunnable for RotateCodes {
    type Output = ();

    fn run(&self, session: &mut Session) -> Result<(), ProtocolError> {
        SetUserCodeCommand::both("lake", "999999").run(session)?;
        WriteFileCommand::new(0, Bytes::from_static(b"after rotation")).run(session)
    }
}

#[test]
fn test_changing_the_access_code_renegotiates_the_channel() {
    let repository = Arc::new(MemoryRepository::new());
    repository.seed("CB42000000001122", UserCodeType::AccessCode, "meadow");
    repository.seed("CB42000000001122", UserCodeType::Passcode, "454545");

    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(
        TokenSim::new()
            .with_access_code("meadow")
            .with_passcode("454545"),
    );
    let config = SessionConfig::new()
        .with_encryption(EncryptionMode::Fast)
        .with_expected_card_id("CB42000000001122")
        .with_repository(repository.clone(), true);
    let mut session = Session::new(transceiver, delegate.clone(), config);

    session.run(&RotateCodes).unwrap();

    // the stored codes covered everything
    assert!(delegate.code_requests().is_empty());
    // one channel for the old access code, one for the new
    assert_eq!(tag.card().open_session_count(), 2);
    assert_eq!(tag.card().access_code_hash(), &hash_user_code("lake"));
    assert_eq!(
        tag.card().file(0).cloned(),
        Some(Bytes::from_static(b"after rotation"))
    );
    // success persisted the replacements, not the seeds
    assert_eq!(
        repository.stored("CB42000000001122", UserCodeType::AccessCode),
        Some(hash_user_code("lake"))
    );
    assert_eq!(
        repository.stored("CB42000000001122", UserCodeType::Passcode),
        Some(hash_user_code("999999"))
    );

    let card = session.environment().card.as_ref().unwrap();
    assert!(card.is_access_code_set);
    assert_eq!(card.is_passcode_set, Some(true));
}

#[test]
fn test_settings_can_forbid_code_changes() {
    let delegate = Arc::new(RecordingDelegate::new());
    // only AllowFiles: neither code may change
    let (transceiver, _tag) =
        SimTransceiver::new(TokenSim::new().with_settings_bits(0x0000_0008));
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let error = session
        .run(&SetUserCodeCommand::access_code("lake"))
        .unwrap_err();
    assert_eq!(error, ProtocolError::AccessCodeCannotBeChanged);
}

#[test]
fn test_a_wrong_passcode_is_reprompted_as_a_retry() {
    let delegate = Arc::new(RecordingDelegate::new());
    delegate.push_reply(UserCodeReply::Code("111111".into()));
    delegate.push_reply(UserCodeReply::Code("454545".into()));
    let (transceiver, _tag) =
        SimTransceiver::new(TokenSim::new().with_passcode("454545").with_wallet());
    let mut session = Session::new(transceiver, delegate.clone(), SessionConfig::new());

    let signatures = session
        .run(&SignCommand::new(0, vec![[0x77; 32]]))
        .unwrap();

    assert_eq!(signatures.len(), 1);
    assert_eq!(
        delegate.code_requests(),
        vec![(UserCodeType::Passcode, true), (UserCodeType::Passcode, false)]
    );
}
