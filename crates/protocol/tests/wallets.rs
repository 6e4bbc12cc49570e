//! Wallet lifecycle: create, sign, purge, and the client-side slot checks.

use std::sync::Arc;

use k256::ecdsa::{Signature, VerifyingKey, signature::hazmat::PrehashVerifier};
use tapcard_apdu::Instruction;
use tapcard_harness::{RecordingDelegate, SimTransceiver, TokenSim};
use tapcard_protocol::{
    CardStatus, CreateWalletCommand, EllipticCurve, ProtocolError, PurgeWalletCommand, Session,
    SessionConfig, SessionRunnable, SignCommand, SignHashesTask, Wallet,
};

/// Creates a wallet, signs one digest with it and purges it again.
struct WalletLifecycle {
    digest: [u8; 32],
}

impl SessionRunnable for WalletLifecycle {
    type Output = (Wallet, Vec<Signature>);

    fn run(&self, session: &mut Session) -> Result<Self::Output, ProtocolError> {
        let wallet = CreateWalletCommand::new(EllipticCurve::Secp256k1).run(session)?;
        let signatures = SignCommand::new(wallet.index, vec![self.digest]).run(session)?;
        PurgeWalletCommand::new(wallet.index).run(session)?;
        Ok((wallet, signatures))
    }
}

#[test]
fn test_create_sign_purge_in_one_tap() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new());
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let digest = [0x42; 32];
    let (wallet, signatures) = session.run(&WalletLifecycle { digest }).unwrap();

    assert_eq!(signatures.len(), 1);
    VerifyingKey::from(&wallet.public_key)
        .verify_prehash(&digest, &signatures[0])
        .unwrap();

    // the purge emptied the card again
    assert_eq!(tag.card().wallet_count(), 0);
    let card = session.environment().card.as_ref().unwrap();
    assert_eq!(card.status, CardStatus::Empty);
    assert!(card.wallets.is_empty());
}

#[test]
fn test_a_full_card_rejects_creation_client_side() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) =
        SimTransceiver::new(TokenSim::new().with_max_wallets(1).with_wallet());
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let error = session
        .run(&CreateWalletCommand::new(EllipticCurve::Secp256k1))
        .unwrap_err();

    assert_eq!(error, ProtocolError::MaxNumberOfWalletsCreated);
    assert!(!tag.card().processed().contains(&Instruction::CreateWallet));
}

#[test]
fn test_purging_an_unknown_slot_is_caught_before_the_wire() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, tag) = SimTransceiver::new(TokenSim::new().with_wallet());
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let error = session.run(&PurgeWalletCommand::new(5)).unwrap_err();

    assert_eq!(error, ProtocolError::WalletNotFound);
    assert!(!tag.card().processed().contains(&Instruction::PurgeWallet));
}

#[test]
fn test_signing_with_no_wallets_reports_wallet_not_found() {
    let delegate = Arc::new(RecordingDelegate::new());
    let (transceiver, _tag) = SimTransceiver::new(TokenSim::new());
    let mut session = Session::new(transceiver, delegate, SessionConfig::new());

    let error = session
        .run(&SignHashesTask::new(vec![[0x01; 32]]))
        .unwrap_err();

    assert_eq!(error, ProtocolError::WalletNotFound);
}
