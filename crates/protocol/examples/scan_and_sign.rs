//! Scan a simulated token, then sign a digest with its wallet.
//!
//! Runs entirely against the in-process simulator, so no reader hardware is
//! needed. Set `RUST_LOG=debug` to watch the frame-level exchange.

use std::sync::Arc;

use k256::ecdsa::{VerifyingKey, signature::hazmat::PrehashVerifier};
use sha2::{Digest, Sha256};
use tapcard_harness::{SimTransceiver, TokenSim};
use tapcard_protocol::{
    ScanTask, Session, SessionConfig, SessionDelegate, SignHashesTask, UserCodeReply, UserCodeType,
};
use tracing_subscriber::EnvFilter;

/// Answers every code prompt with the demo access code.
#[derive(Debug)]
struct Console;

impl SessionDelegate for Console {
    fn on_security_delay(&self, remaining_ms: u32, _total_secs: u32) {
        println!("card is busy, {remaining_ms} ms to go");
    }

    fn request_user_code(&self, code_type: UserCodeType, _is_first_attempt: bool) -> UserCodeReply {
        println!("card asks for the {code_type}, answering with the demo code");
        UserCodeReply::Code("meadow".to_owned())
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let card = TokenSim::new().with_access_code("meadow").with_wallet();
    let (transceiver, tag) = SimTransceiver::new(card);

    // First tap: read the whole card.
    let mut session = Session::new(transceiver, Arc::new(Console), SessionConfig::new());
    let card = session.run(&ScanTask::new())?;
    println!("card {} firmware {}", card.card_id, card.firmware);
    for wallet in &card.wallets {
        println!(
            "  wallet {} ({}): {}",
            wallet.index,
            wallet.curve,
            hex::encode(wallet.public_key.to_sec1_bytes())
        );
    }

    // Second tap: sign with the first wallet.
    let digest: [u8; 32] = Sha256::digest(b"tapcard says hello").into();
    let mut session = Session::new(tag.reader(), Arc::new(Console), SessionConfig::new());
    let signatures = session.run(&SignHashesTask::new(vec![digest]))?;
    println!("signature: {}", hex::encode(signatures[0].to_bytes()));

    let wallet_key = &card.wallets[0].public_key;
    VerifyingKey::from(wallet_key).verify_prehash(&digest, &signatures[0])?;
    println!("signature verifies against the wallet key");

    Ok(())
}
