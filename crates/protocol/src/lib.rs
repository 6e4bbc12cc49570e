//! Session, secure channel and command engine for tapcard hardware tokens
//!
//! A [`Session`] owns one conversation with one card: it waits for the tag,
//! selects the applet, preflights card state, then runs a
//! [`SessionRunnable`] built from one or more commands. The engine absorbs
//! the protocol's flow control on behalf of every command:
//!
//! - security delay polls are re-sent until the card is ready, with the
//!   observer told how long is left
//! - encryption demands escalate the channel and rebuild the frame
//! - rejected user codes run recovery through the [`SessionDelegate`]
//! - a lost tag is waited out, never surfaced as an error
//!
//! Encrypted modes negotiate an ephemeral ECDH key bound to the access
//! code; see [`crypto`] for the derivation chain.
//!
//! ```no_run
//! # use tapcard_protocol::{
//! #     Bytes, SessionDelegate, TagStream, Transceiver, TransceiverError, UserCodeReply,
//! #     UserCodeType,
//! # };
//! # #[derive(Debug)]
//! # struct Reader;
//! # impl Transceiver for Reader {
//! #     fn open(&mut self) -> Result<TagStream, TransceiverError> {
//! #         Err(TransceiverError::SessionClosed)
//! #     }
//! #     fn close(&mut self) {}
//! #     fn do_transceive(&mut self, _apdu: &[u8]) -> Result<Bytes, TransceiverError> {
//! #         Err(TransceiverError::TagLost)
//! #     }
//! # }
//! # struct Ui;
//! # impl SessionDelegate for Ui {
//! #     fn request_user_code(&self, _: UserCodeType, _: bool) -> UserCodeReply {
//! #         UserCodeReply::Cancelled
//! #     }
//! # }
//! use std::sync::Arc;
//! use tapcard_protocol::{ScanTask, Session, SessionConfig};
//!
//! let mut session = Session::new(Reader, Arc::new(Ui), SessionConfig::new());
//! let card = session.run(&ScanTask::new())?;
//! println!("card {} holds {} wallets", card.card_id, card.wallets.len());
//! # Ok::<(), tapcard_protocol::ProtocolError>(())
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod command;
pub mod commands;
mod config;
mod constants;
pub mod crypto;
mod delegate;
mod environment;
mod error;
mod executor;
mod preflight;
mod recovery;
mod secure_channel;
mod session;
mod task;
mod types;

pub use command::{CardCommand, PreflightMode};
pub use commands::{
    AttestCardKeyCommand, Attestation, CreateWalletCommand, PurgeWalletCommand, ReadCommand,
    ReadFileCommand, ReadWalletsCommand, SetUserCodeCommand, SignCommand, WriteFileCommand,
};
pub use config::{CardFilterFn, CodeResetFn, SessionConfig, UserCodeRepository};
pub use constants::*;
pub use crypto::{SessionKey, hash_user_code};
pub use delegate::{SessionDelegate, UserCodeReply};
pub use environment::{CodeOrigin, SessionEnvironment, UserCode, UserCodeType};
pub use error::{ProtocolError, Result};
pub use secure_channel::{EncryptionMode, EncryptionState};
pub use session::{Session, SessionState};
pub use task::{ScanTask, SessionRunnable, SignHashesTask, run_detached, run_with_callback};
pub use types::{
    Card, CardSettings, CardSettingsMask, CardStatus, EllipticCurve, FirmwareVersion,
    SettingsFlag, Wallet,
};

pub use tapcard_apdu::{
    Bytes, CommandApdu, Instruction, ResponseApdu, StatusWord, TagEvent, TagKind, TagStream, Tlv,
    TlvMap, TlvTag, Transceiver, TransceiverError,
};
