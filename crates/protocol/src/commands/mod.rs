//! The applet's command set.
//!
//! Each command owns its wire format and its error vocabulary; the
//! execution engine stays generic. Channel negotiation lives here too but
//! is driven by the session, never run as a command.

mod attest;
mod create_wallet;
mod files;
pub(crate) mod open_session;
mod purge_wallet;
mod read;
mod read_wallets;
mod set_user_code;
mod sign;

pub use attest::{AttestCardKeyCommand, Attestation};
pub use create_wallet::CreateWalletCommand;
pub use files::{ReadFileCommand, WriteFileCommand};
pub use purge_wallet::PurgeWalletCommand;
pub use read::ReadCommand;
pub use read_wallets::ReadWalletsCommand;
pub use set_user_code::SetUserCodeCommand;
pub use sign::SignCommand;
