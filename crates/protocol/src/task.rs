//! Units of work a session can run.
//!
//! Every [`CardCommand`] is runnable on its own. A [`SessionRunnable`]
//! implemented by hand composes several commands into one tap, sharing the
//! session's preflighted card state between them.

use crossbeam_channel::{bounded, Receiver};

use crate::{
    command::{CardCommand, PreflightMode},
    commands::{AttestCardKeyCommand, SignCommand},
    error::{ProtocolError, Result},
    executor,
    session::Session,
    types::Card,
};

/// Work a session drives against one card.
pub trait SessionRunnable {
    /// What the task yields.
    type Output;

    /// How much preflight the task needs before it starts.
    fn preflight(&self) -> PreflightMode {
        PreflightMode::FullCard
    }

    /// Run against an active session.
    fn run(&self, session: &mut Session) -> Result<Self::Output>;
}

impl<C: CardCommand> SessionRunnable for C {
    type Output = C::Output;

    fn preflight(&self) -> PreflightMode {
        CardCommand::preflight(self)
    }

    fn run(&self, session: &mut Session) -> Result<Self::Output> {
        executor::execute(self, session)
    }
}

/// Read the full card snapshot, optionally proving the card key is genuine.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanTask;

impl ScanTask {
    /// Build the task.
    pub const fn new() -> Self {
        Self
    }
}

impl SessionRunnable for ScanTask {
    type Output = Card;

    fn run(&self, session: &mut Session) -> Result<Card> {
        if session.config().attest_on_scan {
            executor::execute(&AttestCardKeyCommand::new_random(), session)?;
        }
        session.environment().card().cloned()
    }
}

/// Sign a batch of digests with one wallet.
#[derive(Debug, Clone)]
pub struct SignHashesTask {
    hashes: Vec<[u8; 32]>,
    wallet_index: Option<u8>,
}

impl SignHashesTask {
    /// Sign `hashes` with the card's first wallet.
    pub const fn new(hashes: Vec<[u8; 32]>) -> Self {
        Self {
            hashes,
            wallet_index: None,
        }
    }

    /// Sign with a specific wallet instead.
    #[must_use]
    pub const fn with_wallet(mut self, index: u8) -> Self {
        self.wallet_index = Some(index);
        self
    }
}

impl SessionRunnable for SignHashesTask {
    type Output = Vec<k256::ecdsa::Signature>;

    fn run(&self, session: &mut Session) -> Result<Self::Output> {
        let index = match self.wallet_index {
            Some(index) => index,
            None => session
                .environment()
                .card()?
                .wallets
                .first()
                .map(|wallet| wallet.index)
                .ok_or(ProtocolError::WalletNotFound)?,
        };
        executor::execute(&SignCommand::new(index, self.hashes.clone()), session)
    }
}

/// Run a session on its own thread, handing it back with the outcome.
///
/// The caller keeps the receiver and regains the session when the run ends.
/// Dropping the receiver abandons the run's result but not the run.
pub fn run_detached<R>(mut session: Session, runnable: R) -> Receiver<(Session, Result<R::Output>)>
where
    R: SessionRunnable + Send + 'static,
    R::Output: Send + 'static,
{
    let (sender, receiver) = bounded(1);
    std::thread::spawn(move || {
        let result = session.run(&runnable);
        // receiver may be gone if the caller lost interest
        let _ = sender.send((session, result));
    });
    receiver
}

/// Run a session on its own thread and hand the outcome to `callback`.
pub fn run_with_callback<R, F>(mut session: Session, runnable: R, callback: F)
where
    R: SessionRunnable + Send + 'static,
    R::Output: Send + 'static,
    F: FnOnce(Result<R::Output>) + Send + 'static,
{
    std::thread::spawn(move || {
        let result = session.run(&runnable);
        callback(result);
    });
}
