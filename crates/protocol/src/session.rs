//! Session lifecycle and the single choke point to the radio.
//!
//! A session runs exactly once: open the reader, wait for a tag, select the
//! applet, preflight, run the task, stop. Every frame a command sends goes
//! through [`Session::send`], which owns tag waiting, channel negotiation,
//! sealing and tag-loss retry. Holding `&mut Session` is what makes a
//! second in-flight exchange impossible.

use std::{fmt, sync::Arc};

use crossbeam_channel::TryRecvError;
use k256::SecretKey;
use tracing::{debug, info, warn};

use tapcard_apdu::{
    CommandApdu, ResponseApdu, TagEvent, TagKind, TagStream, TlvTag, Transceiver, TransceiverError,
};

use crate::{
    commands::open_session,
    config::SessionConfig,
    constants::APPLET_AID,
    delegate::SessionDelegate,
    environment::{CodeOrigin, SessionEnvironment, UserCodeType},
    error::{ProtocolError, Result},
    preflight,
    secure_channel,
    task::SessionRunnable,
};

/// Lifecycle states of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Created, not yet run.
    #[default]
    Idle,
    /// A run is in progress.
    Active,
    /// Finished. A session never runs twice.
    Stopped,
}

/// Recovery bookkeeping for one code type.
#[derive(Debug, Clone, Copy, Default)]
struct CodeFlags {
    entered_rejected: bool,
    repository_tried: bool,
}

/// One conversation with one card.
pub struct Session {
    transceiver: Box<dyn Transceiver>,
    delegate: Arc<dyn SessionDelegate>,
    config: SessionConfig,
    environment: SessionEnvironment,
    state: SessionState,
    tags: Option<TagStream>,
    tag_present: bool,
    access_flags: CodeFlags,
    passcode_flags: CodeFlags,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transceiver", &self.transceiver)
            .field("state", &self.state)
            .field("tag_present", &self.tag_present)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Build a session over `transceiver`, reporting to `delegate`.
    pub fn new(
        transceiver: impl Transceiver + 'static,
        delegate: Arc<dyn SessionDelegate>,
        config: SessionConfig,
    ) -> Self {
        let environment = SessionEnvironment::new(config.encryption_mode);
        Self {
            transceiver: Box::new(transceiver),
            delegate,
            config,
            environment,
            state: SessionState::Idle,
            tags: None,
            tag_present: false,
            access_flags: CodeFlags::default(),
            passcode_flags: CodeFlags::default(),
        }
    }

    /// Run `runnable` to completion and stop.
    ///
    /// Opens the reader, waits for the first tag, selects the applet, runs
    /// preflight, then the task. The session always ends stopped, with the
    /// observer told exactly once; a session that already ran reports
    /// [`ProtocolError::Busy`].
    pub fn run<R: SessionRunnable>(&mut self, runnable: &R) -> Result<R::Output> {
        self.begin()?;
        let result = self.drive(runnable);
        match &result {
            Ok(_) => self.finish(None),
            Err(error) => self.fail(error),
        }
        result
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> SessionState {
        self.state
    }

    /// Protocol state commands read while serializing.
    pub const fn environment(&self) -> &SessionEnvironment {
        &self.environment
    }

    pub(crate) const fn environment_mut(&mut self) -> &mut SessionEnvironment {
        &mut self.environment
    }

    pub(crate) const fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn delegate(&self) -> &dyn SessionDelegate {
        self.delegate.as_ref()
    }

    /// Suspend the radio while the UI has the user's attention.
    pub fn pause(&mut self) {
        self.transceiver.pause();
    }

    /// Resume a paused radio.
    pub fn resume(&mut self) {
        self.transceiver.resume();
    }

    /// Stop early. Idempotent; any later run reports [`ProtocolError::Busy`].
    pub fn stop(&mut self, message: Option<&str>) {
        self.finish(message);
    }

    fn begin(&mut self) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(ProtocolError::Busy);
        }
        info!("session starting");
        let stream = self.transceiver.open().map_err(ProtocolError::from)?;
        self.tags = Some(stream);
        self.state = SessionState::Active;
        Ok(())
    }

    fn drive<R: SessionRunnable>(&mut self, runnable: &R) -> Result<R::Output> {
        self.ensure_tag()?;
        let mode = self
            .config
            .preflight_override
            .unwrap_or_else(|| runnable.preflight());
        preflight::run(self, mode)?;
        self.delegate.on_session_started();
        runnable.run(self)
    }

    fn finish(&mut self, message: Option<&str>) {
        if self.state == SessionState::Stopped {
            return;
        }
        info!("session finished");
        self.teardown(true);
        self.delegate.on_session_stopped(message);
    }

    fn fail(&mut self, error: &ProtocolError) {
        if self.state == SessionState::Stopped {
            return;
        }
        if error.is_silent() {
            debug!(code = error.code(), "session ended silently");
        } else {
            warn!(code = error.code(), %error, "session failed");
            self.delegate.on_error(error);
        }
        self.teardown(false);
        self.delegate.on_session_stopped(None);
    }

    fn teardown(&mut self, persist: bool) {
        if persist {
            self.persist_codes();
        }
        self.transceiver.close();
        self.tags = None;
        self.tag_present = false;
        self.environment.encryption.clear_key();
        self.state = SessionState::Stopped;
    }

    /// Store codes the user entered, once a session ends in success.
    fn persist_codes(&self) {
        if !self.config.persist_codes {
            return;
        }
        let Some(repository) = self.config.repository.as_ref() else {
            return;
        };
        let Some(card) = self.environment.card.as_ref() else {
            return;
        };
        for code in [&self.environment.access_code, &self.environment.passcode] {
            if code.origin() == CodeOrigin::Entered {
                repository.store(&card.card_id, code.code_type(), code.hash());
            }
        }
    }

    /// Exchange one logical APDU with the card.
    ///
    /// Waits for a tag, negotiates a channel key if the mode needs one and
    /// none is held, seals the frame and transmits. Tag loss anywhere in
    /// here clears the key, notifies the observer and waits for the tag to
    /// return before retrying; it never surfaces as an error.
    pub(crate) fn send(&mut self, apdu: &CommandApdu) -> Result<ResponseApdu> {
        loop {
            self.ensure_tag()?;

            if self.environment.encryption.needs_negotiation() {
                match self.negotiate_channel() {
                    Ok(()) => {}
                    Err(ProtocolError::TagLost) => continue,
                    Err(error) => return Err(error),
                }
            }

            let sealed = secure_channel::seal_apdu(apdu, &self.environment.encryption)?;
            if sealed.needs_extended_length() && !self.transceiver.supports_extended_length() {
                return Err(ProtocolError::ExtendedLengthNotSupported);
            }
            let frame = sealed.to_bytes()?;

            match self.transceiver.transceive(&frame) {
                Ok(raw) => {
                    let response = ResponseApdu::from_bytes(&raw)?;
                    return secure_channel::open_response(response, &self.environment.encryption);
                }
                Err(TransceiverError::TagLost) => self.handle_tag_lost(),
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Negotiate a channel key for the current mode.
    fn negotiate_channel(&mut self) -> Result<()> {
        let mode = self.environment.encryption.mode();
        debug!(%mode, "negotiating channel key");

        let host_secret = SecretKey::random(&mut rand_v8::thread_rng());
        let request = open_session::request(&host_secret.public_key(), mode)?;
        let frame = request.to_bytes()?;

        let raw = match self.transceiver.transceive(&frame) {
            Ok(raw) => raw,
            Err(TransceiverError::TagLost) => {
                self.handle_tag_lost();
                return Err(ProtocolError::TagLost);
            }
            Err(error) => return Err(error.into()),
        };

        let response = ResponseApdu::from_bytes(&raw)?;
        if !response.is_success() {
            warn!(status = %response.status, "channel negotiation rejected");
            return Err(ProtocolError::from_status(response.status));
        }

        let key = open_session::complete(
            &host_secret,
            self.environment.access_code.hash(),
            &response,
        )?;
        self.environment.encryption.install_key(key);
        Ok(())
    }

    /// Escalate the channel after the card answered `NeedEncryption`.
    pub(crate) fn escalate_encryption(&mut self) -> Result<()> {
        match self.environment.encryption.escalate() {
            Some(mode) => {
                debug!(%mode, "card demanded stronger encryption");
                Ok(())
            }
            None => {
                warn!("card not satisfied at the strongest mode");
                Err(ProtocolError::NeedEncryption)
            }
        }
    }

    /// Notify the observer about one security delay poll.
    pub(crate) fn handle_security_delay(&self, response: &ResponseApdu) {
        let remaining_ms = response
            .tlvs()
            .ok()
            .and_then(|map| map.required_uint(TlvTag::Pause).ok())
            .unwrap_or(0) as u32;
        let total_ms = self
            .environment
            .card
            .as_ref()
            .map(|card| card.settings.security_delay_ms)
            .filter(|&ms| ms > 0)
            .unwrap_or(remaining_ms);
        let total_secs = total_ms.div_ceil(1000);
        debug!(remaining_ms, total_secs, "card in security delay");
        self.delegate.on_security_delay(remaining_ms, total_secs);
    }

    /// Whether a passcode-carrying command should collect one up front.
    pub(crate) fn should_collect_passcode(&self) -> bool {
        self.environment.passcode.is_default()
            && self
                .environment
                .card
                .as_ref()
                .is_some_and(|card| card.is_passcode_set == Some(true))
    }

    fn flags(&self, code_type: UserCodeType) -> CodeFlags {
        match code_type {
            UserCodeType::AccessCode => self.access_flags,
            UserCodeType::Passcode => self.passcode_flags,
        }
    }

    fn flags_mut(&mut self, code_type: UserCodeType) -> &mut CodeFlags {
        match code_type {
            UserCodeType::AccessCode => &mut self.access_flags,
            UserCodeType::Passcode => &mut self.passcode_flags,
        }
    }

    pub(crate) fn entered_code_rejected(&self, code_type: UserCodeType) -> bool {
        self.flags(code_type).entered_rejected
    }

    pub(crate) fn mark_entered_code_rejected(&mut self, code_type: UserCodeType) {
        self.flags_mut(code_type).entered_rejected = true;
    }

    pub(crate) fn repository_code_tried(&self, code_type: UserCodeType) -> bool {
        self.flags(code_type).repository_tried
    }

    pub(crate) fn mark_repository_code_tried(&mut self, code_type: UserCodeType) {
        self.flags_mut(code_type).repository_tried = true;
    }

    /// Wait for a different card after a wrong one was presented.
    ///
    /// The card in the field stops counting as present; the next Connected
    /// event is the replacement.
    pub(crate) fn await_replacement_tag(&mut self) -> Result<()> {
        self.tag_present = false;
        self.environment.encryption.clear_key();
        self.ensure_tag()
    }

    /// Catch up on tag events, then block until a tag is present.
    fn ensure_tag(&mut self) -> Result<()> {
        let tags = self.tags.clone().ok_or(ProtocolError::SessionClosed)?;
        loop {
            match tags.try_recv() {
                Ok(event) => self.apply_tag_event(event)?,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(ProtocolError::SessionClosed),
            }
        }
        while !self.tag_present {
            let event = tags.recv().map_err(|_| ProtocolError::SessionClosed)?;
            self.apply_tag_event(event)?;
        }
        Ok(())
    }

    fn apply_tag_event(&mut self, event: TagEvent) -> Result<()> {
        match event {
            TagEvent::Connected(TagKind::IsoDep) => match self.select_applet() {
                Ok(()) => {
                    self.tag_present = true;
                    debug!("tag connected, applet selected");
                    self.delegate.on_tag_connected();
                    Ok(())
                }
                Err(ProtocolError::TagLost) => {
                    // bounced during selection, keep waiting
                    self.handle_tag_lost();
                    Ok(())
                }
                Err(error) => Err(error),
            },
            TagEvent::Connected(kind) => {
                debug!(?kind, "ignoring unsupported tag");
                Ok(())
            }
            TagEvent::Lost => {
                self.handle_tag_lost();
                Ok(())
            }
        }
    }

    fn select_applet(&mut self) -> Result<()> {
        let frame = CommandApdu::select(&APPLET_AID).to_bytes()?;
        let raw = self.transceiver.transceive(&frame)?;
        let response = ResponseApdu::from_bytes(&raw)?;
        if !response.is_success() {
            warn!(status = %response.status, "applet selection rejected");
            return Err(ProtocolError::WrongCardType);
        }
        Ok(())
    }

    fn handle_tag_lost(&mut self) {
        if self.tag_present {
            debug!("tag lost");
            self.delegate.on_tag_lost();
        }
        self.tag_present = false;
        // a key never survives the tag leaving the field
        self.environment.encryption.clear_key();
    }
}
