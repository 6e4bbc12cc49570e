//! A delegate that records everything and answers from a script.

use std::{
    collections::VecDeque,
    thread,
    time::{Duration, Instant},
};

use parking_lot::Mutex;

use tapcard_protocol::{ProtocolError, SessionDelegate, UserCodeReply, UserCodeType};

/// One observed callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegateEvent {
    /// `on_session_started`
    SessionStarted,
    /// `on_tag_connected`
    TagConnected,
    /// `on_tag_lost`
    TagLost,
    /// `on_security_delay`
    SecurityDelay {
        /// Milliseconds the card reported as left.
        remaining_ms: u32,
        /// Whole-delay estimate handed to UI.
        total_secs: u32,
    },
    /// `on_wrong_card`
    WrongCard,
    /// `on_session_stopped`
    SessionStopped {
        /// Completion note, if the caller stopped with one.
        message: Option<String>,
    },
    /// `on_error`
    Error {
        /// Numeric code of the surfaced error.
        code: u32,
    },
    /// `request_user_code`
    CodeRequested {
        /// Which code was asked for.
        code_type: UserCodeType,
        /// Whether this was the first ask for that code.
        is_first_attempt: bool,
    },
}

/// Recording [`SessionDelegate`] with scripted code replies.
///
/// Code requests pop replies front to back; an exhausted script answers
/// [`UserCodeReply::Cancelled`], so a runaway recovery loop cancels the
/// session instead of hanging a test.
#[derive(Debug, Default)]
pub struct RecordingDelegate {
    events: Mutex<Vec<DelegateEvent>>,
    replies: Mutex<VecDeque<UserCodeReply>>,
}

impl RecordingDelegate {
    /// An empty recorder with no scripted replies.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for the next code request.
    pub fn push_reply(&self, reply: UserCodeReply) {
        self.replies.lock().push_back(reply);
    }

    /// Everything observed so far.
    pub fn events(&self) -> Vec<DelegateEvent> {
        self.events.lock().clone()
    }

    /// The `remaining_ms` values of every security delay callback.
    pub fn security_delays(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DelegateEvent::SecurityDelay { remaining_ms, .. } => Some(remaining_ms),
                _ => None,
            })
            .collect()
    }

    /// Every code request observed, as `(code_type, is_first_attempt)`.
    pub fn code_requests(&self) -> Vec<(UserCodeType, bool)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DelegateEvent::CodeRequested {
                    code_type,
                    is_first_attempt,
                } => Some((code_type, is_first_attempt)),
                _ => None,
            })
            .collect()
    }

    /// Error codes surfaced through `on_error`.
    pub fn error_codes(&self) -> Vec<u32> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                DelegateEvent::Error { code } => Some(code),
                _ => None,
            })
            .collect()
    }

    /// Poll until `predicate` holds for the recorded events, or `timeout`
    /// passes. For sessions running on their own thread.
    pub fn wait_for(
        &self,
        timeout: Duration,
        predicate: impl Fn(&[DelegateEvent]) -> bool,
    ) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if predicate(&self.events()) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    fn record(&self, event: DelegateEvent) {
        self.events.lock().push(event);
    }
}

impl SessionDelegate for RecordingDelegate {
    fn on_session_started(&self) {
        self.record(DelegateEvent::SessionStarted);
    }

    fn on_tag_connected(&self) {
        self.record(DelegateEvent::TagConnected);
    }

    fn on_tag_lost(&self) {
        self.record(DelegateEvent::TagLost);
    }

    fn on_security_delay(&self, remaining_ms: u32, total_secs: u32) {
        self.record(DelegateEvent::SecurityDelay {
            remaining_ms,
            total_secs,
        });
    }

    fn on_wrong_card(&self) {
        self.record(DelegateEvent::WrongCard);
    }

    fn on_session_stopped(&self, message: Option<&str>) {
        self.record(DelegateEvent::SessionStopped {
            message: message.map(str::to_owned),
        });
    }

    fn on_error(&self, error: &ProtocolError) {
        self.record(DelegateEvent::Error { code: error.code() });
    }

    fn request_user_code(&self, code_type: UserCodeType, is_first_attempt: bool) -> UserCodeReply {
        self.record(DelegateEvent::CodeRequested {
            code_type,
            is_first_attempt,
        });
        self.replies
            .lock()
            .pop_front()
            .unwrap_or(UserCodeReply::Cancelled)
    }
}
