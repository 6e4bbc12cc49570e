//! Observer surface of a running session.

use crate::{environment::UserCodeType, error::ProtocolError};

/// Reply to a user code request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCodeReply {
    /// The code the user typed.
    Code(String),
    /// The user does not remember the code.
    Forgot,
    /// The user dismissed the prompt.
    Cancelled,
}

/// Callbacks a session fires while it runs.
///
/// Implementations drive UI. All callbacks run on the thread executing the
/// session, so they must return promptly and must not call back into it.
/// Every callback except [`request_user_code`](Self::request_user_code)
/// has a no-op default.
pub trait SessionDelegate: Send + Sync {
    /// Preflight finished; the session task is about to run.
    fn on_session_started(&self) {}

    /// A supported tag entered the field and the applet was selected.
    fn on_tag_connected(&self) {}

    /// The tag left the field; the session keeps waiting for its return.
    fn on_tag_lost(&self) {}

    /// The card is counting down its security delay; fired once per poll.
    fn on_security_delay(&self, remaining_ms: u32, total_secs: u32) {
        let _ = (remaining_ms, total_secs);
    }

    /// A card the session cannot accept was presented; waiting for another.
    fn on_wrong_card(&self) {}

    /// The session ended, with an optional completion note.
    fn on_session_stopped(&self, message: Option<&str>) {
        let _ = message;
    }

    /// The session is about to end because of `error`. Never fired for
    /// silent errors such as user cancellation.
    fn on_error(&self, error: &ProtocolError) {
        let _ = error;
    }

    /// Ask the user for a code.
    ///
    /// `is_first_attempt` is false once a code entered earlier in this
    /// session has been rejected, so UI can say "wrong code, try again".
    fn request_user_code(&self, code_type: UserCodeType, is_first_attempt: bool) -> UserCodeReply;
}
