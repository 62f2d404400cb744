//! Error taxonomy for the wormhole facade.
//!
//! Errors the facade detects itself (a bad `derive_key` argument, a missing
//! key) are returned synchronously. Errors that originate in the session
//! controller arrive through the `closed` event and are fanned out to every
//! pending observer.

use thiserror::Error;
use wormhole_api::{ApiError, Mood};

/// Every failure a wormhole session can report.
///
/// `Clone` because one terminal failure is handed to many observers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WormholeError {
    /// The server's welcome message carried a fatal `error`.
    #[error("unwelcome: {0}")]
    Welcome(String),

    /// `derive_key` was called before the key exchange finished, or after
    /// the session closed.
    #[error("no key available: wait for the verifier, and do not use after close")]
    NoKey,

    /// An argument the facade validates itself was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The session ended without an error while this observer was waiting.
    /// Carries the plain close reason.
    #[error("wormhole closed: {0}")]
    Closed(String),

    /// Key confirmation failed: wrong code, or someone in the middle.
    #[error("wrong password: key confirmation failed")]
    WrongPassword,

    /// The session closed before any peer arrived.
    #[error("lonely: no peer connected before the session closed")]
    Lonely,

    /// The rendezvous server reported an error.
    #[error("server error: {0}")]
    Server(String),

    /// Any other failure reported by the session controller.
    #[error("session failed: {0}")]
    Failed(String),

    /// A session snapshot could not be restored.
    #[error("snapshot: {0}")]
    Snapshot(String),

    /// An observation's resolver went away without resolving it.
    #[error("observer dropped before it was resolved")]
    ObserverGone,
}

impl WormholeError {
    /// Whether this error describes the session itself failing, as opposed
    /// to a misuse of the facade.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            WormholeError::Welcome(_)
                | WormholeError::WrongPassword
                | WormholeError::Lonely
                | WormholeError::Server(_)
                | WormholeError::Failed(_)
        )
    }

    /// The mood a controller should close with when failing with this error.
    pub fn mood(&self) -> Mood {
        match self {
            WormholeError::Welcome(_) => Mood::Unwelcome,
            WormholeError::WrongPassword => Mood::Scary,
            WormholeError::Lonely => Mood::Lonely,
            _ => Mood::Errory,
        }
    }
}

impl From<ApiError> for WormholeError {
    fn from(e: ApiError) -> Self {
        WormholeError::Snapshot(e.to_string())
    }
}

/// The terminal value of a session: the plain close reason, or the error
/// that ended it.
pub type ClosedResult = Result<String, WormholeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrong_password_is_a_session_failure() {
        assert!(WormholeError::WrongPassword.is_session_failure());
        assert!(WormholeError::Failed("boom".into()).is_session_failure());
        assert!(!WormholeError::NoKey.is_session_failure());
        assert!(!WormholeError::Closed("happy".into()).is_session_failure());
    }

    #[test]
    fn moods() {
        assert_eq!(WormholeError::Welcome("go away".into()).mood(), Mood::Unwelcome);
        assert_eq!(WormholeError::WrongPassword.mood(), Mood::Scary);
        assert_eq!(WormholeError::Lonely.mood(), Mood::Lonely);
        assert_eq!(WormholeError::Server("bad".into()).mood(), Mood::Errory);
    }

    #[test]
    fn failure_message_wraps_cause() {
        assert!(WormholeError::Failed("boom".into()).to_string().contains("boom"));
    }

    #[test]
    fn api_errors_become_snapshot_errors() {
        let e: WormholeError = ApiError::UnsupportedVersion {
            found: 7,
            expected: 1,
        }
        .into();
        assert!(matches!(e, WormholeError::Snapshot(ref m) if m.contains('7')));
    }
}
