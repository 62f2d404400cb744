//! Welcome evaluation: what to make of the server's one-time advisory.
//!
//! The evaluator is pure: it returns warnings for the caller to display and
//! an optional fatal error for the caller to signal. The facade core logs
//! the warnings and, on a fatal verdict, asks the controller to fail the
//! session with mood `unwelcome`.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use wormhole_api::WelcomeMessage;

use crate::error::WormholeError;

/// Something the user should see, but which does not end the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WelcomeWarning {
    /// The server's message of the day.
    Motd { relay_url: String, text: String },

    /// The server advertises a different current release than ours.
    VersionMismatch { server: String, ours: String },
}

impl fmt::Display for WelcomeWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WelcomeWarning::Motd { relay_url, text } => {
                let indented = text.lines().collect::<Vec<_>>().join("\n ");
                write!(f, "Server (at {relay_url}) says:\n {indented}")
            }
            WelcomeWarning::VersionMismatch { server, ours } => write!(
                f,
                "Warning: errors may occur unless both sides are running the same version\n\
                 Server claims {server} is current, but ours is {ours}"
            ),
        }
    }
}

/// The verdict on one welcome message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WelcomeOutcome {
    pub warnings: Vec<WelcomeWarning>,
    pub fatal: Option<WormholeError>,
}

/// Judges welcome messages. Supply your own through
/// [`SessionOptions::with_welcome_handler`](crate::SessionOptions::with_welcome_handler)
/// to replace [`WelcomeEvaluator`].
pub trait WelcomeHandler: Send + Sync {
    fn evaluate(&self, welcome: &WelcomeMessage) -> WelcomeOutcome;
}

/// The stock welcome handler.
///
/// The version advisory is only considered for release builds (a version
/// string without `-`, so not `0.9.1-3-gabcdef`) and is shown at most once
/// per evaluator.
#[derive(Debug)]
pub struct WelcomeEvaluator {
    relay_url: String,
    current_version: String,
    version_warning_displayed: AtomicBool,
}

impl WelcomeEvaluator {
    pub fn new(relay_url: impl Into<String>, current_version: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            current_version: current_version.into(),
            version_warning_displayed: AtomicBool::new(false),
        }
    }

    fn is_release_build(&self) -> bool {
        !self.current_version.contains('-')
    }
}

impl WelcomeHandler for WelcomeEvaluator {
    fn evaluate(&self, welcome: &WelcomeMessage) -> WelcomeOutcome {
        let mut outcome = WelcomeOutcome::default();

        if let Some(motd) = &welcome.motd {
            outcome.warnings.push(WelcomeWarning::Motd {
                relay_url: self.relay_url.clone(),
                text: motd.clone(),
            });
        }

        if let Some(server) = &welcome.current_cli_version {
            if self.is_release_build()
                && *server != self.current_version
                && !self.version_warning_displayed.swap(true, Ordering::SeqCst)
            {
                outcome.warnings.push(WelcomeWarning::VersionMismatch {
                    server: server.clone(),
                    ours: self.current_version.clone(),
                });
            }
        }

        if let Some(error) = &welcome.error {
            outcome.fatal = Some(WormholeError::Welcome(error.clone()));
        }

        outcome
    }
}
