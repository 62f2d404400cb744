//! Server welcome message: sent once by the rendezvous server on connect.

use serde::{Deserialize, Serialize};

/// The one-shot advisory the rendezvous server sends when a client connects.
///
/// Every field is optional. Keys this type does not model are kept in
/// [`extra`](Self::extra) so that nothing the server says is lost.
///
/// # Example
///
/// ```json
/// {
///   "motd": "Relay maintenance tonight.\nExpect a short outage.",
///   "current_cli_version": "0.9.1"
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WelcomeMessage {
    /// Free-form message of the day, possibly multi-line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub motd: Option<String>,

    /// The client release the server considers current.
    #[serde(
        default,
        alias = "currentCliVersion",
        alias = "currentVersion",
        skip_serializing_if = "Option::is_none"
    )]
    pub current_cli_version: Option<String>,

    /// A fatal refusal. Its presence means the session must not continue.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Any other keys the server sent.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WelcomeMessage {
    /// Parse a welcome from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, crate::ApiError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with_motd(mut self, motd: impl Into<String>) -> Self {
        self.motd = Some(motd.into());
        self
    }

    pub fn with_current_cli_version(mut self, version: impl Into<String>) -> Self {
        self.current_cli_version = Some(version.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
