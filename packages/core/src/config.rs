//! Session options, optionally populated from environment variables.

use std::fmt;
use std::sync::Arc;

use crate::identity::Side;
use crate::trace::DEFAULT_TRACE_MACHINES;
use crate::welcome::WelcomeHandler;

/// The version compared against the server's `current_cli_version` advisory
/// unless overridden.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Which controller machines to trace, and under what client name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceConfig {
    pub client_name: String,
    pub machines: String,
}

/// Knobs for [`create`](crate::create) and friends.
///
/// Everything has a default, so `SessionOptions::default()` is a complete
/// configuration. [`from_env`](Self::from_env) reads:
///
/// | Variable | Default | Description |
/// |----------|---------|-------------|
/// | `WORMHOLE_TRACE` | (absent = off) | Enable controller tracing under this client name |
/// | `WORMHOLE_TRACE_MACHINES` | `B N M S O K R RC L C T` | Machines to trace |
/// | `WORMHOLE_CLIENT_VERSION` | crate version | Version checked against the welcome advisory |
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Use this side instead of a random one.
    pub side: Option<Side>,

    /// Replace the stock [`WelcomeEvaluator`](crate::WelcomeEvaluator).
    pub welcome_handler: Option<Arc<dyn WelcomeHandler>>,

    /// Version for the welcome advisory check. `None` means [`CLIENT_VERSION`].
    pub client_version: Option<String>,

    /// Install the default trace logger on the controller before it starts.
    pub trace: Option<TraceConfig>,
}

impl SessionOptions {
    /// Populate options from environment variables, applying defaults where absent.
    pub fn from_env() -> Self {
        let trace = std::env::var("WORMHOLE_TRACE").ok().map(|client_name| TraceConfig {
            client_name,
            machines: std::env::var("WORMHOLE_TRACE_MACHINES")
                .unwrap_or_else(|_| DEFAULT_TRACE_MACHINES.into()),
        });

        Self {
            side: None,
            welcome_handler: None,
            client_version: std::env::var("WORMHOLE_CLIENT_VERSION").ok(),
            trace,
        }
    }

    pub fn with_side(mut self, side: Side) -> Self {
        self.side = Some(side);
        self
    }

    pub fn with_welcome_handler(mut self, handler: Arc<dyn WelcomeHandler>) -> Self {
        self.welcome_handler = Some(handler);
        self
    }

    pub fn with_client_version(mut self, version: impl Into<String>) -> Self {
        self.client_version = Some(version.into());
        self
    }

    /// Trace the default machine set under `client_name`.
    pub fn with_trace(mut self, client_name: impl Into<String>) -> Self {
        self.trace = Some(TraceConfig {
            client_name: client_name.into(),
            machines: DEFAULT_TRACE_MACHINES.into(),
        });
        self
    }

    pub fn client_version(&self) -> &str {
        self.client_version.as_deref().unwrap_or(CLIENT_VERSION)
    }
}

impl fmt::Debug for SessionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionOptions")
            .field("side", &self.side)
            .field("welcome_handler", &self.welcome_handler.as_ref().map(|_| "custom"))
            .field("client_version", &self.client_version())
            .field("trace", &self.trace)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let opts = SessionOptions::default();
        assert!(opts.side.is_none());
        assert!(opts.trace.is_none());
        assert_eq!(opts.client_version(), CLIENT_VERSION);
    }

    #[test]
    fn builders() {
        let side = Side::from_hex("0011223344").unwrap();
        let opts = SessionOptions::default()
            .with_side(side.clone())
            .with_client_version("0.9.1")
            .with_trace("alice");
        assert_eq!(opts.side, Some(side));
        assert_eq!(opts.client_version(), "0.9.1");
        assert_eq!(
            opts.trace,
            Some(TraceConfig {
                client_name: "alice".into(),
                machines: DEFAULT_TRACE_MACHINES.into()
            })
        );
    }

    #[test]
    fn debug_hides_handler() {
        let shown = format!("{:?}", SessionOptions::default());
        assert!(shown.contains("SessionOptions"));
    }
}
