//! State-machine tracing hook.
//!
//! The session controller is built from several small state machines. When
//! tracing is enabled it reports every transition to an injected logger.
//! The default logger writes one line per transition through `tracing` at
//! `debug` level under the `wormhole::trace` target:
//!
//! ```text
//! alice.B[S0_empty].set_code -> [S1_lonely]
//! ```

use std::fmt;
use std::sync::Arc;

/// Machines traced when the caller does not pick a subset.
pub const DEFAULT_TRACE_MACHINES: &str = "B N M S O K R RC L C T";

/// One state transition inside the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    pub client_name: String,
    pub machine: String,
    pub old_state: String,
    pub input: String,
    pub new_state: String,
}

impl fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}[{}].{} -> [{}]",
            self.client_name, self.machine, self.old_state, self.input, self.new_state
        )
    }
}

/// Sink for [`TraceEvent`]s.
pub type TraceLogger = Arc<dyn Fn(&TraceEvent) + Send + Sync>;

/// Logger that forwards every transition to `tracing::debug!`.
pub fn default_logger() -> TraceLogger {
    Arc::new(|event: &TraceEvent| {
        tracing::debug!(target: "wormhole::trace", "{event}");
    })
}

/// Whether `machine` is named in a space-separated selector such as
/// [`DEFAULT_TRACE_MACHINES`].
pub fn selects(which: &str, machine: &str) -> bool {
    which.split_whitespace().any(|m| m == machine)
}
