//! Facade core: the state and command surface shared by both facades.
//!
//! [`FacadeCore`] holds the session identity, the session key, the welcome
//! handler and the bound controller. It relays commands to the controller
//! and applies the rules both facades share:
//!
//! - the controller is asked to close at most once per session;
//! - `derive_key` needs a key and stops working once the session closes;
//! - a fatal welcome fails the session through the controller.
//!
//! The promise-style and delegate-style facades each embed one and expose
//! its commands through the [`Wormhole`] trait.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::{debug, info, warn};
use wormhole_api::{Mood, WelcomeMessage};

use crate::controller::{CodeInput, SessionController};
use crate::error::WormholeError;
use crate::identity::Side;
use crate::key::{self, SessionKey};
use crate::trace::{self, TraceLogger, DEFAULT_TRACE_MACHINES};
use crate::welcome::WelcomeHandler;

/// Word count used by `allocate_code` when the caller has no preference.
pub const DEFAULT_CODE_LENGTH: usize = 2;

pub struct FacadeCore {
    side: Side,
    relay_url: String,
    welcome: Arc<dyn WelcomeHandler>,
    controller: OnceLock<Arc<dyn SessionController>>,
    key: Mutex<Option<SessionKey>>,
    closed: AtomicBool,
    close_requested: AtomicBool,
    code_requests: AtomicUsize,
}

impl FacadeCore {
    pub(crate) fn new(side: Side, welcome: Arc<dyn WelcomeHandler>) -> Self {
        Self {
            side,
            relay_url: String::new(),
            welcome,
            controller: OnceLock::new(),
            key: Mutex::new(None),
            closed: AtomicBool::new(false),
            close_requested: AtomicBool::new(false),
            code_requests: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_relay_url(mut self, relay_url: impl Into<String>) -> Self {
        self.relay_url = relay_url.into();
        self
    }

    /// Attach the controller. Only the first call takes effect.
    pub(crate) fn bind(&self, controller: Arc<dyn SessionController>) -> Result<(), WormholeError> {
        self.controller
            .set(controller)
            .map_err(|_| WormholeError::Failed("session controller already bound".into()))
    }

    fn controller(&self, command: &str) -> Option<&Arc<dyn SessionController>> {
        let controller = self.controller.get();
        if controller.is_none() {
            warn!(side = %self.side, "{command} ignored: no session controller bound");
        }
        controller
    }

    pub(crate) fn start(&self) {
        if let Some(c) = self.controller("start") {
            info!(side = %self.side, relay_url = %self.relay_url, "starting wormhole session");
            c.start();
        }
    }

    pub fn side(&self) -> &Side {
        &self.side
    }

    /// The rendezvous server this session talks to.
    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.controller.get().is_some()
    }

    /// Whether the controller has reported `closed`.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ── Commands ──────────────────────────────────────────────────────────────

    fn note_code_request(&self, how: &str) {
        if self.code_requests.fetch_add(1, Ordering::SeqCst) > 0 {
            warn!(
                side = %self.side,
                "{how} called after the code was already requested; \
                 use only one of allocate_code, set_code, input_code"
            );
        }
    }

    pub fn allocate_code(&self, length: usize) {
        self.note_code_request("allocate_code");
        if let Some(c) = self.controller("allocate_code") {
            c.allocate_code(length);
        }
    }

    pub fn set_code(&self, code: &str) {
        self.note_code_request("set_code");
        if let Some(c) = self.controller("set_code") {
            c.set_code(code);
        }
    }

    pub fn input_code(&self, input: Box<dyn CodeInput>) {
        self.note_code_request("input_code");
        if let Some(c) = self.controller("input_code") {
            c.input_code(input);
        }
    }

    pub fn send(&self, payload: Vec<u8>) {
        if let Some(c) = self.controller("send") {
            c.send(payload);
        }
    }

    /// Ask the controller to close, unless a close is already in flight or
    /// the session already ended. Returns whether the request was forwarded.
    pub(crate) fn request_close(&self) -> bool {
        let Some(c) = self.controller("close") else {
            return false;
        };
        if self.close_requested.swap(true, Ordering::SeqCst) {
            debug!(side = %self.side, "close already requested");
            return false;
        }
        c.close();
        true
    }

    /// Derive a key for `purpose` from the session key.
    ///
    /// Deterministic: the same session and purpose always give the same
    /// bytes. Only usable after the verifier has arrived and before the
    /// session closes.
    ///
    /// # Errors
    ///
    /// - [`WormholeError::InvalidArgument`] if `purpose` is not UTF-8 text or
    ///   `length` is out of range.
    /// - [`WormholeError::NoKey`] if there is no key (yet, or any more).
    pub fn derive_key(
        &self,
        purpose: impl AsRef<[u8]>,
        length: usize,
    ) -> Result<Vec<u8>, WormholeError> {
        let purpose = key::text_purpose(purpose.as_ref())?;
        let guard = self.key.lock().unwrap_or_else(|p| p.into_inner());
        let key = guard.as_ref().ok_or(WormholeError::NoKey)?;
        key.derive(purpose.as_bytes(), length)
    }

    /// Install `logger` on the controller for the machines named in `which`.
    pub fn debug_set_trace(&self, client_name: &str, which: &str, logger: TraceLogger) {
        if let Some(c) = self.controller("debug_set_trace") {
            c.set_trace(client_name, which, logger);
        }
    }

    /// Trace every machine through [`trace::default_logger`].
    pub fn debug_set_default_trace(&self, client_name: &str) {
        self.debug_set_trace(client_name, DEFAULT_TRACE_MACHINES, trace::default_logger());
    }

    pub(crate) fn serialize_controller(&self) -> Result<serde_json::Value, WormholeError> {
        self.controller
            .get()
            .map(|c| c.serialize())
            .ok_or_else(|| WormholeError::Snapshot("no session controller bound".into()))
    }

    // ── Events ────────────────────────────────────────────────────────────────

    /// Evaluate a welcome: log its warnings, and fail the session if it is
    /// fatal.
    pub(crate) fn on_welcome(&self, welcome: &WelcomeMessage) {
        let outcome = self.welcome.evaluate(welcome);
        for warning in &outcome.warnings {
            warn!(side = %self.side, "{warning}");
        }
        if let Some(error) = outcome.fatal {
            warn!(side = %self.side, "server refused the session: {error}");
            if let Some(c) = self.controller("signal_error") {
                c.signal_error(error, Mood::Unwelcome);
            }
        }
    }

    pub(crate) fn on_key(&self, key: Vec<u8>) {
        if self.is_closed() {
            debug!(side = %self.side, "key arrived after close; ignored");
            return;
        }
        let mut guard = self.key.lock().unwrap_or_else(|p| p.into_inner());
        if guard.is_some() {
            debug!(side = %self.side, "duplicate key event ignored");
            return;
        }
        *guard = Some(SessionKey::new(key));
    }

    /// Record the end of the session and wipe the key. Returns `false` if
    /// the session had already closed.
    pub(crate) fn on_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!(side = %self.side, "duplicate closed event ignored");
            return false;
        }
        self.close_requested.store(true, Ordering::SeqCst);
        self.key.lock().unwrap_or_else(|p| p.into_inner()).take();
        info!(side = %self.side, "wormhole session closed");
        true
    }
}

/// The command surface both facades share.
///
/// Implementors only supply [`core`](Self::core); every command is relayed
/// through it unchanged.
pub trait Wormhole {
    fn core(&self) -> &FacadeCore;

    /// This session's random identity token.
    fn side(&self) -> &Side {
        self.core().side()
    }

    /// Have the server allocate a nameplate and build a code of `length`
    /// words around it.
    fn allocate_code(&self, length: usize) {
        self.core().allocate_code(length)
    }

    /// Use a code obtained out-of-band.
    fn set_code(&self, code: &str) {
        self.core().set_code(code)
    }

    /// Let the controller read the code from an interactive source.
    fn input_code(&self, input: Box<dyn CodeInput>) {
        self.core().input_code(input)
    }

    /// Send application data to the peer. May be called before the channel
    /// is established; buffering is the controller's business.
    fn send(&self, payload: Vec<u8>) {
        self.core().send(payload)
    }

    /// See [`FacadeCore::derive_key`].
    fn derive_key(
        &self,
        purpose: impl AsRef<[u8]>,
        length: usize,
    ) -> Result<Vec<u8>, WormholeError> {
        self.core().derive_key(purpose, length)
    }

    /// See [`FacadeCore::debug_set_trace`].
    fn debug_set_trace(&self, client_name: &str, which: &str, logger: TraceLogger) {
        self.core().debug_set_trace(client_name, which, logger)
    }

    /// See [`FacadeCore::debug_set_default_trace`].
    fn debug_set_default_trace(&self, client_name: &str) {
        self.core().debug_set_default_trace(client_name)
    }
}
