//! Shared helpers for the wormhole conformance suite.
//!
//! Provides an in-process stand-in for the session controller so that the
//! facades can be exercised end to end without a rendezvous server:
//!
//! - [`LoopbackRelay`]: the shared "server". Sessions that claim the same
//!   code are paired with each other.
//! - [`LoopbackController`]: one session's controller. It records every
//!   command it receives and drives the facade's events the way a real
//!   controller would: code, welcome, key, verifier, version, received
//!   payloads, and a single `closed`.
//! - [`LoopbackFactory`]: a [`ControllerFactory`] handing out loopback
//!   controllers and remembering them for inspection.
//! - [`RecordingDelegate`]: a [`WormholeDelegate`] that writes down every
//!   notification.
//!
//! The loopback key is derived from the code itself, so two sessions that
//! use the same code agree on a key and verifier, and sessions that use
//! different codes never pair.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde_json::json;
use tracing::{debug, info};
use wormhole::{
    derive_key, ClosedResult, CodeInput, ControllerContext, ControllerFactory, EventSink,
    PromiseWormhole, RestoredController, SessionController, SessionOptions, Side, TraceEvent,
    TraceLogger, WelcomeMessage, WormholeDelegate, WormholeError,
};
use wormhole_api::Mood;

/// Application id used by the suite.
pub const APPID: &str = "lothar.com/wormhole/conformance";

/// Relay URL used by the suite. Nothing listens here.
pub const RELAY_URL: &str = "ws://relay.loopback.invalid:4000/v1";

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

/// Install a `tracing` subscriber for test output. Safe to call repeatedly.
///
/// Honours `RUST_LOG`; defaults to `wormhole=debug`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wormhole=debug,wormhole_conformance=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Relay
// ---------------------------------------------------------------------------

struct RelayInner {
    welcome: Option<WelcomeMessage>,
    next_nameplate: u32,
    /// Code → the session that claimed it first and is still waiting.
    waiting: HashMap<String, Weak<LoopbackController>>,
}

/// The shared in-memory rendezvous point.
pub struct LoopbackRelay {
    inner: Mutex<RelayInner>,
}

impl LoopbackRelay {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(RelayInner {
                welcome: None,
                next_nameplate: 4,
                waiting: HashMap::new(),
            }),
        }
    }

    /// A relay that greets every session with `welcome` when it starts.
    pub fn with_welcome(welcome: WelcomeMessage) -> Self {
        let relay = Self::new();
        lock(&relay.inner).welcome = Some(welcome);
        relay
    }

    fn welcome(&self) -> Option<WelcomeMessage> {
        lock(&self.inner).welcome.clone()
    }

    fn allocate_nameplate(&self) -> u32 {
        let mut inner = lock(&self.inner);
        let nameplate = inner.next_nameplate;
        inner.next_nameplate += 1;
        nameplate
    }

    /// Claim `code`. Returns the waiting peer if one already claimed it,
    /// otherwise parks `me` until a peer arrives.
    fn claim(&self, code: &str, me: &Weak<LoopbackController>) -> Option<Arc<LoopbackController>> {
        let mut inner = lock(&self.inner);
        if let Some(peer) = inner.waiting.remove(code).and_then(|w| w.upgrade()) {
            return Some(peer);
        }
        inner.waiting.insert(code.to_string(), me.clone());
        None
    }

    fn release(&self, code: &str) {
        lock(&self.inner).waiting.remove(code);
    }
}

impl Default for LoopbackRelay {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Controller
// ---------------------------------------------------------------------------

/// A command the facade sent to a [`LoopbackController`].
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    AllocateCode(usize),
    SetCode(String),
    InputCode(String),
    Send(Vec<u8>),
    Close,
    SignalError(WormholeError, Mood),
    SetTrace { client_name: String, which: String },
}

/// Words a loopback code is built from.
const WORDS: &[&str] = &["purple", "sausages", "guitarist", "revenge", "crossover", "snapshot"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Empty,
    Waiting,
    Paired,
    Closed,
}

impl Phase {
    fn name(self) -> &'static str {
        match self {
            Phase::Empty => "S0_empty",
            Phase::Waiting => "S1_lonely",
            Phase::Paired => "S2_happy",
            Phase::Closed => "S3_closed",
        }
    }
}

struct ControllerState {
    phase: Phase,
    code: Option<String>,
    peer: Option<Weak<LoopbackController>>,
    /// Payloads sent before a peer arrived.
    outbox: Vec<Vec<u8>>,
    /// Payloads from the peer that arrived before pairing finished here.
    inbox: Vec<Vec<u8>>,
    commands: Vec<Command>,
    trace: Option<(String, String, TraceLogger)>,
    /// Code a restored session claims again once started.
    rejoin: Option<String>,
}

/// One session's side of the loopback.
pub struct LoopbackController {
    me: Weak<LoopbackController>,
    side: Side,
    relay_url: String,
    relay: Arc<LoopbackRelay>,
    events: EventSink,
    state: Mutex<ControllerState>,
}

impl LoopbackController {
    pub fn new(
        side: Side,
        relay_url: impl Into<String>,
        relay: Arc<LoopbackRelay>,
        events: EventSink,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            side,
            relay_url: relay_url.into(),
            relay,
            events,
            state: Mutex::new(ControllerState {
                phase: Phase::Empty,
                code: None,
                peer: None,
                outbox: Vec::new(),
                inbox: Vec::new(),
                commands: Vec::new(),
                trace: None,
                rejoin: None,
            }),
        })
    }

    pub fn side(&self) -> &Side {
        &self.side
    }

    pub fn relay_url(&self) -> &str {
        &self.relay_url
    }

    /// Every command received so far, in order.
    pub fn commands(&self) -> Vec<Command> {
        lock(&self.state).commands.clone()
    }

    /// How many times `command` was received.
    pub fn count(&self, command: &Command) -> usize {
        lock(&self.state).commands.iter().filter(|c| *c == command).count()
    }

    /// Direct access to the facade's event surface, for scripting events
    /// the loopback would not produce on its own.
    pub fn events(&self) -> &EventSink {
        &self.events
    }

    fn record(&self, command: Command) {
        lock(&self.state).commands.push(command);
    }

    /// Move to `next`, reporting the transition to the trace logger if the
    /// boss machine ("B") is traced. The logger runs after the lock is
    /// released.
    fn transition(&self, input: &str, next: Phase) {
        let (old, trace) = {
            let mut state = lock(&self.state);
            let old = state.phase;
            state.phase = next;
            (old, state.trace.clone())
        };
        if let Some((client_name, which, logger)) = trace {
            if wormhole::trace::selects(&which, "B") {
                logger(&TraceEvent {
                    client_name,
                    machine: "B".into(),
                    old_state: old.name().into(),
                    input: input.into(),
                    new_state: next.name().into(),
                });
            }
        }
    }

    fn phase(&self) -> Phase {
        lock(&self.state).phase
    }

    fn use_code(&self, code: String) {
        if self.phase() != Phase::Empty {
            debug!(side = %self.side, "code already set; ignoring {code}");
            return;
        }
        lock(&self.state).code = Some(code.clone());
        self.transition("got_code", Phase::Waiting);
        self.events.got_code(code.clone());

        if let Some(peer) = self.relay.claim(&code, &self.me) {
            self.pair_with(&peer, &code);
            peer.pair_with(&self.arc(), &code);
        }
    }

    /// Claim `code` again after a restore. The code was already reported
    /// before the snapshot, so no `got_code` is emitted.
    fn rejoin(&self, code: String) {
        lock(&self.state).code = Some(code.clone());
        self.transition("rejoin", Phase::Waiting);
        if let Some(peer) = self.relay.claim(&code, &self.me) {
            self.pair_with(&peer, &code);
            peer.pair_with(&self.arc(), &code);
        }
    }

    fn arc(&self) -> Arc<LoopbackController> {
        // `self` is only reachable through the Arc built in `new`.
        self.me.upgrade().unwrap_or_else(|| unreachable!("controller outlived its Arc"))
    }

    /// Complete the key exchange with `peer` and flush anything queued.
    fn pair_with(&self, peer: &Arc<LoopbackController>, code: &str) {
        if self.phase() != Phase::Waiting {
            return;
        }
        let outbox = {
            let mut state = lock(&self.state);
            state.peer = Some(Arc::downgrade(peer));
            std::mem::take(&mut state.outbox)
        };
        self.transition("happy", Phase::Paired);
        info!(side = %self.side, peer = %peer.side, "paired on {code}");

        let key = loopback_key(code);
        self.events.got_key(key.clone());
        self.events.got_verifier(loopback_verifier(&key));
        self.events
            .got_version(json!({ "app_versions": { "side": self.side.as_str() } }));

        for payload in outbox {
            peer.deliver(payload);
        }
        let inbox = std::mem::take(&mut lock(&self.state).inbox);
        for payload in inbox {
            self.events.received(payload);
        }
    }

    fn deliver(&self, payload: Vec<u8>) {
        {
            let mut state = lock(&self.state);
            match state.phase {
                Phase::Paired => {}
                Phase::Closed => return,
                Phase::Empty | Phase::Waiting => {
                    state.inbox.push(payload);
                    return;
                }
            }
        }
        self.events.received(payload);
    }

    fn finish(&self, input: &str, result: ClosedResult) {
        if self.phase() == Phase::Closed {
            return;
        }
        if let Some(code) = lock(&self.state).code.clone() {
            self.relay.release(&code);
        }
        self.transition(input, Phase::Closed);
        self.events.closed(result);
    }
}

/// The loopback "negotiated" key for `code`.
pub fn loopback_key(code: &str) -> Vec<u8> {
    derive_key(code.as_bytes(), b"loopback:session-key", 32)
        .unwrap_or_else(|e| unreachable!("32 is a valid length: {e}"))
}

/// The verifier a loopback session reports for `key`.
pub fn loopback_verifier(key: &[u8]) -> Vec<u8> {
    derive_key(key, b"wormhole:verifier", 32)
        .unwrap_or_else(|e| unreachable!("32 is a valid length: {e}"))
}

impl SessionController for LoopbackController {
    fn start(&self) {
        self.record(Command::Start);
        if let Some(welcome) = self.relay.welcome() {
            self.events.got_welcome(welcome);
        }
        let rejoin = lock(&self.state).rejoin.take();
        if let Some(code) = rejoin {
            self.rejoin(code);
        }
    }

    fn allocate_code(&self, length: usize) {
        self.record(Command::AllocateCode(length));
        let nameplate = self.relay.allocate_nameplate();
        let words: Vec<&str> = WORDS.iter().copied().cycle().take(length).collect();
        let code = std::iter::once(nameplate.to_string())
            .chain(words.into_iter().map(str::to_string))
            .collect::<Vec<_>>()
            .join("-");
        self.use_code(code);
    }

    fn set_code(&self, code: &str) {
        self.record(Command::SetCode(code.to_string()));
        self.use_code(code.to_string());
    }

    fn input_code(&self, mut input: Box<dyn CodeInput>) {
        let mut typed = String::new();
        while let Some(line) = input.next_line() {
            typed.push_str(line.trim());
        }
        self.record(Command::InputCode(typed.clone()));
        if typed.is_empty() {
            self.finish("input_failed", Err(WormholeError::Failed("no code entered".into())));
            return;
        }
        self.use_code(typed);
    }

    fn send(&self, payload: Vec<u8>) {
        self.record(Command::Send(payload.clone()));
        let peer = {
            let mut state = lock(&self.state);
            match state.phase {
                Phase::Paired => state.peer.as_ref().and_then(Weak::upgrade),
                Phase::Closed => return,
                Phase::Empty | Phase::Waiting => {
                    state.outbox.push(payload);
                    return;
                }
            }
        };
        if let Some(peer) = peer {
            peer.deliver(payload);
        }
    }

    fn close(&self) {
        self.record(Command::Close);
        let result = match self.phase() {
            Phase::Paired => Ok(Mood::Happy.to_string()),
            _ => Err(WormholeError::Lonely),
        };
        self.finish("close", result);
    }

    fn signal_error(&self, error: WormholeError, mood: Mood) {
        self.record(Command::SignalError(error.clone(), mood));
        self.finish(mood.as_str(), Err(error));
    }

    fn serialize(&self) -> serde_json::Value {
        let state = lock(&self.state);
        json!({
            "side": self.side.as_str(),
            "relay_url": self.relay_url,
            "phase": state.phase.name(),
            "code": state.code,
            "outbox": state.outbox.iter().map(hex::encode).collect::<Vec<_>>(),
        })
    }

    fn set_trace(&self, client_name: &str, which: &str, logger: TraceLogger) {
        self.record(Command::SetTrace {
            client_name: client_name.to_string(),
            which: which.to_string(),
        });
        lock(&self.state).trace = Some((client_name.to_string(), which.to_string(), logger));
    }
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Builds [`LoopbackController`]s on a shared relay.
pub struct LoopbackFactory {
    relay: Arc<LoopbackRelay>,
    built: Mutex<Vec<Arc<LoopbackController>>>,
}

impl LoopbackFactory {
    pub fn new(relay: Arc<LoopbackRelay>) -> Self {
        Self {
            relay,
            built: Mutex::new(Vec::new()),
        }
    }

    /// The most recently built controller.
    pub fn last(&self) -> Option<Arc<LoopbackController>> {
        lock(&self.built).last().cloned()
    }

    pub fn built(&self) -> usize {
        lock(&self.built).len()
    }

    fn remember(&self, controller: Arc<LoopbackController>) -> Arc<dyn SessionController> {
        lock(&self.built).push(Arc::clone(&controller));
        controller
    }
}

impl ControllerFactory for LoopbackFactory {
    fn create(&self, ctx: ControllerContext) -> Result<Arc<dyn SessionController>, WormholeError> {
        debug!(side = %ctx.side, appid = %ctx.appid, "building loopback controller");
        let controller = LoopbackController::new(
            ctx.side,
            ctx.relay_url,
            Arc::clone(&self.relay),
            ctx.events,
        );
        Ok(self.remember(controller))
    }

    fn restore(
        &self,
        events: EventSink,
        state: serde_json::Value,
    ) -> Result<RestoredController, WormholeError> {
        let side = state
            .get("side")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WormholeError::Snapshot("loopback state has no side".into()))
            .and_then(Side::from_hex)?;
        let relay_url = state
            .get("relay_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| WormholeError::Snapshot("loopback state has no relay_url".into()))?
            .to_string();
        if state.get("phase").and_then(|v| v.as_str()) == Some(Phase::Closed.name()) {
            return Err(WormholeError::Snapshot("loopback session already closed".into()));
        }
        let outbox = match state.get("outbox").and_then(|v| v.as_array()) {
            Some(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .and_then(|h| hex::decode(h).ok())
                        .ok_or_else(|| WormholeError::Snapshot("bad loopback outbox".into()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        let controller =
            LoopbackController::new(side.clone(), relay_url.clone(), Arc::clone(&self.relay), events);
        {
            let mut s = lock(&controller.state);
            s.outbox = outbox;
            s.rejoin = state.get("code").and_then(|v| v.as_str()).map(str::to_string);
        }
        Ok(RestoredController {
            controller: self.remember(controller),
            side,
            relay_url,
        })
    }
}

/// Start a promise-style session on `factory` and return it together with
/// its controller.
pub fn spawn_session(
    factory: &LoopbackFactory,
    options: SessionOptions,
) -> Result<(Arc<PromiseWormhole>, Arc<LoopbackController>), WormholeError> {
    let wormhole = wormhole::create(APPID, RELAY_URL, factory, options)?;
    let controller = factory
        .last()
        .ok_or_else(|| WormholeError::Failed("factory built no controller".into()))?;
    Ok((wormhole, controller))
}

// ---------------------------------------------------------------------------
// Delegate
// ---------------------------------------------------------------------------

/// A notification received by a [`RecordingDelegate`].
#[derive(Debug, Clone, PartialEq)]
pub enum Note {
    Code(String),
    Verifier(Vec<u8>),
    Version(serde_json::Value),
    Received(Vec<u8>),
    Closed(ClosedResult),
}

/// Writes down every notification, in order.
#[derive(Default)]
pub struct RecordingDelegate {
    notes: Mutex<Vec<Note>>,
}

impl RecordingDelegate {
    pub fn notes(&self) -> Vec<Note> {
        lock(&self.notes).clone()
    }

    fn note(&self, note: Note) {
        lock(&self.notes).push(note);
    }
}

impl WormholeDelegate for RecordingDelegate {
    fn wormhole_got_code(&self, code: &str) {
        self.note(Note::Code(code.to_string()));
    }

    fn wormhole_got_verifier(&self, verifier: &[u8]) {
        self.note(Note::Verifier(verifier.to_vec()));
    }

    fn wormhole_got_version(&self, version: &serde_json::Value) {
        self.note(Note::Version(version.clone()));
    }

    fn wormhole_received(&self, payload: Vec<u8>) {
        self.note(Note::Received(payload));
    }

    fn wormhole_closed(&self, result: ClosedResult) {
        self.note(Note::Closed(result));
    }
}
