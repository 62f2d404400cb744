//! Promise-style facade: every event is something you can await.
//!
//! ```text
//! let w = wormhole::create(APPID, RELAY, &controllers, SessionOptions::default())?;
//! w.allocate_code(2);
//! let code = w.when_code().await?;       // show this to the user
//! let verifier = w.when_verifier().await?;
//! w.send(b"hello".to_vec());
//! let reply = w.when_received().await?;
//! let mood = w.close().await?;           // "happy"
//! ```
//!
//! Each `when_*` call registers its observation immediately, so
//! observations of one kind resolve in the order they were requested.
//! Values that arrive before anyone asks are kept: code, verifier and
//! version are cached, received payloads are queued.
//!
//! When the session ends, every pending observation fails. If the session
//! failed, they fail with that error and so does `close()`. If it closed
//! cleanly, they fail with [`WormholeError::Closed`] while `close()`
//! resolves with the plain reason.

use std::sync::{Mutex, MutexGuard};

use tracing::debug;
use wormhole_api::WelcomeMessage;

use crate::controller::SessionEvents;
use crate::error::{ClosedResult, WormholeError};
use crate::facade::{FacadeCore, Wormhole};
use crate::observer::{Fifo, Latch, Observation};

struct PromiseState {
    code: Latch<String>,
    verifier: Latch<Vec<u8>>,
    version: Latch<serde_json::Value>,
    received: Fifo<Vec<u8>>,
    /// Sticky failure for every `when_*` call once the session ended.
    observer_error: Option<WormholeError>,
    closed_result: Option<ClosedResult>,
    close_waiters: Vec<tokio::sync::oneshot::Sender<ClosedResult>>,
}

/// A wormhole whose events are consumed as [`Observation`] futures.
pub struct PromiseWormhole {
    core: FacadeCore,
    state: Mutex<PromiseState>,
}

impl PromiseWormhole {
    pub(crate) fn new(core: FacadeCore) -> Self {
        Self {
            core,
            state: Mutex::new(PromiseState {
                code: Latch::new(),
                verifier: Latch::new(),
                version: Latch::new(),
                received: Fifo::new(),
                observer_error: None,
                closed_result: None,
                close_waiters: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PromiseState> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn observe<T: Clone>(
        &self,
        pick: impl FnOnce(&mut PromiseState) -> &mut Latch<T>,
    ) -> Observation<T> {
        let mut state = self.lock();
        if let Some(error) = &state.observer_error {
            return Observation::ready(Err(error.clone()));
        }
        pick(&mut *state).observe()
    }

    /// The code, once the controller has one.
    pub fn when_code(&self) -> Observation<String> {
        self.observe(|s| &mut s.code)
    }

    /// The verifier, once the key exchange has finished.
    pub fn when_verifier(&self) -> Observation<Vec<u8>> {
        self.observe(|s| &mut s.verifier)
    }

    /// The peer's version data, once negotiated.
    pub fn when_version(&self) -> Observation<serde_json::Value> {
        self.observe(|s| &mut s.version)
    }

    /// The oldest payload not yet handed out, or the next one to arrive.
    pub fn when_received(&self) -> Observation<Vec<u8>> {
        let mut state = self.lock();
        if let Some(error) = &state.observer_error {
            return Observation::ready(Err(error.clone()));
        }
        state.received.request()
    }

    /// Close the session.
    ///
    /// The first call asks the controller to close; later calls (and calls
    /// after the session ended on its own) never contact it again and
    /// resolve with the same terminal value.
    pub fn close(&self) -> Observation<String> {
        let observation = {
            let mut state = self.lock();
            if let Some(result) = &state.closed_result {
                return Observation::ready(result.clone());
            }
            if !self.core.is_bound() {
                return Observation::ready(Err(WormholeError::Failed(
                    "no session controller bound".into(),
                )));
            }
            let (observation, tx) = Observation::waiting();
            state.close_waiters.push(tx);
            observation
        };
        self.core.request_close();
        observation
    }
}

impl Wormhole for PromiseWormhole {
    fn core(&self) -> &FacadeCore {
        &self.core
    }
}

impl SessionEvents for PromiseWormhole {
    fn got_code(&self, code: String) {
        if !self.lock().code.set(code) {
            debug!(side = %self.core.side(), "duplicate code event ignored");
        }
    }

    fn got_welcome(&self, welcome: WelcomeMessage) {
        self.core.on_welcome(&welcome);
    }

    fn got_key(&self, key: Vec<u8>) {
        self.core.on_key(key);
    }

    fn got_verifier(&self, verifier: Vec<u8>) {
        if !self.lock().verifier.set(verifier) {
            debug!(side = %self.core.side(), "duplicate verifier event ignored");
        }
    }

    fn got_version(&self, version: serde_json::Value) {
        if !self.lock().version.set(version) {
            debug!(side = %self.core.side(), "duplicate version event ignored");
        }
    }

    fn received(&self, payload: Vec<u8>) {
        self.lock().received.deliver(payload);
    }

    fn closed(&self, result: ClosedResult) {
        if !self.core.on_closed() {
            return;
        }

        let observer_error = match &result {
            Err(error) => error.clone(),
            Ok(reason) => WormholeError::Closed(reason.clone()),
        };

        let mut guard = self.lock();
        let state = &mut *guard;
        state.code.fail_waiters(&observer_error);
        state.verifier.fail_waiters(&observer_error);
        state.version.fail_waiters(&observer_error);
        state.received.fail_waiters(&observer_error);
        for tx in state.close_waiters.drain(..) {
            let _ = tx.send(result.clone());
        }
        state.observer_error = Some(observer_error);
        state.closed_result = Some(result);
    }
}
