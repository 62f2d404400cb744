//! The session controller contract.
//!
//! The controller (historically "the Boss") owns the rendezvous protocol,
//! the key exchange, and the session state machine. This crate does not
//! implement one; it only defines the two halves of the conversation:
//!
//! - [`SessionController`]: commands the facade sends down.
//! - [`SessionEvents`]: events the controller sends up, implemented by both
//!   facade flavours and reached through an [`EventSink`].
//!
//! Event delivery is serialized: a controller never delivers two events to
//! the same facade concurrently. The facade never holds a lock while it
//! calls into the controller, so a controller may deliver events from inside
//! a command (for example, `closed` from inside `close`).

use std::sync::{Arc, Weak};

use wormhole_api::{Mood, WelcomeMessage};

use crate::error::{ClosedResult, WormholeError};
use crate::identity::Side;
use crate::trace::TraceLogger;

/// An interactive source of a code, handed to the controller by
/// `input_code`. The controller pulls lines until it has a full code.
pub trait CodeInput: Send {
    /// The next line the user typed, or `None` once input is exhausted.
    fn next_line(&mut self) -> Option<String>;
}

impl<I> CodeInput for I
where
    I: Iterator<Item = String> + Send,
{
    fn next_line(&mut self) -> Option<String> {
        self.next()
    }
}

/// Commands the facade relays to the session controller.
pub trait SessionController: Send + Sync {
    /// Begin connecting. Called exactly once, by the session factory.
    fn start(&self);

    /// Ask the server for a fresh nameplate and build a code of `length` words.
    fn allocate_code(&self, length: usize);

    /// Use a code obtained out-of-band.
    fn set_code(&self, code: &str);

    /// Read the code interactively from `input`.
    fn input_code(&self, input: Box<dyn CodeInput>);

    /// Queue application data for the peer.
    fn send(&self, payload: Vec<u8>);

    /// Request an orderly shutdown. The controller answers with `closed`.
    fn close(&self);

    /// Fail the session with `error`, closing with `mood`. The controller
    /// answers with `closed(Err(error))`.
    fn signal_error(&self, error: WormholeError, mood: Mood);

    /// Opaque controller state, for session snapshots.
    fn serialize(&self) -> serde_json::Value;

    /// Report transitions of the machines named in `which` to `logger`.
    fn set_trace(&self, client_name: &str, which: &str, logger: TraceLogger);
}

/// Events the controller delivers to the facade.
///
/// Apart from `received`, each event fires at most once, and `closed` is
/// always the last one.
pub trait SessionEvents: Send + Sync {
    fn got_code(&self, code: String);
    fn got_welcome(&self, welcome: WelcomeMessage);
    fn got_key(&self, key: Vec<u8>);
    fn got_verifier(&self, verifier: Vec<u8>);
    fn got_version(&self, version: serde_json::Value);
    fn received(&self, payload: Vec<u8>);
    fn closed(&self, result: ClosedResult);
}

/// The controller's handle on its facade.
///
/// Holds the facade weakly so that a controller stored inside the facade
/// does not keep it alive. Events sent after the facade is dropped are
/// discarded.
#[derive(Clone)]
pub struct EventSink {
    target: Weak<dyn SessionEvents>,
}

impl EventSink {
    /// Point a sink at `target`.
    pub fn attach<E>(target: &Arc<E>) -> Self
    where
        E: SessionEvents + 'static,
    {
        let target: Arc<dyn SessionEvents> = target.clone();
        Self {
            target: Arc::downgrade(&target),
        }
    }

    /// Point a sink at a facade that may still be under construction.
    pub(crate) fn from_weak<E>(target: Weak<E>) -> Self
    where
        E: SessionEvents + 'static,
    {
        let target: Weak<dyn SessionEvents> = target;
        Self { target }
    }

    /// Whether the facade is still alive.
    pub fn is_attached(&self) -> bool {
        self.target.strong_count() > 0
    }

    fn with(&self, event: &str, f: impl FnOnce(&dyn SessionEvents)) {
        match self.target.upgrade() {
            Some(target) => f(target.as_ref()),
            None => tracing::debug!("dropping {event} event: facade is gone"),
        }
    }

    pub fn got_code(&self, code: String) {
        self.with("got_code", |t| t.got_code(code));
    }

    pub fn got_welcome(&self, welcome: WelcomeMessage) {
        self.with("got_welcome", |t| t.got_welcome(welcome));
    }

    pub fn got_key(&self, key: Vec<u8>) {
        self.with("got_key", |t| t.got_key(key));
    }

    pub fn got_verifier(&self, verifier: Vec<u8>) {
        self.with("got_verifier", |t| t.got_verifier(verifier));
    }

    pub fn got_version(&self, version: serde_json::Value) {
        self.with("got_version", |t| t.got_version(version));
    }

    pub fn received(&self, payload: Vec<u8>) {
        self.with("received", |t| t.received(payload));
    }

    pub fn closed(&self, result: ClosedResult) {
        self.with("closed", |t| t.closed(result));
    }
}

/// What a [`ControllerFactory`] gets to build a fresh controller.
pub struct ControllerContext {
    pub side: Side,
    pub appid: String,
    pub relay_url: String,
    pub events: EventSink,
}

/// A controller rebuilt from a snapshot, with the identity it was saved
/// under. The restored facade adopts both.
pub struct RestoredController {
    pub controller: Arc<dyn SessionController>,
    pub side: Side,
    pub relay_url: String,
}

/// Builds session controllers for the session factory.
pub trait ControllerFactory {
    /// A controller for a brand-new session.
    fn create(&self, ctx: ControllerContext) -> Result<Arc<dyn SessionController>, WormholeError>;

    /// A controller rehydrated from the `boss` part of a snapshot.
    ///
    /// The facade is still being built while this runs, so events sent
    /// through `events` before it returns are discarded.
    fn restore(
        &self,
        events: EventSink,
        state: serde_json::Value,
    ) -> Result<RestoredController, WormholeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collect(Mutex<Vec<String>>);

    impl SessionEvents for Collect {
        fn got_code(&self, code: String) {
            self.0.lock().unwrap().push(format!("code {code}"));
        }
        fn got_welcome(&self, _: WelcomeMessage) {
            self.0.lock().unwrap().push("welcome".into());
        }
        fn got_key(&self, _: Vec<u8>) {
            self.0.lock().unwrap().push("key".into());
        }
        fn got_verifier(&self, _: Vec<u8>) {
            self.0.lock().unwrap().push("verifier".into());
        }
        fn got_version(&self, _: serde_json::Value) {
            self.0.lock().unwrap().push("version".into());
        }
        fn received(&self, payload: Vec<u8>) {
            self.0.lock().unwrap().push(format!("received {}", payload.len()));
        }
        fn closed(&self, result: ClosedResult) {
            self.0.lock().unwrap().push(format!("closed {result:?}"));
        }
    }

    #[test]
    fn sink_delivers_while_attached() {
        let target = Arc::new(Collect::default());
        let sink = EventSink::attach(&target);
        assert!(sink.is_attached());

        sink.got_code("4-purple-sausages".into());
        sink.received(vec![1, 2, 3]);
        sink.closed(Ok("happy".into()));

        assert_eq!(
            *target.0.lock().unwrap(),
            vec![
                "code 4-purple-sausages".to_string(),
                "received 3".to_string(),
                "closed Ok(\"happy\")".to_string(),
            ]
        );
    }

    #[test]
    fn sink_drops_events_after_facade_is_gone() {
        let target = Arc::new(Collect::default());
        let sink = EventSink::attach(&target);
        drop(target);
        assert!(!sink.is_attached());
        sink.got_code("ignored".into());
    }

    #[test]
    fn sink_made_during_construction_delivers_afterwards() {
        let mut early = None;
        let target = Arc::new_cyclic(|me: &Weak<Collect>| {
            let sink = EventSink::from_weak(me.clone());
            sink.got_code("too early".into());
            early = Some(sink);
            Collect::default()
        });
        let sink = early.unwrap();
        sink.got_code("4-purple-sausages".into());
        assert_eq!(*target.0.lock().unwrap(), vec!["code 4-purple-sausages".to_string()]);
    }

    #[test]
    fn iterators_are_code_inputs() {
        let mut input: Box<dyn CodeInput> = Box::new(vec!["4-".to_string()].into_iter());
        assert_eq!(input.next_line().as_deref(), Some("4-"));
        assert_eq!(input.next_line(), None);
    }
}
