//! Delegate-style facade: events are pushed to an application object.
//!
//! Nothing is buffered: each event is handed to the [`WormholeDelegate`]
//! as soon as the controller delivers it, on the controller's thread. A
//! panicking delegate is not shielded; the panic propagates into the
//! controller.
//!
//! Welcome messages are evaluated by the facade core but not forwarded to
//! the delegate.

use std::sync::Arc;

use tracing::debug;
use wormhole_api::{SerializedWormhole, WelcomeMessage};

use crate::controller::SessionEvents;
use crate::error::{ClosedResult, WormholeError};
use crate::facade::{FacadeCore, Wormhole};

/// The notifications a delegate-style application must handle.
pub trait WormholeDelegate: Send + Sync {
    fn wormhole_got_code(&self, code: &str);
    fn wormhole_got_verifier(&self, verifier: &[u8]);
    fn wormhole_got_version(&self, version: &serde_json::Value);
    fn wormhole_received(&self, payload: Vec<u8>);
    /// The session ended. Called exactly once.
    fn wormhole_closed(&self, result: ClosedResult);
}

/// A wormhole that reports its events to a [`WormholeDelegate`].
pub struct DelegatedWormhole {
    core: FacadeCore,
    delegate: Arc<dyn WormholeDelegate>,
}

impl DelegatedWormhole {
    pub(crate) fn new(core: FacadeCore, delegate: Arc<dyn WormholeDelegate>) -> Self {
        Self { core, delegate }
    }

    /// Ask the controller to close. The outcome arrives through
    /// [`WormholeDelegate::wormhole_closed`]; calling this again, or after
    /// the session ended, does nothing.
    pub fn close(&self) {
        self.core.request_close();
    }

    /// Snapshot the session so it can be resumed with
    /// [`from_serialized`](crate::from_serialized).
    pub fn serialize(&self) -> Result<SerializedWormhole, WormholeError> {
        Ok(SerializedWormhole::new(self.core.serialize_controller()?))
    }
}

impl Wormhole for DelegatedWormhole {
    fn core(&self) -> &FacadeCore {
        &self.core
    }
}

impl SessionEvents for DelegatedWormhole {
    fn got_code(&self, code: String) {
        self.delegate.wormhole_got_code(&code);
    }

    fn got_welcome(&self, welcome: WelcomeMessage) {
        self.core.on_welcome(&welcome);
    }

    fn got_key(&self, key: Vec<u8>) {
        self.core.on_key(key);
    }

    fn got_verifier(&self, verifier: Vec<u8>) {
        self.delegate.wormhole_got_verifier(&verifier);
    }

    fn got_version(&self, version: serde_json::Value) {
        self.delegate.wormhole_got_version(&version);
    }

    fn received(&self, payload: Vec<u8>) {
        self.delegate.wormhole_received(payload);
    }

    fn closed(&self, result: ClosedResult) {
        if !self.core.on_closed() {
            debug!(side = %self.core.side(), "not notifying delegate twice");
            return;
        }
        self.delegate.wormhole_closed(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use wormhole_api::Mood;

    use crate::controller::EventSink;
    use crate::identity::Side;
    use crate::testing::{Call, RecordingController};
    use crate::welcome::WelcomeEvaluator;

    #[derive(Default)]
    struct Notes(Mutex<Vec<String>>);

    impl Notes {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    impl WormholeDelegate for Notes {
        fn wormhole_got_code(&self, code: &str) {
            self.0.lock().unwrap().push(format!("code {code}"));
        }
        fn wormhole_got_verifier(&self, verifier: &[u8]) {
            self.0.lock().unwrap().push(format!("verifier {}", hex::encode(verifier)));
        }
        fn wormhole_got_version(&self, version: &serde_json::Value) {
            self.0.lock().unwrap().push(format!("version {version}"));
        }
        fn wormhole_received(&self, payload: Vec<u8>) {
            self.0
                .lock()
                .unwrap()
                .push(format!("received {}", String::from_utf8_lossy(&payload)));
        }
        fn wormhole_closed(&self, result: ClosedResult) {
            self.0.lock().unwrap().push(format!("closed {result:?}"));
        }
    }

    fn delegated(echo: bool) -> (Arc<DelegatedWormhole>, Arc<Notes>, Arc<RecordingController>) {
        let notes = Arc::new(Notes::default());
        let w = Arc::new(DelegatedWormhole::new(
            FacadeCore::new(
                Side::generate(),
                Arc::new(WelcomeEvaluator::new("ws://relay.test/v1", "0.9.1")),
            ),
            notes.clone(),
        ));
        let controller = if echo {
            Arc::new(RecordingController::echoing(EventSink::attach(&w)))
        } else {
            Arc::new(RecordingController::default())
        };
        w.core.bind(controller.clone()).unwrap();
        (w, notes, controller)
    }

    #[test]
    fn events_are_forwarded_immediately_in_order() {
        let (w, notes, _) = delegated(false);
        w.got_code("4-purple-sausages".into());
        w.got_key(b"k".to_vec());
        w.got_verifier(vec![0xab, 0xcd]);
        w.got_version(serde_json::json!({}));
        w.received(b"one".to_vec());
        w.received(b"two".to_vec());
        w.closed(Ok("happy".into()));

        assert_eq!(
            notes.take(),
            vec![
                "code 4-purple-sausages",
                "verifier abcd",
                "version {}",
                "received one",
                "received two",
                "closed Ok(\"happy\")",
            ]
        );
    }

    #[test]
    fn welcome_is_not_forwarded() {
        let (w, notes, controller) = delegated(false);
        w.got_welcome(WelcomeMessage::default().with_motd("hello"));
        assert!(notes.take().is_empty());
        assert!(controller.calls().is_empty());
    }

    #[test]
    fn fatal_welcome_reaches_delegate_as_closed() {
        let (w, notes, controller) = delegated(true);
        w.got_welcome(WelcomeMessage::default().with_error("go away"));
        assert_eq!(
            controller.calls(),
            vec![Call::SignalError(
                WormholeError::Welcome("go away".into()),
                Mood::Unwelcome
            )]
        );
        assert_eq!(
            notes.take(),
            vec![format!("closed {:?}", ClosedResult::Err(WormholeError::Welcome("go away".into())))]
        );
    }

    #[test]
    fn close_notifies_once_and_contacts_controller_once() {
        let (w, notes, controller) = delegated(true);
        w.close();
        w.close();
        assert_eq!(controller.count(&Call::Close), 1);
        assert_eq!(notes.take(), vec!["closed Ok(\"happy\")"]);
    }

    #[test]
    fn derive_key_gated_on_key_and_close() {
        let (w, _, _) = delegated(false);
        assert_eq!(w.derive_key("purpose", 16), Err(WormholeError::NoKey));
        w.got_key(b"k".to_vec());
        assert_eq!(w.derive_key("purpose", 16).unwrap().len(), 16);
        w.closed(Err(WormholeError::Lonely));
        assert_eq!(w.derive_key("purpose", 16), Err(WormholeError::NoKey));
    }

    #[test]
    fn serialize_wraps_controller_state() {
        let (w, _, _) = delegated(false);
        w.send(b"x".to_vec());
        let snapshot = w.serialize().unwrap();
        assert_eq!(snapshot.serialized_wormhole_version, 1);
        assert_eq!(snapshot.boss["calls"], 1);
    }
}
