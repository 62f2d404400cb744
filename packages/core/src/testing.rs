//! A controller that only records what it is told, for unit tests.

use std::sync::Mutex;

use wormhole_api::Mood;

use crate::controller::{CodeInput, EventSink, SessionController};
use crate::error::WormholeError;
use crate::trace::TraceLogger;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Start,
    AllocateCode(usize),
    SetCode(String),
    InputCode(Option<String>),
    Send(Vec<u8>),
    Close,
    SignalError(WormholeError, Mood),
    SetTrace(String, String),
}

/// Records every command. When given a sink, answers `close` and
/// `signal_error` with `closed` the way a real controller would.
#[derive(Default)]
pub(crate) struct RecordingController {
    calls: Mutex<Vec<Call>>,
    echo: Mutex<Option<EventSink>>,
}

impl RecordingController {
    pub(crate) fn echoing(events: EventSink) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            echo: Mutex::new(Some(events)),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, call: &Call) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn echo(&self) -> Option<EventSink> {
        self.echo.lock().unwrap().clone()
    }
}

impl SessionController for RecordingController {
    fn start(&self) {
        self.record(Call::Start);
    }

    fn allocate_code(&self, length: usize) {
        self.record(Call::AllocateCode(length));
    }

    fn set_code(&self, code: &str) {
        self.record(Call::SetCode(code.to_string()));
    }

    fn input_code(&self, mut input: Box<dyn CodeInput>) {
        self.record(Call::InputCode(input.next_line()));
    }

    fn send(&self, payload: Vec<u8>) {
        self.record(Call::Send(payload));
    }

    fn close(&self) {
        self.record(Call::Close);
        if let Some(events) = self.echo() {
            events.closed(Ok(Mood::Happy.to_string()));
        }
    }

    fn signal_error(&self, error: WormholeError, mood: Mood) {
        self.record(Call::SignalError(error.clone(), mood));
        if let Some(events) = self.echo() {
            events.closed(Err(error));
        }
    }

    fn serialize(&self) -> serde_json::Value {
        serde_json::json!({ "calls": self.calls.lock().unwrap().len() })
    }

    fn set_trace(&self, client_name: &str, which: &str, _logger: TraceLogger) {
        self.record(Call::SetTrace(client_name.to_string(), which.to_string()));
    }
}
