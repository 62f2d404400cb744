//! Observations and the bookkeeping behind them.
//!
//! An [`Observation`] is the future handed out by the promise-style facade.
//! It is either born resolved (the value was already known) or backed by a
//! `tokio::sync::oneshot` channel whose sender is parked in one of the
//! containers below until the matching event arrives.
//!
//! - [`Latch`]: a write-once value plus the observers waiting for it.
//! - [`Fifo`]: payloads and requests paired first-come-first-served.
//!
//! Both are plain data; the facade wraps them in its own lock.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::WormholeError;

type Resolver<T> = oneshot::Sender<Result<T, WormholeError>>;

/// A value (or failure) that becomes available once.
///
/// Resolves to `Err(WormholeError::ObserverGone)` if the facade is dropped
/// before it resolves, or if it is polled again after completing.
#[must_use = "an observation does nothing unless awaited"]
pub struct Observation<T> {
    state: State<T>,
}

enum State<T> {
    Ready(Option<Result<T, WormholeError>>),
    Waiting(oneshot::Receiver<Result<T, WormholeError>>),
}

impl<T> Observation<T> {
    pub(crate) fn ready(result: Result<T, WormholeError>) -> Self {
        Self {
            state: State::Ready(Some(result)),
        }
    }

    pub(crate) fn waiting() -> (Self, Resolver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                state: State::Waiting(rx),
            },
            tx,
        )
    }
}

// The inner receiver is Unpin and the ready value is only ever moved out.
impl<T> Unpin for Observation<T> {}

impl<T> Future for Observation<T> {
    type Output = Result<T, WormholeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = match &mut self.state {
            State::Ready(result) => {
                return Poll::Ready(result.take().unwrap_or(Err(WormholeError::ObserverGone)));
            }
            State::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(received) => received.unwrap_or(Err(WormholeError::ObserverGone)),
            },
        };
        // A completed receiver must not be polled again.
        self.state = State::Ready(None);
        Poll::Ready(result)
    }
}

impl<T> std::fmt::Debug for Observation<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Ready(Some(_)) => "ready",
            State::Ready(None) => "consumed",
            State::Waiting(_) => "waiting",
        };
        f.debug_struct("Observation").field("state", &state).finish()
    }
}

// ---------------------------------------------------------------------------
// Latch
// ---------------------------------------------------------------------------

/// A write-once value and the observers waiting for it.
pub(crate) struct Latch<T> {
    value: Option<T>,
    waiters: Vec<Resolver<T>>,
}

impl<T: Clone> Latch<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: None,
            waiters: Vec::new(),
        }
    }

    /// Resolve immediately if set, otherwise register a waiter.
    pub(crate) fn observe(&mut self) -> Observation<T> {
        if let Some(value) = &self.value {
            return Observation::ready(Ok(value.clone()));
        }
        let (observation, tx) = Observation::waiting();
        self.waiters.push(tx);
        observation
    }

    /// Set the value and resolve every waiter in registration order.
    /// Returns `false`, leaving the first value in place, if already set.
    pub(crate) fn set(&mut self, value: T) -> bool {
        if self.value.is_some() {
            return false;
        }
        for tx in self.waiters.drain(..) {
            let _ = tx.send(Ok(value.clone()));
        }
        self.value = Some(value);
        true
    }

    /// Fail every waiter with `error`. Later observers are unaffected.
    pub(crate) fn fail_waiters(&mut self, error: &WormholeError) {
        for tx in self.waiters.drain(..) {
            let _ = tx.send(Err(error.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Fifo
// ---------------------------------------------------------------------------

/// Delivered payloads and outstanding requests, paired in arrival order.
///
/// At most one of the two queues is non-empty at any time.
pub(crate) struct Fifo<T> {
    pending: VecDeque<T>,
    waiters: VecDeque<Resolver<T>>,
}

impl<T> Fifo<T> {
    pub(crate) fn new() -> Self {
        Self {
            pending: VecDeque::new(),
            waiters: VecDeque::new(),
        }
    }

    /// Take the oldest undelivered payload, or queue a request for the next.
    pub(crate) fn request(&mut self) -> Observation<T> {
        if let Some(value) = self.pending.pop_front() {
            return Observation::ready(Ok(value));
        }
        let (observation, tx) = Observation::waiting();
        self.waiters.push_back(tx);
        observation
    }

    /// Hand `value` to the oldest live request, or queue it.
    ///
    /// A request whose observation was dropped does not consume a payload.
    pub(crate) fn deliver(&mut self, mut value: T) {
        while let Some(tx) = self.waiters.pop_front() {
            match tx.send(Ok(value)) {
                Ok(()) => return,
                Err(Ok(returned)) => value = returned,
                Err(Err(_)) => return,
            }
        }
        self.pending.push_back(value);
    }

    /// Fail every outstanding request with `error`.
    pub(crate) fn fail_waiters(&mut self, error: &WormholeError) {
        for tx in self.waiters.drain(..) {
            let _ = tx.send(Err(error.clone()));
        }
    }

    #[cfg(test)]
    pub(crate) fn queued(&self) -> (usize, usize) {
        (self.pending.len(), self.waiters.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;

    #[test]
    fn ready_observation_resolves_immediately() {
        let obs = Observation::ready(Ok(7));
        assert_eq!(obs.now_or_never(), Some(Ok(7)));
    }

    #[test]
    fn latch_resolves_waiters_in_order_then_caches() {
        let mut latch = Latch::new();
        let first = latch.observe();
        let second = latch.observe();
        assert!(latch.get().is_none());

        assert!(latch.set("4-purple-sausages".to_string()));
        assert_eq!(first.now_or_never(), Some(Ok("4-purple-sausages".to_string())));
        assert_eq!(second.now_or_never(), Some(Ok("4-purple-sausages".to_string())));

        let late = latch.observe();
        assert_eq!(late.now_or_never(), Some(Ok("4-purple-sausages".to_string())));
    }

    #[test]
    fn latch_keeps_first_value() {
        let mut latch = Latch::new();
        assert!(latch.set(1));
        assert!(!latch.set(2));
        assert_eq!(latch.get(), Some(&1));
    }

    #[test]
    fn latch_failure_reaches_pending_only() {
        let mut latch: Latch<u8> = Latch::new();
        let pending = latch.observe();
        latch.fail_waiters(&WormholeError::Closed("bye".into()));
        assert_eq!(
            pending.now_or_never(),
            Some(Err(WormholeError::Closed("bye".into())))
        );
    }

    #[test]
    fn pending_observation_is_not_ready() {
        let mut latch: Latch<u8> = Latch::new();
        let pending = latch.observe();
        assert!(pending.now_or_never().is_none());
    }

    #[test]
    fn repolling_a_resolved_waiter_reports_observer_gone() {
        let mut latch = Latch::new();
        let mut pending = latch.observe();
        latch.set(1);
        assert_eq!((&mut pending).now_or_never(), Some(Ok(1)));
        assert_eq!(
            (&mut pending).now_or_never(),
            Some(Err(WormholeError::ObserverGone))
        );
    }

    #[test]
    fn dropped_resolver_reports_observer_gone() {
        let mut latch: Latch<u8> = Latch::new();
        let pending = latch.observe();
        drop(latch);
        assert_eq!(pending.now_or_never(), Some(Err(WormholeError::ObserverGone)));
    }

    #[test]
    fn fifo_pairs_payloads_before_requests() {
        let mut fifo = Fifo::new();
        fifo.deliver(b"one".to_vec());
        fifo.deliver(b"two".to_vec());
        assert_eq!(fifo.queued(), (2, 0));

        assert_eq!(fifo.request().now_or_never(), Some(Ok(b"one".to_vec())));
        assert_eq!(fifo.request().now_or_never(), Some(Ok(b"two".to_vec())));
        assert_eq!(fifo.queued(), (0, 0));
    }

    #[test]
    fn fifo_pairs_requests_before_payloads() {
        let mut fifo = Fifo::new();
        let a = fifo.request();
        let b = fifo.request();
        assert_eq!(fifo.queued(), (0, 2));

        fifo.deliver(b"one".to_vec());
        fifo.deliver(b"two".to_vec());
        fifo.deliver(b"three".to_vec());
        assert_eq!(fifo.queued(), (1, 0));

        assert_eq!(a.now_or_never(), Some(Ok(b"one".to_vec())));
        assert_eq!(b.now_or_never(), Some(Ok(b"two".to_vec())));
    }

    #[test]
    fn fifo_skips_abandoned_requests() {
        let mut fifo = Fifo::new();
        let abandoned = fifo.request();
        let kept = fifo.request();
        drop(abandoned);

        fifo.deliver(b"only".to_vec());
        assert_eq!(kept.now_or_never(), Some(Ok(b"only".to_vec())));
        assert_eq!(fifo.queued(), (0, 0));
    }
}
