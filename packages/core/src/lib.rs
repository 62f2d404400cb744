//! Client-facing facade for a wormhole session.
//!
//! A wormhole is a secure channel between two peers who share a short
//! human-readable code. The hard parts (rendezvous protocol, key exchange,
//! the session state machine) live in a *session controller* that this
//! crate consumes through the [`SessionController`] / [`SessionEvents`]
//! contract. This crate turns the controller's events into an API an
//! application can use, in one of two styles:
//!
//! | Style | Type | How events arrive |
//! |---|---|---|
//! | Promise | [`PromiseWormhole`] | `when_code().await`, `when_received().await`, … |
//! | Delegate | [`DelegatedWormhole`] | calls on your [`WormholeDelegate`] |
//!
//! Both share one [`FacadeCore`] and the [`Wormhole`] command trait.
//!
//! # Crate layout
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`controller`] | Controller contract, event sink, controller factory |
//! | [`facade`] | Shared core and command trait |
//! | [`promise`] | Promise-style facade |
//! | [`delegate`] | Delegate-style facade |
//! | [`factory`] | `create`, `create_with_delegate`, `from_serialized` |
//! | [`welcome`] | Server welcome evaluation |
//! | [`key`] | Session key and purpose-bound key derivation |
//! | [`observer`] | The [`Observation`] future |
//! | [`config`] | [`SessionOptions`] |
//! | [`trace`] | Controller state-machine tracing hook |
//!
//! # Quick start
//!
//! ```rust,ignore
//! use wormhole::{create, SessionOptions, Wormhole};
//!
//! let w = create("example.com/chat", RELAY_URL, &my_controllers, SessionOptions::from_env())?;
//! w.allocate_code(2);
//! println!("code: {}", w.when_code().await?);
//! w.when_verifier().await?;
//! w.send(b"hello".to_vec());
//! let reply = w.when_received().await?;
//! w.close().await?;
//! ```

pub mod config;
pub mod controller;
pub mod delegate;
pub mod error;
pub mod facade;
pub mod factory;
pub mod identity;
pub mod key;
pub mod observer;
pub mod promise;
pub mod trace;
pub mod welcome;

#[cfg(test)]
mod testing;

pub use config::{SessionOptions, TraceConfig, CLIENT_VERSION};
pub use controller::{
    CodeInput, ControllerContext, ControllerFactory, EventSink, RestoredController,
    SessionController, SessionEvents,
};
pub use delegate::{DelegatedWormhole, WormholeDelegate};
pub use error::{ClosedResult, WormholeError};
pub use facade::{FacadeCore, Wormhole, DEFAULT_CODE_LENGTH};
pub use factory::{create, create_with_delegate, from_serialized};
pub use identity::Side;
pub use key::{derive_key, SessionKey};
pub use observer::Observation;
pub use promise::PromiseWormhole;
pub use trace::{TraceEvent, TraceLogger, DEFAULT_TRACE_MACHINES};
pub use welcome::{WelcomeEvaluator, WelcomeHandler, WelcomeOutcome, WelcomeWarning};

pub use wormhole_api::{Mood, SerializedWormhole, WelcomeMessage};
