//! Wire-level types for the wormhole session facade.
//!
//! This crate encodes the few JSON shapes the facade touches directly as
//! Rust types. Everything else the rendezvous server and the session
//! controller exchange is opaque to the facade and stays out of here.
//!
//! # Types covered
//!
//! | JSON shape | Type |
//! |------------|------|
//! | Server welcome (`{"motd": …, "current_cli_version": …, "error": …}`) | [`WelcomeMessage`] |
//! | Session snapshot (`{"serialized_wormhole_version": 1, "boss": …}`) | [`SerializedWormhole`] |
//! | Close reason (`"happy"`, `"lonely"`, …) | [`Mood`] |

pub mod error;
pub mod mood;
pub mod snapshot;
pub mod welcome;

pub use error::ApiError;
pub use mood::Mood;
pub use snapshot::{SerializedWormhole, SERIALIZED_WORMHOLE_VERSION};
pub use welcome::WelcomeMessage;
