//! Session identity: the random "side" token.
//!
//! Each session picks a fresh side when it is created. The rendezvous
//! protocol uses it to tell our messages from the peer's; it carries no
//! secret and is never reused across sessions.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::WormholeError;

/// Number of random bytes in a side.
const SIDE_BYTES: usize = 5;

/// An opaque per-session identity token: 5 random bytes, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Side(String);

impl Side {
    /// Generate a fresh side using OS randomness.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SIDE_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Use a known side, e.g. when a test needs a stable value.
    ///
    /// The input must be lowercase hex of exactly 5 bytes.
    pub fn from_hex(side: &str) -> Result<Self, WormholeError> {
        let bytes = hex::decode(side)
            .map_err(|e| WormholeError::InvalidArgument(format!("side is not hex: {e}")))?;
        if bytes.len() != SIDE_BYTES || side.chars().any(|c| c.is_ascii_uppercase()) {
            return Err(WormholeError::InvalidArgument(format!(
                "side must be {SIDE_BYTES} bytes of lowercase hex"
            )));
        }
        Ok(Self(side.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
