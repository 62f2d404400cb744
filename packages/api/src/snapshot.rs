//! Session snapshot envelope: what a delegate-style session serializes to.

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// The only snapshot version this build reads or writes.
pub const SERIALIZED_WORMHOLE_VERSION: u64 = 1;

/// A versioned envelope around the session controller's own state.
///
/// The facade owns the envelope; the `boss` payload belongs to the
/// controller and is never inspected here.
///
/// ```json
/// { "serialized_wormhole_version": 1, "boss": { "...": "controller state" } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SerializedWormhole {
    #[serde(alias = "serializedWormholeVersion")]
    pub serialized_wormhole_version: u64,

    /// Opaque controller state.
    pub boss: serde_json::Value,
}

impl SerializedWormhole {
    /// Wrap controller state in a current-version envelope.
    pub fn new(boss: serde_json::Value) -> Self {
        Self {
            serialized_wormhole_version: SERIALIZED_WORMHOLE_VERSION,
            boss,
        }
    }

    /// Parse and version-check a snapshot from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ApiError> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    /// Fail unless the envelope carries [`SERIALIZED_WORMHOLE_VERSION`].
    pub fn check_version(&self) -> Result<(), ApiError> {
        if self.serialized_wormhole_version != SERIALIZED_WORMHOLE_VERSION {
            return Err(ApiError::UnsupportedVersion {
                found: self.serialized_wormhole_version,
                expected: SERIALIZED_WORMHOLE_VERSION,
            });
        }
        Ok(())
    }
}
