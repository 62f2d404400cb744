//! Errors raised while decoding wire types.

use thiserror::Error;

/// Failure to decode one of the JSON shapes in this crate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    /// The input was not valid JSON, or did not have the expected shape.
    #[error("invalid json: {0}")]
    InvalidJson(String),

    /// A snapshot carried a version tag this build does not understand.
    #[error("unsupported snapshot version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u64 },

    /// A mood string that is not one of the known close reasons.
    #[error("unknown mood: {0}")]
    UnknownMood(String),
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        ApiError::InvalidJson(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_message_names_both_sides() {
        let e = ApiError::UnsupportedVersion {
            found: 2,
            expected: 1,
        };
        assert_eq!(e.to_string(), "unsupported snapshot version 2 (expected 1)");
    }

    #[test]
    fn serde_errors_convert() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let api: ApiError = err.into();
        assert!(matches!(api, ApiError::InvalidJson(_)));
    }
}
