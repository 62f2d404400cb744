//! Close moods: the reason string a session ends with.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Why a session ended.
///
/// The controller reports a graceful close with one of these as the plain
/// close reason; the non-`Happy` moods usually accompany an error.
///
/// | Mood | Meaning |
/// |------|---------|
/// | `happy` | the peer connected and the key was confirmed |
/// | `lonely` | the session closed before a peer showed up |
/// | `scary` | key confirmation failed (wrong code or active attack) |
/// | `errory` | an internal or server error ended the session |
/// | `unwelcome` | the server refused us in its welcome message |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    Happy,
    Lonely,
    Scary,
    Errory,
    Unwelcome,
}

impl Mood {
    pub fn as_str(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Lonely => "lonely",
            Mood::Scary => "scary",
            Mood::Errory => "errory",
            Mood::Unwelcome => "unwelcome",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "happy" => Ok(Mood::Happy),
            "lonely" => Ok(Mood::Lonely),
            "scary" => Ok(Mood::Scary),
            "errory" => Ok(Mood::Errory),
            "unwelcome" => Ok(Mood::Unwelcome),
            other => Err(ApiError::UnknownMood(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Mood::Unwelcome).unwrap(), r#""unwelcome""#);
    }

    #[test]
    fn parse_matches_display() {
        for mood in [Mood::Happy, Mood::Lonely, Mood::Scary, Mood::Errory, Mood::Unwelcome] {
            assert_eq!(mood.to_string().parse::<Mood>().unwrap(), mood);
        }
    }

    #[test]
    fn unknown_mood_rejected() {
        assert_eq!(
            "grumpy".parse::<Mood>(),
            Err(ApiError::UnknownMood("grumpy".into()))
        );
    }
}
