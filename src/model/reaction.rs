use serde::{Deserialize, Serialize};
use std::fmt;

/// Reader reaction attached to a push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Reaction {
    Positive,
    Neutral,
    Negative,
}

impl Reaction {
    /// Classifies the push marker shown in front of a push
    ///
    /// `推` is positive and `噓` is negative. Everything else, including the
    /// `→` continuation marker and markers we have never seen, is neutral.
    pub fn from_marker(marker: &str) -> Self {
        match marker.trim() {
            "推" => Self::Positive,
            "噓" => Self::Negative,
            _ => Self::Neutral,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Positive => "+1",
            Self::Neutral => "0",
            Self::Negative => "-1",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "+1" => Some(Self::Positive),
            "0" => Some(Self::Neutral),
            "-1" => Some(Self::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Reaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}
