//! Record identifiers
//!
//! Every network, token and NFT record carries a `Guid`. Fresh identifiers are
//! UUID v4 strings; identifiers read back from storage are kept verbatim, since
//! legacy data may hold ids produced by older generators.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique record identifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Guid(String);

impl Guid {
    /// Generate a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the identifier is an empty string (treated as missing)
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for Guid {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for Guid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Guid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
