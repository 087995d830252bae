use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The alias text produced by the cipher for a row id.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CipherToken(String);

impl CipherToken {
    /// Wraps text produced by the cipher engine or read back from a store.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for CipherToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CipherToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for CipherToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
