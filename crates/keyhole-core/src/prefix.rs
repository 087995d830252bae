use crate::error::ConfigError;
use crate::token::CipherToken;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// The short-URL base under which cipher tokens are served.
///
/// Trailing slashes are stripped on construction, so `https://s.test/x/` and
/// `https://s.test/x` name the same prefix.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Prefix(String);

impl Prefix {
    pub fn new(prefix: impl AsRef<str>) -> Result<Self, ConfigError> {
        let trimmed = prefix.as_ref().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidPrefix(
                "prefix cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Renders the full short URL for `token`.
    pub fn to_url(&self, token: &CipherToken) -> String {
        format!("{}/{}", self.0, token)
    }

    /// Returns the token part of `short_url` if it was built from this prefix.
    ///
    /// Yields `None` when the input does not start with `prefix + "/"` or when
    /// nothing follows the separator.
    pub fn strip<'a>(&self, short_url: &'a str) -> Option<&'a str> {
        let rest = short_url.strip_prefix(self.0.as_str())?;
        let token = rest.strip_prefix('/')?;
        (!token.is_empty()).then_some(token)
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Prefix {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Prefix> for String {
    fn from(value: Prefix) -> Self {
        value.0
    }
}
