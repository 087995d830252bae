use crate::error::ConfigError;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// The ordered set of distinct symbols that keys the cipher.
///
/// A secret alphabet is a capability: anyone holding it can map row ids to
/// tokens and back. It lives only in memory and is never written to a store,
/// and its `Debug` output is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretAlphabet {
    symbols: Vec<char>,
}

impl SecretAlphabet {
    /// Validates and wraps an alphabet.
    ///
    /// The alphabet must be non-empty and must not repeat a symbol; a repeated
    /// symbol lets two different ids cipher to the same token.
    pub fn new(secret: impl Into<String>) -> Result<Self, ConfigError> {
        let text = secret.into();
        if text.is_empty() {
            return Err(ConfigError::InvalidSecret(
                "alphabet cannot be empty".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(text.len());
        let mut symbols = Vec::with_capacity(text.len());
        for (position, symbol) in text.chars().enumerate() {
            if !seen.insert(symbol) {
                return Err(ConfigError::InvalidSecret(format!(
                    "symbol '{}' is repeated at position {}",
                    symbol, position
                )));
            }
            symbols.push(symbol);
        }

        Ok(Self { symbols })
    }

    pub fn symbols(&self) -> &[char] {
        &self.symbols
    }

    /// Number of symbols (not bytes).
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

impl fmt::Debug for SecretAlphabet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretAlphabet")
            .field("len", &self.symbols.len())
            .finish_non_exhaustive()
    }
}

impl FromStr for SecretAlphabet {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SecretAlphabet {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
