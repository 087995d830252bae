use keyhole_cipher::{TokenCipher, MAX_TOKEN_LEN};
use keyhole_core::{ConfigError, Prefix, SecretAlphabet};
use keyhole_storage::StoreLocation;
use serde::Deserialize;
use typed_builder::TypedBuilder;

/// Raw construction parameters for a [`ShortenerService`](crate::ShortenerService).
///
/// Every field is optional here so that a missing one can be reported by name;
/// [`ShortenerConfig::validate`] turns it into [`ShortenerSettings`] without
/// touching storage.
#[derive(Clone, Default, Deserialize, TypedBuilder)]
pub struct ShortenerConfig {
    /// The secret alphabet. Never persisted.
    #[builder(default, setter(strip_option, into))]
    pub secret: Option<String>,
    /// Short-URL base; trailing slashes are stripped.
    #[builder(default, setter(strip_option, into))]
    pub prefix: Option<String>,
    /// Database path, or `:memory:`.
    #[builder(default, setter(strip_option, into))]
    pub store: Option<String>,
    /// Added to every row id before ciphering.
    #[builder(default = 0)]
    #[serde(default)]
    pub offset: u64,
}

/// Validated construction parameters.
#[derive(Debug, Clone)]
pub struct ShortenerSettings {
    pub cipher: TokenCipher,
    pub prefix: Prefix,
    pub store: StoreLocation,
}

impl ShortenerConfig {
    /// Checks the parameters in declaration order and fails on the first
    /// missing or invalid one.
    pub fn validate(self) -> Result<ShortenerSettings, ConfigError> {
        let secret = self.secret.ok_or(ConfigError::Missing("secret"))?;
        let prefix = self.prefix.ok_or(ConfigError::Missing("prefix"))?;
        let store = self.store.ok_or(ConfigError::Missing("store"))?;

        let cipher = TokenCipher::builder()
            .secret(SecretAlphabet::new(secret)?)
            .offset(self.offset)
            .build();
        if cipher.max_id().is_none() {
            return Err(ConfigError::InvalidOffset(format!(
                "{} leaves no ids with tokens of at most {MAX_TOKEN_LEN} symbols",
                self.offset
            )));
        }

        Ok(ShortenerSettings {
            cipher,
            prefix: Prefix::new(prefix)?,
            store: store.parse()?,
        })
    }
}

impl std::fmt::Debug for ShortenerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShortenerConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("prefix", &self.prefix)
            .field("store", &self.store)
            .field("offset", &self.offset)
            .finish()
    }
}
