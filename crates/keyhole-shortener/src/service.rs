use crate::config::{ShortenerConfig, ShortenerSettings};
use async_trait::async_trait;
use jiff::Timestamp;
use keyhole_cipher::{TokenCipher, MAX_TOKEN_LEN};
use keyhole_core::{
    CipherToken, Prefix, Repository, Shortener, ShortenerError, StorageError, UriRecord,
};
use keyhole_storage::{SqliteRepository, StoreRegistry};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upper bound on lookup/insert rounds in [`ShortenerService::shorten`].
///
/// Two rounds suffice in practice: insert, then re-read the new row. The
/// third absorbs one lost insert race.
pub const MAX_SHORTEN_ATTEMPTS: usize = 3;

/// A concrete implementation of the `Shortener` trait.
///
/// This service wraps a `Repository` and a `TokenCipher` to handle:
/// - registering its prefix on first use
/// - storing new URIs and deriving their tokens from the row id
/// - resolving short URLs issued under its prefix
///
/// The prefix id is cached for lookups and re-resolved before every insert,
/// so a prefix row deleted behind the service's back is registered again.
#[derive(Debug)]
pub struct ShortenerService<R> {
    repository: Arc<R>,
    cipher: TokenCipher,
    prefix: Prefix,
    prefix_id: RwLock<Option<i64>>,
}

impl<R: Repository> ShortenerService<R> {
    pub fn new(repository: R, cipher: TokenCipher, prefix: Prefix) -> Self {
        Self::with_shared(Arc::new(repository), cipher, prefix)
    }

    /// Builds a service over a repository shared with other services.
    pub fn with_shared(repository: Arc<R>, cipher: TokenCipher, prefix: Prefix) -> Self {
        Self {
            repository,
            cipher,
            prefix,
            prefix_id: RwLock::new(None),
        }
    }

    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Renders the short URL for `token` under this service's prefix.
    pub fn short_url_for(&self, token: &CipherToken) -> String {
        self.prefix.to_url(token)
    }

    async fn prefix_id(&self) -> Result<i64, StorageError> {
        let cached = *self.prefix_id.read();
        match cached {
            Some(id) => Ok(id),
            None => self.register_prefix().await,
        }
    }

    async fn register_prefix(&self) -> Result<i64, StorageError> {
        let record = self.repository.ensure_prefix(&self.prefix).await?;
        *self.prefix_id.write() = Some(record.id);
        Ok(record.id)
    }

    /// Derives the token for row `id` and stores it.
    async fn assign_cipher(&self, id: i64) -> Result<CipherToken, ShortenerError> {
        let raw = u64::try_from(id)
            .map_err(|_| StorageError::InvalidData(format!("negative row id {id}")))?;
        let token = self
            .cipher
            .encode(raw)
            .ok_or(ShortenerError::TokenSpaceExhausted {
                id,
                max_len: MAX_TOKEN_LEN,
            })?;

        match self.repository.set_cipher(id, &token).await {
            Ok(()) => Ok(token),
            Err(StorageError::DuplicateCipher(_)) => Err(ShortenerError::CipherCollision {
                id,
                token: token.into_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }
}

impl ShortenerService<SqliteRepository> {
    /// Validates `config` and opens its store through `registry`.
    ///
    /// Configuration errors are reported before any storage is touched.
    pub async fn open(
        config: ShortenerConfig,
        registry: &StoreRegistry,
    ) -> Result<Self, ShortenerError> {
        let ShortenerSettings {
            cipher,
            prefix,
            store,
        } = config.validate()?;

        let repository = registry.open(&store).await?;
        debug!(prefix = %prefix, store = %store, "opened shortener");
        Ok(Self::new(repository, cipher, prefix))
    }
}

#[async_trait]
impl<R: Repository> Shortener for ShortenerService<R> {
    async fn shorten(&self, uri: &str) -> Result<String, ShortenerError> {
        if uri.is_empty() {
            return Err(ShortenerError::InvalidUri(
                "URI cannot be empty".to_string(),
            ));
        }

        for attempt in 1..=MAX_SHORTEN_ATTEMPTS {
            let prefix_id = self.prefix_id().await?;
            match self.repository.find_by_uri(prefix_id, uri).await? {
                Some(UriRecord {
                    cipher: Some(token),
                    ..
                }) => {
                    debug!(token = %token, "uri already shortened");
                    return Ok(self.short_url_for(&token));
                }
                Some(record) => {
                    let token = self.assign_cipher(record.id).await?;
                    info!(id = record.id, token = %token, "assigned cipher token");
                    return Ok(self.short_url_for(&token));
                }
                None => {
                    let prefix_id = self.register_prefix().await?;
                    match self.repository.insert(prefix_id, uri, Timestamp::now()).await {
                        Ok(id) => debug!(id, "stored new uri"),
                        Err(StorageError::DuplicateUri(_)) => {
                            warn!(attempt, "uri stored concurrently, re-reading");
                        }
                        Err(StorageError::NotFound(reason)) => {
                            warn!(attempt, reason = %reason, "prefix vanished before insert, re-registering");
                            *self.prefix_id.write() = None;
                        }
                        Err(err) => return Err(err.into()),
                    }
                }
            }
        }

        Err(ShortenerError::TooManyAttempts {
            uri: uri.to_string(),
            attempts: MAX_SHORTEN_ATTEMPTS,
        })
    }

    async fn lengthen(&self, short_url: &str) -> Result<Option<String>, ShortenerError> {
        let Some(token) = self.prefix.strip(short_url) else {
            debug!(prefix = %self.prefix, "short url not under this prefix");
            return Ok(None);
        };

        let uri = self
            .repository
            .find_by_cipher(&self.prefix, &CipherToken::new(token))
            .await?;
        Ok(uri)
    }

    async fn prune_before(&self, cutoff: Timestamp) -> Result<u64, ShortenerError> {
        let removed = self.repository.delete_older_than(cutoff).await?;
        info!(removed, cutoff = %cutoff, "pruned uri records");
        Ok(removed)
    }
}
