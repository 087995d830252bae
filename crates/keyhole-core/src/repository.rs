use crate::error::Result;
use crate::prefix::Prefix;
use crate::token::CipherToken;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A registered short-link prefix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixRecord {
    pub id: i64,
    pub prefix: Prefix,
}

/// A stored URI row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UriRecord {
    /// Auto-assigned row id; the cipher input.
    pub id: i64,
    pub prefix_id: i64,
    /// The original long URI.
    pub uri: String,
    /// `None` until the first shorten cycle for this row completes.
    pub cipher: Option<CipherToken>,
    /// Set once at insertion.
    pub created: Option<Timestamp>,
}

/// A URI row joined with its prefix text, as moved between stores.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i64,
    pub prefix: Prefix,
    pub uri: String,
    pub cipher: Option<CipherToken>,
    pub created: Option<Timestamp>,
}

/// A read-only view of a store.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Looks up a prefix row by exact match.
    async fn find_prefix(&self, prefix: &Prefix) -> Result<Option<PrefixRecord>>;

    /// Looks up the row holding `uri` under `prefix_id`.
    async fn find_by_uri(&self, prefix_id: i64, uri: &str) -> Result<Option<UriRecord>>;

    /// Resolves a cipher token issued under `prefix` back to its URI.
    /// Returns `None` when the prefix is unknown or no row owns the token.
    async fn find_by_cipher(&self, prefix: &Prefix, token: &CipherToken)
        -> Result<Option<String>>;

    /// Every URI row with its prefix, ordered by row id.
    async fn records(&self) -> Result<Vec<StoredRecord>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Returns the row for `prefix`, creating it on first use.
    ///
    /// Racing callers never produce two rows for the same prefix: the loser
    /// of an insert race re-reads the winner's row.
    async fn ensure_prefix(&self, prefix: &Prefix) -> Result<PrefixRecord>;

    /// Inserts a new URI row with no cipher and returns its id.
    /// `created` is kept to whole seconds.
    ///
    /// Returns `Err(DuplicateUri)` if `uri` is already stored under `prefix_id`
    /// and `Err(NotFound)` if `prefix_id` does not exist.
    async fn insert(&self, prefix_id: i64, uri: &str, created: Timestamp) -> Result<i64>;

    /// Fills in the cipher token of row `id`.
    ///
    /// Returns `Err(DuplicateCipher)` if another row owns `token` and
    /// `Err(NotFound)` if row `id` does not exist. Re-setting the token a row
    /// already holds is a no-op.
    async fn set_cipher(&self, id: i64, token: &CipherToken) -> Result<()>;

    /// Deletes every row created strictly before `cutoff`, compared in whole
    /// seconds: a row created earlier within the cutoff's own second survives.
    /// Returns the number of rows removed.
    async fn delete_older_than(&self, cutoff: Timestamp) -> Result<u64>;

    /// Inserts a row exactly as given, keeping its id, token and timestamp.
    /// The prefix is registered if needed.
    ///
    /// Returns `Err(DuplicateId)`, `Err(DuplicateUri)` or `Err(DuplicateCipher)`
    /// when the row clashes with one already stored.
    async fn import(&self, record: StoredRecord) -> Result<()>;
}
