use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Raised while validating construction parameters, before any storage I/O.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required parameter: {0}")]
    Missing(&'static str),
    #[error("invalid secret alphabet: {0}")]
    InvalidSecret(String),
    #[error("invalid prefix: {0}")]
    InvalidPrefix(String),
    #[error("invalid store location: {0}")]
    InvalidStore(String),
    #[error("invalid offset: {0}")]
    InvalidOffset(String),
}

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("uri already stored under this prefix: {0}")]
    DuplicateUri(String),
    #[error("cipher token already owned by another record: {0}")]
    DuplicateCipher(String),
    #[error("record id already taken: {0}")]
    DuplicateId(i64),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid uri: {0}")]
    InvalidUri(String),
    #[error("cipher collision for record {id}: token {token} is already taken; check the secret alphabet and offset")]
    CipherCollision { id: i64, token: String },
    #[error("record {id} is past the last id with a token of at most {max_len} symbols")]
    TokenSpaceExhausted { id: i64, max_len: u64 },
    #[error("gave up shortening {uri} after {attempts} attempts; the store keeps returning conflicting state")]
    TooManyAttempts { uri: String, attempts: usize },
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}
