use async_trait::async_trait;
use jiff::Timestamp;

type Result<T> = std::result::Result<T, crate::error::ShortenerError>;

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the short URL for `uri`, creating it on first use.
    ///
    /// Repeated calls for the same URI return the same short URL and do not
    /// write to the store.
    async fn shorten(&self, uri: &str) -> Result<String>;

    /// Resolves a short URL back to the original URI.
    /// Returns `None` if the URL was not issued under this prefix or has been pruned.
    async fn lengthen(&self, short_url: &str) -> Result<Option<String>>;

    /// Removes every record created before `cutoff` and returns how many went.
    async fn prune_before(&self, cutoff: Timestamp) -> Result<u64>;
}
