use crate::location::StoreLocation;
use crate::sqlite::SqliteRepository;
use dashmap::DashMap;
use keyhole_core::error::Result;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Hands out one [`SqliteRepository`] per store location.
///
/// Every façade built from the same registry and location shares a single
/// connection; separate registries never share anything, so tests can run
/// isolated stores side by side. Handles stay open for as long as the
/// registry lives.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: DashMap<StoreLocation, Arc<OnceCell<SqliteRepository>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `location`, opening the store on first use.
    ///
    /// Concurrent first calls for one location open it once. A failed open is
    /// not cached; the next call tries again.
    pub async fn open(&self, location: &StoreLocation) -> Result<SqliteRepository> {
        let cell = self
            .stores
            .entry(location.clone())
            .or_default()
            .value()
            .clone();

        let repository = cell
            .get_or_try_init(|| async {
                debug!(location = %location, "opening store for registry");
                SqliteRepository::open(location).await
            })
            .await?;

        Ok(repository.clone())
    }

    /// Number of locations with an open handle.
    pub fn len(&self) -> usize {
        self.stores
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
