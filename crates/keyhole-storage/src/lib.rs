//! Stores for the Keyhole URI shortener.
//!
//! Provides the SQLite and in-memory implementations of the repository
//! contract, the registry that memoizes open stores, and the store-to-store
//! transfer used for migrations.

pub mod location;
pub mod memory;
pub mod registry;
pub mod sqlite;
pub mod transfer;

pub use keyhole_core::error::StorageError;
pub use keyhole_core::repository::{ReadRepository, Repository};
pub use location::StoreLocation;
pub use memory::InMemoryRepository;
pub use registry::StoreRegistry;
pub use sqlite::SqliteRepository;
pub use transfer::{transfer, TransferReport};
