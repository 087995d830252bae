//! Persistent, reversible URI shortening.
//!
//! [`ShortenerService`] ties a [`TokenCipher`] to a store: every URI gets a
//! row, and the row id is ciphered into the token of its short URL. Shortening
//! the same URI under the same prefix always yields the same short URL, and a
//! short URL resolves back to its URI until the row is pruned.

pub mod config;
pub mod service;

pub use config::{ShortenerConfig, ShortenerSettings};
pub use keyhole_cipher::TokenCipher;
pub use keyhole_core::{ConfigError, Prefix, SecretAlphabet, Shortener, ShortenerError};
pub use keyhole_storage::{StoreLocation, StoreRegistry};
pub use service::{ShortenerService, MAX_SHORTEN_ATTEMPTS};
