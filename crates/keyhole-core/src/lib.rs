//! Core types and traits for the Keyhole URI shortener.
//!
//! This crate provides the types shared by the cipher engine, the stores and
//! the shortener service.

pub mod error;
pub mod prefix;
pub mod repository;
pub mod secret;
pub mod shortener;
pub mod token;

pub use error::{ConfigError, ShortenerError, StorageError};
pub use prefix::Prefix;
pub use repository::{PrefixRecord, ReadRepository, Repository, StoredRecord, UriRecord};
pub use secret::SecretAlphabet;
pub use shortener::Shortener;
pub use token::CipherToken;
