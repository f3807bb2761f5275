//! Persistent key-value storage for the serialized user session.
//!
//! This module provides the `SessionStore` capability and its backends:
//! - `MemoryStore`: in-process map, for tests and ephemeral runs
//! - `FileStore`: one JSON file per key in the cache directory
//! - `KeyringStore`: OS keychain entries via keyring
//! - `SealedStore`: ChaCha20-Poly1305 encryption around any other store

pub mod file;
pub mod keychain;
pub mod memory;
pub mod sealed;

use async_trait::async_trait;
use thiserror::Error;

pub use keychain::KeyringStore;
pub use file::FileStore;
pub use memory::MemoryStore;
pub use sealed::SealedStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Encryption error: {0}")]
    Crypto(String),
}

impl StoreError {
    pub(crate) fn io(key: &str, source: std::io::Error) -> Self {
        StoreError::Io {
            key: key.to_string(),
            source,
        }
    }
}

/// Async key-value capability holding string values.
///
/// Removing a key that is not present is not an error.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: SessionStore + ?Sized> SessionStore for std::sync::Arc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key).await
    }
}
