//! Abstract key-value store traits.
//!
//! The backend only needs three primitives from its store:
//! - `get` a value by collection and key
//! - `set` a value by collection and key
//! - enumerate the keys of a collection in batches
//!
//! Values are opaque bytes; the backend frames them with [`super::codec`].

use thiserror::Error;

use crate::context::Context;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Key not present in the collection.
    #[error("key not found: {collection}/{key}")]
    NotFound {
        /// Collection that was searched.
        collection: String,
        /// Missing key.
        key: String,
    },

    /// The request context was cancelled.
    #[error("request cancelled")]
    Cancelled,

    /// The request context deadline passed.
    #[error("request deadline exceeded")]
    DeadlineExceeded,

    /// A stored value could not be encoded or decoded.
    #[error("codec error: {0}")]
    Codec(String),

    /// A lock was poisoned by a panicking holder.
    #[error("poisoned lock: {0}")]
    PoisonedLock(&'static str),

    /// Backend error.
    #[error("Storage backend error: {0}")]
    BackendError(String),
}

impl StorageError {
    /// Creates a `NotFound` error.
    #[must_use]
    pub fn not_found(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Returns true for `NotFound`.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Paginated enumeration of the keys in one collection.
pub trait KeyScanner: Send {
    /// Returns the next batch of keys and whether the scan is exhausted.
    ///
    /// Once `done` is reported, further calls return an empty batch.
    fn scan(&mut self, ctx: &Context) -> Result<(Vec<String>, bool), StorageError>;
}

/// Key-value store consumed by the backend.
///
/// Implementations must be safe to share between threads. No transactional
/// guarantees are required; the backend serializes its own writers.
pub trait KeyValueStore: Send + Sync {
    /// Get the value stored under `key`.
    ///
    /// # Errors
    /// `StorageError::NotFound` if the key is absent.
    fn get(&self, ctx: &Context, collection: &str, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    fn set(
        &self,
        ctx: &Context,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError>;

    /// Start a key scan over `collection`.
    fn keys(&self, collection: &str) -> Box<dyn KeyScanner + '_>;
}

/// Drains a scanner and returns every key of `collection`.
///
/// # Errors
/// Any error reported by the scanner.
pub fn collect_keys(
    store: &dyn KeyValueStore,
    ctx: &Context,
    collection: &str,
) -> Result<Vec<String>, StorageError> {
    let mut scanner = store.keys(collection);
    let mut out = Vec::new();
    loop {
        let (batch, done) = scanner.scan(ctx)?;
        tracing::trace!(collection, batch = batch.len(), done, "scanned key batch");
        out.extend(batch);
        if done {
            return Ok(out);
        }
    }
}
