//! In-memory key-value store.
//!
//! This module provides a thread-safe in-memory implementation of
//! [`KeyValueStore`]. It is intended for embedded usage, tests, and as a
//! reference implementation for remote drivers.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::RwLock;

use crate::config::MemoryKvConfig;
use crate::context::Context;
use crate::error::ValidationError;
use crate::storage::traits::{KeyScanner, KeyValueStore, StorageError};

type Collection = BTreeMap<String, Vec<u8>>;

/// Thread-safe in-memory key-value store.
#[derive(Debug, Default)]
pub struct InMemoryKv {
    collections: RwLock<HashMap<String, Collection>>,
    config: MemoryKvConfig,
}

impl InMemoryKv {
    /// Create a new empty store with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new empty store with the given configuration.
    ///
    /// # Errors
    /// `ValidationError::InvalidConfig` if the configuration is invalid.
    pub fn with_config(config: MemoryKvConfig) -> Result<Self, ValidationError> {
        Ok(Self {
            collections: RwLock::default(),
            config: config.validate()?,
        })
    }

    /// Number of keys stored in `collection`.
    ///
    /// # Errors
    /// `StorageError::PoisonedLock` if a writer panicked.
    pub fn len(&self, collection: &str) -> Result<usize, StorageError> {
        let state = self
            .collections
            .read()
            .map_err(|_| StorageError::PoisonedLock("kv.len"))?;
        Ok(state.get(collection).map_or(0, BTreeMap::len))
    }

    /// Returns true if `collection` holds no keys.
    ///
    /// # Errors
    /// `StorageError::PoisonedLock` if a writer panicked.
    pub fn is_empty(&self, collection: &str) -> Result<bool, StorageError> {
        Ok(self.len(collection)? == 0)
    }
}

impl KeyValueStore for InMemoryKv {
    fn get(&self, ctx: &Context, collection: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        ctx.check()?;
        let state = self
            .collections
            .read()
            .map_err(|_| StorageError::PoisonedLock("kv.get"))?;
        state
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned()
            .ok_or_else(|| StorageError::not_found(collection, key))
    }

    fn set(
        &self,
        ctx: &Context,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), StorageError> {
        ctx.check()?;
        let mut state = self
            .collections
            .write()
            .map_err(|_| StorageError::PoisonedLock("kv.set"))?;
        state
            .entry(collection.to_string())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn keys(&self, collection: &str) -> Box<dyn KeyScanner + '_> {
        Box::new(MemoryScanner {
            store: self,
            collection: collection.to_string(),
            last: None,
            done: false,
        })
    }
}

/// Scanner returning keys in ascending order, `scan_batch_size` at a time.
///
/// Each batch resumes strictly after the last key returned, so keys inserted
/// behind the scan position are not revisited.
struct MemoryScanner<'a> {
    store: &'a InMemoryKv,
    collection: String,
    last: Option<String>,
    done: bool,
}

impl KeyScanner for MemoryScanner<'_> {
    fn scan(&mut self, ctx: &Context) -> Result<(Vec<String>, bool), StorageError> {
        ctx.check()?;
        if self.done {
            return Ok((Vec::new(), true));
        }

        let batch_size = self.store.config.scan_batch_size;
        let state = self
            .store
            .collections
            .read()
            .map_err(|_| StorageError::PoisonedLock("kv.scan"))?;
        let Some(coll) = state.get(&self.collection) else {
            self.done = true;
            return Ok((Vec::new(), true));
        };

        let lower = match self.last.as_deref() {
            Some(last) => Bound::Excluded(last),
            None => Bound::Unbounded,
        };
        let mut keys: Vec<String> = coll
            .range::<str, _>((lower, Bound::Unbounded))
            .take(batch_size + 1)
            .map(|(k, _)| k.clone())
            .collect();

        let done = keys.len() <= batch_size;
        keys.truncate(batch_size);
        self.last = keys.last().cloned().or_else(|| self.last.take());
        self.done = done;
        Ok((keys, done))
    }
}
