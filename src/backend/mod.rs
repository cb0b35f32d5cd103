//! Key-value backend.
//!
//! [`KvBackend`] stores the graph as hand-rolled node records over an injected
//! [`KeyValueStore`]. Each record lives in its kind's collection under its content
//! key; the `ids` collection maps every assigned identifier back to that location.
//!
//! Concurrency is a single coarse reader/writer lock per backend. Queries hold the
//! shared guard for the whole call. Ingest is two-phase: a probe under the shared
//! guard resolves references and detects existing records, then a writer under
//! the exclusive guard re-checks and creates whatever is still missing. Helpers in
//! this module tree never take the lock themselves; only public operations do.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::BackendConfig;
use crate::context::Context;
use crate::error::{GuacResult, OperationExt};
use crate::storage::{collect_keys, InMemoryKv, KeyValueStore, StorageError};

mod artifact;
mod certify_bad;
mod certify_legal;
mod certify_vex;
mod certify_vuln;
mod hash_equal;
mod is_occurrence;
mod key;
mod license;
mod link;
mod matching;
mod neighbors;
mod package;
mod paginate;
mod query;
mod search;
mod source;
mod store;
mod subject;
mod upsert;
mod vulnerability;

/// Key-value backed graph store.
pub struct KvBackend {
    kv: Arc<dyn KeyValueStore>,
    lock: RwLock<()>,
    last_id: AtomicU64,
    config: BackendConfig,
}

impl std::fmt::Debug for KvBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvBackend")
            .field("last_id", &self.last_id.load(Ordering::Relaxed))
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KvBackend {
    /// Creates a backend over `kv`.
    ///
    /// The identifier counter resumes after the largest identifier already
    /// present in the store, so a backend reopened over existing data never
    /// reissues an identifier.
    ///
    /// # Errors
    /// Invalid configuration, or any store error raised while scanning existing
    /// identifiers.
    pub fn new(ctx: &Context, kv: Arc<dyn KeyValueStore>, config: BackendConfig) -> GuacResult<Self> {
        let config = config.validate().in_operation("KvBackend::new")?;
        let last_id = collect_keys(kv.as_ref(), ctx, store::INDEX_COLLECTION)
            .in_operation("KvBackend::new")?
            .iter()
            .filter_map(|id| u64::from_str_radix(id, 16).ok())
            .max()
            .unwrap_or(0);
        tracing::debug!(last_id, "opened key-value backend");
        Ok(Self {
            kv,
            lock: RwLock::new(()),
            last_id: AtomicU64::new(last_id),
            config,
        })
    }

    /// Creates a backend over a fresh in-memory store with default configuration.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            kv: Arc::new(InMemoryKv::new()),
            lock: RwLock::new(()),
            last_id: AtomicU64::new(0),
            config: BackendConfig::default(),
        }
    }

    /// The store this backend writes to.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &BackendConfig {
        &self.config
    }

    fn read_guard(&self, operation: &'static str) -> Result<RwLockReadGuard<'_, ()>, StorageError> {
        self.lock
            .read()
            .map_err(|_| StorageError::PoisonedLock(operation))
    }

    fn write_guard(&self, operation: &'static str) -> Result<RwLockWriteGuard<'_, ()>, StorageError> {
        self.lock
            .write()
            .map_err(|_| StorageError::PoisonedLock(operation))
    }

    /// Assigns the next identifier.
    ///
    /// Identifiers are fixed-width lowercase hex, so their lexicographic order is
    /// their creation order.
    fn next_id(&self) -> String {
        let n = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{n:016x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ArtifactInputSpec;

    #[test]
    fn test_ids_are_ordered_hex() {
        let backend = KvBackend::in_memory();
        let a = backend.next_id();
        let b = backend.next_id();
        assert_eq!(a, "0000000000000001");
        assert!(b > a);
        assert_eq!(b.len(), 16);
    }

    #[test]
    fn test_reopen_resumes_id_counter() {
        let ctx = Context::background();
        let kv: Arc<dyn KeyValueStore> = Arc::new(InMemoryKv::new());
        let first = KvBackend::new(&ctx, Arc::clone(&kv), BackendConfig::default()).unwrap();
        let id = first
            .ingest_artifact(&ctx, &ArtifactInputSpec::new("sha256", "abc").into())
            .unwrap();

        let reopened = KvBackend::new(&ctx, kv, BackendConfig::default()).unwrap();
        let next = reopened
            .ingest_artifact(&ctx, &ArtifactInputSpec::new("sha256", "def").into())
            .unwrap();
        assert!(next > id);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let ctx = Context::background();
        let config = BackendConfig {
            scan_excluded_package_types: vec![String::new()],
        };
        let err = KvBackend::new(&ctx, Arc::new(InMemoryKv::new()), config).unwrap_err();
        assert!(err.is_validation());
    }
}
