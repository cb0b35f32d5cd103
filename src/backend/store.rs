//! Record persistence: content-key lookup, identifier index and key scans.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult};
use crate::storage::{codec, collect_keys, StorageError};

/// Collection mapping identifiers to record locations.
pub(crate) const INDEX_COLLECTION: &str = "ids";

/// A record stored in its own collection under its content key.
pub(crate) trait StoredNode: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    /// Human-readable kind, used in error messages.
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn key(&self) -> String;
}

/// Location of a record, stored in [`INDEX_COLLECTION`] under the record's identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IdRef {
    pub(crate) collection: String,
    pub(crate) key: String,
}

impl KvBackend {
    /// Fetches a record by content key.
    pub(crate) fn by_key<T: StoredNode>(&self, ctx: &Context, key: &str) -> GuacResult<T> {
        let bytes = self.kv.get(ctx, T::COLLECTION, key)?;
        Ok(codec::decode(&bytes)?)
    }

    /// Fetches a record by content key, mapping a missing key to `None`.
    pub(crate) fn find_by_key<T: StoredNode>(&self, ctx: &Context, key: &str) -> GuacResult<Option<T>> {
        match self.kv.get(ctx, T::COLLECTION, key) {
            Ok(bytes) => Ok(Some(codec::decode(&bytes)?)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub(crate) fn id_ref(&self, ctx: &Context, id: &str) -> GuacResult<Option<IdRef>> {
        match self.kv.get(ctx, INDEX_COLLECTION, id) {
            Ok(bytes) => Ok(Some(codec::decode(&bytes)?)),
            Err(StorageError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fetches a record by identifier.
    ///
    /// # Errors
    /// `NotFound` for an unknown identifier, `TypeMismatch` when the identifier
    /// names a record of another kind.
    pub(crate) fn by_id<T: StoredNode>(&self, ctx: &Context, id: &str) -> GuacResult<T> {
        let Some(loc) = self.id_ref(ctx, id)? else {
            return Err(GuacError::not_found(format!("{} {id:?}", T::KIND)));
        };
        if loc.collection != T::COLLECTION {
            return Err(GuacError::TypeMismatch {
                id: id.to_string(),
                expected: T::KIND,
            });
        }
        self.by_key(ctx, &loc.key)
    }

    /// Like [`Self::by_id`], but an unknown identifier or one of another kind
    /// yields `None`.
    pub(crate) fn find_by_id<T: StoredNode>(&self, ctx: &Context, id: &str) -> GuacResult<Option<T>> {
        match self.id_ref(ctx, id)? {
            Some(loc) if loc.collection == T::COLLECTION => self.find_by_key(ctx, &loc.key),
            _ => Ok(None),
        }
    }

    /// Writes a record under its content key, replacing any previous value.
    pub(crate) fn put<T: StoredNode>(&self, ctx: &Context, node: &T) -> GuacResult<()> {
        let bytes = codec::encode(node)?;
        self.kv.set(ctx, T::COLLECTION, &node.key(), bytes)?;
        Ok(())
    }

    /// Registers a record's identifier in the identifier index.
    pub(crate) fn add_to_index<T: StoredNode>(&self, ctx: &Context, node: &T) -> GuacResult<()> {
        let loc = IdRef {
            collection: T::COLLECTION.to_string(),
            key: node.key(),
        };
        self.kv.set(ctx, INDEX_COLLECTION, node.id(), codec::encode(&loc)?)?;
        Ok(())
    }

    /// Assigns an identifier to a new record, indexes it and persists it.
    pub(crate) fn create<T: StoredNode>(&self, ctx: &Context, mut node: T) -> GuacResult<T> {
        node.set_id(self.next_id());
        self.add_to_index(ctx, &node)?;
        self.put(ctx, &node)?;
        tracing::debug!(kind = T::KIND, id = node.id(), "created node");
        Ok(node)
    }

    /// Returns the stored record with `node`'s content key, creating it if absent.
    ///
    /// The flag is true when the record was created by this call.
    pub(crate) fn ensure<T: StoredNode>(&self, ctx: &Context, node: T) -> GuacResult<(T, bool)> {
        match self.find_by_key::<T>(ctx, &node.key())? {
            Some(existing) => Ok((existing, false)),
            None => Ok((self.create(ctx, node)?, true)),
        }
    }

    /// Every key of `T`'s collection, sorted.
    pub(crate) fn all_keys<T: StoredNode>(&self, ctx: &Context) -> GuacResult<Vec<String>> {
        let mut keys = collect_keys(self.kv.as_ref(), ctx, T::COLLECTION)?;
        keys.sort_unstable();
        Ok(keys)
    }
}

/// Inserts `id` into a child-id set, keeping it free of duplicates.
pub(crate) fn insert_child(children: &mut Vec<String>, id: &str) -> bool {
    if children.iter().any(|c| c == id) {
        return false;
    }
    children.push(id.to_string());
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::key::KeyHasher;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Probe {
        id: String,
        name: String,
    }

    impl StoredNode for Probe {
        const COLLECTION: &'static str = "probes";
        const KIND: &'static str = "probe";

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn key(&self) -> String {
            KeyHasher::new("probe").field("name", &self.name).finish()
        }
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Other {
        id: String,
    }

    impl StoredNode for Other {
        const COLLECTION: &'static str = "others";
        const KIND: &'static str = "other";

        fn id(&self) -> &str {
            &self.id
        }

        fn set_id(&mut self, id: String) {
            self.id = id;
        }

        fn key(&self) -> String {
            self.id.clone()
        }
    }

    fn probe(name: &str) -> Probe {
        Probe {
            id: String::new(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_create_then_lookup_both_ways() {
        let backend = KvBackend::in_memory();
        let ctx = Context::background();
        let created = backend.create(&ctx, probe("a")).unwrap();

        let by_key: Probe = backend.by_key(&ctx, &created.key()).unwrap();
        let by_id: Probe = backend.by_id(&ctx, created.id()).unwrap();
        assert_eq!(by_key, created);
        assert_eq!(by_id, created);
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let backend = KvBackend::in_memory();
        let ctx = Context::background();
        let (first, created) = backend.ensure(&ctx, probe("a")).unwrap();
        assert!(created);
        let (second, created) = backend.ensure(&ctx, probe("a")).unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(backend.all_keys::<Probe>(&ctx).unwrap().len(), 1);
    }

    #[test]
    fn test_by_id_type_mismatch() {
        let backend = KvBackend::in_memory();
        let ctx = Context::background();
        let created = backend.create(&ctx, probe("a")).unwrap();

        let err = backend.by_id::<Other>(&ctx, created.id()).unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(backend.find_by_id::<Other>(&ctx, created.id()).unwrap().is_none());
    }

    #[test]
    fn test_missing_id() {
        let backend = KvBackend::in_memory();
        let ctx = Context::background();
        let err = backend.by_id::<Probe>(&ctx, "ffff").unwrap_err();
        assert!(err.is_not_found());
        assert!(backend.find_by_id::<Probe>(&ctx, "ffff").unwrap().is_none());
    }

    #[test]
    fn test_insert_child_dedups() {
        let mut children = vec!["a".to_string()];
        assert!(!insert_child(&mut children, "a"));
        assert!(insert_child(&mut children, "b"));
        assert_eq!(children, vec!["a", "b"]);
    }
}
