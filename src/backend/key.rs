//! Content keys.
//!
//! A content key is a BLAKE3 digest over a canonical encoding of a record's
//! semantic fields: a domain tag naming the record kind, then each field as a
//! length-prefixed name and length-prefixed value. Length prefixes make the
//! encoding unambiguous regardless of what the values contain.

use chrono::{DateTime, SecondsFormat, Utc};

pub(crate) struct KeyHasher {
    hasher: blake3::Hasher,
}

impl KeyHasher {
    pub(crate) fn new(domain: &str) -> Self {
        let mut hasher = blake3::Hasher::new();
        write_bytes(&mut hasher, domain.as_bytes());
        Self { hasher }
    }

    pub(crate) fn field(mut self, name: &str, value: &str) -> Self {
        write_bytes(&mut self.hasher, name.as_bytes());
        write_bytes(&mut self.hasher, value.as_bytes());
        self
    }

    /// Hashes a list in the order given; callers sort lists that are sets.
    pub(crate) fn list<S: AsRef<str>>(mut self, name: &str, values: &[S]) -> Self {
        write_bytes(&mut self.hasher, name.as_bytes());
        self.hasher.update(&(values.len() as u64).to_le_bytes());
        for v in values {
            write_bytes(&mut self.hasher, v.as_ref().as_bytes());
        }
        self
    }

    /// Hashes key/value pairs with each side length-prefixed on its own.
    pub(crate) fn pairs<K: AsRef<str>, V: AsRef<str>>(mut self, name: &str, pairs: &[(K, V)]) -> Self {
        write_bytes(&mut self.hasher, name.as_bytes());
        self.hasher.update(&(pairs.len() as u64).to_le_bytes());
        for (k, v) in pairs {
            write_bytes(&mut self.hasher, k.as_ref().as_bytes());
            write_bytes(&mut self.hasher, v.as_ref().as_bytes());
        }
        self
    }

    pub(crate) fn time(self, name: &str, value: &DateTime<Utc>) -> Self {
        let rendered = value.to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.field(name, &rendered)
    }

    pub(crate) fn finish(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

fn write_bytes(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}
