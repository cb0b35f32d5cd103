//! Key-value storage layer.
//!
//! [`KeyValueStore`] is the only thing the backend needs from a storage engine.
//! [`InMemoryKv`] is the bundled implementation; remote engines plug in by
//! implementing the same trait.

pub mod codec;
mod memory;
mod traits;

pub use memory::InMemoryKv;
pub use traits::{collect_keys, KeyScanner, KeyValueStore, StorageError};
