//! # guac-kv - supply-chain metadata graph over a key-value store
//!
//! guac-kv stores a software supply-chain graph (packages, sources, artifacts,
//! licenses, vulnerabilities, and the certifications linking them) on top of any
//! engine implementing [`KeyValueStore`]. It does not plan queries: every record
//! is addressed by a content key, and every link is reachable from the nodes it
//! references through back-reference lists.
//!
//! ## Core Concepts
//!
//! - **Subject trees**: packages (type → namespace → name → version), sources
//!   (type → namespace → name) and vulnerabilities (type → id)
//! - **Attributes**: artifacts and licenses, flat and content-keyed
//! - **Links**: `CertifyLegal`, `CertifyVuln`, `CertifyVexStatement`,
//!   `CertifyBad`, `IsOccurrence` and `HashEqual`, each referencing existing nodes
//! - **Filters**: sparse `*Spec` structs where an unset field matches anything
//! - **Connections**: cursor-paginated result pages
//!
//! ## Usage
//!
//! ```rust
//! use guac_kv::model::{LicenseInputSpec, PackageOrSourceInput, PkgInputSpec, CertifyLegalInputSpec};
//! use guac_kv::{Context, KvBackend};
//!
//! let backend = KvBackend::in_memory();
//! let ctx = Context::background();
//!
//! let pkg = PkgInputSpec::new("npm", "", "left-pad").with_version("1.3.0");
//! backend.ingest_package(&ctx, &pkg)?;
//! let mit = LicenseInputSpec::listed("MIT", "3.21").into();
//! backend.ingest_license(&ctx, &mit)?;
//!
//! let legal = CertifyLegalInputSpec {
//!     time_scanned: chrono::Utc::now(),
//!     ..CertifyLegalInputSpec::default()
//! };
//! backend.ingest_certify_legal(&ctx, &PackageOrSourceInput::package(pkg), &[mit], &[], &legal)?;
//! # Ok::<(), guac_kv::GuacError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
#[allow(missing_docs)]
pub mod model;
pub mod storage;

mod validation;

pub use backend::KvBackend;
pub use config::{BackendConfig, MemoryKvConfig};
pub use context::Context;
pub use error::{GuacError, GuacResult, ValidationError};
pub use storage::{InMemoryKv, KeyScanner, KeyValueStore, StorageError};
