//! Public data model: ingest inputs, query filters and response trees.
//!
//! Inputs (`*InputSpec`, `IdOr*Input`) describe what to ingest. Filters (`*Spec`)
//! are sparse: a `None` field matches anything and a `Some` field must match
//! exactly. Responses are plain owned trees, detached from storage.

pub mod artifact;
pub mod certify_bad;
pub mod certify_legal;
pub mod certify_vex;
pub mod certify_vuln;
pub mod hash_equal;
pub mod is_occurrence;
pub mod license;
pub mod node;
pub mod package;
pub mod pagination;
pub mod source;
pub mod subject;
pub mod vulnerability;

pub use artifact::{Artifact, ArtifactInputSpec, ArtifactSpec, IdOrArtifactInput};
pub use certify_bad::{CertifyBad, CertifyBadInputSpec, CertifyBadSpec};
pub use certify_legal::{CertifyLegal, CertifyLegalInputSpec, CertifyLegalSpec};
pub use certify_vex::{
    CertifyVexStatement, CertifyVexStatementSpec, VexJustification, VexStatementInputSpec,
    VexStatus,
};
pub use certify_vuln::{CertifyVuln, CertifyVulnSpec, ScanMetadata, ScanMetadataInput};
pub use hash_equal::{HashEqual, HashEqualInputSpec, HashEqualSpec};
pub use is_occurrence::{IsOccurrence, IsOccurrenceInputSpec, IsOccurrenceSpec};
pub use license::{IdOrLicenseInput, License, LicenseInputSpec, LicenseSpec};
pub use node::{Edge, Node, NodeKind, QueryType};
pub use package::{
    IdOrPkgInput, MatchFlags, Package, PackageIds, PackageName, PackageNamespace,
    PackageQualifier, PackageQualifierInputSpec, PackageQualifierSpec, PackageVersion,
    PkgInputSpec, PkgMatchType, PkgSpec,
};
pub use pagination::{Connection, PageEdge, PageInfo};
pub use source::{
    IdOrSourceInput, Source, SourceIds, SourceInputSpec, SourceName, SourceNamespace, SourceSpec,
};
pub use subject::{
    PackageOrArtifact, PackageOrArtifactInput, PackageOrArtifactInputs, PackageOrArtifactSpec,
    PackageOrSource, PackageOrSourceInput, PackageOrSourceInputs, PackageOrSourceSpec,
    PackageSourceOrArtifact, PackageSourceOrArtifactInput, PackageSourceOrArtifactInputs,
    PackageSourceOrArtifactSpec,
};
pub use vulnerability::{
    IdOrVulnerabilityInput, Vulnerability, VulnerabilityId, VulnerabilityIds,
    VulnerabilityInputSpec, VulnerabilitySpec, NO_VULN_TYPE,
};
