//! Generic node and edge vocabulary used by `node`, `nodes` and `neighbors`.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::artifact::Artifact;
use super::certify_bad::CertifyBad;
use super::certify_legal::CertifyLegal;
use super::certify_vex::CertifyVexStatement;
use super::certify_vuln::CertifyVuln;
use super::hash_equal::HashEqual;
use super::is_occurrence::IsOccurrence;
use super::license::License;
use super::package::Package;
use super::source::Source;
use super::vulnerability::Vulnerability;

/// Any node the backend can return by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Node {
    Package(Package),
    Source(Source),
    Artifact(Artifact),
    License(License),
    Vulnerability(Vulnerability),
    CertifyLegal(CertifyLegal),
    CertifyVuln(CertifyVuln),
    CertifyVexStatement(CertifyVexStatement),
    CertifyBad(CertifyBad),
    IsOccurrence(IsOccurrence),
    HashEqual(HashEqual),
}

impl Node {
    /// The kind of this node.
    #[must_use]
    pub const fn kind(&self) -> NodeKind {
        match self {
            Self::Package(_) => NodeKind::Package,
            Self::Source(_) => NodeKind::Source,
            Self::Artifact(_) => NodeKind::Artifact,
            Self::License(_) => NodeKind::License,
            Self::Vulnerability(_) => NodeKind::Vulnerability,
            Self::CertifyLegal(_) => NodeKind::CertifyLegal,
            Self::CertifyVuln(_) => NodeKind::CertifyVuln,
            Self::CertifyVexStatement(_) => NodeKind::CertifyVex,
            Self::CertifyBad(_) => NodeKind::CertifyBad,
            Self::IsOccurrence(_) => NodeKind::IsOccurrence,
            Self::HashEqual(_) => NodeKind::HashEqual,
        }
    }
}

/// Node kinds, at the granularity edges are expressed in.
///
/// Every level of the package tree is `Package`, every level of the source tree is
/// `Source`, and both vulnerability levels are `Vulnerability`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeKind {
    Package,
    Source,
    Artifact,
    License,
    Vulnerability,
    CertifyLegal,
    CertifyVuln,
    CertifyVex,
    CertifyBad,
    IsOccurrence,
    HashEqual,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Package => "PACKAGE",
            Self::Source => "SOURCE",
            Self::Artifact => "ARTIFACT",
            Self::License => "LICENSE",
            Self::Vulnerability => "VULNERABILITY",
            Self::CertifyLegal => "CERTIFY_LEGAL",
            Self::CertifyVuln => "CERTIFY_VULN",
            Self::CertifyVex => "CERTIFY_VEX_STATEMENT",
            Self::CertifyBad => "CERTIFY_BAD",
            Self::IsOccurrence => "IS_OCCURRENCE",
            Self::HashEqual => "HASH_EQUAL",
        };
        f.write_str(s)
    }
}

/// A directed edge between two node kinds, e.g. `PACKAGE_CERTIFY_LEGAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Edge {
    pub from: NodeKind,
    pub to: NodeKind,
}

impl Edge {
    #[must_use]
    pub const fn new(from: NodeKind, to: NodeKind) -> Self {
        Self { from, to }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.from, self.to)
    }
}

/// Which kind of scan `find_packages_that_need_scanning` considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryType {
    Vulnerability,
    License,
}
