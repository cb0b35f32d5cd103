//! VEX statements: whether a package or artifact is affected by a vulnerability.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::subject::{PackageOrArtifact, PackageOrArtifactSpec};
use super::vulnerability::{Vulnerability, VulnerabilitySpec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VexStatus {
    NotAffected,
    Affected,
    Fixed,
    #[default]
    UnderInvestigation,
}

impl fmt::Display for VexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAffected => write!(f, "NOT_AFFECTED"),
            Self::Affected => write!(f, "AFFECTED"),
            Self::Fixed => write!(f, "FIXED"),
            Self::UnderInvestigation => write!(f, "UNDER_INVESTIGATION"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VexJustification {
    ComponentNotPresent,
    VulnerableCodeNotPresent,
    VulnerableCodeNotInExecutePath,
    VulnerableCodeCannotBeControlledByAdversary,
    InlineMitigationsAlreadyExist,
    #[default]
    NotProvided,
}

impl fmt::Display for VexJustification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::ComponentNotPresent => "COMPONENT_NOT_PRESENT",
            Self::VulnerableCodeNotPresent => "VULNERABLE_CODE_NOT_PRESENT",
            Self::VulnerableCodeNotInExecutePath => "VULNERABLE_CODE_NOT_IN_EXECUTE_PATH",
            Self::VulnerableCodeCannotBeControlledByAdversary => {
                "VULNERABLE_CODE_CANNOT_BE_CONTROLLED_BY_ADVERSARY"
            }
            Self::InlineMitigationsAlreadyExist => "INLINE_MITIGATIONS_ALREADY_EXIST",
            Self::NotProvided => "NOT_PROVIDED",
        };
        f.write_str(s)
    }
}

/// VEX statement supplied on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VexStatementInputSpec {
    pub status: VexStatus,
    pub vex_justification: VexJustification,
    pub statement: String,
    pub status_notes: String,
    pub known_since: DateTime<Utc>,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyVexStatementSpec {
    pub id: Option<String>,
    pub subject: Option<PackageOrArtifactSpec>,
    pub vulnerability: Option<VulnerabilitySpec>,
    pub status: Option<VexStatus>,
    pub vex_justification: Option<VexJustification>,
    pub statement: Option<String>,
    pub status_notes: Option<String>,
    pub known_since: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub collector: Option<String>,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyVexStatement {
    pub id: String,
    pub subject: PackageOrArtifact,
    pub vulnerability: Vulnerability,
    pub status: VexStatus,
    pub vex_justification: VexJustification,
    pub statement: String,
    pub status_notes: String,
    pub known_since: DateTime<Utc>,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}
