//! Claims that a package, source or artifact is known to be bad.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::subject::{PackageSourceOrArtifact, PackageSourceOrArtifactSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyBadInputSpec {
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub known_since: DateTime<Utc>,
    pub document_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyBadSpec {
    pub id: Option<String>,
    pub subject: Option<PackageSourceOrArtifactSpec>,
    pub justification: Option<String>,
    pub origin: Option<String>,
    pub collector: Option<String>,
    pub known_since: Option<DateTime<Utc>>,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyBad {
    pub id: String,
    pub subject: PackageSourceOrArtifact,
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub known_since: DateTime<Utc>,
    pub document_ref: String,
}
