//! Occurrence links: an artifact is an instance of a package version or source.

use serde::{Deserialize, Serialize};

use super::artifact::{Artifact, ArtifactSpec};
use super::subject::{PackageOrSource, PackageOrSourceSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsOccurrenceInputSpec {
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsOccurrenceSpec {
    pub id: Option<String>,
    pub subject: Option<PackageOrSourceSpec>,
    pub artifact: Option<ArtifactSpec>,
    pub justification: Option<String>,
    pub origin: Option<String>,
    pub collector: Option<String>,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IsOccurrence {
    pub id: String,
    pub subject: PackageOrSource,
    pub artifact: Artifact,
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}
