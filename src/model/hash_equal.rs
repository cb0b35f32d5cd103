//! Hash equivalence between two artifacts.

use serde::{Deserialize, Serialize};

use super::artifact::{Artifact, ArtifactSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashEqualInputSpec {
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

/// Filter over hash equivalences. At most two artifacts may be named; they match
/// the stored pair in any order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashEqualSpec {
    pub id: Option<String>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
    pub justification: Option<String>,
    pub origin: Option<String>,
    pub collector: Option<String>,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HashEqual {
    pub id: String,
    pub artifacts: Vec<Artifact>,
    pub justification: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}
