//! Artifact inputs, filters and responses.

use serde::{Deserialize, Serialize};

/// Artifact digest supplied on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInputSpec {
    pub algorithm: String,
    pub digest: String,
}

impl ArtifactInputSpec {
    #[must_use]
    pub fn new(algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            digest: digest.into(),
        }
    }
}

/// Reference to an artifact, either by stored ID or by digest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdOrArtifactInput {
    pub artifact_id: Option<String>,
    pub artifact_input: Option<ArtifactInputSpec>,
}

impl IdOrArtifactInput {
    /// References an existing artifact by ID.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            artifact_id: Some(id.into()),
            artifact_input: None,
        }
    }
}

impl From<ArtifactInputSpec> for IdOrArtifactInput {
    fn from(input: ArtifactInputSpec) -> Self {
        Self {
            artifact_id: None,
            artifact_input: Some(input),
        }
    }
}

/// Sparse artifact filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactSpec {
    pub id: Option<String>,
    pub algorithm: Option<String>,
    pub digest: Option<String>,
}

impl ArtifactSpec {
    /// Filter on an exact digest.
    #[must_use]
    pub fn digest(algorithm: impl Into<String>, digest: impl Into<String>) -> Self {
        Self {
            id: None,
            algorithm: Some(algorithm.into()),
            digest: Some(digest.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub id: String,
    pub algorithm: String,
    pub digest: String,
}
