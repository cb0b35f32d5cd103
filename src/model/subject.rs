//! Subject unions.
//!
//! A link names its subject through one of these unions. Inputs and filters are
//! structs with one optional member per kind; validation enforces how many may be
//! set. Responses are enums since exactly one kind is ever returned.

use serde::{Deserialize, Serialize};

use super::artifact::{Artifact, ArtifactSpec, IdOrArtifactInput};
use super::package::{IdOrPkgInput, Package, PkgSpec};
use super::source::{IdOrSourceInput, Source, SourceSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOrSourceInput {
    pub package: Option<IdOrPkgInput>,
    pub source: Option<IdOrSourceInput>,
}

impl PackageOrSourceInput {
    #[must_use]
    pub fn package(input: impl Into<IdOrPkgInput>) -> Self {
        Self {
            package: Some(input.into()),
            source: None,
        }
    }

    #[must_use]
    pub fn source(input: impl Into<IdOrSourceInput>) -> Self {
        Self {
            package: None,
            source: Some(input.into()),
        }
    }
}

/// Batch form; exactly one of the lists may be non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOrSourceInputs {
    #[serde(default)]
    pub packages: Vec<IdOrPkgInput>,
    #[serde(default)]
    pub sources: Vec<IdOrSourceInput>,
}

impl PackageOrSourceInputs {
    pub(crate) fn split(&self) -> Vec<PackageOrSourceInput> {
        if self.packages.is_empty() {
            self.sources.iter().cloned().map(PackageOrSourceInput::source).collect()
        } else {
            self.packages.iter().cloned().map(PackageOrSourceInput::package).collect()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOrSourceSpec {
    pub package: Option<PkgSpec>,
    pub source: Option<SourceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageOrSource {
    Package(Package),
    Source(Source),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSourceOrArtifactInput {
    pub package: Option<IdOrPkgInput>,
    pub source: Option<IdOrSourceInput>,
    pub artifact: Option<IdOrArtifactInput>,
}

impl PackageSourceOrArtifactInput {
    #[must_use]
    pub fn package(input: impl Into<IdOrPkgInput>) -> Self {
        Self {
            package: Some(input.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn source(input: impl Into<IdOrSourceInput>) -> Self {
        Self {
            source: Some(input.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn artifact(input: impl Into<IdOrArtifactInput>) -> Self {
        Self {
            artifact: Some(input.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSourceOrArtifactInputs {
    #[serde(default)]
    pub packages: Vec<IdOrPkgInput>,
    #[serde(default)]
    pub sources: Vec<IdOrSourceInput>,
    #[serde(default)]
    pub artifacts: Vec<IdOrArtifactInput>,
}

impl PackageSourceOrArtifactInputs {
    pub(crate) fn split(&self) -> Vec<PackageSourceOrArtifactInput> {
        if !self.packages.is_empty() {
            self.packages.iter().cloned().map(PackageSourceOrArtifactInput::package).collect()
        } else if !self.sources.is_empty() {
            self.sources.iter().cloned().map(PackageSourceOrArtifactInput::source).collect()
        } else {
            self.artifacts.iter().cloned().map(PackageSourceOrArtifactInput::artifact).collect()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageSourceOrArtifactSpec {
    pub package: Option<PkgSpec>,
    pub source: Option<SourceSpec>,
    pub artifact: Option<ArtifactSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageSourceOrArtifact {
    Package(Package),
    Source(Source),
    Artifact(Artifact),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOrArtifactInput {
    pub package: Option<IdOrPkgInput>,
    pub artifact: Option<IdOrArtifactInput>,
}

impl PackageOrArtifactInput {
    #[must_use]
    pub fn package(input: impl Into<IdOrPkgInput>) -> Self {
        Self {
            package: Some(input.into()),
            artifact: None,
        }
    }

    #[must_use]
    pub fn artifact(input: impl Into<IdOrArtifactInput>) -> Self {
        Self {
            package: None,
            artifact: Some(input.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOrArtifactInputs {
    #[serde(default)]
    pub packages: Vec<IdOrPkgInput>,
    #[serde(default)]
    pub artifacts: Vec<IdOrArtifactInput>,
}

impl PackageOrArtifactInputs {
    pub(crate) fn split(&self) -> Vec<PackageOrArtifactInput> {
        if self.packages.is_empty() {
            self.artifacts.iter().cloned().map(PackageOrArtifactInput::artifact).collect()
        } else {
            self.packages.iter().cloned().map(PackageOrArtifactInput::package).collect()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOrArtifactSpec {
    pub package: Option<PkgSpec>,
    pub artifact: Option<ArtifactSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PackageOrArtifact {
    Package(Package),
    Artifact(Artifact),
}
