//! Package inputs, filters and responses.
//!
//! Packages form a four-level tree: type → namespace → name → version. Responses
//! mirror that tree, trimmed to the branches that matched.

use serde::{Deserialize, Serialize};

/// A `key=value` qualifier supplied on ingest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageQualifierInputSpec {
    pub key: String,
    pub value: String,
}

/// Package coordinates supplied on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkgInputSpec {
    #[serde(rename = "type")]
    pub pkg_type: String,
    pub namespace: Option<String>,
    pub name: String,
    pub version: Option<String>,
    #[serde(default)]
    pub qualifiers: Vec<PackageQualifierInputSpec>,
    pub subpath: Option<String>,
}

impl PkgInputSpec {
    /// Creates package coordinates without version, qualifiers or subpath.
    #[must_use]
    pub fn new(pkg_type: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg_type: pkg_type.into(),
            namespace: Some(namespace.into()),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Adds a qualifier.
    #[must_use]
    pub fn with_qualifier(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.qualifiers.push(PackageQualifierInputSpec {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Sets the subpath.
    #[must_use]
    pub fn with_subpath(mut self, subpath: impl Into<String>) -> Self {
        self.subpath = Some(subpath.into());
        self
    }
}

/// Reference to a package version, either by stored ID or by coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdOrPkgInput {
    pub package_type_id: Option<String>,
    pub package_namespace_id: Option<String>,
    pub package_name_id: Option<String>,
    pub package_version_id: Option<String>,
    pub package_input: Option<PkgInputSpec>,
}

impl IdOrPkgInput {
    /// References an existing package version by ID.
    #[must_use]
    pub fn from_version_id(id: impl Into<String>) -> Self {
        Self {
            package_version_id: Some(id.into()),
            ..Self::default()
        }
    }
}

impl From<PkgInputSpec> for IdOrPkgInput {
    fn from(input: PkgInputSpec) -> Self {
        Self {
            package_input: Some(input),
            ..Self::default()
        }
    }
}

/// IDs of every level of an ingested package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageIds {
    pub package_type_id: String,
    pub package_namespace_id: String,
    pub package_name_id: String,
    pub package_version_id: String,
}

/// Qualifier filter; a missing value matches any value for the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageQualifierSpec {
    pub key: String,
    pub value: Option<String>,
}

/// Sparse package filter. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PkgSpec {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub pkg_type: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub qualifiers: Vec<PackageQualifierSpec>,
    pub match_only_empty_qualifiers: Option<bool>,
    pub subpath: Option<String>,
}

impl PkgSpec {
    /// Filter on the exact type/namespace/name triple.
    #[must_use]
    pub fn name(pkg_type: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            pkg_type: Some(pkg_type.into()),
            namespace: Some(namespace.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Filter on a single stored node ID.
    #[must_use]
    pub fn id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    /// Adds a version constraint.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }
}

/// Stored qualifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageQualifier {
    pub key: String,
    pub value: String,
}

/// Package type node and the matching part of its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    #[serde(rename = "type")]
    pub pkg_type: String,
    pub namespaces: Vec<PackageNamespace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageNamespace {
    pub id: String,
    pub namespace: String,
    pub names: Vec<PackageName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageName {
    pub id: String,
    pub name: String,
    pub versions: Vec<PackageVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageVersion {
    pub id: String,
    pub version: String,
    pub qualifiers: Vec<PackageQualifier>,
    pub subpath: String,
}

impl Package {
    /// IDs of every version node in this response.
    #[must_use]
    pub fn version_ids(&self) -> Vec<&str> {
        self.namespaces
            .iter()
            .flat_map(|ns| ns.names.iter())
            .flat_map(|n| n.versions.iter())
            .map(|v| v.id.as_str())
            .collect()
    }

    /// IDs of every name node in this response.
    #[must_use]
    pub fn name_ids(&self) -> Vec<&str> {
        self.namespaces
            .iter()
            .flat_map(|ns| ns.names.iter())
            .map(|n| n.id.as_str())
            .collect()
    }
}

/// Whether a package subject refers to one version or to every version of a name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PkgMatchType {
    AllVersions,
    #[default]
    SpecificVersion,
}

/// Match flags accompanying a package subject.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchFlags {
    pub pkg: PkgMatchType,
}

impl MatchFlags {
    /// Flags selecting every version of the package name.
    #[must_use]
    pub const fn all_versions() -> Self {
        Self {
            pkg: PkgMatchType::AllVersions,
        }
    }

    /// Flags selecting only the given version.
    #[must_use]
    pub const fn specific_version() -> Self {
        Self {
            pkg: PkgMatchType::SpecificVersion,
        }
    }
}
