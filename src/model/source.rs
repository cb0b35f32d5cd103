//! Source repository inputs, filters and responses.

use serde::{Deserialize, Serialize};

/// Source coordinates supplied on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInputSpec {
    #[serde(rename = "type")]
    pub src_type: String,
    pub namespace: String,
    pub name: String,
    pub tag: Option<String>,
    pub commit: Option<String>,
}

impl SourceInputSpec {
    /// Creates source coordinates without tag or commit.
    #[must_use]
    pub fn new(src_type: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            src_type: src_type.into(),
            namespace: namespace.into(),
            name: name.into(),
            tag: None,
            commit: None,
        }
    }

    /// Sets the tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Sets the commit.
    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }
}

/// Reference to a source name, either by stored ID or by coordinates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdOrSourceInput {
    pub source_type_id: Option<String>,
    pub source_namespace_id: Option<String>,
    pub source_name_id: Option<String>,
    pub source_input: Option<SourceInputSpec>,
}

impl IdOrSourceInput {
    /// References an existing source name by ID.
    #[must_use]
    pub fn from_name_id(id: impl Into<String>) -> Self {
        Self {
            source_name_id: Some(id.into()),
            ..Self::default()
        }
    }
}

impl From<SourceInputSpec> for IdOrSourceInput {
    fn from(input: SourceInputSpec) -> Self {
        Self {
            source_input: Some(input),
            ..Self::default()
        }
    }
}

/// IDs of every level of an ingested source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceIds {
    pub source_type_id: String,
    pub source_namespace_id: String,
    pub source_name_id: String,
}

/// Sparse source filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceSpec {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub src_type: Option<String>,
    pub namespace: Option<String>,
    pub name: Option<String>,
    pub tag: Option<String>,
    pub commit: Option<String>,
}

impl SourceSpec {
    /// Filter on the exact type/namespace/name triple.
    #[must_use]
    pub fn name(src_type: impl Into<String>, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            src_type: Some(src_type.into()),
            namespace: Some(namespace.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Source type node and the matching part of its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Source {
    pub id: String,
    #[serde(rename = "type")]
    pub src_type: String,
    pub namespaces: Vec<SourceNamespace>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceNamespace {
    pub id: String,
    pub namespace: String,
    pub names: Vec<SourceName>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceName {
    pub id: String,
    pub name: String,
    pub tag: Option<String>,
    pub commit: Option<String>,
}

impl Source {
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
