//! Vulnerability inputs, filters and responses.
//!
//! Vulnerabilities form a two-level tree: type (`cve`, `ghsa`, `osv`, ...) and ID.
//! The special type [`NO_VULN_TYPE`] records "scanned, nothing found".

use serde::{Deserialize, Serialize};

/// Type used for "no vulnerability" results. Its ID is always empty.
pub const NO_VULN_TYPE: &str = "novuln";

/// Vulnerability supplied on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityInputSpec {
    #[serde(rename = "type")]
    pub vuln_type: String,
    pub vulnerability_id: String,
}

impl VulnerabilityInputSpec {
    #[must_use]
    pub fn new(vuln_type: impl Into<String>, vulnerability_id: impl Into<String>) -> Self {
        Self {
            vuln_type: vuln_type.into(),
            vulnerability_id: vulnerability_id.into(),
        }
    }

    /// The "nothing found" vulnerability.
    #[must_use]
    pub fn no_vuln() -> Self {
        Self::new(NO_VULN_TYPE, "")
    }
}

/// Reference to a vulnerability, either by stored ID or by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdOrVulnerabilityInput {
    pub vulnerability_type_id: Option<String>,
    pub vulnerability_node_id: Option<String>,
    pub vulnerability_input: Option<VulnerabilityInputSpec>,
}

impl IdOrVulnerabilityInput {
    /// References an existing vulnerability ID node.
    #[must_use]
    pub fn from_node_id(id: impl Into<String>) -> Self {
        Self {
            vulnerability_node_id: Some(id.into()),
            ..Self::default()
        }
    }
}

impl From<VulnerabilityInputSpec> for IdOrVulnerabilityInput {
    fn from(input: VulnerabilityInputSpec) -> Self {
        Self {
            vulnerability_input: Some(input),
            ..Self::default()
        }
    }
}

/// IDs of both levels of an ingested vulnerability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityIds {
    pub vulnerability_type_id: String,
    pub vulnerability_node_id: String,
}

/// Sparse vulnerability filter.
///
/// `no_vuln = Some(true)` selects only the `novuln` type, `Some(false)` excludes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilitySpec {
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub vuln_type: Option<String>,
    pub vulnerability_id: Option<String>,
    pub no_vuln: Option<bool>,
}

impl VulnerabilitySpec {
    /// Filter on an exact type and ID.
    #[must_use]
    pub fn exact(vuln_type: impl Into<String>, vulnerability_id: impl Into<String>) -> Self {
        Self {
            vuln_type: Some(vuln_type.into()),
            vulnerability_id: Some(vulnerability_id.into()),
            ..Self::default()
        }
    }
}

/// Vulnerability type node with the matching IDs below it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vulnerability {
    pub id: String,
    #[serde(rename = "type")]
    pub vuln_type: String,
    pub vulnerability_ids: Vec<VulnerabilityId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VulnerabilityId {
    pub id: String,
    pub vulnerability_id: String,
}
