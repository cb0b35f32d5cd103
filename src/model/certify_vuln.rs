//! Vulnerability scan results for a package version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::package::{Package, PkgSpec};
use super::vulnerability::{Vulnerability, VulnerabilitySpec};

/// Scanner metadata supplied on ingest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadataInput {
    pub time_scanned: DateTime<Utc>,
    pub db_uri: String,
    pub db_version: String,
    pub scanner_uri: String,
    pub scanner_version: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanMetadata {
    pub time_scanned: DateTime<Utc>,
    pub db_uri: String,
    pub db_version: String,
    pub scanner_uri: String,
    pub scanner_version: String,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyVulnSpec {
    pub id: Option<String>,
    pub package: Option<PkgSpec>,
    pub vulnerability: Option<VulnerabilitySpec>,
    pub time_scanned: Option<DateTime<Utc>>,
    pub db_uri: Option<String>,
    pub db_version: Option<String>,
    pub scanner_uri: Option<String>,
    pub scanner_version: Option<String>,
    pub origin: Option<String>,
    pub collector: Option<String>,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyVuln {
    pub id: String,
    pub package: Package,
    pub vulnerability: Vulnerability,
    pub metadata: ScanMetadata,
}
