//! Legal certification: the licenses declared and discovered for a package or source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::license::{License, LicenseSpec};
use super::subject::{PackageOrSource, PackageOrSourceSpec};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyLegalInputSpec {
    pub declared_license: String,
    pub discovered_license: String,
    pub attribution: String,
    pub justification: String,
    pub time_scanned: DateTime<Utc>,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}

/// Filter over legal certifications.
///
/// `declared_licenses`/`discovered_licenses` match as multisets: each entry must
/// consume a distinct license reference of the stored link.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyLegalSpec {
    pub id: Option<String>,
    pub subject: Option<PackageOrSourceSpec>,
    pub declared_license: Option<String>,
    #[serde(default)]
    pub declared_licenses: Vec<LicenseSpec>,
    pub discovered_license: Option<String>,
    #[serde(default)]
    pub discovered_licenses: Vec<LicenseSpec>,
    pub attribution: Option<String>,
    pub justification: Option<String>,
    pub time_scanned: Option<DateTime<Utc>>,
    pub origin: Option<String>,
    pub collector: Option<String>,
    pub document_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertifyLegal {
    pub id: String,
    pub subject: PackageOrSource,
    pub declared_license: String,
    pub declared_licenses: Vec<License>,
    pub discovered_license: String,
    pub discovered_licenses: Vec<License>,
    pub attribution: String,
    pub justification: String,
    pub time_scanned: DateTime<Utc>,
    pub origin: String,
    pub collector: String,
    pub document_ref: String,
}
