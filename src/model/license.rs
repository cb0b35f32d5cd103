//! License inputs, filters and responses.

use serde::{Deserialize, Serialize};

/// License supplied on ingest. Inline licenses carry their text in `inline`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseInputSpec {
    pub name: String,
    pub inline: Option<String>,
    pub list_version: Option<String>,
}

impl LicenseInputSpec {
    /// A license from a published list (e.g. SPDX) at a given list version.
    #[must_use]
    pub fn listed(name: impl Into<String>, list_version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inline: None,
            list_version: Some(list_version.into()),
        }
    }

    /// A license whose full text is supplied inline.
    #[must_use]
    pub fn inline(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inline: Some(text.into()),
            list_version: None,
        }
    }
}

/// Reference to a license, either by stored ID or by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdOrLicenseInput {
    pub license_id: Option<String>,
    pub license_input: Option<LicenseInputSpec>,
}

impl IdOrLicenseInput {
    /// References an existing license by ID.
    #[must_use]
    pub fn from_id(id: impl Into<String>) -> Self {
        Self {
            license_id: Some(id.into()),
            license_input: None,
        }
    }

    pub(crate) fn describe(&self) -> String {
        match (&self.license_id, &self.license_input) {
            (Some(id), _) => format!("license {id:?}"),
            (None, Some(input)) => format!("license {:?}", input.name),
            (None, None) => "license <empty reference>".to_string(),
        }
    }
}

impl From<LicenseInputSpec> for IdOrLicenseInput {
    fn from(input: LicenseInputSpec) -> Self {
        Self {
            license_id: None,
            license_input: Some(input),
        }
    }
}

/// Sparse license filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseSpec {
    pub id: Option<String>,
    pub name: Option<String>,
    pub inline: Option<String>,
    pub list_version: Option<String>,
}

impl LicenseSpec {
    /// Filter on name only.
    #[must_use]
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Filter on a listed license, which identifies at most one stored license.
    #[must_use]
    pub fn listed(name: impl Into<String>, list_version: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            list_version: Some(list_version.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    pub id: String,
    pub name: String,
    pub inline: Option<String>,
    pub list_version: Option<String>,
}
