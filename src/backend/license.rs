//! Licenses: a name plus either inline text or a license-list version.

use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{Backrefs, Linkable};
use super::matching::no_match;
use super::query::Listable;
use super::store::StoredNode;
use super::upsert::Probe;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt, ValidationError};
use crate::model::{Connection, IdOrLicenseInput, License, LicenseInputSpec, LicenseSpec};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct LicenseNode {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) inline: String,
    pub(crate) list_version: String,
    pub(crate) backrefs: Backrefs,
}

impl LicenseNode {
    fn new(name: &str, inline: Option<&str>, list_version: Option<&str>) -> Self {
        Self {
            id: String::new(),
            name: name.to_string(),
            inline: inline.unwrap_or_default().to_string(),
            list_version: list_version.unwrap_or_default().to_string(),
            backrefs: Backrefs::default(),
        }
    }

    fn from_input(input: &LicenseInputSpec) -> Self {
        Self::new(&input.name, input.inline.as_deref(), input.list_version.as_deref())
    }

    pub(crate) fn to_license(&self) -> License {
        License {
            id: self.id.clone(),
            name: self.name.clone(),
            inline: (!self.inline.is_empty()).then(|| self.inline.clone()),
            list_version: (!self.list_version.is_empty()).then(|| self.list_version.clone()),
        }
    }

    /// Full match, `filter.id` included.
    pub(crate) fn matches_spec(&self, filter: &LicenseSpec) -> bool {
        !no_match(filter.id.as_deref(), self.id.as_str()) && self.matches_fields(filter)
    }

    /// Attribute match only; `filter.id` is ignored.
    pub(crate) fn matches_fields(&self, filter: &LicenseSpec) -> bool {
        !(no_match(filter.name.as_deref(), self.name.as_str())
            || no_match(filter.inline.as_deref(), self.inline.as_str())
            || no_match(filter.list_version.as_deref(), self.list_version.as_str()))
    }
}

impl StoredNode for LicenseNode {
    const COLLECTION: &'static str = "licenses";
    const KIND: &'static str = "license";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("license")
            .field("name", &self.name)
            .field("inline", &self.inline)
            .field("list_version", &self.list_version)
            .finish()
    }
}

impl Linkable for LicenseNode {
    fn backrefs(&self) -> &Backrefs {
        &self.backrefs
    }

    fn backrefs_mut(&mut self) -> &mut Backrefs {
        &mut self.backrefs
    }
}

impl Listable for LicenseNode {
    type Spec = LicenseSpec;
    type Output = License;

    fn spec_id(spec: &LicenseSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(_: &KvBackend, _: &Context, _: &LicenseSpec) -> GuacResult<Option<Vec<String>>> {
        Ok(None)
    }

    fn matches(&self, _: &KvBackend, _: &Context, spec: &LicenseSpec) -> GuacResult<bool> {
        Ok(self.matches_spec(spec))
    }

    fn to_model(&self, _: &KvBackend, _: &Context) -> GuacResult<License> {
        Ok(self.to_license())
    }
}

impl KvBackend {
    /// Ingests a license and returns its ID.
    ///
    /// # Errors
    /// `MissingField` when no license coordinates are given; store failures.
    pub fn ingest_license(&self, ctx: &Context, input: &IdOrLicenseInput) -> GuacResult<String> {
        let mut ids = self.ingest_licenses(ctx, std::slice::from_ref(input))?;
        ids.pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation("IngestLicense"))
    }

    /// Ingests several licenses; IDs are returned in input order.
    ///
    /// # Errors
    /// `MissingField` when an input has no license coordinates; store failures.
    pub fn ingest_licenses(&self, ctx: &Context, inputs: &[IdOrLicenseInput]) -> GuacResult<Vec<String>> {
        self.two_phase(
            ctx,
            "IngestLicenses",
            inputs,
            |backend, ctx, input| {
                let Some(spec) = &input.license_input else {
                    return Err(ValidationError::MissingField {
                        field: "licenseInput".to_string(),
                    }
                    .into());
                };
                let node = LicenseNode::from_input(spec);
                Ok(match backend.find_by_key::<LicenseNode>(ctx, &node.key())? {
                    Some(existing) => Probe::Hit(existing.id),
                    None => Probe::Miss(node),
                })
            },
            |backend, ctx, node| Ok(backend.ensure(ctx, node)?.0.id),
        )
    }

    /// Licenses matching `spec`.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn licenses(&self, ctx: &Context, spec: &LicenseSpec) -> GuacResult<Vec<License>> {
        self.query_nodes::<LicenseNode>(ctx, "Licenses", spec)
    }

    /// One page of licenses matching `spec`.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn licenses_list(
        &self,
        ctx: &Context,
        spec: &LicenseSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<License>> {
        self.list_nodes::<LicenseNode>(ctx, "LicensesList", spec, after, first)
    }

    pub(crate) fn resolve_license(&self, ctx: &Context, input: &IdOrLicenseInput) -> GuacResult<LicenseNode> {
        if let Some(id) = &input.license_id {
            return self.by_id(ctx, id);
        }
        let Some(spec) = &input.license_input else {
            return Err(ValidationError::MissingField {
                field: "licenseInput".to_string(),
            }
            .into());
        };
        self.find_by_key(ctx, &LicenseNode::from_input(spec).key())?
            .ok_or_else(|| GuacError::not_found(input.describe()))
    }

    /// The single license a filter pins down, by ID or by name plus inline
    /// text or list version.
    pub(crate) fn license_exact(&self, ctx: &Context, filter: &LicenseSpec) -> GuacResult<Option<LicenseNode>> {
        if let Some(id) = &filter.id {
            return self.find_by_id(ctx, id);
        }
        let Some(name) = &filter.name else {
            return Ok(None);
        };
        if filter.inline.is_none() && filter.list_version.is_none() {
            return Ok(None);
        }
        let probe = LicenseNode::new(name, filter.inline.as_deref(), filter.list_version.as_deref());
        self.find_by_key(ctx, &probe.key())
    }

    /// Whether the license `id` has the name, inline text and list version
    /// `filter` asks for. A filter that failed exact resolution lands here, so
    /// its `id` is not compared.
    pub(crate) fn license_fields_match(&self, ctx: &Context, id: &str, filter: &LicenseSpec) -> GuacResult<bool> {
        let node: LicenseNode = self.by_id(ctx, id)?;
        Ok(node.matches_fields(filter))
    }
}
