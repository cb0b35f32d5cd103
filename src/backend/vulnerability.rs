//! Vulnerability tree: type → ID, both stored lowercase.

use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{Backrefs, Linkable};
use super::matching::no_match_lower;
use super::store::{insert_child, StoredNode};
use super::upsert::Probe;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt, ValidationError};
use crate::model::{
    IdOrVulnerabilityInput, Vulnerability, VulnerabilityId, VulnerabilityIds,
    VulnerabilityInputSpec, VulnerabilitySpec, NO_VULN_TYPE,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct VulnTypeNode {
    pub(crate) id: String,
    pub(crate) vuln_type: String,
    pub(crate) vuln_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct VulnIdNode {
    pub(crate) id: String,
    pub(crate) parent: String,
    pub(crate) vulnerability_id: String,
    pub(crate) backrefs: Backrefs,
}

impl VulnTypeNode {
    fn new(vuln_type: &str) -> Self {
        Self {
            id: String::new(),
            vuln_type: vuln_type.to_lowercase(),
            vuln_ids: Vec::new(),
        }
    }

    fn matches(&self, filter: &VulnerabilitySpec) -> bool {
        let is_no_vuln = self.vuln_type == NO_VULN_TYPE;
        if filter.no_vuln.is_some_and(|want| want != is_no_vuln) {
            return false;
        }
        !no_match_lower(filter.vuln_type.as_deref(), &self.vuln_type)
    }
}

impl VulnIdNode {
    fn new(parent: &str, vulnerability_id: &str) -> Self {
        Self {
            id: String::new(),
            parent: parent.to_string(),
            vulnerability_id: vulnerability_id.to_lowercase(),
            backrefs: Backrefs::default(),
        }
    }

    fn to_model(&self) -> VulnerabilityId {
        VulnerabilityId {
            id: self.id.clone(),
            vulnerability_id: self.vulnerability_id.clone(),
        }
    }
}

impl StoredNode for VulnTypeNode {
    const COLLECTION: &'static str = "vuln_types";
    const KIND: &'static str = "vulnerability type";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("vuln_type")
            .field("type", &self.vuln_type)
            .finish()
    }
}

impl StoredNode for VulnIdNode {
    const COLLECTION: &'static str = "vuln_ids";
    const KIND: &'static str = "vulnerability";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("vuln_id")
            .field("parent", &self.parent)
            .field("vulnerability_id", &self.vulnerability_id)
            .finish()
    }
}

impl Linkable for VulnIdNode {
    fn backrefs(&self) -> &Backrefs {
        &self.backrefs
    }

    fn backrefs_mut(&mut self) -> &mut Backrefs {
        &mut self.backrefs
    }
}

impl KvBackend {
    /// Ingests a vulnerability, creating its type if needed.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn ingest_vulnerability(&self, ctx: &Context, input: &IdOrVulnerabilityInput) -> GuacResult<VulnerabilityIds> {
        let mut ids = self.ingest_vulnerabilities(ctx, std::slice::from_ref(input))?;
        ids.pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation("IngestVulnerability"))
    }

    /// Ingests several vulnerabilities; IDs are returned in input order.
    ///
    /// # Errors
    /// `MissingField` when an input has no coordinates; store failures.
    pub fn ingest_vulnerabilities(
        &self,
        ctx: &Context,
        inputs: &[IdOrVulnerabilityInput],
    ) -> GuacResult<Vec<VulnerabilityIds>> {
        self.two_phase(
            ctx,
            "IngestVulnerabilities",
            inputs,
            |backend, ctx, input| {
                let Some(spec) = &input.vulnerability_input else {
                    return Err(ValidationError::MissingField {
                        field: "vulnerabilityInput".to_string(),
                    }
                    .into());
                };
                Ok(match backend.find_vuln(ctx, &spec.vuln_type, &spec.vulnerability_id)? {
                    Some(node) => Probe::Hit(VulnerabilityIds {
                        vulnerability_type_id: node.parent,
                        vulnerability_node_id: node.id,
                    }),
                    None => Probe::Miss(spec.clone()),
                })
            },
            |backend, ctx, spec| backend.create_vuln(ctx, &spec),
        )
    }

    /// Vulnerabilities matching `spec`, grouped by type.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn vulnerabilities(&self, ctx: &Context, spec: &VulnerabilitySpec) -> GuacResult<Vec<Vulnerability>> {
        const OP: &str = "Vulnerabilities";
        let span = tracing::debug_span!("query", operation = OP, request_id = %ctx.request_id());
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        self.match_vulnerabilities(ctx, spec).in_operation(OP)
    }

    fn match_vulnerabilities(&self, ctx: &Context, spec: &VulnerabilitySpec) -> GuacResult<Vec<Vulnerability>> {
        if let Some(id) = &spec.id {
            return match self.build_vuln_response(ctx, id, None) {
                Ok(v) => Ok(v.into_iter().collect()),
                Err(e) if e.is_not_found() || e.is_type_mismatch() => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }

        let mut out = Vec::new();
        for key in self.all_keys::<VulnTypeNode>(ctx)? {
            let ty: VulnTypeNode = self.by_key(ctx, &key)?;
            if !ty.matches(spec) {
                continue;
            }
            let mut ids = Vec::new();
            for id in &ty.vuln_ids {
                let node: VulnIdNode = self.by_id(ctx, id)?;
                if !no_match_lower(spec.vulnerability_id.as_deref(), &node.vulnerability_id) {
                    ids.push(node.to_model());
                }
            }
            if !ids.is_empty() || spec.vulnerability_id.is_none() {
                out.push(Vulnerability {
                    id: ty.id,
                    vuln_type: ty.vuln_type,
                    vulnerability_ids: ids,
                });
            }
        }
        Ok(out)
    }

    fn find_vuln(&self, ctx: &Context, vuln_type: &str, vulnerability_id: &str) -> GuacResult<Option<VulnIdNode>> {
        let Some(ty) = self.find_by_key::<VulnTypeNode>(ctx, &VulnTypeNode::new(vuln_type).key())? else {
            return Ok(None);
        };
        self.find_by_key(ctx, &VulnIdNode::new(&ty.id, vulnerability_id).key())
    }

    fn create_vuln(&self, ctx: &Context, input: &VulnerabilityInputSpec) -> GuacResult<VulnerabilityIds> {
        let (mut ty, _) = self.ensure(ctx, VulnTypeNode::new(&input.vuln_type))?;
        let (node, _) = self.ensure(ctx, VulnIdNode::new(&ty.id, &input.vulnerability_id))?;
        if insert_child(&mut ty.vuln_ids, &node.id) {
            self.put(ctx, &ty)?;
        }
        Ok(VulnerabilityIds {
            vulnerability_type_id: ty.id,
            vulnerability_node_id: node.id,
        })
    }

    pub(crate) fn resolve_vulnerability(
        &self,
        ctx: &Context,
        input: &IdOrVulnerabilityInput,
    ) -> GuacResult<VulnIdNode> {
        if let Some(id) = &input.vulnerability_node_id {
            return self.by_id(ctx, id);
        }
        let Some(spec) = &input.vulnerability_input else {
            return Err(ValidationError::MissingField {
                field: "vulnerabilityInput".to_string(),
            }
            .into());
        };
        self.find_vuln(ctx, &spec.vuln_type, &spec.vulnerability_id)?
            .ok_or_else(|| {
                GuacError::not_found(format!(
                    "vulnerability {}/{}",
                    spec.vuln_type, spec.vulnerability_id
                ))
            })
    }

    /// The single vulnerability ID node a filter pins down.
    pub(crate) fn exact_vulnerability(
        &self,
        ctx: &Context,
        filter: &VulnerabilitySpec,
    ) -> GuacResult<Option<VulnIdNode>> {
        if let Some(id) = &filter.id {
            return self.find_by_id(ctx, id);
        }
        match (&filter.vuln_type, &filter.vulnerability_id, filter.no_vuln) {
            (Some(t), Some(v), _) => self.find_vuln(ctx, t, v),
            (None, _, Some(true)) => self.find_vuln(ctx, NO_VULN_TYPE, ""),
            _ => Ok(None),
        }
    }

    /// Builds the vulnerability tree above `id`, a type or ID node.
    ///
    /// Returns `None` when `filter` rejects either level.
    pub(crate) fn build_vuln_response(
        &self,
        ctx: &Context,
        id: &str,
        filter: Option<&VulnerabilitySpec>,
    ) -> GuacResult<Option<Vulnerability>> {
        if filter.is_some_and(|f| f.id.as_deref().is_some_and(|want| want != id)) {
            return Ok(None);
        }
        let Some(loc) = self.id_ref(ctx, id)? else {
            return Err(GuacError::not_found(format!("vulnerability node {id:?}")));
        };

        let (type_id, ids) = if loc.collection == VulnIdNode::COLLECTION {
            let node: VulnIdNode = self.by_id(ctx, id)?;
            if filter.is_some_and(|f| no_match_lower(f.vulnerability_id.as_deref(), &node.vulnerability_id)) {
                return Ok(None);
            }
            (node.parent.clone(), vec![node.to_model()])
        } else if loc.collection == VulnTypeNode::COLLECTION {
            (id.to_string(), Vec::new())
        } else {
            return Err(GuacError::TypeMismatch {
                id: id.to_string(),
                expected: "vulnerability",
            });
        };

        let ty: VulnTypeNode = self.by_id(ctx, &type_id)?;
        if filter.is_some_and(|f| !ty.matches(f)) {
            return Ok(None);
        }
        Ok(Some(Vulnerability {
            id: ty.id,
            vuln_type: ty.vuln_type,
            vulnerability_ids: ids,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::background()
    }

    #[test]
    fn test_ids_are_case_folded() {
        let backend = KvBackend::in_memory();
        let a = backend
            .ingest_vulnerability(&ctx(), &VulnerabilityInputSpec::new("CVE", "CVE-2024-0001").into())
            .unwrap();
        let b = backend
            .ingest_vulnerability(&ctx(), &VulnerabilityInputSpec::new("cve", "cve-2024-0001").into())
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_no_vuln_filter() {
        let backend = KvBackend::in_memory();
        backend
            .ingest_vulnerability(&ctx(), &VulnerabilityInputSpec::no_vuln().into())
            .unwrap();
        backend
            .ingest_vulnerability(&ctx(), &VulnerabilityInputSpec::new("ghsa", "ghsa-xxxx").into())
            .unwrap();

        let only = VulnerabilitySpec {
            no_vuln: Some(true),
            ..VulnerabilitySpec::default()
        };
        let found = backend.vulnerabilities(&ctx(), &only).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vuln_type, NO_VULN_TYPE);

        let none = VulnerabilitySpec {
            no_vuln: Some(false),
            ..VulnerabilitySpec::default()
        };
        let found = backend.vulnerabilities(&ctx(), &none).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].vuln_type, "ghsa");

        let exact = backend.exact_vulnerability(&ctx(), &only).unwrap();
        assert!(exact.is_some());
    }

    #[test]
    fn test_query_by_node_id() {
        let backend = KvBackend::in_memory();
        let ids = backend
            .ingest_vulnerability(&ctx(), &VulnerabilityInputSpec::new("osv", "osv-1").into())
            .unwrap();
        let spec = VulnerabilitySpec {
            id: Some(ids.vulnerability_node_id.clone()),
            ..VulnerabilitySpec::default()
        };
        let found = backend.vulnerabilities(&ctx(), &spec).unwrap();
        assert_eq!(found[0].vulnerability_ids[0].id, ids.vulnerability_node_id);
    }
}
