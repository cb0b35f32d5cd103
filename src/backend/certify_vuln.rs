//! Vulnerability scan results linking a package version to a vulnerability.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{LinkKind, LinkTarget, Linkable};
use super::matching::no_match;
use super::query::Listable;
use super::store::StoredNode;
use super::upsert::{LinkRecord, Prepared};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{
    CertifyVuln, CertifyVulnSpec, Connection, IdOrPkgInput, IdOrVulnerabilityInput, ScanMetadata,
    ScanMetadataInput,
};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CertifyVulnNode {
    pub(crate) id: String,
    pub(crate) pkg: String,
    pub(crate) vulnerability: String,
    pub(crate) time_scanned: DateTime<Utc>,
    pub(crate) db_uri: String,
    pub(crate) db_version: String,
    pub(crate) scanner_uri: String,
    pub(crate) scanner_version: String,
    pub(crate) origin: String,
    pub(crate) collector: String,
    pub(crate) document_ref: String,
}

impl StoredNode for CertifyVulnNode {
    const COLLECTION: &'static str = "certify_vulns";
    const KIND: &'static str = "certifyVuln";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("certify_vuln")
            .field("pkg", &self.pkg)
            .field("vulnerability", &self.vulnerability)
            .field("db_uri", &self.db_uri)
            .field("db_version", &self.db_version)
            .field("scanner_uri", &self.scanner_uri)
            .field("scanner_version", &self.scanner_version)
            .field("origin", &self.origin)
            .field("collector", &self.collector)
            .finish()
    }
}

impl LinkRecord for CertifyVulnNode {
    const LINK_KIND: LinkKind = LinkKind::CertifyVuln;
}

impl Listable for CertifyVulnNode {
    type Spec = CertifyVulnSpec;
    type Output = CertifyVuln;

    fn spec_id(spec: &CertifyVulnSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(backend: &KvBackend, ctx: &Context, spec: &CertifyVulnSpec) -> GuacResult<Option<Vec<String>>> {
        if let Some(pkg) = &spec.package {
            if let Some(ids) = backend.package_candidates(ctx, pkg, LinkKind::CertifyVuln)? {
                return Ok(Some(ids));
            }
        }
        if let Some(vuln) = &spec.vulnerability {
            if let Some(node) = backend.exact_vulnerability(ctx, vuln)? {
                return Ok(Some(node.backrefs().get(LinkKind::CertifyVuln).to_vec()));
            }
        }
        Ok(None)
    }

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &CertifyVulnSpec) -> GuacResult<bool> {
        if no_match(spec.time_scanned.as_ref(), &self.time_scanned)
            || no_match(spec.db_uri.as_deref(), self.db_uri.as_str())
            || no_match(spec.db_version.as_deref(), self.db_version.as_str())
            || no_match(spec.scanner_uri.as_deref(), self.scanner_uri.as_str())
            || no_match(spec.scanner_version.as_deref(), self.scanner_version.as_str())
            || no_match(spec.origin.as_deref(), self.origin.as_str())
            || no_match(spec.collector.as_deref(), self.collector.as_str())
            || no_match(spec.document_ref.as_deref(), self.document_ref.as_str())
        {
            return Ok(false);
        }
        if let Some(vuln) = &spec.vulnerability {
            if backend.build_vuln_response(ctx, &self.vulnerability, Some(vuln))?.is_none() {
                return Ok(false);
            }
        }
        if let Some(pkg) = &spec.package {
            if backend.build_package_response(ctx, &self.pkg, Some(pkg))?.is_none() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<CertifyVuln> {
        let package = backend
            .build_package_response(ctx, &self.pkg, None)?
            .ok_or_else(|| GuacError::internal(format!("certifyVuln {} lost its package", self.id)))?;
        let vulnerability = backend
            .build_vuln_response(ctx, &self.vulnerability, None)?
            .ok_or_else(|| GuacError::internal(format!("certifyVuln {} lost its vulnerability", self.id)))?;
        Ok(CertifyVuln {
            id: self.id.clone(),
            package,
            vulnerability,
            metadata: ScanMetadata {
                time_scanned: self.time_scanned,
                db_uri: self.db_uri.clone(),
                db_version: self.db_version.clone(),
                scanner_uri: self.scanner_uri.clone(),
                scanner_version: self.scanner_version.clone(),
                origin: self.origin.clone(),
                collector: self.collector.clone(),
                document_ref: self.document_ref.clone(),
            },
        })
    }
}

struct VulnIngest<'a> {
    pkg: &'a IdOrPkgInput,
    vulnerability: &'a IdOrVulnerabilityInput,
    meta: &'a ScanMetadataInput,
}

impl KvBackend {
    /// Records a scan of `pkg` that found `vulnerability`.
    ///
    /// A rescan with a newer `time_scanned` keeps the identifier and refreshes
    /// the stored scan time.
    ///
    /// # Errors
    /// Unresolvable references and store failures, wrapped with the operation name.
    pub fn ingest_certify_vuln(
        &self,
        ctx: &Context,
        pkg: &IdOrPkgInput,
        vulnerability: &IdOrVulnerabilityInput,
        meta: &ScanMetadataInput,
    ) -> GuacResult<String> {
        const OP: &str = "IngestCertifyVuln";
        let input = VulnIngest {
            pkg,
            vulnerability,
            meta,
        };
        self.ingest_vulns(ctx, OP, &[input])?
            .pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation(OP))
    }

    /// Batch form of [`Self::ingest_certify_vuln`].
    ///
    /// # Errors
    /// As the single form. Misaligned slices fail before any write.
    pub fn ingest_certify_vulns(
        &self,
        ctx: &Context,
        pkgs: &[IdOrPkgInput],
        vulnerabilities: &[IdOrVulnerabilityInput],
        metas: &[ScanMetadataInput],
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "IngestCertifyVulns";
        let len = validation::batch(
            "packages",
            &[("packages", pkgs.len())],
            &[("vulnerabilities", vulnerabilities.len()), ("certifyVulns", metas.len())],
        )
        .in_operation(OP)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let inputs: Vec<VulnIngest<'_>> = pkgs
            .iter()
            .zip(vulnerabilities)
            .zip(metas)
            .map(|((pkg, vulnerability), meta)| VulnIngest {
                pkg,
                vulnerability,
                meta,
            })
            .collect();
        self.ingest_vulns(ctx, OP, &inputs)
    }

    fn ingest_vulns(&self, ctx: &Context, op: &'static str, inputs: &[VulnIngest<'_>]) -> GuacResult<Vec<String>> {
        self.upsert_links(ctx, op, inputs, |backend, ctx, input| {
            let vulnerability = backend.resolve_vulnerability(ctx, input.vulnerability)?.id;
            let pkg = backend.resolve_pkg_version(ctx, input.pkg)?.id;
            let meta = input.meta;
            let record = CertifyVulnNode {
                id: String::new(),
                pkg: pkg.clone(),
                vulnerability: vulnerability.clone(),
                time_scanned: meta.time_scanned,
                db_uri: meta.db_uri.clone(),
                db_version: meta.db_version.clone(),
                scanner_uri: meta.scanner_uri.clone(),
                scanner_version: meta.scanner_version.clone(),
                origin: meta.origin.clone(),
                collector: meta.collector.clone(),
                document_ref: meta.document_ref.clone(),
            };
            Ok(Prepared {
                record,
                targets: vec![LinkTarget::PkgVersion(pkg), LinkTarget::Vulnerability(vulnerability)],
            })
        })
    }

    /// Vulnerability certifications matching `spec`.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn certify_vuln(&self, ctx: &Context, spec: &CertifyVulnSpec) -> GuacResult<Vec<CertifyVuln>> {
        self.query_nodes::<CertifyVulnNode>(ctx, "CertifyVuln", spec)
    }

    /// One page of vulnerability certifications matching `spec`.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn certify_vuln_list(
        &self,
        ctx: &Context,
        spec: &CertifyVulnSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<CertifyVuln>> {
        self.list_nodes::<CertifyVulnNode>(ctx, "CertifyVulnList", spec, after, first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PkgInputSpec, PkgSpec, VulnerabilityInputSpec, VulnerabilitySpec};
    use chrono::TimeZone;

    fn ctx() -> Context {
        Context::background()
    }

    fn meta(day: u32) -> ScanMetadataInput {
        ScanMetadataInput {
            time_scanned: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            db_uri: "osv.dev".to_string(),
            scanner_uri: "osv-scanner".to_string(),
            ..ScanMetadataInput::default()
        }
    }

    fn setup() -> (KvBackend, IdOrPkgInput, IdOrVulnerabilityInput) {
        let backend = KvBackend::in_memory();
        let pkg = PkgInputSpec::new("pypi", "", "django").with_version("4.2.0");
        backend.ingest_package(&ctx(), &pkg).unwrap();
        let vuln = VulnerabilityInputSpec::new("ghsa", "GHSA-1234");
        backend.ingest_vulnerability(&ctx(), &vuln.clone().into()).unwrap();
        (backend, pkg.into(), vuln.into())
    }

    #[test]
    fn test_rescan_keeps_id_and_refreshes_time() {
        let (backend, pkg, vuln) = setup();
        let first = backend.ingest_certify_vuln(&ctx(), &pkg, &vuln, &meta(1)).unwrap();
        let second = backend.ingest_certify_vuln(&ctx(), &pkg, &vuln, &meta(9)).unwrap();
        assert_eq!(first, second);

        let found = backend.certify_vuln(&ctx(), &CertifyVulnSpec::default()).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].metadata.time_scanned, meta(9).time_scanned);
    }

    #[test]
    fn test_filter_by_vulnerability_and_package() {
        let (backend, pkg, vuln) = setup();
        backend.ingest_certify_vuln(&ctx(), &pkg, &vuln, &meta(1)).unwrap();

        let spec = CertifyVulnSpec {
            vulnerability: Some(VulnerabilitySpec::exact("GHSA", "ghsa-1234")),
            package: Some(PkgSpec::name("pypi", "", "django")),
            ..CertifyVulnSpec::default()
        };
        assert_eq!(backend.certify_vuln(&ctx(), &spec).unwrap().len(), 1);

        let other = CertifyVulnSpec {
            package: Some(PkgSpec::name("pypi", "", "flask")),
            ..CertifyVulnSpec::default()
        };
        assert!(backend.certify_vuln(&ctx(), &other).unwrap().is_empty());
    }

    #[test]
    fn test_uneven_batch_rejected() {
        let (backend, pkg, vuln) = setup();
        let err = backend
            .ingest_certify_vulns(&ctx(), &[pkg.clone(), pkg], &[vuln], &[meta(1), meta(2)])
            .unwrap_err();
        assert!(err.is_validation());
        assert!(backend.all_keys::<CertifyVulnNode>(&ctx()).unwrap().is_empty());
    }
}
