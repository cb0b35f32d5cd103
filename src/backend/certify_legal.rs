//! Legal certifications: declared and discovered licenses of a package version
//! or source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::license::LicenseNode;
use super::link::{LinkKind, LinkTarget, Linkable};
use super::matching::{match_multiset, no_match};
use super::query::Listable;
use super::store::StoredNode;
use super::subject::subject_fields;
use super::upsert::{LinkRecord, Prepared};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{
    CertifyLegal, CertifyLegalInputSpec, CertifyLegalSpec, Connection, IdOrLicenseInput,
    LicenseSpec, PackageOrSourceInput, PackageOrSourceInputs,
};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CertifyLegalNode {
    pub(crate) id: String,
    pub(crate) pkg: String,
    pub(crate) source: String,
    /// Sorted license IDs.
    pub(crate) declared_licenses: Vec<String>,
    /// Sorted license IDs.
    pub(crate) discovered_licenses: Vec<String>,
    pub(crate) declared_license: String,
    pub(crate) discovered_license: String,
    pub(crate) attribution: String,
    pub(crate) justification: String,
    pub(crate) time_scanned: DateTime<Utc>,
    pub(crate) origin: String,
    pub(crate) collector: String,
    pub(crate) document_ref: String,
}

impl StoredNode for CertifyLegalNode {
    const COLLECTION: &'static str = "certify_legals";
    const KIND: &'static str = "certifyLegal";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    /// Scan time and document reference are left out so a rescan refreshes the
    /// existing record.
    fn key(&self) -> String {
        KeyHasher::new("certify_legal")
            .field("pkg", &self.pkg)
            .field("source", &self.source)
            .list("declared_licenses", &self.declared_licenses)
            .list("discovered_licenses", &self.discovered_licenses)
            .field("declared_license", &self.declared_license)
            .field("discovered_license", &self.discovered_license)
            .field("attribution", &self.attribution)
            .field("justification", &self.justification)
            .field("origin", &self.origin)
            .field("collector", &self.collector)
            .finish()
    }
}

impl LinkRecord for CertifyLegalNode {
    const LINK_KIND: LinkKind = LinkKind::CertifyLegal;
}

impl CertifyLegalNode {
    fn scalars_match(&self, spec: &CertifyLegalSpec) -> bool {
        !(no_match(spec.declared_license.as_deref(), self.declared_license.as_str())
            || no_match(spec.discovered_license.as_deref(), self.discovered_license.as_str())
            || no_match(spec.attribution.as_deref(), self.attribution.as_str())
            || no_match(spec.justification.as_deref(), self.justification.as_str())
            || no_match(spec.origin.as_deref(), self.origin.as_str())
            || no_match(spec.collector.as_deref(), self.collector.as_str())
            || no_match(spec.document_ref.as_deref(), self.document_ref.as_str())
            || no_match(spec.time_scanned.as_ref(), &self.time_scanned))
    }
}

impl KvBackend {
    fn licenses_match(&self, ctx: &Context, filters: &[LicenseSpec], ids: &[String]) -> GuacResult<bool> {
        match_multiset(
            filters,
            ids,
            |spec| Ok(self.license_exact(ctx, spec)?.map(|l| l.id)),
            |spec, id| self.license_fields_match(ctx, id, spec),
        )
    }
}

impl Listable for CertifyLegalNode {
    type Spec = CertifyLegalSpec;
    type Output = CertifyLegal;

    fn spec_id(spec: &CertifyLegalSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(backend: &KvBackend, ctx: &Context, spec: &CertifyLegalSpec) -> GuacResult<Option<Vec<String>>> {
        if let Some(ids) = backend.package_or_source_candidates(ctx, spec.subject.as_ref(), LinkKind::CertifyLegal)? {
            return Ok(Some(ids));
        }
        for filter in spec.declared_licenses.iter().chain(&spec.discovered_licenses) {
            if let Some(license) = backend.license_exact(ctx, filter)? {
                return Ok(Some(license.backrefs().get(LinkKind::CertifyLegal).to_vec()));
            }
        }
        Ok(None)
    }

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &CertifyLegalSpec) -> GuacResult<bool> {
        if !self.scalars_match(spec)
            || !backend.licenses_match(ctx, &spec.declared_licenses, &self.declared_licenses)?
            || !backend.licenses_match(ctx, &spec.discovered_licenses, &self.discovered_licenses)?
        {
            return Ok(false);
        }
        match &spec.subject {
            Some(subject) => Ok(backend
                .package_or_source_response(ctx, &self.pkg, &self.source, Some(subject))?
                .is_some()),
            None => Ok(true),
        }
    }

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<CertifyLegal> {
        let subject = backend
            .package_or_source_response(ctx, &self.pkg, &self.source, None)?
            .ok_or_else(|| GuacError::internal(format!("certifyLegal {} lost its subject", self.id)))?;
        let licenses = |ids: &[String]| {
            ids.iter()
                .map(|id| Ok(backend.by_id::<LicenseNode>(ctx, id)?.to_license()))
                .collect::<GuacResult<Vec<_>>>()
        };
        Ok(CertifyLegal {
            id: self.id.clone(),
            subject,
            declared_licenses: licenses(&self.declared_licenses)?,
            discovered_licenses: licenses(&self.discovered_licenses)?,
            declared_license: self.declared_license.clone(),
            discovered_license: self.discovered_license.clone(),
            attribution: self.attribution.clone(),
            justification: self.justification.clone(),
            time_scanned: self.time_scanned,
            origin: self.origin.clone(),
            collector: self.collector.clone(),
            document_ref: self.document_ref.clone(),
        })
    }
}

struct LegalIngest<'a> {
    subject: PackageOrSourceInput,
    declared: &'a [IdOrLicenseInput],
    discovered: &'a [IdOrLicenseInput],
    legal: &'a CertifyLegalInputSpec,
}

impl KvBackend {
    /// Records the licenses found for a package version or source.
    ///
    /// The subject and every license must already exist.
    ///
    /// # Errors
    /// Validation failures, unresolvable references and store failures, wrapped
    /// with the operation name.
    pub fn ingest_certify_legal(
        &self,
        ctx: &Context,
        subject: &PackageOrSourceInput,
        declared: &[IdOrLicenseInput],
        discovered: &[IdOrLicenseInput],
        legal: &CertifyLegalInputSpec,
    ) -> GuacResult<String> {
        const OP: &str = "IngestCertifyLegal";
        validation::package_or_source_input(subject).in_operation(OP)?;
        let input = LegalIngest {
            subject: subject.clone(),
            declared,
            discovered,
            legal,
        };
        self.ingest_legals(ctx, OP, &[input])?
            .pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation(OP))
    }

    /// Batch form of [`Self::ingest_certify_legal`]. All slices run in parallel.
    ///
    /// # Errors
    /// As the single form. Misaligned slices fail before any write.
    pub fn ingest_certify_legals(
        &self,
        ctx: &Context,
        subjects: &PackageOrSourceInputs,
        declared: &[Vec<IdOrLicenseInput>],
        discovered: &[Vec<IdOrLicenseInput>],
        legals: &[CertifyLegalInputSpec],
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "IngestCertifyLegals";
        let len = validation::batch(
            "packages or sources",
            &[("packages", subjects.packages.len()), ("sources", subjects.sources.len())],
            &[
                ("declaredLicensesList", declared.len()),
                ("discoveredLicensesList", discovered.len()),
                ("certifyLegals", legals.len()),
            ],
        )
        .in_operation(OP)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let inputs: Vec<LegalIngest<'_>> = subjects
            .split()
            .into_iter()
            .zip(declared)
            .zip(discovered)
            .zip(legals)
            .map(|(((subject, declared), discovered), legal)| LegalIngest {
                subject,
                declared,
                discovered,
                legal,
            })
            .collect();
        self.ingest_legals(ctx, OP, &inputs)
    }

    fn ingest_legals(&self, ctx: &Context, op: &'static str, inputs: &[LegalIngest<'_>]) -> GuacResult<Vec<String>> {
        self.upsert_links(ctx, op, inputs, |backend, ctx, input| {
            let resolve = |refs: &[IdOrLicenseInput]| {
                let mut ids = refs
                    .iter()
                    .map(|r| Ok(backend.resolve_license(ctx, r)?.id))
                    .collect::<GuacResult<Vec<_>>>()?;
                ids.sort_unstable();
                Ok::<_, GuacError>(ids)
            };
            let declared_licenses = resolve(input.declared)?;
            let discovered_licenses = resolve(input.discovered)?;
            let subject = backend.resolve_package_or_source(ctx, &input.subject)?;
            let (pkg, source, _) = subject_fields(&subject);

            let legal = input.legal;
            let record = CertifyLegalNode {
                id: String::new(),
                pkg,
                source,
                declared_licenses,
                discovered_licenses,
                declared_license: legal.declared_license.clone(),
                discovered_license: legal.discovered_license.clone(),
                attribution: legal.attribution.clone(),
                justification: legal.justification.clone(),
                time_scanned: legal.time_scanned,
                origin: legal.origin.clone(),
                collector: legal.collector.clone(),
                document_ref: legal.document_ref.clone(),
            };
            let targets = std::iter::once(subject)
                .chain(record.declared_licenses.iter().cloned().map(LinkTarget::License))
                .chain(record.discovered_licenses.iter().cloned().map(LinkTarget::License))
                .collect();
            Ok(Prepared { record, targets })
        })
    }

    /// Legal certifications matching `spec`.
    ///
    /// # Errors
    /// A filter naming more than one subject kind; store failures.
    pub fn certify_legal(&self, ctx: &Context, spec: &CertifyLegalSpec) -> GuacResult<Vec<CertifyLegal>> {
        const OP: &str = "CertifyLegal";
        validation::package_or_source_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.query_nodes::<CertifyLegalNode>(ctx, OP, spec)
    }

    /// One page of legal certifications matching `spec`.
    ///
    /// # Errors
    /// A filter naming more than one subject kind; store failures.
    pub fn certify_legal_list(
        &self,
        ctx: &Context,
        spec: &CertifyLegalSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<CertifyLegal>> {
        const OP: &str = "CertifyLegalList";
        validation::package_or_source_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.list_nodes::<CertifyLegalNode>(ctx, OP, spec, after, first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        LicenseInputSpec, PackageOrSource, PackageOrSourceSpec, PkgInputSpec, PkgSpec, SourceInputSpec,
    };
    use chrono::TimeZone;

    fn ctx() -> Context {
        Context::background()
    }

    fn scanned(day: u32) -> CertifyLegalInputSpec {
        CertifyLegalInputSpec {
            declared_license: "MIT".to_string(),
            justification: "scanner".to_string(),
            time_scanned: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            ..CertifyLegalInputSpec::default()
        }
    }

    fn setup() -> (KvBackend, PkgInputSpec, String) {
        let backend = KvBackend::in_memory();
        let pkg = PkgInputSpec::new("npm", "", "left-pad").with_version("1.0.0");
        backend.ingest_package(&ctx(), &pkg).unwrap();
        let mit = backend
            .ingest_license(&ctx(), &LicenseInputSpec::listed("MIT", "3.21").into())
            .unwrap();
        (backend, pkg, mit)
    }

    #[test]
    fn test_ingest_is_idempotent_and_links_license() {
        let (backend, pkg, mit) = setup();
        let subject = PackageOrSourceInput::package(pkg);
        let declared = [IdOrLicenseInput::from_id(&mit)];
        let a = backend
            .ingest_certify_legal(&ctx(), &subject, &declared, &[], &scanned(1))
            .unwrap();
        let b = backend
            .ingest_certify_legal(&ctx(), &subject, &declared, &[], &scanned(1))
            .unwrap();
        assert_eq!(a, b);

        let license: LicenseNode = backend.by_id(&ctx(), &mit).unwrap();
        assert_eq!(license.backrefs.get(LinkKind::CertifyLegal), [a]);
    }

    #[test]
    fn test_rescan_refreshes_time_scanned() {
        let (backend, pkg, mit) = setup();
        let subject = PackageOrSourceInput::package(pkg);
        let declared = [IdOrLicenseInput::from_id(&mit)];
        let first = backend
            .ingest_certify_legal(&ctx(), &subject, &declared, &[], &scanned(1))
            .unwrap();
        let second = backend
            .ingest_certify_legal(&ctx(), &subject, &declared, &[], &scanned(5))
            .unwrap();
        assert_eq!(first, second);

        let found = backend
            .certify_legal(&ctx(), &CertifyLegalSpec::default())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].time_scanned, scanned(5).time_scanned);
    }

    #[test]
    fn test_missing_license_fails_without_writes() {
        let (backend, pkg, _) = setup();
        let err = backend
            .ingest_certify_legal(
                &ctx(),
                &PackageOrSourceInput::package(pkg),
                &[LicenseInputSpec::listed("GPL-3.0", "3.21").into()],
                &[],
                &scanned(1),
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().starts_with("IngestCertifyLegal ::"));
        assert!(backend.all_keys::<CertifyLegalNode>(&ctx()).unwrap().is_empty());
    }

    #[test]
    fn test_subject_kind_filter() {
        let (backend, pkg, mit) = setup();
        let src = SourceInputSpec::new("git", "github.com/left", "pad");
        backend.ingest_source(&ctx(), &src).unwrap();
        let declared = [IdOrLicenseInput::from_id(&mit)];
        backend
            .ingest_certify_legal(&ctx(), &PackageOrSourceInput::package(pkg), &declared, &[], &scanned(1))
            .unwrap();
        backend
            .ingest_certify_legal(&ctx(), &PackageOrSourceInput::source(src), &declared, &[], &scanned(1))
            .unwrap();

        let spec = CertifyLegalSpec {
            subject: Some(PackageOrSourceSpec {
                package: Some(PkgSpec::default()),
                source: None,
            }),
            ..CertifyLegalSpec::default()
        };
        let found = backend.certify_legal(&ctx(), &spec).unwrap();
        assert_eq!(found.len(), 1);
        assert!(matches!(found[0].subject, PackageOrSource::Package(_)));
    }

    #[test]
    fn test_unresolved_license_id_falls_back_to_fields() {
        let (backend, pkg, mit) = setup();
        let declared = [IdOrLicenseInput::from_id(&mit)];
        backend
            .ingest_certify_legal(&ctx(), &PackageOrSourceInput::package(pkg), &declared, &[], &scanned(1))
            .unwrap();

        let stale_id = CertifyLegalSpec {
            declared_licenses: vec![LicenseSpec {
                id: Some("ffffffffffffffff".to_string()),
                ..LicenseSpec::name("MIT")
            }],
            ..CertifyLegalSpec::default()
        };
        assert_eq!(backend.certify_legal(&ctx(), &stale_id).unwrap().len(), 1);

        let wrong_name = CertifyLegalSpec {
            declared_licenses: vec![LicenseSpec {
                id: Some("ffffffffffffffff".to_string()),
                ..LicenseSpec::name("BSD-3-Clause")
            }],
            ..CertifyLegalSpec::default()
        };
        assert!(backend.certify_legal(&ctx(), &wrong_name).unwrap().is_empty());
    }

    #[test]
    fn test_batch_of_nothing_is_empty() {
        let backend = KvBackend::in_memory();
        let ids = backend
            .ingest_certify_legals(&ctx(), &PackageOrSourceInputs::default(), &[], &[], &[])
            .unwrap();
        assert!(ids.is_empty());
    }
}
