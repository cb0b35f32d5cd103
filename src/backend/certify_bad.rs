//! "Known bad" claims about a package, source or artifact.
//!
//! A package subject links either the version node or, with
//! [`PkgMatchType::AllVersions`](crate::model::PkgMatchType), the name node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{LinkKind, Linkable};
use super::matching::no_match;
use super::query::{backrefs_of, Listable};
use super::store::StoredNode;
use super::subject::subject_fields;
use super::upsert::{LinkRecord, Prepared};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{
    CertifyBad, CertifyBadInputSpec, CertifyBadSpec, Connection, MatchFlags, PkgSpec,
    PackageSourceOrArtifactInput, PackageSourceOrArtifactInputs,
};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CertifyBadNode {
    pub(crate) id: String,
    /// A package version or package name ID.
    pub(crate) pkg: String,
    pub(crate) source: String,
    pub(crate) artifact: String,
    pub(crate) justification: String,
    pub(crate) known_since: DateTime<Utc>,
    pub(crate) origin: String,
    pub(crate) collector: String,
    pub(crate) document_ref: String,
}

impl StoredNode for CertifyBadNode {
    const COLLECTION: &'static str = "certify_bads";
    const KIND: &'static str = "certifyBad";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("certify_bad")
            .field("pkg", &self.pkg)
            .field("source", &self.source)
            .field("artifact", &self.artifact)
            .field("justification", &self.justification)
            .time("known_since", &self.known_since)
            .field("origin", &self.origin)
            .field("collector", &self.collector)
            .field("document_ref", &self.document_ref)
            .finish()
    }
}

impl LinkRecord for CertifyBadNode {
    const LINK_KIND: LinkKind = LinkKind::CertifyBad;
}

impl KvBackend {
    /// Links on both the matching versions and the exact name, since a bad
    /// claim may hang off either level.
    fn package_bad_candidates(&self, ctx: &Context, filter: &PkgSpec) -> GuacResult<Option<Vec<String>>> {
        let versions = self.find_package_versions(ctx, filter)?;
        let name = self.exact_package_name(ctx, filter)?;
        if versions.is_empty() && name.is_none() {
            return Ok(None);
        }
        let mut ids = backrefs_of(&versions, LinkKind::CertifyBad);
        ids.extend(backrefs_of(name.iter(), LinkKind::CertifyBad));
        Ok(Some(ids))
    }
}

impl Listable for CertifyBadNode {
    type Spec = CertifyBadSpec;
    type Output = CertifyBad;

    fn spec_id(spec: &CertifyBadSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(backend: &KvBackend, ctx: &Context, spec: &CertifyBadSpec) -> GuacResult<Option<Vec<String>>> {
        let Some(subject) = &spec.subject else {
            return Ok(None);
        };
        if let Some(pkg) = &subject.package {
            if let Some(ids) = backend.package_bad_candidates(ctx, pkg)? {
                return Ok(Some(ids));
            }
        }
        if let Some(src) = &subject.source {
            if let Some(ids) = backend.source_candidates(ctx, src, LinkKind::CertifyBad)? {
                return Ok(Some(ids));
            }
        }
        if let Some(art) = &subject.artifact {
            return backend.artifact_candidates(ctx, art, LinkKind::CertifyBad);
        }
        Ok(None)
    }

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &CertifyBadSpec) -> GuacResult<bool> {
        if no_match(spec.justification.as_deref(), self.justification.as_str())
            || no_match(spec.origin.as_deref(), self.origin.as_str())
            || no_match(spec.collector.as_deref(), self.collector.as_str())
            || no_match(spec.known_since.as_ref(), &self.known_since)
            || no_match(spec.document_ref.as_deref(), self.document_ref.as_str())
        {
            return Ok(false);
        }
        match &spec.subject {
            Some(subject) => Ok(backend
                .package_source_or_artifact_response(ctx, &self.pkg, &self.source, &self.artifact, Some(subject))?
                .is_some()),
            None => Ok(true),
        }
    }

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<CertifyBad> {
        let subject = backend
            .package_source_or_artifact_response(ctx, &self.pkg, &self.source, &self.artifact, None)?
            .ok_or_else(|| GuacError::internal(format!("certifyBad {} lost its subject", self.id)))?;
        Ok(CertifyBad {
            id: self.id.clone(),
            subject,
            justification: self.justification.clone(),
            origin: self.origin.clone(),
            collector: self.collector.clone(),
            known_since: self.known_since,
            document_ref: self.document_ref.clone(),
        })
    }
}

struct BadIngest<'a> {
    subject: PackageSourceOrArtifactInput,
    bad: &'a CertifyBadInputSpec,
}

impl KvBackend {
    /// Records that a package, source or artifact is known to be bad.
    ///
    /// # Errors
    /// Validation failures (including an unset `known_since`), unresolvable
    /// references and store failures, wrapped with the operation name.
    pub fn ingest_certify_bad(
        &self,
        ctx: &Context,
        subject: &PackageSourceOrArtifactInput,
        pkg_match_type: MatchFlags,
        certify_bad: &CertifyBadInputSpec,
    ) -> GuacResult<String> {
        const OP: &str = "IngestCertifyBad";
        validation::package_source_or_artifact_input(subject).in_operation(OP)?;
        validation::non_zero_time("knownSince", &certify_bad.known_since).in_operation(OP)?;
        let input = BadIngest {
            subject: subject.clone(),
            bad: certify_bad,
        };
        self.ingest_bads(ctx, OP, pkg_match_type, &[input])?
            .pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation(OP))
    }

    /// Batch form of [`Self::ingest_certify_bad`].
    ///
    /// # Errors
    /// As the single form. Misaligned slices fail before any write.
    pub fn ingest_certify_bads(
        &self,
        ctx: &Context,
        subjects: &PackageSourceOrArtifactInputs,
        pkg_match_type: MatchFlags,
        certify_bads: &[CertifyBadInputSpec],
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "IngestCertifyBads";
        let len = validation::batch(
            "packages, sources or artifacts",
            &[
                ("packages", subjects.packages.len()),
                ("sources", subjects.sources.len()),
                ("artifacts", subjects.artifacts.len()),
            ],
            &[("certifyBads", certify_bads.len())],
        )
        .in_operation(OP)?;
        for bad in certify_bads {
            validation::non_zero_time("knownSince", &bad.known_since).in_operation(OP)?;
        }
        if len == 0 {
            return Ok(Vec::new());
        }
        let inputs: Vec<BadIngest<'_>> = subjects
            .split()
            .into_iter()
            .zip(certify_bads)
            .map(|(subject, bad)| BadIngest { subject, bad })
            .collect();
        self.ingest_bads(ctx, OP, pkg_match_type, &inputs)
    }

    fn ingest_bads(
        &self,
        ctx: &Context,
        op: &'static str,
        flags: MatchFlags,
        inputs: &[BadIngest<'_>],
    ) -> GuacResult<Vec<String>> {
        self.upsert_links(ctx, op, inputs, |backend, ctx, input| {
            let subject = backend.resolve_package_source_or_artifact(ctx, &input.subject, flags)?;
            let (pkg, source, artifact) = subject_fields(&subject);
            let bad = input.bad;
            let record = CertifyBadNode {
                id: String::new(),
                pkg,
                source,
                artifact,
                justification: bad.justification.clone(),
                known_since: bad.known_since,
                origin: bad.origin.clone(),
                collector: bad.collector.clone(),
                document_ref: bad.document_ref.clone(),
            };
            Ok(Prepared {
                record,
                targets: vec![subject],
            })
        })
    }

    /// Bad claims matching `spec`.
    ///
    /// # Errors
    /// A filter naming more than one subject kind; store failures.
    pub fn certify_bad(&self, ctx: &Context, spec: &CertifyBadSpec) -> GuacResult<Vec<CertifyBad>> {
        const OP: &str = "CertifyBad";
        validation::package_source_or_artifact_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.query_nodes::<CertifyBadNode>(ctx, OP, spec)
    }

    /// One page of bad claims matching `spec`.
    ///
    /// # Errors
    /// A filter naming more than one subject kind; store failures.
    pub fn certify_bad_list(
        &self,
        ctx: &Context,
        spec: &CertifyBadSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<CertifyBad>> {
        const OP: &str = "CertifyBadList";
        validation::package_source_or_artifact_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.list_nodes::<CertifyBadNode>(ctx, OP, spec, after, first)
    }
}
