//! Occurrence links: an artifact is an instance of a package version or source.

use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{LinkKind, LinkTarget};
use super::matching::no_match;
use super::query::Listable;
use super::store::StoredNode;
use super::subject::subject_fields;
use super::upsert::{LinkRecord, Prepared};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{
    Connection, IdOrArtifactInput, IsOccurrence, IsOccurrenceInputSpec, IsOccurrenceSpec,
    PackageOrSourceInput, PackageOrSourceInputs,
};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct IsOccurrenceNode {
    pub(crate) id: String,
    pub(crate) pkg: String,
    pub(crate) source: String,
    pub(crate) artifact: String,
    pub(crate) justification: String,
    pub(crate) origin: String,
    pub(crate) collector: String,
    pub(crate) document_ref: String,
}

impl StoredNode for IsOccurrenceNode {
    const COLLECTION: &'static str = "is_occurrences";
    const KIND: &'static str = "isOccurrence";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("is_occurrence")
            .field("pkg", &self.pkg)
            .field("source", &self.source)
            .field("artifact", &self.artifact)
            .field("justification", &self.justification)
            .field("origin", &self.origin)
            .field("collector", &self.collector)
            .field("document_ref", &self.document_ref)
            .finish()
    }
}

impl LinkRecord for IsOccurrenceNode {
    const LINK_KIND: LinkKind = LinkKind::IsOccurrence;
}

impl Listable for IsOccurrenceNode {
    type Spec = IsOccurrenceSpec;
    type Output = IsOccurrence;

    fn spec_id(spec: &IsOccurrenceSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(backend: &KvBackend, ctx: &Context, spec: &IsOccurrenceSpec) -> GuacResult<Option<Vec<String>>> {
        if let Some(art) = &spec.artifact {
            if let Some(ids) = backend.artifact_candidates(ctx, art, LinkKind::IsOccurrence)? {
                return Ok(Some(ids));
            }
        }
        backend.package_or_source_candidates(ctx, spec.subject.as_ref(), LinkKind::IsOccurrence)
    }

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &IsOccurrenceSpec) -> GuacResult<bool> {
        if no_match(spec.justification.as_deref(), self.justification.as_str())
            || no_match(spec.origin.as_deref(), self.origin.as_str())
            || no_match(spec.collector.as_deref(), self.collector.as_str())
            || no_match(spec.document_ref.as_deref(), self.document_ref.as_str())
        {
            return Ok(false);
        }
        if let Some(art) = &spec.artifact {
            if !backend.artifact_matches(ctx, &self.artifact, art)? {
                return Ok(false);
            }
        }
        match &spec.subject {
            Some(subject) => Ok(backend
                .package_or_source_response(ctx, &self.pkg, &self.source, Some(subject))?
                .is_some()),
            None => Ok(true),
        }
    }

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<IsOccurrence> {
        let subject = backend
            .package_or_source_response(ctx, &self.pkg, &self.source, None)?
            .ok_or_else(|| GuacError::internal(format!("isOccurrence {} lost its subject", self.id)))?;
        let artifact = backend
            .build_artifact_response(ctx, &self.artifact, None)?
            .ok_or_else(|| GuacError::internal(format!("isOccurrence {} lost its artifact", self.id)))?;
        Ok(IsOccurrence {
            id: self.id.clone(),
            subject,
            artifact,
            justification: self.justification.clone(),
            origin: self.origin.clone(),
            collector: self.collector.clone(),
            document_ref: self.document_ref.clone(),
        })
    }
}

struct OccurrenceIngest<'a> {
    subject: PackageOrSourceInput,
    artifact: &'a IdOrArtifactInput,
    occurrence: &'a IsOccurrenceInputSpec,
}

impl KvBackend {
    /// Records that `artifact` is an instance of a package version or source.
    ///
    /// # Errors
    /// Validation failures, unresolvable references and store failures, wrapped
    /// with the operation name.
    pub fn ingest_occurrence(
        &self,
        ctx: &Context,
        subject: &PackageOrSourceInput,
        artifact: &IdOrArtifactInput,
        occurrence: &IsOccurrenceInputSpec,
    ) -> GuacResult<String> {
        const OP: &str = "IngestOccurrence";
        validation::package_or_source_input(subject).in_operation(OP)?;
        let input = OccurrenceIngest {
            subject: subject.clone(),
            artifact,
            occurrence,
        };
        self.ingest_occurrence_inputs(ctx, OP, &[input])?
            .pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation(OP))
    }

    /// Batch form of [`Self::ingest_occurrence`].
    ///
    /// # Errors
    /// As the single form. Misaligned slices fail before any write.
    pub fn ingest_occurrences(
        &self,
        ctx: &Context,
        subjects: &PackageOrSourceInputs,
        artifacts: &[IdOrArtifactInput],
        occurrences: &[IsOccurrenceInputSpec],
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "IngestOccurrences";
        let len = validation::batch(
            "packages or sources",
            &[("packages", subjects.packages.len()), ("sources", subjects.sources.len())],
            &[("artifacts", artifacts.len()), ("occurrences", occurrences.len())],
        )
        .in_operation(OP)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let inputs: Vec<OccurrenceIngest<'_>> = subjects
            .split()
            .into_iter()
            .zip(artifacts)
            .zip(occurrences)
            .map(|((subject, artifact), occurrence)| OccurrenceIngest {
                subject,
                artifact,
                occurrence,
            })
            .collect();
        self.ingest_occurrence_inputs(ctx, OP, &inputs)
    }

    fn ingest_occurrence_inputs(
        &self,
        ctx: &Context,
        op: &'static str,
        inputs: &[OccurrenceIngest<'_>],
    ) -> GuacResult<Vec<String>> {
        self.upsert_links(ctx, op, inputs, |backend, ctx, input| {
            let artifact = backend.resolve_artifact(ctx, input.artifact)?.id;
            let subject = backend.resolve_package_or_source(ctx, &input.subject)?;
            let (pkg, source, _) = subject_fields(&subject);
            let occ = input.occurrence;
            let record = IsOccurrenceNode {
                id: String::new(),
                pkg,
                source,
                artifact: artifact.clone(),
                justification: occ.justification.clone(),
                origin: occ.origin.clone(),
                collector: occ.collector.clone(),
                document_ref: occ.document_ref.clone(),
            };
            Ok(Prepared {
                record,
                targets: vec![subject, LinkTarget::Artifact(artifact)],
            })
        })
    }

    /// Occurrences matching `spec`.
    ///
    /// # Errors
    /// A filter naming both subject kinds; store failures.
    pub fn is_occurrence(&self, ctx: &Context, spec: &IsOccurrenceSpec) -> GuacResult<Vec<IsOccurrence>> {
        const OP: &str = "IsOccurrence";
        validation::package_or_source_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.query_nodes::<IsOccurrenceNode>(ctx, OP, spec)
    }

    /// One page of occurrences matching `spec`.
    ///
    /// # Errors
    /// A filter naming both subject kinds; store failures.
    pub fn is_occurrence_list(
        &self,
        ctx: &Context,
        spec: &IsOccurrenceSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<IsOccurrence>> {
        const OP: &str = "IsOccurrenceList";
        validation::package_or_source_filter(spec.subject.as_ref()).in_operation(OP)?;
        self.list_nodes::<IsOccurrenceNode>(ctx, OP, spec, after, first)
    }
}
