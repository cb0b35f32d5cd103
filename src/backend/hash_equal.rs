//! Hash equivalence between two artifacts. The pair is unordered.

use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{LinkKind, LinkTarget};
use super::matching::{match_multiset, no_match};
use super::query::Listable;
use super::store::StoredNode;
use super::upsert::{LinkRecord, Prepared};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{Connection, HashEqual, HashEqualInputSpec, HashEqualSpec, IdOrArtifactInput};
use crate::validation;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct HashEqualNode {
    pub(crate) id: String,
    /// Sorted artifact IDs.
    pub(crate) artifacts: Vec<String>,
    pub(crate) justification: String,
    pub(crate) origin: String,
    pub(crate) collector: String,
    pub(crate) document_ref: String,
}

impl StoredNode for HashEqualNode {
    const COLLECTION: &'static str = "hash_equals";
    const KIND: &'static str = "hashEqual";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("hash_equal")
            .list("artifacts", &self.artifacts)
            .field("justification", &self.justification)
            .field("origin", &self.origin)
            .field("collector", &self.collector)
            .field("document_ref", &self.document_ref)
            .finish()
    }
}

impl LinkRecord for HashEqualNode {
    const LINK_KIND: LinkKind = LinkKind::HashEqual;
}

impl Listable for HashEqualNode {
    type Spec = HashEqualSpec;
    type Output = HashEqual;

    fn spec_id(spec: &HashEqualSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(backend: &KvBackend, ctx: &Context, spec: &HashEqualSpec) -> GuacResult<Option<Vec<String>>> {
        for art in &spec.artifacts {
            if let Some(ids) = backend.artifact_candidates(ctx, art, LinkKind::HashEqual)? {
                return Ok(Some(ids));
            }
        }
        Ok(None)
    }

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &HashEqualSpec) -> GuacResult<bool> {
        if no_match(spec.justification.as_deref(), self.justification.as_str())
            || no_match(spec.origin.as_deref(), self.origin.as_str())
            || no_match(spec.collector.as_deref(), self.collector.as_str())
            || no_match(spec.document_ref.as_deref(), self.document_ref.as_str())
        {
            return Ok(false);
        }
        match_multiset(
            &spec.artifacts,
            &self.artifacts,
            |art| Ok(backend.exact_artifact(ctx, art)?.map(|a| a.id)),
            |art, id| backend.artifact_fields_match(ctx, id, art),
        )
    }

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<HashEqual> {
        let artifacts = self
            .artifacts
            .iter()
            .map(|id| {
                backend
                    .build_artifact_response(ctx, id, None)?
                    .ok_or_else(|| GuacError::internal(format!("hashEqual {} lost artifact {id}", self.id)))
            })
            .collect::<GuacResult<Vec<_>>>()?;
        Ok(HashEqual {
            id: self.id.clone(),
            artifacts,
            justification: self.justification.clone(),
            origin: self.origin.clone(),
            collector: self.collector.clone(),
            document_ref: self.document_ref.clone(),
        })
    }
}

struct HashEqualIngest<'a> {
    artifact: &'a IdOrArtifactInput,
    other: &'a IdOrArtifactInput,
    hash_equal: &'a HashEqualInputSpec,
}

impl KvBackend {
    /// Records that two artifacts are the same content under different digests.
    ///
    /// # Errors
    /// Unresolvable artifacts and store failures, wrapped with the operation name.
    pub fn ingest_hash_equal(
        &self,
        ctx: &Context,
        artifact: &IdOrArtifactInput,
        equal_artifact: &IdOrArtifactInput,
        hash_equal: &HashEqualInputSpec,
    ) -> GuacResult<String> {
        const OP: &str = "IngestHashEqual";
        let input = HashEqualIngest {
            artifact,
            other: equal_artifact,
            hash_equal,
        };
        self.ingest_hash_equal_inputs(ctx, OP, &[input])?
            .pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation(OP))
    }

    /// Batch form of [`Self::ingest_hash_equal`].
    ///
    /// # Errors
    /// As the single form. Misaligned slices fail before any write.
    pub fn ingest_hash_equals(
        &self,
        ctx: &Context,
        artifacts: &[IdOrArtifactInput],
        other_artifacts: &[IdOrArtifactInput],
        hash_equals: &[HashEqualInputSpec],
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "IngestHashEquals";
        let len = validation::batch(
            "artifacts",
            &[("artifacts", artifacts.len())],
            &[("otherArtifacts", other_artifacts.len()), ("hashEquals", hash_equals.len())],
        )
        .in_operation(OP)?;
        if len == 0 {
            return Ok(Vec::new());
        }
        let inputs: Vec<HashEqualIngest<'_>> = artifacts
            .iter()
            .zip(other_artifacts)
            .zip(hash_equals)
            .map(|((artifact, other), hash_equal)| HashEqualIngest {
                artifact,
                other,
                hash_equal,
            })
            .collect();
        self.ingest_hash_equal_inputs(ctx, OP, &inputs)
    }

    fn ingest_hash_equal_inputs(
        &self,
        ctx: &Context,
        op: &'static str,
        inputs: &[HashEqualIngest<'_>],
    ) -> GuacResult<Vec<String>> {
        self.upsert_links(ctx, op, inputs, |backend, ctx, input| {
            let mut artifacts = vec![
                backend.resolve_artifact(ctx, input.artifact)?.id,
                backend.resolve_artifact(ctx, input.other)?.id,
            ];
            artifacts.sort_unstable();
            let he = input.hash_equal;
            let targets = artifacts.iter().cloned().map(LinkTarget::Artifact).collect();
            let record = HashEqualNode {
                id: String::new(),
                artifacts,
                justification: he.justification.clone(),
                origin: he.origin.clone(),
                collector: he.collector.clone(),
                document_ref: he.document_ref.clone(),
            };
            Ok(Prepared { record, targets })
        })
    }

    /// Hash equivalences matching `spec`.
    ///
    /// # Errors
    /// A filter naming more than two artifacts; store failures.
    pub fn hash_equal(&self, ctx: &Context, spec: &HashEqualSpec) -> GuacResult<Vec<HashEqual>> {
        const OP: &str = "HashEqual";
        validation::hash_equal_filter(spec).in_operation(OP)?;
        self.query_nodes::<HashEqualNode>(ctx, OP, spec)
    }

    /// One page of hash equivalences matching `spec`.
    ///
    /// # Errors
    /// A filter naming more than two artifacts; store failures.
    pub fn hash_equal_list(
        &self,
        ctx: &Context,
        spec: &HashEqualSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<HashEqual>> {
        const OP: &str = "HashEqualList";
        validation::hash_equal_filter(spec).in_operation(OP)?;
        self.list_nodes::<HashEqualNode>(ctx, OP, spec, after, first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ArtifactInputSpec, ArtifactSpec};

    fn ctx() -> Context {
        Context::background()
    }

    fn setup() -> (KvBackend, IdOrArtifactInput, IdOrArtifactInput) {
        let backend = KvBackend::in_memory();
        let a: IdOrArtifactInput = ArtifactInputSpec::new("sha256", "aaaa").into();
        let b: IdOrArtifactInput = ArtifactInputSpec::new("sha1", "bbbb").into();
        backend.ingest_artifacts(&ctx(), &[a.clone(), b.clone()]).unwrap();
        (backend, a, b)
    }

    #[test]
    fn test_pair_order_does_not_matter() {
        let (backend, a, b) = setup();
        let he = HashEqualInputSpec::default();
        let x = backend.ingest_hash_equal(&ctx(), &a, &b, &he).unwrap();
        let y = backend.ingest_hash_equal(&ctx(), &b, &a, &he).unwrap();
        assert_eq!(x, y);
    }

    #[test]
    fn test_filter_by_either_artifact() {
        let (backend, a, b) = setup();
        backend
            .ingest_hash_equal(&ctx(), &a, &b, &HashEqualInputSpec::default())
            .unwrap();

        for digest in [("sha256", "aaaa"), ("sha1", "bbbb")] {
            let spec = HashEqualSpec {
                artifacts: vec![ArtifactSpec::digest(digest.0, digest.1)],
                ..HashEqualSpec::default()
            };
            assert_eq!(backend.hash_equal(&ctx(), &spec).unwrap().len(), 1);
        }

        let same_twice = HashEqualSpec {
            artifacts: vec![ArtifactSpec::digest("sha256", "aaaa"); 2],
            ..HashEqualSpec::default()
        };
        assert!(backend.hash_equal(&ctx(), &same_twice).unwrap().is_empty());
    }

    #[test]
    fn test_unresolved_artifact_id_falls_back_to_digest() {
        let (backend, a, b) = setup();
        backend
            .ingest_hash_equal(&ctx(), &a, &b, &HashEqualInputSpec::default())
            .unwrap();
        let spec = HashEqualSpec {
            artifacts: vec![ArtifactSpec {
                id: Some("ffffffffffffffff".to_string()),
                ..ArtifactSpec::digest("sha1", "bbbb")
            }],
            ..HashEqualSpec::default()
        };
        assert_eq!(backend.hash_equal(&ctx(), &spec).unwrap().len(), 1);
    }

    #[test]
    fn test_too_many_artifacts_rejected() {
        let (backend, _, _) = setup();
        let spec = HashEqualSpec {
            artifacts: vec![ArtifactSpec::default(); 3],
            ..HashEqualSpec::default()
        };
        assert!(backend.hash_equal(&ctx(), &spec).unwrap_err().is_validation());
    }
}
