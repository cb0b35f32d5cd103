//! Artifacts: content digests, stored lowercase.

use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{Backrefs, Linkable};
use super::matching::no_match_lower;
use super::query::Listable;
use super::store::StoredNode;
use super::upsert::Probe;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt, ValidationError};
use crate::model::{Artifact, ArtifactInputSpec, ArtifactSpec, Connection, IdOrArtifactInput};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct ArtifactNode {
    pub(crate) id: String,
    pub(crate) algorithm: String,
    pub(crate) digest: String,
    pub(crate) backrefs: Backrefs,
}

impl ArtifactNode {
    fn new(input: &ArtifactInputSpec) -> Self {
        Self {
            id: String::new(),
            algorithm: input.algorithm.to_lowercase(),
            digest: input.digest.to_lowercase(),
            backrefs: Backrefs::default(),
        }
    }

    pub(crate) fn to_artifact(&self) -> Artifact {
        Artifact {
            id: self.id.clone(),
            algorithm: self.algorithm.clone(),
            digest: self.digest.clone(),
        }
    }

    /// Field match only; the caller handles `filter.id`.
    pub(crate) fn matches_spec(&self, filter: &ArtifactSpec) -> bool {
        !(no_match_lower(filter.algorithm.as_deref(), &self.algorithm)
            || no_match_lower(filter.digest.as_deref(), &self.digest))
    }
}

impl StoredNode for ArtifactNode {
    const COLLECTION: &'static str = "artifacts";
    const KIND: &'static str = "artifact";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("artifact")
            .field("algorithm", &self.algorithm)
            .field("digest", &self.digest)
            .finish()
    }
}

impl Linkable for ArtifactNode {
    fn backrefs(&self) -> &Backrefs {
        &self.backrefs
    }

    fn backrefs_mut(&mut self) -> &mut Backrefs {
        &mut self.backrefs
    }
}

impl Listable for ArtifactNode {
    type Spec = ArtifactSpec;
    type Output = Artifact;

    fn spec_id(spec: &ArtifactSpec) -> Option<&str> {
        spec.id.as_deref()
    }

    fn candidates(_: &KvBackend, _: &Context, _: &ArtifactSpec) -> GuacResult<Option<Vec<String>>> {
        Ok(None)
    }

    fn matches(&self, _: &KvBackend, _: &Context, spec: &ArtifactSpec) -> GuacResult<bool> {
        Ok(self.matches_spec(spec))
    }

    fn to_model(&self, _: &KvBackend, _: &Context) -> GuacResult<Artifact> {
        Ok(self.to_artifact())
    }
}

impl KvBackend {
    /// Ingests an artifact and returns its ID.
    ///
    /// # Errors
    /// `MissingField` when no artifact coordinates are given; store failures.
    pub fn ingest_artifact(&self, ctx: &Context, input: &IdOrArtifactInput) -> GuacResult<String> {
        let mut ids = self.ingest_artifacts(ctx, std::slice::from_ref(input))?;
        ids.pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation("IngestArtifact"))
    }

    /// Ingests several artifacts; IDs are returned in input order.
    ///
    /// # Errors
    /// `MissingField` when an input has no artifact coordinates; store failures.
    pub fn ingest_artifacts(&self, ctx: &Context, inputs: &[IdOrArtifactInput]) -> GuacResult<Vec<String>> {
        self.two_phase(
            ctx,
            "IngestArtifacts",
            inputs,
            |backend, ctx, input| {
                let Some(spec) = &input.artifact_input else {
                    return Err(ValidationError::MissingField {
                        field: "artifactInput".to_string(),
                    }
                    .into());
                };
                let node = ArtifactNode::new(spec);
                Ok(match backend.find_by_key::<ArtifactNode>(ctx, &node.key())? {
                    Some(existing) => Probe::Hit(existing.id),
                    None => Probe::Miss(node),
                })
            },
            |backend, ctx, node| Ok(backend.ensure(ctx, node)?.0.id),
        )
    }

    /// Artifacts matching `spec`.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn artifacts(&self, ctx: &Context, spec: &ArtifactSpec) -> GuacResult<Vec<Artifact>> {
        self.query_nodes::<ArtifactNode>(ctx, "Artifacts", spec)
    }

    /// One page of artifacts matching `spec`.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn artifacts_list(
        &self,
        ctx: &Context,
        spec: &ArtifactSpec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<Artifact>> {
        self.list_nodes::<ArtifactNode>(ctx, "ArtifactsList", spec, after, first)
    }

    /// Resolves an artifact reference to an existing node.
    pub(crate) fn resolve_artifact(&self, ctx: &Context, input: &IdOrArtifactInput) -> GuacResult<ArtifactNode> {
        if let Some(id) = &input.artifact_id {
            return self.by_id(ctx, id);
        }
        let Some(spec) = &input.artifact_input else {
            return Err(ValidationError::MissingField {
                field: "artifactInput".to_string(),
            }
            .into());
        };
        self.find_by_key(ctx, &ArtifactNode::new(spec).key())?
            .ok_or_else(|| GuacError::not_found(format!("artifact {}:{}", spec.algorithm, spec.digest)))
    }

    /// The single artifact a filter pins down by ID or by algorithm and digest.
    pub(crate) fn exact_artifact(&self, ctx: &Context, filter: &ArtifactSpec) -> GuacResult<Option<ArtifactNode>> {
        if let Some(id) = &filter.id {
            return self.find_by_id(ctx, id);
        }
        match (&filter.algorithm, &filter.digest) {
            (Some(algorithm), Some(digest)) => {
                let probe = ArtifactNode::new(&ArtifactInputSpec::new(algorithm, digest));
                self.find_by_key(ctx, &probe.key())
            }
            _ => Ok(None),
        }
    }

    /// Whether the artifact `id` satisfies `filter`, including `filter.id`.
    pub(crate) fn artifact_matches(&self, ctx: &Context, id: &str, filter: &ArtifactSpec) -> GuacResult<bool> {
        if filter.id.as_deref().is_some_and(|f| f != id) {
            return Ok(false);
        }
        self.artifact_fields_match(ctx, id, filter)
    }

    /// Whether the artifact `id` has the algorithm and digest `filter` asks
    /// for; `filter.id` is not compared.
    pub(crate) fn artifact_fields_match(&self, ctx: &Context, id: &str, filter: &ArtifactSpec) -> GuacResult<bool> {
        let node: ArtifactNode = self.by_id(ctx, id)?;
        Ok(node.matches_spec(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::background()
    }

    #[test]
    fn test_digest_case_folds_to_one_node() {
        let backend = KvBackend::in_memory();
        let a = backend
            .ingest_artifact(&ctx(), &ArtifactInputSpec::new("SHA256", "ABCdef").into())
            .unwrap();
        let b = backend
            .ingest_artifact(&ctx(), &ArtifactInputSpec::new("sha256", "abcdef").into())
            .unwrap();
        assert_eq!(a, b);

        let found = backend
            .artifacts(&ctx(), &ArtifactSpec::digest("Sha256", "ABCDEF"))
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].digest, "abcdef");
    }

    #[test]
    fn test_ingest_without_coordinates_fails() {
        let backend = KvBackend::in_memory();
        let err = backend
            .ingest_artifact(&ctx(), &IdOrArtifactInput::default())
            .unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_batch_returns_ids_in_input_order() {
        let backend = KvBackend::in_memory();
        let inputs: Vec<IdOrArtifactInput> = ["c", "a", "b", "a"]
            .iter()
            .map(|d| ArtifactInputSpec::new("sha1", *d).into())
            .collect();
        let ids = backend.ingest_artifacts(&ctx(), &inputs).unwrap();
        assert_eq!(ids.len(), 4);
        assert_eq!(ids[1], ids[3]);
        assert!(ids[0] < ids[1]);
    }

    #[test]
    fn test_artifacts_list_pages() {
        let backend = KvBackend::in_memory();
        for d in ["1", "2", "3"] {
            backend
                .ingest_artifact(&ctx(), &ArtifactInputSpec::new("sha1", d).into())
                .unwrap();
        }
        let page = backend
            .artifacts_list(&ctx(), &ArtifactSpec::default(), None, Some(2))
            .unwrap();
        assert_eq!(page.edges.len(), 2);
        assert!(page.page_info.has_next_page);
        assert_eq!(page.total_count, 3);
    }
}
