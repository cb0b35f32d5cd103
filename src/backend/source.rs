//! Source tree: type → namespace → name.
//!
//! Tag and commit live on the name node; an empty string stands for "unset" and
//! is reported as `None`.

use serde::{Deserialize, Serialize};

use super::key::KeyHasher;
use super::link::{Backrefs, Linkable};
use super::matching::no_match;
use super::store::{insert_child, StoredNode};
use super::upsert::Probe;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt, ValidationError};
use crate::model::{
    IdOrSourceInput, Source, SourceIds, SourceInputSpec, SourceName, SourceNamespace, SourceSpec,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SourceTypeNode {
    pub(crate) id: String,
    pub(crate) src_type: String,
    pub(crate) namespaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SourceNamespaceNode {
    pub(crate) id: String,
    pub(crate) parent: String,
    pub(crate) namespace: String,
    pub(crate) names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct SourceNameNode {
    pub(crate) id: String,
    pub(crate) parent: String,
    pub(crate) name: String,
    pub(crate) tag: String,
    pub(crate) commit: String,
    pub(crate) backrefs: Backrefs,
}

impl SourceTypeNode {
    fn new(src_type: &str) -> Self {
        Self {
            id: String::new(),
            src_type: src_type.to_string(),
            namespaces: Vec::new(),
        }
    }
}

impl SourceNamespaceNode {
    fn new(parent: &str, namespace: &str) -> Self {
        Self {
            id: String::new(),
            parent: parent.to_string(),
            namespace: namespace.to_string(),
            names: Vec::new(),
        }
    }
}

impl SourceNameNode {
    fn new(parent: &str, name: &str, tag: Option<&str>, commit: Option<&str>) -> Self {
        Self {
            id: String::new(),
            parent: parent.to_string(),
            name: name.to_string(),
            tag: tag.unwrap_or_default().to_string(),
            commit: commit.unwrap_or_default().to_string(),
            backrefs: Backrefs::default(),
        }
    }

    pub(crate) fn to_model(&self) -> SourceName {
        SourceName {
            id: self.id.clone(),
            name: self.name.clone(),
            tag: (!self.tag.is_empty()).then(|| self.tag.clone()),
            commit: (!self.commit.is_empty()).then(|| self.commit.clone()),
        }
    }

    fn matches(&self, filter: &SourceSpec) -> bool {
        !(no_match(filter.name.as_deref(), self.name.as_str())
            || no_match(filter.tag.as_deref(), self.tag.as_str())
            || no_match(filter.commit.as_deref(), self.commit.as_str()))
    }
}

impl StoredNode for SourceTypeNode {
    const COLLECTION: &'static str = "source_types";
    const KIND: &'static str = "source type";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("source_type")
            .field("type", &self.src_type)
            .finish()
    }
}

impl StoredNode for SourceNamespaceNode {
    const COLLECTION: &'static str = "source_namespaces";
    const KIND: &'static str = "source namespace";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("source_namespace")
            .field("parent", &self.parent)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl StoredNode for SourceNameNode {
    const COLLECTION: &'static str = "source_names";
    const KIND: &'static str = "source name";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("source_name")
            .field("parent", &self.parent)
            .field("name", &self.name)
            .field("tag", &self.tag)
            .field("commit", &self.commit)
            .finish()
    }
}

impl Linkable for SourceNameNode {
    fn backrefs(&self) -> &Backrefs {
        &self.backrefs
    }

    fn backrefs_mut(&mut self) -> &mut Backrefs {
        &mut self.backrefs
    }
}

impl KvBackend {
    /// Ingests a source, creating any missing level of its tree.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn ingest_source(&self, ctx: &Context, input: &SourceInputSpec) -> GuacResult<SourceIds> {
        let mut ids = self.ingest_sources(ctx, std::slice::from_ref(input))?;
        ids.pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation("IngestSource"))
    }

    /// Ingests several sources; IDs are returned in input order.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn ingest_sources(&self, ctx: &Context, inputs: &[SourceInputSpec]) -> GuacResult<Vec<SourceIds>> {
        self.two_phase(
            ctx,
            "IngestSources",
            inputs,
            |backend, ctx, input| {
                Ok(match backend.lookup_source(ctx, input)? {
                    Some(ids) => Probe::Hit(ids),
                    None => Probe::Miss(input.clone()),
                })
            },
            |backend, ctx, input| backend.create_source(ctx, &input),
        )
    }

    /// Sources matching `spec`, each trimmed to its matching branches.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn sources(&self, ctx: &Context, spec: &SourceSpec) -> GuacResult<Vec<Source>> {
        const OP: &str = "Sources";
        let span = tracing::debug_span!("query", operation = OP, request_id = %ctx.request_id());
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        self.match_sources(ctx, spec).in_operation(OP)
    }

    fn match_sources(&self, ctx: &Context, spec: &SourceSpec) -> GuacResult<Vec<Source>> {
        if let Some(id) = &spec.id {
            return match self.build_source_response(ctx, id, None) {
                Ok(s) => Ok(s.into_iter().collect()),
                Err(e) if e.is_not_found() || e.is_type_mismatch() => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }

        let name_level = spec.name.is_some() || spec.tag.is_some() || spec.commit.is_some();
        let namespace_level = name_level || spec.namespace.is_some();

        let mut out = Vec::new();
        for key in self.all_keys::<SourceTypeNode>(ctx)? {
            let ty: SourceTypeNode = self.by_key(ctx, &key)?;
            if no_match(spec.src_type.as_deref(), ty.src_type.as_str()) {
                continue;
            }
            let mut namespaces = Vec::new();
            for ns_id in &ty.namespaces {
                let ns: SourceNamespaceNode = self.by_id(ctx, ns_id)?;
                if no_match(spec.namespace.as_deref(), ns.namespace.as_str()) {
                    continue;
                }
                let mut names = Vec::new();
                for name_id in &ns.names {
                    let name: SourceNameNode = self.by_id(ctx, name_id)?;
                    if name.matches(spec) {
                        names.push(name.to_model());
                    }
                }
                if !names.is_empty() || !name_level {
                    namespaces.push(SourceNamespace {
                        id: ns.id,
                        namespace: ns.namespace,
                        names,
                    });
                }
            }
            if !namespaces.is_empty() || !namespace_level {
                out.push(Source {
                    id: ty.id,
                    src_type: ty.src_type,
                    namespaces,
                });
            }
        }
        Ok(out)
    }

    fn find_source_name(
        &self,
        ctx: &Context,
        src_type: &str,
        namespace: &str,
        name: &SourceNameNode,
    ) -> GuacResult<Option<SourceNameNode>> {
        let Some(ty) = self.find_by_key::<SourceTypeNode>(ctx, &SourceTypeNode::new(src_type).key())? else {
            return Ok(None);
        };
        let ns_key = SourceNamespaceNode::new(&ty.id, namespace).key();
        let Some(ns) = self.find_by_key::<SourceNamespaceNode>(ctx, &ns_key)? else {
            return Ok(None);
        };
        let mut probe = name.clone();
        probe.parent = ns.id;
        self.find_by_key(ctx, &probe.key())
    }

    fn lookup_source(&self, ctx: &Context, input: &SourceInputSpec) -> GuacResult<Option<SourceIds>> {
        let leaf = SourceNameNode::new("", &input.name, input.tag.as_deref(), input.commit.as_deref());
        let Some(name) = self.find_source_name(ctx, &input.src_type, &input.namespace, &leaf)? else {
            return Ok(None);
        };
        let ns: SourceNamespaceNode = self.by_id(ctx, &name.parent)?;
        Ok(Some(SourceIds {
            source_type_id: ns.parent,
            source_namespace_id: ns.id,
            source_name_id: name.id,
        }))
    }

    fn create_source(&self, ctx: &Context, input: &SourceInputSpec) -> GuacResult<SourceIds> {
        let (mut ty, _) = self.ensure(ctx, SourceTypeNode::new(&input.src_type))?;
        let (mut ns, _) = self.ensure(ctx, SourceNamespaceNode::new(&ty.id, &input.namespace))?;
        if insert_child(&mut ty.namespaces, &ns.id) {
            self.put(ctx, &ty)?;
        }
        let leaf = SourceNameNode::new(&ns.id, &input.name, input.tag.as_deref(), input.commit.as_deref());
        let (name, _) = self.ensure(ctx, leaf)?;
        if insert_child(&mut ns.names, &name.id) {
            self.put(ctx, &ns)?;
        }
        Ok(SourceIds {
            source_type_id: ty.id,
            source_namespace_id: ns.id,
            source_name_id: name.id,
        })
    }

    /// Resolves a source reference to an existing name node.
    pub(crate) fn resolve_source_name(&self, ctx: &Context, input: &IdOrSourceInput) -> GuacResult<SourceNameNode> {
        if let Some(id) = &input.source_name_id {
            return self.by_id(ctx, id);
        }
        let Some(spec) = &input.source_input else {
            return Err(ValidationError::MissingField {
                field: "sourceInput".to_string(),
            }
            .into());
        };
        let leaf = SourceNameNode::new("", &spec.name, spec.tag.as_deref(), spec.commit.as_deref());
        self.find_source_name(ctx, &spec.src_type, &spec.namespace, &leaf)?
            .ok_or_else(|| {
                GuacError::not_found(format!(
                    "source {}/{}/{}",
                    spec.src_type, spec.namespace, spec.name
                ))
            })
    }

    /// The single name node a filter pins down by ID or by its full coordinates.
    ///
    /// An unset tag or commit in a coordinate filter means "no tag" or "no
    /// commit", since those fields are part of the name's identity.
    pub(crate) fn exact_source(&self, ctx: &Context, filter: &SourceSpec) -> GuacResult<Option<SourceNameNode>> {
        if let Some(id) = &filter.id {
            return self.find_by_id(ctx, id);
        }
        match (&filter.src_type, &filter.namespace, &filter.name) {
            (Some(t), Some(ns), Some(n)) => {
                let leaf = SourceNameNode::new("", n, filter.tag.as_deref(), filter.commit.as_deref());
                self.find_source_name(ctx, t, ns, &leaf)
            }
            _ => Ok(None),
        }
    }

    /// Builds the source tree above `id`, which may name any level.
    ///
    /// Returns `None` when `filter` rejects any level on the path.
    pub(crate) fn build_source_response(
        &self,
        ctx: &Context,
        id: &str,
        filter: Option<&SourceSpec>,
    ) -> GuacResult<Option<Source>> {
        if filter.is_some_and(|f| no_match(f.id.as_deref(), id)) {
            return Ok(None);
        }
        let Some(loc) = self.id_ref(ctx, id)? else {
            return Err(GuacError::not_found(format!("source node {id:?}")));
        };
        let depth = [
            SourceTypeNode::COLLECTION,
            SourceNamespaceNode::COLLECTION,
            SourceNameNode::COLLECTION,
        ]
        .iter()
        .position(|c| *c == loc.collection)
        .ok_or_else(|| GuacError::TypeMismatch {
            id: id.to_string(),
            expected: "source",
        })?;

        let mut current = id.to_string();
        let mut names = Vec::new();
        if depth >= 2 {
            let n: SourceNameNode = self.by_id(ctx, &current)?;
            if filter.is_some_and(|f| !n.matches(f)) {
                return Ok(None);
            }
            names.push(n.to_model());
            current = n.parent;
        }
        let mut namespaces = Vec::new();
        if depth >= 1 {
            let ns: SourceNamespaceNode = self.by_id(ctx, &current)?;
            if filter.is_some_and(|f| no_match(f.namespace.as_deref(), ns.namespace.as_str())) {
                return Ok(None);
            }
            namespaces.push(SourceNamespace {
                id: ns.id,
                namespace: ns.namespace,
                names,
            });
            current = ns.parent;
        }
        let ty: SourceTypeNode = self.by_id(ctx, &current)?;
        if filter.is_some_and(|f| no_match(f.src_type.as_deref(), ty.src_type.as_str())) {
            return Ok(None);
        }
        Ok(Some(Source {
            id: ty.id,
            src_type: ty.src_type,
            namespaces,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::background()
    }

    fn repo() -> SourceInputSpec {
        SourceInputSpec::new("git", "github.com/guacsec", "guac")
    }

    #[test]
    fn test_tag_and_commit_distinguish_names() {
        let backend = KvBackend::in_memory();
        let plain = backend.ingest_source(&ctx(), &repo()).unwrap();
        let tagged = backend
            .ingest_source(&ctx(), &repo().with_tag("v0.1.0"))
            .unwrap();
        assert_eq!(plain.source_namespace_id, tagged.source_namespace_id);
        assert_ne!(plain.source_name_id, tagged.source_name_id);
        assert_eq!(backend.ingest_source(&ctx(), &repo()).unwrap(), plain);
    }

    #[test]
    fn test_unset_tag_reported_as_none() {
        let backend = KvBackend::in_memory();
        backend.ingest_source(&ctx(), &repo()).unwrap();
        let found = backend
            .sources(&ctx(), &SourceSpec::name("git", "github.com/guacsec", "guac"))
            .unwrap();
        let name = &found[0].namespaces[0].names[0];
        assert_eq!(name.tag, None);
        assert_eq!(name.commit, None);
    }

    #[test]
    fn test_exact_source_requires_full_coordinates() {
        let backend = KvBackend::in_memory();
        let ids = backend.ingest_source(&ctx(), &repo()).unwrap();

        let exact = backend
            .exact_source(&ctx(), &SourceSpec::name("git", "github.com/guacsec", "guac"))
            .unwrap()
            .unwrap();
        assert_eq!(exact.id, ids.source_name_id);

        let partial = SourceSpec {
            name: Some("guac".to_string()),
            ..SourceSpec::default()
        };
        assert!(backend.exact_source(&ctx(), &partial).unwrap().is_none());
    }

    #[test]
    fn test_sources_by_namespace_id() {
        let backend = KvBackend::in_memory();
        let ids = backend.ingest_source(&ctx(), &repo()).unwrap();
        let spec = SourceSpec {
            id: Some(ids.source_namespace_id.clone()),
            ..SourceSpec::default()
        };
        let found = backend.sources(&ctx(), &spec).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].namespaces[0].id, ids.source_namespace_id);
        assert!(found[0].namespaces[0].names.is_empty());
    }
}
