//! Lookup of any node by identifier, and adjacency traversal.
//!
//! Tree edges (parent and children within a package, source or vulnerability
//! tree) are always followed. Edges to and from links are followed only when the
//! `(from, to)` pair is allowed; an empty allow-list allows every edge.

use super::artifact::ArtifactNode;
use super::certify_bad::CertifyBadNode;
use super::certify_legal::CertifyLegalNode;
use super::certify_vex::CertifyVexNode;
use super::certify_vuln::CertifyVulnNode;
use super::hash_equal::HashEqualNode;
use super::is_occurrence::IsOccurrenceNode;
use super::license::LicenseNode;
use super::link::{Backrefs, Linkable};
use super::package::{PkgNameNode, PkgNamespaceNode, PkgTypeNode, PkgVersionNode};
use super::query::Listable;
use super::source::{SourceNameNode, SourceNamespaceNode, SourceTypeNode};
use super::store::StoredNode;
use super::upsert::LinkRecord;
use super::vulnerability::{VulnIdNode, VulnTypeNode};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, OperationExt};
use crate::model::{Edge, Node, NodeKind};

/// Stored record kinds, one per collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stored {
    PkgType,
    PkgNamespace,
    PkgName,
    PkgVersion,
    SourceType,
    SourceNamespace,
    SourceName,
    VulnType,
    VulnId,
    Artifact,
    License,
    CertifyLegal,
    CertifyVuln,
    CertifyVex,
    CertifyBad,
    IsOccurrence,
    HashEqual,
}

const COLLECTIONS: [(&str, Stored); 17] = [
    (PkgTypeNode::COLLECTION, Stored::PkgType),
    (PkgNamespaceNode::COLLECTION, Stored::PkgNamespace),
    (PkgNameNode::COLLECTION, Stored::PkgName),
    (PkgVersionNode::COLLECTION, Stored::PkgVersion),
    (SourceTypeNode::COLLECTION, Stored::SourceType),
    (SourceNamespaceNode::COLLECTION, Stored::SourceNamespace),
    (SourceNameNode::COLLECTION, Stored::SourceName),
    (VulnTypeNode::COLLECTION, Stored::VulnType),
    (VulnIdNode::COLLECTION, Stored::VulnId),
    (ArtifactNode::COLLECTION, Stored::Artifact),
    (LicenseNode::COLLECTION, Stored::License),
    (CertifyLegalNode::COLLECTION, Stored::CertifyLegal),
    (CertifyVulnNode::COLLECTION, Stored::CertifyVuln),
    (CertifyVexNode::COLLECTION, Stored::CertifyVex),
    (CertifyBadNode::COLLECTION, Stored::CertifyBad),
    (IsOccurrenceNode::COLLECTION, Stored::IsOccurrence),
    (HashEqualNode::COLLECTION, Stored::HashEqual),
];

/// The nodes a link points at, tagged with their kinds. Unused slots are empty.
trait LinkEnds: LinkRecord {
    fn ends(&self) -> Vec<(NodeKind, &str)>;
}

fn non_empty<'a>(ends: impl IntoIterator<Item = (NodeKind, &'a str)>) -> Vec<(NodeKind, &'a str)> {
    ends.into_iter().filter(|(_, id)| !id.is_empty()).collect()
}

impl LinkEnds for CertifyLegalNode {
    fn ends(&self) -> Vec<(NodeKind, &str)> {
        let licenses = self
            .declared_licenses
            .iter()
            .chain(&self.discovered_licenses)
            .map(|id| (NodeKind::License, id.as_str()));
        non_empty(
            [
                (NodeKind::Package, self.pkg.as_str()),
                (NodeKind::Source, self.source.as_str()),
            ]
            .into_iter()
            .chain(licenses),
        )
    }
}

impl LinkEnds for CertifyVulnNode {
    fn ends(&self) -> Vec<(NodeKind, &str)> {
        non_empty([
            (NodeKind::Package, self.pkg.as_str()),
            (NodeKind::Vulnerability, self.vulnerability.as_str()),
        ])
    }
}

impl LinkEnds for CertifyVexNode {
    fn ends(&self) -> Vec<(NodeKind, &str)> {
        non_empty([
            (NodeKind::Package, self.pkg.as_str()),
            (NodeKind::Artifact, self.artifact.as_str()),
            (NodeKind::Vulnerability, self.vulnerability.as_str()),
        ])
    }
}

impl LinkEnds for CertifyBadNode {
    fn ends(&self) -> Vec<(NodeKind, &str)> {
        non_empty([
            (NodeKind::Package, self.pkg.as_str()),
            (NodeKind::Source, self.source.as_str()),
            (NodeKind::Artifact, self.artifact.as_str()),
        ])
    }
}

impl LinkEnds for IsOccurrenceNode {
    fn ends(&self) -> Vec<(NodeKind, &str)> {
        non_empty([
            (NodeKind::Package, self.pkg.as_str()),
            (NodeKind::Source, self.source.as_str()),
            (NodeKind::Artifact, self.artifact.as_str()),
        ])
    }
}

impl LinkEnds for HashEqualNode {
    fn ends(&self) -> Vec<(NodeKind, &str)> {
        non_empty(self.artifacts.iter().map(|id| (NodeKind::Artifact, id.as_str())))
    }
}

/// Collects neighbor IDs, applying the edge allow-list to link edges.
struct Adjacent<'e> {
    allowed: &'e [Edge],
    ids: Vec<String>,
}

impl<'e> Adjacent<'e> {
    fn new(allowed: &'e [Edge]) -> Self {
        Self {
            allowed,
            ids: Vec::new(),
        }
    }

    fn allows(&self, from: NodeKind, to: NodeKind) -> bool {
        self.allowed.is_empty() || self.allowed.contains(&Edge::new(from, to))
    }

    fn tree(&mut self, ids: impl IntoIterator<Item = String>) {
        self.ids.extend(ids);
    }

    fn backrefs(&mut self, from: NodeKind, backrefs: &Backrefs) {
        for (kind, id) in backrefs.iter() {
            if self.allows(from, kind.node_kind()) {
                self.ids.push(id.to_string());
            }
        }
    }

    fn ends(&mut self, from: NodeKind, ends: Vec<(NodeKind, &str)>) {
        for (to, id) in ends {
            if self.allows(from, to) {
                self.ids.push(id.to_string());
            }
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.ids.sort_unstable();
        self.ids.dedup();
        self.ids
    }
}

impl KvBackend {
    fn classify(&self, ctx: &Context, id: &str) -> GuacResult<Option<Stored>> {
        let Some(loc) = self.id_ref(ctx, id)? else {
            return Ok(None);
        };
        COLLECTIONS
            .iter()
            .find(|(collection, _)| *collection == loc.collection)
            .map(|(_, kind)| *kind)
            .ok_or_else(|| GuacError::internal(format!("id {id} indexes unknown collection {:?}", loc.collection)))
            .map(Some)
    }

    /// The node with `id`, rendered as its public model. Package, source and
    /// vulnerability nodes come back as a tree truncated at their level.
    ///
    /// Returns `None` for an unknown identifier.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn node(&self, ctx: &Context, id: &str) -> GuacResult<Option<Node>> {
        const OP: &str = "Node";
        let span = tracing::debug_span!("node", operation = OP, request_id = %ctx.request_id(), id);
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        self.load_node(ctx, id).in_operation(OP)
    }

    /// Every node in `ids`, in order.
    ///
    /// # Errors
    /// `NotFound` if any identifier is unknown; store failures.
    pub fn nodes(&self, ctx: &Context, ids: &[String]) -> GuacResult<Vec<Node>> {
        const OP: &str = "Nodes";
        let span = tracing::debug_span!("node", operation = OP, request_id = %ctx.request_id(), count = ids.len());
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        ids.iter()
            .map(|id| {
                self.load_node(ctx, id)?
                    .ok_or_else(|| GuacError::not_found(format!("node {id:?}")))
            })
            .collect::<GuacResult<Vec<_>>>()
            .in_operation(OP)
    }

    fn load_node(&self, ctx: &Context, id: &str) -> GuacResult<Option<Node>> {
        let Some(kind) = self.classify(ctx, id)? else {
            return Ok(None);
        };
        let lost = || GuacError::internal(format!("node {id} has a broken tree"));
        let node = match kind {
            Stored::PkgType | Stored::PkgNamespace | Stored::PkgName | Stored::PkgVersion => {
                Node::Package(self.build_package_response(ctx, id, None)?.ok_or_else(lost)?)
            }
            Stored::SourceType | Stored::SourceNamespace | Stored::SourceName => {
                Node::Source(self.build_source_response(ctx, id, None)?.ok_or_else(lost)?)
            }
            Stored::VulnType | Stored::VulnId => {
                Node::Vulnerability(self.build_vuln_response(ctx, id, None)?.ok_or_else(lost)?)
            }
            Stored::Artifact => Node::Artifact(self.by_id::<ArtifactNode>(ctx, id)?.to_artifact()),
            Stored::License => Node::License(self.by_id::<LicenseNode>(ctx, id)?.to_license()),
            Stored::CertifyLegal => Node::CertifyLegal(self.by_id::<CertifyLegalNode>(ctx, id)?.to_model(self, ctx)?),
            Stored::CertifyVuln => Node::CertifyVuln(self.by_id::<CertifyVulnNode>(ctx, id)?.to_model(self, ctx)?),
            Stored::CertifyVex => {
                Node::CertifyVexStatement(self.by_id::<CertifyVexNode>(ctx, id)?.to_model(self, ctx)?)
            }
            Stored::CertifyBad => Node::CertifyBad(self.by_id::<CertifyBadNode>(ctx, id)?.to_model(self, ctx)?),
            Stored::IsOccurrence => Node::IsOccurrence(self.by_id::<IsOccurrenceNode>(ctx, id)?.to_model(self, ctx)?),
            Stored::HashEqual => Node::HashEqual(self.by_id::<HashEqualNode>(ctx, id)?.to_model(self, ctx)?),
        };
        Ok(Some(node))
    }

    /// Identifiers adjacent to `id`, sorted and deduplicated.
    ///
    /// # Errors
    /// `NotFound` for an unknown identifier; store failures.
    pub fn neighbors(&self, ctx: &Context, id: &str, allowed: &[Edge]) -> GuacResult<Vec<String>> {
        const OP: &str = "Neighbors";
        let span = tracing::debug_span!(
            "neighbors",
            operation = OP,
            request_id = %ctx.request_id(),
            id,
            allowed = allowed.len()
        );
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        self.collect_neighbors(ctx, id, allowed).in_operation(OP)
    }

    fn collect_neighbors(&self, ctx: &Context, id: &str, allowed: &[Edge]) -> GuacResult<Vec<String>> {
        let Some(kind) = self.classify(ctx, id)? else {
            return Err(GuacError::not_found(format!("node {id:?}")));
        };
        let mut adj = Adjacent::new(allowed);
        match kind {
            Stored::PkgType => {
                let n: PkgTypeNode = self.by_id(ctx, id)?;
                adj.tree(n.namespaces);
            }
            Stored::PkgNamespace => {
                let n: PkgNamespaceNode = self.by_id(ctx, id)?;
                adj.tree([n.parent]);
                adj.tree(n.names);
            }
            Stored::PkgName => {
                let n: PkgNameNode = self.by_id(ctx, id)?;
                adj.backrefs(NodeKind::Package, n.backrefs());
                adj.tree([n.parent]);
                adj.tree(n.versions);
            }
            Stored::PkgVersion => {
                let n: PkgVersionNode = self.by_id(ctx, id)?;
                adj.backrefs(NodeKind::Package, n.backrefs());
                adj.tree([n.parent]);
            }
            Stored::SourceType => {
                let n: SourceTypeNode = self.by_id(ctx, id)?;
                adj.tree(n.namespaces);
            }
            Stored::SourceNamespace => {
                let n: SourceNamespaceNode = self.by_id(ctx, id)?;
                adj.tree([n.parent]);
                adj.tree(n.names);
            }
            Stored::SourceName => {
                let n: SourceNameNode = self.by_id(ctx, id)?;
                adj.backrefs(NodeKind::Source, n.backrefs());
                adj.tree([n.parent]);
            }
            Stored::VulnType => {
                let n: VulnTypeNode = self.by_id(ctx, id)?;
                adj.tree(n.vuln_ids);
            }
            Stored::VulnId => {
                let n: VulnIdNode = self.by_id(ctx, id)?;
                adj.backrefs(NodeKind::Vulnerability, n.backrefs());
                adj.tree([n.parent]);
            }
            Stored::Artifact => {
                let n: ArtifactNode = self.by_id(ctx, id)?;
                adj.backrefs(NodeKind::Artifact, n.backrefs());
            }
            Stored::License => {
                let n: LicenseNode = self.by_id(ctx, id)?;
                adj.backrefs(NodeKind::License, n.backrefs());
            }
            Stored::CertifyLegal => self.link_ends::<CertifyLegalNode>(ctx, id, &mut adj)?,
            Stored::CertifyVuln => self.link_ends::<CertifyVulnNode>(ctx, id, &mut adj)?,
            Stored::CertifyVex => self.link_ends::<CertifyVexNode>(ctx, id, &mut adj)?,
            Stored::CertifyBad => self.link_ends::<CertifyBadNode>(ctx, id, &mut adj)?,
            Stored::IsOccurrence => self.link_ends::<IsOccurrenceNode>(ctx, id, &mut adj)?,
            Stored::HashEqual => self.link_ends::<HashEqualNode>(ctx, id, &mut adj)?,
        }
        Ok(adj.finish())
    }

    fn link_ends<L: LinkEnds>(&self, ctx: &Context, id: &str, adj: &mut Adjacent<'_>) -> GuacResult<()> {
        let link: L = self.by_id(ctx, id)?;
        adj.ends(L::LINK_KIND.node_kind(), link.ends());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CertifyLegalInputSpec, IdOrLicenseInput, LicenseInputSpec, PackageOrSourceInput, PkgInputSpec,
    };
    use chrono::Utc;

    fn ctx() -> Context {
        Context::background()
    }

    struct Fixture {
        backend: KvBackend,
        version_id: String,
        name_id: String,
        license_id: String,
        legal_id: String,
    }

    fn fixture() -> Fixture {
        let backend = KvBackend::in_memory();
        let pkg = PkgInputSpec::new("npm", "", "left-pad").with_version("1.3.0");
        let ids = backend.ingest_package(&ctx(), &pkg).unwrap();
        let license: IdOrLicenseInput = LicenseInputSpec::listed("MIT", "3.21").into();
        let license_id = backend.ingest_license(&ctx(), &license).unwrap();
        let legal = CertifyLegalInputSpec {
            time_scanned: Utc::now(),
            ..CertifyLegalInputSpec::default()
        };
        let legal_id = backend
            .ingest_certify_legal(&ctx(), &PackageOrSourceInput::package(pkg), &[license], &[], &legal)
            .unwrap();
        Fixture {
            backend,
            version_id: ids.package_version_id,
            name_id: ids.package_name_id,
            license_id,
            legal_id,
        }
    }

    #[test]
    fn test_link_neighbors_are_its_ends() {
        let f = fixture();
        let got = f.backend.neighbors(&ctx(), &f.legal_id, &[]).unwrap();
        let mut want = vec![f.version_id.clone(), f.license_id.clone()];
        want.sort();
        assert_eq!(got, want);

        let only_license = [Edge::new(NodeKind::CertifyLegal, NodeKind::License)];
        let got = f.backend.neighbors(&ctx(), &f.legal_id, &only_license).unwrap();
        assert_eq!(got, vec![f.license_id.clone()]);
    }

    #[test]
    fn test_backref_edges_respect_allow_list() {
        let f = fixture();
        let allowed = [Edge::new(NodeKind::License, NodeKind::CertifyLegal)];
        let got = f.backend.neighbors(&ctx(), &f.license_id, &allowed).unwrap();
        assert_eq!(got, vec![f.legal_id.clone()]);

        let other = [Edge::new(NodeKind::License, NodeKind::CertifyVuln)];
        assert!(f.backend.neighbors(&ctx(), &f.license_id, &other).unwrap().is_empty());
    }

    #[test]
    fn test_tree_edges_always_followed() {
        let f = fixture();
        let other = [Edge::new(NodeKind::Package, NodeKind::HashEqual)];
        let got = f.backend.neighbors(&ctx(), &f.version_id, &other).unwrap();
        assert_eq!(got, vec![f.name_id.clone()]);
    }

    #[test]
    fn test_node_renders_each_kind() {
        let f = fixture();
        let Some(Node::Package(p)) = f.backend.node(&ctx(), &f.name_id).unwrap() else {
            panic!("expected a package");
        };
        assert_eq!(p.name_ids(), vec![f.name_id.as_str()]);
        assert!(p.version_ids().is_empty());

        let node = f.backend.node(&ctx(), &f.legal_id).unwrap().unwrap();
        assert_eq!(node.kind(), NodeKind::CertifyLegal);
        assert!(f.backend.node(&ctx(), "ffffffffffffffff").unwrap().is_none());
    }

    #[test]
    fn test_nodes_fails_on_unknown_id() {
        let f = fixture();
        let ok = f
            .backend
            .nodes(&ctx(), &[f.license_id.clone(), f.version_id.clone()])
            .unwrap();
        assert_eq!(ok.len(), 2);
        let err = f
            .backend
            .nodes(&ctx(), &[f.license_id.clone(), "ffffffffffffffff".to_string()])
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(f.backend.neighbors(&ctx(), "ffffffffffffffff", &[]).unwrap_err().is_not_found());
    }
}
