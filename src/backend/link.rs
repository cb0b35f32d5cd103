//! Back-reference linking.
//!
//! Every node a link can point at carries [`Backrefs`]: per link kind, the
//! identifiers of every link that references it. Candidate-narrowed queries and
//! neighbor traversal read these lists instead of scanning link collections.
//! Lists are append-only.

use serde::{Deserialize, Serialize};

use super::artifact::ArtifactNode;
use super::license::LicenseNode;
use super::package::{PkgNameNode, PkgVersionNode};
use super::source::SourceNameNode;
use super::store::StoredNode;
use super::vulnerability::VulnIdNode;
use super::KvBackend;
use crate::context::Context;
use crate::error::GuacResult;
use crate::model::NodeKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum LinkKind {
    CertifyLegal,
    CertifyVuln,
    CertifyVex,
    CertifyBad,
    IsOccurrence,
    HashEqual,
}

impl LinkKind {
    pub(crate) const ALL: [Self; 6] = [
        Self::CertifyLegal,
        Self::CertifyVuln,
        Self::CertifyVex,
        Self::CertifyBad,
        Self::IsOccurrence,
        Self::HashEqual,
    ];

    pub(crate) const fn node_kind(self) -> NodeKind {
        match self {
            Self::CertifyLegal => NodeKind::CertifyLegal,
            Self::CertifyVuln => NodeKind::CertifyVuln,
            Self::CertifyVex => NodeKind::CertifyVex,
            Self::CertifyBad => NodeKind::CertifyBad,
            Self::IsOccurrence => NodeKind::IsOccurrence,
            Self::HashEqual => NodeKind::HashEqual,
        }
    }
}

/// Identifiers of the links referencing a node, grouped by link kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct Backrefs {
    certify_legal: Vec<String>,
    certify_vuln: Vec<String>,
    certify_vex: Vec<String>,
    certify_bad: Vec<String>,
    is_occurrence: Vec<String>,
    hash_equal: Vec<String>,
}

impl Backrefs {
    pub(crate) fn get(&self, kind: LinkKind) -> &[String] {
        match kind {
            LinkKind::CertifyLegal => &self.certify_legal,
            LinkKind::CertifyVuln => &self.certify_vuln,
            LinkKind::CertifyVex => &self.certify_vex,
            LinkKind::CertifyBad => &self.certify_bad,
            LinkKind::IsOccurrence => &self.is_occurrence,
            LinkKind::HashEqual => &self.hash_equal,
        }
    }

    fn get_mut(&mut self, kind: LinkKind) -> &mut Vec<String> {
        match kind {
            LinkKind::CertifyLegal => &mut self.certify_legal,
            LinkKind::CertifyVuln => &mut self.certify_vuln,
            LinkKind::CertifyVex => &mut self.certify_vex,
            LinkKind::CertifyBad => &mut self.certify_bad,
            LinkKind::IsOccurrence => &mut self.is_occurrence,
            LinkKind::HashEqual => &mut self.hash_equal,
        }
    }

    /// Appends `id` unless it is already recorded. Returns whether it was added.
    pub(crate) fn push(&mut self, kind: LinkKind, id: &str) -> bool {
        let list = self.get_mut(kind);
        if list.iter().any(|x| x == id) {
            return false;
        }
        list.push(id.to_string());
        true
    }

    /// Every `(kind, link id)` pair.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (LinkKind, &str)> + '_ {
        LinkKind::ALL
            .into_iter()
            .flat_map(move |kind| self.get(kind).iter().map(move |id| (kind, id.as_str())))
    }
}

/// A node that links can reference.
pub(crate) trait Linkable: StoredNode {
    fn backrefs(&self) -> &Backrefs;
    fn backrefs_mut(&mut self) -> &mut Backrefs;
}

/// A resolved object of a link, tagged with the kind of node it names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LinkTarget {
    PkgVersion(String),
    PkgName(String),
    SourceName(String),
    Artifact(String),
    License(String),
    Vulnerability(String),
}

impl LinkTarget {
    pub(crate) fn id(&self) -> &str {
        match self {
            Self::PkgVersion(id)
            | Self::PkgName(id)
            | Self::SourceName(id)
            | Self::Artifact(id)
            | Self::License(id)
            | Self::Vulnerability(id) => id,
        }
    }

    pub(crate) const fn node_kind(&self) -> NodeKind {
        match self {
            Self::PkgVersion(_) | Self::PkgName(_) => NodeKind::Package,
            Self::SourceName(_) => NodeKind::Source,
            Self::Artifact(_) => NodeKind::Artifact,
            Self::License(_) => NodeKind::License,
            Self::Vulnerability(_) => NodeKind::Vulnerability,
        }
    }
}

impl KvBackend {
    /// Records `link_id` on every target's back-reference list.
    ///
    /// Not atomic across targets: a store failure part-way leaves the earlier
    /// targets linked.
    pub(crate) fn link(
        &self,
        ctx: &Context,
        kind: LinkKind,
        link_id: &str,
        targets: &[LinkTarget],
    ) -> GuacResult<()> {
        for target in targets {
            match target {
                LinkTarget::PkgVersion(id) => self.append_backref::<PkgVersionNode>(ctx, id, kind, link_id)?,
                LinkTarget::PkgName(id) => self.append_backref::<PkgNameNode>(ctx, id, kind, link_id)?,
                LinkTarget::SourceName(id) => self.append_backref::<SourceNameNode>(ctx, id, kind, link_id)?,
                LinkTarget::Artifact(id) => self.append_backref::<ArtifactNode>(ctx, id, kind, link_id)?,
                LinkTarget::License(id) => self.append_backref::<LicenseNode>(ctx, id, kind, link_id)?,
                LinkTarget::Vulnerability(id) => self.append_backref::<VulnIdNode>(ctx, id, kind, link_id)?,
            }
        }
        Ok(())
    }

    fn append_backref<T: Linkable>(
        &self,
        ctx: &Context,
        id: &str,
        kind: LinkKind,
        link_id: &str,
    ) -> GuacResult<()> {
        let mut node: T = self.by_id(ctx, id)?;
        if node.backrefs_mut().push(kind, link_id) {
            self.put(ctx, &node)?;
            tracing::trace!(target_id = id, link_id, ?kind, "appended back-reference");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_skips_duplicates() {
        let mut refs = Backrefs::default();
        assert!(refs.push(LinkKind::CertifyLegal, "a"));
        assert!(!refs.push(LinkKind::CertifyLegal, "a"));
        assert!(refs.push(LinkKind::CertifyVuln, "a"));
        assert_eq!(refs.get(LinkKind::CertifyLegal), ["a".to_string()]);
    }

    #[test]
    fn test_iter_covers_every_kind() {
        let mut refs = Backrefs::default();
        refs.push(LinkKind::HashEqual, "h");
        refs.push(LinkKind::CertifyBad, "b");
        let pairs: Vec<_> = refs.iter().collect();
        assert_eq!(pairs, vec![(LinkKind::CertifyBad, "b"), (LinkKind::HashEqual, "h")]);
    }

    #[test]
    fn test_backrefs_serde_defaults_missing_lists() {
        let refs: Backrefs = serde_json::from_str(r#"{"certify_legal":["x"]}"#).unwrap();
        assert_eq!(refs.get(LinkKind::CertifyLegal), ["x".to_string()]);
        assert!(refs.get(LinkKind::HashEqual).is_empty());
    }
}
