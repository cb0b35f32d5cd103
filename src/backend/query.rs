//! Filtered listing shared by every queryable record kind.
//!
//! A query takes one of three paths:
//!
//! 1. The filter names an identifier: that record alone is returned, whatever
//!    the other filter fields say. An unknown identifier, or one naming another
//!    kind of record, yields an empty result.
//! 2. The filter resolves to existing referenced nodes: their back-references
//!    are the candidates.
//! 3. Otherwise every key of the collection is scanned.

use super::link::{LinkKind, Linkable};
use super::paginate::{paginate_candidates, paginate_scan};
use super::store::StoredNode;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacResult, OperationExt};
use crate::model::Connection;

pub(crate) trait Listable: StoredNode {
    type Spec;
    type Output;

    fn spec_id(spec: &Self::Spec) -> Option<&str>;

    /// Candidate identifiers from back-references, or `None` to scan.
    fn candidates(
        backend: &KvBackend,
        ctx: &Context,
        spec: &Self::Spec,
    ) -> GuacResult<Option<Vec<String>>>;

    fn matches(&self, backend: &KvBackend, ctx: &Context, spec: &Self::Spec) -> GuacResult<bool>;

    fn to_model(&self, backend: &KvBackend, ctx: &Context) -> GuacResult<Self::Output>;
}

impl KvBackend {
    /// Unpaginated query under the shared guard.
    pub(crate) fn query_nodes<L: Listable>(
        &self,
        ctx: &Context,
        operation: &'static str,
        spec: &L::Spec,
    ) -> GuacResult<Vec<L::Output>> {
        let span = tracing::debug_span!("query", operation, request_id = %ctx.request_id());
        let _enter = span.enter();
        let _guard = self.read_guard(operation).in_operation(operation)?;
        self.collect_matches::<L>(ctx, spec).in_operation(operation)
    }

    /// Paginated query under the shared guard.
    pub(crate) fn list_nodes<L: Listable>(
        &self,
        ctx: &Context,
        operation: &'static str,
        spec: &L::Spec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<L::Output>> {
        let span = tracing::debug_span!(
            "list",
            operation,
            request_id = %ctx.request_id(),
            after,
            first
        );
        let _enter = span.enter();
        let _guard = self.read_guard(operation).in_operation(operation)?;
        self.page_matches::<L>(ctx, spec, after, first)
            .in_operation(operation)
    }

    fn collect_matches<L: Listable>(&self, ctx: &Context, spec: &L::Spec) -> GuacResult<Vec<L::Output>> {
        if let Some(id) = L::spec_id(spec) {
            return match self.find_by_id::<L>(ctx, id)? {
                Some(node) => Ok(vec![node.to_model(self, ctx)?]),
                None => Ok(Vec::new()),
            };
        }

        let mut out = Vec::new();
        if let Some(mut ids) = L::candidates(self, ctx, spec)? {
            ids.sort_unstable();
            ids.dedup();
            for id in ids {
                let node: L = self.by_id(ctx, &id)?;
                if node.matches(self, ctx, spec)? {
                    out.push(node.to_model(self, ctx)?);
                }
            }
        } else {
            for key in self.all_keys::<L>(ctx)? {
                let node: L = self.by_key(ctx, &key)?;
                if node.matches(self, ctx, spec)? {
                    out.push(node.to_model(self, ctx)?);
                }
            }
        }
        Ok(out)
    }

    fn page_matches<L: Listable>(
        &self,
        ctx: &Context,
        spec: &L::Spec,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<L::Output>> {
        if let Some(id) = L::spec_id(spec) {
            return match self.find_by_id::<L>(ctx, id)? {
                Some(node) => Ok(Connection::single(
                    node.id().to_string(),
                    node.to_model(self, ctx)?,
                )),
                None => Ok(Connection::empty()),
            };
        }

        if let Some(ids) = L::candidates(self, ctx, spec)? {
            tracing::trace!(candidates = ids.len(), "candidate-narrowed listing");
            return paginate_candidates(ids, after, first, |id| {
                let node: L = self.by_id(ctx, id)?;
                if node.matches(self, ctx, spec)? {
                    Ok(Some(node.to_model(self, ctx)?))
                } else {
                    Ok(None)
                }
            });
        }

        let keys = self.all_keys::<L>(ctx)?;
        tracing::trace!(keys = keys.len(), "full-scan listing");
        paginate_scan(&keys, after, first, |key| {
            let node: L = self.by_key(ctx, key)?;
            if node.matches(self, ctx, spec)? {
                Ok(Some((node.id().to_string(), node.to_model(self, ctx)?)))
            } else {
                Ok(None)
            }
        })
    }
}

/// Appends the back-references of `kind` from every node in `nodes`.
pub(crate) fn backrefs_of<'a, N>(
    nodes: impl IntoIterator<Item = &'a N>,
    kind: LinkKind,
) -> Vec<String>
where
    N: Linkable + 'a,
{
    nodes
        .into_iter()
        .flat_map(|n| n.backrefs().get(kind).iter().cloned())
        .collect()
}
