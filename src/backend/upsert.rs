//! Two-phase content-keyed upsert.
//!
//! Phase one runs under the shared guard: it resolves every reference of every
//! input and probes each content key. If every input hits, the call returns
//! without ever taking the exclusive guard. Otherwise phase two takes the
//! exclusive guard once for the whole batch and re-checks each miss before
//! creating it, so concurrent writers racing on one key create one record.
//!
//! Reference resolution finishes for the whole batch before phase two starts,
//! so an unresolvable reference anywhere in a batch fails it with no writes.

use super::link::{LinkKind, LinkTarget};
use super::store::StoredNode;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacResult, OperationExt};

/// Outcome of a phase-one probe.
pub(crate) enum Probe<H, M> {
    /// Already stored; nothing to write.
    Hit(H),
    /// Needs the writer; carries everything phase two requires.
    Miss(M),
}

/// A link record kind.
pub(crate) trait LinkRecord: StoredNode + Clone + PartialEq {
    const LINK_KIND: LinkKind;
}

/// A link record with resolved references, not yet assigned an identifier.
pub(crate) struct Prepared<L> {
    pub(crate) record: L,
    pub(crate) targets: Vec<LinkTarget>,
}

impl KvBackend {
    /// Runs `probe` over every input under the shared guard, then `create` over
    /// the misses under the exclusive guard. Results keep input order.
    pub(crate) fn two_phase<I, O, M>(
        &self,
        ctx: &Context,
        operation: &'static str,
        inputs: &[I],
        probe: impl Fn(&Self, &Context, &I) -> GuacResult<Probe<O, M>>,
        create: impl Fn(&Self, &Context, M) -> GuacResult<O>,
    ) -> GuacResult<Vec<O>> {
        let span = tracing::debug_span!(
            "ingest",
            operation,
            request_id = %ctx.request_id(),
            count = inputs.len()
        );
        let _enter = span.enter();

        let probes = {
            let _guard = self.read_guard(operation).in_operation(operation)?;
            inputs
                .iter()
                .map(|input| probe(self, ctx, input))
                .collect::<GuacResult<Vec<_>>>()
                .in_operation(operation)?
        };

        if probes.iter().all(|p| matches!(p, Probe::Hit(_))) {
            return Ok(probes
                .into_iter()
                .filter_map(|p| match p {
                    Probe::Hit(out) => Some(out),
                    Probe::Miss(_) => None,
                })
                .collect());
        }

        let _guard = self.write_guard(operation).in_operation(operation)?;
        probes
            .into_iter()
            .map(|p| match p {
                Probe::Hit(out) => Ok(out),
                Probe::Miss(pending) => create(self, ctx, pending),
            })
            .collect::<GuacResult<Vec<_>>>()
            .in_operation(operation)
    }

    /// Ingests link records, returning their identifiers in input order.
    pub(crate) fn upsert_links<I, L: LinkRecord>(
        &self,
        ctx: &Context,
        operation: &'static str,
        inputs: &[I],
        prepare: impl Fn(&Self, &Context, &I) -> GuacResult<Prepared<L>>,
    ) -> GuacResult<Vec<String>> {
        self.two_phase(
            ctx,
            operation,
            inputs,
            |backend, ctx, input| {
                let prepared = prepare(backend, ctx, input)?;
                backend.probe_link(ctx, prepared)
            },
            Self::commit_link,
        )
    }

    /// A hit requires the stored record to be identical, including the fields
    /// the content key leaves out; otherwise the writer refreshes it.
    fn probe_link<L: LinkRecord>(
        &self,
        ctx: &Context,
        prepared: Prepared<L>,
    ) -> GuacResult<Probe<String, Prepared<L>>> {
        match self.find_by_key::<L>(ctx, &prepared.record.key())? {
            Some(existing) if same_content(&existing, &prepared.record) => {
                Ok(Probe::Hit(existing.id().to_string()))
            }
            _ => Ok(Probe::Miss(prepared)),
        }
    }

    fn commit_link<L: LinkRecord>(&self, ctx: &Context, prepared: Prepared<L>) -> GuacResult<String> {
        let Prepared { mut record, targets } = prepared;
        if let Some(existing) = self.find_by_key::<L>(ctx, &record.key())? {
            let id = existing.id().to_string();
            if !same_content(&existing, &record) {
                record.set_id(id.clone());
                self.put(ctx, &record)?;
                tracing::debug!(kind = L::KIND, %id, "refreshed link");
            }
            return Ok(id);
        }

        let created = self.create(ctx, record)?;
        self.link(ctx, L::LINK_KIND, created.id(), &targets)?;
        Ok(created.id().to_string())
    }
}

fn same_content<L: LinkRecord>(stored: &L, fresh: &L) -> bool {
    let mut fresh = fresh.clone();
    fresh.set_id(stored.id().to_string());
    *stored == fresh
}
