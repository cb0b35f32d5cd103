//! Text search over the software graph and scan scheduling queries.
//!
//! Search walks each subject tree top-down. Once a level's own field contains
//! the search text, every descendant below it is included without being tested.

use chrono::{DateTime, Utc};

use super::artifact::ArtifactNode;
use super::certify_legal::CertifyLegalNode;
use super::certify_vuln::CertifyVulnNode;
use super::link::{LinkKind, Linkable};
use super::package::{PkgNameNode, PkgNamespaceNode, PkgTypeNode, PkgVersionNode};
use super::paginate::PageBuilder;
use super::source::{SourceNameNode, SourceNamespaceNode, SourceTypeNode};
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacResult, OperationExt};
use crate::model::{
    Connection, Package, PackageName, PackageNamespace, PackageSourceOrArtifact, QueryType,
    Source, SourceNamespace,
};
use crate::validation;

fn result_id(item: &PackageSourceOrArtifact) -> &str {
    match item {
        PackageSourceOrArtifact::Package(p) => &p.id,
        PackageSourceOrArtifact::Source(s) => &s.id,
        PackageSourceOrArtifact::Artifact(a) => &a.id,
    }
}

impl KvBackend {
    /// Artifacts whose digest contains `text`, then packages and sources whose
    /// tree contains it at any level.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn find_software(&self, ctx: &Context, text: &str) -> GuacResult<Vec<PackageSourceOrArtifact>> {
        const OP: &str = "FindSoftware";
        let span = tracing::debug_span!("search", operation = OP, request_id = %ctx.request_id());
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        self.search_all(ctx, text).in_operation(OP)
    }

    /// One page of [`Self::find_software`] results.
    ///
    /// The cursor is the identifier of a top-level result. An unknown cursor
    /// yields an empty connection; `total_count` counts the results after it.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn find_software_list(
        &self,
        ctx: &Context,
        text: &str,
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<PackageSourceOrArtifact>> {
        const OP: &str = "FindSoftwareList";
        let span = tracing::debug_span!(
            "search",
            operation = OP,
            request_id = %ctx.request_id(),
            after,
            first
        );
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        let results = self.search_all(ctx, text).in_operation(OP)?;

        let start = match after {
            None => 0,
            Some(cursor) => match results.iter().position(|r| result_id(r) == cursor) {
                Some(i) => i + 1,
                None => return Ok(Connection::empty()),
            },
        };
        let total = results.len() - start;
        let mut page = PageBuilder::new(first);
        for item in results.into_iter().skip(start) {
            page.push(result_id(&item).to_string(), item);
            if page.has_next_page() {
                break;
            }
        }
        Ok(page.finish(total))
    }

    fn search_all(&self, ctx: &Context, text: &str) -> GuacResult<Vec<PackageSourceOrArtifact>> {
        let mut out = Vec::new();
        for key in self.all_keys::<ArtifactNode>(ctx)? {
            let art: ArtifactNode = self.by_key(ctx, &key)?;
            if art.digest.contains(text) {
                out.push(PackageSourceOrArtifact::Artifact(art.to_artifact()));
            }
        }
        out.extend(
            self.search_packages(ctx, text)?
                .into_iter()
                .map(PackageSourceOrArtifact::Package),
        );
        out.extend(
            self.search_sources(ctx, text)?
                .into_iter()
                .map(PackageSourceOrArtifact::Source),
        );
        tracing::debug!(results = out.len(), "text search finished");
        Ok(out)
    }

    fn search_packages(&self, ctx: &Context, text: &str) -> GuacResult<Vec<Package>> {
        let mut out = Vec::new();
        for key in self.all_keys::<PkgTypeNode>(ctx)? {
            let ty: PkgTypeNode = self.by_key(ctx, &key)?;
            let found = ty.pkg_type.contains(text);
            let mut namespaces = Vec::new();
            for ns_id in &ty.namespaces {
                let ns: PkgNamespaceNode = self.by_id(ctx, ns_id)?;
                let names = self.search_pkg_names(ctx, &ns, text, found || ns.namespace.contains(text))?;
                if !names.is_empty() {
                    namespaces.push(PackageNamespace {
                        id: ns.id,
                        namespace: ns.namespace,
                        names,
                    });
                }
            }
            if !namespaces.is_empty() {
                out.push(Package {
                    id: ty.id,
                    pkg_type: ty.pkg_type,
                    namespaces,
                });
            }
        }
        Ok(out)
    }

    fn search_pkg_names(
        &self,
        ctx: &Context,
        ns: &PkgNamespaceNode,
        text: &str,
        found: bool,
    ) -> GuacResult<Vec<PackageName>> {
        let mut names = Vec::new();
        for name_id in &ns.names {
            let name: PkgNameNode = self.by_id(ctx, name_id)?;
            let found = found || name.name.contains(text);
            let mut versions = Vec::new();
            for version_id in &name.versions {
                let v: PkgVersionNode = self.by_id(ctx, version_id)?;
                if found || v.version.contains(text) {
                    versions.push(v.to_model());
                }
            }
            if !versions.is_empty() {
                names.push(PackageName {
                    id: name.id,
                    name: name.name,
                    versions,
                });
            }
        }
        Ok(names)
    }

    fn search_sources(&self, ctx: &Context, text: &str) -> GuacResult<Vec<Source>> {
        let mut out = Vec::new();
        for key in self.all_keys::<SourceTypeNode>(ctx)? {
            let ty: SourceTypeNode = self.by_key(ctx, &key)?;
            let found = ty.src_type.contains(text);
            let mut namespaces = Vec::new();
            for ns_id in &ty.namespaces {
                let ns: SourceNamespaceNode = self.by_id(ctx, ns_id)?;
                let found = found || ns.namespace.contains(text);
                let mut names = Vec::new();
                for name_id in &ns.names {
                    let name: SourceNameNode = self.by_id(ctx, name_id)?;
                    if found || name.name.contains(text) {
                        names.push(name.to_model());
                    }
                }
                if !names.is_empty() {
                    namespaces.push(SourceNamespace {
                        id: ns.id,
                        namespace: ns.namespace,
                        names,
                    });
                }
            }
            if !namespaces.is_empty() {
                out.push(Source {
                    id: ty.id,
                    src_type: ty.src_type,
                    namespaces,
                });
            }
        }
        Ok(out)
    }

    /// Package version IDs due for a scan of `query_type`.
    ///
    /// A version is due when it has never been scanned, or when its newest scan
    /// is older than `last_scan_hours`. Package types excluded in the backend
    /// configuration are skipped.
    ///
    /// # Errors
    /// A negative or overflowing window; store failures.
    pub fn find_packages_that_need_scanning(
        &self,
        ctx: &Context,
        query_type: QueryType,
        last_scan_hours: i64,
    ) -> GuacResult<Vec<String>> {
        const OP: &str = "FindPackagesThatNeedScanning";
        let window = validation::scan_window(last_scan_hours).in_operation(OP)?;
        let span = tracing::debug_span!(
            "scan_due",
            operation = OP,
            request_id = %ctx.request_id(),
            ?query_type,
            last_scan_hours
        );
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        let cutoff = Utc::now()
            .checked_sub_signed(window)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.versions_due(ctx, query_type, cutoff).in_operation(OP)
    }

    fn versions_due(&self, ctx: &Context, query_type: QueryType, cutoff: DateTime<Utc>) -> GuacResult<Vec<String>> {
        let mut due = Vec::new();
        for key in self.all_keys::<PkgTypeNode>(ctx)? {
            let ty: PkgTypeNode = self.by_key(ctx, &key)?;
            if self.config.is_scan_excluded(&ty.pkg_type) {
                tracing::trace!(pkg_type = %ty.pkg_type, "skipping excluded package type");
                continue;
            }
            for ns_id in &ty.namespaces {
                let ns: PkgNamespaceNode = self.by_id(ctx, ns_id)?;
                for name_id in &ns.names {
                    let name: PkgNameNode = self.by_id(ctx, name_id)?;
                    for version_id in &name.versions {
                        let v: PkgVersionNode = self.by_id(ctx, version_id)?;
                        match self.last_scanned(ctx, &v, query_type)? {
                            Some(last) if last >= cutoff => {}
                            _ => due.push(v.id),
                        }
                    }
                }
            }
        }
        Ok(due)
    }

    /// Newest scan time among the version's scan links of `query_type`.
    fn last_scanned(
        &self,
        ctx: &Context,
        version: &PkgVersionNode,
        query_type: QueryType,
    ) -> GuacResult<Option<DateTime<Utc>>> {
        let mut last: Option<DateTime<Utc>> = None;
        match query_type {
            QueryType::Vulnerability => {
                for id in version.backrefs().get(LinkKind::CertifyVuln) {
                    let link: CertifyVulnNode = self.by_id(ctx, id)?;
                    last = last.max(Some(link.time_scanned));
                }
            }
            QueryType::License => {
                for id in version.backrefs().get(LinkKind::CertifyLegal) {
                    let link: CertifyLegalNode = self.by_id(ctx, id)?;
                    last = last.max(Some(link.time_scanned));
                }
            }
        }
        Ok(last)
    }

    /// Package responses for `ids`, as a connection ordered by identifier.
    ///
    /// Any unknown identifier yields an empty connection.
    ///
    /// # Errors
    /// Identifiers naming non-package nodes; store failures.
    pub fn query_packages_list_for_scan(
        &self,
        ctx: &Context,
        ids: &[String],
        after: Option<&str>,
        first: Option<usize>,
    ) -> GuacResult<Connection<Package>> {
        const OP: &str = "QueryPackagesListForScan";
        let span = tracing::debug_span!("list", operation = OP, request_id = %ctx.request_id(), after, first);
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;

        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut page = PageBuilder::new(first);
        let mut total = 0;
        for id in ids {
            let package = match self.build_package_response(ctx, &id, None) {
                Ok(Some(p)) => p,
                Ok(None) => continue,
                Err(e) if e.is_not_found() => return Ok(Connection::empty()),
                Err(e) => return Err(e.in_operation(OP)),
            };
            if after.is_some_and(|a| id.as_str() <= a) {
                continue;
            }
            total += 1;
            page.push(id, package);
        }
        Ok(page.finish(total))
    }
}
