//! Subject unions shared by link kinds: resolution on ingest, response building
//! and candidate narrowing on query.
//!
//! Link records store each possible subject in its own field; exactly one is
//! non-empty.

use super::artifact::ArtifactNode;
use super::link::{LinkKind, LinkTarget, Linkable};
use super::query::backrefs_of;
use super::KvBackend;
use crate::context::Context;
use crate::error::{GuacError, GuacResult, ValidationError};
use crate::model::{
    Artifact, ArtifactSpec, MatchFlags, PackageOrArtifact, PackageOrArtifactInput,
    PackageOrArtifactSpec, PackageOrSource, PackageOrSourceInput, PackageOrSourceSpec,
    PackageSourceOrArtifact, PackageSourceOrArtifactInput, PackageSourceOrArtifactSpec,
    PkgMatchType, PkgSpec, SourceSpec,
};

fn no_subject(options: &'static str) -> GuacError {
    ValidationError::SubjectCount { options, found: 0 }.into()
}

impl KvBackend {
    pub(crate) fn resolve_package_or_source(
        &self,
        ctx: &Context,
        input: &PackageOrSourceInput,
    ) -> GuacResult<LinkTarget> {
        if let Some(pkg) = &input.package {
            return Ok(LinkTarget::PkgVersion(self.resolve_pkg_version(ctx, pkg)?.id));
        }
        if let Some(src) = &input.source {
            return Ok(LinkTarget::SourceName(self.resolve_source_name(ctx, src)?.id));
        }
        Err(no_subject("package or source"))
    }

    /// Packages resolve to a name or a version node depending on `flags`.
    pub(crate) fn resolve_package_source_or_artifact(
        &self,
        ctx: &Context,
        input: &PackageSourceOrArtifactInput,
        flags: MatchFlags,
    ) -> GuacResult<LinkTarget> {
        if let Some(pkg) = &input.package {
            return Ok(match flags.pkg {
                PkgMatchType::AllVersions => LinkTarget::PkgName(self.resolve_pkg_name(ctx, pkg)?.id),
                PkgMatchType::SpecificVersion => {
                    LinkTarget::PkgVersion(self.resolve_pkg_version(ctx, pkg)?.id)
                }
            });
        }
        if let Some(src) = &input.source {
            return Ok(LinkTarget::SourceName(self.resolve_source_name(ctx, src)?.id));
        }
        if let Some(art) = &input.artifact {
            return Ok(LinkTarget::Artifact(self.resolve_artifact(ctx, art)?.id));
        }
        Err(no_subject("package, source or artifact"))
    }

    pub(crate) fn resolve_package_or_artifact(
        &self,
        ctx: &Context,
        input: &PackageOrArtifactInput,
    ) -> GuacResult<LinkTarget> {
        if let Some(pkg) = &input.package {
            return Ok(LinkTarget::PkgVersion(self.resolve_pkg_version(ctx, pkg)?.id));
        }
        if let Some(art) = &input.artifact {
            return Ok(LinkTarget::Artifact(self.resolve_artifact(ctx, art)?.id));
        }
        Err(no_subject("package or artifact"))
    }

    /// The artifact `id` as a response, or `None` if `filter` rejects it.
    pub(crate) fn build_artifact_response(
        &self,
        ctx: &Context,
        id: &str,
        filter: Option<&ArtifactSpec>,
    ) -> GuacResult<Option<Artifact>> {
        if let Some(f) = filter {
            if !self.artifact_matches(ctx, id, f)? {
                return Ok(None);
            }
        }
        let node: ArtifactNode = self.by_id(ctx, id)?;
        Ok(Some(node.to_artifact()))
    }

    /// Subject response for a link storing `pkg` or `source`.
    ///
    /// A filter on one subject kind rejects links whose subject is the other kind.
    pub(crate) fn package_or_source_response(
        &self,
        ctx: &Context,
        pkg: &str,
        source: &str,
        filter: Option<&PackageOrSourceSpec>,
    ) -> GuacResult<Option<PackageOrSource>> {
        let pkg_filter = filter.and_then(|f| f.package.as_ref());
        let src_filter = filter.and_then(|f| f.source.as_ref());
        if !pkg.is_empty() {
            if src_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_package_response(ctx, pkg, pkg_filter)?
                .map(PackageOrSource::Package));
        }
        if !source.is_empty() {
            if pkg_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_source_response(ctx, source, src_filter)?
                .map(PackageOrSource::Source));
        }
        Err(GuacError::internal("link record without a subject"))
    }

    pub(crate) fn package_source_or_artifact_response(
        &self,
        ctx: &Context,
        pkg: &str,
        source: &str,
        artifact: &str,
        filter: Option<&PackageSourceOrArtifactSpec>,
    ) -> GuacResult<Option<PackageSourceOrArtifact>> {
        let pkg_filter = filter.and_then(|f| f.package.as_ref());
        let src_filter = filter.and_then(|f| f.source.as_ref());
        let art_filter = filter.and_then(|f| f.artifact.as_ref());
        if !pkg.is_empty() {
            if src_filter.is_some() || art_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_package_response(ctx, pkg, pkg_filter)?
                .map(PackageSourceOrArtifact::Package));
        }
        if !source.is_empty() {
            if pkg_filter.is_some() || art_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_source_response(ctx, source, src_filter)?
                .map(PackageSourceOrArtifact::Source));
        }
        if !artifact.is_empty() {
            if pkg_filter.is_some() || src_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_artifact_response(ctx, artifact, art_filter)?
                .map(PackageSourceOrArtifact::Artifact));
        }
        Err(GuacError::internal("link record without a subject"))
    }

    pub(crate) fn package_or_artifact_response(
        &self,
        ctx: &Context,
        pkg: &str,
        artifact: &str,
        filter: Option<&PackageOrArtifactSpec>,
    ) -> GuacResult<Option<PackageOrArtifact>> {
        let pkg_filter = filter.and_then(|f| f.package.as_ref());
        let art_filter = filter.and_then(|f| f.artifact.as_ref());
        if !pkg.is_empty() {
            if art_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_package_response(ctx, pkg, pkg_filter)?
                .map(PackageOrArtifact::Package));
        }
        if !artifact.is_empty() {
            if pkg_filter.is_some() {
                return Ok(None);
            }
            return Ok(self
                .build_artifact_response(ctx, artifact, art_filter)?
                .map(PackageOrArtifact::Artifact));
        }
        Err(GuacError::internal("link record without a subject"))
    }

    /// Back-references of `kind` on the package versions `filter` pins down,
    /// or `None` when it pins down none.
    pub(crate) fn package_candidates(
        &self,
        ctx: &Context,
        filter: &PkgSpec,
        kind: LinkKind,
    ) -> GuacResult<Option<Vec<String>>> {
        let versions = self.find_package_versions(ctx, filter)?;
        if versions.is_empty() {
            return Ok(None);
        }
        Ok(Some(backrefs_of(&versions, kind)))
    }

    pub(crate) fn source_candidates(
        &self,
        ctx: &Context,
        filter: &SourceSpec,
        kind: LinkKind,
    ) -> GuacResult<Option<Vec<String>>> {
        Ok(self
            .exact_source(ctx, filter)?
            .map(|s| s.backrefs().get(kind).to_vec()))
    }

    pub(crate) fn artifact_candidates(
        &self,
        ctx: &Context,
        filter: &ArtifactSpec,
        kind: LinkKind,
    ) -> GuacResult<Option<Vec<String>>> {
        Ok(self
            .exact_artifact(ctx, filter)?
            .map(|a| a.backrefs().get(kind).to_vec()))
    }

    pub(crate) fn package_or_source_candidates(
        &self,
        ctx: &Context,
        filter: Option<&PackageOrSourceSpec>,
        kind: LinkKind,
    ) -> GuacResult<Option<Vec<String>>> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        if let Some(pkg) = &filter.package {
            if let Some(ids) = self.package_candidates(ctx, pkg, kind)? {
                return Ok(Some(ids));
            }
        }
        if let Some(src) = &filter.source {
            return self.source_candidates(ctx, src, kind);
        }
        Ok(None)
    }

    pub(crate) fn package_or_artifact_candidates(
        &self,
        ctx: &Context,
        filter: Option<&PackageOrArtifactSpec>,
        kind: LinkKind,
    ) -> GuacResult<Option<Vec<String>>> {
        let Some(filter) = filter else {
            return Ok(None);
        };
        if let Some(pkg) = &filter.package {
            if let Some(ids) = self.package_candidates(ctx, pkg, kind)? {
                return Ok(Some(ids));
            }
        }
        if let Some(art) = &filter.artifact {
            return self.artifact_candidates(ctx, art, kind);
        }
        Ok(None)
    }
}

/// Splits a resolved subject into the (package, source, artifact) record fields.
pub(crate) fn subject_fields(target: &LinkTarget) -> (String, String, String) {
    match target {
        LinkTarget::PkgVersion(id) | LinkTarget::PkgName(id) => (id.clone(), String::new(), String::new()),
        LinkTarget::SourceName(id) => (String::new(), id.clone(), String::new()),
        LinkTarget::Artifact(id) => (String::new(), String::new(), id.clone()),
        LinkTarget::License(_) | LinkTarget::Vulnerability(_) => {
            (String::new(), String::new(), String::new())
        }
    }
}
