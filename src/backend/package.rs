//! Package tree: type → namespace → name → version.
//!
//! Each level is keyed by its parent's identifier plus its own fields, so the
//! same name under two namespaces is two nodes. Names and versions are link
//! targets: all-versions links hang off names, version-specific links off
//! versions.

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
    IdOrPkgInput, Package, PackageIds, PackageName, PackageNamespace, PackageQualifier,
    PackageVersion, PkgInputSpec, PkgSpec,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PkgTypeNode {
    pub(crate) id: String,
    pub(crate) pkg_type: String,
    pub(crate) namespaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PkgNamespaceNode {
    pub(crate) id: String,
    pub(crate) parent: String,
    pub(crate) namespace: String,
    pub(crate) names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PkgNameNode {
    pub(crate) id: String,
    pub(crate) parent: String,
    pub(crate) name: String,
    pub(crate) versions: Vec<String>,
    pub(crate) backrefs: Backrefs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct PkgVersionNode {
    pub(crate) id: String,
    pub(crate) parent: String,
    pub(crate) version: String,
    pub(crate) subpath: String,
    /// Sorted by key, then value.
    pub(crate) qualifiers: Vec<PackageQualifier>,
    pub(crate) backrefs: Backrefs,
}

impl PkgTypeNode {
    fn new(pkg_type: &str) -> Self {
        Self {
            id: String::new(),
            pkg_type: pkg_type.to_string(),
            namespaces: Vec::new(),
        }
    }
}

impl PkgNamespaceNode {
    fn new(parent: &str, namespace: &str) -> Self {
        Self {
            id: String::new(),
            parent: parent.to_string(),
            namespace: namespace.to_string(),
            names: Vec::new(),
        }
    }
}

impl PkgNameNode {
    fn new(parent: &str, name: &str) -> Self {
        Self {
            id: String::new(),
            parent: parent.to_string(),
            name: name.to_string(),
            versions: Vec::new(),
            backrefs: Backrefs::default(),
        }
    }
}

impl PkgVersionNode {
    fn new(parent: &str, input: &PkgInputSpec) -> Self {
        let mut qualifiers: Vec<PackageQualifier> = input
            .qualifiers
            .iter()
            .map(|q| PackageQualifier {
                key: q.key.clone(),
                value: q.value.clone(),
            })
            .collect();
        qualifiers.sort_by(|a, b| (&a.key, &a.value).cmp(&(&b.key, &b.value)));
        qualifiers.dedup();
        Self {
            id: String::new(),
            parent: parent.to_string(),
            version: input.version.clone().unwrap_or_default(),
            subpath: input.subpath.clone().unwrap_or_default(),
            qualifiers,
            backrefs: Backrefs::default(),
        }
    }

    pub(crate) fn to_model(&self) -> PackageVersion {
        PackageVersion {
            id: self.id.clone(),
            version: self.version.clone(),
            qualifiers: self.qualifiers.clone(),
            subpath: self.subpath.clone(),
        }
    }
}

impl StoredNode for PkgTypeNode {
    const COLLECTION: &'static str = "package_types";
    const KIND: &'static str = "package type";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("package_type")
            .field("type", &self.pkg_type)
            .finish()
    }
}

impl StoredNode for PkgNamespaceNode {
    const COLLECTION: &'static str = "package_namespaces";
    const KIND: &'static str = "package namespace";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("package_namespace")
            .field("parent", &self.parent)
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl StoredNode for PkgNameNode {
    const COLLECTION: &'static str = "package_names";
    const KIND: &'static str = "package name";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        KeyHasher::new("package_name")
            .field("parent", &self.parent)
            .field("name", &self.name)
            .finish()
    }
}

impl StoredNode for PkgVersionNode {
    const COLLECTION: &'static str = "package_versions";
    const KIND: &'static str = "package version";

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn key(&self) -> String {
        let qualifiers: Vec<(&str, &str)> = self
            .qualifiers
            .iter()
            .map(|q| (q.key.as_str(), q.value.as_str()))
            .collect();
        KeyHasher::new("package_version")
            .field("parent", &self.parent)
            .field("version", &self.version)
            .field("subpath", &self.subpath)
            .pairs("qualifiers", &qualifiers)
            .finish()
    }
}

impl Linkable for PkgNameNode {
    fn backrefs(&self) -> &Backrefs {
        &self.backrefs
    }

    fn backrefs_mut(&mut self) -> &mut Backrefs {
        &mut self.backrefs
    }
}

impl Linkable for PkgVersionNode {
    fn backrefs(&self) -> &Backrefs {
        &self.backrefs
    }

    fn backrefs_mut(&mut self) -> &mut Backrefs {
        &mut self.backrefs
    }
}

fn describe(input: &PkgInputSpec) -> String {
    let mut out = format!(
        "package {}/{}/{}",
        input.pkg_type,
        input.namespace.as_deref().unwrap_or_default(),
        input.name
    );
    if let Some(v) = &input.version {
        out.push('@');
        out.push_str(v);
    }
    out
}

/// True when any qualifier constraint of `filter` fails for `qualifiers`.
fn no_match_qualifiers(filter: &PkgSpec, qualifiers: &[PackageQualifier]) -> bool {
    if filter.match_only_empty_qualifiers == Some(true) {
        return !qualifiers.is_empty();
    }
    if filter.qualifiers.len() > qualifiers.len() {
        return true;
    }
    filter.qualifiers.iter().any(|want| {
        !qualifiers.iter().any(|q| {
            q.key == want.key && want.value.as_ref().map_or(true, |v| *v == q.value)
        })
    })
}

pub(crate) fn version_matches(filter: &PkgSpec, node: &PkgVersionNode) -> bool {
    !(no_match(filter.version.as_deref(), node.version.as_str())
        || no_match(filter.subpath.as_deref(), node.subpath.as_str())
        || no_match_qualifiers(filter, &node.qualifiers))
}

/// Whether a filter constrains anything at the version level.
fn filters_versions(filter: &PkgSpec) -> bool {
    filter.version.is_some()
        || filter.subpath.is_some()
        || !filter.qualifiers.is_empty()
        || filter.match_only_empty_qualifiers == Some(true)
}

impl KvBackend {
    /// Ingests a package, creating any missing level of its tree.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn ingest_package(&self, ctx: &Context, input: &PkgInputSpec) -> GuacResult<PackageIds> {
        let mut ids = self.ingest_packages(ctx, std::slice::from_ref(input))?;
        ids.pop()
            .ok_or_else(|| GuacError::internal("empty result").in_operation("IngestPackage"))
    }

    /// Ingests several packages; IDs are returned in input order.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn ingest_packages(&self, ctx: &Context, inputs: &[PkgInputSpec]) -> GuacResult<Vec<PackageIds>> {
        self.two_phase(
            ctx,
            "IngestPackages",
            inputs,
            |backend, ctx, input| {
                Ok(match backend.lookup_package(ctx, input)? {
                    Some(ids) => Probe::Hit(ids),
                    None => Probe::Miss(input.clone()),
                })
            },
            |backend, ctx, input| backend.create_package(ctx, &input),
        )
    }

    /// Packages matching `spec`, each trimmed to its matching branches.
    ///
    /// # Errors
    /// Store failures, wrapped with the operation name.
    pub fn packages(&self, ctx: &Context, spec: &PkgSpec) -> GuacResult<Vec<Package>> {
        const OP: &str = "Packages";
        let span = tracing::debug_span!("query", operation = OP, request_id = %ctx.request_id());
        let _enter = span.enter();
        let _guard = self.read_guard(OP).in_operation(OP)?;
        self.match_packages(ctx, spec).in_operation(OP)
    }

    fn match_packages(&self, ctx: &Context, spec: &PkgSpec) -> GuacResult<Vec<Package>> {
        if let Some(id) = &spec.id {
            return match self.build_package_response(ctx, id, None) {
                Ok(p) => Ok(p.into_iter().collect()),
                Err(e) if e.is_not_found() || e.is_type_mismatch() => Ok(Vec::new()),
                Err(e) => Err(e),
            };
        }

        let version_level = filters_versions(spec);
        let name_level = version_level || spec.name.is_some();
        let namespace_level = name_level || spec.namespace.is_some();

        let mut out = Vec::new();
        for key in self.all_keys::<PkgTypeNode>(ctx)? {
            let ty: PkgTypeNode = self.by_key(ctx, &key)?;
            if no_match(spec.pkg_type.as_deref(), ty.pkg_type.as_str()) {
                continue;
            }
            let mut namespaces = Vec::new();
            for ns_id in &ty.namespaces {
                let ns: PkgNamespaceNode = self.by_id(ctx, ns_id)?;
                if no_match(spec.namespace.as_deref(), ns.namespace.as_str()) {
                    continue;
                }
                let mut names = Vec::new();
                for name_id in &ns.names {
                    let name: PkgNameNode = self.by_id(ctx, name_id)?;
                    if no_match(spec.name.as_deref(), name.name.as_str()) {
                        continue;
                    }
                    let mut versions = Vec::new();
                    for version_id in &name.versions {
                        let v: PkgVersionNode = self.by_id(ctx, version_id)?;
                        if version_matches(spec, &v) {
                            versions.push(v.to_model());
                        }
                    }
                    if !versions.is_empty() || !version_level {
                        names.push(PackageName {
                            id: name.id,
                            name: name.name,
                            versions,
                        });
                    }
                }
                if !names.is_empty() || !name_level {
                    namespaces.push(PackageNamespace {
                        id: ns.id,
                        namespace: ns.namespace,
                        names,
                    });
                }
            }
            if !namespaces.is_empty() || !namespace_level {
                out.push(Package {
                    id: ty.id,
                    pkg_type: ty.pkg_type,
                    namespaces,
                });
            }
        }
        Ok(out)
    }

    /// All four levels of an already-stored package, or `None` if any is missing.
    fn lookup_package(&self, ctx: &Context, input: &PkgInputSpec) -> GuacResult<Option<PackageIds>> {
        let Some(name) = self.find_pkg_name(
            ctx,
            &input.pkg_type,
            input.namespace.as_deref().unwrap_or_default(),
            &input.name,
        )?
        else {
            return Ok(None);
        };
        let Some(version) = self.find_by_key::<PkgVersionNode>(ctx, &PkgVersionNode::new(&name.id, input).key())?
        else {
            return Ok(None);
        };
        let ns: PkgNamespaceNode = self.by_id(ctx, &name.parent)?;
        Ok(Some(PackageIds {
            package_type_id: ns.parent,
            package_namespace_id: ns.id,
            package_name_id: name.id,
            package_version_id: version.id,
        }))
    }

    fn create_package(&self, ctx: &Context, input: &PkgInputSpec) -> GuacResult<PackageIds> {
        let (mut ty, _) = self.ensure(ctx, PkgTypeNode::new(&input.pkg_type))?;
        let namespace = input.namespace.as_deref().unwrap_or_default();
        let (mut ns, _) = self.ensure(ctx, PkgNamespaceNode::new(&ty.id, namespace))?;
        if insert_child(&mut ty.namespaces, &ns.id) {
            self.put(ctx, &ty)?;
        }
        let (mut name, _) = self.ensure(ctx, PkgNameNode::new(&ns.id, &input.name))?;
        if insert_child(&mut ns.names, &name.id) {
            self.put(ctx, &ns)?;
        }
        let (version, _) = self.ensure(ctx, PkgVersionNode::new(&name.id, input))?;
        if insert_child(&mut name.versions, &version.id) {
            self.put(ctx, &name)?;
        }
        Ok(PackageIds {
            package_type_id: ty.id,
            package_namespace_id: ns.id,
            package_name_id: name.id,
            package_version_id: version.id,
        })
    }

    fn find_pkg_name(
        &self,
        ctx: &Context,
        pkg_type: &str,
        namespace: &str,
        name: &str,
    ) -> GuacResult<Option<PkgNameNode>> {
        let Some(ty) = self.find_by_key::<PkgTypeNode>(ctx, &PkgTypeNode::new(pkg_type).key())? else {
            return Ok(None);
        };
        let Some(ns) = self.find_by_key::<PkgNamespaceNode>(ctx, &PkgNamespaceNode::new(&ty.id, namespace).key())?
        else {
            return Ok(None);
        };
        self.find_by_key(ctx, &PkgNameNode::new(&ns.id, name).key())
    }

    /// Resolves a package reference to an existing version node.
    pub(crate) fn resolve_pkg_version(&self, ctx: &Context, input: &IdOrPkgInput) -> GuacResult<PkgVersionNode> {
        if let Some(id) = &input.package_version_id {
            return self.by_id(ctx, id);
        }
        let Some(spec) = &input.package_input else {
            return Err(ValidationError::MissingField {
                field: "packageInput".to_string(),
            }
            .into());
        };
        let version = match self.find_pkg_name(
            ctx,
            &spec.pkg_type,
            spec.namespace.as_deref().unwrap_or_default(),
            &spec.name,
        )? {
            Some(name) => self.find_by_key::<PkgVersionNode>(ctx, &PkgVersionNode::new(&name.id, spec).key())?,
            None => None,
        };
        version.ok_or_else(|| GuacError::not_found(describe(spec)))
    }

    /// Resolves a package reference to an existing name node.
    pub(crate) fn resolve_pkg_name(&self, ctx: &Context, input: &IdOrPkgInput) -> GuacResult<PkgNameNode> {
        if let Some(id) = &input.package_name_id {
            return self.by_id(ctx, id);
        }
        let Some(spec) = &input.package_input else {
            return Err(ValidationError::MissingField {
                field: "packageInput".to_string(),
            }
            .into());
        };
        self.find_pkg_name(
            ctx,
            &spec.pkg_type,
            spec.namespace.as_deref().unwrap_or_default(),
            &spec.name,
        )?
        .ok_or_else(|| {
            GuacError::not_found(format!(
                "package name {}/{}/{}",
                spec.pkg_type,
                spec.namespace.as_deref().unwrap_or_default(),
                spec.name
            ))
        })
    }

    /// The single name node a filter pins down by ID or by type, namespace and name.
    pub(crate) fn exact_package_name(&self, ctx: &Context, filter: &PkgSpec) -> GuacResult<Option<PkgNameNode>> {
        if let Some(id) = &filter.id {
            return self.find_by_id(ctx, id);
        }
        match (&filter.pkg_type, &filter.namespace, &filter.name) {
            (Some(t), Some(ns), Some(n)) => self.find_pkg_name(ctx, t, ns, n),
            _ => Ok(None),
        }
    }

    /// Version nodes a filter narrows to without a scan.
    pub(crate) fn find_package_versions(&self, ctx: &Context, filter: &PkgSpec) -> GuacResult<Vec<PkgVersionNode>> {
        if let Some(id) = &filter.id {
            return Ok(self.find_by_id(ctx, id)?.into_iter().collect());
        }
        let Some(name) = self.exact_package_name(ctx, filter)? else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for id in &name.versions {
            let v: PkgVersionNode = self.by_id(ctx, id)?;
            if version_matches(filter, &v) {
                out.push(v);
            }
        }
        Ok(out)
    }

    /// Builds the package tree above `id`, which may name any level.
    ///
    /// Returns `None` when `filter` rejects any level on the path.
    ///
    /// # Errors
    /// `NotFound` for an unknown ID, `TypeMismatch` for a non-package node.
    pub(crate) fn build_package_response(
        &self,
        ctx: &Context,
        id: &str,
        filter: Option<&PkgSpec>,
    ) -> GuacResult<Option<Package>> {
        if filter.is_some_and(|f| no_match(f.id.as_deref(), id)) {
            return Ok(None);
        }
        let Some(loc) = self.id_ref(ctx, id)? else {
            return Err(GuacError::not_found(format!("package node {id:?}")));
        };
        let depth = [
            PkgTypeNode::COLLECTION,
            PkgNamespaceNode::COLLECTION,
            PkgNameNode::COLLECTION,
            PkgVersionNode::COLLECTION,
        ]
        .iter()
        .position(|c| *c == loc.collection)
        .ok_or_else(|| GuacError::TypeMismatch {
            id: id.to_string(),
            expected: "package",
        })?;

        let mut current = id.to_string();
        let mut versions = Vec::new();
        if depth >= 3 {
            let v: PkgVersionNode = self.by_id(ctx, &current)?;
            if filter.is_some_and(|f| !version_matches(f, &v)) {
                return Ok(None);
            }
            versions.push(v.to_model());
            current = v.parent;
        }
        let mut names = Vec::new();
        if depth >= 2 {
            let n: PkgNameNode = self.by_id(ctx, &current)?;
            if filter.is_some_and(|f| no_match(f.name.as_deref(), n.name.as_str())) {
                return Ok(None);
            }
            names.push(PackageName {
                id: n.id,
                name: n.name,
                versions,
            });
            current = n.parent;
        }
        let mut namespaces = Vec::new();
        if depth >= 1 {
            let ns: PkgNamespaceNode = self.by_id(ctx, &current)?;
            if filter.is_some_and(|f| no_match(f.namespace.as_deref(), ns.namespace.as_str())) {
                return Ok(None);
            }
            namespaces.push(PackageNamespace {
                id: ns.id,
                namespace: ns.namespace,
                names,
            });
            current = ns.parent;
        }
        let ty: PkgTypeNode = self.by_id(ctx, &current)?;
        if filter.is_some_and(|f| no_match(f.pkg_type.as_deref(), ty.pkg_type.as_str())) {
            return Ok(None);
        }
        Ok(Some(Package {
            id: ty.id,
            pkg_type: ty.pkg_type,
            namespaces,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PackageQualifierSpec;

    fn ctx() -> Context {
        Context::background()
    }

    fn openssl() -> PkgInputSpec {
        PkgInputSpec::new("conan", "openssl.org", "openssl").with_version("3.0.3")
    }

    #[test]
    fn test_ingest_package_is_idempotent() {
        let backend = KvBackend::in_memory();
        let a = backend.ingest_package(&ctx(), &openssl()).unwrap();
        let b = backend.ingest_package(&ctx(), &openssl()).unwrap();
        assert_eq!(a, b);
        assert_eq!(backend.all_keys::<PkgVersionNode>(&ctx()).unwrap().len(), 1);
    }

    #[test]
    fn test_sibling_versions_share_name() {
        let backend = KvBackend::in_memory();
        let a = backend.ingest_package(&ctx(), &openssl()).unwrap();
        let b = backend
            .ingest_package(&ctx(), &openssl().with_version("3.0.4"))
            .unwrap();
        assert_eq!(a.package_name_id, b.package_name_id);
        assert_ne!(a.package_version_id, b.package_version_id);

        let name: PkgNameNode = backend.by_id(&ctx(), &a.package_name_id).unwrap();
        assert_eq!(name.versions.len(), 2);
    }

    #[test]
    fn test_qualifier_order_does_not_matter() {
        let backend = KvBackend::in_memory();
        let a = backend
            .ingest_package(&ctx(), &openssl().with_qualifier("a", "1").with_qualifier("b", "2"))
            .unwrap();
        let b = backend
            .ingest_package(&ctx(), &openssl().with_qualifier("b", "2").with_qualifier("a", "1"))
            .unwrap();
        assert_eq!(a.package_version_id, b.package_version_id);
    }

    #[test]
    fn test_qualifier_separator_in_values_stays_distinct() {
        let backend = KvBackend::in_memory();
        let a = backend
            .ingest_package(&ctx(), &openssl().with_qualifier("a=b", "c"))
            .unwrap();
        let b = backend
            .ingest_package(&ctx(), &openssl().with_qualifier("a", "b=c"))
            .unwrap();
        assert_ne!(a.package_version_id, b.package_version_id);
        assert_eq!(a.package_name_id, b.package_name_id);
    }

    #[test]
    fn test_packages_filter_trims_tree() {
        let backend = KvBackend::in_memory();
        backend.ingest_package(&ctx(), &openssl()).unwrap();
        backend
            .ingest_package(&ctx(), &openssl().with_version("3.0.4"))
            .unwrap();
        backend
            .ingest_package(&ctx(), &PkgInputSpec::new("pypi", "", "django"))
            .unwrap();

        let spec = PkgSpec::name("conan", "openssl.org", "openssl").with_version("3.0.4");
        let found = backend.packages(&ctx(), &spec).unwrap();
        assert_eq!(found.len(), 1);
        let versions: Vec<_> = found[0].namespaces[0].names[0]
            .versions
            .iter()
            .map(|v| v.version.as_str())
            .collect();
        assert_eq!(versions, ["3.0.4"]);

        let all = backend.packages(&ctx(), &PkgSpec::default()).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_qualifier_filters() {
        let backend = KvBackend::in_memory();
        let plain = backend.ingest_package(&ctx(), &openssl()).unwrap();
        let qualified = backend
            .ingest_package(&ctx(), &openssl().with_qualifier("arch", "x86"))
            .unwrap();

        let mut spec = PkgSpec::name("conan", "openssl.org", "openssl");
        spec.match_only_empty_qualifiers = Some(true);
        let ids: Vec<_> = backend
            .find_package_versions(&ctx(), &spec)
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, [plain.package_version_id.clone()]);

        spec.match_only_empty_qualifiers = None;
        spec.qualifiers = vec![PackageQualifierSpec {
            key: "arch".to_string(),
            value: None,
        }];
        let ids: Vec<_> = backend
            .find_package_versions(&ctx(), &spec)
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, [qualified.package_version_id]);
    }

    #[test]
    fn test_build_response_from_any_level() {
        let backend = KvBackend::in_memory();
        let ids = backend.ingest_package(&ctx(), &openssl()).unwrap();

        let from_version = backend
            .build_package_response(&ctx(), &ids.package_version_id, None)
            .unwrap()
            .unwrap();
        assert_eq!(from_version.version_ids(), [ids.package_version_id.as_str()]);

        let from_name = backend
            .build_package_response(&ctx(), &ids.package_name_id, None)
            .unwrap()
            .unwrap();
        assert!(from_name.version_ids().is_empty());
        assert_eq!(from_name.name_ids(), [ids.package_name_id.as_str()]);

        let rejected = backend
            .build_package_response(&ctx(), &ids.package_version_id, Some(&PkgSpec::default().with_version("9")))
            .unwrap();
        assert!(rejected.is_none());
    }

    #[test]
    fn test_resolve_missing_package_is_not_found() {
        let backend = KvBackend::in_memory();
        let err = backend
            .resolve_pkg_version(&ctx(), &openssl().into())
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("conan/openssl.org/openssl@3.0.3"));
    }
}
