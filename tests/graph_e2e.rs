//! Cross-module flows: search, scan scheduling, node lookup and traversal.

mod common;

use chrono::{TimeDelta, Utc};
use common::{backend, ctx, npm};
use guac_kv::model::{
    ArtifactInputSpec, CertifyVulnSpec, Edge, IdOrPkgInput, IsOccurrenceInputSpec, IsOccurrenceSpec, Node, NodeKind,
    PackageOrSourceInput, PackageOrSourceInputs, PackageSourceOrArtifact, PkgInputSpec, QueryType,
    ScanMetadataInput, VulnerabilityInputSpec,
};

#[test]
fn test_search_propagates_from_type() {
    let backend = backend();
    backend
        .ingest_package(&ctx(), &PkgInputSpec::new("pkg:found", "ns", "lib").with_version("1.0"))
        .unwrap();
    let results = backend.find_software(&ctx(), "found").unwrap();
    assert_eq!(results.len(), 1);
    let PackageSourceOrArtifact::Package(p) = &results[0] else {
        panic!("expected a package");
    };
    assert_eq!(p.version_ids().len(), 1);
}

#[test]
fn test_scan_workflow() {
    let backend = backend();
    let pkgs = [npm("a", "1"), npm("b", "1")];
    backend.ingest_packages(&ctx(), &pkgs).unwrap();
    let vuln = VulnerabilityInputSpec::new("osv", "OSV-2024-1");
    backend.ingest_vulnerability(&ctx(), &vuln.clone().into()).unwrap();

    let due = backend
        .find_packages_that_need_scanning(&ctx(), QueryType::Vulnerability, 24)
        .unwrap();
    assert_eq!(due.len(), 2);

    let page = backend
        .query_packages_list_for_scan(&ctx(), &due, None, None)
        .unwrap();
    assert_eq!(page.total_count, 2);

    let meta = ScanMetadataInput {
        time_scanned: Utc::now() - TimeDelta::try_minutes(5).unwrap(),
        scanner_uri: "osv-scanner".to_string(),
        ..ScanMetadataInput::default()
    };
    backend
        .ingest_certify_vuln(&ctx(), &IdOrPkgInput::from(pkgs[0].clone()), &vuln.into(), &meta)
        .unwrap();

    let due = backend
        .find_packages_that_need_scanning(&ctx(), QueryType::Vulnerability, 24)
        .unwrap();
    assert_eq!(due.len(), 1);
    let Some(Node::Package(p)) = backend.node(&ctx(), &due[0]).unwrap() else {
        panic!("expected a package node");
    };
    assert_eq!(p.namespaces[0].names[0].name, "b");

    let found = backend.certify_vuln(&ctx(), &CertifyVulnSpec::default()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].metadata.scanner_uri, "osv-scanner");
}

#[test]
fn test_occurrence_traversal() {
    let backend = backend();
    let pkg = npm("left-pad", "1.3.0");
    let ids = backend.ingest_package(&ctx(), &pkg).unwrap();
    let art = ArtifactInputSpec::new("sha256", "abc123");
    let art_id = backend.ingest_artifact(&ctx(), &art.clone().into()).unwrap();
    let occ_id = backend
        .ingest_occurrence(
            &ctx(),
            &PackageOrSourceInput::package(pkg),
            &art.into(),
            &IsOccurrenceInputSpec::default(),
        )
        .unwrap();

    let from_artifact = backend
        .neighbors(&ctx(), &art_id, &[Edge::new(NodeKind::Artifact, NodeKind::IsOccurrence)])
        .unwrap();
    assert_eq!(from_artifact, vec![occ_id.clone()]);

    let from_link = backend
        .neighbors(&ctx(), &occ_id, &[Edge::new(NodeKind::IsOccurrence, NodeKind::Package)])
        .unwrap();
    assert_eq!(from_link, vec![ids.package_version_id.clone()]);

    let nodes = backend.nodes(&ctx(), &[occ_id, art_id]).unwrap();
    assert_eq!(nodes[0].kind(), NodeKind::IsOccurrence);
    assert_eq!(nodes[1].kind(), NodeKind::Artifact);
}

#[test]
fn test_misaligned_batch_writes_nothing() {
    let backend = backend();
    let pkg = npm("left-pad", "1.3.0");
    backend.ingest_package(&ctx(), &pkg).unwrap();
    let art = ArtifactInputSpec::new("sha256", "abc123");
    backend.ingest_artifact(&ctx(), &art.clone().into()).unwrap();

    let subjects = PackageOrSourceInputs {
        packages: vec![pkg.into()],
        sources: Vec::new(),
    };
    let err = backend
        .ingest_occurrences(
            &ctx(),
            &subjects,
            &[art.clone().into(), art.into()],
            &[IsOccurrenceInputSpec::default()],
        )
        .unwrap_err();
    assert!(err.is_validation());
    assert!(err.to_string().contains("uneven"));
    let all = backend
        .is_occurrence(&ctx(), &IsOccurrenceSpec::default())
        .unwrap();
    assert!(all.is_empty());
}
