//! End-to-end legal certification: ingest, dedup, license matching, listing.

mod common;

use common::{backend, ctx, legal, listed, npm};
use guac_kv::model::{
    CertifyLegalSpec, LicenseSpec, PackageOrSource, PackageOrSourceInput, PackageOrSourceInputs,
    PackageOrSourceSpec, PkgSpec,
};

#[test]
fn test_ingest_query_and_license_multiset() {
    let backend = backend();
    let pkg = npm("left-pad", "1.3.0");
    backend.ingest_package(&ctx(), &pkg).unwrap();
    backend
        .ingest_licenses(&ctx(), &[listed("MIT"), listed("Apache-2.0")])
        .unwrap();

    let subject = PackageOrSourceInput::package(pkg);
    let id = backend
        .ingest_certify_legal(&ctx(), &subject, &[listed("MIT"), listed("Apache-2.0")], &[], &legal(1))
        .unwrap();
    let again = backend
        .ingest_certify_legal(&ctx(), &subject, &[listed("Apache-2.0"), listed("MIT")], &[], &legal(1))
        .unwrap();
    assert_eq!(id, again, "declared license order must not matter");

    let by_license = CertifyLegalSpec {
        declared_licenses: vec![LicenseSpec::name("MIT")],
        ..CertifyLegalSpec::default()
    };
    let found = backend.certify_legal(&ctx(), &by_license).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].declared_licenses.len(), 2);
    let PackageOrSource::Package(p) = &found[0].subject else {
        panic!("expected a package subject");
    };
    assert_eq!(p.namespaces[0].names[0].name, "left-pad");

    let same_license_twice = CertifyLegalSpec {
        declared_licenses: vec![LicenseSpec::name("MIT"), LicenseSpec::name("MIT")],
        ..CertifyLegalSpec::default()
    };
    assert!(backend.certify_legal(&ctx(), &same_license_twice).unwrap().is_empty());

    let discovered = CertifyLegalSpec {
        discovered_licenses: vec![LicenseSpec::name("MIT")],
        ..CertifyLegalSpec::default()
    };
    assert!(backend.certify_legal(&ctx(), &discovered).unwrap().is_empty());
}

#[test]
fn test_subject_filter_and_listing() {
    let backend = backend();
    let pkgs = [npm("a", "1"), npm("b", "1"), npm("c", "1")];
    backend.ingest_packages(&ctx(), &pkgs).unwrap();
    backend.ingest_license(&ctx(), &listed("MIT")).unwrap();

    let subjects = PackageOrSourceInputs {
        packages: pkgs.iter().cloned().map(Into::into).collect(),
        sources: Vec::new(),
    };
    let declared = vec![vec![listed("MIT")]; 3];
    let discovered = vec![Vec::new(); 3];
    let legals = vec![legal(1), legal(2), legal(3)];
    let ids = backend
        .ingest_certify_legals(&ctx(), &subjects, &declared, &discovered, &legals)
        .unwrap();
    assert_eq!(ids.len(), 3);

    let only_b = CertifyLegalSpec {
        subject: Some(PackageOrSourceSpec {
            package: Some(PkgSpec::name("npm", "", "b")),
            source: None,
        }),
        ..CertifyLegalSpec::default()
    };
    let found = backend.certify_legal(&ctx(), &only_b).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, ids[1]);

    // Candidate path: the license's back-references.
    let by_license = CertifyLegalSpec {
        declared_licenses: vec![LicenseSpec::listed("MIT", "3.21")],
        ..CertifyLegalSpec::default()
    };
    let page = backend
        .certify_legal_list(&ctx(), &by_license, None, Some(2))
        .unwrap();
    assert_eq!(page.edges.len(), 2);
    assert!(page.page_info.has_next_page);
    let rest = backend
        .certify_legal_list(&ctx(), &by_license, page.page_info.end_cursor.as_deref(), Some(2))
        .unwrap();
    assert_eq!(rest.edges.len(), 1);
    assert!(!rest.page_info.has_next_page);

    let mut seen: Vec<String> = page
        .edges
        .iter()
        .chain(&rest.edges)
        .map(|e| e.cursor.clone())
        .collect();
    seen.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(seen, expected);
}

#[test]
fn test_unknown_license_fails_without_writes() {
    let backend = backend();
    let pkg = npm("left-pad", "1.3.0");
    backend.ingest_package(&ctx(), &pkg).unwrap();

    let err = backend
        .ingest_certify_legal(&ctx(), &PackageOrSourceInput::package(pkg), &[listed("GPL-3.0")], &[], &legal(1))
        .unwrap_err();
    assert!(err.is_not_found());
    assert!(err.to_string().starts_with("IngestCertifyLegal"));
    assert!(backend
        .certify_legal(&ctx(), &CertifyLegalSpec::default())
        .unwrap()
        .is_empty());
}

#[test]
fn test_repeated_declared_license_is_a_multiset() {
    let backend = backend();
    let pkg = npm("left-pad", "1.3.0");
    backend.ingest_package(&ctx(), &pkg).unwrap();
    backend
        .ingest_licenses(&ctx(), &[listed("MIT"), listed("Apache-2.0")])
        .unwrap();
    let declared = [listed("MIT"), listed("MIT"), listed("Apache-2.0")];
    let id = backend
        .ingest_certify_legal(&ctx(), &PackageOrSourceInput::package(pkg), &declared, &[], &legal(1))
        .unwrap();

    let query = |filters: Vec<LicenseSpec>| {
        let spec = CertifyLegalSpec {
            declared_licenses: filters,
            ..CertifyLegalSpec::default()
        };
        backend
            .certify_legal(&ctx(), &spec)
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect::<Vec<_>>()
    };

    // Name-only filters resolve nothing exactly and go through field comparison.
    let mit = || LicenseSpec::name("MIT");
    assert_eq!(query(vec![mit()]), [id.clone()]);
    assert_eq!(query(vec![mit(), mit()]), [id.clone()]);
    assert_eq!(query(vec![mit(), mit(), LicenseSpec::name("Apache-2.0")]), [id.clone()]);
    assert!(query(vec![mit(), mit(), mit()]).is_empty());

    // Listed filters resolve to one stored license each.
    let mit = || LicenseSpec::listed("MIT", "3.21");
    assert_eq!(query(vec![mit()]), [id.clone()]);
    assert_eq!(query(vec![mit(), mit()]), [id.clone()]);
    assert!(query(vec![mit(), mit(), mit()]).is_empty());

    let found = backend.certify_legal(&ctx(), &CertifyLegalSpec::default()).unwrap();
    assert_eq!(found[0].declared_licenses.len(), 3);
}
