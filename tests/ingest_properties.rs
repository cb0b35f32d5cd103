//! Property tests: ingest is idempotent and independent of input order.

mod common;

use common::{backend, ctx};
use guac_kv::model::{PackageQualifierInputSpec, PkgInputSpec, PkgSpec};
use proptest::prelude::*;

fn arb_package() -> impl Strategy<Value = PkgInputSpec> {
    (
        prop::sample::select(vec!["npm", "pypi", "maven"]),
        prop::sample::select(vec!["", "org", "com.example"]),
        "[a-z]{1,6}",
        "[0-9]\\.[0-9]",
        prop::collection::vec(("[a-c]", "[x-z]"), 0..3),
    )
        .prop_map(|(ty, ns, name, version, qualifiers)| {
            let mut pkg = PkgInputSpec::new(ty, ns, name).with_version(version);
            pkg.qualifiers = qualifiers
                .into_iter()
                .map(|(key, value)| PackageQualifierInputSpec { key, value })
                .collect();
            pkg
        })
}

fn version_ids(backend: &guac_kv::KvBackend) -> usize {
    backend
        .packages(&ctx(), &PkgSpec::default())
        .unwrap()
        .iter()
        .map(|p| p.version_ids().len())
        .sum()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_reingest_returns_same_ids(pkgs in prop::collection::vec(arb_package(), 1..12)) {
        let backend = backend();
        let first = backend.ingest_packages(&ctx(), &pkgs).unwrap();
        let second = backend.ingest_packages(&ctx(), &pkgs).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_order_does_not_change_the_graph(pkgs in prop::collection::vec(arb_package(), 1..12)) {
        let forward = backend();
        forward.ingest_packages(&ctx(), &pkgs).unwrap();

        let mut reversed_input = pkgs.clone();
        reversed_input.reverse();
        let reversed = backend();
        reversed.ingest_packages(&ctx(), &reversed_input).unwrap();

        prop_assert_eq!(version_ids(&forward), version_ids(&reversed));
    }

    #[test]
    fn prop_qualifier_order_is_irrelevant(pkg in arb_package()) {
        let backend = backend();
        let mut shuffled = pkg.clone();
        shuffled.qualifiers.reverse();
        let a = backend.ingest_package(&ctx(), &pkg).unwrap();
        let b = backend.ingest_package(&ctx(), &shuffled).unwrap();
        prop_assert_eq!(a.package_version_id, b.package_version_id);
    }
}
