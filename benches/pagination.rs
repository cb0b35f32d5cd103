use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use guac_kv::model::{
    ArtifactInputSpec, ArtifactSpec, CertifyLegalInputSpec, CertifyLegalSpec, IdOrArtifactInput,
    IdOrLicenseInput, LicenseInputSpec, LicenseSpec, PackageOrSourceInputs, PkgInputSpec,
};
use guac_kv::{Context, KvBackend};

fn seeded_artifacts(n: usize) -> KvBackend {
    let backend = KvBackend::in_memory();
    let inputs: Vec<IdOrArtifactInput> = (0..n)
        .map(|i| ArtifactInputSpec::new("sha256", format!("{i:064x}")).into())
        .collect();
    backend
        .ingest_artifacts(&Context::background(), &inputs)
        .expect("seed artifacts");
    backend
}

/// `n` packages, each with a legal certification naming MIT.
fn seeded_legals(n: usize) -> KvBackend {
    let ctx = Context::background();
    let backend = KvBackend::in_memory();
    let pkgs: Vec<PkgInputSpec> = (0..n)
        .map(|i| PkgInputSpec::new("npm", "", format!("pkg-{i}")).with_version("1.0.0"))
        .collect();
    backend.ingest_packages(&ctx, &pkgs).expect("seed packages");
    let mit: IdOrLicenseInput = LicenseInputSpec::listed("MIT", "3.21").into();
    backend.ingest_license(&ctx, &mit).expect("seed license");

    let subjects = PackageOrSourceInputs {
        packages: pkgs.into_iter().map(Into::into).collect(),
        sources: Vec::new(),
    };
    let legal = CertifyLegalInputSpec {
        time_scanned: chrono::Utc::now(),
        ..CertifyLegalInputSpec::default()
    };
    backend
        .ingest_certify_legals(&ctx, &subjects, &vec![vec![mit]; n], &vec![Vec::new(); n], &vec![legal; n])
        .expect("seed legals");
    backend
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_pagination");
    for n in [256_usize, 2048] {
        let backend = seeded_artifacts(n);
        let ctx = Context::background();
        let spec = ArtifactSpec {
            algorithm: Some("sha256".to_string()),
            ..ArtifactSpec::default()
        };
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("first_page", n), &n, |b, _| {
            b.iter(|| backend.artifacts_list(&ctx, &spec, None, Some(50)).expect("page"));
        });
        group.bench_with_input(BenchmarkId::new("walk_all", n), &n, |b, _| {
            b.iter(|| {
                let mut after: Option<String> = None;
                loop {
                    let page = backend
                        .artifacts_list(&ctx, &spec, after.as_deref(), Some(50))
                        .expect("page");
                    if !page.page_info.has_next_page {
                        break;
                    }
                    after = page.page_info.end_cursor;
                }
            });
        });
    }
    group.finish();
}

fn bench_candidates(c: &mut Criterion) {
    let mut group = c.benchmark_group("candidate_pagination");
    for n in [64_usize, 512] {
        let backend = seeded_legals(n);
        let ctx = Context::background();
        let spec = CertifyLegalSpec {
            declared_licenses: vec![LicenseSpec::listed("MIT", "3.21")],
            ..CertifyLegalSpec::default()
        };
        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("by_license", n), &n, |b, _| {
            b.iter(|| backend.certify_legal_list(&ctx, &spec, None, Some(50)).expect("page"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_scan, bench_candidates);
criterion_main!(benches);
