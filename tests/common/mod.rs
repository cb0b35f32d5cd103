//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Once;

use chrono::{DateTime, TimeZone, Utc};
use guac_kv::model::{CertifyLegalInputSpec, IdOrLicenseInput, LicenseInputSpec, PkgInputSpec};
use guac_kv::{Context, KvBackend};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("guac_kv=warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_test_writer()
            .try_init();
    });
}

pub fn ctx() -> Context {
    Context::background()
}

pub fn backend() -> KvBackend {
    init_tracing();
    KvBackend::in_memory()
}

pub fn scanned_at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, day, 0, 0, 0).unwrap()
}

pub fn npm(name: &str, version: &str) -> PkgInputSpec {
    PkgInputSpec::new("npm", "", name).with_version(version)
}

pub fn listed(name: &str) -> IdOrLicenseInput {
    LicenseInputSpec::listed(name, "3.21").into()
}

pub fn legal(day: u32) -> CertifyLegalInputSpec {
    CertifyLegalInputSpec {
        time_scanned: scanned_at(day),
        collector: "scancode".to_string(),
        ..CertifyLegalInputSpec::default()
    }
}
