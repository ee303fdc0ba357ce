use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use seedgate_core::tee::{AttestationPolicy, EnclaveMeasurement, ReportSigner, RevocationList};
use seedgate_core::{
    EnclaveKeyPair, RegistrationConfig, RegistrationService, SeedIssuer, SeedMaterial, SeedStore,
};

fn bench_registration(c: &mut Criterion) {
    let store = Arc::new(SeedStore::generate(chrono::Duration::days(7)));
    store.initialize(SeedMaterial::generate()).unwrap();
    let node = EnclaveKeyPair::generate();
    let generation = store.current_seed().unwrap();

    c.bench_function("encrypt_for", |b| {
        b.iter(|| store.encrypt_for(&generation.seed, &node.public_key()).unwrap())
    });

    let signer = ReportSigner::generate();
    let measurement = EnclaveMeasurement::compute("seedgate-enclave", "seedgate-signer", 1);
    let cert = signer
        .attest(&measurement, &node.public_key(), b"bench-platform")
        .unwrap();
    let config = RegistrationConfig {
        attestation: AttestationPolicy::trusting(&signer.verifying_key()),
        ..RegistrationConfig::default()
    };
    let service =
        RegistrationService::with_signed_reports(config, store.clone(), RevocationList::new())
            .unwrap();
    let runtime = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("verify_and_issue", |b| {
        b.to_async(&runtime)
            .iter(|| async { service.register(cert.clone()).await.unwrap() })
    });
}

criterion_group!(benches, bench_registration);
criterion_main!(benches);
