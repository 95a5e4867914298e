use criterion::measurement::Measurement;
use criterion::{criterion_group, criterion_main, BenchmarkGroup, Criterion};

use threshold_pre::{
    decapsulate_reencrypted, decrypt_original, decrypt_reencrypted, encapsulate, encrypt,
    generate_keypair, open, reencrypt, split_rekey, verify, CapsuleFrag, VerifiedCapsuleFrag,
};

fn bench_kem<'a, M: Measurement>(group: &mut BenchmarkGroup<'a, M>) {
    let alice = generate_keypair();
    let bob = generate_keypair();

    group.bench_function("generate_keypair", |b| b.iter(generate_keypair));

    // Encapsulation

    group.bench_function("encapsulate", |b| {
        b.iter(|| encapsulate(&alice.public_key()))
    });

    // Opening with the original key

    let (capsule, _key) = encapsulate(&alice.public_key());
    group.bench_function("open", |b| b.iter(|| open(&capsule, alice.secret_key())));

    // Key splitting

    let threshold: usize = 2;
    let shares: usize = threshold + 1;

    group.bench_function("split_rekey", |b| {
        b.iter(|| split_rekey(alice.secret_key(), &bob.public_key(), threshold, shares))
    });

    // Reencryption and verification

    let kfrags = split_rekey(alice.secret_key(), &bob.public_key(), threshold, shares).unwrap();

    group.bench_function("reencrypt", |b| {
        b.iter(|| reencrypt(&capsule, &kfrags[0]))
    });

    let cfrags: Vec<VerifiedCapsuleFrag> = kfrags[0..threshold]
        .iter()
        .map(|kfrag| reencrypt(&capsule, kfrag).unwrap())
        .collect();
    let commitment = kfrags[0].commitment();
    let received: CapsuleFrag = cfrags[0].clone().unverify();

    group.bench_function("verify", |b| {
        b.iter(|| {
            verify(
                &received,
                &capsule,
                &alice.public_key(),
                &bob.public_key(),
                &commitment,
            )
        })
    });

    // Combination

    group.bench_function("decapsulate_reencrypted", |b| {
        b.iter(|| {
            decapsulate_reencrypted(
                bob.secret_key(),
                &alice.public_key(),
                &capsule,
                &cfrags,
                threshold,
            )
        })
    });
}

fn bench_dem<'a, M: Measurement>(group: &mut BenchmarkGroup<'a, M>) {
    let alice = generate_keypair();
    let bob = generate_keypair();
    let plaintext = b"peace at dawn";

    group.bench_function("encrypt", |b| {
        b.iter(|| encrypt(&alice.public_key(), &plaintext[..]))
    });

    let (capsule, ciphertext) = encrypt(&alice.public_key(), plaintext).unwrap();
    group.bench_function("decrypt_original", |b| {
        b.iter(|| decrypt_original(alice.secret_key(), &capsule, &ciphertext[..]))
    });

    let threshold: usize = 2;
    let kfrags =
        split_rekey(alice.secret_key(), &bob.public_key(), threshold, threshold + 1).unwrap();
    let cfrags: Vec<VerifiedCapsuleFrag> = kfrags[0..threshold]
        .iter()
        .map(|kfrag| reencrypt(&capsule, kfrag).unwrap())
        .collect();

    group.bench_function("decrypt_reencrypted", |b| {
        b.iter(|| {
            decrypt_reencrypted(
                bob.secret_key(),
                &alice.public_key(),
                &capsule,
                &cfrags,
                threshold,
                &ciphertext,
            )
        })
    });
}

fn group_kem(c: &mut Criterion) {
    let mut group = c.benchmark_group("KEM");
    bench_kem(&mut group);
    group.finish();
}

fn group_dem(c: &mut Criterion) {
    let mut group = c.benchmark_group("DEM");
    bench_dem(&mut group);
    group.finish();
}

criterion_group!(benches, group_kem, group_dem);
criterion_main!(benches);
