#![cfg(feature = "benchmarks")]

use criterion::{black_box, BenchmarkId, Criterion};

use crate::{
    commitment::Commitment,
    sampler::{self, Seed},
};
use blockproof_core::{
    proof::{Prover, Verifier},
    Digest, MerkleTree, NodeHasher, Sha3Hasher,
};

pub fn audit_benchmark(c: &mut Criterion) {
    tree_build_benchmark(c);
    prove_benchmark(c);
    verify_benchmark(c);
    select_benchmark(c);
}

fn contents(n: usize) -> Vec<Vec<u8>> {
    (0..n).map(|i| format!("block {}", i).into_bytes()).collect()
}

fn leaves(n: usize) -> Vec<Digest> {
    contents(n).iter().map(|c| Sha3Hasher::hash_leaf(c)).collect()
}

fn tree_build_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    for n in [64usize, 1024, 16384] {
        let leaves = leaves(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &leaves, |b, leaves| {
            b.iter(|| MerkleTree::build::<Sha3Hasher>(black_box(leaves.clone())))
        });
    }
    group.finish();
}

fn prove_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("prove");
    let prover = Prover::<Sha3Hasher>::default();
    for n in [64u64, 1024, 16384] {
        let commitment =
            Commitment::from_contents::<Sha3Hasher, _, _>(contents(n as usize)).unwrap();
        let root = commitment.root();
        let block = &commitment.block_metadata[(n / 2) as usize];
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                prover.generate(
                    black_box(&block.hash),
                    &block.authentication_path,
                    n / 2,
                    &root,
                )
            })
        });
    }
    group.finish();
}

fn verify_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("verify");
    let prover = Prover::<Sha3Hasher>::default();
    let verifier = Verifier::<Sha3Hasher>::default();
    for n in [64u64, 1024, 16384] {
        let commitment =
            Commitment::from_contents::<Sha3Hasher, _, _>(contents(n as usize)).unwrap();
        let root = commitment.root();
        let block = &commitment.block_metadata[(n / 2) as usize];
        let proof = prover
            .generate(&block.hash, &block.authentication_path, n / 2, &root)
            .unwrap();
        let path_length = commitment.path_length();
        group.bench_function(BenchmarkId::from_parameter(n), |b| {
            b.iter(|| verifier.verify(black_box(&proof), &block.hash, &root, path_length))
        });
    }
    group.finish();
}

fn select_benchmark(c: &mut Criterion) {
    let seed: Seed = sampler::derive_seed("bench", "upload", "2024-01-01T00:00:00Z");
    let mut group = c.benchmark_group("select");
    for (total, n) in [(1_000u64, 59u64), (100_000, 459), (10_000_000, 2_995)] {
        group.bench_with_input(
            BenchmarkId::new(total.to_string(), n),
            &(total, n),
            |b, &(total, n)| b.iter(|| sampler::select(total, black_box(&seed), n)),
        );
    }
    group.finish();
}
