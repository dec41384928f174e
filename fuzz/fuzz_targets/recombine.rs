#![no_main]

use arbitrary::Arbitrary;
use blockproof::{
    proof::{generate, ProveError, Verifier},
    Commitment, NodeHasher, Sha3Hasher,
};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Run {
    blocks: Vec<Vec<u8>>,
    index: u16,
    extra: u8,
}

fuzz_target!(|run: Run| {
    let Run {
        blocks,
        index,
        extra,
    } = run;
    if blocks.is_empty() || blocks.len() > 512 {
        return;
    }

    let commitment = Commitment::from_contents::<Sha3Hasher, _, _>(&blocks).unwrap();
    let root = commitment.root();
    let index = index as usize % blocks.len();
    let block = &commitment.block_metadata[index];

    let proof =
        generate::<Sha3Hasher>(&block.hash, &block.authentication_path, index as u64, &root)
            .unwrap();
    let verifier = Verifier::<Sha3Hasher>::default();
    assert!(verifier
        .verify(&proof, &block.hash, &root, commitment.path_length())
        .is_accept());

    let mut tampered = blocks[index].clone();
    tampered.push(extra);
    let leaf = Sha3Hasher::hash_leaf(&tampered);
    assert!(matches!(
        generate::<Sha3Hasher>(&leaf, &block.authentication_path, index as u64, &root),
        Err(ProveError::RootMismatch { .. })
    ));
});
