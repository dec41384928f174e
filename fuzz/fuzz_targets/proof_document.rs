#![no_main]

use arbitrary::Arbitrary;
use blockproof::{verify_document, Digest, Sha3Hasher};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Run {
    document: String,
    leaf: [u8; 32],
    root: [u8; 32],
    path_length: u8,
}

fuzz_target!(|run: Run| {
    let _ = verify_document::<Sha3Hasher>(
        &run.document,
        &Digest(run.leaf),
        &Digest(run.root),
        run.path_length as usize,
    );
});
