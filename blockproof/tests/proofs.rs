mod common;

use blockproof::{
    decode_proof, encode_proof,
    proof::{generate, MalformedProof, ProveError, RejectReason, Verdict, Verifier},
    verify_document, AuthPath, Digest, MerkleTree, NodeHasher, Sha3Hasher,
};
use hex_literal::hex;
use quickcheck::{quickcheck, TestResult};

fn flip_hex_char(digest: &Digest, pos: usize) -> Digest {
    let mut hex = digest.to_hex().into_bytes();
    hex[pos] = if hex[pos] == b'0' { b'1' } else { b'0' };
    Digest::from_hex(std::str::from_utf8(&hex).unwrap()).unwrap()
}

#[test]
fn eight_leaf_tree_by_hand() {
    let h = [
        Digest(hex!("85feb08e76963557e4a06bca3adf3f81a152f1dc4a10592e7766c5bfb2b8b909")),
        Digest(hex!("4d5020599e2b3dcf8bc998e2fe909c09715fcb4926b0abe89b4ddee56cfe56f6")),
        Digest(hex!("6f57c0820c284bee05d264b165591da71d8dda3570d9a0eb3e6236c0fdb8e196")),
        Digest(hex!("5416f62d9b723cce07c1dc02ab44a0db33338b3eac9ea953972aeaf878d1a3e5")),
        Digest(hex!("8457145f6dd01715d20e3d93c35a20205df85950d7e128a883e96ae782f21db4")),
        Digest(hex!("567ad14498aefa582fa82a7231b57e52945147fa94fdab3df6ad3407d0b51529")),
        Digest(hex!("225a41b253d15ee0798696afd91ce07e6094649eeb0996fac552d52a9cfd7bdf")),
        Digest(hex!("df5475d52d8f3d9d0ba2d1dc8564486dfabad619d2979405466fb8006181ec6f")),
    ];
    let node = Sha3Hasher::hash_internal;

    let h01 = node(&h[0], &h[1]);
    let h23 = node(&h[2], &h[3]);
    let h45 = node(&h[4], &h[5]);
    let h67 = node(&h[6], &h[7]);
    let h0123 = node(&h01, &h23);
    let h4567 = node(&h45, &h67);
    let root = node(&h0123, &h4567);
    assert_eq!(
        root,
        Digest(hex!(
            "601c63c79768225e87e670f70670728aba43d4bb2219ee6703ae6139f3f5a2c0"
        ))
    );

    let tree = MerkleTree::build::<Sha3Hasher>(h.to_vec()).unwrap();
    assert_eq!(tree.root(), root);

    let path = tree.authentication_path(3).unwrap();
    assert_eq!(path, AuthPath(vec![h[2], h01, h4567]));

    let proof = generate::<Sha3Hasher>(&h[3], &path, 3, &root).unwrap();
    assert_eq!(
        Verifier::<Sha3Hasher>::default().verify(&proof, &h[3], &root, 3),
        Verdict::Accept
    );

    let tampered = Digest(hex!(
        "5416f62d9b023cce07c1dc02ab44a0db33338b3eac9ea953972aeaf878d1a3e5"
    ));
    assert_eq!(tampered, flip_hex_char(&h[3], 10));
    match generate::<Sha3Hasher>(&tampered, &path, 3, &root) {
        Err(ProveError::RootMismatch { expected, computed }) => {
            assert_eq!(expected, root);
            assert_ne!(computed, root);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn altered_leaf_hash_is_a_root_mismatch() {
    let c = common::commit(&common::dataset(8));
    let root = c.root();
    for (i, block) in c.block_metadata.iter().enumerate() {
        for pos in [0, 31, 63] {
            let altered = flip_hex_char(&block.hash, pos);
            match generate::<Sha3Hasher>(&altered, &block.authentication_path, i as u64, &root) {
                Err(ProveError::RootMismatch { expected, .. }) => assert_eq!(expected, root),
                other => panic!("block {} pos {}: unexpected {:?}", i, pos, other),
            }
        }
    }
}

#[test]
fn altered_sibling_is_rejected() {
    let c = common::commit(&common::dataset(8));
    let root = c.root();
    let block = &c.block_metadata[6];
    let proof =
        generate::<Sha3Hasher>(&block.hash, &block.authentication_path, 6, &root).unwrap();
    let verifier = Verifier::<Sha3Hasher>::default();

    for level in 0..3 {
        let mut forged = proof.clone();
        forged.auth_path.0[level] = flip_hex_char(&forged.auth_path.0[level], 5);
        let verdict = verifier.verify(&forged, &block.hash, &root, 3);
        assert!(!verdict.is_accept(), "level {}", level);
    }

    // a prover handed the altered path cannot produce a proof at all.
    let mut path = block.authentication_path.clone();
    path.0[2] = flip_hex_char(&path.0[2], 40);
    assert!(matches!(
        generate::<Sha3Hasher>(&block.hash, &path, 6, &root),
        Err(ProveError::RootMismatch { .. })
    ));
}

#[test]
fn proof_documents_survive_transport() {
    let c = common::commit(&common::dataset(32));
    let root = c.root();
    let block = &c.block_metadata[19];
    let proof =
        generate::<Sha3Hasher>(&block.hash, &block.authentication_path, 19, &root).unwrap();

    let json = encode_proof(&proof).unwrap();
    assert_eq!(decode_proof(&json).unwrap(), proof);
    assert_eq!(
        verify_document::<Sha3Hasher>(&json, &block.hash, &root, 5).unwrap(),
        Verdict::Accept
    );

    // the same document claimed for another block.
    let other = &c.block_metadata[20];
    assert_eq!(
        verify_document::<Sha3Hasher>(&json, &other.hash, &root, 5).unwrap(),
        Verdict::Reject(RejectReason::Malformed(MalformedProof::LeafMismatch))
    );

    assert!(verify_document::<Sha3Hasher>("{\"leaf_hash\":1}", &block.hash, &root, 5).is_err());
}

#[test]
fn tampered_content_never_verifies() {
    fn prop(blocks: u8, index: u8, byte: u8, bit: u8) -> TestResult {
        let n = blocks as usize % 64 + 1;
        let index = index as usize % n;
        let mut contents = common::dataset(n);
        let c = common::commit(&contents);

        let target = &mut contents[index];
        let pos = byte as usize % target.len();
        target[pos] ^= 1 << (bit % 8);
        let leaf = Sha3Hasher::hash_leaf(target);

        let block = &c.block_metadata[index];
        let proved =
            generate::<Sha3Hasher>(&leaf, &block.authentication_path, index as u64, &c.root());
        TestResult::from_bool(matches!(proved, Err(ProveError::RootMismatch { .. })))
    }

    quickcheck(prop as fn(u8, u8, u8, u8) -> TestResult);
}
