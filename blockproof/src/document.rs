//! Proof documents.
//!
//! Proofs cross process boundaries as JSON. Decoding is the only place a proof can be
//! structurally impossible; everything that decodes is judged by the verifier.

use blockproof_core::{
    proof::{Proof, Verdict},
    Digest, NodeHasher,
};

use crate::error::ProofMalformed;

/// Encode a proof as a JSON document.
pub fn encode_proof(proof: &Proof) -> serde_json::Result<String> {
    serde_json::to_string(proof)
}

/// Decode a proof from a JSON document.
pub fn decode_proof(json: &str) -> Result<Proof, ProofMalformed> {
    Ok(serde_json::from_str(json)?)
}

/// Decode a proof document and verify it.
pub fn verify_document<H: NodeHasher>(
    json: &str,
    expected_leaf_hash: &Digest,
    expected_root: &Digest,
    expected_path_length: usize,
) -> Result<Verdict, ProofMalformed> {
    let proof = decode_proof(json)?;
    Ok(proof.verify::<H>(expected_leaf_hash, expected_root, expected_path_length))
}

#[cfg(test)]
mod tests {
    use super::{decode_proof, encode_proof, verify_document};
    use blockproof_core::{
        proof::{generate, RejectReason, Verdict},
        MerkleTree, NodeHasher, Sha3Hasher,
    };

    fn proof_json() -> (String, MerkleTree, blockproof_core::Digest) {
        let leaves: Vec<_> = (0..4u8).map(|i| Sha3Hasher::hash_leaf(&[i])).collect();
        let tree = MerkleTree::build::<Sha3Hasher>(leaves.clone()).unwrap();
        let path = tree.authentication_path(2).unwrap();
        let proof = generate::<Sha3Hasher>(&leaves[2], &path, 2, &tree.root()).unwrap();
        (encode_proof(&proof).unwrap(), tree, leaves[2])
    }

    #[test]
    fn document_layout() {
        let (json, tree, leaf) = proof_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["leaf_hash"], leaf.to_hex());
        assert_eq!(value["root_hash"], tree.root().to_hex());
        assert_eq!(value["leaf_index"], 2);
        let data = &value["proof_data"];
        assert_eq!(data["trace_length"], 3);
        assert_eq!(data["constraint_count"], 6);
        assert_eq!(data["auxiliary_digests"].as_array().unwrap().len(), 3);
        assert_eq!(data["execution_trace"][0]["operation"], "initialize");
        assert_eq!(data["execution_trace"][1]["operation"], "hash_combine");
        assert_eq!(data["constraints"][0]["type"], "hash_correctness");
        assert_eq!(data["constraints"][2]["type"], "child_position");
    }

    #[test]
    fn verdict_survives_round_trip() {
        let (json, tree, leaf) = proof_json();
        assert_eq!(
            verify_document::<Sha3Hasher>(&json, &leaf, &tree.root(), 2).unwrap(),
            Verdict::Accept
        );
        let decoded = decode_proof(&json).unwrap();
        assert_eq!(encode_proof(&decoded).unwrap(), json);
    }

    #[test]
    fn edited_document_rejected() {
        let (json, tree, leaf) = proof_json();
        let sibling = decode_proof(&json).unwrap().auth_path.0[0];
        let forged = json.replacen(&sibling.to_hex(), &"0".repeat(64), 1);
        let verdict = verify_document::<Sha3Hasher>(&forged, &leaf, &tree.root(), 2).unwrap();
        assert!(matches!(
            verdict,
            Verdict::Reject(RejectReason::TraceInconsistent { .. })
        ));
    }

    #[test]
    fn malformed_documents() {
        let (json, tree, leaf) = proof_json();
        assert!(decode_proof("{}").is_err());
        assert!(decode_proof("not json").is_err());

        // uppercase digests are not canonical.
        let upper = json.replacen(&leaf.to_hex(), &leaf.to_hex().to_uppercase(), 1);
        assert!(verify_document::<Sha3Hasher>(&upper, &leaf, &tree.root(), 2).is_err());

        let truncated = &json[..json.len() / 2];
        assert!(decode_proof(truncated).is_err());
    }
}
