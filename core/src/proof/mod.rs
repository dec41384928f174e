//! Integrity proofs and proof verification.
//!
//! An integrity proof attests that a single leaf recombines, through its authentication path,
//! into a committed root. The recombination is recorded step by step as an [`ExecutionTrace`],
//! and a fixed checklist of three [`Constraint`]s is derived for every combining step:
//!
//!   1. `hash_correctness`: the parent preimage is the order-dependent concatenation of the
//!      current node and its sibling, and the parent is the hash of that preimage.
//!   2. `index_progression`: the index after the step is the index before it, halved.
//!   3. `child_position`: the node was a left child exactly when the index before the step was
//!      even.
//!
//! Proofs also carry protocol metadata (security level, blowup factor, query count, FRI layer
//! count and three auxiliary digests). These are descriptive constants. They add no soundness
//! beyond the collision resistance of the node hash, and verification only checks that they meet
//! minimum values.
//!
//! Use [`generate`] to produce a proof and [`verify`] to check one.

pub use prover::{generate, ProveError, Prover};
pub use trace::{
    derive_constraints, record_trace, CombineStep, Constraint, ConstraintKind, ExecutionTrace,
    TraceStep,
};
pub use verifier::{
    verify, MalformedProof, RejectReason, Verdict, Verifier, MIN_BLOWUP_FACTOR, MIN_NUM_QUERIES,
};

mod prover;
mod trace;
mod verifier;

use crate::{hasher::Digest, tree::AuthPath};

use alloc::vec::Vec;

/// Number of auxiliary digests carried in [`ProofData`].
pub const AUXILIARY_DIGESTS: usize = 3;

/// The maximum authentication path length supported by proofs. Leaf indices are 64-bit.
pub const MAX_PATH_LEN: usize = 64;

/// Protocol parameters attached to every proof as metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofParameters {
    /// Claimed security level in bits.
    pub security_level: u32,
    /// Claimed evaluation domain blowup factor.
    pub blowup_factor: u32,
    /// Claimed number of queries.
    pub num_queries: u32,
    /// Claimed number of folding layers.
    pub fri_layers: u32,
}

impl Default for ProofParameters {
    fn default() -> Self {
        ProofParameters {
            security_level: 128,
            blowup_factor: 8,
            num_queries: 32,
            fri_layers: 6,
        }
    }
}

/// The trace, constraints and metadata of a proof.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProofData {
    /// The recorded recombination, step 0 first.
    pub execution_trace: ExecutionTrace,
    /// Three constraints per combining step, in step order.
    pub constraints: Vec<Constraint>,
    pub security_level: u32,
    /// The number of trace steps, including step 0.
    pub trace_length: u32,
    pub constraint_count: u32,
    pub blowup_factor: u32,
    pub num_queries: u32,
    pub fri_layers: u32,
    pub auxiliary_digests: [Digest; AUXILIARY_DIGESTS],
}

impl ProofData {
    /// The protocol parameters recorded in this proof.
    pub fn parameters(&self) -> ProofParameters {
        ProofParameters {
            security_level: self.security_level,
            blowup_factor: self.blowup_factor,
            num_queries: self.num_queries,
            fri_layers: self.fri_layers,
        }
    }
}

/// A proof that a leaf belongs to a committed block tree.
///
/// Created per verification attempt. Expected to be serializable.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    feature = "borsh",
    derive(borsh::BorshDeserialize, borsh::BorshSerialize)
)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Proof {
    /// The leaf the proof is about.
    pub leaf_hash: Digest,
    /// The authentication path of the leaf.
    pub auth_path: AuthPath,
    /// The root the prover was asked to prove against.
    pub root_hash: Digest,
    /// The position of the leaf in the leaf level.
    pub leaf_index: u64,
    pub proof_data: ProofData,
}

impl Proof {
    /// Verify this proof against out-of-band expectations. See [`verify`].
    pub fn verify<H: crate::hasher::NodeHasher>(
        &self,
        expected_leaf_hash: &Digest,
        expected_root: &Digest,
        expected_path_length: usize,
    ) -> Verdict {
        verify::<H>(self, expected_leaf_hash, expected_root, expected_path_length)
    }
}
