//! Proof verification.
//!
//! Verification is a single pass through a fixed sequence of stages. Each stage either passes
//! the proof on to the next or rejects it with a reason:
//!
//! ```text
//! Start -> StructureChecked -> TraceReplayed -> ConstraintsChecked
//!       -> ParametersChecked -> RootRecomputed -> Accept
//! ```
//!
//! A rejection is a normal outcome, not an error. Nothing stored in the proof is trusted: the
//! trace and constraints are recomputed from the proof's leaf, index and authentication path and
//! compared with what the proof carries, and the final root comparison is against the root the
//! caller expects, never the root embedded in the proof.

use super::{
    prover::check_index,
    trace::{derive_constraints, record_trace},
    ConstraintKind, Proof, ProveError, MAX_PATH_LEN,
};
use crate::hasher::{Digest, NodeHasher};

use core::{fmt, marker::PhantomData};

/// The minimum number of queries a proof must claim.
pub const MIN_NUM_QUERIES: u32 = 16;

/// The minimum blowup factor a proof must claim.
pub const MIN_BLOWUP_FACTOR: u32 = 4;

/// The outcome of verifying a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Every stage passed.
    Accept,
    /// Some stage failed.
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    /// The reason for rejection, if rejected.
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            Verdict::Accept => None,
            Verdict::Reject(reason) => Some(*reason),
        }
    }
}

/// Why a proof was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The proof does not have the shape the caller expects.
    Malformed(MalformedProof),
    /// A recorded trace step differs from its independent recomputation.
    TraceInconsistent { step: u32 },
    /// A recorded constraint is unsatisfied or differs from its recomputation.
    ConstraintViolation { step: u32, kind: ConstraintKind },
    /// The protocol metadata is below the minimum parameters.
    SecurityThresholdViolation { num_queries: u32, blowup_factor: u32 },
    /// The recomputed root differs from the committed root. This is the tamper signal.
    RootMismatch,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Malformed(m) => write!(f, "malformed proof: {}", m),
            RejectReason::TraceInconsistent { step } => {
                write!(f, "trace inconsistent at step {}", step)
            }
            RejectReason::ConstraintViolation { step, kind } => {
                write!(f, "constraint {:?} violated at step {}", kind, step)
            }
            RejectReason::SecurityThresholdViolation {
                num_queries,
                blowup_factor,
            } => write!(
                f,
                "parameters below minimum: {} queries (min {}), blowup {} (min {})",
                num_queries, MIN_NUM_QUERIES, blowup_factor, MIN_BLOWUP_FACTOR
            ),
            RejectReason::RootMismatch => f.write_str("recomputed root does not match commitment"),
        }
    }
}

impl From<ProveError> for RejectReason {
    /// The verdict a proof would have received had the prover not refused to produce it.
    fn from(err: ProveError) -> Self {
        match err {
            ProveError::PathTooLong { len } => RejectReason::Malformed(MalformedProof::PathLength {
                expected: MAX_PATH_LEN,
                actual: len,
            }),
            ProveError::IndexOutOfRange { index, .. } => {
                RejectReason::Malformed(MalformedProof::IndexOutOfRange { index })
            }
            ProveError::ConstraintViolation { step, kind } => {
                RejectReason::ConstraintViolation { step, kind }
            }
            ProveError::RootMismatch { .. } => RejectReason::RootMismatch,
        }
    }
}

/// Structural problems with a proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedProof {
    /// The proof is about a different leaf than expected.
    LeafMismatch,
    /// The authentication path has the wrong length.
    PathLength { expected: usize, actual: usize },
    /// The leaf index cannot address a leaf of a tree with this path length.
    IndexOutOfRange { index: u64 },
    /// The trace does not have one step per path element plus step 0.
    TraceLength { expected: usize, actual: usize },
    /// The constraint list does not have three constraints per combining step.
    ConstraintCount { expected: usize, actual: usize },
    /// The recorded trace length or constraint count disagrees with the proof contents.
    CountMismatch,
}

impl fmt::Display for MalformedProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedProof::LeafMismatch => f.write_str("leaf hash does not match expected leaf"),
            MalformedProof::PathLength { expected, actual } => write!(
                f,
                "authentication path length {} (expected {})",
                actual, expected
            ),
            MalformedProof::IndexOutOfRange { index } => {
                write!(f, "leaf index {} out of range for path", index)
            }
            MalformedProof::TraceLength { expected, actual } => {
                write!(f, "trace length {} (expected {})", actual, expected)
            }
            MalformedProof::ConstraintCount { expected, actual } => {
                write!(f, "constraint count {} (expected {})", actual, expected)
            }
            MalformedProof::CountMismatch => {
                f.write_str("recorded counts disagree with proof contents")
            }
        }
    }
}

/// Verifies integrity proofs against minimum protocol parameters.
pub struct Verifier<H> {
    min_num_queries: u32,
    min_blowup_factor: u32,
    _marker: PhantomData<H>,
}

impl<H: NodeHasher> Default for Verifier<H> {
    fn default() -> Self {
        Verifier {
            min_num_queries: MIN_NUM_QUERIES,
            min_blowup_factor: MIN_BLOWUP_FACTOR,
            _marker: PhantomData,
        }
    }
}

impl<H: NodeHasher> Verifier<H> {
    /// Create a verifier with stricter minimums. Values below the protocol minimums are raised
    /// to them.
    pub fn with_minimums(min_num_queries: u32, min_blowup_factor: u32) -> Self {
        Verifier {
            min_num_queries: min_num_queries.max(MIN_NUM_QUERIES),
            min_blowup_factor: min_blowup_factor.max(MIN_BLOWUP_FACTOR),
            _marker: PhantomData,
        }
    }

    /// Verify a proof.
    ///
    /// `expected_leaf_hash` is the hash of the block as it is now, `expected_root` the committed
    /// root, and `expected_path_length` the height of the committed tree minus one. All three come
    /// from outside the proof.
    pub fn verify(
        &self,
        proof: &Proof,
        expected_leaf_hash: &Digest,
        expected_root: &Digest,
        expected_path_length: usize,
    ) -> Verdict {
        match self.run(proof, expected_leaf_hash, expected_root, expected_path_length) {
            Ok(()) => Verdict::Accept,
            Err(reason) => Verdict::Reject(reason),
        }
    }

    fn run(
        &self,
        proof: &Proof,
        expected_leaf_hash: &Digest,
        expected_root: &Digest,
        expected_path_length: usize,
    ) -> Result<(), RejectReason> {
        check_structure(proof, expected_leaf_hash, expected_path_length)
            .map_err(RejectReason::Malformed)?;

        // trace replay.
        let replayed = record_trace::<H>(&proof.leaf_hash, proof.leaf_index, &proof.auth_path);
        let recorded = &proof.proof_data.execution_trace;
        if let Some((fresh, _)) = replayed
            .steps()
            .iter()
            .zip(recorded.steps())
            .find(|(fresh, stored)| fresh != stored)
        {
            return Err(RejectReason::TraceInconsistent { step: fresh.step() });
        }

        // constraints.
        let recomputed = derive_constraints::<H>(&replayed);
        for (fresh, stored) in recomputed.iter().zip(&proof.proof_data.constraints) {
            if !fresh.satisfied() || !stored.satisfied() || fresh != stored {
                return Err(RejectReason::ConstraintViolation {
                    step: fresh.step(),
                    kind: fresh.kind(),
                });
            }
        }

        // parameters.
        let params = proof.proof_data.parameters();
        if params.num_queries < self.min_num_queries
            || params.blowup_factor < self.min_blowup_factor
        {
            return Err(RejectReason::SecurityThresholdViolation {
                num_queries: params.num_queries,
                blowup_factor: params.blowup_factor,
            });
        }

        // root.
        // UNWRAP: a replayed trace always contains step 0.
        let root = replayed.final_hash().unwrap();
        if root != *expected_root || proof.root_hash != *expected_root {
            return Err(RejectReason::RootMismatch);
        }

        Ok(())
    }
}

fn check_structure(
    proof: &Proof,
    expected_leaf_hash: &Digest,
    expected_path_length: usize,
) -> Result<(), MalformedProof> {
    if proof.leaf_hash != *expected_leaf_hash {
        return Err(MalformedProof::LeafMismatch);
    }

    let path_len = proof.auth_path.len();
    if path_len != expected_path_length {
        return Err(MalformedProof::PathLength {
            expected: expected_path_length,
            actual: path_len,
        });
    }

    if check_index(proof.leaf_index, path_len).is_err() {
        return Err(MalformedProof::IndexOutOfRange {
            index: proof.leaf_index,
        });
    }

    let data = &proof.proof_data;
    if data.execution_trace.len() != path_len + 1 {
        return Err(MalformedProof::TraceLength {
            expected: path_len + 1,
            actual: data.execution_trace.len(),
        });
    }

    if data.constraints.len() != path_len * 3 {
        return Err(MalformedProof::ConstraintCount {
            expected: path_len * 3,
            actual: data.constraints.len(),
        });
    }

    if data.trace_length as usize != data.execution_trace.len()
        || data.constraint_count as usize != data.constraints.len()
    {
        return Err(MalformedProof::CountMismatch);
    }

    Ok(())
}

/// Verify a proof with the default minimum parameters. See [`Verifier::verify`].
pub fn verify<H: NodeHasher>(
    proof: &Proof,
    expected_leaf_hash: &Digest,
    expected_root: &Digest,
    expected_path_length: usize,
) -> Verdict {
    Verifier::<H>::default().verify(proof, expected_leaf_hash, expected_root, expected_path_length)
}
