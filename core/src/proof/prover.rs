//! Proof generation.

use super::{
    trace::{derive_constraints, record_trace},
    ConstraintKind, Proof, ProofData, ProofParameters, AUXILIARY_DIGESTS, MAX_PATH_LEN,
};
use crate::{
    hasher::{Digest, NodeHasher},
    tree::AuthPath,
};

use core::{fmt, marker::PhantomData};

/// Errors in proof generation.
///
/// No partial proof is ever returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProveError {
    /// The authentication path is longer than any supported tree.
    PathTooLong { len: usize },
    /// The leaf index does not address a leaf of a tree with this path length.
    IndexOutOfRange { index: u64, path_len: usize },
    /// A derived constraint did not hold. The leaf, index and path supplied are inconsistent
    /// with each other; this is not in itself evidence of tampering.
    ConstraintViolation { step: u32, kind: ConstraintKind },
    /// The trace recombined into a different root than the committed one. This is the
    /// tamper signal.
    RootMismatch { computed: Digest, expected: Digest },
}

impl fmt::Display for ProveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProveError::PathTooLong { len } => write!(
                f,
                "authentication path of length {} exceeds the maximum of {}",
                len, MAX_PATH_LEN
            ),
            ProveError::IndexOutOfRange { index, path_len } => write!(
                f,
                "leaf index {} out of range for an authentication path of length {}",
                index, path_len
            ),
            ProveError::ConstraintViolation { step, kind } => {
                write!(f, "constraint {:?} violated at step {}", kind, step)
            }
            ProveError::RootMismatch { computed, expected } => write!(
                f,
                "recomputed root {} does not match committed root {}",
                computed, expected
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ProveError {}

/// Generates integrity proofs with fixed protocol parameters.
pub struct Prover<H> {
    params: ProofParameters,
    _marker: PhantomData<H>,
}

impl<H: NodeHasher> Default for Prover<H> {
    fn default() -> Self {
        Self::new(ProofParameters::default())
    }
}

impl<H: NodeHasher> Prover<H> {
    pub fn new(params: ProofParameters) -> Self {
        Prover {
            params,
            _marker: PhantomData,
        }
    }

    pub fn params(&self) -> &ProofParameters {
        &self.params
    }

    /// Generate a proof that `leaf_hash` at `leaf_index` recombines through `auth_path` into
    /// `expected_root`.
    ///
    /// The trace is recorded, its constraints are derived and checked, and only then is the
    /// final hash compared with the expected root.
    pub fn generate(
        &self,
        leaf_hash: &Digest,
        auth_path: &AuthPath,
        leaf_index: u64,
        expected_root: &Digest,
    ) -> Result<Proof, ProveError> {
        check_index(leaf_index, auth_path.len())?;

        let execution_trace = record_trace::<H>(leaf_hash, leaf_index, auth_path);
        let constraints = derive_constraints::<H>(&execution_trace);
        if let Some(c) = constraints.iter().find(|c| !c.satisfied()) {
            return Err(ProveError::ConstraintViolation {
                step: c.step(),
                kind: c.kind(),
            });
        }

        // UNWRAP: a trace always contains step 0.
        let computed = execution_trace.final_hash().unwrap();
        if computed != *expected_root {
            return Err(ProveError::RootMismatch {
                computed,
                expected: *expected_root,
            });
        }

        let proof_data = ProofData {
            trace_length: execution_trace.len() as u32,
            constraint_count: constraints.len() as u32,
            execution_trace,
            constraints,
            security_level: self.params.security_level,
            blowup_factor: self.params.blowup_factor,
            num_queries: self.params.num_queries,
            fri_layers: self.params.fri_layers,
            auxiliary_digests: auxiliary_digests::<H>(),
        };

        Ok(Proof {
            leaf_hash: *leaf_hash,
            auth_path: auth_path.clone(),
            root_hash: *expected_root,
            leaf_index,
            proof_data,
        })
    }
}

/// Generate a proof with the default protocol parameters. See [`Prover::generate`].
pub fn generate<H: NodeHasher>(
    leaf_hash: &Digest,
    auth_path: &AuthPath,
    leaf_index: u64,
    expected_root: &Digest,
) -> Result<Proof, ProveError> {
    Prover::<H>::default().generate(leaf_hash, auth_path, leaf_index, expected_root)
}

/// Check that an index addresses a leaf of a tree with the given path length.
pub(super) fn check_index(leaf_index: u64, path_len: usize) -> Result<(), ProveError> {
    if path_len > MAX_PATH_LEN {
        return Err(ProveError::PathTooLong { len: path_len });
    }
    let fits = path_len == MAX_PATH_LEN || leaf_index >> path_len == 0;
    if !fits {
        return Err(ProveError::IndexOutOfRange {
            index: leaf_index,
            path_len,
        });
    }
    Ok(())
}

/// The auxiliary digests attached to every proof. These are fixed labels, not commitments to
/// anything in the trace.
pub(super) fn auxiliary_digests<H: NodeHasher>() -> [Digest; AUXILIARY_DIGESTS] {
    let mut digests = [Digest::default(); AUXILIARY_DIGESTS];
    for (i, d) in digests.iter_mut().enumerate() {
        *d = H::hash_str(&alloc::format!("commitment_{}", i));
    }
    digests
}
