//! Blockproof: statistical, tamper-evident audits of block-structured datasets.
//!
//! A dataset is split into blocks outside this crate. The blocks are committed to once, as a
//! [`Commitment`]: the root of a binary Merkle tree over the block hashes, plus every block's
//! authentication path. Later, an [`Auditor`] samples a statistically sized, reproducible subset
//! of the blocks ([`AuditPlan`]), re-fetches each from a [`BlockStore`], and proves and verifies
//! that its current content still recombines into the committed root.
//!
//! ```no_run
//! use blockproof::{Auditor, AuditRequest, Commitment, MemoryBlockStore, Options, Sha3Hasher};
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let blocks = vec![b"block one".to_vec(), b"block two".to_vec()];
//! let commitment = Arc::new(Commitment::from_contents::<Sha3Hasher, _, _>(&blocks)?);
//!
//! let store = MemoryBlockStore::from_contents(blocks);
//! let auditor = Auditor::<Sha3Hasher, _>::new(Options::new(), store)?;
//! let plan = auditor.plan(&AuditRequest {
//!     total_blocks: commitment.total_blocks,
//!     user_id: "alice",
//!     upload_id: "upload-1",
//!     timestamp: None,
//! })?;
//! let report = auditor.audit(commitment, &plan)?;
//! assert!(report.is_passed());
//! # Ok(())
//! # }
//! ```

pub use blockproof_core::{
    hasher::{self, Digest, NodeHasher, Sha3Hasher},
    proof::{self, ProofParameters, RejectReason, Verdict},
    tree::{self, AuthPath, MerkleTree},
};

pub use audit::{AuditReport, AuditStatus, Auditor, BlockOutcome, BlockResult};
pub use commitment::{block_id, BlockMetadata, Commitment};
pub use document::{decode_proof, encode_proof, verify_document};
pub use error::{
    AuditError, BlockUnavailable, CommitmentError, ConfigurationError, InputError, ProofMalformed,
};
pub use options::{BatchPolicy, Options};
pub use sampler::{AuditPlan, AuditRequest};
pub use store::{
    BlockStore, CommitmentStore, DirBlockStore, MemoryBlockStore, MemoryCommitmentStore,
};

mod audit;
pub mod commitment;
mod document;
mod error;
pub mod logging;
mod options;
pub mod sampler;
pub mod store;
mod task;

#[cfg(feature = "benchmarks")]
pub mod benches;
