//! Errors surfaced by the audit engine.
//!
//! A tampered block is not an error: it is reported as a rejected block inside an
//! [`crate::AuditReport`]. The types here cover inputs which cannot be processed at all.

use blockproof_core::TreeError;
use thiserror::Error;

/// Invalid input to commitment construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InputError {
    #[error("cannot commit to an empty sequence of blocks")]
    EmptyBlocks,
    #[error("block {index} out of range for {total_blocks} blocks")]
    IndexOutOfRange { index: u64, total_blocks: u64 },
    #[error("{ids} block ids supplied for {hashes} leaf hashes")]
    LengthMismatch { ids: usize, hashes: usize },
}

impl From<TreeError> for InputError {
    fn from(err: TreeError) -> Self {
        match err {
            TreeError::EmptyLeaves => InputError::EmptyBlocks,
            TreeError::IndexOutOfRange { index, leaf_count } => InputError::IndexOutOfRange {
                index,
                total_blocks: leaf_count,
            },
        }
    }
}

/// Invalid audit or proof parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("confidence level {0} is not strictly between 0 and 1")]
    ConfidenceLevel(f64),
    #[error("corruption rate {0} is not strictly between 0 and 1")]
    CorruptionRate(f64),
    #[error("an audit needs at least one block")]
    NoBlocks,
    #[error("at least one audit worker is required")]
    NoWorkers,
    #[error("proof parameters below minimum: {num_queries} queries, blowup factor {blowup_factor}")]
    WeakProofParameters { num_queries: u32, blowup_factor: u32 },
}

/// A block could not be fetched from its store.
#[derive(Debug, Error)]
pub enum BlockUnavailable {
    #[error("block {block_id} not found")]
    NotFound { block_id: String },
    #[error("block id {block_id:?} is not a plain file name")]
    InvalidId { block_id: String },
    #[error("failed to read block {block_id}")]
    Io {
        block_id: String,
        #[source]
        source: std::io::Error,
    },
}

impl BlockUnavailable {
    pub fn block_id(&self) -> &str {
        match self {
            BlockUnavailable::NotFound { block_id }
            | BlockUnavailable::InvalidId { block_id }
            | BlockUnavailable::Io { block_id, .. } => block_id,
        }
    }
}

/// A proof document could not be decoded.
#[derive(Debug, Error)]
#[error("malformed proof document")]
pub struct ProofMalformed(#[from] pub serde_json::Error);

/// A commitment document is internally inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommitmentError {
    #[error("commitment uses {found}, expected {expected}")]
    AlgorithmMismatch {
        expected: &'static str,
        found: String,
    },
    #[error("commitment type {0} is not supported")]
    UnsupportedType(String),
    #[error("commitment records {recorded} blocks but lists {listed}")]
    BlockCount { recorded: u64, listed: usize },
    #[error("recorded tree structure does not match {total_blocks} blocks")]
    TreeStructure { total_blocks: u64 },
    #[error("block {block_id} has an authentication path of length {actual}, expected {expected}")]
    PathLength {
        block_id: String,
        expected: usize,
        actual: usize,
    },
    #[error("block {block_id} does not recombine into the committed root")]
    RootMismatch { block_id: String },
}

/// Errors which prevent an audit from running.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Commitment(#[from] CommitmentError),
    #[error("no commitment stored for user {user_id}, upload {upload_id}")]
    CommitmentNotFound { user_id: String, upload_id: String },
    #[error("audit plan covers {plan} blocks but the commitment has {commitment}")]
    PlanMismatch { plan: u64, commitment: u64 },
    #[error("audit plan {audit_id} is not a valid selection")]
    InvalidPlan { audit_id: String },
}
