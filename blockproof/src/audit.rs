//! Audit orchestration: fetch, hash, prove and verify every sampled block, and aggregate the
//! per-block outcomes into a report.

use std::{
    fmt,
    marker::PhantomData,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use blockproof_core::{
    proof::{Prover, RejectReason, Verdict, Verifier},
    AuthPath, NodeHasher,
};
use threadpool::ThreadPool;

use crate::{
    commitment::Commitment,
    error::{AuditError, BlockUnavailable, ConfigurationError},
    options::{BatchPolicy, Options},
    sampler::{AuditPlan, AuditRequest},
    store::{BlockStore, CommitmentStore},
    task::run_all,
};

/// The outcome of checking one block.
#[derive(Debug)]
pub enum BlockOutcome {
    /// The block content recombines into the committed root and the proof was accepted.
    Verified,
    /// The proof for the block was rejected, or could not be produced.
    Rejected(RejectReason),
    /// The block content could not be fetched.
    Unavailable(BlockUnavailable),
    /// The block was never checked because the batch was cancelled.
    Skipped,
}

impl BlockOutcome {
    /// Whether this outcome is evidence of tampering or corruption.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            BlockOutcome::Rejected(RejectReason::RootMismatch)
                | BlockOutcome::Rejected(RejectReason::ConstraintViolation { .. })
        )
    }

    /// Whether this outcome stops a fail-fast batch: any rejection does.
    fn stops_batch(&self) -> bool {
        matches!(self, BlockOutcome::Rejected(_))
    }
}

/// The result of checking one block.
#[derive(Debug)]
pub struct BlockResult {
    pub index: u64,
    pub block_id: String,
    pub outcome: BlockOutcome,
}

/// The overall result of an audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditStatus {
    /// At least one block was sampled and every sampled block was verified.
    Passed,
    /// At least one block failed with a root mismatch or a constraint violation.
    Failed,
    /// No block failed, but not every block could be verified, or nothing was checked.
    Inconclusive,
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuditStatus::Passed => "passed",
            AuditStatus::Failed => "failed",
            AuditStatus::Inconclusive => "inconclusive",
        })
    }
}

/// The report of one audit.
#[derive(Debug)]
pub struct AuditReport {
    pub audit_id: String,
    pub user_id: String,
    pub upload_id: String,
    pub total_blocks: u64,
    pub status: AuditStatus,
    /// Per-block results in ascending index order.
    pub results: Vec<BlockResult>,
    pub verified: usize,
    pub rejected: usize,
    pub unavailable: usize,
    pub skipped: usize,
    /// Whether the plan selected fewer blocks than its statistical model asked for.
    pub under_sampled: bool,
    /// The binomial detection confidence achieved by the blocks actually verified, at the plan's
    /// minimum corruption rate.
    pub achieved_confidence: f64,
    pub elapsed: Duration,
}

impl AuditReport {
    pub fn is_passed(&self) -> bool {
        self.status == AuditStatus::Passed
    }

    /// The results which are evidence of tampering or corruption.
    pub fn failures(&self) -> impl Iterator<Item = &BlockResult> {
        self.results.iter().filter(|r| r.outcome.is_failure())
    }
}

/// Audits committed datasets against a block store.
///
/// Blocks are checked in parallel on a pool of worker threads.
pub struct Auditor<H, S> {
    options: Options,
    store: Arc<S>,
    pool: ThreadPool,
    _marker: PhantomData<H>,
}

impl<H, S> Auditor<H, S>
where
    H: NodeHasher + Send + Sync + 'static,
    S: BlockStore + 'static,
{
    pub fn new(options: Options, store: S) -> Result<Self, ConfigurationError> {
        options.validate()?;
        let pool = ThreadPool::with_name("blockproof-audit".into(), options.workers);
        Ok(Auditor {
            options,
            store: Arc::new(store),
            pool,
            _marker: PhantomData,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Plan an audit with this auditor's sampling options.
    pub fn plan(&self, request: &AuditRequest) -> Result<AuditPlan, ConfigurationError> {
        AuditPlan::generate(request, &self.options)
    }

    /// Check every block selected by `plan` against `commitment`.
    ///
    /// Tampered blocks do not produce an error: they are reported in the returned
    /// [`AuditReport`]. Errors are reserved for a commitment or plan which cannot be audited.
    pub fn audit(
        &self,
        commitment: Arc<Commitment>,
        plan: &AuditPlan,
    ) -> Result<AuditReport, AuditError> {
        let start = Instant::now();
        commitment.validate::<H>()?;
        if plan.total_blocks != commitment.total_blocks {
            return Err(AuditError::PlanMismatch {
                plan: plan.total_blocks,
                commitment: commitment.total_blocks,
            });
        }
        if !plan.validate().valid {
            return Err(AuditError::InvalidPlan {
                audit_id: plan.audit_id.clone(),
            });
        }

        let span = tracing::info_span!("audit", audit_id = %plan.audit_id);
        let _guard = span.enter();
        tracing::info!(
            user_id = %plan.user_id,
            upload_id = %plan.upload_id,
            total_blocks = plan.total_blocks,
            sample_size = plan.sample_size,
            "starting audit"
        );
        if plan.under_sampled {
            tracing::warn!(
                requested = plan.requested_sample_size,
                selected = plan.sample_size,
                "plan is under-sampled"
            );
        }

        let check = BlockCheck::<H, S> {
            commitment,
            store: self.store.clone(),
            prover: Prover::new(self.options.proof_parameters),
            cancel: AtomicBool::new(false),
            fail_fast: self.options.batch_policy == BatchPolicy::FailFast,
        };
        let check = Arc::new(check);
        let results = run_all(&self.pool, plan.selected_blocks.clone(), move |index| {
            check.run(index)
        });

        let report = aggregate(plan, results, start.elapsed());
        tracing::info!(
            status = %report.status,
            verified = report.verified,
            rejected = report.rejected,
            unavailable = report.unavailable,
            skipped = report.skipped,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "audit finished"
        );
        Ok(report)
    }

    /// Load the commitment of an upload, plan an audit of it and run it.
    pub fn audit_upload<C: CommitmentStore + ?Sized>(
        &self,
        commitments: &C,
        user_id: &str,
        upload_id: &str,
        timestamp: Option<&str>,
    ) -> Result<AuditReport, AuditError> {
        let commitment =
            commitments
                .get(user_id, upload_id)
                .ok_or_else(|| AuditError::CommitmentNotFound {
                    user_id: user_id.to_owned(),
                    upload_id: upload_id.to_owned(),
                })?;
        let plan = self.plan(&AuditRequest {
            total_blocks: commitment.total_blocks,
            user_id,
            upload_id,
            timestamp,
        })?;
        self.audit(commitment, &plan)
    }
}

/// Everything a worker needs to check one block.
struct BlockCheck<H, S> {
    commitment: Arc<Commitment>,
    store: Arc<S>,
    prover: Prover<H>,
    cancel: AtomicBool,
    fail_fast: bool,
}

impl<H: NodeHasher, S: BlockStore> BlockCheck<H, S> {
    fn run(&self, index: u64) -> BlockResult {
        // UNWRAP: the commitment was validated and the plan covers exactly its blocks.
        let block = self.commitment.block(index).unwrap();
        let outcome = if self.cancel.load(Ordering::Relaxed) {
            BlockOutcome::Skipped
        } else {
            self.check(index, &block.block_id, &block.authentication_path)
        };

        match &outcome {
            BlockOutcome::Verified => {
                tracing::debug!(index, block_id = %block.block_id, "block verified")
            }
            BlockOutcome::Rejected(reason) => {
                tracing::warn!(index, block_id = %block.block_id, %reason, "block rejected")
            }
            BlockOutcome::Unavailable(err) => {
                tracing::warn!(index, block_id = %block.block_id, %err, "block unavailable")
            }
            BlockOutcome::Skipped => {
                tracing::debug!(index, block_id = %block.block_id, "block skipped")
            }
        }

        if self.fail_fast && outcome.stops_batch() {
            self.cancel.store(true, Ordering::Relaxed);
        }

        BlockResult {
            index,
            block_id: block.block_id.clone(),
            outcome,
        }
    }

    fn check(&self, index: u64, block_id: &str, auth_path: &AuthPath) -> BlockOutcome {
        let content = match self.store.fetch(index, block_id) {
            Ok(content) => content,
            Err(err) => return BlockOutcome::Unavailable(err),
        };
        let leaf_hash = H::hash_leaf(&content);
        let root = self.commitment.root();

        let proof = match self.prover.generate(&leaf_hash, auth_path, index, &root) {
            Ok(proof) => proof,
            Err(err) => return BlockOutcome::Rejected(err.into()),
        };

        let verifier = Verifier::<H>::default();
        match verifier.verify(&proof, &leaf_hash, &root, self.commitment.path_length()) {
            Verdict::Accept => BlockOutcome::Verified,
            Verdict::Reject(reason) => BlockOutcome::Rejected(reason),
        }
    }
}

fn aggregate(plan: &AuditPlan, results: Vec<BlockResult>, elapsed: Duration) -> AuditReport {
    let (mut verified, mut rejected, mut unavailable, mut skipped) = (0, 0, 0, 0);
    for result in &results {
        match result.outcome {
            BlockOutcome::Verified => verified += 1,
            BlockOutcome::Rejected(_) => rejected += 1,
            BlockOutcome::Unavailable(_) => unavailable += 1,
            BlockOutcome::Skipped => skipped += 1,
        }
    }

    let status = if results.iter().any(|r| r.outcome.is_failure()) {
        AuditStatus::Failed
    } else if !results.is_empty() && verified == results.len() {
        AuditStatus::Passed
    } else {
        AuditStatus::Inconclusive
    };

    AuditReport {
        audit_id: plan.audit_id.clone(),
        user_id: plan.user_id.clone(),
        upload_id: plan.upload_id.clone(),
        total_blocks: plan.total_blocks,
        status,
        verified,
        rejected,
        unavailable,
        skipped,
        under_sampled: plan.under_sampled,
        achieved_confidence: crate::sampler::calculate_actual_confidence(
            verified as u64,
            plan.total_blocks,
            plan.min_corruption_rate,
        ),
        elapsed,
        results,
    }
}
