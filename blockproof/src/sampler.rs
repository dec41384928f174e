//! Deterministic, statistically sized block sampling.
//!
//! The number of blocks sampled is the smallest `n` for which a uniformly random sample would
//! contain at least one corrupted block with the target confidence, assuming the given fraction of
//! blocks is corrupted:
//!
//! ```text
//! 1 - (1 - rate)^n >= confidence   =>   n = ceil(ln(1 - confidence) / ln(1 - rate))
//! ```
//!
//! This is the binomial approximation, i.e. sampling with replacement. The actual selection is
//! without replacement, so for small datasets the true detection probability is higher; plans
//! report the exact hypergeometric figure next to the binomial one.
//!
//! Selection is a pure function of a 32-byte seed, which is itself a pure function of the audit
//! identity. Re-running a plan with the same identity selects the same blocks.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

use crate::{
    error::ConfigurationError,
    options::{check_rate, Options},
};

/// A selection seed.
pub type Seed = [u8; 32];

/// The name recorded for the selection procedure in every plan.
pub const SELECTION_ALGORITHM: &str = "cryptographic_hash_based";

/// The name recorded for the sample sizing model in every plan.
pub const STATISTICAL_METHOD: &str = "binomial_approximation";

/// Datasets smaller than this are always sampled at least `MIN_SMALL_SAMPLE` deep.
const SMALL_DATASET: u64 = 10;
const MIN_SMALL_SAMPLE: u64 = 3;

/// How many candidate draws per block the selector may make before giving up.
const DRAWS_PER_BLOCK: u64 = 10;

/// The number of blocks to sample for the given confidence and minimum corruption rate.
///
/// Clamped to `total_blocks`. Datasets of fewer than 10 blocks are sampled at least
/// `min(3, total_blocks)` deep.
pub fn calculate_sample_size(
    total_blocks: u64,
    confidence_level: f64,
    corruption_rate: f64,
) -> Result<u64, ConfigurationError> {
    check_rate(confidence_level).map_err(ConfigurationError::ConfidenceLevel)?;
    check_rate(corruption_rate).map_err(ConfigurationError::CorruptionRate)?;
    if total_blocks == 0 {
        return Err(ConfigurationError::NoBlocks);
    }

    // ln_1p keeps rates far below f64 epsilon from collapsing to ln(1) = 0.
    let theoretical = (-confidence_level).ln_1p() / (-corruption_rate).ln_1p();
    let mut sample_size = if theoretical.is_finite() && theoretical > 0.0 {
        (theoretical.ceil() as u64).min(total_blocks)
    } else {
        total_blocks
    };
    if total_blocks < SMALL_DATASET {
        sample_size = sample_size.max(MIN_SMALL_SAMPLE.min(total_blocks));
    }
    Ok(sample_size)
}

/// Derive a selection seed from the audit identity: `SHA-256(user_id|upload_id|timestamp)`.
pub fn derive_seed(user_id: &str, upload_id: &str, timestamp: &str) -> Seed {
    let mut hasher = Sha256::new();
    hasher.update(identity(user_id, upload_id, timestamp).as_bytes());
    hasher.finalize().into()
}

fn identity(user_id: &str, upload_id: &str, timestamp: &str) -> String {
    format!("{}|{}|{}", user_id, upload_id, timestamp)
}

/// The outcome of [`select`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    indices: Vec<u64>,
    requested: u64,
}

impl Selection {
    /// The selected indices, strictly increasing.
    pub fn indices(&self) -> &[u64] {
        &self.indices
    }

    pub fn into_indices(self) -> Vec<u64> {
        self.indices
    }

    /// The number of distinct indices selected.
    pub fn len(&self) -> u64 {
        self.indices.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The number of indices asked for.
    pub fn requested(&self) -> u64 {
        self.requested
    }

    /// Whether the draw bound was reached before enough distinct indices were found.
    pub fn is_exhausted(&self) -> bool {
        self.len() < self.requested
    }
}

/// Deterministically select `sample_size` distinct indices in `[0, total_blocks)`.
///
/// Candidate `i` is the first four bytes of `SHA-256(seed ++ be32(i))`, big-endian, reduced
/// modulo `total_blocks`. Candidates are drawn from `i = 0` until enough distinct indices are
/// found or more than `10 * total_blocks` candidates have been drawn; in the latter case the
/// selection is exhausted and holds fewer indices than requested.
pub fn select(total_blocks: u64, seed: &Seed, sample_size: u64) -> Selection {
    let mut selected = BTreeSet::new();
    if total_blocks == 0 {
        return Selection {
            indices: Vec::new(),
            requested: sample_size,
        };
    }

    let max_draws = total_blocks.saturating_mul(DRAWS_PER_BLOCK);
    let mut counter: u64 = 0;
    while (selected.len() as u64) < sample_size {
        let mut hasher = Sha256::new();
        hasher.update(seed);
        hasher.update((counter as u32).to_be_bytes());
        let hash = hasher.finalize();

        // UNWRAP: a SHA-256 output is 32 bytes.
        let candidate = u32::from_be_bytes(hash[..4].try_into().unwrap()) as u64;
        selected.insert(candidate % total_blocks);

        counter += 1;
        if counter > max_draws || counter > u32::MAX as u64 {
            break;
        }
    }

    Selection {
        indices: selected.into_iter().collect(),
        requested: sample_size,
    }
}

/// The probability that a sample of `sample_size` blocks contains a corrupted block, under the
/// binomial approximation. Zero for an empty sample or dataset.
pub fn calculate_actual_confidence(
    sample_size: u64,
    total_blocks: u64,
    corruption_rate: f64,
) -> f64 {
    if sample_size == 0 || total_blocks == 0 {
        return 0.0;
    }
    1.0 - (1.0 - corruption_rate).powf(sample_size as f64)
}

/// The exact probability that a sample of `sample_size` distinct blocks contains a corrupted
/// block, when `ceil(corruption_rate * total_blocks)` blocks (at least one) are corrupted.
pub fn hypergeometric_confidence(
    sample_size: u64,
    total_blocks: u64,
    corruption_rate: f64,
) -> f64 {
    if sample_size == 0 || total_blocks == 0 {
        return 0.0;
    }
    let corrupted = ((corruption_rate * total_blocks as f64).ceil() as u64).clamp(1, total_blocks);
    let clean = total_blocks - corrupted;
    if sample_size > clean {
        return 1.0;
    }

    // probability that every sampled block is clean.
    let miss = (0..sample_size).fold(1.0f64, |p, i| {
        p * (clean - i) as f64 / (total_blocks - i) as f64
    });
    1.0 - miss
}

/// An audit to plan.
#[derive(Debug, Clone, Copy)]
pub struct AuditRequest<'a> {
    pub total_blocks: u64,
    pub user_id: &'a str,
    pub upload_id: &'a str,
    /// The audit timestamp. The current UTC time in RFC 3339 form when absent.
    pub timestamp: Option<&'a str>,
}

/// Detection confidence at one corruption rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceEstimate {
    pub corruption_rate: f64,
    /// The binomial approximation.
    pub confidence: f64,
    /// The hypergeometric figure for sampling without replacement.
    pub exact_confidence: f64,
}

/// A reproducible record of which blocks an audit checks and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPlan {
    /// The first 16 hex characters of the seed.
    pub audit_id: String,
    pub timestamp: String,
    pub user_id: String,
    pub upload_id: String,
    pub total_blocks: u64,
    /// Strictly increasing block indices.
    pub selected_blocks: Vec<u64>,
    /// The number of blocks actually selected.
    pub sample_size: u64,
    /// The number of blocks the statistical model asked for.
    pub requested_sample_size: u64,
    /// Whether the selector stopped short of the requested sample size.
    pub under_sampled: bool,
    pub sample_percentage: f64,
    pub target_confidence: f64,
    pub min_corruption_rate: f64,
    pub confidence_analysis: Vec<ConfidenceEstimate>,
    #[serde(with = "hex::serde")]
    pub cryptographic_seed: Seed,
    pub selection_algorithm: String,
    pub statistical_method: String,
}

impl AuditPlan {
    /// Size the sample, derive the seed and select blocks.
    pub fn generate(request: &AuditRequest, options: &Options) -> Result<Self, ConfigurationError> {
        let requested_sample_size = calculate_sample_size(
            request.total_blocks,
            options.confidence_level,
            options.min_corruption_rate,
        )?;
        for &rate in &options.analysis_rates {
            check_rate(rate).map_err(ConfigurationError::CorruptionRate)?;
        }

        let timestamp = match request.timestamp {
            Some(ts) => ts.to_owned(),
            None => chrono::Utc::now().to_rfc3339(),
        };
        let seed = derive_seed(request.user_id, request.upload_id, &timestamp);
        let selection = select(request.total_blocks, &seed, requested_sample_size);
        let under_sampled = selection.is_exhausted();
        let sample_size = selection.len();
        let total_blocks = request.total_blocks;

        let confidence_analysis = options
            .analysis_rates
            .iter()
            .map(|&rate| ConfidenceEstimate {
                corruption_rate: rate,
                confidence: calculate_actual_confidence(sample_size, total_blocks, rate),
                exact_confidence: hypergeometric_confidence(sample_size, total_blocks, rate),
            })
            .collect();

        Ok(AuditPlan {
            audit_id: hex::encode(&seed[..8]),
            timestamp,
            user_id: request.user_id.to_owned(),
            upload_id: request.upload_id.to_owned(),
            total_blocks,
            selected_blocks: selection.into_indices(),
            sample_size,
            requested_sample_size,
            under_sampled,
            sample_percentage: sample_size as f64 / total_blocks as f64 * 100.0,
            target_confidence: options.confidence_level,
            min_corruption_rate: options.min_corruption_rate,
            confidence_analysis,
            cryptographic_seed: seed,
            selection_algorithm: SELECTION_ALGORITHM.to_owned(),
            statistical_method: STATISTICAL_METHOD.to_owned(),
        })
    }

    /// The binomial detection confidence this plan achieves at its minimum corruption rate.
    pub fn achieved_confidence(&self) -> f64 {
        calculate_actual_confidence(self.sample_size, self.total_blocks, self.min_corruption_rate)
    }

    /// The exact detection confidence this plan achieves at its minimum corruption rate.
    pub fn exact_confidence(&self) -> f64 {
        hypergeometric_confidence(self.sample_size, self.total_blocks, self.min_corruption_rate)
    }

    /// Check the plan's structure and review its statistical properties.
    ///
    /// A plan is invalid when its selection is empty, is not strictly increasing, falls
    /// outside the dataset, disagrees with its recorded sample size or was not derived from its
    /// own identity. Everything else produces warnings and recommendations only.
    pub fn validate(&self) -> PlanValidation {
        let non_empty = !self.selected_blocks.is_empty();
        let increasing = self.selected_blocks.windows(2).all(|w| w[0] < w[1]);
        let in_range = self
            .selected_blocks
            .last()
            .map_or(true, |&last| last < self.total_blocks);
        let counted = self.selected_blocks.len() as u64 == self.sample_size;
        let seeded = derive_seed(&self.user_id, &self.upload_id, &self.timestamp)
            == self.cryptographic_seed;

        let mut warnings = Vec::new();
        let mut recommendations = Vec::new();
        if self.sample_size < MIN_SMALL_SAMPLE {
            warnings.push("very small sample size may not be reliable".to_owned());
        }
        if self.sample_size as f64 > self.total_blocks as f64 * 0.5 {
            warnings.push("sampling more than 50% of blocks; consider reducing".to_owned());
        }
        if self.under_sampled {
            warnings.push(format!(
                "selection stopped after {} of {} requested blocks",
                self.sample_size, self.requested_sample_size
            ));
        }
        if self.total_blocks < SMALL_DATASET && self.sample_size < self.total_blocks {
            recommendations.push("for small datasets, consider auditing all blocks".to_owned());
        }

        let efficiency = if self.total_blocks == 0 {
            0.0
        } else {
            self.sample_size as f64 / self.total_blocks as f64
        };

        PlanValidation {
            valid: non_empty && increasing && in_range && counted && seeded,
            warnings,
            recommendations,
            statistics: PlanStatistics {
                efficiency,
                blocks_saved: self.total_blocks.saturating_sub(self.sample_size),
                cost_reduction: (1.0 - efficiency) * 100.0,
            },
        }
    }
}

/// The result of [`AuditPlan::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub recommendations: Vec<String>,
    pub statistics: PlanStatistics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStatistics {
    /// The fraction of blocks sampled.
    pub efficiency: f64,
    pub blocks_saved: u64,
    /// The percentage of blocks not sampled.
    pub cost_reduction: f64,
}

#[cfg(test)]
mod tests {
    use super::{
        calculate_actual_confidence, calculate_sample_size, derive_seed, hypergeometric_confidence,
        select, AuditPlan, AuditRequest,
    };
    use crate::{error::ConfigurationError, options::Options};
    use hex_literal::hex;

    #[test]
    fn sample_size_formula() {
        // ln(0.05) / ln(0.95) = 58.4
        assert_eq!(calculate_sample_size(10_000, 0.95, 0.05), Ok(59));
        assert_eq!(calculate_sample_size(16, 0.95, 0.05), Ok(16));
        assert_eq!(calculate_sample_size(1_000_000, 0.99, 0.01), Ok(459));
    }

    #[test]
    fn tiny_corruption_rate_samples_everything() {
        // 1 - 1e-17 rounds to 1.0 in f64.
        assert_eq!(calculate_sample_size(1000, 0.95, 1e-17), Ok(1000));
        assert_eq!(calculate_sample_size(16, 0.95, f64::MIN_POSITIVE), Ok(16));
        // ln(0.05) / ln(1 - 1e-6) is about three million.
        assert_eq!(calculate_sample_size(10_000, 0.95, 1e-6), Ok(10_000));
    }

    #[test]
    fn small_dataset_floor() {
        // one draw would do at 99% corruption, but small datasets get at least three.
        assert_eq!(calculate_sample_size(5, 0.5, 0.99), Ok(3));
        assert_eq!(calculate_sample_size(2, 0.5, 0.99), Ok(2));
        assert_eq!(calculate_sample_size(1, 0.95, 0.05), Ok(1));
        assert_eq!(calculate_sample_size(50, 0.5, 0.99), Ok(1));
    }

    #[test]
    fn sample_size_rejects_bad_input() {
        assert_eq!(
            calculate_sample_size(10, 1.0, 0.05),
            Err(ConfigurationError::ConfidenceLevel(1.0))
        );
        assert_eq!(
            calculate_sample_size(10, 0.95, 0.0),
            Err(ConfigurationError::CorruptionRate(0.0))
        );
        assert_eq!(
            calculate_sample_size(0, 0.95, 0.05),
            Err(ConfigurationError::NoBlocks)
        );
    }

    #[test]
    fn seed_is_sha256_of_identity() {
        assert_eq!(
            derive_seed("alice", "upload-1", "2024-01-01T00:00:00Z"),
            hex!("d7dce568c84698ad5b0562dc16e39f3b4400c2a31eb40428fbdefa52b91283d9")
        );
    }

    #[test]
    fn selection_known_vectors() {
        let seed = derive_seed("alice", "upload-1", "2024-01-01T00:00:00Z");
        assert_eq!(
            select(1000, &seed, 10).indices(),
            &[34, 301, 366, 368, 394, 487, 661, 823, 832, 956]
        );
        assert_eq!(
            select(1000, &[0; 32], 5).indices(),
            &[448, 629, 647, 668, 978]
        );
    }

    #[test]
    fn selection_is_deterministic_and_seed_sensitive() {
        let a = derive_seed("alice", "upload-1", "t0");
        let b = derive_seed("alice", "upload-1", "t1");
        assert_eq!(select(100_000, &a, 59), select(100_000, &a, 59));
        assert_ne!(select(100_000, &a, 59), select(100_000, &b, 59));

        let s = select(100_000, &a, 59);
        assert_eq!(s.len(), 59);
        assert!(!s.is_exhausted());
        assert!(s.indices().windows(2).all(|w| w[0] < w[1]));
        assert!(s.indices().iter().all(|&i| i < 100_000));
    }

    #[test]
    fn full_selection_of_small_dataset() {
        let seed = derive_seed("alice", "upload-1", "2024-01-01T00:00:00Z");
        let s = select(16, &seed, 16);
        assert_eq!(s.indices(), (0..16).collect::<Vec<_>>().as_slice());
    }

    #[test]
    fn exhaustion_is_reported() {
        // only 4 distinct indices exist, so 40 draws cannot find 5.
        let s = select(4, &[7; 32], 5);
        assert_eq!(s.len(), 4);
        assert_eq!(s.requested(), 5);
        assert!(s.is_exhausted());
    }

    #[test]
    fn confidence_figures() {
        assert_eq!(calculate_actual_confidence(0, 100, 0.05), 0.0);
        assert_eq!(calculate_actual_confidence(10, 0, 0.05), 0.0);
        assert!((calculate_actual_confidence(59, 10_000, 0.05) - 0.9515).abs() < 1e-4);

        assert!((hypergeometric_confidence(3, 8, 0.05) - 0.375).abs() < 1e-12);
        // sampling every block always finds the corruption.
        assert_eq!(hypergeometric_confidence(16, 16, 0.05), 1.0);
        assert!(
            hypergeometric_confidence(59, 1000, 0.05) >= calculate_actual_confidence(59, 1000, 0.05)
        );
    }

    fn request(total_blocks: u64) -> AuditRequest<'static> {
        AuditRequest {
            total_blocks,
            user_id: "alice",
            upload_id: "upload-1",
            timestamp: Some("2024-01-01T00:00:00Z"),
        }
    }

    #[test]
    fn plan_records_everything() {
        let plan = AuditPlan::generate(&request(1000), &Options::new()).unwrap();
        assert_eq!(plan.audit_id, "d7dce568c84698ad");
        assert_eq!(plan.sample_size, 59);
        assert_eq!(plan.requested_sample_size, 59);
        assert!(!plan.under_sampled);
        assert_eq!(plan.selected_blocks.len(), 59);
        assert!((plan.sample_percentage - 5.9).abs() < 1e-9);
        assert_eq!(plan.confidence_analysis.len(), 4);
        assert_eq!(plan.selection_algorithm, "cryptographic_hash_based");
        assert_eq!(plan.statistical_method, "binomial_approximation");
        assert!(plan.achieved_confidence() >= 0.95);

        let again = AuditPlan::generate(&request(1000), &Options::new()).unwrap();
        assert_eq!(plan, again);

        let validation = plan.validate();
        assert!(validation.valid);
        assert!(validation.warnings.is_empty());
        assert_eq!(validation.statistics.blocks_saved, 941);
    }

    #[test]
    fn plan_json_round_trip() {
        let plan = AuditPlan::generate(&request(64), &Options::new()).unwrap();
        let json = serde_json::to_string(&plan).unwrap();
        assert!(json.contains(&format!(
            "\"cryptographic_seed\":\"{}\"",
            hex::encode(plan.cryptographic_seed)
        )));
        let back: AuditPlan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }

    #[test]
    fn default_timestamp_is_rfc3339() {
        let mut req = request(100);
        req.timestamp = None;
        let plan = AuditPlan::generate(&req, &Options::new()).unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(&plan.timestamp).is_ok());
        assert!(plan.validate().valid);
    }

    #[test]
    fn small_plan_warnings() {
        let plan = AuditPlan::generate(&request(16), &Options::new()).unwrap();
        let validation = plan.validate();
        assert!(validation.valid);
        assert_eq!(validation.warnings.len(), 1);
        assert_eq!(validation.statistics.blocks_saved, 0);

        let mut options = Options::new();
        options.confidence_level(0.5);
        options.min_corruption_rate(0.9);
        let plan = AuditPlan::generate(&request(8), &options).unwrap();
        assert_eq!(plan.sample_size, 3);
        let validation = plan.validate();
        assert_eq!(validation.recommendations.len(), 1);
    }

    #[test]
    fn tampered_plan_is_invalid() {
        let mut plan = AuditPlan::generate(&request(1000), &Options::new()).unwrap();
        plan.selected_blocks.swap(0, 1);
        assert!(!plan.validate().valid);

        let mut plan = AuditPlan::generate(&request(1000), &Options::new()).unwrap();
        plan.user_id = "mallory".to_owned();
        assert!(!plan.validate().valid);

        let mut plan = AuditPlan::generate(&request(1000), &Options::new()).unwrap();
        plan.selected_blocks.clear();
        plan.sample_size = 0;
        assert!(!plan.validate().valid);
    }
}
