use blockproof_core::proof::{ProofParameters, MIN_BLOWUP_FACTOR, MIN_NUM_QUERIES};

use crate::error::ConfigurationError;

/// Corruption rates analysed in every audit plan by default: 1%, 5%, 10% and 20%.
pub const DEFAULT_ANALYSIS_RATES: [f64; 4] = [0.01, 0.05, 0.10, 0.20];

/// Options when creating an [`crate::Auditor`].
#[derive(Debug, Clone)]
pub struct Options {
    /// The probability of detecting corruption at the minimum corruption rate.
    pub(crate) confidence_level: f64,
    /// The smallest fraction of corrupted blocks the audit is sized to detect.
    pub(crate) min_corruption_rate: f64,
    /// The number of worker threads proving and verifying blocks.
    pub(crate) workers: usize,
    pub(crate) batch_policy: BatchPolicy,
    pub(crate) proof_parameters: ProofParameters,
    /// Corruption rates reported in each plan's confidence analysis.
    pub(crate) analysis_rates: Vec<f64>,
}

impl Options {
    /// Create a new `Options` instance with the default values.
    pub fn new() -> Self {
        Self {
            confidence_level: 0.95,
            min_corruption_rate: 0.05,
            workers: 4,
            batch_policy: BatchPolicy::RunToCompletion,
            proof_parameters: ProofParameters::default(),
            analysis_rates: DEFAULT_ANALYSIS_RATES.to_vec(),
        }
    }

    /// Set the target detection confidence.
    ///
    /// Must be strictly between 0 and 1.
    ///
    /// Default: 0.95.
    pub fn confidence_level(&mut self, confidence_level: f64) {
        self.confidence_level = confidence_level;
    }

    /// Set the minimum corruption rate the sample is sized to detect.
    ///
    /// Must be strictly between 0 and 1.
    ///
    /// Default: 0.05.
    pub fn min_corruption_rate(&mut self, min_corruption_rate: f64) {
        self.min_corruption_rate = min_corruption_rate;
    }

    /// Set the number of audit workers.
    ///
    /// May not be zero.
    ///
    /// Default: 4.
    pub fn workers(&mut self, workers: usize) {
        self.workers = workers;
    }

    /// Set what happens to the rest of a batch once a block is rejected.
    ///
    /// Default: [`BatchPolicy::RunToCompletion`].
    pub fn batch_policy(&mut self, batch_policy: BatchPolicy) {
        self.batch_policy = batch_policy;
    }

    /// Set the protocol parameters attached to generated proofs.
    ///
    /// The query count may not be below 16 and the blowup factor may not be below 4.
    ///
    /// Default: security level 128, blowup factor 8, 32 queries, 6 FRI layers.
    pub fn proof_parameters(&mut self, proof_parameters: ProofParameters) {
        self.proof_parameters = proof_parameters;
    }

    /// Set the corruption rates reported in each plan's confidence analysis.
    ///
    /// Default: 1%, 5%, 10%, 20%.
    pub fn analysis_rates(&mut self, analysis_rates: Vec<f64>) {
        self.analysis_rates = analysis_rates;
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        check_rate(self.confidence_level).map_err(ConfigurationError::ConfidenceLevel)?;
        check_rate(self.min_corruption_rate).map_err(ConfigurationError::CorruptionRate)?;
        for &rate in &self.analysis_rates {
            check_rate(rate).map_err(ConfigurationError::CorruptionRate)?;
        }
        if self.workers == 0 {
            return Err(ConfigurationError::NoWorkers);
        }
        let params = &self.proof_parameters;
        if params.num_queries < MIN_NUM_QUERIES || params.blowup_factor < MIN_BLOWUP_FACTOR {
            return Err(ConfigurationError::WeakProofParameters {
                num_queries: params.num_queries,
                blowup_factor: params.blowup_factor,
            });
        }
        Ok(())
    }
}

impl Default for Options {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the rate back as an error unless it is strictly inside (0, 1). NaN is rejected.
pub(crate) fn check_rate(rate: f64) -> Result<(), f64> {
    if rate > 0.0 && rate < 1.0 {
        Ok(())
    } else {
        Err(rate)
    }
}

/// How a batch of block checks reacts to a failing block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchPolicy {
    /// Check every selected block and report all outcomes.
    #[default]
    RunToCompletion,
    /// Stop starting new checks once any block is rejected, for whatever reason. Unavailable
    /// blocks do not stop the batch. Blocks never started are reported as skipped.
    FailFast,
}
