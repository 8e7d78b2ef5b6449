//! Throughput model interface.
//!
//! The calibrator only needs to evaluate a model at an arrival rate and know
//! where its slowest stage saturates. [`PipelineAnalyzer`](super::PipelineAnalyzer)
//! is the production implementation; tests substitute scripted models.

use super::analyzer::PredictionResult;
use crate::common::error::Result;

/// A model mapping an arrival rate to a throughput prediction.
pub trait ThroughputModel {
    /// Evaluates the model at `arrival_rate` (instructions per cycle).
    ///
    /// Must be deterministic: the same rate yields the same result.
    fn predict(&self, arrival_rate: f64) -> Result<PredictionResult>;

    /// Largest service time over all stages, in cycles.
    ///
    /// `1 / max_service_time()` is the lowest rate at which some stage saturates.
    fn max_service_time(&self) -> f64;

    /// Names of stages whose service time falls back to the default cost.
    fn fallback_stages(&self) -> Vec<String> {
        Vec::new()
    }
}
