//! Arrival-rate calibration by bounded bisection.
//!
//! The calibrator searches for the arrival rate at which a model reproduces a
//! measured IPC. Predicted IPC is non-decreasing in the rate below saturation,
//! so bisection applies; the ceiling introduces a kink, so the best point seen
//! is tracked instead of trusting the last iterate.

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::error::{ModelError, Result, ensure_positive};
use crate::config::CalibrationConfig;
use crate::pipeline::{PredictionResult, StageMetrics, ThroughputModel};

/// Outcome of a calibration run.
///
/// Always describes the best stable point observed, never merely the last
/// iterate. `predict(arrival_rate)` on the same model reproduces
/// `predicted_ipc` exactly.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationResult {
    /// Best arrival rate found.
    pub arrival_rate: f64,
    /// IPC predicted at `arrival_rate`.
    pub predicted_ipc: f64,
    /// Target IPC.
    pub measured_ipc: f64,
    /// `|predicted - measured| / measured * 100`.
    pub error_percent: f64,
    /// Model evaluations performed.
    pub iterations: usize,
    /// `true` when `error_percent` is within the tolerance.
    pub converged: bool,
    /// `false` only when no stable point was found at all.
    pub stable: bool,
    /// Bottleneck stage at `arrival_rate`.
    pub bottleneck_stage: String,
    /// Stage metrics at `arrival_rate`.
    pub stage_metrics: Vec<StageMetrics>,
    /// Final search interval.
    pub search_bounds: (f64, f64),
}

impl CalibrationResult {
    fn from_prediction(
        prediction: PredictionResult,
        measured_ipc: f64,
        error_percent: f64,
        iterations: usize,
        converged: bool,
        search_bounds: (f64, f64),
    ) -> Self {
        Self {
            arrival_rate: prediction.arrival_rate,
            predicted_ipc: prediction.predicted_ipc,
            measured_ipc,
            error_percent,
            iterations,
            converged,
            stable: prediction.stable,
            bottleneck_stage: prediction.bottleneck,
            stage_metrics: prediction.stage_metrics,
            search_bounds,
        }
    }
}

/// Relative error of a prediction, in percent of the measurement.
#[inline]
pub fn error_percent(predicted: f64, measured: f64) -> f64 {
    (predicted - measured).abs() / measured * 100.0
}

/// Bisection search over a model's arrival rate.
#[derive(Debug, Clone)]
pub struct Calibrator<'m, M: ThroughputModel + ?Sized> {
    model: &'m M,
    config: CalibrationConfig,
}

impl<'m, M: ThroughputModel + ?Sized> Calibrator<'m, M> {
    /// Creates a calibrator with the default search settings.
    pub fn new(model: &'m M) -> Self {
        Self::with_config(model, CalibrationConfig::default())
    }

    /// Creates a calibrator with explicit search settings.
    pub const fn with_config(model: &'m M, config: CalibrationConfig) -> Self {
        Self { model, config }
    }

    /// The search settings in use.
    pub const fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    /// Initial search interval `[low, high]`.
    ///
    /// `high = min(stable_fraction / max_service_time, rate_ceiling)`, the largest
    /// rate at which no stage is individually saturated. `low` is the configured
    /// floor, lowered to `high / 2` for very slow pipelines.
    pub fn search_bounds(&self) -> Result<(f64, f64)> {
        let max_service = self.model.max_service_time();
        ensure_positive("max_service_time", max_service)?;
        let high = (self.config.stable_fraction / max_service).min(self.config.rate_ceiling);
        let low = self.config.search_floor.min(high / 2.0);
        Ok((low, high))
    }

    /// Calibrates with the tolerance, budget and seed from the configuration.
    pub fn calibrate_measured(&self, measured_ipc: f64) -> Result<CalibrationResult> {
        self.calibrate(
            measured_ipc,
            self.config.initial_guess,
            self.config.tolerance_percent,
            self.config.max_iterations,
        )
    }

    /// Searches for the arrival rate reproducing `measured_ipc`.
    ///
    /// # Arguments
    ///
    /// * `measured_ipc` - Target IPC; must be > 0.
    /// * `initial_guess` - First rate to try; clamped into `[low, seed_fraction * high]`.
    /// * `tolerance_percent` - Acceptance band; must be > 0.
    /// * `max_iterations` - Evaluation budget; must be >= 1.
    ///
    /// # Returns
    ///
    /// The best stable point seen, with `converged` set when it lies within the
    /// tolerance. Unstable evaluations shrink the upper bound and are never
    /// retained as the best point.
    pub fn calibrate(
        &self,
        measured_ipc: f64,
        initial_guess: f64,
        tolerance_percent: f64,
        max_iterations: usize,
    ) -> Result<CalibrationResult> {
        ensure_positive("measured_ipc", measured_ipc)?;
        ensure_positive("tolerance_percent", tolerance_percent)?;
        ensure_positive("initial_guess", initial_guess)?;
        if max_iterations == 0 {
            return Err(ModelError::invalid("max_iterations", "must be at least 1"));
        }

        let fallback = self.model.fallback_stages();
        if !fallback.is_empty() {
            warn!(
                stages = ?fallback,
                "calibrating with fallback service times; check the category table"
            );
        }

        let (mut low, mut high) = self.search_bounds()?;
        let mut rate = initial_guess.min(self.config.seed_fraction * high).max(low);
        let mut best: Option<(f64, PredictionResult)> = None;
        let mut last_unstable: Option<PredictionResult> = None;
        let mut iterations = 0;
        let mut converged = false;

        while iterations < max_iterations {
            iterations += 1;
            let prediction = self.model.predict(rate)?;

            if !prediction.stable {
                debug!(iteration = iterations, rate, low, high, "unstable; shrinking upper bound");
                high = rate;
                last_unstable = Some(prediction);
                if high - low < self.config.collapse_width {
                    break;
                }
                rate = (low + high) / 2.0;
                continue;
            }

            let error = error_percent(prediction.predicted_ipc, measured_ipc);
            let ipc = prediction.predicted_ipc;
            debug!(iteration = iterations, rate, ipc, error, low, high, "calibration step");

            if best.as_ref().is_none_or(|(best_error, _)| error < *best_error) {
                best = Some((error, prediction));
            }
            if error <= tolerance_percent {
                converged = true;
                break;
            }

            if ipc < measured_ipc {
                low = rate;
            } else {
                high = rate;
            }
            if (high - low).abs() < self.config.collapse_width {
                debug!(iteration = iterations, low, high, "search interval collapsed");
                break;
            }
            rate = (low + high) / 2.0;
        }

        let result = match (best, last_unstable) {
            (Some((error, prediction)), _) => CalibrationResult::from_prediction(
                prediction,
                measured_ipc,
                error,
                iterations,
                converged,
                (low, high),
            ),
            (None, Some(prediction)) => {
                let error = error_percent(prediction.predicted_ipc, measured_ipc);
                CalibrationResult::from_prediction(
                    prediction,
                    measured_ipc,
                    error,
                    iterations,
                    false,
                    (low, high),
                )
            }
            (None, None) => {
                return Err(ModelError::invalid(
                    "max_iterations",
                    "no model evaluation was performed",
                ));
            }
        };

        info!(
            rate = result.arrival_rate,
            predicted_ipc = result.predicted_ipc,
            measured_ipc,
            error_percent = result.error_percent,
            iterations = result.iterations,
            converged = result.converged,
            "calibration finished"
        );
        Ok(result)
    }
}
