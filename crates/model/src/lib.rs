//! Queueing-network throughput model for simplified processor pipelines.
//!
//! This crate estimates steady-state IPC from a declarative pipeline description with the following:
//! 1. **Mix:** Instruction categories (cycle cost, weight) and workload profiles that re-weight them.
//! 2. **Queue:** Analytical M/M/1 and M/M/1/K formulas (utilization, queue length, wait, response).
//! 3. **Pipeline:** Stage specifications, service-time aggregation and the IPC/bottleneck predictor.
//! 4. **Calibrate:** Bisection over the arrival rate against a measured IPC, plus multi-parameter identification.
//! 5. **Simulation:** Processor description loading, sensitivity analysis, sweeps, and reporting.

/// Common types and constants (errors, numeric limits of the model family).
pub mod common;
/// Engine configuration (defaults, calibration and identification tuning).
pub mod config;
/// Instruction categories, mixes and workload profiles.
pub mod mix;
/// Analytical queueing formulas (unbounded and capacity-bounded single-server queues).
pub mod queue;
/// Stage and pipeline specifications, service-time aggregation and the analyzer.
pub mod pipeline;
/// Arrival-rate calibration and multi-parameter identification.
pub mod calibrate;
/// Processor description loading, sensitivity analysis and sweeps.
pub mod sim;
/// Human-readable and JSON reporting of model results.
pub mod report;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Error type shared by every fallible operation in the crate.
pub use crate::common::error::{ModelError, Result};
/// Main analyzer; evaluates a pipeline at an arrival rate.
pub use crate::pipeline::{PipelineAnalyzer, PredictionResult};
/// Bisection calibrator over the arrival rate.
pub use crate::calibrate::{CalibrationResult, Calibrator};
/// Declarative processor description; the usual entry point for callers.
pub use crate::sim::description::ProcessorDescription;
