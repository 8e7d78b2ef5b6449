//! Configuration system for the pipeline model.
//!
//! This module defines the tuning knobs of the engine. It provides:
//! 1. **Defaults:** Baseline constants for clock, fallback costs and the calibration search.
//! 2. **Structures:** Hierarchical config for the model, the calibrator and the identifier.
//!
//! Configuration is supplied as JSON (`Config::load`) or built with `Config::default()`.
//! Processor-specific data (categories, stages, workloads) lives in
//! [`ProcessorDescription`](crate::sim::description::ProcessorDescription), not here.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::common::error::{ModelError, Result, ensure_non_negative, ensure_positive};

/// Default configuration constants for the engine.
///
/// These values apply whenever a field is omitted from a JSON configuration.
mod defaults {
    /// Clock frequency used to convert IPC into MIPS (1 MHz, so MIPS equals IPC).
    pub const CLOCK_MHZ: f64 = 1.0;

    /// Service time, in cycles, of a stage none of whose categories carry weight.
    ///
    /// Per-processor descriptions normally override this with a value between 4 and 12.
    pub const FALLBACK_CYCLES: f64 = 8.0;

    /// Arrival rate (instructions per cycle) at which one-off predictions are evaluated.
    pub const ARRIVAL_RATE: f64 = 0.1;

    /// Calibration acceptance band, in percent of the measured IPC.
    pub const TOLERANCE_PERCENT: f64 = 2.0;

    /// Calibration iteration budget (model evaluations).
    pub const MAX_ITERATIONS: usize = 50;

    /// First arrival rate tried by the calibrator, before clamping into the search range.
    pub const INITIAL_GUESS: f64 = 0.1;

    /// Hard upper bound on the calibrated arrival rate.
    ///
    /// No pipeline in this model family sustains one instruction per cycle.
    pub const RATE_CEILING: f64 = 0.95;

    /// Fraction of the slowest stage's saturation rate used as the upper search bound.
    pub const STABLE_FRACTION: f64 = 0.95;

    /// Fraction of the upper search bound used to cap the seed rate.
    pub const SEED_FRACTION: f64 = 0.9;

    /// Lower search bound for the arrival rate.
    pub const SEARCH_FLOOR: f64 = 0.01;

    /// Search interval width below which bisection stops.
    pub const COLLAPSE_WIDTH: f64 = 1e-6;

    /// Maximum number of full coordinate-descent sweeps.
    pub const MAX_SWEEPS: usize = 20;

    /// Golden-section iterations per coordinate line search.
    pub const LINE_SEARCH_ITERATIONS: usize = 48;

    /// Relative loss improvement per sweep below which identification has converged.
    pub const LOSS_TOLERANCE: f64 = 1e-9;

    /// Residual charged to a measurement whose prediction is unstable.
    pub const UNSTABLE_RESIDUAL: f64 = 10.0;
}

/// Root configuration structure containing all engine settings.
///
/// # Examples
///
/// Creating a default configuration:
///
/// ```
/// use ipcq_core::config::Config;
///
/// let config = Config::default();
/// assert_eq!(config.calibration.max_iterations, 50);
/// assert_eq!(config.model.fallback_cycles, 8.0);
/// ```
///
/// Deserializing a partial JSON document (omitted fields keep their defaults):
///
/// ```
/// use ipcq_core::config::Config;
///
/// let json = r#"{
///     "model": { "clock_mhz": 8.0 },
///     "calibration": { "tolerance_percent": 0.5, "max_iterations": 200 }
/// }"#;
///
/// let config = Config::from_json_str(json).unwrap();
/// assert_eq!(config.model.clock_mhz, 8.0);
/// assert_eq!(config.calibration.tolerance_percent, 0.5);
/// assert_eq!(config.calibration.rate_ceiling, 0.95);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Model evaluation settings
    #[serde(default)]
    pub model: ModelConfig,
    /// Arrival-rate calibration settings
    #[serde(default)]
    pub calibration: CalibrationConfig,
    /// Multi-parameter identification settings
    #[serde(default)]
    pub identification: IdentificationConfig,
}

impl Config {
    /// Parses and validates a JSON configuration document.
    ///
    /// # Arguments
    ///
    /// * `json` - The JSON text.
    ///
    /// # Returns
    ///
    /// The validated configuration, or a parse / argument error.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks every numeric field against its admissible range.
    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.calibration.validate()?;
        self.identification.validate()
    }
}

/// Model evaluation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Clock frequency in MHz, used to convert IPC into MIPS
    #[serde(default = "ModelConfig::default_clock_mhz")]
    pub clock_mhz: f64,

    /// Service time of a stage whose categories are all absent from the mix
    #[serde(default = "ModelConfig::default_fallback_cycles")]
    pub fallback_cycles: f64,

    /// Arrival rate for one-off predictions
    #[serde(default = "ModelConfig::default_arrival_rate")]
    pub arrival_rate: f64,
}

impl ModelConfig {
    /// Returns the default clock frequency in MHz.
    const fn default_clock_mhz() -> f64 {
        defaults::CLOCK_MHZ
    }

    /// Returns the default fallback service time in cycles.
    const fn default_fallback_cycles() -> f64 {
        defaults::FALLBACK_CYCLES
    }

    /// Returns the default prediction arrival rate.
    const fn default_arrival_rate() -> f64 {
        defaults::ARRIVAL_RATE
    }

    fn validate(&self) -> Result<()> {
        ensure_positive("model.clock_mhz", self.clock_mhz)?;
        ensure_positive("model.fallback_cycles", self.fallback_cycles)?;
        ensure_non_negative("model.arrival_rate", self.arrival_rate)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            clock_mhz: defaults::CLOCK_MHZ,
            fallback_cycles: defaults::FALLBACK_CYCLES,
            arrival_rate: defaults::ARRIVAL_RATE,
        }
    }
}

/// Arrival-rate calibration settings.
///
/// The search range is `[min(search_floor, high / 2), high]` with
/// `high = min(stable_fraction / max_service_time, rate_ceiling)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    /// Acceptance band in percent of the measured IPC
    #[serde(default = "CalibrationConfig::default_tolerance_percent")]
    pub tolerance_percent: f64,

    /// Maximum number of model evaluations
    #[serde(default = "CalibrationConfig::default_max_iterations")]
    pub max_iterations: usize,

    /// Seed arrival rate before clamping
    #[serde(default = "CalibrationConfig::default_initial_guess")]
    pub initial_guess: f64,

    /// Hard ceiling on the arrival rate
    #[serde(default = "CalibrationConfig::default_rate_ceiling")]
    pub rate_ceiling: f64,

    /// Fraction of the slowest stage's saturation rate used as the upper bound
    #[serde(default = "CalibrationConfig::default_stable_fraction")]
    pub stable_fraction: f64,

    /// Fraction of the upper bound that caps the seed
    #[serde(default = "CalibrationConfig::default_seed_fraction")]
    pub seed_fraction: f64,

    /// Lower bound of the search range
    #[serde(default = "CalibrationConfig::default_search_floor")]
    pub search_floor: f64,

    /// Interval width at which bisection gives up
    #[serde(default = "CalibrationConfig::default_collapse_width")]
    pub collapse_width: f64,
}

impl CalibrationConfig {
    const fn default_tolerance_percent() -> f64 {
        defaults::TOLERANCE_PERCENT
    }

    const fn default_max_iterations() -> usize {
        defaults::MAX_ITERATIONS
    }

    const fn default_initial_guess() -> f64 {
        defaults::INITIAL_GUESS
    }

    const fn default_rate_ceiling() -> f64 {
        defaults::RATE_CEILING
    }

    const fn default_stable_fraction() -> f64 {
        defaults::STABLE_FRACTION
    }

    const fn default_seed_fraction() -> f64 {
        defaults::SEED_FRACTION
    }

    const fn default_search_floor() -> f64 {
        defaults::SEARCH_FLOOR
    }

    const fn default_collapse_width() -> f64 {
        defaults::COLLAPSE_WIDTH
    }

    fn validate(&self) -> Result<()> {
        ensure_positive("calibration.tolerance_percent", self.tolerance_percent)?;
        if self.max_iterations == 0 {
            return Err(ModelError::invalid(
                "calibration.max_iterations",
                "must be at least 1",
            ));
        }
        ensure_positive("calibration.initial_guess", self.initial_guess)?;
        ensure_positive("calibration.rate_ceiling", self.rate_ceiling)?;
        ensure_positive("calibration.search_floor", self.search_floor)?;
        ensure_positive("calibration.collapse_width", self.collapse_width)?;
        for (name, value) in [
            ("calibration.stable_fraction", self.stable_fraction),
            ("calibration.seed_fraction", self.seed_fraction),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(ModelError::invalid(
                    name,
                    format!("must lie in (0, 1], got {value}"),
                ));
            }
        }
        Ok(())
    }
}

impl Default for CalibrationConfig {
    /// Creates the default calibration configuration.
    ///
    /// A 2 % band, 50 evaluations, and a search range capped at 0.95 instructions per cycle.
    fn default() -> Self {
        Self {
            tolerance_percent: defaults::TOLERANCE_PERCENT,
            max_iterations: defaults::MAX_ITERATIONS,
            initial_guess: defaults::INITIAL_GUESS,
            rate_ceiling: defaults::RATE_CEILING,
            stable_fraction: defaults::STABLE_FRACTION,
            seed_fraction: defaults::SEED_FRACTION,
            search_floor: defaults::SEARCH_FLOOR,
            collapse_width: defaults::COLLAPSE_WIDTH,
        }
    }
}

/// Multi-parameter identification settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationConfig {
    /// Maximum number of coordinate-descent sweeps
    #[serde(default = "IdentificationConfig::default_max_sweeps")]
    pub max_sweeps: usize,

    /// Golden-section iterations per coordinate
    #[serde(default = "IdentificationConfig::default_line_search_iterations")]
    pub line_search_iterations: usize,

    /// Relative per-sweep loss improvement that counts as converged
    #[serde(default = "IdentificationConfig::default_loss_tolerance")]
    pub loss_tolerance: f64,

    /// Residual charged when a prediction is unstable
    #[serde(default = "IdentificationConfig::default_unstable_residual")]
    pub unstable_residual: f64,
}

impl IdentificationConfig {
    const fn default_max_sweeps() -> usize {
        defaults::MAX_SWEEPS
    }

    const fn default_line_search_iterations() -> usize {
        defaults::LINE_SEARCH_ITERATIONS
    }

    const fn default_loss_tolerance() -> f64 {
        defaults::LOSS_TOLERANCE
    }

    const fn default_unstable_residual() -> f64 {
        defaults::UNSTABLE_RESIDUAL
    }

    fn validate(&self) -> Result<()> {
        if self.max_sweeps == 0 {
            return Err(ModelError::invalid(
                "identification.max_sweeps",
                "must be at least 1",
            ));
        }
        if self.line_search_iterations == 0 {
            return Err(ModelError::invalid(
                "identification.line_search_iterations",
                "must be at least 1",
            ));
        }
        ensure_non_negative("identification.loss_tolerance", self.loss_tolerance)?;
        ensure_positive("identification.unstable_residual", self.unstable_residual)
    }
}

impl Default for IdentificationConfig {
    fn default() -> Self {
        Self {
            max_sweeps: defaults::MAX_SWEEPS,
            line_search_iterations: defaults::LINE_SEARCH_ITERATIONS,
            loss_tolerance: defaults::LOSS_TOLERANCE,
            unstable_residual: defaults::UNSTABLE_RESIDUAL,
        }
    }
}
