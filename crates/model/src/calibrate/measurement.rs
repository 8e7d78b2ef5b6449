//! Measurement sources for parameter identification.
//!
//! Three shapes of evidence are supported, each reduced to one relative residual:
//! 1. **Aggregate CPI:** A single cycles-per-instruction figure for the whole mix.
//! 2. **Instruction timings:** Observed cycle counts per instruction category.
//! 3. **Benchmark suite:** Measured IPC of end-to-end runs, each with its own workload profile.

use serde::{Deserialize, Serialize};

use crate::common::error::{ModelError, Result, ensure_positive};
use crate::mix::{InstructionMix, WorkloadProfile};

/// Observed timing of one instruction category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstructionTiming {
    /// Category name in the mix.
    pub category: String,
    /// Observed cycles per instruction.
    pub observed_cycles: f64,
}

/// Measured IPC of one benchmark run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRun {
    /// Benchmark name.
    pub name: String,
    /// Instruction mix weights of the benchmark.
    pub workload: WorkloadProfile,
    /// Measured instructions per cycle.
    pub measured_ipc: f64,
}

/// One kind of measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Measurement {
    /// Aggregate cycles per instruction for the base mix.
    AggregateCpi {
        /// Measured CPI.
        cpi: f64,
    },
    /// Per-category timings, compared against the mix's costs.
    InstructionTimings {
        /// Observed timings.
        timings: Vec<InstructionTiming>,
    },
    /// End-to-end benchmark results.
    BenchmarkSuite {
        /// Benchmark runs.
        runs: Vec<BenchmarkRun>,
    },
}

/// A weighted, named measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSource {
    /// Source name used in residual reports.
    pub name: String,
    /// Relative weight in the loss.
    #[serde(default = "MeasurementSource::default_weight")]
    pub weight: f64,
    /// The measurement itself.
    pub measurement: Measurement,
}

impl MeasurementSource {
    const fn default_weight() -> f64 {
        1.0
    }

    /// Creates a source with weight one.
    pub fn new(name: impl Into<String>, measurement: Measurement) -> Self {
        Self {
            name: name.into(),
            weight: Self::default_weight(),
            measurement,
        }
    }

    /// Sets the loss weight.
    #[must_use]
    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = weight;
        self
    }

    /// Checks the source against the mix it will be compared with.
    pub(crate) fn validate(&self, mix: &InstructionMix) -> Result<()> {
        ensure_positive(&format!("{}.weight", self.name), self.weight)?;
        match &self.measurement {
            Measurement::AggregateCpi { cpi } => {
                ensure_positive(&format!("{}.cpi", self.name), *cpi)
            }
            Measurement::InstructionTimings { timings } => {
                if timings.is_empty() {
                    return Err(ModelError::invalid(
                        format!("{}.timings", self.name),
                        "must not be empty",
                    ));
                }
                for timing in timings {
                    let _ = mix.require(&timing.category)?;
                    ensure_positive(
                        &format!("{}.{}.observed_cycles", self.name, timing.category),
                        timing.observed_cycles,
                    )?;
                }
                Ok(())
            }
            Measurement::BenchmarkSuite { runs } => {
                if runs.is_empty() {
                    return Err(ModelError::invalid(
                        format!("{}.runs", self.name),
                        "must not be empty",
                    ));
                }
                for run in runs {
                    ensure_positive(
                        &format!("{}.{}.measured_ipc", self.name, run.name),
                        run.measured_ipc,
                    )?;
                    let _ = run.workload.apply(mix)?;
                }
                Ok(())
            }
        }
    }
}
