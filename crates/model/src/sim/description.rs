//! Processor description loading.
//!
//! A processor description is the declarative table every prediction starts
//! from: category costs and weights, the stage list, the ceiling rule and any
//! named workload profiles. It is read from JSON:
//!
//! ```json
//! {
//!   "name": "example-cpu",
//!   "clock_mhz": 8.0,
//!   "ceiling": "sum_of_service_times",
//!   "fallback_cycles": 6.0,
//!   "categories": { "alu": { "cycles": 3.0, "weight": 0.5 } },
//!   "stages": [
//!     { "name": "prefetch", "categories": ["fetch"], "capacity": 6 },
//!     { "name": "execute", "categories": ["alu", "memory"], "penalty": 1.5 }
//!   ],
//!   "workloads": { "typical": { "alu": 0.5 } },
//!   "measured_ipc": 0.12
//! }
//! ```
//!
//! Everything is validated on load; a description that parses is safe to analyze.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::common::error::{ModelError, Result, ensure_positive};
use crate::config::ModelConfig;
use crate::mix::{Category, InstructionMix, WorkloadProfile};
use crate::pipeline::{CeilingRule, PipelineSpec, StageSpec};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCategory {
    cycles: f64,
    weight: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStage {
    name: String,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    capacity: Option<u32>,
    #[serde(default)]
    penalty: f64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDescription {
    name: String,
    #[serde(default)]
    clock_mhz: Option<f64>,
    #[serde(default)]
    ceiling: CeilingRule,
    #[serde(default)]
    fallback_cycles: Option<f64>,
    categories: BTreeMap<String, RawCategory>,
    stages: Vec<RawStage>,
    #[serde(default)]
    workloads: BTreeMap<String, BTreeMap<String, f64>>,
    #[serde(default)]
    measured_ipc: Option<f64>,
}

/// A validated processor description.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorDescription {
    name: String,
    clock_mhz: Option<f64>,
    fallback_cycles: Option<f64>,
    measured_ipc: Option<f64>,
    spec: PipelineSpec,
    mix: InstructionMix,
    workloads: BTreeMap<String, WorkloadProfile>,
}

impl ProcessorDescription {
    /// Parses and validates a description from JSON text.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed JSON or unknown fields; `UnknownCategory` when a stage
    /// or workload refers to a category the table lacks; any pipeline or category
    /// validation error otherwise.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawDescription = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Reads, parses and validates a description file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&text)
    }

    fn from_raw(raw: RawDescription) -> Result<Self> {
        if let Some(clock) = raw.clock_mhz {
            ensure_positive("clock_mhz", clock)?;
        }
        if let Some(fallback) = raw.fallback_cycles {
            ensure_positive("fallback_cycles", fallback)?;
        }
        if let Some(measured) = raw.measured_ipc {
            ensure_positive("measured_ipc", measured)?;
        }

        let mix = InstructionMix::from_categories(
            raw.categories
                .into_iter()
                .map(|(name, c)| Category::new(name, c.cycles, c.weight))
                .collect::<Result<Vec<_>>>()?,
        )?;

        let mut stages = Vec::with_capacity(raw.stages.len());
        for stage in raw.stages {
            if let Some(unknown) = stage.categories.iter().find(|c| !mix.contains(c)) {
                return Err(ModelError::UnknownCategory {
                    name: unknown.clone(),
                });
            }
            let spec = match stage.capacity {
                Some(capacity) => StageSpec::bounded(stage.name, stage.categories, capacity),
                None => StageSpec::series(stage.name, stage.categories),
            };
            stages.push(spec.with_penalty(stage.penalty));
        }
        let spec = PipelineSpec::new(raw.name.clone(), stages, raw.ceiling)?;

        let mut workloads = BTreeMap::new();
        for (name, weights) in raw.workloads {
            let profile = WorkloadProfile::new(name.clone(), weights)?;
            let _ = profile.apply(&mix)?;
            let _ = workloads.insert(name, profile);
        }

        Ok(Self {
            name: raw.name,
            clock_mhz: raw.clock_mhz,
            fallback_cycles: raw.fallback_cycles,
            measured_ipc: raw.measured_ipc,
            spec,
            mix,
            workloads,
        })
    }

    /// Processor name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The pipeline.
    pub const fn pipeline_spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// The base instruction mix.
    pub const fn instruction_mix(&self) -> &InstructionMix {
        &self.mix
    }

    /// Measured IPC recorded with the description, if any.
    pub const fn measured_ipc(&self) -> Option<f64> {
        self.measured_ipc
    }

    /// Looks up a workload profile.
    pub fn workload(&self, name: &str) -> Result<&WorkloadProfile> {
        self.workloads
            .get(name)
            .ok_or_else(|| ModelError::UnknownWorkload {
                name: name.to_string(),
            })
    }

    /// Names of the declared workload profiles, in lexical order.
    pub fn workload_names(&self) -> impl Iterator<Item = &str> {
        self.workloads.keys().map(String::as_str)
    }

    /// The base mix re-weighted by a named workload profile.
    pub fn mix_for_workload(&self, name: &str) -> Result<InstructionMix> {
        self.workload(name)?.apply(&self.mix)
    }

    /// Fallback service time: the description's own value, else the configured one.
    pub fn fallback_cycles(&self, config: &ModelConfig) -> f64 {
        self.fallback_cycles.unwrap_or(config.fallback_cycles)
    }

    /// Clock frequency: the description's own value, else the configured one.
    pub fn clock_mhz(&self, config: &ModelConfig) -> f64 {
        self.clock_mhz.unwrap_or(config.clock_mhz)
    }
}
