//! Stage and pipeline specifications.
//!
//! A [`PipelineSpec`] is an ordered list of [`StageSpec`]s plus the declared
//! IPC ceiling rule. Series stages are traversed one after the other; at most
//! one stage may carry a capacity, marking it as a bounded prefetch buffer that
//! runs concurrently with the series chain.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::common::error::{ModelError, Result, ensure_non_negative};

/// How the theoretical IPC ceiling is derived from the series service times.
///
/// Processor timing documentation decides which rule applies; the two give
/// materially different numbers and neither is a default truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CeilingRule {
    /// `1 / sum(S)`: an instruction occupies every series stage before the next completes.
    #[default]
    #[serde(alias = "sum")]
    SumOfServiceTimes,
    /// `1 / max(S)`: series stages overlap and the slowest one limits completion.
    #[serde(alias = "max", alias = "bottleneck")]
    BottleneckServiceTime,
}

impl CeilingRule {
    /// Evaluates the ceiling for the given series service times.
    ///
    /// # Arguments
    ///
    /// * `series_service_times` - Service times of the series stages, in cycles.
    ///
    /// # Returns
    ///
    /// The maximum attainable IPC, or `f64::INFINITY` if the slice is empty or all zero.
    pub fn ceiling(self, series_service_times: &[f64]) -> f64 {
        let limit = match self {
            Self::SumOfServiceTimes => series_service_times.iter().sum::<f64>(),
            Self::BottleneckServiceTime => series_service_times.iter().copied().fold(0.0, f64::max),
        };
        if limit > 0.0 {
            1.0 / limit
        } else {
            f64::INFINITY
        }
    }

    /// Short label used in reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::SumOfServiceTimes => "sum",
            Self::BottleneckServiceTime => "max",
        }
    }
}

/// Structural shape of a pipeline, derived from its stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Series stages only.
    Series,
    /// Series stages plus one bounded prefetch stage running in parallel.
    SeriesWithPrefetch,
}

/// Queueing discipline of a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Unbounded M/M/1 stage on the series chain.
    Series,
    /// Capacity-bounded M/M/1/K stage running alongside the chain.
    Bounded,
}

impl StageKind {
    /// Short label used in reports.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Series => "series",
            Self::Bounded => "bounded",
        }
    }
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSpec {
    /// Stage name, unique within a pipeline.
    pub name: String,
    /// Categories whose weighted cost make up this stage's service time.
    pub included_categories: BTreeSet<String>,
    /// Capacity `K` in slots; presence makes the stage bounded.
    pub capacity: Option<u32>,
    /// Cycles added unconditionally to the service time (wait states, miss penalty).
    pub fixed_penalty: f64,
}

impl StageSpec {
    /// Creates an unbounded series stage.
    ///
    /// # Arguments
    ///
    /// * `name` - Stage name.
    /// * `categories` - Names of the categories served by this stage.
    pub fn series<I, S>(name: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            included_categories: categories.into_iter().map(Into::into).collect(),
            capacity: None,
            fixed_penalty: 0.0,
        }
    }

    /// Creates a bounded stage holding at most `capacity` items.
    pub fn bounded<I, S>(name: impl Into<String>, categories: I, capacity: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            capacity: Some(capacity),
            ..Self::series(name, categories)
        }
    }

    /// Sets the fixed penalty added to the service time.
    #[must_use]
    pub fn with_penalty(mut self, fixed_penalty: f64) -> Self {
        self.fixed_penalty = fixed_penalty;
        self
    }

    /// Queueing discipline of this stage.
    pub const fn kind(&self) -> StageKind {
        if self.capacity.is_some() {
            StageKind::Bounded
        } else {
            StageKind::Series
        }
    }

    /// Returns `true` if the stage has a capacity.
    pub const fn is_bounded(&self) -> bool {
        self.capacity.is_some()
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(ModelError::invalid("stage.name", "must not be empty"));
        }
        ensure_non_negative(&format!("{}.fixed_penalty", self.name), self.fixed_penalty)?;
        if self.capacity == Some(0) {
            return Err(ModelError::invalid(
                format!("{}.capacity", self.name),
                "must be a positive number of slots",
            ));
        }
        Ok(())
    }
}

/// Validated, immutable pipeline description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineSpec {
    name: String,
    stages: Vec<StageSpec>,
    ceiling: CeilingRule,
}

impl PipelineSpec {
    /// Builds a pipeline, enforcing its structural invariants.
    ///
    /// # Arguments
    ///
    /// * `name` - Pipeline (processor) name.
    /// * `stages` - Stages in pipeline order.
    /// * `ceiling` - The IPC ceiling rule declared for this processor.
    ///
    /// # Errors
    ///
    /// `EmptyPipeline` with no stages, `NoSeriesStage` when every stage is bounded,
    /// `MultipleBoundedStages` with more than one bounded stage, `DuplicateName`
    /// for repeated stage names, and `InvalidArgument` for a zero capacity or a
    /// negative penalty.
    pub fn new(
        name: impl Into<String>,
        stages: Vec<StageSpec>,
        ceiling: CeilingRule,
    ) -> Result<Self> {
        if stages.is_empty() {
            return Err(ModelError::EmptyPipeline);
        }
        let mut names = BTreeSet::new();
        for stage in &stages {
            stage.validate()?;
            if !names.insert(stage.name.as_str()) {
                return Err(ModelError::DuplicateName {
                    kind: "stage",
                    name: stage.name.clone(),
                });
            }
        }
        let bounded = stages.iter().filter(|s| s.is_bounded()).count();
        if bounded > 1 {
            return Err(ModelError::MultipleBoundedStages { count: bounded });
        }
        if bounded == stages.len() {
            return Err(ModelError::NoSeriesStage);
        }
        Ok(Self {
            name: name.into(),
            stages,
            ceiling,
        })
    }

    /// Pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stages in pipeline order.
    pub fn stages(&self) -> &[StageSpec] {
        &self.stages
    }

    /// Declared ceiling rule.
    pub const fn ceiling(&self) -> CeilingRule {
        self.ceiling
    }

    /// Structural shape of the pipeline.
    pub fn topology(&self) -> Topology {
        if self.bounded_stage().is_some() {
            Topology::SeriesWithPrefetch
        } else {
            Topology::Series
        }
    }

    /// The bounded stage, if any.
    pub fn bounded_stage(&self) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.is_bounded())
    }

    /// Iterates the series stages in order.
    pub fn series_stages(&self) -> impl Iterator<Item = &StageSpec> {
        self.stages.iter().filter(|s| !s.is_bounded())
    }

    /// Looks up a stage by name.
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Returns a copy with one stage's fixed penalty replaced.
    ///
    /// # Arguments
    ///
    /// * `stage` - Existing stage name.
    /// * `fixed_penalty` - New penalty in cycles; must be finite and >= 0.
    pub fn with_stage_penalty(&self, stage: &str, fixed_penalty: f64) -> Result<Self> {
        ensure_non_negative(&format!("{stage}.fixed_penalty"), fixed_penalty)?;
        let mut spec = self.clone();
        let target = spec
            .stages
            .iter_mut()
            .find(|s| s.name == stage)
            .ok_or_else(|| ModelError::UnknownStage {
                name: stage.to_string(),
            })?;
        target.fixed_penalty = fixed_penalty;
        Ok(spec)
    }
}
