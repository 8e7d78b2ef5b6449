//! Multi-parameter identification.
//!
//! Fits a vector of free model parameters (arrival rate, category costs, stage
//! penalties) to several measurement sources at once. The loss is the
//! weight-averaged square of per-source relative residuals; it is minimised by
//! cyclic coordinate descent with a golden-section line search per coordinate,
//! each coordinate confined to its declared bounds.
//!
//! Like the calibrator, the search is deterministic, bounded in work, and only
//! ever moves to a strictly better point, so the returned fit is the best seen.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::measurement::{Measurement, MeasurementSource};
use crate::common::error::{ModelError, Result, ensure_non_negative, ensure_positive};
use crate::config::IdentificationConfig;
use crate::mix::InstructionMix;
use crate::pipeline::{PipelineAnalyzer, PipelineSpec, ThroughputModel};

/// `1 / phi`, the golden-section shrink factor.
const INV_PHI: f64 = 0.618_033_988_749_894_9;

/// A model quantity the identifier may adjust.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Parameter {
    /// The arrival rate offered to the pipeline.
    ArrivalRate,
    /// The service cost of one instruction category.
    CategoryCost {
        /// Category name.
        category: String,
    },
    /// The fixed penalty of one stage.
    StagePenalty {
        /// Stage name.
        stage: String,
    },
}

impl Parameter {
    /// Human-readable label (`arrival_rate`, `cost[alu]`, `penalty[execute]`).
    pub fn label(&self) -> String {
        match self {
            Self::ArrivalRate => "arrival_rate".to_string(),
            Self::CategoryCost { category } => format!("cost[{category}]"),
            Self::StagePenalty { stage } => format!("penalty[{stage}]"),
        }
    }
}

/// A free parameter with its search box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreeParameter {
    /// The quantity being fitted.
    pub parameter: Parameter,
    /// Starting value; clamped into `[lower, upper]`.
    pub initial: f64,
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl FreeParameter {
    /// Creates a free parameter.
    pub const fn new(parameter: Parameter, initial: f64, lower: f64, upper: f64) -> Self {
        Self {
            parameter,
            initial,
            lower,
            upper,
        }
    }

    fn start(&self) -> f64 {
        self.initial.clamp(self.lower, self.upper)
    }
}

/// Final value of one fitted parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FittedParameter {
    /// The quantity.
    pub parameter: Parameter,
    /// Starting value after clamping.
    pub initial: f64,
    /// Fitted value.
    pub value: f64,
}

/// Residual of one measurement source at the fitted point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceResidual {
    /// Source name.
    pub name: String,
    /// Loss weight.
    pub weight: f64,
    /// Relative residual (signed for aggregate CPI, RMS for the others).
    pub residual: f64,
}

/// Outcome of an identification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IdentificationResult {
    /// Fitted parameters in the order they were declared.
    pub parameters: Vec<FittedParameter>,
    /// Per-source residuals at the fitted point.
    pub residuals: Vec<SourceResidual>,
    /// Loss at the starting point.
    pub initial_loss: f64,
    /// Loss at the fitted point.
    pub loss: f64,
    /// Coordinate-descent sweeps performed.
    pub sweeps: usize,
    /// Loss evaluations performed.
    pub evaluations: usize,
    /// `true` when a sweep stopped improving the loss before the sweep budget ran out.
    pub converged: bool,
}

impl IdentificationResult {
    /// Fitted value of a parameter, if it was free.
    pub fn value_of(&self, parameter: &Parameter) -> Option<f64> {
        self.parameters
            .iter()
            .find(|p| &p.parameter == parameter)
            .map(|p| p.value)
    }
}

/// A fully parameterised model instance.
struct Candidate {
    spec: PipelineSpec,
    mix: InstructionMix,
    arrival_rate: f64,
}

/// Fits free parameters of a pipeline to measurements.
#[derive(Debug, Clone)]
pub struct Identifier<'a> {
    spec: &'a PipelineSpec,
    mix: &'a InstructionMix,
    fallback_cycles: f64,
    arrival_rate: f64,
    config: IdentificationConfig,
}

impl<'a> Identifier<'a> {
    /// Creates an identifier.
    ///
    /// # Arguments
    ///
    /// * `spec` - Base pipeline.
    /// * `mix` - Base instruction mix.
    /// * `fallback_cycles` - Fallback service time; must be > 0.
    /// * `arrival_rate` - Rate used when the arrival rate is not itself a free parameter; must be > 0.
    pub fn new(
        spec: &'a PipelineSpec,
        mix: &'a InstructionMix,
        fallback_cycles: f64,
        arrival_rate: f64,
    ) -> Result<Self> {
        ensure_positive("fallback_cycles", fallback_cycles)?;
        ensure_positive("arrival_rate", arrival_rate)?;
        Ok(Self {
            spec,
            mix,
            fallback_cycles,
            arrival_rate,
            config: IdentificationConfig::default(),
        })
    }

    /// Replaces the search settings.
    #[must_use]
    pub fn with_config(mut self, config: IdentificationConfig) -> Self {
        self.config = config;
        self
    }

    /// Evaluates the loss and per-source residuals at explicit parameter values.
    ///
    /// # Arguments
    ///
    /// * `free` - Free parameter declarations.
    /// * `values` - One value per declaration, in the same order.
    /// * `sources` - Measurements to compare against.
    pub fn loss(
        &self,
        free: &[FreeParameter],
        values: &[f64],
        sources: &[MeasurementSource],
    ) -> Result<(f64, Vec<SourceResidual>)> {
        if free.len() != values.len() {
            return Err(ModelError::invalid(
                "values",
                format!("expected {} values, got {}", free.len(), values.len()),
            ));
        }
        let candidate = self.candidate(free, values)?;
        let mut residuals = Vec::with_capacity(sources.len());
        let mut weighted = 0.0;
        let mut total_weight = 0.0;
        for source in sources {
            let residual = self.residual(&candidate, &source.measurement)?;
            weighted += source.weight * residual * residual;
            total_weight += source.weight;
            residuals.push(SourceResidual {
                name: source.name.clone(),
                weight: source.weight,
                residual,
            });
        }
        let loss = if total_weight > 0.0 {
            weighted / total_weight
        } else {
            0.0
        };
        Ok((loss, residuals))
    }

    /// Fits `free` to `sources`.
    ///
    /// # Arguments
    ///
    /// * `free` - Parameters to fit, each with bounds; names must be unique.
    /// * `sources` - Measurements; at least one, each with a positive weight.
    ///
    /// # Returns
    ///
    /// Fitted values, per-source residuals and a convergence flag. Non-convergence
    /// is reported, not raised.
    pub fn identify(
        &self,
        free: &[FreeParameter],
        sources: &[MeasurementSource],
    ) -> Result<IdentificationResult> {
        self.validate(free, sources)?;

        let fallback =
            PipelineAnalyzer::new(self.spec, self.mix, self.fallback_cycles)?.fallback_stages();
        if !fallback.is_empty() {
            warn!(
                stages = ?fallback,
                "identifying with fallback service times; check the category table"
            );
        }

        let mut values: Vec<f64> = free.iter().map(FreeParameter::start).collect();
        let mut evaluations = 1;
        let (initial_loss, _) = self.loss(free, &values, sources)?;
        let mut loss = initial_loss;
        let mut sweeps = 0;
        let mut converged = loss == 0.0;

        while !converged && sweeps < self.config.max_sweeps {
            sweeps += 1;
            let sweep_start = loss;
            for (index, parameter) in free.iter().enumerate() {
                let mut trial = values.clone();
                let (x, fx) = golden_section(
                    |x| {
                        evaluations += 1;
                        trial[index] = x;
                        Ok(self.loss(free, &trial, sources)?.0)
                    },
                    parameter.lower,
                    parameter.upper,
                    self.config.line_search_iterations,
                )?;
                if fx < loss {
                    values[index] = x;
                    loss = fx;
                }
            }
            let improvement = sweep_start - loss;
            debug!(sweep = sweeps, loss, improvement, "identification sweep");
            if loss == 0.0 || improvement <= self.config.loss_tolerance * sweep_start {
                converged = true;
            }
        }

        if !converged {
            warn!(sweeps, loss, "identification stopped at the sweep budget");
        }

        let (loss, residuals) = self.loss(free, &values, sources)?;
        evaluations += 1;
        info!(initial_loss, loss, sweeps, evaluations, converged, "identification finished");

        Ok(IdentificationResult {
            parameters: free
                .iter()
                .zip(&values)
                .map(|(p, &value)| FittedParameter {
                    parameter: p.parameter.clone(),
                    initial: p.start(),
                    value,
                })
                .collect(),
            residuals,
            initial_loss,
            loss,
            sweeps,
            evaluations,
            converged,
        })
    }

    fn validate(&self, free: &[FreeParameter], sources: &[MeasurementSource]) -> Result<()> {
        if free.is_empty() {
            return Err(ModelError::invalid("free", "at least one free parameter is required"));
        }
        if sources.is_empty() {
            return Err(ModelError::invalid(
                "sources",
                "at least one measurement source is required",
            ));
        }
        let mut seen = BTreeSet::new();
        for p in free {
            let label = p.parameter.label();
            if !(p.lower.is_finite() && p.upper.is_finite() && p.lower < p.upper) {
                return Err(ModelError::invalid(
                    label,
                    format!("bounds [{}, {}] must be finite with lower < upper", p.lower, p.upper),
                ));
            }
            if !p.initial.is_finite() {
                return Err(ModelError::invalid(label, "initial value must be finite"));
            }
            match &p.parameter {
                Parameter::ArrivalRate => ensure_non_negative(&label, p.lower)?,
                Parameter::CategoryCost { category } => {
                    let _ = self.mix.require(category)?;
                    ensure_positive(&label, p.lower)?;
                }
                Parameter::StagePenalty { stage } => {
                    if self.spec.stage(stage).is_none() {
                        return Err(ModelError::UnknownStage { name: stage.clone() });
                    }
                    ensure_non_negative(&label, p.lower)?;
                }
            }
            if !seen.insert(label.clone()) {
                return Err(ModelError::DuplicateName {
                    kind: "parameter",
                    name: label,
                });
            }
        }
        for source in sources {
            source.validate(self.mix)?;
        }
        Ok(())
    }

    fn candidate(&self, free: &[FreeParameter], values: &[f64]) -> Result<Candidate> {
        let mut candidate = Candidate {
            spec: self.spec.clone(),
            mix: self.mix.clone(),
            arrival_rate: self.arrival_rate,
        };
        for (p, &value) in free.iter().zip(values) {
            match &p.parameter {
                Parameter::ArrivalRate => candidate.arrival_rate = value,
                Parameter::CategoryCost { category } => {
                    candidate.mix.set_service_cost(category, value)?;
                }
                Parameter::StagePenalty { stage } => {
                    candidate.spec = candidate.spec.with_stage_penalty(stage, value)?;
                }
            }
        }
        Ok(candidate)
    }

    fn residual(&self, candidate: &Candidate, measurement: &Measurement) -> Result<f64> {
        match measurement {
            Measurement::AggregateCpi { cpi } => {
                let ipc =
                    self.predict_ipc(&candidate.spec, &candidate.mix, candidate.arrival_rate)?;
                Ok(ipc.map_or(self.config.unstable_residual, |ipc| (1.0 / ipc - cpi) / cpi))
            }
            Measurement::InstructionTimings { timings } => {
                let mut sum = 0.0;
                for timing in timings {
                    let modelled = candidate.mix.require(&timing.category)?.service_cost;
                    let r = (modelled - timing.observed_cycles) / timing.observed_cycles;
                    sum += r * r;
                }
                Ok((sum / timings.len() as f64).sqrt())
            }
            Measurement::BenchmarkSuite { runs } => {
                let mut sum = 0.0;
                for run in runs {
                    let mix = run.workload.apply(&candidate.mix)?;
                    let ipc = self.predict_ipc(&candidate.spec, &mix, candidate.arrival_rate)?;
                    let r = ipc.map_or(self.config.unstable_residual, |ipc| {
                        (ipc - run.measured_ipc) / run.measured_ipc
                    });
                    sum += r * r;
                }
                Ok((sum / runs.len() as f64).sqrt())
            }
        }
    }

    /// Predicted IPC, or `None` when the prediction is unstable or zero.
    fn predict_ipc(
        &self,
        spec: &PipelineSpec,
        mix: &InstructionMix,
        rate: f64,
    ) -> Result<Option<f64>> {
        let analyzer = PipelineAnalyzer::new(spec, mix, self.fallback_cycles)?;
        let prediction = ThroughputModel::predict(&analyzer, rate)?;
        Ok((prediction.stable && prediction.predicted_ipc > 0.0)
            .then_some(prediction.predicted_ipc))
    }
}

/// Minimises `f` over `[lower, upper]` by golden-section search.
///
/// Returns the best abscissa evaluated and its value.
fn golden_section<F>(mut f: F, lower: f64, upper: f64, iterations: usize) -> Result<(f64, f64)>
where
    F: FnMut(f64) -> Result<f64>,
{
    let (mut a, mut b) = (lower, upper);
    let mut c = b - INV_PHI * (b - a);
    let mut d = a + INV_PHI * (b - a);
    let mut fc = f(c)?;
    let mut fd = f(d)?;
    let mut best = if fc <= fd { (c, fc) } else { (d, fd) };

    for _ in 0..iterations {
        if fc <= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - INV_PHI * (b - a);
            fc = f(c)?;
            if fc < best.1 {
                best = (c, fc);
            }
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + INV_PHI * (b - a);
            fd = f(d)?;
            if fd < best.1 {
                best = (d, fd);
            }
        }
    }
    Ok(best)
}
