//! Pipeline throughput analyzer.
//!
//! The analyzer composes per-stage queueing metrics into one IPC estimate:
//! 1. **Service times:** Each stage's `S` is aggregated from the mix on every call.
//! 2. **Stage metrics:** Bounded stages use M/M/1/K formulas, series stages M/M/1.
//! 3. **Stability:** Any stage with `lambda * S >= 1` forces the predicted IPC to zero.
//! 4. **Throughput:** `min(lambda * e, ceiling)` with `e = 1 / (1 + mean series rho)`.
//! 5. **Bottleneck:** The stage with the highest offered load, first one on ties.

use serde::Serialize;

use super::spec::{PipelineSpec, StageKind};
use super::stage::{ServiceTime, service_time};
use super::traits::ThroughputModel;
use crate::common::constants::SATURATION_THRESHOLD;
use crate::common::error::{ModelError, Result, ensure_positive};
use crate::mix::InstructionMix;
use crate::queue::{self, bounded, unbounded};

/// Steady-state metrics of one stage at one arrival rate.
///
/// Fresh on every prediction. `queue_length` and `wait_time` are `f64::INFINITY`
/// for a saturated series stage; `saturated` states the same thing explicitly
/// so consumers need not compare against infinity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageMetrics {
    /// Stage name.
    pub name: String,
    /// Queueing discipline used for this stage.
    pub kind: StageKind,
    /// Offered arrival rate, instructions per cycle.
    pub arrival_rate: f64,
    /// Service time in cycles.
    pub service_time: f64,
    /// Reported utilization (capped below one for series stages, at one for bounded stages).
    pub utilization: f64,
    /// Unclamped `lambda * S`.
    pub offered_load: f64,
    /// Mean number in the stage.
    pub queue_length: f64,
    /// Mean wait in cycles.
    pub wait_time: f64,
    /// Mean response time in cycles.
    pub response_time: f64,
    /// `true` when the offered load is at or above one.
    pub saturated: bool,
    /// `true` when the service time came from the fallback cost.
    pub used_fallback: bool,
}

impl StageMetrics {
    fn series(name: &str, arrival_rate: f64, service: ServiceTime) -> Self {
        let s = service.cycles;
        let rho = queue::offered_load(arrival_rate, s);
        let wait_time = unbounded::wait_time(s, rho);
        Self {
            name: name.to_string(),
            kind: StageKind::Series,
            arrival_rate,
            service_time: s,
            utilization: queue::utilization(arrival_rate, s),
            offered_load: rho,
            queue_length: unbounded::queue_length(rho),
            wait_time,
            response_time: queue::response_time(wait_time, s),
            saturated: !queue::is_stable(arrival_rate, s),
            used_fallback: service.used_fallback,
        }
    }

    fn bounded(name: &str, capacity: u32, arrival_rate: f64, service: ServiceTime) -> Self {
        let s = service.cycles;
        let rho = queue::offered_load(arrival_rate, s);
        let queue_length = bounded::queue_length(rho, capacity);
        let wait_time = bounded::wait_time(queue_length, arrival_rate);
        Self {
            name: name.to_string(),
            kind: StageKind::Bounded,
            arrival_rate,
            service_time: s,
            utilization: bounded::utilization(arrival_rate, s),
            offered_load: rho,
            queue_length,
            wait_time,
            response_time: queue::response_time(wait_time, s),
            saturated: !queue::is_stable(arrival_rate, s),
            used_fallback: service.used_fallback,
        }
    }
}

/// Outcome of one prediction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    /// Arrival rate the prediction was made at.
    pub arrival_rate: f64,
    /// Estimated instructions per cycle; exactly zero when any stage is saturated.
    pub predicted_ipc: f64,
    /// `false` when any stage is saturated.
    pub stable: bool,
    /// Efficiency factor `1 / (1 + mean series rho)`.
    pub efficiency: f64,
    /// Theoretical IPC ceiling under the pipeline's ceiling rule.
    pub ceiling_ipc: f64,
    /// Name of the stage with the highest offered load.
    pub bottleneck: String,
    /// Per-stage metrics in pipeline order.
    pub stage_metrics: Vec<StageMetrics>,
}

impl PredictionResult {
    /// Cycles per instruction, or `None` when the predicted IPC is zero.
    pub fn cpi(&self) -> Option<f64> {
        (self.predicted_ipc > 0.0).then(|| 1.0 / self.predicted_ipc)
    }

    /// Millions of instructions per second at the given clock.
    ///
    /// # Arguments
    ///
    /// * `clock_mhz` - Core clock in MHz.
    pub fn mips(&self, clock_mhz: f64) -> f64 {
        self.predicted_ipc * clock_mhz
    }

    /// Metrics of the bottleneck stage.
    pub fn bottleneck_metrics(&self) -> Option<&StageMetrics> {
        self.stage_metrics.iter().find(|m| m.name == self.bottleneck)
    }

    /// `true` when any stage's service time came from the fallback cost.
    pub fn used_fallback(&self) -> bool {
        self.stage_metrics.iter().any(|m| m.used_fallback)
    }

    /// Names of the stages whose service time came from the fallback cost.
    pub fn fallback_stages(&self) -> Vec<&str> {
        self.stage_metrics
            .iter()
            .filter(|m| m.used_fallback)
            .map(|m| m.name.as_str())
            .collect()
    }
}

/// Evaluates a pipeline over an instruction mix.
///
/// Holds read-only references; the spec and mix are never modified. Build a new
/// analyzer over a cloned mix to evaluate a perturbed configuration.
///
/// # Examples
///
/// ```
/// use ipcq_core::mix::{Category, InstructionMix};
/// use ipcq_core::pipeline::{CeilingRule, PipelineAnalyzer, PipelineSpec, StageSpec};
///
/// let mix = InstructionMix::from_categories([
///     Category::new("fetch", 4.0, 1.0).unwrap(),
///     Category::new("exec", 7.0, 1.0).unwrap(),
/// ])
/// .unwrap();
/// let spec = PipelineSpec::new(
///     "two-stage",
///     vec![StageSpec::series("A", ["fetch"]), StageSpec::series("B", ["exec"])],
///     CeilingRule::SumOfServiceTimes,
/// )
/// .unwrap();
///
/// let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
/// let result = analyzer.predict(0.05).unwrap();
/// assert_eq!(result.bottleneck, "B");
/// assert!((result.predicted_ipc - 0.05 / 1.275).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct PipelineAnalyzer<'a> {
    spec: &'a PipelineSpec,
    mix: &'a InstructionMix,
    fallback_cycles: f64,
}

impl<'a> PipelineAnalyzer<'a> {
    /// Creates an analyzer.
    ///
    /// # Arguments
    ///
    /// * `spec` - The validated pipeline.
    /// * `mix` - The instruction mix to aggregate service times from.
    /// * `fallback_cycles` - Service time for stages with no weighted category; must be > 0.
    pub fn new(
        spec: &'a PipelineSpec,
        mix: &'a InstructionMix,
        fallback_cycles: f64,
    ) -> Result<Self> {
        ensure_positive("fallback_cycles", fallback_cycles)?;
        Ok(Self {
            spec,
            mix,
            fallback_cycles,
        })
    }

    /// The pipeline being analyzed.
    pub const fn spec(&self) -> &'a PipelineSpec {
        self.spec
    }

    /// The instruction mix being analyzed.
    pub const fn mix(&self) -> &'a InstructionMix {
        self.mix
    }

    /// Fallback service time in cycles.
    pub const fn fallback_cycles(&self) -> f64 {
        self.fallback_cycles
    }

    /// Service time of every stage, in pipeline order.
    pub fn service_times(&self) -> Vec<ServiceTime> {
        self.spec
            .stages()
            .iter()
            .map(|stage| service_time(stage, self.mix, self.fallback_cycles))
            .collect()
    }

    /// Predicts throughput at an arrival rate.
    ///
    /// # Arguments
    ///
    /// * `arrival_rate` - Instructions per cycle offered to the pipeline; must be finite and >= 0.
    ///
    /// # Returns
    ///
    /// Per-stage metrics, the predicted IPC and the bottleneck. A zero rate yields
    /// zero IPC; a saturated stage yields zero IPC with every stage's metrics still
    /// reported.
    pub fn predict(&self, arrival_rate: f64) -> Result<PredictionResult> {
        if !arrival_rate.is_finite() || arrival_rate < 0.0 {
            return Err(ModelError::invalid(
                "arrival_rate",
                format!("must be finite and >= 0, got {arrival_rate}"),
            ));
        }

        let stage_metrics: Vec<StageMetrics> = self
            .spec
            .stages()
            .iter()
            .map(|stage| {
                let service = service_time(stage, self.mix, self.fallback_cycles);
                match stage.capacity {
                    Some(capacity) => {
                        StageMetrics::bounded(&stage.name, capacity, arrival_rate, service)
                    }
                    None => StageMetrics::series(&stage.name, arrival_rate, service),
                }
            })
            .collect();

        let bottleneck = bottleneck_of(&stage_metrics);
        let max_load = stage_metrics
            .iter()
            .map(|m| m.offered_load)
            .fold(0.0, f64::max);

        let series: Vec<&StageMetrics> = stage_metrics
            .iter()
            .filter(|m| m.kind == StageKind::Series)
            .collect();
        let series_times: Vec<f64> = series.iter().map(|m| m.service_time).collect();
        let ceiling_ipc = self.spec.ceiling().ceiling(&series_times);
        let mean_load = series.iter().map(|m| m.offered_load).sum::<f64>() / series.len() as f64;
        let efficiency = 1.0 / (1.0 + mean_load);

        let stable = max_load < SATURATION_THRESHOLD;
        let predicted_ipc = if stable {
            (arrival_rate * efficiency).min(ceiling_ipc)
        } else {
            0.0
        };

        Ok(PredictionResult {
            arrival_rate,
            predicted_ipc,
            stable,
            efficiency,
            ceiling_ipc,
            bottleneck,
            stage_metrics,
        })
    }
}

impl ThroughputModel for PipelineAnalyzer<'_> {
    fn predict(&self, arrival_rate: f64) -> Result<PredictionResult> {
        PipelineAnalyzer::predict(self, arrival_rate)
    }

    fn max_service_time(&self) -> f64 {
        self.service_times()
            .iter()
            .map(|s| s.cycles)
            .fold(0.0, f64::max)
    }

    fn fallback_stages(&self) -> Vec<String> {
        self.spec
            .stages()
            .iter()
            .zip(self.service_times())
            .filter(|(_, s)| s.used_fallback)
            .map(|(stage, _)| stage.name.clone())
            .collect()
    }
}

/// Name of the stage with the highest offered load; the earliest stage wins ties.
fn bottleneck_of(metrics: &[StageMetrics]) -> String {
    let mut best: Option<&StageMetrics> = None;
    for m in metrics {
        if best.is_none_or(|b| m.offered_load > b.offered_load) {
            best = Some(m);
        }
    }
    best.map(|m| m.name.clone()).unwrap_or_default()
}
