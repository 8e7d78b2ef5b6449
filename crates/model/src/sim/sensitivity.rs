//! Sensitivity analysis and arrival-rate sweeps.
//!
//! Perturbations always act on a cloned mix; the caller's mix is never touched.

use serde::Serialize;
use tracing::debug;

use crate::common::error::{ModelError, Result, ensure_non_negative};
use crate::mix::InstructionMix;
use crate::pipeline::{PipelineAnalyzer, PipelineSpec, PredictionResult, ThroughputModel};

/// Response of the predicted IPC to one category's cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensitivity {
    /// Category perturbed.
    pub category: String,
    /// Cost before perturbation, in cycles.
    pub base_cost: f64,
    /// Cost after perturbation, in cycles.
    pub perturbed_cost: f64,
    /// IPC at the base cost.
    pub base_ipc: f64,
    /// IPC at the perturbed cost.
    pub perturbed_ipc: f64,
    /// `perturbed_ipc - base_ipc`.
    pub delta_ipc: f64,
    /// IPC change per cycle of cost change.
    pub ipc_per_cycle: f64,
    /// `(dIPC / IPC) / (dcost / cost)`; `None` when the base IPC is zero.
    pub elasticity: Option<f64>,
}

/// Measures how the predicted IPC responds to scaling one category's cost.
///
/// # Arguments
///
/// * `spec` - Pipeline.
/// * `mix` - Base mix; cloned, not modified.
/// * `fallback_cycles` - Fallback service time.
/// * `arrival_rate` - Rate to predict at.
/// * `category` - Category to perturb.
/// * `relative_step` - Cost scale step, e.g. `0.1` for +10 %; must be finite, non-zero and > -1.
pub fn category_sensitivity(
    spec: &PipelineSpec,
    mix: &InstructionMix,
    fallback_cycles: f64,
    arrival_rate: f64,
    category: &str,
    relative_step: f64,
) -> Result<Sensitivity> {
    if !relative_step.is_finite() || relative_step == 0.0 || relative_step <= -1.0 {
        return Err(ModelError::invalid(
            "relative_step",
            format!("must be finite, non-zero and > -1, got {relative_step}"),
        ));
    }
    let base_cost = mix.require(category)?.service_cost;
    let perturbed_cost = base_cost * (1.0 + relative_step);

    let base_ipc = PipelineAnalyzer::new(spec, mix, fallback_cycles)?
        .predict(arrival_rate)?
        .predicted_ipc;

    let mut perturbed = mix.clone();
    perturbed.set_service_cost(category, perturbed_cost)?;
    let perturbed_ipc = PipelineAnalyzer::new(spec, &perturbed, fallback_cycles)?
        .predict(arrival_rate)?
        .predicted_ipc;

    let delta_ipc = perturbed_ipc - base_ipc;
    let elasticity = (base_ipc > 0.0).then(|| (delta_ipc / base_ipc) / relative_step);
    debug!(category, base_ipc, perturbed_ipc, ?elasticity, "category sensitivity");

    Ok(Sensitivity {
        category: category.to_string(),
        base_cost,
        perturbed_cost,
        base_ipc,
        perturbed_ipc,
        delta_ipc,
        ipc_per_cycle: delta_ipc / (perturbed_cost - base_cost),
        elasticity,
    })
}

/// [`category_sensitivity`] for every category of the mix, in name order.
pub fn sensitivity_sweep(
    spec: &PipelineSpec,
    mix: &InstructionMix,
    fallback_cycles: f64,
    arrival_rate: f64,
    relative_step: f64,
) -> Result<Vec<Sensitivity>> {
    mix.names()
        .map(|name| {
            category_sensitivity(spec, mix, fallback_cycles, arrival_rate, name, relative_step)
        })
        .collect()
}

/// Predictions at `steps` evenly spaced arrival rates from `from` to `to` inclusive.
///
/// With `steps == 1` only `from` is evaluated.
pub fn arrival_sweep<M: ThroughputModel + ?Sized>(
    model: &M,
    from: f64,
    to: f64,
    steps: usize,
) -> Result<Vec<PredictionResult>> {
    ensure_non_negative("from", from)?;
    ensure_non_negative("to", to)?;
    if to < from {
        return Err(ModelError::invalid("to", format!("must be >= from ({from}), got {to}")));
    }
    if steps == 0 {
        return Err(ModelError::invalid("steps", "must be at least 1"));
    }
    if steps == 1 {
        return Ok(vec![model.predict(from)?]);
    }
    let step = (to - from) / (steps - 1) as f64;
    (0..steps)
        .map(|i| {
            let rate = if i == steps - 1 { to } else { from + step * i as f64 };
            model.predict(rate)
        })
        .collect()
}
