//! Stage service-time aggregation.
//!
//! A stage's service time is the weight-normalized mean cost of the categories
//! it serves, plus its fixed penalty. The mix is read on every call, so callers
//! may change costs between evaluations.

use serde::Serialize;
use tracing::debug;

use super::spec::StageSpec;
use crate::mix::InstructionMix;

/// Service time of one stage, and whether it came from the fallback cost.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ServiceTime {
    /// Average cycles per instruction at the stage, penalty included.
    pub cycles: f64,
    /// `true` when no included category carried weight and the fallback was used.
    pub used_fallback: bool,
}

/// Computes a stage's average service time.
///
/// ```text
/// S = sum(w_c * cost_c) / sum(w_c) + fixed_penalty     over included categories c
/// ```
///
/// When the included weight sums to zero (no included category is present, or
/// all of them weigh nothing) `fallback_cycles` replaces the weighted mean; the
/// penalty is still added.
///
/// # Arguments
///
/// * `stage` - The stage.
/// * `mix` - Instruction mix supplying costs and weights.
/// * `fallback_cycles` - Cost used when the stage has no weighted category.
pub fn service_time(stage: &StageSpec, mix: &InstructionMix, fallback_cycles: f64) -> ServiceTime {
    let (weighted, total) = stage
        .included_categories
        .iter()
        .filter_map(|name| mix.get(name))
        .fold((0.0, 0.0), |(weighted, total), c| {
            (weighted + c.weighted_cost(), total + c.weight)
        });

    if total > 0.0 {
        ServiceTime {
            cycles: weighted / total + stage.fixed_penalty,
            used_fallback: false,
        }
    } else {
        debug!(
            stage = %stage.name,
            fallback_cycles,
            "no weighted category for stage; using fallback service time"
        );
        ServiceTime {
            cycles: fallback_cycles + stage.fixed_penalty,
            used_fallback: true,
        }
    }
}
