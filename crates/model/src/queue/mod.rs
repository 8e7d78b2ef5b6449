//! Analytical single-server queueing formulas.
//!
//! Pure, stateless functions turning an arrival rate and a service time into
//! steady-state metrics under memoryless arrivals and service:
//! 1. **Shared:** Utilization, the stability test, and response time.
//! 2. **Unbounded:** M/M/1 queue length and wait time.
//! 3. **Bounded:** M/M/1/K truncated birth-death queue length and Little's-law wait.
//!
//! Saturated M/M/1 metrics are reported as `f64::INFINITY`, never NaN.

/// Capacity-bounded (M/M/1/K) formulas.
pub mod bounded;

/// Unbounded (M/M/1) formulas.
pub mod unbounded;

use crate::common::constants::{REPORTED_UTILIZATION_CAP, SATURATION_THRESHOLD};

/// Unclamped offered load `rho = lambda * S`.
///
/// This is the quantity stability decisions are made on.
#[inline]
pub fn offered_load(arrival_rate: f64, service_time: f64) -> f64 {
    arrival_rate * service_time
}

/// Utilization for reporting, `min(lambda * S, 0.999)`.
///
/// Callers that need the true instability condition must use [`is_stable`] or
/// compare [`offered_load`] against one themselves.
///
/// # Arguments
///
/// * `arrival_rate` - Instructions per cycle offered to the stage.
/// * `service_time` - Average cycles per instruction at the stage.
#[inline]
pub fn utilization(arrival_rate: f64, service_time: f64) -> f64 {
    offered_load(arrival_rate, service_time).min(REPORTED_UTILIZATION_CAP)
}

/// Returns `true` when `lambda * S < 1`.
#[inline]
pub fn is_stable(arrival_rate: f64, service_time: f64) -> bool {
    offered_load(arrival_rate, service_time) < SATURATION_THRESHOLD
}

/// Response time `R = W + S`.
#[inline]
pub fn response_time(wait_time: f64, service_time: f64) -> f64 {
    wait_time + service_time
}
