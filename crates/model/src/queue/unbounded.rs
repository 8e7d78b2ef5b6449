//! M/M/1 formulas.
//!
//! Both functions take the unclamped load and return `f64::INFINITY` when it is
//! at or above one.

use crate::common::constants::SATURATION_THRESHOLD;

/// Mean number in the system, `L = rho / (1 - rho)`.
///
/// # Arguments
///
/// * `rho` - Unclamped offered load.
///
/// # Returns
///
/// The queue length, or `f64::INFINITY` when `rho >= 1`.
#[inline]
pub fn queue_length(rho: f64) -> f64 {
    if rho >= SATURATION_THRESHOLD {
        f64::INFINITY
    } else {
        rho / (1.0 - rho)
    }
}

/// Mean wait, `W = S / (1 - rho)`.
///
/// # Arguments
///
/// * `service_time` - Average service time in cycles.
/// * `rho` - Unclamped offered load.
///
/// # Returns
///
/// The wait time, or `f64::INFINITY` when `rho >= 1`.
#[inline]
pub fn wait_time(service_time: f64, rho: f64) -> f64 {
    if rho >= SATURATION_THRESHOLD {
        f64::INFINITY
    } else {
        service_time / (1.0 - rho)
    }
}
