//! M/M/1/K formulas.
//!
//! A bounded stage holds at most `K` items, the one in service included. The
//! steady-state distribution is the birth-death chain truncated at `K`, whose
//! mean has the closed form used by [`queue_length`].
//!
//! For `rho > 1` the queue is treated as permanently full and reported with
//! `L = K / 2` and a utilization of one. This is a conservative steady-state
//! approximation of the model family, not a result of queueing theory.

use crate::common::constants::{BOUNDED_OVERLOAD_UTILIZATION, BOUNDED_DIRECT_SUM_WINDOW};

/// Reported utilization of a bounded stage, `min(lambda * S, 1)`.
#[inline]
pub fn utilization(arrival_rate: f64, service_time: f64) -> f64 {
    super::offered_load(arrival_rate, service_time).min(BOUNDED_OVERLOAD_UTILIZATION)
}

/// Mean number in an M/M/1/K system.
///
/// ```text
/// L = rho * (1 - (K + 1) * rho^K + K * rho^(K + 1)) / ((1 - rho) * (1 - rho^(K + 1)))
/// ```
///
/// At `rho = 1` the expression is `0 / 0`; its limit `K / 2` is substituted
/// directly. Overload (`rho > 1`) also reports `K / 2`. Just below one the
/// closed form cancels catastrophically, so within [`BOUNDED_DIRECT_SUM_WINDOW`]
/// the mean of the truncated distribution is summed over `0..=K` instead.
///
/// # Arguments
///
/// * `rho` - Unclamped offered load.
/// * `capacity` - `K`, the maximum number of items held.
pub fn queue_length(rho: f64, capacity: u32) -> f64 {
    let k = f64::from(capacity);
    if rho <= 0.0 || capacity == 0 {
        return 0.0;
    }
    if rho >= 1.0 {
        return k / 2.0;
    }
    if 1.0 - rho < BOUNDED_DIRECT_SUM_WINDOW {
        return truncated_geometric_mean(rho, capacity);
    }
    let rho_k = rho.powf(k);
    let rho_k1 = rho_k * rho;
    let numerator = rho * (1.0 - (k + 1.0) * rho_k + k * rho_k1);
    let denominator = (1.0 - rho) * (1.0 - rho_k1);
    numerator / denominator
}

/// `sum(n * rho^n) / sum(rho^n)` for `n = 0..=K`.
fn truncated_geometric_mean(rho: f64, capacity: u32) -> f64 {
    let mut weight = 1.0;
    let mut total = 0.0;
    let mut weighted = 0.0;
    for n in 0..=capacity {
        total += weight;
        weighted += f64::from(n) * weight;
        weight *= rho;
    }
    weighted / total
}

/// Mean wait by Little's law, `W = L / lambda`; zero when nothing arrives.
///
/// # Arguments
///
/// * `queue_length` - Mean number in the system.
/// * `arrival_rate` - Offered arrival rate.
#[inline]
pub fn wait_time(queue_length: f64, arrival_rate: f64) -> f64 {
    if arrival_rate == 0.0 {
        0.0
    } else {
        queue_length / arrival_rate
    }
}
