//! Numeric constants of the queueing model family.

/// Largest utilization reported by `queue::utilization`.
///
/// Dependent formulas divide by `1 - rho`; reporting a value strictly below one keeps
/// them finite for callers that skip the stability check. The true instability
/// condition is always evaluated on the unclamped product.
pub const REPORTED_UTILIZATION_CAP: f64 = 0.999;

/// Offered load at or above which a stage is saturated.
pub const SATURATION_THRESHOLD: f64 = 1.0;

/// Distance below `rho = 1` inside which the bounded-queue mean is summed term by
/// term instead of read from the closed form, whose numerator and denominator both
/// vanish like `(1 - rho)^2` there.
pub const BOUNDED_DIRECT_SUM_WINDOW: f64 = 1e-4;

/// Utilization reported for a bounded stage offered more work than it can serve.
pub const BOUNDED_OVERLOAD_UTILIZATION: f64 = 1.0;
