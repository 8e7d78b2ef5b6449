//! Driving the model from processor descriptions.
//!
//! Provides the JSON description loader, and the what-if tooling that evaluates
//! the model repeatedly: per-category sensitivity and arrival-rate sweeps.

pub mod description;
pub mod sensitivity;

pub use self::description::ProcessorDescription;
pub use self::sensitivity::{Sensitivity, arrival_sweep, category_sensitivity, sensitivity_sweep};
