//! Workload profiles.
//!
//! A processor description usually carries one cost table and several weight
//! vectors over it, one per kind of program. A [`WorkloadProfile`] is one such
//! vector; applying it to a mix yields a new mix with the same costs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::InstructionMix;
use super::category::validate_weight;
use crate::common::error::{ModelError, Result};

/// Conventional workload profile names, in report order.
pub const STANDARD_WORKLOADS: &[&str] = &["typical", "compute", "memory", "control"];

/// A named weight vector over the categories of a mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadProfile {
    /// Profile name (e.g. `"typical"`).
    pub name: String,
    /// Category name to weight; omitted categories weigh zero.
    pub weights: BTreeMap<String, f64>,
}

impl WorkloadProfile {
    /// Creates a validated profile.
    ///
    /// # Arguments
    ///
    /// * `name` - Profile name.
    /// * `weights` - Category weights, each in `[0, 1]`.
    pub fn new(name: impl Into<String>, weights: BTreeMap<String, f64>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::invalid("workload.name", "must not be empty"));
        }
        for (category, weight) in &weights {
            validate_weight(category, *weight)?;
        }
        Ok(Self { name, weights })
    }

    /// Sum of the profile's weights.
    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Re-weights `base` with this profile's weights.
    ///
    /// # Arguments
    ///
    /// * `base` - The cost table to re-weight.
    ///
    /// # Returns
    ///
    /// A new mix; fails with `UnknownCategory` if the profile names a category the mix lacks.
    pub fn apply(&self, base: &InstructionMix) -> Result<InstructionMix> {
        base.reweighted(&self.weights)
    }
}
