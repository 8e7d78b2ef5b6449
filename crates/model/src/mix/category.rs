//! Instruction category.

use serde::Serialize;

use crate::common::error::{ModelError, Result, ensure_positive};

/// One instruction category of a mix: a name, its average service cost and its share of the workload.
///
/// Categories are built once per processor description and treated as immutable
/// values; sensitivity analysis clones the owning mix before changing a cost.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Category {
    /// Unique key within a mix.
    pub name: String,
    /// Average cost in cycles; strictly positive.
    pub service_cost: f64,
    /// Relative frequency in `[0, 1]`.
    pub weight: f64,
}

impl Category {
    /// Creates a validated category.
    ///
    /// # Arguments
    ///
    /// * `name` - Category name (e.g. `"alu"`, `"memory"`).
    /// * `service_cost` - Cycles per instruction of this category; must be finite and > 0.
    /// * `weight` - Relative frequency; must lie in `[0, 1]`.
    pub fn new(name: impl Into<String>, service_cost: f64, weight: f64) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::invalid("category.name", "must not be empty"));
        }
        ensure_positive(&format!("{name}.service_cost"), service_cost)?;
        validate_weight(&name, weight)?;
        Ok(Self {
            name,
            service_cost,
            weight,
        })
    }

    /// Weighted cost contribution (`weight * service_cost`).
    #[inline]
    pub fn weighted_cost(&self) -> f64 {
        self.weight * self.service_cost
    }
}

/// Rejects weights outside `[0, 1]`.
pub(crate) fn validate_weight(name: &str, weight: f64) -> Result<()> {
    if weight.is_finite() && (0.0..=1.0).contains(&weight) {
        Ok(())
    } else {
        Err(ModelError::invalid(
            format!("{name}.weight"),
            format!("must lie in [0, 1], got {weight}"),
        ))
    }
}
