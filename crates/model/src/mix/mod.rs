//! Instruction mixes and workload profiles.
//!
//! This module holds the leaf data every prediction is computed from. It provides:
//! 1. **Categories:** Named instruction classes with a cycle cost and a relative weight.
//! 2. **Mix:** An ordered-irrelevant map from category name to category.
//! 3. **Workloads:** Named weight vectors (`typical`, `compute`, `memory`, `control`) that
//!    re-weight a mix without changing its costs.

/// Instruction category (name, cost, weight).
pub mod category;

/// Workload profiles re-weighting a mix.
pub mod workload;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::common::error::{ModelError, Result, ensure_positive};

pub use self::category::Category;
pub use self::workload::{STANDARD_WORKLOADS, WorkloadProfile};

/// Mapping from category name to [`Category`].
///
/// Iteration order is the lexical order of category names, so every computation
/// over a mix is deterministic. Weights need not sum to one; stage aggregation
/// normalizes over the categories it includes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct InstructionMix {
    categories: BTreeMap<String, Category>,
}

impl InstructionMix {
    /// Creates an empty mix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a mix from categories, rejecting repeated names.
    ///
    /// # Arguments
    ///
    /// * `categories` - The categories; names must be unique.
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Result<Self> {
        let mut mix = Self::new();
        for category in categories {
            let name = category.name.clone();
            if mix.categories.insert(name.clone(), category).is_some() {
                return Err(ModelError::DuplicateName {
                    kind: "category",
                    name,
                });
            }
        }
        Ok(mix)
    }

    /// Looks up a category by name.
    pub fn get(&self, name: &str) -> Option<&Category> {
        self.categories.get(name)
    }

    /// Looks up a category by name, failing with `UnknownCategory`.
    pub fn require(&self, name: &str) -> Result<&Category> {
        self.get(name).ok_or_else(|| ModelError::UnknownCategory {
            name: name.to_string(),
        })
    }

    /// Returns `true` if the mix contains a category with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.categories.contains_key(name)
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// Returns `true` if the mix has no categories.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// Iterates categories in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Iterates category names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.keys().map(String::as_str)
    }

    /// Sum of all category weights.
    pub fn total_weight(&self) -> f64 {
        self.iter().map(|c| c.weight).sum()
    }

    /// Weighted mean cost over the whole mix (cycles per instruction), or `None` when no weight is present.
    pub fn mean_cost(&self) -> Option<f64> {
        let total = self.total_weight();
        if total > 0.0 {
            Some(self.iter().map(Category::weighted_cost).sum::<f64>() / total)
        } else {
            None
        }
    }

    /// Returns a copy whose weights sum to one.
    ///
    /// A mix with zero total weight is returned unchanged.
    pub fn normalized(&self) -> Self {
        let total = self.total_weight();
        if total <= 0.0 {
            return self.clone();
        }
        let categories = self
            .categories
            .iter()
            .map(|(name, c)| {
                let mut c = c.clone();
                c.weight /= total;
                (name.clone(), c)
            })
            .collect();
        Self { categories }
    }

    /// Changes one category's service cost in place.
    ///
    /// # Arguments
    ///
    /// * `name` - Existing category name.
    /// * `service_cost` - New cost in cycles; must be finite and > 0.
    pub fn set_service_cost(&mut self, name: &str, service_cost: f64) -> Result<()> {
        ensure_positive(&format!("{name}.service_cost"), service_cost)?;
        let category = self
            .categories
            .get_mut(name)
            .ok_or_else(|| ModelError::UnknownCategory {
                name: name.to_string(),
            })?;
        category.service_cost = service_cost;
        Ok(())
    }

    /// Changes one category's weight in place.
    ///
    /// # Arguments
    ///
    /// * `name` - Existing category name.
    /// * `weight` - New weight in `[0, 1]`.
    pub fn set_weight(&mut self, name: &str, weight: f64) -> Result<()> {
        category::validate_weight(name, weight)?;
        let category = self
            .categories
            .get_mut(name)
            .ok_or_else(|| ModelError::UnknownCategory {
                name: name.to_string(),
            })?;
        category.weight = weight;
        Ok(())
    }

    /// Returns a copy with every weight replaced from `weights`.
    ///
    /// Categories missing from `weights` get weight zero; names in `weights` that are
    /// not part of the mix fail with `UnknownCategory`.
    pub fn reweighted(&self, weights: &BTreeMap<String, f64>) -> Result<Self> {
        if let Some(unknown) = weights.keys().find(|name| !self.contains(name)) {
            return Err(ModelError::UnknownCategory {
                name: unknown.clone(),
            });
        }
        let mut mix = self.clone();
        for (name, category) in &mut mix.categories {
            let weight = weights.get(name).copied().unwrap_or(0.0);
            category::validate_weight(name, weight)?;
            category.weight = weight;
        }
        Ok(mix)
    }
}

impl<'a> IntoIterator for &'a InstructionMix {
    type Item = &'a Category;
    type IntoIter = std::collections::btree_map::Values<'a, String, Category>;

    fn into_iter(self) -> Self::IntoIter {
        self.categories.values()
    }
}
