//! Model error definitions.
//!
//! This module defines the structural failures of the engine. It provides:
//! 1. **Argument Errors:** Rejection of negative, zero or non-finite inputs where a positive value is required.
//! 2. **Topology Errors:** Empty pipelines, pipelines without a series chain, and ambiguous bounded stages.
//! 3. **Lookup Errors:** References to categories, stages or workloads that do not exist.
//! 4. **Input Errors:** JSON parse failures and unreadable description files.
//!
//! Saturation, non-convergence and fallback service times are model outcomes, not
//! errors; they are reported as flags on the result records.

use std::path::PathBuf;

use thiserror::Error;

/// Convenience alias for results within the model crate.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Structural failures raised by the engine.
///
/// Every variant aborts the operation that produced it; nothing here is silently
/// coerced into a default.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A scalar argument is outside its admissible range.
    ///
    /// Raised for negative arrival rates, non-positive tolerances, measured IPC or
    /// service costs, weights outside `[0, 1]`, and non-finite values.
    #[error("invalid argument `{name}`: {reason}")]
    InvalidArgument {
        /// Name of the offending argument or field.
        name: String,
        /// Human-readable constraint that was violated.
        reason: String,
    },

    /// A pipeline was constructed with no stages.
    #[error("pipeline has no stages")]
    EmptyPipeline,

    /// A pipeline contains only bounded stages, so there is no series chain to complete instructions.
    #[error("pipeline has no series stage")]
    NoSeriesStage,

    /// More than one capacity-bounded stage was declared.
    #[error("pipeline declares {count} bounded stages; at most one is supported")]
    MultipleBoundedStages {
        /// Number of bounded stages found.
        count: usize,
    },

    /// Two entries share a name that must be unique.
    #[error("duplicate {kind} name '{name}'")]
    DuplicateName {
        /// What kind of entry collided (category, stage, parameter, ...).
        kind: &'static str,
        /// The repeated name.
        name: String,
    },

    /// A category name does not exist in the instruction mix.
    #[error("unknown instruction category '{name}'")]
    UnknownCategory {
        /// The unresolved category name.
        name: String,
    },

    /// A stage name does not exist in the pipeline.
    #[error("unknown stage '{name}'")]
    UnknownStage {
        /// The unresolved stage name.
        name: String,
    },

    /// A workload profile name does not exist in the description.
    #[error("unknown workload profile '{name}'")]
    UnknownWorkload {
        /// The unresolved workload name.
        name: String,
    },

    /// Malformed JSON input.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A file could not be read.
    #[error("could not read '{path}': {source}")]
    Io {
        /// Path that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl ModelError {
    /// Builds an `InvalidArgument` error.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the offending argument.
    /// * `reason` - The constraint that was violated.
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Rejects values that are not finite and strictly positive.
pub(crate) fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ModelError::invalid(
            name,
            format!("must be finite and > 0, got {value}"),
        ))
    }
}

/// Rejects values that are not finite and non-negative.
pub(crate) fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::invalid(
            name,
            format!("must be finite and >= 0, got {value}"),
        ))
    }
}
