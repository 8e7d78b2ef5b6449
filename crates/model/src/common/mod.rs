//! Common utilities and types used throughout the pipeline model.
//!
//! This module provides the building blocks shared by every component:
//! 1. **Error Handling:** The `ModelError` taxonomy and the crate-wide `Result` alias.
//! 2. **Constants:** Numeric limits of the queueing model family.

/// Numeric constants of the model family.
pub mod constants;

/// Error types and the crate-wide result alias.
pub mod error;

pub use constants::{REPORTED_UTILIZATION_CAP, SATURATION_THRESHOLD};
pub use error::{ModelError, Result};
