//! Pipeline structure and throughput prediction.
//!
//! This module turns an instruction mix and a stage topology into an IPC estimate. It provides:
//! 1. **Specifications:** `StageSpec`, `PipelineSpec`, the declared `CeilingRule`, and the derived `Topology`.
//! 2. **Aggregation:** Per-stage service time from the mix, with a traceable fallback.
//! 3. **Analysis:** `PipelineAnalyzer::predict`, producing `StageMetrics` and a `PredictionResult`.
//! 4. **Interface:** The `ThroughputModel` trait the calibrator searches over.

/// Pipeline throughput analyzer and result records.
pub mod analyzer;

/// Stage and pipeline specifications.
pub mod spec;

/// Stage service-time aggregation.
pub mod stage;

/// Throughput model interface.
pub mod traits;

pub use self::analyzer::{PipelineAnalyzer, PredictionResult, StageMetrics};
pub use self::spec::{CeilingRule, PipelineSpec, StageKind, StageSpec, Topology};
pub use self::stage::{ServiceTime, service_time};
pub use self::traits::ThroughputModel;
