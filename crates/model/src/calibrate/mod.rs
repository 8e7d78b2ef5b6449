//! Fitting the model to measurements.
//!
//! Two fitting procedures are provided:
//! 1. **Calibration:** Bounded bisection over the arrival rate so that the predicted IPC
//!    matches one measured IPC.
//! 2. **Identification:** Coordinate descent over several free parameters (rate, category
//!    costs, stage penalties) against weighted measurement sources.
//!
//! Both are deterministic, respect an explicit work budget and return the best point seen.

/// Arrival-rate bisection.
pub mod bisection;

/// Multi-parameter identification.
pub mod identify;

/// Measurement sources consumed by the identifier.
pub mod measurement;

pub use self::bisection::{CalibrationResult, Calibrator, error_percent};
pub use self::identify::{
    FittedParameter, FreeParameter, IdentificationResult, Identifier, Parameter, SourceResidual,
};
pub use self::measurement::{
    BenchmarkRun, InstructionTiming, Measurement, MeasurementSource,
};
