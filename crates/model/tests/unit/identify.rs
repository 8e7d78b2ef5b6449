//! # Identification Tests
//!
//! Synthetic measurements are generated from known parameters; the
//! identifier must recover them and report the residuals it ends at.

use std::collections::BTreeMap;

use ipcq_core::calibrate::{
    BenchmarkRun, FreeParameter, Identifier, InstructionTiming, Measurement, MeasurementSource,
    Parameter,
};
use ipcq_core::mix::WorkloadProfile;
use ipcq_core::pipeline::PipelineAnalyzer;
use ipcq_core::ModelError;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::builder::pipeline::two_stage;
use crate::common::harness::{assert_close, init_tracing};

fn exec_cost() -> Parameter {
    Parameter::CategoryCost {
        category: "exec".to_string(),
    }
}

fn timings(observed: f64) -> MeasurementSource {
    MeasurementSource::new(
        "timings",
        Measurement::InstructionTimings {
            timings: vec![InstructionTiming {
                category: "exec".to_string(),
                observed_cycles: observed,
            }],
        },
    )
}

#[test]
fn test_recovers_category_cost_from_timings() {
    init_tracing();
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [FreeParameter::new(exec_cost(), 5.0, 1.0, 20.0)];

    let result = identifier.identify(&free, &[timings(9.0)]).unwrap();
    assert_close(result.value_of(&exec_cost()).unwrap(), 9.0, 1e-4);
    assert!(result.loss < 1e-8);
    assert!(result.converged);
    assert_eq!(result.parameters[0].initial, 5.0);
}

#[test]
fn test_recovers_arrival_rate_from_aggregate_cpi() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.1).unwrap();
    let free = [FreeParameter::new(Parameter::ArrivalRate, 0.02, 0.001, 0.14)];
    let sources = [MeasurementSource::new("cpi", Measurement::AggregateCpi { cpi: 25.5 })];

    let result = identifier.identify(&free, &sources).unwrap();
    assert_close(result.value_of(&Parameter::ArrivalRate).unwrap(), 0.05, 1e-4);
    assert!(result.loss < result.initial_loss);
    assert!(result.residuals[0].residual.abs() < 1e-3);
}

#[test]
fn test_recovers_stage_penalty_from_benchmarks() {
    let (spec, mix) = two_stage();
    let truth = spec.with_stage_penalty("B", 1.0).unwrap();
    let mut weights = BTreeMap::new();
    let _ = weights.insert("fetch".to_string(), 1.0);
    let _ = weights.insert("exec".to_string(), 1.0);
    let workload = WorkloadProfile::new("typical", weights).unwrap();
    let measured = PipelineAnalyzer::new(&truth, &mix, 8.0)
        .unwrap()
        .predict(0.05)
        .unwrap()
        .predicted_ipc;

    let sources = [MeasurementSource::new(
        "suite",
        Measurement::BenchmarkSuite {
            runs: vec![BenchmarkRun {
                name: "dhrystone".to_string(),
                workload,
                measured_ipc: measured,
            }],
        },
    )];
    let penalty = Parameter::StagePenalty {
        stage: "B".to_string(),
    };
    let free = [FreeParameter::new(penalty.clone(), 0.0, 0.0, 5.0)];

    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let result = identifier.identify(&free, &sources).unwrap();
    assert_close(result.value_of(&penalty).unwrap(), 1.0, 1e-3);
}

#[test]
fn test_loss_is_weighted_mean_of_squares() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [FreeParameter::new(exec_cost(), 7.0, 1.0, 20.0)];
    let sources = [
        timings(7.0),
        MeasurementSource::new("cpi", Measurement::AggregateCpi { cpi: 20.0 }).with_weight(3.0),
    ];

    let (loss, residuals) = identifier.loss(&free, &[7.0], &sources).unwrap();
    assert_close(residuals[0].residual, 0.0, 1e-12);
    assert_close(residuals[1].residual, 0.275, 1e-9);
    assert_close(loss, 3.0 * 0.275 * 0.275 / 4.0, 1e-9);
}

#[test]
fn test_unstable_prediction_is_charged() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [FreeParameter::new(Parameter::ArrivalRate, 0.05, 0.001, 0.5)];
    let sources = [MeasurementSource::new("cpi", Measurement::AggregateCpi { cpi: 25.5 })];

    let (loss, residuals) = identifier.loss(&free, &[0.3], &sources).unwrap();
    assert_eq!(residuals[0].residual, 10.0);
    assert_eq!(loss, 100.0);

    let result = identifier.identify(&free, &sources).unwrap();
    assert!(result.value_of(&Parameter::ArrivalRate).unwrap() < 1.0 / 7.0);
    assert!(result.loss <= result.initial_loss);
}

#[test]
fn test_fit_never_worse_than_start() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [
        FreeParameter::new(exec_cost(), 7.0, 1.0, 20.0),
        FreeParameter::new(Parameter::ArrivalRate, 0.05, 0.001, 0.14),
    ];
    let sources = [
        timings(6.5),
        MeasurementSource::new("cpi", Measurement::AggregateCpi { cpi: 30.0 }),
    ];
    let result = identifier.identify(&free, &sources).unwrap();
    assert!(result.loss <= result.initial_loss);
    assert!(result.sweeps >= 1);
    assert!(result.evaluations > result.sweeps);
    assert_eq!(result.residuals.len(), 2);
}

#[test]
fn test_initial_value_is_clamped() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [FreeParameter::new(exec_cost(), 50.0, 1.0, 20.0)];
    let result = identifier.identify(&free, &[timings(9.0)]).unwrap();
    assert_eq!(result.parameters[0].initial, 20.0);
}

#[rstest]
#[case::unknown_category(
    FreeParameter::new(Parameter::CategoryCost { category: "fpu".into() }, 1.0, 0.5, 2.0)
)]
#[case::unknown_stage(
    FreeParameter::new(Parameter::StagePenalty { stage: "C".into() }, 1.0, 0.0, 2.0)
)]
#[case::inverted_bounds(FreeParameter::new(Parameter::ArrivalRate, 0.05, 0.1, 0.01))]
#[case::zero_cost_bound(
    FreeParameter::new(Parameter::CategoryCost { category: "exec".into() }, 1.0, 0.0, 2.0)
)]
fn test_invalid_free_parameter_rejected(#[case] parameter: FreeParameter) {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    assert!(identifier.identify(&[parameter], &[timings(7.0)]).is_err());
}

#[test]
fn test_duplicate_parameter_rejected() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [
        FreeParameter::new(exec_cost(), 7.0, 1.0, 20.0),
        FreeParameter::new(exec_cost(), 8.0, 1.0, 20.0),
    ];
    assert!(matches!(
        identifier.identify(&free, &[timings(7.0)]),
        Err(ModelError::DuplicateName { kind: "parameter", .. })
    ));
}

#[test]
fn test_empty_inputs_rejected() {
    let (spec, mix) = two_stage();
    let identifier = Identifier::new(&spec, &mix, 8.0, 0.05).unwrap();
    let free = [FreeParameter::new(exec_cost(), 7.0, 1.0, 20.0)];
    assert!(identifier.identify(&[], &[timings(7.0)]).is_err());
    assert!(identifier.identify(&free, &[]).is_err());
    assert!(identifier.identify(&free, &[timings(7.0).with_weight(0.0)]).is_err());
    assert!(Identifier::new(&spec, &mix, 8.0, 0.0).is_err());
}

#[test]
fn test_measurement_source_from_json() {
    let json = r#"{
        "name": "cpi",
        "measurement": { "kind": "aggregate_cpi", "cpi": 25.5 }
    }"#;
    let source: MeasurementSource = serde_json::from_str(json).unwrap();
    assert_eq!(source.weight, 1.0);
    assert_eq!(source.measurement, Measurement::AggregateCpi { cpi: 25.5 });

    let free: FreeParameter = serde_json::from_str(
        r#"{ "parameter": { "kind": "category_cost", "category": "exec" },
             "initial": 5.0, "lower": 1.0, "upper": 20.0 }"#,
    )
    .unwrap();
    assert_eq!(free.parameter, exec_cost());
}
