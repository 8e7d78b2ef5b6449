//! # Processor Description Tests

use std::io::Write;

use ipcq_core::config::ModelConfig;
use ipcq_core::mix::InstructionMix;
use ipcq_core::pipeline::{CeilingRule, PipelineAnalyzer, Topology};
use ipcq_core::{ModelError, ProcessorDescription};
use pretty_assertions::assert_eq;

use crate::common::harness::assert_close;

const MICRO: &str = r#"{
    "name": "micro-8",
    "clock_mhz": 2.0,
    "ceiling": "sum_of_service_times",
    "fallback_cycles": 6.0,
    "categories": {
        "fetch":  { "cycles": 3.0, "weight": 1.0 },
        "alu":    { "cycles": 4.0, "weight": 0.5 },
        "memory": { "cycles": 7.0, "weight": 0.3 },
        "branch": { "cycles": 10.0, "weight": 0.2 }
    },
    "stages": [
        { "name": "prefetch", "categories": ["fetch"], "capacity": 6 },
        { "name": "decode", "categories": ["alu", "branch"] },
        { "name": "execute", "categories": ["alu", "memory"], "penalty": 1.5 }
    ],
    "workloads": {
        "compute": { "fetch": 1.0, "alu": 0.9, "memory": 0.1 },
        "memory":  { "fetch": 1.0, "alu": 0.3, "memory": 0.7 }
    },
    "measured_ipc": 0.05
}"#;

#[test]
fn test_parse_full_description() {
    let description = ProcessorDescription::from_json_str(MICRO).unwrap();
    assert_eq!(description.name(), "micro-8");
    assert_eq!(description.measured_ipc(), Some(0.05));

    let spec = description.pipeline_spec();
    assert_eq!(spec.topology(), Topology::SeriesWithPrefetch);
    assert_eq!(spec.ceiling(), CeilingRule::SumOfServiceTimes);
    assert_eq!(spec.stage("execute").unwrap().fixed_penalty, 1.5);
    assert_eq!(description.instruction_mix().len(), 4);

    let names: Vec<&str> = description.workload_names().collect();
    assert_eq!(names, vec!["compute", "memory"]);
}

#[test]
fn test_description_overrides_config() {
    let description = ProcessorDescription::from_json_str(MICRO).unwrap();
    let config = ModelConfig::default();
    assert_eq!(description.fallback_cycles(&config), 6.0);
    assert_eq!(description.clock_mhz(&config), 2.0);
}

#[test]
fn test_config_fills_missing_values() {
    let json = r#"{
        "name": "bare",
        "categories": { "x": { "cycles": 2.0, "weight": 1.0 } },
        "stages": [ { "name": "only", "categories": ["x"] } ]
    }"#;
    let description = ProcessorDescription::from_json_str(json).unwrap();
    let config = ModelConfig::default();
    assert_eq!(description.fallback_cycles(&config), 8.0);
    assert_eq!(description.clock_mhz(&config), 1.0);
    assert_eq!(description.measured_ipc(), None);
    assert_eq!(description.pipeline_spec().ceiling(), CeilingRule::SumOfServiceTimes);
}

#[test]
fn test_workload_mix_changes_prediction() {
    let description = ProcessorDescription::from_json_str(MICRO).unwrap();
    let spec = description.pipeline_spec();
    let compute = description.mix_for_workload("compute").unwrap();
    let memory = description.mix_for_workload("memory").unwrap();

    let ipc = |mix: &InstructionMix| {
        PipelineAnalyzer::new(spec, mix, 6.0)
            .unwrap()
            .predict(0.05)
            .unwrap()
            .predicted_ipc
    };
    assert!(ipc(&compute) > ipc(&memory));
    // execute under compute: (0.9*4 + 0.1*7) / 1.0 + 1.5
    let s = PipelineAnalyzer::new(spec, &compute, 6.0).unwrap().service_times();
    assert_close(s[2].cycles, 5.8, 1e-12);
    assert!(s[1].cycles < 4.0 + 1e-12);
}

#[test]
fn test_unknown_workload() {
    let description = ProcessorDescription::from_json_str(MICRO).unwrap();
    assert!(matches!(
        description.mix_for_workload("control"),
        Err(ModelError::UnknownWorkload { name }) if name == "control"
    ));
}

#[test]
fn test_stage_with_unknown_category_rejected() {
    let json = r#"{
        "name": "bad",
        "categories": { "x": { "cycles": 2.0, "weight": 1.0 } },
        "stages": [ { "name": "only", "categories": ["y"] } ]
    }"#;
    assert!(matches!(
        ProcessorDescription::from_json_str(json),
        Err(ModelError::UnknownCategory { name }) if name == "y"
    ));
}

#[test]
fn test_unknown_field_rejected() {
    let json = r#"{
        "name": "bad",
        "categories": { "x": { "cycles": 2.0, "weight": 1.0, "latency": 3 } },
        "stages": [ { "name": "only", "categories": ["x"] } ]
    }"#;
    assert!(matches!(
        ProcessorDescription::from_json_str(json),
        Err(ModelError::Parse(_))
    ));
}

#[test]
fn test_invalid_structure_rejected() {
    let json = r#"{
        "name": "bad",
        "categories": { "x": { "cycles": 2.0, "weight": 1.0 } },
        "stages": [ { "name": "pf", "categories": ["x"], "capacity": 4 } ]
    }"#;
    assert!(matches!(
        ProcessorDescription::from_json_str(json),
        Err(ModelError::NoSeriesStage)
    ));
}

#[test]
fn test_load_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MICRO.as_bytes()).unwrap();
    let description = ProcessorDescription::load(file.path()).unwrap();
    assert_eq!(description.name(), "micro-8");
}
