//! # Calibration Tests
//!
//! Bisection against the analytical model, plus scripted models that probe the
//! best-seen and instability guarantees.

use ipcq_core::calibrate::{Calibrator, error_percent};
use ipcq_core::config::CalibrationConfig;
use ipcq_core::pipeline::{PipelineAnalyzer, ThroughputModel};
use ipcq_core::ModelError;
use rstest::rstest;

use crate::common::builder::mix::MixBuilder;
use crate::common::builder::pipeline::{PipelineBuilder, two_stage};
use crate::common::harness::{assert_close, init_tracing};
use crate::common::mocks::model::{MockModel, prediction};

#[test]
fn test_error_percent() {
    assert_close(error_percent(0.098, 0.1), 2.0, 1e-9);
    assert_eq!(error_percent(0.1, 0.1), 0.0);
}

#[test]
fn test_search_bounds_follow_slowest_stage() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let (low, high) = Calibrator::new(&analyzer).search_bounds().unwrap();
    assert_eq!(low, 0.01);
    assert_close(high, 0.95 / 7.0, 1e-15);
}

#[test]
fn test_search_bounds_for_slow_pipeline() {
    let mix = MixBuilder::new().category("x", 200.0, 1.0).build();
    let spec = PipelineBuilder::new("slow").series("only", &["x"]).build();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let (low, high) = Calibrator::new(&analyzer).search_bounds().unwrap();
    assert_close(high, 0.00475, 1e-15);
    assert_close(low, high / 2.0, 1e-15);
}

#[test]
fn test_two_stage_calibration_converges() {
    init_tracing();
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let result = Calibrator::new(&analyzer).calibrate(0.0392, 0.1, 2.0, 50).unwrap();

    assert!(result.converged);
    assert!(result.stable);
    assert!(result.iterations <= 50);
    assert!(result.error_percent <= 2.0);
    assert_eq!(result.bottleneck_stage, "B");
    assert_eq!(result.stage_metrics.len(), 2);
}

#[test]
fn test_tight_tolerance_recovers_rate() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let result = Calibrator::new(&analyzer).calibrate(0.0392, 0.1, 0.01, 50).unwrap();

    assert!(result.converged);
    assert!((result.arrival_rate - 0.05).abs() < 1e-4);
}

#[test]
fn test_calibrated_point_is_reproducible() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let result = Calibrator::new(&analyzer).calibrate_measured(0.035).unwrap();
    let again = analyzer.predict(result.arrival_rate).unwrap();
    assert_eq!(again.predicted_ipc, result.predicted_ipc);
    assert_eq!(again.stage_metrics, result.stage_metrics);
}

#[test]
fn test_best_result_beats_uniform_scan() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let measured = 0.061;
    // Seeded far above the stability ceiling.
    let result = Calibrator::new(&analyzer).calibrate(measured, 5.0, 1e-9, 200).unwrap();

    let scan_best = (0..1000)
        .map(|i| 0.01 + 0.94 * f64::from(i) / 999.0)
        .map(|rate| analyzer.predict(rate).unwrap())
        .filter(|p| p.stable)
        .map(|p| error_percent(p.predicted_ipc, measured))
        .fold(f64::INFINITY, f64::min);

    assert!(result.stable);
    assert!(
        result.error_percent <= scan_best + 1e-2,
        "bisection {} vs scan {}",
        result.error_percent,
        scan_best
    );
}

#[test]
fn test_unreachable_target_beats_scan_of_search_interval() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let calibrator = Calibrator::new(&analyzer);
    let (low, high) = calibrator.search_bounds().unwrap();
    let measured = 0.2;
    let result = calibrator.calibrate(measured, 5.0, 1e-9, 200).unwrap();

    let scan_best = (0..1000)
        .map(|i| low + (high - low) * f64::from(i) / 999.0)
        .map(|rate| analyzer.predict(rate).unwrap())
        .filter(|p| p.stable)
        .map(|p| error_percent(p.predicted_ipc, measured))
        .fold(f64::INFINITY, f64::min);

    assert!(!result.converged);
    assert!(result.stable);
    assert!(result.arrival_rate <= high);
    assert!(
        result.error_percent <= scan_best + 1e-3,
        "bisection {} vs scan {}",
        result.error_percent,
        scan_best
    );
}

#[test]
fn test_unreachable_target_reports_best_stable_point() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let (_, high) = Calibrator::new(&analyzer).search_bounds().unwrap();
    let result = Calibrator::new(&analyzer).calibrate(0.2, 0.1, 2.0, 50).unwrap();

    assert!(!result.converged);
    assert!(result.stable);
    assert!(result.iterations <= 50);
    assert!(result.arrival_rate <= high);
    let at_high = analyzer.predict(high).unwrap().predicted_ipc;
    assert!(result.predicted_ipc <= at_high + 1e-12);
    assert!(result.predicted_ipc > 0.9 * at_high);
}

#[test]
fn test_iteration_budget_is_respected() {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let result = Calibrator::new(&analyzer).calibrate(0.02, 0.1, 1e-9, 1).unwrap();
    assert_eq!(result.iterations, 1);
    assert!(!result.converged);
    assert_eq!(result.arrival_rate, 0.1);
}

#[rstest]
#[case(0.0, 0.1, 2.0, 50)]
#[case(-0.1, 0.1, 2.0, 50)]
#[case(f64::NAN, 0.1, 2.0, 50)]
#[case(0.04, 0.1, 0.0, 50)]
#[case(0.04, 0.1, -1.0, 50)]
#[case(0.04, 0.0, 2.0, 50)]
#[case(0.04, 0.1, 2.0, 0)]
fn test_invalid_arguments_rejected(
    #[case] measured: f64,
    #[case] guess: f64,
    #[case] tolerance: f64,
    #[case] max_iterations: usize,
) {
    let (spec, mix) = two_stage();
    let analyzer = PipelineAnalyzer::new(&spec, &mix, 8.0).unwrap();
    let result = Calibrator::new(&analyzer).calibrate(measured, guess, tolerance, max_iterations);
    assert!(matches!(result, Err(ModelError::InvalidArgument { .. })));
}

#[test]
fn test_unstable_point_never_kept_as_best() {
    init_tracing();
    let mut model = MockModel::new();
    let _ = model.expect_max_service_time().return_const(1.0);
    let _ = model.expect_fallback_stages().returning(Vec::new);
    // Above 0.5 the model is unstable yet claims exactly the measured IPC.
    let _ = model.expect_predict().returning(|rate| {
        Ok(if rate > 0.5 {
            prediction(rate, 0.4, false)
        } else {
            prediction(rate, rate * 0.5, true)
        })
    });

    let result = Calibrator::new(&model).calibrate(0.4, 0.1, 2.0, 50).unwrap();
    assert!(result.stable);
    assert!(!result.converged);
    assert!(result.arrival_rate <= 0.5);
    assert!(result.predicted_ipc <= 0.25);
}

#[test]
fn test_all_unstable_reports_unstable_result() {
    let mut model = MockModel::new();
    let _ = model.expect_max_service_time().return_const(2.0);
    let _ = model.expect_fallback_stages().returning(Vec::new);
    let _ = model
        .expect_predict()
        .returning(|rate| Ok(prediction(rate, 0.0, false)));

    let result = Calibrator::new(&model).calibrate(0.1, 0.1, 2.0, 30).unwrap();
    assert!(!result.stable);
    assert!(!result.converged);
    assert!(result.iterations <= 30);
}

#[test]
fn test_fallback_stages_queried_once() {
    init_tracing();
    let mut model = MockModel::new();
    let _ = model.expect_max_service_time().return_const(4.0);
    let _ = model
        .expect_fallback_stages()
        .times(1)
        .returning(|| vec!["fpu".to_string()]);
    let _ = model
        .expect_predict()
        .returning(|rate| Ok(prediction(rate, rate, true)));

    let result = Calibrator::new(&model).calibrate(0.1, 0.1, 2.0, 50).unwrap();
    assert!(result.converged);
}

#[test]
fn test_model_errors_propagate() {
    let mut model = MockModel::new();
    let _ = model.expect_max_service_time().return_const(4.0);
    let _ = model.expect_fallback_stages().returning(Vec::new);
    let _ = model
        .expect_predict()
        .returning(|_| Err(ModelError::invalid("arrival_rate", "scripted failure")));

    assert!(Calibrator::new(&model).calibrate(0.1, 0.1, 2.0, 50).is_err());
}

#[test]
fn test_custom_config_caps_rate() {
    let mut model = MockModel::new();
    let _ = model.expect_max_service_time().return_const(1.0);
    let _ = model.expect_fallback_stages().returning(Vec::new);
    let _ = model
        .expect_predict()
        .returning(|rate| Ok(prediction(rate, rate, true)));

    let config = CalibrationConfig {
        rate_ceiling: 0.3,
        ..CalibrationConfig::default()
    };
    let calibrator = Calibrator::with_config(&model, config);
    let result = calibrator.calibrate_measured(0.9).unwrap();
    assert!(result.arrival_rate <= 0.3);
    assert!(!result.converged);
    assert_eq!(model.max_service_time(), 1.0);
}
