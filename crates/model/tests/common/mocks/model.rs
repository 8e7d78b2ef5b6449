use ipcq_core::pipeline::{PredictionResult, ThroughputModel};
use ipcq_core::Result;
use mockall::mock;

mock! {
    pub Model {}
    impl ThroughputModel for Model {
        fn predict(&self, arrival_rate: f64) -> Result<PredictionResult>;
        fn max_service_time(&self) -> f64;
        fn fallback_stages(&self) -> Vec<String>;
    }
}

/// A bare prediction record with no stage metrics.
pub fn prediction(arrival_rate: f64, predicted_ipc: f64, stable: bool) -> PredictionResult {
    PredictionResult {
        arrival_rate,
        predicted_ipc,
        stable,
        efficiency: 1.0,
        ceiling_ipc: f64::INFINITY,
        bottleneck: "mock".to_string(),
        stage_metrics: Vec::new(),
    }
}
