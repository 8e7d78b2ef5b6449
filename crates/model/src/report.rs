//! Model result reporting.
//!
//! This module gathers the outputs of one model run for presentation. It provides:
//! 1. **Collection:** `ModelReport` bundles a prediction with optional calibration and identification results.
//! 2. **Rendering:** Fixed-width, sectioned text (`summary`, `stages`, `calibration`, `identification`).
//! 3. **Export:** Pretty-printed JSON of the whole report.

use std::fmt::{self, Write};

use serde::Serialize;

use crate::calibrate::{CalibrationResult, IdentificationResult};
use crate::common::error::Result;
use crate::pipeline::PredictionResult;

/// Section names understood by [`ModelReport::render_sections`], in print order.
pub const REPORT_SECTIONS: &[&str] = &["summary", "stages", "calibration", "identification"];

const RULE: &str = "==========================================================";
const THIN_RULE: &str = "----------------------------------------------------------";

/// Everything produced for one processor and workload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelReport {
    /// Processor name.
    pub processor: String,
    /// Workload profile name, or `None` for the base mix.
    pub workload: Option<String>,
    /// Clock used for MIPS figures.
    pub clock_mhz: f64,
    /// Prediction at the report's arrival rate.
    pub prediction: Option<PredictionResult>,
    /// Calibration outcome, if one was run.
    pub calibration: Option<CalibrationResult>,
    /// Identification outcome, if one was run.
    pub identification: Option<IdentificationResult>,
}

impl ModelReport {
    /// Creates an empty report.
    pub fn new(processor: impl Into<String>, clock_mhz: f64) -> Self {
        Self {
            processor: processor.into(),
            workload: None,
            clock_mhz,
            prediction: None,
            calibration: None,
            identification: None,
        }
    }

    /// Sets the workload name.
    #[must_use]
    pub fn with_workload(mut self, workload: impl Into<String>) -> Self {
        self.workload = Some(workload.into());
        self
    }

    /// Attaches a prediction.
    #[must_use]
    pub fn with_prediction(mut self, prediction: PredictionResult) -> Self {
        self.prediction = Some(prediction);
        self
    }

    /// Attaches a calibration outcome.
    ///
    /// Without a prediction, the `stages` section shows the calibrated point's metrics.
    #[must_use]
    pub fn with_calibration(mut self, calibration: CalibrationResult) -> Self {
        self.calibration = Some(calibration);
        self
    }

    /// Attaches an identification outcome.
    #[must_use]
    pub fn with_identification(mut self, identification: IdentificationResult) -> Self {
        self.identification = Some(identification);
        self
    }

    /// Renders the requested sections; an empty slice selects all of them.
    ///
    /// Unknown section names are ignored. Sections without data are skipped.
    pub fn render_sections(&self, sections: &[String]) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_sections(&mut out, sections);
        out
    }

    /// Prints the requested sections to stdout.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }

    /// Prints every section to stdout.
    pub fn print(&self) {
        self.print_sections(&[]);
    }

    /// Serializes the report as pretty JSON; saturated metrics become `null`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn write_sections(&self, out: &mut impl Write, sections: &[String]) -> fmt::Result {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);

        if want("summary") {
            writeln!(out, "\n{RULE}")?;
            writeln!(out, "QUEUEING MODEL REPORT: {}", self.processor)?;
            writeln!(out, "{RULE}")?;
            writeln!(
                out,
                "workload                 {}",
                self.workload.as_deref().unwrap_or("base")
            )?;
            writeln!(out, "clock                    {:.2} MHz", self.clock_mhz)?;
            if let Some(p) = &self.prediction {
                let fallback = p.fallback_stages();
                writeln!(out, "arrival_rate             {:.6}", p.arrival_rate)?;
                writeln!(out, "predicted_ipc            {:.6}", p.predicted_ipc)?;
                writeln!(
                    out,
                    "predicted_cpi            {}",
                    p.cpi().map_or_else(|| "inf".to_string(), |c| format!("{c:.4}"))
                )?;
                writeln!(out, "mips                     {:.4}", p.mips(self.clock_mhz))?;
                writeln!(out, "efficiency               {:.4}", p.efficiency)?;
                writeln!(out, "ceiling_ipc              {}", num(p.ceiling_ipc, 6))?;
                writeln!(out, "stable                   {}", p.stable)?;
                writeln!(out, "bottleneck               {}", p.bottleneck)?;
                if !fallback.is_empty() {
                    writeln!(out, "fallback_stages          {}", fallback.join(", "))?;
                }
            }
            writeln!(out, "{THIN_RULE}")?;
        }

        if want("stages") {
            let table = self
                .prediction
                .as_ref()
                .map(|p| (&p.stage_metrics, p.bottleneck.as_str()))
                .or_else(|| {
                    self.calibration
                        .as_ref()
                        .map(|c| (&c.stage_metrics, c.bottleneck_stage.as_str()))
                });
            if let Some((metrics, bottleneck)) = table {
                writeln!(out, "STAGES")?;
                writeln!(
                    out,
                    "  {:<14} {:<8} {:>9} {:>8} {:>8} {:>10} {:>10} {:>10}",
                    "stage", "kind", "S", "rho", "util", "L", "W", "R"
                )?;
                for m in metrics {
                    let marker = if m.name == bottleneck { "*" } else { " " };
                    writeln!(
                        out,
                        "{marker} {:<14} {:<8} {:>9.3} {:>8.4} {:>8.4} {:>10} {:>10} {:>10}",
                        m.name,
                        m.kind.label(),
                        m.service_time,
                        m.offered_load,
                        m.utilization,
                        num(m.queue_length, 4),
                        num(m.wait_time, 3),
                        num(m.response_time, 3)
                    )?;
                }
                writeln!(out, "{THIN_RULE}")?;
            }
        }

        if want("calibration") {
            if let Some(c) = &self.calibration {
                writeln!(out, "CALIBRATION")?;
                writeln!(out, "  measured_ipc           {:.6}", c.measured_ipc)?;
                writeln!(out, "  predicted_ipc          {:.6}", c.predicted_ipc)?;
                writeln!(out, "  arrival_rate           {:.6}", c.arrival_rate)?;
                writeln!(out, "  error                  {:.3}%", c.error_percent)?;
                writeln!(out, "  iterations             {}", c.iterations)?;
                writeln!(out, "  converged              {}", c.converged)?;
                writeln!(out, "  stable                 {}", c.stable)?;
                writeln!(out, "  bottleneck             {}", c.bottleneck_stage)?;
                writeln!(
                    out,
                    "  search_bounds          [{:.6}, {:.6}]",
                    c.search_bounds.0, c.search_bounds.1
                )?;
                writeln!(out, "{THIN_RULE}")?;
            }
        }

        if want("identification") {
            if let Some(id) = &self.identification {
                writeln!(out, "IDENTIFICATION")?;
                for p in &id.parameters {
                    writeln!(
                        out,
                        "  {:<22} {:>12.6} (from {:.6})",
                        p.parameter.label(),
                        p.value,
                        p.initial
                    )?;
                }
                for r in &id.residuals {
                    writeln!(
                        out,
                        "  residual.{:<13} {:>12.6} (weight {:.3})",
                        r.name, r.residual, r.weight
                    )?;
                }
                writeln!(
                    out,
                    "  loss                   {:.6e} (from {:.6e})",
                    id.loss, id.initial_loss
                )?;
                writeln!(out, "  sweeps                 {}", id.sweeps)?;
                writeln!(out, "  evaluations            {}", id.evaluations)?;
                writeln!(out, "  converged              {}", id.converged)?;
                writeln!(out, "{THIN_RULE}")?;
            }
        }
        Ok(())
    }
}

/// Formats a metric, rendering saturated values as `inf`.
fn num(value: f64, precision: usize) -> String {
    if value.is_infinite() {
        "inf".to_string()
    } else {
        format!("{value:.precision$}")
    }
}
