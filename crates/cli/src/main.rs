//! Pipeline throughput model CLI.
//!
//! This binary evaluates a processor description from the command line. It performs:
//! 1. **Prediction:** IPC, CPI, MIPS and per-stage metrics at one arrival rate.
//! 2. **Calibration:** Bisection for the arrival rate that reproduces a measured IPC.
//! 3. **Exploration:** Arrival-rate sweeps, per-category sensitivity and workload profile comparison.
//! 4. **Identification:** Fitting free parameters to a JSON file of measurement sources.

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ipcq_core::calibrate::{FreeParameter, Identifier, MeasurementSource};
use ipcq_core::mix::InstructionMix;
use ipcq_core::report::{ModelReport, REPORT_SECTIONS};
use ipcq_core::sim::{arrival_sweep, sensitivity_sweep};
use ipcq_core::{Calibrator, Config, ModelError, PipelineAnalyzer, ProcessorDescription, Result};

#[derive(Parser, Debug)]
#[command(
    name = "ipcq",
    author,
    version,
    about = "Queueing-network IPC estimator for processor pipelines",
    long_about = "Estimate steady-state IPC of a processor pipeline from a JSON description, \
                  calibrate it against a measured IPC, or fit its parameters to measurements.\n\n\
                  Examples:\n  \
                  ipcq cpu.json predict --rate 0.05\n  \
                  ipcq cpu.json calibrate --measured 0.12 --json out.json\n  \
                  ipcq cpu.json sweep --from 0.01 --to 0.2 --steps 20\n  \
                  ipcq cpu.json identify measurements.json"
)]
struct Cli {
    /// Engine configuration file (JSON); built-in defaults otherwise.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Processor description (JSON).
    description: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Predict IPC and stage metrics at one arrival rate.
    Predict {
        /// Arrival rate in instructions per cycle (default from the configuration).
        #[arg(short, long)]
        rate: Option<f64>,

        /// Workload profile to re-weight the mix with.
        #[arg(short, long)]
        workload: Option<String>,

        /// Report sections to print (comma separated; all by default).
        #[arg(long, value_delimiter = ',')]
        sections: Vec<String>,

        /// Also write the report as JSON to this file.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Find the arrival rate that reproduces a measured IPC.
    Calibrate {
        /// Measured IPC (default from the description).
        #[arg(short, long)]
        measured: Option<f64>,

        /// Acceptance band in percent.
        #[arg(short, long)]
        tolerance: Option<f64>,

        /// Evaluation budget.
        #[arg(long)]
        max_iterations: Option<usize>,

        /// First arrival rate to try.
        #[arg(long)]
        initial_guess: Option<f64>,

        /// Workload profile to re-weight the mix with.
        #[arg(short, long)]
        workload: Option<String>,

        /// Also write the report as JSON to this file.
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Predict over evenly spaced arrival rates.
    Sweep {
        /// First rate.
        #[arg(long)]
        from: f64,

        /// Last rate.
        #[arg(long)]
        to: f64,

        /// Number of rates.
        #[arg(long, default_value_t = 10)]
        steps: usize,

        /// Workload profile to re-weight the mix with.
        #[arg(short, long)]
        workload: Option<String>,
    },

    /// IPC response to a relative change of each category's cost.
    Sensitivity {
        /// Arrival rate (default from the configuration).
        #[arg(short, long)]
        rate: Option<f64>,

        /// Relative cost step.
        #[arg(long, default_value_t = 0.1)]
        step: f64,

        /// Workload profile to re-weight the mix with.
        #[arg(short, long)]
        workload: Option<String>,
    },

    /// Compare every declared workload profile at one arrival rate.
    Profiles {
        /// Arrival rate (default from the configuration).
        #[arg(short, long)]
        rate: Option<f64>,
    },

    /// Fit free parameters to measurement sources.
    Identify {
        /// Measurement file: `{ "free": [...], "sources": [...] }`.
        measurements: PathBuf,

        /// Arrival rate when it is not a free parameter (default from the configuration).
        #[arg(short, long)]
        rate: Option<f64>,

        /// Also write the report as JSON to this file.
        #[arg(long)]
        json: Option<PathBuf>,
    },
}

/// Contents of an identification measurement file.
#[derive(Debug, Deserialize)]
struct IdentifyRequest {
    free: Vec<FreeParameter>,
    sources: Vec<MeasurementSource>,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("\n[!] error: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let description = ProcessorDescription::load(&cli.description)?;
    let fallback = description.fallback_cycles(&config.model);
    let clock = description.clock_mhz(&config.model);
    info!(
        processor = description.name(),
        stages = description.pipeline_spec().stages().len(),
        categories = description.instruction_mix().len(),
        fallback,
        clock,
        "loaded processor description"
    );

    match cli.command {
        Commands::Predict {
            rate,
            workload,
            sections,
            json,
        } => {
            if let Some(unknown) = sections
                .iter()
                .find(|s| !REPORT_SECTIONS.contains(&s.as_str()))
            {
                return Err(ModelError::invalid(
                    "sections",
                    format!("unknown section '{unknown}'; expected one of {REPORT_SECTIONS:?}"),
                ));
            }
            let mix = select_mix(&description, workload.as_deref())?;
            let analyzer = PipelineAnalyzer::new(description.pipeline_spec(), &mix, fallback)?;
            let prediction = analyzer.predict(rate.unwrap_or(config.model.arrival_rate))?;
            let report = base_report(&description, clock, workload).with_prediction(prediction);
            report.print_sections(&sections);
            write_json(&report, json.as_deref())
        }
        Commands::Calibrate {
            measured,
            tolerance,
            max_iterations,
            initial_guess,
            workload,
            json,
        } => {
            let measured = measured.or(description.measured_ipc()).ok_or_else(|| {
                ModelError::invalid(
                    "measured",
                    "no measured IPC given and none recorded in the description",
                )
            })?;
            let mix = select_mix(&description, workload.as_deref())?;
            let analyzer = PipelineAnalyzer::new(description.pipeline_spec(), &mix, fallback)?;
            let settings = &config.calibration;
            let calibration = Calibrator::with_config(&analyzer, settings.clone()).calibrate(
                measured,
                initial_guess.unwrap_or(settings.initial_guess),
                tolerance.unwrap_or(settings.tolerance_percent),
                max_iterations.unwrap_or(settings.max_iterations),
            )?;
            let prediction = analyzer.predict(calibration.arrival_rate)?;
            let report = base_report(&description, clock, workload)
                .with_prediction(prediction)
                .with_calibration(calibration);
            report.print();
            write_json(&report, json.as_deref())
        }
        Commands::Sweep {
            from,
            to,
            steps,
            workload,
        } => {
            let mix = select_mix(&description, workload.as_deref())?;
            let analyzer = PipelineAnalyzer::new(description.pipeline_spec(), &mix, fallback)?;
            let predictions = arrival_sweep(&analyzer, from, to, steps)?;
            println!("\nARRIVAL SWEEP: {}", description.name());
            println!("  {:>10} {:>10} {:>10} {:>8}  bottleneck", "rate", "ipc", "mips", "stable");
            for p in &predictions {
                println!(
                    "  {:>10.5} {:>10.6} {:>10.4} {:>8}  {}",
                    p.arrival_rate,
                    p.predicted_ipc,
                    p.mips(clock),
                    p.stable,
                    p.bottleneck
                );
            }
            Ok(())
        }
        Commands::Sensitivity {
            rate,
            step,
            workload,
        } => {
            let mix = select_mix(&description, workload.as_deref())?;
            let rate = rate.unwrap_or(config.model.arrival_rate);
            let rows = sensitivity_sweep(description.pipeline_spec(), &mix, fallback, rate, step)?;
            println!(
                "\nCATEGORY SENSITIVITY: {} (rate {rate:.5}, step {:+.1}%)",
                description.name(),
                step * 100.0
            );
            println!(
                "  {:<14} {:>10} {:>12} {:>12} {:>12}",
                "category", "cost", "d_ipc", "ipc/cycle", "elasticity"
            );
            for s in &rows {
                println!(
                    "  {:<14} {:>10.3} {:>12.3e} {:>12.3e} {:>12}",
                    s.category,
                    s.base_cost,
                    s.delta_ipc,
                    s.ipc_per_cycle,
                    s.elasticity.map_or_else(|| "n/a".to_string(), |e| format!("{e:.4}"))
                );
            }
            Ok(())
        }
        Commands::Profiles { rate } => {
            let rate = rate.unwrap_or(config.model.arrival_rate);
            println!("\nWORKLOAD PROFILES: {} (rate {rate:.5})", description.name());
            println!("  {:<14} {:>10} {:>10} {:>10}  bottleneck", "workload", "ipc", "cpi", "mips");
            for name in description.workload_names() {
                let mix = description.mix_for_workload(name)?;
                let analyzer = PipelineAnalyzer::new(description.pipeline_spec(), &mix, fallback)?;
                let p = analyzer.predict(rate)?;
                println!(
                    "  {:<14} {:>10.6} {:>10} {:>10.4}  {}",
                    name,
                    p.predicted_ipc,
                    p.cpi().map_or_else(|| "inf".to_string(), |c| format!("{c:.4}")),
                    p.mips(clock),
                    p.bottleneck
                );
            }
            Ok(())
        }
        Commands::Identify {
            measurements,
            rate,
            json,
        } => {
            let text = fs::read_to_string(&measurements).map_err(|source| ModelError::Io {
                path: measurements.clone(),
                source,
            })?;
            let request: IdentifyRequest = serde_json::from_str(&text)?;
            let rate = rate.unwrap_or(config.model.arrival_rate);
            let identifier = Identifier::new(
                description.pipeline_spec(),
                description.instruction_mix(),
                fallback,
                rate,
            )?
            .with_config(config.identification.clone());
            let identification = identifier.identify(&request.free, &request.sources)?;
            let report = base_report(&description, clock, None).with_identification(identification);
            report.print_sections(&["summary".to_string(), "identification".to_string()]);
            write_json(&report, json.as_deref())
        }
    }
}

fn select_mix(
    description: &ProcessorDescription,
    workload: Option<&str>,
) -> Result<InstructionMix> {
    match workload {
        Some(name) => description.mix_for_workload(name),
        None => Ok(description.instruction_mix().clone()),
    }
}

fn base_report(
    description: &ProcessorDescription,
    clock: f64,
    workload: Option<String>,
) -> ModelReport {
    let report = ModelReport::new(description.name(), clock);
    match workload {
        Some(name) => report.with_workload(name),
        None => report,
    }
}

fn write_json(report: &ModelReport, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    fs::write(path, report.to_json()?).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    println!("[*] report written to {}", path.display());
    Ok(())
}
