//! Command-line parsing for the hysteresis evaluator.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the evaluation code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::data::synthetic::SyntheticLoop;
use crate::domain::{EBiasShift, EvalOptions, OffsetWindow, OffsetWindowKind, VrefPolicy};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "hesm", version, about = "Ferroelectric hysteresis evaluation (shunt method)")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconstruct the P–E loop of one trace, print results and optionally export.
    Eval(EvalArgs),
    /// Evaluate many traces or data files with one settings file and print a PR table.
    Batch(BatchArgs),
    /// Plot a previously exported data CSV.
    Plot(PlotArgs),
    /// Write a synthetic trace (and matching settings) for testing.
    Simulate(SimulateArgs),
    /// Launch the interactive TUI.
    ///
    /// The loop is re-evaluated whenever a correction is toggled.
    View(ViewArgs),
}

/// Evaluation choices shared by every evaluating command.
#[derive(Debug, Args, Clone)]
pub struct EvalOptionArgs {
    /// How the DC current offset window is positioned.
    #[arg(long, value_enum, default_value_t = OffsetWindowKind::Fixed)]
    pub offset_window: OffsetWindowKind,

    /// First row of a fixed offset window.
    #[arg(long, default_value_t = 100)]
    pub offset_start: usize,

    /// Offset window length in driving periods.
    #[arg(long, default_value_t = 2.0)]
    pub offset_periods: f64,

    /// Handling of rows whose |Vref| is below the error floor.
    #[arg(long, value_enum, default_value_t = VrefPolicy::Clamp)]
    pub vref_policy: VrefPolicy,

    /// Error floor for |Vref| (V); defaults to VrefErr.
    #[arg(long)]
    pub vref_floor: Option<f64>,

    /// Multiplier on the PR error (3 = 3σ).
    #[arg(long, default_value_t = 1.0)]
    pub pr_error_sigma: f64,

    /// Rows nearest E = 0 used to re-center P.
    #[arg(long, default_value_t = 16)]
    pub zero_neighbors: usize,

    /// Rows used for PR, PR error and EC.
    #[arg(long, default_value_t = 20)]
    pub metric_neighbors: usize,

    /// Amount of the E-bias correction (`full` reproduces older evaluations).
    #[arg(long, value_enum, default_value_t = EBiasShift::Half)]
    pub ebias_shift: EBiasShift,
}

impl EvalOptionArgs {
    pub fn to_options(&self) -> EvalOptions {
        EvalOptions {
            offset_window: OffsetWindow {
                kind: self.offset_window,
                start_index: self.offset_start,
                periods: self.offset_periods,
            },
            zero_neighbors: self.zero_neighbors,
            metric_neighbors: self.metric_neighbors,
            pr_error_sigma: self.pr_error_sigma,
            vref_policy: self.vref_policy,
            vref_floor: self.vref_floor,
            ebias_shift: self.ebias_shift,
        }
    }
}

/// Options for evaluating a single measurement.
#[derive(Debug, Parser, Clone)]
pub struct EvalArgs {
    /// Raw trace CSV (time, Vset, Vref). Several traces are averaged point-wise.
    #[arg(required = true, value_name = "TRACE")]
    pub traces: Vec<PathBuf>,

    /// Settings file (`Key: value` or JSON). Falls back to $HESM_SETTINGS, then
    /// `meas_settings.txt` next to the trace.
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub options: EvalOptionArgs,

    /// Write a run bundle (data, results, settings copy, plot) under this directory.
    #[arg(long)]
    pub export_dir: Option<PathBuf>,

    /// Write the results JSON to this file.
    #[arg(long)]
    pub export_json: Option<PathBuf>,

    /// Disable the terminal plot.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 24)]
    pub height: usize,
}

/// Options for batch evaluation.
#[derive(Debug, Parser, Clone)]
pub struct BatchArgs {
    /// Raw trace CSVs or exported data CSVs (measured without re-evaluation).
    /// An `A<value>V` token in a file name sets its amplitude.
    #[arg(required = true, value_name = "TRACE")]
    pub traces: Vec<PathBuf>,

    /// Settings file shared by all traces.
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub options: EvalOptionArgs,

    /// Write the PR table as TSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

/// Options for plotting a saved data file.
#[derive(Debug, Parser)]
pub struct PlotArgs {
    /// Data CSV produced by `hesm eval --export-dir`.
    #[arg(value_name = "DATA_CSV")]
    pub data: PathBuf,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 24)]
    pub height: usize,
}

/// Options for writing a synthetic trace.
#[derive(Debug, Parser)]
pub struct SimulateArgs {
    /// Output trace CSV.
    #[arg(long, value_name = "FILE")]
    pub out: PathBuf,

    /// Also write a matching settings file.
    #[arg(long, value_name = "FILE")]
    pub settings_out: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Drive amplitude (V).
    #[arg(long, default_value_t = 10.0)]
    pub amplitude: f64,

    /// Drive frequency (Hz).
    #[arg(long, default_value_t = 1.0)]
    pub frequency: f64,

    /// Drive offset (V).
    #[arg(long, default_value_t = 0.0)]
    pub offset: f64,

    #[arg(long, default_value_t = 3)]
    pub periods: usize,

    #[arg(long, default_value_t = 400)]
    pub samples_per_period: usize,

    /// Film thickness (m).
    #[arg(long, default_value_t = 1e-6)]
    pub thickness: f64,

    /// Electrode area (m²).
    #[arg(long, default_value_t = 1e-6)]
    pub area: f64,

    /// Reference resistor (Ω).
    #[arg(long, default_value_t = 1e3)]
    pub rref: f64,

    /// Saturation polarization (C/m²).
    #[arg(long, default_value_t = 0.2)]
    pub ps: f64,

    /// Coercive field (V/m).
    #[arg(long, default_value_t = 3e6)]
    pub ec: f64,

    /// Width of the switching transition (V/m).
    #[arg(long, default_value_t = 1e6)]
    pub switching_width: f64,

    #[arg(long, default_value_t = 100.0)]
    pub permittivity: f64,

    /// DC current offset (A).
    #[arg(long, default_value_t = 1e-6)]
    pub current_offset: f64,

    /// Noise standard deviation on Vref (V).
    #[arg(long, default_value_t = 1e-5)]
    pub noise: f64,
}

impl SimulateArgs {
    pub fn to_model(&self) -> SyntheticLoop {
        SyntheticLoop {
            amplitude: self.amplitude,
            frequency: self.frequency,
            drive_offset: self.offset,
            periods: self.periods,
            samples_per_period: self.samples_per_period,
            thickness: self.thickness,
            area: self.area,
            rref: self.rref,
            saturation_polarization: self.ps,
            coercive_field: self.ec,
            switching_width: self.switching_width,
            relative_permittivity: self.permittivity,
            current_offset: self.current_offset,
            noise_std: self.noise,
            seed: self.seed,
        }
    }
}

/// Options for the interactive viewer.
#[derive(Debug, Parser, Clone)]
pub struct ViewArgs {
    /// Raw trace CSV.
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Settings file (same resolution as `eval`).
    #[arg(short = 's', long)]
    pub settings: Option<PathBuf>,

    #[command(flatten)]
    pub options: EvalOptionArgs,
}
