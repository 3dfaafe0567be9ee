//! Shared evaluation workflow used by both CLI and TUI front-ends.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! settings -> trace ingest (and averaging) -> reconstruction -> results record
//!
//! The CLI and the TUI can then focus on presentation (printing vs widgets).

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use rayon::prelude::*;

use crate::data::average::average_cycles;
use crate::domain::{BatchEntry, EvalOptions, LoopMetrics, RawSample, ResultsFile, TraceStats};
use crate::error::AppError;
use crate::eval::{Reconstruction, loop_metrics, reconstruct};
use crate::io::export::run_name;
use crate::io::ingest::{IngestedTrace, is_hysteresis_csv, load_raw_trace, read_hysteresis_csv, trace_stats};
use crate::io::results::build_results_file;
use crate::io::settings::{SettingsFile, load_settings};

/// Environment variable naming the default settings file.
pub const SETTINGS_ENV: &str = "HESM_SETTINGS";

/// Settings file looked up next to the trace when nothing else is given.
pub const DEFAULT_SETTINGS_NAME: &str = "meas_settings.txt";

/// All computed outputs of a single `hesm eval` run.
#[derive(Debug, Clone)]
pub struct EvalRun {
    /// Human-readable trace source for the summary.
    pub source: String,
    pub stats: TraceStats,
    pub settings_file: SettingsFile,
    pub settings_path: PathBuf,
    pub options: EvalOptions,
    pub reconstruction: Reconstruction,
    pub results_file: ResultsFile,
    /// Run name used for exports.
    pub name: String,
}

/// Pick the settings file: explicit path, then `$HESM_SETTINGS`, then
/// `meas_settings.txt` in the trace's directory.
pub fn resolve_settings_path(explicit: Option<&Path>, trace: &Path) -> PathBuf {
    settings_path_from(explicit, std::env::var_os(SETTINGS_ENV).map(PathBuf::from), trace)
}

fn settings_path_from(explicit: Option<&Path>, from_env: Option<PathBuf>, trace: &Path) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Some(path) = from_env.filter(|p| !p.as_os_str().is_empty()) {
        log::debug!("using settings from ${SETTINGS_ENV}: {}", path.display());
        return path;
    }
    trace
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(DEFAULT_SETTINGS_NAME)
}

/// Load one trace, or average several recordings of the same measurement.
pub fn load_traces(paths: &[PathBuf]) -> Result<IngestedTrace, AppError> {
    let Some(first) = paths.first() else {
        return Err(AppError::new(2, "No trace given."));
    };
    if paths.len() == 1 {
        return load_raw_trace(first);
    }

    let mut traces = Vec::with_capacity(paths.len());
    let mut rows_read = 0;
    for path in paths {
        let trace = load_raw_trace(path)?;
        rows_read += trace.rows_read;
        traces.push(trace.samples);
    }
    let samples = average_cycles(&traces)?;
    let stats = trace_stats(&samples).ok_or_else(|| AppError::new(3, "Averaged trace contains no samples."))?;
    log::info!("averaged {} traces into {} samples", paths.len(), samples.len());

    Ok(IngestedTrace {
        samples,
        stats,
        rows_read,
    })
}

/// Reconstruct one trace with the given settings.
pub fn evaluate(
    samples: &[RawSample],
    settings: &SettingsFile,
    options: &EvalOptions,
) -> Result<Reconstruction, AppError> {
    Ok(reconstruct(samples, &settings.settings, options)?)
}

/// Execute the full single-trace workflow.
pub fn run_eval(
    traces: &[PathBuf],
    settings: Option<&Path>,
    options: EvalOptions,
    generated: NaiveDateTime,
) -> Result<EvalRun, AppError> {
    let Some(first) = traces.first() else {
        return Err(AppError::new(2, "No trace given."));
    };
    let settings_path = resolve_settings_path(settings, first);
    let settings_file = load_settings(&settings_path)?;

    let ingest = load_traces(traces)?;
    let reconstruction = evaluate(&ingest.samples, &settings_file, &options)?;

    let results_file = build_results_file(
        generated,
        settings_file.sample.clone(),
        settings_file.settings.clone(),
        options,
        reconstruction.results.clone(),
    );
    let name = run_name(generated, &settings_file.sample, &settings_file.settings);
    let source = match traces {
        [single] => single.display().to_string(),
        many => format!("{} ({} traces averaged)", first.display(), many.len()),
    };

    Ok(EvalRun {
        source,
        stats: ingest.stats,
        settings_file,
        settings_path,
        options,
        reconstruction,
        results_file,
        name,
    })
}

/// Amplitude from an `A<value>V` token, e.g. `PZT_A10.0V-f1.0Hz.csv` -> 10.0.
///
/// The `A` must start the name or follow a non-alphanumeric character.
pub fn amplitude_from_file_name(name: &str) -> Option<f64> {
    let bytes = name.as_bytes();
    for (idx, _) in name.match_indices('A') {
        if idx > 0 && bytes[idx - 1].is_ascii_alphanumeric() {
            continue;
        }
        let rest = &name[idx + 1..];
        let len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.' || c == '-'))
            .unwrap_or(rest.len());
        if len == 0 || !rest[len..].starts_with('V') {
            continue;
        }
        if let Ok(value) = rest[..len].parse::<f64>() {
            if value.is_finite() {
                return Some(value);
            }
        }
    }
    None
}

/// Evaluate many files with one settings file.
///
/// Each file is either a raw trace, which is reconstructed, or a data file
/// exported by `hesm eval`, whose loop is measured as saved. Files are
/// independent: a failing file is reported in its entry and does not stop the
/// others. Output order follows `paths`.
pub fn run_batch(paths: &[PathBuf], settings: &SettingsFile, options: &EvalOptions) -> Vec<BatchEntry> {
    paths
        .par_iter()
        .map(|path| {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());

            let mut per_trace = settings.clone();
            if let Some(amplitude) = amplitude_from_file_name(&file) {
                per_trace.settings.amplitude = amplitude;
            }

            let outcome = batch_metrics(path, &per_trace, options).map_err(|e| {
                log::warn!("{file}: {e}");
                e.to_string()
            });

            BatchEntry {
                file,
                amplitude: per_trace.settings.amplitude,
                outcome,
            }
        })
        .collect()
}

fn batch_metrics(path: &Path, settings: &SettingsFile, options: &EvalOptions) -> Result<LoopMetrics, AppError> {
    if is_hysteresis_csv(path)? {
        log::debug!("{}: exported data file, skipping reconstruction", path.display());
        let table = read_hysteresis_csv(path)?;
        return Ok(loop_metrics(&table, options)?);
    }
    let trace = load_raw_trace(path)?;
    let reconstruction = evaluate(&trace.samples, settings, options)?;
    Ok(LoopMetrics::from(&reconstruction.results))
}
