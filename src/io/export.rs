//! Export evaluated runs.
//!
//! Files use the lab's established layout so they stay readable by existing
//! spreadsheets and plotting scripts.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::domain::{
    BatchEntry, Column, HysteresisResults, HysteresisTable, MeasurementSettings, RawSample, ResultsFile, SampleInfo,
};
use crate::error::AppError;
use crate::io::results::write_results_json;
use crate::io::settings::{SettingsFile, render_settings_text};

/// `YYYY-MM-DD_HH-MM_<name>[_<electrkey>]_A<amp>V-f<freq>Hz-O<offs>V`.
pub fn run_name(timestamp: NaiveDateTime, info: &SampleInfo, settings: &MeasurementSettings) -> String {
    let mut name = format!("{}_{}", timestamp.format("%Y-%m-%d_%H-%M"), info.name);
    if let Some(key) = info.electrode_key.as_deref().filter(|k| !k.is_empty()) {
        name.push('_');
        name.push_str(key);
    }
    name.push_str(&format!(
        "_A{:.1}V-f{:.1}Hz-O{:.1}V",
        settings.amplitude, settings.frequency, info.drive_offset
    ));
    name
}

/// Write the evaluated table with a leading row-index column.
pub fn write_data_csv(path: &Path, table: &HysteresisTable) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create data CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write data CSV: {e}"));

    let header: Vec<&str> = Column::ALL.iter().map(|c| c.label()).collect();
    writeln!(out, ",{}", header.join(",")).map_err(io_err)?;

    for (idx, row) in table.rows.iter().enumerate() {
        let cells: Vec<String> = Column::ALL.iter().map(|&c| row.get(c).to_string()).collect();
        writeln!(out, "{idx},{}", cells.join(",")).map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(())
}

/// Write a raw `time,Vset,Vref` trace.
pub fn write_trace_csv(path: &Path, samples: &[RawSample]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create trace CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write trace CSV: {e}"));

    writeln!(out, "time,Vset,Vref").map_err(io_err)?;
    for s in samples {
        writeln!(out, "{},{},{}", s.time, s.vset, s.vref).map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(())
}

/// Write the batch PR table as TSV (SI units). Failed traces keep their row
/// with empty values and the error message.
pub fn write_batch_tsv(path: &Path, entries: &[BatchEntry]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create batch TSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write batch TSV: {e}"));

    writeln!(out, "file\tVamp\tPR\tPR_error\tEC\terror").map_err(io_err)?;
    for entry in entries {
        match &entry.outcome {
            Ok(r) => writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t",
                entry.file, entry.amplitude, r.pr, r.pr_error, r.ec
            ),
            Err(msg) => writeln!(out, "{}\t{}\t\t\t\t{msg}", entry.file, entry.amplitude),
        }
        .map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(())
}

/// `key,value` pairs of the scalar results.
pub fn results_rows(results: &HysteresisResults) -> Vec<(&'static str, String)> {
    vec![
        ("amplitude_V", results.amplitude.to_string()),
        ("frequency_Hz", results.frequency.to_string()),
        ("thickness_m", results.thickness.to_string()),
        ("area_m2", results.area.to_string()),
        ("area_error_m2", results.area_error.to_string()),
        ("E_bias_V_per_m", results.e_bias.to_string()),
        ("E_bias_corrected", results.e_bias_corrected.to_string()),
        ("loss_current_corrected", results.loss_current_corrected.to_string()),
        ("current_offset_A", results.current_offset.to_string()),
        ("P_diff_C_per_m2", results.p_diff.to_string()),
        ("P_null_C_per_m2", results.p_null.to_string()),
        ("PR_C_per_m2", results.pr.to_string()),
        ("PR_error_C_per_m2", results.pr_error.to_string()),
        ("PR_error_sigma", results.pr_error_sigma.to_string()),
        ("EC_V_per_m", results.ec.to_string()),
        ("vref_floor_rows", results.vref_floor_rows.to_string()),
    ]
}

/// Write the scalar results as a two-column table.
pub fn write_results_csv(path: &Path, results: &HysteresisResults) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results CSV '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::new(2, format!("Failed to write results CSV: {e}"));

    writeln!(out, "key,value").map_err(io_err)?;
    for (key, value) in results_rows(results) {
        writeln!(out, "{key},{value}").map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    Ok(())
}

/// Everything written for one evaluated trace.
#[derive(Debug, Clone, Copy)]
pub struct RunBundle<'a> {
    pub table: &'a HysteresisTable,
    pub results: &'a ResultsFile,
    /// Settings file the run was evaluated with; copied verbatim when known.
    pub settings_source: Option<&'a Path>,
    /// Pre-rendered ASCII loop.
    pub plot: &'a str,
}

/// Write `<dir>/<name>/<name>_{data.csv,results.csv,results.json,settings.txt,plot.txt}`.
///
/// Returns the bundle directory.
pub fn write_run_bundle(dir: &Path, name: &str, bundle: &RunBundle<'_>) -> Result<PathBuf, AppError> {
    let target = dir.join(name);
    fs::create_dir_all(&target)
        .map_err(|e| AppError::new(2, format!("Failed to create export dir '{}': {e}", target.display())))?;
    let file = |suffix: &str| target.join(format!("{name}_{suffix}"));

    write_data_csv(&file("data.csv"), bundle.table)?;
    write_results_csv(&file("results.csv"), &bundle.results.results)?;
    write_results_json(&file("results.json"), bundle.results)?;

    let settings_path = file("settings.txt");
    match bundle.settings_source {
        Some(source) => {
            fs::copy(source, &settings_path).map_err(|e| {
                AppError::new(2, format!("Failed to copy settings '{}': {e}", source.display()))
            })?;
        }
        None => {
            let text = render_settings_text(&SettingsFile {
                sample: bundle.results.sample.clone(),
                settings: bundle.results.settings.clone(),
            });
            fs::write(&settings_path, text)
                .map_err(|e| AppError::new(2, format!("Failed to write settings copy: {e}")))?;
        }
    }

    fs::write(file("plot.txt"), bundle.plot)
        .map_err(|e| AppError::new(2, format!("Failed to write plot: {e}")))?;

    log::info!("exported run bundle to {}", target.display());
    Ok(target)
}
