//! CSV ingest for scope traces and exported data files.
//!
//! A raw trace needs `time`, `Vset` and `Vref` columns. Header matching is
//! case-insensitive and tolerates a UTF-8 BOM; any other column (for example a
//! leading row index) is ignored.
//!
//! Unlike a loose table import, a trace is only useful if every row is intact:
//! the integration runs over consecutive samples, so a single bad row fails the
//! whole file with its line number.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Column, HysteresisRow, HysteresisTable, RawSample, TraceStats};
use crate::error::AppError;
use crate::math::extrema;

/// Ingest output: samples in file order plus summary stats.
#[derive(Debug, Clone)]
pub struct IngestedTrace {
    pub samples: Vec<RawSample>,
    pub stats: TraceStats,
    pub rows_read: usize,
}

/// Load a raw `time, Vset, Vref` trace.
pub fn load_raw_trace(path: &Path) -> Result<IngestedTrace, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open trace CSV '{}': {e}", path.display())))?;
    parse_raw_trace(file)
}

/// Parse a raw trace from any reader.
pub fn parse_raw_trace<R: Read>(input: R) -> Result<IngestedTrace, AppError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let time_idx = require_column(&header_map, "time")?;
    let vset_idx = require_column(&header_map, "vset")?;
    let vref_idx = require_column(&header_map, "vref")?;

    let mut samples = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        // records() starts on line 2 (1-based, after the header).
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        let sample = RawSample::new(
            parse_cell(&record, time_idx, "time", line)?,
            parse_cell(&record, vset_idx, "Vset", line)?,
            parse_cell(&record, vref_idx, "Vref", line)?,
        );
        samples.push(sample);
    }

    let rows_read = samples.len();
    let stats = trace_stats(&samples).ok_or_else(|| AppError::new(3, "Trace contains no samples."))?;
    log::debug!(
        "ingested {} samples, dt={:e} s, Vset in [{}, {}] V",
        stats.n_samples,
        stats.time_step,
        stats.vset_min,
        stats.vset_max
    );

    Ok(IngestedTrace {
        samples,
        stats,
        rows_read,
    })
}

/// Read a data file written by `write_data_csv` back into a table.
pub fn read_hysteresis_csv(path: &Path) -> Result<HysteresisTable, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open data CSV '{}': {e}", path.display())))?;
    parse_hysteresis_csv(file)
}

pub fn parse_hysteresis_csv<R: Read>(input: R) -> Result<HysteresisTable, AppError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let mut indices = Vec::with_capacity(Column::ALL.len());
    for column in Column::ALL {
        indices.push((column, require_column(&header_map, &column.label().to_ascii_lowercase())?));
    }

    let mut rows = Vec::new();
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::new(2, format!("CSV parse error on line {line}: {e}")))?;
        let mut values = [0.0; 9];
        for (slot, (column, col_idx)) in values.iter_mut().zip(&indices) {
            *slot = parse_cell(&record, *col_idx, column.label(), line)?;
        }
        let [time, vset, vref, vdiff, current, field, charge, polarization, polarization_error] = values;
        rows.push(HysteresisRow {
            time,
            vset,
            vref,
            vdiff,
            current,
            field,
            charge,
            polarization,
            polarization_error,
        });
    }

    if rows.is_empty() {
        return Err(AppError::new(3, "Data file contains no rows."));
    }
    Ok(HysteresisTable { rows })
}

/// Whether the file's header carries every column of an exported data file.
///
/// Only the header line is read; the rows are left to the matching parser.
pub fn is_hysteresis_csv(path: &Path) -> Result<bool, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open CSV '{}': {e}", path.display())))?;
    has_data_columns(file)
}

fn has_data_columns<R: Read>(input: R) -> Result<bool, AppError> {
    let mut reader = csv_reader(input);
    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?;
    let header_map = build_header_map(headers);
    Ok(Column::ALL
        .iter()
        .all(|column| header_map.contains_key(&column.label().to_ascii_lowercase())))
}

fn csv_reader<R: Read>(input: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(input)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports often prefix the first header with a BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(name)
        .copied()
        .ok_or_else(|| AppError::new(2, format!("Missing required column: `{name}`")))
}

fn parse_cell(record: &StringRecord, idx: usize, name: &str, line: usize) -> Result<f64, AppError> {
    let raw = record
        .get(idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::new(2, format!("Line {line}: missing `{name}` value.")))?;
    raw.parse::<f64>()
        .map_err(|_| AppError::new(2, format!("Line {line}: invalid `{name}` value '{raw}'.")))
}

/// Summary stats of a trace; `None` if it has no finite voltages.
pub fn trace_stats(samples: &[RawSample]) -> Option<TraceStats> {
    let first = samples.first()?;
    let last = samples.last()?;
    let (vset_min, vset_max) = extrema(samples.iter().map(|s| s.vset))?;
    let (vref_min, vref_max) = extrema(samples.iter().map(|s| s.vref))?;
    let time_step = match samples.get(1) {
        Some(second) => second.time - first.time,
        None => 0.0,
    };

    Some(TraceStats {
        n_samples: samples.len(),
        duration: last.time - first.time,
        time_step,
        vset_min,
        vset_max,
        vref_min,
        vref_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_trace_with_index_column_and_bom() {
        let csv = "\u{feff},TIME,vset,VREF,extra\n0,0.0,1.0,0.01,x\n1,0.5,2.0,-0.02,y\n";
        let trace = parse_raw_trace(csv.as_bytes()).unwrap();
        assert_eq!(trace.rows_read, 2);
        assert_eq!(trace.samples[1], RawSample::new(0.5, 2.0, -0.02));
        assert_eq!(trace.stats.n_samples, 2);
        assert!((trace.stats.time_step - 0.5).abs() < 1e-12);
        assert_eq!(trace.stats.vref_min, -0.02);
    }

    #[test]
    fn header_order_does_not_matter() {
        let csv = "Vref , Vset, time\n0.1,1.0,0.0\n";
        let trace = parse_raw_trace(csv.as_bytes()).unwrap();
        assert_eq!(trace.samples[0], RawSample::new(0.0, 1.0, 0.1));
    }

    #[test]
    fn missing_column_is_exit_code_2() {
        let err = parse_raw_trace("time,Vset\n0,1\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("vref"));
    }

    #[test]
    fn bad_row_reports_line() {
        let err = parse_raw_trace("time,Vset,Vref\n0,1,0\n0.1,abc,0\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Line 3"), "{err}");
    }

    #[test]
    fn empty_trace_is_exit_code_3() {
        let err = parse_raw_trace("time,Vset,Vref\n".as_bytes()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn parses_data_file_with_nan_error_column() {
        let csv = ",time,Vset,Vref,Vdiff,I,E,Q,P,P_error\n0,0,1,0.1,0.9,1e-5,9e5,0,0.2,NaN\n";
        let table = parse_hysteresis_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows[0].field, 9e5);
        assert!(table.rows[0].polarization_error.is_nan());
    }

    #[test]
    fn data_columns_are_recognized_by_header() {
        let data = "\u{feff},time,Vset,Vref,Vdiff,I,E,Q,P,P_error\n0,0,1,0.1,0.9,1e-5,9e5,0,0.2,0\n";
        assert!(has_data_columns(data.as_bytes()).unwrap());
        assert!(!has_data_columns("time,Vset,Vref\n0,1,0\n".as_bytes()).unwrap());
        assert!(!has_data_columns("time,Vset,Vref,E,P\n0,1,0,0,0\n".as_bytes()).unwrap());
    }
}
