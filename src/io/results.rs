//! Read/write results JSON files.
//!
//! A results file is the portable record of one evaluation: the sample
//! metadata, the settings and options it ran with, and the scalar results.
//! The schema is defined by `domain::ResultsFile`.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::domain::{EvalOptions, HysteresisResults, MeasurementSettings, ResultsFile, SampleInfo};
use crate::error::AppError;

pub const TOOL_NAME: &str = "hesm";

pub fn build_results_file(
    generated: NaiveDateTime,
    sample: SampleInfo,
    settings: MeasurementSettings,
    options: EvalOptions,
    results: HysteresisResults,
) -> ResultsFile {
    ResultsFile {
        tool: TOOL_NAME.to_string(),
        generated,
        sample,
        settings,
        options,
        results,
    }
}

/// Write a results JSON file.
pub fn write_results_json(path: &Path, results: &ResultsFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create results JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, results)
        .map_err(|e| AppError::new(2, format!("Failed to write results JSON: {e}")))?;
    Ok(())
}

/// Read a results JSON file.
pub fn read_results_json(path: &Path) -> Result<ResultsFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open results JSON '{}': {e}", path.display())))?;
    let results: ResultsFile =
        serde_json::from_reader(file).map_err(|e| AppError::new(2, format!("Invalid results JSON: {e}")))?;
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn sample_results() -> HysteresisResults {
        HysteresisResults {
            amplitude: 10.0,
            frequency: 1000.0,
            thickness: 2.5e-7,
            area: 7.85e-7,
            area_error: 1e-8,
            e_bias: 1.2e5,
            e_bias_corrected: true,
            loss_current_corrected: false,
            current_offset: -3.2e-7,
            p_diff: 1e-3,
            p_null: -2e-4,
            pr: 0.21,
            pr_error: 0.004,
            pr_error_sigma: 1.0,
            ec: 4.5e6,
            vref_floor_rows: 3,
        }
    }

    #[test]
    fn json_round_trip_through_file() {
        let generated = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(3, 4, 5).unwrap();
        let settings = MeasurementSettings {
            amplitude: 10.0,
            frequency: 1000.0,
            thickness: 2.5e-7,
            area: 7.85e-7,
            area_error: 1e-8,
            rref: 1e3,
            rref_error: 1.0,
            vref_error: 1e-3,
            capacitance: Some(1e-9),
            loss_tangent: None,
            correct_ebias: true,
            correct_loss_current: false,
            custom_current_offset: 0.0,
        };
        let file = build_results_file(
            generated,
            SampleInfo::default(),
            settings.clone(),
            EvalOptions::default(),
            sample_results(),
        );

        let path = std::env::temp_dir().join(format!("hesm-results-{}.json", std::process::id()));
        write_results_json(&path, &file).unwrap();
        let back = read_results_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.tool, "hesm");
        assert_eq!(back.generated, generated);
        assert_eq!(back.settings, settings);
        assert_eq!(back.options, EvalOptions::default());
        assert_eq!(back.results, sample_results());
    }

    #[test]
    fn missing_file_is_exit_code_2() {
        let err = read_results_json(Path::new("/nonexistent/hesm/results.json")).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
