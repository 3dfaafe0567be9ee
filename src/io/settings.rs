//! Measurement settings files.
//!
//! The lab format is one `Key: value` pair per line:
//!
//! ```text
//! Name: PZT-42
//! ElectrKey: B3
//! Area: 7.85e-7
//! AErr: 1e-8
//! thickness: 2.5e-7
//! capacity: n/a
//! tand: n/a
//! Amplitude: 10
//! Frequency: 1000
//! Offset: 0
//! VrefErr: 0.001
//! correct_Ebias: ON
//! correct_LossI: OFF
//! custom_curr_offs: 0
//! Rref: 1000
//! RErr: 1
//! ```
//!
//! Paths ending in `.json` are read as a serialized `SettingsFile` instead.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{MeasurementSettings, SampleInfo};
use crate::error::AppError;

/// Keys that only configure the acquisition hardware.
const INSTRUMENT_KEYS: [&str; 4] = ["BurstStatus", "BurstCount", "ScaleDivider_CHAN1", "ScaleDivider_CHAN2"];

/// Everything a settings file describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub sample: SampleInfo,
    pub settings: MeasurementSettings,
}

/// Load a settings file, choosing the format by extension.
pub fn load_settings(path: &Path) -> Result<SettingsFile, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::new(2, format!("Failed to read settings '{}': {e}", path.display())))?;

    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str(&text).map_err(|e| AppError::new(2, format!("Invalid settings JSON: {e}")))?
    } else {
        parse_settings_text(&text)?
    };

    parsed
        .settings
        .validate()
        .map_err(|e| AppError::new(2, format!("Invalid settings in '{}': {e}", path.display())))?;
    Ok(parsed)
}

/// Parse the `Key: value` format.
pub fn parse_settings_text(text: &str) -> Result<SettingsFile, AppError> {
    let mut values: HashMap<&str, &str> = HashMap::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return Err(AppError::new(
                2,
                format!("Settings line {}: expected `Key: value`, got '{line}'.", idx + 1),
            ));
        };
        let key = key.trim();
        if INSTRUMENT_KEYS.contains(&key) {
            log::debug!("ignoring instrument setting {key}");
            continue;
        }
        values.insert(key, value.trim());
    }

    let settings = MeasurementSettings {
        amplitude: required(&values, "Amplitude")?,
        frequency: required(&values, "Frequency")?,
        thickness: required(&values, "thickness")?,
        area: required(&values, "Area")?,
        area_error: required(&values, "AErr")?,
        rref: required(&values, "Rref")?,
        rref_error: required(&values, "RErr")?,
        vref_error: required(&values, "VrefErr")?,
        capacitance: lenient(&values, "capacity"),
        loss_tangent: lenient(&values, "tand"),
        correct_ebias: toggle(&values, "correct_Ebias")?,
        correct_loss_current: toggle(&values, "correct_LossI")?,
        custom_current_offset: optional(&values, "custom_curr_offs")?.unwrap_or(0.0),
    };

    let sample = SampleInfo {
        name: values
            .get("Name")
            .filter(|v| !v.is_empty())
            .map_or_else(|| SampleInfo::default().name, |v| v.to_string()),
        electrode_key: values.get("ElectrKey").filter(|v| !v.is_empty()).map(|v| v.to_string()),
        drive_offset: optional(&values, "Offset")?.unwrap_or(0.0),
        amplification: optional(&values, "Amplification")?.unwrap_or(1.0),
        scope_averaging: optional(&values, "ScopeCyclAver")?,
    };

    const KNOWN: [&str; 18] = [
        "Name",
        "ElectrKey",
        "Area",
        "AErr",
        "thickness",
        "capacity",
        "tand",
        "Amplitude",
        "Frequency",
        "Offset",
        "VrefErr",
        "ScopeCyclAver",
        "Amplification",
        "correct_Ebias",
        "correct_LossI",
        "custom_curr_offs",
        "Rref",
        "RErr",
    ];
    for key in values.keys().filter(|k| !KNOWN.contains(*k)) {
        log::debug!("ignoring unknown setting {key}");
    }

    Ok(SettingsFile { sample, settings })
}

/// Render settings back into the `Key: value` format.
pub fn render_settings_text(file: &SettingsFile) -> String {
    let s = &file.settings;
    let info = &file.sample;
    let on_off = |b: bool| if b { "ON" } else { "OFF" };
    let opt = |v: Option<f64>| v.map_or_else(|| "n/a".to_string(), |v| v.to_string());

    let mut out = String::new();
    out.push_str(&format!("Name: {}\n", info.name));
    out.push_str(&format!("ElectrKey: {}\n", info.electrode_key.as_deref().unwrap_or("")));
    out.push_str(&format!("Area: {}\n", s.area));
    out.push_str(&format!("AErr: {}\n", s.area_error));
    out.push_str(&format!("thickness: {}\n", s.thickness));
    out.push_str(&format!("capacity: {}\n", opt(s.capacitance)));
    out.push_str(&format!("tand: {}\n", opt(s.loss_tangent)));
    out.push_str(&format!("Amplitude: {}\n", s.amplitude));
    out.push_str(&format!("Frequency: {}\n", s.frequency));
    out.push_str(&format!("Offset: {}\n", info.drive_offset));
    out.push_str(&format!("VrefErr: {}\n", s.vref_error));
    if let Some(avg) = info.scope_averaging {
        out.push_str(&format!("ScopeCyclAver: {avg}\n"));
    }
    out.push_str(&format!("Amplification: {}\n", info.amplification));
    out.push_str(&format!("correct_Ebias: {}\n", on_off(s.correct_ebias)));
    out.push_str(&format!("correct_LossI: {}\n", on_off(s.correct_loss_current)));
    out.push_str(&format!("custom_curr_offs: {}\n", s.custom_current_offset));
    out.push_str(&format!("Rref: {}\n", s.rref));
    out.push_str(&format!("RErr: {}\n", s.rref_error));
    out
}

fn required(values: &HashMap<&str, &str>, key: &str) -> Result<f64, AppError> {
    optional(values, key)?.ok_or_else(|| AppError::new(2, format!("Missing required setting `{key}`.")))
}

fn optional(values: &HashMap<&str, &str>, key: &str) -> Result<Option<f64>, AppError> {
    match values.get(key).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<f64>()
            .map(Some)
            .map_err(|_| AppError::new(2, format!("Invalid value for `{key}`: '{raw}'."))),
    }
}

/// Unparsable values mean "not measured".
fn lenient(values: &HashMap<&str, &str>, key: &str) -> Option<f64> {
    values.get(key).and_then(|v| v.parse::<f64>().ok()).filter(|v| v.is_finite())
}

fn toggle(values: &HashMap<&str, &str>, key: &str) -> Result<bool, AppError> {
    match values.get(key).copied() {
        None | Some("") => Ok(false),
        Some(v) if v.eq_ignore_ascii_case("on") => Ok(true),
        Some(v) if v.eq_ignore_ascii_case("off") => Ok(false),
        Some(v) => Err(AppError::new(2, format!("`{key}` must be ON or OFF, got '{v}'."))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Name: PZT-42
ElectrKey: B3
Area: 7.85e-7
AErr: 1e-8
thickness: 2.5e-7
capacity: n/a
tand: 0.02
Amplitude: 10
Frequency: 1000
Offset: 0.5
BurstStatus: OFF
BurstCount: 1
VrefErr: 0.001
ScopeCyclAver: 0.5
ScaleDivider_CHAN1: AUTO
ScaleDivider_CHAN2: 0.05
correct_Ebias: ON
correct_LossI: OFF
custom_curr_offs: 0
Rref: 1000
RErr: 1
";

    #[test]
    fn parses_lab_settings() {
        let file = parse_settings_text(SAMPLE).unwrap();
        let s = &file.settings;
        assert_eq!(s.area, 7.85e-7);
        assert_eq!(s.thickness, 2.5e-7);
        assert_eq!(s.capacitance, None);
        assert_eq!(s.loss_tangent, Some(0.02));
        assert!(s.correct_ebias);
        assert!(!s.correct_loss_current);
        assert_eq!(s.rref_error, 1.0);

        assert_eq!(file.sample.name, "PZT-42");
        assert_eq!(file.sample.electrode_key.as_deref(), Some("B3"));
        assert_eq!(file.sample.drive_offset, 0.5);
        assert_eq!(file.sample.amplification, 1.0);
        assert_eq!(file.sample.scope_averaging, Some(0.5));
    }

    #[test]
    fn missing_required_key_is_exit_code_2() {
        let text = SAMPLE.replace("Rref: 1000\n", "");
        let err = parse_settings_text(&text).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("Rref"));
    }

    #[test]
    fn bad_toggle_is_rejected() {
        let text = SAMPLE.replace("correct_Ebias: ON", "correct_Ebias: maybe");
        assert_eq!(parse_settings_text(&text).unwrap_err().exit_code(), 2);
    }

    #[test]
    fn rendered_text_parses_back() {
        let file = parse_settings_text(SAMPLE).unwrap();
        let again = parse_settings_text(&render_settings_text(&file)).unwrap();
        assert_eq!(file, again);
    }

    #[test]
    fn loads_json_and_text_from_disk() {
        let dir = std::env::temp_dir().join(format!("hesm-settings-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let txt = dir.join("meas_settings.txt");
        fs::write(&txt, SAMPLE).unwrap();
        let from_text = load_settings(&txt).unwrap();

        let json = dir.join("meas_settings.json");
        fs::write(&json, serde_json::to_string(&from_text).unwrap()).unwrap();
        let from_json = load_settings(&json).unwrap();
        assert_eq!(from_text, from_json);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn invalid_geometry_fails_on_load() {
        let dir = std::env::temp_dir().join(format!("hesm-settings-bad-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.txt");
        fs::write(&path, SAMPLE.replace("thickness: 2.5e-7", "thickness: 0")).unwrap();
        let err = load_settings(&path).unwrap_err();
        assert_eq!(err.exit_code(), 2);
        fs::remove_dir_all(&dir).ok();
    }
}
