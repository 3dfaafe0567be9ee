//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during reconstruction
//! - exported to JSON/CSV
//! - reloaded later for plotting or comparisons

use chrono::NaiveDateTime;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ReconstructError;

/// One raw acquisition timestep as delivered by the scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// Sample timestamp (s).
    pub time: f64,
    /// Driving voltage on the sample (V).
    pub vset: f64,
    /// Voltage across the reference resistor (V).
    pub vref: f64,
}

impl RawSample {
    pub fn new(time: f64, vset: f64, vref: f64) -> Self {
        Self { time, vset, vref }
    }
}

/// One fully evaluated timestep.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HysteresisRow {
    pub time: f64,
    pub vset: f64,
    pub vref: f64,
    pub vdiff: f64,
    /// Displacement current after loss and offset correction (A).
    pub current: f64,
    /// Electric field, bias-corrected if enabled (V/m).
    pub field: f64,
    /// Integrated charge (C).
    pub charge: f64,
    /// Re-centered polarization (C/m²).
    pub polarization: f64,
    /// Propagated error on `polarization` (C/m²).
    pub polarization_error: f64,
}

impl HysteresisRow {
    pub fn get(&self, column: Column) -> f64 {
        match column {
            Column::Time => self.time,
            Column::Vset => self.vset,
            Column::Vref => self.vref,
            Column::Vdiff => self.vdiff,
            Column::Current => self.current,
            Column::Field => self.field,
            Column::Charge => self.charge,
            Column::Polarization => self.polarization,
            Column::PolarizationError => self.polarization_error,
        }
    }
}

/// Named columns of the evaluated sample table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Time,
    Vset,
    Vref,
    Vdiff,
    Current,
    Field,
    Charge,
    Polarization,
    PolarizationError,
}

impl Column {
    /// All columns in export order.
    pub const ALL: [Column; 9] = [
        Column::Time,
        Column::Vset,
        Column::Vref,
        Column::Vdiff,
        Column::Current,
        Column::Field,
        Column::Charge,
        Column::Polarization,
        Column::PolarizationError,
    ];

    /// Header label used in data files.
    pub fn label(self) -> &'static str {
        match self {
            Column::Time => "time",
            Column::Vset => "Vset",
            Column::Vref => "Vref",
            Column::Vdiff => "Vdiff",
            Column::Current => "I",
            Column::Field => "E",
            Column::Charge => "Q",
            Column::Polarization => "P",
            Column::PolarizationError => "P_error",
        }
    }
}

/// The evaluated sample table (insertion order = time order).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HysteresisTable {
    pub rows: Vec<HysteresisRow>,
}

impl HysteresisTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Copy one column out of the table.
    pub fn column(&self, column: Column) -> Vec<f64> {
        self.rows.iter().map(|r| r.get(column)).collect()
    }

    /// `(min, max)` of a column, ignoring non-finite values.
    pub fn extrema(&self, column: Column) -> Option<(f64, f64)> {
        crate::math::extrema(self.rows.iter().map(|r| r.get(column)))
    }

    /// The `k` rows whose `by` value is closest to `target`.
    pub fn nearest(&self, by: Column, target: f64, k: usize) -> Vec<&HysteresisRow> {
        crate::math::nearest_k(&self.rows, |r| r.get(by), target, k)
    }

    /// `(E, P)` pairs, the hysteresis loop itself.
    pub fn loop_points(&self) -> Vec<(f64, f64)> {
        self.rows.iter().map(|r| (r.field, r.polarization)).collect()
    }
}

/// Measurement settings consumed by the reconstruction.
///
/// Required quantities are validated once by [`MeasurementSettings::validate`]
/// before any row is processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementSettings {
    /// Driving voltage amplitude (V). Echoed into the results.
    pub amplitude: f64,
    /// Driving frequency (Hz).
    pub frequency: f64,
    /// Sample thickness (m).
    pub thickness: f64,
    /// Electrode area (m²).
    pub area: f64,
    /// Absolute error of the electrode area (m²).
    #[serde(default)]
    pub area_error: f64,
    /// Reference resistance (Ω).
    pub rref: f64,
    /// Absolute error of the reference resistance (Ω).
    #[serde(default)]
    pub rref_error: f64,
    /// Absolute error of the Vref measurement (V).
    #[serde(default)]
    pub vref_error: f64,
    /// Sample capacitance (F), only used by the loss-current correction.
    #[serde(default)]
    pub capacitance: Option<f64>,
    /// Dielectric loss tangent, only used by the loss-current correction.
    #[serde(default)]
    pub loss_tangent: Option<f64>,
    /// Shift E to compensate the field bias; the amount is set by
    /// `EvalOptions::ebias_shift`.
    #[serde(default)]
    pub correct_ebias: bool,
    /// Subtract the dielectric loss current before offset removal.
    #[serde(default)]
    pub correct_loss_current: bool,
    /// Explicit DC current offset (A); `0` means auto-compute.
    #[serde(default)]
    pub custom_current_offset: f64,
}

impl MeasurementSettings {
    /// Check every quantity the required path divides by or depends on.
    pub fn validate(&self) -> Result<(), ReconstructError> {
        require_non_zero("thickness", self.thickness)?;
        require_non_zero("area", self.area)?;
        require_non_zero("rref", self.rref)?;
        require_non_zero("frequency", self.frequency)?;
        if self.frequency < 0.0 {
            return Err(invalid("frequency", "must be positive"));
        }
        require_finite("amplitude", self.amplitude)?;
        require_finite("custom_current_offset", self.custom_current_offset)?;

        for (field, value) in [
            ("area_error", self.area_error),
            ("rref_error", self.rref_error),
            ("vref_error", self.vref_error),
        ] {
            require_finite(field, value)?;
            if value < 0.0 {
                return Err(invalid(field, "must not be negative"));
            }
        }

        if let Some(c) = self.capacitance {
            require_finite("capacitance", c)?;
        }
        if let Some(t) = self.loss_tangent {
            require_finite("loss_tangent", t)?;
        }
        Ok(())
    }

    /// Capacitance and loss tangent, if both are present and non-zero.
    pub fn loss_parameters(&self) -> Option<(f64, f64)> {
        match (self.capacitance, self.loss_tangent) {
            (Some(c), Some(t)) if c != 0.0 && t != 0.0 => Some((c, t)),
            _ => None,
        }
    }
}

fn invalid(field: &'static str, reason: &str) -> ReconstructError {
    ReconstructError::InvalidSetting {
        field,
        reason: reason.to_string(),
    }
}

fn require_finite(field: &'static str, value: f64) -> Result<(), ReconstructError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(invalid(field, "must be finite"))
    }
}

fn require_non_zero(field: &'static str, value: f64) -> Result<(), ReconstructError> {
    require_finite(field, value)?;
    if value == 0.0 {
        return Err(invalid(field, "must be non-zero"));
    }
    Ok(())
}

/// Descriptive sample metadata. Never enters the computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInfo {
    pub name: String,
    /// Electrode pad key, if the sample carries several pads.
    #[serde(default)]
    pub electrode_key: Option<String>,
    /// DC offset of the driving signal (V).
    #[serde(default)]
    pub drive_offset: f64,
    /// Voltage amplifier factor applied to Vset during acquisition.
    #[serde(default = "default_amplification")]
    pub amplification: f64,
    /// Scope averaging setting (`ScopeCyclAver`; 0.5 = one cycle).
    #[serde(default)]
    pub scope_averaging: Option<f64>,
}

fn default_amplification() -> f64 {
    1.0
}

impl Default for SampleInfo {
    fn default() -> Self {
        Self {
            name: "sample".to_string(),
            electrode_key: None,
            drive_offset: 0.0,
            amplification: default_amplification(),
            scope_averaging: None,
        }
    }
}

/// How the window for the automatic current offset is positioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OffsetWindowKind {
    /// Start at a fixed row index.
    Fixed,
    /// Start at the row nearest `I = 0` that still leaves room for a full window.
    ZeroCrossing,
}

/// Window over which the DC current offset is averaged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OffsetWindow {
    pub kind: OffsetWindowKind,
    /// First row of the window for `OffsetWindowKind::Fixed`.
    pub start_index: usize,
    /// Window length in driving periods.
    pub periods: f64,
}

impl Default for OffsetWindow {
    fn default() -> Self {
        Self {
            kind: OffsetWindowKind::Fixed,
            start_index: 100,
            periods: 2.0,
        }
    }
}

/// How far the E-bias correction moves the field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EBiasShift {
    /// Shift by `E_bias / 2`, which makes `|max(E)| == |min(E)|`.
    #[default]
    Half,
    /// Shift by the full `|E_bias|`. Matches evaluations made with the lab's
    /// earlier tooling, but leaves the extrema asymmetric the other way.
    Full,
}

/// What to do with rows whose `Vref` is too small for the relative error term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum VrefPolicy {
    /// Raise `|Vref|` to the floor, keeping its sign.
    Clamp,
    /// Emit `NaN` for `P_error` and count the row.
    Flag,
    /// Abort the reconstruction.
    Fail,
}

/// Evaluation choices that are not part of the measurement itself.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalOptions {
    pub offset_window: OffsetWindow,
    /// Rows nearest `E = 0` used to re-center P.
    pub zero_neighbors: usize,
    /// Rows used for PR, PR error and EC.
    pub metric_neighbors: usize,
    /// Multiplier on the PR error (1 = 1σ, 3 = 3σ).
    pub pr_error_sigma: f64,
    pub vref_policy: VrefPolicy,
    /// Smallest `|Vref|` accepted by the error term; defaults to the Vref error.
    pub vref_floor: Option<f64>,
    #[serde(default)]
    pub ebias_shift: EBiasShift,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            offset_window: OffsetWindow::default(),
            zero_neighbors: 16,
            metric_neighbors: 20,
            pr_error_sigma: 1.0,
            vref_policy: VrefPolicy::Clamp,
            vref_floor: None,
            ebias_shift: EBiasShift::Half,
        }
    }
}

/// Scalar outputs of one reconstruction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HysteresisResults {
    pub amplitude: f64,
    pub frequency: f64,
    pub thickness: f64,
    pub area: f64,
    pub area_error: f64,
    /// `|max(E)| - |min(E)|` before any correction (V/m).
    pub e_bias: f64,
    /// Whether the E-bias shift was applied.
    pub e_bias_corrected: bool,
    /// Whether the loss current was subtracted.
    pub loss_current_corrected: bool,
    /// DC current offset removed from I (A).
    pub current_offset: f64,
    /// Amplitude-symmetry shift `|min(P)| - |max(P)|` (C/m²).
    pub p_diff: f64,
    /// Zero-field polarization offset removed in the last re-centering (C/m²).
    pub p_null: f64,
    /// Remanent polarization (C/m²).
    pub pr: f64,
    /// Error on PR, multiplier applied (C/m²).
    pub pr_error: f64,
    /// Multiplier applied to `pr_error`.
    pub pr_error_sigma: f64,
    /// Coercive field (V/m).
    pub ec: f64,
    /// Rows whose Vref fell below the error floor (clamped or flagged).
    pub vref_floor_rows: usize,
}

/// Summary stats about a raw trace.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceStats {
    pub n_samples: usize,
    pub duration: f64,
    pub time_step: f64,
    pub vset_min: f64,
    pub vset_max: f64,
    pub vref_min: f64,
    pub vref_max: f64,
}

/// The loop metrics compared across a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopMetrics {
    /// Remanent polarization (C/m²).
    pub pr: f64,
    /// Error on PR, multiplier applied (C/m²).
    pub pr_error: f64,
    /// Coercive field (V/m).
    pub ec: f64,
}

impl From<&HysteresisResults> for LoopMetrics {
    fn from(results: &HysteresisResults) -> Self {
        Self {
            pr: results.pr,
            pr_error: results.pr_error,
            ec: results.ec,
        }
    }
}

/// One file of a batch evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    /// File name of the raw trace or data file.
    pub file: String,
    /// Driving amplitude (V), from the file name or the settings.
    pub amplitude: f64,
    /// Metrics, or the reason the file could not be evaluated.
    pub outcome: Result<LoopMetrics, String>,
}

/// A saved evaluation (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultsFile {
    pub tool: String,
    pub generated: NaiveDateTime,
    pub sample: SampleInfo,
    pub settings: MeasurementSettings,
    pub options: EvalOptions,
    pub results: HysteresisResults,
}
