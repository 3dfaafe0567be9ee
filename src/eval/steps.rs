//! Individual reconstruction steps.
//!
//! Each step takes the columns computed so far and returns new columns. Nothing
//! here mutates its inputs, so a failing step leaves no half-written table
//! behind and every step can be tested on its own.

use std::f64::consts::PI;
use std::ops::Range;

use crate::domain::{EBiasShift, MeasurementSettings, OffsetWindow, OffsetWindowKind, RawSample, VrefPolicy};
use crate::error::ReconstructError;
use crate::math::{cumulative_trapezoid, extrema, mean, nearest_k};

/// Step 1: `Vdiff = Vset - Vref`.
pub fn voltage_difference(samples: &[RawSample]) -> Vec<f64> {
    samples.iter().map(|s| s.vset - s.vref).collect()
}

/// Step 2: `I = Vref / Rref`.
pub fn displacement_current(samples: &[RawSample], rref: f64) -> Vec<f64> {
    samples.iter().map(|s| s.vref / rref).collect()
}

/// Step 3a: `E = Vdiff / thickness`.
pub fn electric_field(vdiff: &[f64], thickness: f64) -> Vec<f64> {
    vdiff.iter().map(|v| v / thickness).collect()
}

/// Step 3b: asymmetry of the field extrema, `|max(E)| - |min(E)|`.
pub fn field_bias(field: &[f64]) -> f64 {
    match extrema(field.iter().copied()) {
        Some((min, max)) => max.abs() - min.abs(),
        None => 0.0,
    }
}

/// Step 3c: shift E against the bias.
///
/// `EBiasShift::Half` leaves `|max(E)| == |min(E)|`; `EBiasShift::Full` moves
/// by the whole `|E_bias|`.
pub fn correct_field_bias(field: &[f64], e_bias: f64, amount: EBiasShift) -> Vec<f64> {
    let magnitude = match amount {
        EBiasShift::Half => e_bias.abs() / 2.0,
        EBiasShift::Full => e_bias.abs(),
    };
    let shift = if e_bias < 0.0 { magnitude } else { -magnitude };
    field.iter().map(|e| e + shift).collect()
}

/// Step 4a: dielectric loss current `Vref · 2πf · C · tanδ`.
pub fn loss_current(samples: &[RawSample], frequency: f64, capacitance: f64, loss_tangent: f64) -> Vec<f64> {
    let factor = 2.0 * PI * frequency * capacitance * loss_tangent;
    samples.iter().map(|s| s.vref * factor).collect()
}

/// Element-wise `a - b`.
pub fn subtract(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(x, y)| x - y).collect()
}

/// Step 5a: rows over which the DC current offset is averaged.
///
/// The window spans `periods / (frequency · dt)` samples, rounded to the
/// nearest integer.
pub fn offset_window(
    time: &[f64],
    current: &[f64],
    frequency: f64,
    window: &OffsetWindow,
) -> Result<Range<usize>, ReconstructError> {
    let n = current.len().min(time.len());
    if n < 2 {
        return Err(ReconstructError::InsufficientData {
            needed: 2,
            available: n,
            context: "current offset window",
        });
    }

    let dt = time[1] - time[0];
    let len = (window.periods / (frequency * dt)).round();
    if !(len.is_finite() && len >= 1.0) {
        return Err(ReconstructError::InvalidSetting {
            field: "offset_periods",
            reason: format!("window of {len} samples is empty"),
        });
    }
    let too_short = |needed: usize| ReconstructError::InsufficientData {
        needed,
        available: n,
        context: "current offset window",
    };
    // Compared as f64 so an oversized window never reaches the cast.
    if len > n as f64 {
        let len = len as usize;
        let needed = match window.kind {
            OffsetWindowKind::Fixed => window.start_index.saturating_add(len),
            OffsetWindowKind::ZeroCrossing => len,
        };
        return Err(too_short(needed));
    }
    let len = len as usize;

    let start = match window.kind {
        OffsetWindowKind::Fixed => window.start_index,
        OffsetWindowKind::ZeroCrossing => {
            // Only starts that leave room for a full window are candidates.
            let candidates: Vec<usize> = (0..=n - len).collect();
            nearest_k(&candidates, |&i| current[i], 0.0, 1)
                .first()
                .map(|&&i| i)
                .unwrap_or(0)
        }
    };

    let end = start
        .checked_add(len)
        .filter(|&end| end <= n)
        .ok_or_else(|| too_short(start.saturating_add(len)))?;
    Ok(start..end)
}

/// Step 5b: mean current over the offset window.
pub fn current_offset(current: &[f64], window: Range<usize>) -> f64 {
    mean(current[window].iter().copied()).unwrap_or(0.0)
}

/// Step 5c: subtract the DC offset.
pub fn remove_offset(current: &[f64], offset: f64) -> Vec<f64> {
    current.iter().map(|i| i - offset).collect()
}

/// Step 6: `Q = ∫ I dt`, `Q[0] = 0`.
pub fn integrate_charge(current: &[f64], time: &[f64]) -> Vec<f64> {
    cumulative_trapezoid(current, time)
}

/// Step 7: `P = Q / area`.
pub fn polarization(charge: &[f64], area: f64) -> Vec<f64> {
    charge.iter().map(|q| q / area).collect()
}

/// Step 8: make `|max(P)| == |min(P)|`.
///
/// Returns the shifted polarization and `Pdiff = |min(P)| - |max(P)|`.
pub fn amplitude_recenter(p: &[f64]) -> (Vec<f64>, f64) {
    let Some((min, max)) = extrema(p.iter().copied()) else {
        return (p.to_vec(), 0.0);
    };
    let p_diff = min.abs() - max.abs();
    (p.iter().map(|v| v + p_diff / 2.0).collect(), p_diff)
}

/// Step 9: center P on the `k` rows nearest `E = 0`.
///
/// Returns the shifted polarization and `PNull`, the midpoint of the P range
/// over those rows before the shift.
pub fn zero_recenter(field: &[f64], p: &[f64], k: usize) -> Result<(Vec<f64>, f64), ReconstructError> {
    let pairs: Vec<(f64, f64)> = field.iter().copied().zip(p.iter().copied()).collect();
    let near = nearest_k(&pairs, |r| r.0, 0.0, k);
    let Some((min, max)) = extrema(near.iter().map(|r| r.1)) else {
        return Err(ReconstructError::InsufficientData {
            needed: k.max(1),
            available: pairs.len(),
            context: "zero-field re-centering",
        });
    };

    let p_null = (max + min) / 2.0;
    let shift = if p_null < 0.0 { p_null.abs() } else { -p_null.abs() };
    Ok((p.iter().map(|v| v + shift).collect(), p_null))
}

/// Step 10 output.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarizationError {
    pub values: Vec<f64>,
    /// Rows whose `|Vref|` fell below the floor.
    pub floor_rows: usize,
}

/// Step 10: first-order relative error
/// `(vreferr/Vref + rreferr/Rref + areaerr/area) · P`.
///
/// Rows with `|Vref| < floor` are handled by `policy`. When the Vref error is
/// zero the Vref term vanishes and no row is below the floor.
pub fn polarization_error(
    samples: &[RawSample],
    p: &[f64],
    settings: &MeasurementSettings,
    policy: VrefPolicy,
    floor: f64,
) -> Result<PolarizationError, ReconstructError> {
    let fixed_term = settings.rref_error / settings.rref + settings.area_error / settings.area;
    let mut values = Vec::with_capacity(p.len());
    let mut floor_rows = 0usize;

    for (row, (s, &pv)) in samples.iter().zip(p).enumerate() {
        let vref_term = if settings.vref_error == 0.0 {
            0.0
        } else if s.vref != 0.0 && s.vref.abs() >= floor {
            settings.vref_error / s.vref
        } else {
            floor_rows += 1;
            match policy {
                VrefPolicy::Clamp => settings.vref_error / floor.copysign(s.vref),
                VrefPolicy::Flag => f64::NAN,
                VrefPolicy::Fail => {
                    return Err(ReconstructError::SingularErrorTerm { row, vref: s.vref });
                }
            }
        };
        values.push((vref_term + fixed_term) * pv);
    }

    Ok(PolarizationError { values, floor_rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> MeasurementSettings {
        MeasurementSettings {
            amplitude: 10.0,
            frequency: 1.0,
            thickness: 1e-6,
            area: 1e-6,
            area_error: 1e-8,
            rref: 1e4,
            rref_error: 100.0,
            vref_error: 0.01,
            capacitance: None,
            loss_tangent: None,
            correct_ebias: false,
            correct_loss_current: false,
            custom_current_offset: 0.0,
        }
    }

    #[test]
    fn field_bias_correction_makes_extrema_symmetric() {
        let e = [1.0e6, 0.2e6, -0.8e6, 0.0];
        let bias = field_bias(&e);
        assert!((bias - 0.2e6).abs() < 1e-6);

        let corrected = correct_field_bias(&e, bias, EBiasShift::Half);
        let (min, max) = extrema(corrected.iter().copied()).unwrap();
        assert!((max - 0.9e6).abs() < 1e-6, "max={max}");
        assert!((min + 0.9e6).abs() < 1e-6, "min={min}");
    }

    #[test]
    fn negative_bias_shifts_up() {
        let e = [0.8e6, -1.0e6];
        let bias = field_bias(&e);
        assert!(bias < 0.0);
        let corrected = correct_field_bias(&e, bias, EBiasShift::Half);
        assert!((corrected[0] - 0.9e6).abs() < 1e-6);
        assert!((corrected[1] + 0.9e6).abs() < 1e-6);
    }

    #[test]
    fn full_bias_shift_moves_by_whole_bias() {
        let e = [1.0e6, -0.8e6];
        let bias = field_bias(&e);
        let corrected = correct_field_bias(&e, bias, EBiasShift::Full);
        assert!((corrected[0] - 0.8e6).abs() < 1e-6);
        assert!((corrected[1] + 1.0e6).abs() < 1e-6);

        let negative = correct_field_bias(&[0.8e6, -1.0e6], -0.2e6, EBiasShift::Full);
        assert!((negative[0] - 1.0e6).abs() < 1e-6);
        assert!((negative[1] + 0.8e6).abs() < 1e-6);
    }

    #[test]
    fn loss_current_scales_with_vref() {
        let samples = [RawSample::new(0.0, 0.0, 1.0), RawSample::new(0.1, 0.0, -2.0)];
        let loss = loss_current(&samples, 100.0, 1e-9, 0.05);
        let factor = 2.0 * PI * 100.0 * 1e-9 * 0.05;
        assert!((loss[0] - factor).abs() < 1e-20);
        assert!((loss[1] + 2.0 * factor).abs() < 1e-20);
    }

    #[test]
    fn fixed_offset_window_spans_periods() {
        // 400 samples per period at 1 Hz.
        let time: Vec<f64> = (0..1200).map(|i| i as f64 * 0.0025).collect();
        let current = vec![0.0; 1200];
        let w = offset_window(&time, &current, 1.0, &OffsetWindow::default()).unwrap();
        assert_eq!(w, 100..900);
    }

    #[test]
    fn fixed_offset_window_too_long_is_insufficient_data() {
        let time: Vec<f64> = (0..500).map(|i| i as f64 * 0.0025).collect();
        let current = vec![0.0; 500];
        let err = offset_window(&time, &current, 1.0, &OffsetWindow::default()).unwrap_err();
        assert!(matches!(
            err,
            ReconstructError::InsufficientData { needed: 900, available: 500, .. }
        ));
    }

    #[test]
    fn fixed_offset_window_past_the_end_is_insufficient_data() {
        let time: Vec<f64> = (0..1200).map(|i| i as f64 * 0.0025).collect();
        let current = vec![0.0; 1200];
        let window = OffsetWindow {
            start_index: usize::MAX,
            ..OffsetWindow::default()
        };
        let err = offset_window(&time, &current, 1.0, &window).unwrap_err();
        assert_eq!(
            err,
            ReconstructError::InsufficientData {
                needed: usize::MAX,
                available: 1200,
                context: "current offset window",
            }
        );
    }

    #[test]
    fn huge_window_length_is_insufficient_data() {
        let time: Vec<f64> = (0..1200).map(|i| i as f64 * 1e-10).collect();
        let current = vec![0.0; 1200];
        for kind in [OffsetWindowKind::Fixed, OffsetWindowKind::ZeroCrossing] {
            let window = OffsetWindow {
                kind,
                ..OffsetWindow::default()
            };
            let err = offset_window(&time, &current, 1e-10, &window).unwrap_err();
            assert!(
                matches!(err, ReconstructError::InsufficientData { available: 1200, .. }),
                "{kind:?}: {err}"
            );
        }
    }

    #[test]
    fn zero_crossing_window_starts_nearest_zero_current() {
        let time: Vec<f64> = (0..100).map(|i| i as f64 * 0.01).collect();
        // Crosses zero between rows 30 and 31; row 31 is closer.
        let current: Vec<f64> = (0..100).map(|i| (i as f64 - 30.8) * 1e-3).collect();
        let window = OffsetWindow {
            kind: OffsetWindowKind::ZeroCrossing,
            start_index: 0,
            periods: 0.5,
        };
        let w = offset_window(&time, &current, 1.0, &window).unwrap();
        assert_eq!(w, 31..81);
    }

    #[test]
    fn zero_crossing_window_stays_inside_trace() {
        let time: Vec<f64> = (0..100).map(|i| i as f64 * 0.01).collect();
        // Nearest zero is at the very end, which leaves no room for a window.
        let current: Vec<f64> = (0..100).map(|i| (99.0 - i as f64) * 1e-3 + 1e-4).collect();
        let window = OffsetWindow {
            kind: OffsetWindowKind::ZeroCrossing,
            start_index: 0,
            periods: 0.5,
        };
        let w = offset_window(&time, &current, 1.0, &window).unwrap();
        assert_eq!(w, 50..100);
    }

    #[test]
    fn charge_starts_at_zero() {
        let q = integrate_charge(&[1.0, 1.0, 1.0], &[0.0, 0.5, 1.0]);
        assert_eq!(q[0], 0.0);
        assert!((q[2] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn amplitude_recenter_symmetrizes() {
        let p = [0.1, 0.3, -0.1, -0.2];
        let (out, p_diff) = amplitude_recenter(&p);
        assert!((p_diff - (0.2 - 0.3)).abs() < 1e-12);
        let (min, max) = extrema(out.iter().copied()).unwrap();
        assert!((max.abs() - min.abs()).abs() < 1e-12);
    }

    #[test]
    fn zero_recenter_centers_near_zero_rows() {
        let field = [-2.0, -0.1, 0.05, 0.2, 3.0];
        let p = [9.0, 0.5, 0.3, -0.1, -9.0];
        // Nearest three to E=0: rows 2, 1, 3 -> P in {0.3, 0.5, -0.1}
        let (out, p_null) = zero_recenter(&field, &p, 3).unwrap();
        assert!((p_null - 0.2).abs() < 1e-12);
        let near = [out[1], out[2], out[3]];
        let (min, max) = extrema(near.iter().copied()).unwrap();
        assert!(((min + max) / 2.0).abs() < 1e-12);
    }

    #[test]
    fn zero_recenter_with_k_zero_fails() {
        let err = zero_recenter(&[0.0], &[0.0], 0).unwrap_err();
        assert!(matches!(err, ReconstructError::InsufficientData { .. }));
    }

    #[test]
    fn polarization_error_matches_formula() {
        let s = settings();
        let samples = [RawSample::new(0.0, 0.0, 0.5)];
        let out = polarization_error(&samples, &[2.0], &s, VrefPolicy::Clamp, s.vref_error).unwrap();
        let expected = (0.01 / 0.5 + 100.0 / 1e4 + 1e-8 / 1e-6) * 2.0;
        assert!((out.values[0] - expected).abs() < 1e-12);
        assert_eq!(out.floor_rows, 0);
    }

    #[test]
    fn polarization_error_policies_near_zero_vref() {
        let s = settings();
        let samples = [RawSample::new(0.0, 0.0, 0.0), RawSample::new(0.1, 0.0, -0.001)];
        let p = [1.0, 1.0];

        let clamp = polarization_error(&samples, &p, &s, VrefPolicy::Clamp, 0.01).unwrap();
        assert_eq!(clamp.floor_rows, 2);
        assert!((clamp.values[0] - (1.0 + 0.02)).abs() < 1e-12);
        assert!((clamp.values[1] - (-1.0 + 0.02)).abs() < 1e-12);

        let flag = polarization_error(&samples, &p, &s, VrefPolicy::Flag, 0.01).unwrap();
        assert_eq!(flag.floor_rows, 2);
        assert!(flag.values.iter().all(|v| v.is_nan()));

        let err = polarization_error(&samples, &p, &s, VrefPolicy::Fail, 0.01).unwrap_err();
        assert_eq!(err, ReconstructError::SingularErrorTerm { row: 0, vref: 0.0 });
    }

    #[test]
    fn zero_vref_error_drops_the_vref_term() {
        let mut s = settings();
        s.vref_error = 0.0;
        let samples = [RawSample::new(0.0, 0.0, 0.0)];
        let out = polarization_error(&samples, &[1.0], &s, VrefPolicy::Fail, 0.0).unwrap();
        assert_eq!(out.floor_rows, 0);
        assert!((out.values[0] - 0.02).abs() < 1e-12);
    }
}
