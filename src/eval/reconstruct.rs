//! The hysteresis reconstruction pipeline.
//!
//! `reconstruct` runs the ten reduction steps in a fixed order and then derives
//! the scalar metrics:
//!
//! 1. `Vdiff = Vset - Vref`
//! 2. `I = Vref / Rref`
//! 3. `E = Vdiff / d`, E-bias (optionally corrected)
//! 4. loss-current correction (optional)
//! 5. DC offset removal
//! 6. `Q = ∫ I dt`
//! 7. `P = Q / A`
//! 8. amplitude re-centering
//! 9. zero-field re-centering
//! 10. error propagation
//!
//! `loop_metrics` derives the same metrics from a reloaded data file.
//!
//! Settings, options and samples are validated before step 1. Every step
//! builds new columns, so an error at any point returns nothing.

use crate::domain::{
    EvalOptions, HysteresisResults, HysteresisRow, HysteresisTable, LoopMetrics, MeasurementSettings, RawSample,
};
use crate::error::ReconstructError;
use crate::eval::{metrics, steps};
use crate::math::mean;

/// Relative tolerance on the time increment.
const TIME_STEP_TOLERANCE: f64 = 1e-3;

/// Output of a successful reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconstruction {
    pub table: HysteresisTable,
    pub results: HysteresisResults,
}

/// Reconstruct the P–E loop from a raw trace.
pub fn reconstruct(
    samples: &[RawSample],
    settings: &MeasurementSettings,
    options: &EvalOptions,
) -> Result<Reconstruction, ReconstructError> {
    settings.validate()?;
    validate_options(options)?;
    check_samples(samples, options)?;

    let time: Vec<f64> = samples.iter().map(|s| s.time).collect();

    let vdiff = steps::voltage_difference(samples);
    let mut current = steps::displacement_current(samples, settings.rref);

    let mut field = steps::electric_field(&vdiff, settings.thickness);
    let e_bias = steps::field_bias(&field);
    log::info!(
        "E_bias: {:.6} MV/m ; {:.6} V",
        e_bias / 1e6,
        e_bias * settings.thickness
    );
    if settings.correct_ebias {
        field = steps::correct_field_bias(&field, e_bias, options.ebias_shift);
    }

    let mut loss_current_corrected = false;
    if settings.correct_loss_current {
        match settings.loss_parameters() {
            Some((capacitance, loss_tangent)) => {
                let loss = steps::loss_current(samples, settings.frequency, capacitance, loss_tangent);
                if let (Some(l), Some(i)) = (mean(loss.iter().copied()), mean(current.iter().copied())) {
                    log::debug!("ILoss/IP: {:e}", l / i);
                }
                current = steps::subtract(&current, &loss);
                loss_current_corrected = true;
            }
            None => {
                log::warn!("Loss-current correction requested but capacitance or tan δ is missing; skipping it.");
            }
        }
    }

    let current_offset = if settings.custom_current_offset == 0.0 {
        let window = steps::offset_window(&time, &current, settings.frequency, &options.offset_window)?;
        log::debug!(
            "current offset window: rows {}..{} ({:?})",
            window.start,
            window.end,
            options.offset_window.kind
        );
        steps::current_offset(&current, window)
    } else {
        settings.custom_current_offset
    };
    let current = steps::remove_offset(&current, current_offset);

    let charge = steps::integrate_charge(&current, &time);
    let polarization = steps::polarization(&charge, settings.area);
    let (polarization, p_diff) = steps::amplitude_recenter(&polarization);
    let (polarization, p_null) = steps::zero_recenter(&field, &polarization, options.zero_neighbors)?;

    let floor = options.vref_floor.unwrap_or(settings.vref_error);
    let p_error = steps::polarization_error(samples, &polarization, settings, options.vref_policy, floor)?;
    if p_error.floor_rows > 0 {
        log::warn!(
            "{} rows have |Vref| below {floor:e} V; error term handled by {:?} policy.",
            p_error.floor_rows,
            options.vref_policy
        );
    }

    let rows = samples
        .iter()
        .enumerate()
        .map(|(i, s)| HysteresisRow {
            time: s.time,
            vset: s.vset,
            vref: s.vref,
            vdiff: vdiff[i],
            current: current[i],
            field: field[i],
            charge: charge[i],
            polarization: polarization[i],
            polarization_error: p_error.values[i],
        })
        .collect();
    let table = HysteresisTable { rows };

    let LoopMetrics { pr, pr_error, ec } = table_metrics(&table, options);

    let results = HysteresisResults {
        amplitude: settings.amplitude,
        frequency: settings.frequency,
        thickness: settings.thickness,
        area: settings.area,
        area_error: settings.area_error,
        e_bias,
        e_bias_corrected: settings.correct_ebias,
        loss_current_corrected,
        current_offset,
        p_diff,
        p_null,
        pr,
        pr_error,
        pr_error_sigma: options.pr_error_sigma,
        ec,
        vref_floor_rows: p_error.floor_rows,
    };

    Ok(Reconstruction { table, results })
}

/// PR, PR error and EC of an already evaluated table, such as a reloaded
/// data file.
pub fn loop_metrics(table: &HysteresisTable, options: &EvalOptions) -> Result<LoopMetrics, ReconstructError> {
    validate_options(options)?;
    if table.len() < options.metric_neighbors {
        return Err(ReconstructError::InsufficientData {
            needed: options.metric_neighbors,
            available: table.len(),
            context: "loop metrics",
        });
    }
    if let Some(row) = table
        .rows
        .iter()
        .position(|r| !(r.field.is_finite() && r.polarization.is_finite()))
    {
        return Err(ReconstructError::NonFiniteSample { row });
    }
    Ok(table_metrics(table, options))
}

fn table_metrics(table: &HysteresisTable, options: &EvalOptions) -> LoopMetrics {
    let remanence = metrics::remanent_polarization(table, options.metric_neighbors);
    let ec = metrics::coercive_field(table, options.metric_neighbors);
    let pr_error = remanence.pr_error * options.pr_error_sigma;
    log::info!(
        "PR: ({:.6} +- {:.6}) mC/m2",
        remanence.pr.abs() * 1e3,
        pr_error.abs() * 1e3
    );
    LoopMetrics {
        pr: remanence.pr,
        pr_error,
        ec,
    }
}

fn validate_options(options: &EvalOptions) -> Result<(), ReconstructError> {
    let periods = options.offset_window.periods;
    if !(periods.is_finite() && periods > 0.0) {
        return Err(ReconstructError::InvalidSetting {
            field: "offset_periods",
            reason: "must be finite and positive".to_string(),
        });
    }
    if options.zero_neighbors == 0 {
        return Err(ReconstructError::InvalidSetting {
            field: "zero_neighbors",
            reason: "must be at least 1".to_string(),
        });
    }
    if options.metric_neighbors == 0 {
        return Err(ReconstructError::InvalidSetting {
            field: "metric_neighbors",
            reason: "must be at least 1".to_string(),
        });
    }
    if !(options.pr_error_sigma.is_finite() && options.pr_error_sigma >= 0.0) {
        return Err(ReconstructError::InvalidSetting {
            field: "pr_error_sigma",
            reason: "must be finite and not negative".to_string(),
        });
    }
    if let Some(floor) = options.vref_floor {
        if !(floor.is_finite() && floor > 0.0) {
            return Err(ReconstructError::InvalidSetting {
                field: "vref_floor",
                reason: "must be finite and positive".to_string(),
            });
        }
    }
    Ok(())
}

fn check_samples(samples: &[RawSample], options: &EvalOptions) -> Result<(), ReconstructError> {
    let needed = options.zero_neighbors.max(options.metric_neighbors).max(2);
    if samples.len() < needed {
        return Err(ReconstructError::InsufficientData {
            needed,
            available: samples.len(),
            context: "nearest-neighbour windows",
        });
    }

    if let Some(row) = samples
        .iter()
        .position(|s| !(s.time.is_finite() && s.vset.is_finite() && s.vref.is_finite()))
    {
        return Err(ReconstructError::NonFiniteSample { row });
    }

    let dt = samples[1].time - samples[0].time;
    for (i, pair) in samples.windows(2).enumerate() {
        let step = pair[1].time - pair[0].time;
        if !(step > 0.0) || (step - dt).abs() > TIME_STEP_TOLERANCE * dt.abs() {
            return Err(ReconstructError::NonUniformSampling {
                row: i + 1,
                expected: dt,
                found: step,
            });
        }
    }
    Ok(())
}
