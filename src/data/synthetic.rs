//! Synthetic shunt-method traces.
//!
//! The sample is driven by a triangular voltage. Its polarization follows two
//! tanh switching branches (one per sweep direction) plus a linear dielectric
//! term, and the current through the reference resistor is the analytic time
//! derivative of that polarization times the electrode area.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{MeasurementSettings, RawSample};
use crate::error::AppError;

/// Vacuum permittivity, F/m.
const EPSILON_0: f64 = 8.854_187_812_8e-12;

/// Parameters of a synthetic hysteresis measurement.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticLoop {
    /// Drive amplitude, V.
    pub amplitude: f64,
    /// Drive frequency, Hz.
    pub frequency: f64,
    /// DC offset added to the drive, V.
    pub drive_offset: f64,
    pub periods: usize,
    pub samples_per_period: usize,
    /// Film thickness, m.
    pub thickness: f64,
    /// Electrode area, m².
    pub area: f64,
    /// Reference resistor, Ω.
    pub rref: f64,
    /// Saturation polarization, C/m².
    pub saturation_polarization: f64,
    /// Coercive field, V/m.
    pub coercive_field: f64,
    /// Width of the switching transition, V/m.
    pub switching_width: f64,
    pub relative_permittivity: f64,
    /// DC current offset, A.
    pub current_offset: f64,
    /// Standard deviation of Gaussian noise on Vref, V.
    pub noise_std: f64,
    pub seed: u64,
}

impl Default for SyntheticLoop {
    fn default() -> Self {
        Self {
            amplitude: 10.0,
            frequency: 1.0,
            drive_offset: 0.0,
            periods: 3,
            samples_per_period: 400,
            thickness: 1e-6,
            area: 1e-6,
            rref: 1e3,
            saturation_polarization: 0.2,
            coercive_field: 3e6,
            switching_width: 1e6,
            relative_permittivity: 100.0,
            current_offset: 1e-6,
            noise_std: 1e-5,
            seed: 42,
        }
    }
}

impl SyntheticLoop {
    /// Settings matching the simulated geometry, with all corrections off.
    pub fn settings(&self) -> MeasurementSettings {
        MeasurementSettings {
            amplitude: self.amplitude,
            frequency: self.frequency,
            thickness: self.thickness,
            area: self.area,
            area_error: 0.0,
            rref: self.rref,
            rref_error: 0.0,
            vref_error: 0.0,
            capacitance: None,
            loss_tangent: None,
            correct_ebias: false,
            correct_loss_current: false,
            custom_current_offset: 0.0,
        }
    }

    /// |P| of either branch at zero field.
    pub fn remanent_polarization(&self) -> f64 {
        self.saturation_polarization * (self.coercive_field / self.switching_width).tanh()
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.periods == 0 || self.samples_per_period < 4 {
            return Err(AppError::new(2, "Synthetic trace needs at least one period of 4 samples."));
        }
        let positive = [
            ("amplitude", self.amplitude),
            ("frequency", self.frequency),
            ("thickness", self.thickness),
            ("area", self.area),
            ("rref", self.rref),
            ("switching width", self.switching_width),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(AppError::new(2, format!("Synthetic {name} must be finite and > 0.")));
            }
        }
        let finite = [
            ("drive offset", self.drive_offset),
            ("saturation polarization", self.saturation_polarization),
            ("coercive field", self.coercive_field),
            ("relative permittivity", self.relative_permittivity),
            ("current offset", self.current_offset),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(AppError::new(2, format!("Synthetic {name} must be finite.")));
            }
        }
        if !(self.noise_std.is_finite() && self.noise_std >= 0.0) {
            return Err(AppError::new(2, "Synthetic noise must be finite and >= 0."));
        }
        Ok(())
    }
}

/// Generate `periods · samples_per_period` raw samples starting at `t = 0`.
pub fn generate_trace(model: &SyntheticLoop) -> Result<Vec<RawSample>, AppError> {
    model.validate()?;

    let mut rng = StdRng::seed_from_u64(model.seed);
    let noise = Normal::new(0.0, model.noise_std)
        .map_err(|e| AppError::new(2, format!("Noise distribution error: {e}")))?;

    let n = model.periods * model.samples_per_period;
    let dt = 1.0 / (model.frequency * model.samples_per_period as f64);
    // |dE/dt| of the applied field along either sweep.
    let sweep_rate = 4.0 * model.amplitude * model.frequency / model.thickness;
    let dielectric = EPSILON_0 * model.relative_permittivity;

    let mut out = Vec::with_capacity(n);
    for k in 0..n {
        let t = k as f64 * dt;
        let phase = (model.frequency * t).rem_euclid(1.0);
        let vset = model.amplitude * triangle(phase) + model.drive_offset;
        let field = model.amplitude * triangle(phase) / model.thickness;

        let rising = !(0.25..0.75).contains(&phase);
        let (branch_center, direction) = if rising {
            (model.coercive_field, 1.0)
        } else {
            (-model.coercive_field, -1.0)
        };
        let x = (field - branch_center) / model.switching_width;
        let sech = 1.0 / x.cosh();
        let dp_de = model.saturation_polarization / model.switching_width * sech * sech + dielectric;

        let current = model.area * dp_de * sweep_rate * direction + model.current_offset;
        let vref = current * model.rref + noise.sample(&mut rng);
        out.push(RawSample::new(t, vset, vref));
    }
    Ok(out)
}

/// Unit triangle wave: 0 at phase 0, +1 at 0.25, -1 at 0.75.
fn triangle(phase: f64) -> f64 {
    if phase < 0.25 {
        4.0 * phase
    } else if phase < 0.75 {
        2.0 - 4.0 * phase
    } else {
        4.0 * phase - 4.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_trace() {
        let a = generate_trace(&SyntheticLoop::default()).unwrap();
        let b = generate_trace(&SyntheticLoop::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_changes_noise_only() {
        let a = generate_trace(&SyntheticLoop::default()).unwrap();
        let b = generate_trace(&SyntheticLoop {
            seed: 7,
            ..SyntheticLoop::default()
        })
        .unwrap();
        assert_ne!(a, b);
        for (x, y) in a.iter().zip(&b) {
            assert_eq!(x.time, y.time);
            assert_eq!(x.vset, y.vset);
        }
    }

    #[test]
    fn trace_shape() {
        let model = SyntheticLoop::default();
        let trace = generate_trace(&model).unwrap();
        assert_eq!(trace.len(), 1200);
        assert_eq!(trace[0].time, 0.0);
        assert!((trace[1].time - 0.0025).abs() < 1e-15);

        let vmax = trace.iter().map(|s| s.vset).fold(f64::NEG_INFINITY, f64::max);
        let vmin = trace.iter().map(|s| s.vset).fold(f64::INFINITY, f64::min);
        assert!((vmax - 10.0).abs() < 1e-9);
        assert!((vmin + 10.0).abs() < 1e-9);
    }

    #[test]
    fn switching_peak_on_rising_sweep() {
        let model = SyntheticLoop {
            noise_std: 0.0,
            current_offset: 0.0,
            ..SyntheticLoop::default()
        };
        let trace = generate_trace(&model).unwrap();
        // Largest current is at E = +Ec on the rising sweep: phase 0.075.
        let (k, _) = trace
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.vref.total_cmp(&b.1.vref))
            .unwrap();
        assert_eq!(k % 400, 30);
    }

    #[test]
    fn noise_free_current_is_periodic() {
        let model = SyntheticLoop {
            noise_std: 0.0,
            ..SyntheticLoop::default()
        };
        let trace = generate_trace(&model).unwrap();
        let sum_first: f64 = trace[0..400].iter().map(|s| s.vref).sum();
        let sum_second: f64 = trace[400..800].iter().map(|s| s.vref).sum();
        assert!((sum_first - sum_second).abs() < 1e-9);
    }

    #[test]
    fn rejects_bad_model() {
        let err = generate_trace(&SyntheticLoop {
            rref: 0.0,
            ..SyntheticLoop::default()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);

        let err = generate_trace(&SyntheticLoop {
            noise_std: -1.0,
            ..SyntheticLoop::default()
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
