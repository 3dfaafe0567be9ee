//! Scalar loop metrics computed from the finished table.

use crate::domain::{Column, HysteresisTable};
use crate::math::{finite_mean, mean};

/// Remanent polarization and its (1σ) error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Remanence {
    /// Mean `|P|` over the rows nearest `E = 0`.
    pub pr: f64,
    /// Mean `|P_error|` over the same rows (non-finite rows skipped).
    pub pr_error: f64,
}

/// PR and PR error from the `k` rows nearest `E = 0`.
pub fn remanent_polarization(table: &HysteresisTable, k: usize) -> Remanence {
    let near = table.nearest(Column::Field, 0.0, k);
    let pr = mean(near.iter().map(|r| r.polarization.abs())).unwrap_or(f64::NAN);
    let pr_error = finite_mean(near.iter().map(|r| r.polarization_error.abs())).unwrap_or(f64::NAN);
    Remanence { pr, pr_error }
}

/// EC: mean `|E|` over the `k` rows nearest `P = 0`.
pub fn coercive_field(table: &HysteresisTable, k: usize) -> f64 {
    let near = table.nearest(Column::Polarization, 0.0, k);
    mean(near.iter().map(|r| r.field.abs())).unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HysteresisRow;

    fn row(field: f64, polarization: f64, polarization_error: f64) -> HysteresisRow {
        HysteresisRow {
            time: 0.0,
            vset: 0.0,
            vref: 0.0,
            vdiff: 0.0,
            current: 0.0,
            field,
            charge: 0.0,
            polarization,
            polarization_error,
        }
    }

    #[test]
    fn remanence_uses_rows_nearest_zero_field() {
        let table = HysteresisTable {
            rows: vec![
                row(-0.1, 0.2, 0.01),
                row(0.05, -0.3, -0.02),
                row(5.0, 1.0, 0.5),
                row(-5.0, -1.0, 0.5),
            ],
        };
        let r = remanent_polarization(&table, 2);
        assert!((r.pr - 0.25).abs() < 1e-12);
        assert!((r.pr_error - 0.015).abs() < 1e-12);
    }

    #[test]
    fn remanence_error_skips_flagged_rows() {
        let table = HysteresisTable {
            rows: vec![row(0.0, 0.2, f64::NAN), row(0.1, 0.2, 0.04)],
        };
        let r = remanent_polarization(&table, 2);
        assert!((r.pr_error - 0.04).abs() < 1e-12);
    }

    #[test]
    fn coercive_field_uses_rows_nearest_zero_polarization() {
        let table = HysteresisTable {
            rows: vec![
                row(2.0, 0.01, 0.0),
                row(-2.2, -0.02, 0.0),
                row(0.0, 0.5, 0.0),
                row(0.0, -0.5, 0.0),
            ],
        };
        assert!((coercive_field(&table, 2) - 2.1).abs() < 1e-12);
    }
}
