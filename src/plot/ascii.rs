//! ASCII plotting of P–E loops for terminal output.
//!
//! This is intentionally "dumb" (fixed-size grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements:
//! - loop trace (time order): `*`
//! - axes through `E = 0` and `P = 0`: `|`, `-`, `+`

use crate::domain::{HysteresisResults, HysteresisTable};

/// Render P (mC/m²) against E (MV/m).
pub fn render_loop_ascii(
    table: &HysteresisTable,
    width: usize,
    height: usize,
    results: Option<&HysteresisResults>,
) -> String {
    let width = width.max(10);
    let height = height.max(5);

    let points: Vec<(f64, f64)> = table
        .loop_points()
        .into_iter()
        .map(|(e, p)| (e / 1e6, p * 1e3))
        .filter(|(e, p)| e.is_finite() && p.is_finite())
        .collect();

    let (e_min, e_max) = range(points.iter().map(|p| p.0)).unwrap_or((-1.0, 1.0));
    let (p_min, p_max) = range(points.iter().map(|p| p.1)).unwrap_or((-1.0, 1.0));
    let (e_min, e_max) = pad_range(e_min, e_max, 0.05);
    let (p_min, p_max) = pad_range(p_min, p_max, 0.05);

    let mut grid = vec![vec![' '; width]; height];

    let mut prev = None;
    for &(e, p) in &points {
        let x = map_x(e, e_min, e_max, width);
        let y = map_y(p, p_min, p_max, height);
        match prev {
            Some((x0, y0)) => draw_line(&mut grid, x0, y0, x, y, '*'),
            None => grid[y][x] = '*',
        }
        prev = Some((x, y));
    }

    draw_axes(&mut grid, e_min, e_max, p_min, p_max);

    let mut out = String::new();
    out.push_str(&format!(
        "Loop: E=[{e_min:.3}, {e_max:.3}] MV/m | P=[{p_min:.3}, {p_max:.3}] mC/m²\n"
    ));
    for row in grid {
        out.push_str(&row.into_iter().collect::<String>());
        out.push('\n');
    }
    if let Some(r) = results {
        out.push_str(&format!(
            "PR = ({:.3} ± {:.3}) mC/m² | EC = {:.3} MV/m\n",
            r.pr * 1e3,
            r.pr_error * 1e3,
            r.ec / 1e6
        ));
    }
    out
}

fn range<I: Iterator<Item = f64>>(values: I) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        min = min.min(v);
        max = max.max(v);
    }
    if min.is_finite() && max.is_finite() && max > min {
        Some((min, max))
    } else {
        None
    }
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(v: f64, min: f64, max: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((v - min) / (max - min)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
}

fn map_y(v: f64, min: f64, max: f64, height: usize) -> usize {
    let height = height.max(2);
    let u = ((v - min) / (max - min)).clamp(0.0, 1.0);
    // y=top is max -> row 0
    (height as f64 - 1.0 - (u * (height as f64 - 1.0))).round() as usize
}

/// Axes go under the trace: only blank cells are filled.
fn draw_axes(grid: &mut [Vec<char>], e_min: f64, e_max: f64, p_min: f64, p_max: f64) {
    let height = grid.len();
    let width = grid[0].len();
    let has_row = p_min <= 0.0 && p_max >= 0.0;
    let has_col = e_min <= 0.0 && e_max >= 0.0;
    let y0 = map_y(0.0, p_min, p_max, height);
    let x0 = map_x(0.0, e_min, e_max, width);

    if has_row {
        for cell in grid[y0].iter_mut().filter(|c| **c == ' ') {
            *cell = '-';
        }
    }
    if has_col {
        for row in grid.iter_mut() {
            if row[x0] == ' ' {
                row[x0] = '|';
            }
        }
    }
    if has_row && has_col && matches!(grid[y0][x0], '-' | '|') {
        grid[y0][x0] = '+';
    }
}

/// Integer line drawing (Bresenham-ish).
fn draw_line(grid: &mut [Vec<char>], x0: usize, y0: usize, x1: usize, y1: usize, ch: char) {
    let mut x0 = x0 as isize;
    let mut y0 = y0 as isize;
    let x1 = x1 as isize;
    let y1 = y1 as isize;

    let dx = (x1 - x0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let dy = -(y1 - y0).abs();
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if y0 >= 0 && (y0 as usize) < grid.len() && x0 >= 0 && (x0 as usize) < grid[0].len() {
            grid[y0 as usize][x0 as usize] = ch;
        }

        if x0 == x1 && y0 == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x0 += sx;
        }
        if e2 <= dx {
            err += dx;
            y0 += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HysteresisRow;

    fn row(field: f64, polarization: f64) -> HysteresisRow {
        HysteresisRow {
            time: 0.0,
            vset: 0.0,
            vref: 0.0,
            vdiff: 0.0,
            current: 0.0,
            field,
            charge: 0.0,
            polarization,
            polarization_error: 0.0,
        }
    }

    #[test]
    fn loop_golden_snapshot_small() {
        let table = HysteresisTable {
            rows: vec![
                row(-1e6, -1e-3),
                row(1e6, -1e-3),
                row(1e6, 1e-3),
                row(-1e6, 1e-3),
                row(-1e6, -1e-3),
            ],
        };

        let txt = render_loop_ascii(&table, 11, 5, None);
        let expected = concat!(
            "Loop: E=[-1.100, 1.100] MV/m | P=[-1.100, 1.100] mC/m²\n",
            "***********\n",
            "*    |    *\n",
            "*----+----*\n",
            "*    |    *\n",
            "***********\n",
        );
        assert_eq!(txt, expected);
    }

    #[test]
    fn empty_table_renders_axes_only() {
        let txt = render_loop_ascii(&HysteresisTable::default(), 10, 5, None);
        assert!(txt.contains('+'));
        assert!(!txt.contains('*'));
    }

    #[test]
    fn results_footer() {
        let table = HysteresisTable {
            rows: vec![row(-1e6, -1e-3), row(1e6, 1e-3)],
        };
        let results = HysteresisResults {
            amplitude: 1.0,
            frequency: 1.0,
            thickness: 1e-6,
            area: 1e-6,
            area_error: 0.0,
            e_bias: 0.0,
            e_bias_corrected: false,
            loss_current_corrected: false,
            current_offset: 0.0,
            p_diff: 0.0,
            p_null: 0.0,
            pr: 0.25,
            pr_error: 0.005,
            pr_error_sigma: 1.0,
            ec: 3.5e6,
            vref_floor_rows: 0,
        };
        let txt = render_loop_ascii(&table, 20, 8, Some(&results));
        assert!(txt.ends_with("PR = (250.000 ± 5.000) mC/m² | EC = 3.500 MV/m\n"), "{txt}");
    }
}
