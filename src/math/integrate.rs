//! Cumulative trapezoidal integration.

/// Running integral of `y` over `x`, starting at exactly `0.0`.
///
/// Output has the same length as the inputs. Inputs of unequal length are
/// integrated over the common prefix.
pub fn cumulative_trapezoid(y: &[f64], x: &[f64]) -> Vec<f64> {
    let n = y.len().min(x.len());
    let mut out = Vec::with_capacity(n);
    if n == 0 {
        return out;
    }

    let mut acc = 0.0;
    out.push(acc);
    for i in 1..n {
        acc += 0.5 * (y[i] + y[i - 1]) * (x[i] - x[i - 1]);
        out.push(acc);
    }
    out
}
