//! Point-wise averaging of repeated cycles.

use crate::domain::RawSample;
use crate::error::AppError;

/// Mean of several traces recorded at the same rate.
///
/// The result is as long as the shortest trace.
pub fn average_cycles(traces: &[Vec<RawSample>]) -> Result<Vec<RawSample>, AppError> {
    let len = traces
        .iter()
        .map(Vec::len)
        .min()
        .ok_or_else(|| AppError::new(3, "No traces to average."))?;
    if len == 0 {
        return Err(AppError::new(3, "Cannot average an empty trace."));
    }

    let longest = traces.iter().map(Vec::len).max().unwrap_or(len);
    if longest != len {
        log::warn!("Averaging truncated {longest} rows to {len}.");
    }

    let n = traces.len() as f64;
    let out = (0..len)
        .map(|i| {
            let (t, vset, vref) = traces.iter().fold((0.0, 0.0, 0.0), |acc, trace| {
                let s = trace[i];
                (acc.0 + s.time, acc.1 + s.vset, acc.2 + s.vref)
            });
            RawSample::new(t / n, vset / n, vref / n)
        })
        .collect();
    Ok(out)
}
