//! Nearest-k selection by absolute difference.
//!
//! The reconstruction repeatedly asks "which rows are closest to `E = 0`"
//! (or `P = 0`, or `I = 0`) and then averages a companion column over them.
//! All of those call sites go through [`nearest_k`].
//!
//! Ordering uses `f64::total_cmp` on `|key - target|` with a stable sort, so
//! the result depends only on the values (ties keep input order) and NaN keys
//! sort last instead of poisoning the comparison.

/// Return the `k` items whose `key` is closest to `target`, closest first.
///
/// `k` larger than the input returns every item.
pub fn nearest_k<T, F>(items: &[T], key: F, target: f64, k: usize) -> Vec<&T>
where
    F: Fn(&T) -> f64,
{
    if k == 0 || items.is_empty() {
        return Vec::new();
    }

    let mut ranked: Vec<(f64, &T)> = items
        .iter()
        .map(|item| ((key(item) - target).abs(), item))
        .collect();
    ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
    ranked.truncate(k);

    ranked.into_iter().map(|(_, item)| item).collect()
}
