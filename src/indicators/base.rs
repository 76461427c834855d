//! Shared numeric helpers for the per-bar indicators.

/// Period-over-period percent change: `(x[i] / x[i-1] - 1) * 100`.
///
/// Index 0 has no predecessor and is `None`. A change against a zero or
/// non-finite previous value is `None` as well, so no infinities leak into
/// downstream averages.
pub fn pct_change(values: &[f64]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(values.len());
    if values.is_empty() {
        return out;
    }
    out.push(None);
    for w in values.windows(2) {
        let (prev, curr) = (w[0], w[1]);
        if prev == 0.0 || !prev.is_finite() || !curr.is_finite() {
            out.push(None);
        } else {
            out.push(Some((curr / prev - 1.0) * 100.0));
        }
    }
    out
}

/// Mean of the absolute values of the defined entries. `None` when nothing is defined.
pub fn mean_abs<'a>(values: impl IntoIterator<Item = &'a Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v.abs(), count + 1));
    if count == 0 { None } else { Some(sum / count as f64) }
}
