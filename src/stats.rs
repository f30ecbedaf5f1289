//! Shared numeric helpers for the despiking, spectral, and analysis stages.

/// Arithmetic mean; zero for an empty slice.
pub(crate) fn mean(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    x.iter().sum::<f64>() / x.len() as f64
}

/// Population standard deviation; zero for an empty slice.
pub(crate) fn std_dev(x: &[f64]) -> f64 {
    if x.is_empty() {
        return 0.0;
    }
    let mu = mean(x);
    let m2: f64 = x.iter().map(|&v| (v - mu) * (v - mu)).sum();
    (m2 / x.len() as f64).sqrt()
}

/// Least-squares line fit of `y` against the sample index.
///
/// Returns `(slope, intercept)`. A signal with fewer than two samples has
/// no spread in the index, so the fit degenerates to slope 0 through the
/// sample itself.
pub(crate) fn linear_fit(y: &[f64]) -> (f64, f64) {
    let n = y.len();
    if n < 2 {
        return (0.0, y.first().copied().unwrap_or(0.0));
    }
    let mean_t = (n - 1) as f64 / 2.0;
    let mean_y = mean(y);
    let mut cov = 0.0;
    let mut var_t = 0.0;
    for (i, &v) in y.iter().enumerate() {
        let dt = i as f64 - mean_t;
        cov += dt * (v - mean_y);
        var_t += dt * dt;
    }
    let slope = cov / var_t;
    (slope, mean_y - slope * mean_t)
}

/// Linearly interpolated percentile over an ascending-sorted slice.
///
/// `pct` is clamped to `[0, 100]`. The caller is responsible for sorting
/// and for dropping NaN beforehand.
pub(crate) fn percentile(sorted: &[f64], pct: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pct = pct.clamp(0.0, 100.0);
    let rank = pct / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}
