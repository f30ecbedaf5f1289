//! Threshold and sub-range queries
//!
//! Pure, side-effect-free operations over persisted artifacts, kept at
//! the library boundary so an interactive front end can explore
//! thresholds and frequency ranges without re-deriving the numeric
//! pipeline.

use crate::matrix::AugmentedMatrix;
use crate::stats;

/// Linearly interpolated percentile over a flattened value set.
///
/// NaN values are dropped first; an empty (or all-NaN) input yields 0.
pub fn quantile_threshold(values: impl IntoIterator<Item = f64>, cutoff_percent: f64) -> f64 {
    let mut kept: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if kept.is_empty() {
        return 0.0;
    }
    kept.sort_by(f64::total_cmp);
    stats::percentile(&kept, cutoff_percent)
}

impl AugmentedMatrix {
    /// Quantile threshold over this matrix's data block.
    pub fn data_quantile(&self, cutoff_percent: f64) -> f64 {
        quantile_threshold(self.data_values(), cutoff_percent)
    }

    /// Copy of this matrix with every data value at or below `threshold`
    /// zeroed; axes are preserved.
    pub fn apply_threshold(&self, threshold: f64) -> AugmentedMatrix {
        let mut out = self.clone();
        for row in out.data_rows_mut() {
            for v in row.iter_mut() {
                if *v <= threshold {
                    *v = 0.0;
                }
            }
        }
        out
    }

    /// Per-time-bin power sum over the rows whose frequency lies in
    /// `[freq_lo, freq_hi]` (inclusive).
    pub fn band_power(&self, freq_lo: f64, freq_hi: f64) -> Vec<f64> {
        let freqs = self.freqs();
        let mut sums = vec![0.0f64; self.time_bins()];
        for (row, &freq) in freqs.iter().enumerate() {
            if freq < freq_lo || freq > freq_hi {
                continue;
            }
            for (col, sum) in sums.iter_mut().enumerate() {
                *sum += self.power_at(row, col);
            }
        }
        sums
    }

    /// Axis-aligned sub-matrix covering the frequency band
    /// `[freq_lo, freq_hi]` and the time span `[time_lo, time_hi]`,
    /// both inclusive.
    pub fn sub_range(
        &self,
        freq_lo: f64,
        freq_hi: f64,
        time_lo: f64,
        time_hi: f64,
    ) -> AugmentedMatrix {
        let freqs = self.freqs();
        let times = self.times();
        let rows: Vec<usize> = (0..freqs.len())
            .filter(|&r| freqs[r] >= freq_lo && freqs[r] <= freq_hi)
            .collect();
        let cols: Vec<usize> = (0..times.len())
            .filter(|&c| times[c] >= time_lo && times[c] <= time_hi)
            .collect();

        let sel_freqs: Vec<f64> = rows.iter().map(|&r| freqs[r]).collect();
        let sel_times: Vec<f64> = cols.iter().map(|&c| times[c]).collect();
        let power: Vec<Vec<f64>> = rows
            .iter()
            .map(|&r| cols.iter().map(|&c| self.power_at(r, c)).collect())
            .collect();

        AugmentedMatrix::encode(&sel_freqs, &sel_times, &power)
    }
}
