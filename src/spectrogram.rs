//! Log-power spectrogram estimation
//!
//! Computes a short-time one-sided power spectral density per channel
//! signal and log-scales it for downstream thresholding.
//!
//! **Per segment**:
//! 1. Subtract the least-squares line (linear detrend)
//! 2. Multiply by a periodic Hamming window
//! 3. Forward FFT, one-sided PSD with density scaling `1/(R * sum(w^2))`,
//!    doubling every bin except DC and (for even segment lengths) Nyquist
//!
//! The log transform shifts the whole matrix into strictly positive
//! territory before taking the natural log, so the output carries no NaN
//! and has a finite minimum even when the raw PSD contains zeros.

use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

use crate::error::{DomainError, NonPositiveRateSnafu, SignalTooShortSnafu};
use crate::stats;

/// Shift guard keeping the log argument strictly positive
const LOG_EPSILON: f64 = 1e-9;

/// Spectrogram window parameters, in seconds.
#[derive(Debug, Clone)]
pub struct SpectrogramConfig {
    /// Segment duration
    pub window_duration: f64,
    /// Overlap between consecutive segments
    pub window_overlap: f64,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_duration: 0.2,
            window_overlap: 0.0,
        }
    }
}

/// Log-power time-frequency matrix with its axes.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrogram {
    /// Ascending frequency bins in Hz, 0 to Nyquist
    pub freqs: Vec<f64>,
    /// Ascending segment-center times in seconds from signal start
    pub times: Vec<f64>,
    /// Log-scaled power, `freqs.len()` rows by `times.len()` columns
    pub power: Vec<Vec<f64>>,
}

/// Compute the log-power spectrogram of one channel signal.
///
/// `rate` is the sample rate in Hz. Segment length is
/// `round(window_duration * rate)`, floored at 2 samples; the overlap is
/// clamped below the segment length. Fails when the rate is not positive
/// or the signal cannot fill one segment.
pub fn compute_spectrogram(
    signal: &[f64],
    rate: f64,
    config: &SpectrogramConfig,
) -> Result<Spectrogram, DomainError> {
    snafu::ensure!(rate > 0.0, NonPositiveRateSnafu { rate });

    let nperseg = (config.window_duration * rate).round().max(2.0) as usize;

    let mut noverlap = (config.window_overlap * rate).round().max(0.0) as usize;
    if noverlap >= nperseg {
        noverlap = nperseg - 1;
    }
    let step = nperseg - noverlap;

    snafu::ensure!(
        signal.len() >= nperseg,
        SignalTooShortSnafu {
            len: signal.len(),
            n: nperseg,
        }
    );
    let segments = (signal.len() - nperseg) / step + 1;
    debug!(nperseg, noverlap, segments, "spectrogram layout");

    // Periodic Hamming window and its density normalization.
    let window: Vec<f64> = (0..nperseg)
        .map(|i| 0.54 - 0.46 * (std::f64::consts::TAU * i as f64 / nperseg as f64).cos())
        .collect();
    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (rate * window_power);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(nperseg);

    let bins = nperseg / 2 + 1;
    let nyquist_bin = if nperseg % 2 == 0 { Some(bins - 1) } else { None };
    let mut power = vec![vec![0.0f64; segments]; bins];
    let mut buf = vec![Complex::new(0.0f64, 0.0); nperseg];

    for j in 0..segments {
        let segment = &signal[j * step..j * step + nperseg];
        let (slope, intercept) = stats::linear_fit(segment);
        for (i, cell) in buf.iter_mut().enumerate() {
            let detrended = segment[i] - (slope * i as f64 + intercept);
            *cell = Complex::new(detrended * window[i], 0.0);
        }
        fft.process(&mut buf);

        for (k, row) in power.iter_mut().enumerate() {
            let mut psd = buf[k].norm_sqr() * scale;
            if k != 0 && Some(k) != nyquist_bin {
                psd *= 2.0;
            }
            row[j] = psd;
        }
    }

    let freqs = (0..bins).map(|k| k as f64 * rate / nperseg as f64).collect();
    let times = (0..segments)
        .map(|j| (nperseg as f64 / 2.0 + (j * step) as f64) / rate)
        .collect();

    log_scale(&mut power);

    Ok(Spectrogram {
        freqs,
        times,
        power,
    })
}

/// Natural log of the power matrix after a positivity shift.
///
/// If the minimum is at or below zero the whole matrix is shifted by
/// `min - epsilon` first; any NaN that still slips through becomes 0.
fn log_scale(power: &mut [Vec<f64>]) {
    let mut min = f64::INFINITY;
    for row in power.iter() {
        for &v in row {
            if v < min {
                min = v;
            }
        }
    }
    let shift = if min <= 0.0 { min - LOG_EPSILON } else { 0.0 };

    for row in power.iter_mut() {
        for v in row.iter_mut() {
            let logged = (*v - shift).ln();
            *v = if logged.is_nan() { 0.0 } else { logged };
        }
    }
}
