//! Augmented matrix codec
//!
//! Persists one spectrogram per (file, channel) as a flat tabular
//! artifact that embeds its own axes.
//!
//! **Layout** (`(Fn+1) x (Tn+1)` cells):
//! - row 0, columns 1..=Tn: time axis in seconds
//! - column 0, rows 1..=Fn: frequency axis in Hz
//! - cell (0,0): unused sentinel, written as 0
//! - the remaining `Fn x Tn` block: log-power values
//!
//! The text form is comma-separated decimal, one row per line. Floats
//! are printed with shortest round-trip formatting, so decoding an
//! encoded matrix reproduces the original values exactly.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use snafu::ResultExt;

use crate::error::{
    BadCellSnafu, FormatError, IoSnafu, MissingHeadersSnafu, PipelineError, RaggedCsvRowSnafu,
};

/// A `(Fn+1) x (Tn+1)` cell grid embedding the frequency and time axes.
#[derive(Debug, Clone, PartialEq)]
pub struct AugmentedMatrix {
    cells: Vec<Vec<f64>>,
}

impl AugmentedMatrix {
    /// Build the augmented layout from axes and a `Fn x Tn` power block.
    pub fn encode(freqs: &[f64], times: &[f64], power: &[Vec<f64>]) -> Self {
        debug_assert_eq!(freqs.len(), power.len());

        let mut cells = Vec::with_capacity(freqs.len() + 1);
        let mut header = Vec::with_capacity(times.len() + 1);
        header.push(0.0); // sentinel, reserved
        header.extend_from_slice(times);
        cells.push(header);

        for (freq, row) in freqs.iter().zip(power) {
            debug_assert_eq!(row.len(), times.len());
            let mut line = Vec::with_capacity(times.len() + 1);
            line.push(*freq);
            line.extend_from_slice(row);
            cells.push(line);
        }

        Self { cells }
    }

    /// Exact inverse of [`AugmentedMatrix::encode`]: slices away the
    /// header row and column.
    pub fn decode(&self) -> (Vec<f64>, Vec<f64>, Vec<Vec<f64>>) {
        let freqs = self.freqs();
        let times = self.times().to_vec();
        let power = self.cells[1..]
            .iter()
            .map(|row| row[1..].to_vec())
            .collect();
        (freqs, times, power)
    }

    /// Number of frequency bins (data rows).
    pub fn freq_bins(&self) -> usize {
        self.cells.len() - 1
    }

    /// Number of time bins (data columns).
    pub fn time_bins(&self) -> usize {
        self.cells[0].len() - 1
    }

    /// The frequency axis, copied out of column 0.
    pub fn freqs(&self) -> Vec<f64> {
        self.cells[1..].iter().map(|row| row[0]).collect()
    }

    /// The time axis header.
    pub fn times(&self) -> &[f64] {
        &self.cells[0][1..]
    }

    /// One power value by (frequency row, time column) index.
    pub fn power_at(&self, freq_row: usize, time_col: usize) -> f64 {
        self.cells[freq_row + 1][time_col + 1]
    }

    /// Iterate the data block (header row/column excluded).
    pub fn data_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.cells[1..]
            .iter()
            .flat_map(|row| row[1..].iter().copied())
    }

    /// Mutable access to the data block, row by row.
    pub(crate) fn data_rows_mut(&mut self) -> impl Iterator<Item = &mut [f64]> {
        self.cells[1..].iter_mut().map(|row| &mut row[1..])
    }

    /// Add `offset` seconds to every value of the time header.
    pub fn shift_times(&mut self, offset: f64) {
        for t in &mut self.cells[0][1..] {
            *t += offset;
        }
    }

    /// Append another artifact's time columns (header and data) to this
    /// one, keeping this matrix's frequency column.
    ///
    /// The caller is responsible for having validated the frequency axes
    /// and shifted the other artifact's time header.
    pub(crate) fn append_time_columns(&mut self, other: &AugmentedMatrix) {
        debug_assert_eq!(self.freq_bins(), other.freq_bins());
        for (dst, src) in self.cells.iter_mut().zip(&other.cells) {
            dst.extend_from_slice(&src[1..]);
        }
    }

    /// Serialize to comma-separated decimal text, one row per line.
    pub fn to_csv(&self) -> String {
        let mut text = String::new();
        for row in &self.cells {
            for (i, v) in row.iter().enumerate() {
                if i > 0 {
                    text.push(',');
                }
                // Shortest round-trip float text keeps the codec exact.
                let _ = write!(text, "{v}");
            }
            text.push('\n');
        }
        text
    }

    /// Parse comma-separated decimal text back into a matrix.
    ///
    /// Rows must all have the first row's width, every cell must parse
    /// as a decimal number, and the grid must be large enough to carry
    /// the axis headers.
    pub fn from_csv(text: &str) -> Result<Self, FormatError> {
        let mut cells: Vec<Vec<f64>> = Vec::new();
        let mut expected = 0usize;

        for (line, raw) in text.lines().enumerate() {
            if raw.is_empty() {
                continue;
            }
            let mut row = Vec::with_capacity(expected.max(1));
            for (col, cell) in raw.split(',').enumerate() {
                let value: f64 = cell
                    .trim()
                    .parse()
                    .ok()
                    .ok_or_else(|| BadCellSnafu { line, col }.build())?;
                row.push(value);
            }
            if cells.is_empty() {
                expected = row.len();
            } else {
                snafu::ensure!(
                    row.len() == expected,
                    RaggedCsvRowSnafu {
                        line,
                        got: row.len(),
                        expected,
                    }
                );
            }
            cells.push(row);
        }

        snafu::ensure!(
            cells.len() >= 2 && expected >= 2,
            MissingHeadersSnafu {
                rows: cells.len(),
                cols: expected,
            }
        );

        Ok(Self { cells })
    }

    /// Write the text form to disk.
    pub fn write_csv(&self, path: &Path) -> Result<(), PipelineError> {
        fs::write(path, self.to_csv()).context(IoSnafu { path })
    }

    /// Read and parse a persisted artifact.
    pub fn read_csv(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).context(IoSnafu { path })?;
        Ok(Self::from_csv(&text)?)
    }
}
