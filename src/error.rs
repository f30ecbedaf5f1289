//! Error taxonomy for the acquisition pipeline
//!
//! Each stage fails fast with its own error kind; none of the numeric
//! stages attempt recovery from malformed input. The batch driver in
//! [`crate::batch`] is the sole recovery boundary and records these
//! per (file, channel) unit.

use std::path::PathBuf;

use snafu::Snafu;

/// Malformed binary payload or malformed matrix text.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum FormatError {
    /// Payload does not divide into whole frames
    #[snafu(display("payload of {len} bytes is not a whole number of 32-word frames"))]
    RaggedFrames { len: usize },

    /// Retained samples do not fill whole channel rows
    #[snafu(display("{retained} retained samples do not fill whole 6-channel rows"))]
    RaggedRows { retained: usize },

    /// A matrix row has the wrong number of cells
    #[snafu(display("matrix row {line} has {got} cells, expected {expected}"))]
    RaggedCsvRow {
        line: usize,
        got: usize,
        expected: usize,
    },

    /// A matrix cell is not a decimal number
    #[snafu(display("matrix cell at row {line}, column {col} is not a number"))]
    BadCell { line: usize, col: usize },

    /// The matrix is too small to carry the axis header row and column
    #[snafu(display("matrix of {rows}x{cols} cells cannot carry axis headers"))]
    MissingHeaders { rows: usize, cols: usize },
}

/// Unparsable timestamp in a source name.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum NameFormatError {
    #[snafu(display("no YYYY_MM_DD_HH_MM_SS group in source name {name:?}"))]
    NoTimestamp { name: String },

    #[snafu(display("source name {name:?} carries a non-calendar timestamp"))]
    BadCalendar { name: String },
}

/// Invalid window, rate, or length parameters for a numeric stage.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum DomainError {
    #[snafu(display("window size must be at least 1"))]
    WindowTooSmall,

    #[snafu(display("signal of {len} samples is shorter than the {n}-sample window"))]
    SignalTooShort { len: usize, n: usize },

    #[snafu(display("sample rate must be positive, got {rate}"))]
    NonPositiveRate { rate: f64 },
}

/// Mismatched axes while stitching sequential artifacts.
#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum AlignmentError {
    #[snafu(display("nothing to stitch"))]
    NoArtifacts,

    #[snafu(display("artifact {index} has {got} frequency bins, expected {expected}"))]
    FrequencyBinCount {
        index: usize,
        got: usize,
        expected: usize,
    },

    #[snafu(display("artifact {index} frequency axis diverges at bin {bin}"))]
    FrequencyAxisMismatch { index: usize, bin: usize },
}

/// Any failure a single (file, channel) unit can produce.
///
/// The batch driver collects one of these per failed unit; sibling units
/// keep running.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum PipelineError {
    #[snafu(context(false))]
    #[snafu(display("{source}"))]
    Format { source: FormatError },

    #[snafu(context(false))]
    #[snafu(display("{source}"))]
    NameFormat { source: NameFormatError },

    #[snafu(context(false))]
    #[snafu(display("{source}"))]
    Domain { source: DomainError },

    #[snafu(context(false))]
    #[snafu(display("{source}"))]
    Alignment { source: AlignmentError },

    #[snafu(display("i/o failure on {}: {source}", path.display()))]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl PipelineError {
    /// Short taxonomy tag used in batch reports and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Format { .. } => "format",
            PipelineError::NameFormat { .. } => "name-format",
            PipelineError::Domain { .. } => "domain",
            PipelineError::Alignment { .. } => "alignment",
            PipelineError::Io { .. } => "io",
        }
    }
}
