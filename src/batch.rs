//! Batch processing driver
//!
//! Runs the decode → despike → spectrogram → persist pipeline over a set
//! of acquisition files. Every (file, channel) pair is an independent
//! unit: units run on a rayon worker pool, each owning its own sample
//! buffer, and a failed unit is recorded without aborting its siblings.
//! Stitching is a separate sequential reduction over the persisted
//! artifacts and runs only once every contributing unit has completed.

use std::fmt;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use snafu::ResultExt;
use tracing::{debug, info, warn};

use crate::decode::{self, SampleMatrix, CHANNELS};
use crate::despike::{self, DespikeConfig};
use crate::error::{IoSnafu, PipelineError};
use crate::matrix::AugmentedMatrix;
use crate::spectrogram::{self, SpectrogramConfig};
use crate::stitch::{self, Artifact};

/// Everything a batch run needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Directory holding the raw acquisition files
    pub input_dir: PathBuf,
    /// Directory receiving the per-channel artifacts
    pub output_dir: PathBuf,
    /// Acquisition file names to process, relative to `input_dir`
    pub files: Vec<String>,
    /// Logger sample rate in Hz
    pub sample_rate: f64,
    /// Also dump each channel as decoded, before despiking, as
    /// `<file>_<ch>_raw.csv`
    pub save_raw: bool,
    /// Persist each spectrogram as `<file>_<ch>_spec.csv`
    pub save_spec: bool,
    pub despike: DespikeConfig,
    pub spectrogram: SpectrogramConfig,
}

impl BatchConfig {
    /// Config with the logger defaults (5 kHz, spectrogram artifacts on).
    pub fn new(
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        files: Vec<String>,
    ) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            files,
            sample_rate: 5000.0,
            save_raw: false,
            save_spec: true,
            despike: DespikeConfig::default(),
            spectrogram: SpectrogramConfig::default(),
        }
    }
}

/// Identifies one unit of batch work.
///
/// `channel` is `None` for failures that precede channel extraction
/// (unreadable or undecodable files), where no per-channel work exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitId {
    pub file: String,
    pub channel: Option<usize>,
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.channel {
            Some(channel) => write!(f, "{}[ch{}]", self.file, channel),
            None => f.write_str(&self.file),
        }
    }
}

/// Per-unit outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub completed: Vec<UnitId>,
    pub failed: Vec<(UnitId, PipelineError)>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Process every (file, channel) unit of the batch.
///
/// Units run in parallel; outcomes are collected in deterministic
/// (file, channel) order regardless of scheduling. A failure in one
/// unit never silently corrupts or skips another.
pub fn run_batch(config: &BatchConfig) -> BatchReport {
    let outcomes: Vec<(UnitId, Result<(), PipelineError>)> = config
        .files
        .par_iter()
        .map(|file| process_file(config, file))
        .flatten()
        .collect();

    let mut report = BatchReport::default();
    for (unit, outcome) in outcomes {
        match outcome {
            Ok(()) => report.completed.push(unit),
            Err(err) => {
                warn!(unit = %unit, kind = err.kind(), "unit failed: {err}");
                report.failed.push((unit, err));
            }
        }
    }
    info!(
        completed = report.completed.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    report
}

fn process_file(config: &BatchConfig, file: &str) -> Vec<(UnitId, Result<(), PipelineError>)> {
    let path = config.input_dir.join(file);
    let samples = match decode::read_acquisition(&path) {
        Ok(samples) => samples,
        Err(err) => {
            return vec![(
                UnitId {
                    file: file.to_string(),
                    channel: None,
                },
                Err(err),
            )]
        }
    };
    debug!(file, rows = samples.rows(), "decoded acquisition");

    (0..CHANNELS)
        .into_par_iter()
        .map(|channel| {
            let unit = UnitId {
                file: file.to_string(),
                channel: Some(channel),
            };
            (unit, process_channel(config, file, &samples, channel))
        })
        .collect()
}

fn process_channel(
    config: &BatchConfig,
    file: &str,
    samples: &SampleMatrix,
    channel: usize,
) -> Result<(), PipelineError> {
    // This task owns its copy of the column for its whole lifetime.
    let raw = samples.channel(channel);

    // The raw dump is the channel as decoded, before any repair.
    if config.save_raw {
        let path = config.output_dir.join(format!("{file}_{channel}_raw.csv"));
        write_raw_column(&raw, &path)?;
    }

    let cleaned = despike::despike_i16(&raw, &config.despike)?;

    let widened: Vec<f64> = cleaned.iter().map(|&v| f64::from(v)).collect();
    let spec = spectrogram::compute_spectrogram(&widened, config.sample_rate, &config.spectrogram)?;

    if config.save_spec {
        let artifact = AugmentedMatrix::encode(&spec.freqs, &spec.times, &spec.power);
        let path = config.output_dir.join(format!("{file}_{channel}_spec.csv"));
        artifact.write_csv(&path)?;
    }
    Ok(())
}

/// One sample per line.
fn write_raw_column(samples: &[i16], path: &Path) -> Result<(), PipelineError> {
    let mut text = String::with_capacity(samples.len() * 7);
    for v in samples {
        let _ = writeln!(text, "{v}");
    }
    fs::write(path, text).context(IoSnafu { path })
}

/// Stitch persisted artifacts for one channel into a single matrix.
///
/// `paths` must already be in chronological order; each file name
/// carries the segment's start timestamp. Runs strictly after the
/// parallel phase, over artifacts that completed.
pub fn stitch_channel_files(paths: &[PathBuf]) -> Result<AugmentedMatrix, PipelineError> {
    let mut artifacts = Vec::with_capacity(paths.len());
    for path in paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let start = stitch::parse_start_time(name)?;
        let matrix = AugmentedMatrix::read_csv(path)?;
        artifacts.push(Artifact { start, matrix });
    }
    Ok(stitch::stitch(&artifacts)?)
}
