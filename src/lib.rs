//! Offline processing pipeline for multi-channel acoustic logger
//! recordings: binary acquisition decoding, sliding-window despiking,
//! log-power spectrograms, self-describing CSV artifacts, and
//! timestamp-driven stitching of sequential recordings.

pub mod analysis;
pub mod batch;
pub mod decode;
pub mod despike;
pub mod error;
pub mod matrix;
pub mod spectrogram;
mod stats;
pub mod stitch;
#[cfg(test)]
mod tracing_init;

pub use batch::{run_batch, BatchConfig, BatchReport, UnitId};
pub use decode::{read_acquisition, SampleMatrix};
pub use despike::{despike, despike_i16, DespikeConfig, Detrend, Pad};
pub use error::PipelineError;
pub use matrix::AugmentedMatrix;
pub use spectrogram::{compute_spectrogram, Spectrogram, SpectrogramConfig};
pub use stitch::{parse_start_time, stitch, Artifact};
