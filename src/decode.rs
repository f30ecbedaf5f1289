//! Acquisition dump decoding
//!
//! Parses raw dumps written by the 6-channel hardware logger.
//!
//! **Binary format**:
//! - 64-byte header (skipped)
//! - little-endian 16-bit signed samples
//! - framed in blocks of 32 words; the first 2 words of each block are
//!   reserved sync words and dropped
//! - the remaining 30 words per block are regrouped, in order, into rows
//!   of 6 channel values (5 samples per channel per block)

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use snafu::ResultExt;
use tracing::debug;

use crate::error::{
    FormatError, IoSnafu, PipelineError, RaggedFramesSnafu, RaggedRowsSnafu,
};

/// Header length in bytes, skipped before the sample payload
pub const HEADER_LEN: usize = 64;

/// Words per frame in the raw payload
pub const FRAME_WORDS: usize = 32;

/// Reserved sync words dropped from the start of each frame
pub const SYNC_WORDS: usize = 2;

/// Channels per sample row
pub const CHANNELS: usize = 6;

/// Words kept per frame after the sync words are dropped
const KEPT_WORDS: usize = FRAME_WORDS - SYNC_WORDS;

/// Frame size in bytes (16-bit words)
const FRAME_BYTES: usize = FRAME_WORDS * 2;

/// Time-ordered integer samples, one fixed-width row per instant.
///
/// Rows and channel count are exact results of the decode transform;
/// there are no ragged rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleMatrix {
    rows: usize,
    data: Vec<i16>,
}

impl SampleMatrix {
    /// Number of sample rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// One row of 6 channel values.
    pub fn row(&self, r: usize) -> &[i16] {
        &self.data[r * CHANNELS..(r + 1) * CHANNELS]
    }

    /// Copy one channel column out as an independent 1-D signal.
    ///
    /// The copy gives each (file, channel) task exclusive ownership of
    /// its buffer for the task's whole lifetime.
    ///
    /// # Panics
    /// Panics when `channel >= CHANNELS`.
    pub fn channel(&self, channel: usize) -> Vec<i16> {
        assert!(channel < CHANNELS, "channel index out of range");
        self.data[channel..]
            .iter()
            .step_by(CHANNELS)
            .copied()
            .collect()
    }
}

/// Decode the post-header payload bytes into a [`SampleMatrix`].
///
/// An empty payload decodes to an empty matrix; a payload that does not
/// divide into whole frames, or whose retained samples do not fill whole
/// channel rows, is a [`FormatError`].
pub fn decode_frames(payload: &[u8]) -> Result<SampleMatrix, FormatError> {
    snafu::ensure!(
        payload.len() % FRAME_BYTES == 0,
        RaggedFramesSnafu { len: payload.len() }
    );

    let frames = payload.len() / FRAME_BYTES;
    let retained = frames * KEPT_WORDS;
    // 30 % 6 == 0, so this cannot trip for the documented format; the
    // shape contract is still checked explicitly.
    snafu::ensure!(retained % CHANNELS == 0, RaggedRowsSnafu { retained });

    let mut data = Vec::with_capacity(retained);
    for frame in payload.chunks_exact(FRAME_BYTES) {
        for word in frame[SYNC_WORDS * 2..].chunks_exact(2) {
            data.push(i16::from_le_bytes([word[0], word[1]]));
        }
    }

    debug!(frames, rows = retained / CHANNELS, "decoded payload");
    Ok(SampleMatrix {
        rows: retained / CHANNELS,
        data,
    })
}

/// Read one acquisition file from disk and decode it.
///
/// Seeks past the fixed header and streams the payload through a buffered
/// reader rather than loading the header or mapping the file eagerly.
pub fn read_acquisition(path: &Path) -> Result<SampleMatrix, PipelineError> {
    let file = File::open(path).context(IoSnafu { path })?;
    let mut reader = BufReader::new(file);
    reader
        .seek(SeekFrom::Start(HEADER_LEN as u64))
        .context(IoSnafu { path })?;

    let mut payload = Vec::new();
    reader
        .read_to_end(&mut payload)
        .context(IoSnafu { path })?;

    Ok(decode_frames(&payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a payload of `frames` frames whose words count up from 0.
    fn sequential_payload(frames: usize) -> Vec<u8> {
        let mut payload = Vec::with_capacity(frames * FRAME_BYTES);
        for word in 0..(frames * FRAME_WORDS) as i16 {
            payload.extend_from_slice(&word.to_le_bytes());
        }
        payload
    }

    #[test]
    fn test_ten_frames_decode_to_fifty_rows() {
        let payload = sequential_payload(10);
        let matrix = decode_frames(&payload).unwrap();
        assert_eq!(matrix.rows(), 50);
        assert_eq!(matrix.row(0).len(), CHANNELS);
    }

    #[test]
    fn test_sync_words_dropped_in_order() {
        let payload = sequential_payload(2);
        let matrix = decode_frames(&payload).unwrap();
        // Frame 0 holds words 0..32; words 0 and 1 are sync and dropped.
        assert_eq!(matrix.row(0), &[2, 3, 4, 5, 6, 7]);
        assert_eq!(matrix.row(4), &[26, 27, 28, 29, 30, 31]);
        // Frame 1 starts at word 32; its sync words 32 and 33 are dropped.
        assert_eq!(matrix.row(5), &[34, 35, 36, 37, 38, 39]);
    }

    #[test]
    fn test_channel_extraction() {
        let payload = sequential_payload(1);
        let matrix = decode_frames(&payload).unwrap();
        // Channel 2 is every 6th retained word starting from the third.
        assert_eq!(matrix.channel(2), vec![4, 10, 16, 22, 28]);
        assert_eq!(matrix.channel(0).len(), matrix.rows());
    }

    #[test]
    fn test_empty_payload_is_empty_matrix() {
        let matrix = decode_frames(&[]).unwrap();
        assert!(matrix.is_empty());
        assert_eq!(matrix.rows(), 0);
    }

    #[test]
    fn test_ragged_payload_rejected() {
        let payload = sequential_payload(3);
        let err = decode_frames(&payload[..payload.len() - 2]).unwrap_err();
        assert!(matches!(err, FormatError::RaggedFrames { .. }));
    }

    #[test]
    fn test_read_acquisition_skips_header() {
        use std::fs;

        let mut bytes = vec![0xAAu8; HEADER_LEN];
        let payload = sequential_payload(4);
        bytes.extend_from_slice(&payload);

        let path = std::env::temp_dir().join(format!(
            "apidictor_decode_{}_2025_01_01_00_00_00.bin",
            std::process::id()
        ));
        fs::write(&path, &bytes).unwrap();

        let from_file = read_acquisition(&path).unwrap();
        let from_payload = decode_frames(&payload).unwrap();
        assert_eq!(from_file, from_payload);

        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err =
            read_acquisition(Path::new("/nonexistent/apidictor.bin")).unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
