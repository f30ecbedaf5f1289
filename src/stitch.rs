//! Multi-file time alignment
//!
//! Sequential recordings arrive as separate files whose names carry the
//! recording start time (`YYYY_MM_DD_HH_MM_SS`, with an arbitrary suffix
//! such as `.bin_3_spec.csv`). Stitching concatenates their per-channel
//! artifacts along the time axis, shifting each segment's time header by
//! its start offset relative to the first segment.
//!
//! Artifacts must share an identical frequency axis; this is checked
//! explicitly rather than trusting the inputs. Ordering and overlap are
//! the caller's responsibility: the stitcher neither sorts nor
//! deduplicates.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::{
    AlignmentError, BadCalendarSnafu, FrequencyAxisMismatchSnafu, FrequencyBinCountSnafu,
    NameFormatError, NoArtifactsSnafu, NoTimestampSnafu,
};
use crate::matrix::AugmentedMatrix;

/// Length of the `YYYY_MM_DD_HH_MM_SS` group
const GROUP_LEN: usize = 19;

/// One persisted per-file artifact with its parsed start time.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Recording start time parsed from the source name
    pub start: NaiveDateTime,
    /// The persisted augmented matrix
    pub matrix: AugmentedMatrix,
}

fn is_timestamp_group(window: &[u8]) -> bool {
    window.iter().enumerate().all(|(i, &b)| match i {
        4 | 7 | 10 | 13 | 16 => b == b'_',
        _ => b.is_ascii_digit(),
    })
}

fn digits(window: &[u8]) -> u32 {
    window
        .iter()
        .fold(0, |acc, &b| acc * 10 + u32::from(b - b'0'))
}

/// Extract the recording start time from a source name.
///
/// Scans for the first `YYYY_MM_DD_HH_MM_SS` digit group anywhere in the
/// name; anything before or after it is ignored. A name without such a
/// group, or one whose fields do not form a calendar time, is a
/// [`NameFormatError`].
pub fn parse_start_time(name: &str) -> Result<NaiveDateTime, NameFormatError> {
    let bytes = name.as_bytes();
    if bytes.len() >= GROUP_LEN {
        for start in 0..=bytes.len() - GROUP_LEN {
            let window = &bytes[start..start + GROUP_LEN];
            if !is_timestamp_group(window) {
                continue;
            }
            let year = digits(&window[0..4]) as i32;
            let month = digits(&window[5..7]);
            let day = digits(&window[8..10]);
            let hour = digits(&window[11..13]);
            let minute = digits(&window[14..16]);
            let second = digits(&window[17..19]);

            return NaiveDate::from_ymd_opt(year, month, day)
                .and_then(|d| d.and_hms_opt(hour, minute, second))
                .ok_or_else(|| BadCalendarSnafu { name }.build());
        }
    }
    NoTimestampSnafu { name }.fail()
}

/// Stitch sequential artifacts for one channel into a single matrix.
///
/// The first artifact's start time anchors the combined time axis; each
/// later artifact's time header is shifted by its whole-second offset
/// from the anchor before its columns are appended. The frequency
/// column comes from the first artifact alone.
pub fn stitch(artifacts: &[Artifact]) -> Result<AugmentedMatrix, AlignmentError> {
    let Some(first) = artifacts.first() else {
        return NoArtifactsSnafu.fail();
    };

    let reference = first.matrix.freqs();
    for (index, artifact) in artifacts.iter().enumerate().skip(1) {
        let axis = artifact.matrix.freqs();
        snafu::ensure!(
            axis.len() == reference.len(),
            FrequencyBinCountSnafu {
                index,
                got: axis.len(),
                expected: reference.len(),
            }
        );
        if let Some(bin) = axis.iter().zip(&reference).position(|(a, b)| a != b) {
            return FrequencyAxisMismatchSnafu { index, bin }.fail();
        }
    }

    let mut combined = first.matrix.clone();
    for artifact in &artifacts[1..] {
        let offset = artifact
            .start
            .signed_duration_since(first.start)
            .num_seconds() as f64;
        let mut segment = artifact.matrix.clone();
        segment.shift_times(offset);
        combined.append_time_columns(&segment);
    }

    debug!(
        segments = artifacts.len(),
        time_bins = combined.time_bins(),
        "stitched recording"
    );
    Ok(combined)
}
