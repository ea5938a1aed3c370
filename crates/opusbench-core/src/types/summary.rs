//! Benchmark results.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use super::StoreKind;
use crate::Error;

/// Statistics for one completed decode session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecodeSummary {
    /// Which backing store fed the decoder.
    pub store_kind: StoreKind,
    /// Samples decoded, counted per channel.
    pub samples_decoded: u64,
    /// Sample count the stream header announced, if it did.
    pub declared_samples: Option<u64>,
    /// Native sample rate of the stream in Hz.
    pub sample_rate: u32,
    /// Number of channels.
    pub channels: u16,
    /// Audio duration represented by the decoded samples.
    pub duration_secs: f64,
    /// Wall-clock time spent inside decode calls.
    pub decode_secs: f64,
    /// Decoded duration over decode time. Above 1.0 means faster than real time.
    /// Zero when no decode time was measured.
    pub speed_ratio: f64,
}

impl DecodeSummary {
    /// Derive duration and speed from the session counters.
    #[allow(clippy::cast_precision_loss)]
    pub fn compute(
        store_kind: StoreKind,
        samples_decoded: u64,
        declared_samples: Option<u64>,
        sample_rate: u32,
        channels: u16,
        decode_time: Duration,
    ) -> Self {
        let duration_secs = if sample_rate == 0 {
            0.0
        } else {
            samples_decoded as f64 / f64::from(sample_rate)
        };
        let decode_secs = decode_time.as_secs_f64();
        let speed_ratio = if decode_secs > 0.0 {
            duration_secs / decode_secs
        } else {
            0.0
        };

        Self {
            store_kind,
            samples_decoded,
            declared_samples,
            sample_rate,
            channels,
            duration_secs,
            decode_secs,
            speed_ratio,
        }
    }

    /// Text lines for the display, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("Duration: {} samples", self.samples_decoded),
            format!("Took {:.6} seconds.", self.decode_secs),
            format!(
                "Speed: {:.2}x realtime ({})",
                self.speed_ratio, self.store_kind
            ),
        ]
    }
}

impl fmt::Display for DecodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.lines().join("\n"))
    }
}

/// A session that ended in an error, with the counters it reached.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFailure {
    pub error: Error,
    pub store_kind: StoreKind,
    /// Samples decoded before the failure.
    pub samples_decoded: u64,
    /// Decode time accumulated before the failure.
    pub decode_time: Duration,
}

impl SessionFailure {
    /// A failure before any decoding happened.
    pub const fn at_open(error: Error, store_kind: StoreKind) -> Self {
        Self {
            error,
            store_kind,
            samples_decoded: 0,
            decode_time: Duration::ZERO,
        }
    }
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} after {} samples ({})",
            self.error, self.samples_decoded, self.store_kind
        )
    }
}
