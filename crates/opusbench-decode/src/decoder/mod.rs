//! The seam between a decode session and the decoding library.
//!
//! A [`DecoderBackend`] turns a [`BackingStore`] into a [`StreamDecoder`]; the
//! stream decoder then fills caller-provided PCM buffers one call at a time.

use std::fmt;

use opusbench_core::Error;

use crate::store::BackingStore;

mod symphonia_backend;

pub use symphonia_backend::SymphoniaBackend;

/// Numeric decoder error codes. Negative, following libopusfile where it has one.
pub mod codes {
    /// The backing store failed to deliver bytes.
    pub const READ: i32 = -128;
    /// Internal decoder fault or resource limit.
    pub const FAULT: i32 = -129;
    /// The stream uses a feature the decoder does not implement.
    pub const UNIMPLEMENTED: i32 = -130;
    /// Invalid argument, e.g. an output buffer with no room for a frame.
    pub const INVALID: i32 = -131;
    /// The data is not in a recognised container format.
    pub const NOT_FORMAT: i32 = -132;
    /// The stream header is malformed.
    pub const BAD_HEADER: i32 = -133;
    /// A packet failed to decode.
    pub const BAD_PACKET: i32 = -136;
    /// A seek inside the backing store failed.
    pub const NO_SEEK: i32 = -138;
    /// The container holds no decodable audio track.
    pub const NO_AUDIO_TRACK: i32 = -140;
    /// The decoder must be reset before decoding can continue.
    pub const RESET_REQUIRED: i32 = -141;
}

/// A decoding-library failure: a negative code plus a description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderFault {
    pub code: i32,
    pub message: String,
}

impl DecoderFault {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// The fault as raised while opening a stream.
    pub fn into_open_error(self) -> Error {
        Error::DecoderOpen {
            code: self.code,
            message: self.message,
        }
    }

    /// The fault as raised while decoding a slice.
    pub fn into_decode_error(self) -> Error {
        Error::Decode {
            code: self.code,
            message: self.message,
        }
    }
}

impl fmt::Display for DecoderFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.code, self.message)
    }
}

impl std::error::Error for DecoderFault {}

/// An open, pull-style PCM decoder.
///
/// Dropping the decoder releases it along with the backing store it owns.
pub trait StreamDecoder: Send {
    /// Native sample rate in Hz.
    fn sample_rate(&self) -> u32;

    fn channels(&self) -> u16;

    /// Per-channel sample count announced by the stream header, if any.
    fn declared_frames(&self) -> Option<u64> {
        None
    }

    /// Decode into `out` as interleaved f32 samples.
    ///
    /// Writes at most `out.len() / channels` frames and returns how many were
    /// written. Returns `Ok(0)` only at end of stream. Audio that does not fit
    /// is kept for the next call.
    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize, DecoderFault>;
}

/// Factory for [`StreamDecoder`]s.
pub trait DecoderBackend {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Open a decoder that reads from `store`.
    ///
    /// On failure the store is dropped, which releases any handle it holds.
    fn open(&self, store: BackingStore) -> Result<Box<dyn StreamDecoder>, DecoderFault>;
}

/// Interleaved sample storage reused across decode slices.
///
/// The allocation is made once, when the session opens.
#[derive(Debug, Clone)]
pub struct ScratchBuffer {
    samples: Box<[f32]>,
    channels: usize,
    filled_frames: usize,
}

impl ScratchBuffer {
    /// Room for `capacity_frames` frames of `channels` interleaved samples.
    pub fn new(capacity_frames: usize, channels: u16) -> Self {
        let channels = usize::from(channels).max(1);
        Self {
            samples: vec![0.0; capacity_frames * channels].into_boxed_slice(),
            channels,
            filled_frames: 0,
        }
    }

    pub fn capacity_frames(&self) -> usize {
        self.samples.len() / self.channels
    }

    pub const fn channels(&self) -> usize {
        self.channels
    }

    /// Frames written by the most recent decode.
    pub const fn frames(&self) -> usize {
        self.filled_frames
    }

    /// Interleaved samples written by the most recent decode.
    pub fn samples(&self) -> &[f32] {
        &self.samples[..self.filled_frames * self.channels]
    }

    pub fn is_empty(&self) -> bool {
        self.filled_frames == 0
    }

    /// Hand the whole buffer to a decoder.
    pub(crate) fn writable(&mut self) -> &mut [f32] {
        &mut self.samples
    }

    /// Record how many frames the decoder wrote, with `channels` samples each.
    pub(crate) fn set_filled(&mut self, frames: usize, channels: usize) {
        let channels = channels.max(1);
        // A decoder may report a channel count other than the one the buffer was laid out for.
        self.channels = channels;
        self.filled_frames = frames.min(self.samples.len() / channels);
    }

    pub(crate) fn clear(&mut self) {
        self.filled_frames = 0;
    }
}
