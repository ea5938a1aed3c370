//! One decode pass over one backing store, advanced a slice at a time.

use std::time::Duration;

use opusbench_core::{DecodeSummary, Error, Result, SessionFailure, StoreKind};
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::decoder::{DecoderBackend, ScratchBuffer, StreamDecoder};
use crate::store::BackingStore;

/// Default scratch capacity: 120 ms at 48 kHz, the longest Opus packet.
pub const DEFAULT_SCRATCH_FRAMES: usize = 5760;

/// Outcome of one [`DecodeSession::decode_slice`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceResult {
    /// `n` samples per channel were decoded; keep ticking.
    Progress(usize),
    /// Clean end of stream.
    Finished,
}

/// Mutable state of one decode pass.
///
/// Owns the decoder, which in turn owns the backing store. [`close`](Self::close)
/// consumes the session; dropping it releases the same resources.
pub struct DecodeSession {
    store_kind: StoreKind,
    decoder: Box<dyn StreamDecoder>,
    scratch: ScratchBuffer,
    total_samples_decoded: u64,
    total_decode_time: Duration,
}

impl DecodeSession {
    /// Open a decoder over `store`.
    ///
    /// On failure everything opened so far, the store included, has been released.
    pub fn open(
        store: BackingStore,
        backend: &dyn DecoderBackend,
        scratch_frames: usize,
    ) -> Result<Self> {
        if scratch_frames == 0 {
            return Err(Error::Config("scratch buffer needs room for at least one frame".into()));
        }
        if store.is_empty() {
            return Err(Error::InvalidStore("backing store is empty".to_string()));
        }

        let store_kind = store.kind();
        debug!(
            "Opening {} decoder over {} bytes ({})",
            backend.name(),
            store.len(),
            store_kind
        );

        let decoder = backend.open(store).map_err(|fault| fault.into_open_error())?;
        let scratch = ScratchBuffer::new(scratch_frames, decoder.channels());

        Ok(Self {
            store_kind,
            decoder,
            scratch,
            total_samples_decoded: 0,
            total_decode_time: Duration::ZERO,
        })
    }

    /// Run exactly one decode call into the scratch buffer, timing it with `clock`.
    pub fn decode_slice(&mut self, clock: &mut dyn Clock) -> Result<SliceResult> {
        clock.reset();
        let result = self.decoder.read_frames(self.scratch.writable());
        let elapsed = clock.elapsed();

        match result {
            Ok(0) => {
                self.scratch.clear();
                debug!(
                    "End of stream after {} samples",
                    self.total_samples_decoded
                );
                Ok(SliceResult::Finished)
            }
            Ok(frames) => {
                self.scratch
                    .set_filled(frames, usize::from(self.decoder.channels()));
                self.total_samples_decoded += frames as u64;
                self.total_decode_time += elapsed;
                trace!("Decoded {} samples in {:?}", frames, elapsed);
                Ok(SliceResult::Progress(frames))
            }
            Err(fault) => {
                self.scratch.clear();
                Err(fault.into_decode_error())
            }
        }
    }

    /// Release the decoder and the backing store.
    pub fn close(self) {
        debug!(
            "Closing {} session after {} samples",
            self.store_kind, self.total_samples_decoded
        );
        drop(self);
    }

    /// Summary statistics for the samples decoded so far.
    pub fn summary(&self) -> DecodeSummary {
        DecodeSummary::compute(
            self.store_kind,
            self.total_samples_decoded,
            self.decoder.declared_frames(),
            self.decoder.sample_rate(),
            self.decoder.channels(),
            self.total_decode_time,
        )
    }

    /// Wrap `error` with this session's counters.
    pub fn failure(&self, error: Error) -> SessionFailure {
        SessionFailure {
            error,
            store_kind: self.store_kind,
            samples_decoded: self.total_samples_decoded,
            decode_time: self.total_decode_time,
        }
    }

    pub const fn store_kind(&self) -> StoreKind {
        self.store_kind
    }

    pub fn sample_rate(&self) -> u32 {
        self.decoder.sample_rate()
    }

    pub fn channels(&self) -> u16 {
        self.decoder.channels()
    }

    pub const fn total_samples_decoded(&self) -> u64 {
        self.total_samples_decoded
    }

    pub const fn total_decode_time(&self) -> Duration {
        self.total_decode_time
    }

    /// Samples produced by the latest slice, interleaved.
    pub fn last_samples(&self) -> &[f32] {
        self.scratch.samples()
    }

    pub fn scratch_capacity_frames(&self) -> usize {
        self.scratch.capacity_frames()
    }
}

impl std::fmt::Debug for DecodeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeSession")
            .field("store_kind", &self.store_kind)
            .field("total_samples_decoded", &self.total_samples_decoded)
            .field("total_decode_time", &self.total_decode_time)
            .finish_non_exhaustive()
    }
}
