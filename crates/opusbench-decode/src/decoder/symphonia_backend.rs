//! Decoding backend using symphonia.

use symphonia::core::{
    audio::SampleBuffer,
    codecs::{CodecRegistry, Decoder, DecoderOptions, CODEC_TYPE_NULL},
    errors::Error as SymphoniaError,
    formats::{FormatOptions, FormatReader},
    io::{MediaSourceStream, MediaSourceStreamOptions},
    meta::MetadataOptions,
    probe::Hint,
};
use tracing::{debug, trace};

use super::{codes, DecoderBackend, DecoderFault, StreamDecoder};
use crate::store::BackingStore;

/// Codec registry with every codec symphonia was built with, plus libopus when enabled.
#[cfg(feature = "opus")]
fn codec_registry() -> &'static CodecRegistry {
    use std::sync::OnceLock;
    use symphonia_adapter_libopus::OpusDecoder;

    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<OpusDecoder>();
        symphonia::default::register_enabled_codecs(&mut registry);
        registry
    })
}

#[cfg(not(feature = "opus"))]
fn codec_registry() -> &'static CodecRegistry {
    symphonia::default::get_codecs()
}

/// Where in the session a symphonia error happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Open,
    Decode,
}

/// Map a symphonia error onto a decoder fault code.
fn fault(stage: Stage, err: &SymphoniaError) -> DecoderFault {
    let code = match err {
        SymphoniaError::IoError(_) => codes::READ,
        SymphoniaError::DecodeError(_) => match stage {
            Stage::Open => codes::BAD_HEADER,
            Stage::Decode => codes::BAD_PACKET,
        },
        SymphoniaError::SeekError(_) => codes::NO_SEEK,
        SymphoniaError::Unsupported(_) => match stage {
            Stage::Open => codes::NOT_FORMAT,
            Stage::Decode => codes::UNIMPLEMENTED,
        },
        SymphoniaError::LimitError(_) => codes::FAULT,
        SymphoniaError::ResetRequired => codes::RESET_REQUIRED,
    };
    DecoderFault::new(code, err.to_string())
}

/// Opens symphonia decoders over backing stores.
#[derive(Debug, Clone, Default)]
pub struct SymphoniaBackend {
    extension: Option<String>,
}

impl SymphoniaBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a file extension (e.g. `"opus"`) as a format hint when probing.
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            extension: Some(extension.into()),
        }
    }
}

impl DecoderBackend for SymphoniaBackend {
    fn name(&self) -> &str {
        "symphonia"
    }

    fn open(&self, store: BackingStore) -> Result<Box<dyn StreamDecoder>, DecoderFault> {
        let decoder = SymphoniaDecoder::open(store, self.extension.as_deref())?;
        Ok(Box::new(decoder))
    }
}

/// A symphonia format reader and codec decoder for one audio track.
struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
    declared_frames: Option<u64>,
    /// Last decoded packet, interleaved.
    pending: Option<SampleBuffer<f32>>,
    /// Samples of `pending` already handed out.
    pending_offset: usize,
}

impl SymphoniaDecoder {
    fn open(store: BackingStore, extension: Option<&str>) -> Result<Self, DecoderFault> {
        let kind = store.kind();
        let mss = MediaSourceStream::new(Box::new(store), MediaSourceStreamOptions::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let metadata_opts = MetadataOptions::default();

        let opened = symphonia::default::get_probe()
            .format(&hint, mss, &format_opts, &metadata_opts)
            .map_err(|e| fault(Stage::Open, &e))?;

        let format = opened.format;

        // Find the first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| DecoderFault::new(codes::NO_AUDIO_TRACK, "No audio tracks found"))?;

        let track_id = track.id;
        let sample_rate = track.codec_params.sample_rate.unwrap_or(48000);
        #[allow(clippy::cast_possible_truncation)]
        let channels = track.codec_params.channels.map_or(2, |c| c.count() as u16);
        let declared_frames = track.codec_params.n_frames;

        debug!(
            "Audio track: id={}, sample_rate={}, channels={}, frames={:?}, store={}",
            track_id, sample_rate, channels, declared_frames, kind
        );

        let decoder = codec_registry()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| fault(Stage::Open, &e))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            declared_frames,
            pending: None,
            pending_offset: 0,
        })
    }

    /// Decode the next non-empty packet into `pending`. Returns false at end of stream.
    fn decode_packet(&mut self) -> Result<bool, DecoderFault> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(false); // End of stream
                }
                Err(e) => return Err(fault(Stage::Decode, &e)),
            };

            // Skip packets for other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = self
                .decoder
                .decode(&packet)
                .map_err(|e| fault(Stage::Decode, &e))?;

            if decoded.frames() == 0 {
                trace!("Skipping empty packet at ts={}", packet.ts());
                continue;
            }

            let spec = *decoded.spec();
            let needed = decoded.frames() * spec.channels.count();
            let reusable = self
                .pending
                .as_ref()
                .is_some_and(|buffer| buffer.capacity() >= needed);
            if !reusable {
                trace!("Allocating sample buffer for {} frames", decoded.capacity());
                self.pending = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(buffer) = self.pending.as_mut() {
                buffer.copy_interleaved_ref(decoded);
            }

            #[allow(clippy::cast_possible_truncation)]
            {
                self.channels = spec.channels.count() as u16;
            }
            self.pending_offset = 0;
            return Ok(true);
        }
    }
}

impl StreamDecoder for SymphoniaDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn declared_frames(&self) -> Option<u64> {
        self.declared_frames
    }

    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize, DecoderFault> {
        loop {
            let channels = usize::from(self.channels).max(1);
            let capacity = out.len() / channels;
            if capacity == 0 {
                return Err(DecoderFault::new(
                    codes::INVALID,
                    format!("output buffer of {} samples holds no frame", out.len()),
                ));
            }

            if let Some(pending) = &self.pending {
                let remaining = &pending.samples()[self.pending_offset.min(pending.len())..];
                if !remaining.is_empty() {
                    let n = remaining.len().min(capacity * channels);
                    out[..n].copy_from_slice(&remaining[..n]);
                    self.pending_offset += n;
                    return Ok(n / channels);
                }
            }

            if !self.decode_packet()? {
                return Ok(0);
            }
        }
    }
}
