//! Shared fixtures for the opusbench-decode integration tests.

#![allow(dead_code, clippy::unwrap_used)] // Not every test file uses every fixture

use std::collections::{HashMap, VecDeque};
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use opusbench_core::{Error, IoOperation, Result, TickRate};
use opusbench_decode::{
    BackingStore, DecoderBackend, DecoderFault, FileStat, Host, StorageHandle, StorageProvider,
    StreamDecoder,
};
use symphonia::core::checksum::Crc32;
use symphonia::core::io::Monitor;

/// Encode 16-bit PCM as a WAV file in memory.
pub fn wav_bytes(
    sample_rate: u32,
    channels: u16,
    frames: usize,
    sample: impl Fn(usize, u16) -> i16,
) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for frame in 0..frames {
            for channel in 0..channels {
                writer.write_sample(sample(frame, channel)).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

/// Two seconds of 48 kHz stereo silence.
pub fn silence_wav() -> Vec<u8> {
    wav_bytes(48_000, 2, 96_000, |_, _| 0)
}

/// Frames per channel in one 20 ms Opus packet at 48 kHz.
pub const OPUS_PACKET_FRAMES: usize = 960;

/// Build an Ogg Opus stream of silent 20 ms packets.
///
/// Each packet is a bare TOC byte (CELT fullband, 20 ms, one frame) with no
/// payload, which libopus decodes as 960 frames of silence. Pre-skip is zero
/// and every granule position is exact, so the decoded length equals the
/// length declared by the final page.
pub fn ogg_opus_silence(channels: u8, packets_per_page: usize, pages: usize) -> Vec<u8> {
    assert!(channels == 1 || channels == 2);
    assert!(packets_per_page < 256);
    let toc = if channels == 2 { 0xFC } else { 0xF8 };

    let mut head = b"OpusHead".to_vec();
    head.push(1);
    head.push(channels);
    head.extend_from_slice(&0u16.to_le_bytes());
    head.extend_from_slice(&48_000u32.to_le_bytes());
    head.extend_from_slice(&0u16.to_le_bytes());
    head.push(0);

    let vendor = b"opusbench";
    let mut tags = b"OpusTags".to_vec();
    tags.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    tags.extend_from_slice(vendor);
    tags.extend_from_slice(&0u32.to_le_bytes());

    let mut out = Vec::new();
    out.extend(ogg_page(0x02, 0, 0, &[head]));
    out.extend(ogg_page(0x00, 0, 1, &[tags]));
    for page in 0..pages {
        let flags = if page + 1 == pages { 0x04 } else { 0x00 };
        let granule = ((page + 1) * packets_per_page * OPUS_PACKET_FRAMES) as u64;
        let packets = vec![vec![toc]; packets_per_page];
        out.extend(ogg_page(flags, granule, page as u32 + 2, &packets));
    }
    out
}

fn ogg_page(flags: u8, granule: u64, sequence: u32, packets: &[Vec<u8>]) -> Vec<u8> {
    let mut lacing = Vec::new();
    for packet in packets {
        lacing.extend(std::iter::repeat(255u8).take(packet.len() / 255));
        lacing.push((packet.len() % 255) as u8);
    }
    assert!(lacing.len() < 256);

    let mut page = b"OggS".to_vec();
    page.push(0);
    page.push(flags);
    page.extend_from_slice(&granule.to_le_bytes());
    page.extend_from_slice(&0x6f70_7573u32.to_le_bytes());
    page.extend_from_slice(&sequence.to_le_bytes());
    page.extend_from_slice(&[0; 4]);
    page.push(lacing.len() as u8);
    page.extend_from_slice(&lacing);
    for packet in packets {
        page.extend_from_slice(packet);
    }

    let mut crc = Crc32::new(0);
    crc.process_buf_bytes(&page);
    page[22..26].copy_from_slice(&crc.crc().to_le_bytes());
    page
}

/// Counters shared between a fixture and the test that inspects it.
#[derive(Debug, Clone, Default)]
pub struct Counters {
    pub opens: Arc<AtomicUsize>,
    pub closes: Arc<AtomicUsize>,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Storage provider over in-memory files that counts opens and closes.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    files: HashMap<PathBuf, Vec<u8>>,
    pub counters: Counters,
}

impl MemStorage {
    pub fn with_file(path: impl Into<PathBuf>, data: Vec<u8>) -> Self {
        let mut storage = Self::default();
        storage.files.insert(path.into(), data);
        storage
    }
}

impl StorageProvider for MemStorage {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        self.files
            .get(path)
            .map(|data| FileStat {
                size: data.len() as u64,
            })
            .ok_or_else(|| Error::Io {
                operation: IoOperation::Stat,
                message: format!("{} not found", path.display()),
            })
    }

    fn open(&self, path: &Path) -> Result<Box<dyn StorageHandle>> {
        let data = self.files.get(path).ok_or_else(|| Error::Io {
            operation: IoOperation::Open,
            message: format!("{} not found", path.display()),
        })?;
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemHandle {
            inner: Cursor::new(data.clone()),
            closes: self.counters.closes.clone(),
        }))
    }
}

struct MemHandle {
    inner: Cursor<Vec<u8>>,
    closes: Arc<AtomicUsize>,
}

impl StorageHandle for MemHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.inner
            .read(buf)
            .map_err(|e| Error::io(IoOperation::Read, &e))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.inner
            .seek(pos)
            .map_err(|e| Error::io(IoOperation::Seek, &e))
    }

    fn tell(&mut self) -> Result<u64> {
        Ok(self.inner.position())
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// One step of a scripted decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// A packet of this many frames.
    Frames(usize),
    /// A decode failure with this code.
    Fail(i32),
}

/// Decoder backend that replays a script instead of decoding real audio.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    pub script: Vec<Step>,
    pub sample_rate: u32,
    pub channels: u16,
    pub open_fault: Option<DecoderFault>,
    pub opens: Arc<AtomicUsize>,
    pub releases: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Step>) -> Self {
        Self {
            script,
            sample_rate: 48_000,
            channels: 2,
            open_fault: None,
            opens: Arc::default(),
            releases: Arc::default(),
        }
    }

    pub fn failing_open(fault: DecoderFault) -> Self {
        Self {
            open_fault: Some(fault),
            ..Self::new(Vec::new())
        }
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DecoderBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn open(&self, store: BackingStore) -> std::result::Result<Box<dyn StreamDecoder>, DecoderFault> {
        if let Some(fault) = &self.open_fault {
            return Err(fault.clone());
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedDecoder {
            _store: store,
            steps: self.script.iter().copied().collect(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            produced: 0,
            releases: self.releases.clone(),
        }))
    }
}

struct ScriptedDecoder {
    _store: BackingStore,
    steps: VecDeque<Step>,
    sample_rate: u32,
    channels: u16,
    produced: usize,
    releases: Arc<AtomicUsize>,
}

impl StreamDecoder for ScriptedDecoder {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn read_frames(&mut self, out: &mut [f32]) -> std::result::Result<usize, DecoderFault> {
        let channels = usize::from(self.channels);
        let capacity = out.len() / channels;
        match self.steps.pop_front() {
            None => Ok(0),
            Some(Step::Fail(code)) => Err(DecoderFault::new(code, "scripted failure")),
            Some(Step::Frames(frames)) => {
                let n = frames.min(capacity);
                if n < frames {
                    self.steps.push_front(Step::Frames(frames - n));
                }
                for (i, sample) in out[..n * channels].iter_mut().enumerate() {
                    #[allow(clippy::cast_precision_loss)]
                    {
                        *sample = (self.produced * channels + i) as f32;
                    }
                }
                self.produced += n;
                Ok(n)
            }
        }
    }
}

impl Drop for ScriptedDecoder {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

/// Host that records everything the engine asks of it.
#[derive(Debug, Default)]
pub struct RecordingHost {
    pub lines: Vec<(String, i32, i32)>,
    pub clears: usize,
    pub tick_rate: Option<TickRate>,
}

impl RecordingHost {
    /// Text drawn since the last clear.
    pub fn screen(&self) -> Vec<&str> {
        self.lines.iter().map(|(text, _, _)| text.as_str()).collect()
    }
}

impl Host for RecordingHost {
    fn clear(&mut self) {
        self.clears += 1;
        self.lines.clear();
    }

    fn draw_text(&mut self, text: &str, x: i32, y: i32) {
        self.lines.push((text.to_string(), x, y));
    }

    fn set_tick_rate(&mut self, rate: TickRate) {
        self.tick_rate = Some(rate);
    }
}
