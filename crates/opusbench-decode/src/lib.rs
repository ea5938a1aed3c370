//! # opusbench-decode
//!
//! Frame-sliced audio decoding with pluggable I/O.
//!
//! Features:
//! - Backing stores over a memory buffer or a seekable file handle
//! - Decode sessions that do one bounded decode call per tick
//! - A tick-driven state machine that times decoding and reports throughput

pub mod clock;
pub mod decoder;
pub mod engine;
pub mod session;
pub mod store;

pub use clock::{Clock, FixedClock, MonotonicClock};
pub use decoder::{codes, DecoderBackend, DecoderFault, ScratchBuffer, StreamDecoder, SymphoniaBackend};
pub use engine::{BenchEngine, BenchEvent, EngineSettings, Host, SessionState, INSTRUCTIONS};
pub use session::{DecodeSession, SliceResult, DEFAULT_SCRATCH_FRAMES};
pub use store::{
    BackingStore, FileStat, FileSystem, MemoryBuffer, SeekableHandle, StorageHandle,
    StorageProvider,
};
