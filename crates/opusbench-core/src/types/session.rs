//! Session-level enums shared between the engine and its host.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a session pulls its compressed bytes from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// The whole file is read into memory before decoding starts.
    Memory,
    /// Bytes are pulled from an open file handle as the decoder asks for them.
    Stream,
}

impl StoreKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Stream => "stream",
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input that asks the engine to start a new session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum StartSignal {
    /// Button A: decode from a memory buffer.
    Memory,
    /// Button B: decode through a seekable file handle.
    Stream,
}

impl StartSignal {
    /// The backing store this signal selects.
    pub const fn store_kind(self) -> StoreKind {
        match self {
            Self::Memory => StoreKind::Memory,
            Self::Stream => StoreKind::Stream,
        }
    }
}

/// How often the host should call `tick`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickRate {
    /// Tick as fast as possible.
    Unbounded,
    /// Tick at a fixed number of frames per second.
    Fixed(u32),
}

impl TickRate {
    /// Frame interval for a fixed rate; `None` when ticking is unbounded.
    pub fn interval(self) -> Option<std::time::Duration> {
        match self {
            Self::Fixed(fps) if fps > 0 => Some(std::time::Duration::from_secs(1) / fps),
            _ => None,
        }
    }
}
