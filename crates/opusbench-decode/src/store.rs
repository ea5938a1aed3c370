//! Backing stores the decoder pulls compressed bytes from.
//!
//! A [`BackingStore`] is either a [`MemoryBuffer`] holding the whole file or a
//! [`SeekableHandle`] wrapping an open file. Both implement `Read`, `Seek` and
//! symphonia's `MediaSource`, so the decoder never knows which one it reads.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use opusbench_core::{Error, IoOperation, Result, StoreKind};
use symphonia::core::io::MediaSource;
use tracing::{debug, trace, warn};

/// File metadata returned by [`StorageProvider::stat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
}

/// Source of files: stat and open-for-reading.
pub trait StorageProvider {
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Open a file read-only.
    fn open(&self, path: &Path) -> Result<Box<dyn StorageHandle>>;
}

/// An open, externally-owned file.
///
/// `close` consumes the handle, so it cannot be closed twice.
pub trait StorageHandle: Send + Sync {
    /// Read up to `buf.len()` bytes. Returns 0 at end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Move the cursor and return the new absolute offset.
    fn seek(&mut self, pos: SeekFrom) -> Result<u64>;

    /// Current absolute offset.
    fn tell(&mut self) -> Result<u64>;

    fn close(self: Box<Self>) -> Result<()>;
}

/// Storage provider backed by the local file system.
///
/// Relative paths resolve against `root`.
#[derive(Debug, Clone)]
pub struct FileSystem {
    root: PathBuf,
}

impl FileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl Default for FileSystem {
    fn default() -> Self {
        Self::new(".")
    }
}

impl StorageProvider for FileSystem {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata =
            std::fs::metadata(self.resolve(path)).map_err(|e| Error::io(IoOperation::Stat, &e))?;
        Ok(FileStat {
            size: metadata.len(),
        })
    }

    fn open(&self, path: &Path) -> Result<Box<dyn StorageHandle>> {
        let resolved = self.resolve(path);
        let file = File::open(&resolved).map_err(|e| Error::io(IoOperation::Open, &e))?;
        debug!("Opened {}", resolved.display());
        Ok(Box::new(FileHandle { file }))
    }
}

/// An open local file.
struct FileHandle {
    file: File,
}

impl StorageHandle for FileHandle {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.file
            .read(buf)
            .map_err(|e| Error::io(IoOperation::Read, &e))
    }

    fn seek(&mut self, pos: SeekFrom) -> Result<u64> {
        self.file
            .seek(pos)
            .map_err(|e| Error::io(IoOperation::Seek, &e))
    }

    fn tell(&mut self) -> Result<u64> {
        self.file
            .stream_position()
            .map_err(|e| Error::io(IoOperation::Tell, &e))
    }

    fn close(self: Box<Self>) -> Result<()> {
        drop(self.file);
        Ok(())
    }
}

/// A complete file held in memory, read through an implicit cursor.
#[derive(Debug, Clone)]
pub struct MemoryBuffer {
    data: Bytes,
    pos: u64,
}

impl MemoryBuffer {
    /// Wrap `data`, checking it holds exactly `declared_len` bytes.
    pub fn new(data: Bytes, declared_len: u64) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidStore("memory buffer is empty".to_string()));
        }
        if data.len() as u64 != declared_len {
            return Err(Error::InvalidStore(format!(
                "declared {declared_len} bytes, {} available",
                data.len()
            )));
        }
        Ok(Self { data, pos: 0 })
    }

    /// Read a whole file into memory: stat it, read exactly `size` bytes, close it.
    pub fn load(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let stat = provider.stat(path)?;
        if stat.size == 0 {
            return Err(Error::InvalidStore(format!("{} is empty", path.display())));
        }

        let mut handle = provider.open(path)?;
        let size = usize::try_from(stat.size)
            .map_err(|_| Error::InvalidStore(format!("{} bytes do not fit in memory", stat.size)))?;
        let mut buffer = vec![0u8; size];
        let read = read_full(handle.as_mut(), &mut buffer);
        let closed = handle.close();

        let bytes_read = read?;
        closed?;
        if bytes_read != size {
            return Err(Error::Io {
                operation: IoOperation::Read,
                message: format!("expected {size} bytes, got {bytes_read} instead"),
            });
        }

        debug!("Loaded {} bytes from {}", size, path.display());
        Self::new(Bytes::from(buffer), stat.size)
    }

    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub const fn tell(&self) -> u64 {
        self.pos
    }
}

/// Read until `buf` is full or the handle reports end of file.
fn read_full(handle: &mut dyn StorageHandle, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = handle.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

impl Read for MemoryBuffer {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let len = self.data.len();
        let start = usize::try_from(self.pos).map_or(len, |p| p.min(len));
        let n = buf.len().min(len - start);
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Seek for MemoryBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = seek_target(pos, self.pos, self.len())?;
        if target > self.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("seek to {target} past end of {}-byte buffer", self.len()),
            ));
        }
        self.pos = target;
        Ok(target)
    }
}

/// Resolve a seek request to an absolute offset, rejecting negative targets.
fn seek_target(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let (base, offset) = match pos {
        SeekFrom::Start(offset) => return Ok(offset),
        SeekFrom::Current(offset) => (current, offset),
        SeekFrom::End(offset) => (len, offset),
    };
    base.checked_add_signed(offset).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek to a negative or overflowing position",
        )
    })
}

/// A file handle the decoder streams from.
///
/// The handle is closed exactly once: by [`SeekableHandle::close`], or on drop.
pub struct SeekableHandle {
    handle: Option<Box<dyn StorageHandle>>,
    len: u64,
}

impl SeekableHandle {
    /// Wrap an open handle whose file is `len` bytes long.
    pub fn new(handle: Box<dyn StorageHandle>, len: u64) -> Result<Self> {
        let mut store = Self {
            handle: Some(handle),
            len,
        };
        if len == 0 {
            // The handle was handed to us, so it is ours to release.
            store.close()?;
            return Err(Error::InvalidStore("file is empty".to_string()));
        }
        Ok(store)
    }

    /// Stat and open `path` for streaming.
    pub fn open(provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        let stat = provider.stat(path)?;
        if stat.size == 0 {
            return Err(Error::InvalidStore(format!("{} is empty", path.display())));
        }
        let handle = provider.open(path)?;
        Self::new(handle, stat.size)
    }

    pub const fn len(&self) -> u64 {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    pub fn tell(&mut self) -> Result<u64> {
        self.live()?.tell()
    }

    /// Release the underlying handle. Later reads fail.
    pub fn close(&mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => {
                trace!("Closing stream handle");
                handle.close()
            }
            None => Ok(()),
        }
    }

    fn live(&mut self) -> Result<&mut Box<dyn StorageHandle>> {
        self.handle.as_mut().ok_or_else(|| Error::Io {
            operation: IoOperation::Read,
            message: "handle already closed".to_string(),
        })
    }
}

impl Drop for SeekableHandle {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Failed to close stream handle: {e}");
        }
    }
}

impl Read for SeekableHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.live().and_then(|h| h.read(buf)).map_err(io::Error::other)
    }
}

impl Seek for SeekableHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let handle = self.live().map_err(io::Error::other)?;
        let current = handle.tell().map_err(io::Error::other)?;
        // Validate before touching the handle so a bad seek leaves the cursor alone.
        seek_target(pos, current, self.len)?;
        let handle = self.live().map_err(io::Error::other)?;
        handle.seek(pos).map_err(io::Error::other)
    }
}

/// The byte source for one decode session.
pub enum BackingStore {
    Memory(MemoryBuffer),
    Handle(SeekableHandle),
}

impl BackingStore {
    pub const fn kind(&self) -> StoreKind {
        match self {
            Self::Memory(_) => StoreKind::Memory,
            Self::Handle(_) => StoreKind::Stream,
        }
    }

    /// Total length in bytes.
    pub fn len(&self) -> u64 {
        match self {
            Self::Memory(buffer) => buffer.len(),
            Self::Handle(handle) => handle.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open the store for `kind`, reading the whole file up front for memory stores.
    pub fn open(kind: StoreKind, provider: &dyn StorageProvider, path: &Path) -> Result<Self> {
        match kind {
            StoreKind::Memory => MemoryBuffer::load(provider, path).map(Self::Memory),
            StoreKind::Stream => SeekableHandle::open(provider, path).map(Self::Handle),
        }
    }

    pub fn tell(&mut self) -> Result<u64> {
        match self {
            Self::Memory(buffer) => Ok(buffer.tell()),
            Self::Handle(handle) => handle.tell(),
        }
    }

    /// Release any externally-owned resource.
    pub fn close(&mut self) -> Result<()> {
        match self {
            Self::Memory(_) => Ok(()),
            Self::Handle(handle) => handle.close(),
        }
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("kind", &self.kind())
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

impl From<MemoryBuffer> for BackingStore {
    fn from(buffer: MemoryBuffer) -> Self {
        Self::Memory(buffer)
    }
}

impl From<SeekableHandle> for BackingStore {
    fn from(handle: SeekableHandle) -> Self {
        Self::Handle(handle)
    }
}

impl Read for BackingStore {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Memory(buffer) => buffer.read(buf),
            Self::Handle(handle) => handle.read(buf),
        }
    }
}

impl Seek for BackingStore {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::Memory(buffer) => buffer.seek(pos),
            Self::Handle(handle) => handle.seek(pos),
        }
    }
}

impl MediaSource for BackingStore {
    fn is_seekable(&self) -> bool {
        true
    }

    fn byte_len(&self) -> Option<u64> {
        Some(self.len())
    }
}
