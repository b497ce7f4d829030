//! Log destinations
//!
//! Destinations are cheap-to-clone handles over shared state so the
//! subscriber can hand one out per event without reopening anything.
//! The file destination carries the disk-full policy: after an `ENOSPC`
//! failure, writes to that destination are skipped for one second before
//! being retried, so a full disk costs one failed syscall per second
//! instead of one per event.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

use crate::LogError;

/// How long a destination stays muted after the disk filled up
const DISK_FULL_BACKOFF: Duration = Duration::from_secs(1);

/// Caller-supplied sink receiving whole formatted lines
pub type WriterCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Destination selection
#[derive(Clone)]
pub enum WriterConfig {
    /// Standard error
    Stderr,
    /// Standard output
    Stdout,
    /// Append to a file, with disk-full backoff
    File(PathBuf),
    /// In-memory ring buffer of the given capacity in bytes
    Memory(usize),
    /// Caller-supplied callback
    Custom(WriterCallback),
}

impl fmt::Debug for WriterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stderr => f.write_str("Stderr"),
            Self::Stdout => f.write_str("Stdout"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Memory(cap) => f.debug_tuple("Memory").field(cap).finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// File destination that goes quiet for a second when the disk is full
#[derive(Clone)]
pub struct FileWriter {
    inner: Arc<Mutex<BackoffFile>>,
}

struct BackoffFile {
    file: File,
    disk_full_at: Option<Instant>,
}

impl FileWriter {
    /// Opens (appending, creating) the file at `path`
    pub fn open(path: &Path) -> Result<Self, LogError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(BackoffFile {
                file,
                disk_full_at: None,
            })),
        })
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut inner = self.inner.lock();

        if let Some(at) = inner.disk_full_at {
            if at.elapsed() < DISK_FULL_BACKOFF {
                // Writing to a full filesystem can stall far longer than a
                // normal write; pretend success and retry after the backoff.
                return Ok(buf.len());
            }
            inner.disk_full_at = None;
        }

        match inner.file.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::StorageFull => {
                inner.disk_full_at = Some(Instant::now());
                Ok(buf.len())
            }
            other => other,
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.lock().file.flush()
    }
}

/// In-memory ring buffer destination
///
/// Oldest bytes are overwritten once the capacity is exceeded. Intended
/// for debug builds and post-mortem dumps where the interesting lines are
/// the most recent ones.
#[derive(Clone)]
pub struct MemoryBuffer {
    inner: Arc<Mutex<Ring>>,
}

struct Ring {
    buf: Vec<u8>,
    pos: usize,
    wrapped: bool,
}

impl MemoryBuffer {
    /// Creates a buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Ring {
                buf: vec![0; capacity.max(1)],
                pos: 0,
                wrapped: false,
            })),
        }
    }

    /// Returns the buffered bytes, oldest first
    pub fn contents(&self) -> Vec<u8> {
        let ring = self.inner.lock();
        if ring.wrapped {
            let mut out = Vec::with_capacity(ring.buf.len());
            out.extend_from_slice(&ring.buf[ring.pos..]);
            out.extend_from_slice(&ring.buf[..ring.pos]);
            out
        } else {
            ring.buf[..ring.pos].to_vec()
        }
    }
}

impl Write for MemoryBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut ring = self.inner.lock();
        let cap = ring.buf.len();

        let mut data = buf;
        if data.len() >= cap {
            // Only the tail can survive; the write wraps the whole buffer.
            data = &data[data.len() - cap..];
            ring.wrapped = true;
            ring.pos = 0;
        }

        let pos = ring.pos;
        let first = (cap - pos).min(data.len());
        ring.buf[pos..pos + first].copy_from_slice(&data[..first]);

        if first < data.len() {
            let rest = data.len() - first;
            ring.buf[..rest].copy_from_slice(&data[first..]);
            ring.pos = rest;
            ring.wrapped = true;
        } else {
            ring.pos = pos + first;
            if ring.pos == cap {
                ring.pos = 0;
                ring.wrapped = true;
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct CallbackWriter(WriterCallback);

impl Write for CallbackWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.0)(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Builds the subscriber writer for a destination
///
/// For [`WriterConfig::Memory`] the returned handle lets the host read the
/// ring back later; other destinations return `None`.
pub(crate) fn make_writer(
    config: &WriterConfig,
) -> Result<(BoxMakeWriter, Option<MemoryBuffer>), LogError> {
    match config {
        WriterConfig::Stderr => Ok((BoxMakeWriter::new(io::stderr), None)),
        WriterConfig::Stdout => Ok((BoxMakeWriter::new(io::stdout), None)),
        WriterConfig::File(path) => {
            let writer = FileWriter::open(path)?;
            Ok((BoxMakeWriter::new(move || writer.clone()), None))
        }
        WriterConfig::Memory(capacity) => {
            let buffer = MemoryBuffer::new(*capacity);
            let writer = buffer.clone();
            Ok((BoxMakeWriter::new(move || writer.clone()), Some(buffer)))
        }
        WriterConfig::Custom(callback) => {
            let callback = Arc::clone(callback);
            Ok((
                BoxMakeWriter::new(move || CallbackWriter(Arc::clone(&callback))),
                None,
            ))
        }
    }
}
