//! A 12-byte record file shared by every cooperating process.
//!
//! Layout, big-endian, no header:
//!
//! | offset | width | field |
//! |--------|-------|-------|
//! | 0 | 8 | window start, epoch milliseconds |
//! | 8 | 4 | admissions granted in that window |
//!
//! All access goes through [`SharedCounterStore::with_exclusive_access`], which holds an
//! advisory exclusive lock on the whole file for the duration of the closure. The lock is
//! taken without blocking; if another process holds it the call fails fast with
//! [`SharedCounterError::Contended`].

use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use snafu::{ResultExt, Snafu};

pub const RECORD_LEN: usize = 12;

/// The persisted `(window start, count)` pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowState {
    pub window_start_millis: u64,
    pub request_count: u32,
}

impl WindowState {
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut bytes = [0u8; RECORD_LEN];
        bytes[..8].copy_from_slice(&self.window_start_millis.to_be_bytes());
        bytes[8..].copy_from_slice(&self.request_count.to_be_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; RECORD_LEN]) -> Self {
        let mut start = [0u8; 8];
        let mut count = [0u8; 4];
        start.copy_from_slice(&bytes[..8]);
        count.copy_from_slice(&bytes[8..]);
        Self {
            window_start_millis: u64::from_be_bytes(start),
            request_count: u32::from_be_bytes(count),
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SharedCounterError {
    /// Another holder has the lock right now. Transient.
    #[snafu(display("record file {} is locked by another process", path.display()))]
    Contended { path: PathBuf },

    #[snafu(display("failed to open record file {}: {}", path.display(), source))]
    Open { path: PathBuf, source: io::Error },

    #[snafu(display("failed to lock record file {}: {}", path.display(), source))]
    Lock { path: PathBuf, source: io::Error },

    #[snafu(display("failed to read record file {}: {}", path.display(), source))]
    Read { path: PathBuf, source: io::Error },

    #[snafu(display("failed to write record file {}: {}", path.display(), source))]
    Write { path: PathBuf, source: io::Error },
}

impl SharedCounterError {
    pub const fn is_contended(&self) -> bool {
        matches!(self, SharedCounterError::Contended { .. })
    }
}

/// Handle to the record file. Cheap to clone; holds no open descriptor between calls.
#[derive(Debug, Clone)]
pub struct SharedCounterStore {
    path: PathBuf,
}

impl SharedCounterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Opens (creating if absent) the record, takes a non-blocking exclusive lock and runs `f`.
    ///
    /// The lock is released and the descriptor closed when this returns, whether `f`
    /// succeeded, failed, or panicked.
    pub fn with_exclusive_access<T, F>(&self, f: F) -> Result<T, SharedCounterError>
    where
        F: FnOnce(&mut LockedRecord<'_>) -> Result<T, SharedCounterError>,
    {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .context(OpenSnafu { path: &self.path })?;

        let mut record = LockedRecord::acquire(file, &self.path)?;
        record.ensure_len()?;
        f(&mut record)
    }

    /// Reads the record under the lock without writing it back.
    pub fn snapshot(&self) -> Result<WindowState, SharedCounterError> {
        self.with_exclusive_access(|record| record.read())
    }
}

/// Read/write view of the record, valid only while the lock is held.
#[derive(Debug)]
pub struct LockedRecord<'a> {
    file: File,
    path: &'a Path,
}

impl<'a> LockedRecord<'a> {
    fn acquire(file: File, path: &'a Path) -> Result<Self, SharedCounterError> {
        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Self { file, path }),
            Err(err) if is_contention(&err) => ContendedSnafu { path }.fail(),
            Err(err) => Err(err).context(LockSnafu { path }),
        }
    }

    // A fresh file is zero-length; grow it to a full zeroed record.
    fn ensure_len(&mut self) -> Result<(), SharedCounterError> {
        let len = self
            .file
            .metadata()
            .context(ReadSnafu { path: self.path })?
            .len();
        if len < RECORD_LEN as u64 {
            self.file
                .set_len(RECORD_LEN as u64)
                .context(WriteSnafu { path: self.path })?;
        }
        Ok(())
    }

    /// Reads all 12 bytes. Bytes past end of file read as zero.
    pub fn read(&mut self) -> Result<WindowState, SharedCounterError> {
        let mut bytes = [0u8; RECORD_LEN];
        self.file
            .seek(SeekFrom::Start(0))
            .context(ReadSnafu { path: self.path })?;

        let mut filled = 0;
        while filled < RECORD_LEN {
            match self.file.read(&mut bytes[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err).context(ReadSnafu { path: self.path }),
            }
        }
        Ok(WindowState::decode(&bytes))
    }

    /// Writes all 12 bytes in one call.
    pub fn write(&mut self, state: &WindowState) -> Result<(), SharedCounterError> {
        self.file
            .seek(SeekFrom::Start(0))
            .context(WriteSnafu { path: self.path })?;
        self.file
            .write_all(&state.encode())
            .context(WriteSnafu { path: self.path })?;
        self.file.flush().context(WriteSnafu { path: self.path })
    }
}

impl Drop for LockedRecord<'_> {
    fn drop(&mut self) {
        // The descriptor closes right after this, which would release the lock as well.
        if let Err(error) = FileExt::unlock(&self.file) {
            warn!(path = %self.path.display(), %error, "Failed to release record file lock");
        }
    }
}

fn is_contention(err: &io::Error) -> bool {
    err.kind() == ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
