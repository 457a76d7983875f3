use std::fmt;
use std::io;

// Geometry of a single transfer.
pub const SECTOR_SIZE: usize = 512;
pub const CHUNK_SIZE: usize = 32;   // Bytes moved by one read_block/write_block call.

/// Filesystem-layer failures. The discriminants are the codes the host sees
/// through the disk error register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    DiskErr = 1,
    NotReady = 2,
    NoFile = 3,
    NotOpened = 4,
    NotEnabled = 5,
    NoFilesystem = 6,
}

impl FsError {
    /// The numeric code reported to the host.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for FsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            FsError::DiskErr => "hard error in the storage layer",
            FsError::NotReady => "storage device not ready",
            FsError::NoFile => "file not found",
            FsError::NotOpened => "no file is open",
            FsError::NotEnabled => "volume not mounted",
            FsError::NoFilesystem => "no valid filesystem",
        };
        write!(f, "{} (code {})", msg, self.code())
    }
}

impl std::error::Error for FsError {}

/// Convert host IO errors to filesystem codes.
impl From<io::Error> for FsError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => FsError::NoFile,
            io::ErrorKind::PermissionDenied => FsError::NotReady,
            _ => FsError::DiskErr,
        }
    }
}

/// Result type alias.
pub type FsResult<T> = Result<T, FsError>;

/// Collapse a filesystem result into the code the host sees.
pub fn fs_code(result: FsResult<()>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => e.code(),
    }
}

/// A minimal block filesystem: one open file at a time, accessed
/// sequentially from a sector-aligned position. Files can never grow.
pub trait BlockStore {
    /// Mount the volume. Closes any open file.
    fn mount(&mut self) -> FsResult<()>;
    /// Open the named file, replacing any previously open one.
    fn open(&mut self, name: &str) -> FsResult<()>;
    /// Read up to `buf.len()` bytes, returning the count actually read.
    fn read_block(&mut self, buf: &mut [u8]) -> FsResult<usize>;
    /// Write up to `buf.len()` bytes, returning the count actually written.
    fn write_block(&mut self, buf: &[u8]) -> FsResult<usize>;
    /// Complete a write sequence.
    fn finalize(&mut self) -> FsResult<()>;
    /// Move to the start of the given sector.
    fn seek(&mut self, block: u32) -> FsResult<()>;
}
