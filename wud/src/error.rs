//! Library-wide error and result types.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// All errors the library can produce.
///
/// Configuration problems (bad magic, malformed headers, missing shards)
/// and bounds violations are always fatal. Integrity failures are gated by
/// [`VerifyMode`](crate::decrypt::VerifyMode). I/O errors are propagated
/// unchanged.
#[derive(Debug)]
pub enum Error {
    /// A container magic field did not match the expected value.
    BadMagic { found: [u8; 8] },
    /// A header field or table violates the format (message names which).
    InvalidHeader(&'static str),
    /// A shard file named by the image layout does not exist.
    MissingShard(PathBuf),
    /// A requested window exceeds the declared size of the image or content.
    OutOfBounds { offset: u64, length: u64, size: u64 },
    /// The storage ended before the declared size was satisfied.
    ShortRead {
        offset: u64,
        expected: usize,
        actual: usize,
    },
    /// SHA-1 of a decrypted payload does not match its H0 table entry.
    PayloadHashMismatch {
        block: u64,
        expected: [u8; 20],
        actual: [u8; 20],
    },
    /// SHA-1 of a decrypted H0 table does not match the outer reference
    /// hash covering its block group.
    HashTableMismatch {
        block: u64,
        expected: [u8; 20],
        actual: [u8; 20],
    },
    /// A structural constraint was violated (message describes which one).
    Parse(&'static str),
    /// An underlying I/O operation failed.
    Io(io::Error),
}

impl Error {
    /// Returns true for hash-verification failures, the only class that
    /// [`VerifyMode::Lenient`](crate::decrypt::VerifyMode) may downgrade to
    /// a warning.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Error::PayloadHashMismatch { .. } | Error::HashTableMismatch { .. }
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadMagic { found } => {
                write!(f, "bad container magic: {}", hex::encode(found))
            }
            Error::InvalidHeader(s) => write!(f, "invalid header: {s}"),
            Error::MissingShard(path) => {
                write!(f, "missing shard file: {}", path.display())
            }
            Error::OutOfBounds {
                offset,
                length,
                size,
            } => write!(
                f,
                "window {offset:#x}+{length:#x} exceeds declared size {size:#x}"
            ),
            Error::ShortRead {
                offset,
                expected,
                actual,
            } => write!(
                f,
                "short read at {offset:#x}: expected {expected:#x} bytes, got {actual:#x}"
            ),
            Error::PayloadHashMismatch {
                block,
                expected,
                actual,
            } => write!(
                f,
                "payload hash mismatch in block {block}: expected {}, got {}",
                hex::encode(expected),
                hex::encode(actual)
            ),
            Error::HashTableMismatch {
                block,
                expected,
                actual,
            } => write!(
                f,
                "hash table mismatch in block {block}: expected {}, got {}",
                hex::encode(expected),
                hex::encode(actual)
            ),
            Error::Parse(s) => write!(f, "parse error: {s}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        if let Error::Io(e) = self {
            Some(e)
        } else {
            None
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<Error> for io::Error {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => e,
            e if e.is_integrity() => io::Error::new(io::ErrorKind::InvalidData, e),
            e => io::Error::other(e),
        }
    }
}
