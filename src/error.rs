// Transcoder error taxonomy.
//
// Every failure is surfaced synchronously with its kind and the stream
// position where it was detected. Offsets are bit positions when the error
// comes from the DEFLATE side (BitReader/BitWriter) and byte positions when
// it comes from the puff side (PuffReader/PuffWriter). There is no recovery
// inside the transcoder: one bad bit makes the whole block untransformable,
// and callers decide whether to fall back to treating the region opaquely.

use std::io;

/// Result alias used throughout the transcoder.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The reader could not provide the requested bits/bytes.
    InsufficientInput { offset: u64 },
    /// The writer's output buffer would overflow.
    InsufficientOutput { offset: u64 },
    /// Malformed DEFLATE or puff data.
    InvalidInput { offset: u64, reason: String },
}

impl Error {
    /// Position (bits on the DEFLATE side, bytes on the puff side) where the
    /// error was detected.
    pub fn offset(&self) -> u64 {
        match self {
            Error::InsufficientInput { offset }
            | Error::InsufficientOutput { offset }
            | Error::InvalidInput { offset, .. } => *offset,
        }
    }

    pub(crate) fn invalid(offset: u64, reason: impl Into<String>) -> Error {
        Error::InvalidInput {
            offset,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InsufficientInput { offset } => {
                write!(f, "insufficient input at offset {offset}")
            }
            Error::InsufficientOutput { offset } => {
                write!(f, "insufficient output at offset {offset}")
            }
            Error::InvalidInput { offset, reason } => {
                write!(f, "invalid input at offset {offset}: {reason}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<Error> for io::Error {
    fn from(e: Error) -> io::Error {
        io::Error::new(io::ErrorKind::InvalidData, e)
    }
}
