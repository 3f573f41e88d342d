use std::{error::Error, fmt, io, time::Duration};

use comms::specs::ContentRef;

/// The blob store module's result type.
pub type Result<T> = std::result::Result<T, BlobErr>;

/// Blob exchange failures.
#[derive(Debug)]
pub enum BlobErr {
    StoreUnavailable(io::Error),
    /// The reference was rejected before reaching the store.
    InvalidReference(String),
    /// The store answered an upload with an empty reference.
    EmptyReference,
    NotFound(ContentRef),
    Timeout {
        op: &'static str,
        after: Duration,
    },
    Protocol(String),
}

impl BlobErr {
    /// Whether retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BlobErr::Timeout { .. })
    }
}

impl fmt::Display for BlobErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobErr::StoreUnavailable(e) => write!(f, "blob store unavailable: {e}"),
            BlobErr::InvalidReference(raw) => write!(f, "invalid content reference {raw:?}"),
            BlobErr::EmptyReference => write!(f, "the blob store returned an empty reference"),
            BlobErr::NotFound(reference) => write!(f, "no blob stored under {reference}"),
            BlobErr::Timeout { op, after } => {
                write!(f, "blob {op} timed out after {}ms", after.as_millis())
            }
            BlobErr::Protocol(detail) => write!(f, "blob protocol error: {detail}"),
        }
    }
}

impl Error for BlobErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BlobErr::StoreUnavailable(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for BlobErr {
    fn from(value: io::Error) -> Self {
        Self::StoreUnavailable(value)
    }
}

impl From<BlobErr> for io::Error {
    fn from(value: BlobErr) -> Self {
        match value {
            BlobErr::StoreUnavailable(e) => e,
            e @ BlobErr::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, e),
            e @ BlobErr::Timeout { .. } => io::Error::new(io::ErrorKind::TimedOut, e),
            e => io::Error::new(io::ErrorKind::InvalidData, e),
        }
    }
}
