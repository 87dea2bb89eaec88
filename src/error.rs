use std::fmt;
use std::io;

/// Why a serialized key or record could not be decoded.
///
/// Every variant is fatal to the call that produced it. A sort path that
/// swallowed one of these would end up with a non-total order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Input ended before a length prefix or field payload completed.
    UnexpectedEof,
    /// Length prefix runs past 10 bytes or does not fit in 64 bits.
    VarintOverflow,
    /// A field declares more payload bytes than the buffer holds.
    LengthOutOfBounds { declared: u64, remaining: usize },
    /// Field payload is not valid UTF-8 (only checked when materializing a String).
    InvalidUtf8,
    /// Bytes left over after the last field of a raw key range.
    TrailingBytes(usize),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::UnexpectedEof => write!(f, "unexpected end of input"),
            DecodeError::VarintOverflow => write!(f, "length prefix overflows 64 bits"),
            DecodeError::LengthOutOfBounds { declared, remaining } => write!(
                f,
                "declared length {declared} exceeds remaining {remaining} bytes"
            ),
            DecodeError::InvalidUtf8 => write!(f, "field is not valid UTF-8"),
            DecodeError::TrailingBytes(n) => write!(f, "{n} trailing bytes after key"),
        }
    }
}

/// Unified error type for the crate.
#[derive(Debug)]
pub enum Error {
    /// IO error from spill files.
    Io(io::Error),
    /// Malformed serialized key or record.
    Decode(DecodeError),
    /// Spill file failed its magic or checksum verification.
    Corruption(String),
    /// Rejected shuffle/job configuration.
    Config(String),
    /// No comparator registered for the named type.
    MissingComparator(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Decode(e) => write!(f, "Decode error: {e}"),
            Error::Corruption(msg) => write!(f, "Corruption: {msg}"),
            Error::Config(msg) => write!(f, "Invalid configuration: {msg}"),
            Error::MissingComparator(name) => write!(f, "No comparator registered for {name}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        Error::Decode(e)
    }
}

impl Error {
    /// The decode failure behind this error, if it is one.
    pub fn as_decode(&self) -> Option<&DecodeError> {
        match self {
            Error::Decode(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
