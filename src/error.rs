//! Error management module

use std::fmt;
use std::io;
use std::str::Utf8Error;

/// The error type used by this crate.
#[derive(Debug)]
pub enum Error {
    /// An error originating from reading or writing the underlying byte
    /// stream.
    Io(io::Error),
    /// A UTF-8 string payload did not contain valid UTF-8.
    Utf8(Utf8Error),
    /// The byte stream does not follow the XBIS wire format: an unknown
    /// node-type byte, a handle reference out of range, a negative length
    /// prefix, or a premature end of stream.
    Malformed(String),
    /// Specifically, a lead byte with no matching `NODE_TYPE_*` constant
    /// and none of the high flag bits set. A distinguished case of
    /// [`Error::Malformed`].
    UnknownNodeType(u8),
    /// A reader accessor was called in a state where it is undefined (for
    /// example `attribute_count` outside `START_TAG`), or the writer was
    /// asked to emit an attribute outside an open start tag.
    IllegalState(String),
    /// The writer was asked to emit a node kind with no wire representation
    /// in this codec (see DESIGN.md Open Question #3).
    UnsupportedOperation(&'static str),
}

/// A specialized [`Result`](std::result::Result) type where the error is
/// hard-wired to [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(err) => write!(f, "I/O error: {}", err),
            Error::Utf8(err) => write!(f, "UTF-8 error: {}", err),
            Error::Malformed(msg) => write!(f, "malformed XBIS stream: {}", msg),
            Error::UnknownNodeType(byte) => write!(f, "unknown node type byte: 0x{:02x}", byte),
            Error::IllegalState(msg) => write!(f, "illegal state: {}", msg),
            Error::UnsupportedOperation(op) => write!(f, "unsupported operation: {}", op),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(err) => Some(err),
            Error::Utf8(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    #[inline]
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<Utf8Error> for Error {
    #[inline]
    fn from(err: Utf8Error) -> Error {
        Error::Utf8(err)
    }
}
