//! Library-wide error and result types.

use std::fmt;
use std::io;

/// Result alias used throughout lukskit.
pub type Result<T> = std::result::Result<T, Error>;

/// All errors the library can produce.
///
/// Error messages are kept intentionally terse; callers that need richer
/// context should wrap `Error` in their own type.
#[derive(Debug)]
pub enum Error {
    /// The device does not carry a LUKS1 header (magic or version
    /// mismatch). Callers scanning several devices may silently try the
    /// next handler.
    NotLuks,
    /// The header names a cipher, hash, or combination this library does
    /// not support. The payload names the offending piece.
    UnsupportedSuite(String),
    /// A header field is out of range or a cipher-mode string does not
    /// parse (message describes which one).
    HeaderInvalid(&'static str),
    /// An underlying device read failed.
    Io(io::Error),
    /// A transient allocation failed; all partial state was released.
    OutOfMemory,
    /// The passphrase was rejected by every active key slot.
    PermissionDenied,
    /// A write was requested; the driver is read-only.
    NotImplemented,
    /// No device or volume with the given name or UUID exists.
    UnknownDevice(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::NotLuks => write!(f, "not a LUKS1 device"),
            Error::UnsupportedSuite(s) => write!(f, "unsupported cipher suite: {s}"),
            Error::HeaderInvalid(s) => write!(f, "invalid header: {s}"),
            Error::Io(e) => write!(f, "I/O error: {e}"),
            Error::OutOfMemory => write!(f, "out of memory"),
            Error::PermissionDenied => write!(f, "no key slot matched the passphrase"),
            Error::NotImplemented => write!(f, "writing to an encrypted volume is not supported"),
            Error::UnknownDevice(s) => write!(f, "no such device: {s}"),
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
