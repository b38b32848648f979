//! Guest error types.

use alloc::string::String;
use core::fmt;

use bridge_wire::WireError;

/// Result type for guest operations.
pub type GuestResult<T> = Result<T, GuestError>;

/// Guest error types.
#[derive(Debug, Clone, PartialEq)]
pub enum GuestError {
    /// Response framing is broken.
    Wire(WireError),
    /// String payload is not valid UTF-8.
    InvalidText {
        /// Offset of the first invalid byte.
        offset: usize,
    },
    /// Value is not of the requested kind.
    Conversion {
        /// Kind asked for.
        expected: &'static str,
        /// Kind found.
        found: &'static str,
    },
    /// The host returned without writing a response.
    NoResponse,
    /// The host reported a failure (in-process hosts only; a real host traps).
    Host(String),
    /// No handler is registered for the callback (or it is already running).
    UnknownCallback(u32),
}

impl From<WireError> for GuestError {
    fn from(err: WireError) -> Self {
        GuestError::Wire(err)
    }
}

impl fmt::Display for GuestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuestError::Wire(err) => write!(f, "malformed response: {}", err),
            GuestError::InvalidText { offset } => write!(f, "invalid UTF-8 at offset {}", offset),
            GuestError::Conversion { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            GuestError::NoResponse => f.write_str("host wrote no response"),
            GuestError::Host(msg) => write!(f, "host error: {}", msg),
            GuestError::UnknownCallback(id) => write!(f, "no handler for callback {}", id),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GuestError {}
