//! Bridge error types.

use alloc::string::String;
use core::fmt;

use bridge_wire::WireError;

use crate::script::ScriptError;

/// Result type for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Where an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorOrigin {
    /// The bridge itself (framing, handles, memory, compilation).
    Bridge,
    /// Code supplied by the module, while it was running.
    GuestCode,
}

/// Bridge error types.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeError {
    /// Value kind has no wire representation.
    UnsupportedType(&'static str),
    /// Tag byte names no known kind.
    InvalidTag {
        /// The byte found.
        tag: u8,
        /// Offset of the tag byte in the buffer.
        offset: usize,
    },
    /// Text payload is not valid UTF-8.
    InvalidText {
        /// Offset of the first invalid byte.
        offset: usize,
    },
    /// Handle id is out of range or currently free.
    InvalidHandle(u32),
    /// Handle id was already free.
    DoubleRelease(u32),
    /// Access past the end of module memory.
    OutOfBounds {
        /// Start of the access.
        ptr: u32,
        /// Length of the access.
        len: u32,
        /// Memory size at the time of the access.
        size: usize,
    },
    /// Dynamic code failed to compile.
    CompileError(ScriptError),
    /// Dynamic code raised while running.
    HostExecutionError(ScriptError),
    /// Buffer framing is broken (short header, truncated record, count mismatch).
    Malformed(WireError),
    /// The module lacks a required export.
    MissingExport(&'static str),
    /// The module could not provide response space.
    Allocation(String),
    /// The module's `handle_callback` export failed.
    Callback(String),
}

impl BridgeError {
    /// Where the error originated.
    pub fn origin(&self) -> ErrorOrigin {
        match self {
            BridgeError::HostExecutionError(_) => ErrorOrigin::GuestCode,
            _ => ErrorOrigin::Bridge,
        }
    }

    /// Whether the error must abort the current call boundary.
    ///
    /// Release bookkeeping errors are reported but leave the table intact.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            BridgeError::DoubleRelease(_) | BridgeError::InvalidHandle(_)
        )
    }

    /// Short error name.
    pub fn name(&self) -> &'static str {
        match self {
            BridgeError::UnsupportedType(_) => "UnsupportedType",
            BridgeError::InvalidTag { .. } => "InvalidTag",
            BridgeError::InvalidText { .. } => "InvalidText",
            BridgeError::InvalidHandle(_) => "InvalidHandle",
            BridgeError::DoubleRelease(_) => "DoubleRelease",
            BridgeError::OutOfBounds { .. } => "OutOfBounds",
            BridgeError::CompileError(_) => "CompileError",
            BridgeError::HostExecutionError(_) => "HostExecutionError",
            BridgeError::Malformed(_) => "Malformed",
            BridgeError::MissingExport(_) => "MissingExport",
            BridgeError::Allocation(_) => "Allocation",
            BridgeError::Callback(_) => "Callback",
        }
    }
}

impl From<WireError> for BridgeError {
    fn from(err: WireError) -> Self {
        match err {
            WireError::UnknownTag { tag, offset } => BridgeError::InvalidTag { tag, offset },
            other => BridgeError::Malformed(other),
        }
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::UnsupportedType(kind) => {
                write!(f, "cannot encode value of type {}", kind)
            }
            BridgeError::InvalidTag { tag, offset } => {
                write!(f, "invalid tag 0x{:02x} at offset {}", tag, offset)
            }
            BridgeError::InvalidText { offset } => {
                write!(f, "invalid UTF-8 at offset {}", offset)
            }
            BridgeError::InvalidHandle(id) => write!(f, "invalid handle {}", id),
            BridgeError::DoubleRelease(id) => write!(f, "handle {} released twice", id),
            BridgeError::OutOfBounds { ptr, len, size } => write!(
                f,
                "memory access out of bounds: {} + {} > {}",
                ptr, len, size
            ),
            BridgeError::CompileError(err) => write!(f, "compile error: {}", err),
            BridgeError::HostExecutionError(err) => {
                write!(f, "dynamic code raised: {}", err)
            }
            BridgeError::Malformed(err) => write!(f, "malformed buffer: {}", err),
            BridgeError::MissingExport(name) => write!(f, "module does not export `{}`", name),
            BridgeError::Allocation(msg) => write!(f, "response allocation failed: {}", msg),
            BridgeError::Callback(msg) => write!(f, "module callback failed: {}", msg),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for BridgeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_execution_errors_blame_guest_code() {
        let exec = BridgeError::HostExecutionError(ScriptError::Thrown("boom".into()));
        let compile = BridgeError::CompileError(ScriptError::syntax("bad"));
        assert_eq!(exec.origin(), ErrorOrigin::GuestCode);
        assert_eq!(compile.origin(), ErrorOrigin::Bridge);
        assert_eq!(BridgeError::InvalidHandle(1).origin(), ErrorOrigin::Bridge);
    }

    #[test]
    fn test_release_errors_are_not_fatal() {
        assert!(!BridgeError::DoubleRelease(3).is_fatal());
        assert!(!BridgeError::InvalidHandle(3).is_fatal());
        assert!(BridgeError::UnsupportedType("function").is_fatal());
        assert!(BridgeError::MissingExport("memory").is_fatal());
    }

    #[test]
    fn test_wire_errors_map_to_taxonomy() {
        let tag: BridgeError = WireError::UnknownTag { tag: 0x42, offset: 4 }.into();
        assert_eq!(tag, BridgeError::InvalidTag { tag: 0x42, offset: 4 });
        let short: BridgeError = WireError::ShortHeader { len: 1 }.into();
        assert_eq!(short, BridgeError::Malformed(WireError::ShortHeader { len: 1 }));
    }
}
