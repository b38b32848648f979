//! Framing errors.

use core::fmt;

/// Result type for framing operations.
pub type WireResult<T> = Result<T, WireError>;

/// A buffer that does not follow the record layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// Buffer is shorter than the 4-byte count header.
    ShortHeader {
        /// Actual buffer length.
        len: usize,
    },
    /// A read needed more bytes than remain.
    UnexpectedEnd {
        /// Offset the read started at.
        offset: usize,
        /// Bytes the read needed.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// Tag byte names no known kind.
    UnknownTag {
        /// The byte found.
        tag: u8,
        /// Offset of the tag byte.
        offset: usize,
    },
    /// A length does not fit the 32-bit length prefix.
    LengthOverflow(usize),
    /// Declared count disagrees with the records present.
    CountMismatch {
        /// Count from the header.
        declared: u32,
        /// Records actually found.
        found: u32,
    },
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::ShortHeader { len } => {
                write!(f, "buffer of {} bytes has no count header", len)
            }
            WireError::UnexpectedEnd {
                offset,
                needed,
                available,
            } => write!(
                f,
                "record at offset {} needs {} bytes, {} available",
                offset, needed, available
            ),
            WireError::UnknownTag { tag, offset } => {
                write!(f, "unknown tag 0x{:02x} at offset {}", tag, offset)
            }
            WireError::LengthOverflow(len) => {
                write!(f, "length {} exceeds the 32-bit length prefix", len)
            }
            WireError::CountMismatch { declared, found } => {
                write!(f, "header declares {} values, found {}", declared, found)
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for WireError {}
