//! Value kind tags.
//!
//! Every record in an encoded buffer starts with one of these bytes.
//! The byte values are fixed; both sides of the boundary must agree on them.

use core::fmt;

/// Kind of a value record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
    /// Absent value (`undefined`).
    Undefined = 0x00,
    /// Null value.
    Null = 0x01,
    /// Boolean `true`.
    True = 0x02,
    /// Boolean `false`.
    False = 0x03,
    /// IEEE-754 binary64.
    Number = 0x04,
    /// Two's-complement 64-bit integer.
    BigInt = 0x05,
    /// Length-prefixed UTF-8 text.
    String = 0x06,
    /// Handle to a host-side array.
    Array = 0x07,
    /// Handle to a host-side object.
    Object = 0x08,
    /// Length-prefixed raw bytes.
    Bytes = 0x09,
}

/// Shape of the payload following a tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Payload {
    /// No payload.
    None,
    /// Eight little-endian bytes.
    Fixed8,
    /// Four-byte little-endian length, then that many bytes.
    LengthPrefixed,
    /// Four-byte little-endian handle id.
    Handle,
}

impl Tag {
    /// All tags, in byte order.
    pub const ALL: [Tag; 10] = [
        Tag::Undefined,
        Tag::Null,
        Tag::True,
        Tag::False,
        Tag::Number,
        Tag::BigInt,
        Tag::String,
        Tag::Array,
        Tag::Object,
        Tag::Bytes,
    ];

    /// Look up the tag for a byte.
    pub fn from_byte(byte: u8) -> Option<Tag> {
        match byte {
            0x00 => Some(Tag::Undefined),
            0x01 => Some(Tag::Null),
            0x02 => Some(Tag::True),
            0x03 => Some(Tag::False),
            0x04 => Some(Tag::Number),
            0x05 => Some(Tag::BigInt),
            0x06 => Some(Tag::String),
            0x07 => Some(Tag::Array),
            0x08 => Some(Tag::Object),
            0x09 => Some(Tag::Bytes),
            _ => None,
        }
    }

    /// The byte written on the wire.
    pub fn byte(self) -> u8 {
        self as u8
    }

    /// Payload shape for this tag.
    pub fn payload(self) -> Payload {
        match self {
            Tag::Undefined | Tag::Null | Tag::True | Tag::False => Payload::None,
            Tag::Number | Tag::BigInt => Payload::Fixed8,
            Tag::String | Tag::Bytes => Payload::LengthPrefixed,
            Tag::Array | Tag::Object => Payload::Handle,
        }
    }

    /// Whether the payload references the host handle table.
    pub fn is_handle(self) -> bool {
        self.payload() == Payload::Handle
    }

    /// Human-readable kind name.
    pub fn name(self) -> &'static str {
        match self {
            Tag::Undefined => "undefined",
            Tag::Null => "null",
            Tag::True => "true",
            Tag::False => "false",
            Tag::Number => "number",
            Tag::BigInt => "bigint",
            Tag::String => "string",
            Tag::Array => "array",
            Tag::Object => "object",
            Tag::Bytes => "bytes",
        }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02x})", self.name(), self.byte())
    }
}

impl TryFrom<u8> for Tag {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Tag::from_byte(byte).ok_or(byte)
    }
}
