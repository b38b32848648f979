//! KPIO Bridge Wire Format
//!
//! Byte-level layout shared by the host and the sandboxed module for
//! exchanging multi-value argument and result lists.
//!
//! ```text
//! buffer  = count:u32le record*
//! record  = tag:u8 payload
//! payload = ()                      ; undefined, null, true, false
//!         | [u8; 8]                 ; number (f64le), bigint (i64le)
//!         | len:u32le [u8; len]     ; string (UTF-8), bytes
//!         | handle:u32le            ; array, object
//! ```
//!
//! # Architecture
//!
//! - `tag`: the fixed catalog of value kinds and their bytes
//! - `cursor`: little-endian `Reader` / `Writer`
//! - `error`: framing errors
//!
//! Value types live on each side of the boundary; this crate only knows
//! how records are framed.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod cursor;
pub mod error;
pub mod tag;

pub use cursor::{Reader, Writer};
pub use error::{WireError, WireResult};
pub use tag::{Payload, Tag};

/// Size of the count header.
pub const HEADER_LEN: usize = 4;

/// Size of a handle payload.
pub const HANDLE_LEN: usize = 4;

/// Read the declared value count.
pub fn read_count(buffer: &[u8]) -> WireResult<u32> {
    if buffer.len() < HEADER_LEN {
        return Err(WireError::ShortHeader { len: buffer.len() });
    }
    Reader::new(buffer).read_u32()
}

/// Skip over one record, returning its tag.
pub fn skip_record(reader: &mut Reader<'_>) -> WireResult<Tag> {
    let tag = reader.read_tag()?;
    match tag.payload() {
        Payload::None => {}
        Payload::Fixed8 => {
            reader.take(8)?;
        }
        Payload::LengthPrefixed => {
            reader.read_length_prefixed()?;
        }
        Payload::Handle => {
            reader.take(HANDLE_LEN)?;
        }
    }
    Ok(tag)
}

/// Walk every record from offset 4 to the end of `buffer`.
///
/// Returns the number of records. Fails if a record overruns the buffer,
/// a tag is unknown, or the header count disagrees with the records found.
pub fn scan(buffer: &[u8]) -> WireResult<u32> {
    let declared = read_count(buffer)?;
    let mut reader = Reader::at(buffer, HEADER_LEN);
    let mut found = 0u32;
    while !reader.is_empty() {
        skip_record(&mut reader)?;
        found = found.saturating_add(1);
    }
    if found != declared {
        return Err(WireError::CountMismatch { declared, found });
    }
    Ok(found)
}

/// Encoded size of a record with the given tag and payload length.
///
/// `payload_len` is only consulted for length-prefixed kinds.
pub fn record_len(tag: Tag, payload_len: usize) -> usize {
    match tag.payload() {
        Payload::None => 1,
        Payload::Fixed8 => 1 + 8,
        Payload::LengthPrefixed => 1 + 4 + payload_len,
        Payload::Handle => 1 + HANDLE_LEN,
    }
}
