//! Guest-side codec.
//!
//! Encoding matches the host byte for byte. Decoding reads records up to
//! the end of the response and checks them against the declared count, so
//! a short or padded response is an error rather than a silent truncation.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use bridge_wire::{read_count, Reader, Tag, WireError, Writer, HEADER_LEN};

use crate::error::{GuestError, GuestResult};
use crate::host::Host;
use crate::value::{ObjectRef, Value};

/// Encode `values` into a wire buffer.
pub fn encode(values: &[Value]) -> GuestResult<Vec<u8>> {
    let mut writer = Writer::with_count(values.len())?;
    for value in values {
        match value {
            Value::Undefined => writer.put_tag(Tag::Undefined),
            Value::Null => writer.put_tag(Tag::Null),
            Value::Boolean(true) => writer.put_tag(Tag::True),
            Value::Boolean(false) => writer.put_tag(Tag::False),
            Value::Number(n) => {
                writer.put_tag(Tag::Number);
                writer.put_f64(*n);
            }
            Value::BigInt(n) => {
                writer.put_tag(Tag::BigInt);
                writer.put_i64(*n);
            }
            Value::String(s) => {
                writer.put_tag(Tag::String);
                writer.put_length_prefixed(s.as_bytes())?;
            }
            Value::Bytes(b) => {
                writer.put_tag(Tag::Bytes);
                writer.put_length_prefixed(b)?;
            }
            Value::Array(r) => {
                writer.put_tag(Tag::Array);
                writer.put_u32(r.id());
            }
            Value::Object(r) => {
                writer.put_tag(Tag::Object);
                writer.put_u32(r.id());
            }
        }
    }
    Ok(writer.finish())
}

/// Decode a response buffer. Handles become [`ObjectRef`]s released
/// through `host`; on error the ones already decoded are released again.
pub fn decode(buffer: &[u8], host: &Rc<dyn Host>) -> GuestResult<Vec<Value>> {
    let declared = read_count(buffer)?;
    let mut reader = Reader::at(buffer, HEADER_LEN);
    let mut values = Vec::with_capacity((declared as usize).min(buffer.len() - HEADER_LEN));
    while !reader.is_empty() {
        values.push(decode_record(&mut reader, host)?);
    }
    let found = values.len() as u32;
    if found != declared {
        log::warn!("decode: {} records declared, {} found", declared, found);
        return Err(GuestError::Wire(WireError::CountMismatch { declared, found }));
    }
    Ok(values)
}

fn decode_record(reader: &mut Reader<'_>, host: &Rc<dyn Host>) -> GuestResult<Value> {
    Ok(match reader.read_tag()? {
        Tag::Undefined => Value::Undefined,
        Tag::Null => Value::Null,
        Tag::True => Value::Boolean(true),
        Tag::False => Value::Boolean(false),
        Tag::Number => Value::Number(reader.read_f64()?),
        Tag::BigInt => Value::BigInt(reader.read_i64()?),
        Tag::String => {
            let start = reader.position() + 4;
            let bytes = reader.read_length_prefixed()?;
            let text = core::str::from_utf8(bytes).map_err(|err| GuestError::InvalidText {
                offset: start + err.valid_up_to(),
            })?;
            Value::String(String::from(text))
        }
        Tag::Bytes => Value::Bytes(reader.read_length_prefixed()?.to_vec()),
        Tag::Array => Value::Array(ObjectRef::new(reader.read_u32()?, host.clone())),
        Tag::Object => Value::Object(ObjectRef::new(reader.read_u32()?, host.clone())),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::RecordingHost;
    use alloc::vec;

    #[test]
    fn test_encode_layout() {
        let buffer = encode(&[
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Number(42.5),
            Value::from("hi"),
        ])
        .unwrap();
        let mut expected = vec![0x06, 0, 0, 0, 0x00, 0x01, 0x02, 0x03, 0x04];
        expected.extend_from_slice(&42.5f64.to_le_bytes());
        expected.extend_from_slice(&[0x06, 0x02, 0, 0, 0, b'h', b'i']);
        assert_eq!(buffer, expected);
    }

    #[test]
    fn test_decode_handles() {
        let host: Rc<dyn Host> = Rc::new(RecordingHost::default());
        let buffer = vec![0x02, 0, 0, 0, 0x08, 0x05, 0, 0, 0, 0x07, 0x06, 0, 0, 0];
        let values = decode(&buffer, &host).unwrap();
        assert_eq!(values[0].as_object().unwrap().id(), 5);
        assert!(matches!(&values[1], Value::Array(r) if r.id() == 6));
    }

    #[test]
    fn test_decode_rejects_count_mismatch() {
        let recording = Rc::new(RecordingHost::default());
        let host: Rc<dyn Host> = recording.clone();

        // One record declared, a second one follows.
        let extra = [0x01, 0, 0, 0, 0x01, 0x02];
        assert_eq!(
            decode(&extra, &host),
            Err(GuestError::Wire(WireError::CountMismatch { declared: 1, found: 2 }))
        );

        // Two declared, one present.
        let missing = [0x02, 0, 0, 0, 0x08, 0x03, 0, 0, 0];
        assert_eq!(
            decode(&missing, &host),
            Err(GuestError::Wire(WireError::CountMismatch { declared: 2, found: 1 }))
        );
        // The handle that did decode is not leaked.
        assert_eq!(recording.freed(), vec![3]);

        // Bytes after the last record are not a record.
        let padded = [0x01, 0, 0, 0, 0x00, 0xAA, 0xBB];
        assert!(matches!(
            decode(&padded, &host),
            Err(GuestError::Wire(WireError::UnknownTag { tag: 0xAA, offset: 5 }))
        ));
    }

    #[test]
    fn test_decode_short_record() {
        let host: Rc<dyn Host> = Rc::new(RecordingHost::default());
        let err = decode(&[0x01, 0, 0, 0, 0x04, 0, 0], &host).unwrap_err();
        assert!(matches!(err, GuestError::Wire(WireError::UnexpectedEnd { .. })));
        assert!(matches!(
            decode(&[0x01, 0, 0, 0, 0x0A], &host),
            Err(GuestError::Wire(WireError::UnknownTag { tag: 0x0A, offset: 4 }))
        ));
    }
}
