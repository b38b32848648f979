//! Value codec.
//!
//! Lowers host values into the tagged wire format and lifts them back.
//! Objects never cross by value: encoding one mints a handle in the
//! [`HandleTable`], decoding a handle resolves it back to the same object.

use alloc::string::String;
use alloc::vec::Vec;

use bridge_wire::{read_count, Reader, Tag, WireError, Writer, HEADER_LEN};

use crate::error::{BridgeError, BridgeResult};
use crate::handles::HandleTable;
use crate::value::Value;

/// An encoded buffer plus the handles minted while producing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Encoded {
    /// Wire bytes.
    pub bytes: Vec<u8>,
    /// Handle ids allocated for object values, in record order.
    pub handles: Vec<u32>,
}

/// Encode `values` into a wire buffer.
pub fn encode(values: &[Value], handles: &mut HandleTable) -> BridgeResult<Vec<u8>> {
    encode_tracked(values, handles).map(|encoded| encoded.bytes)
}

/// Encode `values`, reporting which handles were minted.
///
/// Every value is checked before any handle is allocated, so a failure
/// leaves the table untouched.
pub fn encode_tracked(values: &[Value], handles: &mut HandleTable) -> BridgeResult<Encoded> {
    for value in values {
        check_encodable(value)?;
    }

    let mut writer = Writer::with_count(values.len())?;
    let mut minted = Vec::new();
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
            Value::Object(obj) => {
                let tag = if obj.is_array() { Tag::Array } else { Tag::Object };
                let id = handles.allocate(obj.clone());
                minted.push(id);
                writer.put_tag(tag);
                writer.put_u32(id);
            }
            Value::Function(_) => return Err(BridgeError::UnsupportedType("function")),
        }
    }

    Ok(Encoded {
        bytes: writer.finish(),
        handles: minted,
    })
}

fn check_encodable(value: &Value) -> BridgeResult<()> {
    match value {
        Value::Function(_) => Err(BridgeError::UnsupportedType(value.kind_name())),
        Value::String(s) if u32::try_from(s.len()).is_err() => {
            Err(WireError::LengthOverflow(s.len()).into())
        }
        Value::Bytes(b) if u32::try_from(b.len()).is_err() => {
            Err(WireError::LengthOverflow(b.len()).into())
        }
        _ => Ok(()),
    }
}

/// Decode a wire buffer into values.
///
/// Records are consumed until the buffer ends; the declared count must
/// then agree with the number of records read. A handle that is not live
/// decodes as undefined.
pub fn decode(buffer: &[u8], handles: &HandleTable) -> BridgeResult<Vec<Value>> {
    let declared = read_count(buffer)?;
    let mut reader = Reader::at(buffer, HEADER_LEN);
    let mut values = Vec::with_capacity((declared as usize).min(buffer.len() - HEADER_LEN));

    while !reader.is_empty() {
        values.push(decode_record(&mut reader, handles)?);
    }

    let found = values.len() as u32;
    if found != declared {
        return Err(BridgeError::Malformed(WireError::CountMismatch { declared, found }));
    }
    Ok(values)
}

fn decode_record(reader: &mut Reader<'_>, handles: &HandleTable) -> BridgeResult<Value> {
    let value = match reader.read_tag()? {
        Tag::Undefined => Value::Undefined,
        Tag::Null => Value::Null,
        Tag::True => Value::Boolean(true),
        Tag::False => Value::Boolean(false),
        Tag::Number => Value::Number(reader.read_f64()?),
        Tag::BigInt => Value::BigInt(reader.read_i64()?),
        Tag::String => {
            let start = reader.position() + 4;
            let bytes = reader.read_length_prefixed()?;
            let text = core::str::from_utf8(bytes).map_err(|err| BridgeError::InvalidText {
                offset: start + err.valid_up_to(),
            })?;
            Value::String(String::from(text))
        }
        Tag::Bytes => Value::Bytes(reader.read_length_prefixed()?.to_vec()),
        Tag::Array | Tag::Object => {
            let id = reader.read_u32()?;
            match handles.resolve(id) {
                Ok(obj) => Value::Object(obj),
                Err(_) => {
                    log::warn!("decode: handle {} is not live, using undefined", id);
                    Value::Undefined
                }
            }
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;
    use crate::value::Function;
    use alloc::vec;

    fn sample() -> Vec<Value> {
        vec![
            Value::Undefined,
            Value::Null,
            Value::Boolean(true),
            Value::Boolean(false),
            Value::Number(42.5),
            Value::string("hi"),
        ]
    }

    #[test]
    fn test_encode_reference_layout() {
        let mut table = HandleTable::new();
        let bytes = encode(&sample(), &mut table).unwrap();

        let mut expected = vec![6, 0, 0, 0, 0x00, 0x01, 0x02, 0x03, 0x04];
        expected.extend_from_slice(&42.5f64.to_le_bytes());
        expected.extend_from_slice(&[0x06, 2, 0, 0, 0, b'h', b'i']);
        assert_eq!(bytes, expected);
        assert_eq!(decode(&bytes, &table).unwrap(), sample());
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_primitive_round_trip_is_bitwise() {
        let mut table = HandleTable::new();
        let values = vec![
            Value::Number(-0.0),
            Value::Number(f64::NAN),
            Value::BigInt(i64::MIN),
            Value::Bytes(vec![0, 255, 7]),
            Value::string("héllo"),
        ];
        let bytes = encode(&values, &mut table).unwrap();
        assert_eq!(bridge_wire::scan(&bytes), Ok(values.len() as u32));
        assert_eq!(decode(&bytes, &table).unwrap(), values);
    }

    #[test]
    fn test_objects_cross_as_handles() {
        let mut table = HandleTable::new();
        let arr = ObjectRef::array(vec![Value::Number(1.0)]);
        let obj = ObjectRef::plain();
        let encoded = encode_tracked(
            &[Value::Object(arr.clone()), Value::Object(obj.clone())],
            &mut table,
        )
        .unwrap();

        assert_eq!(encoded.bytes[4], Tag::Array.byte());
        assert_eq!(encoded.bytes[9], Tag::Object.byte());
        assert_eq!(encoded.handles, vec![0, 1]);
        assert_eq!(table.resolve(0).unwrap(), arr);

        let decoded = decode(&encoded.bytes, &table).unwrap();
        assert_eq!(decoded, vec![Value::Object(arr), Value::Object(obj)]);
    }

    #[test]
    fn test_function_is_unsupported_and_allocates_nothing() {
        let mut table = HandleTable::new();
        let values = vec![
            Value::Object(ObjectRef::plain()),
            Value::Function(Function::native("f", |_| Ok(Value::Undefined))),
        ];
        assert_eq!(
            encode(&values, &mut table),
            Err(BridgeError::UnsupportedType("function"))
        );
        assert_eq!(table.live_count(), 0);
    }

    #[test]
    fn test_stale_handle_decodes_as_undefined() {
        let mut table = HandleTable::new();
        let id = table.allocate(ObjectRef::plain());
        table.release(id).unwrap();
        let buf = [2, 0, 0, 0, 0x08, id as u8, 0, 0, 0, 0x01];
        assert_eq!(
            decode(&buf, &table).unwrap(),
            vec![Value::Undefined, Value::Null]
        );
    }

    #[test]
    fn test_decode_invalid_tag() {
        let table = HandleTable::new();
        let buf = [1, 0, 0, 0, 0x0a];
        assert_eq!(
            decode(&buf, &table),
            Err(BridgeError::InvalidTag { tag: 0x0a, offset: 4 })
        );
    }

    #[test]
    fn test_decode_invalid_text_is_not_replaced() {
        let table = HandleTable::new();
        let buf = [1, 0, 0, 0, 0x06, 3, 0, 0, 0, b'a', 0xff, b'b'];
        assert_eq!(
            decode(&buf, &table),
            Err(BridgeError::InvalidText { offset: 10 })
        );
    }

    #[test]
    fn test_decode_framing_errors() {
        let table = HandleTable::new();
        assert!(matches!(
            decode(&[0, 0], &table),
            Err(BridgeError::Malformed(WireError::ShortHeader { len: 2 }))
        ));
        assert!(matches!(
            decode(&[3, 0, 0, 0, 0x00], &table),
            Err(BridgeError::Malformed(WireError::CountMismatch { declared: 3, found: 1 }))
        ));
        assert!(matches!(
            decode(&[1, 0, 0, 0, 0x05, 1, 2], &table),
            Err(BridgeError::Malformed(WireError::UnexpectedEnd { .. }))
        ));
    }

    #[test]
    fn test_empty_sequence() {
        let mut table = HandleTable::new();
        let bytes = encode(&[], &mut table).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert!(decode(&bytes, &table).unwrap().is_empty());
    }
}
