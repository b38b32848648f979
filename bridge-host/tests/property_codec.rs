//! Property: value codec round trip and framing
//!
//! For any list of primitive values, decoding the encoding gives the same
//! values back, numbers compared bit for bit (NaN payloads included). The
//! encoding frames exactly one record per value, and the module-side
//! encoder produces the same bytes. For any buffer at all, a successful
//! decode returns exactly as many values as the count header declares, and
//! both decoders accept or reject the same buffers.

use std::rc::Rc;

use bridge_guest::{GuestError, GuestResult, Host};
use bridge_host::{codec, BridgeError, HandleTable, Value};
use bridge_wire::WireError;
use proptest::prelude::*;

/// Module host that answers nothing; decoding only ever frees through it.
struct SilentHost;

impl Host for SilentHost {
    fn invoke(&self, _code: &str, _params: &[u8]) -> GuestResult<Vec<u8>> {
        Err(GuestError::NoResponse)
    }

    fn free_object(&self, _id: u32) {}

    fn query_selector(&self, _query: &str) -> GuestResult<Vec<u8>> {
        Err(GuestError::NoResponse)
    }

    fn create_element(&self, _tag: &str) -> GuestResult<Vec<u8>> {
        Err(GuestError::NoResponse)
    }

    fn create_callback(&self) -> GuestResult<Vec<u8>> {
        Err(GuestError::NoResponse)
    }
}

/// Strategy for a value that crosses the boundary by copy.
fn arb_primitive() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Undefined),
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<f64>().prop_map(Value::Number),
        any::<u64>().prop_map(|bits| Value::Number(f64::from_bits(bits))),
        any::<i64>().prop_map(Value::BigInt),
        ".{0,24}".prop_map(Value::String),
        proptest::collection::vec(any::<u8>(), 0..32).prop_map(Value::Bytes),
    ]
}

/// Strategy for a parameter or result list.
fn arb_values() -> impl Strategy<Value = Vec<Value>> {
    proptest::collection::vec(arb_primitive(), 0..12)
}

fn to_module(value: &Value) -> bridge_guest::Value {
    match value {
        Value::Undefined => bridge_guest::Value::Undefined,
        Value::Null => bridge_guest::Value::Null,
        Value::Boolean(b) => bridge_guest::Value::Boolean(*b),
        Value::Number(n) => bridge_guest::Value::Number(*n),
        Value::BigInt(n) => bridge_guest::Value::BigInt(*n),
        Value::String(s) => bridge_guest::Value::String(s.clone()),
        Value::Bytes(b) => bridge_guest::Value::Bytes(b.clone()),
        other => panic!("not a primitive: {:?}", other),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Decoding an encoding gives back the original list.
    #[test]
    fn encode_then_decode_is_identity(values in arb_values()) {
        let mut handles = HandleTable::new();
        let bytes = codec::encode(&values, &mut handles).unwrap();
        let decoded = codec::decode(&bytes, &handles).unwrap();

        prop_assert_eq!(decoded, values);
        prop_assert_eq!(handles.live_count(), 0);
    }

    /// The count header matches the records the framing walker finds.
    #[test]
    fn encoding_frames_one_record_per_value(values in arb_values()) {
        let mut handles = HandleTable::new();
        let bytes = codec::encode(&values, &mut handles).unwrap();

        prop_assert_eq!(bridge_wire::read_count(&bytes), Ok(values.len() as u32));
        prop_assert_eq!(bridge_wire::scan(&bytes), Ok(values.len() as u32));
    }

    /// Host and module encode the same list to the same bytes.
    #[test]
    fn host_and_module_encoders_agree(values in arb_values()) {
        let mut handles = HandleTable::new();
        let host_bytes = codec::encode(&values, &mut handles).unwrap();
        let module_values: Vec<_> = values.iter().map(to_module).collect();
        let module_bytes = bridge_guest::codec::encode(&module_values).unwrap();

        prop_assert_eq!(host_bytes, module_bytes);
    }

    /// A wrong count header is rejected by both decoders.
    #[test]
    fn miscounted_buffer_is_rejected(values in arb_values(), declared in 0u32..16) {
        let mut handles = HandleTable::new();
        let mut bytes = codec::encode(&values, &mut handles).unwrap();
        bytes[..4].copy_from_slice(&declared.to_le_bytes());
        let host: Rc<dyn Host> = Rc::new(SilentHost);

        let on_host = codec::decode(&bytes, &handles);
        let on_module = bridge_guest::codec::decode(&bytes, &host);
        if declared as usize == values.len() {
            prop_assert_eq!(on_host.unwrap(), values);
            prop_assert!(on_module.is_ok());
        } else {
            let mismatch = WireError::CountMismatch {
                declared,
                found: values.len() as u32,
            };
            prop_assert_eq!(on_host, Err(BridgeError::Malformed(mismatch)));
            prop_assert_eq!(on_module.map(|v| v.len()), Err(GuestError::Wire(mismatch)));
        }
    }

    /// Whatever the bytes, an accepted buffer holds exactly `count` values.
    #[test]
    fn arbitrary_bytes_never_miscount(bytes in proptest::collection::vec(any::<u8>(), 0..48)) {
        let handles = HandleTable::new();
        let host: Rc<dyn Host> = Rc::new(SilentHost);

        let on_host = codec::decode(&bytes, &handles);
        let on_module = bridge_guest::codec::decode(&bytes, &host);
        if let Ok(values) = &on_host {
            prop_assert_eq!(Ok(values.len() as u32), bridge_wire::read_count(&bytes));
            prop_assert_eq!(bridge_wire::scan(&bytes), Ok(values.len() as u32));
        }
        prop_assert_eq!(on_host.is_ok(), on_module.is_ok());
    }
}
