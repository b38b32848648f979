//! Guest-side values.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;

use crate::error::{GuestError, GuestResult};
use crate::host::Host;

/// Sole owner of a host handle; releases it when dropped.
struct Handle {
    id: u32,
    host: Rc<dyn Host>,
}

impl Drop for Handle {
    fn drop(&mut self) {
        log::trace!("releasing handle {}", self.id);
        self.host.free_object(self.id);
    }
}

/// Shared reference to a host object.
///
/// Clones share one handle; the handle is released on the host when the
/// last clone is dropped.
#[derive(Clone)]
pub struct ObjectRef(Rc<Handle>);

impl ObjectRef {
    /// Take ownership of `id`, released through `host`.
    pub fn new(id: u32, host: Rc<dyn Host>) -> Self {
        ObjectRef(Rc::new(Handle { id, host }))
    }

    /// Handle id.
    pub fn id(&self) -> u32 {
        self.0.id
    }

    /// Number of live clones.
    pub fn owners(&self) -> usize {
        Rc::strong_count(&self.0)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({})", self.id())
    }
}

/// A value exchanged with the host.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    BigInt(i64),
    String(String),
    Bytes(Vec<u8>),
    Array(ObjectRef),
    Object(ObjectRef),
}

impl Value {
    /// Name of the value's kind.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Check for `undefined` or `null`.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    fn mismatch<T>(&self, expected: &'static str) -> GuestResult<T> {
        Err(GuestError::Conversion {
            expected,
            found: self.kind_name(),
        })
    }

    pub fn as_bool(&self) -> GuestResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => other.mismatch("boolean"),
        }
    }

    pub fn as_number(&self) -> GuestResult<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            other => other.mismatch("number"),
        }
    }

    pub fn as_bigint(&self) -> GuestResult<i64> {
        match self {
            Value::BigInt(n) => Ok(*n),
            other => other.mismatch("bigint"),
        }
    }

    pub fn as_str(&self) -> GuestResult<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => other.mismatch("string"),
        }
    }

    pub fn as_bytes(&self) -> GuestResult<&[u8]> {
        match self {
            Value::Bytes(b) => Ok(b),
            other => other.mismatch("bytes"),
        }
    }

    /// Object or array reference.
    pub fn as_object(&self) -> GuestResult<&ObjectRef> {
        match self {
            Value::Object(r) | Value::Array(r) => Ok(r),
            other => other.mismatch("object"),
        }
    }

    /// Take the object reference out of the value.
    pub fn into_object(self) -> GuestResult<ObjectRef> {
        match self {
            Value::Object(r) | Value::Array(r) => Ok(r),
            other => other.mismatch("object"),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(String::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<f32> for Value {
    fn from(n: f32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::BigInt(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(r: ObjectRef) -> Self {
        Value::Object(r)
    }
}

impl From<&ObjectRef> for Value {
    fn from(r: &ObjectRef) -> Self {
        Value::Object(r.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::RecordingHost;

    #[test]
    fn test_release_on_last_drop() {
        let host = Rc::new(RecordingHost::default());
        let a = ObjectRef::new(3, host.clone());
        let b = a.clone();
        assert_eq!(a.owners(), 2);
        drop(a);
        assert!(host.freed().is_empty());
        drop(b);
        assert_eq!(host.freed(), alloc::vec![3]);
    }

    #[test]
    fn test_conversions() {
        assert_eq!(Value::from(2.5).as_number(), Ok(2.5));
        assert_eq!(Value::from(7i64).as_bigint(), Ok(7));
        assert_eq!(Value::from("hi").as_str(), Ok("hi"));
        assert_eq!(
            Value::Null.as_bool(),
            Err(GuestError::Conversion {
                expected: "boolean",
                found: "null"
            })
        );
        assert!(Value::Undefined.is_nullish());
    }
}
