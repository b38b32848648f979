//! Host-side values.
//!
//! One tagged union serves both the wire (decode produces it, encode
//! consumes it) and the script evaluator. Only [`Value::Function`] has no
//! wire form.

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt;
use libm::{fabs, trunc};

use crate::object::ObjectRef;
use crate::script::{Closure, ScriptError, ScriptResult};

/// Signature of a host-provided callable.
pub type NativeFn = Rc<dyn Fn(&[Value]) -> ScriptResult<Value>>;

/// A callable value.
#[derive(Clone)]
pub enum Function {
    /// Host function.
    Native {
        /// Name used in error messages.
        name: Rc<str>,
        /// Implementation.
        func: NativeFn,
    },
    /// Function compiled from dynamic code.
    Closure(Rc<Closure>),
}

impl Function {
    /// Wrap a host closure.
    pub fn native<F>(name: &str, func: F) -> Self
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + 'static,
    {
        Function::Native {
            name: Rc::from(name),
            func: Rc::new(func),
        }
    }

    /// Function name, if any.
    pub fn name(&self) -> &str {
        match self {
            Function::Native { name, .. } => name,
            Function::Closure(closure) => closure.name(),
        }
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &Function) -> bool {
        match (self, other) {
            (Function::Native { func: a, .. }, Function::Native { func: b, .. }) => {
                core::ptr::eq(Rc::as_ptr(a) as *const u8, Rc::as_ptr(b) as *const u8)
            }
            (Function::Closure(a), Function::Closure(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// A host value.
#[derive(Clone, Default)]
pub enum Value {
    /// The absent value.
    #[default]
    Undefined,
    /// The null value.
    Null,
    /// A boolean value.
    Boolean(bool),
    /// A binary64 number.
    Number(f64),
    /// A 64-bit BigInt.
    BigInt(i64),
    /// UTF-8 text.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
    /// A host object (arrays included).
    Object(ObjectRef),
    /// A callable.
    Function(Function),
}

impl Value {
    /// Create a string.
    pub fn string<S: Into<String>>(s: S) -> Self {
        Value::String(s.into())
    }

    /// Check if value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Check if value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Check if value is nullish (undefined or null).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Get the object reference, if this is an object.
    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get the string slice, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the value's kind, as reported by encode failures.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Object(obj) if obj.is_array() => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Get the type of value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::BigInt(_) => "bigint",
            Value::String(_) => "string",
            Value::Object(obj) if obj.is_callable() => "function",
            Value::Bytes(_) | Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Convert to boolean (ToBoolean).
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::BigInt(n) => *n != 0,
            Value::String(s) => !s.is_empty(),
            Value::Bytes(_) | Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Convert to number (ToNumber).
    pub fn to_number(&self) -> ScriptResult<f64> {
        match self {
            Value::Undefined => Ok(f64::NAN),
            Value::Null => Ok(0.0),
            Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => Ok(*n),
            Value::BigInt(_) => Err(ScriptError::type_error(
                "Cannot convert a BigInt value to a number",
            )),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(0.0);
                }
                Ok(parse_number(s).unwrap_or(f64::NAN))
            }
            Value::Bytes(_) | Value::Object(_) | Value::Function(_) => Ok(f64::NAN),
        }
    }

    /// Convert to integer, truncating toward zero.
    pub fn to_integer(&self) -> ScriptResult<i64> {
        let n = self.to_number()?;
        if n.is_nan() {
            return Ok(0);
        }
        if n.is_infinite() {
            return Ok(if n > 0.0 { i64::MAX } else { i64::MIN });
        }
        Ok(trunc(n) as i64)
    }

    /// Convert to string (ToString).
    pub fn to_js_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".into(),
            Value::Null => "null".into(),
            Value::Boolean(b) => String::from(if *b { "true" } else { "false" }),
            Value::Number(n) => number_to_string(*n),
            Value::BigInt(n) => n.to_string(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => {
                let parts: Vec<String> = b.iter().map(|x| x.to_string()).collect();
                parts.join(",")
            }
            Value::Object(obj) => obj.to_display_string(),
            Value::Function(f) => alloc::format!("function {}() {{ [code] }}", f.name()),
        }
    }

    /// Strict equality (===).
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => core::ptr::eq(a, b),
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Abstract equality (==).
    pub fn abstract_equals(&self, other: &Value) -> bool {
        if core::mem::discriminant(self) == core::mem::discriminant(other) {
            return self.strict_equals(other);
        }
        match (self, other) {
            (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => true,
            (Value::Number(a), Value::BigInt(b)) | (Value::BigInt(b), Value::Number(a)) => {
                *a == *b as f64
            }
            (Value::Number(_), Value::String(_))
            | (Value::String(_), Value::Number(_))
            | (Value::Boolean(_), Value::Number(_) | Value::String(_))
            | (Value::Number(_) | Value::String(_), Value::Boolean(_)) => {
                match (self.to_number(), other.to_number()) {
                    (Ok(a), Ok(b)) => a == b,
                    _ => false,
                }
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::BigInt(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

/// Wire equality: numbers compare bitwise, objects by identity.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a.to_bits() == b.to_bits(),
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::String(s) => write!(f, "{:?}", s),
            Value::Bytes(b) => write!(f, "Bytes({:?})", b),
            Value::Object(obj) => write!(f, "[object {}]", obj.class_name()),
            Value::Function(func) => write!(f, "[function {}]", func.name()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_js_string())
    }
}

/// Parse a numeric literal the way `Number("...")` does.
pub fn parse_number(s: &str) -> Option<f64> {
    match s {
        "Infinity" | "+Infinity" => return Some(f64::INFINITY),
        "-Infinity" => return Some(f64::NEG_INFINITY),
        _ => {}
    }
    let (radix, digits) = if let Some(rest) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        (16, rest)
    } else if let Some(rest) = s.strip_prefix("0b").or_else(|| s.strip_prefix("0B")) {
        (2, rest)
    } else if let Some(rest) = s.strip_prefix("0o").or_else(|| s.strip_prefix("0O")) {
        (8, rest)
    } else {
        (10, s)
    };
    if radix != 10 {
        return u64::from_str_radix(digits, radix).ok().map(|n| n as f64);
    }
    if digits.contains("inf") || digits.contains("nan") || digits.contains("NaN") {
        return None;
    }
    digits.parse::<f64>().ok()
}

/// Format a number the way `String(n)` does.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".into();
    }
    if n.is_infinite() {
        return String::from(if n > 0.0 { "Infinity" } else { "-Infinity" });
    }
    if n == 0.0 {
        return "0".into();
    }
    if trunc(n) == n && fabs(n) < 1e21 {
        return alloc::format!("{}", n as i128);
    }
    alloc::format!("{}", n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_formatting() {
        assert_eq!(number_to_string(5.0), "5");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(42.5), "42.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("12.5"), Some(12.5));
        assert_eq!(parse_number("0x1f"), Some(31.0));
        assert_eq!(parse_number("-Infinity"), Some(f64::NEG_INFINITY));
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn test_wire_equality_is_bitwise() {
        assert_eq!(Value::Number(f64::NAN), Value::Number(f64::NAN));
        assert_ne!(Value::Number(0.0), Value::Number(-0.0));
        assert!(!Value::Number(f64::NAN).strict_equals(&Value::Number(f64::NAN)));
        assert!(Value::Number(0.0).strict_equals(&Value::Number(-0.0)));
    }

    #[test]
    fn test_abstract_equality() {
        assert!(Value::Null.abstract_equals(&Value::Undefined));
        assert!(Value::Number(1.0).abstract_equals(&Value::string("1")));
        assert!(Value::Boolean(true).abstract_equals(&Value::Number(1.0)));
        assert!(Value::Number(3.0).abstract_equals(&Value::BigInt(3)));
        assert!(!Value::Null.abstract_equals(&Value::Number(0.0)));
    }

    #[test]
    fn test_type_of_and_kind() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::BigInt(1).type_of(), "bigint");
        let f = Value::Function(Function::native("f", |_| Ok(Value::Undefined)));
        assert_eq!(f.type_of(), "function");
        assert_eq!(f.kind_name(), "function");
    }
}
