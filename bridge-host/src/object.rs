//! Host objects.
//!
//! Anything that cannot be flattened into module memory lives on the host
//! behind an [`ObjectRef`] and crosses the boundary as a handle.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::cell::RefCell;
use core::fmt;

use crate::script::{ScriptError, ScriptResult};
use crate::value::Value;

/// Behaviour shared by every host-side object.
pub trait HostObject: 'static {
    /// Class name, as shown by `String(obj)`.
    fn class_name(&self) -> &'static str;

    /// Whether the object crosses the boundary with the array tag.
    fn is_array(&self) -> bool {
        false
    }

    /// Read a property. Unknown properties read as undefined.
    fn get(&self, key: &str) -> ScriptResult<Value>;

    /// Write a property.
    fn set(&self, key: &str, _value: Value) -> ScriptResult<()> {
        Err(ScriptError::type_error(alloc::format!(
            "Cannot assign to property '{}' of {}",
            key,
            self.class_name()
        )))
    }

    /// Call a built-in method. Only consulted when `get(name)` is not a function.
    fn call_method(&self, name: &str, _args: &[Value]) -> ScriptResult<Value> {
        Err(ScriptError::type_error(alloc::format!(
            "{}.{} is not a function",
            self.class_name(),
            name
        )))
    }

    /// Whether dynamic code can call the object like a function.
    fn is_callable(&self) -> bool {
        false
    }

    /// Call the object. Only consulted when `is_callable` is true.
    fn call(&self, _args: &[Value]) -> ScriptResult<Value> {
        Err(ScriptError::type_error(alloc::format!(
            "{} is not a function",
            self.class_name()
        )))
    }

    /// String conversion.
    fn to_display_string(&self) -> String {
        alloc::format!("[object {}]", self.class_name())
    }

    /// Downcast support.
    fn as_any(&self) -> &dyn Any;
}

/// Shared reference to a host object, compared by identity.
#[derive(Clone)]
pub struct ObjectRef(Rc<dyn HostObject>);

impl ObjectRef {
    /// Create a new object reference.
    pub fn new<T: HostObject>(object: T) -> Self {
        ObjectRef(Rc::new(object))
    }

    /// Wrap an existing shared object without copying it.
    pub fn from_rc(object: Rc<dyn HostObject>) -> Self {
        ObjectRef(object)
    }

    /// Create an array object.
    pub fn array(items: Vec<Value>) -> Self {
        ObjectRef::new(ArrayObject::new(items))
    }

    /// Create an empty plain object.
    pub fn plain() -> Self {
        ObjectRef::new(PlainObject::new())
    }

    /// Downcast to a concrete object type.
    pub fn downcast_ref<T: HostObject>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }

    /// Address of the shared allocation.
    pub fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as *const u8 as usize
    }

    /// Number of live references.
    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Class name.
    pub fn class_name(&self) -> &'static str {
        self.0.class_name()
    }

    /// Whether this is an array.
    pub fn is_array(&self) -> bool {
        self.0.is_array()
    }

    /// Read a property.
    pub fn get(&self, key: &str) -> ScriptResult<Value> {
        self.0.get(key)
    }

    /// Write a property.
    pub fn set(&self, key: &str, value: Value) -> ScriptResult<()> {
        self.0.set(key, value)
    }

    /// Call a built-in method.
    pub fn call_method(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        self.0.call_method(name, args)
    }

    /// Whether the object can be called.
    pub fn is_callable(&self) -> bool {
        self.0.is_callable()
    }

    /// Call the object.
    pub fn call(&self, args: &[Value]) -> ScriptResult<Value> {
        self.0.call(args)
    }

    /// String conversion.
    pub fn to_display_string(&self) -> String {
        self.0.to_display_string()
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl Eq for ObjectRef {}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({} @ {:#x})", self.class_name(), self.addr())
    }
}

/// Parse an array index key.
fn index_key(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    key.parse::<usize>().ok()
}

/// Array object (tag 0x07 on the wire).
#[derive(Default)]
pub struct ArrayObject {
    items: RefCell<Vec<Value>>,
}

impl ArrayObject {
    /// Create a new array.
    pub fn new(items: Vec<Value>) -> Self {
        ArrayObject {
            items: RefCell::new(items),
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Check if the array is empty.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Copy out the elements.
    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    /// Append an element.
    pub fn push(&self, value: Value) {
        self.items.borrow_mut().push(value);
    }

    fn position(&self, needle: &Value, same_value_zero: bool) -> Option<usize> {
        self.items.borrow().iter().position(|item| {
            if same_value_zero {
                if let (Value::Number(a), Value::Number(b)) = (item, needle) {
                    if a.is_nan() && b.is_nan() {
                        return true;
                    }
                }
            }
            item.strict_equals(needle)
        })
    }
}

impl HostObject for ArrayObject {
    fn class_name(&self) -> &'static str {
        "Array"
    }

    fn is_array(&self) -> bool {
        true
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        if key == "length" {
            return Ok(Value::Number(self.len() as f64));
        }
        Ok(index_key(key)
            .and_then(|i| self.items.borrow().get(i).cloned())
            .unwrap_or(Value::Undefined))
    }

    fn set(&self, key: &str, value: Value) -> ScriptResult<()> {
        let mut items = self.items.borrow_mut();
        if key == "length" {
            let len = value.to_number()?;
            if len < 0.0 || libm::trunc(len) != len || len > u32::MAX as f64 {
                return Err(ScriptError::range("Invalid array length"));
            }
            items.resize(len as usize, Value::Undefined);
            return Ok(());
        }
        match index_key(key) {
            Some(i) => {
                if i >= items.len() {
                    items.resize(i + 1, Value::Undefined);
                }
                items[i] = value;
                Ok(())
            }
            None => Err(ScriptError::type_error(alloc::format!(
                "Cannot add property '{}' to an array",
                key
            ))),
        }
    }

    fn call_method(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        let arg = |i: usize| args.get(i).cloned().unwrap_or_default();
        match name {
            "push" => {
                let mut items = self.items.borrow_mut();
                items.extend(args.iter().cloned());
                Ok(Value::Number(items.len() as f64))
            }
            "pop" => Ok(self.items.borrow_mut().pop().unwrap_or_default()),
            "join" => {
                let sep = match arg(0) {
                    Value::Undefined => String::from(","),
                    other => other.to_js_string(),
                };
                let parts: Vec<String> = self
                    .items
                    .borrow()
                    .iter()
                    .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
                    .collect();
                Ok(Value::String(parts.join(&sep)))
            }
            "includes" => Ok(Value::Boolean(self.position(&arg(0), true).is_some())),
            "indexOf" => Ok(Value::Number(
                self.position(&arg(0), false).map_or(-1.0, |i| i as f64),
            )),
            _ => Err(ScriptError::type_error(alloc::format!(
                "Array.{} is not a function",
                name
            ))),
        }
    }

    fn to_display_string(&self) -> String {
        let parts: Vec<String> = self
            .items
            .borrow()
            .iter()
            .map(|v| if v.is_nullish() { String::new() } else { v.to_js_string() })
            .collect();
        parts.join(",")
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Ordered string-keyed object (tag 0x08 on the wire).
#[derive(Default)]
pub struct PlainObject {
    props: RefCell<Vec<(String, Value)>>,
}

impl PlainObject {
    /// Create an empty object.
    pub fn new() -> Self {
        PlainObject::default()
    }

    /// Create an object from key/value pairs; later keys win.
    pub fn from_entries(entries: Vec<(String, Value)>) -> Self {
        let obj = PlainObject::new();
        for (key, value) in entries {
            obj.insert(key, value);
        }
        obj
    }

    /// Insert or overwrite a property.
    pub fn insert(&self, key: String, value: Value) {
        let mut props = self.props.borrow_mut();
        match props.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => props.push((key, value)),
        }
    }

    /// Property names in insertion order.
    pub fn keys(&self) -> Vec<String> {
        self.props.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.props.borrow().len()
    }

    /// Check if the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.props.borrow().is_empty()
    }
}

impl HostObject for PlainObject {
    fn class_name(&self) -> &'static str {
        "Object"
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        Ok(self
            .props
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
            .unwrap_or_default())
    }

    fn set(&self, key: &str, value: Value) -> ScriptResult<()> {
        self.insert(key.into(), value);
        Ok(())
    }

    fn call_method(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        match name {
            "hasOwnProperty" => {
                let key = args.first().map(Value::to_js_string).unwrap_or_default();
                Ok(Value::Boolean(self.props.borrow().iter().any(|(k, _)| *k == key)))
            }
            _ => Err(ScriptError::type_error(alloc::format!(
                "Object.{} is not a function",
                name
            ))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_identity_not_structure() {
        let a = ObjectRef::plain();
        let b = ObjectRef::plain();
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_array_methods() {
        let arr = ObjectRef::array(vec![Value::Number(1.0), Value::string("x")]);
        assert!(arr.is_array());
        assert_eq!(arr.get("length").unwrap(), Value::Number(2.0));
        assert_eq!(arr.get("1").unwrap(), Value::string("x"));
        assert_eq!(arr.get("01").unwrap(), Value::Undefined);

        arr.call_method("push", &[Value::Null]).unwrap();
        assert_eq!(
            arr.call_method("join", &[Value::string("-")]).unwrap(),
            Value::string("1-x-")
        );
        assert_eq!(
            arr.call_method("indexOf", &[Value::string("x")]).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(arr.call_method("pop", &[]).unwrap(), Value::Null);
        assert_eq!(arr.to_display_string(), "1,x");
    }

    #[test]
    fn test_array_includes_nan() {
        let arr = ObjectRef::array(vec![Value::Number(f64::NAN)]);
        assert_eq!(
            arr.call_method("includes", &[Value::Number(f64::NAN)]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            arr.call_method("indexOf", &[Value::Number(f64::NAN)]).unwrap(),
            Value::Number(-1.0)
        );
    }

    #[test]
    fn test_plain_object_order_and_overwrite() {
        let obj = PlainObject::from_entries(vec![
            ("b".into(), Value::Number(1.0)),
            ("a".into(), Value::Number(2.0)),
            ("b".into(), Value::Number(3.0)),
        ]);
        assert_eq!(obj.keys(), vec![String::from("b"), String::from("a")]);
        assert_eq!(obj.get("b").unwrap(), Value::Number(3.0));
        assert_eq!(obj.get("missing").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_downcast() {
        let obj = ObjectRef::array(vec![]);
        assert!(obj.downcast_ref::<ArrayObject>().is_some());
        assert!(obj.downcast_ref::<PlainObject>().is_none());
    }
}
