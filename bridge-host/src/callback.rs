//! Module callbacks.
//!
//! A callback object stands in for a closure that lives inside the module.
//! Dynamic code may call it like any function; the call is queued and the
//! bridge hands it to the module's `handle_callback(callback, event)`
//! export once the current request has run, before its response is
//! written. The callback id is the handle the module holds for the object.

use alloc::collections::VecDeque;
use alloc::rc::{Rc, Weak};
use core::any::Any;
use core::cell::RefCell;

use crate::object::{HostObject, ObjectRef, PlainObject};
use crate::script::ScriptResult;
use crate::value::Value;

/// Event argument for a callback called without an object.
pub const NO_EVENT: i32 = -1;

/// A queued call.
#[derive(Debug, Clone)]
pub struct PendingCallback {
    /// The callback object that was called.
    pub callback: ObjectRef,
    /// Its first argument, if there was one.
    pub event: Option<ObjectRef>,
}

/// Calls waiting for delivery, oldest first.
#[derive(Debug, Clone, Default)]
pub struct CallbackQueue(Rc<RefCell<VecDeque<PendingCallback>>>);

impl CallbackQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        CallbackQueue::default()
    }

    /// Mint a callback object that reports into this queue.
    pub fn create(&self) -> ObjectRef {
        let object: Rc<dyn HostObject> = Rc::new_cyclic(|this| CallbackObject {
            queue: self.clone(),
            this: this.clone(),
        });
        ObjectRef::from_rc(object)
    }

    /// Take the oldest call.
    pub fn pop(&self) -> Option<PendingCallback> {
        self.0.borrow_mut().pop_front()
    }

    /// Drop every queued call; returns how many there were.
    pub fn clear(&self) -> usize {
        let mut queue = self.0.borrow_mut();
        let dropped = queue.len();
        queue.clear();
        dropped
    }

    /// Number of queued calls.
    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    fn push(&self, pending: PendingCallback) {
        self.0.borrow_mut().push_back(pending);
    }
}

/// Host object for a module closure.
pub struct CallbackObject {
    queue: CallbackQueue,
    this: Weak<CallbackObject>,
}

/// What the module receives as the event handle.
///
/// Objects pass through; other values are boxed as `{ value }`, and
/// `undefined`/`null` mean no event.
fn event_object(arg: Option<&Value>) -> Option<ObjectRef> {
    match arg? {
        Value::Undefined | Value::Null => None,
        Value::Object(obj) => Some(obj.clone()),
        Value::Function(_) => {
            log::warn!("callback event is a function; passing none");
            None
        }
        other => {
            let boxed = PlainObject::new();
            boxed.insert("value".into(), other.clone());
            Some(ObjectRef::new(boxed))
        }
    }
}

impl HostObject for CallbackObject {
    fn class_name(&self) -> &'static str {
        "Callback"
    }

    fn get(&self, _key: &str) -> ScriptResult<Value> {
        Ok(Value::Undefined)
    }

    fn is_callable(&self) -> bool {
        true
    }

    fn call(&self, args: &[Value]) -> ScriptResult<Value> {
        if let Some(this) = self.this.upgrade() {
            let callback: Rc<dyn HostObject> = this;
            self.queue.push(PendingCallback {
                callback: ObjectRef::from_rc(callback),
                event: event_object(args.first()),
            });
        }
        Ok(Value::Undefined)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
