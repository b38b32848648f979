//! Closures the host can call.
//!
//! [`Client::create_callback`](crate::Client::create_callback) asks the
//! host for a callback object and files the closure here under that
//! object's handle. When dynamic code calls the object, the host re-enters
//! the module through `handle_callback(callback, event)`, which lands in
//! [`Callbacks::dispatch`].

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use core::cell::RefCell;

use crate::error::{GuestError, GuestResult};
use crate::host::Host;
use crate::value::ObjectRef;

/// Event argument meaning "called without an object".
pub const NO_EVENT: i32 = -1;

type Handler = Rc<RefCell<Box<dyn FnMut(Option<ObjectRef>)>>>;

/// Callback registry, keyed by the callback object's handle.
#[derive(Default)]
pub struct Callbacks {
    handlers: RefCell<BTreeMap<u32, Handler>>,
}

impl Callbacks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Callbacks::default()
    }

    /// File `handler` under `callback`, replacing any previous one.
    pub fn insert<F>(&self, callback: u32, handler: F)
    where
        F: FnMut(Option<ObjectRef>) + 'static,
    {
        let handler: Handler = Rc::new(RefCell::new(Box::new(handler)));
        self.handlers.borrow_mut().insert(callback, handler);
    }

    /// Forget the handler for `callback`.
    pub fn remove(&self, callback: u32) -> bool {
        self.handlers.borrow_mut().remove(&callback).is_some()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.borrow().len()
    }

    /// Check if no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.borrow().is_empty()
    }

    /// Run the handler for `callback`.
    ///
    /// A non-negative `event` is a handle the module now owns; it is
    /// released once the handler returns unless the handler kept a clone.
    /// Handlers may register, remove or call other callbacks.
    pub fn dispatch(&self, host: &Rc<dyn Host>, callback: u32, event: i32) -> GuestResult<()> {
        let event = u32::try_from(event)
            .ok()
            .map(|id| ObjectRef::new(id, host.clone()));
        let handler = self.handlers.borrow().get(&callback).cloned();
        let Some(handler) = handler else {
            // `event` drops here and goes back to the host.
            return Err(GuestError::UnknownCallback(callback));
        };
        let mut handler = handler
            .try_borrow_mut()
            .map_err(|_| GuestError::UnknownCallback(callback))?;
        log::trace!("callback {} fired", callback);
        (*handler)(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::tests::RecordingHost;
    use alloc::vec;
    use alloc::vec::Vec;

    #[test]
    fn test_dispatch_runs_handler_and_releases_event() {
        let recording = Rc::new(RecordingHost::default());
        let host: Rc<dyn Host> = recording.clone();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let callbacks = Callbacks::new();
        let sink = seen.clone();
        callbacks.insert(4, move |event: Option<ObjectRef>| {
            sink.borrow_mut().push(event.map(|e| e.id()));
        });

        callbacks.dispatch(&host, 4, 9).unwrap();
        callbacks.dispatch(&host, 4, NO_EVENT).unwrap();
        assert_eq!(*seen.borrow(), vec![Some(9), None]);
        assert_eq!(recording.freed(), vec![9]);
    }

    #[test]
    fn test_unknown_callback_still_releases_event() {
        let recording = Rc::new(RecordingHost::default());
        let host: Rc<dyn Host> = recording.clone();
        let callbacks = Callbacks::new();
        callbacks.insert(1, |_| {});
        assert!(callbacks.remove(1));
        assert!(!callbacks.remove(1));

        assert_eq!(
            callbacks.dispatch(&host, 1, 2),
            Err(GuestError::UnknownCallback(1))
        );
        assert_eq!(recording.freed(), vec![2]);
    }

    #[test]
    fn test_handler_may_remove_itself() {
        let host: Rc<dyn Host> = Rc::new(RecordingHost::default());
        let callbacks = Rc::new(Callbacks::new());
        let registry = callbacks.clone();
        callbacks.insert(0, move |_| {
            registry.remove(0);
        });
        callbacks.dispatch(&host, 0, NO_EVENT).unwrap();
        assert!(callbacks.is_empty());
    }
}
