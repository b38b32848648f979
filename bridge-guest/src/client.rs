//! Calls into the host.

use alloc::rc::Rc;

use crate::callback::Callbacks;
use crate::codec;
use crate::error::{GuestError, GuestResult};
use crate::host::Host;
use crate::template;
use crate::value::{ObjectRef, Value};

/// Typed front end over a [`Host`].
#[derive(Clone)]
pub struct Client {
    host: Rc<dyn Host>,
    callbacks: Rc<Callbacks>,
}

impl Client {
    /// Create a client over `host` with its own callback registry.
    pub fn new(host: Rc<dyn Host>) -> Self {
        Client::with_callbacks(host, Rc::new(Callbacks::new()))
    }

    /// Create a client that files callbacks in `callbacks`.
    pub fn with_callbacks(host: Rc<dyn Host>, callbacks: Rc<Callbacks>) -> Self {
        Client { host, callbacks }
    }

    /// Client over the running module's imports and callback registry.
    #[cfg(target_arch = "wasm32")]
    pub fn imported() -> Self {
        Client::with_callbacks(
            Rc::new(crate::host::ImportedHost),
            crate::host::module_callbacks(),
        )
    }

    /// The host calls go to.
    pub fn host(&self) -> &Rc<dyn Host> {
        &self.host
    }

    /// The callback registry.
    pub fn callbacks(&self) -> &Rc<Callbacks> {
        &self.callbacks
    }

    /// Run `code` with `{}` placeholders bound to `params`.
    pub fn invoke(&self, code: &str, params: &[Value]) -> GuestResult<Value> {
        self.invoke_raw(&template::expand(code, params.len()), params)
    }

    /// Run `code` as written; it must evaluate to a function.
    pub fn invoke_raw(&self, code: &str, params: &[Value]) -> GuestResult<Value> {
        let params = codec::encode(params)?;
        let response = self.host.invoke(code, &params)?;
        self.first(&response)
    }

    /// First element matching `query`, or `null`.
    pub fn query_selector(&self, query: &str) -> GuestResult<Value> {
        let response = self.host.query_selector(query)?;
        self.first(&response)
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> GuestResult<Value> {
        let response = self.host.create_element(tag)?;
        self.first(&response)
    }

    /// Register `handler` and return the host object that calls it.
    ///
    /// Pass the object to dynamic code; each call there runs `handler`
    /// with the call's event object, if any.
    pub fn create_callback<F>(&self, handler: F) -> GuestResult<ObjectRef>
    where
        F: FnMut(Option<ObjectRef>) + 'static,
    {
        let response = self.host.create_callback()?;
        let callback = self.first(&response)?.into_object()?;
        self.callbacks.insert(callback.id(), handler);
        Ok(callback)
    }

    /// Unregister the handler behind `callback` and release the object.
    pub fn remove_callback(&self, callback: ObjectRef) -> bool {
        self.callbacks.remove(callback.id())
    }

    /// Run the handler for a `handle_callback(callback, event)` call.
    pub fn handle_callback(&self, callback: u32, event: i32) -> GuestResult<()> {
        self.callbacks.dispatch(&self.host, callback, event)
    }

    fn first(&self, response: &[u8]) -> GuestResult<Value> {
        let values = codec::decode(response, &self.host)?;
        Ok(values.into_iter().next().unwrap_or_default())
    }
}
