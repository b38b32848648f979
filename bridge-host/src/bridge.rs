//! The bridge: one instance per module.
//!
//! Owns the handle table, the script engine and the element environment,
//! and turns each call from the module into request bytes in, response
//! bytes out. Callbacks called by dynamic code are delivered to the module
//! after the request has run and before its response is written.

use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::callback::{CallbackQueue, NO_EVENT};
use crate::codec::{self, Encoded};
use crate::config::{BridgeConfig, Capabilities};
use crate::dom::{Document, ElementLookup};
use crate::error::{BridgeError, BridgeResult};
use crate::handles::{HandleStats, HandleTable};
use crate::imports::{HostCall, Request};
use crate::memory::{write_response, GuestModule};
use crate::object::ObjectRef;
use crate::script::{CacheStats, ScriptEngine, ScriptError, ScriptResult};
use crate::value::{Function, Value};

/// Call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// `__invoke` calls.
    pub invocations: u64,
    /// `__query_selector` calls.
    pub queries: u64,
    /// `__create_element` calls.
    pub elements_created: u64,
    /// `__free_object` calls.
    pub releases: u64,
    /// `__create_callback` calls.
    pub callbacks_created: u64,
    /// Callback calls handed to the module.
    pub callbacks_delivered: u64,
    /// Calls that ended in an error.
    pub failures: u64,
}

/// Host side of the value-exchange protocol.
pub struct Bridge {
    config: BridgeConfig,
    handles: HandleTable,
    engine: ScriptEngine,
    lookup: Rc<dyn ElementLookup>,
    callbacks: CallbackQueue,
    stats: BridgeStats,
}

fn text(bytes: &[u8]) -> BridgeResult<&str> {
    core::str::from_utf8(bytes).map_err(|err| BridgeError::InvalidText {
        offset: err.valid_up_to(),
    })
}

impl Bridge {
    /// Create a bridge backed by an empty in-memory document.
    pub fn new(config: BridgeConfig) -> Self {
        let document: Rc<dyn ElementLookup> = Document::new();
        Bridge::with_lookup(config, document)
    }

    /// Create a bridge that resolves element calls against `lookup`.
    pub fn with_lookup(config: BridgeConfig, lookup: Rc<dyn ElementLookup>) -> Self {
        let engine = ScriptEngine::new(&config);
        if config.capabilities.contains(Capabilities::DOCUMENT) {
            if let Some(global) = lookup.global_object() {
                engine.define_global("document", Value::Object(global));
            }
        }
        Bridge {
            config,
            handles: HandleTable::new(),
            engine,
            lookup,
            callbacks: CallbackQueue::new(),
            stats: BridgeStats::default(),
        }
    }

    /// Configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Handle table.
    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Handle table, writable.
    pub fn handles_mut(&mut self) -> &mut HandleTable {
        &mut self.handles
    }

    /// Call counters.
    pub fn stats(&self) -> BridgeStats {
        self.stats
    }

    /// Handle table statistics.
    pub fn handle_stats(&self) -> HandleStats {
        self.handles.stats()
    }

    /// Script cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        self.engine.cache_stats()
    }

    // ── Registry ──────────────────────────────────────────────────

    /// Expose a host function to dynamic code under `name`.
    pub fn register_function<F>(&mut self, name: &str, func: F)
    where
        F: Fn(&[Value]) -> ScriptResult<Value> + 'static,
    {
        self.engine
            .define_global(name, Value::Function(Function::native(name, func)));
    }

    /// Expose a value to dynamic code under `name`.
    pub fn define_global(&mut self, name: &str, value: Value) {
        self.engine.define_global(name, value);
    }

    /// Call a global function by name.
    pub fn call(&mut self, name: &str, args: &[Value]) -> BridgeResult<Value> {
        match self.engine.global(name) {
            Some(Value::Function(func)) => self
                .engine
                .call(&func, Value::Undefined, args)
                .map_err(BridgeError::HostExecutionError),
            Some(_) => Err(BridgeError::HostExecutionError(ScriptError::type_error(
                alloc::format!("{} is not a function", name),
            ))),
            None => Err(BridgeError::HostExecutionError(ScriptError::reference(
                alloc::format!("{} is not defined", name),
            ))),
        }
    }

    // ── Value-level operations ────────────────────────────────────

    /// Compile `code` and call it with `args` and a fresh empty receiver.
    pub fn invoke(&mut self, code: &str, args: &[Value]) -> BridgeResult<Value> {
        let func = self.compile(code)?;
        self.call_compiled(&func, args)
    }

    /// Compile dynamic code without running it.
    pub fn compile(&mut self, code: &str) -> BridgeResult<Function> {
        self.engine.compile(code).map_err(BridgeError::CompileError)
    }

    fn call_compiled(&mut self, func: &Function, args: &[Value]) -> BridgeResult<Value> {
        let receiver = Value::Object(ObjectRef::plain());
        self.engine
            .call(func, receiver, args)
            .map_err(BridgeError::HostExecutionError)
    }

    /// Look up one element; `null` when nothing matches.
    pub fn query_selector(&mut self, query: &str) -> BridgeResult<Value> {
        let found = self
            .lookup
            .query_selector(query)
            .map_err(BridgeError::HostExecutionError)?;
        Ok(found.map_or(Value::Null, Value::Object))
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> BridgeResult<Value> {
        let element = self
            .lookup
            .create_element(tag)
            .map_err(BridgeError::HostExecutionError)?;
        Ok(Value::Object(element))
    }

    /// Create a callback object. Calls to it are queued for the module.
    pub fn create_callback(&mut self) -> Value {
        Value::Object(self.callbacks.create())
    }

    /// Release a handle.
    pub fn free_object(&mut self, handle: u32) -> BridgeResult<()> {
        self.handles.release(handle).map(drop)
    }

    /// Object behind a handle.
    pub fn resolve(&self, handle: u32) -> BridgeResult<ObjectRef> {
        self.handles.resolve(handle)
    }

    /// Encode values, minting handles for objects.
    pub fn encode(&mut self, values: &[Value]) -> BridgeResult<Vec<u8>> {
        codec::encode(values, &mut self.handles)
    }

    /// Decode values against the live handles.
    pub fn decode(&self, bytes: &[u8]) -> BridgeResult<Vec<Value>> {
        codec::decode(bytes, &self.handles)
    }

    // ── Callbacks ─────────────────────────────────────────────────

    /// Callback calls waiting for delivery.
    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    /// Next queued callback call as `(callback, event)` export arguments.
    ///
    /// The event object gets a fresh handle owned by the module. Calls to a
    /// callback whose handle the module already released are dropped.
    pub fn next_callback(&mut self) -> Option<(u32, i32)> {
        while let Some(pending) = self.callbacks.pop() {
            let Some(callback) = self.handles.find(&pending.callback) else {
                log::warn!("callback called after the module released it");
                continue;
            };
            let event = match pending.event {
                Some(event) => self.handles.allocate(event) as i32,
                None => NO_EVENT,
            };
            self.stats.callbacks_delivered += 1;
            return Some((callback, event));
        }
        None
    }

    /// Log how many callback calls are about to be delivered.
    pub fn trace_callbacks(&self) {
        let pending = self.pending_callbacks();
        if pending > 0 {
            log::trace!(target: "bridge::boundary", "delivering {} callback calls", pending);
        }
    }

    /// Undo a delivery the module never ran, dropping the rest of the queue.
    pub fn abandon_callback(&mut self, event: i32) {
        if event >= 0 {
            let _ = self.handles.release(event as u32);
        }
        let dropped = self.callbacks.clear();
        if dropped > 0 {
            log::warn!("{} queued callback calls dropped", dropped);
        }
    }

    /// Hand every queued callback call to the module.
    pub fn deliver_callbacks<M: GuestModule + ?Sized>(&mut self, module: &mut M) -> BridgeResult<()> {
        self.trace_callbacks();
        while let Some((callback, event)) = self.next_callback() {
            if let Err(err) = module.handle_callback(callback, event) {
                self.abandon_callback(event);
                return Err(err);
            }
        }
        Ok(())
    }

    // ── Call boundaries ───────────────────────────────────────────

    /// Run one request. Returns the encoded single-value response, or
    /// `None` for calls that have no response.
    ///
    /// Callback calls queued by a failed request are dropped.
    pub fn handle(&mut self, request: Request) -> BridgeResult<Option<Encoded>> {
        let result = self.handle_request(request);
        if result.is_err() {
            self.callbacks.clear();
        }
        result
    }

    fn handle_request(&mut self, request: Request) -> BridgeResult<Option<Encoded>> {
        let result = match request {
            Request::Invoke { code, params } => {
                self.stats.invocations += 1;
                // Bad code is reported before its parameters are looked at.
                let func = self.compile(text(&code)?)?;
                let args = codec::decode(&params, &self.handles)?;
                self.call_compiled(&func, &args)?
            }
            Request::FreeObject { handle } => {
                self.stats.releases += 1;
                self.free_object(handle)?;
                return Ok(None);
            }
            Request::QuerySelector { query } => {
                self.stats.queries += 1;
                self.query_selector(text(&query)?)?
            }
            Request::CreateElement { tag } => {
                self.stats.elements_created += 1;
                self.create_element(text(&tag)?)?
            }
            Request::CreateCallback => {
                self.stats.callbacks_created += 1;
                self.create_callback()
            }
        };
        codec::encode_tracked(&[result], &mut self.handles).map(Some)
    }

    /// Write a response into the module; on failure the handles it minted
    /// are released again.
    pub fn respond<M: GuestModule + ?Sized>(
        &mut self,
        module: &mut M,
        response: Encoded,
    ) -> BridgeResult<u32> {
        match write_response(module, &response.bytes) {
            Ok(ptr) => Ok(ptr),
            Err(err) => {
                self.discard(&response);
                Err(err)
            }
        }
    }

    /// Release the handles minted for a response that was never delivered.
    pub fn discard(&mut self, response: &Encoded) {
        for &id in &response.handles {
            let _ = self.handles.release(id);
        }
    }

    /// Run one call end to end: read the request out of module memory,
    /// execute it, deliver queued callbacks, write the response. Returns
    /// the response address.
    pub fn dispatch<M: GuestModule + ?Sized>(
        &mut self,
        module: &mut M,
        call: HostCall,
    ) -> BridgeResult<Option<u32>> {
        let result = self.dispatch_inner(module, call);
        if let Err(err) = &result {
            self.note_failure(call, err);
        }
        result
    }

    fn dispatch_inner<M: GuestModule + ?Sized>(
        &mut self,
        module: &mut M,
        call: HostCall,
    ) -> BridgeResult<Option<u32>> {
        let request = Request::read(&*module, call)?;
        self.trace_request(&request);
        let response = self.handle(request)?;
        if let Err(err) = self.deliver_callbacks(module) {
            if let Some(response) = &response {
                self.discard(response);
            }
            return Err(err);
        }
        match response {
            Some(response) => {
                let len = response.bytes.len();
                let ptr = self.respond(module, response)?;
                self.trace_response(call, ptr, len);
                Ok(Some(ptr))
            }
            None => Ok(None),
        }
    }

    /// Record a failed call.
    pub fn note_failure(&mut self, call: HostCall, err: &BridgeError) {
        self.stats.failures += 1;
        if err.is_fatal() {
            log::debug!("{} failed: {} ({:?})", call.import(), err, err.origin());
        } else {
            log::warn!("{}: {}", call.import(), err);
        }
    }

    /// Log a request when call tracing is on.
    pub fn trace_request(&self, request: &Request) {
        if self.config.trace_calls {
            log::trace!(
                target: "bridge::boundary",
                "{} <- {} request bytes",
                request.import(),
                request.len()
            );
        }
    }

    /// Log a response when call tracing is on.
    pub fn trace_response(&self, call: HostCall, ptr: u32, len: usize) {
        if self.config.trace_calls {
            log::trace!(
                target: "bridge::boundary",
                "{} -> {} response bytes at {:#x}",
                call.import(),
                len,
                ptr
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Node;
    use crate::memory::LocalModule;
    use alloc::vec;

    fn bridge() -> Bridge {
        Bridge::new(BridgeConfig::default())
    }

    #[test]
    fn test_invoke_adds_numbers() {
        let mut bridge = bridge();
        let params = bridge.encode(&[Value::Number(2.0), Value::Number(3.0)]).unwrap();
        let response = bridge
            .handle(Request::Invoke {
                code: b"(a, b) => a + b".to_vec(),
                params,
            })
            .unwrap()
            .unwrap();
        assert_eq!(bridge.decode(&response.bytes).unwrap(), vec![Value::Number(5.0)]);
        assert!(response.handles.is_empty());
    }

    #[test]
    fn test_compile_and_runtime_errors_are_distinct() {
        let mut bridge = bridge();
        let err = bridge.invoke("(a) => ", &[]).unwrap_err();
        assert!(matches!(err, BridgeError::CompileError(_)));
        assert_eq!(err.origin(), crate::error::ErrorOrigin::Bridge);

        let err = bridge.invoke("() => { throw 'nope'; }", &[]).unwrap_err();
        assert!(matches!(err, BridgeError::HostExecutionError(_)));
        assert_eq!(err.origin(), crate::error::ErrorOrigin::GuestCode);
    }

    #[test]
    fn test_receiver_is_neutral() {
        let mut bridge = bridge();
        let a = bridge.invoke("function () { this.x = 1; return this.x; }", &[]).unwrap();
        assert_eq!(a, Value::Number(1.0));
        // A fresh receiver every call.
        let b = bridge.invoke("function () { return this.x; }", &[]).unwrap();
        assert_eq!(b, Value::Undefined);
    }

    #[test]
    fn test_returning_function_is_unsupported() {
        let mut bridge = bridge();
        let err = bridge
            .handle(Request::Invoke {
                code: b"() => () => 1".to_vec(),
                params: vec![0, 0, 0, 0],
            })
            .unwrap_err();
        assert_eq!(err, BridgeError::UnsupportedType("function"));
        assert_eq!(bridge.handle_stats().live, 0);
    }

    #[test]
    fn test_query_selector_null_and_match() {
        let document = Document::new();
        let el = document.create_element("div").unwrap();
        el.set_attribute("class", "target");
        document.body().append_child(&el).unwrap();
        let mut bridge = Bridge::with_lookup(BridgeConfig::default(), document.clone());

        let response = bridge
            .handle(Request::QuerySelector { query: b".missing".to_vec() })
            .unwrap()
            .unwrap();
        assert_eq!(bridge.decode(&response.bytes).unwrap(), vec![Value::Null]);
        assert_eq!(bridge.handle_stats().capacity, 0);

        let response = bridge
            .handle(Request::QuerySelector { query: b"div.target".to_vec() })
            .unwrap()
            .unwrap();
        assert_eq!(response.bytes[4], 0x08);
        let resolved = bridge.resolve(response.handles[0]).unwrap();
        assert!(Rc::ptr_eq(&Node::from_object(&resolved).unwrap(), &el));
    }

    #[test]
    fn test_bad_selector_is_host_execution_error() {
        let mut bridge = bridge();
        let err = bridge.query_selector("div[").unwrap_err();
        assert!(matches!(err, BridgeError::HostExecutionError(_)));
    }

    #[test]
    fn test_invalid_code_text() {
        let mut bridge = bridge();
        let err = bridge
            .handle(Request::Invoke {
                code: vec![b'(', 0xff],
                params: vec![0, 0, 0, 0],
            })
            .unwrap_err();
        assert_eq!(err, BridgeError::InvalidText { offset: 1 });
    }

    #[test]
    fn test_document_global_and_registry() {
        let mut bridge = bridge();
        bridge.register_function("double", |args| {
            Ok(Value::Number(args.first().cloned().unwrap_or_default().to_number()? * 2.0))
        });
        let value = bridge
            .invoke(
                "(tag) => { const el = document.createElement(tag); document.body.appendChild(el); return double(document.body.childElementCount); }",
                &[Value::string("p")],
            )
            .unwrap();
        assert_eq!(value, Value::Number(2.0));
        assert_eq!(bridge.call("double", &[Value::Number(4.0)]).unwrap(), Value::Number(8.0));
        assert!(matches!(
            bridge.call("missing", &[]),
            Err(BridgeError::HostExecutionError(ScriptError::ReferenceError(_)))
        ));
    }

    #[test]
    fn test_document_capability_off() {
        let config = BridgeConfig::default().with_capabilities(Capabilities::ALL - Capabilities::DOCUMENT);
        let mut bridge = Bridge::new(config);
        assert!(bridge.invoke("() => document", &[]).is_err());
        // The query entry point still works.
        assert_eq!(bridge.query_selector("body").unwrap().kind_name(), "object");
    }

    #[test]
    fn test_dispatch_writes_response() {
        let mut bridge = bridge();
        let mut module = LocalModule::new(1, None).unwrap();
        let (code_ptr, code_len) = module.store(b"(s) => s.toUpperCase()").unwrap();
        let params = bridge.encode(&[Value::string("hi")]).unwrap();
        let (params_ptr, params_len) = module.store(&params).unwrap();

        let ptr = bridge
            .dispatch(
                &mut module,
                HostCall::Invoke {
                    code_ptr,
                    code_len,
                    params_ptr,
                    params_len,
                },
            )
            .unwrap();
        assert!(ptr.is_some());
        let response = module.response().unwrap().to_vec();
        assert_eq!(bridge.decode(&response).unwrap(), vec![Value::string("HI")]);
        assert_eq!(bridge.stats().invocations, 1);
    }

    #[test]
    fn test_dispatch_failure_writes_nothing() {
        let mut bridge = bridge();
        let mut module = LocalModule::new(1, None).unwrap();
        let (code_ptr, code_len) = module.store(b"(a) => {").unwrap();
        let err = bridge
            .dispatch(
                &mut module,
                HostCall::Invoke {
                    code_ptr,
                    code_len,
                    params_ptr: 0,
                    params_len: 0,
                },
            )
            .unwrap_err();
        // Empty params, but the code is at fault first.
        assert!(matches!(err, BridgeError::CompileError(_)));
        assert!(module.response().is_none());
        assert_eq!(bridge.stats().failures, 1);
    }

    #[test]
    fn test_code_is_compiled_before_params_are_decoded() {
        let mut bridge = bridge();
        let err = bridge
            .handle(Request::Invoke {
                code: b"(a) => {".to_vec(),
                params: vec![1, 2],
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::CompileError(_)));

        let err = bridge
            .handle(Request::Invoke {
                code: b"(a) => a".to_vec(),
                params: vec![1, 2],
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::Malformed(_)));
    }

    #[test]
    fn test_deeply_nested_code_is_a_compile_error() {
        let mut bridge = bridge();
        let code = alloc::format!("() => {}{}", "[".repeat(3000), "]".repeat(3000));
        let err = bridge.invoke(&code, &[]).unwrap_err();
        assert!(matches!(err, BridgeError::CompileError(ref e) if e.is_syntax()));

        let sum = alloc::format!("() => 0{}", " + 1".repeat(3000));
        assert!(matches!(
            bridge.invoke(&sum, &[]),
            Err(BridgeError::CompileError(_))
        ));

        // The limit is configurable.
        let mut shallow = Bridge::new(BridgeConfig::default().with_max_nesting_depth(4));
        assert!(shallow.invoke("() => [[[1]]]", &[]).is_err());
        assert_eq!(bridge.invoke("() => [[[1]]].length", &[]).unwrap(), Value::Number(1.0));
    }

    fn create_callback(bridge: &mut Bridge) -> (u32, Vec<u8>) {
        let response = bridge.handle(Request::CreateCallback).unwrap().unwrap();
        let id = response.handles[0];
        let params = [1, 0, 0, 0, 0x08]
            .into_iter()
            .chain(id.to_le_bytes())
            .collect();
        (id, params)
    }

    #[test]
    fn test_callback_delivered_before_response() {
        let mut bridge = bridge();
        let mut module = LocalModule::new(1, None).unwrap();
        let (id, params) = create_callback(&mut bridge);
        assert_eq!(bridge.stats().callbacks_created, 1);

        let (code_ptr, code_len) = module
            .store(b"(cb) => { cb({ kind: 'click' }); cb(); return typeof cb; }")
            .unwrap();
        let (params_ptr, params_len) = module.store(&params).unwrap();
        bridge
            .dispatch(
                &mut module,
                HostCall::Invoke {
                    code_ptr,
                    code_len,
                    params_ptr,
                    params_len,
                },
            )
            .unwrap();

        let delivered = module.take_callbacks();
        assert_eq!(delivered.len(), 2);
        let (callback, event) = delivered[0];
        assert_eq!(callback, id);
        let event = bridge.resolve(event as u32).unwrap();
        assert_eq!(event.get("kind").unwrap(), Value::string("click"));
        assert_eq!(delivered[1], (id, crate::callback::NO_EVENT));

        let response = module.response().unwrap().to_vec();
        assert_eq!(bridge.decode(&response).unwrap(), vec![Value::string("function")]);
        assert_eq!(bridge.stats().callbacks_delivered, 2);
        assert_eq!(bridge.pending_callbacks(), 0);
    }

    #[test]
    fn test_released_callback_is_not_delivered() {
        let mut bridge = bridge();
        let (id, _) = create_callback(&mut bridge);
        let callback = Value::Object(bridge.resolve(id).unwrap());
        bridge.free_object(id).unwrap();

        bridge.invoke("(cb) => cb()", &[callback]).unwrap();
        assert_eq!(bridge.pending_callbacks(), 1);
        assert_eq!(bridge.next_callback(), None);
        assert_eq!(bridge.stats().callbacks_delivered, 0);

        // A failing request drops what it queued.
        let (_, params) = create_callback(&mut bridge);
        let err = bridge
            .handle(Request::Invoke {
                code: b"(cb) => { cb(); throw 'late'; }".to_vec(),
                params,
            })
            .unwrap_err();
        assert!(matches!(err, BridgeError::HostExecutionError(_)));
        assert_eq!(bridge.pending_callbacks(), 0);
    }

    #[test]
    fn test_module_without_callback_export() {
        struct NoCallbacks(LocalModule);

        impl GuestModule for NoCallbacks {
            fn memory(&self) -> &[u8] {
                self.0.memory()
            }
            fn memory_mut(&mut self) -> &mut [u8] {
                self.0.memory_mut()
            }
            fn get_allocation(&mut self, len: u32) -> BridgeResult<u32> {
                self.0.get_allocation(len)
            }
        }

        let mut bridge = bridge();
        let mut module = NoCallbacks(LocalModule::new(1, None).unwrap());
        let (_, params) = create_callback(&mut bridge);
        let (code_ptr, code_len) = module.0.store(b"(cb) => cb(document.body)").unwrap();
        let (params_ptr, params_len) = module.0.store(&params).unwrap();
        let err = bridge
            .dispatch(
                &mut module,
                HostCall::Invoke {
                    code_ptr,
                    code_len,
                    params_ptr,
                    params_len,
                },
            )
            .unwrap_err();
        assert_eq!(err, BridgeError::MissingExport("handle_callback"));
        // Only the callback itself is still live; the event handle was undone.
        assert_eq!(bridge.handle_stats().live, 1);
        assert!(module.0.response().is_none());
    }

    #[test]
    fn test_double_free_is_reported_not_fatal() {
        let mut bridge = bridge();
        let id = bridge.handles_mut().allocate(ObjectRef::plain());
        bridge.free_object(id).unwrap();
        let err = bridge.free_object(id).unwrap_err();
        assert_eq!(err, BridgeError::DoubleRelease(id));
        assert!(!err.is_fatal());
        let a = bridge.handles_mut().allocate(ObjectRef::plain());
        let b = bridge.handles_mut().allocate(ObjectRef::plain());
        assert_eq!(a, id);
        assert_ne!(a, b);
    }
}
