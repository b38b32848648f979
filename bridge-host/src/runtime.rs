//! Wasmtime embedding.
//!
//! Compiles a module, links the bridge imports into the configured
//! namespace and runs its `main` export. Each import copies its request
//! out of the module's memory, runs it against the [`Bridge`] stored in
//! the wasmtime store, re-enters the module through `handle_callback` for
//! every callback the request called, and finally writes the response
//! through the module's own `get_allocation` export.

use std::string::ToString;

use ::wasmtime::{
    Caller, Config, Engine, Extern, Instance, Linker, Memory, Module, Store, StoreLimits,
    StoreLimitsBuilder, TypedFunc,
};

use crate::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, BridgeResult};
use crate::imports::{HostCall, HostImport, Request};
use crate::memory::{write_response, GuestModule, CALLBACK_EXPORT, PAGE_SIZE};

/// Name of the module's memory export.
pub const MEMORY_EXPORT: &str = "memory";
/// Name of the module's allocation export.
pub const ALLOCATION_EXPORT: &str = "get_allocation";
/// Name of the module's entry point.
pub const ENTRY_EXPORT: &str = "main";

/// Data carried by the wasmtime store.
pub struct HostState {
    /// The module's bridge.
    pub bridge: Bridge,
    limits: StoreLimits,
}

impl HostState {
    /// Wrap a bridge, limiting memory growth to the configured maximum.
    pub fn new(bridge: Bridge) -> Self {
        let mut limits = StoreLimitsBuilder::new();
        if let Some(pages) = bridge.config().max_memory_pages {
            limits = limits.memory_size(pages as usize * PAGE_SIZE);
        }
        HostState {
            bridge,
            limits: limits.build(),
        }
    }
}

/// A module seen from inside one of its import calls.
struct CallerModule<'a, 'b> {
    caller: &'a mut Caller<'b, HostState>,
    memory: Memory,
    allocate: TypedFunc<i32, i32>,
}

impl<'a, 'b> CallerModule<'a, 'b> {
    fn new(caller: &'a mut Caller<'b, HostState>) -> BridgeResult<Self> {
        let memory = match caller.get_export(MEMORY_EXPORT) {
            Some(Extern::Memory(memory)) => memory,
            _ => return Err(BridgeError::MissingExport(MEMORY_EXPORT)),
        };
        let allocate = match caller.get_export(ALLOCATION_EXPORT) {
            Some(Extern::Func(func)) => func
                .typed::<i32, i32>(&*caller)
                .map_err(|_| BridgeError::MissingExport(ALLOCATION_EXPORT))?,
            _ => return Err(BridgeError::MissingExport(ALLOCATION_EXPORT)),
        };
        Ok(CallerModule {
            caller,
            memory,
            allocate,
        })
    }

    fn bridge(&mut self) -> &mut Bridge {
        &mut self.caller.data_mut().bridge
    }
}

impl GuestModule for CallerModule<'_, '_> {
    fn memory(&self) -> &[u8] {
        self.memory.data(&*self.caller)
    }

    fn memory_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut *self.caller)
    }

    fn get_allocation(&mut self, len: u32) -> BridgeResult<u32> {
        self.allocate
            .call(&mut *self.caller, len as i32)
            .map(|ptr| ptr as u32)
            .map_err(|err| BridgeError::Allocation(err.to_string()))
    }

    fn handle_callback(&mut self, callback: u32, event: i32) -> BridgeResult<()> {
        let func = match self.caller.get_export(CALLBACK_EXPORT) {
            Some(Extern::Func(func)) => func
                .typed::<(i32, i32), ()>(&*self.caller)
                .map_err(|_| BridgeError::MissingExport(CALLBACK_EXPORT))?,
            _ => return Err(BridgeError::MissingExport(CALLBACK_EXPORT)),
        };
        func.call(&mut *self.caller, (callback as i32, event))
            .map_err(|err| BridgeError::Callback(err.to_string()))
    }
}

fn deliver_callbacks(module: &mut CallerModule<'_, '_>) -> BridgeResult<()> {
    module.bridge().trace_callbacks();
    while let Some((callback, event)) = module.bridge().next_callback() {
        if let Err(err) = module.handle_callback(callback, event) {
            module.bridge().abandon_callback(event);
            return Err(err);
        }
    }
    Ok(())
}

fn run_call(module: &mut CallerModule<'_, '_>, call: HostCall) -> BridgeResult<()> {
    let request = Request::read(&*module, call)?;
    module.bridge().trace_request(&request);
    let response = module.bridge().handle(request)?;
    if let Err(err) = deliver_callbacks(module) {
        if let Some(response) = &response {
            module.bridge().discard(response);
        }
        return Err(err);
    }
    let Some(response) = response else {
        return Ok(());
    };
    match write_response(module, &response.bytes) {
        Ok(ptr) => {
            module.bridge().trace_response(call, ptr, response.bytes.len());
            Ok(())
        }
        Err(err) => {
            module.bridge().discard(&response);
            Err(err)
        }
    }
}

/// Entry for every import: fatal errors trap, the rest are logged.
fn host_call(caller: &mut Caller<'_, HostState>, call: HostCall) -> ::wasmtime::Result<()> {
    let result = CallerModule::new(caller).and_then(|mut module| run_call(&mut module, call));
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            caller.data_mut().bridge.note_failure(call, &err);
            if err.is_fatal() {
                Err(::wasmtime::Error::new(err))
            } else {
                Ok(())
            }
        }
    }
}

/// Build the call for `import` from the raw import arguments.
fn import_call(
    caller: &mut Caller<'_, HostState>,
    import: HostImport,
    args: &[i32],
) -> ::wasmtime::Result<()> {
    let call = HostCall::from_args(import, args).ok_or_else(|| {
        ::wasmtime::Error::msg(alloc::format!(
            "{} takes {} arguments, got {}",
            import,
            import.arity(),
            args.len()
        ))
    })?;
    host_call(caller, call)
}

/// Runs modules against a bridge.
pub struct WasmHost {
    engine: Engine,
    linker: Linker<HostState>,
    config: BridgeConfig,
}

impl WasmHost {
    /// Create a host with the bridge imports linked.
    pub fn new(config: BridgeConfig) -> ::wasmtime::Result<Self> {
        let engine = Engine::new(&Config::new())?;
        let mut linker = Linker::new(&engine);
        let ns = config.import_module;

        linker.func_wrap(
            ns,
            HostImport::Invoke.name(),
            |mut caller: Caller<'_, HostState>, code_ptr: i32, code_len: i32, params_ptr: i32, params_len: i32| {
                import_call(
                    &mut caller,
                    HostImport::Invoke,
                    &[code_ptr, code_len, params_ptr, params_len],
                )
            },
        )?;
        linker.func_wrap(
            ns,
            HostImport::FreeObject.name(),
            |mut caller: Caller<'_, HostState>, handle: i32| {
                import_call(&mut caller, HostImport::FreeObject, &[handle])
            },
        )?;
        linker.func_wrap(
            ns,
            HostImport::QuerySelector.name(),
            |mut caller: Caller<'_, HostState>, query_ptr: i32, query_len: i32| {
                import_call(&mut caller, HostImport::QuerySelector, &[query_ptr, query_len])
            },
        )?;
        linker.func_wrap(
            ns,
            HostImport::CreateElement.name(),
            |mut caller: Caller<'_, HostState>, tag_ptr: i32, tag_len: i32| {
                import_call(&mut caller, HostImport::CreateElement, &[tag_ptr, tag_len])
            },
        )?;
        linker.func_wrap(
            ns,
            HostImport::CreateCallback.name(),
            |mut caller: Caller<'_, HostState>| {
                import_call(&mut caller, HostImport::CreateCallback, &[])
            },
        )?;

        log::debug!("linked {} bridge imports under {:?}", HostImport::ALL.len(), ns);
        Ok(WasmHost {
            engine,
            linker,
            config,
        })
    }

    /// Configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Compile a module from binary or text.
    pub fn compile(&self, wasm: &[u8]) -> ::wasmtime::Result<Module> {
        Module::new(&self.engine, wasm)
    }

    /// Instantiate `module` against `bridge`.
    pub fn instantiate(
        &self,
        module: &Module,
        bridge: Bridge,
    ) -> ::wasmtime::Result<(Store<HostState>, Instance)> {
        let mut store = Store::new(&self.engine, HostState::new(bridge));
        store.limiter(|state| &mut state.limits);
        let instance = self.linker.instantiate(&mut store, module)?;
        if instance.get_memory(&mut store, MEMORY_EXPORT).is_none() {
            return Err(::wasmtime::Error::new(BridgeError::MissingExport(MEMORY_EXPORT)));
        }
        Ok((store, instance))
    }

    /// Compile, instantiate and run `main` with a fresh bridge.
    ///
    /// Returns the store data so callers can inspect the bridge afterwards.
    pub fn run(&self, wasm: &[u8]) -> ::wasmtime::Result<HostState> {
        let module = self.compile(wasm)?;
        let (mut store, instance) = self.instantiate(&module, Bridge::new(self.config.clone()))?;
        let main = instance.get_typed_func::<(), ()>(&mut store, ENTRY_EXPORT)?;
        main.call(&mut store, ())?;
        let stats = store.data().bridge.stats();
        log::debug!(
            "module finished: {} invocations, {} queries, {} failures, {} live handles",
            stats.invocations,
            stats.queries,
            stats.failures,
            store.data().bridge.handles().live_count()
        );
        Ok(store.into_data())
    }
}
