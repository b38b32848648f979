//! The host as seen from the module.
//!
//! [`Host`] abstracts the imports. On `wasm32` the real imports are
//! wrapped by [`ImportedHost`]; responses land in a scratch buffer the
//! host fills through the exported `get_allocation`, and callbacks arrive
//! through the exported `handle_callback`.

use alloc::vec;
use alloc::vec::Vec;

use crate::error::{GuestError, GuestResult};

/// Initial scratch size.
pub const SCRATCH_INITIAL: usize = 1024;

/// Entry points the host provides.
pub trait Host {
    /// Run `code` with encoded `params`; returns the encoded result list.
    fn invoke(&self, code: &str, params: &[u8]) -> GuestResult<Vec<u8>>;

    /// Release a handle. Never fails from the module's point of view.
    fn free_object(&self, id: u32);

    /// Look up one element; returns the encoded result list.
    fn query_selector(&self, query: &str) -> GuestResult<Vec<u8>>;

    /// Create a detached element; returns the encoded result list.
    fn create_element(&self, tag: &str) -> GuestResult<Vec<u8>>;

    /// Create a callback object; returns the encoded result list.
    fn create_callback(&self) -> GuestResult<Vec<u8>>;
}

/// Response buffer handed to the host.
///
/// One region, reused between calls and replaced by a larger one when a
/// bigger response arrives.
pub struct Scratch {
    buffer: Vec<u8>,
    requested: Option<usize>,
}

impl Scratch {
    /// Create an empty scratch buffer.
    pub const fn new() -> Self {
        Scratch {
            buffer: Vec::new(),
            requested: None,
        }
    }

    /// Hand out at least `len` bytes.
    pub fn allocate(&mut self, len: usize) -> *mut u8 {
        if self.buffer.len() < len || self.buffer.is_empty() {
            self.buffer = vec![0; len.max(SCRATCH_INITIAL).max(self.buffer.len())];
        }
        self.requested = Some(len);
        self.buffer.as_mut_ptr()
    }

    /// Forget the previous response before a new call.
    pub fn reset(&mut self) {
        self.requested = None;
    }

    /// Copy out the bytes of the last response.
    pub fn take(&mut self) -> GuestResult<Vec<u8>> {
        let len = self.requested.take().ok_or(GuestError::NoResponse)?;
        Ok(self.buffer[..len].to_vec())
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Scratch::new()
    }
}

#[cfg(target_arch = "wasm32")]
pub use imported::{get_allocation, handle_callback, module_callbacks, ImportedHost};

#[cfg(target_arch = "wasm32")]
mod imported {
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::OnceCell;

    use super::{Host, Scratch};
    use crate::callback::Callbacks;
    use crate::error::GuestResult;

    #[link(wasm_import_module = "env")]
    extern "C" {
        fn __invoke(code_ptr: *const u8, code_len: u32, params_ptr: *const u8, params_len: u32);
        fn __free_object(handle: u32);
        fn __query_selector(query_ptr: *const u8, query_len: u32);
        fn __create_element(tag_ptr: *const u8, tag_len: u32);
        fn __create_callback();
    }

    static SCRATCH: spin::Mutex<Scratch> = spin::Mutex::new(Scratch::new());

    /// Called by the host to reserve space for a response.
    #[no_mangle]
    pub extern "C" fn get_allocation(len: u32) -> *mut u8 {
        SCRATCH.lock().allocate(len as usize)
    }

    // The lock must not be held across an import: the host re-enters
    // through `get_allocation`.
    fn call(f: impl FnOnce()) -> GuestResult<Vec<u8>> {
        SCRATCH.lock().reset();
        f();
        SCRATCH.lock().take()
    }

    struct Registry(OnceCell<Rc<Callbacks>>);

    // A module instance runs on a single thread.
    unsafe impl Sync for Registry {}

    static CALLBACKS: Registry = Registry(OnceCell::new());

    /// Callback registry of the running module.
    pub fn module_callbacks() -> Rc<Callbacks> {
        CALLBACKS.0.get_or_init(|| Rc::new(Callbacks::new())).clone()
    }

    /// Called by the host when dynamic code calls a callback.
    #[no_mangle]
    pub extern "C" fn handle_callback(callback: u32, event: i32) {
        let host: Rc<dyn Host> = Rc::new(ImportedHost);
        if let Err(err) = module_callbacks().dispatch(&host, callback, event) {
            log::warn!("handle_callback: {}", err);
        }
    }

    /// The imports of the running module.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct ImportedHost;

    impl Host for ImportedHost {
        fn invoke(&self, code: &str, params: &[u8]) -> GuestResult<Vec<u8>> {
            call(|| unsafe {
                __invoke(
                    code.as_ptr(),
                    code.len() as u32,
                    params.as_ptr(),
                    params.len() as u32,
                )
            })
        }

        fn free_object(&self, id: u32) {
            unsafe { __free_object(id) }
        }

        fn query_selector(&self, query: &str) -> GuestResult<Vec<u8>> {
            call(|| unsafe { __query_selector(query.as_ptr(), query.len() as u32) })
        }

        fn create_element(&self, tag: &str) -> GuestResult<Vec<u8>> {
            call(|| unsafe { __create_element(tag.as_ptr(), tag.len() as u32) })
        }

        fn create_callback(&self) -> GuestResult<Vec<u8>> {
            call(|| unsafe { __create_callback() })
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use alloc::string::String;
    use core::cell::RefCell;

    /// Host that answers every call with one fixed response and records releases.
    #[derive(Default)]
    pub struct RecordingHost {
        pub response: Vec<u8>,
        pub calls: RefCell<Vec<String>>,
        freed: RefCell<Vec<u32>>,
    }

    impl RecordingHost {
        pub fn answering(response: Vec<u8>) -> Self {
            RecordingHost {
                response,
                ..Default::default()
            }
        }

        pub fn freed(&self) -> Vec<u32> {
            self.freed.borrow().clone()
        }
    }

    impl Host for RecordingHost {
        fn invoke(&self, code: &str, _params: &[u8]) -> GuestResult<Vec<u8>> {
            self.calls.borrow_mut().push(String::from(code));
            Ok(self.response.clone())
        }

        fn free_object(&self, id: u32) {
            self.freed.borrow_mut().push(id);
        }

        fn query_selector(&self, query: &str) -> GuestResult<Vec<u8>> {
            self.calls.borrow_mut().push(String::from(query));
            Ok(self.response.clone())
        }

        fn create_element(&self, tag: &str) -> GuestResult<Vec<u8>> {
            self.calls.borrow_mut().push(String::from(tag));
            Ok(self.response.clone())
        }

        fn create_callback(&self) -> GuestResult<Vec<u8>> {
            self.calls.borrow_mut().push(String::from("callback"));
            Ok(self.response.clone())
        }
    }

    #[test]
    fn test_scratch_reuse_and_growth() {
        let mut scratch = Scratch::new();
        let first = scratch.allocate(16);
        assert_eq!(scratch.capacity(), SCRATCH_INITIAL);
        assert_eq!(scratch.allocate(512), first);
        scratch.allocate(4096);
        assert_eq!(scratch.capacity(), 4096);
        assert_eq!(scratch.take().unwrap().len(), 4096);
    }

    #[test]
    fn test_scratch_without_response() {
        let mut scratch = Scratch::new();
        scratch.allocate(8);
        scratch.reset();
        assert_eq!(scratch.take(), Err(GuestError::NoResponse));
    }
}
