//! Entry points the host exposes to the module.

use alloc::vec::Vec;
use core::fmt;

use crate::error::BridgeResult;
use crate::memory::{read_range, GuestModule};

/// Host functions a module may import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostImport {
    /// `__invoke(code_ptr, code_len, params_ptr, params_len)`
    Invoke,
    /// `__free_object(handle)`
    FreeObject,
    /// `__query_selector(query_ptr, query_len)`
    QuerySelector,
    /// `__create_element(tag_ptr, tag_len)`
    CreateElement,
    /// `__create_callback()`
    CreateCallback,
}

impl HostImport {
    /// Every import, in registration order.
    pub const ALL: [HostImport; 5] = [
        HostImport::Invoke,
        HostImport::FreeObject,
        HostImport::QuerySelector,
        HostImport::CreateElement,
        HostImport::CreateCallback,
    ];

    /// Import name.
    pub fn name(self) -> &'static str {
        match self {
            HostImport::Invoke => "__invoke",
            HostImport::FreeObject => "__free_object",
            HostImport::QuerySelector => "__query_selector",
            HostImport::CreateElement => "__create_element",
            HostImport::CreateCallback => "__create_callback",
        }
    }

    /// Number of `i32` parameters.
    pub fn arity(self) -> usize {
        match self {
            HostImport::Invoke => 4,
            HostImport::FreeObject => 1,
            HostImport::QuerySelector | HostImport::CreateElement => 2,
            HostImport::CreateCallback => 0,
        }
    }
}

impl fmt::Display for HostImport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One call across the boundary, with its raw arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostCall {
    Invoke {
        code_ptr: u32,
        code_len: u32,
        params_ptr: u32,
        params_len: u32,
    },
    FreeObject {
        handle: u32,
    },
    QuerySelector {
        query_ptr: u32,
        query_len: u32,
    },
    CreateElement {
        tag_ptr: u32,
        tag_len: u32,
    },
    CreateCallback,
}

impl HostCall {
    /// Build a call from an import and its `i32` arguments (reinterpreted as unsigned).
    pub fn from_args(import: HostImport, args: &[i32]) -> Option<HostCall> {
        if args.len() != import.arity() {
            return None;
        }
        let a = |i: usize| args[i] as u32;
        Some(match import {
            HostImport::Invoke => HostCall::Invoke {
                code_ptr: a(0),
                code_len: a(1),
                params_ptr: a(2),
                params_len: a(3),
            },
            HostImport::FreeObject => HostCall::FreeObject { handle: a(0) },
            HostImport::QuerySelector => HostCall::QuerySelector {
                query_ptr: a(0),
                query_len: a(1),
            },
            HostImport::CreateElement => HostCall::CreateElement {
                tag_ptr: a(0),
                tag_len: a(1),
            },
            HostImport::CreateCallback => HostCall::CreateCallback,
        })
    }

    /// Which import this call targets.
    pub fn import(&self) -> HostImport {
        match self {
            HostCall::Invoke { .. } => HostImport::Invoke,
            HostCall::FreeObject { .. } => HostImport::FreeObject,
            HostCall::QuerySelector { .. } => HostImport::QuerySelector,
            HostCall::CreateElement { .. } => HostImport::CreateElement,
            HostCall::CreateCallback => HostImport::CreateCallback,
        }
    }
}

/// A call with its request bytes copied out of module memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Invoke { code: Vec<u8>, params: Vec<u8> },
    FreeObject { handle: u32 },
    QuerySelector { query: Vec<u8> },
    CreateElement { tag: Vec<u8> },
    CreateCallback,
}

impl Request {
    /// Copy the request ranges of `call` out of `module`'s memory.
    pub fn read<M: GuestModule + ?Sized>(module: &M, call: HostCall) -> BridgeResult<Request> {
        let memory = module.memory();
        Ok(match call {
            HostCall::Invoke {
                code_ptr,
                code_len,
                params_ptr,
                params_len,
            } => Request::Invoke {
                code: read_range(memory, code_ptr, code_len)?,
                params: read_range(memory, params_ptr, params_len)?,
            },
            HostCall::FreeObject { handle } => Request::FreeObject { handle },
            HostCall::QuerySelector {
                query_ptr,
                query_len,
            } => Request::QuerySelector {
                query: read_range(memory, query_ptr, query_len)?,
            },
            HostCall::CreateElement { tag_ptr, tag_len } => Request::CreateElement {
                tag: read_range(memory, tag_ptr, tag_len)?,
            },
            HostCall::CreateCallback => Request::CreateCallback,
        })
    }

    /// Which import this request came through.
    pub fn import(&self) -> HostImport {
        match self {
            Request::Invoke { .. } => HostImport::Invoke,
            Request::FreeObject { .. } => HostImport::FreeObject,
            Request::QuerySelector { .. } => HostImport::QuerySelector,
            Request::CreateElement { .. } => HostImport::CreateElement,
            Request::CreateCallback => HostImport::CreateCallback,
        }
    }

    /// Total request bytes.
    pub fn len(&self) -> usize {
        match self {
            Request::Invoke { code, params } => code.len() + params.len(),
            Request::FreeObject { .. } | Request::CreateCallback => 0,
            Request::QuerySelector { query } => query.len(),
            Request::CreateElement { tag } => tag.len(),
        }
    }

    /// Check if the request carries no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_distinct() {
        for (i, a) in HostImport::ALL.iter().enumerate() {
            assert!(a.name().starts_with("__"));
            assert_eq!(alloc::format!("{}", a), a.name());
            for b in &HostImport::ALL[i + 1..] {
                assert_ne!(a.name(), b.name());
            }
        }
    }

    #[test]
    fn test_from_args() {
        let call = HostCall::from_args(HostImport::Invoke, &[16, 4, 32, -1]).unwrap();
        assert_eq!(
            call,
            HostCall::Invoke {
                code_ptr: 16,
                code_len: 4,
                params_ptr: 32,
                params_len: u32::MAX,
            }
        );
        assert_eq!(call.import(), HostImport::Invoke);
        assert!(HostCall::from_args(HostImport::FreeObject, &[1, 2]).is_none());
        assert_eq!(
            HostCall::from_args(HostImport::CreateCallback, &[]),
            Some(HostCall::CreateCallback)
        );
        for import in HostImport::ALL {
            let args = alloc::vec![0; import.arity()];
            assert_eq!(HostCall::from_args(import, &args).unwrap().import(), import);
        }
    }

    #[test]
    fn test_request_read_copies_ranges() {
        use crate::memory::LocalModule;
        use crate::error::BridgeError;

        let mut module = LocalModule::new(1, Some(1)).unwrap();
        let (ptr, len) = module.store(b"div.note").unwrap();
        let call = HostCall::QuerySelector {
            query_ptr: ptr,
            query_len: len,
        };
        let request = Request::read(&module, call).unwrap();
        assert_eq!(
            request,
            Request::QuerySelector {
                query: b"div.note".to_vec()
            }
        );
        assert_eq!(request.len(), 8);

        let past_end = HostCall::CreateElement {
            tag_ptr: 65_535,
            tag_len: 2,
        };
        assert!(matches!(
            Request::read(&module, past_end),
            Err(BridgeError::OutOfBounds { .. })
        ));
    }
}
