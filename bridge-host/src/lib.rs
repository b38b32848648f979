//! KPIO Module Bridge (host side)
//!
//! Lets a sandboxed module call into the host by value: arguments and
//! results cross the boundary as encoded buffers, host objects cross as
//! integer handles, and the module supplies the memory responses are
//! written into.
//!
//! # Architecture
//!
//! - `codec`: encode/decode value lists to the wire format
//! - `handles`: id <-> object table with a LIFO free-list
//! - `memory`: request reads and response writes against module memory
//! - `imports`: the entry points a module imports
//! - `bridge`: one bridge per module; dynamic invoke, query, create
//! - `callback`: host stand-ins for module closures
//! - `script`: embedded evaluator for dynamic code
//! - `dom`: in-memory element tree the query entry point searches
//! - `runtime`: wasmtime embedding (`wasmtime` feature)
//!
//! # Example
//!
//! ```
//! use bridge_host::{Bridge, BridgeConfig, Value};
//!
//! let mut bridge = Bridge::new(BridgeConfig::default());
//! let sum = bridge
//!     .invoke("(a, b) => a + b", &[Value::Number(2.0), Value::Number(3.0)])
//!     .unwrap();
//! assert_eq!(sum, Value::Number(5.0));
//! ```

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod bridge;
pub mod callback;
pub mod codec;
pub mod config;
pub mod dom;
pub mod error;
pub mod handles;
pub mod imports;
pub mod memory;
pub mod object;
pub mod script;
pub mod value;

#[cfg(feature = "wasmtime")]
pub mod runtime;

pub use bridge::{Bridge, BridgeStats};
pub use callback::{CallbackQueue, NO_EVENT};
pub use codec::Encoded;
pub use config::{BridgeConfig, Capabilities};
pub use dom::{Document, ElementLookup, Node};
pub use error::{BridgeError, BridgeResult, ErrorOrigin};
pub use handles::{HandleStats, HandleTable};
pub use imports::{HostCall, HostImport, Request};
pub use memory::{GuestModule, LinearMemory, LocalModule};
pub use object::{ArrayObject, HostObject, ObjectRef, PlainObject};
pub use script::{ScriptError, ScriptResult};
pub use value::{Function, Value};

#[cfg(feature = "wasmtime")]
pub use runtime::{HostState, WasmHost};
