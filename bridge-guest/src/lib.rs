//! KPIO Module Bridge (module side)
//!
//! What a sandboxed module links against to call into the host: the
//! import declarations, the `get_allocation` export the host writes
//! responses through, the `handle_callback` export the host calls back
//! through, a codec matching the host's, and object references that
//! release their host handle when the last owner drops.
//!
//! # Architecture
//!
//! - `host`: the `Host` trait, the response scratch buffer and, on
//!   `wasm32`, the real imports
//! - `codec`: encode parameters, decode responses
//! - `value`: guest values and owned handles
//! - `template`: `{}` placeholders to positional parameters
//! - `client`: `invoke`, `query_selector`, `create_element`, `create_callback`
//! - `callback`: closures the host can call
//!
//! The final module supplies its own global allocator and panic handler.
//!
//! # Example
//!
//! ```rust,no_run
//! # #[cfg(target_arch = "wasm32")]
//! # fn main() {
//! use bridge_guest::{Client, Value};
//!
//! let client = Client::imported();
//! let body = client.query_selector("body").unwrap();
//! client
//!     .invoke("{}.setAttribute({}, {})", &[body, "class".into(), "ready".into()])
//!     .unwrap();
//! # }
//! # #[cfg(not(target_arch = "wasm32"))]
//! # fn main() {}
//! ```

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod callback;
pub mod client;
pub mod codec;
pub mod error;
pub mod host;
pub mod template;
pub mod value;

pub use callback::{Callbacks, NO_EVENT};
pub use client::Client;
pub use error::{GuestError, GuestResult};
pub use host::{Host, Scratch};
pub use value::{ObjectRef, Value};

#[cfg(target_arch = "wasm32")]
pub use host::ImportedHost;
