//! Host element tree.
//!
//! A small in-memory document that the query entry point searches and that
//! dynamic code can reach through the `document` global. Embedders with a
//! real environment implement [`ElementLookup`] instead.

pub mod document;
pub mod node;
pub mod selector;

pub use document::Document;
pub use node::{ClassList, Node, NodeType};
pub use selector::{parse_selector_list, SelectorList};

use crate::object::ObjectRef;
use crate::script::ScriptResult;

/// Host environment the element entry points resolve against.
pub trait ElementLookup {
    /// First element matching `selector`, or `None`.
    ///
    /// An unparsable selector is an error raised by the lookup itself.
    fn query_selector(&self, selector: &str) -> ScriptResult<Option<ObjectRef>>;

    /// Create a detached element.
    fn create_element(&self, tag: &str) -> ScriptResult<ObjectRef>;

    /// Object installed as the `document` global, if any.
    fn global_object(&self) -> Option<ObjectRef> {
        None
    }
}
