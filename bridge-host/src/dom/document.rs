//! The document: root of the element tree and entry point for lookups.

use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;

use super::node::{first_match, node_array, node_value, Node, NodeType};
use super::selector::parse_selector_list;
use super::ElementLookup;
use crate::object::{HostObject, ObjectRef};
use crate::script::{ScriptError, ScriptResult};
use crate::value::Value;

/// An HTML document with `<html>`, `<head>` and `<body>`.
pub struct Document {
    root: Rc<Node>,
    head: Rc<Node>,
    body: Rc<Node>,
    this: Weak<Document>,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Rc<Document> {
        let root = Node::new_element("html");
        let head = Node::new_element("head");
        let body = Node::new_element("body");
        // Fresh elements cannot form a cycle.
        let _ = root.append_child(&head);
        let _ = root.append_child(&body);
        Rc::new_cyclic(|this| Document {
            root,
            head,
            body,
            this: this.clone(),
        })
    }

    /// The `<html>` element.
    pub fn document_element(&self) -> &Rc<Node> {
        &self.root
    }

    /// The `<head>` element.
    pub fn head(&self) -> &Rc<Node> {
        &self.head
    }

    /// The `<body>` element.
    pub fn body(&self) -> &Rc<Node> {
        &self.body
    }

    /// Wrap the document as a script object.
    pub fn to_object(&self) -> Option<ObjectRef> {
        self.this.upgrade().map(|doc| ObjectRef::from_rc(doc))
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> ScriptResult<Rc<Node>> {
        let valid = tag.chars().next().is_some_and(|c| c.is_ascii_alphabetic())
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if !valid {
            return Err(ScriptError::type_error(format!(
                "The tag name provided ('{}') is not a valid name",
                tag
            )));
        }
        Ok(Node::new_element(tag))
    }

    fn all_elements(&self) -> Vec<Rc<Node>> {
        let mut all = Vec::new();
        all.push(self.root.clone());
        all.extend(self.root.descendants());
        all
    }

    /// First element whose `id` is `id`.
    pub fn get_element_by_id(&self, id: &str) -> Option<Rc<Node>> {
        self.all_elements()
            .into_iter()
            .find(|n| n.attribute("id").as_deref() == Some(id))
    }

    /// First element matching `selector`, in document order.
    pub fn query_selector(&self, selector: &str) -> ScriptResult<Option<Rc<Node>>> {
        let list = parse_selector_list(selector)?;
        Ok(first_match(&list, self.all_elements()))
    }

    /// All elements matching `selector`, in document order.
    pub fn query_selector_all(&self, selector: &str) -> ScriptResult<Vec<Rc<Node>>> {
        let list = parse_selector_list(selector)?;
        Ok(self
            .all_elements()
            .into_iter()
            .filter(|n| list.matches(n))
            .collect())
    }
}

fn text_arg(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::to_js_string).unwrap_or_default()
}

impl HostObject for Document {
    fn class_name(&self) -> &'static str {
        "HTMLDocument"
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        Ok(match key {
            "nodeType" => Value::Number(NodeType::Document as u16 as f64),
            "documentElement" => Value::Object(self.root.to_object()),
            "head" => Value::Object(self.head.to_object()),
            "body" => Value::Object(self.body.to_object()),
            _ => Value::Undefined,
        })
    }

    fn call_method(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        match name {
            "createElement" => Ok(Value::Object(
                self.create_element(&text_arg(args, 0))?.to_object(),
            )),
            "createTextNode" => Ok(Value::Object(Node::new_text(&text_arg(args, 0)).to_object())),
            "getElementById" => Ok(node_value(self.get_element_by_id(&text_arg(args, 0)))),
            "querySelector" => Ok(node_value(self.query_selector(&text_arg(args, 0))?)),
            "querySelectorAll" => Ok(node_array(self.query_selector_all(&text_arg(args, 0))?)),
            _ => Err(ScriptError::type_error(format!(
                "HTMLDocument.{} is not a function",
                name
            ))),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl ElementLookup for Document {
    fn query_selector(&self, selector: &str) -> ScriptResult<Option<ObjectRef>> {
        Ok(Document::query_selector(self, selector)?.map(|n| n.to_object()))
    }

    fn create_element(&self, tag: &str) -> ScriptResult<ObjectRef> {
        Ok(Document::create_element(self, tag)?.to_object())
    }

    fn global_object(&self) -> Option<ObjectRef> {
        self.to_object()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skeleton() {
        let doc = Document::new();
        assert_eq!(doc.document_element().element_children().len(), 2);
        assert!(Rc::ptr_eq(&doc.query_selector("body").unwrap().unwrap(), doc.body()));
        assert!(Rc::ptr_eq(&doc.query_selector("html").unwrap().unwrap(), doc.document_element()));
    }

    #[test]
    fn test_lookup_by_id_and_selector() {
        let doc = Document::new();
        let el = doc.create_element("section").unwrap();
        el.set_attribute("id", "main");
        doc.body().append_child(&el).unwrap();

        assert!(Rc::ptr_eq(&doc.get_element_by_id("main").unwrap(), &el));
        let found = ElementLookup::query_selector(&*doc, "#main").unwrap().unwrap();
        assert_eq!(found, el.to_object());
        assert!(ElementLookup::query_selector(&*doc, "#other").unwrap().is_none());
        assert!(ElementLookup::query_selector(&*doc, "#").is_err());
    }

    #[test]
    fn test_create_element_validates_name() {
        let doc = Document::new();
        assert!(doc.create_element("my-widget").is_ok());
        assert!(doc.create_element("").is_err());
        assert!(doc.create_element("1abc").is_err());
        assert!(doc.create_element("a b").is_err());
    }

    #[test]
    fn test_global_object_identity() {
        let doc = Document::new();
        let a = doc.global_object().unwrap();
        let b = doc.global_object().unwrap();
        assert_eq!(a, b);
        assert!(a.downcast_ref::<Document>().is_some());
    }
}
