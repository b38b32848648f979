//! Element tree nodes.
//!
//! Nodes are shared (`Rc`) so the same element keeps one identity no
//! matter how many handles or script values point at it. Parents are held
//! weakly.

use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::any::Any;
use core::cell::RefCell;

use super::selector::{parse_selector_list, SelectorList};
use crate::object::{HostObject, ObjectRef};
use crate::script::{ScriptError, ScriptResult};
use crate::value::Value;

/// DOM node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NodeType {
    Element = 1,
    Text = 3,
    Document = 9,
}

/// Node data.
#[derive(Debug)]
pub enum NodeData {
    /// Element node; tag stored lowercase.
    Element {
        tag: String,
        attrs: RefCell<Vec<(String, String)>>,
    },
    /// Text node
    Text { content: RefCell<String> },
}

/// A node in the element tree.
pub struct Node {
    data: NodeData,
    parent: RefCell<Weak<Node>>,
    children: RefCell<Vec<Rc<Node>>>,
    this: Weak<Node>,
}

impl Node {
    fn with_data(data: NodeData) -> Rc<Node> {
        Rc::new_cyclic(|this| Node {
            data,
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            this: this.clone(),
        })
    }

    /// Create a detached element.
    pub fn new_element(tag: &str) -> Rc<Node> {
        Node::with_data(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: RefCell::new(Vec::new()),
        })
    }

    /// Create a detached text node.
    pub fn new_text(text: &str) -> Rc<Node> {
        Node::with_data(NodeData::Text {
            content: RefCell::new(String::from(text)),
        })
    }

    /// Recover the shared node behind an object reference.
    pub fn from_object(obj: &ObjectRef) -> Option<Rc<Node>> {
        obj.downcast_ref::<Node>()?.this.upgrade()
    }

    /// Wrap this node as a script object.
    pub fn to_object(self: &Rc<Self>) -> ObjectRef {
        ObjectRef::from_rc(self.clone())
    }

    /// Node type.
    pub fn node_type(&self) -> NodeType {
        match self.data {
            NodeData::Element { .. } => NodeType::Element,
            NodeData::Text { .. } => NodeType::Text,
        }
    }

    /// Check if this is an element.
    pub fn is_element(&self) -> bool {
        matches!(self.data, NodeData::Element { .. })
    }

    /// Lowercase tag name, for elements.
    pub fn tag(&self) -> Option<&str> {
        match &self.data {
            NodeData::Element { tag, .. } => Some(tag),
            NodeData::Text { .. } => None,
        }
    }

    // ── Attributes ────────────────────────────────────────────────

    /// Get an attribute value.
    pub fn attribute(&self, name: &str) -> Option<String> {
        match &self.data {
            NodeData::Element { attrs, .. } => attrs
                .borrow()
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text { .. } => None,
        }
    }

    /// Set an attribute value. No-op on text nodes.
    pub fn set_attribute(&self, name: &str, value: &str) {
        if let NodeData::Element { attrs, .. } = &self.data {
            let name = name.to_ascii_lowercase();
            let mut attrs = attrs.borrow_mut();
            match attrs.iter_mut().find(|(k, _)| *k == name) {
                Some(slot) => slot.1 = String::from(value),
                None => attrs.push((name, String::from(value))),
            }
        }
    }

    /// Remove an attribute; returns whether it was present.
    pub fn remove_attribute(&self, name: &str) -> bool {
        match &self.data {
            NodeData::Element { attrs, .. } => {
                let name = name.to_ascii_lowercase();
                let mut attrs = attrs.borrow_mut();
                let before = attrs.len();
                attrs.retain(|(k, _)| *k != name);
                attrs.len() != before
            }
            NodeData::Text { .. } => false,
        }
    }

    /// Class names, in attribute order.
    pub fn class_names(&self) -> Vec<String> {
        self.attribute("class")
            .map(|c| c.split_whitespace().map(String::from).collect())
            .unwrap_or_default()
    }

    /// Check for a class name.
    pub fn has_class(&self, class: &str) -> bool {
        self.attribute("class")
            .is_some_and(|c| c.split_whitespace().any(|name| name == class))
    }

    fn set_class_names(&self, names: &[String]) {
        self.set_attribute("class", &names.join(" "));
    }

    // ── Tree ──────────────────────────────────────────────────────

    /// Parent node.
    pub fn parent(&self) -> Option<Rc<Node>> {
        self.parent.borrow().upgrade()
    }

    /// Parent, if it is an element.
    pub fn parent_element(&self) -> Option<Rc<Node>> {
        self.parent().filter(|p| p.is_element())
    }

    /// Child nodes.
    pub fn child_nodes(&self) -> Vec<Rc<Node>> {
        self.children.borrow().clone()
    }

    /// Child elements.
    pub fn element_children(&self) -> Vec<Rc<Node>> {
        self.children
            .borrow()
            .iter()
            .filter(|c| c.is_element())
            .cloned()
            .collect()
    }

    /// Check whether `other` is this node or one of its descendants.
    pub fn contains(&self, other: &Rc<Node>) -> bool {
        let mut current = Some(other.clone());
        while let Some(node) = current {
            if core::ptr::eq(Rc::as_ptr(&node), self) {
                return true;
            }
            current = node.parent();
        }
        false
    }

    /// Detach from the current parent, if any.
    pub fn detach(&self) {
        if let Some(parent) = self.parent() {
            parent
                .children
                .borrow_mut()
                .retain(|c| !core::ptr::eq(Rc::as_ptr(c), self));
        }
        *self.parent.borrow_mut() = Weak::new();
    }

    /// Append a child, moving it from its old parent.
    pub fn append_child(&self, child: &Rc<Node>) -> ScriptResult<()> {
        if !self.is_element() {
            return Err(ScriptError::type_error("This node type does not support children"));
        }
        if child.contains(&self.this.upgrade().ok_or_else(detached_error)?) {
            return Err(ScriptError::type_error(
                "The new child element contains the parent",
            ));
        }
        child.detach();
        *child.parent.borrow_mut() = self.this.clone();
        self.children.borrow_mut().push(child.clone());
        Ok(())
    }

    /// Remove a direct child.
    pub fn remove_child(&self, child: &Rc<Node>) -> ScriptResult<()> {
        let is_child = child
            .parent()
            .is_some_and(|p| core::ptr::eq(Rc::as_ptr(&p), self));
        if !is_child {
            return Err(ScriptError::type_error(
                "The node to be removed is not a child of this node",
            ));
        }
        child.detach();
        Ok(())
    }

    fn clear_children(&self) {
        for child in self.children.borrow_mut().drain(..) {
            *child.parent.borrow_mut() = Weak::new();
        }
    }

    /// Descendant elements in document order.
    pub fn descendants(&self) -> Vec<Rc<Node>> {
        let mut out = Vec::new();
        let mut stack: Vec<Rc<Node>> = self.children.borrow().iter().rev().cloned().collect();
        while let Some(node) = stack.pop() {
            if node.is_element() {
                stack.extend(node.children.borrow().iter().rev().cloned());
                out.push(node);
            }
        }
        out
    }

    // ── Text ──────────────────────────────────────────────────────

    /// Concatenated text of all descendants.
    pub fn text_content(&self) -> String {
        match &self.data {
            NodeData::Text { content } => content.borrow().clone(),
            NodeData::Element { .. } => {
                let mut out = String::new();
                for child in self.children.borrow().iter() {
                    out.push_str(&child.text_content());
                }
                out
            }
        }
    }

    /// Replace content with text. An empty string leaves an element with no children.
    pub fn set_text_content(&self, text: &str) {
        match &self.data {
            NodeData::Text { content } => *content.borrow_mut() = String::from(text),
            NodeData::Element { .. } => {
                self.clear_children();
                if !text.is_empty() {
                    let node = Node::new_text(text);
                    *node.parent.borrow_mut() = self.this.clone();
                    self.children.borrow_mut().push(node);
                }
            }
        }
    }

    /// Serialize children as markup.
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in self.children.borrow().iter() {
            child.write_html(&mut out);
        }
        out
    }

    fn write_html(&self, out: &mut String) {
        match &self.data {
            NodeData::Text { content } => escape_into(out, &content.borrow(), false),
            NodeData::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs.borrow().iter() {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    escape_into(out, value, true);
                    out.push('"');
                }
                out.push('>');
                out.push_str(&self.inner_html());
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────────

    /// First descendant element matching `selector`.
    pub fn query_selector(&self, selector: &str) -> ScriptResult<Option<Rc<Node>>> {
        let list = parse_selector_list(selector)?;
        Ok(first_match(&list, self.descendants()))
    }

    /// All descendant elements matching `selector`.
    pub fn query_selector_all(&self, selector: &str) -> ScriptResult<Vec<Rc<Node>>> {
        let list = parse_selector_list(selector)?;
        Ok(self
            .descendants()
            .into_iter()
            .filter(|n| list.matches(n))
            .collect())
    }
}

/// First node of `candidates` matching `list`.
pub fn first_match(list: &SelectorList, candidates: Vec<Rc<Node>>) -> Option<Rc<Node>> {
    candidates.into_iter().find(|n| list.matches(n))
}

fn detached_error() -> ScriptError {
    ScriptError::type_error("node is no longer alive")
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
}

/// Script value for an optional node.
pub fn node_value(node: Option<Rc<Node>>) -> Value {
    node.map_or(Value::Null, |n| Value::Object(n.to_object()))
}

/// Script array of nodes.
pub fn node_array(nodes: Vec<Rc<Node>>) -> Value {
    Value::Object(ObjectRef::array(
        nodes.into_iter().map(|n| Value::Object(n.to_object())).collect(),
    ))
}

/// Extract a node argument.
pub fn node_arg(args: &[Value], method: &str) -> ScriptResult<Rc<Node>> {
    args.first()
        .and_then(Value::as_object)
        .and_then(Node::from_object)
        .ok_or_else(|| {
            ScriptError::type_error(format!(
                "Failed to execute '{}': parameter 1 is not of type 'Node'",
                method
            ))
        })
}

fn text_arg(args: &[Value], i: usize) -> String {
    args.get(i).map(Value::to_js_string).unwrap_or_default()
}

impl HostObject for Node {
    fn class_name(&self) -> &'static str {
        match self.data {
            NodeData::Element { .. } => "HTMLElement",
            NodeData::Text { .. } => "Text",
        }
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        let this = self.this.upgrade().ok_or_else(detached_error)?;
        let value = match key {
            "nodeType" => Value::Number(self.node_type() as u16 as f64),
            "textContent" => Value::String(self.text_content()),
            "parentNode" => node_value(self.parent()),
            "parentElement" => node_value(self.parent_element()),
            "childNodes" => node_array(self.child_nodes()),
            _ => match &self.data {
                NodeData::Text { content } => match key {
                    "nodeName" => Value::string("#text"),
                    "data" | "nodeValue" => Value::String(content.borrow().clone()),
                    "length" => Value::Number(content.borrow().encode_utf16().count() as f64),
                    _ => Value::Undefined,
                },
                NodeData::Element { tag, .. } => match key {
                    "tagName" | "nodeName" => Value::String(tag.to_ascii_uppercase()),
                    "id" => Value::String(self.attribute("id").unwrap_or_default()),
                    "className" => Value::String(self.attribute("class").unwrap_or_default()),
                    "innerHTML" => Value::String(self.inner_html()),
                    "children" => node_array(self.element_children()),
                    "childElementCount" => Value::Number(self.element_children().len() as f64),
                    "firstElementChild" => node_value(self.element_children().first().cloned()),
                    "lastElementChild" => node_value(self.element_children().last().cloned()),
                    "classList" => Value::Object(ObjectRef::new(ClassList { node: this })),
                    _ => Value::Undefined,
                },
            },
        };
        Ok(value)
    }

    fn set(&self, key: &str, value: Value) -> ScriptResult<()> {
        match (key, &self.data) {
            ("textContent", _) => self.set_text_content(&value.to_js_string()),
            ("data" | "nodeValue", NodeData::Text { .. }) => {
                self.set_text_content(&value.to_js_string())
            }
            ("innerHTML", NodeData::Element { .. }) => {
                self.set_text_content(&value.to_js_string())
            }
            ("id", NodeData::Element { .. }) => self.set_attribute("id", &value.to_js_string()),
            ("className", NodeData::Element { .. }) => {
                self.set_attribute("class", &value.to_js_string())
            }
            _ => {
                return Err(ScriptError::type_error(format!(
                    "Cannot assign to property '{}' of {}",
                    key,
                    self.class_name()
                )));
            }
        }
        Ok(())
    }

    fn call_method(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        match name {
            "remove" => {
                self.detach();
                return Ok(Value::Undefined);
            }
            "contains" => {
                let other = args.first().and_then(Value::as_object).and_then(Node::from_object);
                return Ok(Value::Boolean(other.is_some_and(|o| self.contains(&o))));
            }
            _ => {}
        }
        if !self.is_element() {
            return Err(ScriptError::type_error(format!("Text.{} is not a function", name)));
        }
        match name {
            "getAttribute" => Ok(self
                .attribute(&text_arg(args, 0).to_ascii_lowercase())
                .map_or(Value::Null, Value::String)),
            "setAttribute" => {
                self.set_attribute(&text_arg(args, 0), &text_arg(args, 1));
                Ok(Value::Undefined)
            }
            "removeAttribute" => {
                self.remove_attribute(&text_arg(args, 0));
                Ok(Value::Undefined)
            }
            "hasAttribute" => Ok(Value::Boolean(
                self.attribute(&text_arg(args, 0).to_ascii_lowercase()).is_some(),
            )),
            "appendChild" => {
                let child = node_arg(args, "appendChild")?;
                self.append_child(&child)?;
                Ok(Value::Object(child.to_object()))
            }
            "removeChild" => {
                let child = node_arg(args, "removeChild")?;
                self.remove_child(&child)?;
                Ok(Value::Object(child.to_object()))
            }
            "querySelector" => Ok(node_value(self.query_selector(&text_arg(args, 0))?)),
            "querySelectorAll" => Ok(node_array(self.query_selector_all(&text_arg(args, 0))?)),
            _ => Err(ScriptError::type_error(format!(
                "HTMLElement.{} is not a function",
                name
            ))),
        }
    }

    fn to_display_string(&self) -> String {
        format!("[object {}]", self.class_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Live view of an element's `class` attribute.
pub struct ClassList {
    node: Rc<Node>,
}

impl HostObject for ClassList {
    fn class_name(&self) -> &'static str {
        "DOMTokenList"
    }

    fn get(&self, key: &str) -> ScriptResult<Value> {
        let names = self.node.class_names();
        Ok(match key {
            "length" => Value::Number(names.len() as f64),
            "value" => Value::String(self.node.attribute("class").unwrap_or_default()),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| names.get(i).cloned())
                .map_or(Value::Undefined, Value::String),
        })
    }

    fn call_method(&self, name: &str, args: &[Value]) -> ScriptResult<Value> {
        let mut names = self.node.class_names();
        match name {
            "contains" => Ok(Value::Boolean(self.node.has_class(&text_arg(args, 0)))),
            "add" => {
                for token in args.iter().map(Value::to_js_string) {
                    if !names.contains(&token) {
                        names.push(token);
                    }
                }
                self.node.set_class_names(&names);
                Ok(Value::Undefined)
            }
            "remove" => {
                let tokens: Vec<String> = args.iter().map(Value::to_js_string).collect();
                names.retain(|n| !tokens.contains(n));
                self.node.set_class_names(&names);
                Ok(Value::Undefined)
            }
            "toggle" => {
                let token = text_arg(args, 0);
                let present = names.contains(&token);
                let want = match args.get(1) {
                    Some(force) if !force.is_undefined() => force.to_boolean(),
                    _ => !present,
                };
                if want && !present {
                    names.push(token);
                } else if !want && present {
                    names.retain(|n| *n != token);
                }
                self.node.set_class_names(&names);
                Ok(Value::Boolean(want))
            }
            _ => Err(ScriptError::type_error(format!(
                "DOMTokenList.{} is not a function",
                name
            ))),
        }
    }

    fn to_display_string(&self) -> String {
        self.node.attribute("class").unwrap_or_default()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (Rc<Node>, Rc<Node>, Rc<Node>) {
        let root = Node::new_element("DIV");
        let a = Node::new_element("span");
        let b = Node::new_element("p");
        root.append_child(&a).unwrap();
        root.append_child(&b).unwrap();
        (root, a, b)
    }

    #[test]
    fn test_append_moves_node() {
        let (root, a, b) = tree();
        b.append_child(&a).unwrap();
        assert_eq!(root.element_children().len(), 1);
        assert!(Rc::ptr_eq(&a.parent().unwrap(), &b));
        assert!(root.append_child(&root).is_err());
        assert!(b.append_child(&root).is_err());
    }

    #[test]
    fn test_text_content_and_inner_html() {
        let (root, a, _) = tree();
        a.set_text_content("x < y");
        a.set_attribute("title", "say \"hi\"");
        assert_eq!(root.text_content(), "x < y");
        assert_eq!(
            root.inner_html(),
            "<span title=\"say &quot;hi&quot;\">x &lt; y</span><p></p>"
        );
        root.set("innerHTML", Value::string("")).unwrap();
        assert_eq!(root.child_nodes().len(), 0);
        assert!(a.parent().is_none());
    }

    #[test]
    fn test_script_properties() {
        let (root, a, _) = tree();
        a.set("id", Value::string("first")).unwrap();
        assert_eq!(a.get("tagName").unwrap(), Value::string("SPAN"));
        assert_eq!(root.get("childElementCount").unwrap(), Value::Number(2.0));
        let parent = a.get("parentElement").unwrap();
        assert_eq!(parent.as_object(), Some(&root.to_object()));
        assert_eq!(
            a.call_method("getAttribute", &[Value::string("missing")]).unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_class_list() {
        let (_, a, _) = tree();
        let list = ClassList { node: a.clone() };
        list.call_method("add", &[Value::string("x"), Value::string("y")]).unwrap();
        list.call_method("remove", &[Value::string("x")]).unwrap();
        assert_eq!(a.attribute("class").as_deref(), Some("y"));
        assert_eq!(
            list.call_method("toggle", &[Value::string("z")]).unwrap(),
            Value::Boolean(true)
        );
        assert!(a.has_class("z"));
        assert_eq!(
            list.call_method("toggle", &[Value::string("z"), Value::Boolean(true)]).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(list.get("length").unwrap(), Value::Number(2.0));
    }

    #[test]
    fn test_query_in_document_order() {
        let (root, a, _) = tree();
        let inner = Node::new_element("p");
        a.append_child(&inner).unwrap();
        let found = root.query_selector("p").unwrap().unwrap();
        assert!(Rc::ptr_eq(&found, &inner));
        assert_eq!(root.query_selector_all("p").unwrap().len(), 2);
        assert!(root.query_selector("div").unwrap().is_none());
        assert!(root.query_selector("p[").is_err());
    }
}
