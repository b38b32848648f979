//! Selector parsing and matching.
//!
//! Supports `*`, type, `#id`, `.class`, attribute selectors
//! (`[a]`, `[a=v]`, `[a^=v]`, `[a$=v]`, `[a*=v]`), compound sequences,
//! descendant and child combinators, and comma-separated lists.

use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::iter::Peekable;
use core::str::CharIndices;

use super::node::Node;
use crate::script::ScriptError;

/// A list of selectors (comma-separated).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectorList {
    pub selectors: Vec<Selector>,
}

impl SelectorList {
    /// Check whether any selector in the list matches `element`.
    pub fn matches(&self, element: &Rc<Node>) -> bool {
        self.selectors.iter().any(|s| s.matches(element))
    }
}

/// A complex selector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selector {
    /// The components of this selector, in source order.
    pub components: Vec<SelectorComponent>,
}

/// A component of a selector.
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorComponent {
    /// Universal selector `*`
    Universal,
    /// Type selector (e.g., `div`), stored lowercase
    Type(String),
    /// Class selector (e.g., `.item`)
    Class(String),
    /// ID selector (e.g., `#main`)
    Id(String),
    /// Attribute selector
    Attribute {
        name: String,
        operator: AttributeOperator,
        value: Option<String>,
    },
    /// Combinator between compound selectors
    Combinator(Combinator),
}

/// Attribute selector operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeOperator {
    /// `[attr]` - has attribute
    Exists,
    /// `[attr=value]` - exact match
    Equals,
    /// `[attr^=value]` - starts with
    Prefix,
    /// `[attr$=value]` - ends with
    Suffix,
    /// `[attr*=value]` - contains
    Substring,
}

/// Selector combinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    /// Descendant combinator (space)
    Descendant,
    /// Child combinator `>`
    Child,
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::Descendant => write!(f, " "),
            Combinator::Child => write!(f, " > "),
        }
    }
}

impl Selector {
    /// Split into compound selectors and the combinator preceding each.
    fn compounds(&self) -> Vec<(Option<Combinator>, Vec<&SelectorComponent>)> {
        let mut out = Vec::new();
        let mut pending = None;
        let mut current = Vec::new();
        for component in &self.components {
            match component {
                SelectorComponent::Combinator(c) => {
                    out.push((pending, core::mem::take(&mut current)));
                    pending = Some(*c);
                }
                other => current.push(other),
            }
        }
        out.push((pending, current));
        out
    }

    /// Check if this selector matches `element`.
    pub fn matches(&self, element: &Rc<Node>) -> bool {
        let compounds = self.compounds();
        match_from(&compounds, compounds.len() - 1, element)
    }
}

fn match_from(
    compounds: &[(Option<Combinator>, Vec<&SelectorComponent>)],
    index: usize,
    element: &Rc<Node>,
) -> bool {
    let (combinator, parts) = &compounds[index];
    if !parts.iter().all(|part| matches_simple(part, element)) {
        return false;
    }
    match combinator {
        None => true,
        Some(Combinator::Child) => element
            .parent_element()
            .is_some_and(|parent| match_from(compounds, index - 1, &parent)),
        Some(Combinator::Descendant) => {
            let mut ancestor = element.parent_element();
            while let Some(node) = ancestor {
                if match_from(compounds, index - 1, &node) {
                    return true;
                }
                ancestor = node.parent_element();
            }
            false
        }
    }
}

fn matches_simple(component: &SelectorComponent, element: &Node) -> bool {
    match component {
        SelectorComponent::Universal => element.is_element(),
        SelectorComponent::Type(name) => element.tag() == Some(name.as_str()),
        SelectorComponent::Class(name) => element.has_class(name),
        SelectorComponent::Id(id) => element.attribute("id").as_deref() == Some(id.as_str()),
        SelectorComponent::Attribute {
            name,
            operator,
            value,
        } => {
            let Some(actual) = element.attribute(name) else {
                return false;
            };
            let expected = value.as_deref().unwrap_or("");
            match operator {
                AttributeOperator::Exists => true,
                AttributeOperator::Equals => actual == expected,
                AttributeOperator::Prefix => !expected.is_empty() && actual.starts_with(expected),
                AttributeOperator::Suffix => !expected.is_empty() && actual.ends_with(expected),
                AttributeOperator::Substring => !expected.is_empty() && actual.contains(expected),
            }
        }
        SelectorComponent::Combinator(_) => false,
    }
}

/// Selector parser.
struct SelectorParser<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

impl<'a> SelectorParser<'a> {
    fn new(source: &'a str) -> Self {
        SelectorParser {
            source,
            chars: source.char_indices().peekable(),
        }
    }

    fn error(&self) -> ScriptError {
        ScriptError::syntax(format!("'{}' is not a valid selector", self.source))
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn skip_whitespace(&mut self) -> bool {
        let mut skipped = false;
        while self.peek_char().is_some_and(char::is_whitespace) {
            self.chars.next();
            skipped = true;
        }
        skipped
    }

    fn parse_name(&mut self) -> Result<String, ScriptError> {
        let mut name = String::new();
        while let Some(c) = self.peek_char().filter(|c| is_name_char(*c)) {
            name.push(c);
            self.chars.next();
        }
        if name.is_empty() {
            return Err(self.error());
        }
        Ok(name)
    }

    fn parse_selector_list(&mut self) -> Result<SelectorList, ScriptError> {
        let mut list = SelectorList::default();
        loop {
            self.skip_whitespace();
            list.selectors.push(self.parse_selector()?);
            match self.peek_char() {
                Some(',') => {
                    self.chars.next();
                }
                None => break,
                Some(_) => return Err(self.error()),
            }
        }
        Ok(list)
    }

    fn parse_selector(&mut self) -> Result<Selector, ScriptError> {
        let mut selector = Selector::default();
        let mut pending: Option<Combinator> = None;

        loop {
            if self.skip_whitespace() && !selector.components.is_empty() && pending.is_none() {
                pending = Some(Combinator::Descendant);
            }
            let Some(c) = self.peek_char() else { break };
            if c == ',' {
                break;
            }
            if c == '>' {
                if selector.components.is_empty() || pending == Some(Combinator::Child) {
                    return Err(self.error());
                }
                self.chars.next();
                pending = Some(Combinator::Child);
                continue;
            }

            if let Some(combinator) = pending.take() {
                selector
                    .components
                    .push(SelectorComponent::Combinator(combinator));
            }

            let component = match c {
                '*' => {
                    self.chars.next();
                    SelectorComponent::Universal
                }
                '#' => {
                    self.chars.next();
                    SelectorComponent::Id(self.parse_name()?)
                }
                '.' => {
                    self.chars.next();
                    SelectorComponent::Class(self.parse_name()?)
                }
                '[' => {
                    self.chars.next();
                    self.parse_attribute()?
                }
                c if is_name_char(c) => SelectorComponent::Type(self.parse_name()?.to_ascii_lowercase()),
                _ => return Err(self.error()),
            };
            selector.components.push(component);
        }

        if selector.components.is_empty() || pending == Some(Combinator::Child) {
            return Err(self.error());
        }
        Ok(selector)
    }

    fn parse_attribute(&mut self) -> Result<SelectorComponent, ScriptError> {
        self.skip_whitespace();
        let name = self.parse_name()?.to_ascii_lowercase();
        self.skip_whitespace();

        let operator = match self.chars.next().map(|(_, c)| c) {
            Some(']') => {
                return Ok(SelectorComponent::Attribute {
                    name,
                    operator: AttributeOperator::Exists,
                    value: None,
                });
            }
            Some('=') => AttributeOperator::Equals,
            Some(op @ ('^' | '$' | '*')) => {
                if self.chars.next().map(|(_, c)| c) != Some('=') {
                    return Err(self.error());
                }
                match op {
                    '^' => AttributeOperator::Prefix,
                    '$' => AttributeOperator::Suffix,
                    _ => AttributeOperator::Substring,
                }
            }
            _ => return Err(self.error()),
        };

        self.skip_whitespace();
        let value = match self.peek_char() {
            Some(quote @ ('"' | '\'')) => {
                self.chars.next();
                let mut value = String::new();
                loop {
                    match self.chars.next() {
                        Some((_, c)) if c == quote => break,
                        Some((_, c)) => value.push(c),
                        None => return Err(self.error()),
                    }
                }
                value
            }
            _ => self.parse_name()?,
        };
        self.skip_whitespace();
        if self.chars.next().map(|(_, c)| c) != Some(']') {
            return Err(self.error());
        }
        Ok(SelectorComponent::Attribute {
            name,
            operator,
            value: Some(value),
        })
    }
}

/// Parse a selector list.
pub fn parse_selector_list(source: &str) -> Result<SelectorList, ScriptError> {
    SelectorParser::new(source).parse_selector_list()
}
