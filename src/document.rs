//! Owned XML tree for configuration documents
//!
//! This module provides the document abstraction the persistence engine and
//! the site codec operate on: a small owned DOM built on top of quick-xml's
//! event API.
//!
//! ## Design
//!
//! - **Ownership**: a [`Document`] exclusively owns its tree; elements are
//!   plain values with no back-references, so subtrees can be built
//!   stand-alone and attached later
//! - **Determinism**: serialization preserves attribute and child order and
//!   uses fixed indentation, so serializing the same tree twice produces
//!   byte-identical output
//! - **Diagnostics**: parse failures carry the byte offset reported by the
//!   underlying parser
//!
//! Declarations, comments, doctypes and processing instructions are not
//! represented; the writer always emits a UTF-8 declaration of its own.

use crate::error::{Result, StoreError};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde::{Deserialize, Serialize};
use std::str;

/// A node in the XML tree: a child element or a run of text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Node {
    /// Nested element
    Element(Element),
    /// Unescaped text content
    Text(String),
}

/// An XML element with ordered attributes and children
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Tag name
    name: String,
    /// Attributes in document order
    attributes: Vec<(String, String)>,
    /// Child nodes in document order
    children: Vec<Node>,
}

impl Element {
    /// Create an empty element with the given tag name
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Tag name of this element
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Value of an attribute, if present
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Set an attribute, replacing an existing value of the same name
    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(entry) => entry.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// Concatenated text content of this element's direct text children
    pub fn text(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            if let Node::Text(t) = child {
                out.push_str(t);
            }
        }
        out
    }

    /// Text content with surrounding whitespace removed
    pub fn trimmed_text(&self) -> String {
        self.text().trim().to_string()
    }

    /// First child element with the given tag name
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find_map(|node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// All child elements with the given tag name, in document order
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter_map(move |node| match node {
            Node::Element(e) if e.name == name => Some(e),
            _ => None,
        })
    }

    /// Text content of the first child element with the given name, or an
    /// empty string if there is no such child
    pub fn child_text(&self, name: &str) -> String {
        self.child(name).map(|e| e.text()).unwrap_or_default()
    }

    /// Integer content of the first child element with the given name
    ///
    /// Missing children and non-numeric content both yield 0, so range
    /// checks downstream treat them as out-of-range rather than panicking.
    pub fn child_int(&self, name: &str) -> i64 {
        self.child_text(name).trim().parse().unwrap_or(0)
    }

    /// Append a child element, returning a reference to it
    pub fn add_child(&mut self, element: Element) -> &mut Element {
        self.children.push(Node::Element(element));
        match self.children.last_mut() {
            Some(Node::Element(e)) => e,
            _ => unreachable!(),
        }
    }

    /// Append a child element containing only the given text
    ///
    /// Returns a reference to the new child so callers can attach
    /// attributes to it.
    pub fn add_text_element(
        &mut self,
        name: impl Into<String>,
        text: impl Into<String>,
    ) -> &mut Element {
        let mut element = Element::new(name);
        let text = text.into();
        if !text.is_empty() {
            element.children.push(Node::Text(text));
        }
        self.add_child(element)
    }

    /// Remove all children, keeping attributes intact
    pub fn clear_children(&mut self) {
        self.children.clear();
    }

    /// Whether this element has no children at all
    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    // Serialization targets an in-memory buffer, so write errors cannot
    // occur and are discarded.
    fn write_into(&self, writer: &mut Writer<Vec<u8>>) {
        let mut start = BytesStart::new(self.name.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() {
            let _ = writer.write_event(Event::Empty(start));
            return;
        }

        let _ = writer.write_event(Event::Start(start));
        for child in &self.children {
            match child {
                Node::Element(e) => e.write_into(writer),
                Node::Text(t) => {
                    let _ = writer.write_event(Event::Text(BytesText::new(t)));
                }
            }
        }
        let _ = writer.write_event(Event::End(BytesEnd::new(self.name.as_str())));
    }
}

/// A parsed XML document: the ordered list of top-level elements
///
/// Well-formed XML has exactly one top-level element, but a document is
/// allowed to be empty so that a missing root can be synthesized, and the
/// store needs to distinguish "no content" from "content with the wrong
/// root".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    top: Vec<Element>,
}

impl Document {
    /// Create a document with no content
    pub fn new() -> Self {
        Document::default()
    }

    /// Parse a document from raw bytes
    ///
    /// Fails with [`StoreError::Malformed`] carrying the parser's byte
    /// offset on any syntax or encoding error. Comments, doctypes and
    /// declarations are skipped; only elements and text are retained.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = str::from_utf8(data).map_err(|e| StoreError::Malformed {
            offset: e.valid_up_to() as u64,
            message: "invalid UTF-8".to_string(),
        })?;
        Self::parse_str(text)
    }

    /// Parse a document from a string slice
    pub fn parse_str(text: &str) -> Result<Self> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().trim_text(true);
        reader.config_mut().expand_empty_elements = true;

        let mut document = Document::new();
        let mut stack: Vec<Element> = Vec::new();

        loop {
            let position = reader.buffer_position() as u64;
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let mut element = Element::new(decode_name(e, position)?);
                    for attr in e.attributes() {
                        let attr = attr.map_err(|err| StoreError::Malformed {
                            offset: position,
                            message: err.to_string(),
                        })?;
                        let key = str::from_utf8(attr.key.as_ref())
                            .map_err(|_| StoreError::Malformed {
                                offset: position,
                                message: "invalid UTF-8 in attribute name".to_string(),
                            })?
                            .to_string();
                        let value = attr
                            .unescape_value()
                            .map_err(|err| StoreError::Malformed {
                                offset: position,
                                message: err.to_string(),
                            })?
                            .into_owned();
                        element.attributes.push((key, value));
                    }
                    stack.push(element);
                }
                Ok(Event::End(_)) => {
                    // Name mismatches are rejected by the reader itself
                    let element = match stack.pop() {
                        Some(e) => e,
                        None => {
                            return Err(StoreError::Malformed {
                                offset: position,
                                message: "unexpected closing tag".to_string(),
                            })
                        }
                    };
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(Node::Element(element)),
                        None => document.top.push(element),
                    }
                }
                Ok(Event::Text(ref e)) => {
                    let text = e.unescape().map_err(|err| StoreError::Malformed {
                        offset: position,
                        message: err.to_string(),
                    })?;
                    if let Some(current) = stack.last_mut() {
                        current.children.push(Node::Text(text.into_owned()));
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8(e.into_inner().into_owned())?;
                    if let Some(current) = stack.last_mut() {
                        current.children.push(Node::Text(text));
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(StoreError::Malformed {
                        offset: reader.buffer_position() as u64,
                        message: e.to_string(),
                    })
                }
            }
        }

        if !stack.is_empty() {
            return Err(StoreError::Malformed {
                offset: reader.buffer_position() as u64,
                message: "unclosed element".to_string(),
            });
        }

        Ok(document)
    }

    /// Serialize the document, including the UTF-8 declaration
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
        let _ = writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)));
        for element in &self.top {
            element.write_into(&mut writer);
        }
        writer.into_inner()
    }

    /// Whether the document has no top-level elements
    pub fn is_empty(&self) -> bool {
        self.top.is_empty()
    }

    /// The top-level element with the given name, if present
    pub fn root(&self, name: &str) -> Option<&Element> {
        self.top.iter().find(|e| e.name == name)
    }

    /// Mutable access to the top-level element with the given name
    pub fn root_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.top.iter_mut().find(|e| e.name == name)
    }

    /// The named root element, appending an empty one if it is missing
    pub fn ensure_root(&mut self, name: &str) -> &mut Element {
        if let Some(idx) = self.top.iter().position(|e| e.name == name) {
            return &mut self.top[idx];
        }
        self.top.push(Element::new(name));
        self.top.last_mut().expect("just pushed")
    }
}

fn decode_name(e: &BytesStart, position: u64) -> Result<String> {
    str::from_utf8(e.name().as_ref())
        .map(|s| s.to_string())
        .map_err(|_| StoreError::Malformed {
            offset: position,
            message: "invalid UTF-8 in tag name".to_string(),
        })
}
