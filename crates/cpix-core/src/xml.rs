//! A small owned XML tree over quick-xml.
//!
//! The element model works on detached subtrees: every `take_*` accessor
//! unlinks the returned node from its parent, so a deserializer can consume
//! children one by one. Attribute order is insertion order and serialization
//! adds no whitespace, which keeps document output byte-stable.

use std::io::Cursor;

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::{Error, Result};

/// One XML element: namespace prefix (possibly empty), local name,
/// insertion-ordered attributes, text content, and ordered children.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct XmlNode {
    prefix: String,
    name: String,
    attributes: Vec<(String, String)>,
    content: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    pub fn new(prefix: &str, name: &str) -> Self {
        XmlNode {
            prefix: prefix.to_string(),
            name: name.to_string(),
            ..XmlNode::default()
        }
    }

    /// Parses a well-formed XML string and returns its root element.
    ///
    /// Namespace declarations (`xmlns`, `xmlns:*`) are consumed by the
    /// parser and do not appear in the attribute map; the CPIX serializer
    /// re-declares them on the document root itself.
    pub fn parse(xml: &str) -> Result<XmlNode> {
        let mut reader = Reader::from_str(xml);
        reader.trim_text(true);

        let mut stack: Vec<XmlNode> = Vec::new();
        let mut root: Option<XmlNode> = None;
        loop {
            match reader
                .read_event()
                .map_err(|e| Error::XmlMalformed(e.to_string()))?
            {
                Event::Start(start) => stack.push(Self::from_start(&start)?),
                Event::Empty(start) => {
                    let node = Self::from_start(&start)?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Event::End(_) => {
                    let node = stack
                        .pop()
                        .ok_or_else(|| Error::XmlMalformed("unbalanced end tag".into()))?;
                    Self::attach(&mut stack, &mut root, node)?;
                }
                Event::Text(text) => {
                    let text = text
                        .unescape()
                        .map_err(|e| Error::XmlMalformed(e.to_string()))?;
                    if let Some(top) = stack.last_mut() {
                        top.content.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(top) = stack.last_mut() {
                        top.content
                            .push_str(&String::from_utf8_lossy(data.as_ref()));
                    }
                }
                Event::Eof => break,
                // Declarations, comments, and processing instructions carry
                // nothing the document model needs.
                _ => {}
            }
        }
        if !stack.is_empty() {
            return Err(Error::XmlMalformed("unclosed element".into()));
        }
        root.ok_or_else(|| Error::XmlMalformed("no root element".into()))
    }

    fn from_start(start: &BytesStart<'_>) -> Result<XmlNode> {
        let (prefix, name) = split_qname(start.name().as_ref());
        let mut node = XmlNode::new(&prefix, &name);
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::XmlMalformed(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            if key == "xmlns" || key.starts_with("xmlns:") {
                continue;
            }
            let value = attr
                .unescape_value()
                .map_err(|e| Error::XmlMalformed(e.to_string()))?;
            node.attributes.push((key, value.into_owned()));
        }
        Ok(node)
    }

    fn attach(stack: &mut Vec<XmlNode>, root: &mut Option<XmlNode>, node: XmlNode) -> Result<()> {
        match stack.last_mut() {
            Some(parent) => parent.children.push(node),
            None if root.is_none() => *root = Some(node),
            None => return Err(Error::XmlMalformed("multiple root elements".into())),
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_attribute(&mut self, name: &str, value: &str) {
        self.attributes.push((name.to_string(), value.to_string()));
    }

    /// Returns the attribute value, or `None` if the attribute is absent.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_content(&mut self, content: &str) {
        self.content = content.to_string();
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn add_child(&mut self, child: XmlNode) {
        self.children.push(child);
    }

    /// Detaches and returns the first child, if any.
    pub fn take_first_child(&mut self) -> Option<XmlNode> {
        if self.children.is_empty() {
            None
        } else {
            Some(self.children.remove(0))
        }
    }

    /// Detaches and returns the first child with the given local name.
    pub fn take_child(&mut self, name: &str) -> Option<XmlNode> {
        let idx = self.children.iter().position(|c| c.name == name)?;
        Some(self.children.remove(idx))
    }

    /// Detaches and returns every child with the given local name.
    pub fn take_children(&mut self, name: &str) -> Vec<XmlNode> {
        let mut taken = Vec::new();
        let mut i = 0;
        while i < self.children.len() {
            if self.children[i].name == name {
                taken.push(self.children.remove(i));
            } else {
                i += 1;
            }
        }
        taken
    }

    /// Walks a direct-descendant line by local name, detaching each node
    /// along the way. `None` if any step is missing.
    pub fn take_descendant(&mut self, path: &[&str]) -> Option<XmlNode> {
        let (first, rest) = path.split_first()?;
        let mut node = self.take_child(first)?;
        for step in rest {
            node = node.take_child(step)?;
        }
        Some(node)
    }

    /// Serializes this subtree to XML text with no added whitespace.
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        self.write_into(&mut writer)
            .expect("writing XML to an in-memory buffer");
        String::from_utf8(writer.into_inner().into_inner())
            .expect("serialized XML is valid UTF-8")
    }

    fn write_into(&self, writer: &mut Writer<Cursor<Vec<u8>>>) -> quick_xml::Result<()> {
        let qname = self.qname();
        let mut start = BytesStart::new(qname.as_str());
        for (key, value) in &self.attributes {
            start.push_attribute((key.as_str(), value.as_str()));
        }

        if self.children.is_empty() && self.content.is_empty() {
            writer.write_event(Event::Empty(start))?;
            return Ok(());
        }

        writer.write_event(Event::Start(start))?;
        if !self.content.is_empty() {
            writer.write_event(Event::Text(BytesText::new(&self.content)))?;
        }
        for child in &self.children {
            child.write_into(writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(qname.as_str())))?;
        Ok(())
    }

    fn qname(&self) -> String {
        if self.prefix.is_empty() {
            self.name.clone()
        } else {
            format!("{}:{}", self.prefix, self.name)
        }
    }
}

fn split_qname(qname: &[u8]) -> (String, String) {
    let qname = String::from_utf8_lossy(qname);
    match qname.split_once(':') {
        Some((prefix, local)) => (prefix.to_string(), local.to_string()),
        None => (String::new(), qname.into_owned()),
    }
}

/// Contract for schema validation of serialized documents. Wiring an XSD
/// engine is outside the core; callers supply an implementation.
pub trait SchemaValidator {
    fn validate(&self, xml: &str) -> bool;
}
