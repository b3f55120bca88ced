//! The polymorphic element model: every CPIX element renders itself to an
//! XML subtree and populates itself from one. Lists are generic over the
//! element variant they hold.

use crate::error::Result;
use crate::xml::XmlNode;

pub(crate) trait Element: Sized + Default {
    /// Name of the list element wrapping this variant in a document.
    const LIST_NAME: &'static str;

    /// Renders the element as an XML subtree. `None` when the element is in
    /// an incomplete state (a required field is missing).
    fn to_node(&self) -> Option<XmlNode>;

    /// Builds an element from an XML subtree, consuming the node's children.
    fn from_node(node: &mut XmlNode) -> Result<Self>;

    /// Renders the element as an XML fragment string, `None` when
    /// incomplete.
    fn serialize(&self) -> Option<String> {
        self.to_node().map(|node| node.to_xml())
    }
}

/// An ordered sequence of elements of one variant, serialized as a wrapper
/// element containing one child per entry.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct ElementList<T> {
    pub id: Option<String>,
    items: Vec<T>,
}

impl<T: Element> ElementList<T> {
    /// `None` when the list is empty, or when any entry is incomplete (an
    /// incomplete entry makes the whole document incomplete).
    pub fn to_node(&self) -> Option<XmlNode> {
        if self.items.is_empty() {
            return None;
        }
        let mut root = XmlNode::new("", T::LIST_NAME);
        if let Some(id) = &self.id {
            root.add_attribute("id", id);
        }
        for item in &self.items {
            root.add_child(item.to_node()?);
        }
        Some(root)
    }

    /// Populates the list from its wrapper node; an absent node leaves the
    /// list empty. Aborts on the first entry that fails to parse.
    pub fn from_node(&mut self, node: Option<XmlNode>) -> Result<()> {
        let Some(mut node) = node else {
            return Ok(());
        };
        if let Some(id) = node.attribute("id") {
            self.id = Some(id.to_string());
        }
        while let Some(mut child) = node.take_first_child() {
            self.items.push(T::from_node(&mut child)?);
        }
        Ok(())
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
