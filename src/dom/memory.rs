//! In-memory [`Document`] implementation.
//!
//! Arena of element nodes behind one lock. Used by hosts without a real DOM
//! and by tests. Markup passed to [`Document::replace_content`] is stored
//! verbatim, not parsed.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

use super::{Document, NodeId};

// ============================================================================
// NodeData
// ============================================================================

#[derive(Debug, Default)]
struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attributes: FxHashMap<String, String>,
    content: Option<String>,
}

// ============================================================================
// MemoryDocument
// ============================================================================

/// Element tree held in memory.
#[derive(Debug)]
pub struct MemoryDocument {
    nodes: RwLock<Vec<NodeData>>,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// Creates a document holding only an `html` root.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(vec![NodeData {
                tag: "html".to_string(),
                ..NodeData::default()
            }]),
        }
    }

    /// Appends a new element under `parent` and returns it.
    ///
    /// An unknown `parent` yields a detached node.
    pub fn append(&self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let mut nodes = self.nodes.write();
        let id = NodeId::new(nodes.len());
        let parent = (parent.index() < nodes.len()).then_some(parent);

        nodes.push(NodeData {
            tag: tag.to_string(),
            parent,
            attributes: attributes
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            ..NodeData::default()
        });

        if let Some(parent) = parent {
            nodes[parent.index()].children.push(id);
        }
        id
    }

    /// Sets an attribute on an existing node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `node` does not exist.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        let data = nodes
            .get_mut(node.index())
            .ok_or_else(|| unknown_node(node))?;
        data.attributes.insert(name.to_string(), value.to_string());
        Ok(())
    }

    /// Returns the tag name of `node`.
    #[must_use]
    pub fn tag(&self, node: NodeId) -> Option<String> {
        self.nodes.read().get(node.index()).map(|n| n.tag.clone())
    }

    /// Returns the markup last written into `node`.
    #[must_use]
    pub fn content(&self, node: NodeId) -> Option<String> {
        self.nodes
            .read()
            .get(node.index())
            .and_then(|n| n.content.clone())
    }

    /// Returns the number of nodes ever created, detached ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Always `false`; the root always exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Document for MemoryDocument {
    fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.read().get(node.index()).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(node.index())
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .read()
            .get(node.index())
            .and_then(|n| n.attributes.get(name).cloned())
    }

    fn replace_content(&self, node: NodeId, markup: &str) -> Result<()> {
        let mut nodes = self.nodes.write();
        let children = {
            let data = nodes
                .get_mut(node.index())
                .ok_or_else(|| unknown_node(node))?;
            data.content = Some(markup.to_string());
            std::mem::take(&mut data.children)
        };
        for child in children {
            nodes[child.index()].parent = None;
        }
        Ok(())
    }
}

fn unknown_node(node: NodeId) -> Error {
    Error::protocol(format!("no such node {node}"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_links_parent() {
        let doc = MemoryDocument::new();
        let div = doc.append(doc.root(), "div", &[("id", "main")]);

        assert_eq!(doc.parent(div), Some(doc.root()));
        assert_eq!(doc.children(doc.root()), vec![div]);
        assert_eq!(doc.attribute(div, "id").as_deref(), Some("main"));
        assert_eq!(doc.tag(div).as_deref(), Some("div"));
        assert_eq!(doc.len(), 2);
    }

    #[test]
    fn test_set_attribute() {
        let doc = MemoryDocument::new();
        let div = doc.append(doc.root(), "div", &[]);
        doc.set_attribute(div, "athena:id", "5").expect("set");
        assert_eq!(doc.attribute(div, "athena:id").as_deref(), Some("5"));
        assert!(doc.set_attribute(NodeId::new(99), "x", "y").is_err());
    }

    #[test]
    fn test_replace_content_detaches_children() {
        let doc = MemoryDocument::new();
        let div = doc.append(doc.root(), "div", &[]);
        let span = doc.append(div, "span", &[]);

        doc.replace_content(div, "<b>hi</b>").expect("replace");

        assert!(doc.children(div).is_empty());
        assert_eq!(doc.parent(span), None);
        assert_eq!(doc.content(div).as_deref(), Some("<b>hi</b>"));
    }

    #[test]
    fn test_unknown_node() {
        let doc = MemoryDocument::new();
        let ghost = NodeId::new(42);
        assert!(doc.children(ghost).is_empty());
        assert_eq!(doc.attribute(ghost, "x"), None);
        assert!(doc.replace_content(ghost, "").is_err());
    }
}
