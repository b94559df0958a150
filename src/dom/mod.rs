//! Document seam for live objects.
//!
//! Live objects are bound to nodes of the rendered page. The core reaches
//! the page only through [`Document`]: walk the tree, read attributes, and
//! replace a subtree's content. Attribute name mangling and markup parsing
//! are the host's business.
//!
//! # Markup Attributes
//!
//! | Attribute | Meaning |
//! |-----------|---------|
//! | `athena:id` | Object id assigned by the server at render time |
//! | `athena:class` | Registered widget type to instantiate |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `memory` | In-memory [`Document`] for non-browser hosts |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use crate::error::{Error, Result};
use crate::identifiers::ObjectId;

// ============================================================================
// Submodules
// ============================================================================

/// In-memory document.
pub mod memory;

pub use memory::MemoryDocument;

// ============================================================================
// Constants
// ============================================================================

/// Attribute carrying a node's object id.
pub const ATTR_OBJECT_ID: &str = "athena:id";

/// Attribute naming a node's widget type.
pub const ATTR_TYPE_NAME: &str = "athena:class";

// ============================================================================
// NodeId
// ============================================================================

/// Handle to one node of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Creates a node handle from the host's index.
    #[inline]
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the host's index.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Document
// ============================================================================

/// The rendered page, as the core sees it.
pub trait Document: Send + Sync {
    /// Returns the document element.
    fn root(&self) -> NodeId;

    /// Returns the parent of `node`, `None` for the root or a detached node.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Returns the element children of `node` in document order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Returns the value of attribute `name` on `node`.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Replaces everything below `node` with `markup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Protocol`] if `node` does not exist.
    fn replace_content(&self, node: NodeId, markup: &str) -> Result<()>;
}

// ============================================================================
// Tree Queries
// ============================================================================

/// Returns every node below `root` in document order, `root` excluded.
#[must_use]
pub fn descendants(doc: &dyn Document, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = doc.children(root).into_iter().rev().collect();
    while let Some(node) = stack.pop() {
        out.push(node);
        stack.extend(doc.children(node).into_iter().rev());
    }
    out
}

/// Returns the object id rendered on `node`, if any.
#[must_use]
pub fn object_id_of(doc: &dyn Document, node: NodeId) -> Option<ObjectId> {
    doc.attribute(node, ATTR_OBJECT_ID)
        .as_deref()
        .and_then(ObjectId::parse)
}

/// Returns the widget type named on `node`, if any.
#[must_use]
pub fn type_name_of(doc: &dyn Document, node: NodeId) -> Option<String> {
    doc.attribute(node, ATTR_TYPE_NAME)
        .filter(|name| !name.trim().is_empty())
}

/// Walks from `node` up to the first node carrying an object id.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if no ancestor (or `node` itself) has one.
pub fn owning_node(doc: &dyn Document, node: NodeId) -> Result<(NodeId, ObjectId)> {
    let mut current = Some(node);
    while let Some(n) = current {
        if let Some(id) = object_id_of(doc, n) {
            return Ok((n, id));
        }
        current = doc.parent(n);
    }
    Err(Error::protocol(format!(
        "node {node} has no ancestor carrying an object id"
    )))
}

/// Finds the single node in the document rendered with `object_id`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if zero or several nodes carry the id.
pub fn find_object_node(doc: &dyn Document, object_id: ObjectId) -> Result<NodeId> {
    let root = doc.root();
    let matches: Vec<NodeId> = std::iter::once(root)
        .chain(descendants(doc, root))
        .filter(|&n| object_id_of(doc, n) == Some(object_id))
        .collect();

    match matches.as_slice() {
        [node] => Ok(*node),
        nodes => Err(Error::protocol(format!(
            "{} nodes with object id {object_id}",
            nodes.len()
        ))),
    }
}

/// Returns every node below `root` whose attribute `name` equals `value`.
#[must_use]
pub fn nodes_by_attribute(doc: &dyn Document, root: NodeId, name: &str, value: &str) -> Vec<NodeId> {
    descendants(doc, root)
        .into_iter()
        .filter(|&n| doc.attribute(n, name).as_deref() == Some(value))
        .collect()
}

/// Returns the single node below `root` whose attribute `name` equals `value`.
///
/// # Errors
///
/// Returns [`Error::Protocol`] if there is no such node or more than one.
pub fn node_by_attribute(doc: &dyn Document, root: NodeId, name: &str, value: &str) -> Result<NodeId> {
    match nodes_by_attribute(doc, root, name, value).as_slice() {
        [node] => Ok(*node),
        [] => Err(Error::protocol(format!(
            "no node with {name}={value:?} beneath {root}"
        ))),
        nodes => Err(Error::protocol(format!(
            "found {} nodes with {name}={value:?} beneath {root}",
            nodes.len()
        ))),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// <html>
    ///   <div athena:id=1 athena:class=Counter>
    ///     <span class=label/>
    ///     <p><b class=label/></p>
    ///   </div>
    ///   <div athena:id=2/>
    /// </html>
    fn page() -> (MemoryDocument, [NodeId; 5]) {
        let doc = MemoryDocument::new();
        let root = doc.root();
        let widget = doc.append(root, "div", &[(ATTR_OBJECT_ID, "1"), (ATTR_TYPE_NAME, "Counter")]);
        let span = doc.append(widget, "span", &[("class", "label")]);
        let p = doc.append(widget, "p", &[]);
        let b = doc.append(p, "b", &[("class", "label")]);
        let other = doc.append(root, "div", &[(ATTR_OBJECT_ID, "2")]);
        (doc, [widget, p, b, other, span])
    }

    #[test]
    fn test_descendants_document_order() {
        let (doc, [widget, p, b, other, span]) = page();
        assert_eq!(descendants(&doc, doc.root()), vec![widget, span, p, b, other]);
        assert_eq!(descendants(&doc, b), Vec::<NodeId>::new());
    }

    #[test]
    fn test_attribute_helpers() {
        let (doc, [widget, p, ..]) = page();
        assert_eq!(object_id_of(&doc, widget), Some(ObjectId::new(1)));
        assert_eq!(type_name_of(&doc, widget).as_deref(), Some("Counter"));
        assert_eq!(object_id_of(&doc, p), None);
    }

    #[test]
    fn test_owning_node_walks_up() {
        let (doc, [widget, _, b, ..]) = page();
        assert_eq!(owning_node(&doc, b).expect("owner"), (widget, ObjectId::new(1)));
        assert_eq!(owning_node(&doc, widget).expect("owner").0, widget);
        assert!(owning_node(&doc, doc.root()).is_err());
    }

    #[test]
    fn test_find_object_node() {
        let (doc, [widget, _, _, other, _]) = page();
        assert_eq!(find_object_node(&doc, ObjectId::new(1)).expect("found"), widget);
        assert_eq!(find_object_node(&doc, ObjectId::new(2)).expect("found"), other);
        assert!(find_object_node(&doc, ObjectId::new(3)).is_err());

        doc.append(doc.root(), "div", &[(ATTR_OBJECT_ID, "2")]);
        let err = find_object_node(&doc, ObjectId::new(2)).unwrap_err();
        assert!(err.to_string().contains("2 nodes"));
    }

    #[test]
    fn test_node_by_attribute() {
        let (doc, [widget, p, b, ..]) = page();
        assert_eq!(nodes_by_attribute(&doc, widget, "class", "label").len(), 2);
        assert_eq!(node_by_attribute(&doc, p, "class", "label").expect("one"), b);
        assert!(node_by_attribute(&doc, widget, "class", "label").is_err());
        assert!(node_by_attribute(&doc, widget, "class", "missing").is_err());
    }
}
