//! In-Memory Document
//!
//! A small arena-backed node tree implementing [`Dom`]. Nodes are addressed
//! by [`NodeId`] and are never freed; a detached node simply has no parent.
//! Every mutation bumps a counter in [`DomStats`], which is how tests observe
//! node churn.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::Serialize;

use super::Dom;

/// Identity of a node in a [`MemoryDom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Element(String),
    Text(String),
    Comment(String),
}

#[derive(Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DomStats {
    /// Nodes attached that had no parent before.
    pub inserted: usize,

    /// Nodes relocated while attached.
    pub moved: usize,

    pub detached: usize,

    pub text_writes: usize,
}

#[derive(Debug, Default)]
struct Arena {
    nodes: Vec<NodeData>,
    stats: DomStats,
}

impl Arena {
    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }

    fn create(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Unlink `id` from its parent. Returns whether it had one.
    fn unlink(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.node_mut(id).parent.take() else {
            return false;
        };
        self.node_mut(parent).children.retain(|child| *child != id);
        true
    }

    fn text_content(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Comment(_) => {}
            NodeKind::Element(_) => {
                for child in &self.node(id).children {
                    self.text_content(*child, out);
                }
            }
        }
    }
}

/// An in-memory document.
///
/// Cloning yields a handle to the same tree.
#[derive(Clone, Default)]
pub struct MemoryDom {
    arena: Rc<RefCell<Arena>>,
}

impl MemoryDom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_element(&self, tag: &str) -> NodeId {
        self.arena.borrow_mut().create(NodeKind::Element(tag.to_string()))
    }

    pub fn create_text(&self, text: &str) -> NodeId {
        self.arena.borrow_mut().create(NodeKind::Text(text.to_string()))
    }

    /// Comments make good list anchors: they render nothing.
    pub fn create_comment(&self, text: &str) -> NodeId {
        self.arena.borrow_mut().create(NodeKind::Comment(text.to_string()))
    }

    /// Append `child` as the last child of `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut arena = self.arena.borrow_mut();
        let was_attached = arena.unlink(child);
        arena.node_mut(parent).children.push(child);
        arena.node_mut(child).parent = Some(parent);
        if was_attached {
            arena.stats.moved += 1;
        } else {
            arena.stats.inserted += 1;
        }
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.arena.borrow().node(node).parent
    }

    /// Own text of a text or comment node.
    pub fn text(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().node(node).kind {
            NodeKind::Text(text) | NodeKind::Comment(text) => Some(text.clone()),
            NodeKind::Element(_) => None,
        }
    }

    pub fn tag(&self, node: NodeId) -> Option<String> {
        match &self.arena.borrow().node(node).kind {
            NodeKind::Element(tag) => Some(tag.clone()),
            _ => None,
        }
    }

    /// Concatenated text of `node` and its descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.arena.borrow().text_content(node, &mut out);
        out
    }

    pub fn stats(&self) -> DomStats {
        self.arena.borrow().stats
    }

    pub fn reset_stats(&self) {
        self.arena.borrow_mut().stats = DomStats::default();
    }

    pub fn node_count(&self) -> usize {
        self.arena.borrow().nodes.len()
    }
}

impl Dom for MemoryDom {
    type Node = NodeId;

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let arena = self.arena.borrow();
        let parent = arena.node(*node).parent?;
        let siblings = &arena.node(parent).children;
        let position = siblings.iter().position(|child| child == node)?;
        siblings.get(position + 1).copied()
    }

    fn insert_after(&self, anchor: &NodeId, node: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        let Some(parent) = arena.node(*anchor).parent else {
            tracing::warn!(%anchor, %node, "insert after a detached anchor ignored");
            return;
        };
        let was_attached = arena.unlink(*node);

        let siblings = &mut arena.node_mut(parent).children;
        let position = siblings
            .iter()
            .position(|child| child == anchor)
            .map_or(siblings.len(), |p| p + 1);
        siblings.insert(position, *node);
        arena.node_mut(*node).parent = Some(parent);

        if was_attached {
            arena.stats.moved += 1;
        } else {
            arena.stats.inserted += 1;
        }
    }

    fn detach(&self, node: &NodeId) {
        let mut arena = self.arena.borrow_mut();
        if arena.unlink(*node) {
            arena.stats.detached += 1;
        }
    }

    fn children(&self, node: &NodeId) -> Vec<NodeId> {
        self.arena.borrow().node(*node).children.clone()
    }

    fn set_text(&self, node: &NodeId, text: &str) {
        let mut arena = self.arena.borrow_mut();
        let written = match &mut arena.node_mut(*node).kind {
            NodeKind::Text(current) if current != text => {
                text.clone_into(current);
                true
            }
            _ => false,
        };
        if written {
            arena.stats.text_writes += 1;
        }
    }
}

impl fmt::Debug for MemoryDom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arena = self.arena.borrow();
        f.debug_struct("MemoryDom")
            .field("nodes", &arena.nodes.len())
            .field("stats", &arena.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(dom: &MemoryDom) -> (NodeId, NodeId) {
        let root = dom.create_element("ul");
        let anchor = dom.create_comment("each");
        dom.append_child(root, anchor);
        (root, anchor)
    }

    #[test]
    fn insert_after_places_directly_following() {
        let dom = MemoryDom::new();
        let (root, anchor) = list(&dom);
        let a = dom.create_text("a");
        let b = dom.create_text("b");

        dom.insert_after(&anchor, &a);
        dom.insert_after(&anchor, &b);

        assert_eq!(dom.children(&root), vec![anchor, b, a]);
        assert_eq!(dom.next_sibling(&anchor), Some(b));
        assert_eq!(dom.next_sibling(&a), None);
        assert_eq!(dom.text_content(root), "ba");
    }

    #[test]
    fn moving_an_attached_node_counts_as_move() {
        let dom = MemoryDom::new();
        let (root, anchor) = list(&dom);
        let a = dom.create_text("a");
        let b = dom.create_text("b");
        dom.insert_after(&anchor, &a);
        dom.insert_after(&a, &b);
        dom.reset_stats();

        dom.insert_after(&anchor, &b);

        assert_eq!(dom.children(&root), vec![anchor, b, a]);
        assert_eq!(
            dom.stats(),
            DomStats {
                moved: 1,
                ..DomStats::default()
            }
        );
    }

    #[test]
    fn detach_keeps_handle_valid() {
        let dom = MemoryDom::new();
        let (root, anchor) = list(&dom);
        let a = dom.create_text("a");
        dom.insert_after(&anchor, &a);

        dom.detach(&a);
        dom.detach(&a);

        assert_eq!(dom.children(&root), vec![anchor]);
        assert_eq!(dom.parent(a), None);
        assert_eq!(dom.text(a).as_deref(), Some("a"));
        assert_eq!(dom.stats().detached, 1);
    }

    #[test]
    fn unchanged_text_is_not_a_write() {
        let dom = MemoryDom::new();
        let text = dom.create_text("x");
        dom.set_text(&text, "x");
        dom.set_text(&text, "y");
        assert_eq!(dom.stats().text_writes, 1);
        assert_eq!(dom.text(text).as_deref(), Some("y"));
    }
}
