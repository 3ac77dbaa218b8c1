//! Node registry for one compilation unit.
//!
//! The arena owns a map from node id to [`AstNode`] and mints fresh ids,
//! both for the builder during parsing and for compiler phases that
//! synthesize replacement nodes. Nodes themselves are `Rc`-shared, so the
//! registry entries are cheap clones of the tree's handles.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::nodes::{AstNode, Program};

#[derive(Default, Clone, Debug)]
pub struct Arena {
    nodes: FxHashMap<u32, AstNode>,
    next_id: u32,
}

impl Arena {
    /// Mint a fresh, never-before-used node id. Ids are non-zero.
    pub fn fresh_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Adds a node to the arena.
    ///
    /// # Panics
    ///
    /// Panics if `node.id()` is zero or if a node with the same id already
    /// exists in the arena.
    pub fn add_node(&mut self, node: AstNode) {
        assert!(node.id() != 0, "node id must be non-zero");
        assert!(
            !self.nodes.contains_key(&node.id()),
            "node with id {} already exists in the arena",
            node.id()
        );
        self.nodes.insert(node.id(), node);
    }

    #[must_use]
    pub fn find_node(&self, id: u32) -> Option<AstNode> {
        self.nodes.get(&id).cloned()
    }

    /// Replaces a registered subtree root with a synthesized node. The old
    /// entry is released; the replacement is registered under its own id.
    pub fn replace_node(&mut self, old_id: u32, node: AstNode) {
        self.nodes.remove(&old_id);
        self.add_node(node);
    }

    #[must_use]
    pub fn program(&self) -> Option<Rc<Program>> {
        self.nodes.values().find_map(|node| {
            if let AstNode::Program(program) = node {
                Some(program.clone())
            } else {
                None
            }
        })
    }

    pub fn filter_nodes<T: Fn(&AstNode) -> bool>(&self, fn_predicate: T) -> Vec<AstNode> {
        self.nodes
            .values()
            .filter(|node| fn_predicate(node))
            .cloned()
            .collect()
    }
}
