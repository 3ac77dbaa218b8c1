//! Typed Context
//!
//! [`TypedContext`] wraps the AST [`Arena`] and stores the type attribute
//! computed for each node, keyed by node id. Type nodes are `Rc`-shared:
//! many expressions may reference the same type.

use std::rc::Rc;

use pkl_ast::{
    arena::Arena,
    nodes::{AstNode, Expression, Location, Program},
    types::Type,
};
use rustc_hash::FxHashMap;

#[derive(Default, Debug)]
pub struct TypedContext {
    arena: Arena,
    node_types: FxHashMap<u32, Rc<Type>>,
}

impl TypedContext {
    pub(crate) fn new(arena: Arena) -> Self {
        Self {
            arena,
            node_types: FxHashMap::default(),
        }
    }

    #[must_use]
    pub fn program(&self) -> Option<Rc<Program>> {
        self.arena.program()
    }

    #[must_use = "this is a pure lookup with no side effects"]
    pub fn type_of(&self, node_id: u32) -> Option<Rc<Type>> {
        self.node_types.get(&node_id).cloned()
    }

    pub(crate) fn set_node_type(&mut self, node_id: u32, ty: Rc<Type>) {
        self.node_types.insert(node_id, ty);
    }

    pub(crate) fn arena_mut(&mut self) -> &mut Arena {
        &mut self.arena
    }

    pub fn filter_nodes<T: Fn(&AstNode) -> bool>(&self, fn_predicate: T) -> Vec<AstNode> {
        self.arena.filter_nodes(fn_predicate)
    }

    /// Every type attributed to some node, for whole-tree sweeps.
    pub(crate) fn annotated_types(&self) -> Vec<Rc<Type>> {
        self.node_types.values().cloned().collect()
    }

    /// Verifies that every expression node in the arena has a type
    /// attribute. Returns the expressions that are missing one; an empty
    /// list means the first type phase did its job.
    #[must_use = "returns list of missing expression types for verification"]
    pub fn find_untyped_expressions(&self) -> Vec<MissingExpressionType> {
        self.arena
            .filter_nodes(|node| matches!(node, AstNode::Expression(_)))
            .into_iter()
            .filter_map(|node| {
                if let AstNode::Expression(expression) = &node {
                    let id = expression.id();
                    if !self.node_types.contains_key(&id) {
                        return Some(MissingExpressionType {
                            id,
                            kind: expression.kind_name().to_string(),
                            location: expression.location(),
                        });
                    }
                }
                None
            })
            .collect()
    }

    /// Whether the arena still contains an `isa` node. After a successful
    /// first phase, every `isa` whose outcome is statically known has been
    /// folded away.
    #[must_use = "this is a pure check with no side effects"]
    pub fn has_isa_nodes(&self) -> bool {
        !self
            .arena
            .filter_nodes(|node| matches!(node, AstNode::Expression(Expression::Isa(_))))
            .is_empty()
    }
}

/// Information about an expression missing its type after the first phase.
#[derive(Debug)]
pub struct MissingExpressionType {
    pub id: u32,
    pub kind: String,
    pub location: Location,
}
