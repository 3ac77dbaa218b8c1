//! Second type phase.
//!
//! Walks every type reachable from the program, written or synthesized,
//! and records whether it is complete (its size in bits is a compile-time
//! constant). The lexer settles completeness for scalar types by
//! construction; arrays and structs are the ones that need this phase.
//!
//! This phase also enforces one contextual restriction that needs the
//! function-type side of the tree: a sized array type may not be the type
//! of a function argument.

use std::rc::Rc;

use pkl_ast::nodes::{AstNode, Expression, Statement};
use pkl_ast::types::{Type, TypeKind};
use rustc_hash::FxHashSet;

use crate::{Payload, errors::TypifyError, typed_context::TypedContext};

pub(crate) struct Typify2<'p> {
    payload: &'p mut Payload,
    visited: FxHashSet<usize>,
}

impl<'p> Typify2<'p> {
    pub(crate) fn new(payload: &'p mut Payload) -> Self {
        Self {
            payload,
            visited: FxHashSet::default(),
        }
    }

    pub(crate) fn run(&mut self, ctx: &mut TypedContext) {
        for ty in ctx.annotated_types() {
            self.visit_type(&ty);
        }
        for node in ctx.filter_nodes(|_| true) {
            match node {
                AstNode::Expression(Expression::SizeofType(sizeof_type)) => {
                    // later phases consult the flag of a sizeof operand
                    // whatever its kind
                    sizeof_type.ty.set_complete(sizeof_type.ty.is_complete());
                    self.visit_type(&sizeof_type.ty);
                }
                AstNode::Expression(Expression::Integer(literal)) => self.visit_type(&literal.ty),
                AstNode::Expression(Expression::Isa(isa)) => self.visit_type(&isa.ty),
                AstNode::Expression(Expression::Cast(cast)) => self.visit_type(&cast.ty),
                AstNode::Expression(Expression::StructCons(cons)) => self.visit_type(&cons.ty),
                AstNode::Expression(Expression::Map(map)) => self.visit_type(&map.ty),
                AstNode::Expression(Expression::Function(function)) => {
                    self.visit_type(&function.return_type);
                    for arg in &function.args {
                        self.visit_type(&arg.ty);
                    }
                }
                AstNode::Statement(Statement::TryCatch(try_catch)) => {
                    if let Some(arg) = &try_catch.arg {
                        self.visit_type(&arg.ty);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_type(&mut self, ty: &Rc<Type>) {
        if !self.visited.insert(Rc::as_ptr(ty) as usize) {
            return;
        }
        match &ty.kind {
            TypeKind::Array { elem, .. } => {
                self.visit_type(elem);
                ty.set_complete(ty.is_complete());
            }
            TypeKind::Struct { fields } => {
                for field in fields {
                    self.visit_type(&field.ty);
                }
                ty.set_complete(ty.is_complete());
            }
            TypeKind::Offset { base, .. } => self.visit_type(base),
            TypeKind::Function { ret, args } => {
                self.visit_type(ret);
                for arg in args {
                    self.visit_type(&arg.ty);
                    if let TypeKind::Array { nelem: Some(_), .. } = &arg.ty.kind {
                        self.payload.report(TypifyError::SizedArrayNotAllowed {
                            location: arg.ty.location,
                        });
                    }
                }
            }
            TypeKind::Integral { .. } | TypeKind::String | TypeKind::Any | TypeKind::Void => {}
        }
    }
}
