//! First type phase.
//!
//! Bottom-up assignment of a type to every expression node, plus the type
//! checks documented on each handler. The phase continues after an error
//! (the offending subtree is abandoned, siblings are still visited) so one
//! run collects as many diagnostics as possible.
//!
//! Two traversal quirks carried over from the pass design:
//!
//! - `isa` may replace its whole subtree with a precomputed literal; the
//!   driver loop then restarts on the replacement.
//! - loops typify their container ahead of the condition and body, because
//!   the iterator's type is derived from the container's element type.

use std::{cell::RefCell, rc::Rc};

use pkl_ast::nodes::{
    AstNode, AttrKind, BinaryExpression, DeclStatement, Expression, FuncallArg,
    FuncallExpression, FunctionExpression, IntegerLiteral, Location, LoopStatement, OperatorKind,
    Statement, UnaryExpression, UnaryOperatorKind,
};
use pkl_ast::types::{FuncTypeArg, StructTypeField, Type, TypeKind, UNIT_BITS};
use rustc_hash::FxHashSet;

use crate::{Payload, errors::TypifyError, typed_context::TypedContext};

/// What a handler decided about the node it was given.
enum Outcome {
    /// The node has this type.
    Typed(Rc<Type>),
    /// The whole subtree is replaced by this expression; the driver
    /// restarts on the replacement.
    Replace(Expression),
    /// A diagnostic was reported; the subtree is abandoned.
    Failed,
}

/// Whether a value of type `found` is accepted where `expected` is wanted:
/// equal types, anything where `any` is expected, integral for integral,
/// offset for offset. Width and signedness adjust in the later promotion
/// phase.
fn promotable(expected: &Type, found: &Type) -> bool {
    expected == found
        || expected.is_any()
        || (expected.is_integral() && found.is_integral())
        || (expected.is_offset() && found.is_offset())
}

pub(crate) struct Typify1<'p> {
    payload: &'p mut Payload,
    checked_types: FxHashSet<usize>,
}

impl<'p> Typify1<'p> {
    pub(crate) fn new(payload: &'p mut Payload) -> Self {
        Self {
            payload,
            checked_types: FxHashSet::default(),
        }
    }

    pub(crate) fn run(&mut self, ctx: &mut TypedContext) {
        let Some(program) = ctx.program() else {
            self.ice("no program node in arena", Location::default());
            return;
        };
        for statement in &program.statements {
            self.typify_statement(statement, None, ctx);
        }
    }

    fn report(&mut self, error: TypifyError) {
        self.payload.report(error);
    }

    fn ice(&mut self, message: &str, location: Location) {
        self.report(TypifyError::Ice {
            message: message.to_string(),
            location,
        });
    }

    fn typify_statement(
        &mut self,
        statement: &Statement,
        return_type: Option<&Rc<Type>>,
        ctx: &mut TypedContext,
    ) {
        match statement {
            Statement::Decl(decl) => self.typify_decl(decl, ctx),
            Statement::Compound(compound) => {
                for statement in &compound.statements {
                    self.typify_statement(statement, return_type, ctx);
                }
            }
            Statement::Expression(statement) => {
                // statement position: a void-returning call is fine here.
                self.typify_expression(&statement.expression, ctx);
            }
            Statement::Assignment(assign) => {
                let lvalue_type = self.typify_expression(&assign.lvalue, ctx);
                let value_type = self.typify_expression(&assign.value, ctx);
                if let (Some(lvalue_type), Some(value_type)) = (lvalue_type, value_type)
                    && !promotable(&lvalue_type, &value_type)
                {
                    self.report(TypifyError::AssignmentTypeMismatch {
                        expected: lvalue_type,
                        found: value_type,
                        location: assign.location,
                    });
                }
            }
            Statement::If(if_statement) => {
                self.typify_expression(&if_statement.condition, ctx);
                self.typify_statement(&if_statement.then_body, return_type, ctx);
                if let Some(else_body) = &if_statement.else_body {
                    self.typify_statement(else_body, return_type, ctx);
                }
            }
            Statement::Loop(loop_statement) => {
                self.typify_loop(loop_statement, return_type, ctx);
            }
            Statement::Print(print) => {
                if let Some(expression) = &print.expression
                    && let Some(ty) = self.typify_expression(expression, ctx)
                    && !ty.is_string()
                {
                    self.report(TypifyError::PrintOperandNotString {
                        found: ty,
                        location: expression.borrow().location(),
                    });
                }
            }
            Statement::Raise(raise) => {
                if let Some(expression) = &raise.expression
                    && let Some(ty) = self.typify_expression(expression, ctx)
                    && !ty.is_integral()
                {
                    self.report(TypifyError::RaiseOperandNotIntegral {
                        location: raise.location,
                    });
                }
            }
            Statement::TryCatch(try_catch) => {
                self.typify_statement(&try_catch.body, return_type, ctx);
                if let Some(arg) = &try_catch.arg {
                    self.typify_type(&arg.ty, ctx);
                    // exceptions are denoted by int<32> values
                    if arg.ty.integral_parts() != Some((32, true)) {
                        self.report(TypifyError::CatchArgumentNotException {
                            location: arg.ty.location,
                        });
                    }
                }
                if let Some(condition) = &try_catch.condition
                    && let Some(ty) = self.typify_expression(condition, ctx)
                    && !ty.is_integral()
                {
                    self.report(TypifyError::CatchConditionNotIntegral {
                        location: condition.borrow().location(),
                    });
                }
                self.typify_statement(&try_catch.handler, return_type, ctx);
            }
            Statement::Return(return_statement) => {
                let Some(expression) = &return_statement.expression else {
                    return;
                };
                let Some(found) = self.typify_expression(expression, ctx) else {
                    return;
                };
                let Some(expected) = return_type else { return };
                if expected.is_void() {
                    self.report(TypifyError::ReturnValueInVoidFunction {
                        location: return_statement.location,
                    });
                } else if !promotable(expected, &found) {
                    self.report(TypifyError::ReturnTypeMismatch {
                        expected: (*expected).clone(),
                        found,
                        location: expression.borrow().location(),
                    });
                }
            }
        }
    }

    /// The container is typified ahead of the normal order: the iterator's
    /// type depends on it. Body and condition follow, and the driver does
    /// not re-traverse any of them.
    fn typify_loop(
        &mut self,
        loop_statement: &Rc<LoopStatement>,
        return_type: Option<&Rc<Type>>,
        ctx: &mut TypedContext,
    ) {
        let mut container_type = None;
        if let Some(container) = &loop_statement.container {
            container_type = self.typify_expression(container, ctx);
            if container_type.is_none() {
                return;
            }
        }

        if let Some(iterator) = &loop_statement.iterator {
            if let Some(container) = &loop_statement.container {
                let Some(container_type) = &container_type else {
                    return;
                };
                let elem_type = if let Some(elem) = container_type.array_elem() {
                    elem.clone()
                } else if container_type.is_string() {
                    Type::char(container.borrow().location())
                } else {
                    self.report(TypifyError::LoopContainerNotIterable {
                        found: container_type.clone(),
                        location: container.borrow().location(),
                    });
                    return;
                };
                ctx.set_node_type(iterator.initial.borrow().id(), elem_type.clone());
                ctx.set_node_type(iterator.id, elem_type);
            } else {
                // no container: the iterator is an ordinary declaration
                self.typify_decl(iterator, ctx);
            }
        }

        if let Some(condition) = &loop_statement.condition {
            let Some(condition_type) = self.typify_expression(condition, ctx) else {
                return;
            };
            if condition_type.integral_parts() != Some((32, true)) {
                self.report(TypifyError::LoopConditionNotBoolean {
                    location: condition.borrow().location(),
                });
                return;
            }
        }

        self.typify_statement(&loop_statement.body, return_type, ctx);
    }

    fn typify_decl(&mut self, decl: &Rc<DeclStatement>, ctx: &mut TypedContext) {
        let initial = decl.initial.borrow().clone();
        if let Expression::Function(function) = &initial {
            // functions are typed pre-order: recursive references through
            // this declaration need the type while the body is typified.
            let function_type = self.function_signature(function, ctx);
            ctx.set_node_type(function.id, function_type.clone());
            ctx.set_node_type(decl.id, function_type);
            self.typify_function_interior(function, ctx);
        } else if let Some(ty) = self.typify_value(&decl.initial, ctx) {
            ctx.set_node_type(decl.id, ty);
        }
    }

    fn function_signature(
        &mut self,
        function: &Rc<FunctionExpression>,
        ctx: &mut TypedContext,
    ) -> Rc<Type> {
        let mut args = Vec::with_capacity(function.args.len());
        for arg in &function.args {
            self.typify_type(&arg.ty, ctx);
            args.push(FuncTypeArg {
                ty: arg.ty.clone(),
                name: Some(arg.name.clone()),
                optional: arg.initial.is_some(),
                vararg: arg.vararg,
            });
        }
        self.typify_type(&function.return_type, ctx);
        Type::function(function.return_type.clone(), args, function.location)
    }

    fn typify_function_interior(
        &mut self,
        function: &Rc<FunctionExpression>,
        ctx: &mut TypedContext,
    ) {
        for arg in &function.args {
            if let Some(initial) = &arg.initial {
                self.typify_value(initial, ctx);
            }
        }
        self.typify_statement(&function.body, Some(&function.return_type), ctx);
    }

    /// Typify an expression in a position where its value is consumed: a
    /// call to a function that doesn't return a value is rejected here.
    fn typify_value(
        &mut self,
        slot: &RefCell<Expression>,
        ctx: &mut TypedContext,
    ) -> Option<Rc<Type>> {
        let ty = self.typify_expression(slot, ctx)?;
        if ty.is_void() && matches!(&*slot.borrow(), Expression::Funcall(_)) {
            let location = slot.borrow().location();
            self.report(TypifyError::VoidValueUsed { location });
            return None;
        }
        Some(ty)
    }

    /// The driver for one expression slot. Loops to support restarts after
    /// a subtree rewrite; the parent's slot is only mutated here, never
    /// from inside a handler.
    fn typify_expression(
        &mut self,
        slot: &RefCell<Expression>,
        ctx: &mut TypedContext,
    ) -> Option<Rc<Type>> {
        loop {
            let expression = slot.borrow().clone();
            match self.typify_one(&expression, ctx) {
                Outcome::Typed(ty) => {
                    ctx.set_node_type(expression.id(), ty.clone());
                    return Some(ty);
                }
                Outcome::Replace(replacement) => {
                    ctx.arena_mut()
                        .replace_node(expression.id(), AstNode::Expression(replacement.clone()));
                    *slot.borrow_mut() = replacement;
                }
                Outcome::Failed => return None,
            }
        }
    }

    fn typify_one(&mut self, expression: &Expression, ctx: &mut TypedContext) -> Outcome {
        match expression {
            Expression::Integer(literal) => {
                self.typify_type(&literal.ty, ctx);
                Outcome::Typed(literal.ty.clone())
            }
            Expression::String(literal) => {
                Outcome::Typed(Type::string(literal.location))
            }
            Expression::Unary(unary) => self.typify_unary(unary, ctx),
            Expression::Binary(binary) => self.typify_binary(binary, ctx),
            Expression::Attr(attr) => self.typify_attr(attr, ctx),
            Expression::Sizeof(sizeof) => {
                if self.typify_value(&sizeof.operand, ctx).is_none() {
                    return Outcome::Failed;
                }
                Outcome::Typed(Type::bit_offset(sizeof.location))
            }
            Expression::SizeofType(sizeof_type) => {
                self.typify_type(&sizeof_type.ty, ctx);
                Outcome::Typed(Type::bit_offset(sizeof_type.location))
            }
            Expression::Isa(isa) => {
                self.typify_type(&isa.ty, ctx);
                let Some(expression_type) = self.typify_expression(&isa.expression, ctx) else {
                    return Outcome::Failed;
                };
                let bool_type = Type::boolean(isa.location);
                if isa.ty.is_any() {
                    // `x isa any` always holds
                    Outcome::Replace(self.make_integer(1, bool_type, isa.location, ctx))
                } else if !expression_type.is_any() {
                    let value = u64::from(*isa.ty == *expression_type);
                    Outcome::Replace(self.make_integer(value, bool_type, isa.location, ctx))
                } else {
                    // the operand is `any`-typed: resolved at run-time
                    Outcome::Typed(bool_type)
                }
            }
            Expression::Cast(cast) => {
                self.typify_type(&cast.ty, ctx);
                let Some(expression_type) = self.typify_value(&cast.expression, ctx) else {
                    return Outcome::Failed;
                };
                if cast.ty.is_any() {
                    self.report(TypifyError::CastToAny {
                        location: cast.location,
                    });
                    return Outcome::Failed;
                }
                if cast.ty.is_function() {
                    self.report(TypifyError::CastToFunction {
                        location: cast.location,
                    });
                    return Outcome::Failed;
                }
                if expression_type.is_function() {
                    self.report(TypifyError::CastFromFunction {
                        location: cast.location,
                    });
                    return Outcome::Failed;
                }
                // only characters (uint<8>) can be cast to string
                if cast.ty.is_string() && expression_type.integral_parts() != Some((8, false)) {
                    self.report(TypifyError::InvalidCastToString {
                        found: expression_type,
                        location: cast.location,
                    });
                    return Outcome::Failed;
                }
                Outcome::Typed(cast.ty.clone())
            }
            Expression::Offset(offset) => {
                let Some(magnitude_type) = self.typify_value(&offset.magnitude, ctx) else {
                    return Outcome::Failed;
                };
                Outcome::Typed(Type::offset(
                    magnitude_type,
                    offset.unit,
                    offset.location,
                ))
            }
            Expression::Array(array) => {
                let mut elem_type: Option<Rc<Type>> = None;
                for initializer in &array.initializers {
                    let Some(ty) = self.typify_value(initializer, ctx) else {
                        return Outcome::Failed;
                    };
                    match &elem_type {
                        None => elem_type = Some(ty),
                        Some(expected) => {
                            if *ty != **expected {
                                self.report(TypifyError::ArrayInitializerMismatch {
                                    expected: expected.clone(),
                                    found: ty,
                                    location: array.location,
                                });
                                return Outcome::Failed;
                            }
                        }
                    }
                }
                let Some(elem_type) = elem_type else {
                    self.ice("array literal without initializers", array.location);
                    return Outcome::Failed;
                };
                Outcome::Typed(Type::array(elem_type, None, array.location))
            }
            Expression::Trimmer(trimmer) => {
                let entity_type = self.typify_expression(&trimmer.entity, ctx);
                let from_type = self.typify_expression(&trimmer.from, ctx);
                let to_type = self.typify_expression(&trimmer.to, ctx);
                let (Some(entity_type), Some(from_type), Some(to_type)) =
                    (entity_type, from_type, to_type)
                else {
                    return Outcome::Failed;
                };
                if !from_type.is_integral() {
                    self.report(TypifyError::TrimmerIndexNotIntegral {
                        location: trimmer.from.borrow().location(),
                    });
                    return Outcome::Failed;
                }
                if !to_type.is_integral() {
                    self.report(TypifyError::TrimmerIndexNotIntegral {
                        location: trimmer.to.borrow().location(),
                    });
                    return Outcome::Failed;
                }
                // a trim has the type of the trimmed entity
                Outcome::Typed(entity_type)
            }
            Expression::Indexer(indexer) => {
                let entity_type = self.typify_value(&indexer.entity, ctx);
                let index_type = self.typify_value(&indexer.index, ctx);
                let (Some(entity_type), Some(index_type)) = (entity_type, index_type) else {
                    return Outcome::Failed;
                };
                let ty = if let Some(elem) = entity_type.array_elem() {
                    elem.clone()
                } else if entity_type.is_string() {
                    Type::char(indexer.location)
                } else {
                    self.report(TypifyError::IndexedEntityNotContainer {
                        found: entity_type,
                        location: indexer.entity.borrow().location(),
                    });
                    return Outcome::Failed;
                };
                if !index_type.is_integral() {
                    self.report(TypifyError::IndexNotIntegral {
                        location: indexer.index.borrow().location(),
                    });
                    return Outcome::Failed;
                }
                Outcome::Typed(ty)
            }
            Expression::Struct(struct_literal) => {
                let mut fields = Vec::with_capacity(struct_literal.elems.len());
                for elem in &struct_literal.elems {
                    let Some(elem_type) = self.typify_value(&elem.expression, ctx) else {
                        return Outcome::Failed;
                    };
                    // the element itself has the type of its expression
                    ctx.set_node_type(elem.id, elem_type.clone());
                    fields.push(StructTypeField {
                        name: elem.name.clone(),
                        ty: elem_type,
                    });
                }
                Outcome::Typed(Type::struct_type(fields, struct_literal.location))
            }
            Expression::StructCons(cons) => {
                self.typify_type(&cons.ty, ctx);
                if self.typify_value(&cons.value, ctx).is_none() {
                    return Outcome::Failed;
                }
                // redundant with the parser, kept as a safety net
                if !cons.ty.is_struct() {
                    self.report(TypifyError::ConstructorNotStruct {
                        found: cons.ty.clone(),
                        location: cons.ty.location,
                    });
                    return Outcome::Failed;
                }
                Outcome::Typed(cons.ty.clone())
            }
            Expression::StructRef(struct_ref) => {
                let Some(struct_type) = self.typify_value(&struct_ref.expression, ctx) else {
                    return Outcome::Failed;
                };
                let TypeKind::Struct { fields } = &struct_type.kind else {
                    self.report(TypifyError::StructRefNotStruct {
                        found: struct_type.clone(),
                        location: struct_ref.expression.borrow().location(),
                    });
                    return Outcome::Failed;
                };
                let field_type = fields.iter().find_map(|field| {
                    field
                        .name
                        .as_ref()
                        .filter(|name| name.name == struct_ref.field.name)
                        .map(|_| field.ty.clone())
                });
                match field_type {
                    Some(ty) => Outcome::Typed(ty),
                    None => {
                        self.report(TypifyError::UnknownStructField {
                            field: struct_ref.field.name.clone(),
                            location: struct_ref.field.location,
                        });
                        Outcome::Failed
                    }
                }
            }
            Expression::Funcall(funcall) => self.typify_funcall(funcall, ctx),
            Expression::Function(function) => {
                let function_type = self.function_signature(function, ctx);
                ctx.set_node_type(function.id, function_type.clone());
                self.typify_function_interior(function, ctx);
                Outcome::Typed(function_type)
            }
            Expression::Var(var) => match ctx.type_of(var.decl_id) {
                Some(ty) => Outcome::Typed(ty),
                None => {
                    // scope rules guarantee the declaration was typed first
                    self.ice(
                        &format!(
                            "variable `{}` referenced before its declaration was typed",
                            var.name.name
                        ),
                        var.location,
                    );
                    Outcome::Failed
                }
            },
            Expression::Map(map) => {
                self.typify_type(&map.ty, ctx);
                let Some(offset_type) = self.typify_value(&map.offset, ctx) else {
                    return Outcome::Failed;
                };
                if !offset_type.is_offset() {
                    self.report(TypifyError::MapOffsetNotOffset {
                        found: offset_type,
                        location: map.offset.borrow().location(),
                    });
                    return Outcome::Failed;
                }
                Outcome::Typed(map.ty.clone())
            }
        }
    }

    fn typify_unary(&mut self, unary: &Rc<UnaryExpression>, ctx: &mut TypedContext) -> Outcome {
        let Some(operand_type) = self.typify_value(&unary.operand, ctx) else {
            return Outcome::Failed;
        };
        match unary.operator {
            UnaryOperatorKind::Not => {
                if !operand_type.is_integral() {
                    self.report(TypifyError::NotOperandNotIntegral {
                        location: unary.operand.borrow().location(),
                    });
                    return Outcome::Failed;
                }
                Outcome::Typed(Type::boolean(unary.location))
            }
            // NEG, POS and BNOT keep the operand's type; operand
            // validation belongs to the later promotion phase.
            UnaryOperatorKind::Neg | UnaryOperatorKind::Pos | UnaryOperatorKind::BitNot => {
                Outcome::Typed(operand_type)
            }
        }
    }

    /// Width of a promoted integral operation is the width of the widest
    /// operand; the operation is unsigned if either operand is.
    fn promoted_integral(
        left: &Rc<Type>,
        right: &Rc<Type>,
        location: Location,
    ) -> Option<Rc<Type>> {
        let (size1, signed1) = left.integral_parts()?;
        let (size2, signed2) = right.integral_parts()?;
        Some(Type::integral(
            size1.max(size2),
            signed1 && signed2,
            location,
        ))
    }

    /// `+` and `-` on offsets: the base type is promoted like an integral
    /// operation; the result is counted in bits.
    fn offset_sum_type(
        left: &Rc<Type>,
        right: &Rc<Type>,
        location: Location,
    ) -> Option<Rc<Type>> {
        let (base1, _) = left.offset_parts()?;
        let (base2, _) = right.offset_parts()?;
        let base = Self::promoted_integral(base1, base2, location)?;
        Some(Type::offset(base, UNIT_BITS, location))
    }

    fn typify_binary(&mut self, binary: &Rc<BinaryExpression>, ctx: &mut TypedContext) -> Outcome {
        // both operands are visited even if the first fails, so one run
        // collects the diagnostics of both subtrees
        let left = self.typify_value(&binary.left, ctx);
        let right = self.typify_value(&binary.right, ctx);
        let (Some(left), Some(right)) = (left, right) else {
            return Outcome::Failed;
        };
        let location = binary.location;

        macro_rules! invalid_operands {
            () => {{
                self.report(TypifyError::InvalidBinaryOperands {
                    operator: binary.operator,
                    left: left.clone(),
                    right: right.clone(),
                    location: binary.location,
                });
                return Outcome::Failed;
            }};
        }

        let ty = match binary.operator {
            OperatorKind::Eq
            | OperatorKind::Ne
            | OperatorKind::Lt
            | OperatorKind::Gt
            | OperatorKind::Le
            | OperatorKind::Ge => {
                if left.same_kind(&right)
                    && (left.is_integral() || left.is_string() || left.is_offset())
                {
                    Type::boolean(location)
                } else {
                    self.report(TypifyError::InvalidRelationalOperands {
                        left,
                        right,
                        location,
                    });
                    return Outcome::Failed;
                }
            }
            // operand validation for && and || is deferred to promo
            OperatorKind::And | OperatorKind::Or => Type::boolean(location),
            OperatorKind::Shl | OperatorKind::Shr => {
                // shifts keep the exact type of the shifted operand
                match (left.integral_parts(), right.integral_parts()) {
                    (Some((size, signed)), Some(_)) => Type::integral(size, signed, location),
                    _ => invalid_operands!(),
                }
            }
            OperatorKind::BitOr | OperatorKind::BitXor | OperatorKind::BitAnd => {
                match Self::promoted_integral(&left, &right, location) {
                    Some(ty) => ty,
                    None => invalid_operands!(),
                }
            }
            OperatorKind::Add => {
                if left.is_integral() && right.is_integral() {
                    match Self::promoted_integral(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else if left.is_string() && right.is_string() {
                    Type::string(location)
                } else if left.is_offset() && right.is_offset() {
                    match Self::offset_sum_type(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else {
                    invalid_operands!()
                }
            }
            OperatorKind::Sub => {
                if left.is_integral() && right.is_integral() {
                    match Self::promoted_integral(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else if left.is_offset() && right.is_offset() {
                    match Self::offset_sum_type(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else {
                    invalid_operands!()
                }
            }
            OperatorKind::Mul => {
                if left.is_offset() || right.is_offset() {
                    // one operand must be an offset, the other an integral
                    let (offset_type, int_type) = if left.is_offset() && right.is_integral() {
                        (&left, &right)
                    } else if left.is_integral() && right.is_offset() {
                        (&right, &left)
                    } else {
                        invalid_operands!()
                    };
                    let Some((base, unit)) = offset_type.offset_parts() else {
                        invalid_operands!()
                    };
                    let Some(base) = Self::promoted_integral(base, int_type, location) else {
                        invalid_operands!()
                    };
                    // the result keeps the unit of the offset operand
                    Type::offset(base, unit, location)
                } else if left.is_integral() && right.is_integral() {
                    match Self::promoted_integral(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else if left.is_string() && right.is_string() {
                    Type::string(location)
                } else {
                    invalid_operands!()
                }
            }
            OperatorKind::Div => {
                if left.is_integral() && right.is_integral() {
                    match Self::promoted_integral(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else if left.is_offset() && right.is_offset() {
                    // a ratio of offsets is dimensionless
                    let parts = left.offset_parts().zip(right.offset_parts());
                    let Some(((base1, _), (base2, _))) = parts else {
                        invalid_operands!()
                    };
                    match Self::promoted_integral(base1, base2, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else {
                    invalid_operands!()
                }
            }
            OperatorKind::Mod => {
                if left.is_integral() && right.is_integral() {
                    match Self::promoted_integral(&left, &right, location) {
                        Some(ty) => ty,
                        None => invalid_operands!(),
                    }
                } else if left.is_offset() && right.is_offset() {
                    // base of the first operand, unit of the second
                    let parts = left.offset_parts().zip(right.offset_parts());
                    let Some(((base1, _), (_, unit2))) = parts else {
                        invalid_operands!()
                    };
                    Type::offset(base1.clone(), unit2, location)
                } else {
                    invalid_operands!()
                }
            }
            OperatorKind::BitConcat => {
                let (Some((size1, signed1)), Some((size2, _))) =
                    (left.integral_parts(), right.integral_parts())
                else {
                    self.report(TypifyError::BitConcatNotIntegral { location });
                    return Outcome::Failed;
                };
                if size1 + size2 > 64 {
                    self.report(TypifyError::BitConcatTooWide { location });
                    return Outcome::Failed;
                }
                // the sign of the concatenation follows the left operand
                Type::integral(size1 + size2, signed1, location)
            }
        };
        Outcome::Typed(ty)
    }

    fn typify_attr(
        &mut self,
        attr: &Rc<pkl_ast::nodes::AttrExpression>,
        ctx: &mut TypedContext,
    ) -> Outcome {
        let Some(operand_type) = self.typify_value(&attr.operand, ctx) else {
            return Outcome::Failed;
        };
        let location = attr.location;
        let valid = match attr.attr {
            AttrKind::Size => {
                operand_type.is_integral()
                    || operand_type.is_string()
                    || operand_type.is_array()
                    || operand_type.is_struct()
                    || operand_type.is_offset()
            }
            AttrKind::Signed => operand_type.is_integral(),
            AttrKind::Magnitude | AttrKind::Unit => operand_type.is_offset(),
            AttrKind::Length => {
                operand_type.is_array() || operand_type.is_struct() || operand_type.is_string()
            }
            AttrKind::Alignment => operand_type.is_struct(),
            AttrKind::Offset => operand_type.is_array() || operand_type.is_struct(),
            AttrKind::Mapped => true,
        };
        if !valid {
            self.report(TypifyError::InvalidAttribute {
                attr: attr.attr,
                found: operand_type,
                location,
            });
            return Outcome::Failed;
        }
        let ty = match attr.attr {
            AttrKind::Size | AttrKind::Offset => Type::bit_offset(location),
            AttrKind::Signed | AttrKind::Mapped => Type::boolean(location),
            AttrKind::Magnitude | AttrKind::Unit | AttrKind::Length | AttrKind::Alignment => {
                Type::integral(64, false, location)
            }
        };
        Outcome::Typed(ty)
    }

    fn typify_funcall(
        &mut self,
        funcall: &Rc<FuncallExpression>,
        ctx: &mut TypedContext,
    ) -> Outcome {
        let Some(function_type) = self.typify_value(&funcall.function, ctx) else {
            return Outcome::Failed;
        };
        let TypeKind::Function { ret, args: formals } = &function_type.kind else {
            self.report(TypifyError::CalleeNotFunction {
                location: funcall.function.borrow().location(),
            });
            return Outcome::Failed;
        };

        let actuals: Vec<Rc<FuncallArg>> = funcall.args.borrow().clone();
        let mut failed = false;
        for actual in &actuals {
            if self.typify_value(&actual.expression, ctx).is_none() {
                failed = true;
            }
        }
        if failed {
            return Outcome::Failed;
        }

        let mandatory = formals
            .iter()
            .take_while(|formal| !formal.optional && !formal.vararg)
            .count();
        if actuals.len() < mandatory {
            self.report(TypifyError::TooFewArguments {
                location: funcall.function.borrow().location(),
            });
            return Outcome::Failed;
        }

        // annotate the first actual that lands in a variadic formal slot
        let mut vararg = false;
        for (actual, formal) in actuals.iter().zip(formals.iter()) {
            if formal.vararg {
                vararg = true;
                actual.first_vararg.set(true);
            }
        }
        if !vararg && actuals.len() > formals.len() {
            self.report(TypifyError::TooManyArguments {
                location: funcall.function.borrow().location(),
            });
            return Outcome::Failed;
        }

        // (formal index, actual) pairs, in formal order; built either from
        // named-argument reordering or positionally.
        let aligned: Vec<(usize, Rc<FuncallArg>)>;
        let named = actuals.first().is_some_and(|actual| actual.name.is_some());
        if named {
            // every named actual must correspond to some formal
            for actual in &actuals {
                let Some(name) = &actual.name else {
                    // mixing named and positional arguments is rejected by
                    // the parser
                    self.ice("positional argument in named call", actual.location);
                    return Outcome::Failed;
                };
                let mut found = false;
                for formal in formals {
                    let Some(formal_name) = &formal.name else {
                        self.report(TypifyError::NamedArgumentsNotTaken {
                            location: name.location,
                        });
                        return Outcome::Failed;
                    };
                    if formal_name.name == name.name {
                        found = true;
                        break;
                    }
                }
                if !found {
                    self.report(TypifyError::UnknownNamedArgument {
                        name: name.name.clone(),
                        location: actual.location,
                    });
                    return Outcome::Failed;
                }
            }
            // reorder the actuals into formal order; a missing actual is
            // allowed only for optional and vararg formals
            let mut ordered = Vec::new();
            let mut pairs = Vec::new();
            for (index, formal) in formals.iter().enumerate() {
                let Some(formal_name) = &formal.name else {
                    self.report(TypifyError::NamedArgumentsNotTaken {
                        location: funcall.location,
                    });
                    return Outcome::Failed;
                };
                let matching = actuals.iter().find(|actual| {
                    actual
                        .name
                        .as_ref()
                        .is_some_and(|name| name.name == formal_name.name)
                });
                match matching {
                    Some(actual) => {
                        ordered.push(actual.clone());
                        pairs.push((index, actual.clone()));
                    }
                    None if formal.optional || formal.vararg => {}
                    None => {
                        self.report(TypifyError::MissingRequiredArgument {
                            name: formal_name.name.clone(),
                            location: funcall.location,
                        });
                        return Outcome::Failed;
                    }
                }
            }
            *funcall.args.borrow_mut() = ordered;
            aligned = pairs;
        } else {
            aligned = actuals
                .iter()
                .cloned()
                .enumerate()
                .filter(|(index, _)| *index < formals.len())
                .collect();
        }

        // actual types must equal the formal types, modulo the implicit
        // promotions; vararg actuals accept any type
        for (index, actual) in &aligned {
            let formal = &formals[*index];
            if formal.vararg {
                continue;
            }
            let Some(actual_type) = ctx.type_of(actual.expression.borrow().id()) else {
                self.ice("funcall argument lost its type", actual.location);
                return Outcome::Failed;
            };
            if !promotable(&formal.ty, &actual_type) {
                self.report(TypifyError::ArgumentTypeMismatch {
                    index: index + 1,
                    expected: formal.ty.clone(),
                    found: actual_type,
                    location: actual.location,
                });
                return Outcome::Failed;
            }
        }

        Outcome::Typed(ret.clone())
    }

    /// Validate a written type wherever it enters the tree. Shared type
    /// nodes are validated once.
    fn typify_type(&mut self, ty: &Rc<Type>, ctx: &mut TypedContext) {
        if !self.checked_types.insert(Rc::as_ptr(ty) as usize) {
            return;
        }
        match &ty.kind {
            TypeKind::Integral { size, .. } => {
                if !(1..=64).contains(size) {
                    self.report(TypifyError::IntegralWidthOutOfRange {
                        location: ty.location,
                    });
                }
            }
            TypeKind::Array { elem, nelem } => {
                self.typify_type(elem, ctx);
                if let Some(nelem) = nelem
                    && let Some(nelem_type) = self.typify_value(nelem, ctx)
                    && !nelem_type.is_integral()
                    && !nelem_type.is_offset()
                {
                    self.report(TypifyError::ArrayBoundsNotIntegral {
                        found: nelem_type,
                        location: nelem.borrow().location(),
                    });
                }
            }
            TypeKind::Struct { fields } => {
                for field in fields {
                    self.typify_type(&field.ty, ctx);
                    // struct elements may not have function types
                    if field.ty.is_function() {
                        self.report(TypifyError::FunctionTypedStructField {
                            location: field.ty.location,
                        });
                    }
                }
            }
            TypeKind::Offset { base, .. } => self.typify_type(base, ctx),
            TypeKind::Function { ret, args } => {
                self.typify_type(ret, ctx);
                for arg in args {
                    self.typify_type(&arg.ty, ctx);
                }
            }
            TypeKind::String | TypeKind::Any | TypeKind::Void => {}
        }
    }

    fn make_integer(
        &mut self,
        value: u64,
        ty: Rc<Type>,
        location: Location,
        ctx: &mut TypedContext,
    ) -> Expression {
        Expression::Integer(Rc::new(IntegerLiteral {
            id: ctx.arena_mut().fresh_id(),
            location,
            value,
            ty,
        }))
    }
}
