//! Programmatic AST construction.
//!
//! [`AstBuilder`] is the interface the parser targets: one method per node
//! kind, each minting a fresh id, registering the node in the [`Arena`] and
//! returning the typed handle. The test suites use it directly to assemble
//! programs without going through a parser.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{
    arena::Arena,
    nodes::{
        ArrayExpression, AssignStatement, AstNode, AttrExpression, AttrKind, BinaryExpression,
        CastExpression, CompoundStatement, DeclStatement, ExpStatement, Expression, FuncArg,
        FuncallArg, FuncallExpression, FunctionExpression, Identifier, IfStatement,
        IndexerExpression, IntegerLiteral, IsaExpression, Location, LoopStatement, MapExpression,
        OffsetExpression, OperatorKind, PrintStatement, Program, RaiseStatement, ReturnStatement,
        SizeofExpression, SizeofTypeExpression, Statement, StringLiteral, StructConsExpression,
        StructElem, StructExpression, StructRefExpression, TrimmerExpression, TryCatchStatement,
        UnaryExpression, UnaryOperatorKind, VarExpression,
    },
    types::Type,
};

#[derive(Default)]
pub struct AstBuilder {
    arena: Arena,
}

impl AstBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn register_expression(&mut self, expression: Expression) -> Expression {
        self.arena
            .add_node(AstNode::Expression(expression.clone()));
        expression
    }

    fn register_statement(&mut self, statement: Statement) -> Statement {
        self.arena.add_node(AstNode::Statement(statement.clone()));
        statement
    }

    pub fn identifier(&mut self, name: &str, location: Location) -> Rc<Identifier> {
        Rc::new(Identifier {
            id: self.arena.fresh_id(),
            location,
            name: name.to_string(),
        })
    }

    pub fn integer(&mut self, value: u64, ty: Rc<Type>, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Integer(Rc::new(IntegerLiteral {
            id,
            location,
            value,
            ty,
        })))
    }

    pub fn string(&mut self, value: &str, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::String(Rc::new(StringLiteral {
            id,
            location,
            value: value.to_string(),
        })))
    }

    pub fn unary(
        &mut self,
        operator: UnaryOperatorKind,
        operand: Expression,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Unary(Rc::new(UnaryExpression {
            id,
            location,
            operator,
            operand: RefCell::new(operand),
        })))
    }

    pub fn binary(
        &mut self,
        operator: OperatorKind,
        left: Expression,
        right: Expression,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Binary(Rc::new(BinaryExpression {
            id,
            location,
            operator,
            left: RefCell::new(left),
            right: RefCell::new(right),
        })))
    }

    pub fn attr(
        &mut self,
        attr: AttrKind,
        operand: Expression,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Attr(Rc::new(AttrExpression {
            id,
            location,
            attr,
            operand: RefCell::new(operand),
        })))
    }

    pub fn sizeof_expression(&mut self, operand: Expression, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Sizeof(Rc::new(SizeofExpression {
            id,
            location,
            operand: RefCell::new(operand),
        })))
    }

    pub fn sizeof_type(&mut self, ty: Rc<Type>, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::SizeofType(Rc::new(SizeofTypeExpression {
            id,
            location,
            ty,
        })))
    }

    pub fn isa(&mut self, expression: Expression, ty: Rc<Type>, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Isa(Rc::new(IsaExpression {
            id,
            location,
            expression: RefCell::new(expression),
            ty,
        })))
    }

    pub fn cast(&mut self, ty: Rc<Type>, expression: Expression, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Cast(Rc::new(CastExpression {
            id,
            location,
            ty,
            expression: RefCell::new(expression),
        })))
    }

    pub fn offset(&mut self, magnitude: Expression, unit: u64, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Offset(Rc::new(OffsetExpression {
            id,
            location,
            magnitude: RefCell::new(magnitude),
            unit,
        })))
    }

    pub fn array(&mut self, initializers: Vec<Expression>, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Array(Rc::new(ArrayExpression {
            id,
            location,
            initializers: initializers.into_iter().map(RefCell::new).collect(),
        })))
    }

    pub fn trimmer(
        &mut self,
        entity: Expression,
        from: Expression,
        to: Expression,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Trimmer(Rc::new(TrimmerExpression {
            id,
            location,
            entity: RefCell::new(entity),
            from: RefCell::new(from),
            to: RefCell::new(to),
        })))
    }

    pub fn indexer(
        &mut self,
        entity: Expression,
        index: Expression,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Indexer(Rc::new(IndexerExpression {
            id,
            location,
            entity: RefCell::new(entity),
            index: RefCell::new(index),
        })))
    }

    pub fn struct_elem(
        &mut self,
        name: Option<&str>,
        expression: Expression,
        location: Location,
    ) -> Rc<StructElem> {
        let name = name.map(|name| self.identifier(name, location));
        Rc::new(StructElem {
            id: self.arena.fresh_id(),
            location,
            name,
            expression: RefCell::new(expression),
        })
    }

    pub fn struct_literal(
        &mut self,
        elems: Vec<Rc<StructElem>>,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Struct(Rc::new(StructExpression {
            id,
            location,
            elems,
        })))
    }

    pub fn struct_cons(
        &mut self,
        ty: Rc<Type>,
        value: Expression,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::StructCons(Rc::new(StructConsExpression {
            id,
            location,
            ty,
            value: RefCell::new(value),
        })))
    }

    pub fn struct_ref(
        &mut self,
        expression: Expression,
        field: &str,
        location: Location,
    ) -> Expression {
        let field = self.identifier(field, location);
        let id = self.arena.fresh_id();
        self.register_expression(Expression::StructRef(Rc::new(StructRefExpression {
            id,
            location,
            expression: RefCell::new(expression),
            field,
        })))
    }

    pub fn funcall_arg(
        &mut self,
        name: Option<&str>,
        expression: Expression,
        location: Location,
    ) -> Rc<FuncallArg> {
        let name = name.map(|name| self.identifier(name, location));
        Rc::new(FuncallArg {
            id: self.arena.fresh_id(),
            location,
            name,
            expression: RefCell::new(expression),
            first_vararg: Cell::new(false),
        })
    }

    pub fn funcall(
        &mut self,
        function: Expression,
        args: Vec<Rc<FuncallArg>>,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Funcall(Rc::new(FuncallExpression {
            id,
            location,
            function: RefCell::new(function),
            args: RefCell::new(args),
        })))
    }

    pub fn func_arg(
        &mut self,
        name: &str,
        ty: Rc<Type>,
        initial: Option<Expression>,
        vararg: bool,
        location: Location,
    ) -> Rc<FuncArg> {
        let name = self.identifier(name, location);
        Rc::new(FuncArg {
            id: self.arena.fresh_id(),
            location,
            name,
            ty,
            initial: initial.map(RefCell::new),
            vararg,
        })
    }

    pub fn function(
        &mut self,
        args: Vec<Rc<FuncArg>>,
        return_type: Rc<Type>,
        body: Statement,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Function(Rc::new(FunctionExpression {
            id,
            location,
            args,
            return_type,
            body,
        })))
    }

    pub fn var(
        &mut self,
        decl: &Rc<DeclStatement>,
        location: Location,
    ) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Var(Rc::new(VarExpression {
            id,
            location,
            name: decl.name.clone(),
            decl_id: decl.id,
        })))
    }

    pub fn map(&mut self, ty: Rc<Type>, offset: Expression, location: Location) -> Expression {
        let id = self.arena.fresh_id();
        self.register_expression(Expression::Map(Rc::new(MapExpression {
            id,
            location,
            ty,
            offset: RefCell::new(offset),
        })))
    }

    pub fn decl(&mut self, name: &str, initial: Expression, location: Location) -> Rc<DeclStatement> {
        let name = self.identifier(name, location);
        let decl = Rc::new(DeclStatement {
            id: self.arena.fresh_id(),
            location,
            name,
            initial: RefCell::new(initial),
        });
        self.register_statement(Statement::Decl(decl.clone()));
        decl
    }

    /// An iterator declaration for `for (x in container)` loops. The parser
    /// installs a dummy initializer; the type phase overrides its type with
    /// the container's element type.
    pub fn loop_iterator(&mut self, name: &str, location: Location) -> Rc<DeclStatement> {
        let dummy = self.integer(0, Type::char(location), location);
        self.decl(name, dummy, location)
    }

    pub fn compound(&mut self, statements: Vec<Statement>, location: Location) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Compound(Rc::new(CompoundStatement {
            id,
            location,
            statements,
        })))
    }

    pub fn expression_statement(&mut self, expression: Expression, location: Location) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Expression(Rc::new(ExpStatement {
            id,
            location,
            expression: RefCell::new(expression),
        })))
    }

    pub fn assignment(
        &mut self,
        lvalue: Expression,
        value: Expression,
        location: Location,
    ) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Assignment(Rc::new(AssignStatement {
            id,
            location,
            lvalue: RefCell::new(lvalue),
            value: RefCell::new(value),
        })))
    }

    pub fn if_statement(
        &mut self,
        condition: Expression,
        then_body: Statement,
        else_body: Option<Statement>,
        location: Location,
    ) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::If(Rc::new(IfStatement {
            id,
            location,
            condition: RefCell::new(condition),
            then_body,
            else_body,
        })))
    }

    pub fn loop_statement(
        &mut self,
        iterator: Option<Rc<DeclStatement>>,
        condition: Option<Expression>,
        container: Option<Expression>,
        body: Statement,
        location: Location,
    ) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Loop(Rc::new(LoopStatement {
            id,
            location,
            iterator,
            condition: condition.map(RefCell::new),
            container: container.map(RefCell::new),
            body,
        })))
    }

    pub fn print(&mut self, expression: Option<Expression>, location: Location) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Print(Rc::new(PrintStatement {
            id,
            location,
            expression: expression.map(RefCell::new),
        })))
    }

    pub fn raise(&mut self, expression: Option<Expression>, location: Location) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Raise(Rc::new(RaiseStatement {
            id,
            location,
            expression: expression.map(RefCell::new),
        })))
    }

    pub fn try_catch(
        &mut self,
        body: Statement,
        arg: Option<Rc<FuncArg>>,
        condition: Option<Expression>,
        handler: Statement,
        location: Location,
    ) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::TryCatch(Rc::new(TryCatchStatement {
            id,
            location,
            body,
            arg,
            condition: condition.map(RefCell::new),
            handler,
        })))
    }

    pub fn return_statement(
        &mut self,
        expression: Option<Expression>,
        location: Location,
    ) -> Statement {
        let id = self.arena.fresh_id();
        self.register_statement(Statement::Return(Rc::new(ReturnStatement {
            id,
            location,
            expression: expression.map(RefCell::new),
        })))
    }

    /// Builds the program root and hands the finished arena over.
    #[must_use = "consumes the builder and yields the arena for the type phases"]
    pub fn program(mut self, statements: Vec<Statement>, location: Location) -> Arena {
        let program = Rc::new(Program {
            id: self.arena.fresh_id(),
            location,
            statements,
        });
        self.arena.add_node(AstNode::Program(program));
        self.arena
    }
}
