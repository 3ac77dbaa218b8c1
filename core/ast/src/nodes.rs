//! AST node definitions for the Pkl compiler.
//!
//! The parser (external to this crate family) produces these nodes through
//! [`crate::builder::AstBuilder`]. Every node carries a unique `id` and a
//! source [`Location`]; the type phases attach their results to node ids
//! rather than mutating the nodes themselves.
//!
//! Child expression slots are `RefCell<Expression>` so that a compiler phase
//! can replace a whole subtree in place (constant folding of `isa` does
//! this) without rebuilding the parent node.

use core::fmt;
use std::{
    cell::{Cell, RefCell},
    fmt::{Display, Formatter},
    rc::Rc,
};

use crate::types::Type;

/// A line/column region in the compilation unit's source buffer. One
/// compilation unit is compiled at a time, so locations don't carry a file
/// name; the diagnostic consumer knows which buffer it handed in.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Location {
    pub first_line: u32,
    pub first_column: u32,
    pub last_line: u32,
    pub last_column: u32,
}

impl Location {
    #[must_use]
    pub fn span(first_line: u32, first_column: u32, last_line: u32, last_column: u32) -> Self {
        Self {
            first_line,
            first_column,
            last_line,
            last_column,
        }
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.first_line, self.first_column)
    }
}

/// Declares the node structs. Every node is plain public data (the AST is
/// the interface between the parser and the compiler phases) prefixed with
/// its identity: a unique `id` and the source region it came from.
macro_rules! nodes {
    (
        $(
            $(#[$outer:meta])*
            struct $name:ident {
                $( $field:ident : $ty:ty ),* $(,)?
            }
        )+
    ) => {
        $(
            $(#[$outer])*
            #[derive(Clone, Debug)]
            pub struct $name {
                pub id: u32,
                pub location: Location,
                $( pub $field : $ty, )*
            }
        )+
    };
}

/// Declares a node category enum over `Rc`-shared structs, with uniform
/// `id()`/`location()` accessors delegating to the wrapped node.
macro_rules! node_enum {
    (
        $(#[$outer:meta])*
        enum $name:ident {
            $( $arm:ident ( $inner:ty ) ),+ $(,)?
        }
    ) => {
        $(#[$outer])*
        #[derive(Clone, Debug)]
        pub enum $name {
            $( $arm(Rc<$inner>), )+
        }

        impl $name {
            #[must_use]
            pub fn id(&self) -> u32 {
                match self {
                    $( $name::$arm(node) => node.id, )+
                }
            }

            #[must_use]
            pub fn location(&self) -> Location {
                match self {
                    $( $name::$arm(node) => node.location, )+
                }
            }
        }
    };
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum UnaryOperatorKind {
    Not,
    Neg,
    Pos,
    BitNot,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum OperatorKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    And,
    Or,
    Shl,
    Shr,
    BitOr,
    BitXor,
    BitAnd,
    BitConcat,
}

impl Display for OperatorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match self {
            OperatorKind::Add => "+",
            OperatorKind::Sub => "-",
            OperatorKind::Mul => "*",
            OperatorKind::Div => "/",
            OperatorKind::Mod => "%",
            OperatorKind::Eq => "==",
            OperatorKind::Ne => "!=",
            OperatorKind::Lt => "<",
            OperatorKind::Gt => ">",
            OperatorKind::Le => "<=",
            OperatorKind::Ge => ">=",
            OperatorKind::And => "&&",
            OperatorKind::Or => "||",
            OperatorKind::Shl => "<<",
            OperatorKind::Shr => ">>",
            OperatorKind::BitOr => "|",
            OperatorKind::BitXor => "^",
            OperatorKind::BitAnd => "&",
            OperatorKind::BitConcat => "::",
        };
        write!(f, "{s}")
    }
}

/// Value attributes, written `exp'attr` in the source language.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttrKind {
    Size,
    Signed,
    Magnitude,
    Unit,
    Length,
    Alignment,
    Offset,
    Mapped,
}

impl Display for AttrKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        let s = match self {
            AttrKind::Size => "size",
            AttrKind::Signed => "signed",
            AttrKind::Magnitude => "magnitude",
            AttrKind::Unit => "unit",
            AttrKind::Length => "length",
            AttrKind::Alignment => "alignment",
            AttrKind::Offset => "offset",
            AttrKind::Mapped => "mapped",
        };
        write!(f, "{s}")
    }
}

nodes! {

    struct Identifier {
        name: String,
    }

    struct Program {
        statements: Vec<Statement>,
    }

    /// An integer literal. The lexer determines the integral type from the
    /// literal's suffix and magnitude, so the node arrives already typed.
    struct IntegerLiteral {
        value: u64,
        ty: Rc<Type>,
    }

    struct StringLiteral {
        value: String,
    }

    struct UnaryExpression {
        operator: UnaryOperatorKind,
        operand: RefCell<Expression>,
    }

    struct BinaryExpression {
        operator: OperatorKind,
        left: RefCell<Expression>,
        right: RefCell<Expression>,
    }

    struct AttrExpression {
        attr: AttrKind,
        operand: RefCell<Expression>,
    }

    struct SizeofExpression {
        operand: RefCell<Expression>,
    }

    struct SizeofTypeExpression {
        ty: Rc<Type>,
    }

    struct IsaExpression {
        expression: RefCell<Expression>,
        ty: Rc<Type>,
    }

    struct CastExpression {
        ty: Rc<Type>,
        expression: RefCell<Expression>,
    }

    /// An offset literal such as `3#B`. The unit is kept as bits-per-unit;
    /// the parser folds unit names (`b`, `B`, `Kb`, ...) to that number.
    struct OffsetExpression {
        magnitude: RefCell<Expression>,
        unit: u64,
    }

    struct ArrayExpression {
        initializers: Vec<RefCell<Expression>>,
    }

    struct TrimmerExpression {
        entity: RefCell<Expression>,
        from: RefCell<Expression>,
        to: RefCell<Expression>,
    }

    struct IndexerExpression {
        entity: RefCell<Expression>,
        index: RefCell<Expression>,
    }

    struct StructElem {
        name: Option<Rc<Identifier>>,
        expression: RefCell<Expression>,
    }

    struct StructExpression {
        elems: Vec<Rc<StructElem>>,
    }

    /// A struct constructor `T { ... }`. The annotation must denote a
    /// struct type; the value is the struct literal being constructed.
    struct StructConsExpression {
        ty: Rc<Type>,
        value: RefCell<Expression>,
    }

    struct StructRefExpression {
        expression: RefCell<Expression>,
        field: Rc<Identifier>,
    }

    /// One actual argument in a function call. `first_vararg` is annotated
    /// by the type phase on the first actual that lands in a variadic
    /// formal slot; code generation uses it to build the variadic pack.
    struct FuncallArg {
        name: Option<Rc<Identifier>>,
        expression: RefCell<Expression>,
        first_vararg: Cell<bool>,
    }

    /// The argument vector sits behind a `RefCell` so that named arguments
    /// can be reordered into formal order in place.
    struct FuncallExpression {
        function: RefCell<Expression>,
        args: RefCell<Vec<Rc<FuncallArg>>>,
    }

    /// One formal argument of a function literal. An argument with an
    /// `initial` expression is optional; at most one argument is `vararg`
    /// and the parser guarantees optional/vararg arguments come last.
    struct FuncArg {
        name: Rc<Identifier>,
        ty: Rc<Type>,
        initial: Option<RefCell<Expression>>,
        vararg: bool,
    }

    struct FunctionExpression {
        args: Vec<Rc<FuncArg>>,
        return_type: Rc<Type>,
        body: Statement,
    }

    /// A reference to a declared variable. Name resolution happens in the
    /// parser; only the declaring statement's node id survives to here.
    struct VarExpression {
        name: Rc<Identifier>,
        decl_id: u32,
    }

    struct MapExpression {
        ty: Rc<Type>,
        offset: RefCell<Expression>,
    }

    struct DeclStatement {
        name: Rc<Identifier>,
        initial: RefCell<Expression>,
    }

    struct CompoundStatement {
        statements: Vec<Statement>,
    }

    struct ExpStatement {
        expression: RefCell<Expression>,
    }

    struct AssignStatement {
        lvalue: RefCell<Expression>,
        value: RefCell<Expression>,
    }

    struct IfStatement {
        condition: RefCell<Expression>,
        then_body: Statement,
        else_body: Option<Statement>,
    }

    /// All loop forms share one node: `while c` has only a condition,
    /// `for (decl; cond; ...)` has an iterator and a condition, and
    /// `for (x in container)` has an iterator and a container.
    struct LoopStatement {
        iterator: Option<Rc<DeclStatement>>,
        condition: Option<RefCell<Expression>>,
        container: Option<RefCell<Expression>>,
        body: Statement,
    }

    struct PrintStatement {
        expression: Option<RefCell<Expression>>,
    }

    struct RaiseStatement {
        expression: Option<RefCell<Expression>>,
    }

    struct TryCatchStatement {
        body: Statement,
        arg: Option<Rc<FuncArg>>,
        condition: Option<RefCell<Expression>>,
        handler: Statement,
    }

    struct ReturnStatement {
        expression: Option<RefCell<Expression>>,
    }
}

node_enum! {
    enum Expression {
        Integer(IntegerLiteral),
        String(StringLiteral),
        Unary(UnaryExpression),
        Binary(BinaryExpression),
        Attr(AttrExpression),
        Sizeof(SizeofExpression),
        SizeofType(SizeofTypeExpression),
        Isa(IsaExpression),
        Cast(CastExpression),
        Offset(OffsetExpression),
        Array(ArrayExpression),
        Trimmer(TrimmerExpression),
        Indexer(IndexerExpression),
        Struct(StructExpression),
        StructCons(StructConsExpression),
        StructRef(StructRefExpression),
        Funcall(FuncallExpression),
        Function(FunctionExpression),
        Var(VarExpression),
        Map(MapExpression),
    }
}

node_enum! {
    enum Statement {
        Decl(DeclStatement),
        Compound(CompoundStatement),
        Expression(ExpStatement),
        Assignment(AssignStatement),
        If(IfStatement),
        Loop(LoopStatement),
        Print(PrintStatement),
        Raise(RaiseStatement),
        TryCatch(TryCatchStatement),
        Return(ReturnStatement),
    }
}

impl Expression {
    /// Whether this expression is a compile-time constant, as far as array
    /// type completeness is concerned: an integer literal, or an offset
    /// literal whose magnitude is an integer literal.
    #[must_use = "this is a pure check with no side effects"]
    pub fn is_constant(&self) -> bool {
        match self {
            Expression::Integer(_) => true,
            Expression::Offset(offset) => {
                matches!(&*offset.magnitude.borrow(), Expression::Integer(_))
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expression::Integer(_) => "Integer",
            Expression::String(_) => "String",
            Expression::Unary(_) => "Unary",
            Expression::Binary(_) => "Binary",
            Expression::Attr(_) => "Attr",
            Expression::Sizeof(_) => "Sizeof",
            Expression::SizeofType(_) => "SizeofType",
            Expression::Isa(_) => "Isa",
            Expression::Cast(_) => "Cast",
            Expression::Offset(_) => "Offset",
            Expression::Array(_) => "Array",
            Expression::Trimmer(_) => "Trimmer",
            Expression::Indexer(_) => "Indexer",
            Expression::Struct(_) => "Struct",
            Expression::StructCons(_) => "StructCons",
            Expression::StructRef(_) => "StructRef",
            Expression::Funcall(_) => "Funcall",
            Expression::Function(_) => "Function",
            Expression::Var(_) => "Var",
            Expression::Map(_) => "Map",
        }
    }
}

/// Uniform node wrapper stored in the [`crate::arena::Arena`].
#[derive(Clone, Debug)]
pub enum AstNode {
    Program(Rc<Program>),
    Statement(Statement),
    Expression(Expression),
}

impl AstNode {
    #[must_use]
    pub fn id(&self) -> u32 {
        match self {
            AstNode::Program(n) => n.id,
            AstNode::Statement(n) => n.id(),
            AstNode::Expression(n) => n.id(),
        }
    }

    #[must_use]
    pub fn location(&self) -> Location {
        match self {
            AstNode::Program(n) => n.location,
            AstNode::Statement(n) => n.location(),
            AstNode::Expression(n) => n.location(),
        }
    }
}
