//! Diagnostics produced by the type phases.
//!
//! Every diagnostic carries the source [`Location`] of the offending node.
//! User-facing errors and internal compiler errors ([`TypifyError::Ice`])
//! are distinct variants: an ICE means an invariant of the pass itself was
//! violated, not that the program being compiled is wrong.

use std::rc::Rc;

use pkl_ast::nodes::{AttrKind, Location, OperatorKind};
use pkl_ast::types::Type;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum TypifyError {
    #[error("{location}: invalid operand to NOT")]
    NotOperandNotIntegral { location: Location },

    #[error("{location}: invalid operands to relational operator: `{left}` and `{right}`")]
    InvalidRelationalOperands {
        left: Rc<Type>,
        right: Rc<Type>,
        location: Location,
    },

    #[error("{location}: invalid operands to `{operator}`: `{left}` and `{right}`")]
    InvalidBinaryOperands {
        operator: OperatorKind,
        left: Rc<Type>,
        right: Rc<Type>,
        location: Location,
    },

    #[error("{location}: bit-concatenation requires integral operands")]
    BitConcatNotIntegral { location: Location },

    #[error("{location}: the sum of the widths of the operands should not exceed 64 bits")]
    BitConcatTooWide { location: Location },

    #[error("{location}: casting a value to `any` is not allowed")]
    CastToAny { location: Location },

    #[error("{location}: casting a value to a function type is not allowed")]
    CastToFunction { location: Location },

    #[error("{location}: casting a function to any other type is not allowed")]
    CastFromFunction { location: Location },

    #[error("{location}: invalid cast to string: expected `uint<8>`, got `{found}`")]
    InvalidCastToString { found: Rc<Type>, location: Location },

    #[error(
        "{location}: array initializers should be of the same type: expected `{expected}`, got `{found}`"
    )]
    ArrayInitializerMismatch {
        expected: Rc<Type>,
        found: Rc<Type>,
        location: Location,
    },

    #[error("{location}: index in trimmer should be an integer")]
    TrimmerIndexNotIntegral { location: Location },

    #[error("{location}: operand to [] should be an array or a string, got `{found}`")]
    IndexedEntityNotContainer { found: Rc<Type>, location: Location },

    #[error("{location}: index should be an integer")]
    IndexNotIntegral { location: Location },

    #[error("{location}: called value is not a function")]
    CalleeNotFunction { location: Location },

    #[error("{location}: too few arguments passed to function")]
    TooFewArguments { location: Location },

    #[error("{location}: too many arguments passed to function")]
    TooManyArguments { location: Location },

    #[error("{location}: function doesn't take named arguments")]
    NamedArgumentsNotTaken { location: Location },

    #[error("{location}: function doesn't take a `{name}` argument")]
    UnknownNamedArgument { name: String, location: Location },

    #[error("{location}: required argument `{name}` not specified in call")]
    MissingRequiredArgument { name: String, location: Location },

    #[error(
        "{location}: function argument {index} has the wrong type: expected `{expected}`, got `{found}`"
    )]
    ArgumentTypeMismatch {
        index: usize,
        expected: Rc<Type>,
        found: Rc<Type>,
        location: Location,
    },

    #[error("{location}: function doesn't return a value")]
    VoidValueUsed { location: Location },

    #[error(
        "{location}: r-value in assignment has the wrong type: expected `{expected}`, got `{found}`"
    )]
    AssignmentTypeMismatch {
        expected: Rc<Type>,
        found: Rc<Type>,
        location: Location,
    },

    #[error("{location}: expected a struct, got `{found}`")]
    StructRefNotStruct { found: Rc<Type>, location: Location },

    #[error("{location}: referred field `{field}` doesn't exist in struct")]
    UnknownStructField { field: String, location: Location },

    #[error("{location}: expected a struct type in constructor, got `{found}`")]
    ConstructorNotStruct { found: Rc<Type>, location: Location },

    #[error("{location}: attribute '{attr} is not defined for values of type `{found}`")]
    InvalidAttribute {
        attr: AttrKind,
        found: Rc<Type>,
        location: Location,
    },

    #[error("{location}: the width of an integral type should be in the [1,64] range")]
    IntegralWidthOutOfRange { location: Location },

    #[error("{location}: expected integral or offset value for array bounds, got `{found}`")]
    ArrayBoundsNotIntegral { found: Rc<Type>, location: Location },

    #[error("{location}: expected an offset in map, got `{found}`")]
    MapOffsetNotOffset { found: Rc<Type>, location: Location },

    #[error("{location}: expected array or string in loop container, got `{found}`")]
    LoopContainerNotIterable { found: Rc<Type>, location: Location },

    #[error("{location}: expected boolean expression")]
    LoopConditionNotBoolean { location: Location },

    #[error("{location}: expected a string in `print`, got `{found}`")]
    PrintOperandNotString { found: Rc<Type>, location: Location },

    #[error("{location}: exception in `raise` statement should be an integral number")]
    RaiseOperandNotIntegral { location: Location },

    #[error("{location}: expected int<32> for exception type")]
    CatchArgumentNotException { location: Location },

    #[error("{location}: invalid exception number")]
    CatchConditionNotIntegral { location: Location },

    #[error(
        "{location}: returning an expression of the wrong type: expected `{expected}`, got `{found}`"
    )]
    ReturnTypeMismatch {
        expected: Rc<Type>,
        found: Rc<Type>,
        location: Location,
    },

    #[error("{location}: returning a value in a void function")]
    ReturnValueInVoidFunction { location: Location },

    #[error("{location}: invalid type in struct element")]
    FunctionTypedStructField { location: Location },

    #[error("{location}: sized array types not allowed in this context")]
    SizedArrayNotAllowed { location: Location },

    #[error("{location}: internal compiler error: {message}")]
    Ice { message: String, location: Location },
}

impl TypifyError {
    /// Returns the source location associated with this diagnostic.
    #[must_use]
    pub fn location(&self) -> &Location {
        match self {
            TypifyError::NotOperandNotIntegral { location }
            | TypifyError::InvalidRelationalOperands { location, .. }
            | TypifyError::InvalidBinaryOperands { location, .. }
            | TypifyError::BitConcatNotIntegral { location }
            | TypifyError::BitConcatTooWide { location }
            | TypifyError::CastToAny { location }
            | TypifyError::CastToFunction { location }
            | TypifyError::CastFromFunction { location }
            | TypifyError::InvalidCastToString { location, .. }
            | TypifyError::ArrayInitializerMismatch { location, .. }
            | TypifyError::TrimmerIndexNotIntegral { location }
            | TypifyError::IndexedEntityNotContainer { location, .. }
            | TypifyError::IndexNotIntegral { location }
            | TypifyError::CalleeNotFunction { location }
            | TypifyError::TooFewArguments { location }
            | TypifyError::TooManyArguments { location }
            | TypifyError::NamedArgumentsNotTaken { location }
            | TypifyError::UnknownNamedArgument { location, .. }
            | TypifyError::MissingRequiredArgument { location, .. }
            | TypifyError::ArgumentTypeMismatch { location, .. }
            | TypifyError::VoidValueUsed { location }
            | TypifyError::AssignmentTypeMismatch { location, .. }
            | TypifyError::StructRefNotStruct { location, .. }
            | TypifyError::UnknownStructField { location, .. }
            | TypifyError::ConstructorNotStruct { location, .. }
            | TypifyError::InvalidAttribute { location, .. }
            | TypifyError::IntegralWidthOutOfRange { location }
            | TypifyError::ArrayBoundsNotIntegral { location, .. }
            | TypifyError::MapOffsetNotOffset { location, .. }
            | TypifyError::LoopContainerNotIterable { location, .. }
            | TypifyError::LoopConditionNotBoolean { location }
            | TypifyError::PrintOperandNotString { location, .. }
            | TypifyError::RaiseOperandNotIntegral { location }
            | TypifyError::CatchArgumentNotException { location }
            | TypifyError::CatchConditionNotIntegral { location }
            | TypifyError::ReturnTypeMismatch { location, .. }
            | TypifyError::ReturnValueInVoidFunction { location }
            | TypifyError::FunctionTypedStructField { location }
            | TypifyError::SizedArrayNotAllowed { location }
            | TypifyError::Ice { location, .. } => location,
        }
    }

    /// Whether this diagnostic reports a violated invariant of the pass
    /// itself rather than an error in the program being compiled.
    #[must_use]
    pub fn is_ice(&self) -> bool {
        matches!(self, TypifyError::Ice { .. })
    }
}
