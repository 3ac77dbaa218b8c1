//! Type nodes and their supporting operations.
//!
//! The type system works over a single [`Type`] representation, shared
//! between written types (what the parser saw in the source) and synthesized
//! types (what the type phases compute for expressions). Sharing is by
//! `Rc<Type>`: one type node may be referenced from many expression nodes.
//!
//! A type's `complete` cell records whether its total size in bits is a
//! compile-time constant. It starts [`Completeness::Unknown`] and is written
//! exclusively by the second type phase; [`Type::is_complete`] is the pure
//! recomputation that phase stores.

use core::fmt;
use std::{
    cell::{Cell, RefCell},
    fmt::{Display, Formatter},
    rc::Rc,
};

use crate::nodes::{Expression, Identifier, Location};

/// Bits per unit of the canonical `bits` offset unit.
pub const UNIT_BITS: u64 = 1;
/// Bits per unit of the `bytes` offset unit.
pub const UNIT_BYTES: u64 = 8;
/// Bits per unit of the `kilobytes` offset unit.
pub const UNIT_KILOBYTES: u64 = 8000;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum Completeness {
    #[default]
    Unknown,
    Complete,
    Incomplete,
}

#[derive(Clone, Debug)]
pub struct StructTypeField {
    pub name: Option<Rc<Identifier>>,
    pub ty: Rc<Type>,
}

#[derive(Clone, Debug)]
pub struct FuncTypeArg {
    pub ty: Rc<Type>,
    pub name: Option<Rc<Identifier>>,
    pub optional: bool,
    pub vararg: bool,
}

#[derive(Debug)]
pub enum TypeKind {
    /// An integer type of 1 to 64 bits, signed or unsigned. The width
    /// bounds are enforced by the first type phase, not by construction.
    Integral { size: u32, signed: bool },
    String,
    /// An array type. `nelem`, when present, is the element-count
    /// expression written in the source; it stays an expression because
    /// completeness depends on whether it is constant.
    Array {
        elem: Rc<Type>,
        nelem: Option<RefCell<Expression>>,
    },
    Struct { fields: Vec<StructTypeField> },
    /// A dimensioned scalar. `unit` is the positive number of bits per
    /// unit (bits = 1, bytes = 8, ...). The base type is integral.
    Offset { base: Rc<Type>, unit: u64 },
    Function { ret: Rc<Type>, args: Vec<FuncTypeArg> },
    Any,
    Void,
}

#[derive(Debug)]
pub struct Type {
    pub location: Location,
    pub kind: TypeKind,
    complete: Cell<Completeness>,
}

impl Type {
    fn make(kind: TypeKind, location: Location) -> Rc<Type> {
        Rc::new(Type {
            location,
            kind,
            complete: Cell::new(Completeness::Unknown),
        })
    }

    #[must_use]
    pub fn integral(size: u32, signed: bool, location: Location) -> Rc<Type> {
        Self::make(TypeKind::Integral { size, signed }, location)
    }

    /// The canonical boolean: a 32-bit signed integer.
    #[must_use]
    pub fn boolean(location: Location) -> Rc<Type> {
        Self::integral(32, true, location)
    }

    /// The character type: an unsigned 8-bit integer.
    #[must_use]
    pub fn char(location: Location) -> Rc<Type> {
        Self::integral(8, false, location)
    }

    #[must_use]
    pub fn string(location: Location) -> Rc<Type> {
        Self::make(TypeKind::String, location)
    }

    #[must_use]
    pub fn array(
        elem: Rc<Type>,
        nelem: Option<Expression>,
        location: Location,
    ) -> Rc<Type> {
        Self::make(
            TypeKind::Array {
                elem,
                nelem: nelem.map(RefCell::new),
            },
            location,
        )
    }

    #[must_use]
    pub fn struct_type(fields: Vec<StructTypeField>, location: Location) -> Rc<Type> {
        Self::make(TypeKind::Struct { fields }, location)
    }

    #[must_use]
    pub fn offset(base: Rc<Type>, unit: u64, location: Location) -> Rc<Type> {
        Self::make(TypeKind::Offset { base, unit }, location)
    }

    /// The type of `sizeof` and of the `'size`/`'offset` attributes:
    /// an offset with a `uint<64>` magnitude counted in bits.
    #[must_use]
    pub fn bit_offset(location: Location) -> Rc<Type> {
        let base = Self::integral(64, false, location);
        Self::offset(base, UNIT_BITS, location)
    }

    #[must_use]
    pub fn function(ret: Rc<Type>, args: Vec<FuncTypeArg>, location: Location) -> Rc<Type> {
        Self::make(TypeKind::Function { ret, args }, location)
    }

    #[must_use]
    pub fn any(location: Location) -> Rc<Type> {
        Self::make(TypeKind::Any, location)
    }

    #[must_use]
    pub fn void(location: Location) -> Rc<Type> {
        Self::make(TypeKind::Void, location)
    }

    #[must_use]
    pub fn is_integral(&self) -> bool {
        matches!(self.kind, TypeKind::Integral { .. })
    }

    #[must_use]
    pub fn is_string(&self) -> bool {
        matches!(self.kind, TypeKind::String)
    }

    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self.kind, TypeKind::Array { .. })
    }

    #[must_use]
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, TypeKind::Struct { .. })
    }

    #[must_use]
    pub fn is_offset(&self) -> bool {
        matches!(self.kind, TypeKind::Offset { .. })
    }

    #[must_use]
    pub fn is_function(&self) -> bool {
        matches!(self.kind, TypeKind::Function { .. })
    }

    #[must_use]
    pub fn is_any(&self) -> bool {
        matches!(self.kind, TypeKind::Any)
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        matches!(self.kind, TypeKind::Void)
    }

    /// `(size, signed)` for integral types.
    #[must_use]
    pub fn integral_parts(&self) -> Option<(u32, bool)> {
        if let TypeKind::Integral { size, signed } = self.kind {
            Some((size, signed))
        } else {
            None
        }
    }

    /// `(base type, unit)` for offset types.
    #[must_use]
    pub fn offset_parts(&self) -> Option<(&Rc<Type>, u64)> {
        if let TypeKind::Offset { base, unit } = &self.kind {
            Some((base, *unit))
        } else {
            None
        }
    }

    #[must_use]
    pub fn array_elem(&self) -> Option<&Rc<Type>> {
        if let TypeKind::Array { elem, .. } = &self.kind {
            Some(elem)
        } else {
            None
        }
    }

    /// Whether both types belong to the same kind (integral, string, ...),
    /// regardless of their parameters.
    #[must_use]
    pub fn same_kind(&self, other: &Type) -> bool {
        std::mem::discriminant(&self.kind) == std::mem::discriminant(&other.kind)
    }

    /// Recompute whether this type's size in bits is a compile-time
    /// constant. Integral and offset types always are; strings, `any`,
    /// functions and `void` never are; arrays and structs depend on their
    /// components.
    #[must_use = "this is a pure computation; use set_complete to record it"]
    pub fn is_complete(&self) -> bool {
        match &self.kind {
            TypeKind::Integral { .. } | TypeKind::Offset { .. } => true,
            TypeKind::String | TypeKind::Any | TypeKind::Function { .. } | TypeKind::Void => false,
            TypeKind::Array { elem, nelem } => {
                elem.is_complete()
                    && nelem
                        .as_ref()
                        .is_some_and(|nelem| nelem.borrow().is_constant())
            }
            TypeKind::Struct { fields } => fields.iter().all(|field| field.ty.is_complete()),
        }
    }

    #[must_use]
    pub fn completeness(&self) -> Completeness {
        self.complete.get()
    }

    pub fn set_complete(&self, complete: bool) {
        self.complete.set(if complete {
            Completeness::Complete
        } else {
            Completeness::Incomplete
        });
    }
}

/// Structural equality. Locations and completeness annotations are ignored;
/// array types compare by element type only, struct types by field names
/// and types in order, function types by return type, argument types and
/// argument flags.
impl PartialEq for Type {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (
                TypeKind::Integral { size: s1, signed: g1 },
                TypeKind::Integral { size: s2, signed: g2 },
            ) => s1 == s2 && g1 == g2,
            (TypeKind::String, TypeKind::String)
            | (TypeKind::Any, TypeKind::Any)
            | (TypeKind::Void, TypeKind::Void) => true,
            (TypeKind::Array { elem: e1, .. }, TypeKind::Array { elem: e2, .. }) => e1 == e2,
            (TypeKind::Struct { fields: f1 }, TypeKind::Struct { fields: f2 }) => {
                f1.len() == f2.len()
                    && f1.iter().zip(f2.iter()).all(|(a, b)| {
                        let names_match = match (&a.name, &b.name) {
                            (Some(n1), Some(n2)) => n1.name == n2.name,
                            (None, None) => true,
                            _ => false,
                        };
                        names_match && a.ty == b.ty
                    })
            }
            (
                TypeKind::Offset { base: b1, unit: u1 },
                TypeKind::Offset { base: b2, unit: u2 },
            ) => b1 == b2 && u1 == u2,
            (
                TypeKind::Function { ret: r1, args: a1 },
                TypeKind::Function { ret: r2, args: a2 },
            ) => {
                r1 == r2
                    && a1.len() == a2.len()
                    && a1.iter().zip(a2.iter()).all(|(x, y)| {
                        x.ty == y.ty && x.optional == y.optional && x.vararg == y.vararg
                    })
            }
            _ => false,
        }
    }
}

fn unit_str(unit: u64) -> String {
    match unit {
        UNIT_BITS => "b".to_string(),
        UNIT_BYTES => "B".to_string(),
        _ => unit.to_string(),
    }
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match &self.kind {
            TypeKind::Integral { size, signed } => {
                write!(f, "{}int<{size}>", if *signed { "" } else { "u" })
            }
            TypeKind::String => write!(f, "string"),
            TypeKind::Array { elem, nelem } => {
                write!(f, "{elem}[")?;
                if let Some(nelem) = nelem
                    && let Expression::Integer(n) = &*nelem.borrow()
                {
                    write!(f, "{}", n.value)?;
                }
                write!(f, "]")
            }
            TypeKind::Struct { fields } => {
                write!(f, "struct {{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", field.ty)?;
                    if let Some(name) = &field.name {
                        write!(f, " {}", name.name)?;
                    }
                }
                write!(f, "}}")
            }
            TypeKind::Offset { base, unit } => {
                write!(f, "offset<{base},{}>", unit_str(*unit))
            }
            TypeKind::Function { ret, args } => {
                write!(f, "(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", arg.ty)?;
                    if arg.optional {
                        write!(f, "?")?;
                    }
                    if arg.vararg {
                        write!(f, "...")?;
                    }
                }
                write!(f, "){ret}")
            }
            TypeKind::Any => write!(f, "any"),
            TypeKind::Void => write!(f, "void"),
        }
    }
}
