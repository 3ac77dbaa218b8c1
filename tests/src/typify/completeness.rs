//! The second phase: completeness annotation and the sized-array
//! restriction on function argument types.

use std::rc::Rc;

use pkl_ast::builder::AstBuilder;
use pkl_ast::nodes::Statement;
use pkl_ast::types::{Completeness, StructTypeField, Type};

use crate::utils::{int, loc, string_ty, typify, uint};

fn field(ty: Rc<Type>) -> StructTypeField {
    StructTypeField { name: None, ty }
}

/// Runs the phases over `sizeof (ty)` and returns the completeness
/// recorded on the type.
fn completeness_of(ty: Rc<Type>) -> Completeness {
    let mut b = AstBuilder::new();
    let e = b.sizeof_type(ty.clone(), loc());
    let s = b.expression_statement(e, loc());
    typify(b.program(vec![s], loc())).expect("sizeof operand should typify");
    ty.completeness()
}

#[test]
fn scalar_types() {
    assert_eq!(completeness_of(int(32)), Completeness::Complete);
    assert_eq!(completeness_of(Type::bit_offset(loc())), Completeness::Complete);
    assert_eq!(completeness_of(string_ty()), Completeness::Incomplete);
    assert_eq!(completeness_of(Type::any(loc())), Completeness::Incomplete);
    assert_eq!(
        completeness_of(Type::function(Type::void(loc()), vec![], loc())),
        Completeness::Incomplete
    );
}

#[test]
fn array_with_constant_bounds_is_complete() {
    let mut b = AstBuilder::new();
    let bound = b.integer(3, uint(64), loc());
    let aty = Type::array(int(32), Some(bound), loc());
    let e = b.sizeof_type(aty.clone(), loc());
    let s = b.expression_statement(e, loc());
    typify(b.program(vec![s], loc())).unwrap();
    assert_eq!(aty.completeness(), Completeness::Complete);
}

#[test]
fn array_without_bounds_is_incomplete() {
    assert_eq!(
        completeness_of(Type::array(int(32), None, loc())),
        Completeness::Incomplete
    );
}

#[test]
fn array_of_incomplete_elements_is_incomplete() {
    let mut b = AstBuilder::new();
    let bound = b.integer(3, uint(64), loc());
    let aty = Type::array(string_ty(), Some(bound), loc());
    let e = b.sizeof_type(aty.clone(), loc());
    let s = b.expression_statement(e, loc());
    typify(b.program(vec![s], loc())).unwrap();
    assert_eq!(aty.completeness(), Completeness::Incomplete);
}

#[test]
fn struct_completeness_follows_its_fields() {
    let complete = Type::struct_type(vec![field(int(32)), field(uint(8))], loc());
    assert_eq!(completeness_of(complete), Completeness::Complete);

    let incomplete = Type::struct_type(vec![field(int(32)), field(string_ty())], loc());
    assert_eq!(completeness_of(incomplete), Completeness::Incomplete);
}

#[test]
fn nested_struct_fields_are_annotated_too() {
    let inner = Type::struct_type(vec![field(string_ty())], loc());
    let outer = Type::struct_type(vec![field(inner.clone()), field(int(32))], loc());
    assert_eq!(completeness_of(outer.clone()), Completeness::Incomplete);
    assert_eq!(inner.completeness(), Completeness::Incomplete);
}

#[test]
fn annotated_expression_types_get_flags() {
    // the array literal's synthesized type has no element count
    let mut b = AstBuilder::new();
    let one = b.integer(1, int(32), loc());
    let arr = b.array(vec![one], loc());
    let s = b.expression_statement(arr.clone(), loc());
    let ctx = typify(b.program(vec![s], loc())).unwrap();
    let arr_ty = ctx.type_of(arr.id()).unwrap();
    assert_eq!(arr_ty.completeness(), Completeness::Incomplete);

    // a struct literal of scalars synthesizes a complete struct type
    let mut b = AstBuilder::new();
    let x = b.integer(1, int(32), loc());
    let ex = b.struct_elem(Some("x"), x, loc());
    let lit = b.struct_literal(vec![ex], loc());
    let s = b.expression_statement(lit.clone(), loc());
    let ctx = typify(b.program(vec![s], loc())).unwrap();
    let lit_ty = ctx.type_of(lit.id()).unwrap();
    assert_eq!(lit_ty.completeness(), Completeness::Complete);
}

#[test]
fn flags_recompute_to_the_same_value() {
    let mut b = AstBuilder::new();
    let bound = b.integer(2, uint(64), loc());
    let aty = Type::array(uint(8), Some(bound), loc());
    let sty = Type::struct_type(vec![field(aty.clone()), field(string_ty())], loc());
    let e = b.sizeof_type(sty.clone(), loc());
    let s = b.expression_statement(e, loc());
    typify(b.program(vec![s], loc())).unwrap();
    for ty in [&aty, &sty] {
        let recorded = ty.completeness() == Completeness::Complete;
        assert_eq!(recorded, ty.is_complete(), "flag should match recomputation");
    }
}

#[test]
fn sized_array_as_function_argument_rejected() {
    let mut b = AstBuilder::new();
    let bound = b.integer(4, uint(64), loc());
    let aty = Type::array(int(32), Some(bound), loc());
    let arg = b.func_arg("xs", aty, None, false, loc());
    let body = b.compound(vec![], loc());
    let function = b.function(vec![arg], Type::void(loc()), body, loc());
    let decl = b.decl("f", function, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone())], loc())).unwrap_err();
    assert!(
        err.to_string()
            .contains("sized array types not allowed in this context"),
        "got: {err}"
    );
}

#[test]
fn unsized_array_as_function_argument_accepted() {
    let mut b = AstBuilder::new();
    let aty = Type::array(int(32), None, loc());
    let arg = b.func_arg("xs", aty, None, false, loc());
    let body = b.compound(vec![], loc());
    let function = b.function(vec![arg], Type::void(loc()), body, loc());
    let decl = b.decl("f", function, loc());
    typify(b.program(vec![Statement::Decl(decl.clone())], loc()))
        .expect("unsized array arguments are fine");
}
