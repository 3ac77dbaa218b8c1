//! Function definitions and calls: arity, optional and variadic
//! arguments, named-argument reordering, argument promotion and void
//! results.

use std::rc::Rc;

use pkl_ast::builder::AstBuilder;
use pkl_ast::nodes::{
    DeclStatement, Expression, FuncArg, IntegerLiteral, OperatorKind, Statement,
};
use pkl_ast::types::{FuncTypeArg, Type, UNIT_BYTES};

use crate::utils::{int, loc, string_ty, typify, uint};

fn declare_function(
    b: &mut AstBuilder,
    name: &str,
    args: Vec<Rc<FuncArg>>,
    ret: Rc<Type>,
) -> Rc<DeclStatement> {
    let body = b.compound(vec![], loc());
    let function = b.function(args, ret, body, loc());
    b.decl(name, function, loc())
}

#[test]
fn call_has_the_return_type() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x], string_ty());
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(None, one, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call.clone(), loc());
    let ctx = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap();
    assert_eq!(ctx.type_of(call.id()).unwrap().to_string(), "string");
    assert_eq!(
        ctx.type_of(decl.id).unwrap().to_string(),
        "(int<32>)string"
    );
}

#[test]
fn integral_arguments_promote() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let narrow = b.integer(1, uint(8), loc());
    let arg = b.funcall_arg(None, narrow, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    typify(b.program(vec![Statement::Decl(decl.clone()), s], loc()))
        .expect("integral arguments should promote");
}

#[test]
fn offset_arguments_promote() {
    let bit_offset = Type::bit_offset(loc());
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", bit_offset, None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let magnitude = b.integer(2, uint(32), loc());
    let byte_offset = b.offset(magnitude, UNIT_BYTES, loc());
    let arg = b.funcall_arg(None, byte_offset, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    typify(b.program(vec![Statement::Decl(decl.clone()), s], loc()))
        .expect("offset arguments should promote");
}

#[test]
fn any_formal_accepts_everything() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", Type::any(loc()), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let value = b.string("anything", loc());
    let arg = b.funcall_arg(None, value, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    typify(b.program(vec![Statement::Decl(decl.clone()), s], loc()))
        .expect("`any` formals accept every argument type");
}

#[test]
fn mismatched_argument_rejected() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let value = b.string("no", loc());
    let arg = b.funcall_arg(None, value, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap_err();
    assert!(
        err.to_string().contains(
            "function argument 1 has the wrong type: expected `int<32>`, got `string`"
        ),
        "got: {err}"
    );
}

#[test]
fn too_few_arguments_rejected() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let y = b.func_arg("y", int(32), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x, y], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(None, one, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap_err();
    assert!(err.to_string().contains("too few arguments passed to function"));
}

#[test]
fn too_many_arguments_rejected() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![x], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let two = b.integer(2, int(32), loc());
    let a1 = b.funcall_arg(None, one, loc());
    let a2 = b.funcall_arg(None, two, loc());
    let call = b.funcall(fvar, vec![a1, a2], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap_err();
    assert!(err.to_string().contains("too many arguments passed to function"));
}

#[test]
fn optional_argument_may_be_omitted() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let default = b.integer(0, int(32), loc());
    let y = b.func_arg("y", int(32), Some(default), false, loc());
    let decl = declare_function(&mut b, "f", vec![x, y], int(32));
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(None, one, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call.clone(), loc());
    let ctx = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap();
    assert_eq!(ctx.type_of(call.id()).unwrap().to_string(), "int<32>");
}

#[test]
fn vararg_pack_accepts_any_types() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let rest = b.func_arg("rest", Type::any(loc()), None, true, loc());
    let decl = declare_function(&mut b, "f", vec![x, rest], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let extra1 = b.string("s", loc());
    let extra2 = b.integer(9, uint(64), loc());
    let a1 = b.funcall_arg(None, one, loc());
    let a2 = b.funcall_arg(None, extra1, loc());
    let a3 = b.funcall_arg(None, extra2, loc());
    let call = b.funcall(fvar, vec![a1.clone(), a2.clone(), a3.clone()], loc());
    let s = b.expression_statement(call, loc());
    typify(b.program(vec![Statement::Decl(decl.clone()), s], loc()))
        .expect("vararg pack should accept extra arguments of any type");
    // the actual aligned with the vararg formal is annotated
    assert!(!a1.first_vararg.get());
    assert!(a2.first_vararg.get());
    assert!(!a3.first_vararg.get());
}

#[test]
fn named_arguments_are_reordered() {
    // f (a : int<32>, b : int<32> = 0, c : string) called as
    // f (c: "x", a: 1): reordered to (a, c), b left to its default
    let mut b = AstBuilder::new();
    let a = b.func_arg("a", int(32), None, false, loc());
    let default = b.integer(0, int(32), loc());
    let bb = b.func_arg("b", int(32), Some(default), false, loc());
    let c = b.func_arg("c", string_ty(), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![a, bb, c], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let x = b.string("x", loc());
    let one = b.integer(1, int(32), loc());
    let arg_c = b.funcall_arg(Some("c"), x, loc());
    let arg_a = b.funcall_arg(Some("a"), one, loc());
    let call = b.funcall(fvar, vec![arg_c, arg_a], loc());
    let s = b.expression_statement(call.clone(), loc());
    typify(b.program(vec![Statement::Decl(decl.clone()), s], loc()))
        .expect("named arguments should reorder and check");

    let Expression::Funcall(funcall) = &call else {
        panic!("expected a funcall")
    };
    let names: Vec<String> = funcall
        .args
        .borrow()
        .iter()
        .map(|arg| arg.name.as_ref().unwrap().name.clone())
        .collect();
    assert_eq!(names, vec!["a".to_string(), "c".to_string()]);
}

#[test]
fn unknown_argument_name_rejected() {
    let mut b = AstBuilder::new();
    let a = b.func_arg("a", int(32), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![a], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(Some("d"), one, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap_err();
    assert!(err.to_string().contains("function doesn't take a `d` argument"));
}

#[test]
fn missing_required_named_argument_rejected() {
    // c is mandatory but sits after the optional b, so it is not part of
    // the positional arity check; only the named-argument pass catches it
    let mut b = AstBuilder::new();
    let a = b.func_arg("a", int(32), None, false, loc());
    let default = b.integer(0, int(32), loc());
    let bb = b.func_arg("b", int(32), Some(default), false, loc());
    let c = b.func_arg("c", string_ty(), None, false, loc());
    let decl = declare_function(&mut b, "f", vec![a, bb, c], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(Some("a"), one, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap_err();
    assert!(
        err.to_string()
            .contains("required argument `c` not specified in call")
    );
}

#[test]
fn named_arguments_need_named_formals() {
    // a function type without argument names cannot be called with names;
    // such types come from written function types, e.g. through a map
    let unnamed = Type::function(
        int(32),
        vec![FuncTypeArg {
            ty: int(32),
            name: None,
            optional: false,
            vararg: false,
        }],
        loc(),
    );
    let mut b = AstBuilder::new();
    let magnitude = b.integer(0, uint(64), loc());
    let off = b.offset(magnitude, UNIT_BYTES, loc());
    let mapped = b.map(unnamed, off, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(Some("x"), one, loc());
    let call = b.funcall(mapped, vec![arg], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![s], loc())).unwrap_err();
    assert!(
        err.to_string()
            .contains("function doesn't take named arguments")
    );
}

#[test]
fn calling_a_non_function_rejected() {
    let mut b = AstBuilder::new();
    let one = b.integer(1, int(32), loc());
    let call = b.funcall(one, vec![], loc());
    let s = b.expression_statement(call, loc());
    let err = typify(b.program(vec![s], loc())).unwrap_err();
    assert!(err.to_string().contains("called value is not a function"));
}

#[test]
fn void_call_in_expression_rejected() {
    let mut b = AstBuilder::new();
    let x = b.func_arg("x", int(32), None, false, loc());
    let decl = declare_function(&mut b, "g", vec![x], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let zero = b.integer(0, int(32), loc());
    let arg = b.funcall_arg(None, zero, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let one = b.integer(1, int(32), loc());
    let e = b.binary(OperatorKind::Add, one, call, loc());
    let s = b.expression_statement(e, loc());
    let err = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap_err();
    assert!(err.to_string().contains("function doesn't return a value"));
}

#[test]
fn void_call_in_statement_position_accepted() {
    let mut b = AstBuilder::new();
    let decl = declare_function(&mut b, "g", vec![], Type::void(loc()));
    let fvar = b.var(&decl, loc());
    let call = b.funcall(fvar, vec![], loc());
    let s = b.expression_statement(call.clone(), loc());
    let ctx = typify(b.program(vec![Statement::Decl(decl.clone()), s], loc())).unwrap();
    assert_eq!(ctx.type_of(call.id()).unwrap().to_string(), "void");
}

#[test]
fn recursive_reference_sees_the_signature() {
    // the function's type is attached before its body is typified, so a
    // recursive call through the declaration resolves
    let mut b = AstBuilder::new();
    let placeholder = Expression::Integer(Rc::new(IntegerLiteral {
        id: u32::MAX,
        location: loc(),
        value: 0,
        ty: int(32),
    }));
    let decl = b.decl("f", placeholder, loc());
    let x = b.func_arg("x", int(32), None, false, loc());
    let fvar = b.var(&decl, loc());
    let one = b.integer(1, int(32), loc());
    let arg = b.funcall_arg(None, one, loc());
    let call = b.funcall(fvar, vec![arg], loc());
    let ret = b.return_statement(Some(call.clone()), loc());
    let body = b.compound(vec![ret], loc());
    let function = b.function(vec![x], int(32), body, loc());
    *decl.initial.borrow_mut() = function;
    let ctx = typify(b.program(vec![Statement::Decl(decl.clone())], loc())).unwrap();
    assert_eq!(ctx.type_of(call.id()).unwrap().to_string(), "int<32>");
    assert_eq!(ctx.type_of(decl.id).unwrap().to_string(), "(int<32>)int<32>");
}
