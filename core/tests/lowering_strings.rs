use lowerkit_core::ast::{InterpolatedString, Interpolation};
use lowerkit_core::ir::value::ConstValue;
use lowerkit_core::{Expr, ExprKind, Type, Value, Variable, lower_and_evaluate, reduce_extensions};

fn insert(value: Expr) -> Interpolation {
    Interpolation::insert(value, None, None).expect("insert")
}

#[test]
fn alignment_format_and_braces_survive_lowering() {
    let x = Variable::named("x", Type::I32);
    let s: Expr = InterpolatedString::new(vec![
        Interpolation::literal("x="),
        Interpolation::insert(x.expr(), Some(4), Some("D2")).expect("insert"),
        Interpolation::literal("|{}"),
    ])
    .expect("interpolation")
    .into();
    let out = lower_and_evaluate(&s, &[(x, Value::Int(7))]).expect("evaluate");
    assert_eq!(out.to_string(), "x=  07|{}");
}

#[test]
fn literal_only_string_becomes_a_constant() {
    let s: Expr = InterpolatedString::new(vec![Interpolation::literal("a{b")]).expect("interpolation").into();
    let reduced = reduce_extensions(&s).expect("reduce");
    match reduced.kind() {
        ExprKind::Constant { value: ConstValue::Str(text), .. } => assert_eq!(text, "a{b"),
        _ => panic!("expected a string constant, got {:?}", reduced),
    }
}

#[test]
fn more_than_three_inserts_use_an_argument_array() {
    let mut parts = Vec::new();
    for n in 1..=5 {
        if n > 1 {
            parts.push(Interpolation::literal("-"));
        }
        parts.push(insert(Expr::int32(n)));
    }
    let s: Expr = InterpolatedString::new(parts).expect("interpolation").into();

    let reduced = reduce_extensions(&s).expect("reduce");
    match reduced.kind() {
        ExprKind::Call { arguments, .. } => {
            assert_eq!(arguments.len(), 2);
            assert!(matches!(arguments[1].kind(), ExprKind::NewArray { .. }));
        }
        _ => panic!("expected a Format call, got {:?}", reduced),
    }
    let out = lower_and_evaluate(&s, &[]).expect("evaluate");
    assert_eq!(out.to_string(), "1-2-3-4-5");
}

#[test]
fn up_to_three_inserts_pass_arguments_directly() {
    let who = Variable::named("who", Type::String);
    let s: Expr = InterpolatedString::new(vec![
        Interpolation::literal("hi "),
        insert(who.expr()),
        Interpolation::literal(", "),
        insert(Expr::boolean(true)),
    ])
    .expect("interpolation")
    .into();

    let reduced = reduce_extensions(&s).expect("reduce");
    match reduced.kind() {
        ExprKind::Call { arguments, .. } => assert_eq!(arguments.len(), 3),
        _ => panic!("expected a Format call, got {:?}", reduced),
    }
    let out = lower_and_evaluate(&s, &[(who, Value::string("Bo"))]).expect("evaluate");
    assert_eq!(out.to_string(), "hi Bo, True");
}

#[test]
fn void_insert_is_rejected() {
    assert!(Interpolation::insert(Expr::empty(), None, None).is_err());
}
