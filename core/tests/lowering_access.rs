use lowerkit_core::ast::{ArrayAccess, ConditionalAccess, FromEndIndex};
use lowerkit_core::ir::meta::{Member, Method, Property};
use lowerkit_core::vm::evaluate;
use lowerkit_core::{Expr, ExprKind, Type, Value, Variable, lower_and_evaluate, reduce_extensions};

fn person() -> Type {
    Type::class("Person")
}

fn name_property() -> Member {
    Member::Property(Property::auto("Name", person(), Type::String))
}

#[test]
fn conditional_member_access_short_circuits_on_null() {
    let p = Variable::named("p", person());
    let access: Expr = ConditionalAccess::member(p.expr(), &name_property()).expect("?.").into();

    let out = lower_and_evaluate(&access, &[(p.clone(), Value::Null)]).expect("evaluate null");
    assert!(out.is_null());

    let ada = Value::new_object(person());
    ada.set_field("Name", Value::string("Ada"));
    let out = lower_and_evaluate(&access, &[(p, ada)]).expect("evaluate set");
    assert_eq!(out.to_string(), "Ada");
}

#[test]
fn conditional_access_on_null_literal_folds_to_default() {
    let receiver = Expr::null(person()).expect("null");
    let access: Expr = ConditionalAccess::member(receiver, &name_property()).expect("?.").into();
    let reduced = reduce_extensions(&access).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Default { .. }));
}

#[test]
fn conditional_access_on_new_object_skips_the_test() {
    let receiver = Expr::new(&Method::constructor(person()).build(), vec![]).expect("new");
    let access: Expr = ConditionalAccess::member(receiver, &name_property()).expect("?.").into();
    let reduced = reduce_extensions(&access).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Member { .. }));
}

#[test]
fn conditional_call_on_nullable_value_unwraps_receiver() {
    let describe = Method::builder("Describe", Type::I32)
        .returns(Type::String)
        .native(|this, _| Ok(Value::Str(format!("#{}", this.map(|v| v.to_string()).unwrap_or_default()))))
        .build();
    let n = Variable::named("n", Type::nullable_of(Type::I32));
    let access: Expr = ConditionalAccess::call(n.expr(), &describe, vec![]).expect("?.()").into();

    let out = lower_and_evaluate(&access, &[(n.clone(), Value::Null)]).expect("evaluate null");
    assert!(out.is_null());
    let out = lower_and_evaluate(&access, &[(n, Value::Int(4))]).expect("evaluate value");
    assert_eq!(out.to_string(), "#4");
}

fn numbers() -> Expr {
    let items = [10, 20, 30, 40].into_iter().map(Expr::int32).collect();
    Expr::new_array(Type::I32, items).expect("array")
}

#[test]
fn array_access_counts_from_the_end() {
    let hat: Expr = FromEndIndex::new(Expr::int32(2), None).expect("^2").into();
    let access: Expr = ArrayAccess::new(numbers(), hat).expect("a[^2]").into();
    let out = lower_and_evaluate(&access, &[]).expect("evaluate");
    assert!(matches!(out, Value::Int(30)));
}

#[test]
fn array_access_with_int_index_is_plain_element_read() {
    let access: Expr = ArrayAccess::new(numbers(), Expr::int32(1)).expect("a[1]").into();
    let reduced = reduce_extensions(&access).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::ArrayIndex { .. }));
    assert!(matches!(evaluate(&reduced, &[]).expect("evaluate"), Value::Int(20)));
}

#[test]
fn array_access_past_the_start_throws() {
    let hat: Expr = FromEndIndex::new(Expr::int32(5), None).expect("^5").into();
    let access: Expr = ArrayAccess::new(numbers(), hat).expect("a[^5]").into();
    let reduced = reduce_extensions(&access).expect("reduce");
    let err = evaluate(&reduced, &[]).expect_err("out of range");
    assert_eq!(err.exception_type().as_deref(), Some("IndexOutOfRangeException"));
}

#[test]
fn lifted_from_end_index_propagates_null() {
    let n = Variable::named("n", Type::nullable_of(Type::I32));
    let hat: Expr = FromEndIndex::new(n.expr(), None).expect("^n").into();

    let out = lower_and_evaluate(&hat, &[(n.clone(), Value::Null)]).expect("evaluate null");
    assert!(out.is_null());
    let out = lower_and_evaluate(&hat, &[(n, Value::Int(1))]).expect("evaluate value");
    assert!(matches!(out, Value::Index { value: 1, from_end: true }));
}

#[test]
fn lifted_from_end_index_of_converted_int_needs_no_test() {
    let operand = Expr::convert(Expr::int32(3), Type::nullable_of(Type::I32)).expect("convert");
    let hat: Expr = FromEndIndex::new(operand, None).expect("^(int?)3").into();
    let reduced = reduce_extensions(&hat).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Unary { .. }));
    let out = evaluate(&reduced, &[]).expect("evaluate");
    assert!(matches!(out, Value::Index { value: 3, from_end: true }));
}

#[test]
fn from_end_index_rejects_non_int_operand() {
    assert!(FromEndIndex::new(Expr::string("x"), None).is_err());
}

#[test]
fn from_end_index_of_null_literal_is_default() {
    let operand = Expr::null(Type::nullable_of(Type::I32)).expect("null");
    let hat: Expr = FromEndIndex::new(operand, None).expect("^null").into();
    let reduced = reduce_extensions(&hat).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Default { .. }));
}

#[test]
fn conditional_array_element_lifts_to_nullable() {
    let a = Variable::named("a", Type::array_of(Type::I32));
    let access: Expr = ConditionalAccess::array_index(a.expr(), vec![Expr::int32(1)]).expect("a?[1]").into();
    assert_eq!(access.ty(), Type::nullable_of(Type::I32));

    let out = lower_and_evaluate(&access, &[(a.clone(), Value::Null)]).expect("evaluate null");
    assert!(out.is_null());
    let items = vec![Value::Int(10), Value::Int(20)];
    let out = lower_and_evaluate(&access, &[(a, Value::new_array(Type::I32, vec![2], items))]).expect("evaluate");
    assert_eq!(out.as_i64(), Some(20));
}

#[test]
fn conditional_array_element_checks_rank() {
    let a = Variable::named("a", Type::array_of(Type::I32));
    assert!(ConditionalAccess::array_index(a.expr(), vec![Expr::int32(0), Expr::int32(1)]).is_err());
}
