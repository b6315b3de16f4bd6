use std::sync::{Arc, Mutex};

use lowerkit_core::ast::{Call, Discard, New, ParameterAssignment, TupleConvert, TupleLiteral};
use lowerkit_core::ir::meta::Method;
use lowerkit_core::ir::value::ConstValue;
use lowerkit_core::{Expr, ExprKind, Type, Value, Variable, lower_and_evaluate, reduce_extensions};

type Trace = Arc<Mutex<Vec<i64>>>;

fn traced(trace: &Trace) -> Method {
    let trace = Arc::clone(trace);
    Method::builder("Log", Type::class("Trace"))
        .static_method()
        .param("value", Type::I32)
        .returns(Type::I32)
        .native(move |_, args| {
            trace.lock().unwrap().push(args[0].as_i64().unwrap_or(-1));
            Ok(args[0].clone())
        })
        .build()
}

/// `static int Combine(int a, int b, int c = 5)` returning `a*100 + b*10 + c`.
fn combine() -> Method {
    Method::builder("Combine", Type::class("Math"))
        .static_method()
        .param("a", Type::I32)
        .param("b", Type::I32)
        .optional_param("c", Type::I32, ConstValue::Int(5))
        .returns(Type::I32)
        .native(|_, args| {
            let n: Vec<i64> = args.iter().map(|v| v.as_i64().unwrap_or(0)).collect();
            Ok(Value::Int(n[0] * 100 + n[1] * 10 + n[2]))
        })
        .build()
}

#[test]
fn named_arguments_keep_written_evaluation_order() {
    let trace: Trace = Arc::default();
    let log = traced(&trace);
    let m = combine();
    let b = Expr::call(None, &log, vec![Expr::int32(2)]).expect("log b");
    let a = Expr::call(None, &log, vec![Expr::int32(1)]).expect("log a");
    let args = vec![
        ParameterAssignment::named(&m.parameters, "b", b).expect("b:"),
        ParameterAssignment::named(&m.parameters, "a", a).expect("a:"),
    ];
    let call: Expr = Call::new(None, m, args).expect("call").into();

    let out = lower_and_evaluate(&call, &[]).expect("evaluate");
    assert!(matches!(out, Value::Int(125)));
    assert_eq!(*trace.lock().unwrap(), vec![2, 1]);
}

#[test]
fn reordered_variable_argument_is_read_before_later_assignment() {
    let m = combine();
    let x = Variable::named("x", Type::I32);
    let args = vec![
        ParameterAssignment::named(&m.parameters, "b", x.expr()).expect("b:"),
        ParameterAssignment::named(&m.parameters, "a", Expr::assign(x.expr(), Expr::int32(7)).expect("x = 7"))
            .expect("a:"),
    ];
    let call: Expr = Call::new(None, m, args).expect("call").into();

    let out = lower_and_evaluate(&call, &[(x, Value::Int(1))]).expect("evaluate");
    assert!(matches!(out, Value::Int(715)), "got {}", out);
}

#[test]
fn reordered_constant_arguments_stay_in_place() {
    let m = combine();
    let args = vec![
        ParameterAssignment::named(&m.parameters, "b", Expr::int32(2)).expect("b:"),
        ParameterAssignment::named(&m.parameters, "a", Expr::int32(1)).expect("a:"),
    ];
    let call: Expr = Call::new(None, m, args).expect("call").into();
    let reduced = reduce_extensions(&call).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Call { .. }), "{:?}", reduced);
}

#[test]
fn positional_arguments_need_no_temporaries() {
    let m = combine();
    let call: Expr = Call::positional(None, m, vec![Expr::int32(1), Expr::int32(2), Expr::int32(3)])
        .expect("call")
        .into();
    let reduced = reduce_extensions(&call).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Call { .. }));
    assert!(matches!(lower_and_evaluate(&call, &[]).expect("evaluate"), Value::Int(123)));
}

#[test]
fn unknown_parameter_name_is_rejected() {
    let m = combine();
    assert!(ParameterAssignment::named(&m.parameters, "d", Expr::int32(1)).is_err());
}

#[test]
fn discarded_out_argument_gets_a_temporary() {
    let try_get = Method::builder("TryGet", Type::class("Cache"))
        .static_method()
        .param("value", Type::by_ref(Type::I32))
        .returns(Type::Bool)
        .native(|_, args| {
            args[0] = Value::Int(42);
            Ok(Value::Bool(true))
        })
        .build();
    let discard: Expr = Discard::new(Type::I32).expect("discard").into();
    let arg = ParameterAssignment::new(&try_get.parameters[0], discard).expect("out _");
    let call: Expr = Call::new(None, try_get, vec![arg]).expect("call").into();
    assert!(matches!(lower_and_evaluate(&call, &[]).expect("evaluate"), Value::Bool(true)));
}

#[test]
fn by_ref_argument_is_written_back() {
    let bump = Method::builder("Bump", Type::class("Counter"))
        .static_method()
        .param("value", Type::by_ref(Type::I32))
        .native(|_, args| {
            args[0] = Value::Int(args[0].as_i64().unwrap_or(0) + 1);
            Ok(Value::Null)
        })
        .build();
    let x = Variable::named("x", Type::I32);
    let call: Expr = Call::positional(None, bump, vec![x.expr()]).expect("call").into();
    let tree = Expr::block(vec![call, x.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(x, Value::Int(6))]).expect("evaluate");
    assert!(matches!(out, Value::Int(7)));
}

#[test]
fn new_with_named_arguments_builds_the_object() {
    let point = Type::class("Point");
    let ctor = Method::constructor(point.clone())
        .param("x", Type::I32)
        .param("y", Type::I32)
        .native(move |_, args| {
            let p = Value::new_object(Type::class("Point"));
            p.set_field("X", args[0].clone());
            p.set_field("Y", args[1].clone());
            Ok(p)
        })
        .build();
    let args = vec![
        ParameterAssignment::named(&ctor.parameters, "y", Expr::int32(2)).expect("y:"),
        ParameterAssignment::named(&ctor.parameters, "x", Expr::int32(1)).expect("x:"),
    ];
    let new: Expr = New::new(ctor, args).expect("new").into();
    let out = lower_and_evaluate(&new, &[]).expect("evaluate");
    assert!(matches!(out.field("X"), Some(Value::Int(1))));
    assert!(matches!(out.field("Y"), Some(Value::Int(2))));
}

#[test]
fn nine_component_tuple_nests_the_rest() {
    let items: Vec<Expr> = (1..=9).map(Expr::int32).collect();
    let tuple: Expr = TupleLiteral::of(items).expect("tuple").into();
    let out = lower_and_evaluate(&tuple, &[]).expect("evaluate");

    let values: Vec<i64> = out
        .tuple_items()
        .expect("tuple value")
        .iter()
        .map(|v| v.as_i64().unwrap_or(-1))
        .collect();
    assert_eq!(values, (1..=9).collect::<Vec<i64>>());
    match out {
        Value::Tuple(slots) => {
            assert_eq!(slots.len(), 8);
            assert!(matches!(&slots[7], Value::Tuple(rest) if rest.len() == 2));
        }
        other => panic!("expected tuple storage, got {:?}", other),
    }
}

fn contains_invoke(expr: &Expr) -> bool {
    matches!(expr.kind(), ExprKind::Invoke { .. }) || expr.children().into_iter().any(contains_invoke)
}

#[test]
fn tuple_conversion_inlines_simple_lambdas() {
    let source = TupleLiteral::of(vec![Expr::int32(7), Expr::string("a")]).expect("tuple");
    let p = Variable::named("p", Type::I32);
    let q = Variable::named("q", Type::String);
    let widen = Expr::lambda(vec![p.clone()], Expr::convert(p.expr(), Type::I64).expect("convert"), None).expect("lambda");
    let keep = Expr::lambda(vec![q.clone()], q.expr(), None).expect("lambda");
    let target = Type::Tuple(vec![Type::I64, Type::String]);
    let convert: Expr = TupleConvert::new(source.into(), target, vec![widen, keep]).expect("convert").into();

    let reduced = reduce_extensions(&convert).expect("reduce");
    assert!(!contains_invoke(&reduced));

    let out = lower_and_evaluate(&convert, &[]).expect("evaluate");
    let items = out.tuple_items().expect("tuple value");
    assert!(matches!(items[0], Value::Int(7)));
    assert_eq!(items[1].to_string(), "a");
}

#[test]
fn tuple_conversion_invokes_general_lambdas() {
    let source = TupleLiteral::of(vec![Expr::int32(4)]).expect("tuple");
    let p = Variable::named("p", Type::I32);
    let double = Expr::lambda(
        vec![p.clone()],
        Expr::binary(lowerkit_core::ir::op::BinaryOp::Mul, p.expr(), Expr::int32(2)).expect("*"),
        None,
    )
    .expect("lambda");
    let convert: Expr = TupleConvert::new(source.into(), Type::Tuple(vec![Type::I32]), vec![double])
        .expect("convert")
        .into();

    let reduced = reduce_extensions(&convert).expect("reduce");
    assert!(contains_invoke(&reduced));
    let items = lower_and_evaluate(&convert, &[]).expect("evaluate").tuple_items().expect("tuple value");
    assert!(matches!(items[0], Value::Int(8)));
}

#[test]
fn tuple_conversion_rejects_arity_mismatch() {
    let source = TupleLiteral::of(vec![Expr::int32(1), Expr::int32(2)]).expect("tuple");
    let p = Variable::named("p", Type::I32);
    let id = Expr::lambda(vec![p.clone()], p.expr(), None).expect("lambda");
    assert!(TupleConvert::new(source.into(), Type::Tuple(vec![Type::I32]), vec![id]).is_err());
}
