use std::sync::{Arc, Mutex};

use lowerkit_core::ast::{AssignBinary, AssignOp, AssignUnary, Discard, Index, UnaryAssignOp};
use lowerkit_core::ir::meta::{Method, NativeFn, ParameterInfo, Property};
use lowerkit_core::ir::value::ConstValue;
use lowerkit_core::vm::evaluate;
use lowerkit_core::{Expr, ExprKind, Type, Value, Variable, lower_and_evaluate, reduce_extensions};

type Trace = Arc<Mutex<Vec<i64>>>;

/// Static `int Log(int)` that records its argument and returns it.
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

fn log_call(log: &Method, n: i32) -> Expr {
    Expr::call(None, log, vec![Expr::int32(n)]).expect("log call")
}

fn bag_type() -> Type {
    Type::class("Bag")
}

/// `int this[int i]` stored as fields `slot{i}` of the bag object.
fn slot_indexer() -> Property {
    let get: NativeFn = Arc::new(|bag: Option<&Value>, args: &mut [Value]| -> Result<Value, Value> {
        let key = format!("slot{}", args[0]);
        Ok(bag.and_then(|b| b.field(&key)).unwrap_or(Value::Int(0)))
    });
    let set: NativeFn = Arc::new(|bag: Option<&Value>, args: &mut [Value]| -> Result<Value, Value> {
        let key = format!("slot{}", args[0]);
        if let Some(b) = bag {
            b.set_field(&key, args[1].clone());
        }
        Ok(Value::Null)
    });
    Property::indexer(bag_type(), Type::I32, vec![ParameterInfo::new("i", Type::I32)], Some(get), Some(set))
}

#[test]
fn compound_assignment_on_indexer_evaluates_index_once() {
    let trace: Trace = Arc::default();
    let log = traced(&trace);
    let bag = Variable::named("bag", bag_type());
    let target: Expr = Index::positional(bag.expr(), slot_indexer(), vec![log_call(&log, 2)])
        .expect("index")
        .into();
    let add: Expr = AssignBinary::compound(AssignOp::Add, target, Expr::int32(5)).expect("+=").into();

    let object = Value::new_object(bag_type());
    object.set_field("slot2", Value::Int(10));
    let out = lower_and_evaluate(&add, &[(bag, object.clone())]).expect("evaluate");

    assert!(matches!(out, Value::Int(15)));
    assert!(matches!(object.field("slot2"), Some(Value::Int(15))));
    assert_eq!(*trace.lock().unwrap(), vec![2]);
}

#[test]
fn postfix_increment_on_indexer_yields_old_value() {
    let trace: Trace = Arc::default();
    let log = traced(&trace);
    let bag = Variable::named("bag", bag_type());
    let target: Expr = Index::positional(bag.expr(), slot_indexer(), vec![log_call(&log, 1)])
        .expect("index")
        .into();
    let inc: Expr = AssignUnary::new(UnaryAssignOp::PostIncrement, target, None).expect("x++").into();

    let object = Value::new_object(bag_type());
    object.set_field("slot1", Value::Int(4));
    let out = lower_and_evaluate(&inc, &[(bag, object.clone())]).expect("evaluate");

    assert!(matches!(out, Value::Int(4)));
    assert!(matches!(object.field("slot1"), Some(Value::Int(5))));
    assert_eq!(*trace.lock().unwrap(), vec![1]);
}

#[test]
fn prefix_decrement_yields_new_value() {
    let x = Variable::named("x", Type::I32);
    let dec: Expr = AssignUnary::new(UnaryAssignOp::PreDecrement, x.expr(), None).expect("--x").into();
    let out = lower_and_evaluate(&dec, &[(x, Value::Int(3))]).expect("evaluate");
    assert!(matches!(out, Value::Int(2)));
}

#[test]
fn string_add_assign_selects_concat() {
    let s = Variable::named("s", Type::String);
    let append: Expr = AssignBinary::compound(AssignOp::Add, s.expr(), Expr::string("b")).expect("+=").into();

    let reduced = reduce_extensions(&append).expect("reduce");
    match reduced.kind() {
        ExprKind::Assign { value, .. } => match value.kind() {
            ExprKind::Call { method, .. } => assert_eq!(method.name, "Concat"),
            _ => panic!("expected a Concat call, got {:?}", value),
        },
        _ => panic!("expected an assignment, got {:?}", reduced),
    }

    let number: Expr = AssignBinary::compound(AssignOp::Add, s.expr(), Expr::int32(5)).expect("+= int").into();
    let tree = Expr::block(vec![append, number, s.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(s, Value::string("a"))]).expect("evaluate");
    assert_eq!(out.to_string(), "ab5");
}

#[test]
fn coalesce_assign_skips_right_operand_when_set() {
    let trace: Trace = Arc::default();
    let log = traced(&trace);
    let x = Variable::named("x", Type::nullable_of(Type::I32));
    let assign: Expr = AssignBinary::compound(AssignOp::Coalesce, x.expr(), log_call(&log, 7)).expect("??=").into();

    let out = lower_and_evaluate(&assign, &[(x.clone(), Value::Int(3))]).expect("evaluate set");
    assert!(matches!(out, Value::Int(3)));
    assert!(trace.lock().unwrap().is_empty());

    let out = lower_and_evaluate(&assign, &[(x, Value::Null)]).expect("evaluate null");
    assert!(matches!(out, Value::Int(7)));
    assert_eq!(*trace.lock().unwrap(), vec![7]);
}

#[test]
fn coalesce_assign_of_underlying_value_has_non_nullable_type() {
    let x = Variable::named("x", Type::nullable_of(Type::I32));
    let node = AssignBinary::compound(AssignOp::Coalesce, x.expr(), Expr::int32(7)).expect("??=");
    assert_eq!(*node.ty(), Type::I32);
    let assign: Expr = node.into();
    let tree = Expr::block(vec![assign.clone(), x.expr()]).expect("block");

    let reduced = reduce_extensions(&assign).expect("reduce");
    assert_eq!(reduced.ty(), Type::I32);
    let out = lower_and_evaluate(&tree, &[(x.clone(), Value::Null)]).expect("evaluate null");
    assert!(matches!(out, Value::Int(7)));
    let out = lower_and_evaluate(&assign, &[(x.clone(), Value::Int(3))]).expect("evaluate set");
    assert!(matches!(out, Value::Int(3)));

    let boxed = Variable::named("y", Type::nullable_of(Type::I32));
    let same = AssignBinary::compound(AssignOp::Coalesce, x.expr(), boxed.expr()).expect("??=");
    assert_eq!(*same.ty(), Type::nullable_of(Type::I32));
}

#[test]
fn discard_assignment_keeps_side_effect() {
    let trace: Trace = Arc::default();
    let log = traced(&trace);
    let discard: Expr = Discard::new(Type::I32).expect("discard").into();
    let assign: Expr = AssignBinary::assign(discard, log_call(&log, 4)).expect("_ =").into();

    let reduced = reduce_extensions(&assign).expect("reduce");
    assert!(matches!(reduced.kind(), ExprKind::Call { .. }));
    let out = evaluate(&reduced, &[]).expect("evaluate");
    assert!(matches!(out, Value::Int(4)));
    assert_eq!(*trace.lock().unwrap(), vec![4]);
}

#[test]
fn checked_compound_assignment_overflows() {
    let x = Variable::named("x", Type::I32);
    let add: Expr = AssignBinary::compound(AssignOp::AddChecked, x.expr(), Expr::int32(1)).expect("+=").into();
    let reduced = reduce_extensions(&add).expect("reduce");
    let err = evaluate(&reduced, &[(x, Value::Int(i32::MAX as i64))]).expect_err("overflow");
    assert_eq!(err.exception_type().as_deref(), Some("OverflowException"));
}

#[test]
fn compound_assignment_with_user_operator() {
    let money = Type::structure("Money");
    let plus = Method::builder("op_Addition", money.clone())
        .static_method()
        .param("left", money.clone())
        .param("right", Type::I64)
        .returns(money.clone())
        .native(|_, args| {
            let cents = args[0].as_i64().unwrap_or(0) + args[1].as_i64().unwrap_or(0);
            Ok(Value::Int(cents))
        })
        .build();
    let wallet = Variable::named("wallet", money);
    let amount = Expr::constant(ConstValue::Int(250), Type::I64).expect("constant");
    let add: Expr = AssignBinary::new(AssignOp::Add, wallet.expr(), amount, Some(plus), None, None)
        .expect("+= with method")
        .into();
    let tree = Expr::block(vec![add, wallet.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(wallet, Value::Int(1000))]).expect("evaluate");
    assert!(matches!(out, Value::Int(1250)));
}
