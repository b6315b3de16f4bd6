use lowerkit_core::ast::{AssignBinary, AssignOp, AssignUnary, DoWhile, For, Lock, UnaryAssignOp, While};
use lowerkit_core::ir::meta::Method;
use lowerkit_core::ir::op::BinaryOp;
use lowerkit_core::ir::value::ConstValue;
use lowerkit_core::vm::evaluate;
use lowerkit_core::vm::value::MonitorState;
use lowerkit_core::{Expr, ExprKind, LabelTarget, Type, Value, Variable, lower_and_evaluate, reduce_extensions};

fn increment(v: &Variable) -> Expr {
    AssignUnary::new(UnaryAssignOp::PreIncrement, v.expr(), None).expect("++").into()
}

fn add_to(target: &Variable, value: Expr) -> Expr {
    AssignBinary::compound(AssignOp::Add, target.expr(), value).expect("+=").into()
}

#[test]
fn for_loop_honours_break_and_continue() {
    let i = Variable::named("i", Type::I32);
    let sum = Variable::named("sum", Type::I32);
    let brk = LabelTarget::void("done");
    let cont = LabelTarget::void("next");

    let is = |n: i32| Expr::equal(i.expr(), Expr::int32(n)).expect("==");
    let body = Expr::block(vec![
        Expr::if_then(is(3), Expr::continue_to(cont.clone()).expect("continue")).expect("if"),
        Expr::if_then(is(7), Expr::break_to(brk.clone()).expect("break")).expect("if"),
        add_to(&sum, i.expr()),
        Expr::empty(),
    ])
    .expect("body");
    let test = Expr::binary(BinaryOp::Lt, i.expr(), Expr::int32(10)).expect("<");
    let for_loop: Expr = For::new(
        vec![i.clone()],
        vec![Expr::assign(i.expr(), Expr::int32(0)).expect("init")],
        Some(test),
        vec![increment(&i)],
        body,
        Some(brk),
        Some(cont),
    )
    .expect("for")
    .into();

    let tree = Expr::block_with(
        vec![sum.clone()],
        vec![Expr::assign(sum.expr(), Expr::int32(0)).expect("sum = 0"), for_loop, sum.expr()],
    )
    .expect("block");
    let out = lower_and_evaluate(&tree, &[]).expect("evaluate");
    // 0 + 1 + 2 + 4 + 5 + 6
    assert!(matches!(out, Value::Int(18)));
}

#[test]
fn while_loop_with_false_test_never_runs() {
    let runs = Variable::named("runs", Type::I32);
    let loop_: Expr = While::new(Expr::boolean(false), increment(&runs), None, None).expect("while").into();
    let tree = Expr::block(vec![loop_, runs.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(runs, Value::Int(0))]).expect("evaluate");
    assert!(matches!(out, Value::Int(0)));
}

#[test]
fn while_loop_counts_down() {
    let n = Variable::named("n", Type::I32);
    let count = Variable::named("count", Type::I32);
    let test = Expr::binary(BinaryOp::Gt, n.expr(), Expr::int32(0)).expect(">");
    let body = Expr::block(vec![
        AssignUnary::new(UnaryAssignOp::PostDecrement, n.expr(), None).expect("n--").into(),
        increment(&count),
        Expr::empty(),
    ])
    .expect("body");
    let loop_: Expr = While::new(test, body, None, None).expect("while").into();
    let tree = Expr::block(vec![loop_, count.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(n, Value::Int(3)), (count, Value::Int(0))]).expect("evaluate");
    assert!(matches!(out, Value::Int(3)));
}

#[test]
fn do_while_runs_body_before_test() {
    let x = Variable::named("x", Type::I32);
    let loop_: Expr = DoWhile::new(increment(&x), Expr::boolean(false), None, None).expect("do").into();
    let tree = Expr::block(vec![loop_, x.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(x, Value::Int(0))]).expect("evaluate");
    assert!(matches!(out, Value::Int(1)));
}

fn gate() -> (Variable, Value) {
    let ty = Type::class("Gate");
    (Variable::named("gate", ty.clone()), Value::new_object(ty))
}

#[test]
fn lock_enters_and_exits_once() {
    let (var, object) = gate();
    let hits = Variable::named("hits", Type::I32);
    let lock: Expr = Lock::new(var.expr(), increment(&hits)).expect("lock").into();
    lower_and_evaluate(&lock, &[(var, object.clone()), (hits, Value::Int(0))]).expect("evaluate");
    assert_eq!(object.monitor(), Some(MonitorState { depth: 0, enters: 1, exits: 1 }));
}

#[test]
fn lock_releases_when_body_throws() {
    let (var, object) = gate();
    let boom = Expr::new(&Method::constructor(Type::class_with_base("Boom", Type::class("Exception"))).build(), vec![])
        .expect("new");
    let body = Expr::throw(boom, Type::Void).expect("throw");
    let lock: Expr = Lock::new(var.expr(), body).expect("lock").into();
    let reduced = reduce_extensions(&lock).expect("reduce");

    assert!(evaluate(&reduced, &[(var, object.clone())]).is_err());
    assert_eq!(object.monitor(), Some(MonitorState { depth: 0, enters: 1, exits: 1 }));
}

#[test]
fn lock_on_null_never_exits() {
    let (var, _) = gate();
    let lock: Expr = Lock::new(var.expr(), Expr::empty()).expect("lock").into();
    let reduced = reduce_extensions(&lock).expect("reduce");
    let err = evaluate(&reduced, &[(var, Value::Null)]).expect_err("null lock");
    assert_eq!(err.exception_type().as_deref(), Some("ArgumentNullException"));
}

#[test]
fn lock_rejects_value_types() {
    let x = Variable::named("x", Type::I32);
    assert!(Lock::new(x.expr(), Expr::empty()).is_err());
}

fn below(i: &Variable, n: i32) -> Expr {
    Expr::binary(BinaryOp::Lt, i.expr(), Expr::int32(n)).expect("<")
}

fn counting_loop(i: &Variable, n: i32, body: Expr, cont: Option<LabelTarget>) -> Expr {
    For::new(
        vec![i.clone()],
        vec![Expr::assign(i.expr(), Expr::int32(0)).expect("init")],
        Some(below(i, n)),
        vec![increment(i)],
        body,
        None,
        cont,
    )
    .expect("for")
    .into()
}

#[test]
fn lock_in_loop_releases_every_iteration_even_when_leaving_early() {
    let (var, object) = gate();
    let i = Variable::named("i", Type::I32);
    let hits = Variable::named("hits", Type::I32);
    let cont = LabelTarget::void("next");

    let even = Expr::equal(
        Expr::binary(BinaryOp::Mod, i.expr(), Expr::int32(2)).expect("%"),
        Expr::int32(0),
    )
    .expect("==");
    let body = Expr::block(vec![
        Expr::if_then(even, Expr::continue_to(cont.clone()).expect("continue")).expect("if"),
        increment(&hits),
        Expr::empty(),
    ])
    .expect("lock body");
    let lock: Expr = Lock::new(var.expr(), body).expect("lock").into();
    let tree = Expr::block(vec![counting_loop(&i, 5, lock, Some(cont)), hits.expr()]).expect("block");

    let out = lower_and_evaluate(&tree, &[(var, object.clone()), (hits, Value::Int(0))]).expect("evaluate");
    assert!(matches!(out, Value::Int(2)));
    assert_eq!(object.monitor(), Some(MonitorState { depth: 0, enters: 5, exits: 5 }));
}

#[test]
fn lock_flag_is_reset_inside_the_loop_body() {
    let (var, _) = gate();
    let lock: Expr = Lock::new(var.expr(), Expr::empty()).expect("lock").into();
    let loop_: Expr = While::new(Expr::boolean(false), lock, None, None).expect("while").into();
    let reduced = reduce_extensions(&loop_).expect("reduce");

    // [continue:, if (!test) goto break, body, goto continue, break:]
    let body = match reduced.kind() {
        ExprKind::Block { expressions, .. } => expressions[2].clone(),
        _ => panic!("expected the loop block, got {:?}", reduced),
    };
    match body.kind() {
        ExprKind::Block { variables, expressions, .. } => {
            let taken = variables.iter().find(|v| v.name() == Some("$lockTaken")).expect("flag declared in body");
            match expressions[1].kind() {
                ExprKind::Assign { target, value } => {
                    assert_eq!(target.as_variable(), Some(taken));
                    assert_eq!(value.constant_value(), Some(&ConstValue::Bool(false)));
                }
                _ => panic!("expected the flag reset, got {:?}", expressions[1]),
            }
        }
        _ => panic!("expected the lock block, got {:?}", body),
    }
}

#[test]
fn failed_acquisition_after_successful_iterations_releases_nothing_extra() {
    let (var, object) = gate();
    let i = Variable::named("i", Type::I32);
    let drop_gate = Expr::assign(var.expr(), Expr::null(Type::class("Gate")).expect("null")).expect("gate = null");
    let body = Expr::block(vec![
        Expr::if_then(Expr::equal(i.expr(), Expr::int32(2)).expect("=="), drop_gate).expect("if"),
        Lock::new(var.expr(), Expr::empty()).expect("lock").into(),
        Expr::empty(),
    ])
    .expect("body");
    let tree = counting_loop(&i, 4, body, None);
    let reduced = reduce_extensions(&tree).expect("reduce");

    let err = evaluate(&reduced, &[(var, object.clone())]).expect_err("null lock");
    assert_eq!(err.exception_type().as_deref(), Some("ArgumentNullException"));
    assert_eq!(object.monitor(), Some(MonitorState { depth: 0, enters: 2, exits: 2 }));
}
