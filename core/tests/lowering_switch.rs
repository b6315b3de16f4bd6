use lowerkit_core::ast::{
    CaseSwitch, ConstructionErrorKind, Pattern, SwitchCase, SwitchExpression, SwitchExpressionArm, SwitchLabel,
    SwitchSection, SwitchStatement, TestValue,
};
use lowerkit_core::ir::op::BinaryOp;
use lowerkit_core::ir::value::ConstValue;
use lowerkit_core::vm::evaluate;
use lowerkit_core::{Expr, Type, Value, Variable, lower_and_evaluate, reduce_extensions};

fn constant(n: i64) -> Pattern {
    Pattern::constant(Type::I32, ConstValue::Int(n)).expect("constant pattern")
}

fn arm(pattern: Pattern, text: &str) -> SwitchExpressionArm {
    SwitchExpressionArm::new(pattern, None, Expr::string(text)).expect("arm")
}

fn run(tree: &Expr, x: &Variable, value: i64) -> String {
    lower_and_evaluate(tree, &[(x.clone(), Value::Int(value))])
        .expect("evaluate")
        .to_string()
}

#[test]
fn switch_expression_picks_first_matching_arm() {
    let x = Variable::named("x", Type::I32);
    let big = Pattern::relational(Type::I32, BinaryOp::Gt, ConstValue::Int(5)).expect("relational");
    let switch: Expr = SwitchExpression::new(
        x.expr(),
        vec![arm(constant(1), "one"), arm(big, "big"), arm(Pattern::discard(Type::I32), "other")],
        None,
    )
    .expect("switch")
    .into();

    assert_eq!(run(&switch, &x, 1), "one");
    assert_eq!(run(&switch, &x, 9), "big");
    assert_eq!(run(&switch, &x, 3), "other");
}

#[test]
fn earlier_arm_shadows_later_one() {
    let x = Variable::named("x", Type::I32);
    let positive = Pattern::relational(Type::I32, BinaryOp::Gt, ConstValue::Int(0)).expect("relational");
    let switch: Expr = SwitchExpression::new(
        x.expr(),
        vec![arm(positive, "positive"), arm(constant(1), "one"), arm(Pattern::discard(Type::I32), "other")],
        None,
    )
    .expect("switch")
    .into();
    assert_eq!(run(&switch, &x, 1), "positive");
}

#[test]
fn guarded_arm_binds_its_variable() {
    let x = Variable::named("x", Type::I32);
    let v = Variable::named("v", Type::I32);
    let guard = Expr::binary(BinaryOp::Gt, v.expr(), Expr::int32(10)).expect(">");
    let large = SwitchExpressionArm::new(Pattern::var(v), Some(guard), Expr::string("large")).expect("arm");
    let switch: Expr =
        SwitchExpression::new(x.expr(), vec![large, arm(Pattern::discard(Type::I32), "small")], None)
            .expect("switch")
            .into();
    assert_eq!(run(&switch, &x, 11), "large");
    assert_eq!(run(&switch, &x, 10), "small");
}

#[test]
fn guard_writing_the_subject_variable_does_not_change_later_tests() {
    let x = Variable::named("x", Type::I32);
    let clobber = Expr::assign(x.expr(), Expr::int32(5)).expect("x = 5");
    let guard = Expr::equal(clobber, Expr::int32(9)).expect("==");
    let first = SwitchExpressionArm::new(constant(0), Some(guard), Expr::string("a")).expect("arm");
    let switch: Expr = SwitchExpression::new(x.expr(), vec![first, arm(constant(0), "b")], None)
        .expect("switch")
        .into();
    assert_eq!(run(&switch, &x, 0), "b");
}

#[test]
fn statement_guard_writing_the_subject_variable_does_not_change_later_labels() {
    let x = Variable::named("x", Type::I32);
    let r = Variable::named("r", Type::I32);
    let clobber = Expr::assign(x.expr(), Expr::int32(5)).expect("x = 5");
    let guard = Expr::equal(clobber, Expr::int32(9)).expect("==");
    let sections = vec![
        SwitchSection::new(vec![SwitchLabel::new(constant(0), Some(guard)).expect("label")], vec![], set(&r, 1))
            .expect("section"),
        SwitchSection::new(vec![SwitchLabel::new(constant(0), None).expect("label")], vec![], set(&r, 2))
            .expect("section"),
    ];
    let switch: Expr = SwitchStatement::new(x.expr(), sections, None).expect("switch").into();
    let tree = Expr::block(vec![switch, r.expr()]).expect("block");
    let out = lower_and_evaluate(&tree, &[(x, Value::Int(0)), (r, Value::Int(0))]).expect("evaluate");
    assert_eq!(out.as_i64(), Some(2));
}

#[test]
fn unmatched_switch_expression_throws() {
    let x = Variable::named("x", Type::I32);
    let switch: Expr = SwitchExpression::new(x.expr(), vec![arm(constant(1), "one")], None)
        .expect("switch")
        .into();
    let reduced = reduce_extensions(&switch).expect("reduce");
    let err = evaluate(&reduced, &[(x, Value::Int(2))]).expect_err("no arm matches");
    assert_eq!(err.exception_type().as_deref(), Some("SwitchExpressionException"));
    match err {
        lowerkit_core::EvalError::Unhandled(e) => {
            assert_eq!(e.field("UnmatchedValue").map(|v| v.to_string()).as_deref(), Some("2"));
        }
        other => panic!("unexpected error {}", other),
    }
}

#[test]
fn switch_expression_rejects_mixed_arm_types() {
    let x = Variable::named("x", Type::I32);
    let arms = vec![
        arm(constant(1), "one"),
        SwitchExpressionArm::new(Pattern::discard(Type::I32), None, Expr::int32(0)).expect("arm"),
    ];
    let err = SwitchExpression::new(x.expr(), arms, None).expect_err("mixed types");
    assert_eq!(err.kind(), ConstructionErrorKind::InconsistentTypes);
}

fn literal(n: i64) -> TestValue {
    TestValue::Literal(ConstValue::Int(n))
}

fn set(r: &Variable, n: i32) -> Expr {
    Expr::block(vec![Expr::assign(r.expr(), Expr::int32(n)).expect("assign"), Expr::empty()]).expect("body")
}

#[test]
fn case_switch_matches_any_listed_value() {
    let x = Variable::named("x", Type::I32);
    let r = Variable::named("r", Type::I32);
    let switch: Expr = CaseSwitch::new(
        x.expr(),
        vec![
            SwitchCase::new(vec![literal(1), literal(2)], set(&r, 10)).expect("case"),
            SwitchCase::new(vec![TestValue::Default], set(&r, -1)).expect("default"),
            SwitchCase::new(vec![literal(3)], set(&r, 30)).expect("case"),
        ],
        None,
    )
    .expect("switch")
    .into();
    let tree = Expr::block(vec![switch, r.expr()]).expect("block");

    for (input, expected) in [(1, 10), (2, 10), (3, 30), (4, -1)] {
        let out = lower_and_evaluate(&tree, &[(x.clone(), Value::Int(input)), (r.clone(), Value::Int(0))])
            .expect("evaluate");
        assert_eq!(out.as_i64(), Some(expected), "input {}", input);
    }
}

#[test]
fn case_switch_rejects_duplicate_values() {
    let x = Variable::named("x", Type::I32);
    let err = CaseSwitch::new(
        x.expr(),
        vec![
            SwitchCase::new(vec![literal(1)], Expr::empty()).expect("case"),
            SwitchCase::new(vec![literal(1)], Expr::empty()).expect("case"),
        ],
        None,
    )
    .expect_err("duplicate");
    assert_eq!(err.kind(), ConstructionErrorKind::DuplicateTestValue);
}

#[test]
fn switch_statement_takes_default_only_after_other_labels() {
    let x = Variable::named("x", Type::I32);
    let r = Variable::named("r", Type::I32);
    let sections = vec![
        SwitchSection::new(vec![SwitchLabel::default_label()], vec![], set(&r, -1)).expect("default section"),
        SwitchSection::new(vec![SwitchLabel::new(constant(1), None).expect("label")], vec![], set(&r, 1))
            .expect("section"),
    ];
    let switch: Expr = SwitchStatement::new(x.expr(), sections, None).expect("switch").into();
    let tree = Expr::block(vec![switch, r.expr()]).expect("block");

    let out = lower_and_evaluate(&tree, &[(x.clone(), Value::Int(1)), (r.clone(), Value::Int(0))]).expect("evaluate");
    assert_eq!(out.as_i64(), Some(1));
    let out = lower_and_evaluate(&tree, &[(x, Value::Int(5)), (r, Value::Int(0))]).expect("evaluate");
    assert_eq!(out.as_i64(), Some(-1));
}
