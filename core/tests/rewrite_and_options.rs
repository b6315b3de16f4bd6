use std::io::Write;
use std::sync::Arc;

use lowerkit_core::ast::{
    ArrayAccess, AssignBinary, AssignOp, AssignUnary, Call, CaseSwitch, ConditionalAccess, ConditionalReceiver,
    ConstructionError, ConstructionErrorKind, Discard, DoWhile, For, FromEndIndex, Index, InterpolatedString,
    Interpolation, Invoke, Lock, New, Node, NodeKind, Pattern, SwitchCase, SwitchExpression, SwitchExpressionArm,
    SwitchLabel, SwitchSection, SwitchStatement, TestValue, TupleConvert, TupleLiteral, UnaryAssignOp, While,
};
use lowerkit_core::ir::meta::{Member, Method, NativeFn, ParameterInfo, Property};
use lowerkit_core::ir::op::BinaryOp;
use lowerkit_core::ir::value::ConstValue;
use lowerkit_core::ir::visit::{Rewriter, walk_expr};
use lowerkit_core::vm::Value;
use lowerkit_core::{
    Expr, ExprKind, LoweringContext, LoweringOptions, Type, Variable, generate_error_report, reduce_extensions,
    reduce_extensions_with, verify,
};

struct Identity;

impl Rewriter for Identity {
    type Error = ConstructionError;
}

/// Replaces every `int` constant by its double.
struct Doubler;

impl Rewriter for Doubler {
    type Error = ConstructionError;

    fn visit(&mut self, expr: &Expr) -> Result<Expr, Self::Error> {
        match expr.kind() {
            ExprKind::Constant { value: ConstValue::Int(n), ty } if *ty == Type::I32 => Ok(Expr::int32(*n as i32 * 2)),
            _ => walk_expr(self, expr),
        }
    }
}

fn sample() -> (Variable, Expr) {
    let x = Variable::named("x", Type::I32);
    let add: Expr = AssignBinary::compound(AssignOp::Add, x.expr(), Expr::int32(3)).expect("+=").into();
    let tree = Expr::block(vec![add, x.expr()]).expect("block");
    (x, tree)
}

#[test]
fn update_with_same_children_returns_same_node() {
    let x = Variable::named("x", Type::I32);
    let node = AssignBinary::compound(AssignOp::Add, x.expr(), Expr::int32(1)).expect("+=");
    let same = node
        .update(node.left().clone(), None, node.right().clone(), None)
        .expect("update");
    assert!(Arc::ptr_eq(&node, &same));

    let other = node.update(node.left().clone(), None, Expr::int32(2), None).expect("update");
    assert!(!Arc::ptr_eq(&node, &other));
}

/// One tree per extended node kind, each with a child worth visiting.
fn one_of_each() -> Vec<Expr> {
    let x = Variable::named("x", Type::I32);
    let flag = Variable::named("flag", Type::Bool);
    let person = Type::class("Person");
    let p = Variable::named("p", person.clone());
    let f = Variable::named("f", Type::function(vec![Type::I32], Type::I32));
    let numbers = Variable::named("numbers", Type::array_of(Type::I32));
    let twice = Method::builder("Twice", Type::class("Math"))
        .static_method()
        .param("a", Type::I32)
        .returns(Type::I32)
        .build();
    let ctor = Method::constructor(person.clone()).param("age", Type::I32).build();
    let get: NativeFn = Arc::new(|_: Option<&Value>, _: &mut [Value]| -> Result<Value, Value> { Ok(Value::Int(0)) });
    let indexer = Property::indexer(person.clone(), Type::I32, vec![ParameterInfo::new("i", Type::I32)], Some(get), None);
    let name = Member::Property(Property::auto("Name", person.clone(), Type::String));
    let add_x = || Expr::binary(BinaryOp::Add, x.expr(), Expr::int32(1)).expect("+");
    let one = || Pattern::constant(Type::I32, ConstValue::Int(1)).expect("pattern");
    let q = Variable::named("q", Type::I32);

    vec![
        AssignBinary::compound(AssignOp::Add, x.expr(), add_x()).expect("+=").into(),
        AssignUnary::new(UnaryAssignOp::PostIncrement, x.expr(), None).expect("x++").into(),
        Call::positional(None, twice, vec![add_x()]).expect("call").into(),
        Invoke::positional(f.expr(), vec![add_x()]).expect("invoke").into(),
        New::positional(ctor, vec![add_x()]).expect("new").into(),
        Index::positional(p.expr(), indexer, vec![add_x()]).expect("index").into(),
        ConditionalAccess::member(p.expr(), &name).expect("?.").into(),
        ConditionalReceiver::new(person.clone()).expr(),
        While::new(flag.expr(), add_x(), None, None).expect("while").into(),
        DoWhile::new(add_x(), flag.expr(), None, None).expect("do").into(),
        For::new(vec![], vec![add_x()], Some(flag.expr()), vec![add_x()], add_x(), None, None).expect("for").into(),
        SwitchExpression::new(
            x.expr(),
            vec![
                SwitchExpressionArm::new(one(), Some(flag.expr()), add_x()).expect("arm"),
                SwitchExpressionArm::new(Pattern::discard(Type::I32), None, Expr::int32(0)).expect("arm"),
            ],
            None,
        )
        .expect("switch expression")
        .into(),
        SwitchStatement::new(
            x.expr(),
            vec![SwitchSection::new(vec![SwitchLabel::new(one(), Some(flag.expr())).expect("label")], vec![], add_x())
                .expect("section")],
            None,
        )
        .expect("switch statement")
        .into(),
        CaseSwitch::new(
            x.expr(),
            vec![SwitchCase::new(vec![TestValue::Literal(ConstValue::Int(1))], add_x()).expect("case")],
            None,
        )
        .expect("case switch")
        .into(),
        TupleLiteral::of(vec![add_x(), Expr::string("a")]).expect("tuple").into(),
        TupleConvert::new(
            TupleLiteral::of(vec![add_x()]).expect("tuple").into(),
            Type::Tuple(vec![Type::I32]),
            vec![Expr::lambda(vec![q.clone()], q.expr(), None).expect("lambda")],
        )
        .expect("tuple convert")
        .into(),
        InterpolatedString::new(vec![
            Interpolation::literal("x="),
            Interpolation::insert(add_x(), None, None).expect("insert"),
        ])
        .expect("interpolation")
        .into(),
        Lock::new(p.expr(), add_x()).expect("lock").into(),
        FromEndIndex::new(add_x(), None).expect("^").into(),
        ArrayAccess::new(numbers.expr(), add_x()).expect("a[i]").into(),
        Discard::new(Type::I32).expect("_").into(),
    ]
}

#[test]
fn identity_rewrite_shares_every_node_kind() {
    let trees = one_of_each();
    let mut kinds: Vec<NodeKind> = Vec::new();
    for tree in &trees {
        let node = tree.as_node().expect("extension node");
        let out = Identity.visit(tree).expect("rewrite");
        assert!(out.ptr_eq(tree), "{:?} was rebuilt", node.kind());
        if !kinds.contains(&node.kind()) {
            kinds.push(node.kind());
        }
    }
    assert_eq!(kinds.len(), 21);
}

#[test]
fn every_node_kind_is_rebuilt_when_a_child_changes() {
    for tree in one_of_each() {
        let kind = tree.as_node().expect("extension node").kind();
        let out = Doubler.visit(&tree).expect("rewrite");
        match kind {
            // no int constant below these
            NodeKind::AssignUnary | NodeKind::ConditionalAccess | NodeKind::ConditionalReceiver | NodeKind::Discard => {}
            _ => assert!(!out.ptr_eq(&tree), "{:?} kept its old instance", kind),
        }
    }
}

#[test]
fn changed_child_is_revalidated() {
    let loop_ = While::new(Expr::boolean(true), Expr::empty(), None, None).expect("while");
    let err = loop_.update(Expr::int32(1), Expr::empty()).expect_err("int test");
    assert_eq!(err.kind(), ConstructionErrorKind::NotBoolean);

    let x = Variable::named("x", Type::I32);
    let arms = vec![
        SwitchExpressionArm::new(Pattern::constant(Type::I32, ConstValue::Int(1)).expect("pattern"), None, Expr::string("one"))
            .expect("arm"),
        SwitchExpressionArm::new(Pattern::discard(Type::I32), None, Expr::string("other")).expect("arm"),
    ];
    let switch = SwitchExpression::new(x.expr(), arms, None).expect("switch");
    let mut changed = switch.arms().to_vec();
    changed[1] = changed[1].update(None, Expr::int32(0)).expect("arm");
    let err = switch.update(x.expr(), changed).expect_err("mixed arm types");
    assert_eq!(err.kind(), ConstructionErrorKind::InconsistentTypes);
}

#[test]
fn identity_rewrite_preserves_the_tree() {
    let (_, tree) = sample();
    let out = Identity.visit(&tree).expect("rewrite");
    assert!(out.ptr_eq(&tree));
}

#[test]
fn rewriter_reaches_into_extension_nodes() {
    let (_, tree) = sample();
    let out = Doubler.visit(&tree).expect("rewrite");
    assert!(!out.ptr_eq(&tree));
    let first = match out.kind() {
        ExprKind::Block { expressions, .. } => expressions[0].clone(),
        _ => panic!("expected a block, got {:?}", out),
    };
    match first.as_node() {
        Some(Node::AssignBinary(n)) => assert_eq!(n.right().constant_value(), Some(&ConstValue::Int(6))),
        _ => panic!("expected a compound assignment, got {:?}", first),
    }
}

#[test]
fn verify_rejects_unbound_variable_and_unreduced_nodes() {
    let (x, tree) = sample();
    assert!(verify(&tree, &[x.clone()]).is_err());

    let reduced = reduce_extensions(&tree).expect("reduce");
    assert!(verify(&reduced, &[x]).is_ok());
    assert!(verify(&reduced, &[]).is_err());
}

#[test]
fn options_file_controls_temporary_names() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    write!(file, r#"{{"temp_prefix":"tmp_","verify":false}}"#).expect("write options");
    let options = LoweringOptions::load_from_file(file.path()).expect("load options");
    assert!(!options.verify);
    assert_eq!(options.max_reduce_depth, LoweringOptions::default().max_reduce_depth);

    let gate = Variable::named("gate", Type::class("Gate"));
    let lock: Expr = Lock::new(gate.expr(), Expr::empty()).expect("lock").into();
    let ctx = LoweringContext::with_options(options);
    let reduced = reduce_extensions_with(&lock, &ctx).expect("reduce");
    match reduced.kind() {
        ExprKind::Block { variables, .. } => {
            let names: Vec<&str> = variables.iter().filter_map(|v| v.name()).collect();
            assert_eq!(names, vec!["tmp_lock", "tmp_lockTaken"]);
        }
        _ => panic!("expected a block, got {:?}", reduced),
    }
}

#[test]
fn blank_temp_prefix_is_rejected() {
    assert!(LoweringOptions::from_json_str(r#"{"temp_prefix":"  "}"#).is_err());
}

#[test]
fn error_report_names_level_and_issuer() {
    let x = Variable::named("x", Type::I32);
    let err = CaseSwitch::new(
        x.expr(),
        vec![
            SwitchCase::new(vec![TestValue::Literal(ConstValue::Int(1))], Expr::empty()).expect("case"),
            SwitchCase::new(vec![TestValue::Literal(ConstValue::Int(1))], Expr::empty()).expect("case"),
        ],
        None,
    )
    .expect_err("duplicate");
    let report = generate_error_report(&err);
    assert!(report.starts_with("LOWERKIT | ERROR | lowerkit.ast.switch.CaseSwitch::new | "), "{}", report);
}
