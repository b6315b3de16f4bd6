use std::sync::Arc;

use lowerkit_core::ast::{InterpolatedString, Interpolation, MemberInitializer, indexer_initializer};
use lowerkit_core::ir::meta::{Member, Method, NativeFn, ParameterInfo, Property};
use lowerkit_core::{Expr, Type, Value, Variable, lower_and_evaluate, reduce_extensions, verify};

fn person() -> Type {
    Type::class("Person")
}

fn table() -> Type {
    Type::class("Table")
}

fn cell_indexer() -> Property {
    let set: NativeFn = Arc::new(|t: Option<&Value>, args: &mut [Value]| -> Result<Value, Value> {
        if let Some(t) = t {
            t.set_field(&format!("cell{}", args[0]), args[1].clone());
        }
        Ok(Value::Null)
    });
    Property::indexer(table(), Type::String, vec![ParameterInfo::new("i", Type::I32)], None, Some(set))
}

#[test]
fn member_initializer_with_extended_value_is_lowered_in_place() {
    let who = Variable::named("who", Type::String);
    let greeting: Expr = InterpolatedString::new(vec![
        Interpolation::literal("hi "),
        Interpolation::insert(who.expr(), None, None).expect("insert"),
    ])
    .expect("interpolation")
    .into();
    let name = Member::Property(Property::auto("Name", person(), Type::String));
    let init = MemberInitializer::new(name, greeting).expect("Name = ...");
    let new = Expr::new(&Method::constructor(person()).build(), vec![]).expect("new");
    let tree = Expr::member_init(new, vec![init]).expect("member init");

    let reduced = reduce_extensions(&tree).expect("reduce");
    assert!(verify(&reduced, &[who.clone()]).is_ok());

    let out = lower_and_evaluate(&tree, &[(who, Value::string("Ada"))]).expect("evaluate");
    assert_eq!(out.field("Name").map(|v| v.to_string()).as_deref(), Some("hi Ada"));
}

#[test]
fn read_only_member_cannot_be_initialized() {
    let getter = Method::builder("get_Id", person()).returns(Type::I32).build();
    let id = Member::Property(Property::new("Id", person(), Type::I32, Some(getter), None));
    assert!(MemberInitializer::new(id, Expr::int32(1)).is_err());
}

#[test]
fn indexer_initializer_calls_the_setter() {
    let first = indexer_initializer(&cell_indexer(), vec![Expr::int32(0)], Expr::string("a")).expect("[0] = a");
    let second = indexer_initializer(&cell_indexer(), vec![Expr::int32(3)], Expr::string("d")).expect("[3] = d");
    let new = Expr::new(&Method::constructor(table()).build(), vec![]).expect("new");
    let tree = Expr::list_init(new, vec![first, second]).expect("list init");

    let out = lower_and_evaluate(&tree, &[]).expect("evaluate");
    assert_eq!(out.field("cell0").map(|v| v.to_string()).as_deref(), Some("a"));
    assert_eq!(out.field("cell3").map(|v| v.to_string()).as_deref(), Some("d"));
}

#[test]
fn indexer_without_setter_is_rejected() {
    let get: NativeFn = Arc::new(|_: Option<&Value>, _: &mut [Value]| -> Result<Value, Value> { Ok(Value::Null) });
    let read_only = Property::indexer(table(), Type::String, vec![ParameterInfo::new("i", Type::I32)], Some(get), None);
    assert!(indexer_initializer(&read_only, vec![Expr::int32(0)], Expr::string("a")).is_err());
}
