#![allow(missing_docs)]

mod common;

use pawnstore::compiler::compile_graph;
use pawnstore::filter::{
    call, lit, path, prop, translate, ComparisonOp, Connective, FilterNode, FilterTranslator,
};
use pawnstore::model::PlainNamingEncoder;
use pawnstore::types::{ErrorKind, FilterError, Record, Result, Value};
use time::macros::datetime;

use common::{init_tracing, law_firm};

fn leaf(node: &FilterNode) -> (&str, ComparisonOp, &Value) {
    match node {
        FilterNode::Leaf(leaf) => (leaf.property.as_str(), leaf.op, &leaf.value),
        other => panic!("expected a leaf, got {other}"),
    }
}

#[test]
fn mixed_connectives_keep_their_shape() -> Result<()> {
    init_tracing();
    let today = datetime!(2024-05-01 00:00 UTC);
    let predicate = prop("Date")
        .gt(today)
        .and(prop("Name").eq("x"))
        .or(prop("Date").lt(today));
    let tree = translate(&predicate)?;

    let FilterNode::Branch {
        connective: Connective::Or,
        left,
        right,
    } = &tree
    else {
        panic!("root must be an Or branch: {tree}");
    };
    let FilterNode::Branch {
        connective: Connective::And,
        left: and_left,
        right: and_right,
    } = left.as_ref()
    else {
        panic!("left child must be an And branch");
    };
    assert_eq!(leaf(and_left), ("Date", ComparisonOp::Gt, &Value::Date(today)));
    assert_eq!(leaf(and_right), ("Name", ComparisonOp::Eq, &Value::from("x")));
    assert_eq!(leaf(right), ("Date", ComparisonOp::Lt, &Value::Date(today)));
    Ok(())
}

#[test]
fn only_bare_properties_may_sit_on_the_left() {
    let nested = path(["Client", "Name"]).compare(ComparisonOp::Eq, lit("x"));
    let method = call("len", vec![prop("Name")]).compare(ComparisonOp::Gt, lit(3));
    let reversed = lit(3).compare(ComparisonOp::Lt, prop("Rate"));
    for predicate in [nested, method, reversed] {
        let err = translate(&predicate).unwrap_err();
        assert!(matches!(err, FilterError::Malformed { .. }), "{err}");
        assert_eq!(err.code(), "MalformedFilter");
    }
}

#[test]
fn soft_delete_leaf_joins_the_caller_filter() -> Result<()> {
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;
    let client = graph.container("Client").expect("client");
    let translator = FilterTranslator::new(client);

    let only_flag = translator.translate(None, false)?.expect("flag leaf");
    assert_eq!(only_flag, FilterNode::leaf("Archived", ComparisonOp::Eq, false));

    let combined = translator
        .translate(Some(&prop("Name").ne("Acme")), true)?
        .expect("combined");
    assert_eq!(combined.to_string(), r#"((Name != "Acme") AND (Archived = true))"#);

    let lawyer = graph.container("Lawyer").expect("lawyer");
    assert_eq!(FilterTranslator::new(lawyer).translate(None, false)?, None);
    Ok(())
}

#[test]
fn unknown_properties_are_rejected() -> Result<()> {
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;
    let matter = graph.container("Matter").expect("matter");
    let err = FilterTranslator::new(matter)
        .translate(Some(&prop("Judge").eq("Dredd")), false)
        .unwrap_err();
    let err = pawnstore::PawnError::from(err);
    assert_eq!(err.kind(), ErrorKind::Filter);
    assert_eq!(err.code(), "UnknownFilterProperty");
    Ok(())
}

#[test]
fn trees_evaluate_against_records() -> Result<()> {
    let tree = translate(&prop("Doors").eq(4).or(prop("Doors").eq(2)))?;
    assert!(tree.matches(&Record::new().with("Doors", 2)));
    assert!(!tree.matches(&Record::new().with("Doors", 3)));
    assert!(!tree.matches(&Record::new()));
    Ok(())
}
