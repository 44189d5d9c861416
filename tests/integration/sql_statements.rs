#![allow(missing_docs)]

mod common;

use pawnstore::compiler::compile_graph;
use pawnstore::filter::{prop, translate};
use pawnstore::model::{
    ContainerSchema, PawnDescriptor, PlainNamingEncoder, PropertyDescriptor, PropertySchema,
    PropertyType,
};
use pawnstore::query::{QueryBuilder, SelectQuery, SortDirection, SqliteQueryBuilder};
use pawnstore::types::{Result, Value};

use common::{init_tracing, law_firm};

fn squash(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[test]
fn create_table_maps_every_semantic_type() -> Result<()> {
    init_tracing();
    let pawn = PawnDescriptor::new("BasicPawn")
        .property(PropertyDescriptor::new("StrProp", PropertyType::String))
        .property(PropertyDescriptor::new("IntProp", PropertyType::Int32))
        .property(PropertyDescriptor::new("BoolProp", PropertyType::Bool))
        .property(PropertyDescriptor::new("FloatProp", PropertyType::Float32));
    let graph = compile_graph(&[pawn], &PlainNamingEncoder)?;
    let stmt = SqliteQueryBuilder.create_table(&graph.containers()[0]);
    assert_eq!(
        squash(&stmt.sql),
        "CREATE TABLE BasicPawn (Id INTEGER PRIMARY KEY, StrProp TEXT, IntProp INTEGER, \
         BoolProp INTEGER, FloatProp REAL)"
    );
    Ok(())
}

#[test]
fn integer_widths_and_decimals_share_column_types() {
    let properties = [
        PropertyType::Int8,
        PropertyType::UInt64,
        PropertyType::Decimal,
        PropertyType::Date,
    ]
    .into_iter()
    .enumerate()
    .filter_map(|(i, ty)| PropertySchema::plain(format!("P{i}"), ty))
    .collect();
    let container = ContainerSchema::new("Mixed", "Mixed", properties);
    assert_eq!(
        SqliteQueryBuilder.create_table(&container).sql,
        "CREATE TABLE Mixed (Id INTEGER PRIMARY KEY, P0 INTEGER, P1 INTEGER, P2 REAL, P3 TEXT)"
    );
}

#[test]
fn unfiltered_select_orders_by_primary_key() {
    let stmt = SqliteQueryBuilder.select(&SelectQuery::new("cars", 0, 200));
    assert_eq!(stmt.sql, "SELECT * FROM cars ORDER BY Id LIMIT 200 OFFSET 0");
    assert!(stmt.params.is_empty());
}

#[test]
fn filters_are_parenthesized_and_parameterized() -> Result<()> {
    let filter = translate(&prop("doors").eq(4).or(prop("doors").eq(2)))?;
    let stmt = SqliteQueryBuilder.select(&SelectQuery::new("cars", 0, 200).filter(Some(&filter)));
    assert_eq!(
        stmt.sql,
        "SELECT * FROM cars WHERE ((doors = ?1) OR (doors = ?2)) ORDER BY Id LIMIT 200 OFFSET 0"
    );
    assert_eq!(stmt.params, vec![Value::Int(4), Value::Int(2)]);
    assert!(stmt
        .render_inline()
        .contains("WHERE ((doors = 4) OR (doors = 2))"));
    Ok(())
}

#[test]
fn explicit_sort_and_paging() -> Result<()> {
    let filter = translate(&prop("Model").ne("it's"))?;
    let stmt = SqliteQueryBuilder.select(
        &SelectQuery::new("cars", 40, 20)
            .filter(Some(&filter))
            .sort_by(Some("Model"), SortDirection::Desc),
    );
    assert_eq!(
        stmt.render_inline(),
        "SELECT * FROM cars WHERE (Model != 'it''s') ORDER BY Model DESC LIMIT 20 OFFSET 40"
    );
    let asc = SqliteQueryBuilder
        .select(&SelectQuery::new("cars", 0, 5).sort_by(Some("model"), SortDirection::Asc));
    assert!(asc.sql.contains("ORDER BY model ASC"));
    Ok(())
}

#[test]
fn relation_tables_reference_both_containers() -> Result<()> {
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;
    let mentor = graph.relation("Lawyer_Lawyer").expect("self relation");
    let stmt = SqliteQueryBuilder.create_relation_table(mentor);
    assert_eq!(
        stmt.sql,
        "CREATE TABLE Lawyer_Lawyer (RelationId INTEGER PRIMARY KEY, Source_Lawyer INTEGER, \
         Target_Lawyer INTEGER, FOREIGN KEY(Source_Lawyer) REFERENCES Lawyer(Id), \
         FOREIGN KEY(Target_Lawyer) REFERENCES Lawyer(Id))"
    );
    Ok(())
}

#[test]
fn odd_identifiers_are_quoted() {
    let container = ContainerSchema::new(
        "Odd",
        "odd table",
        PropertySchema::plain("first-name", PropertyType::String)
            .into_iter()
            .collect(),
    );
    assert_eq!(
        SqliteQueryBuilder.create_table(&container).sql,
        r#"CREATE TABLE "odd table" (Id INTEGER PRIMARY KEY, "first-name" TEXT)"#
    );
    assert_eq!(SqliteQueryBuilder.drop_table("odd table").sql, r#"DROP TABLE "odd table""#);
}
