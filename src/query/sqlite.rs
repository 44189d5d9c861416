//! SQLite statement rendering.
#![forbid(unsafe_code)]

use std::fmt::Write as _;

use super::{QueryBuilder, SelectQuery, SortDirection, Statement};
use crate::compiler::PRIMARY_KEY;
use crate::filter::{ComparisonOp, FilterNode};
use crate::model::{
    ContainerSchema, PropertySchema, RelationSchema, RelationSide, SemanticType,
};
use crate::storage::ColumnInfo;
use crate::types::{Record, Value};

/// Primary key column of join tables.
pub const RELATION_KEY: &str = "RelationId";
const SOURCE_PREFIX: &str = "Source_";
const TARGET_PREFIX: &str = "Target_";

// Keywords SQLite refuses as bare identifiers.
const RESERVED: &[&str] = &[
    "ADD", "ALL", "ALTER", "AND", "AS", "AUTOINCREMENT", "BETWEEN", "CASE", "CHECK", "COLLATE",
    "COMMIT", "CONSTRAINT", "CREATE", "DEFAULT", "DEFERRABLE", "DELETE", "DISTINCT", "DROP",
    "ELSE", "ESCAPE", "EXCEPT", "EXISTS", "FOREIGN", "FROM", "GROUP", "HAVING", "IN", "INDEX",
    "INSERT", "INTERSECT", "INTO", "IS", "ISNULL", "JOIN", "LIMIT", "NOT", "NOTHING", "NOTNULL",
    "NULL", "ON", "OR", "ORDER", "PRIMARY", "REFERENCES", "RETURNING", "SELECT", "SET", "TABLE",
    "THEN", "TO", "TRANSACTION", "UNION", "UNIQUE", "UPDATE", "USING", "VALUES", "WHEN", "WHERE",
];

/// Quotes an identifier unless it is a plain `[A-Za-z_][A-Za-z0-9_]*` name
/// that is not a reserved keyword.
pub fn quote_ident(name: &str) -> String {
    let mut chars = name.chars();
    let plain = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED.iter().any(|kw| kw.eq_ignore_ascii_case(name));
    if plain {
        name.to_owned()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// SQLite column type of a semantic type.
pub fn column_type(semantic: SemanticType) -> &'static str {
    match semantic {
        SemanticType::String | SemanticType::Date => "TEXT",
        SemanticType::Int | SemanticType::Bool => "INTEGER",
        SemanticType::Float => "REAL",
    }
}

/// Join column holding the source endpoint id.
pub fn source_column(relation: &RelationSchema) -> String {
    format!("{SOURCE_PREFIX}{}", relation.source_storage)
}

/// Join column holding the target endpoint id.
pub fn target_column(relation: &RelationSchema) -> String {
    format!("{TARGET_PREFIX}{}", relation.target_storage)
}

fn side_column(relation: &RelationSchema, side: RelationSide) -> String {
    match side {
        RelationSide::Source => source_column(relation),
        RelationSide::Target => target_column(relation),
    }
}

/// Accumulates statement text and parameters.
#[derive(Default)]
struct SqlWriter {
    sql: String,
    params: Vec<Value>,
}

impl SqlWriter {
    fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    fn ident(&mut self, name: &str) -> &mut Self {
        self.sql.push_str(&quote_ident(name));
        self
    }

    fn bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.params.push(value.into());
        let _ = write!(self.sql, "?{}", self.params.len());
        self
    }

    fn filter(&mut self, node: &FilterNode) {
        match node {
            FilterNode::Leaf(leaf) => {
                self.push("(").ident(&leaf.property);
                match (&leaf.value, leaf.op) {
                    (Value::Null, ComparisonOp::Eq) => {
                        self.push(" IS NULL");
                    }
                    (Value::Null, ComparisonOp::NotEq) => {
                        self.push(" IS NOT NULL");
                    }
                    (value, op) => {
                        self.push(" ").push(op.sql()).push(" ").bind(value.clone());
                    }
                }
                self.push(")");
            }
            FilterNode::Branch {
                connective,
                left,
                right,
            } => {
                self.push("(");
                self.filter(left);
                self.push(" ").push(connective.sql()).push(" ");
                self.filter(right);
                self.push(")");
            }
        }
    }

    fn where_clause(&mut self, filter: Option<&FilterNode>) {
        if let Some(filter) = filter {
            self.push(" WHERE ");
            self.filter(filter);
        }
    }

    fn page(&mut self, limit: usize, offset: usize) {
        let _ = write!(self.sql, " LIMIT {limit} OFFSET {offset}");
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Reference SQL backend builder.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteQueryBuilder;

impl SqliteQueryBuilder {
    /// Creates the builder.
    pub fn new() -> Self {
        Self
    }
}

impl QueryBuilder for SqliteQueryBuilder {
    fn create_table(&self, container: &ContainerSchema) -> Statement {
        let mut w = SqlWriter::default();
        w.push("CREATE TABLE ")
            .ident(&container.storage_name)
            .push(" (")
            .push(PRIMARY_KEY)
            .push(" INTEGER PRIMARY KEY");
        for property in &container.properties {
            w.push(", ")
                .ident(&property.name)
                .push(" ")
                .push(column_type(property.semantic));
        }
        w.push(")");
        w.finish()
    }

    fn create_relation_table(&self, relation: &RelationSchema) -> Statement {
        let source = source_column(relation);
        let target = target_column(relation);
        let mut w = SqlWriter::default();
        w.push("CREATE TABLE ")
            .ident(&relation.name)
            .push(" (")
            .push(RELATION_KEY)
            .push(" INTEGER PRIMARY KEY, ")
            .ident(&source)
            .push(" INTEGER, ")
            .ident(&target)
            .push(" INTEGER, FOREIGN KEY(")
            .ident(&source)
            .push(") REFERENCES ")
            .ident(&relation.source_storage)
            .push("(")
            .push(PRIMARY_KEY)
            .push("), FOREIGN KEY(")
            .ident(&target)
            .push(") REFERENCES ")
            .ident(&relation.target_storage)
            .push("(")
            .push(PRIMARY_KEY)
            .push("))");
        w.finish()
    }

    fn drop_table(&self, table: &str) -> Statement {
        Statement::new(format!("DROP TABLE {}", quote_ident(table)))
    }

    fn add_column(&self, table: &str, property: &PropertySchema) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} ADD COLUMN {} {}",
            quote_ident(table),
            quote_ident(&property.name),
            column_type(property.semantic)
        ))
    }

    fn drop_column(&self, table: &str, column: &str) -> Statement {
        Statement::new(format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(table),
            quote_ident(column)
        ))
    }

    fn list_tables(&self) -> Statement {
        Statement::new(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )
    }

    fn list_columns(&self, table: &str) -> Statement {
        Statement::new(format!("PRAGMA table_info({})", quote_ident(table)))
    }

    fn select(&self, query: &SelectQuery<'_>) -> Statement {
        let mut w = SqlWriter::default();
        w.push("SELECT * FROM ").ident(query.table);
        w.where_clause(query.filter);
        w.push(" ORDER BY ");
        match query.sort_column {
            Some(column) => {
                w.ident(column).push(" ").push(query.direction.sql());
            }
            None => {
                w.push(PRIMARY_KEY);
                if query.direction == SortDirection::Desc {
                    w.push(" DESC");
                }
            }
        }
        w.page(query.limit, query.offset);
        w.finish()
    }

    fn count(&self, table: &str, filter: Option<&FilterNode>) -> Statement {
        let mut w = SqlWriter::default();
        w.push("SELECT COUNT(*) AS count FROM ").ident(table);
        w.where_clause(filter);
        w.finish()
    }

    fn insert(&self, table: &str, record: &Record) -> Statement {
        let mut w = SqlWriter::default();
        w.push("INSERT INTO ").ident(table);
        if record.is_empty() {
            w.push(" DEFAULT VALUES");
        } else {
            w.push(" (");
            for (i, (column, _)) in record.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.ident(column);
            }
            w.push(") VALUES (");
            for (i, (_, value)) in record.iter().enumerate() {
                if i > 0 {
                    w.push(", ");
                }
                w.bind(value.clone());
            }
            w.push(")");
        }
        w.push(" RETURNING ").push(PRIMARY_KEY);
        w.finish()
    }

    fn update(&self, table: &str, id: i64, changes: &Record) -> Statement {
        let mut w = SqlWriter::default();
        w.push("UPDATE ").ident(table).push(" SET ");
        for (i, (column, value)) in changes.iter().enumerate() {
            if i > 0 {
                w.push(", ");
            }
            w.ident(column).push(" = ").bind(value.clone());
        }
        w.push(" WHERE ").push(PRIMARY_KEY).push(" = ").bind(id);
        w.finish()
    }

    fn delete(&self, table: &str, id: i64) -> Statement {
        let mut w = SqlWriter::default();
        w.push("DELETE FROM ")
            .ident(table)
            .push(" WHERE ")
            .push(PRIMARY_KEY)
            .push(" = ")
            .bind(id);
        w.finish()
    }

    fn link(&self, relation: &RelationSchema, source_id: i64, target_id: i64) -> Statement {
        let mut w = SqlWriter::default();
        w.push("INSERT INTO ")
            .ident(&relation.name)
            .push(" (")
            .ident(&source_column(relation))
            .push(", ")
            .ident(&target_column(relation))
            .push(") VALUES (")
            .bind(source_id)
            .push(", ")
            .bind(target_id)
            .push(")");
        w.finish()
    }

    fn unlink(&self, relation: &RelationSchema, source_id: i64, target_id: i64) -> Statement {
        let mut w = SqlWriter::default();
        w.push("DELETE FROM ")
            .ident(&relation.name)
            .push(" WHERE ")
            .ident(&source_column(relation))
            .push(" = ")
            .bind(source_id)
            .push(" AND ")
            .ident(&target_column(relation))
            .push(" = ")
            .bind(target_id);
        w.finish()
    }

    fn unlink_all(&self, relation: &RelationSchema, side: RelationSide, id: i64) -> Statement {
        let mut w = SqlWriter::default();
        w.push("DELETE FROM ")
            .ident(&relation.name)
            .push(" WHERE ")
            .ident(&side_column(relation, side))
            .push(" = ")
            .bind(id);
        w.finish()
    }

    fn select_related(
        &self,
        relation: &RelationSchema,
        from: RelationSide,
        id: i64,
        offset: usize,
        limit: usize,
    ) -> Statement {
        let (far_table, far_side) = match from {
            RelationSide::Source => (&relation.target_storage, RelationSide::Target),
            RelationSide::Target => (&relation.source_storage, RelationSide::Source),
        };
        let mut w = SqlWriter::default();
        w.push("SELECT t.* FROM ")
            .ident(far_table)
            .push(" AS t INNER JOIN ")
            .ident(&relation.name)
            .push(" AS j ON j.")
            .ident(&side_column(relation, far_side))
            .push(" = t.")
            .push(PRIMARY_KEY)
            .push(" WHERE j.")
            .ident(&side_column(relation, from))
            .push(" = ")
            .bind(id)
            .push(" ORDER BY t.")
            .push(PRIMARY_KEY);
        w.page(limit, offset);
        w.finish()
    }

    fn relation_endpoints(&self, columns: &[ColumnInfo]) -> Option<(String, String)> {
        if columns.len() != 3 || columns[0].name != RELATION_KEY {
            return None;
        }
        let source = columns[1].name.strip_prefix(SOURCE_PREFIX)?;
        let target = columns[2].name.strip_prefix(TARGET_PREFIX)?;
        Some((source.to_owned(), target.to_owned()))
    }
}
