//! Backend query builders.
//!
//! A [`QueryBuilder`] renders schema and filter data into backend statements.
//! Builders are pure: they never touch storage. Literal values travel as
//! statement parameters; [`Statement::render_inline`] produces the literal
//! text for logs.
#![forbid(unsafe_code)]

pub mod sqlite;

use std::fmt;

use crate::filter::FilterNode;
use crate::model::{ContainerSchema, PropertySchema, RelationSchema, RelationSide};
use crate::storage::ColumnInfo;
use crate::types::{Record, Value};

pub use sqlite::SqliteQueryBuilder;

/// Rows fetched per page when no batch size is given.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// A rendered statement with positional parameters (`?1`, `?2`, …).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Statement {
    /// Statement text.
    pub sql: String,
    /// Parameter values in placeholder order.
    pub params: Vec<Value>,
}

impl Statement {
    /// A statement without parameters.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Substitutes every placeholder with its literal value.
    pub fn render_inline(&self) -> String {
        let mut out = String::with_capacity(self.sql.len());
        let mut chars = self.sql.chars().peekable();
        let mut quote: Option<char> = None;
        while let Some(c) = chars.next() {
            match (quote, c) {
                (Some(q), c) if c == q => {
                    quote = None;
                    out.push(c);
                }
                (Some(_), c) => out.push(c),
                (None, '\'') | (None, '"') => {
                    quote = Some(c);
                    out.push(c);
                }
                (None, '?') => {
                    let mut digits = String::new();
                    while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                        digits.push(d);
                        chars.next();
                    }
                    let param = digits
                        .parse::<usize>()
                        .ok()
                        .and_then(|n| n.checked_sub(1))
                        .and_then(|idx| self.params.get(idx));
                    match param {
                        Some(value) => out.push_str(&value.sql_literal()),
                        None => {
                            out.push('?');
                            out.push_str(&digits);
                        }
                    }
                }
                (None, c) => out.push(c),
            }
        }
        out
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render_inline())
    }
}

/// Sort direction of a select.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
pub enum SortDirection {
    /// Ascending.
    #[default]
    Asc,
    /// Descending.
    Desc,
}

impl SortDirection {
    /// SQL keyword.
    pub fn sql(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// Parameters of a paged select.
#[derive(Clone, Copy, Debug)]
pub struct SelectQuery<'a> {
    /// Table to read.
    pub table: &'a str,
    /// Rows to skip.
    pub offset: usize,
    /// Rows to return.
    pub limit: usize,
    /// Optional filter.
    pub filter: Option<&'a FilterNode>,
    /// Sort column; the primary key when absent.
    pub sort_column: Option<&'a str>,
    /// Sort direction.
    pub direction: SortDirection,
}

impl<'a> SelectQuery<'a> {
    /// Unfiltered select ordered by primary key.
    pub fn new(table: &'a str, offset: usize, limit: usize) -> Self {
        Self {
            table,
            offset,
            limit,
            filter: None,
            sort_column: None,
            direction: SortDirection::Asc,
        }
    }

    /// Adds a filter.
    pub fn filter(mut self, filter: Option<&'a FilterNode>) -> Self {
        self.filter = filter;
        self
    }

    /// Orders by a column.
    pub fn sort_by(mut self, column: Option<&'a str>, direction: SortDirection) -> Self {
        self.sort_column = column;
        self.direction = direction;
        self
    }
}

/// Renders statements for one backend.
pub trait QueryBuilder: Send + Sync {
    /// Table for a container: primary key plus one column per property.
    fn create_table(&self, container: &ContainerSchema) -> Statement;

    /// Join table for a relation, with one foreign key per endpoint.
    fn create_relation_table(&self, relation: &RelationSchema) -> Statement;

    /// Drops a table.
    fn drop_table(&self, table: &str) -> Statement;

    /// Adds a property column to an existing table.
    fn add_column(&self, table: &str, property: &PropertySchema) -> Statement;

    /// Drops a column.
    fn drop_column(&self, table: &str, column: &str) -> Statement;

    /// Lists user tables; one `name` column per row.
    fn list_tables(&self) -> Statement;

    /// Lists the columns of a table.
    fn list_columns(&self, table: &str) -> Statement;

    /// Paged, filtered, sorted select.
    fn select(&self, query: &SelectQuery<'_>) -> Statement;

    /// Row count with an optional filter; one `count` column.
    fn count(&self, table: &str, filter: Option<&FilterNode>) -> Statement;

    /// Inserts a row and returns its `Id`.
    fn insert(&self, table: &str, record: &Record) -> Statement;

    /// Updates the given columns of one row.
    fn update(&self, table: &str, id: i64, changes: &Record) -> Statement;

    /// Deletes one row.
    fn delete(&self, table: &str, id: i64) -> Statement;

    /// Inserts a join row.
    fn link(&self, relation: &RelationSchema, source_id: i64, target_id: i64) -> Statement;

    /// Deletes a join row.
    fn unlink(&self, relation: &RelationSchema, source_id: i64, target_id: i64) -> Statement;

    /// Deletes every join row whose `side` endpoint is `id`.
    fn unlink_all(&self, relation: &RelationSchema, side: RelationSide, id: i64) -> Statement;

    /// Selects the rows connected to `id`, which sits on `from`.
    fn select_related(
        &self,
        relation: &RelationSchema,
        from: RelationSide,
        id: i64,
        offset: usize,
        limit: usize,
    ) -> Statement;

    /// Recognizes a join table layout and returns its endpoint table names.
    fn relation_endpoints(&self, columns: &[ColumnInfo]) -> Option<(String, String)>;
}
