//! Storage provider interface, the SQLite provider and result cursors.
#![forbid(unsafe_code)]

pub mod cancel;
pub mod cursor;
pub mod sqlite;

use crate::query::Statement;
use crate::types::{Record, Result};

pub use cancel::CancelToken;
pub use cursor::{Identified, Identity, PageSource, StorageCursor};
pub use sqlite::SqliteStorageProvider;

/// One introspected column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,
    /// Declared type as reported by the backend.
    pub declared_type: String,
    /// Part of the primary key.
    pub primary_key: bool,
}

impl ColumnInfo {
    /// Creates a column description.
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>, primary_key: bool) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            primary_key,
        }
    }
}

/// A storage backend.
///
/// Calls are synchronous and blocking. Transactions are not nested: callers
/// pair one `begin_transaction` with exactly one `commit` or `revert`.
pub trait StorageProvider {
    /// User table names.
    fn list_tables(&self) -> Result<Vec<String>>;

    /// Columns of one table in declaration order.
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>>;

    /// Runs a schema statement.
    fn execute_ddl(&self, statement: &Statement) -> Result<()>;

    /// Runs a data statement that returns no rows; yields the affected row count.
    fn execute(&self, statement: &Statement) -> Result<usize>;

    /// Runs a statement that returns rows.
    fn execute_query(&self, statement: &Statement) -> Result<Vec<Record>>;

    /// Opens a transaction.
    fn begin_transaction(&self) -> Result<()>;

    /// Commits the open transaction.
    fn commit(&self) -> Result<()>;

    /// Rolls back the open transaction.
    fn revert(&self) -> Result<()>;
}
