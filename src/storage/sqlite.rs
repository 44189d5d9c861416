//! SQLite storage provider backed by `rusqlite`.
#![forbid(unsafe_code)]

use std::path::Path;

use rusqlite::types::{ToSqlOutput, Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection, ToSql};
use tracing::{debug, trace};

use super::{ColumnInfo, StorageProvider};
use crate::query::{QueryBuilder, SqliteQueryBuilder, Statement};
use crate::types::value::format_date;
use crate::types::{Record, Result, Value};

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(SqlValue::Null),
            Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            Value::Int(v) => ToSqlOutput::Owned(SqlValue::Integer(*v)),
            Value::Float(v) => ToSqlOutput::Owned(SqlValue::Real(*v)),
            Value::String(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Date(d) => ToSqlOutput::Owned(SqlValue::Text(format_date(d))),
        })
    }
}

fn read_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Int(v),
        ValueRef::Real(v) => Value::Float(v),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Storage provider over one SQLite connection.
pub struct SqliteStorageProvider {
    conn: Connection,
    builder: SqliteQueryBuilder,
}

impl SqliteStorageProvider {
    /// Opens (or creates) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        debug!(path = %path.display(), "storage.sqlite.open");
        Ok(Self::from_connection(conn))
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    /// Wraps an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            builder: SqliteQueryBuilder,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl StorageProvider for SqliteStorageProvider {
    fn list_tables(&self) -> Result<Vec<String>> {
        self.execute_query(&self.builder.list_tables())?
            .iter()
            .map(|row| row.get_str("name").map(str::to_owned))
            .collect()
    }

    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.execute_query(&self.builder.list_columns(table))?
            .iter()
            .map(|row| -> Result<ColumnInfo> {
                Ok(ColumnInfo::new(
                    row.get_str("name")?,
                    row.get_str("type")?,
                    row.get_i64("pk")? != 0,
                ))
            })
            .collect()
    }

    fn execute_ddl(&self, statement: &Statement) -> Result<()> {
        trace!(sql = %statement.sql, "storage.sqlite.ddl");
        self.conn
            .execute(&statement.sql, params_from_iter(statement.params.iter()))?;
        Ok(())
    }

    fn execute(&self, statement: &Statement) -> Result<usize> {
        trace!(sql = %statement.sql, params = statement.params.len(), "storage.sqlite.execute");
        Ok(self
            .conn
            .execute(&statement.sql, params_from_iter(statement.params.iter()))?)
    }

    fn execute_query(&self, statement: &Statement) -> Result<Vec<Record>> {
        trace!(sql = %statement.sql, params = statement.params.len(), "storage.sqlite.query");
        let mut stmt = self.conn.prepare(&statement.sql)?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt.query_map(params_from_iter(statement.params.iter()), |row| {
            let mut record = Record::new();
            for (idx, name) in names.iter().enumerate() {
                record.set(name.clone(), read_value(row.get_ref(idx)?));
            }
            Ok(record)
        })?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN")?;
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn revert(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }
}
