//! Column-keyed rows exchanged between pawns and storage.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use time::OffsetDateTime;

use super::error::{PawnError, Result, StorageError};
use super::value::{parse_date, Value};

/// A set of named column values.
///
/// Typed getters coerce the storage representation back to the semantic
/// type: booleans come back from integers and dates from RFC 3339 text.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Record {
    values: BTreeMap<String, Value>,
}

impl Record {
    /// Creates an empty record.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets a column value, replacing any previous one.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(column.into(), value.into());
    }

    /// Removes a column, returning its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.values.remove(column)
    }

    /// Raw column access.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    /// Iterates columns in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true when no column is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Reads a string column.
    pub fn get_str(&self, column: &str) -> Result<&str> {
        match self.require(column)? {
            Value::String(s) => Ok(s),
            other => Err(mismatch(column, "string", other)),
        }
    }

    /// Reads an integer column.
    pub fn get_i64(&self, column: &str) -> Result<i64> {
        match self.require(column)? {
            Value::Int(v) => Ok(*v),
            Value::Bool(b) => Ok(i64::from(*b)),
            other => Err(mismatch(column, "int", other)),
        }
    }

    /// Reads a floating point column.
    pub fn get_f64(&self, column: &str) -> Result<f64> {
        match self.require(column)? {
            Value::Float(v) => Ok(*v),
            Value::Int(v) => Ok(*v as f64),
            other => Err(mismatch(column, "float", other)),
        }
    }

    /// Reads a boolean column.
    pub fn get_bool(&self, column: &str) -> Result<bool> {
        match self.require(column)? {
            Value::Bool(b) => Ok(*b),
            Value::Int(v) => Ok(*v != 0),
            other => Err(mismatch(column, "bool", other)),
        }
    }

    /// Reads a date column.
    pub fn get_date(&self, column: &str) -> Result<OffsetDateTime> {
        match self.require(column)? {
            Value::Date(d) => Ok(*d),
            Value::String(s) => parse_date(s).ok_or_else(|| {
                PawnError::from(StorageError::Decode {
                    column: column.to_owned(),
                    reason: format!("'{s}' is not an RFC 3339 timestamp"),
                })
            }),
            other => Err(mismatch(column, "date", other)),
        }
    }

    fn require(&self, column: &str) -> Result<&Value> {
        self.values.get(column).ok_or_else(|| {
            PawnError::from(StorageError::Decode {
                column: column.to_owned(),
                reason: "column missing".to_owned(),
            })
        })
    }
}

fn mismatch(column: &str, expected: &str, found: &Value) -> PawnError {
    PawnError::from(StorageError::Decode {
        column: column.to_owned(),
        reason: format!("expected {expected}, found {}", found.type_name()),
    })
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
