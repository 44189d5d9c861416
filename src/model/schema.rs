//! Compiled, storage-facing schema types.
#![forbid(unsafe_code)]

use time::{OffsetDateTime, PrimitiveDateTime};

use super::descriptor::{PropertyType, SemanticType};
use crate::types::Value;

/// Character count bounds of a string property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StringBounds {
    /// Minimum characters.
    pub min_chars: u32,
    /// Maximum characters.
    pub max_chars: u32,
}

/// Value bounds of a numeric property.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NumericBounds {
    /// Smallest accepted value.
    pub min: f64,
    /// Largest accepted value.
    pub max: f64,
}

/// Bounds of a date property.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateBounds {
    /// Earliest accepted date.
    pub earliest: OffsetDateTime,
    /// Latest accepted date.
    pub latest: OffsetDateTime,
}

impl DateBounds {
    /// Fills missing ends with the representable extremes.
    pub fn resolve(earliest: Option<OffsetDateTime>, latest: Option<OffsetDateTime>) -> Self {
        Self {
            earliest: earliest.unwrap_or_else(|| PrimitiveDateTime::MIN.assume_utc()),
            latest: latest.unwrap_or_else(|| PrimitiveDateTime::MAX.assume_utc()),
        }
    }
}

/// A compiled property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertySchema {
    /// Property and column name.
    pub name: String,
    /// Declared type.
    pub ty: PropertyType,
    /// Type family.
    pub semantic: SemanticType,
    /// Logical deletion flag.
    pub soft_delete: bool,
    /// Full-text searchable.
    pub searchable: bool,
    /// Orders results when no sort is requested.
    pub default_sort: bool,
    /// Present when a string length restriction was declared.
    pub string_bounds: Option<StringBounds>,
    /// Present when a number range restriction was declared.
    pub numeric_bounds: Option<NumericBounds>,
    /// Present when a date range restriction was declared.
    pub date_bounds: Option<DateBounds>,
}

impl PropertySchema {
    /// A plain property without markers or bounds.
    ///
    /// Returns `None` for collection types, which have no column form.
    pub fn plain(name: impl Into<String>, ty: PropertyType) -> Option<Self> {
        let semantic = ty.semantic()?;
        Some(Self {
            name: name.into(),
            ty,
            semantic,
            soft_delete: false,
            searchable: false,
            default_sort: false,
            string_bounds: None,
            numeric_bounds: None,
            date_bounds: None,
        })
    }

    /// Checks a value against the declared type and bounds.
    ///
    /// Null is always accepted.
    pub fn check(&self, value: &Value) -> Result<(), String> {
        match (self.semantic, value) {
            (_, Value::Null) => Ok(()),
            (SemanticType::String, Value::String(s)) => {
                let Some(bounds) = self.string_bounds else {
                    return Ok(());
                };
                let chars = s.chars().count() as u64;
                if chars < u64::from(bounds.min_chars) || chars > u64::from(bounds.max_chars) {
                    return Err(format!(
                        "length {chars} outside {}..={}",
                        bounds.min_chars, bounds.max_chars
                    ));
                }
                Ok(())
            }
            (SemanticType::Int, Value::Int(_))
            | (SemanticType::Float, Value::Int(_))
            | (SemanticType::Float, Value::Float(_)) => {
                let Some(bounds) = self.numeric_bounds else {
                    return Ok(());
                };
                let n = match value {
                    Value::Int(v) => *v as f64,
                    Value::Float(v) => *v,
                    _ => return Ok(()),
                };
                if n < bounds.min || n > bounds.max {
                    return Err(format!("{n} outside {}..={}", bounds.min, bounds.max));
                }
                Ok(())
            }
            (SemanticType::Bool, Value::Bool(_)) => Ok(()),
            (SemanticType::Date, Value::Date(d)) => {
                let Some(bounds) = self.date_bounds else {
                    return Ok(());
                };
                if *d < bounds.earliest || *d > bounds.latest {
                    return Err(format!("{value} outside the allowed date range"));
                }
                Ok(())
            }
            (_, other) => Err(format!(
                "expected {} value, got {}",
                self.ty,
                other.type_name()
            )),
        }
    }
}

/// A compiled pawn.
#[derive(Clone, Debug, PartialEq)]
pub struct ContainerSchema {
    /// Logical pawn name.
    pub logical_name: String,
    /// Encoded storage name.
    pub storage_name: String,
    /// Properties in declaration order.
    pub properties: Vec<PropertySchema>,
}

impl ContainerSchema {
    /// Builds a container directly from parts.
    pub fn new(
        logical_name: impl Into<String>,
        storage_name: impl Into<String>,
        properties: Vec<PropertySchema>,
    ) -> Self {
        Self {
            logical_name: logical_name.into(),
            storage_name: storage_name.into(),
            properties,
        }
    }

    /// Looks up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// The soft-delete flag, if declared.
    pub fn soft_delete_property(&self) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.soft_delete)
    }

    /// The default sort property, if declared.
    pub fn default_sort_property(&self) -> Option<&PropertySchema> {
        self.properties.iter().find(|p| p.default_sort)
    }
}

/// The back-reference side of a relation declared from both endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InverseEnd {
    /// Field name on the target pawn.
    pub field: String,
    /// Minimum connections seen from the target.
    pub min_connections: u32,
    /// Maximum connections seen from the target.
    pub max_connections: u32,
}

/// Which endpoint of a relation a field sits on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelationSide {
    /// The declaring pawn.
    Source,
    /// The pawn declaring the inverse field.
    Target,
}

/// A compiled relation between two containers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationSchema {
    /// Encoded relation name; also the join table name.
    pub name: String,
    /// Disambiguating multiplexer, empty when unused.
    pub multiplexer: String,
    /// Logical name of the declaring pawn.
    pub source_container: String,
    /// Storage name of the declaring pawn's container.
    pub source_storage: String,
    /// Logical name of the target pawn.
    pub target_container: String,
    /// Storage name of the target pawn's container.
    pub target_storage: String,
    /// Field on the declaring pawn.
    pub source_field: String,
    /// Minimum connections from the source.
    pub min_connections: u32,
    /// Maximum connections from the source.
    pub max_connections: u32,
    /// Present when the target declares the same relation back.
    pub inverse: Option<InverseEnd>,
}

impl RelationSchema {
    /// True if either endpoint stores into `storage_name`.
    pub fn touches(&self, storage_name: &str) -> bool {
        self.source_storage == storage_name || self.target_storage == storage_name
    }

    /// Resolves which side `pawn.field` belongs to.
    pub fn side_of(&self, pawn: &str, field: &str) -> Option<RelationSide> {
        if self.source_container == pawn && self.source_field == field {
            return Some(RelationSide::Source);
        }
        match &self.inverse {
            Some(inverse) if self.target_container == pawn && inverse.field == field => {
                Some(RelationSide::Target)
            }
            _ => None,
        }
    }
}
