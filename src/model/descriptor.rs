//! Declarative pawn descriptors.
//!
//! Applications describe each pawn once, as plain data, and hand the
//! descriptors to the graph compiler:
//!
//! ```
//! use pawnstore::model::{PawnDescriptor, PropertyDescriptor, PropertyType, RelationField};
//!
//! let car = PawnDescriptor::new("Car")
//!     .property(PropertyDescriptor::new("Model", PropertyType::String).searchable())
//!     .property(PropertyDescriptor::new("Doors", PropertyType::Int32).number_range(2.0, 5.0))
//!     .relation(RelationField::many("FrontWheels", "Wheel").multiplexer("front"))
//!     .relation(RelationField::many("BackWheels", "Wheel"));
//! assert_eq!(car.relations.len(), 2);
//! ```
#![forbid(unsafe_code)]

use std::fmt;

use time::OffsetDateTime;

/// Declared type of a pawn property.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PropertyType {
    /// UTF-8 text.
    String,
    /// 8-bit signed integer.
    Int8,
    /// 16-bit signed integer.
    Int16,
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 8-bit unsigned integer.
    UInt8,
    /// 16-bit unsigned integer.
    UInt16,
    /// 32-bit unsigned integer.
    UInt32,
    /// 64-bit unsigned integer.
    UInt64,
    /// Single precision float.
    Float32,
    /// Double precision float.
    Float64,
    /// Decimal number, stored as a double.
    Decimal,
    /// Boolean.
    Bool,
    /// UTC timestamp.
    Date,
    /// Collection of another type. Never accepted as a property.
    Collection(Box<PropertyType>),
}

/// The storage-facing type family of a property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SemanticType {
    /// Text.
    String,
    /// Any integer width.
    Int,
    /// Any floating point or decimal.
    Float,
    /// Boolean.
    Bool,
    /// Timestamp.
    Date,
}

impl PropertyType {
    /// Maps the declared type to its family; `None` for collections.
    pub fn semantic(&self) -> Option<SemanticType> {
        Some(match self {
            PropertyType::String => SemanticType::String,
            PropertyType::Int8
            | PropertyType::Int16
            | PropertyType::Int32
            | PropertyType::Int64
            | PropertyType::UInt8
            | PropertyType::UInt16
            | PropertyType::UInt32
            | PropertyType::UInt64 => SemanticType::Int,
            PropertyType::Float32 | PropertyType::Float64 | PropertyType::Decimal => {
                SemanticType::Float
            }
            PropertyType::Bool => SemanticType::Bool,
            PropertyType::Date => SemanticType::Date,
            PropertyType::Collection(_) => return None,
        })
    }

    /// True for integer and floating point types.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self.semantic(),
            Some(SemanticType::Int) | Some(SemanticType::Float)
        )
    }

    /// Largest value representable by the type, used for unset numeric maxima.
    pub fn numeric_max(&self) -> f64 {
        match self {
            PropertyType::Int8 => f64::from(i8::MAX),
            PropertyType::Int16 => f64::from(i16::MAX),
            PropertyType::Int32 => f64::from(i32::MAX),
            PropertyType::Int64 => i64::MAX as f64,
            PropertyType::UInt8 => f64::from(u8::MAX),
            PropertyType::UInt16 => f64::from(u16::MAX),
            PropertyType::UInt32 => f64::from(u32::MAX),
            PropertyType::UInt64 => u64::MAX as f64,
            PropertyType::Float32 => f64::from(f32::MAX),
            _ => f64::MAX,
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyType::String => "string",
            PropertyType::Int8 => "i8",
            PropertyType::Int16 => "i16",
            PropertyType::Int32 => "i32",
            PropertyType::Int64 => "i64",
            PropertyType::UInt8 => "u8",
            PropertyType::UInt16 => "u16",
            PropertyType::UInt32 => "u32",
            PropertyType::UInt64 => "u64",
            PropertyType::Float32 => "f32",
            PropertyType::Float64 => "f64",
            PropertyType::Decimal => "decimal",
            PropertyType::Bool => "bool",
            PropertyType::Date => "date",
            PropertyType::Collection(inner) => return write!(f, "collection<{inner}>"),
        };
        f.write_str(name)
    }
}

/// Attribute markers attached to a property.
#[derive(Clone, Debug, PartialEq)]
pub enum PropertyAttribute {
    /// The property flags logical deletion.
    SoftDelete,
    /// The property takes part in full-text search.
    FullTextSearch,
    /// The property orders query results when no sort is given.
    DefaultSort,
    /// Character count bounds. A zero maximum means unbounded.
    StringLength {
        /// Minimum characters.
        min: u32,
        /// Maximum characters, 0 for unbounded.
        max: u32,
    },
    /// Numeric bounds. A zero maximum means the type's maximum.
    NumberRange {
        /// Minimum value.
        min: f64,
        /// Maximum value, 0 for the type maximum.
        max: f64,
    },
    /// Date bounds. Missing ends mean the earliest/latest representable date.
    DateRange {
        /// Earliest allowed date.
        earliest: Option<OffsetDateTime>,
        /// Latest allowed date.
        latest: Option<OffsetDateTime>,
    },
}

impl PropertyAttribute {
    pub(crate) fn restriction_name(&self) -> Option<&'static str> {
        match self {
            PropertyAttribute::StringLength { .. } => Some("string length"),
            PropertyAttribute::NumberRange { .. } => Some("number range"),
            PropertyAttribute::DateRange { .. } => Some("date range"),
            _ => None,
        }
    }
}

/// One declared property of a pawn.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyDescriptor {
    /// Property and column name.
    pub name: String,
    /// Declared type.
    pub ty: PropertyType,
    /// Attribute markers in declaration order.
    pub attributes: Vec<PropertyAttribute>,
}

impl PropertyDescriptor {
    /// Declares a property without attributes.
    pub fn new(name: impl Into<String>, ty: PropertyType) -> Self {
        Self {
            name: name.into(),
            ty,
            attributes: Vec::new(),
        }
    }

    /// Adds an arbitrary attribute.
    pub fn attribute(mut self, attribute: PropertyAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Marks the property as the soft-delete flag.
    pub fn soft_delete(self) -> Self {
        self.attribute(PropertyAttribute::SoftDelete)
    }

    /// Marks the property as full-text searchable.
    pub fn searchable(self) -> Self {
        self.attribute(PropertyAttribute::FullTextSearch)
    }

    /// Marks the property as the default sort column.
    pub fn default_sort(self) -> Self {
        self.attribute(PropertyAttribute::DefaultSort)
    }

    /// Restricts the character count.
    pub fn string_length(self, min: u32, max: u32) -> Self {
        self.attribute(PropertyAttribute::StringLength { min, max })
    }

    /// Restricts the numeric range.
    pub fn number_range(self, min: f64, max: f64) -> Self {
        self.attribute(PropertyAttribute::NumberRange { min, max })
    }

    /// Restricts the date range.
    pub fn date_range(
        self,
        earliest: Option<OffsetDateTime>,
        latest: Option<OffsetDateTime>,
    ) -> Self {
        self.attribute(PropertyAttribute::DateRange { earliest, latest })
    }
}

/// A relation field declared on a pawn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationField {
    /// Field name on the declaring pawn.
    pub field: String,
    /// Logical name of the target pawn.
    pub target: String,
    /// Disambiguates several relations between the same two pawns.
    pub multiplexer: String,
    /// Minimum number of connections.
    pub min: u32,
    /// Maximum number of connections.
    pub max: u32,
}

impl RelationField {
    /// A to-one relation (0..=1).
    pub fn one(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target: target.into(),
            multiplexer: String::new(),
            min: 0,
            max: 1,
        }
    }

    /// A to-many relation (0..=u32::MAX).
    pub fn many(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            max: u32::MAX,
            ..Self::one(field, target)
        }
    }

    /// Sets the multiplexer.
    pub fn multiplexer(mut self, multiplexer: impl Into<String>) -> Self {
        self.multiplexer = multiplexer.into();
        self
    }

    /// Overrides the connection count bounds.
    pub fn bounds(mut self, min: u32, max: u32) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

/// Everything the compiler needs to know about one pawn.
#[derive(Clone, Debug, PartialEq)]
pub struct PawnDescriptor {
    /// Logical pawn name, unique within a pawn set.
    pub name: String,
    /// Properties in declaration order.
    pub properties: Vec<PropertyDescriptor>,
    /// Relation fields in declaration order.
    pub relations: Vec<RelationField>,
}

impl PawnDescriptor {
    /// Starts a descriptor with no members.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Appends a property.
    pub fn property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Appends a relation field.
    pub fn relation(mut self, relation: RelationField) -> Self {
        self.relations.push(relation);
        self
    }
}

/// Supplies pawn descriptors to the compiler.
pub trait DescriptorProvider {
    /// Descriptors in registration order.
    fn descriptors(&self) -> Vec<PawnDescriptor>;
}

impl DescriptorProvider for [PawnDescriptor] {
    fn descriptors(&self) -> Vec<PawnDescriptor> {
        self.to_vec()
    }
}

impl DescriptorProvider for Vec<PawnDescriptor> {
    fn descriptors(&self) -> Vec<PawnDescriptor> {
        self.clone()
    }
}
