//! Metadata model: descriptors supplied by the application, the compiled
//! schema derived from them, and the naming encoders that map one to the
//! other.
#![forbid(unsafe_code)]

pub mod descriptor;
pub mod naming;
pub mod schema;

pub use descriptor::{
    DescriptorProvider, PawnDescriptor, PropertyAttribute, PropertyDescriptor, PropertyType,
    RelationField, SemanticType,
};
pub use naming::{HashingNamingEncoder, NamingEncoder, PlainNamingEncoder};
pub use schema::{
    ContainerSchema, DateBounds, InverseEnd, NumericBounds, PropertySchema, RelationSchema,
    RelationSide, StringBounds,
};
