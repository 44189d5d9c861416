//! Attribute and constraint resolution for one pawn.
#![forbid(unsafe_code)]

use std::collections::HashSet;

use crate::model::{
    ContainerSchema, DateBounds, NamingEncoder, NumericBounds, PawnDescriptor, PropertyAttribute,
    PropertyDescriptor, PropertySchema, PropertyType, SemanticType, StringBounds,
};
use crate::types::ModelError;

/// Column name reserved for the primary key.
pub const PRIMARY_KEY: &str = "Id";

/// Derives the container schema of one pawn.
pub fn resolve_container(
    pawn: &PawnDescriptor,
    encoder: &dyn NamingEncoder,
) -> Result<ContainerSchema, ModelError> {
    let mut seen = HashSet::new();
    let mut soft_delete: Option<String> = None;
    let mut default_sort: Option<String> = None;
    let mut properties = Vec::with_capacity(pawn.properties.len());

    for descriptor in &pawn.properties {
        let Some(mut schema) = PropertySchema::plain(descriptor.name.clone(), descriptor.ty.clone())
        else {
            return Err(ModelError::DisallowedProperty {
                pawn: pawn.name.clone(),
                property: descriptor.name.clone(),
                found: descriptor.ty.to_string(),
            });
        };
        if descriptor.name.eq_ignore_ascii_case(PRIMARY_KEY) {
            return Err(ModelError::ReservedPropertyName {
                pawn: pawn.name.clone(),
                property: descriptor.name.clone(),
            });
        }
        if !seen.insert(descriptor.name.as_str()) {
            return Err(ModelError::DuplicateProperty {
                pawn: pawn.name.clone(),
                property: descriptor.name.clone(),
            });
        }
        for attribute in &descriptor.attributes {
            apply_attribute(
                &pawn.name,
                descriptor,
                attribute,
                &mut schema,
                &mut soft_delete,
                &mut default_sort,
            )?;
        }
        properties.push(schema);
    }

    Ok(ContainerSchema::new(
        pawn.name.clone(),
        encoder.encode_container_name(&pawn.name),
        properties,
    ))
}

fn apply_attribute(
    pawn: &str,
    descriptor: &PropertyDescriptor,
    attribute: &PropertyAttribute,
    schema: &mut PropertySchema,
    soft_delete: &mut Option<String>,
    default_sort: &mut Option<String>,
) -> Result<(), ModelError> {
    let found = || descriptor.ty.to_string();
    match attribute {
        PropertyAttribute::SoftDelete => {
            if schema.semantic != SemanticType::Bool {
                return Err(ModelError::InvalidSoftDeleteType {
                    pawn: pawn.to_owned(),
                    property: descriptor.name.clone(),
                    found: found(),
                });
            }
            if let Some(first) = soft_delete {
                return Err(ModelError::DuplicateSoftDeleteFlag {
                    pawn: pawn.to_owned(),
                    first: first.clone(),
                    second: descriptor.name.clone(),
                });
            }
            *soft_delete = Some(descriptor.name.clone());
            schema.soft_delete = true;
        }
        PropertyAttribute::FullTextSearch => {
            if schema.semantic != SemanticType::String {
                return Err(ModelError::InvalidSearchAttribute {
                    pawn: pawn.to_owned(),
                    property: descriptor.name.clone(),
                    found: found(),
                });
            }
            schema.searchable = true;
        }
        PropertyAttribute::DefaultSort => {
            if schema.semantic == SemanticType::Date {
                return Err(ModelError::InvalidDefaultSort {
                    pawn: pawn.to_owned(),
                    property: descriptor.name.clone(),
                    found: found(),
                });
            }
            if let Some(first) = default_sort {
                return Err(ModelError::DuplicateDefaultSort {
                    pawn: pawn.to_owned(),
                    first: first.clone(),
                    second: descriptor.name.clone(),
                });
            }
            *default_sort = Some(descriptor.name.clone());
            schema.default_sort = true;
        }
        PropertyAttribute::StringLength { min, max } => {
            require_restriction(pawn, descriptor, attribute, schema.semantic == SemanticType::String)?;
            schema.string_bounds = Some(StringBounds {
                min_chars: *min,
                max_chars: if *max == 0 { u32::MAX } else { *max },
            });
        }
        PropertyAttribute::NumberRange { min, max } => {
            require_restriction(pawn, descriptor, attribute, descriptor.ty.is_numeric())?;
            schema.numeric_bounds = Some(NumericBounds {
                min: *min,
                max: if *max == 0.0 {
                    descriptor.ty.numeric_max()
                } else {
                    *max
                },
            });
        }
        PropertyAttribute::DateRange { earliest, latest } => {
            require_restriction(pawn, descriptor, attribute, descriptor.ty == PropertyType::Date)?;
            schema.date_bounds = Some(DateBounds::resolve(*earliest, *latest));
        }
    }
    Ok(())
}

fn require_restriction(
    pawn: &str,
    descriptor: &PropertyDescriptor,
    attribute: &PropertyAttribute,
    matches: bool,
) -> Result<(), ModelError> {
    if matches {
        return Ok(());
    }
    Err(ModelError::InvalidRestriction {
        pawn: pawn.to_owned(),
        property: descriptor.name.clone(),
        restriction: attribute.restriction_name().unwrap_or("unknown"),
        found: descriptor.ty.to_string(),
    })
}
