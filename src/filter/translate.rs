//! Predicate to filter tree translation.
#![forbid(unsafe_code)]

use tracing::trace;

use super::node::{Connective, FilterNode};
use super::predicate::{Operand, Predicate};
use crate::compiler::PRIMARY_KEY;
use crate::model::ContainerSchema;
use crate::types::FilterError;

/// Converts a predicate into a filter tree.
///
/// Comparisons must have a bare property on the left and a literal on the
/// right. Connectives recurse into both sides.
pub fn translate(predicate: &Predicate) -> Result<FilterNode, FilterError> {
    match predicate {
        Predicate::Compare { left, op, right } => {
            let property = match left {
                Operand::Property(name) if !name.is_empty() => name.clone(),
                other => {
                    return Err(FilterError::malformed(format!(
                        "left operand must be a bare property access, found {}",
                        describe(other)
                    )))
                }
            };
            let Operand::Literal(value) = right else {
                return Err(FilterError::malformed(format!(
                    "right operand of '{property}' must be a literal, found {}",
                    describe(right)
                )));
            };
            Ok(FilterNode::leaf(property, *op, value.clone()))
        }
        Predicate::And(left, right) => Ok(FilterNode::branch(
            Connective::And,
            translate(left)?,
            translate(right)?,
        )),
        Predicate::Or(left, right) => Ok(FilterNode::branch(
            Connective::Or,
            translate(left)?,
            translate(right)?,
        )),
        Predicate::Constant(value) => Err(FilterError::malformed(format!(
            "constant predicate '{value}' has no property comparison"
        ))),
    }
}

fn describe(operand: &Operand) -> String {
    match operand {
        Operand::Property(name) if name.is_empty() => "an empty property name".to_owned(),
        Operand::Property(name) => format!("property '{name}'"),
        Operand::Path(segments) => format!("nested accessor '{}'", segments.join(".")),
        Operand::Call { name, .. } => format!("call to '{name}'"),
        Operand::Literal(value) => format!("literal {value}"),
    }
}

/// AND-combines a filter with the container's soft-delete leaf.
///
/// The synthesized leaf selects rows whose soft-delete flag equals
/// `include_deleted`. Containers without a flag pass the filter through.
pub fn with_soft_delete(
    container: &ContainerSchema,
    filter: Option<FilterNode>,
    include_deleted: bool,
) -> Option<FilterNode> {
    let Some(flag) = container.soft_delete_property() else {
        return filter;
    };
    let leaf = FilterNode::leaf(flag.name.clone(), super::ComparisonOp::Eq, include_deleted);
    Some(match filter {
        Some(filter) => filter.and(leaf),
        None => leaf,
    })
}

/// Translates predicates for one container.
#[derive(Clone, Copy, Debug)]
pub struct FilterTranslator<'a> {
    container: &'a ContainerSchema,
}

impl<'a> FilterTranslator<'a> {
    /// Binds the translator to a container.
    pub fn new(container: &'a ContainerSchema) -> Self {
        Self { container }
    }

    /// Translates, checks every leaf names a known column and applies the
    /// soft-delete leaf.
    pub fn translate(
        &self,
        predicate: Option<&Predicate>,
        include_deleted: bool,
    ) -> Result<Option<FilterNode>, FilterError> {
        let filter = predicate.map(translate).transpose()?;
        if let Some(filter) = &filter {
            self.check_properties(filter)?;
        }
        let filter = with_soft_delete(self.container, filter, include_deleted);
        trace!(
            container = %self.container.logical_name,
            filter = ?filter.as_ref().map(ToString::to_string),
            "filter.translate.done"
        );
        Ok(filter)
    }

    fn check_properties(&self, filter: &FilterNode) -> Result<(), FilterError> {
        for leaf in filter.leaves() {
            if leaf.property != PRIMARY_KEY && self.container.property(&leaf.property).is_none() {
                return Err(FilterError::UnknownProperty {
                    pawn: self.container.logical_name.clone(),
                    property: leaf.property.clone(),
                });
            }
        }
        Ok(())
    }
}
