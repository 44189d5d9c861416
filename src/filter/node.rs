//! Translated filter trees and their in-memory evaluation.
#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;

use crate::types::{Record, Value};

/// Comparison operator of a filter leaf.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    /// Equal.
    Eq,
    /// Not equal.
    NotEq,
    /// Greater than.
    Gt,
    /// Less than.
    Lt,
    /// Greater than or equal.
    Ge,
    /// Less than or equal.
    Le,
}

impl ComparisonOp {
    /// SQL spelling of the operator.
    pub fn sql(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Lt => "<",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Le => "<=",
        }
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::Ge => ordering != Ordering::Less,
            ComparisonOp::Le => ordering != Ordering::Greater,
        }
    }
}

/// Connective of a filter branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Connective {
    /// Both sides hold.
    And,
    /// Either side holds.
    Or,
}

impl Connective {
    /// SQL spelling of the connective.
    pub fn sql(self) -> &'static str {
        match self {
            Connective::And => "AND",
            Connective::Or => "OR",
        }
    }
}

/// A single property comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct FilterLeaf {
    /// Compared property.
    pub property: String,
    /// Operator.
    pub op: ComparisonOp,
    /// Literal operand, evaluated when the filter was built.
    pub value: Value,
}

/// Portable binary filter tree. Only leaves carry comparisons.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterNode {
    /// A comparison.
    Leaf(FilterLeaf),
    /// Two subtrees joined by a connective.
    Branch {
        /// Connective.
        connective: Connective,
        /// Left subtree.
        left: Box<FilterNode>,
        /// Right subtree.
        right: Box<FilterNode>,
    },
}

impl FilterNode {
    /// Builds a leaf.
    pub fn leaf(property: impl Into<String>, op: ComparisonOp, value: impl Into<Value>) -> Self {
        FilterNode::Leaf(FilterLeaf {
            property: property.into(),
            op,
            value: value.into(),
        })
    }

    /// Builds a branch.
    pub fn branch(connective: Connective, left: FilterNode, right: FilterNode) -> Self {
        FilterNode::Branch {
            connective,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// `self AND other`.
    pub fn and(self, other: FilterNode) -> Self {
        Self::branch(Connective::And, self, other)
    }

    /// `self OR other`.
    pub fn or(self, other: FilterNode) -> Self {
        Self::branch(Connective::Or, self, other)
    }

    /// Visits the leaves left to right.
    pub fn leaves(&self) -> Vec<&FilterLeaf> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a FilterLeaf>) {
        match self {
            FilterNode::Leaf(leaf) => out.push(leaf),
            FilterNode::Branch { left, right, .. } => {
                left.collect_leaves(out);
                right.collect_leaves(out);
            }
        }
    }

    /// Evaluates the filter against an in-memory record.
    ///
    /// A missing column reads as null. Nulls follow the SQL rendering: a null
    /// literal only answers `Eq` (`IS NULL`) and `NotEq` (`IS NOT NULL`), and
    /// a null column fails every comparison against a non-null literal.
    /// Incomparable non-null operands only satisfy `NotEq`.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            FilterNode::Leaf(leaf) => {
                let actual = record.get(&leaf.property).unwrap_or(&Value::Null);
                match (actual, &leaf.value) {
                    (_, Value::Null) => match leaf.op {
                        ComparisonOp::Eq => actual.is_null(),
                        ComparisonOp::NotEq => !actual.is_null(),
                        _ => false,
                    },
                    (Value::Null, _) => false,
                    _ => match actual.compare(&leaf.value) {
                        Some(ordering) => leaf.op.holds(ordering),
                        None => leaf.op == ComparisonOp::NotEq,
                    },
                }
            }
            FilterNode::Branch {
                connective: Connective::And,
                left,
                right,
            } => left.matches(record) && right.matches(record),
            FilterNode::Branch {
                connective: Connective::Or,
                left,
                right,
            } => left.matches(record) || right.matches(record),
        }
    }
}

impl fmt::Display for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterNode::Leaf(leaf) => {
                write!(f, "({} {} {})", leaf.property, leaf.op.sql(), leaf.value)
            }
            FilterNode::Branch {
                connective,
                left,
                right,
            } => write!(f, "({left} {} {right})", connective.sql()),
        }
    }
}
