//! Predicate builder.
//!
//! A [`Predicate`] is the application-facing description of a query
//! condition over one pawn. It can express more than a filter tree can
//! (nested accessors, calls, constants); the translator decides what is
//! acceptable.
//!
//! ```
//! use pawnstore::filter::prop;
//!
//! let p = prop("Date").gt(10i64).and(prop("Name").eq("x")).or(prop("Date").lt(2i64));
//! assert!(p.is_or());
//! ```
#![forbid(unsafe_code)]

use super::node::ComparisonOp;
use crate::types::Value;

/// One side of a comparison.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Direct property of the pawn.
    Property(String),
    /// Property reached through other members (`a.b.c`).
    Path(Vec<String>),
    /// Function or method call.
    Call {
        /// Callee name.
        name: String,
        /// Arguments.
        args: Vec<Operand>,
    },
    /// Already evaluated literal.
    Literal(Value),
}

/// Direct property operand.
pub fn prop(name: impl Into<String>) -> Operand {
    Operand::Property(name.into())
}

/// Nested accessor operand.
pub fn path<I, S>(segments: I) -> Operand
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Operand::Path(segments.into_iter().map(Into::into).collect())
}

/// Call operand.
pub fn call(name: impl Into<String>, args: Vec<Operand>) -> Operand {
    Operand::Call {
        name: name.into(),
        args,
    }
}

/// Literal operand.
pub fn lit(value: impl Into<Value>) -> Operand {
    Operand::Literal(value.into())
}

impl Operand {
    /// Compares against another operand.
    pub fn compare(self, op: ComparisonOp, right: Operand) -> Predicate {
        Predicate::Compare {
            left: self,
            op,
            right,
        }
    }

    /// `self == value`.
    pub fn eq<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(ComparisonOp::Eq, lit(value))
    }

    /// `self != value`.
    pub fn ne<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(ComparisonOp::NotEq, lit(value))
    }

    /// `self > value`.
    pub fn gt<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(ComparisonOp::Gt, lit(value))
    }

    /// `self < value`.
    pub fn lt<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(ComparisonOp::Lt, lit(value))
    }

    /// `self >= value`.
    pub fn ge<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(ComparisonOp::Ge, lit(value))
    }

    /// `self <= value`.
    pub fn le<V: Into<Value>>(self, value: V) -> Predicate {
        self.compare(ComparisonOp::Le, lit(value))
    }
}

/// Boolean condition over one pawn.
#[derive(Clone, Debug, PartialEq)]
pub enum Predicate {
    /// Binary comparison.
    Compare {
        /// Left operand.
        left: Operand,
        /// Operator.
        op: ComparisonOp,
        /// Right operand.
        right: Operand,
    },
    /// Conjunction.
    And(Box<Predicate>, Box<Predicate>),
    /// Disjunction.
    Or(Box<Predicate>, Box<Predicate>),
    /// Constant truth value.
    Constant(bool),
}

impl Predicate {
    /// `self && other`.
    pub fn and(self, other: Predicate) -> Predicate {
        Predicate::And(Box::new(self), Box::new(other))
    }

    /// `self || other`.
    pub fn or(self, other: Predicate) -> Predicate {
        Predicate::Or(Box::new(self), Box::new(other))
    }

    /// Constant predicate.
    pub fn always(value: bool) -> Predicate {
        Predicate::Constant(value)
    }

    /// True for a disjunction at the root.
    pub fn is_or(&self) -> bool {
        matches!(self, Predicate::Or(..))
    }
}
