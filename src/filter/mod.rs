//! Filter trees and the predicate translator.
#![forbid(unsafe_code)]

mod node;
pub mod predicate;
pub mod translate;

pub use node::{ComparisonOp, Connective, FilterLeaf, FilterNode};
pub use predicate::{call, lit, path, prop, Operand, Predicate};
pub use translate::{translate, with_soft_delete, FilterTranslator};
