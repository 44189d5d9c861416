//! Pawnstore maps declaratively described application types ("pawns") onto
//! relational storage.
//!
//! The pipeline runs in this order: descriptors are compiled into a schema
//! graph ([`compiler`]), the schema is reconciled with storage ([`sync`]),
//! predicates become portable filter trees ([`filter`]) that a backend
//! builder renders into statements ([`query`]), and results come back
//! through paged cursors ([`storage`]). [`session`] ties the pieces into a
//! unit of work.

#![warn(missing_docs)]

pub mod compiler;
pub mod filter;
pub mod model;
pub mod query;
pub mod session;
pub mod storage;
pub mod sync;
pub mod types;

pub use compiler::{compile_graph, CompiledGraph, GraphCompiler};
pub use session::{FindOptions, Pawn, Session, SessionOptions, Tracked};
pub use types::{PawnError, Result};
