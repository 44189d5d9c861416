//! Shared value, record and error types.
#![forbid(unsafe_code)]

pub mod error;
pub mod record;
pub mod value;

pub use error::{
    ErrorKind, FilterError, ModelError, PawnError, Result, SessionError, StorageError, SyncError,
};
pub use record::Record;
pub use value::Value;
