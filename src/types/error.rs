//! Error types for every layer, folded into [`PawnError`].
#![forbid(unsafe_code)]
#![allow(missing_docs)]

use thiserror::Error;

/// Errors raised while compiling pawn descriptors into a schema graph.
///
/// Compilation aborts on the first one of these; no partial graph is kept.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// No pawn descriptors were supplied.
    #[error("cannot compile an empty pawn set")]
    EmptyPawnSet,
    /// Two descriptors share a logical pawn name.
    #[error("pawn '{name}' is declared more than once")]
    DuplicatePawnName { name: String },
    /// Collection-typed property other than string.
    #[error("property '{pawn}.{property}' has collection type {found}; use a relation instead")]
    DisallowedProperty {
        pawn: String,
        property: String,
        found: String,
    },
    /// Two properties of one pawn share a name.
    #[error("property '{pawn}.{property}' is declared more than once")]
    DuplicateProperty { pawn: String, property: String },
    /// Property name collides with the primary key column.
    #[error("property '{pawn}.{property}' uses a reserved name")]
    ReservedPropertyName { pawn: String, property: String },
    /// More than one soft-delete marker on one pawn.
    #[error("pawn '{pawn}' marks both '{first}' and '{second}' as soft-delete flags")]
    DuplicateSoftDeleteFlag {
        pawn: String,
        first: String,
        second: String,
    },
    /// Soft-delete marker on a non-boolean property.
    #[error("soft-delete flag '{pawn}.{property}' must be bool (got {found})")]
    InvalidSoftDeleteType {
        pawn: String,
        property: String,
        found: String,
    },
    /// Full-text-search marker on a non-string property.
    #[error("full-text search on '{pawn}.{property}' requires a string (got {found})")]
    InvalidSearchAttribute {
        pawn: String,
        property: String,
        found: String,
    },
    /// Restriction attribute does not match the property type.
    #[error("{restriction} restriction cannot apply to '{pawn}.{property}' of type {found}")]
    InvalidRestriction {
        pawn: String,
        property: String,
        restriction: &'static str,
        found: String,
    },
    /// Default-sort marker on a type that cannot be ordered in storage.
    #[error("default sort on '{pawn}.{property}' requires a string, number or bool (got {found})")]
    InvalidDefaultSort {
        pawn: String,
        property: String,
        found: String,
    },
    /// More than one default-sort marker on one pawn.
    #[error("pawn '{pawn}' marks both '{first}' and '{second}' as default sort")]
    DuplicateDefaultSort {
        pawn: String,
        first: String,
        second: String,
    },
    /// Relation field points at a pawn outside the compiled set.
    #[error("relation '{pawn}.{field}' targets unknown pawn '{target}'")]
    UnknownRelationTarget {
        pawn: String,
        field: String,
        target: String,
    },
    /// Relation minimum exceeds its maximum.
    #[error("relation '{pawn}.{field}' has min {min} greater than max {max}")]
    InvalidRelationBounds {
        pawn: String,
        field: String,
        min: u32,
        max: u32,
    },
    /// Two relation fields of one pawn encode to the same relation name.
    #[error(
        "relations '{pawn}.{first}' and '{pawn}.{second}' both resolve to '{relation}'; add a distinct multiplexer"
    )]
    DuplicateRelation {
        pawn: String,
        relation: String,
        first: String,
        second: String,
    },
    /// More than two declarations merge onto one relation.
    #[error("relation '{relation}' is declared again by '{pawn}.{field}'; add a distinct multiplexer")]
    AmbiguousRelation {
        relation: String,
        pawn: String,
        field: String,
    },
    /// Two compiled items encode to one storage name.
    #[error("storage name '{storage_name}' is produced by both '{first}' and '{second}'")]
    StorageNameCollision {
        storage_name: String,
        first: String,
        second: String,
    },
}

impl ModelError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            ModelError::EmptyPawnSet => "EmptyPawnSet",
            ModelError::DuplicatePawnName { .. } => "DuplicatePawnName",
            ModelError::DisallowedProperty { .. } => "DisallowedProperty",
            ModelError::DuplicateProperty { .. } => "DuplicateProperty",
            ModelError::ReservedPropertyName { .. } => "ReservedPropertyName",
            ModelError::DuplicateSoftDeleteFlag { .. } => "DuplicateSoftDeleteFlag",
            ModelError::InvalidSoftDeleteType { .. } => "InvalidSoftDeleteType",
            ModelError::InvalidSearchAttribute { .. } => "InvalidSearchAttribute",
            ModelError::InvalidRestriction { .. } => "InvalidRestriction",
            ModelError::InvalidDefaultSort { .. } => "InvalidDefaultSort",
            ModelError::DuplicateDefaultSort { .. } => "DuplicateDefaultSort",
            ModelError::UnknownRelationTarget { .. } => "UnknownRelationTarget",
            ModelError::InvalidRelationBounds { .. } => "InvalidRelationBounds",
            ModelError::DuplicateRelation { .. } => "DuplicateRelation",
            ModelError::AmbiguousRelation { .. } => "AmbiguousRelation",
            ModelError::StorageNameCollision { .. } => "StorageNameCollision",
        }
    }
}

/// Errors raised while turning a predicate into a filter tree.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Predicate shape cannot be expressed as a filter tree.
    #[error("malformed filter: {reason}")]
    Malformed { reason: String },
    /// Leaf references a property the pawn does not declare.
    #[error("filter references unknown property '{pawn}.{property}'")]
    UnknownProperty { pawn: String, property: String },
}

impl FilterError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        FilterError::Malformed {
            reason: reason.into(),
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            FilterError::Malformed { .. } => "MalformedFilter",
            FilterError::UnknownProperty { .. } => "UnknownFilterProperty",
        }
    }
}

/// Errors raised while planning a schema synchronization, before any DDL runs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The compiled model has no containers.
    #[error("compiled model has no containers to synchronize")]
    EmptyModel,
    /// A container removal is blocked by a relation that stays in storage.
    #[error("cannot remove container '{container}' while relation '{relation}' still references it")]
    RemovalBlocked { container: String, relation: String },
    /// A planned addition has no counterpart in the compiled model.
    #[error("plan adds '{name}' but the compiled model does not define it")]
    UnknownPlanItem { name: String },
}

impl SyncError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::EmptyModel => "EmptyModel",
            SyncError::RemovalBlocked { .. } => "RemovalBlocked",
            SyncError::UnknownPlanItem { .. } => "UnknownPlanItem",
        }
    }
}

/// Storage backend failures.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite driver error.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Failure reported by a non-SQLite backend.
    #[error("storage backend failure: {0}")]
    Backend(String),
    /// Row could not be decoded into the requested value.
    #[error("cannot decode column '{column}': {reason}")]
    Decode { column: String, reason: String },
}

impl StorageError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Sqlite(_) => "Sqlite",
            StorageError::Backend(_) => "Backend",
            StorageError::Decode { .. } => "Decode",
        }
    }
}

/// Errors raised by session bookkeeping.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation requires a compiled graph but none is registered.
    #[error("no pawns registered with the session")]
    NotCompiled,
    /// Pawn type was never registered.
    #[error("pawn '{pawn}' is not registered with the session")]
    PawnNotRegistered { pawn: String },
    /// Relation field does not exist on the pawn.
    #[error("pawn '{pawn}' has no relation field '{field}'")]
    UnknownRelation { pawn: String, field: String },
    /// Pawn declares no soft-delete flag.
    #[error("pawn '{pawn}' has no soft-delete flag")]
    NoSoftDeleteFlag { pawn: String },
    /// Identity is not known to the session.
    #[error("identity {identity} is not tracked for pawn '{pawn}'")]
    UnknownIdentity { pawn: String, identity: String },
    /// Record could not be turned back into a pawn.
    #[error("cannot decode pawn '{pawn}': {reason}")]
    Decode { pawn: String, reason: String },
    /// Value violates the declared type or bounds of its property.
    #[error("value of '{pawn}.{property}' rejected: {reason}")]
    ConstraintViolation {
        pawn: String,
        property: String,
        reason: String,
    },
    /// The other endpoint of a relation field is a different pawn.
    #[error("relation '{pawn}.{field}' connects to '{expected}', not '{found}'")]
    WrongRelationTarget {
        pawn: String,
        field: String,
        expected: String,
        found: String,
    },
}

impl SessionError {
    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::NotCompiled => "NotCompiled",
            SessionError::PawnNotRegistered { .. } => "PawnNotRegistered",
            SessionError::UnknownRelation { .. } => "UnknownRelation",
            SessionError::NoSoftDeleteFlag { .. } => "NoSoftDeleteFlag",
            SessionError::UnknownIdentity { .. } => "UnknownIdentity",
            SessionError::Decode { .. } => "DecodeFailed",
            SessionError::ConstraintViolation { .. } => "ConstraintViolation",
            SessionError::WrongRelationTarget { .. } => "WrongRelationTarget",
        }
    }
}

/// Coarse classification of [`PawnError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Model validation; fix the descriptors and recompile.
    Model,
    /// Predicate shape; supply a conforming filter.
    Filter,
    /// Sync planning; nothing was executed.
    Sync,
    /// Backend I/O; the operation was reverted and may be retried.
    Storage,
    /// Session misuse.
    Session,
    /// Caller cancelled or the deadline passed.
    Cancelled,
    /// Options could not be loaded.
    Config,
}

/// Crate-wide error.
#[derive(Debug, Error)]
pub enum PawnError {
    /// Model validation failure.
    #[error(transparent)]
    Model(#[from] ModelError),
    /// Filter translation failure.
    #[error(transparent)]
    Filter(#[from] FilterError),
    /// Sync planning failure.
    #[error(transparent)]
    Sync(#[from] SyncError),
    /// Storage backend failure.
    #[error(transparent)]
    Storage(#[from] StorageError),
    /// Session bookkeeping failure.
    #[error(transparent)]
    Session(#[from] SessionError),
    /// Operation observed a tripped cancel token.
    #[error("operation cancelled: {0}")]
    Cancelled(&'static str),
    /// Options could not be parsed or read.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for PawnError {
    fn from(err: rusqlite::Error) -> Self {
        PawnError::Storage(StorageError::Sqlite(err))
    }
}

impl PawnError {
    /// Returns the coarse classification of the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PawnError::Model(_) => ErrorKind::Model,
            PawnError::Filter(_) => ErrorKind::Filter,
            PawnError::Sync(_) => ErrorKind::Sync,
            PawnError::Storage(_) => ErrorKind::Storage,
            PawnError::Session(_) => ErrorKind::Session,
            PawnError::Cancelled(_) => ErrorKind::Cancelled,
            PawnError::Config(_) => ErrorKind::Config,
        }
    }

    /// Returns a machine-readable code for the error variant.
    pub fn code(&self) -> &'static str {
        match self {
            PawnError::Model(err) => err.code(),
            PawnError::Filter(err) => err.code(),
            PawnError::Sync(err) => err.code(),
            PawnError::Storage(err) => err.code(),
            PawnError::Session(err) => err.code(),
            PawnError::Cancelled(_) => "Cancelled",
            PawnError::Config(_) => "Config",
        }
    }

    /// Storage failures leave no partial state behind and can be retried as-is.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PawnError::Storage(_))
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PawnError>;
