//! Values handed out by a session together with their identity.
#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use super::pawn::Pawn;
use crate::storage::{Identified, Identity};
use crate::types::Record;

/// A pawn value together with its identity and the record it was loaded as.
///
/// Mutate through `DerefMut`, then hand the wrapper to
/// `Session::stage_update`; [`Tracked::changes`] diffs on demand.
#[derive(Clone, Debug, PartialEq)]
pub struct Tracked<T> {
    identity: Identity,
    original: Record,
    current: T,
}

impl<T: Pawn> Tracked<T> {
    pub(crate) fn unsaved(slot: u64, current: T) -> Self {
        Self {
            identity: Identity::Local(slot),
            original: Record::new(),
            current,
        }
    }

    pub(crate) fn stored(id: i64, current: T) -> Self {
        Self {
            identity: Identity::Stored(id),
            original: current.to_record(),
            current,
        }
    }

    pub(crate) fn with_original(identity: Identity, original: Record, current: T) -> Self {
        Self {
            identity,
            original,
            current,
        }
    }

    /// Identity in storage or in the session.
    pub fn identity(&self) -> Identity {
        self.identity
    }

    /// Record as last loaded or persisted.
    pub fn original(&self) -> &Record {
        &self.original
    }

    /// Columns whose current value differs from [`Tracked::original`].
    ///
    /// For unsaved values this is every column.
    pub fn changes(&self) -> Record {
        diff_records(&self.original, &self.current.to_record())
    }

    /// True when [`Tracked::changes`] is not empty.
    pub fn is_dirty(&self) -> bool {
        !self.changes().is_empty()
    }

    /// Takes the identity assigned by a persist and resets the baseline.
    ///
    /// Returns `false` when the report does not cover this value.
    pub fn mark_persisted(&mut self, assigned: &BTreeMap<u64, i64>) -> bool {
        let id = match self.identity {
            Identity::Stored(id) => id,
            Identity::Local(slot) => match assigned.get(&slot) {
                Some(id) => *id,
                None => return false,
            },
        };
        self.identity = Identity::Stored(id);
        self.original = self.current.to_record();
        true
    }

    /// Drops the tracking data.
    pub fn into_inner(self) -> T {
        self.current
    }
}

impl<T> Deref for Tracked<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.current
    }
}

impl<T> DerefMut for Tracked<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.current
    }
}

impl<T> Identified for Tracked<T> {
    fn identity(&self) -> Identity {
        self.identity
    }
}

pub(crate) fn diff_records(original: &Record, current: &Record) -> Record {
    current
        .iter()
        .filter(|(column, value)| original.get(column) != Some(*value))
        .map(|(column, value)| (column.to_owned(), value.clone()))
        .collect()
}
