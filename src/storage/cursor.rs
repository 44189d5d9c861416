//! Paged result cursor that also exposes unsaved and buffered objects.
#![forbid(unsafe_code)]

use std::collections::HashSet;
use std::fmt;

use tracing::debug;

use super::cancel::CancelToken;
use crate::query::DEFAULT_BATCH_SIZE;
use crate::types::Result;

/// Identity used to de-duplicate cursor content.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Identity {
    /// Persisted object with its storage id.
    Stored(i64),
    /// Unsaved object, keyed by the session slot it was spawned into.
    Local(u64),
}

impl Identity {
    /// The storage id, if persisted.
    pub fn stored_id(self) -> Option<i64> {
        match self {
            Identity::Stored(id) => Some(id),
            Identity::Local(_) => None,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Stored(id) => write!(f, "#{id}"),
            Identity::Local(slot) => write!(f, "local:{slot}"),
        }
    }
}

/// Exposes the identity of a cursor item.
pub trait Identified {
    /// Identity of the item.
    fn identity(&self) -> Identity;
}

/// Fetches storage pages for a cursor.
pub trait PageSource<T> {
    /// Returns up to `limit` items starting at `offset`.
    fn fetch(&mut self, offset: usize, limit: usize) -> Result<Vec<T>>;
}

impl<T, F> PageSource<T> for F
where
    F: FnMut(usize, usize) -> Result<Vec<T>>,
{
    fn fetch(&mut self, offset: usize, limit: usize) -> Result<Vec<T>> {
        self(offset, limit)
    }
}

/// One storage page plus the in-memory objects of the same query.
///
/// Unsaved and buffered objects are always fully present; only the storage
/// page moves with [`StorageCursor::next_batch`]. The cursor belongs to one
/// session and is not synchronized.
pub struct StorageCursor<T> {
    page: Vec<T>,
    unsaved: Vec<T>,
    buffered: Vec<T>,
    source: Option<Box<dyn PageSource<T>>>,
    batch_size: usize,
    next_offset: usize,
    exhausted: bool,
    cancel: CancelToken,
}

impl<T: Identified> StorageCursor<T> {
    /// Opens a cursor and fetches the first page.
    pub fn open(
        source: Box<dyn PageSource<T>>,
        batch_size: usize,
        cancel: CancelToken,
    ) -> Result<Self> {
        let mut cursor = Self {
            page: Vec::new(),
            unsaved: Vec::new(),
            buffered: Vec::new(),
            source: Some(source),
            batch_size: if batch_size == 0 {
                DEFAULT_BATCH_SIZE
            } else {
                batch_size
            },
            next_offset: 0,
            exhausted: false,
            cancel,
        };
        cursor.fetch_page()?;
        Ok(cursor)
    }

    /// A cursor over a fixed page with no further pages.
    pub fn from_page(page: Vec<T>) -> Self {
        Self {
            batch_size: page.len().max(1),
            page,
            unsaved: Vec::new(),
            buffered: Vec::new(),
            source: None,
            next_offset: 0,
            exhausted: true,
            cancel: CancelToken::new(),
        }
    }

    /// Attaches not-yet-saved objects.
    pub fn with_unsaved(mut self, items: Vec<T>) -> Self {
        self.unsaved = items;
        self
    }

    /// Attaches persisted objects with buffered updates.
    pub fn with_buffered(mut self, items: Vec<T>) -> Self {
        self.buffered = items;
        self
    }

    /// The current storage page.
    pub fn page(&self) -> &[T] {
        &self.page
    }

    /// Unsaved objects.
    pub fn unsaved(&self) -> &[T] {
        &self.unsaved
    }

    /// Buffered updates.
    pub fn buffered(&self) -> &[T] {
        &self.buffered
    }

    /// Rows requested per page.
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// False once a short or empty page was seen.
    pub fn has_more(&self) -> bool {
        !self.exhausted
    }

    /// In-memory objects followed by the storage page, each identity once.
    ///
    /// Buffered objects shadow the stored copy of the same id.
    pub fn get_all(&self) -> Vec<&T> {
        let mut seen = HashSet::new();
        self.unsaved
            .iter()
            .chain(self.buffered.iter())
            .chain(self.page.iter())
            .filter(|item| seen.insert(item.identity()))
            .collect()
    }

    /// Consumes the cursor, returning what [`StorageCursor::get_all`] would.
    pub fn into_all(self) -> Vec<T> {
        let mut seen = HashSet::new();
        self.unsaved
            .into_iter()
            .chain(self.buffered)
            .chain(self.page)
            .filter(|item| seen.insert(item.identity()))
            .collect()
    }

    /// Replaces the storage page with the next one.
    ///
    /// Past the end this yields an empty page without touching storage.
    pub fn next_batch(&mut self) -> Result<&[T]> {
        self.fetch_page()?;
        Ok(&self.page)
    }

    fn fetch_page(&mut self) -> Result<()> {
        let source = match (&mut self.source, self.exhausted) {
            (Some(source), false) => source,
            _ => {
                self.page.clear();
                self.exhausted = true;
                return Ok(());
            }
        };
        self.cancel.check("cursor page fetch")?;
        let rows = source.fetch(self.next_offset, self.batch_size)?;
        debug!(
            offset = self.next_offset,
            limit = self.batch_size,
            rows = rows.len(),
            "cursor.page.fetch"
        );
        self.next_offset += self.batch_size;
        self.exhausted = rows.len() < self.batch_size;
        self.page = rows;
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for StorageCursor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageCursor")
            .field("page", &self.page)
            .field("unsaved", &self.unsaved)
            .field("buffered", &self.buffered)
            .field("batch_size", &self.batch_size)
            .field("next_offset", &self.next_offset)
            .field("exhausted", &self.exhausted)
            .finish()
    }
}
