//! Session configuration loaded from TOML.
#![forbid(unsafe_code)]

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::query::DEFAULT_BATCH_SIZE;
use crate::sync::SyncOptions;
use crate::types::{PawnError, Result};

/// Session tuning loaded from TOML or built in code.
///
/// ```
/// use pawnstore::session::SessionOptions;
///
/// let opts = SessionOptions::from_toml_str(
///     "batch_size = 50\n[sync.retention]\nremove_orphan_properties = true\n",
/// )
/// .unwrap();
/// assert_eq!(opts.batch_size, 50);
/// assert!(!opts.include_soft_deleted);
/// assert!(opts.sync.retention.remove_orphan_properties);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionOptions {
    /// Rows per cursor page.
    pub batch_size: usize,
    /// Whether queries return soft-deleted rows by default.
    pub include_soft_deleted: bool,
    /// Options of `sync_with_storage`.
    pub sync: SyncOptions,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            include_soft_deleted: false,
            sync: SyncOptions::default(),
        }
    }
}

impl SessionOptions {
    /// Parses options from TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| PawnError::Config(err.to_string()))
    }

    /// Reads and parses a TOML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|err| {
            PawnError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&text).map_err(|err| match err {
            PawnError::Config(reason) => {
                PawnError::Config(format!("failed to parse {}: {reason}", path.display()))
            }
            other => other,
        })
    }
}
