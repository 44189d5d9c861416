//! Synchronizer options and the column retention policy.
#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

/// Which orphaned storage items a sync pass may drop.
///
/// Everything defaults to `false`: orphans are kept and left unreferenced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RetentionPolicy {
    /// Drop container tables no pawn maps to.
    pub remove_orphan_containers: bool,
    /// Drop join tables no relation maps to.
    pub remove_orphan_relations: bool,
    /// Drop columns no property maps to.
    pub remove_orphan_properties: bool,
}

impl RetentionPolicy {
    /// Keeps every orphan.
    pub fn keep_all() -> Self {
        Self::default()
    }

    /// Drops every orphan.
    pub fn remove_all() -> Self {
        Self {
            remove_orphan_containers: true,
            remove_orphan_relations: true,
            remove_orphan_properties: true,
        }
    }
}

/// Options of a sync pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncOptions {
    /// Compute the plan without any mutating storage call.
    pub plan_only: bool,
    /// Orphan handling.
    pub retention: RetentionPolicy,
}
