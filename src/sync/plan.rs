//! Sync plan data.
#![forbid(unsafe_code)]

use serde::Serialize;

use crate::types::SyncError;

/// Where an item was found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Existence {
    /// Compiled model only.
    ModelOnly,
    /// Storage only (orphan).
    StorageOnly,
    /// Both.
    Both,
}

/// What the synchronizer will do with an item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SyncAction {
    /// Create it in storage.
    Add,
    /// Drop it from storage.
    Remove,
    /// Leave it in storage.
    Keep,
    /// Nothing to do on its own; it travels with its container.
    NoOp,
}

/// Plan for one property column.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PropertyPlan {
    /// Column name.
    pub name: String,
    /// Where it was found.
    pub existence: Existence,
    /// Planned action.
    pub action: SyncAction,
}

/// Plan for one container table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContainerPlan {
    /// Logical pawn name; `None` for orphans.
    pub logical_name: Option<String>,
    /// Table name.
    pub storage_name: String,
    /// Where it was found.
    pub existence: Existence,
    /// Planned action.
    pub action: SyncAction,
    /// Column plans, model order first, then orphan columns.
    pub properties: Vec<PropertyPlan>,
}

/// Plan for one relation join table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelationPlan {
    /// Join table name.
    pub name: String,
    /// Source container table.
    pub source_storage: String,
    /// Target container table.
    pub target_storage: String,
    /// Where it was found.
    pub existence: Existence,
    /// Planned action.
    pub action: SyncAction,
}

impl RelationPlan {
    /// True if either endpoint is `storage_name`.
    pub fn touches(&self, storage_name: &str) -> bool {
        self.source_storage == storage_name || self.target_storage == storage_name
    }
}

/// Result of diffing a compiled model against storage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    /// Container plans, model order then orphans.
    pub containers: Vec<ContainerPlan>,
    /// Relation plans, model order then orphans.
    pub relations: Vec<RelationPlan>,
}

impl SyncPlan {
    /// Number of container, column and relation entries with `action`.
    pub fn count(&self, action: SyncAction) -> usize {
        let containers = self.containers.iter().filter(|c| c.action == action).count();
        let properties = self
            .containers
            .iter()
            .flat_map(|c| &c.properties)
            .filter(|p| p.action == action)
            .count();
        let relations = self.relations.iter().filter(|r| r.action == action).count();
        containers + properties + relations
    }

    /// True when applying the plan would not change storage.
    pub fn is_unchanged(&self) -> bool {
        self.count(SyncAction::Add) == 0 && self.count(SyncAction::Remove) == 0
    }

    /// Looks up a container plan by table name.
    pub fn container(&self, storage_name: &str) -> Option<&ContainerPlan> {
        self.containers
            .iter()
            .find(|c| c.storage_name == storage_name)
    }

    /// Looks up a relation plan by table name.
    pub fn relation(&self, name: &str) -> Option<&RelationPlan> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Rejects container removals while a relation touching the container stays.
    pub fn validate(&self) -> Result<(), SyncError> {
        for container in self.containers.iter().filter(|c| c.action == SyncAction::Remove) {
            if let Some(relation) = self
                .relations
                .iter()
                .find(|r| r.touches(&container.storage_name) && r.action != SyncAction::Remove)
            {
                return Err(SyncError::RemovalBlocked {
                    container: container.storage_name.clone(),
                    relation: relation.name.clone(),
                });
            }
        }
        Ok(())
    }

    /// Pretty JSON rendering for reports.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
