//! Schema synchronization.
//!
//! [`diff`] compares a compiled model with a [`StorageSnapshot`] and
//! produces a [`SyncPlan`]. [`SchemaSynchronizer`] introspects a provider,
//! plans, and applies the plan inside one transaction: either every
//! statement commits or storage is left untouched.
#![forbid(unsafe_code)]

pub mod options;
pub mod plan;

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::compiler::{CompiledGraph, PRIMARY_KEY};
use crate::model::{ContainerSchema, RelationSchema};
use crate::query::{QueryBuilder, Statement};
use crate::storage::{CancelToken, ColumnInfo, StorageProvider};
use crate::types::{Result, SyncError};

pub use options::{RetentionPolicy, SyncOptions};
pub use plan::{ContainerPlan, Existence, PropertyPlan, RelationPlan, SyncAction, SyncPlan};

/// Introspected tables and their columns.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StorageSnapshot {
    tables: BTreeMap<String, Vec<ColumnInfo>>,
}

impl StorageSnapshot {
    /// Reads every table and its columns from the provider.
    pub fn capture(provider: &dyn StorageProvider) -> Result<Self> {
        let mut tables = BTreeMap::new();
        for table in provider.list_tables()? {
            let columns = provider.list_columns(&table)?;
            tables.insert(table, columns);
        }
        Ok(Self { tables })
    }

    /// Adds a table by hand.
    pub fn with_table(mut self, name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        self.tables.insert(name.into(), columns);
        self
    }

    /// Columns of a table, if present.
    pub fn columns(&self, table: &str) -> Option<&[ColumnInfo]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Table names in order.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

fn removal(enabled: bool) -> SyncAction {
    if enabled {
        SyncAction::Remove
    } else {
        SyncAction::Keep
    }
}

fn is_primary_key(column: &ColumnInfo) -> bool {
    column.primary_key || column.name == PRIMARY_KEY
}

/// Diffs a compiled model against a storage snapshot.
///
/// Fails with [`SyncError::EmptyModel`] when there are no containers.
pub fn diff(
    containers: &[ContainerSchema],
    relations: &[RelationSchema],
    snapshot: &StorageSnapshot,
    retention: RetentionPolicy,
    builder: &dyn QueryBuilder,
) -> std::result::Result<SyncPlan, SyncError> {
    if containers.is_empty() {
        return Err(SyncError::EmptyModel);
    }
    let mut plan = SyncPlan::default();
    let mut modelled: HashSet<&str> = HashSet::new();

    for container in containers {
        modelled.insert(&container.storage_name);
        plan.containers.push(plan_container(container, snapshot, retention));
    }
    for relation in relations {
        modelled.insert(&relation.name);
        let (existence, action) = match snapshot.columns(&relation.name) {
            Some(_) => (Existence::Both, SyncAction::Keep),
            None => (Existence::ModelOnly, SyncAction::Add),
        };
        plan.relations.push(RelationPlan {
            name: relation.name.clone(),
            source_storage: relation.source_storage.clone(),
            target_storage: relation.target_storage.clone(),
            existence,
            action,
        });
    }

    for table in snapshot.tables().filter(|t| !modelled.contains(t)) {
        let columns = snapshot.columns(table).unwrap_or_default();
        if let Some((source, target)) = builder.relation_endpoints(columns) {
            plan.relations.push(RelationPlan {
                name: table.to_owned(),
                source_storage: source,
                target_storage: target,
                existence: Existence::StorageOnly,
                action: removal(retention.remove_orphan_relations),
            });
        } else {
            plan.containers.push(ContainerPlan {
                logical_name: None,
                storage_name: table.to_owned(),
                existence: Existence::StorageOnly,
                action: removal(retention.remove_orphan_containers),
                properties: columns
                    .iter()
                    .filter(|c| !is_primary_key(c))
                    .map(|c| PropertyPlan {
                        name: c.name.clone(),
                        existence: Existence::StorageOnly,
                        action: SyncAction::NoOp,
                    })
                    .collect(),
            });
        }
    }

    protect_referenced_containers(&mut plan);
    Ok(plan)
}

fn plan_container(
    container: &ContainerSchema,
    snapshot: &StorageSnapshot,
    retention: RetentionPolicy,
) -> ContainerPlan {
    let Some(columns) = snapshot.columns(&container.storage_name) else {
        return ContainerPlan {
            logical_name: Some(container.logical_name.clone()),
            storage_name: container.storage_name.clone(),
            existence: Existence::ModelOnly,
            action: SyncAction::Add,
            properties: container
                .properties
                .iter()
                .map(|p| PropertyPlan {
                    name: p.name.clone(),
                    existence: Existence::ModelOnly,
                    action: SyncAction::NoOp,
                })
                .collect(),
        };
    };

    let mut properties: Vec<PropertyPlan> = container
        .properties
        .iter()
        .map(|p| {
            let stored = columns.iter().any(|c| c.name == p.name);
            PropertyPlan {
                name: p.name.clone(),
                existence: if stored {
                    Existence::Both
                } else {
                    Existence::ModelOnly
                },
                action: if stored {
                    SyncAction::Keep
                } else {
                    SyncAction::Add
                },
            }
        })
        .collect();
    properties.extend(
        columns
            .iter()
            .filter(|c| !is_primary_key(c) && container.property(&c.name).is_none())
            .map(|c| PropertyPlan {
                name: c.name.clone(),
                existence: Existence::StorageOnly,
                action: removal(retention.remove_orphan_properties),
            }),
    );

    ContainerPlan {
        logical_name: Some(container.logical_name.clone()),
        storage_name: container.storage_name.clone(),
        existence: Existence::Both,
        action: SyncAction::Keep,
        properties,
    }
}

/// Downgrades container removals that a retained relation still references.
fn protect_referenced_containers(plan: &mut SyncPlan) {
    for container in plan
        .containers
        .iter_mut()
        .filter(|c| c.action == SyncAction::Remove)
    {
        let blocker = plan
            .relations
            .iter()
            .find(|r| r.touches(&container.storage_name) && r.action != SyncAction::Remove);
        if let Some(relation) = blocker {
            warn!(
                container = %container.storage_name,
                relation = %relation.name,
                "sync.plan.removal_blocked"
            );
            container.action = SyncAction::Keep;
            for property in &mut container.properties {
                property.action = SyncAction::NoOp;
            }
        }
    }
}

/// Renders a plan as statements in dependency order: container adds, column
/// adds, relation adds, relation removals, column removals, container removals.
pub fn plan_statements(
    plan: &SyncPlan,
    containers: &[ContainerSchema],
    relations: &[RelationSchema],
    builder: &dyn QueryBuilder,
) -> std::result::Result<Vec<Statement>, SyncError> {
    let unknown = |name: &str| SyncError::UnknownPlanItem {
        name: name.to_owned(),
    };
    let container_schema = |storage_name: &str| {
        containers
            .iter()
            .find(|c| c.storage_name == storage_name)
            .ok_or_else(|| unknown(storage_name))
    };
    let mut out = Vec::new();

    for item in plan.containers.iter().filter(|c| c.action == SyncAction::Add) {
        out.push(builder.create_table(container_schema(&item.storage_name)?));
    }
    for item in plan.containers.iter().filter(|c| c.action == SyncAction::Keep) {
        for property in item.properties.iter().filter(|p| p.action == SyncAction::Add) {
            let schema = container_schema(&item.storage_name)?;
            let property = schema
                .property(&property.name)
                .ok_or_else(|| unknown(&property.name))?;
            out.push(builder.add_column(&item.storage_name, property));
        }
    }
    for item in plan.relations.iter().filter(|r| r.action == SyncAction::Add) {
        let relation = relations
            .iter()
            .find(|r| r.name == item.name)
            .ok_or_else(|| unknown(&item.name))?;
        out.push(builder.create_relation_table(relation));
    }
    for item in plan.relations.iter().filter(|r| r.action == SyncAction::Remove) {
        out.push(builder.drop_table(&item.name));
    }
    for item in plan.containers.iter().filter(|c| c.action == SyncAction::Keep) {
        for property in item.properties.iter().filter(|p| p.action == SyncAction::Remove) {
            out.push(builder.drop_column(&item.storage_name, &property.name));
        }
    }
    for item in plan.containers.iter().filter(|c| c.action == SyncAction::Remove) {
        out.push(builder.drop_table(&item.storage_name));
    }
    Ok(out)
}

/// Reconciles a compiled model with a storage provider.
pub struct SchemaSynchronizer<'a> {
    provider: &'a dyn StorageProvider,
    builder: &'a dyn QueryBuilder,
    options: SyncOptions,
    cancel: CancelToken,
}

impl<'a> SchemaSynchronizer<'a> {
    /// Creates a synchronizer with default, non-destructive options.
    pub fn new(provider: &'a dyn StorageProvider, builder: &'a dyn QueryBuilder) -> Self {
        Self {
            provider,
            builder,
            options: SyncOptions::default(),
            cancel: CancelToken::new(),
        }
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Checks `cancel` before every statement.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Introspects storage and computes a plan. Never mutates storage.
    pub fn plan(
        &self,
        containers: &[ContainerSchema],
        relations: &[RelationSchema],
    ) -> Result<SyncPlan> {
        if containers.is_empty() {
            return Err(SyncError::EmptyModel.into());
        }
        let snapshot = StorageSnapshot::capture(self.provider)?;
        let plan = diff(
            containers,
            relations,
            &snapshot,
            self.options.retention,
            self.builder,
        )?;
        debug!(
            add = plan.count(SyncAction::Add),
            remove = plan.count(SyncAction::Remove),
            keep = plan.count(SyncAction::Keep),
            "sync.plan.done"
        );
        Ok(plan)
    }

    /// Plans and, unless in plan-only mode, applies the plan.
    pub fn synchronize(
        &self,
        containers: &[ContainerSchema],
        relations: &[RelationSchema],
    ) -> Result<SyncPlan> {
        if containers.is_empty() {
            return Err(SyncError::EmptyModel.into());
        }
        if self.options.plan_only {
            let plan = self.plan(containers, relations)?;
            plan.validate()?;
            return Ok(plan);
        }
        self.provider.begin_transaction()?;
        let outcome = self
            .plan(containers, relations)
            .and_then(|plan| self.execute(&plan, containers, relations).map(|()| plan));
        self.finish(outcome)
    }

    /// Convenience over [`SchemaSynchronizer::synchronize`] for a compiled graph.
    pub fn synchronize_graph(&self, graph: &CompiledGraph) -> Result<SyncPlan> {
        self.synchronize(graph.containers(), graph.relations())
    }

    /// Applies a previously computed, possibly edited, plan.
    pub fn apply(
        &self,
        plan: &SyncPlan,
        containers: &[ContainerSchema],
        relations: &[RelationSchema],
    ) -> Result<()> {
        plan.validate()?;
        plan_statements(plan, containers, relations, self.builder)?;
        self.provider.begin_transaction()?;
        let outcome = self.execute(plan, containers, relations);
        self.finish(outcome)
    }

    fn execute(
        &self,
        plan: &SyncPlan,
        containers: &[ContainerSchema],
        relations: &[RelationSchema],
    ) -> Result<()> {
        plan.validate()?;
        let statements = plan_statements(plan, containers, relations, self.builder)?;
        for statement in &statements {
            self.cancel.check("schema synchronization")?;
            debug!(sql = %statement.sql, "sync.apply.statement");
            self.provider.execute_ddl(statement)?;
        }
        info!(statements = statements.len(), "sync.apply.done");
        Ok(())
    }

    fn finish<T>(&self, outcome: Result<T>) -> Result<T> {
        match outcome {
            Ok(value) => {
                self.provider.commit()?;
                Ok(value)
            }
            Err(err) => {
                warn!(error = %err, code = err.code(), "sync.apply.revert");
                if let Err(revert_err) = self.provider.revert() {
                    warn!(error = %revert_err, "sync.apply.revert_failed");
                }
                Err(err)
            }
        }
    }
}
