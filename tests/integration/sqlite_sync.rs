#![allow(missing_docs)]

mod common;

use std::cell::Cell;

use pawnstore::compiler::{compile_graph, CompiledGraph};
use pawnstore::model::{
    PawnDescriptor, PlainNamingEncoder, PropertyDescriptor, PropertyType, RelationField,
};
use pawnstore::query::{SqliteQueryBuilder, Statement};
use pawnstore::storage::{
    CancelToken, ColumnInfo, SqliteStorageProvider, StorageProvider,
};
use pawnstore::sync::{
    Existence, RetentionPolicy, SchemaSynchronizer, SyncAction, SyncOptions, SyncPlan,
};
use pawnstore::types::{ErrorKind, Record, Result, StorageError};
use tempfile::tempdir;

use common::{init_tracing, law_firm};

fn garage_and_trucks() -> CompiledGraph {
    let pawns = vec![
        PawnDescriptor::new("Garage")
            .property(PropertyDescriptor::new("Name", PropertyType::String))
            .relation(RelationField::many("Trucks", "Truck")),
        PawnDescriptor::new("Truck").property(PropertyDescriptor::new("Plate", PropertyType::String)),
    ];
    compile_graph(&pawns, &PlainNamingEncoder).expect("valid model")
}

fn trucks_only(extra: &str) -> CompiledGraph {
    let pawns = vec![PawnDescriptor::new("Truck")
        .property(PropertyDescriptor::new("Plate", PropertyType::String))
        .property(PropertyDescriptor::new(extra, PropertyType::Int16))];
    compile_graph(&pawns, &PlainNamingEncoder).expect("valid model")
}

fn sync(
    provider: &dyn StorageProvider,
    graph: &CompiledGraph,
    options: SyncOptions,
) -> Result<SyncPlan> {
    SchemaSynchronizer::new(provider, &SqliteQueryBuilder)
        .with_options(options)
        .synchronize_graph(graph)
}

fn retention(policy: RetentionPolicy) -> SyncOptions {
    SyncOptions {
        plan_only: false,
        retention: policy,
    }
}

#[test]
fn second_pass_is_a_no_op() -> Result<()> {
    init_tracing();
    let provider = SqliteStorageProvider::open_in_memory()?;
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;

    let first = sync(&provider, &graph, SyncOptions::default())?;
    assert_eq!(first.count(SyncAction::Add), 3 + 3);
    assert_eq!(
        provider.list_tables()?,
        ["Client", "Client_Matter", "Lawyer", "Lawyer_Lawyer", "Lawyer_Matter", "Matter"]
    );

    let second = sync(&provider, &graph, SyncOptions::default())?;
    assert!(second.is_unchanged(), "{}", second.to_json().unwrap_or_default());
    assert!(second
        .containers
        .iter()
        .all(|c| c.existence == Existence::Both && c.action == SyncAction::Keep));
    assert!(second.relations.iter().all(|r| r.action == SyncAction::Keep));
    Ok(())
}

#[test]
fn plan_only_leaves_storage_alone() -> Result<()> {
    let provider = SqliteStorageProvider::open_in_memory()?;
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;
    let options = SyncOptions {
        plan_only: true,
        ..SyncOptions::default()
    };
    let plan = sync(&provider, &graph, options)?;
    assert_eq!(plan.containers.len(), 3);
    assert!(plan.containers.iter().all(|c| c.action == SyncAction::Add));
    assert!(provider.list_tables()?.is_empty());
    Ok(())
}

#[test]
fn orphans_follow_the_retention_policy() -> Result<()> {
    init_tracing();
    let provider = SqliteStorageProvider::open_in_memory()?;
    sync(&provider, &garage_and_trucks(), SyncOptions::default())?;
    let reduced = trucks_only("Axles");

    let plan = sync(&provider, &reduced, retention(RetentionPolicy::keep_all()))?;
    let garage = plan.container("Garage").expect("orphan container");
    assert_eq!(garage.existence, Existence::StorageOnly);
    assert_eq!(garage.action, SyncAction::Keep);
    assert_eq!(plan.relation("Garage_Truck").map(|r| r.action), Some(SyncAction::Keep));

    let containers_only = RetentionPolicy {
        remove_orphan_containers: true,
        ..RetentionPolicy::default()
    };
    let plan = sync(&provider, &reduced, retention(containers_only))?;
    assert_eq!(plan.container("Garage").map(|c| c.action), Some(SyncAction::Keep));
    assert!(provider.list_tables()?.contains(&"Garage".to_owned()));

    let plan = sync(&provider, &reduced, retention(RetentionPolicy::remove_all()))?;
    assert_eq!(plan.container("Garage").map(|c| c.action), Some(SyncAction::Remove));
    assert_eq!(plan.relation("Garage_Truck").map(|r| r.action), Some(SyncAction::Remove));
    assert_eq!(provider.list_tables()?, ["Truck"]);
    Ok(())
}

#[test]
fn columns_are_added_and_dropped() -> Result<()> {
    let provider = SqliteStorageProvider::open_in_memory()?;
    sync(&provider, &trucks_only("Color"), SyncOptions::default())?;

    let plan = sync(&provider, &trucks_only("Axles"), SyncOptions::default())?;
    let truck = plan.container("Truck").expect("truck");
    let actions: Vec<_> = truck
        .properties
        .iter()
        .map(|p| (p.name.as_str(), p.action))
        .collect();
    assert_eq!(
        actions,
        [
            ("Plate", SyncAction::Keep),
            ("Axles", SyncAction::Add),
            ("Color", SyncAction::Keep),
        ]
    );

    let drop_orphans = RetentionPolicy {
        remove_orphan_properties: true,
        ..RetentionPolicy::default()
    };
    sync(&provider, &trucks_only("Axles"), retention(drop_orphans))?;
    let names: Vec<_> = provider
        .list_columns("Truck")?
        .into_iter()
        .map(|c| c.name)
        .collect();
    assert_eq!(names, ["Id", "Plate", "Axles"]);
    Ok(())
}

#[test]
fn edited_plans_cannot_strand_a_relation() -> Result<()> {
    let provider = SqliteStorageProvider::open_in_memory()?;
    sync(&provider, &garage_and_trucks(), SyncOptions::default())?;
    let reduced = trucks_only("Axles");
    let synchronizer = SchemaSynchronizer::new(&provider, &SqliteQueryBuilder);

    let mut plan = synchronizer.plan(reduced.containers(), reduced.relations())?;
    for container in plan.containers.iter_mut().filter(|c| c.storage_name == "Garage") {
        container.action = SyncAction::Remove;
    }
    let err = synchronizer
        .apply(&plan, reduced.containers(), reduced.relations())
        .unwrap_err();
    assert_eq!(err.code(), "RemovalBlocked");
    assert_eq!(err.kind(), ErrorKind::Sync);
    assert!(provider.list_tables()?.contains(&"Garage".to_owned()));
    Ok(())
}

#[test]
fn empty_model_fails_before_touching_storage() -> Result<()> {
    let provider = SqliteStorageProvider::open_in_memory()?;
    let err = SchemaSynchronizer::new(&provider, &SqliteQueryBuilder)
        .synchronize(&[], &[])
        .unwrap_err();
    assert_eq!(err.code(), "EmptyModel");
    Ok(())
}

/// Fails the n-th DDL statement.
struct FlakyProvider {
    inner: SqliteStorageProvider,
    ddl_left: Cell<usize>,
}

impl StorageProvider for FlakyProvider {
    fn list_tables(&self) -> Result<Vec<String>> {
        self.inner.list_tables()
    }

    fn list_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        self.inner.list_columns(table)
    }

    fn execute_ddl(&self, statement: &Statement) -> Result<()> {
        let left = self.ddl_left.get();
        if left == 0 {
            return Err(StorageError::Backend("injected failure".into()).into());
        }
        self.ddl_left.set(left - 1);
        self.inner.execute_ddl(statement)
    }

    fn execute(&self, statement: &Statement) -> Result<usize> {
        self.inner.execute(statement)
    }

    fn execute_query(&self, statement: &Statement) -> Result<Vec<Record>> {
        self.inner.execute_query(statement)
    }

    fn begin_transaction(&self) -> Result<()> {
        self.inner.begin_transaction()
    }

    fn commit(&self) -> Result<()> {
        self.inner.commit()
    }

    fn revert(&self) -> Result<()> {
        self.inner.revert()
    }
}

#[test]
fn failed_statement_reverts_the_whole_pass() -> Result<()> {
    init_tracing();
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("firm.db");
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;

    let flaky = FlakyProvider {
        inner: SqliteStorageProvider::open(&path)?,
        ddl_left: Cell::new(4),
    };
    let err = sync(&flaky, &graph, SyncOptions::default()).unwrap_err();
    assert!(err.is_retryable());
    assert!(err.to_string().contains("injected failure"));
    drop(flaky);

    let reopened = SqliteStorageProvider::open(&path)?;
    assert!(reopened.list_tables()?.is_empty());
    let plan = sync(&reopened, &graph, SyncOptions::default())?;
    assert_eq!(plan.count(SyncAction::Add), 6);
    Ok(())
}

#[test]
fn cancellation_stops_before_any_statement() -> Result<()> {
    let provider = SqliteStorageProvider::open_in_memory()?;
    let graph = compile_graph(&law_firm(), &PlainNamingEncoder)?;
    let token = CancelToken::new();
    token.cancel();
    let err = SchemaSynchronizer::new(&provider, &SqliteQueryBuilder)
        .with_cancel(token)
        .synchronize_graph(&graph)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(provider.list_tables()?.is_empty());
    Ok(())
}
