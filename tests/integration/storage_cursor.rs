#![allow(missing_docs)]

mod common;

use std::sync::Arc;

use pawnstore::compiler::compile_graph;
use pawnstore::filter::prop;
use pawnstore::model::PlainNamingEncoder;
use pawnstore::query::{QueryBuilder, SelectQuery, SqliteQueryBuilder};
use pawnstore::session::{FindOptions, Pawn, Session};
use pawnstore::storage::{
    CancelToken, Identified, Identity, SqliteStorageProvider, StorageCursor, StorageProvider,
};
use pawnstore::sync::SchemaSynchronizer;
use pawnstore::types::{ErrorKind, Record, Result};

use common::{init_tracing, Car, Wheel};

/// A raw row keyed by its primary key.
#[derive(Debug)]
struct Row(Record);

impl Identified for Row {
    fn identity(&self) -> Identity {
        Identity::Stored(self.0.get_i64("Id").unwrap_or(-1))
    }
}

#[test]
fn raw_rows_page_through_a_table() -> Result<()> {
    init_tracing();
    let provider = Arc::new(SqliteStorageProvider::open_in_memory()?);
    let graph = compile_graph(&[Car::descriptor(), Wheel::descriptor()], &PlainNamingEncoder)?;
    SchemaSynchronizer::new(provider.as_ref(), &SqliteQueryBuilder).synchronize_graph(&graph)?;
    for doors in 1..=7_i64 {
        let car = Car::new(&format!("Car{doors}"), doors);
        provider.execute_query(&SqliteQueryBuilder.insert("Car", &car.to_record()))?;
    }

    let source = {
        let provider = Arc::clone(&provider);
        move |offset: usize, limit: usize| -> Result<Vec<Row>> {
            let query = SelectQuery::new("Car", offset, limit);
            Ok(provider
                .execute_query(&SqliteQueryBuilder.select(&query))?
                .into_iter()
                .map(Row)
                .collect())
        }
    };
    let mut cursor = StorageCursor::<Row>::open(Box::new(source), 3, CancelToken::new())?;
    let mut seen = Vec::new();
    loop {
        seen.extend(cursor.page().iter().map(|row| row.identity()));
        if !cursor.has_more() {
            break;
        }
        cursor.next_batch()?;
    }
    assert_eq!(seen, (1..=7).map(Identity::Stored).collect::<Vec<_>>());
    Ok(())
}

#[test]
fn staged_values_ride_along_every_page() -> Result<()> {
    init_tracing();
    let mut session = Session::open_in_memory()?;
    session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
    session.sync_with_storage()?;
    let mut stored = Vec::new();
    for model in ["Ami", "Mini", "Polo"] {
        stored.push(session.spawn_new(Car::new(model, 4))?);
    }
    let report = session.persist_changes()?;
    for car in &mut stored {
        car.mark_persisted(report.assigned());
    }

    stored[0].doors = 3;
    session.stage_update(&stored[0])?;
    session.spawn_new(Car::new("Zoe", 5))?;

    let mut cursor = session.find::<Car>(FindOptions::new().batch_size(2))?;
    let first: Vec<_> = cursor.get_all().iter().map(|c| (c.model.clone(), c.doors)).collect();
    assert_eq!(
        first,
        [("Zoe".to_owned(), 5), ("Ami".to_owned(), 3), ("Mini".to_owned(), 4)]
    );

    cursor.next_batch()?;
    let second: Vec<_> = cursor.get_all().iter().map(|c| c.model.clone()).collect();
    assert_eq!(second, ["Zoe", "Ami", "Polo"]);
    assert!(!cursor.has_more());
    Ok(())
}

#[test]
fn staged_values_are_filtered_like_stored_rows() -> Result<()> {
    let mut session = Session::open_in_memory()?;
    session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
    session.sync_with_storage()?;
    let mut mini = session.spawn_new(Car::new("Mini", 2))?;
    let report = session.persist_changes()?;
    mini.mark_persisted(report.assigned());

    session.spawn_new(Car::new("Zoe", 5))?;
    session.spawn_new(Car::new("Smart", 2))?;
    mini.doors = 3;
    session.stage_update(&mini)?;

    let two_doors = session.find::<Car>(FindOptions::new().filter(prop("Doors").eq(2)))?;
    let models: Vec<_> = two_doors.unsaved().iter().map(|c| c.model.as_str()).collect();
    assert_eq!(models, ["Smart"]);
    assert!(two_doors.buffered().is_empty());
    assert!(two_doors.page().is_empty());
    Ok(())
}

#[test]
fn cancelled_sessions_stop_paging() -> Result<()> {
    let token = CancelToken::new();
    let mut session = Session::open_in_memory()?.with_cancel(token.clone());
    session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
    session.sync_with_storage()?;
    for model in ["Ami", "Mini", "Polo"] {
        session.spawn_new(Car::new(model, 4))?;
    }
    session.persist_changes()?;

    let mut cursor = session.find::<Car>(FindOptions::new().batch_size(1))?;
    assert_eq!(cursor.page().len(), 1);
    token.cancel();
    let err = cursor.next_batch().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    Ok(())
}
