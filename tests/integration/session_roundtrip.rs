#![allow(missing_docs)]

mod common;

use pawnstore::filter::prop;
use pawnstore::model::{PawnDescriptor, PropertyDescriptor, PropertyType};
use pawnstore::query::SortDirection;
use pawnstore::session::{FindOptions, Pawn, Session};
use pawnstore::storage::Identity;
use pawnstore::types::{ErrorKind, Record, Result};
use tempfile::tempdir;

use common::{init_tracing, Car, Wheel};

fn garage() -> Result<Session> {
    init_tracing();
    let mut session = Session::open_in_memory()?;
    session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
    session.sync_with_storage()?;
    Ok(session)
}

fn models(cars: &[pawnstore::Tracked<Car>]) -> Vec<&str> {
    cars.iter().map(|c| c.model.as_str()).collect()
}

#[test]
fn spawned_values_get_ids_on_persist() -> Result<()> {
    let mut session = garage()?;
    let mut beetle = session.spawn_new(Car::new("Beetle", 2))?;
    let mut golf = session.spawn_new(Car::new("Golf", 4))?;
    assert_eq!(beetle.identity().stored_id(), None);

    let pending = session.find::<Car>(FindOptions::new())?;
    assert_eq!(pending.unsaved().len(), 2);
    assert!(pending.page().is_empty());

    let report = session.persist_changes()?;
    assert_eq!(report.inserted(), 2);
    assert!(beetle.mark_persisted(report.assigned()));
    assert!(golf.mark_persisted(report.assigned()));
    assert!(!beetle.is_dirty());
    assert!(!session.has_pending_changes());

    let four_doors = session
        .find::<Car>(FindOptions::new().filter(prop("Doors").gt(2)))?
        .into_all();
    assert_eq!(models(&four_doors), ["Golf"]);
    assert_eq!(four_doors[0].identity(), golf.identity());

    let all = session.find::<Car>(FindOptions::new())?.into_all();
    assert_eq!(models(&all), ["Beetle", "Golf"]);
    assert_eq!(session.count::<Car>(Some(&prop("Model").ne("Golf")))?, 1);
    Ok(())
}

#[test]
fn updates_write_only_changed_columns() -> Result<()> {
    let mut session = garage()?;
    let mut golf = session.spawn_new(Car::new("Golf", 4))?;
    let report = session.persist_changes()?;
    golf.mark_persisted(report.assigned());
    let id = golf.identity().stored_id().expect("persisted");

    golf.doors = 5;
    assert_eq!(golf.changes(), Record::new().with("Doors", 5_i64));
    session.stage_update(&golf)?;

    let cursor = session.find::<Car>(FindOptions::new())?;
    assert_eq!(cursor.buffered().len(), 1);
    assert_eq!(cursor.page()[0].doors, 4);
    let merged = cursor.get_all();
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].doors, 5);
    assert_eq!(session.get_by_id::<Car>(id)?.map(|c| c.doors), Some(5));

    assert_eq!(session.persist_changes()?.updated, 1);
    let reloaded = session.get_by_id::<Car>(id)?.expect("row");
    assert_eq!(reloaded.doors, 5);
    assert!(!reloaded.is_dirty());

    session.stage_update(&reloaded)?;
    assert_eq!(session.persist_changes()?.updated, 0);
    Ok(())
}

#[test]
fn relations_follow_their_multiplexer() -> Result<()> {
    let mut session = garage()?;
    let mut car = session.spawn_new(Car::new("Beetle", 2))?;
    let mut front = session.spawn_new(Wheel { size: 15.0 })?;
    let mut back = session.spawn_new(Wheel { size: 16.0 })?;
    session.connect(&car, "FrontWheels", &front)?;
    session.connect(&car, "BackWheels", &back)?;

    let staged = session.find_related::<Car, Wheel>(&car, "FrontWheels")?;
    assert_eq!(staged.unsaved().len(), 1);
    assert_eq!(staged.unsaved()[0].size, 15.0);

    let report = session.persist_changes()?;
    assert_eq!((report.inserted(), report.linked), (3, 2));
    for tracked_ok in [
        car.mark_persisted(report.assigned()),
        front.mark_persisted(report.assigned()),
        back.mark_persisted(report.assigned()),
    ] {
        assert!(tracked_ok);
    }

    let fronts = session.find_related::<Car, Wheel>(&car, "FrontWheels")?.into_all();
    assert_eq!(fronts.len(), 1);
    assert_eq!(fronts[0].identity(), front.identity());
    let backs = session.find_related::<Car, Wheel>(&car, "BackWheels")?.into_all();
    assert_eq!(backs.iter().map(|w| w.size).collect::<Vec<_>>(), [16.0]);

    let owner = session.find_related::<Wheel, Car>(&front, "FrontOf")?.into_all();
    assert_eq!(models(&owner), ["Beetle"]);
    assert!(session
        .find_related::<Wheel, Car>(&back, "FrontOf")?
        .into_all()
        .is_empty());

    session.disconnect(&car, "FrontWheels", &front)?;
    assert_eq!(session.persist_changes()?.unlinked, 1);
    assert!(session
        .find_related::<Car, Wheel>(&car, "FrontWheels")?
        .into_all()
        .is_empty());
    Ok(())
}

#[test]
fn connecting_the_wrong_type_fails() -> Result<()> {
    let mut session = garage()?;
    let car = session.spawn_new(Car::new("Beetle", 2))?;
    let other = session.spawn_new(Car::new("Golf", 4))?;
    let wheel = session.spawn_new(Wheel { size: 15.0 })?;

    let err = session.connect(&car, "FrontWheels", &other).unwrap_err();
    assert_eq!(err.code(), "WrongRelationTarget");
    let err = session.connect(&car, "Spoilers", &wheel).unwrap_err();
    assert_eq!(err.code(), "UnknownRelation");
    assert_eq!(err.kind(), ErrorKind::Session);
    Ok(())
}

#[test]
fn disconnecting_a_staged_link_drops_it() -> Result<()> {
    let mut session = garage()?;
    let car = session.spawn_new(Car::new("Beetle", 2))?;
    let wheel = session.spawn_new(Wheel { size: 15.0 })?;
    session.connect(&car, "FrontWheels", &wheel)?;
    session.disconnect(&car, "FrontWheels", &wheel)?;

    let report = session.persist_changes()?;
    assert_eq!((report.inserted(), report.linked, report.unlinked), (2, 0, 0));
    Ok(())
}

#[test]
fn hard_delete_takes_join_rows_along() -> Result<()> {
    let mut session = garage()?;
    let mut car = session.spawn_new(Car::new("Beetle", 2))?;
    let mut wheel = session.spawn_new(Wheel { size: 15.0 })?;
    session.connect(&wheel, "FrontOf", &car)?;
    let report = session.persist_changes()?;
    assert_eq!(report.linked, 1);
    car.mark_persisted(report.assigned());
    wheel.mark_persisted(report.assigned());

    assert_eq!(
        session.find_related::<Car, Wheel>(&car, "FrontWheels")?.into_all().len(),
        1
    );

    session.delete(&car)?;
    assert_eq!(session.persist_changes()?.deleted, 1);
    assert_eq!(session.count::<Car>(None)?, 0);
    assert_eq!(session.count::<Wheel>(None)?, 1);
    assert!(session
        .find_related::<Wheel, Car>(&wheel, "FrontOf")?
        .into_all()
        .is_empty());
    Ok(())
}

#[test]
fn soft_deleted_rows_need_opting_in() -> Result<()> {
    let mut session = garage()?;
    let mut beetle = session.spawn_new(Car::new("Beetle", 2))?;
    session.spawn_new(Car::new("Golf", 4))?;
    let report = session.persist_changes()?;
    beetle.mark_persisted(report.assigned());

    session.soft_delete(&mut beetle)?;
    assert_eq!(session.persist_changes()?.updated, 1);
    assert_eq!(session.count::<Car>(None)?, 1);

    let retired = session
        .find::<Car>(FindOptions::new().include_deleted(true))?
        .into_all();
    assert_eq!(models(&retired), ["Beetle"]);

    let id = beetle.identity().stored_id().expect("persisted");
    let loaded = session.get_by_id::<Car>(id)?.expect("soft-deleted rows stay readable");
    assert!(loaded.retired);

    let mut wheel = session.spawn_new(Wheel { size: 1.0 })?;
    let err = session.soft_delete(&mut wheel).unwrap_err();
    assert_eq!(err.code(), "NoSoftDeleteFlag");
    Ok(())
}

#[test]
fn staged_deletes_hide_stored_rows_before_persist() -> Result<()> {
    let mut session = garage()?;
    let mut beetle = session.spawn_new(Car::new("Beetle", 2))?;
    let mut golf = session.spawn_new(Car::new("Golf", 4))?;
    let mut polo = session.spawn_new(Car::new("Polo", 4))?;
    let report = session.persist_changes()?;
    for car in [&mut beetle, &mut golf, &mut polo] {
        car.mark_persisted(report.assigned());
    }

    session.soft_delete(&mut beetle)?;
    assert!(beetle.retired);
    session.delete(&polo)?;
    let live = session.find::<Car>(FindOptions::new())?;
    assert_eq!(models(live.page()), ["Golf"]);
    assert_eq!(models(&live.into_all()), ["Golf"]);

    beetle.doors = 3;
    session.stage_update(&beetle)?;
    assert_eq!(models(&session.find::<Car>(FindOptions::new())?.into_all()), ["Golf"]);

    let report = session.persist_changes()?;
    assert_eq!((report.updated, report.deleted), (1, 1));
    let id = beetle.identity().stored_id().expect("persisted");
    let stored = session.get_by_id::<Car>(id)?.expect("soft-deleted rows stay readable");
    assert!(stored.retired);
    assert_eq!(stored.doors, 3);
    assert_eq!(session.count::<Car>(None)?, 1);
    Ok(())
}

#[test]
fn pages_follow_the_requested_order() -> Result<()> {
    let mut session = garage()?;
    for (model, doors) in [("Ami", 4), ("Mini", 2), ("Polo", 4), ("Kadett", 3), ("Zoe", 5)] {
        session.spawn_new(Car::new(model, doors))?;
    }
    session.persist_changes()?;

    let mut cursor = session.find::<Car>(
        FindOptions::new()
            .sort_by("Model", SortDirection::Desc)
            .batch_size(2),
    )?;
    assert_eq!(models(cursor.page()), ["Zoe", "Polo"]);
    assert_eq!(models(cursor.next_batch()?), ["Mini", "Kadett"]);
    assert_eq!(models(cursor.next_batch()?), ["Ami"]);
    assert!(!cursor.has_more());

    let newest = session.find::<Car>(
        FindOptions::new()
            .sort_by("Id", SortDirection::Desc)
            .batch_size(2),
    )?;
    assert_eq!(models(newest.page()), ["Zoe", "Kadett"]);
    Ok(())
}

#[derive(Clone, Debug)]
struct Bike;

impl Pawn for Bike {
    const NAME: &'static str = "Bike";

    fn descriptor() -> PawnDescriptor {
        PawnDescriptor::new(Self::NAME)
            .property(PropertyDescriptor::new("Gears", PropertyType::Int8))
    }

    fn to_record(&self) -> Record {
        Record::new()
    }

    fn from_record(_: &Record) -> Result<Self> {
        Ok(Bike)
    }
}

#[test]
fn unregistered_pawns_are_refused() -> Result<()> {
    let session = garage()?;
    let err = session.get_by_id::<Bike>(1).unwrap_err();
    assert_eq!(err.code(), "PawnNotRegistered");
    Ok(())
}

#[test]
fn failed_persist_keeps_the_staged_changes() -> Result<()> {
    init_tracing();
    let mut session = Session::open_in_memory()?;
    session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
    let car = session.spawn_new(Car::new("Beetle", 2))?;

    let err = session.persist_changes().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(session.has_pending_changes());

    session.sync_with_storage()?;
    let report = session.persist_changes()?;
    assert!(report.resolve(car.identity()).is_some());
    assert_eq!(session.count::<Car>(None)?, 1);
    Ok(())
}

#[test]
fn data_outlives_the_session() -> Result<()> {
    init_tracing();
    let dir = tempdir().expect("temp dir");
    let path = dir.path().join("garage.db");
    let id = {
        let mut session = Session::open_sqlite(&path)?;
        session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
        session.sync_with_storage()?;
        let car = session.spawn_new(Car::new("Beetle", 2))?;
        let report = session.persist_changes()?;
        report.resolve(car.identity()).expect("assigned id")
    };

    let mut session = Session::open_sqlite(&path)?;
    session.register_descriptors([Car::descriptor(), Wheel::descriptor()])?;
    assert!(session.sync_with_storage()?.is_unchanged());
    let car = session.get_by_id::<Car>(id)?.expect("stored car");
    assert_eq!(car.identity(), Identity::Stored(id));
    assert_eq!(*car, Car::new("Beetle", 2));
    Ok(())
}
