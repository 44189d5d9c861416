//! Business-logic session.
//!
//! A [`Session`] owns a storage provider, the query builder, the compiled
//! graph of its registered pawns and the change buffers. Values are handed
//! out as [`Tracked`] wrappers; edits, deletions and relation changes are
//! staged in memory and written by [`Session::persist_changes`] in one
//! transaction. Queries return a [`StorageCursor`] whose in-memory sets
//! carry the staged state, filtered with the same filter tree as storage.
//!
//! Sessions are single-owner and not synchronized.
#![forbid(unsafe_code)]

pub mod options;
pub mod pawn;
pub mod tracked;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::compiler::{CompiledGraph, GraphCompiler, PRIMARY_KEY};
use crate::filter::{ComparisonOp, FilterNode, FilterTranslator, Predicate};
use crate::model::{
    ContainerSchema, NamingEncoder, PawnDescriptor, RelationSchema, RelationSide,
};
use crate::query::{QueryBuilder, SelectQuery, SortDirection, SqliteQueryBuilder};
use crate::storage::{
    CancelToken, Identity, SqliteStorageProvider, StorageCursor, StorageProvider,
};
use crate::sync::{SchemaSynchronizer, SyncPlan};
use crate::types::{FilterError, Record, Result, SessionError, StorageError, Value};

pub use options::SessionOptions;
pub use pawn::Pawn;
pub use tracked::Tracked;

use tracked::diff_records;

/// Query parameters of [`Session::find`].
#[derive(Clone, Debug, Default)]
pub struct FindOptions {
    /// Optional predicate.
    pub filter: Option<Predicate>,
    /// Overrides the session's soft-delete default.
    pub include_deleted: Option<bool>,
    /// Sort property; the pawn's default sort or the primary key when absent.
    pub sort: Option<String>,
    /// Sort direction.
    pub direction: SortDirection,
    /// Overrides the session's page size.
    pub batch_size: Option<usize>,
}

impl FindOptions {
    /// Everything with session defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts results with a predicate.
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Selects live (`false`) or soft-deleted (`true`) rows.
    pub fn include_deleted(mut self, include: bool) -> Self {
        self.include_deleted = Some(include);
        self
    }

    /// Orders by a property.
    pub fn sort_by(mut self, property: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = Some(property.into());
        self.direction = direction;
        self
    }

    /// Rows per storage page.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }
}

/// Outcome of a successful [`Session::persist_changes`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PersistReport {
    assigned: BTreeMap<u64, i64>,
    /// Rows updated.
    pub updated: usize,
    /// Join rows inserted.
    pub linked: usize,
    /// Join rows deleted by explicit disconnects.
    pub unlinked: usize,
    /// Rows deleted.
    pub deleted: usize,
}

impl PersistReport {
    /// Rows inserted.
    pub fn inserted(&self) -> usize {
        self.assigned.len()
    }

    /// Storage ids assigned to unsaved slots.
    pub fn assigned(&self) -> &BTreeMap<u64, i64> {
        &self.assigned
    }

    /// Storage id of an identity after this persist.
    pub fn resolve(&self, identity: Identity) -> Option<i64> {
        match identity {
            Identity::Stored(id) => Some(id),
            Identity::Local(slot) => self.assigned.get(&slot).copied(),
        }
    }
}

#[derive(Clone, Debug)]
struct StagedInsert {
    pawn: String,
    record: Record,
}

#[derive(Clone, Debug)]
struct StagedUpdate {
    original: Record,
    current: Record,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct StagedLink {
    relation: RelationSchema,
    source: Identity,
    target: Identity,
}

#[derive(Debug, Default)]
struct ChangeBuffer {
    inserts: BTreeMap<u64, StagedInsert>,
    updates: BTreeMap<(String, i64), StagedUpdate>,
    deletes: BTreeSet<(String, i64)>,
    links: Vec<StagedLink>,
    unlinks: Vec<StagedLink>,
}

impl ChangeBuffer {
    fn is_empty(&self) -> bool {
        self.inserts.is_empty()
            && self.updates.is_empty()
            && self.deletes.is_empty()
            && self.links.is_empty()
            && self.unlinks.is_empty()
    }

    fn forget_links_of(&mut self, identity: Identity) {
        self.links
            .retain(|link| link.source != identity && link.target != identity);
    }
}

/// Unit of work over one storage provider.
pub struct Session {
    provider: Arc<dyn StorageProvider>,
    builder: Arc<dyn QueryBuilder>,
    compiler: GraphCompiler,
    descriptors: Vec<PawnDescriptor>,
    options: SessionOptions,
    cancel: CancelToken,
    changes: ChangeBuffer,
    next_slot: u64,
}

impl Session {
    /// A session over `provider` with the SQLite builder and plain naming.
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            builder: Arc::new(SqliteQueryBuilder),
            compiler: GraphCompiler::default(),
            descriptors: Vec::new(),
            options: SessionOptions::default(),
            cancel: CancelToken::new(),
            changes: ChangeBuffer::default(),
            next_slot: 0,
        }
    }

    /// A session over a SQLite database file.
    pub fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Arc::new(SqliteStorageProvider::open(path)?)))
    }

    /// A session over a private in-memory SQLite database.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Arc::new(SqliteStorageProvider::open_in_memory()?)))
    }

    /// Replaces the query builder.
    pub fn with_builder(mut self, builder: Arc<dyn QueryBuilder>) -> Self {
        self.builder = builder;
        self
    }

    /// Replaces the naming encoder. Takes effect at the next registration.
    pub fn with_encoder(mut self, encoder: Arc<dyn NamingEncoder>) -> Self {
        self.compiler = GraphCompiler::new(encoder);
        self
    }

    /// Replaces the options.
    pub fn with_options(mut self, options: SessionOptions) -> Self {
        self.options = options;
        self
    }

    /// Checked between storage round trips of sync, persist and paging.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Active options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// The compiled graph, once something is registered.
    pub fn graph(&self) -> Option<Arc<CompiledGraph>> {
        self.compiler.current()
    }

    /// True while staged changes await [`Session::persist_changes`].
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Registers one pawn type and recompiles.
    pub fn register<T: Pawn>(&mut self) -> Result<Arc<CompiledGraph>> {
        self.register_descriptors([T::descriptor()])
    }

    /// Registers descriptors together and recompiles.
    ///
    /// Pawns that reference each other must arrive in the same call or
    /// after their targets. Descriptors replace earlier ones of the same
    /// name. On failure the previous registration stays in effect.
    pub fn register_descriptors<I>(&mut self, descriptors: I) -> Result<Arc<CompiledGraph>>
    where
        I: IntoIterator<Item = PawnDescriptor>,
    {
        let mut next = self.descriptors.clone();
        for descriptor in descriptors {
            match next.iter_mut().find(|d| d.name == descriptor.name) {
                Some(slot) => *slot = descriptor,
                None => next.push(descriptor),
            }
        }
        let graph = self.compiler.compile(&next)?;
        self.descriptors = next;
        Ok(graph)
    }

    /// Brings storage in line with the registered pawns.
    pub fn sync_with_storage(&self) -> Result<SyncPlan> {
        let graph = self.require_graph()?;
        SchemaSynchronizer::new(self.provider.as_ref(), self.builder.as_ref())
            .with_options(self.options.sync)
            .with_cancel(self.cancel.clone())
            .synchronize_graph(&graph)
    }

    /// Stages a new value; it gets a storage id at the next persist.
    pub fn spawn_new<T: Pawn>(&mut self, value: T) -> Result<Tracked<T>> {
        let graph = self.require_graph()?;
        let container = container_of::<T>(&graph)?;
        let record = value.to_record();
        check_record(container, &record)?;
        let slot = self.next_slot;
        self.next_slot += 1;
        self.changes.inserts.insert(
            slot,
            StagedInsert {
                pawn: T::NAME.to_owned(),
                record,
            },
        );
        debug!(pawn = T::NAME, slot, "session.spawn");
        Ok(Tracked::unsaved(slot, value))
    }

    /// Stages the current state of a value.
    pub fn stage_update<T: Pawn>(&mut self, tracked: &Tracked<T>) -> Result<()> {
        let graph = self.require_graph()?;
        let container = container_of::<T>(&graph)?;
        let record = tracked.to_record();
        check_record(container, &record)?;
        match tracked.identity() {
            Identity::Local(slot) => {
                let staged = self
                    .changes
                    .inserts
                    .get_mut(&slot)
                    .ok_or_else(|| unknown_identity::<T>(tracked.identity()))?;
                staged.record = record;
            }
            Identity::Stored(id) => {
                self.changes
                    .updates
                    .entry((T::NAME.to_owned(), id))
                    .and_modify(|staged| staged.current = record.clone())
                    .or_insert_with(|| StagedUpdate {
                        original: tracked.original().clone(),
                        current: record,
                    });
            }
        }
        Ok(())
    }

    /// Stages a hard delete. Join rows of the value go with it.
    pub fn delete<T: Pawn>(&mut self, tracked: &Tracked<T>) -> Result<()> {
        let graph = self.require_graph()?;
        container_of::<T>(&graph)?;
        let identity = tracked.identity();
        match identity {
            Identity::Local(slot) => {
                if self.changes.inserts.remove(&slot).is_none() {
                    return Err(unknown_identity::<T>(identity));
                }
            }
            Identity::Stored(id) => {
                let key = (T::NAME.to_owned(), id);
                self.changes.updates.remove(&key);
                self.changes.deletes.insert(key);
            }
        }
        self.changes.forget_links_of(identity);
        Ok(())
    }

    /// Sets the soft-delete flag on `tracked` and stages the result.
    ///
    /// The value itself carries the flag afterwards, so later
    /// [`Session::stage_update`] calls keep it set.
    pub fn soft_delete<T: Pawn>(&mut self, tracked: &mut Tracked<T>) -> Result<()> {
        let graph = self.require_graph()?;
        let container = container_of::<T>(&graph)?;
        let flag = container
            .soft_delete_property()
            .ok_or_else(|| SessionError::NoSoftDeleteFlag {
                pawn: T::NAME.to_owned(),
            })?
            .name
            .clone();
        let mut record = tracked.to_record();
        record.set(flag.clone(), true);
        **tracked = decode::<T>(&record)?;
        self.stage_update(tracked)?;
        match tracked.identity() {
            Identity::Local(slot) => {
                if let Some(staged) = self.changes.inserts.get_mut(&slot) {
                    staged.record.set(flag, true);
                }
            }
            Identity::Stored(id) => {
                if let Some(staged) = self.changes.updates.get_mut(&(T::NAME.to_owned(), id)) {
                    staged.current.set(flag, true);
                }
            }
        }
        Ok(())
    }

    /// Stages a connection through `field` of `from`.
    pub fn connect<A: Pawn, B: Pawn>(
        &mut self,
        from: &Tracked<A>,
        field: &str,
        to: &Tracked<B>,
    ) -> Result<()> {
        let graph = self.require_graph()?;
        let (relation, side) = resolve_field::<A, B>(&graph, field)?;
        let (source, target) = oriented(side, from.identity(), to.identity());
        let link = StagedLink {
            relation,
            source,
            target,
        };
        self.changes.unlinks.retain(|l| l != &link);
        if !self.changes.links.contains(&link) {
            self.changes.links.push(link);
        }
        Ok(())
    }

    /// Stages removing a connection through `field` of `from`.
    pub fn disconnect<A: Pawn, B: Pawn>(
        &mut self,
        from: &Tracked<A>,
        field: &str,
        to: &Tracked<B>,
    ) -> Result<()> {
        let graph = self.require_graph()?;
        let (relation, side) = resolve_field::<A, B>(&graph, field)?;
        let (source, target) = oriented(side, from.identity(), to.identity());
        let link = StagedLink {
            relation,
            source,
            target,
        };
        let staged = self.changes.links.len();
        self.changes.links.retain(|l| l != &link);
        if self.changes.links.len() != staged {
            return Ok(());
        }
        let persisted = source.stored_id().is_some() && target.stored_id().is_some();
        if persisted && !self.changes.unlinks.contains(&link) {
            self.changes.unlinks.push(link);
        }
        Ok(())
    }

    /// Queries one pawn type.
    ///
    /// The storage page reflects persisted rows, minus rows whose staged
    /// state no longer matches the filter and rows staged for deletion.
    /// Staged values that match come back as the cursor's unsaved and
    /// buffered sets.
    pub fn find<T: Pawn>(&self, options: FindOptions) -> Result<StorageCursor<Tracked<T>>> {
        let graph = self.require_graph()?;
        let container = container_of::<T>(&graph)?;
        let include_deleted = options
            .include_deleted
            .unwrap_or(self.options.include_soft_deleted);
        let filter = FilterTranslator::new(container).translate(options.filter.as_ref(), include_deleted)?;
        let sort = match options.sort {
            Some(sort) if sort == PRIMARY_KEY => None,
            Some(sort) => {
                if container.property(&sort).is_none() {
                    return Err(FilterError::UnknownProperty {
                        pawn: T::NAME.to_owned(),
                        property: sort,
                    }
                    .into());
                }
                Some(sort)
            }
            None => container.default_sort_property().map(|p| p.name.clone()),
        };

        let unsaved = self.unsaved_matching::<T>(filter.as_ref())?;
        let buffered = self.buffered_matching::<T>(filter.as_ref())?;
        let filter = self
            .stale_ids::<T>(filter.as_ref())
            .into_iter()
            .fold(filter, |filter, id| {
                let hidden = FilterNode::leaf(PRIMARY_KEY, ComparisonOp::NotEq, id);
                Some(match filter {
                    Some(filter) => filter.and(hidden),
                    None => hidden,
                })
            });

        let provider = Arc::clone(&self.provider);
        let builder = Arc::clone(&self.builder);
        let table = container.storage_name.clone();
        let direction = options.direction;
        let source = move |offset: usize, limit: usize| -> Result<Vec<Tracked<T>>> {
            let query = SelectQuery::new(&table, offset, limit)
                .filter(filter.as_ref())
                .sort_by(sort.as_deref(), direction);
            provider
                .execute_query(&builder.select(&query))?
                .iter()
                .map(decode_row::<T>)
                .collect()
        };
        let cursor = StorageCursor::<Tracked<T>>::open(
            Box::new(source),
            options.batch_size.unwrap_or(self.options.batch_size),
            self.cancel.clone(),
        )?;
        Ok(cursor.with_unsaved(unsaved).with_buffered(buffered))
    }

    /// Values connected to `from` through `field`.
    ///
    /// Staged connections are merged in; staged disconnects and deletes
    /// show once persisted.
    pub fn find_related<A: Pawn, B: Pawn>(
        &self,
        from: &Tracked<A>,
        field: &str,
    ) -> Result<StorageCursor<Tracked<B>>> {
        let graph = self.require_graph()?;
        let (relation, side) = resolve_field::<A, B>(&graph, field)?;
        let near = from.identity();

        let mut unsaved = Vec::new();
        let mut buffered = Vec::new();
        for link in self.changes.links.iter().filter(|l| l.relation == relation) {
            let far = match side {
                RelationSide::Source if link.source == near => link.target,
                RelationSide::Target if link.target == near => link.source,
                _ => continue,
            };
            match far {
                Identity::Local(slot) => {
                    if let Some(staged) = self.changes.inserts.get(&slot) {
                        unsaved.push(Tracked::unsaved(slot, decode::<B>(&staged.record)?));
                    }
                }
                Identity::Stored(id) => {
                    if let Some(tracked) = self.get_by_id::<B>(id)? {
                        buffered.push(tracked);
                    }
                }
            }
        }

        let batch_size = self.options.batch_size;
        let cursor = match near.stored_id() {
            Some(id) => {
                let provider = Arc::clone(&self.provider);
                let builder = Arc::clone(&self.builder);
                let relation = relation.clone();
                let source = move |offset: usize, limit: usize| -> Result<Vec<Tracked<B>>> {
                    let statement = builder.select_related(&relation, side, id, offset, limit);
                    provider
                        .execute_query(&statement)?
                        .iter()
                        .map(decode_row::<B>)
                        .collect()
                };
                StorageCursor::<Tracked<B>>::open(Box::new(source), batch_size, self.cancel.clone())?
            }
            None => StorageCursor::from_page(Vec::new()),
        };
        Ok(cursor.with_unsaved(unsaved).with_buffered(buffered))
    }

    /// Loads one value by storage id, preferring its staged state.
    ///
    /// Soft-deleted rows are returned as well.
    pub fn get_by_id<T: Pawn>(&self, id: i64) -> Result<Option<Tracked<T>>> {
        let graph = self.require_graph()?;
        let container = container_of::<T>(&graph)?;
        if let Some(staged) = self.changes.updates.get(&(T::NAME.to_owned(), id)) {
            return Ok(Some(Tracked::with_original(
                Identity::Stored(id),
                staged.original.clone(),
                decode::<T>(&staged.current)?,
            )));
        }
        let filter = FilterNode::leaf(PRIMARY_KEY, ComparisonOp::Eq, id);
        let query = SelectQuery::new(&container.storage_name, 0, 1).filter(Some(&filter));
        let rows = self.provider.execute_query(&self.builder.select(&query))?;
        rows.first().map(decode_row::<T>).transpose()
    }

    /// Number of persisted rows matching `filter`.
    pub fn count<T: Pawn>(&self, filter: Option<&Predicate>) -> Result<u64> {
        let graph = self.require_graph()?;
        let container = container_of::<T>(&graph)?;
        let filter = FilterTranslator::new(container)
            .translate(filter, self.options.include_soft_deleted)?;
        let rows = self
            .provider
            .execute_query(&self.builder.count(&container.storage_name, filter.as_ref()))?;
        let count = match rows.first() {
            Some(row) => row.get_i64("count")?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Writes every staged change in one transaction.
    ///
    /// Order: inserts, updates, links, unlinks, deletes. On failure storage
    /// is reverted and the staged changes stay in place for a retry.
    pub fn persist_changes(&mut self) -> Result<PersistReport> {
        if self.changes.is_empty() {
            return Ok(PersistReport::default());
        }
        let graph = self.require_graph()?;
        self.provider.begin_transaction()?;
        match self.write_changes(&graph) {
            Ok(report) => {
                self.provider.commit()?;
                self.changes = ChangeBuffer::default();
                info!(
                    inserted = report.inserted(),
                    updated = report.updated,
                    linked = report.linked,
                    unlinked = report.unlinked,
                    deleted = report.deleted,
                    "session.persist.done"
                );
                Ok(report)
            }
            Err(err) => {
                warn!(error = %err, code = err.code(), "session.persist.revert");
                if let Err(revert_err) = self.provider.revert() {
                    warn!(error = %revert_err, "session.persist.revert_failed");
                }
                Err(err)
            }
        }
    }

    fn write_changes(&self, graph: &CompiledGraph) -> Result<PersistReport> {
        let mut report = PersistReport::default();
        let table = |pawn: &str| -> Result<String> {
            graph
                .container(pawn)
                .map(|c| c.storage_name.clone())
                .ok_or_else(|| {
                    SessionError::PawnNotRegistered {
                        pawn: pawn.to_owned(),
                    }
                    .into()
                })
        };

        for (slot, staged) in &self.changes.inserts {
            self.cancel.check("persist changes")?;
            let rows = self
                .provider
                .execute_query(&self.builder.insert(&table(&staged.pawn)?, &staged.record))?;
            let id = rows
                .first()
                .ok_or_else(|| StorageError::Backend("insert returned no id".into()))?
                .get_i64(PRIMARY_KEY)?;
            report.assigned.insert(*slot, id);
        }

        for ((pawn, id), staged) in &self.changes.updates {
            let changes = diff_records(&staged.original, &staged.current);
            if changes.is_empty() {
                continue;
            }
            self.cancel.check("persist changes")?;
            self.provider
                .execute(&self.builder.update(&table(pawn)?, *id, &changes))?;
            report.updated += 1;
        }

        for link in &self.changes.links {
            self.cancel.check("persist changes")?;
            let relation = &link.relation;
            let resolve = |identity: Identity| {
                report
                    .resolve(identity)
                    .ok_or_else(|| SessionError::UnknownIdentity {
                        pawn: relation.source_container.clone(),
                        identity: identity.to_string(),
                    })
            };
            let (source, target) = (resolve(link.source)?, resolve(link.target)?);
            self.provider
                .execute(&self.builder.link(relation, source, target))?;
            report.linked += 1;
        }

        for link in &self.changes.unlinks {
            let (Some(source), Some(target)) = (link.source.stored_id(), link.target.stored_id())
            else {
                continue;
            };
            self.cancel.check("persist changes")?;
            report.unlinked += self
                .provider
                .execute(&self.builder.unlink(&link.relation, source, target))?;
        }

        for (pawn, id) in &self.changes.deletes {
            self.cancel.check("persist changes")?;
            for relation in graph.relations_of(pawn) {
                if relation.source_container == *pawn {
                    self.provider
                        .execute(&self.builder.unlink_all(relation, RelationSide::Source, *id))?;
                }
                if relation.target_container == *pawn {
                    self.provider
                        .execute(&self.builder.unlink_all(relation, RelationSide::Target, *id))?;
                }
            }
            report.deleted += self
                .provider
                .execute(&self.builder.delete(&table(pawn)?, *id))?;
        }
        Ok(report)
    }

    fn require_graph(&self) -> Result<Arc<CompiledGraph>> {
        self.compiler
            .current()
            .ok_or_else(|| SessionError::NotCompiled.into())
    }

    fn unsaved_matching<T: Pawn>(&self, filter: Option<&FilterNode>) -> Result<Vec<Tracked<T>>> {
        self.changes
            .inserts
            .iter()
            .filter(|(_, staged)| staged.pawn == T::NAME)
            .filter(|(_, staged)| filter.map_or(true, |f| f.matches(&staged.record)))
            .map(|(slot, staged)| Ok(Tracked::unsaved(*slot, decode::<T>(&staged.record)?)))
            .collect()
    }

    fn buffered_matching<T: Pawn>(&self, filter: Option<&FilterNode>) -> Result<Vec<Tracked<T>>> {
        let mut out = Vec::new();
        for ((pawn, id), staged) in &self.changes.updates {
            if pawn != T::NAME {
                continue;
            }
            let row = staged.current.clone().with(PRIMARY_KEY, *id);
            if filter.map_or(true, |f| f.matches(&row)) {
                out.push(Tracked::with_original(
                    Identity::Stored(*id),
                    staged.original.clone(),
                    decode::<T>(&staged.current)?,
                ));
            }
        }
        Ok(out)
    }

    /// Stored ids of `T` whose persisted row must not show: staged deletes
    /// and staged updates that fall out of `filter`.
    fn stale_ids<T: Pawn>(&self, filter: Option<&FilterNode>) -> Vec<i64> {
        let deleted = self
            .changes
            .deletes
            .iter()
            .filter(|(pawn, _)| pawn == T::NAME)
            .map(|(_, id)| *id);
        let moved = self
            .changes
            .updates
            .iter()
            .filter(|((pawn, _), _)| pawn == T::NAME)
            .filter(|((_, id), staged)| {
                let row = staged.current.clone().with(PRIMARY_KEY, *id);
                filter.map_or(false, |f| !f.matches(&row))
            })
            .map(|((_, id), _)| *id);
        deleted.chain(moved).collect()
    }
}

fn container_of<T: Pawn>(graph: &CompiledGraph) -> Result<&ContainerSchema> {
    graph.container(T::NAME).ok_or_else(|| {
        SessionError::PawnNotRegistered {
            pawn: T::NAME.to_owned(),
        }
        .into()
    })
}

fn resolve_field<A: Pawn, B: Pawn>(
    graph: &CompiledGraph,
    field: &str,
) -> Result<(RelationSchema, RelationSide)> {
    container_of::<A>(graph)?;
    container_of::<B>(graph)?;
    let (relation, side) =
        graph
            .relation_for_field(A::NAME, field)
            .ok_or_else(|| SessionError::UnknownRelation {
                pawn: A::NAME.to_owned(),
                field: field.to_owned(),
            })?;
    let far = match side {
        RelationSide::Source => &relation.target_container,
        RelationSide::Target => &relation.source_container,
    };
    if far != B::NAME {
        return Err(SessionError::WrongRelationTarget {
            pawn: A::NAME.to_owned(),
            field: field.to_owned(),
            expected: far.clone(),
            found: B::NAME.to_owned(),
        }
        .into());
    }
    Ok((relation.clone(), side))
}

fn oriented(side: RelationSide, near: Identity, far: Identity) -> (Identity, Identity) {
    match side {
        RelationSide::Source => (near, far),
        RelationSide::Target => (far, near),
    }
}

fn check_record(container: &ContainerSchema, record: &Record) -> Result<()> {
    for property in &container.properties {
        let value = record.get(&property.name).unwrap_or(&Value::Null);
        property
            .check(value)
            .map_err(|reason| SessionError::ConstraintViolation {
                pawn: container.logical_name.clone(),
                property: property.name.clone(),
                reason,
            })?;
    }
    Ok(())
}

fn decode<T: Pawn>(record: &Record) -> Result<T> {
    T::from_record(record).map_err(|err| {
        SessionError::Decode {
            pawn: T::NAME.to_owned(),
            reason: err.to_string(),
        }
        .into()
    })
}

fn decode_row<T: Pawn>(row: &Record) -> Result<Tracked<T>> {
    let id = row.get_i64(PRIMARY_KEY)?;
    Ok(Tracked::stored(id, decode::<T>(row)?))
}

fn unknown_identity<T: Pawn>(identity: Identity) -> crate::types::PawnError {
    SessionError::UnknownIdentity {
        pawn: T::NAME.to_owned(),
        identity: identity.to_string(),
    }
    .into()
}
