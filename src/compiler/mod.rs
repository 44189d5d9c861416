//! Graph compilation.
//!
//! [`compile_graph`] is a pure transform from descriptors to a
//! [`CompiledGraph`]. [`GraphCompiler`] wraps it for long-lived owners: it
//! keeps the current graph behind an `Arc` that readers clone freely while
//! recompilation is serialized behind a writer lock and only swaps the graph
//! in once the whole pawn set validated.
#![forbid(unsafe_code)]

pub mod properties;
pub mod relations;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::model::{
    ContainerSchema, DescriptorProvider, NamingEncoder, PawnDescriptor, PlainNamingEncoder,
    RelationSchema, RelationSide,
};
use crate::types::{ModelError, Result};

pub use properties::{resolve_container, PRIMARY_KEY};
pub use relations::resolve_relations;

/// The compiled schema of a pawn set.
#[derive(Clone, Debug, PartialEq)]
pub struct CompiledGraph {
    containers: Vec<ContainerSchema>,
    relations: Vec<RelationSchema>,
}

impl CompiledGraph {
    /// Assembles a graph from already compiled parts.
    pub fn from_parts(containers: Vec<ContainerSchema>, relations: Vec<RelationSchema>) -> Self {
        Self {
            containers,
            relations,
        }
    }

    /// Containers in pawn order.
    pub fn containers(&self) -> &[ContainerSchema] {
        &self.containers
    }

    /// Relations in resolution order.
    pub fn relations(&self) -> &[RelationSchema] {
        &self.relations
    }

    /// Looks up a container by logical pawn name.
    pub fn container(&self, logical_name: &str) -> Option<&ContainerSchema> {
        self.containers
            .iter()
            .find(|c| c.logical_name == logical_name)
    }

    /// Looks up a relation by encoded name.
    pub fn relation(&self, name: &str) -> Option<&RelationSchema> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Resolves a relation field of a pawn, declared directly or as an inverse.
    pub fn relation_for_field(
        &self,
        pawn: &str,
        field: &str,
    ) -> Option<(&RelationSchema, RelationSide)> {
        self.relations
            .iter()
            .find_map(|r| r.side_of(pawn, field).map(|side| (r, side)))
    }

    /// Relations with the pawn at either end.
    pub fn relations_of<'a>(&'a self, pawn: &'a str) -> impl Iterator<Item = &'a RelationSchema> {
        self.relations
            .iter()
            .filter(move |r| r.source_container == pawn || r.target_container == pawn)
    }
}

/// Compiles a pawn set into a schema graph.
///
/// Runs the attribute resolver over every pawn, then the relation resolver
/// over the whole set. The first validation failure aborts the compilation.
pub fn compile_graph(
    pawns: &[PawnDescriptor],
    encoder: &dyn NamingEncoder,
) -> std::result::Result<CompiledGraph, ModelError> {
    if pawns.is_empty() {
        return Err(ModelError::EmptyPawnSet);
    }
    let mut names = HashSet::with_capacity(pawns.len());
    for pawn in pawns {
        if !names.insert(pawn.name.as_str()) {
            return Err(ModelError::DuplicatePawnName {
                name: pawn.name.clone(),
            });
        }
    }

    let containers = pawns
        .iter()
        .map(|pawn| resolve_container(pawn, encoder))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let relations = resolve_relations(pawns, &containers, encoder)?;
    check_storage_names(&containers, &relations)?;

    debug!(
        pawns = pawns.len(),
        containers = containers.len(),
        relations = relations.len(),
        "compiler.compile.done"
    );
    Ok(CompiledGraph {
        containers,
        relations,
    })
}

fn check_storage_names(
    containers: &[ContainerSchema],
    relations: &[RelationSchema],
) -> std::result::Result<(), ModelError> {
    let mut owners: HashMap<&str, &str> = HashMap::new();
    let items = containers
        .iter()
        .map(|c| (c.storage_name.as_str(), c.logical_name.as_str()))
        .chain(relations.iter().map(|r| (r.name.as_str(), r.source_field.as_str())));
    for (storage_name, owner) in items {
        if let Some(first) = owners.insert(storage_name, owner) {
            return Err(ModelError::StorageNameCollision {
                storage_name: storage_name.to_owned(),
                first: first.to_owned(),
                second: owner.to_owned(),
            });
        }
    }
    Ok(())
}

/// Owns the current compiled graph of a process or session.
pub struct GraphCompiler {
    encoder: Arc<dyn NamingEncoder>,
    current: RwLock<Option<Arc<CompiledGraph>>>,
    writer: Mutex<()>,
}

impl Default for GraphCompiler {
    fn default() -> Self {
        Self::new(Arc::new(PlainNamingEncoder))
    }
}

impl GraphCompiler {
    /// Creates a compiler using the supplied naming encoder.
    pub fn new(encoder: Arc<dyn NamingEncoder>) -> Self {
        Self {
            encoder,
            current: RwLock::new(None),
            writer: Mutex::new(()),
        }
    }

    /// The naming encoder used for every compilation.
    pub fn encoder(&self) -> &Arc<dyn NamingEncoder> {
        &self.encoder
    }

    /// Compiles the provider's pawns and replaces the current graph.
    ///
    /// On failure the previous graph stays in place.
    pub fn compile<P>(&self, provider: &P) -> Result<Arc<CompiledGraph>>
    where
        P: DescriptorProvider + ?Sized,
    {
        let _writer = self.writer.lock();
        let pawns = provider.descriptors();
        let graph = Arc::new(compile_graph(&pawns, self.encoder.as_ref())?);
        *self.current.write() = Some(Arc::clone(&graph));
        info!(
            containers = graph.containers().len(),
            relations = graph.relations().len(),
            "compiler.graph.replaced"
        );
        Ok(graph)
    }

    /// The most recently compiled graph.
    pub fn current(&self) -> Option<Arc<CompiledGraph>> {
        self.current.read().clone()
    }
}
