//! Relation resolution across the whole pawn set.
#![forbid(unsafe_code)]

use std::collections::HashMap;

use tracing::debug;

use crate::model::{
    ContainerSchema, InverseEnd, NamingEncoder, PawnDescriptor, RelationField, RelationSchema,
};
use crate::types::ModelError;

/// A relation field seen from its declaring pawn, before merging.
#[derive(Debug)]
struct LooseEnd<'a> {
    pawn: &'a str,
    field: &'a RelationField,
    name: String,
    source_storage: String,
    target_storage: String,
}

/// Resolves every relation field into relation schemas.
///
/// Loose ends of one pawn must encode to distinct names. A loose end whose
/// name was already produced by the opposite endpoint becomes the inverse
/// side of that relation.
pub fn resolve_relations(
    pawns: &[PawnDescriptor],
    containers: &[ContainerSchema],
    encoder: &dyn NamingEncoder,
) -> Result<Vec<RelationSchema>, ModelError> {
    let storage_of: HashMap<&str, &str> = containers
        .iter()
        .map(|c| (c.logical_name.as_str(), c.storage_name.as_str()))
        .collect();

    let mut relations: Vec<RelationSchema> = Vec::new();
    let mut by_name: HashMap<String, usize> = HashMap::new();

    for pawn in pawns {
        let loose_ends = collect_loose_ends(pawn, &storage_of, encoder)?;
        for end in loose_ends {
            if let Some(&idx) = by_name.get(&end.name) {
                merge_inverse(&mut relations[idx], &end)?;
                continue;
            }
            by_name.insert(end.name.clone(), relations.len());
            relations.push(RelationSchema {
                name: end.name,
                multiplexer: end.field.multiplexer.clone(),
                source_container: end.pawn.to_owned(),
                source_storage: end.source_storage,
                target_container: end.field.target.clone(),
                target_storage: end.target_storage,
                source_field: end.field.field.clone(),
                min_connections: end.field.min,
                max_connections: end.field.max,
                inverse: None,
            });
        }
    }
    Ok(relations)
}

fn collect_loose_ends<'a>(
    pawn: &'a PawnDescriptor,
    storage_of: &HashMap<&str, &str>,
    encoder: &dyn NamingEncoder,
) -> Result<Vec<LooseEnd<'a>>, ModelError> {
    let mut ends: Vec<LooseEnd<'a>> = Vec::with_capacity(pawn.relations.len());
    let source_storage = storage_of
        .get(pawn.name.as_str())
        .map(|s| (*s).to_owned())
        .unwrap_or_else(|| pawn.name.clone());
    for field in &pawn.relations {
        let Some(target_storage) = storage_of.get(field.target.as_str()) else {
            return Err(ModelError::UnknownRelationTarget {
                pawn: pawn.name.clone(),
                field: field.field.clone(),
                target: field.target.clone(),
            });
        };
        if field.min > field.max {
            return Err(ModelError::InvalidRelationBounds {
                pawn: pawn.name.clone(),
                field: field.field.clone(),
                min: field.min,
                max: field.max,
            });
        }
        let name = encoder.encode_relation_name(&pawn.name, &field.target, &field.multiplexer);
        if let Some(first) = ends.iter().find(|end| end.name == name) {
            return Err(ModelError::DuplicateRelation {
                pawn: pawn.name.clone(),
                relation: name,
                first: first.field.field.clone(),
                second: field.field.clone(),
            });
        }
        ends.push(LooseEnd {
            pawn: &pawn.name,
            field,
            name,
            source_storage: source_storage.clone(),
            target_storage: (*target_storage).to_owned(),
        });
    }
    Ok(ends)
}

fn merge_inverse(relation: &mut RelationSchema, end: &LooseEnd<'_>) -> Result<(), ModelError> {
    let points_back = relation.source_container == end.field.target
        && relation.target_container == end.pawn;
    if !points_back || relation.inverse.is_some() {
        return Err(ModelError::AmbiguousRelation {
            relation: relation.name.clone(),
            pawn: end.pawn.to_owned(),
            field: end.field.field.clone(),
        });
    }
    debug!(
        relation = %relation.name,
        source = %relation.source_container,
        inverse = %end.pawn,
        field = %end.field.field,
        "compiler.relation.merged"
    );
    relation.inverse = Some(InverseEnd {
        field: end.field.field.clone(),
        min_connections: end.field.min,
        max_connections: end.field.max,
    });
    Ok(())
}
