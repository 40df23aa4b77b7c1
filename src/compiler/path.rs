//! Path resolution.
//!
//! Resolves a dotted navigation path rooted at an identification variable
//! into the chain of relationships it crosses and the attribute, entity or
//! column it ends at.
//!
//! Every relationship prefix of a path gets a synthetic identification
//! variable whose name is the normalized prefix text (`a.toGallery`), so
//! repeated references to the same path always land on the same variable.

use std::sync::Arc;

use serde::Serialize;

use crate::ast::{strip_outer_marker, PathExpr};
use crate::catalog::{EntityCatalog, EntityDescriptor, JoinHop, Property, Relationship, ValueType};

use super::error::{CompileError, CompileResult};
use super::ident::IdentificationVariableTable;

/// How strictly the last segment is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathMode {
    /// Any property may end the path.
    Navigation,
    /// The path must end in a relationship (join targets).
    Join,
}

/// A relationship crossed by a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationshipRef {
    /// Entity owning the relationship.
    pub entity: String,
    pub name: String,
    pub target: String,
    pub to_many: bool,
}

impl RelationshipRef {
    fn new(owner: &EntityDescriptor, rel: &Relationship) -> Self {
        Self {
            entity: owner.name.clone(),
            name: rel.name.clone(),
            target: rel.target.clone(),
            to_many: rel.to_many,
        }
    }
}

/// Record of one relationship traversal ending at `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalRecord {
    /// Variable the path starts from.
    pub source: String,
    /// Variable bound to the traversal's end (synthetic or join alias).
    pub target: String,
    /// The relationship that reached `target`.
    pub relationship: RelationshipRef,
    /// Every relationship from `source` to `target`, in order.
    pub chain: Vec<RelationshipRef>,
    /// Db joins underlying `chain`, flattened in order.
    pub hops: Vec<JoinHop>,
    /// Outer join requested for this step.
    pub outer: bool,
}

/// Attribute a path ends at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeRef {
    pub entity: String,
    pub attribute: String,
    pub column: String,
    pub value_type: ValueType,
}

/// What a path ends at.
#[derive(Debug, Clone)]
pub enum PathTerminal {
    Attribute(AttributeRef),
    /// A whole entity: either the root variable or a relationship target.
    Entity {
        variable: String,
        entity: Arc<EntityDescriptor>,
    },
    /// A db column reached through a db path.
    Column { table: String, column: String },
}

/// Fully resolved path.
#[derive(Debug, Clone)]
pub struct ResolvedPath {
    /// Table key of the root variable.
    pub id: String,
    /// Canonical text, rooted at `id`, markers removed.
    pub text: String,
    pub root: Arc<EntityDescriptor>,
    /// One record per relationship prefix, shortest first.
    pub traversals: Vec<TraversalRecord>,
    pub terminal: PathTerminal,
}

impl ResolvedPath {
    /// Entity the path ends at, when it ends at one.
    pub fn terminal_entity(&self) -> Option<(&str, &Arc<EntityDescriptor>)> {
        match &self.terminal {
            PathTerminal::Entity { variable, entity } => Some((variable.as_str(), entity)),
            _ => None,
        }
    }

    /// Does the path end by navigating a relationship?
    pub fn ends_in_relationship(&self) -> bool {
        matches!(
            (&self.terminal, self.traversals.last()),
            (PathTerminal::Entity { variable, .. }, Some(last)) if *variable == last.target
        )
    }
}

/// Resolves paths against the catalog and the variable table.
pub struct PathResolver<'a> {
    catalog: &'a EntityCatalog,
    max_segments: usize,
}

impl<'a> PathResolver<'a> {
    pub fn new(catalog: &'a EntityCatalog, max_segments: usize) -> Self {
        Self {
            catalog,
            max_segments,
        }
    }

    /// Resolve an object path.
    ///
    /// The table is only read; registering the synthetic variables named by
    /// the produced traversals is the caller's job.
    pub fn resolve(
        &self,
        table: &IdentificationVariableTable,
        path: &PathExpr,
        mode: PathMode,
    ) -> CompileResult<ResolvedPath> {
        let (id, root) = self.resolve_root(table, path)?;
        let written = path.text();

        let mut descriptor = Arc::clone(&root);
        let mut text = id.clone();
        let mut chain: Vec<RelationshipRef> = Vec::new();
        let mut hops: Vec<JoinHop> = Vec::new();
        let mut traversals: Vec<TraversalRecord> = Vec::new();
        let mut attribute = None;

        let last = path.len() - 1;
        for (idx, raw) in path.segments.iter().enumerate().skip(1) {
            let (segment, outer) = strip_outer_marker(raw);
            text.push('.');
            text.push_str(segment);

            match descriptor.property(segment) {
                Some(Property::Relationship(rel)) => {
                    let target = Arc::clone(self.catalog.lookup(&rel.target)?);
                    let step = RelationshipRef::new(&descriptor, rel);
                    chain.push(step.clone());
                    hops.extend(rel.hops.iter().cloned());

                    traversals.push(TraversalRecord {
                        source: id.clone(),
                        target: text.clone(),
                        relationship: step,
                        chain: chain.clone(),
                        hops: hops.clone(),
                        outer,
                    });
                    descriptor = target;
                }
                Some(Property::Attribute(attr)) if idx == last && mode == PathMode::Navigation => {
                    attribute = Some(AttributeRef {
                        entity: descriptor.name.clone(),
                        attribute: attr.name.clone(),
                        column: attr.column.clone(),
                        value_type: attr.value_type,
                    });
                }
                None if idx == last && mode == PathMode::Navigation => {
                    return Err(CompileError::unmapped(segment, &written));
                }
                _ => return Err(CompileError::not_a_relationship(segment, &written)),
            }
        }

        let terminal = match attribute {
            Some(attribute) => PathTerminal::Attribute(attribute),
            None if mode == PathMode::Join && traversals.is_empty() => {
                return Err(CompileError::not_a_relationship(&id, &written));
            }
            None => PathTerminal::Entity {
                variable: text.clone(),
                entity: descriptor,
            },
        };

        tracing::trace!(target: "objql.compiler", path = %text, "resolved path");

        Ok(ResolvedPath {
            id,
            text,
            root,
            traversals,
            terminal,
        })
    }

    /// Resolve a db path: middle segments name db join hops, the last names
    /// a column of the table reached.
    pub fn resolve_db(
        &self,
        table: &IdentificationVariableTable,
        path: &PathExpr,
    ) -> CompileResult<ResolvedPath> {
        let (id, root) = self.resolve_root(table, path)?;
        let written = path.text();
        if path.len() < 2 {
            return Err(CompileError::unmapped(&id, &written));
        }

        let mut position = DbPosition::Entity(Arc::clone(&root));
        let mut text = id.clone();
        let last = path.len() - 1;

        for (idx, raw) in path.segments.iter().enumerate().skip(1) {
            let (segment, _) = strip_outer_marker(raw);
            text.push('.');
            text.push_str(segment);

            if idx == last {
                if !position.has_column(segment) {
                    return Err(CompileError::unmapped(segment, &written));
                }
                let terminal = PathTerminal::Column {
                    table: position.table().to_string(),
                    column: segment.to_string(),
                };
                tracing::trace!(target: "objql.compiler", path = %text, "resolved db path");
                return Ok(ResolvedPath {
                    id,
                    text,
                    root,
                    traversals: vec![],
                    terminal,
                });
            }

            position = self.step_db(position, segment, &written)?;
        }

        Err(CompileError::unmapped(&id, &written))
    }

    fn step_db(
        &self,
        position: DbPosition,
        segment: &str,
        written: &str,
    ) -> CompileResult<DbPosition> {
        let (rel, hop) = match &position {
            DbPosition::Entity(entity) => {
                let (rel, hop) = entity
                    .relationship_by_hop(segment)
                    .filter(|(_, hop)| *hop == 0)
                    .ok_or_else(|| CompileError::unmapped(segment, written))?;
                (rel.clone(), hop)
            }
            DbPosition::JoinTable { relationship, hop } => {
                let next = hop + 1;
                match relationship.hops.get(next) {
                    Some(h) if h.name == segment => (relationship.clone(), next),
                    _ => return Err(CompileError::unmapped(segment, written)),
                }
            }
        };

        if hop + 1 == rel.hops.len() {
            Ok(DbPosition::Entity(Arc::clone(self.catalog.lookup(&rel.target)?)))
        } else {
            Ok(DbPosition::JoinTable {
                relationship: rel,
                hop,
            })
        }
    }

    fn resolve_root(
        &self,
        table: &IdentificationVariableTable,
        path: &PathExpr,
    ) -> CompileResult<(String, Arc<EntityDescriptor>)> {
        let Some(first) = path.id() else {
            return Err(CompileError::InvalidStatement("empty path".to_string()));
        };
        if path.len() > self.max_segments {
            return Err(CompileError::PathTooLong {
                path: path.text(),
                segments: path.len(),
                limit: self.max_segments,
            });
        }

        let (first, _) = strip_outer_marker(first);
        let binding = table
            .binding(first)
            .ok_or_else(|| CompileError::unmapped(first, path.text()))?;
        Ok((binding.key.clone(), Arc::clone(&binding.entity)))
    }
}

/// Where a db path walk currently stands.
enum DbPosition {
    Entity(Arc<EntityDescriptor>),
    /// Inside a flattened relationship, after `hop`.
    JoinTable { relationship: Relationship, hop: usize },
}

impl DbPosition {
    fn table(&self) -> &str {
        match self {
            DbPosition::Entity(entity) => &entity.table,
            DbPosition::JoinTable { relationship, hop } => &relationship.hops[*hop].target_table,
        }
    }

    fn has_column(&self, column: &str) -> bool {
        match self {
            DbPosition::Entity(entity) => entity.columns().contains(&column),
            // Join tables have no descriptor; the join columns on either
            // side are all that is known about them.
            DbPosition::JoinTable { relationship, hop } => {
                let incoming = relationship.hops[*hop].columns.iter().map(|c| &c.target);
                let outgoing = relationship.hops[*hop + 1].columns.iter().map(|c| &c.source);
                incoming.chain(outgoing).any(|c| c == column)
            }
        }
    }
}
