//! Result shape.
//!
//! Each top-level select item becomes one result component: a scalar column
//! (attribute paths, aggregates, literals and other expressions) or an entity
//! result carrying one field per column needed to rebuild the object.
//!
//! Select items are collected as [`PendingComponent`]s during the structural
//! pass and only turned into components here, once every path is resolved.
//!
//! ## Column naming
//!
//! | Component        | Column alias                        |
//! |------------------|-------------------------------------|
//! | scalar at N      | `sc{N}` or the explicit alias       |
//! | entity at N      | `ec{N}_{k}` for its k-th column     |
//! | prefetched path  | `{path}{k}`, dots replaced by `_`   |

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::ast::visit::PathKind;
use crate::ast::{AggregateFunction, PathExpr};
use crate::catalog::{EntityDescriptor, ValueType};

use super::context::resolved_key;
use super::error::{CompileError, CompileResult};
use super::ident::IdentificationVariableTable;
use super::path::{PathTerminal, ResolvedPath};
use super::prefetch::PrefetchTree;

// ============================================================================
// Pending components
// ============================================================================

/// Argument of a pending aggregate.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregateArg {
    Path(PathExpr, PathKind),
    Variable(String),
    /// Any other expression, with its type when known.
    Typed(Option<ValueType>),
}

/// A select item awaiting materialization.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingComponent {
    Entity {
        variable: String,
        alias: Option<String>,
        /// Produced from a path denoting a related entity.
        canonical: bool,
    },
    Path {
        path: PathExpr,
        kind: PathKind,
        alias: Option<String>,
    },
    Aggregate {
        function: AggregateFunction,
        distinct: bool,
        arg: AggregateArg,
        alias: Option<String>,
    },
    Scalar {
        value_type: Option<ValueType>,
        alias: Option<String>,
    },
}

/// Replace select paths that end in a relationship with entity components
/// on the relationship's synthetic variable.
///
/// Returns the rewritten list and the variable of the first rewritten item.
pub fn canonicalize(
    pending: Vec<PendingComponent>,
    resolved: &HashMap<String, ResolvedPath>,
) -> (Vec<PendingComponent>, Option<String>) {
    let mut first = None;
    let components = pending
        .into_iter()
        .map(|component| match component {
            PendingComponent::Path {
                path,
                kind: PathKind::Object,
                alias,
            } => match resolved.get(&resolved_key(&path, PathKind::Object)) {
                Some(r) if r.ends_in_relationship() => {
                    first.get_or_insert_with(|| r.text.clone());
                    PendingComponent::Entity {
                        variable: r.text.clone(),
                        alias,
                        canonical: true,
                    }
                }
                _ => PendingComponent::Path {
                    path,
                    kind: PathKind::Object,
                    alias,
                },
            },
            other => other,
        })
        .collect();
    (components, first)
}

// ============================================================================
// Result components
// ============================================================================

/// A single scalar result column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScalarColumn {
    /// Column alias in the generated SQL.
    pub column: String,
    /// Resolved path, when the column reads one.
    pub path: Option<String>,
    pub value_type: Option<ValueType>,
    pub aggregate: Option<AggregateFunction>,
}

/// One field → column binding of an entity result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldResult {
    /// Attribute name, or the column path for key and discriminator columns.
    pub field: String,
    /// Db column path read by the field.
    pub db_path: String,
    /// Column alias in the generated SQL.
    pub column: String,
}

/// A full entity in one result row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityResult {
    pub variable: String,
    pub entity: String,
    pub object_class: String,
    pub prefix: String,
    pub fields: Vec<FieldResult>,
}

impl EntityResult {
    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|f| f.field == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultComponent {
    Scalar(ScalarColumn),
    Entity(EntityResult),
}

/// Ordered result mapping of a compiled select.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ResultShape {
    components: Vec<ResultComponent>,
}

impl ResultShape {
    pub fn components(&self) -> &[ResultComponent] {
        &self.components
    }

    pub fn get(&self, position: usize) -> Option<&ResultComponent> {
        self.components.get(position)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn scalars(&self) -> impl Iterator<Item = &ScalarColumn> {
        self.components.iter().filter_map(|c| match c {
            ResultComponent::Scalar(s) => Some(s),
            _ => None,
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityResult> {
        self.components.iter().filter_map(|c| match c {
            ResultComponent::Entity(e) => Some(e),
            _ => None,
        })
    }

    /// Every column alias, in row order.
    pub fn column_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        for component in &self.components {
            match component {
                ResultComponent::Scalar(s) => names.push(s.column.as_str()),
                ResultComponent::Entity(e) => {
                    names.extend(e.fields.iter().map(|f| f.column.as_str()))
                }
            }
        }
        names
    }
}

/// Type of an aggregate over an argument of type `arg`.
///
/// COUNT is always `Int64` and AVG always `Float64`. SUM widens the small
/// integer types to `Int64` and `Float32` to `Float64`. MIN and MAX keep the
/// argument type.
pub fn aggregate_type(function: AggregateFunction, arg: Option<ValueType>) -> Option<ValueType> {
    match function {
        AggregateFunction::Count => Some(ValueType::Int64),
        AggregateFunction::Avg => Some(ValueType::Float64),
        AggregateFunction::Sum => arg.map(|t| match t {
            ValueType::Int8 | ValueType::Int16 | ValueType::Int32 => ValueType::Int64,
            ValueType::Float32 => ValueType::Float64,
            other => other,
        }),
        AggregateFunction::Min | AggregateFunction::Max => arg,
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Turns pending components into a [`ResultShape`].
pub struct ResultShapeBuilder<'a> {
    table: &'a IdentificationVariableTable,
    resolved: &'a HashMap<String, ResolvedPath>,
    prefetch: Option<&'a PrefetchTree>,
}

impl<'a> ResultShapeBuilder<'a> {
    pub fn new(
        table: &'a IdentificationVariableTable,
        resolved: &'a HashMap<String, ResolvedPath>,
        prefetch: Option<&'a PrefetchTree>,
    ) -> Self {
        Self {
            table,
            resolved,
            prefetch,
        }
    }

    pub fn build(&self, pending: &[PendingComponent]) -> CompileResult<ResultShape> {
        let mut components = Vec::with_capacity(pending.len());
        for (position, component) in pending.iter().enumerate() {
            components.push(self.component(position, component)?);
        }
        Ok(ResultShape { components })
    }

    fn component(
        &self,
        position: usize,
        component: &PendingComponent,
    ) -> CompileResult<ResultComponent> {
        let scalar_name = |alias: &Option<String>| {
            alias.clone().unwrap_or_else(|| format!("sc{}", position))
        };

        match component {
            PendingComponent::Entity {
                variable,
                canonical,
                ..
            } => self
                .entity_result(position, variable, *canonical)
                .map(ResultComponent::Entity),
            PendingComponent::Path { path, kind, alias } => {
                let resolved = self.lookup(path, *kind)?;
                let value_type = match &resolved.terminal {
                    PathTerminal::Attribute(attr) => Some(attr.value_type),
                    _ => None,
                };
                Ok(ResultComponent::Scalar(ScalarColumn {
                    column: scalar_name(alias),
                    path: Some(resolved.text.clone()),
                    value_type,
                    aggregate: None,
                }))
            }
            PendingComponent::Aggregate {
                function,
                arg,
                alias,
                ..
            } => {
                let (path, arg_type) = match arg {
                    AggregateArg::Path(path, kind) => {
                        let resolved = self.lookup(path, *kind)?;
                        let arg_type = match &resolved.terminal {
                            PathTerminal::Attribute(attr) => Some(attr.value_type),
                            _ => None,
                        };
                        (Some(resolved.text.clone()), arg_type)
                    }
                    AggregateArg::Variable(variable) => {
                        let key = self
                            .table
                            .key_for(variable)
                            .ok_or_else(|| {
                                CompileError::UnmappedIdentificationVariable(variable.clone())
                            })?;
                        (Some(key.to_string()), None)
                    }
                    AggregateArg::Typed(t) => (None, *t),
                };
                Ok(ResultComponent::Scalar(ScalarColumn {
                    column: scalar_name(alias),
                    path,
                    value_type: aggregate_type(*function, arg_type),
                    aggregate: Some(*function),
                }))
            }
            PendingComponent::Scalar { value_type, alias } => {
                Ok(ResultComponent::Scalar(ScalarColumn {
                    column: scalar_name(alias),
                    path: None,
                    value_type: *value_type,
                    aggregate: None,
                }))
            }
        }
    }

    fn lookup(&self, path: &PathExpr, kind: PathKind) -> CompileResult<&ResolvedPath> {
        self.resolved
            .get(&resolved_key(path, kind))
            .ok_or_else(|| CompileError::unmapped(path.id().unwrap_or_default(), path.text()))
    }

    fn entity_result(
        &self,
        position: usize,
        variable: &str,
        canonical: bool,
    ) -> CompileResult<EntityResult> {
        let binding = match self.table.binding(variable) {
            Some(binding) => binding,
            None if canonical => {
                return Err(CompileError::UnresolvableEntityForResult(variable.to_string()))
            }
            None => {
                return Err(CompileError::UnmappedIdentificationVariable(
                    variable.to_string(),
                ))
            }
        };

        let prefix = format!("ec{}_", position);
        let fields = entity_columns(&binding.entity)
            .into_iter()
            .enumerate()
            .map(|(k, (field, db_path))| FieldResult {
                field,
                db_path,
                column: format!("{}{}", prefix, k),
            })
            .collect();

        let mut result = EntityResult {
            variable: binding.key.clone(),
            entity: binding.entity.name.clone(),
            object_class: binding.entity.object_class.clone(),
            prefix,
            fields,
        };
        self.append_prefetched(&mut result)?;
        Ok(result)
    }

    /// Add the columns of every materialized prefetch owned by the result's
    /// variable.
    fn append_prefetched(&self, result: &mut EntityResult) -> CompileResult<()> {
        let Some(tree) = self.prefetch else {
            return Ok(());
        };

        for node in tree.non_phantom() {
            if node.entity_id.as_deref() != Some(result.variable.as_str()) {
                continue;
            }
            let variable = format!("{}.{}", result.variable, node.path);
            let entity = self
                .table
                .resolve(&variable)
                .ok_or_else(|| CompileError::UnresolvableEntityForResult(variable.clone()))?;

            let prefix = node.path.replace('.', "_");
            for (k, (_, db_path)) in entity_columns(entity).into_iter().enumerate() {
                result.fields.push(FieldResult {
                    field: format!("{}.{}", node.path, db_path),
                    db_path,
                    column: format!("{}{}", prefix, k),
                });
            }
        }
        Ok(())
    }
}

/// `(field, column path)` pairs needed to rebuild an entity: attributes,
/// to-one foreign keys, primary key, discriminators. A column shared by
/// several roles is listed once, under its first role.
fn entity_columns(entity: &Arc<EntityDescriptor>) -> Vec<(String, String)> {
    let mut columns: Vec<(String, String)> = Vec::new();
    let mut push = |field: &str, db_path: &str| {
        if !columns.iter().any(|(_, c)| c == db_path) {
            columns.push((field.to_string(), db_path.to_string()));
        }
    };

    for attr in &entity.attributes {
        push(&attr.name, &attr.column);
    }
    for column in entity.foreign_key_columns() {
        push(column, column);
    }
    for column in &entity.primary_key {
        push(column, column);
    }
    for column in &entity.discriminator_columns {
        push(column, column);
    }
    columns
}
