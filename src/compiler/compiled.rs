//! The compiled expression handed to SQL generation.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::ast::Statement;
use crate::catalog::{EntityDescriptor, JoinHop};

use super::ident::{normalize_id_path, Binding, IdentificationVariableTable};
use super::path::TraversalRecord;
use super::prefetch::PrefetchTree;
use super::result::ResultShape;

/// Immutable result of one compilation.
///
/// Safe to share across threads; see [`crate::cache::ExpressionCache`].
#[derive(Debug, Clone, Serialize)]
pub struct CompiledExpression {
    pub(crate) source: String,
    pub(crate) expression: Statement,
    pub(crate) root_id: String,
    #[serde(skip)]
    pub(crate) root: Arc<EntityDescriptor>,
    pub(crate) bindings: IdentificationVariableTable,
    pub(crate) traversals: BTreeMap<String, TraversalRecord>,
    pub(crate) prefetch_tree: Option<PrefetchTree>,
    pub(crate) result: Option<ResultShape>,
}

impl CompiledExpression {
    /// The statement this expression was compiled from.
    pub fn expression(&self) -> &Statement {
        &self.expression
    }

    /// Original query text, for diagnostics. May be empty.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn root_descriptor(&self) -> &Arc<EntityDescriptor> {
        &self.root
    }

    /// Descriptor bound to a variable or a synthetic path variable.
    pub fn entity_descriptor(&self, alias_or_path: &str) -> Option<&Arc<EntityDescriptor>> {
        self.bindings.resolve(alias_or_path)
    }

    /// Db join hops leading to `identifier`, in traversal order.
    ///
    /// For a chain such as `a.toB.toC` this is every hop from `a`, not just
    /// the last one. Empty for range variables.
    pub fn incoming_relationships(&self, identifier: &str) -> &[JoinHop] {
        self.traversal(identifier)
            .map(|t| t.hops.as_slice())
            .unwrap_or_default()
    }

    /// Traversal record ending at `identifier`.
    pub fn traversal(&self, identifier: &str) -> Option<&TraversalRecord> {
        let key = self
            .bindings
            .key_for(identifier)
            .map(str::to_string)
            .unwrap_or_else(|| normalize_id_path(identifier));
        self.traversals.get(&key)
    }

    pub fn traversals(&self) -> impl Iterator<Item = &TraversalRecord> {
        self.traversals.values()
    }

    pub fn prefetch_tree(&self) -> Option<&PrefetchTree> {
        self.prefetch_tree.as_ref()
    }

    /// Result mapping; `None` for UPDATE and DELETE.
    pub fn result(&self) -> Option<&ResultShape> {
        self.result.as_ref()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter()
    }

    pub fn variable_table(&self) -> &IdentificationVariableTable {
        &self.bindings
    }
}
