//! Mutable state shared by the compiler passes.

use std::collections::{BTreeMap, HashMap};

use crate::ast::visit::{Clause, PathKind};
use crate::ast::PathExpr;
use crate::catalog::EntityCatalog;
use crate::config::CompilerSettings;

use super::error::CompileResult;
use super::ident::{BindingOrigin, IdentificationVariableTable};
use super::path::{PathResolver, ResolvedPath, TraversalRecord};
use super::prefetch::PrefetchTree;
use super::result::PendingComponent;

/// A path seen during the structural pass, resolved in the deferred pass.
#[derive(Debug, Clone)]
pub struct DeferredPath {
    pub path: PathExpr,
    pub kind: PathKind,
    pub clause: Clause,
}

/// Key of a path in [`CompilationContext::resolved`].
///
/// Db paths get a `db:` prefix so `a.ARTIST_ID` as an object path and as a
/// db path never collide.
pub fn resolved_key(path: &PathExpr, kind: PathKind) -> String {
    match kind {
        PathKind::Object => path.text(),
        PathKind::Db => format!("db:{}", path.text()),
    }
}

/// Everything a compilation accumulates before emitting its result.
pub struct CompilationContext<'a> {
    pub catalog: &'a EntityCatalog,
    pub settings: &'a CompilerSettings,
    pub table: IdentificationVariableTable,
    /// Traversal records keyed by the variable they end at.
    pub traversals: BTreeMap<String, TraversalRecord>,
    pub prefetch: Option<PrefetchTree>,
    pub deferred: Vec<DeferredPath>,
    /// Resolved paths, see [`resolved_key`].
    pub resolved: HashMap<String, ResolvedPath>,
    pub pending: Vec<PendingComponent>,
    /// Key of the first top-level FROM item.
    pub first_from_id: Option<String>,
    /// Bare variable selected at the top level, as written.
    pub explicit_root: Option<String>,
}

impl<'a> CompilationContext<'a> {
    pub fn new(catalog: &'a EntityCatalog, settings: &'a CompilerSettings) -> Self {
        Self {
            catalog,
            settings,
            table: IdentificationVariableTable::new(),
            traversals: BTreeMap::new(),
            prefetch: None,
            deferred: Vec::new(),
            resolved: HashMap::new(),
            pending: Vec::new(),
            first_from_id: None,
            explicit_root: None,
        }
    }

    pub fn resolver(&self) -> PathResolver<'a> {
        PathResolver::new(self.catalog, self.settings.max_path_segments)
    }

    /// Bind the synthetic variable of every traversal in `resolved` and
    /// record the traversal under it.
    pub fn register(&mut self, resolved: &ResolvedPath) -> CompileResult<()> {
        for traversal in &resolved.traversals {
            let target = self.catalog.lookup(&traversal.relationship.target)?;
            self.table
                .bind(&traversal.target, target, BindingOrigin::Path)?;
            self.record_traversal(traversal.target.clone(), traversal.clone());
        }
        Ok(())
    }

    /// Store a traversal, keeping the first record for a variable. A later
    /// outer-join request still marks the existing record outer.
    pub fn record_traversal(&mut self, variable: String, traversal: TraversalRecord) {
        self.traversals
            .entry(variable)
            .and_modify(|existing| existing.outer |= traversal.outer)
            .or_insert(traversal);
    }

    /// Prefetch tree, created on first use.
    pub fn prefetch_tree(&mut self) -> &mut PrefetchTree {
        self.prefetch.get_or_insert_with(PrefetchTree::new)
    }
}

impl std::fmt::Debug for CompilationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompilationContext")
            .field("bindings", &self.table.len())
            .field("traversals", &self.traversals.len())
            .field("deferred", &self.deferred.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}
