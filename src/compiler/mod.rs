//! Object-query compiler.
//!
//! Compiles a parse tree against an [`EntityCatalog`] into an immutable
//! [`CompiledExpression`]. Compilation runs five phases in a fixed order:
//!
//! ```text
//! Statement
//!    │
//!    ▼ [structural]   bind FROM items and join aliases, resolve joins,
//!    │                register fetch joins, queue paths, note select items
//!    ▼ [deferred]     resolve every queued path (forward references legal)
//!    ▼ [root]         first selected variable, else first FROM item
//!    ▼ [result]       canonicalize entity paths, build the result shape
//!    ▼ [emit]         CompiledExpression
//! ```
//!
//! Any error aborts the whole compilation; nothing partial is returned.
//!
//! Each SELECT binds its FROM items before its select list is walked, so a
//! sub-select anywhere in the statement may join through outer variables.
//!
//! # Shared prefetch paths
//!
//! The prefetch tree is keyed by path relative to its owner. When two
//! variables fetch the same relative path (`JOIN FETCH a.paintings` and
//! `JOIN FETCH b.paintings`), the first owner keeps the node and a warning is
//! logged on `objql.compiler`. The second owner's entity result then carries
//! only its own columns, without the prefetched ones.
//!
//! # Example
//!
//! ```
//! use objql::ast::{path, var, FromItem, Join, Select, SelectItem, Statement};
//! use objql::compiler::Compiler;
//! use objql::test_utils::sample_catalog;
//!
//! let compiler = Compiler::new(sample_catalog());
//! let statement: Statement = Select::new()
//!     .select(SelectItem::new(var("a")))
//!     .from(FromItem::new("Artist").alias("a").join(Join::inner(path("a.paintings")).fetch()))
//!     .into();
//!
//! let compiled = compiler.compile("SELECT a FROM Artist a INNER JOIN FETCH a.paintings", &statement)?;
//! assert_eq!(compiled.root_id(), "a");
//! assert!(compiled.prefetch_tree().is_some());
//! # Ok::<(), objql::compiler::CompileError>(())
//! ```

mod compiled;
mod context;
mod deferred;
mod error;
pub mod ident;
pub mod path;
pub mod prefetch;
pub mod result;
mod structural;

use std::sync::Arc;

use crate::ast::Statement;
use crate::catalog::EntityCatalog;
use crate::config::CompilerSettings;

pub use compiled::CompiledExpression;
use context::CompilationContext;
pub use error::{CompileError, CompileResult};
pub use ident::{
    fold_entity_name, normalize_id_path, Binding, BindingOrigin, IdentificationVariableTable,
};
pub use path::{
    AttributeRef, PathMode, PathResolver, PathTerminal, RelationshipRef, ResolvedPath,
    TraversalRecord,
};
pub use prefetch::{PrefetchNode, PrefetchSemantics, PrefetchTree};
pub use result::{
    aggregate_type, EntityResult, FieldResult, ResultComponent, ResultShape, ScalarColumn,
};

/// Compilation phases, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Structural,
    Deferred,
    Root,
    Result,
    Emit,
}

/// Compiles statements against one catalog.
#[derive(Debug, Clone)]
pub struct Compiler {
    catalog: Arc<EntityCatalog>,
    settings: CompilerSettings,
}

impl Compiler {
    /// Create a compiler with default settings.
    pub fn new(catalog: impl Into<Arc<EntityCatalog>>) -> Self {
        Self {
            catalog: catalog.into(),
            settings: CompilerSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: CompilerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn catalog(&self) -> &Arc<EntityCatalog> {
        &self.catalog
    }

    pub fn settings(&self) -> &CompilerSettings {
        &self.settings
    }

    /// Compile `statement`. `source` is the query text it was parsed from,
    /// kept for diagnostics only.
    pub fn compile(&self, source: &str, statement: &Statement) -> CompileResult<CompiledExpression> {
        let mut ctx = CompilationContext::new(&self.catalog, &self.settings);

        trace_phase(Phase::Structural);
        structural::run(&mut ctx, statement)?;

        trace_phase(Phase::Deferred);
        deferred::run(&mut ctx)?;

        trace_phase(Phase::Root);
        let mut root_id = infer_root(&ctx, statement)?;

        trace_phase(Phase::Result);
        let result = match statement {
            Statement::Select(_) => {
                let pending = std::mem::take(&mut ctx.pending);
                let (pending, canonical_root) = result::canonicalize(pending, &ctx.resolved);
                if ctx.explicit_root.is_none() {
                    if let Some(variable) = canonical_root {
                        root_id = variable;
                    }
                }
                let builder =
                    result::ResultShapeBuilder::new(&ctx.table, &ctx.resolved, ctx.prefetch.as_ref());
                Some(builder.build(&pending)?)
            }
            Statement::Update(_) | Statement::Delete(_) => None,
        };

        trace_phase(Phase::Emit);
        let root = ctx
            .table
            .resolve(&root_id)
            .cloned()
            .ok_or_else(|| CompileError::UnmappedIdentificationVariable(root_id.clone()))?;

        tracing::debug!(
            target: "objql.compiler",
            root = %root_id,
            bindings = ctx.table.len(),
            traversals = ctx.traversals.len(),
            prefetch = ctx.prefetch.as_ref().map_or(0, |t| t.len()),
            "compiled expression"
        );

        Ok(CompiledExpression {
            source: source.to_string(),
            expression: statement.clone(),
            root_id,
            root,
            bindings: ctx.table,
            traversals: ctx.traversals,
            prefetch_tree: ctx.prefetch,
            result,
        })
    }
}

fn trace_phase(phase: Phase) {
    tracing::trace!(target: "objql.compiler", ?phase, "entering phase");
}

/// The first bare variable selected at the top level, else the first
/// FROM item's variable.
fn infer_root(ctx: &CompilationContext<'_>, statement: &Statement) -> CompileResult<String> {
    if let Some(variable) = &ctx.explicit_root {
        return ctx
            .table
            .key_for(variable)
            .map(str::to_string)
            .ok_or_else(|| CompileError::UnmappedIdentificationVariable(variable.clone()));
    }

    ctx.first_from_id.clone().ok_or_else(|| {
        let kind = match statement {
            Statement::Select(_) => "SELECT",
            Statement::Update(_) => "UPDATE",
            Statement::Delete(_) => "DELETE",
        };
        CompileError::InvalidStatement(format!("{} without a FROM item", kind))
    })
}
