//! Deferred path pass.
//!
//! Runs once every FROM item and join alias is bound, so paths may refer to
//! variables declared after them in the text.

use crate::ast::visit::PathKind;

use super::context::{resolved_key, CompilationContext};
use super::error::CompileResult;
use super::path::PathMode;

pub fn run(ctx: &mut CompilationContext<'_>) -> CompileResult<()> {
    let deferred = std::mem::take(&mut ctx.deferred);
    let resolver = ctx.resolver();

    for item in &deferred {
        let key = resolved_key(&item.path, item.kind);
        if ctx.resolved.contains_key(&key) {
            continue;
        }

        let resolved = match item.kind {
            PathKind::Object => {
                let resolved = resolver.resolve(&ctx.table, &item.path, PathMode::Navigation)?;
                ctx.register(&resolved)?;
                resolved
            }
            PathKind::Db => resolver.resolve_db(&ctx.table, &item.path)?,
        };

        tracing::trace!(
            target: "objql.compiler",
            path = %key,
            clause = ?item.clause,
            "deferred path resolved"
        );
        ctx.resolved.insert(key, resolved);
    }

    ctx.deferred = deferred;
    Ok(())
}
