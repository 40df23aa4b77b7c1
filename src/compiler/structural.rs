//! Structural pass.
//!
//! Binds FROM items and join aliases, resolves join paths, registers fetch
//! joins with the prefetch tree, queues every other path for the deferred
//! pass and records the top-level select list as pending components.

use crate::ast::visit::{Clause, Flow, PathKind, Scope, Visitor};
use crate::ast::{Expr, FromItem, Join, JoinKind, PathExpr, Select, SelectItem, Statement};

use super::context::{CompilationContext, DeferredPath};
use super::error::{CompileError, CompileResult};
use super::ident::{fold_entity_name, BindingOrigin};
use super::path::PathMode;
use super::result::{AggregateArg, PendingComponent};

pub fn run(ctx: &mut CompilationContext<'_>, statement: &Statement) -> CompileResult<()> {
    statement.accept(&mut StructuralPass { ctx })
}

struct StructuralPass<'c, 'a> {
    ctx: &'c mut CompilationContext<'a>,
}

impl StructuralPass<'_, '_> {
    fn check_depth(&self, scope: Scope) -> CompileResult<()> {
        let limit = self.ctx.settings.max_nesting_depth;
        if scope.depth > limit {
            return Err(CompileError::NestingTooDeep { limit });
        }
        Ok(())
    }

    fn defer(&mut self, path: PathExpr, kind: PathKind, clause: Clause) -> CompileResult<()> {
        if path.is_empty() {
            return Err(CompileError::InvalidStatement("empty path".to_string()));
        }
        self.ctx.deferred.push(DeferredPath { path, kind, clause });
        Ok(())
    }

    fn pending_for(&mut self, item: &SelectItem) -> (PendingComponent, Flow) {
        let alias = item.alias.clone();
        match &item.expr {
            Expr::IdentificationVariable(variable) => {
                self.ctx.explicit_root.get_or_insert_with(|| variable.clone());
                let component = PendingComponent::Entity {
                    variable: variable.clone(),
                    alias,
                    canonical: false,
                };
                (component, Flow::SkipChildren)
            }
            Expr::Path(path) if path.len() == 1 => {
                let variable = path.segments[0].clone();
                self.ctx.explicit_root.get_or_insert_with(|| variable.clone());
                let component = PendingComponent::Entity {
                    variable,
                    alias,
                    canonical: false,
                };
                (component, Flow::SkipChildren)
            }
            Expr::Path(path) | Expr::DbPath(path) => {
                let kind = match item.expr {
                    Expr::DbPath(_) => PathKind::Db,
                    _ => PathKind::Object,
                };
                let component = PendingComponent::Path {
                    path: path.clone(),
                    kind,
                    alias,
                };
                (component, Flow::Continue)
            }
            Expr::Aggregate(aggregate) => {
                let arg = match aggregate.arg.as_ref() {
                    Expr::IdentificationVariable(variable) => {
                        AggregateArg::Variable(variable.clone())
                    }
                    Expr::Path(path) if path.len() == 1 => {
                        AggregateArg::Variable(path.segments[0].clone())
                    }
                    Expr::Path(path) => AggregateArg::Path(path.clone(), PathKind::Object),
                    Expr::DbPath(path) => AggregateArg::Path(path.clone(), PathKind::Db),
                    Expr::Literal(literal) => AggregateArg::Typed(literal.value_type()),
                    _ => AggregateArg::Typed(None),
                };
                let component = PendingComponent::Aggregate {
                    function: aggregate.function,
                    distinct: aggregate.distinct,
                    arg,
                    alias,
                };
                (component, Flow::Continue)
            }
            Expr::Literal(literal) => {
                let component = PendingComponent::Scalar {
                    value_type: literal.value_type(),
                    alias,
                };
                (component, Flow::Continue)
            }
            _ => (
                PendingComponent::Scalar {
                    value_type: None,
                    alias,
                },
                Flow::Continue,
            ),
        }
    }
}

impl Visitor for StructuralPass<'_, '_> {
    type Error = CompileError;

    fn visit_select(&mut self, select: &Select, scope: Scope) -> CompileResult<Flow> {
        self.check_depth(scope)?;
        if select.from.is_empty() {
            return Err(CompileError::InvalidStatement(
                "SELECT without a FROM clause".to_string(),
            ));
        }
        if select.items.is_empty() {
            return Err(CompileError::InvalidStatement(
                "SELECT with an empty select list".to_string(),
            ));
        }
        Ok(Flow::Continue)
    }

    fn visit_select_item(
        &mut self,
        item: &SelectItem,
        _position: usize,
        scope: Scope,
    ) -> CompileResult<Flow> {
        if !scope.is_top_level() {
            return Ok(Flow::Continue);
        }
        let (component, flow) = self.pending_for(item);
        self.ctx.pending.push(component);
        Ok(flow)
    }

    fn visit_from_item(&mut self, item: &FromItem, scope: Scope) -> CompileResult<Flow> {
        let entity = self.ctx.catalog.lookup(&item.entity)?;
        let name = match &item.alias {
            Some(alias) => alias.clone(),
            None => fold_entity_name(&item.entity),
        };
        self.ctx.table.bind(&name, entity, BindingOrigin::Range)?;

        if scope.is_top_level() && self.ctx.first_from_id.is_none() {
            self.ctx.first_from_id = self.ctx.table.key_for(&name).map(str::to_string);
        }
        tracing::debug!(
            target: "objql.compiler",
            entity = %item.entity,
            variable = %name,
            "bound FROM item"
        );
        Ok(Flow::Continue)
    }

    fn visit_join(&mut self, join: &Join, _scope: Scope) -> CompileResult<Flow> {
        let resolved = self
            .ctx
            .resolver()
            .resolve(&self.ctx.table, &join.path, PathMode::Join)?;
        self.ctx.register(&resolved)?;

        let outer = join.kind == JoinKind::LeftOuter;
        let Some(last) = resolved.traversals.last() else {
            return Err(CompileError::not_a_relationship(&resolved.id, join.path.text()));
        };
        if outer {
            if let Some(record) = self.ctx.traversals.get_mut(&last.target) {
                record.outer = true;
            }
        }

        if let Some(alias) = &join.alias {
            let target = self.ctx.catalog.lookup(&last.relationship.target)?;
            self.ctx.table.bind(alias, target, BindingOrigin::Join)?;
            if let Some(key) = self.ctx.table.key_for(alias).map(str::to_string) {
                let mut record = last.clone();
                record.target = key.clone();
                record.outer |= outer;
                self.ctx.record_traversal(key, record);
            }
        }

        if join.fetch {
            let relative = join.path.relative_path();
            let semantics = self.ctx.settings.default_prefetch_semantics;
            let owner = resolved.id.clone();
            let tree = self.ctx.prefetch_tree();
            let idx = tree.add_path(&relative);
            if let Some(node) = tree.node_mut(idx) {
                match &node.entity_id {
                    Some(existing) if *existing != owner => {
                        tracing::warn!(
                            target: "objql.compiler",
                            path = %relative,
                            owner = %existing,
                            ignored = %owner,
                            "prefetch path already owned by another variable"
                        );
                    }
                    _ => {
                        node.phantom = false;
                        node.semantics = semantics;
                        node.entity_id = Some(owner);
                    }
                }
            }
        }

        tracing::debug!(
            target: "objql.compiler",
            path = %resolved.text,
            fetch = join.fetch,
            outer,
            "resolved join"
        );
        Ok(Flow::Continue)
    }

    fn visit_expr(&mut self, expr: &Expr, scope: Scope) -> CompileResult<Flow> {
        self.check_depth(scope)?;
        if let Expr::IdentificationVariable(variable) = expr {
            self.defer(PathExpr::new([variable.as_str()]), PathKind::Object, scope.clause)?;
        }
        Ok(Flow::Continue)
    }

    fn visit_path(&mut self, path: &PathExpr, kind: PathKind, scope: Scope) -> CompileResult<()> {
        self.defer(path.clone(), kind, scope.clause)
    }
}
