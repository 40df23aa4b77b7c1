//! Visitor protocol over the parse tree.
//!
//! Every `visit_*` method reports whether traversal should descend into the
//! node's children. A SELECT visits its FROM items (each followed by its
//! joins) first, so every variable of a scope is bound before any nested
//! sub-select is entered. The select list follows, then WHERE, GROUP BY,
//! HAVING and ORDER BY. UPDATE visits its target, SET items and WHERE; DELETE
//! its target and WHERE.

use super::{Delete, Expr, FromItem, Join, PathExpr, Select, SelectItem, Statement, Update};

/// Traversal control returned by visitor callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    SkipChildren,
}

/// The clause a node was reached through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Set,
}

/// Kind of path handed to [`Visitor::visit_path`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    Object,
    Db,
}

/// Where in the tree a callback fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scope {
    pub clause: Clause,
    /// Sub-select nesting level; 0 for the top-level statement.
    pub level: usize,
    /// Recursion depth of the walk.
    pub depth: usize,
}

impl Scope {
    fn root(clause: Clause) -> Self {
        Self {
            clause,
            level: 0,
            depth: 0,
        }
    }

    fn in_clause(self, clause: Clause) -> Self {
        Self { clause, ..self }
    }

    fn deeper(self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self
        }
    }

    fn subselect(self) -> Self {
        Self {
            level: self.level + 1,
            depth: self.depth + 1,
            ..self
        }
    }

    /// Is this the statement's own scope (not inside a sub-select)?
    pub fn is_top_level(&self) -> bool {
        self.level == 0
    }
}

/// Callbacks for one compilation concern. All default to [`Flow::Continue`].
pub trait Visitor {
    type Error;

    fn visit_select(&mut self, _select: &Select, _scope: Scope) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn visit_select_item(
        &mut self,
        _item: &SelectItem,
        _position: usize,
        _scope: Scope,
    ) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn visit_from_item(&mut self, _item: &FromItem, _scope: Scope) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn visit_join(&mut self, _join: &Join, _scope: Scope) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    fn visit_expr(&mut self, _expr: &Expr, _scope: Scope) -> Result<Flow, Self::Error> {
        Ok(Flow::Continue)
    }

    /// Called for every object or db path outside joins, after `visit_expr`
    /// for path expressions and directly for UPDATE SET targets.
    fn visit_path(
        &mut self,
        _path: &PathExpr,
        _kind: PathKind,
        _scope: Scope,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

pub fn walk_statement<V: Visitor>(visitor: &mut V, statement: &Statement) -> Result<(), V::Error> {
    match statement {
        Statement::Select(select) => walk_select(visitor, select, Scope::root(Clause::Select)),
        Statement::Update(update) => walk_update(visitor, update),
        Statement::Delete(delete) => walk_delete(visitor, delete),
    }
}

pub fn walk_select<V: Visitor>(
    visitor: &mut V,
    select: &Select,
    scope: Scope,
) -> Result<(), V::Error> {
    if visitor.visit_select(select, scope)? == Flow::SkipChildren {
        return Ok(());
    }

    for item in &select.from {
        walk_from_item(visitor, item, scope.in_clause(Clause::From))?;
    }

    let items_scope = scope.in_clause(Clause::Select);
    for (position, item) in select.items.iter().enumerate() {
        if visitor.visit_select_item(item, position, items_scope)? == Flow::Continue {
            walk_expr(visitor, &item.expr, items_scope.deeper())?;
        }
    }

    if let Some(expr) = &select.where_clause {
        walk_expr(visitor, expr, scope.in_clause(Clause::Where).deeper())?;
    }

    for expr in &select.group_by {
        walk_expr(visitor, expr, scope.in_clause(Clause::GroupBy).deeper())?;
    }

    if let Some(expr) = &select.having {
        walk_expr(visitor, expr, scope.in_clause(Clause::Having).deeper())?;
    }

    for item in &select.order_by {
        walk_expr(visitor, &item.expr, scope.in_clause(Clause::OrderBy).deeper())?;
    }

    Ok(())
}

pub fn walk_from_item<V: Visitor>(
    visitor: &mut V,
    item: &FromItem,
    scope: Scope,
) -> Result<(), V::Error> {
    if visitor.visit_from_item(item, scope)? == Flow::SkipChildren {
        return Ok(());
    }
    for join in &item.joins {
        visitor.visit_join(join, scope)?;
    }
    Ok(())
}

fn walk_update<V: Visitor>(visitor: &mut V, update: &Update) -> Result<(), V::Error> {
    walk_from_item(visitor, &update.target, Scope::root(Clause::From))?;

    let set_scope = Scope::root(Clause::Set);
    for item in &update.set {
        visitor.visit_path(&item.path, PathKind::Object, set_scope)?;
        walk_expr(visitor, &item.value, set_scope.deeper())?;
    }

    if let Some(expr) = &update.where_clause {
        walk_expr(visitor, expr, Scope::root(Clause::Where).deeper())?;
    }
    Ok(())
}

fn walk_delete<V: Visitor>(visitor: &mut V, delete: &Delete) -> Result<(), V::Error> {
    walk_from_item(visitor, &delete.target, Scope::root(Clause::From))?;
    if let Some(expr) = &delete.where_clause {
        walk_expr(visitor, expr, Scope::root(Clause::Where).deeper())?;
    }
    Ok(())
}

pub fn walk_expr<V: Visitor>(visitor: &mut V, expr: &Expr, scope: Scope) -> Result<(), V::Error> {
    if visitor.visit_expr(expr, scope)? == Flow::SkipChildren {
        return Ok(());
    }

    let inner = scope.deeper();
    match expr {
        Expr::Path(path) => visitor.visit_path(path, PathKind::Object, scope)?,
        Expr::DbPath(path) => visitor.visit_path(path, PathKind::Db, scope)?,
        Expr::IdentificationVariable(_) | Expr::Literal(_) | Expr::Parameter(_) => {}
        Expr::Aggregate(aggregate) => walk_expr(visitor, &aggregate.arg, inner)?,
        Expr::Binary { left, right, .. } => {
            walk_expr(visitor, left, inner)?;
            walk_expr(visitor, right, inner)?;
        }
        Expr::Unary { operand, .. } => walk_expr(visitor, operand, inner)?,
        Expr::Between {
            expr, low, high, ..
        } => {
            walk_expr(visitor, expr, inner)?;
            walk_expr(visitor, low, inner)?;
            walk_expr(visitor, high, inner)?;
        }
        Expr::In { expr, items, .. } => {
            walk_expr(visitor, expr, inner)?;
            for item in items {
                walk_expr(visitor, item, inner)?;
            }
        }
        Expr::Function { args, .. } => {
            for arg in args {
                walk_expr(visitor, arg, inner)?;
            }
        }
        Expr::Subselect(select) | Expr::Exists(select) => {
            walk_select(visitor, select, scope.subselect())?;
        }
    }
    Ok(())
}
