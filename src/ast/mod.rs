//! Object-query parse tree.
//!
//! The tree is produced by an external grammar and consumed read-only by the
//! compiler through the [`visit::Visitor`] protocol. The constructors and
//! builder methods here exist so callers (and tests) can assemble trees
//! without a parser:
//!
//! ```
//! use objql::ast::{path, var, FromItem, Join, Select, SelectItem};
//!
//! // SELECT a FROM Artist a INNER JOIN FETCH a.paintings
//! let select = Select::new()
//!     .select(SelectItem::new(var("a")))
//!     .from(FromItem::new("Artist").alias("a").join(Join::inner(path("a.paintings")).fetch()));
//! assert_eq!(select.from.len(), 1);
//! ```

pub mod visit;

use serde::{Deserialize, Serialize};

use crate::catalog::ValueType;

/// Marker appended to a path segment to request an outer join.
pub const OUTER_JOIN_MARKER: char = '+';

/// A whole query statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statement {
    Select(Select),
    Update(Update),
    Delete(Delete),
}

impl Statement {
    /// Drive `visitor` over this statement.
    pub fn accept<V: visit::Visitor>(&self, visitor: &mut V) -> Result<(), V::Error> {
        visit::walk_statement(visitor, self)
    }
}

impl From<Select> for Statement {
    fn from(select: Select) -> Self {
        Statement::Select(select)
    }
}

impl From<Update> for Statement {
    fn from(update: Update) -> Self {
        Statement::Update(update)
    }
}

impl From<Delete> for Statement {
    fn from(delete: Delete) -> Self {
        Statement::Delete(delete)
    }
}

/// A query document: the statement plus the text it was parsed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDocument {
    #[serde(default)]
    pub source: String,
    pub statement: Statement,
}

/// SELECT statement, also used for sub-selects.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Select {
    #[serde(default)]
    pub distinct: bool,
    pub items: Vec<SelectItem>,
    pub from: Vec<FromItem>,
    #[serde(default)]
    pub where_clause: Option<Expr>,
    #[serde(default)]
    pub group_by: Vec<Expr>,
    #[serde(default)]
    pub having: Option<Expr>,
    #[serde(default)]
    pub order_by: Vec<OrderItem>,
}

impl Select {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn select(mut self, item: SelectItem) -> Self {
        self.items.push(item);
        self
    }

    pub fn from(mut self, item: FromItem) -> Self {
        self.from.push(item);
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }

    pub fn group_by(mut self, expr: Expr) -> Self {
        self.group_by.push(expr);
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having = Some(expr);
        self
    }

    pub fn order_by(mut self, expr: Expr, descending: bool) -> Self {
        self.order_by.push(OrderItem { expr, descending });
        self
    }
}

/// One item of a select list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectItem {
    pub expr: Expr,
    /// Explicit result alias (`AS name`).
    #[serde(default)]
    pub alias: Option<String>,
}

impl SelectItem {
    pub fn new(expr: Expr) -> Self {
        Self { expr, alias: None }
    }

    pub fn aliased(expr: Expr, alias: impl Into<String>) -> Self {
        Self {
            expr,
            alias: Some(alias.into()),
        }
    }
}

/// A range declaration in the FROM clause, with the joins hanging off it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FromItem {
    /// Abstract schema (entity) name.
    pub entity: String,
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub joins: Vec<Join>,
}

impl FromItem {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            alias: None,
            joins: vec![],
        }
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

/// A relationship join, optionally a fetch join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub kind: JoinKind,
    #[serde(default)]
    pub fetch: bool,
    pub path: PathExpr,
    #[serde(default)]
    pub alias: Option<String>,
}

impl Join {
    pub fn inner(path: PathExpr) -> Self {
        Self {
            kind: JoinKind::Inner,
            fetch: false,
            path,
            alias: None,
        }
    }

    pub fn left_outer(path: PathExpr) -> Self {
        Self {
            kind: JoinKind::LeftOuter,
            fetch: false,
            path,
            alias: None,
        }
    }

    pub fn fetch(mut self) -> Self {
        self.fetch = true;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub expr: Expr,
    #[serde(default)]
    pub descending: bool,
}

/// UPDATE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub target: FromItem,
    pub set: Vec<UpdateItem>,
    #[serde(default)]
    pub where_clause: Option<Expr>,
}

impl Update {
    pub fn new(target: FromItem) -> Self {
        Self {
            target,
            set: vec![],
            where_clause: None,
        }
    }

    pub fn set(mut self, path: PathExpr, value: Expr) -> Self {
        self.set.push(UpdateItem { path, value });
        self
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateItem {
    pub path: PathExpr,
    pub value: Expr,
}

/// DELETE statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delete {
    pub target: FromItem,
    #[serde(default)]
    pub where_clause: Option<Expr>,
}

impl Delete {
    pub fn new(target: FromItem) -> Self {
        Self {
            target,
            where_clause: None,
        }
    }

    pub fn filter(mut self, expr: Expr) -> Self {
        self.where_clause = Some(expr);
        self
    }
}

/// A dotted navigation path. The first segment is an identification
/// variable; a segment may carry a trailing [`OUTER_JOIN_MARKER`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathExpr {
    pub segments: Vec<String>,
}

impl PathExpr {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    /// Split dotted text into segments (`"a.paintings.toGallery"`).
    pub fn parse(text: &str) -> Self {
        Self::new(text.split('.'))
    }

    /// The identification variable the path starts from, as written.
    pub fn id(&self) -> Option<&str> {
        self.segments.first().map(String::as_str)
    }

    /// The path as written.
    pub fn text(&self) -> String {
        self.segments.join(".")
    }

    /// Segments after the identification variable, joined, markers removed.
    pub fn relative_path(&self) -> String {
        self.segments
            .iter()
            .skip(1)
            .map(|s| strip_outer_marker(s).0)
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Canonical text: variable lowercased, markers removed.
    pub fn normalized_text(&self) -> String {
        let mut text = self
            .id()
            .map(|id| strip_outer_marker(id).0.to_lowercase())
            .unwrap_or_default();
        for segment in self.segments.iter().skip(1) {
            text.push('.');
            text.push_str(strip_outer_marker(segment).0);
        }
        text
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Remove a trailing outer-join marker, reporting whether one was present.
pub fn strip_outer_marker(segment: &str) -> (&str, bool) {
    match segment.strip_suffix(OUTER_JOIN_MARKER) {
        Some(stripped) => (stripped, true),
        None => (segment, false),
    }
}

/// Expressions appearing in any clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    IdentificationVariable(String),
    Path(PathExpr),
    /// A path whose trailing segments name db relationships and columns.
    DbPath(PathExpr),
    Literal(Literal),
    Parameter(Parameter),
    Aggregate(Aggregate),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        #[serde(default)]
        negated: bool,
    },
    In {
        expr: Box<Expr>,
        items: Vec<Expr>,
        #[serde(default)]
        negated: bool,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    Subselect(Box<Select>),
    Exists(Box<Select>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Literal {
    /// The value type a literal contributes to a result column.
    pub fn value_type(&self) -> Option<ValueType> {
        match self {
            Literal::Null => None,
            Literal::Bool(_) => Some(ValueType::Bool),
            Literal::Int(_) => Some(ValueType::Int64),
            Literal::Float(_) => Some(ValueType::Float64),
            Literal::String(_) => Some(ValueType::String),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    Named(String),
    Positional(u32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Count,
    Sum,
    Avg,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Avg => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Aggregate {
    pub function: AggregateFunction,
    #[serde(default)]
    pub distinct: bool,
    pub arg: Box<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Add,
    Sub,
    Mul,
    Div,
    Like,
    NotLike,
    MemberOf,
    NotMemberOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Not,
    Neg,
    IsNull,
    IsNotNull,
    IsEmpty,
    IsNotEmpty,
}

// ============================================================================
// Constructors
// ============================================================================

/// Path expression from dotted text.
pub fn path(text: &str) -> PathExpr {
    PathExpr::parse(text)
}

/// Path expression node from dotted text.
pub fn path_expr(text: &str) -> Expr {
    Expr::Path(PathExpr::parse(text))
}

/// Db path expression node from dotted text.
pub fn db_path(text: &str) -> Expr {
    Expr::DbPath(PathExpr::parse(text))
}

/// Identification variable reference.
pub fn var(name: &str) -> Expr {
    Expr::IdentificationVariable(name.to_string())
}

pub fn lit_int(value: i64) -> Expr {
    Expr::Literal(Literal::Int(value))
}

pub fn lit_str(value: &str) -> Expr {
    Expr::Literal(Literal::String(value.to_string()))
}

pub fn lit_bool(value: bool) -> Expr {
    Expr::Literal(Literal::Bool(value))
}

pub fn param(name: &str) -> Expr {
    Expr::Parameter(Parameter::Named(name.to_string()))
}

fn aggregate(function: AggregateFunction, arg: Expr) -> Expr {
    Expr::Aggregate(Aggregate {
        function,
        distinct: false,
        arg: Box::new(arg),
    })
}

pub fn count(arg: Expr) -> Expr {
    aggregate(AggregateFunction::Count, arg)
}

pub fn sum(arg: Expr) -> Expr {
    aggregate(AggregateFunction::Sum, arg)
}

pub fn avg(arg: Expr) -> Expr {
    aggregate(AggregateFunction::Avg, arg)
}

pub fn min(arg: Expr) -> Expr {
    aggregate(AggregateFunction::Min, arg)
}

pub fn max(arg: Expr) -> Expr {
    aggregate(AggregateFunction::Max, arg)
}

pub fn subselect(select: Select) -> Expr {
    Expr::Subselect(Box::new(select))
}

pub fn exists(select: Select) -> Expr {
    Expr::Exists(Box::new(select))
}

/// Fluent operators over [`Expr`].
pub trait ExprExt: Sized {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr;

    fn eq(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Eq, right)
    }

    fn gt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Gt, right)
    }

    fn lt(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Lt, right)
    }

    fn and(self, right: Expr) -> Expr {
        self.binary(BinaryOp::And, right)
    }

    fn or(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Or, right)
    }

    fn like(self, right: Expr) -> Expr {
        self.binary(BinaryOp::Like, right)
    }
}

impl ExprExt for Expr {
    fn binary(self, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right),
        }
    }
}
