//! # objql
//!
//! An object-query compiler: resolves path-based queries over a logical
//! entity model into compiled expressions ready for SQL generation.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │            Entity Catalog (mapping.toml / builders)     │
//! │   entities, attributes, relationships, join hops        │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ shared via Arc
//! ┌─────────────────────────────────────────────────────────┐
//! │                Parse tree (ast::Statement)              │
//! │   SELECT / UPDATE / DELETE, paths, joins, aggregates    │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼ [compiler]
//! ┌─────────────────────────────────────────────────────────┐
//! │  structural pass → deferred paths → root → result shape │
//! │  (variable table, path resolver, prefetch tree)         │
//! └─────────────────────────────────────────────────────────┘
//!                          │
//!                          ▼
//! ┌─────────────────────────────────────────────────────────┐
//! │            CompiledExpression (immutable)               │
//! │            + ExpressionCache (memoized, Arc)            │
//! └─────────────────────────────────────────────────────────┘
//! ```

pub mod ast;
pub mod cache;
pub mod catalog;
pub mod compiler;
pub mod config;
pub mod test_utils;

/// Re-exports for convenient usage.
pub mod prelude {
    pub use crate::ast::{
        // Constructors
        avg,
        count,
        db_path,
        exists,
        lit_bool,
        lit_int,
        lit_str,
        max,
        min,
        param,
        path,
        path_expr,
        subselect,
        sum,
        var,
        // Types
        Delete,
        Expr,
        ExprExt,
        FromItem,
        Join,
        Select,
        SelectItem,
        Statement,
        Update,
    };
    pub use crate::cache::ExpressionCache;
    pub use crate::catalog::{EntityCatalog, EntityDescriptor, JoinHop, Relationship, ValueType};
    pub use crate::compiler::{
        CompileError, CompileResult, CompiledExpression, Compiler, ResultComponent,
    };
    pub use crate::config::Settings;
}
