//! Compilation errors.
//!
//! Every error is raised at compile time, aborts the whole compilation and
//! names the offending identifier, path or entity. None are retryable: the
//! caller fixes the tree and compiles again.

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A FROM item names an entity absent from the catalog.
    #[error("Unmapped abstract schema name: '{0}'")]
    UnmappedAbstractSchemaName(String),

    /// The same identification variable was bound to two entities.
    #[error(
        "Duplicate identification variable definition: '{id}' is already used for '{previous}', \
         cannot rebind it to '{entity}'"
    )]
    DuplicateIdentificationVariable {
        id: String,
        entity: String,
        previous: String,
    },

    /// A path segment resolves to nothing.
    #[error("Unmapped identifier '{identifier}' in path '{path}'")]
    UnmappedIdentifier { identifier: String, path: String },

    /// A select item references a variable that was never bound.
    #[error("Unmapped identification variable: '{0}'")]
    UnmappedIdentificationVariable(String),

    /// A segment that must navigate a relationship does not.
    #[error("Incorrect relationship path: '{segment}' in '{path}' is not a relationship")]
    IncorrectRelationshipPath { segment: String, path: String },

    /// An entity result's variable cannot be found.
    ///
    /// Raised by [`ResultShapeBuilder`](super::result::ResultShapeBuilder) for
    /// a canonical entity or a materialized prefetch node whose variable is
    /// unbound. [`Compiler`](super::Compiler) binds both before building
    /// results, so only a builder driven directly can reach it.
    #[error("The entity variable '{0}' does not correspond to any entity in the FROM clause")]
    UnresolvableEntityForResult(String),

    #[error("Path '{path}' has {segments} segments, the limit is {limit}")]
    PathTooLong {
        path: String,
        segments: usize,
        limit: usize,
    },

    #[error("Query nesting exceeds the limit of {limit}")]
    NestingTooDeep { limit: usize },

    /// The tree is structurally unusable (empty path, SELECT without FROM).
    #[error("Invalid statement: {0}")]
    InvalidStatement(String),
}

impl CompileError {
    pub(crate) fn unmapped(identifier: impl Into<String>, path: impl Into<String>) -> Self {
        CompileError::UnmappedIdentifier {
            identifier: identifier.into(),
            path: path.into(),
        }
    }

    pub(crate) fn not_a_relationship(segment: impl Into<String>, path: impl Into<String>) -> Self {
        CompileError::IncorrectRelationshipPath {
            segment: segment.into(),
            path: path.into(),
        }
    }
}
