//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Fatal errors raised while assembling a field tree.
///
/// Any of these aborts the build; the partially built tree is discarded,
/// never returned.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("cannot resolve field type '{type_name}' for field '{field}'")]
    UnresolvedFieldType { field: String, type_name: String },

    #[error("unknown parent '{parent}' for field '{field}'")]
    UnknownParent { field: String, parent: String },

    #[error("parent '{parent}' of field '{field}' cannot hold children")]
    InvalidParentType { field: String, parent: String },

    #[error("field declaration #{position} has an empty name")]
    UnnamedField { position: usize },

    #[error("cycle detected in field type nesting: {type_name}")]
    CycleDetected { type_name: String },
}

/// Recoverable lookup errors. A miss is an error for strict callers and a
/// plain `None` for everyone else; the tree is never mutated by a lookup.
#[derive(Error, Debug)]
pub enum FieldError {
    #[error("field not found: '{path}' in {container}")]
    NotFound { path: String, container: String },
}

/// Errors raised when a flat key set cannot form a consistent nested value.
#[derive(Error, Debug)]
pub enum FifError {
    #[error("key '{path}' is used both as a scalar and as a container")]
    ScalarContainerConflict { path: String },

    #[error("children of '{path}' mix list indexes and field names")]
    MixedSegments { path: String },

    #[error("flat key '{key}' contains an empty segment")]
    EmptySegment { key: String },
}

pub type BuildResult<T> = Result<T, BuildError>;
pub type FieldResult<T> = Result<T, FieldError>;
pub type FifResult<T> = Result<T, FifError>;
