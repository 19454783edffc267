//! Domain layer: field trees and the operations over them
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod error;
pub mod fif;
pub mod form;
pub mod node;
pub mod registry;
pub mod schema;

pub use arena::{FieldArena, FieldIter, TEMPLATE_SLOT};
pub use builder::TreeBuilder;
pub use error::{BuildError, BuildResult, FieldError, FieldResult, FifError, FifResult};
pub use fif::{flatten, unflatten, FlatMap};
pub use form::{Form, Validator};
pub use node::{FieldKind, FieldNode};
pub use registry::{
    BooleanType, CompoundType, EmailType, FieldRegistry, FieldType, FloatType, IntegerType,
    RepeatableType, TextType,
};
pub use schema::{guess_type, DeclAttrs, DeclShorthand, FieldDecl, FieldList};
