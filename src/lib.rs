//! Declarative field trees.
//!
//! formtree assembles a hierarchy of typed field nodes from declarative
//! field lists, then drives a uniform processing cycle over it: load input,
//! validate every field, collect errors, materialize values. A flat "fif"
//! representation (dotted paths to scalar leaves) bridges nested values and
//! flat key/value stores in both directions.
//!
//! ```
//! use formtree::{FieldDecl, FieldList, Form};
//! use serde_json::json;
//!
//! let list = FieldList::from_decls(vec![
//!     FieldDecl::new("username", "Text").attr("required", true),
//!     FieldDecl::new("addresses", "Repeatable"),
//!     FieldDecl::new("addresses.city", "Text"),
//! ]);
//! let mut form = Form::from_list(&list)?;
//! let ok = form.process(&json!({
//!     "username": "joeb",
//!     "addresses": [{"city": "Prime City"}]
//! }));
//! assert!(ok);
//! assert_eq!(form.fif()["addresses.0.city"], json!("Prime City"));
//! # Ok::<(), formtree::BuildError>(())
//! ```

pub mod cli;
pub mod config;
pub mod domain;
pub mod exitcode;
pub mod util;

pub use domain::{
    flatten, unflatten, BuildError, BuildResult, FieldArena, FieldDecl, FieldError, FieldKind,
    FieldList, FieldNode, FieldRegistry, FieldResult, FieldType, FifError, FifResult, FlatMap,
    Form, TreeBuilder, Validator,
};
