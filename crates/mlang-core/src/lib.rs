//! mlang core
//!
//! Shared data model for the mlang compiler.
//!
//! ## Modules
//!
//! - [`tree`]: generic attributed syntax tree (the parser's output)
//! - [`node`]: node-kind table
//! - [`ast`]: typed declarations built from the attributed tree
//! - [`type_tree`]: the type algebra
//! - [`coercion`]: structural coercion plans
//! - [`literal`]: literals and resolved template arguments
//! - [`error`]: error taxonomy

pub mod ast;
pub mod coercion;
pub mod error;
pub mod literal;
pub mod node;
pub mod tree;
pub mod type_tree;

pub use coercion::{Coercion, coerce, is_subtype, is_supertype, require_coercion, serialization_code};
pub use error::{
    At, CompilationError, ErrorKind, LoweringError, NameError, StructuralError, TypeError,
};
pub use literal::{Literal, TemplateArg};
pub use node::NodeKind;
pub use tree::{AttrValue, AttributedTree};
pub use type_tree::{Bound, Field, TypeTree};
