//! Typed syntax tree.
//!
//! The generic [`AttributedTree`](crate::tree::AttributedTree) handed over by
//! the parser is converted once, up front, into the typed declarations of this
//! module (see [`Program::from_tree`]). Node kinds that the compiler does not
//! know, and nodes whose shape is wrong, are rejected during that conversion as
//! [`StructuralError`](crate::error::StructuralError)s, so lowering only ever
//! matches exhaustively over known variants.

mod build;
pub mod decl;
pub mod expr;
pub mod stmt;

pub use build::{build_term, build_type};
pub use decl::*;
pub use expr::*;
pub use stmt::*;

/// A whole compilation unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Program {
    pub typedefs: Vec<Typedef>,
    pub enums: Vec<EnumDecl>,
    pub declarations: Vec<Declaration>,
}

impl Program {
    pub fn declaration(&self, name: &str) -> Option<&Declaration> {
        self.declarations.iter().find(|d| d.name == name)
    }
}
