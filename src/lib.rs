//! mlang
//!
//! Compiles mlang programs (generic functions, guarded-transition automata
//! and systems wiring them together) into Rust source that runs on the
//! [`runtime`] library.
//!
//! ## Crates
//!
//! - `mlang-core`: syntax tree, type algebra, coercion plans and errors
//! - `mlang-compiler`: template expansion and lowering
//! - `mlang-runtime`: values, ports and task groups used by emitted code
//!
//! ## Example
//!
//! ```
//! use mlang::{AttributedTree, CompilerConfig, compile};
//!
//! let program = AttributedTree::new("program");
//! let output = compile(&program, CompilerConfig::default()).unwrap();
//! assert!(output.is_success());
//! assert!(output.code.contains("use mlang_runtime::prelude::*;"));
//! ```

pub use mlang_compiler::{
    CompilationOutput, CompilerConfig, ExpansionDatum, ExpansionRequest, InstantiationGraph,
    ProgramTranslator, TemplateManager, TypeContext, infer_original_name,
};
pub use mlang_core::ast::Program;
pub use mlang_core::{
    AttrValue, AttributedTree, Coercion, CompilationError, ErrorKind, NameError, NodeKind,
    StructuralError, TypeError, TypeTree, coerce,
};

/// The library emitted code links against.
pub use mlang_runtime as runtime;

/// Build the typed program from a parsed tree and compile it.
///
/// Malformed trees are rejected before any lowering starts; every other
/// failure is reported in [`CompilationOutput::errors`].
pub fn compile(
    tree: &AttributedTree,
    config: CompilerConfig,
) -> Result<CompilationOutput, CompilationError> {
    let program = Program::from_tree(tree)?;
    Ok(mlang_compiler::compile(&program, config))
}
