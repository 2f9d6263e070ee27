//! mlang compiler
//!
//! Expands generic mlang declarations and lowers every expansion to Rust
//! source that runs on `mlang-runtime`.
//!
//! ## Architecture
//!
//! - **Registration**: type aliases and enums form the base [`TypeContext`];
//!   every declaration is registered with the [`TemplateManager`]
//! - **Translation**: a FIFO worklist of expansion requests, seeded with the
//!   entry points, lowers each expansion exactly once
//!
//! ## Modules
//!
//! - [`config`]: compiler configuration
//! - [`context`]: per-expansion symbol tables and type instantiation
//! - [`template`]: template forms, expansion caches and naming
//! - [`term`]: term lowering to value expressions
//! - [`stmt`]: statement lowering shared by functions and automata
//! - [`function`], [`automaton`], [`system`]: translators per category
//! - [`connection`]: wiring tables of component instances
//! - [`graph`]: instantiation graph
//! - [`emit`]: code text helpers
//! - [`pipeline`]: the worklist driver

pub mod automaton;
pub mod config;
pub mod connection;
pub mod context;
pub mod emit;
pub mod function;
pub mod graph;
mod init;
pub mod pipeline;
pub mod stmt;
pub mod system;
pub mod template;
pub mod term;

pub use config::CompilerConfig;
pub use connection::ConnectionTable;
pub use context::{Namespace, SignatureRole, TypeContext};
pub use graph::InstantiationGraph;
pub use pipeline::{CompilationOutput, LoweredExpansion, ProgramTranslator, compile, lower_expansion};
pub use template::{
    ExpansionDatum, ExpansionRequest, SignatureForm, TemplateDatum, TemplateForm, TemplateManager,
    expansion_name, infer_original_name,
};
pub use term::{ResolvedTerm, TermLowerer, TermTag};

// Re-export CompilationError from core for convenience
pub use mlang_core::CompilationError;
