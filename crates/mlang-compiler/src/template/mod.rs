//! Template engine: memoized expansion of declarations.
//!
//! Every declaration is a template, generic or not. An expansion is keyed by
//! the declaration name and the resolved argument list; the
//! [`TemplateManager`] guarantees at most one expansion per distinct key and
//! names each one `m_<counter>_<name>`.
//!
//! ## Expansion steps
//!
//! 1. Copy the program-level [`TypeContext`](crate::context::TypeContext).
//! 2. [`TemplateForm::transform`] checks the arguments against the formal
//!    parameters and binds them.
//! 3. [`SignatureForm::instantiate`] resolves the signature in that context.
//! 4. [`SignatureForm::transform`] binds the parameters.

mod datum;
mod form;
mod manager;
mod naming;
mod request;

pub use datum::{ExpansionDatum, TemplateDatum};
pub use form::{SignatureForm, TemplateForm};
pub use manager::TemplateManager;
pub use naming::{expansion_name, infer_original_name};
pub use request::ExpansionRequest;
