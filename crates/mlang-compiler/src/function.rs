//! Function lowering.
//!
//! A function expansion becomes a plain `fn` over dynamic values:
//!
//! ```text
//! pub fn m_0_f(mut id_a: Value, ...) -> Result<Value, RuntimeError> {
//!     ...
//! }
//! ```

use mlang_core::ast::{FunctionBody, Statement};
use mlang_core::node::NodeKind;
use mlang_core::{At, LoweringError, TypeError};

use crate::emit::CodeWriter;
use crate::pipeline::LoweredExpansion;
use crate::stmt::BodyLowerer;
use crate::template::{ExpansionDatum, TemplateManager};

#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_function(
    body: &FunctionBody,
    expansion: &ExpansionDatum,
    manager: &mut TemplateManager,
) -> Result<LoweredExpansion, LoweringError> {
    let mut lowerer = BodyLowerer::new(expansion.context.clone(), manager);
    let mut inner = CodeWriter::new();
    for stmt in &body.statements {
        lowerer.statement(stmt, &mut inner)?;
    }
    if let Some(ty) = expansion.signature.return_type()
        && !all_paths_return(&body.statements)
    {
        return Err(TypeError::MissingReturn {
            expected: ty.to_string(),
        })
        .at(NodeKind::FunctionDecl);
    }

    let mut out = CodeWriter::new();
    out.open(format!(
        "pub fn {}{} -> Result<Value, RuntimeError> {{",
        expansion.actual_name,
        expansion.signature.render_definition()
    ));
    out.append(inner);
    if !matches!(body.statements.last(), Some(Statement::Return(_))) {
        out.line("Ok(Value::Unit)");
    }
    out.close("}");

    Ok(LoweredExpansion {
        code: out.finish(),
        requests: lowerer.into_requests(),
    })
}

/// Function bodies are straight-line, so one `return` ends every path.
fn all_paths_return(statements: &[Statement]) -> bool {
    statements
        .iter()
        .any(|stmt| matches!(stmt, Statement::Return(_)))
}
