//! Automaton lowering.
//!
//! An automaton expansion becomes an `async fn` that owns its `Unit` and
//! runs rounds forever. Each round evaluates the transitions in declaration
//! order and then yields:
//!
//! ```text
//! pub async fn m_0_a(mut unit: Unit, id_p: Port) -> Result<(), RuntimeError> {
//!     let mut id_x = Value::int(0);
//!     loop {
//!         if <guard> { <effects> }
//!         {
//!             let enabled = [<guard 0>, <guard 1>];
//!             match unit.choose(&enabled) {
//!                 Some(0) => { <effects 0> }
//!                 Some(1) => { <effects 1> }
//!                 _ => {}
//!             }
//!         }
//!         unit.end_round().await;
//!     }
//! }
//! ```
//!
//! A group evaluates every guard before choosing, and a group with no true
//! guard does nothing this round.

use mlang_core::LoweringError;
use mlang_core::ast::{AutomatonBody, GuardedStmt, Transition};

use crate::emit::CodeWriter;
use crate::pipeline::LoweredExpansion;
use crate::stmt::BodyLowerer;
use crate::template::{ExpansionDatum, TemplateManager};

#[cfg_attr(feature = "profiling", profiling::function)]
pub fn lower_automaton(
    body: &AutomatonBody,
    expansion: &ExpansionDatum,
    manager: &mut TemplateManager,
) -> Result<LoweredExpansion, LoweringError> {
    let mut lowerer = BodyLowerer::new(expansion.context.clone(), manager);
    let mut out = CodeWriter::new();
    out.open(format!(
        "pub async fn {}{} -> Result<(), RuntimeError> {{",
        expansion.actual_name,
        expansion.signature.render_definition()
    ));
    for decl in &body.vars {
        lowerer.var_decl(decl, &mut out)?;
    }
    out.open("loop {");
    for transition in &body.transitions {
        match transition {
            Transition::Single(guarded) => single(&mut lowerer, guarded, &mut out)?,
            Transition::Group(branches) => group(&mut lowerer, branches, &mut out)?,
        }
    }
    out.line("unit.end_round().await;");
    out.close("}");
    out.close("}");

    Ok(LoweredExpansion {
        code: out.finish(),
        requests: lowerer.into_requests(),
    })
}

fn single(
    lowerer: &mut BodyLowerer<'_>,
    guarded: &GuardedStmt,
    out: &mut CodeWriter,
) -> Result<(), LoweringError> {
    let guard = lowerer.guard(&guarded.guard)?;
    out.open(format!("if {guard} {{"));
    for effect in &guarded.effects {
        lowerer.statement(effect, out)?;
    }
    out.close("}");
    Ok(())
}

fn group(
    lowerer: &mut BodyLowerer<'_>,
    branches: &[GuardedStmt],
    out: &mut CodeWriter,
) -> Result<(), LoweringError> {
    let guards = branches
        .iter()
        .map(|b| lowerer.guard(&b.guard))
        .collect::<Result<Vec<_>, _>>()?;

    out.open("{");
    out.line(format!("let enabled = [{}];", guards.join(", ")));
    out.open("match unit.choose(&enabled) {");
    for (index, branch) in branches.iter().enumerate() {
        out.open(format!("Some({index}) => {{"));
        for effect in &branch.effects {
            lowerer.statement(effect, out)?;
        }
        out.close("}");
    }
    out.line("_ => {}");
    out.close("}");
    out.close("}");
    Ok(())
}
