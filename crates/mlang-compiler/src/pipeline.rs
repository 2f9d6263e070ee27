//! Program-level driver.
//!
//! [`ProgramTranslator`] builds the base context from the program's type
//! aliases and enums, registers every declaration with the template engine
//! and then drains a FIFO worklist of expansion requests:
//!
//! 1. entry points are created and queued;
//! 2. each queued expansion is lowered by the translator of its category;
//! 3. every expansion created while lowering it is queued after it.
//!
//! Memoization happens at creation time, so an expansion is queued at most
//! once no matter how often it is requested, and output order is discovery
//! order. A failing expansion contributes no code and does not stop the
//! others; only an unknown entry point and resource exhaustion are fatal.

use std::collections::VecDeque;

use mlang_core::ast::{Body, Category, Declaration, Program};
use mlang_core::node::NodeKind;
use mlang_core::{CompilationError, ErrorKind, LoweringError, NameError};
use tracing::{debug, warn};

use crate::automaton::lower_automaton;
use crate::config::CompilerConfig;
use crate::context::TypeContext;
use crate::emit::CodeWriter;
use crate::function::lower_function;
use crate::graph::InstantiationGraph;
use crate::system::lower_system;
use crate::template::{ExpansionDatum, ExpansionRequest, TemplateManager};

/// Code of one expansion and the expansions its body created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweredExpansion {
    pub code: String,
    pub requests: Vec<ExpansionRequest>,
}

/// Result of compiling a program.
#[derive(Debug)]
pub struct CompilationOutput {
    /// Emitted Rust source: the prelude followed by every successfully
    /// lowered expansion, in discovery order.
    pub code: String,
    /// Every failure, one per failed expansion.
    pub errors: Vec<CompilationError>,
    /// Number of expansions created.
    pub expansions: usize,
    /// Which expansion requested which.
    pub graph: InstantiationGraph,
}

impl CompilationOutput {
    /// Check if compilation succeeded (no errors).
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    fn failed(config: &CompilerConfig, error: CompilationError) -> Self {
        Self {
            code: prelude(config),
            errors: vec![error],
            expansions: 0,
            graph: InstantiationGraph::new(),
        }
    }
}

fn prelude(config: &CompilerConfig) -> String {
    let mut out = CodeWriter::new();
    out.line("// Generated by mlang. Do not edit.");
    out.line("#![allow(unused_mut, unused_variables, unreachable_code)]");
    out.line("");
    out.line(format!("use {}::prelude::*;", config.runtime_crate));
    out.finish()
}

fn declaration_node(category: Category) -> NodeKind {
    match category {
        Category::Function => NodeKind::FunctionDecl,
        Category::Automaton => NodeKind::AutomatonDecl,
        Category::System => NodeKind::SystemDecl,
    }
}

/// Dispatch one expansion to the translator of its category.
pub fn lower_expansion(
    decl: &Declaration,
    expansion: &ExpansionDatum,
    manager: &mut TemplateManager,
) -> Result<LoweredExpansion, LoweringError> {
    match &decl.body {
        Body::Function(body) => lower_function(body, expansion, manager),
        Body::Automaton(body) => lower_automaton(body, expansion, manager),
        Body::System(body) => lower_system(body, expansion, manager),
    }
}

// ============================================================================
// ProgramTranslator
// ============================================================================

/// Worklist driver for one program.
pub struct ProgramTranslator<'p> {
    program: &'p Program,
    config: CompilerConfig,
    manager: TemplateManager,
    graph: InstantiationGraph,
    queue: VecDeque<ExpansionRequest>,
    fragments: Vec<String>,
    errors: Vec<CompilationError>,
}

impl<'p> ProgramTranslator<'p> {
    /// Build the base context and register every declaration.
    ///
    /// Type aliases are resolved in program order, so an alias may refer to
    /// earlier aliases and to any enum.
    pub fn new(program: &'p Program, config: CompilerConfig) -> Result<Self, CompilationError> {
        let mut base = TypeContext::new();
        for e in &program.enums {
            base.set_enum(&e.name, e.members.clone())
                .map_err(|err| located(&e.name, NodeKind::EnumDecl, err))?;
        }
        for td in &program.typedefs {
            let ty = base
                .instantiate(&td.ty)
                .map_err(|err| located(&td.name, NodeKind::Typedef, err))?;
            base.set_type(&td.name, ty)
                .map_err(|err| located(&td.name, NodeKind::Typedef, err))?;
        }

        let mut manager = TemplateManager::new(base);
        for decl in &program.declarations {
            manager
                .register(decl)
                .map_err(|err| located(&decl.name, declaration_node(decl.category()), err))?;
        }

        Ok(Self {
            program,
            config,
            manager,
            graph: InstantiationGraph::new(),
            queue: VecDeque::new(),
            fragments: Vec::new(),
            errors: Vec::new(),
        })
    }

    /// The declarations that seed the worklist.
    fn entry_points(&self) -> Vec<String> {
        if !self.config.entry_points.is_empty() {
            return self.config.entry_points.clone();
        }
        self.program
            .declarations
            .iter()
            .filter(|d| !d.is_generic())
            .map(|d| d.name.clone())
            .collect()
    }

    /// Translate the whole program.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn translate(mut self) -> CompilationOutput {
        for name in self.entry_points() {
            let Some(decl) = self.program.declaration(&name) else {
                let err = located(&name, NodeKind::Program, NameError::UnknownTemplate(name.clone()));
                return CompilationOutput::failed(&self.config, err);
            };
            let node = declaration_node(decl.category());
            let req = ExpansionRequest::plain(name.clone());
            match self.manager.query_or_create(&req) {
                Ok((expansion, created)) => {
                    self.graph.add_root(&expansion.actual_name);
                    if created {
                        debug!(request = %req, "entry point queued");
                        self.queue.push_back(req);
                    }
                }
                Err(kind) => {
                    warn!(declaration = %name, error = %kind, "entry point failed");
                    self.errors
                        .push(CompilationError::new(name, Vec::new(), LoweringError::new(node, kind)));
                }
            }
        }

        while let Some(req) = self.queue.pop_front() {
            if let Err(fatal) = self.step(&req) {
                self.errors.push(fatal);
                break;
            }
        }

        let mut code = prelude(&self.config);
        for fragment in &self.fragments {
            code.push('\n');
            code.push_str(fragment);
        }
        CompilationOutput {
            code,
            errors: self.errors,
            expansions: self.manager.expansion_count(),
            graph: self.graph,
        }
    }

    /// Lower one queued expansion. Only resource exhaustion is returned;
    /// any other failure is recorded and the worklist continues.
    fn step(&mut self, req: &ExpansionRequest) -> Result<(), CompilationError> {
        let program = self.program;
        let fail = |node: NodeKind, kind: ErrorKind| {
            CompilationError::new(req.name.clone(), req.args.clone(), LoweringError::new(node, kind))
        };
        let Some(decl) = program.declaration(&req.name) else {
            let kind = NameError::UnknownTemplate(req.name.clone()).into();
            self.errors.push(fail(NodeKind::Program, kind));
            return Ok(());
        };
        let node = declaration_node(decl.category());
        let expansion = match self.manager.query(req) {
            Ok(Some(expansion)) => expansion,
            Ok(None) => {
                let kind = ErrorKind::Internal(format!("queued expansion {req} was never created"));
                self.errors.push(fail(node, kind));
                return Ok(());
            }
            Err(err) => {
                self.errors.push(fail(node, err.into()));
                return Ok(());
            }
        };

        let mark = self.manager.expansion_count();
        let discovered = match lower_expansion(decl, &expansion, &mut self.manager) {
            Ok(lowered) => {
                debug!(request = %req, actual = %expansion.actual_name, "expansion lowered");
                self.fragments.push(lowered.code);
                lowered.requests
            }
            Err(err) => {
                warn!(request = %req, error = %err, "expansion failed");
                self.errors
                    .push(CompilationError::new(req.name.clone(), req.args.clone(), err));
                // Expansions created before the failure are cached and must
                // still be lowered.
                self.manager.created_since(mark).to_vec()
            }
        };

        for child in discovered {
            let Ok(Some(created)) = self.manager.query(&child) else {
                continue;
            };
            self.graph
                .add_discovery(&expansion.actual_name, &created.actual_name);
            debug!(request = %child, parent = %expansion.actual_name, "expansion queued");
            self.queue.push_back(child);

            if self.manager.expansion_count() > self.config.max_expansions {
                let chain = self.graph.chain_to(&created.actual_name).join(" -> ");
                return Err(fail(node, ErrorKind::ResourceExhaustion {
                    limit: self.config.max_expansions,
                    chain,
                }));
            }
        }
        Ok(())
    }
}

fn located(name: &str, node: NodeKind, kind: impl Into<ErrorKind>) -> CompilationError {
    CompilationError::new(name, Vec::new(), LoweringError::new(node, kind))
}

/// Compile `program`. Failures are reported in the output, never panicked.
pub fn compile(program: &Program, config: CompilerConfig) -> CompilationOutput {
    match ProgramTranslator::new(program, config.clone()) {
        Ok(translator) => translator.translate(),
        Err(err) => CompilationOutput::failed(&config, err),
    }
}

#[cfg(test)]
mod tests {
    use mlang_core::ast::{
        EntityRef, FunctionBody, Param, PortDirection, Signature, Statement, TemplateArgExpr,
        TemplateParam, TemplateParamKind, Term, Typedef,
    };
    use mlang_core::{Literal, TypeTree};

    use super::*;

    fn function(name: &str, generic: bool, statements: Vec<Statement>) -> Declaration {
        Declaration {
            name: name.into(),
            template_params: if generic {
                vec![TemplateParam {
                    name: "N".into(),
                    kind: TemplateParamKind::Value { ty: TypeTree::Int },
                }]
            } else {
                Vec::new()
            },
            signature: Signature {
                params: Vec::new(),
                return_type: Some(TypeTree::Int),
            },
            body: Body::Function(FunctionBody { statements }),
        }
    }

    fn call(name: &str, args: Vec<TemplateArgExpr>) -> Term {
        Term::Call {
            callee: EntityRef {
                name: name.into(),
                args,
            },
            args: Vec::new(),
        }
    }

    fn value(v: i64) -> TemplateArgExpr {
        TemplateArgExpr::Value(Literal::Int(v))
    }

    #[test]
    fn lowers_in_discovery_order_once_each() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
        let program = Program {
            typedefs: Vec::new(),
            enums: Vec::new(),
            declarations: vec![
                function(
                    "main",
                    false,
                    vec![Statement::Return(Term::Binary {
                        op: mlang_core::ast::BinaryOp::Add,
                        lhs: Box::new(call("g", vec![value(1)])),
                        rhs: Box::new(call("g", vec![value(1)])),
                    })],
                ),
                function("g", true, vec![Statement::Return(call("h", Vec::new()))]),
                function("h", false, vec![Statement::Return(Term::identifier("missing"))]),
            ],
        };
        let out = compile(&program, CompilerConfig::new());

        assert_eq!(out.expansions, 3);
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].declaration, "h");
        assert!(!out.is_success());

        let main = out.code.find("pub fn m_0_main").unwrap();
        let g = out.code.find("pub fn m_0_g").unwrap();
        assert!(main < g);
        assert_eq!(out.code.matches("pub fn m_0_g").count(), 1);
        assert!(!out.code.contains("pub fn m_0_h"));
        assert!(out.code.contains("use mlang_runtime::prelude::*;"));
        assert_eq!(out.graph.chain_to("m_0_g"), vec!["m_0_main", "m_0_g"]);
    }

    #[test]
    fn runaway_expansion_is_fatal() {
        let mut decls = vec![function("main", false, vec![Statement::Return(call("f0", Vec::new()))])];
        for i in 0..10 {
            decls.push(function(
                &format!("f{i}"),
                false,
                vec![Statement::Return(call(&format!("f{}", i + 1), Vec::new()))],
            ));
        }
        decls.push(function("f10", false, vec![Statement::Return(Term::int(0))]));
        let program = Program {
            typedefs: Vec::new(),
            enums: Vec::new(),
            declarations: decls,
        };

        let out = compile(
            &program,
            CompilerConfig::new()
                .with_entry_point("main")
                .with_max_expansions(4),
        );
        let last = out.errors.last().unwrap();
        let ErrorKind::ResourceExhaustion { limit, chain } = &last.kind else {
            panic!("expected resource exhaustion, got {last}");
        };
        assert_eq!(*limit, 4);
        assert!(chain.starts_with("m_0_main -> m_0_f0"));
        assert_eq!(out.expansions, 5);
    }

    #[test]
    fn unknown_entry_point_is_fatal() {
        let program = Program::default();
        let out = compile(&program, CompilerConfig::new().with_entry_point("nope"));
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].kind, NameError::UnknownTemplate("nope".into()).into());
    }

    #[test]
    fn typedefs_resolve_in_order() {
        let program = Program {
            typedefs: vec![
                Typedef {
                    name: "Small".into(),
                    ty: TypeTree::bounded(0, 3).unwrap(),
                },
                Typedef {
                    name: "Pair".into(),
                    ty: TypeTree::tuple(vec![TypeTree::named("Small"), TypeTree::named("Small")]),
                },
            ],
            enums: Vec::new(),
            declarations: vec![Declaration {
                name: "f".into(),
                template_params: Vec::new(),
                signature: Signature {
                    params: vec![Param {
                        name: "p".into(),
                        ty: TypeTree::named("Pair"),
                        direction: PortDirection::default(),
                    }],
                    return_type: None,
                },
                body: Body::Function(FunctionBody {
                    statements: Vec::new(),
                }),
            }],
        };
        let out = compile(&program, CompilerConfig::new());
        assert!(out.is_success(), "{:?}", out.errors);
        assert!(out.code.contains("pub fn m_0_f(mut id_p: Value)"));

        let broken = Program {
            typedefs: vec![Typedef {
                name: "T".into(),
                ty: TypeTree::named("Undefined"),
            }],
            enums: Vec::new(),
            declarations: Vec::new(),
        };
        let out = compile(&broken, CompilerConfig::new());
        assert_eq!(out.errors[0].node, NodeKind::Typedef);
        assert_eq!(out.errors[0].declaration, "T");
    }
}
