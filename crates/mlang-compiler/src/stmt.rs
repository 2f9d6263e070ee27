//! Statement lowering shared by functions and automata.

use mlang_core::ast::{Assign, Statement, Term, VarDecl};
use mlang_core::node::NodeKind;
use mlang_core::{
    At, ErrorKind, LoweringError, NameError, TypeError, TypeTree, require_coercion,
};

use crate::context::TypeContext;
use crate::emit::{self, CodeWriter};
use crate::template::{ExpansionRequest, TemplateManager};
use crate::term::{LoweredPlace, ResolvedTerm, TermLowerer};

/// Lowers the statements of one expansion body.
///
/// Owns the expansion's context, so locals declared here never leak into
/// another expansion.
pub struct BodyLowerer<'a> {
    ctx: TypeContext,
    manager: &'a mut TemplateManager,
    requests: Vec<ExpansionRequest>,
    temps: usize,
}

impl<'a> BodyLowerer<'a> {
    pub fn new(ctx: TypeContext, manager: &'a mut TemplateManager) -> Self {
        Self {
            ctx,
            manager,
            requests: Vec::new(),
            temps: 0,
        }
    }

    pub fn context(&self) -> &TypeContext {
        &self.ctx
    }

    fn terms(&mut self) -> TermLowerer<'_> {
        TermLowerer::new(&self.ctx, self.manager)
    }

    fn temp(&mut self, prefix: &str) -> String {
        let name = format!("{prefix}{}", self.temps);
        self.temps += 1;
        name
    }

    /// Lower a term and keep the expansions it created.
    pub fn term(&mut self, term: &Term) -> Result<ResolvedTerm, LoweringError> {
        let mut resolved = self.terms().lower(term)?;
        self.requests.append(&mut resolved.requests);
        Ok(resolved)
    }

    /// Expansions created so far, in discovery order.
    pub fn into_requests(self) -> Vec<ExpansionRequest> {
        self.requests
    }

    pub fn statement(&mut self, stmt: &Statement, out: &mut CodeWriter) -> Result<(), LoweringError> {
        match stmt {
            Statement::VarDecl(decl) => self.var_decl(decl, out),
            Statement::Assign(assign) => self.assign(assign, out),
            Statement::Return(term) => self.return_stmt(term, out),
            Statement::Sync(ports) => self.sync(ports, out),
        }
    }

    // ==========================================================================
    // Declarations
    // ==========================================================================

    /// `let mut id_x = <init>;` per declared name.
    ///
    /// The initializer is lowered before the names are bound, so it cannot
    /// refer to them.
    pub fn var_decl(&mut self, decl: &VarDecl, out: &mut CodeWriter) -> Result<(), LoweringError> {
        let node = NodeKind::VarDecl;
        let ty = self.ctx.instantiate(&decl.ty).at(node)?;
        let mut init = self.terms().lower_init(&ty)?;
        self.requests.append(&mut init.requests);
        let local_ty = ty.de_init();
        for name in &decl.names {
            self.ctx.set_local(name, local_ty.clone()).at(node)?;
            out.line(format!("let mut {} = {};", emit::local(name), init.code));
        }
        Ok(())
    }

    // ==========================================================================
    // Assignment
    // ==========================================================================

    /// Lower one of the three assignment shapes.
    ///
    /// Every right-hand value and index key is evaluated into a temporary
    /// before the first store, so the targets update together.
    pub fn assign(&mut self, assign: &Assign, out: &mut CodeWriter) -> Result<(), LoweringError> {
        let node = NodeKind::AssignStmt;
        let (n, m) = (assign.lhs.len(), assign.rhs.len());
        if n == 0 || m == 0 || (n != m && n != 1 && m != 1) {
            return Err(TypeError::AssignmentShape { lhs: n, rhs: m }).at(node);
        }

        let rhs = assign
            .rhs
            .iter()
            .map(|t| self.term(t))
            .collect::<Result<Vec<_>, _>>()?;
        let mut places = Vec::with_capacity(n);
        for target in &assign.lhs {
            let mut temps = self.temps;
            let mut place = self.terms().lower_place(target, &mut temps)?;
            self.temps = temps;
            self.requests.append(&mut place.requests);
            places.push(place);
        }

        let values: Vec<String> = if n == m {
            let mut values = Vec::with_capacity(n);
            for (value, place) in rhs.iter().zip(&places) {
                let code = value.coerced(&place.place.ty()).at(node)?;
                let temp = self.temp("t");
                out.line(format!("let {temp} = {code};"));
                values.push(temp);
            }
            values
        } else if n == 1 {
            self.pack(&rhs, &places[0], out).at(node)?
        } else {
            self.spread(&rhs[0], &places, out).at(node)?
        };

        for place in &places {
            for line in &place.prelude {
                out.line(line);
            }
        }
        for (place, value) in places.iter().zip(&values) {
            out.line(place.place.store(value));
        }
        Ok(())
    }

    /// Several values into one target: build a tuple, then coerce it.
    fn pack(
        &mut self,
        rhs: &[ResolvedTerm],
        place: &LoweredPlace,
        out: &mut CodeWriter,
    ) -> Result<Vec<String>, ErrorKind> {
        let types = rhs
            .iter()
            .map(|r| r.require_type().cloned())
            .collect::<Result<Vec<_>, _>>()?;
        let tuple = TypeTree::tuple(types);
        let plan = require_coercion(&tuple, &place.place.ty())?;
        let codes: Vec<String> = rhs.iter().map(|r| r.code.clone()).collect();
        let packed = format!("Value::Tuple({})", emit::vec_of(&codes));
        let temp = self.temp("t");
        out.line(format!("let {temp} = {};", emit::apply(&packed, &plan)));
        Ok(vec![temp])
    }

    /// One array or list over several targets.
    fn spread(
        &mut self,
        rhs: &ResolvedTerm,
        places: &[LoweredPlace],
        out: &mut CodeWriter,
    ) -> Result<Vec<String>, ErrorKind> {
        let n = places.len();
        let ty = rhs.require_type()?.strip_init();
        let element = match ty {
            TypeTree::Array { element, .. } if ty.array_length().is_some_and(|len| len >= n) => {
                element
            }
            TypeTree::List(element) => element,
            _ => {
                return Err(TypeError::NoCoercion {
                    from: ty.to_string(),
                    to: format!("array[{n}]"),
                }
                .into());
            }
        };

        let spread = self.temp("s");
        out.line(format!("let {spread} = ({}).spread({n})?;", rhs.code));
        let mut values = Vec::with_capacity(n);
        for (i, place) in places.iter().enumerate() {
            let plan = require_coercion(element, &place.place.ty())?;
            let temp = self.temp("t");
            let item = format!("{spread}[{i}].clone()");
            out.line(format!("let {temp} = {};", emit::apply(&item, &plan)));
            values.push(temp);
        }
        Ok(values)
    }

    // ==========================================================================
    // Control
    // ==========================================================================

    /// `return Ok(<value>);`, coerced to the declared return type.
    pub fn return_stmt(&mut self, term: &Term, out: &mut CodeWriter) -> Result<(), LoweringError> {
        let node = NodeKind::ReturnStmt;
        let value = self.term(term)?;
        let code = match self.ctx.return_type() {
            Some(ty) => value.coerced(ty).at(node)?,
            None => {
                return Err(TypeError::NoCoercion {
                    from: value
                        .ty
                        .as_ref()
                        .map_or_else(|| value.code.clone(), TypeTree::to_string),
                    to: "nothing".to_string(),
                })
                .at(node);
            }
        };
        out.line(format!("return Ok({code});"));
        Ok(())
    }

    /// Two-phase rendezvous on each port in turn.
    pub fn sync(&mut self, ports: &[String], out: &mut CodeWriter) -> Result<(), LoweringError> {
        for port in ports {
            if !self.ctx.is_port(port) {
                return Err(NameError::UnknownPort(port.clone())).at(NodeKind::SyncStmt);
            }
            out.line(format!("{}.sync(unit.party()).await;", emit::local(port)));
        }
        Ok(())
    }

    /// A guard, which must be a boolean.
    pub fn guard(&mut self, term: &Term) -> Result<String, LoweringError> {
        let guard = self.term(term)?;
        let code = guard.coerced(&TypeTree::Bool).at(NodeKind::GuardedStmt)?;
        Ok(format!("({code}).truthy()?"))
    }
}

#[cfg(test)]
mod tests {
    use mlang_core::ast::{Param, PortDirection};
    use mlang_core::{Literal, TypeTree};

    use super::*;
    use crate::context::SignatureRole;

    fn context() -> TypeContext {
        let mut ctx = TypeContext::new();
        ctx.set_signature(
            &[Param {
                name: "p".into(),
                ty: TypeTree::Int,
                direction: PortDirection::default(),
            }],
            Some(TypeTree::Real),
            SignatureRole::Ports,
        )
        .unwrap();
        ctx
    }

    fn run(ctx: TypeContext, stmts: &[Statement]) -> Result<String, LoweringError> {
        let mut m = TemplateManager::new(TypeContext::new());
        let mut body = BodyLowerer::new(ctx, &mut m);
        let mut out = CodeWriter::new();
        for s in stmts {
            body.statement(s, &mut out)?;
        }
        Ok(out.finish())
    }

    fn var(names: &[&str], ty: TypeTree) -> Statement {
        Statement::VarDecl(VarDecl {
            names: names.iter().map(|n| n.to_string()).collect(),
            ty,
        })
    }

    fn assign(lhs: Vec<Term>, rhs: Vec<Term>) -> Statement {
        Statement::Assign(Assign { lhs, rhs })
    }

    fn id(name: &str) -> Term {
        Term::identifier(name)
    }

    #[test]
    fn var_decl_binds_each_name() {
        let code = run(context(), &[var(&["a", "b"], TypeTree::Int)]).unwrap();
        assert_eq!(code, "let mut id_a = Value::int(0);\nlet mut id_b = Value::int(0);\n");

        let err = run(
            context(),
            &[var(&["a"], TypeTree::Int), var(&["a"], TypeTree::Real)],
        )
        .unwrap_err();
        assert_eq!(err.node, NodeKind::VarDecl);
        assert!(matches!(err.kind, ErrorKind::Name(NameError::Redeclared { .. })));

        let err = run(
            context(),
            &[var(&["x"], TypeTree::init(TypeTree::Int, id("x")))],
        )
        .unwrap_err();
        assert_eq!(err.kind, NameError::UnknownIdentifier("x".into()).into());
    }

    #[test]
    fn parallel_assignment_evaluates_before_storing() {
        let code = run(
            context(),
            &[
                var(&["a", "b"], TypeTree::Int),
                assign(vec![id("a"), id("b")], vec![id("b"), id("a")]),
            ],
        )
        .unwrap();
        assert!(code.ends_with(
            "let t0 = id_b.clone();\nlet t1 = id_a.clone();\nid_a = t0;\nid_b = t1;\n"
        ));
    }

    #[test]
    fn one_target_packs_a_tuple() {
        let pair = TypeTree::tuple(vec![TypeTree::Int, TypeTree::Real]);
        let code = run(
            context(),
            &[
                var(&["t"], pair),
                assign(vec![id("t")], vec![Term::int(1), Term::int(2)]),
            ],
        )
        .unwrap();
        assert!(code.contains(
            "let t0 = convert(&(Value::Tuple(vec![Value::int(1), Value::int(2)])), \
             &Coercion::Tuple(vec![Coercion::Direct, Coercion::Direct]))?;\nid_t = t0;"
        ));

        let err = run(
            context(),
            &[
                var(&["t"], TypeTree::Int),
                assign(vec![id("t")], vec![Term::int(1), Term::int(2)]),
            ],
        )
        .unwrap_err();
        assert_eq!(err.node, NodeKind::AssignStmt);
    }

    #[test]
    fn one_source_spreads_over_targets() {
        let code = run(
            context(),
            &[
                var(&["x", "y"], TypeTree::Real),
                var(&["arr"], TypeTree::array(3, TypeTree::Int).unwrap()),
                assign(vec![id("x"), id("y")], vec![id("arr")]),
            ],
        )
        .unwrap();
        assert!(code.contains("let s0 = (id_arr.clone()).spread(2)?;"));
        assert!(code.contains("let t1 = s0[0].clone();\nlet t2 = s0[1].clone();\nid_x = t1;\nid_y = t2;"));

        let err = run(
            context(),
            &[
                var(&["x", "y", "z"], TypeTree::Int),
                var(&["arr"], TypeTree::array(2, TypeTree::Int).unwrap()),
                assign(vec![id("x"), id("y"), id("z")], vec![id("arr")]),
            ],
        )
        .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Type(TypeError::NoCoercion { .. })));
    }

    #[test]
    fn mismatched_arity_is_rejected() {
        let err = run(
            context(),
            &[
                var(&["a", "b"], TypeTree::Int),
                assign(
                    vec![id("a"), id("b")],
                    vec![Term::int(1), Term::int(2), Term::int(3)],
                ),
            ],
        )
        .unwrap_err();
        assert_eq!(err.kind, TypeError::AssignmentShape { lhs: 2, rhs: 3 }.into());
    }

    #[test]
    fn return_and_sync() {
        let code = run(
            context(),
            &[
                Statement::Return(Term::int(1)),
                Statement::Sync(vec!["p".into()]),
            ],
        )
        .unwrap();
        assert_eq!(
            code,
            "return Ok(Value::int(1));\nid_p.sync(unit.party()).await;\n"
        );

        let err = run(context(), &[Statement::Sync(vec!["q".into()])]).unwrap_err();
        assert_eq!(err.kind, NameError::UnknownPort("q".into()).into());

        let err = run(
            context(),
            &[Statement::Return(Term::Literal(Literal::Char('c')))],
        )
        .unwrap_err();
        assert_eq!(err.node, NodeKind::ReturnStmt);
    }
}
