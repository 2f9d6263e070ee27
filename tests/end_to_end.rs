//! End-to-end tests: attributed trees in, emitted Rust and diagnostics out.

use mlang::runtime::{PartyId, Port, RuntimeError, TaskGroup, Unit};
use mlang::{
    AttrValue, AttributedTree, CompilationOutput, CompilerConfig, ErrorKind, NodeKind,
    StructuralError, TypeError, compile, infer_original_name,
};

// ============================================================================
// Tree builders
// ============================================================================

fn node(kind: &str) -> AttributedTree {
    AttributedTree::new(kind)
}

fn ident(name: &str) -> AttributedTree {
    AttributedTree::identifier(name)
}

fn int(v: i64) -> AttributedTree {
    AttributedTree::value(v)
}

fn names(items: &[&str]) -> AttrValue {
    AttrValue::Names(items.iter().map(|s| s.to_string()).collect())
}

fn param(name: &str, ty: AttributedTree) -> AttributedTree {
    node("param").with_attr("value", name).with_child(ty)
}

fn signature(params: Vec<AttributedTree>, ret: Option<AttributedTree>) -> AttributedTree {
    node("signature")
        .with_children(params)
        .with_children(ret.map(|r| node("return_type").with_child(r)))
}

fn type_param(name: &str) -> AttributedTree {
    node("template_params").with_child(
        node("template_param")
            .with_attr("value", name)
            .with_child(node("abstype")),
    )
}

fn value_param(name: &str) -> AttributedTree {
    node("template_params").with_child(
        node("template_param")
            .with_attr("value", name)
            .with_child(node("int")),
    )
}

fn function(
    name: &str,
    template: Option<AttributedTree>,
    sig: AttributedTree,
    statements: Vec<AttributedTree>,
) -> AttributedTree {
    node("function_decl")
        .with_child(ident(name))
        .with_children(template)
        .with_child(sig)
        .with_child(node("statements").with_children(statements))
}

fn call(name: &str, template: Option<Vec<AttributedTree>>, args: Vec<AttributedTree>) -> AttributedTree {
    node("func_term")
        .with_child(ident(name))
        .with_children(template.map(|t| node("template_apply").with_children(t)))
        .with_children(args)
}

fn binop(op: &str, lhs: AttributedTree, rhs: AttributedTree) -> AttributedTree {
    node("binop_term").with_attr("value", op).with_child(lhs).with_child(rhs)
}

fn ret(term: AttributedTree) -> AttributedTree {
    node("return_stmt").with_child(term)
}

fn var(vars: &[&str], ty: AttributedTree) -> AttributedTree {
    node("var_decl")
        .with_children(vars.iter().map(|v| ident(v)))
        .with_child(ty)
}

fn assign(lhs: Vec<AttributedTree>, rhs: Vec<AttributedTree>) -> AttributedTree {
    node("assign_stmt")
        .with_child(node("lhs").with_children(lhs))
        .with_child(node("rhs").with_children(rhs))
}

fn guarded(guard: bool, effects: Vec<AttributedTree>) -> AttributedTree {
    node("guarded_stmt")
        .with_child(AttributedTree::value(guard))
        .with_children(effects)
}

fn automaton(name: &str, ports: &[&str], vars: Vec<AttributedTree>, trans: Vec<AttributedTree>) -> AttributedTree {
    node("automaton_decl")
        .with_child(ident(name))
        .with_child(signature(
            ports.iter().map(|p| param(p, node("int"))).collect(),
            None,
        ))
        .with_child(node("automaton_vars").with_children(vars))
        .with_child(node("automaton_trans").with_children(trans))
}

fn component(instances: &[&str], entity: &str) -> AttributedTree {
    node("component_decl")
        .with_children(instances.iter().map(|i| ident(i)))
        .with_child(node("entity").with_child(ident(entity)))
}

fn comp_port(instance: &str, port: &str) -> AttributedTree {
    node("comp_port_name")
        .with_child(ident(instance))
        .with_child(ident(port))
}

fn connection(entity: &str, endpoints: Vec<AttributedTree>) -> AttributedTree {
    node("entity_connection")
        .with_child(ident(entity))
        .with_children(endpoints)
}

fn program(decls: Vec<AttributedTree>) -> AttributedTree {
    node("program").with_children(decls)
}

fn run(tree: &AttributedTree, config: CompilerConfig) -> CompilationOutput {
    compile(tree, config).expect("tree is well formed")
}

// ============================================================================
// Template expansion
// ============================================================================

#[test]
fn structurally_equal_requests_share_one_expansion() {
    let id = function(
        "id",
        Some(type_param("T")),
        signature(vec![param("x", ident("T"))], Some(ident("T"))),
        vec![ret(ident("x"))],
    );
    let main = function(
        "main",
        None,
        signature(Vec::new(), Some(node("real"))),
        vec![ret(binop(
            "+",
            binop(
                "+",
                call("id", Some(vec![node("int")]), vec![int(1)]),
                call("id", Some(vec![node("int")]), vec![int(2)]),
            ),
            call("id", Some(vec![node("real")]), vec![AttributedTree::value(2.5)]),
        ))],
    );
    let out = run(&program(vec![id, main]), CompilerConfig::default());

    assert!(out.is_success(), "{:?}", out.errors);
    assert_eq!(out.expansions, 3);
    assert_eq!(out.code.matches("pub fn m_0_id(").count(), 1);
    assert_eq!(out.code.matches("pub fn m_1_id(").count(), 1);
    assert!(out.code.contains("m_0_id(Value::int(1))?"));
    assert!(out.code.contains("m_0_id(Value::int(2))?"));
    assert!(out.code.contains("m_1_id(Value::real(2.5))?"));
    assert_eq!(infer_original_name("m_1_id"), Some("id"));
    assert_eq!(out.graph.children("m_0_main"), vec!["m_0_id", "m_1_id"]);
}

#[test]
fn runaway_instantiation_is_reported_with_its_chain() {
    let mut decls = Vec::new();
    for i in 0..8 {
        decls.push(function(
            &format!("f{i}"),
            None,
            signature(Vec::new(), Some(node("int"))),
            vec![ret(call(&format!("f{}", i + 1), None, Vec::new()))],
        ));
    }
    decls.push(function(
        "f8",
        None,
        signature(Vec::new(), Some(node("int"))),
        vec![ret(int(0))],
    ));

    let config = CompilerConfig::new()
        .with_entry_point("f0")
        .with_max_expansions(3);
    let out = run(&program(decls), config);
    let err = out.errors.last().unwrap();
    let ErrorKind::ResourceExhaustion { limit, chain } = &err.kind else {
        panic!("expected resource exhaustion, got {err}");
    };
    assert_eq!(*limit, 3);
    assert_eq!(chain, "m_0_f0 -> m_0_f1 -> m_0_f2 -> m_0_f3");
}

// ============================================================================
// Types and statements
// ============================================================================

#[test]
fn struct_arguments_use_width_subtyping() {
    let narrow = |name: &str, fields: &[&str]| {
        function(
            name,
            None,
            signature(
                vec![param(
                    "s",
                    node("struct")
                        .with_attr("fields", names(fields))
                        .with_child(node("int"))
                        .with_child(node("int")),
                )],
                Some(node("int")),
            ),
            vec![ret(node("dot_term").with_child(ident("s")).with_child(ident("a")))],
        )
    };
    let literal = || {
        node("struct_term")
            .with_attr("fields", names(&["a", "b", "c"]))
            .with_children([int(1), int(2), int(3)])
    };
    let main = function(
        "main",
        None,
        signature(Vec::new(), Some(node("int"))),
        vec![ret(call("ac", None, vec![literal()]))],
    );
    let other = function(
        "other",
        None,
        signature(Vec::new(), Some(node("int"))),
        vec![ret(call("ad", None, vec![literal()]))],
    );
    let config = CompilerConfig::new()
        .with_entry_point("main")
        .with_entry_point("other");
    let out = run(
        &program(vec![narrow("ac", &["a", "c"]), narrow("ad", &["a", "d"]), main, other]),
        config,
    );

    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].declaration, "other");
    assert_eq!(out.errors[0].node, NodeKind::FuncTerm);
    assert!(matches!(out.errors[0].kind, ErrorKind::Type(TypeError::NoCoercion { .. })));
    assert!(out.code.contains("pub fn m_0_ac("));
    assert!(out.code.contains("(id_s.clone()).field(\"a\")?"));
    assert!(!out.code.contains("pub fn m_0_other("));
}

#[test]
fn assignment_shapes() {
    let pair = node("tuple").with_child(node("int")).with_child(node("real"));
    let arr = node("array").with_attr("length", 3i64).with_child(node("int"));
    let main = function(
        "main",
        None,
        signature(Vec::new(), Some(node("int"))),
        vec![
            var(&["a", "b"], node("int")),
            var(&["t"], pair),
            var(&["arr"], arr),
            assign(vec![ident("a"), ident("b")], vec![int(1), int(2)]),
            assign(vec![ident("t")], vec![int(1), int(2)]),
            assign(vec![ident("a"), ident("b")], vec![ident("arr")]),
            ret(ident("a")),
        ],
    );
    let bad = function(
        "bad",
        None,
        signature(Vec::new(), None),
        vec![
            var(&["a", "b"], node("int")),
            assign(vec![ident("a"), ident("b")], vec![int(1), int(2), int(3)]),
        ],
    );
    let out = run(&program(vec![main, bad]), CompilerConfig::default());

    assert_eq!(out.errors.len(), 1);
    assert_eq!(out.errors[0].declaration, "bad");
    assert_eq!(out.errors[0].node, NodeKind::AssignStmt);
    assert_eq!(
        out.errors[0].kind,
        TypeError::AssignmentShape { lhs: 2, rhs: 3 }.into()
    );

    assert!(out.code.contains("let mut id_arr = Value::repeat(Value::int(0), 3);"));
    assert!(out.code.contains("Value::Tuple(vec![Value::int(1), Value::int(2)])"));
    assert!(out.code.contains("(id_arr.clone()).spread(2)?"));
}

#[test]
fn failures_carry_declaration_and_template_arguments() {
    let g = function(
        "g",
        Some(value_param("N")),
        signature(Vec::new(), Some(node("char"))),
        vec![ret(ident("N"))],
    );
    let main = function(
        "main",
        None,
        signature(Vec::new(), None),
        vec![var(
            &["x"],
            node("init")
                .with_attr("term", call("g", Some(vec![int(5)]), Vec::new()))
                .with_child(node("char")),
        )],
    );
    let out = run(&program(vec![g, main]), CompilerConfig::default());

    assert_eq!(out.errors.len(), 1);
    let err = &out.errors[0];
    assert_eq!(err.declaration, "g");
    assert_eq!(err.node, NodeKind::ReturnStmt);
    assert!(err.to_string().starts_with("TypeError in 'g<5>' at <return_stmt>"));
    assert!(out.code.contains("pub fn m_0_main("));
    assert!(!out.code.contains("pub fn m_0_g("));
}

#[test]
fn typed_functions_must_return() {
    let silent = function(
        "silent",
        None,
        signature(Vec::new(), Some(node("int"))),
        vec![var(&["x"], node("int"))],
    );
    let out = run(&program(vec![silent]), CompilerConfig::default());

    assert_eq!(out.errors.len(), 1);
    let err = &out.errors[0];
    assert_eq!(err.node, NodeKind::FunctionDecl);
    assert_eq!(
        err.kind,
        TypeError::MissingReturn {
            expected: "int".into()
        }
        .into()
    );
    assert!(!out.code.contains("pub fn m_0_silent("));
}

#[test]
fn malformed_trees_are_rejected_before_lowering() {
    let tree = program(vec![node("while_stmt")]);
    let err = compile(&tree, CompilerConfig::default()).unwrap_err();
    assert_eq!(
        err.kind,
        StructuralError::UnknownNode("while_stmt".into()).into()
    );
}

// ============================================================================
// Automata and systems
// ============================================================================

fn network() -> AttributedTree {
    let bump = |v: i64| assign(vec![ident("x")], vec![int(v)]);
    let toggle = automaton(
        "Toggle",
        &["p"],
        vec![var(&["x"], node("int"))],
        vec![
            node("transition").with_child(guarded(true, vec![node("sync_stmt").with_child(ident("p"))])),
            node("guarded_stmt_grp").with_children([
                guarded(false, vec![bump(0)]),
                guarded(true, vec![bump(1)]),
                guarded(true, vec![bump(2)]),
            ]),
        ],
    );
    let wire = automaton("Wire", &["a", "b"], Vec::new(), Vec::new());
    let main = node("system_decl")
        .with_child(ident("Main"))
        .with_child(signature(Vec::new(), None))
        .with_child(node("system_comp").with_child(component(&["left", "right"], "Toggle")))
        .with_child(node("system_conn").with_child(connection(
            "Wire",
            vec![comp_port("left", "p"), comp_port("right", "p")],
        )));
    program(vec![toggle, wire, main])
}

#[test]
fn systems_spawn_one_task_per_component_and_connection() {
    let out = run(&network(), CompilerConfig::new().with_entry_point("Main"));
    assert!(out.is_success(), "{:?}", out.errors);
    assert_eq!(out.expansions, 3);

    let main = out.code.find("pub async fn m_0_Main(").unwrap();
    let system = &out.code[main..];
    assert_eq!(system.matches("tasks.spawn(").count(), 3);
    assert_eq!(system.matches("= Port::new();").count(), 2);
    assert!(system.contains("m_0_Toggle(Unit::new(party_0), n_0.bind(party_0))"));
    assert!(system.contains("m_0_Wire(Unit::new(party_2), n_0.bind(party_2), n_1.bind(party_2))"));
    assert!(out.code.find("pub async fn m_0_Toggle(").unwrap() > main);
}

#[test]
fn guarded_groups_choose_among_enabled_branches() {
    let out = run(&network(), CompilerConfig::new().with_entry_point("Toggle"));
    assert!(out.is_success(), "{:?}", out.errors);
    assert!(out.code.contains("if (Value::Bool(true)).truthy()? {"));
    assert!(out.code.contains("id_p.sync(unit.party()).await;"));
    assert!(out.code.contains(
        "let enabled = [(Value::Bool(false)).truthy()?, \
         (Value::Bool(true)).truthy()?, (Value::Bool(true)).truthy()?];"
    ));

    // Same selection the emitted `match` performs.
    let mut unit = Unit::seeded(PartyId::fresh(), 11);
    for _ in 0..100 {
        let picked = unit.choose(&[false, true, true]).unwrap();
        assert!(picked == 1 || picked == 2);
    }
    assert_eq!(unit.choose(&[false, false, false]), None);
}

#[tokio::test]
async fn bound_parties_rendezvous_under_one_task_group() {
    // Runtime shape of `m_0_Main` above: bind everything, then spawn.
    let shared = Port::new();
    let mut tasks = TaskGroup::new();
    let mut starts = Vec::new();
    for _ in 0..3 {
        let party = PartyId::fresh();
        let mut unit = Unit::new(party);
        let port = shared.bind(party);
        starts.push(async move {
            for _ in 0..5 {
                port.sync(unit.party()).await;
                unit.end_round().await;
            }
            Ok::<(), RuntimeError>(())
        });
    }
    assert_eq!(shared.parties(), 3);
    for start in starts {
        tasks.spawn(start);
    }
    assert_eq!(tasks.spawned(), 3);
    tasks.join().await.unwrap();
}
