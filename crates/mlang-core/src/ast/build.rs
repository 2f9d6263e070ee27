//! Conversion from the generic attributed tree to typed declarations.

use crate::error::{At, CompilationError, LoweringError, StructuralError};
use crate::literal::Literal;
use crate::node::NodeKind;
use crate::tree::{AttrValue, AttributedTree};
use crate::type_tree::{Bound, TypeTree};

use super::Program;
use super::decl::*;
use super::expr::{BinaryOp, Term};
use super::stmt::*;

type BuildResult<T> = Result<T, LoweringError>;

// ============================================================================
// Helpers
// ============================================================================

/// Classify a node; unknown kinds are reported against `parent`.
fn kind_of(tree: &AttributedTree, parent: NodeKind) -> BuildResult<NodeKind> {
    NodeKind::from_name(&tree.name)
        .ok_or_else(|| StructuralError::UnknownNode(tree.name.clone()))
        .at(parent)
}

fn unexpected(parent: NodeKind, expected: &str, found: &AttributedTree) -> LoweringError {
    LoweringError::new(
        parent,
        StructuralError::UnexpectedChild {
            parent: parent.to_string(),
            expected: expected.to_string(),
            found: found.name.clone(),
        },
    )
}

fn expect_kind(tree: &AttributedTree, kind: NodeKind, parent: NodeKind) -> BuildResult<()> {
    if kind_of(tree, parent)? == kind {
        Ok(())
    } else {
        Err(unexpected(parent, &format!("<{kind}>"), tree))
    }
}

fn child_count(tree: &AttributedTree, kind: NodeKind, expected: usize) -> BuildResult<()> {
    if tree.n_children() == expected {
        Ok(())
    } else {
        Err(LoweringError::new(
            kind,
            StructuralError::ChildCount {
                node: kind.to_string(),
                expected: expected.to_string(),
                found: tree.n_children(),
            },
        ))
    }
}

fn attr<'a>(tree: &'a AttributedTree, kind: NodeKind, key: &str) -> BuildResult<&'a AttrValue> {
    tree.attr(key)
        .ok_or_else(|| StructuralError::MissingAttribute {
            node: kind.to_string(),
            attr: key.to_string(),
        })
        .at(kind)
}

fn wrong_attr(kind: NodeKind, key: &str) -> LoweringError {
    LoweringError::new(
        kind,
        StructuralError::AttributeKind {
            node: kind.to_string(),
            attr: key.to_string(),
        },
    )
}

fn str_attr(tree: &AttributedTree, kind: NodeKind, key: &str) -> BuildResult<String> {
    attr(tree, kind, key)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_attr(kind, key))
}

/// The `value` of an `IDENTIFIER` child.
fn identifier(tree: &AttributedTree, parent: NodeKind) -> BuildResult<String> {
    expect_kind(tree, NodeKind::Identifier, parent)?;
    str_attr(tree, NodeKind::Identifier, "value")
}

fn bound_attr(tree: &AttributedTree, kind: NodeKind, key: &str) -> BuildResult<Bound> {
    match attr(tree, kind, key)? {
        AttrValue::Int(v) => Ok(Bound::Literal(*v)),
        AttrValue::Str(name) => Ok(Bound::Param(name.clone())),
        _ => Err(wrong_attr(kind, key)),
    }
}

fn literal(tree: &AttributedTree) -> BuildResult<Literal> {
    let kind = NodeKind::Value;
    match attr(tree, kind, "value")? {
        AttrValue::Int(v) => Ok(Literal::Int(*v)),
        AttrValue::Real(v) => Ok(Literal::Real(*v)),
        AttrValue::Bool(v) => Ok(Literal::Bool(*v)),
        AttrValue::Char(v) => Ok(Literal::Char(*v)),
        _ => Err(wrong_attr(kind, "value")),
    }
}

fn only_child(tree: &AttributedTree, kind: NodeKind) -> BuildResult<&AttributedTree> {
    child_count(tree, kind, 1)?;
    Ok(&tree.children[0])
}

// ============================================================================
// Types
// ============================================================================

/// Build a type from a type node (or an `IDENTIFIER` alias reference).
pub fn build_type(tree: &AttributedTree, parent: NodeKind) -> BuildResult<TypeTree> {
    let kind = kind_of(tree, parent)?;
    match kind {
        NodeKind::Int => Ok(TypeTree::Int),
        NodeKind::Real => Ok(TypeTree::Real),
        NodeKind::Bool => Ok(TypeTree::Bool),
        NodeKind::Char => Ok(TypeTree::Char),
        NodeKind::BoundedInt => {
            let l = bound_attr(tree, kind, "l")?;
            let r = bound_attr(tree, kind, "r")?;
            TypeTree::bounded_with(l, r).at(kind)
        }
        NodeKind::Identifier => Ok(TypeTree::Named(str_attr(tree, kind, "value")?)),
        NodeKind::Enum => Ok(TypeTree::Enum(str_attr(tree, kind, "value")?)),
        NodeKind::Tuple => Ok(TypeTree::tuple(build_types(tree, kind)?)),
        NodeKind::Union => Ok(TypeTree::union(build_types(tree, kind)?)),
        NodeKind::Array => {
            let length = bound_attr(tree, kind, "length")?;
            let element = build_type(only_child(tree, kind)?, kind)?;
            TypeTree::array_with(length, element).at(kind)
        }
        NodeKind::List => Ok(TypeTree::list(build_type(only_child(tree, kind)?, kind)?)),
        NodeKind::Map => {
            child_count(tree, kind, 2)?;
            Ok(TypeTree::map(
                build_type(&tree.children[0], kind)?,
                build_type(&tree.children[1], kind)?,
            ))
        }
        NodeKind::Struct => {
            let fields = attr(tree, kind, "fields")?
                .as_names()
                .ok_or_else(|| wrong_attr(kind, "fields"))?;
            child_count(tree, kind, fields.len())?;
            let types = build_types(tree, kind)?;
            TypeTree::structure(fields.iter().cloned().zip(types)).at(kind)
        }
        NodeKind::Init => {
            let term_tree = attr(tree, kind, "term")?
                .as_tree()
                .ok_or_else(|| wrong_attr(kind, "term"))?;
            let term = build_term(term_tree, kind)?;
            let ty = build_type(only_child(tree, kind)?, kind)?;
            Ok(TypeTree::init(ty, term))
        }
        _ => Err(unexpected(parent, "a type", tree)),
    }
}

fn build_types(tree: &AttributedTree, kind: NodeKind) -> BuildResult<Vec<TypeTree>> {
    tree.children.iter().map(|c| build_type(c, kind)).collect()
}

// ============================================================================
// Terms
// ============================================================================

fn template_apply(tree: &AttributedTree) -> BuildResult<Vec<TemplateArgExpr>> {
    let kind = NodeKind::TemplateApply;
    tree.children
        .iter()
        .map(|child| match kind_of(child, kind)? {
            NodeKind::Value => Ok(TemplateArgExpr::Value(literal(child)?)),
            NodeKind::Identifier => Ok(TemplateArgExpr::Name(identifier(child, kind)?)),
            k if k.is_type() => Ok(TemplateArgExpr::Type(build_type(child, kind)?)),
            _ => Err(unexpected(kind, "a type or value", child)),
        })
        .collect()
}

/// Reads `IDENTIFIER, template_apply?` from the front of `children`, returning
/// the reference and the number of children consumed.
fn entity_ref(children: &[AttributedTree], parent: NodeKind) -> BuildResult<(EntityRef, usize)> {
    let first = children.first().ok_or_else(|| {
        LoweringError::new(
            parent,
            StructuralError::ChildCount {
                node: parent.to_string(),
                expected: "at least 1".to_string(),
                found: 0,
            },
        )
    })?;
    let name = identifier(first, parent)?;
    match children.get(1) {
        Some(next) if next.name == NodeKind::TemplateApply.as_str() => Ok((
            EntityRef {
                name,
                args: template_apply(next)?,
            },
            2,
        )),
        _ => Ok((EntityRef::plain(name), 1)),
    }
}

/// Build a term node.
pub fn build_term(tree: &AttributedTree, parent: NodeKind) -> BuildResult<Term> {
    let kind = kind_of(tree, parent)?;
    match kind {
        NodeKind::Value => Ok(Term::Literal(literal(tree)?)),
        NodeKind::Identifier => Ok(Term::Identifier(str_attr(tree, kind, "value")?)),
        NodeKind::FuncTerm => {
            let (callee, used) = entity_ref(&tree.children, kind)?;
            let args = build_terms(&tree.children[used..], kind)?;
            Ok(Term::Call { callee, args })
        }
        NodeKind::StructTerm => {
            let fields = attr(tree, kind, "fields")?
                .as_names()
                .ok_or_else(|| wrong_attr(kind, "fields"))?;
            child_count(tree, kind, fields.len())?;
            let values = build_terms(&tree.children, kind)?;
            Ok(Term::Struct(fields.iter().cloned().zip(values).collect()))
        }
        NodeKind::ListTerm => Ok(Term::List(build_terms(&tree.children, kind)?)),
        NodeKind::TupleTerm => Ok(Term::Tuple(build_terms(&tree.children, kind)?)),
        NodeKind::MapTerm => {
            if tree.n_children() % 2 != 0 {
                return Err(LoweringError::new(
                    kind,
                    StructuralError::ChildCount {
                        node: kind.to_string(),
                        expected: "an even number of".to_string(),
                        found: tree.n_children(),
                    },
                ));
            }
            let items = build_terms(&tree.children, kind)?;
            let mut pairs = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                pairs.push((k, v));
            }
            Ok(Term::Map(pairs))
        }
        NodeKind::DotTerm => {
            child_count(tree, kind, 2)?;
            Ok(Term::Dot {
                target: Box::new(build_term(&tree.children[0], kind)?),
                member: identifier(&tree.children[1], kind)?,
            })
        }
        NodeKind::BrackTerm => {
            child_count(tree, kind, 2)?;
            Ok(Term::Index {
                target: Box::new(build_term(&tree.children[0], kind)?),
                index: Box::new(build_term(&tree.children[1], kind)?),
            })
        }
        NodeKind::BinopTerm => {
            let symbol = str_attr(tree, kind, "value")?;
            let op = BinaryOp::from_symbol(&symbol).ok_or_else(|| wrong_attr(kind, "value"))?;
            child_count(tree, kind, 2)?;
            Ok(Term::Binary {
                op,
                lhs: Box::new(build_term(&tree.children[0], kind)?),
                rhs: Box::new(build_term(&tree.children[1], kind)?),
            })
        }
        _ => Err(unexpected(parent, "a term", tree)),
    }
}

fn build_terms(children: &[AttributedTree], kind: NodeKind) -> BuildResult<Vec<Term>> {
    children.iter().map(|c| build_term(c, kind)).collect()
}

// ============================================================================
// Statements
// ============================================================================

fn var_decl(tree: &AttributedTree) -> BuildResult<VarDecl> {
    let kind = NodeKind::VarDecl;
    let Some((ty, names)) = tree.children.split_last() else {
        return Err(LoweringError::new(
            kind,
            StructuralError::ChildCount {
                node: kind.to_string(),
                expected: "at least 2".to_string(),
                found: 0,
            },
        ));
    };
    if names.is_empty() {
        return Err(unexpected(kind, "<IDENTIFIER>", ty));
    }
    Ok(VarDecl {
        names: names
            .iter()
            .map(|n| identifier(n, kind))
            .collect::<BuildResult<_>>()?,
        ty: build_type(ty, kind)?,
    })
}

fn statement(tree: &AttributedTree, parent: NodeKind) -> BuildResult<Statement> {
    let kind = kind_of(tree, parent)?;
    match kind {
        NodeKind::VarDecl => Ok(Statement::VarDecl(var_decl(tree)?)),
        NodeKind::AssignStmt => {
            child_count(tree, kind, 2)?;
            let (lhs, rhs) = (&tree.children[0], &tree.children[1]);
            expect_kind(lhs, NodeKind::Lhs, kind)?;
            expect_kind(rhs, NodeKind::Rhs, kind)?;
            Ok(Statement::Assign(Assign {
                lhs: build_terms(&lhs.children, NodeKind::Lhs)?,
                rhs: build_terms(&rhs.children, NodeKind::Rhs)?,
            }))
        }
        NodeKind::ReturnStmt => Ok(Statement::Return(build_term(only_child(tree, kind)?, kind)?)),
        NodeKind::SyncStmt => Ok(Statement::Sync(
            tree.children
                .iter()
                .map(|c| identifier(c, kind))
                .collect::<BuildResult<_>>()?,
        )),
        _ => Err(unexpected(parent, "a statement", tree)),
    }
}

fn guarded_stmt(tree: &AttributedTree, parent: NodeKind) -> BuildResult<GuardedStmt> {
    let kind = NodeKind::GuardedStmt;
    expect_kind(tree, kind, parent)?;
    let Some((guard, effects)) = tree.children.split_first() else {
        return Err(LoweringError::new(
            kind,
            StructuralError::ChildCount {
                node: kind.to_string(),
                expected: "at least 1".to_string(),
                found: 0,
            },
        ));
    };
    let effects = effects
        .iter()
        .map(|e| match statement(e, kind)? {
            s @ (Statement::Assign(_) | Statement::Sync(_)) => Ok(s),
            _ => Err(unexpected(kind, "<assign_stmt> or <sync_stmt>", e)),
        })
        .collect::<BuildResult<_>>()?;
    Ok(GuardedStmt {
        guard: build_term(guard, kind)?,
        effects,
    })
}

// ============================================================================
// Declarations
// ============================================================================

fn template_params(tree: &AttributedTree) -> BuildResult<Vec<TemplateParam>> {
    let kind = NodeKind::TemplateParam;
    tree.children
        .iter()
        .map(|param| {
            expect_kind(param, kind, NodeKind::TemplateParams)?;
            let name = str_attr(param, kind, "value")?;
            let child = only_child(param, kind)?;
            let param_kind = if kind_of(child, kind)? == NodeKind::AbsType {
                TemplateParamKind::Type {
                    bound: child
                        .children
                        .first()
                        .map(|b| build_type(b, NodeKind::AbsType))
                        .transpose()?,
                }
            } else {
                TemplateParamKind::Value {
                    ty: build_type(child, kind)?,
                }
            };
            Ok(TemplateParam {
                name,
                kind: param_kind,
            })
        })
        .collect()
}

fn signature(tree: &AttributedTree) -> BuildResult<Signature> {
    let mut sig = Signature::default();
    for child in &tree.children {
        let kind = kind_of(child, NodeKind::Signature)?;
        match kind {
            NodeKind::Param => {
                let direction = match child.attr("io") {
                    None => PortDirection::INOUT,
                    Some(value) => match value.as_str() {
                        Some("in") => PortDirection::IN,
                        Some("out") => PortDirection::OUT,
                        Some("inout") => PortDirection::INOUT,
                        _ => return Err(wrong_attr(kind, "io")),
                    },
                };
                sig.params.push(Param {
                    name: str_attr(child, kind, "value")?,
                    ty: build_type(only_child(child, kind)?, kind)?,
                    direction,
                });
            }
            NodeKind::ReturnType => {
                sig.return_type = Some(build_type(only_child(child, kind)?, kind)?);
            }
            _ => return Err(unexpected(NodeKind::Signature, "<param>", child)),
        }
    }
    Ok(sig)
}

fn function_body(groups: &[AttributedTree], decl: NodeKind) -> BuildResult<Body> {
    let mut statements = Vec::new();
    for group in groups {
        expect_kind(group, NodeKind::Statements, decl)?;
        for s in &group.children {
            statements.push(statement(s, NodeKind::Statements)?);
        }
    }
    Ok(Body::Function(FunctionBody { statements }))
}

fn automaton_body(groups: &[AttributedTree], decl: NodeKind) -> BuildResult<Body> {
    let mut vars = Vec::new();
    let mut transitions = Vec::new();
    for group in groups {
        match kind_of(group, decl)? {
            NodeKind::AutomatonVars => {
                for v in &group.children {
                    expect_kind(v, NodeKind::VarDecl, NodeKind::AutomatonVars)?;
                    vars.push(var_decl(v)?);
                }
            }
            NodeKind::AutomatonTrans => {
                for t in &group.children {
                    let kind = kind_of(t, NodeKind::AutomatonTrans)?;
                    match kind {
                        NodeKind::Transition => transitions
                            .push(Transition::Single(guarded_stmt(only_child(t, kind)?, kind)?)),
                        NodeKind::GuardedStmtGrp => transitions.push(Transition::Group(
                            t.children
                                .iter()
                                .map(|g| guarded_stmt(g, kind))
                                .collect::<BuildResult<_>>()?,
                        )),
                        _ => return Err(unexpected(NodeKind::AutomatonTrans, "a transition", t)),
                    }
                }
            }
            _ => return Err(unexpected(decl, "<automaton_vars> or <automaton_trans>", group)),
        }
    }
    Ok(Body::Automaton(AutomatonBody { vars, transitions }))
}

fn system_body(groups: &[AttributedTree], decl: NodeKind) -> BuildResult<Body> {
    let mut body = SystemBody {
        components: Vec::new(),
        internals: Vec::new(),
        connections: Vec::new(),
    };
    for group in groups {
        match kind_of(group, decl)? {
            NodeKind::SystemComp => {
                for c in &group.children {
                    let kind = NodeKind::ComponentDecl;
                    expect_kind(c, kind, NodeKind::SystemComp)?;
                    let Some((entity, instances)) = c.children.split_last() else {
                        return Err(unexpected(NodeKind::SystemComp, "<entity>", c));
                    };
                    expect_kind(entity, NodeKind::Entity, kind)?;
                    let (entity_ref, used) = entity_ref(&entity.children, NodeKind::Entity)?;
                    if used != entity.n_children() {
                        return Err(unexpected(NodeKind::Entity, "<template_apply>", &entity.children[used]));
                    }
                    body.components.push(ComponentDecl {
                        instances: instances
                            .iter()
                            .map(|i| identifier(i, kind))
                            .collect::<BuildResult<_>>()?,
                        entity: entity_ref,
                    });
                }
            }
            NodeKind::SystemInter => {
                for n in &group.children {
                    body.internals.push(identifier(n, NodeKind::SystemInter)?);
                }
            }
            NodeKind::SystemConn => {
                for c in &group.children {
                    let kind = NodeKind::EntityConnection;
                    expect_kind(c, kind, NodeKind::SystemConn)?;
                    let (entity, used) = entity_ref(&c.children, kind)?;
                    let endpoints = c.children[used..]
                        .iter()
                        .map(|p| match kind_of(p, kind)? {
                            NodeKind::CompPortName => {
                                child_count(p, NodeKind::CompPortName, 2)?;
                                Ok(PortRef::Component {
                                    instance: identifier(&p.children[0], NodeKind::CompPortName)?,
                                    port: identifier(&p.children[1], NodeKind::CompPortName)?,
                                })
                            }
                            NodeKind::SysPortName => Ok(PortRef::System(identifier(
                                only_child(p, NodeKind::SysPortName)?,
                                NodeKind::SysPortName,
                            )?)),
                            _ => Err(unexpected(kind, "a port name", p)),
                        })
                        .collect::<BuildResult<_>>()?;
                    body.connections.push(Connection { entity, endpoints });
                }
            }
            _ => return Err(unexpected(decl, "a system group", group)),
        }
    }
    Ok(Body::System(body))
}

fn declaration(tree: &AttributedTree, kind: NodeKind) -> BuildResult<Declaration> {
    let Some(first) = tree.children.first() else {
        return Err(unexpected(kind, "<IDENTIFIER>", tree));
    };
    let name = identifier(first, kind)?;
    let mut rest = &tree.children[1..];

    let mut params = Vec::new();
    if let Some(next) = rest.first()
        && next.name == NodeKind::TemplateParams.as_str()
    {
        params = template_params(next)?;
        rest = &rest[1..];
    }

    let Some(sig_tree) = rest.first() else {
        return Err(unexpected(kind, "<signature>", tree));
    };
    expect_kind(sig_tree, NodeKind::Signature, kind)?;
    let signature = signature(sig_tree)?;
    let groups = &rest[1..];

    let body = match kind {
        NodeKind::FunctionDecl => function_body(groups, kind)?,
        NodeKind::AutomatonDecl => automaton_body(groups, kind)?,
        _ => system_body(groups, kind)?,
    };

    Ok(Declaration {
        name,
        template_params: params,
        signature,
        body,
    })
}

/// Best-effort name of a declaration node, for diagnostics.
fn declared_name(tree: &AttributedTree) -> String {
    tree.attr("value")
        .and_then(AttrValue::as_str)
        .or_else(|| tree.children.first().and_then(|c| c.attr("value")?.as_str()))
        .unwrap_or(&tree.name)
        .to_string()
}

impl Program {
    /// Convert a parsed `program` tree into typed declarations.
    pub fn from_tree(tree: &AttributedTree) -> Result<Program, CompilationError> {
        let fail = |name: String, err: LoweringError| CompilationError::new(name, Vec::new(), err);

        expect_kind(tree, NodeKind::Program, NodeKind::Program)
            .map_err(|e| fail(tree.name.clone(), e))?;

        let mut program = Program::default();
        for child in &tree.children {
            let result = (|| -> BuildResult<()> {
                let kind = kind_of(child, NodeKind::Program)?;
                match kind {
                    NodeKind::Typedef => program.typedefs.push(Typedef {
                        name: str_attr(child, kind, "value")?,
                        ty: build_type(only_child(child, kind)?, kind)?,
                    }),
                    NodeKind::EnumDecl => program.enums.push(EnumDecl {
                        name: str_attr(child, kind, "value")?,
                        members: child
                            .children
                            .iter()
                            .map(|m| identifier(m, kind))
                            .collect::<BuildResult<_>>()?,
                    }),
                    NodeKind::FunctionDecl | NodeKind::AutomatonDecl | NodeKind::SystemDecl => {
                        program.declarations.push(declaration(child, kind)?)
                    }
                    _ => return Err(unexpected(NodeKind::Program, "a declaration", child)),
                }
                Ok(())
            })();
            result.map_err(|e| fail(declared_name(child), e))?;
        }
        Ok(program)
    }
}
