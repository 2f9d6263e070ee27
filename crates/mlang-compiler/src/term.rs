//! Term lowering.
//!
//! Terms lower bottom-up. Each node yields a [`ResolvedTerm`]: the emitted
//! expression, its type when it has one, the expansions created while
//! lowering it, and a tag for the few cases a parent needs to tell apart
//! (enum names, compile-time integers, ports).
//!
//! Assignment targets lower through [`TermLowerer::lower_place`] into a
//! [`Place`].

use mlang_core::ast::{BinaryOp, Category, EntityRef, PortDirection, Term};
use mlang_core::node::NodeKind;
use mlang_core::{
    At, Coercion, ErrorKind, Literal, LoweringError, NameError, TypeError, TypeTree, is_subtype,
    require_coercion, serialization_code,
};

use crate::context::{Namespace, TypeContext};
use crate::emit;
use crate::template::{ExpansionRequest, TemplateManager};

/// Port field holding the read-request flag.
pub const READ_REQUESTED: &str = "reqRead";
/// Port field holding the write-request flag.
pub const WRITE_REQUESTED: &str = "reqWrite";
/// Port field holding the current value.
pub const PORT_VALUE: &str = "value";

// ============================================================================
// Resolved terms
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TermTag {
    None,
    /// An enum type name, only meaningful as the left side of `.`.
    Enum(String),
    /// An integer known at compile time.
    StaticInt(i64),
    /// A port of the expansion, only meaningful as the left side of `.`.
    Port(String),
    /// An identifier bound in no value namespace.
    Unresolved(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTerm {
    pub code: String,
    pub ty: Option<TypeTree>,
    pub requests: Vec<ExpansionRequest>,
    pub tag: TermTag,
}

impl ResolvedTerm {
    fn typed(code: String, ty: TypeTree) -> Self {
        Self {
            code,
            ty: Some(ty),
            requests: Vec::new(),
            tag: TermTag::None,
        }
    }

    fn untyped(code: String, tag: TermTag) -> Self {
        Self {
            code,
            ty: None,
            requests: Vec::new(),
            tag,
        }
    }

    fn literal(lit: &Literal) -> Self {
        let mut term = Self::typed(emit::literal(lit), lit.type_tree());
        if let Literal::Int(v) = lit {
            term.tag = TermTag::StaticInt(*v);
        }
        term
    }

    pub fn require_type(&self) -> Result<&TypeTree, ErrorKind> {
        self.ty.as_ref().ok_or_else(|| match &self.tag {
            TermTag::Unresolved(name) => NameError::UnknownIdentifier(name.clone()).into(),
            TermTag::Enum(name) | TermTag::Port(name) => TypeError::Untyped(name.clone()).into(),
            TermTag::None | TermTag::StaticInt(_) => TypeError::Untyped(self.code.clone()).into(),
        })
    }

    /// The emitted expression converted to `to`.
    ///
    /// Compile-time integers are checked against bounded plans here.
    pub fn coerced(&self, to: &TypeTree) -> Result<String, ErrorKind> {
        let plan = require_coercion(self.require_type()?, to)?;
        if let TermTag::StaticInt(v) = self.tag {
            plan.check_static(v)?;
        }
        Ok(emit::apply(&self.code, &plan))
    }
}

// ============================================================================
// Places
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortFlag {
    ReadRequested,
    WriteRequested,
}

/// Something a value can be assigned to.
#[derive(Debug, Clone, PartialEq)]
pub enum Place {
    /// A variable, or a path of fields and elements below one.
    Slot {
        root: String,
        path: Vec<String>,
        ty: TypeTree,
    },
    PortValue {
        port: String,
        code: Coercion,
        ty: TypeTree,
    },
    PortFlag {
        port: String,
        flag: PortFlag,
    },
}

impl Place {
    pub fn ty(&self) -> TypeTree {
        match self {
            Place::Slot { ty, .. } | Place::PortValue { ty, .. } => ty.clone(),
            Place::PortFlag { .. } => TypeTree::Bool,
        }
    }

    /// Statement storing `value` (already of this place's type).
    pub fn store(&self, value: &str) -> String {
        match self {
            Place::Slot { root, path, .. } if path.is_empty() => format!("{root} = {value};"),
            Place::Slot { root, path, .. } => format!("*{root}{} = {value};", path.concat()),
            Place::PortValue { port, code, .. } => format!(
                "{}.store({value}, &{})?;",
                emit::local(port),
                emit::coercion(code)
            ),
            Place::PortFlag { port, flag } => {
                let setter = match flag {
                    PortFlag::ReadRequested => "set_read_requested",
                    PortFlag::WriteRequested => "set_write_requested",
                };
                format!("{}.{setter}({value}.truthy()?);", emit::local(port))
            }
        }
    }
}

/// A lowered assignment target.
#[derive(Debug, Clone, PartialEq)]
pub struct LoweredPlace {
    pub place: Place,
    /// `let` statements evaluating index keys, run before any store.
    pub prelude: Vec<String>,
    pub requests: Vec<ExpansionRequest>,
}

// ============================================================================
// TermLowerer
// ============================================================================

/// Resolve a reference to a declaration into a request, in `ctx`.
pub fn resolve_request(ctx: &TypeContext, entity: &EntityRef) -> Result<ExpansionRequest, ErrorKind> {
    let args = entity
        .args
        .iter()
        .map(|a| ctx.resolve_template_arg(a))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ExpansionRequest::new(entity.name.clone(), args))
}

pub struct TermLowerer<'a> {
    ctx: &'a TypeContext,
    manager: &'a mut TemplateManager,
}

impl<'a> TermLowerer<'a> {
    pub fn new(ctx: &'a TypeContext, manager: &'a mut TemplateManager) -> Self {
        Self { ctx, manager }
    }

    pub fn context(&self) -> &TypeContext {
        self.ctx
    }


    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn lower(&mut self, term: &Term) -> Result<ResolvedTerm, LoweringError> {
        match term {
            Term::Literal(lit) => Ok(ResolvedTerm::literal(lit)),
            Term::Identifier(name) => Ok(self.identifier(name)),
            Term::Call { callee, args } => self.call(callee, args),
            Term::Struct(fields) => self.structure(fields),
            Term::List(items) => self.list(items),
            Term::Map(pairs) => self.map(pairs),
            Term::Tuple(items) => self.tuple(items),
            Term::Dot { target, member } => self.dot(target, member),
            Term::Index { target, index } => self.index(target, index),
            Term::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
        }
    }

    fn lower_all(&mut self, terms: &[Term]) -> Result<Vec<ResolvedTerm>, LoweringError> {
        terms.iter().map(|t| self.lower(t)).collect()
    }

    fn identifier(&self, name: &str) -> ResolvedTerm {
        let id = emit::local(name);
        match self.ctx.namespace_of(name) {
            Some(Namespace::Local) => match self.ctx.local(name) {
                Some(ty) => ResolvedTerm::typed(format!("{id}.clone()"), ty.clone()),
                None => ResolvedTerm::untyped(id, TermTag::Unresolved(name.to_string())),
            },
            Some(Namespace::Signature) if self.ctx.is_port(name) => {
                ResolvedTerm::untyped(id, TermTag::Port(name.to_string()))
            }
            Some(Namespace::Signature) => match self.ctx.param(name) {
                Some(p) => ResolvedTerm::typed(format!("{id}.clone()"), p.ty.clone()),
                None => ResolvedTerm::untyped(id, TermTag::Unresolved(name.to_string())),
            },
            Some(Namespace::TemplateValue) => match self.ctx.template_value(name) {
                Some(lit) => ResolvedTerm::literal(lit),
                None => ResolvedTerm::untyped(id, TermTag::Unresolved(name.to_string())),
            },
            Some(Namespace::Enum) => {
                ResolvedTerm::untyped(name.to_string(), TermTag::Enum(name.to_string()))
            }
            _ => ResolvedTerm::untyped(name.to_string(), TermTag::Unresolved(name.to_string())),
        }
    }

    fn call(&mut self, callee: &EntityRef, args: &[Term]) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::FuncTerm;
        let lowered = self.lower_all(args)?;

        let req = resolve_request(self.ctx, callee).at(node)?;
        let (datum, created) = self.manager.query_or_create(&req).at(node)?;
        if datum.signature.category() != Category::Function {
            return Err(TypeError::NotCallable(callee.name.clone())).at(node);
        }
        let params = datum.signature.params();
        if params.len() != lowered.len() {
            return Err(TypeError::ArityMismatch {
                what: format!("'{}'", callee.name),
                expected: params.len(),
                got: lowered.len(),
            })
            .at(node);
        }

        let mut requests = Vec::new();
        let mut codes = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(lowered) {
            codes.push(arg.coerced(&param.ty).at(node)?);
            requests.extend(arg.requests);
        }
        if created {
            requests.push(req);
        }

        Ok(ResolvedTerm {
            code: format!("{}({})?", datum.actual_name, codes.join(", ")),
            ty: datum.signature.return_type().cloned(),
            requests,
            tag: TermTag::None,
        })
    }

    fn structure(&mut self, fields: &[(String, Term)]) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::StructTerm;
        let mut requests = Vec::new();
        let mut types = Vec::with_capacity(fields.len());
        let mut codes = Vec::with_capacity(fields.len());
        for (name, term) in fields {
            let r = self.lower(term)?;
            types.push((name.clone(), r.require_type().at(node)?.clone()));
            codes.push(format!("({}, {})", emit::string(name), r.code));
            requests.extend(r.requests);
        }
        let ty = TypeTree::structure(types).at(node)?;
        let code = if codes.is_empty() {
            "Value::Struct(Default::default())".to_string()
        } else {
            format!("Value::structure([{}])", codes.join(", "))
        };
        Ok(ResolvedTerm {
            requests,
            ..ResolvedTerm::typed(code, ty)
        })
    }

    fn list(&mut self, items: &[Term]) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::ListTerm;
        let lowered = self.lower_all(items)?;
        let element = common_type(&lowered).at(node)?;
        let mut requests = Vec::new();
        let mut codes = Vec::with_capacity(lowered.len());
        for item in lowered {
            codes.push(item.coerced(&element).at(node)?);
            requests.extend(item.requests);
        }
        let ty = TypeTree::array(codes.len(), element).at(node)?;
        Ok(ResolvedTerm {
            requests,
            ..ResolvedTerm::typed(format!("Value::List({})", emit::vec_of(&codes)), ty)
        })
    }

    fn map(&mut self, pairs: &[(Term, Term)]) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::MapTerm;
        let mut keys = Vec::with_capacity(pairs.len());
        let mut values = Vec::with_capacity(pairs.len());
        for (k, v) in pairs {
            keys.push(self.lower(k)?);
            values.push(self.lower(v)?);
        }
        let key_ty = common_type(&keys).at(node)?;
        let value_ty = common_type(&values).at(node)?;
        let key_code = serialization_code(&key_ty).at(node)?;

        let mut requests = Vec::new();
        let mut entries = Vec::with_capacity(keys.len());
        for (k, v) in keys.into_iter().zip(values) {
            entries.push(format!(
                "({}, {})",
                k.coerced(&key_ty).at(node)?,
                v.coerced(&value_ty).at(node)?
            ));
            requests.extend(k.requests);
            requests.extend(v.requests);
        }
        let code = format!(
            "Value::map({}, &{})?",
            emit::vec_of(&entries),
            emit::coercion(&key_code)
        );
        Ok(ResolvedTerm {
            requests,
            ..ResolvedTerm::typed(code, TypeTree::map(key_ty, value_ty))
        })
    }

    fn tuple(&mut self, items: &[Term]) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::TupleTerm;
        let mut requests = Vec::new();
        let mut types = Vec::with_capacity(items.len());
        let mut codes = Vec::with_capacity(items.len());
        for item in self.lower_all(items)? {
            types.push(item.require_type().at(node)?.clone());
            codes.push(item.code);
            requests.extend(item.requests);
        }
        Ok(ResolvedTerm {
            requests,
            ..ResolvedTerm::typed(
                format!("Value::Tuple({})", emit::vec_of(&codes)),
                TypeTree::tuple(types),
            )
        })
    }

    fn dot(&mut self, target: &Term, member: &str) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::DotTerm;
        // Port identity comes from the identifier itself, not its lowering.
        if let Some(port) = target.as_identifier()
            && self.ctx.is_port(port)
        {
            return self.port_field(port, member).at(node);
        }

        let t = self.lower(target)?;
        if let TermTag::Enum(alias) = &t.tag {
            let known = self
                .ctx
                .enum_members(alias)
                .is_some_and(|members| members.iter().any(|m| m == member));
            if !known {
                return Err(NameError::UnknownEnumMember {
                    alias: alias.clone(),
                    member: member.to_string(),
                })
                .at(node);
            }
            return Ok(ResolvedTerm::typed(
                format!(
                    "Value::enum_member({}, {})",
                    emit::string(alias),
                    emit::string(member)
                ),
                TypeTree::enumeration(alias.as_str()),
            ));
        }

        let ty = t.require_type().at(node)?;
        let field_ty = match ty.strip_init() {
            TypeTree::Struct(_) => ty.field(member).cloned().ok_or_else(|| {
                ErrorKind::from(NameError::UnknownField {
                    field: member.to_string(),
                    type_name: ty.to_string(),
                })
            }),
            other => Err(TypeError::InvalidMemberAccess {
                target: other.to_string(),
                member: member.to_string(),
            }
            .into()),
        }
        .at(node)?;
        Ok(ResolvedTerm {
            requests: t.requests,
            ..ResolvedTerm::typed(
                format!("({}).field({})?", t.code, emit::string(member)),
                field_ty,
            )
        })
    }

    fn port_field(&self, port: &str, member: &str) -> Result<ResolvedTerm, ErrorKind> {
        let info = self
            .ctx
            .param(port)
            .ok_or_else(|| NameError::UnknownPort(port.to_string()))?;
        let id = emit::local(port);
        match member {
            READ_REQUESTED => Ok(ResolvedTerm::typed(
                format!("Value::Bool({id}.read_requested())"),
                TypeTree::Bool,
            )),
            WRITE_REQUESTED => Ok(ResolvedTerm::typed(
                format!("Value::Bool({id}.write_requested())"),
                TypeTree::Bool,
            )),
            PORT_VALUE => {
                if !info.direction.contains(PortDirection::IN) {
                    return Err(TypeError::PortDirection {
                        port: port.to_string(),
                        action: "read",
                        direction: info.direction.to_string(),
                    }
                    .into());
                }
                let code = serialization_code(&info.ty)?;
                Ok(ResolvedTerm::typed(
                    format!("{id}.load(&{})?", emit::coercion(&code)),
                    info.ty.clone(),
                ))
            }
            _ => Err(NameError::UnknownField {
                field: member.to_string(),
                type_name: "port".to_string(),
            }
            .into()),
        }
    }

    fn index(&mut self, target: &Term, index: &Term) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::BrackTerm;
        let t = self.lower(target)?;
        let i = self.lower(index)?;
        let ty = t.require_type().at(node)?.strip_init().clone();

        let (code, result) = match &ty {
            TypeTree::Tuple(items) => {
                let slot = tuple_slot(&i, items.len()).at(node)?;
                (format!("({}).item({slot})?", t.code), items[slot].clone())
            }
            TypeTree::Array { element, .. } | TypeTree::List(element) => {
                let idx = i.coerced(&TypeTree::Int).at(node)?;
                (
                    format!("({}).at(&({idx}))?", t.code),
                    element.as_ref().clone(),
                )
            }
            TypeTree::Map { key, value } => {
                let k = i.coerced(key).at(node)?;
                let key_code = serialization_code(key).at(node)?;
                (
                    format!(
                        "({}).lookup(&({k}), &{})?",
                        t.code,
                        emit::coercion(&key_code)
                    ),
                    value.as_ref().clone(),
                )
            }
            other => return Err(TypeError::NotIndexable(other.to_string())).at(node),
        };

        let mut requests = t.requests;
        requests.extend(i.requests);
        Ok(ResolvedTerm {
            requests,
            ..ResolvedTerm::typed(code, result)
        })
    }

    fn binary(&mut self, op: BinaryOp, lhs: &Term, rhs: &Term) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::BinopTerm;
        let l = self.lower(lhs)?;
        let r = self.lower(rhs)?;
        let lt = l.require_type().at(node)?.strip_init();
        let rt = r.require_type().at(node)?.strip_init();

        let admissible = match op {
            BinaryOp::Rem => lt.is_integral() && rt.is_integral(),
            BinaryOp::Add | BinaryOp::Mul => lt.is_numeric() && rt.is_numeric(),
        };
        if !admissible {
            return Err(TypeError::InvalidOperands {
                op: op.to_string(),
                lhs: lt.to_string(),
                rhs: rt.to_string(),
            })
            .at(node);
        }
        let ty = if matches!(lt, TypeTree::Real) || matches!(rt, TypeTree::Real) {
            TypeTree::Real
        } else {
            TypeTree::Int
        };
        let method = match op {
            BinaryOp::Add => "add",
            BinaryOp::Mul => "mul",
            BinaryOp::Rem => "rem",
        };

        let code = format!("({}).{method}(&({}))?", l.code, r.code);
        let mut requests = l.requests;
        requests.extend(r.requests);
        Ok(ResolvedTerm {
            requests,
            ..ResolvedTerm::typed(code, ty)
        })
    }

    // ==========================================================================
    // Places
    // ==========================================================================

    /// Lower an assignment target. Index keys are bound to fresh `k<n>`
    /// temporaries numbered from `temps`.
    pub fn lower_place(
        &mut self,
        term: &Term,
        temps: &mut usize,
    ) -> Result<LoweredPlace, LoweringError> {
        let node = term.kind();
        match term {
            Term::Identifier(name) => {
                let root = emit::local(name);
                let ty = match self.ctx.namespace_of(name) {
                    Some(Namespace::Local) => self.ctx.local(name).cloned(),
                    Some(Namespace::Signature) if !self.ctx.is_port(name) => {
                        self.ctx.param(name).map(|p| p.ty.clone())
                    }
                    None => {
                        return Err(NameError::UnknownIdentifier(name.clone())).at(node);
                    }
                    Some(_) => None,
                };
                let ty = ty.ok_or(TypeError::NotAssignable).at(node)?;
                Ok(LoweredPlace {
                    place: Place::Slot {
                        root,
                        path: Vec::new(),
                        ty,
                    },
                    prelude: Vec::new(),
                    requests: Vec::new(),
                })
            }
            Term::Dot { target, member } => {
                if let Some(port) = target.as_identifier()
                    && self.ctx.is_port(port)
                {
                    let place = self.port_place(port, member).at(node)?;
                    return Ok(LoweredPlace {
                        place,
                        prelude: Vec::new(),
                        requests: Vec::new(),
                    });
                }
                let mut lowered = self.lower_place(target, temps)?;
                let Place::Slot { path, ty, .. } = &mut lowered.place else {
                    return Err(TypeError::NotAssignable).at(node);
                };
                let field_ty = match ty.strip_init() {
                    TypeTree::Struct(_) => ty.field(member).cloned().ok_or_else(|| {
                        ErrorKind::from(NameError::UnknownField {
                            field: member.clone(),
                            type_name: ty.to_string(),
                        })
                    }),
                    other => Err(TypeError::InvalidMemberAccess {
                        target: other.to_string(),
                        member: member.clone(),
                    }
                    .into()),
                }
                .at(node)?;
                path.push(format!(".field_mut({})?", emit::string(member)));
                *ty = field_ty;
                Ok(lowered)
            }
            Term::Index { target, index } => {
                let mut lowered = self.lower_place(target, temps)?;
                let i = self.lower(index)?;
                let Place::Slot { path, ty, .. } = &mut lowered.place else {
                    return Err(TypeError::NotAssignable).at(node);
                };
                let container = ty.strip_init().clone();
                let element = match &container {
                    TypeTree::Tuple(items) => {
                        let slot = tuple_slot(&i, items.len()).at(node)?;
                        path.push(format!(".item_mut({slot})?"));
                        items[slot].clone()
                    }
                    TypeTree::Array { element, .. } | TypeTree::List(element) => {
                        let key = next_temp(temps);
                        let idx = i.coerced(&TypeTree::Int).at(node)?;
                        lowered.prelude.push(format!("let {key} = {idx};"));
                        path.push(format!(".at_mut(&{key})?"));
                        element.as_ref().clone()
                    }
                    TypeTree::Map { key: key_ty, value } => {
                        let key = next_temp(temps);
                        let k = i.coerced(key_ty).at(node)?;
                        let key_code = serialization_code(key_ty).at(node)?;
                        lowered.prelude.push(format!("let {key} = {k};"));
                        path.push(format!(
                            ".lookup_mut(&{key}, &{})?",
                            emit::coercion(&key_code)
                        ));
                        value.as_ref().clone()
                    }
                    other => return Err(TypeError::NotIndexable(other.to_string())).at(node),
                };
                *ty = element;
                lowered.requests.extend(i.requests);
                Ok(lowered)
            }
            _ => Err(TypeError::NotAssignable).at(node),
        }
    }

    fn port_place(&self, port: &str, member: &str) -> Result<Place, ErrorKind> {
        let info = self
            .ctx
            .param(port)
            .ok_or_else(|| NameError::UnknownPort(port.to_string()))?;
        match member {
            READ_REQUESTED => Ok(Place::PortFlag {
                port: port.to_string(),
                flag: PortFlag::ReadRequested,
            }),
            WRITE_REQUESTED => Ok(Place::PortFlag {
                port: port.to_string(),
                flag: PortFlag::WriteRequested,
            }),
            PORT_VALUE => {
                if !info.direction.contains(PortDirection::OUT) {
                    return Err(TypeError::PortDirection {
                        port: port.to_string(),
                        action: "written",
                        direction: info.direction.to_string(),
                    }
                    .into());
                }
                Ok(Place::PortValue {
                    port: port.to_string(),
                    code: serialization_code(&info.ty)?,
                    ty: info.ty.clone(),
                })
            }
            _ => Err(NameError::UnknownField {
                field: member.to_string(),
                type_name: "port".to_string(),
            }
            .into()),
        }
    }
}

fn next_temp(temps: &mut usize) -> String {
    let name = format!("k{temps}");
    *temps += 1;
    name
}

/// Slot selected by a tuple index, which must be a compile-time integer.
fn tuple_slot(index: &ResolvedTerm, len: usize) -> Result<usize, TypeError> {
    let TermTag::StaticInt(i) = index.tag else {
        return Err(TypeError::NonStaticIndex);
    };
    usize::try_from(i)
        .ok()
        .filter(|&slot| slot < len)
        .ok_or(TypeError::TupleIndexOutOfRange { index: i, len })
}

/// Element type of a literal aggregate: the first element type every
/// element coerces to. Empty aggregates have the bottom type.
fn common_type(items: &[ResolvedTerm]) -> Result<TypeTree, ErrorKind> {
    let types = items
        .iter()
        .map(|i| i.require_type().map(TypeTree::de_init))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = types.first() else {
        return Ok(TypeTree::bottom());
    };
    'candidates: for candidate in &types {
        for ty in &types {
            if !is_subtype(ty, candidate)? {
                continue 'candidates;
            }
        }
        return Ok(candidate.clone());
    }
    let mut offender = first;
    for ty in &types {
        if !is_subtype(ty, first)? {
            offender = ty;
            break;
        }
    }
    Err(TypeError::NoCoercion {
        from: offender.to_string(),
        to: first.to_string(),
    }
    .into())
}
