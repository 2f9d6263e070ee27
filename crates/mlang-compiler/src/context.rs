//! Scoped symbol table of one expansion.
//!
//! A [`TypeContext`] separates six namespaces: type aliases, enum types,
//! template value arguments, signature parameters, local variables and
//! internal nodes. A name lives in at most one of them; declaring it again in
//! any namespace is a [`NameError::Redeclared`].
//!
//! The program-level context holds typedefs and enums. Every expansion starts
//! from a clone of it, so nothing bound while lowering one expansion is ever
//! visible to another.

use mlang_core::ast::{Param, PortDirection, TemplateArgExpr};
use mlang_core::{
    Bound, ErrorKind, Field, Literal, NameError, TemplateArg, TypeError, TypeTree,
};
use rustc_hash::FxHashMap;

// ============================================================================
// Types
// ============================================================================

/// The namespace a name was declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    TypeAlias,
    Enum,
    TemplateValue,
    Signature,
    Local,
    InternalNode,
}

impl Namespace {
    pub fn describe(&self) -> &'static str {
        match self {
            Namespace::TypeAlias => "a type alias",
            Namespace::Enum => "an enum",
            Namespace::TemplateValue => "a template value",
            Namespace::Signature => "a parameter",
            Namespace::Local => "a local variable",
            Namespace::InternalNode => "an internal node",
        }
    }
}

/// Whether signature parameters of the current expansion are plain values
/// (functions) or communication ports (automata and systems).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignatureRole {
    #[default]
    Values,
    Ports,
}

/// A bound signature parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamInfo {
    pub ty: TypeTree,
    pub direction: PortDirection,
}

// ============================================================================
// TypeContext
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct TypeContext {
    namespaces: FxHashMap<String, Namespace>,
    type_aliases: FxHashMap<String, TypeTree>,
    enums: FxHashMap<String, Vec<String>>,
    template_values: FxHashMap<String, Literal>,
    params: FxHashMap<String, ParamInfo>,
    locals: FxHashMap<String, TypeTree>,
    role: SignatureRole,
    return_type: Option<TypeTree>,
}

impl TypeContext {
    pub fn new() -> Self {
        Self::default()
    }

    fn declare(&mut self, name: &str, namespace: Namespace) -> Result<(), NameError> {
        if let Some(existing) = self.namespaces.get(name) {
            return Err(NameError::Redeclared {
                name: name.to_string(),
                existing: existing.describe(),
            });
        }
        self.namespaces.insert(name.to_string(), namespace);
        Ok(())
    }

    // ==========================================================================
    // Binding
    // ==========================================================================

    /// Bind a type alias. `ty` must already be instantiated.
    pub fn set_type(&mut self, name: &str, ty: TypeTree) -> Result<(), NameError> {
        self.declare(name, Namespace::TypeAlias)?;
        self.type_aliases.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn set_enum(&mut self, name: &str, members: Vec<String>) -> Result<(), NameError> {
        self.declare(name, Namespace::Enum)?;
        self.enums.insert(name.to_string(), members);
        Ok(())
    }

    pub fn set_template_arg(&mut self, name: &str, value: Literal) -> Result<(), NameError> {
        self.declare(name, Namespace::TemplateValue)?;
        self.template_values.insert(name.to_string(), value);
        Ok(())
    }

    /// Bind the parameters of the expansion being lowered.
    pub fn set_signature(
        &mut self,
        params: &[Param],
        return_type: Option<TypeTree>,
        role: SignatureRole,
    ) -> Result<(), NameError> {
        for param in params {
            self.declare(&param.name, Namespace::Signature)?;
            self.params.insert(
                param.name.clone(),
                ParamInfo {
                    ty: param.ty.clone(),
                    direction: param.direction,
                },
            );
        }
        self.role = role;
        self.return_type = return_type;
        Ok(())
    }

    pub fn set_local(&mut self, name: &str, ty: TypeTree) -> Result<(), NameError> {
        self.declare(name, Namespace::Local)?;
        self.locals.insert(name.to_string(), ty);
        Ok(())
    }

    pub fn set_internal_node(&mut self, name: &str) -> Result<(), NameError> {
        self.declare(name, Namespace::InternalNode)
    }

    // ==========================================================================
    // Lookup
    // ==========================================================================

    pub fn namespace_of(&self, name: &str) -> Option<Namespace> {
        self.namespaces.get(name).copied()
    }

    pub fn type_alias(&self, name: &str) -> Option<&TypeTree> {
        self.type_aliases.get(name)
    }

    pub fn enum_members(&self, alias: &str) -> Option<&[String]> {
        self.enums.get(alias).map(Vec::as_slice)
    }

    pub fn template_value(&self, name: &str) -> Option<&Literal> {
        self.template_values.get(name)
    }

    pub fn param(&self, name: &str) -> Option<&ParamInfo> {
        self.params.get(name)
    }

    pub fn local(&self, name: &str) -> Option<&TypeTree> {
        self.locals.get(name)
    }

    pub fn role(&self) -> SignatureRole {
        self.role
    }

    /// Whether `name` is a port of the expansion being lowered.
    pub fn is_port(&self, name: &str) -> bool {
        self.role == SignatureRole::Ports && self.params.contains_key(name)
    }

    pub fn is_internal_node(&self, name: &str) -> bool {
        self.namespace_of(name) == Some(Namespace::InternalNode)
    }

    pub fn return_type(&self) -> Option<&TypeTree> {
        self.return_type.as_ref()
    }

    // ==========================================================================
    // Instantiation
    // ==========================================================================

    /// Substitute every alias reference and symbolic bound in `ty`.
    ///
    /// Trees are persistent, so the result is a fresh tree and `ty` (which may
    /// be a declaration's canonical tree) is left untouched. Initializer terms
    /// are carried over unchanged; they are lowered later in this context.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn instantiate(&self, ty: &TypeTree) -> Result<TypeTree, ErrorKind> {
        Ok(match ty {
            TypeTree::Int | TypeTree::Real | TypeTree::Bool | TypeTree::Char => ty.clone(),
            TypeTree::Enum(alias) => {
                if self.enum_members(alias).is_none() {
                    return Err(NameError::UnknownIdentifier(alias.clone()).into());
                }
                ty.clone()
            }
            TypeTree::Named(name) => match self.namespace_of(name) {
                Some(Namespace::TypeAlias) => self
                    .type_aliases
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ErrorKind::Internal(format!("alias '{name}' has no type")))?,
                Some(Namespace::Enum) => TypeTree::Enum(name.clone()),
                Some(Namespace::TemplateValue) => {
                    return Err(TypeError::TemplateArgKind {
                        param: name.clone(),
                        expected: "type",
                    }
                    .into());
                }
                _ => return Err(NameError::UnknownIdentifier(name.clone()).into()),
            },
            TypeTree::BoundedInt { l, r } => {
                let l = self.resolve_bound(l)?;
                let r = self.resolve_bound(r)?;
                TypeTree::bounded(l, r)?
            }
            TypeTree::Tuple(items) => TypeTree::tuple(self.instantiate_all(items)?),
            TypeTree::Union(arms) => TypeTree::union(self.instantiate_all(arms)?),
            TypeTree::Array { length, element } => {
                let length = self.resolve_bound(length)?;
                TypeTree::array_with(Bound::Literal(length), self.instantiate(element)?)?
            }
            TypeTree::List(element) => TypeTree::list(self.instantiate(element)?),
            TypeTree::Map { key, value } => {
                TypeTree::map(self.instantiate(key)?, self.instantiate(value)?)
            }
            TypeTree::Struct(fields) => {
                let fields = fields
                    .iter()
                    .map(|Field { name, ty }| Ok((name.clone(), self.instantiate(ty)?)))
                    .collect::<Result<Vec<_>, ErrorKind>>()?;
                TypeTree::structure(fields)?
            }
            TypeTree::Init { ty, term } => {
                TypeTree::init(self.instantiate(ty)?, term.as_ref().clone())
            }
        })
    }

    fn instantiate_all(&self, trees: &[TypeTree]) -> Result<Vec<TypeTree>, ErrorKind> {
        trees.iter().map(|t| self.instantiate(t)).collect()
    }

    fn resolve_bound(&self, bound: &Bound) -> Result<i64, ErrorKind> {
        match bound {
            Bound::Literal(v) => Ok(*v),
            Bound::Param(name) => match self.template_value(name) {
                Some(Literal::Int(v)) => Ok(*v),
                Some(_) => Err(TypeError::TemplateArgKind {
                    param: name.clone(),
                    expected: "integer",
                }
                .into()),
                None => Err(NameError::UnknownIdentifier(name.clone()).into()),
            },
        }
    }

    /// Resolve a template argument written at a use site in this context.
    pub fn resolve_template_arg(&self, arg: &TemplateArgExpr) -> Result<TemplateArg, ErrorKind> {
        match arg {
            TemplateArgExpr::Type(ty) => Ok(TemplateArg::Type(self.instantiate(ty)?)),
            TemplateArgExpr::Value(lit) => Ok(TemplateArg::Value(*lit)),
            TemplateArgExpr::Name(name) => match self.namespace_of(name) {
                Some(Namespace::TypeAlias | Namespace::Enum) => Ok(TemplateArg::Type(
                    self.instantiate(&TypeTree::named(name.as_str()))?,
                )),
                Some(Namespace::TemplateValue) => self
                    .template_value(name)
                    .map(|lit| TemplateArg::Value(*lit))
                    .ok_or_else(|| ErrorKind::Internal(format!("'{name}' has no value"))),
                _ => Err(NameError::UnknownIdentifier(name.clone()).into()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> TypeContext {
        let mut ctx = TypeContext::new();
        ctx.set_type("T", TypeTree::Real).unwrap();
        ctx.set_enum("Color", vec!["Red".into(), "Green".into()])
            .unwrap();
        ctx.set_template_arg("N", Literal::Int(4)).unwrap();
        ctx.set_template_arg("B", Literal::Bool(true)).unwrap();
        ctx
    }

    #[test]
    fn redeclaration_in_any_namespace_is_rejected() {
        let mut ctx = context();
        let err = ctx.set_local("T", TypeTree::Int).unwrap_err();
        assert_eq!(
            err,
            NameError::Redeclared {
                name: "T".into(),
                existing: "a type alias",
            }
        );
        ctx.set_local("x", TypeTree::Int).unwrap();
        assert!(ctx.set_local("x", TypeTree::Int).is_err());
        assert!(ctx.set_internal_node("x").is_err());
    }

    #[test]
    fn instantiate_substitutes_aliases_and_bounds() {
        let ctx = context();
        let generic = TypeTree::structure([
            ("a", TypeTree::named("T")),
            (
                "b",
                TypeTree::bounded_with(Bound::Literal(0), Bound::Param("N".into())).unwrap(),
            ),
            (
                "c",
                TypeTree::array_with(Bound::Param("N".into()), TypeTree::named("Color")).unwrap(),
            ),
        ])
        .unwrap();

        let concrete = ctx.instantiate(&generic).unwrap();
        assert_eq!(
            concrete,
            TypeTree::structure([
                ("a", TypeTree::Real),
                ("b", TypeTree::bounded(0, 4).unwrap()),
                ("c", TypeTree::array(4, TypeTree::enumeration("Color")).unwrap()),
            ])
            .unwrap()
        );
        assert!(concrete.is_resolved());
        assert!(!generic.is_resolved());
    }

    #[test]
    fn instantiate_rejects_bad_substitutions() {
        let ctx = context();
        let unknown = ctx.instantiate(&TypeTree::named("U")).unwrap_err();
        assert_eq!(unknown, NameError::UnknownIdentifier("U".into()).into());

        let not_int = TypeTree::bounded_with(Bound::Literal(0), Bound::Param("B".into())).unwrap();
        assert!(matches!(
            ctx.instantiate(&not_int),
            Err(ErrorKind::Type(TypeError::TemplateArgKind { .. }))
        ));

        let value_as_type = ctx.instantiate(&TypeTree::named("N")).unwrap_err();
        assert!(matches!(
            value_as_type,
            ErrorKind::Type(TypeError::TemplateArgKind { expected: "type", .. })
        ));
    }

    #[test]
    fn resolve_template_arg_by_namespace() {
        let ctx = context();
        assert_eq!(
            ctx.resolve_template_arg(&TemplateArgExpr::Name("T".into())),
            Ok(TemplateArg::Type(TypeTree::Real))
        );
        assert_eq!(
            ctx.resolve_template_arg(&TemplateArgExpr::Name("N".into())),
            Ok(TemplateArg::Value(Literal::Int(4)))
        );
        assert_eq!(
            ctx.resolve_template_arg(&TemplateArgExpr::Name("Color".into())),
            Ok(TemplateArg::Type(TypeTree::enumeration("Color")))
        );
        assert!(
            ctx.resolve_template_arg(&TemplateArgExpr::Name("zzz".into()))
                .is_err()
        );
    }

    #[test]
    fn ports_only_in_port_role() {
        let mut ctx = TypeContext::new();
        let params = vec![Param {
            name: "p".into(),
            ty: TypeTree::Int,
            direction: PortDirection::IN,
        }];
        ctx.set_signature(&params, None, SignatureRole::Ports)
            .unwrap();
        assert!(ctx.is_port("p"));
        assert_eq!(ctx.param("p").unwrap().direction, PortDirection::IN);

        let mut values = TypeContext::new();
        values
            .set_signature(&params, Some(TypeTree::Int), SignatureRole::Values)
            .unwrap();
        assert!(!values.is_port("p"));
        assert_eq!(values.return_type(), Some(&TypeTree::Int));
    }
}
