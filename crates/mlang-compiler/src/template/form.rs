//! Template parameter lists and signatures of declarations.

use mlang_core::ast::{Category, Param, TemplateParam, TemplateParamKind};
use mlang_core::{ErrorKind, TemplateArg, TypeError, TypeTree, coerce, is_subtype};

use crate::connection::ConnectionTable;
use crate::context::{SignatureRole, TypeContext};
use crate::emit;

// ============================================================================
// TemplateForm
// ============================================================================

/// The formal template parameters of one declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateForm {
    name: String,
    params: Vec<TemplateParam>,
}

impl TemplateForm {
    pub fn new(name: impl Into<String>, params: Vec<TemplateParam>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    pub fn params(&self) -> &[TemplateParam] {
        &self.params
    }

    /// Validate `args` against the formal parameters and bind them into
    /// `ctx`: type arguments as type aliases, value arguments as template
    /// values.
    ///
    /// Parameters are bound in order, so a bound may mention an earlier
    /// parameter.
    pub fn transform(&self, ctx: &mut TypeContext, args: &[TemplateArg]) -> Result<(), ErrorKind> {
        if args.len() != self.params.len() {
            return Err(TypeError::ArityMismatch {
                what: format!("template '{}'", self.name),
                expected: self.params.len(),
                got: args.len(),
            }
            .into());
        }

        for (param, arg) in self.params.iter().zip(args) {
            match (&param.kind, arg) {
                (TemplateParamKind::Type { bound }, TemplateArg::Type(ty)) => {
                    if let Some(bound) = bound {
                        let bound = ctx.instantiate(bound)?;
                        if !is_subtype(ty, &bound)? {
                            return Err(TypeError::NoCoercion {
                                from: ty.to_string(),
                                to: bound.to_string(),
                            }
                            .into());
                        }
                    }
                    ctx.set_type(&param.name, ty.clone())?;
                }
                (TemplateParamKind::Value { ty }, TemplateArg::Value(lit)) => {
                    let ty = ctx.instantiate(ty)?;
                    let from = lit.type_tree();
                    let plan = coerce(&from, &ty)?.ok_or_else(|| TypeError::NoCoercion {
                        from: from.to_string(),
                        to: ty.to_string(),
                    })?;
                    if let Some(v) = lit.as_int() {
                        plan.check_static(v)?;
                    }
                    ctx.set_template_arg(&param.name, *lit)?;
                }
                (TemplateParamKind::Type { .. }, TemplateArg::Value(_)) => {
                    return Err(TypeError::TemplateArgKind {
                        param: param.name.clone(),
                        expected: "type",
                    }
                    .into());
                }
                (TemplateParamKind::Value { .. }, TemplateArg::Type(_)) => {
                    return Err(TypeError::TemplateArgKind {
                        param: param.name.clone(),
                        expected: "value",
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// SignatureForm
// ============================================================================

/// Parameters and return type of a declaration, possibly still generic.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureForm {
    category: Category,
    params: Vec<Param>,
    return_type: Option<TypeTree>,
}

impl SignatureForm {
    pub fn new(category: Category, params: Vec<Param>, return_type: Option<TypeTree>) -> Self {
        Self {
            category,
            params,
            return_type,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn return_type(&self) -> Option<&TypeTree> {
        self.return_type.as_ref()
    }

    /// A copy with every parameter and return type instantiated in `ctx`.
    pub fn instantiate(&self, ctx: &TypeContext) -> Result<SignatureForm, ErrorKind> {
        let params = self
            .params
            .iter()
            .map(|p| {
                Ok(Param {
                    name: p.name.clone(),
                    ty: ctx.instantiate(&p.ty)?.de_init(),
                    direction: p.direction,
                })
            })
            .collect::<Result<Vec<_>, ErrorKind>>()?;
        let return_type = self
            .return_type
            .as_ref()
            .map(|t| ctx.instantiate(t).map(|t| t.de_init()))
            .transpose()?;
        Ok(SignatureForm::new(self.category, params, return_type))
    }

    /// Bind the parameters into `ctx`.
    pub fn transform(&self, ctx: &mut TypeContext) -> Result<(), ErrorKind> {
        let role = match self.category {
            Category::Function => SignatureRole::Values,
            Category::Automaton | Category::System => SignatureRole::Ports,
        };
        ctx.set_signature(&self.params, self.return_type.clone(), role)?;
        Ok(())
    }

    /// Emitted parameter names, e.g. `(id_a, id_b)`.
    pub fn render(&self) -> String {
        let names: Vec<String> = self.params.iter().map(|p| emit::local(&p.name)).collect();
        format!("({})", names.join(", "))
    }

    /// Emitted parameter list of the definition.
    pub fn render_definition(&self) -> String {
        let mut params = Vec::with_capacity(self.params.len() + 1);
        let ty = match self.category {
            Category::Function => "Value",
            Category::Automaton => {
                params.push("mut unit: Unit".to_string());
                "Port"
            }
            Category::System => "Port",
        };
        let binding = if self.category == Category::Function {
            "mut "
        } else {
            ""
        };
        for p in &self.params {
            params.push(format!("{binding}{}: {ty}", emit::local(&p.name)));
        }
        format!("({})", params.join(", "))
    }

    /// An empty wiring table for an instance of the expansion `actual_name`.
    pub fn new_connection_table(&self, actual_name: &str) -> Result<ConnectionTable, TypeError> {
        if self.category == Category::Function {
            return Err(TypeError::NotAComponent(actual_name.to_string()));
        }
        Ok(ConnectionTable::new(
            actual_name,
            self.category,
            self.params.iter().map(|p| p.name.clone()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use mlang_core::ast::PortDirection;
    use mlang_core::{Bound, Literal, NameError};

    use super::*;

    fn param(name: &str, ty: TypeTree) -> Param {
        Param {
            name: name.into(),
            ty,
            direction: PortDirection::default(),
        }
    }

    fn form() -> TemplateForm {
        TemplateForm::new(
            "Buffer",
            vec![
                TemplateParam {
                    name: "T".into(),
                    kind: TemplateParamKind::Type {
                        bound: Some(TypeTree::Real),
                    },
                },
                TemplateParam {
                    name: "N".into(),
                    kind: TemplateParamKind::Value {
                        ty: TypeTree::bounded(1, 8).unwrap(),
                    },
                },
            ],
        )
    }

    #[test]
    fn transform_binds_types_and_values() {
        let mut ctx = TypeContext::new();
        form()
            .transform(
                &mut ctx,
                &[
                    TemplateArg::Type(TypeTree::Int),
                    TemplateArg::Value(Literal::Int(4)),
                ],
            )
            .unwrap();
        assert_eq!(ctx.type_alias("T"), Some(&TypeTree::Int));
        assert_eq!(ctx.template_value("N"), Some(&Literal::Int(4)));
    }

    #[test]
    fn transform_checks_bounds_and_kinds() {
        let int_value = TemplateArg::Value(Literal::Int(4));

        let err = form()
            .transform(&mut TypeContext::new(), &[TemplateArg::Type(TypeTree::Char), int_value.clone()])
            .unwrap_err();
        assert!(matches!(err, ErrorKind::Type(TypeError::NoCoercion { .. })));

        let err = form()
            .transform(
                &mut TypeContext::new(),
                &[TemplateArg::Type(TypeTree::Int), TemplateArg::Value(Literal::Int(9))],
            )
            .unwrap_err();
        assert_eq!(err, TypeError::OutOfBounds { value: 9, l: 1, r: 8 }.into());

        let err = form()
            .transform(&mut TypeContext::new(), &[int_value.clone(), int_value])
            .unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::Type(TypeError::TemplateArgKind { expected: "type", .. })
        ));

        let err = form()
            .transform(&mut TypeContext::new(), &[TemplateArg::Type(TypeTree::Int)])
            .unwrap_err();
        assert!(matches!(
            err,
            ErrorKind::Type(TypeError::ArityMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn signature_instantiates_and_binds() {
        let mut ctx = TypeContext::new();
        ctx.set_type("T", TypeTree::Bool).unwrap();
        ctx.set_template_arg("N", Literal::Int(2)).unwrap();
        let generic = SignatureForm::new(
            Category::Function,
            vec![param(
                "xs",
                TypeTree::array_with(Bound::Param("N".into()), TypeTree::named("T")).unwrap(),
            )],
            Some(TypeTree::named("T")),
        );

        let sig = generic.instantiate(&ctx).unwrap();
        assert_eq!(sig.params()[0].ty, TypeTree::array(2, TypeTree::Bool).unwrap());
        assert_eq!(sig.return_type(), Some(&TypeTree::Bool));
        assert_eq!(sig.render(), "(id_xs)");
        assert_eq!(sig.render_definition(), "(mut id_xs: Value)");

        sig.transform(&mut ctx).unwrap();
        assert_eq!(ctx.param("xs").unwrap().ty, TypeTree::array(2, TypeTree::Bool).unwrap());
        assert!(matches!(
            sig.transform(&mut ctx),
            Err(ErrorKind::Name(NameError::Redeclared { .. }))
        ));
    }

    #[test]
    fn components_only_for_automata_and_systems() {
        let params = vec![param("a", TypeTree::Int), param("b", TypeTree::Int)];
        let function = SignatureForm::new(Category::Function, params.clone(), None);
        assert_eq!(
            function.new_connection_table("m_0_f").unwrap_err(),
            TypeError::NotAComponent("m_0_f".into())
        );

        let automaton = SignatureForm::new(Category::Automaton, params, None);
        assert_eq!(
            automaton.render_definition(),
            "(mut unit: Unit, id_a: Port, id_b: Port)"
        );
        let table = automaton.new_connection_table("m_0_a").unwrap();
        assert_eq!(table.ports().count(), 2);
    }
}
