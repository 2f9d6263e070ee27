//! Registry of every declaration and its expansions.

use std::sync::Arc;

use mlang_core::ast::{Category, Declaration};
use mlang_core::{ErrorKind, NameError};
use rustc_hash::FxHashMap;
use tracing::debug;

use super::datum::{ExpansionDatum, TemplateDatum};
use super::form::{SignatureForm, TemplateForm};
use super::request::ExpansionRequest;
use crate::context::TypeContext;

/// Owns the expansion caches of one compilation.
///
/// The cache is append-only. Every expansion ever created is recorded in a
/// creation log, in creation order.
#[derive(Debug, Default)]
pub struct TemplateManager {
    base: TypeContext,
    data: FxHashMap<String, TemplateDatum>,
    created: Vec<ExpansionRequest>,
}

impl TemplateManager {
    /// A manager whose expansions all start from `base`.
    pub fn new(base: TypeContext) -> Self {
        Self {
            base,
            data: FxHashMap::default(),
            created: Vec::new(),
        }
    }

    pub fn base(&self) -> &TypeContext {
        &self.base
    }

    /// Register a declaration. Names are unique across categories.
    pub fn register(&mut self, decl: &Declaration) -> Result<(), NameError> {
        if self.data.contains_key(&decl.name) || self.base.namespace_of(&decl.name).is_some() {
            return Err(NameError::Redeclared {
                name: decl.name.clone(),
                existing: "a declaration",
            });
        }
        let form = TemplateForm::new(decl.name.clone(), decl.template_params.clone());
        let signature = SignatureForm::new(
            decl.category(),
            decl.signature.params.clone(),
            decl.signature.return_type.clone(),
        );
        self.data.insert(
            decl.name.clone(),
            TemplateDatum::new(decl.name.clone(), form, signature),
        );
        Ok(())
    }

    pub fn datum(&self, name: &str) -> Option<&TemplateDatum> {
        self.data.get(name)
    }

    pub fn category(&self, name: &str) -> Option<Category> {
        self.data.get(name).map(TemplateDatum::category)
    }

    fn datum_mut(&mut self, name: &str) -> Result<&mut TemplateDatum, NameError> {
        self.data
            .get_mut(name)
            .ok_or_else(|| NameError::UnknownTemplate(name.to_string()))
    }

    pub fn query(&self, req: &ExpansionRequest) -> Result<Option<Arc<ExpansionDatum>>, NameError> {
        let datum = self
            .data
            .get(&req.name)
            .ok_or_else(|| NameError::UnknownTemplate(req.name.clone()))?;
        Ok(datum.query(&req.args))
    }

    pub fn create(&mut self, req: &ExpansionRequest) -> Result<Arc<ExpansionDatum>, ErrorKind> {
        let base = &self.base;
        let datum = self
            .data
            .get_mut(&req.name)
            .ok_or_else(|| NameError::UnknownTemplate(req.name.clone()))?;
        let expansion = datum.create(base, &req.args)?;
        debug!(request = %req, actual = %expansion.actual_name, "expansion created");
        self.created.push(req.clone());
        Ok(expansion)
    }

    /// The expansion for `req`, creating it if needed. The flag is `true`
    /// when this call created it.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn query_or_create(
        &mut self,
        req: &ExpansionRequest,
    ) -> Result<(Arc<ExpansionDatum>, bool), ErrorKind> {
        if let Some(existing) = self.datum_mut(&req.name)?.query(&req.args) {
            return Ok((existing, false));
        }
        self.create(req).map(|e| (e, true))
    }

    /// Number of expansions created so far, across all declarations.
    pub fn expansion_count(&self) -> usize {
        self.created.len()
    }

    /// Requests created after the first `mark` ones.
    pub fn created_since(&self, mark: usize) -> &[ExpansionRequest] {
        self.created.get(mark..).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use mlang_core::ast::{
        Body, FunctionBody, Param, PortDirection, Signature, TemplateParam, TemplateParamKind,
    };
    use mlang_core::{Literal, TemplateArg, TypeError, TypeTree};

    use super::*;

    fn decl(name: &str, generic: bool) -> Declaration {
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
                params: vec![Param {
                    name: "x".into(),
                    ty: TypeTree::Int,
                    direction: PortDirection::default(),
                }],
                return_type: Some(TypeTree::Int),
            },
            body: Body::Function(FunctionBody {
                statements: Vec::new(),
            }),
        }
    }

    #[test]
    fn duplicate_declarations_are_rejected() {
        let mut base = TypeContext::new();
        base.set_type("T", TypeTree::Int).unwrap();
        let mut m = TemplateManager::new(base);
        m.register(&decl("f", false)).unwrap();
        assert!(m.register(&decl("f", true)).is_err());
        assert!(m.register(&decl("T", false)).is_err());
        assert_eq!(m.category("f"), Some(Category::Function));
    }

    #[test]
    fn creation_log_tracks_new_expansions_only() {
        let mut m = TemplateManager::new(TypeContext::new());
        m.register(&decl("g", true)).unwrap();
        let one = ExpansionRequest::new("g", vec![TemplateArg::Value(Literal::Int(1))]);
        let two = ExpansionRequest::new("g", vec![TemplateArg::Value(Literal::Int(2))]);

        let mark = m.expansion_count();
        let (a, created) = m.query_or_create(&one).unwrap();
        assert!(created);
        let (b, created) = m.query_or_create(&one).unwrap();
        assert!(!created);
        assert!(Arc::ptr_eq(&a, &b));
        m.query_or_create(&two).unwrap();

        assert_eq!(m.created_since(mark), &[one.clone(), two][..]);
        assert_eq!(m.created_since(1).len(), 1);
        assert!(m.created_since(10).is_empty());
        assert_eq!(m.query(&one).unwrap().unwrap().actual_name, "m_0_g");
    }

    #[test]
    fn unknown_templates_and_bad_args() {
        let mut m = TemplateManager::new(TypeContext::new());
        m.register(&decl("g", true)).unwrap();
        assert_eq!(
            m.query_or_create(&ExpansionRequest::plain("nope"))
                .unwrap_err(),
            NameError::UnknownTemplate("nope".into()).into()
        );
        let err = m
            .query_or_create(&ExpansionRequest::plain("g"))
            .unwrap_err();
        assert!(matches!(err, ErrorKind::Type(TypeError::ArityMismatch { .. })));
        assert_eq!(m.expansion_count(), 0);
    }
}
