//! Per-declaration expansion cache.

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use mlang_core::ast::Category;
use mlang_core::{ErrorKind, TemplateArg};
use rustc_hash::FxHashMap;
use xxhash_rust::xxh64::Xxh64;

use super::form::{SignatureForm, TemplateForm};
use super::naming::expansion_name;
use crate::context::TypeContext;

/// One concrete expansion of a declaration. Immutable once created.
#[derive(Debug, Clone)]
pub struct ExpansionDatum {
    pub args: Vec<TemplateArg>,
    /// Generated name, unique across the program.
    pub actual_name: String,
    /// Signature with every type instantiated.
    pub signature: SignatureForm,
    /// Context the body is lowered in: program-level names, template
    /// arguments and parameters.
    pub context: TypeContext,
}

/// Fingerprint of an argument list, used to find candidate expansions
/// before comparing structurally.
fn fingerprint(args: &[TemplateArg]) -> u64 {
    let mut hasher = Xxh64::new(0);
    args.hash(&mut hasher);
    hasher.finish()
}

/// A declaration and every expansion of it created so far.
///
/// Holds at most one expansion per structurally distinct argument list.
#[derive(Debug, Clone)]
pub struct TemplateDatum {
    name: String,
    form: TemplateForm,
    signature: SignatureForm,
    expansions: Vec<Arc<ExpansionDatum>>,
    index: FxHashMap<u64, Vec<usize>>,
}

impl TemplateDatum {
    pub fn new(name: impl Into<String>, form: TemplateForm, signature: SignatureForm) -> Self {
        Self {
            name: name.into(),
            form,
            signature,
            expansions: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.signature.category()
    }

    pub fn form(&self) -> &TemplateForm {
        &self.form
    }

    /// The declared, uninstantiated signature.
    pub fn signature(&self) -> &SignatureForm {
        &self.signature
    }

    pub fn expansions(&self) -> &[Arc<ExpansionDatum>] {
        &self.expansions
    }

    pub fn query(&self, args: &[TemplateArg]) -> Option<Arc<ExpansionDatum>> {
        self.index
            .get(&fingerprint(args))?
            .iter()
            .map(|&i| &self.expansions[i])
            .find(|e| e.args == args)
            .cloned()
    }

    /// Record a new expansion for `args`, binding it on top of `base`.
    ///
    /// Calling this for an argument list that already has an expansion is a
    /// caller bug and reported as an internal error.
    pub fn create(
        &mut self,
        base: &TypeContext,
        args: &[TemplateArg],
    ) -> Result<Arc<ExpansionDatum>, ErrorKind> {
        if self.query(args).is_some() {
            return Err(ErrorKind::Internal(format!(
                "expansion of '{}' for these arguments already exists",
                self.name
            )));
        }

        let mut context = base.clone();
        self.form.transform(&mut context, args)?;
        let signature = self.signature.instantiate(&context)?;
        signature.transform(&mut context)?;

        let datum = Arc::new(ExpansionDatum {
            args: args.to_vec(),
            actual_name: expansion_name(self.expansions.len(), &self.name),
            signature,
            context,
        });
        self.index
            .entry(fingerprint(args))
            .or_default()
            .push(self.expansions.len());
        self.expansions.push(datum.clone());
        Ok(datum)
    }

    /// The expansion for `args`, creating it if needed. The flag is `true`
    /// when this call created it.
    pub fn query_or_create(
        &mut self,
        base: &TypeContext,
        args: &[TemplateArg],
    ) -> Result<(Arc<ExpansionDatum>, bool), ErrorKind> {
        match self.query(args) {
            Some(datum) => Ok((datum, false)),
            None => self.create(base, args).map(|d| (d, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use mlang_core::ast::{TemplateParam, TemplateParamKind};
    use mlang_core::{Literal, TypeTree};

    use super::*;

    fn datum() -> TemplateDatum {
        TemplateDatum::new(
            "id",
            TemplateForm::new(
                "id",
                vec![TemplateParam {
                    name: "T".into(),
                    kind: TemplateParamKind::Type { bound: None },
                }],
            ),
            SignatureForm::new(Category::Function, Vec::new(), Some(TypeTree::named("T"))),
        )
    }

    #[test]
    fn query_or_create_memoizes_structurally() {
        let base = TypeContext::new();
        let mut d = datum();
        let int = [TemplateArg::Type(TypeTree::Int)];

        let (first, created) = d.query_or_create(&base, &int).unwrap();
        assert!(created);
        let (again, created) = d.query_or_create(&base, &int).unwrap();
        assert!(!created);
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.actual_name, "m_0_id");

        let (other, created) = d
            .query_or_create(&base, &[TemplateArg::Type(TypeTree::Real)])
            .unwrap();
        assert!(created);
        assert_eq!(other.actual_name, "m_1_id");
        assert_eq!(other.signature.return_type(), Some(&TypeTree::Real));
        assert_eq!(d.expansions().len(), 2);
    }

    #[test]
    fn create_rejects_existing_expansion() {
        let base = TypeContext::new();
        let mut d = datum();
        let int = [TemplateArg::Type(TypeTree::Int)];
        d.create(&base, &int).unwrap();
        assert!(matches!(d.create(&base, &int), Err(ErrorKind::Internal(_))));
        assert_eq!(d.expansions().len(), 1);
    }

    #[test]
    fn failed_create_records_nothing() {
        let base = TypeContext::new();
        let mut d = datum();
        assert!(
            d.query_or_create(&base, &[TemplateArg::Value(Literal::Int(1))])
                .is_err()
        );
        assert!(d.expansions().is_empty());
        let (next, _) = d
            .query_or_create(&base, &[TemplateArg::Type(TypeTree::Int)])
            .unwrap();
        assert_eq!(next.actual_name, "m_0_id");
    }

    #[test]
    fn base_context_is_not_mutated() {
        let base = TypeContext::new();
        let mut d = datum();
        let (e, _) = d
            .query_or_create(&base, &[TemplateArg::Type(TypeTree::Int)])
            .unwrap();
        assert_eq!(e.context.type_alias("T"), Some(&TypeTree::Int));
        assert_eq!(base.type_alias("T"), None);
    }
}
