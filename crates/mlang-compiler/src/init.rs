//! Initializer synthesis for declared variables.

use mlang_core::node::NodeKind;
use mlang_core::{At, Bound, LoweringError, TypeError, TypeTree};

use crate::emit;
use crate::term::{ResolvedTerm, TermLowerer, TermTag};

impl TermLowerer<'_> {
    /// Initial value of a variable of (instantiated) type `ty`.
    ///
    /// An `init` wrapper supplies its own term, which must coerce to the
    /// wrapped type. Anything else gets a default value built structurally.
    /// The result is typed as `ty` without its `init` wrappers.
    pub fn lower_init(&mut self, ty: &TypeTree) -> Result<ResolvedTerm, LoweringError> {
        let node = NodeKind::Init;
        let mut requests = Vec::new();
        let code = match ty {
            TypeTree::Init { ty: inner, term } => {
                let value = self.lower(term)?;
                let code = value.coerced(inner).at(node)?;
                requests.extend(value.requests);
                code
            }
            TypeTree::Int => "Value::int(0)".to_string(),
            TypeTree::BoundedInt { l, .. } => match l {
                Bound::Literal(l) => format!("Value::int({l})"),
                Bound::Param(_) => return Err(no_default(ty)).at(node),
            },
            TypeTree::Real => "Value::real(0.0)".to_string(),
            TypeTree::Bool => "Value::Bool(false)".to_string(),
            TypeTree::Char => "Value::Char('\\0')".to_string(),
            TypeTree::Enum(alias) => {
                let first = self
                    .context()
                    .enum_members(alias)
                    .and_then(|m| m.first())
                    .ok_or_else(|| no_default(ty))
                    .at(node)?;
                format!(
                    "Value::enum_member({}, {})",
                    emit::string(alias),
                    emit::string(first)
                )
            }
            TypeTree::Named(_) => return Err(no_default(ty)).at(node),
            TypeTree::Tuple(items) => {
                let mut codes = Vec::with_capacity(items.len());
                for item in items.iter() {
                    let r = self.lower_init(item)?;
                    codes.push(r.code);
                    requests.extend(r.requests);
                }
                format!("Value::Tuple({})", emit::vec_of(&codes))
            }
            TypeTree::Union(arms) => {
                let first = arms.first().ok_or_else(|| no_default(ty)).at(node)?;
                let r = self.lower_init(first)?;
                requests.extend(r.requests);
                format!("Value::union(0, {})", r.code)
            }
            TypeTree::Array { length, element } => {
                let n = length.literal().ok_or_else(|| no_default(ty)).at(node)?;
                let r = self.lower_init(element)?;
                requests.extend(r.requests);
                format!("Value::repeat({}, {n})", r.code)
            }
            TypeTree::List(_) => "Value::List(Vec::new())".to_string(),
            TypeTree::Map { .. } => "Value::Map(Default::default())".to_string(),
            TypeTree::Struct(fields) => {
                let mut codes = Vec::with_capacity(fields.len());
                for field in fields.iter() {
                    let r = self.lower_init(&field.ty)?;
                    codes.push(format!("({}, {})", emit::string(&field.name), r.code));
                    requests.extend(r.requests);
                }
                if codes.is_empty() {
                    "Value::Struct(Default::default())".to_string()
                } else {
                    format!("Value::structure([{}])", codes.join(", "))
                }
            }
        };
        Ok(ResolvedTerm {
            code,
            ty: Some(ty.de_init()),
            requests,
            tag: TermTag::None,
        })
    }
}

fn no_default(ty: &TypeTree) -> TypeError {
    TypeError::NoDefault(ty.to_string())
}
