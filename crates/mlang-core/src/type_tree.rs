//! Type trees.
//!
//! A [`TypeTree`] is a persistent value: children sit behind [`Arc`], so
//! cloning is a cheap shallow structural copy and edits go through
//! copy-on-write (`Arc::make_mut`). A clone can therefore never observe a
//! change made to another clone, and instantiating a template never touches the
//! declaration it was copied from. [`TypeTree::deep_clone`] additionally
//! reallocates every node, including initializer payloads.

use std::fmt;
use std::sync::Arc;

use crate::ast::Term;
use crate::error::StructuralError;
use crate::node::NodeKind;

/// A bound of a `bounded_int` or the length of an `array`.
///
/// Names refer to template value arguments and are replaced by literals when
/// the type is instantiated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Bound {
    Literal(i64),
    Param(String),
}

impl Bound {
    pub fn literal(&self) -> Option<i64> {
        match self {
            Bound::Literal(v) => Some(*v),
            Bound::Param(_) => None,
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::Literal(v) => write!(f, "{v}"),
            Bound::Param(name) => f.write_str(name),
        }
    }
}

/// A named struct field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: TypeTree,
}

/// A type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeTree {
    Int,
    BoundedInt { l: Bound, r: Bound },
    Real,
    Bool,
    Char,
    /// An enum type, by alias.
    Enum(String),
    /// An identifier leaf referring to a type alias; removed by instantiation.
    Named(String),
    Tuple(Arc<Vec<TypeTree>>),
    Union(Arc<Vec<TypeTree>>),
    Array {
        length: Bound,
        element: Arc<TypeTree>,
    },
    List(Arc<TypeTree>),
    Map {
        key: Arc<TypeTree>,
        value: Arc<TypeTree>,
    },
    /// Field names are unique; order is declaration order.
    Struct(Arc<Vec<Field>>),
    /// A type annotated with an explicit initializer term.
    Init { ty: Arc<TypeTree>, term: Arc<Term> },
}

impl TypeTree {
    // ==========================================================================
    // Construction
    // ==========================================================================

    pub fn bounded(l: i64, r: i64) -> Result<Self, StructuralError> {
        Self::bounded_with(Bound::Literal(l), Bound::Literal(r))
    }

    /// Bounded integer with possibly symbolic bounds. Literal bounds must
    /// satisfy `l <= r`.
    pub fn bounded_with(l: Bound, r: Bound) -> Result<Self, StructuralError> {
        if let (Some(lv), Some(rv)) = (l.literal(), r.literal())
            && lv > rv
        {
            return Err(StructuralError::InvertedBounds { l: lv, r: rv });
        }
        Ok(TypeTree::BoundedInt { l, r })
    }

    pub fn tuple(children: Vec<TypeTree>) -> Self {
        TypeTree::Tuple(Arc::new(children))
    }

    pub fn union(arms: Vec<TypeTree>) -> Self {
        TypeTree::Union(Arc::new(arms))
    }

    pub fn array(length: usize, element: TypeTree) -> Result<Self, StructuralError> {
        let length = i64::try_from(length).map_err(|_| StructuralError::LengthOverflow(length))?;
        Self::array_with(Bound::Literal(length), element)
    }

    pub fn array_with(length: Bound, element: TypeTree) -> Result<Self, StructuralError> {
        if let Some(n) = length.literal()
            && n < 0
        {
            return Err(StructuralError::NegativeLength(n));
        }
        Ok(TypeTree::Array {
            length,
            element: Arc::new(element),
        })
    }

    pub fn list(element: TypeTree) -> Self {
        TypeTree::List(Arc::new(element))
    }

    pub fn map(key: TypeTree, value: TypeTree) -> Self {
        TypeTree::Map {
            key: Arc::new(key),
            value: Arc::new(value),
        }
    }

    /// Struct type; rejects duplicate field names.
    pub fn structure<S: Into<String>>(
        fields: impl IntoIterator<Item = (S, TypeTree)>,
    ) -> Result<Self, StructuralError> {
        let mut out: Vec<Field> = Vec::new();
        for (name, ty) in fields {
            let name = name.into();
            if out.iter().any(|f| f.name == name) {
                return Err(StructuralError::DuplicateField(name));
            }
            out.push(Field { name, ty });
        }
        Ok(TypeTree::Struct(Arc::new(out)))
    }

    pub fn init(ty: TypeTree, term: Term) -> Self {
        TypeTree::Init {
            ty: Arc::new(ty),
            term: Arc::new(term),
        }
    }

    pub fn named(alias: impl Into<String>) -> Self {
        TypeTree::Named(alias.into())
    }

    pub fn enumeration(alias: impl Into<String>) -> Self {
        TypeTree::Enum(alias.into())
    }

    /// The empty union. No value inhabits it, so it coerces to everything;
    /// used as the element type of empty literals.
    pub fn bottom() -> Self {
        TypeTree::union(Vec::new())
    }

    // ==========================================================================
    // Inspection
    // ==========================================================================

    /// The syntax node kind this type corresponds to.
    pub fn kind(&self) -> NodeKind {
        match self {
            TypeTree::Int => NodeKind::Int,
            TypeTree::BoundedInt { .. } => NodeKind::BoundedInt,
            TypeTree::Real => NodeKind::Real,
            TypeTree::Bool => NodeKind::Bool,
            TypeTree::Char => NodeKind::Char,
            TypeTree::Enum(_) => NodeKind::Enum,
            TypeTree::Named(_) => NodeKind::Identifier,
            TypeTree::Tuple(_) => NodeKind::Tuple,
            TypeTree::Union(_) => NodeKind::Union,
            TypeTree::Array { .. } => NodeKind::Array,
            TypeTree::List(_) => NodeKind::List,
            TypeTree::Map { .. } => NodeKind::Map,
            TypeTree::Struct(_) => NodeKind::Struct,
            TypeTree::Init { .. } => NodeKind::Init,
        }
    }

    /// Remove `init` wrappers at the top of this tree.
    pub fn strip_init(&self) -> &TypeTree {
        let mut current = self;
        while let TypeTree::Init { ty, .. } = current {
            current = ty;
        }
        current
    }

    /// Remove `init` wrappers everywhere in this tree.
    pub fn de_init(&self) -> TypeTree {
        match self.strip_init() {
            TypeTree::Tuple(children) => {
                TypeTree::tuple(children.iter().map(TypeTree::de_init).collect())
            }
            TypeTree::Union(arms) => TypeTree::union(arms.iter().map(TypeTree::de_init).collect()),
            TypeTree::Array { length, element } => TypeTree::Array {
                length: length.clone(),
                element: Arc::new(element.de_init()),
            },
            TypeTree::List(element) => TypeTree::list(element.de_init()),
            TypeTree::Map { key, value } => TypeTree::map(key.de_init(), value.de_init()),
            TypeTree::Struct(fields) => TypeTree::Struct(Arc::new(
                fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.clone(),
                        ty: f.ty.de_init(),
                    })
                    .collect(),
            )),
            other => other.clone(),
        }
    }

    /// Clone that shares no allocation with `self`.
    pub fn deep_clone(&self) -> TypeTree {
        match self {
            TypeTree::Tuple(children) => {
                TypeTree::tuple(children.iter().map(TypeTree::deep_clone).collect())
            }
            TypeTree::Union(arms) => {
                TypeTree::union(arms.iter().map(TypeTree::deep_clone).collect())
            }
            TypeTree::Array { length, element } => TypeTree::Array {
                length: length.clone(),
                element: Arc::new(element.deep_clone()),
            },
            TypeTree::List(element) => TypeTree::list(element.deep_clone()),
            TypeTree::Map { key, value } => TypeTree::map(key.deep_clone(), value.deep_clone()),
            TypeTree::Struct(fields) => TypeTree::Struct(Arc::new(
                fields
                    .iter()
                    .map(|f| Field {
                        name: f.name.clone(),
                        ty: f.ty.deep_clone(),
                    })
                    .collect(),
            )),
            TypeTree::Init { ty, term } => TypeTree::Init {
                ty: Arc::new(ty.deep_clone()),
                term: Arc::new(Term::clone(term)),
            },
            other => other.clone(),
        }
    }

    /// Copy-on-write access to the children of a tuple or union.
    pub fn children_mut(&mut self) -> Option<&mut Vec<TypeTree>> {
        match self {
            TypeTree::Tuple(children) | TypeTree::Union(children) => {
                Some(Arc::make_mut(children))
            }
            _ => None,
        }
    }

    /// Whether no alias references or symbolic bounds remain.
    pub fn is_resolved(&self) -> bool {
        match self {
            TypeTree::Named(_) => false,
            TypeTree::BoundedInt { l, r } => l.literal().is_some() && r.literal().is_some(),
            TypeTree::Tuple(children) | TypeTree::Union(children) => {
                children.iter().all(TypeTree::is_resolved)
            }
            TypeTree::Array { length, element } => {
                length.literal().is_some() && element.is_resolved()
            }
            TypeTree::List(element) => element.is_resolved(),
            TypeTree::Map { key, value } => key.is_resolved() && value.is_resolved(),
            TypeTree::Struct(fields) => fields.iter().all(|f| f.ty.is_resolved()),
            TypeTree::Init { ty, .. } => ty.is_resolved(),
            _ => true,
        }
    }

    /// Field type of a struct, looked up by name.
    pub fn field(&self, name: &str) -> Option<&TypeTree> {
        match self.strip_init() {
            TypeTree::Struct(fields) => fields.iter().find(|f| f.name == name).map(|f| &f.ty),
            _ => None,
        }
    }

    /// Literal length of an array type.
    pub fn array_length(&self) -> Option<usize> {
        match self.strip_init() {
            TypeTree::Array { length, .. } => length.literal().and_then(|n| usize::try_from(n).ok()),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self.strip_init(),
            TypeTree::Int | TypeTree::BoundedInt { .. } | TypeTree::Real | TypeTree::Bool
        )
    }

    pub fn is_integral(&self) -> bool {
        matches!(
            self.strip_init(),
            TypeTree::Int | TypeTree::BoundedInt { .. } | TypeTree::Bool
        )
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[TypeTree]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for TypeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTree::Int => write!(f, "int"),
            TypeTree::BoundedInt { l, r } => write!(f, "int[{l}..{r}]"),
            TypeTree::Real => write!(f, "real"),
            TypeTree::Bool => write!(f, "bool"),
            TypeTree::Char => write!(f, "char"),
            TypeTree::Enum(alias) => write!(f, "enum {alias}"),
            TypeTree::Named(alias) => f.write_str(alias),
            TypeTree::Tuple(children) => {
                write!(f, "tuple(")?;
                write_list(f, children)?;
                write!(f, ")")
            }
            TypeTree::Union(arms) => {
                write!(f, "union(")?;
                write_list(f, arms)?;
                write!(f, ")")
            }
            TypeTree::Array { length, element } => write!(f, "array[{length}]({element})"),
            TypeTree::List(element) => write!(f, "list({element})"),
            TypeTree::Map { key, value } => write!(f, "map({key}, {value})"),
            TypeTree::Struct(fields) => {
                write!(f, "struct{{")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                write!(f, "}}")
            }
            TypeTree::Init { ty, .. } => write!(f, "init({ty})"),
        }
    }
}
