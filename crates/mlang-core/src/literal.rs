//! Literal values and resolved template arguments.

use std::fmt;

use ordered_float::OrderedFloat;

use crate::type_tree::TypeTree;

/// A literal value appearing in source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Literal {
    Int(i64),
    Real(OrderedFloat<f64>),
    Bool(bool),
    Char(char),
}

impl Literal {
    /// The primitive type of this literal.
    pub fn type_tree(&self) -> TypeTree {
        match self {
            Literal::Int(_) => TypeTree::Int,
            Literal::Real(_) => TypeTree::Real,
            Literal::Bool(_) => TypeTree::Bool,
            Literal::Char(_) => TypeTree::Char,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{v}"),
            Literal::Real(v) => write!(f, "{:?}", v.0),
            Literal::Bool(v) => write!(f, "{v}"),
            Literal::Char(c) => write!(f, "{c:?}"),
        }
    }
}

/// A template argument after resolution in the requesting context.
///
/// Arguments are compared structurally: two requests with equal argument
/// lists denote the same expansion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateArg {
    /// Bound into the type-alias namespace.
    Type(TypeTree),
    /// Bound into the template-value namespace.
    Value(Literal),
}

impl TemplateArg {
    pub fn is_type(&self) -> bool {
        matches!(self, TemplateArg::Type(_))
    }
}

impl fmt::Display for TemplateArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateArg::Type(ty) => write!(f, "{ty}"),
            TemplateArg::Value(lit) => write!(f, "{lit}"),
        }
    }
}
