//! Term (expression) nodes.

use std::fmt;

use crate::literal::Literal;
use crate::node::NodeKind;

use super::decl::EntityRef;

/// Binary arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Mul,
    Rem,
}

impl BinaryOp {
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        match symbol {
            "+" => Some(BinaryOp::Add),
            "*" => Some(BinaryOp::Mul),
            "%" => Some(BinaryOp::Rem),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Mul => "*",
            BinaryOp::Rem => "%",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Term {
    Literal(Literal),
    /// Local variable, port, enum alias or template value.
    Identifier(String),
    /// Function call, possibly of a template expansion.
    Call { callee: EntityRef, args: Vec<Term> },
    Struct(Vec<(String, Term)>),
    List(Vec<Term>),
    Map(Vec<(Term, Term)>),
    Tuple(Vec<Term>),
    /// `target.member`
    Dot { target: Box<Term>, member: String },
    /// `target[index]`
    Index { target: Box<Term>, index: Box<Term> },
    Binary {
        op: BinaryOp,
        lhs: Box<Term>,
        rhs: Box<Term>,
    },
}

impl Term {
    pub fn kind(&self) -> NodeKind {
        match self {
            Term::Literal(_) => NodeKind::Value,
            Term::Identifier(_) => NodeKind::Identifier,
            Term::Call { .. } => NodeKind::FuncTerm,
            Term::Struct(_) => NodeKind::StructTerm,
            Term::List(_) => NodeKind::ListTerm,
            Term::Map(_) => NodeKind::MapTerm,
            Term::Tuple(_) => NodeKind::TupleTerm,
            Term::Dot { .. } => NodeKind::DotTerm,
            Term::Index { .. } => NodeKind::BrackTerm,
            Term::Binary { .. } => NodeKind::BinopTerm,
        }
    }

    pub fn identifier(name: impl Into<String>) -> Self {
        Term::Identifier(name.into())
    }

    pub fn int(value: i64) -> Self {
        Term::Literal(Literal::Int(value))
    }

    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Term::Identifier(name) => Some(name),
            _ => None,
        }
    }
}
