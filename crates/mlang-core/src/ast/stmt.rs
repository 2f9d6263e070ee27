//! Statement nodes of function and automaton bodies.

use crate::node::NodeKind;
use crate::type_tree::TypeTree;

use super::expr::Term;

/// `var a, b : T`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub names: Vec<String>,
    /// Declared type, possibly wrapped in an `init` carrying the initializer.
    pub ty: TypeTree,
}

/// `lhs_1, ..., lhs_n = rhs_1, ..., rhs_m`
#[derive(Debug, Clone, PartialEq)]
pub struct Assign {
    pub lhs: Vec<Term>,
    pub rhs: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    VarDecl(VarDecl),
    Assign(Assign),
    Return(Term),
    /// Rendezvous on each listed port, in order.
    Sync(Vec<String>),
}

impl Statement {
    pub fn kind(&self) -> NodeKind {
        match self {
            Statement::VarDecl(_) => NodeKind::VarDecl,
            Statement::Assign(_) => NodeKind::AssignStmt,
            Statement::Return(_) => NodeKind::ReturnStmt,
            Statement::Sync(_) => NodeKind::SyncStmt,
        }
    }
}

/// `guard -> effects`
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedStmt {
    pub guard: Term,
    pub effects: Vec<Statement>,
}

/// One automaton transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    Single(GuardedStmt),
    /// At most one enabled branch runs per round, chosen uniformly at random.
    Group(Vec<GuardedStmt>),
}
