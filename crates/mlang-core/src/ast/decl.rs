//! Declaration nodes.

use std::fmt;

use bitflags::bitflags;

use crate::literal::Literal;
use crate::type_tree::TypeTree;

use super::stmt::{Statement, Transition, VarDecl};

bitflags! {
    /// Which way data may flow through a port.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PortDirection: u8 {
        const IN = 0b01;
        const OUT = 0b10;
        const INOUT = Self::IN.bits() | Self::OUT.bits();
    }
}

impl Default for PortDirection {
    fn default() -> Self {
        PortDirection::INOUT
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = if *self == PortDirection::IN {
            "in"
        } else if *self == PortDirection::OUT {
            "out"
        } else {
            "inout"
        };
        f.write_str(name)
    }
}

/// `typedef T as Name`
#[derive(Debug, Clone, PartialEq)]
pub struct Typedef {
    pub name: String,
    pub ty: TypeTree,
}

/// `enum Name { A, B, ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<String>,
}

/// A formal template parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateParam {
    pub name: String,
    pub kind: TemplateParamKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateParamKind {
    /// `type T` or `type T <: Bound`
    Type { bound: Option<TypeTree> },
    /// A value parameter of the given type.
    Value { ty: TypeTree },
}

/// A formal parameter of a signature.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeTree,
    pub direction: PortDirection,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Signature {
    pub params: Vec<Param>,
    /// Functions only.
    pub return_type: Option<TypeTree>,
}

impl Signature {
    pub fn param(&self, name: &str) -> Option<&Param> {
        self.params.iter().find(|p| p.name == name)
    }
}

/// An unresolved template argument as written at a use site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TemplateArgExpr {
    Type(TypeTree),
    Value(Literal),
    /// Bound type alias or template value of the requesting context.
    Name(String),
}

/// A reference to a declaration, with template arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub name: String,
    pub args: Vec<TemplateArgExpr>,
}

impl EntityRef {
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// `inst_1, inst_2 : Entity<args>`
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDecl {
    pub instances: Vec<String>,
    pub entity: EntityRef,
}

/// One endpoint of a connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PortRef {
    /// `instance.port`
    Component { instance: String, port: String },
    /// A port of the enclosing system, or one of its internal nodes.
    System(String),
}

/// `Entity<args>(endpoints...)`: an instance whose ports are wired
/// positionally to the endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub entity: EntityRef,
    pub endpoints: Vec<PortRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Function,
    Automaton,
    System,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Category::Function => "function",
            Category::Automaton => "automaton",
            Category::System => "system",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub statements: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutomatonBody {
    pub vars: Vec<VarDecl>,
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SystemBody {
    pub components: Vec<ComponentDecl>,
    pub internals: Vec<String>,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Function(FunctionBody),
    Automaton(AutomatonBody),
    System(SystemBody),
}

/// A function, automaton or system declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub template_params: Vec<TemplateParam>,
    pub signature: Signature,
    pub body: Body,
}

impl Declaration {
    pub fn category(&self) -> Category {
        match self.body {
            Body::Function(_) => Category::Function,
            Body::Automaton(_) => Category::Automaton,
            Body::System(_) => Category::System,
        }
    }

    pub fn is_generic(&self) -> bool {
        !self.template_params.is_empty()
    }
}
