//! Node kinds of the attributed syntax tree.
//!
//! Every kind name the grammar may produce is listed here. Tree nodes are
//! classified once, when [`crate::ast`] builds typed declarations, so that an
//! unknown kind is rejected at construction rather than during lowering.

use std::fmt;

macro_rules! node_kinds {
    ($($variant:ident => $name:literal,)*) => {
        /// A syntax node kind.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum NodeKind {
            $($variant,)*
        }

        impl NodeKind {
            /// All node kinds, in declaration order.
            pub const ALL: &'static [NodeKind] = &[$(NodeKind::$variant,)*];

            /// The kind name used by the grammar.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(NodeKind::$variant => $name,)*
                }
            }

            /// Look up a kind by its grammar name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $($name => Some(NodeKind::$variant),)*
                    _ => None,
                }
            }
        }
    };
}

node_kinds! {
    // Program structure
    Program => "program",
    Typedef => "typedef",
    EnumDecl => "enum_decl",
    FunctionDecl => "function_decl",
    AutomatonDecl => "automaton_decl",
    SystemDecl => "system_decl",
    TemplateParams => "template_params",
    TemplateParam => "template_param",
    AbsType => "abstype",
    Signature => "signature",
    Param => "param",
    ReturnType => "return_type",
    TemplateApply => "template_apply",

    // Types
    Int => "int",
    BoundedInt => "bounded_int",
    Real => "real",
    Bool => "bool",
    Char => "char",
    Enum => "enum",
    Tuple => "tuple",
    Union => "union",
    Array => "array",
    List => "list",
    Map => "map",
    Struct => "struct",
    Init => "init",

    // Leaves
    Identifier => "IDENTIFIER",
    Value => "VALUE",

    // Function and automaton bodies
    Statements => "statements",
    AutomatonVars => "automaton_vars",
    AutomatonTrans => "automaton_trans",
    Transition => "transition",
    GuardedStmtGrp => "guarded_stmt_grp",
    GuardedStmt => "guarded_stmt",
    VarDecl => "var_decl",
    AssignStmt => "assign_stmt",
    Lhs => "lhs",
    Rhs => "rhs",
    ReturnStmt => "return_stmt",
    SyncStmt => "sync_stmt",

    // System bodies
    SystemComp => "system_comp",
    ComponentDecl => "component_decl",
    Entity => "entity",
    SystemInter => "system_inter",
    SystemConn => "system_conn",
    EntityConnection => "entity_connection",
    CompPortName => "comp_port_name",
    SysPortName => "sys_port_name",

    // Terms
    FuncTerm => "func_term",
    StructTerm => "struct_term",
    ListTerm => "list_term",
    MapTerm => "map_term",
    TupleTerm => "tuple_term",
    DotTerm => "dot_term",
    BrackTerm => "brack_term",
    BinopTerm => "binop_term",
}

impl NodeKind {
    /// Whether this kind denotes a type expression.
    pub fn is_type(&self) -> bool {
        matches!(
            self,
            NodeKind::Int
                | NodeKind::BoundedInt
                | NodeKind::Real
                | NodeKind::Bool
                | NodeKind::Char
                | NodeKind::Enum
                | NodeKind::Tuple
                | NodeKind::Union
                | NodeKind::Array
                | NodeKind::List
                | NodeKind::Map
                | NodeKind::Struct
                | NodeKind::Init
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
