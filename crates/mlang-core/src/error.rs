//! Error taxonomy for the mlang compiler.
//!
//! ## Error Hierarchy
//!
//! ```text
//! CompilationError (declaration, template args, node kind)
//! └── ErrorKind
//!     ├── NameError          - unknown or redeclared names
//!     ├── TypeError          - coercion and arity failures
//!     ├── StructuralError    - syntax tree shape violations
//!     ├── ResourceExhaustion - expansion worklist did not terminate
//!     └── Internal           - broken compiler invariants
//! ```
//!
//! Lowering code returns [`LoweringError`], which pairs an [`ErrorKind`] with
//! the offending node kind. The translator driver wraps it into a
//! [`CompilationError`] that also names the declaration being expanded.

use std::fmt;

use thiserror::Error;

use crate::literal::TemplateArg;
use crate::node::NodeKind;

// ============================================================================
// Name Errors
// ============================================================================

/// An identifier could not be resolved, or was declared twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("unknown identifier '{0}'")]
    UnknownIdentifier(String),

    #[error("unknown template '{0}'")]
    UnknownTemplate(String),

    #[error("unknown port '{0}'")]
    UnknownPort(String),

    #[error("unknown field '{field}' on type '{type_name}'")]
    UnknownField { field: String, type_name: String },

    #[error("enum '{alias}' has no member '{member}'")]
    UnknownEnumMember { alias: String, member: String },

    #[error("unknown component '{0}'")]
    UnknownComponent(String),

    #[error("'{name}' is already declared as {existing}")]
    Redeclared {
        name: String,
        existing: &'static str,
    },

    #[error("port '{port}' of '{instance}' is not connected")]
    UnboundPort { instance: String, port: String },
}

// ============================================================================
// Type Errors
// ============================================================================

/// A value of one type cannot be used where another is expected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeError {
    #[error("cannot coerce '{from}' to '{to}'")]
    NoCoercion { from: String, to: String },

    /// The pairing is not something coercion is defined on, as opposed to
    /// a well-formed pairing that simply has no coercion.
    #[error("coercion from '{from}' to '{to}' is not supported")]
    Unsupported { from: String, to: String },

    #[error("function declared to return '{expected}' can end without a return")]
    MissingReturn { expected: String },

    /// No coercion rule covers the pairing.
    #[error("no coercion rule covers '{from}' to '{to}'")]
    UnhandledPairing { from: String, to: String },

    #[error("{what} expects {expected} argument(s), got {got}")]
    ArityMismatch {
        what: String,
        expected: usize,
        got: usize,
    },

    #[error("template parameter '{param}' expects a {expected}")]
    TemplateArgKind {
        param: String,
        expected: &'static str,
    },

    #[error("value {value} is outside [{l}, {r}]")]
    OutOfBounds { value: i64, l: i64, r: i64 },

    #[error("tuple index must be an integer literal")]
    NonStaticIndex,

    #[error("index {index} out of range for a tuple of {len} element(s)")]
    TupleIndexOutOfRange { index: i64, len: usize },

    #[error("cannot index a value of type '{0}'")]
    NotIndexable(String),

    #[error("member access '.{member}' is not defined on '{target}'")]
    InvalidMemberAccess { target: String, member: String },

    #[error("operator '{op}' cannot be applied to '{lhs}' and '{rhs}'")]
    InvalidOperands { op: String, lhs: String, rhs: String },

    #[error("port '{port}' cannot be {action}: it is declared '{direction}'")]
    PortDirection {
        port: String,
        action: &'static str,
        direction: String,
    },

    #[error("cannot assign {rhs} value(s) to {lhs} target(s)")]
    AssignmentShape { lhs: usize, rhs: usize },

    #[error("expression is not assignable")]
    NotAssignable,

    #[error("'{0}' has no type")]
    Untyped(String),

    #[error("'{0}' is a function and cannot be instantiated as a component")]
    NotAComponent(String),

    #[error("'{0}' is not a function")]
    NotCallable(String),

    #[error("cannot synthesize a default value of type '{0}'")]
    NoDefault(String),
}

// ============================================================================
// Structural Errors
// ============================================================================

/// The syntax tree violates a shape invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralError {
    #[error("unknown node kind '{0}'")]
    UnknownNode(String),

    #[error("<{parent}> expects {expected}, found <{found}>")]
    UnexpectedChild {
        parent: String,
        expected: String,
        found: String,
    },

    #[error("<{node}> expects {expected} child(ren), found {found}")]
    ChildCount {
        node: String,
        expected: String,
        found: usize,
    },

    #[error("<{node}> is missing attribute '{attr}'")]
    MissingAttribute { node: String, attr: String },

    #[error("<{node}> attribute '{attr}' has the wrong kind")]
    AttributeKind { node: String, attr: String },

    #[error("bounded int has l = {l} > r = {r}")]
    InvertedBounds { l: i64, r: i64 },

    #[error("array length {0} is negative")]
    NegativeLength(i64),

    #[error("array length {0} does not fit a 64-bit integer")]
    LengthOverflow(usize),

    #[error("duplicate struct field '{0}'")]
    DuplicateField(String),
}

// ============================================================================
// Unified kind
// ============================================================================

/// Any failure the compiler can report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error(transparent)]
    Name(#[from] NameError),

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error("more than {limit} expansions; growing chain: {chain}")]
    ResourceExhaustion { limit: usize, chain: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl ErrorKind {
    /// Short taxonomy class name.
    pub fn class(&self) -> &'static str {
        match self {
            ErrorKind::Name(_) => "NameError",
            ErrorKind::Type(_) => "TypeError",
            ErrorKind::Structural(_) => "StructuralError",
            ErrorKind::ResourceExhaustion { .. } => "ResourceExhaustion",
            ErrorKind::Internal(_) => "InternalError",
        }
    }
}

/// An [`ErrorKind`] located at a syntax node kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at <{node}>: {kind}")]
pub struct LoweringError {
    pub node: NodeKind,
    pub kind: ErrorKind,
}

impl LoweringError {
    pub fn new(node: NodeKind, kind: impl Into<ErrorKind>) -> Self {
        Self {
            node,
            kind: kind.into(),
        }
    }
}

/// Attach the offending node kind to an error.
pub trait At<T> {
    fn at(self, node: NodeKind) -> Result<T, LoweringError>;
}

impl<T, E: Into<ErrorKind>> At<T> for Result<T, E> {
    fn at(self, node: NodeKind) -> Result<T, LoweringError> {
        self.map_err(|e| LoweringError::new(node, e))
    }
}

// ============================================================================
// Compilation Errors
// ============================================================================

/// A failure lowering one expansion, with enough context to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct CompilationError {
    /// Declaration being expanded when the failure happened.
    pub declaration: String,
    /// Template arguments of that expansion (empty for non-generic ones).
    pub template_args: Vec<TemplateArg>,
    pub node: NodeKind,
    pub kind: ErrorKind,
}

impl CompilationError {
    pub fn new(
        declaration: impl Into<String>,
        template_args: Vec<TemplateArg>,
        error: LoweringError,
    ) -> Self {
        Self {
            declaration: declaration.into(),
            template_args,
            node: error.node,
            kind: error.kind,
        }
    }
}

impl fmt::Display for CompilationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} in '{}", self.kind.class(), self.declaration)?;
        if !self.template_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.template_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{arg}")?;
            }
            write!(f, ">")?;
        }
        write!(f, "' at <{}>: {}", self.node, self.kind)
    }
}
