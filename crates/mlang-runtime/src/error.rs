//! Runtime errors raised by emitted code.

use thiserror::Error;

/// A failure while running emitted code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("value {value} is outside [{l}, {r}]")]
    OutOfBounds { value: i64, l: i64, r: i64 },

    #[error("value {value} does not match serialization code '{code}'")]
    CodeMismatch { value: String, code: String },

    #[error("{len} element(s) do not fit an array of length {length}")]
    ArrayOverflow { len: usize, length: usize },

    #[error("missing struct field '{0}'")]
    MissingField(String),

    #[error("index {index} out of range for {len} element(s)")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("key {0} is not present")]
    MissingKey(String),

    #[error("'{op}' is not defined on {operands}")]
    InvalidOperation { op: &'static str, operands: String },

    #[error("integer overflow in '{0}'")]
    Overflow(&'static str),

    #[error("division by zero")]
    DivisionByZero,

    #[error("port holds no value")]
    EmptyPort,

    #[error("task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
