//! Dynamic values manipulated by emitted code.

use std::collections::BTreeMap;
use std::fmt;

use mlang_core::Coercion;
use ordered_float::OrderedFloat;
use tracing::warn;

use crate::error::{Result, RuntimeError};
use crate::serial::{Packed, pack_key};

/// A runtime value.
///
/// Map keys are kept in packed form so that keys that are structurally equal
/// after serialization compare equal. Numeric keys are compared by value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Value {
    /// No value; what a function without a return type produces.
    #[default]
    Unit,
    Int(i64),
    Real(OrderedFloat<f64>),
    Bool(bool),
    Char(char),
    Enum { alias: String, member: String },
    Tuple(Vec<Value>),
    /// A value tagged with the union arm it belongs to.
    Union { label: usize, value: Box<Value> },
    /// Arrays and lists.
    List(Vec<Value>),
    Map(BTreeMap<Packed, Value>),
    Struct(BTreeMap<String, Value>),
}

impl Value {
    // ==========================================================================
    // Construction
    // ==========================================================================

    pub fn int(v: i64) -> Self {
        Value::Int(v)
    }

    pub fn real(v: f64) -> Self {
        Value::Real(OrderedFloat(v))
    }

    pub fn enum_member(alias: &str, member: &str) -> Self {
        Value::Enum {
            alias: alias.to_string(),
            member: member.to_string(),
        }
    }

    pub fn union(label: usize, value: Value) -> Self {
        Value::Union {
            label,
            value: Box::new(value),
        }
    }

    pub fn structure<'a>(fields: impl IntoIterator<Item = (&'a str, Value)>) -> Self {
        Value::Struct(
            fields
                .into_iter()
                .map(|(name, value)| (name.to_string(), value))
                .collect(),
        )
    }

    /// Build a map, packing each key with `key_code`. A repeated key keeps the
    /// last value.
    pub fn map(pairs: Vec<(Value, Value)>, key_code: &Coercion) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (key, value) in pairs {
            let packed = pack_key(&key, key_code)?;
            if entries.insert(packed, value).is_some() {
                warn!(key = %key, "duplicate map key, keeping the last value");
            }
        }
        Ok(Value::Map(entries))
    }

    /// `n` copies of `value`.
    pub fn repeat(value: Value, n: usize) -> Self {
        Value::List(vec![value; n])
    }

    // ==========================================================================
    // Scalars
    // ==========================================================================

    /// Guard evaluation.
    pub fn truthy(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(invalid("truthy", other.to_string())),
        }
    }

    /// Integer view; booleans count as 0 and 1.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    fn as_real(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(v.0),
            other => other.as_int().map(|v| v as f64),
        }
    }

    fn arithmetic(
        &self,
        rhs: &Value,
        op: &'static str,
        int_op: impl Fn(i64, i64) -> Option<i64>,
        real_op: impl Fn(f64, f64) -> f64,
    ) -> Result<Value> {
        if let (Some(a), Some(b)) = (self.as_int(), rhs.as_int()) {
            return int_op(a, b).map(Value::Int).ok_or(RuntimeError::Overflow(op));
        }
        match (self.as_real(), rhs.as_real()) {
            (Some(a), Some(b)) => Ok(Value::real(real_op(a, b))),
            _ => Err(invalid(op, format!("{self} and {rhs}"))),
        }
    }

    pub fn add(&self, rhs: &Value) -> Result<Value> {
        self.arithmetic(rhs, "+", i64::checked_add, |a, b| a + b)
    }

    pub fn mul(&self, rhs: &Value) -> Result<Value> {
        self.arithmetic(rhs, "*", i64::checked_mul, |a, b| a * b)
    }

    pub fn rem(&self, rhs: &Value) -> Result<Value> {
        match (self.as_int(), rhs.as_int()) {
            (Some(_), Some(0)) => Err(RuntimeError::DivisionByZero),
            (Some(a), Some(b)) => a.checked_rem(b).map(Value::Int).ok_or(RuntimeError::Overflow("%")),
            _ => Err(invalid("%", format!("{self} and {rhs}"))),
        }
    }

    // ==========================================================================
    // Access
    // ==========================================================================

    /// Tuple slot.
    pub fn item(&self, index: usize) -> Result<Value> {
        match self {
            Value::Tuple(items) => items.get(index).cloned().ok_or(out_of_range(index as i64, items.len())),
            other => Err(invalid("tuple index", other.to_string())),
        }
    }

    pub fn item_mut(&mut self, index: usize) -> Result<&mut Value> {
        match self {
            Value::Tuple(items) => {
                let len = items.len();
                items.get_mut(index).ok_or(out_of_range(index as i64, len))
            }
            other => Err(invalid("tuple index", other.to_string())),
        }
    }

    /// Array or list element.
    pub fn at(&self, index: &Value) -> Result<Value> {
        match self {
            Value::List(items) => {
                let i = list_index(index, items.len())?;
                Ok(items[i].clone())
            }
            other => Err(invalid("[]", other.to_string())),
        }
    }

    pub fn at_mut(&mut self, index: &Value) -> Result<&mut Value> {
        match self {
            Value::List(items) => {
                let i = list_index(index, items.len())?;
                Ok(&mut items[i])
            }
            other => Err(invalid("[]", other.to_string())),
        }
    }

    /// Map value under `key`, packed with `key_code`.
    pub fn lookup(&self, key: &Value, key_code: &Coercion) -> Result<Value> {
        match self {
            Value::Map(entries) => entries
                .get(&pack_key(key, key_code)?)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingKey(key.to_string())),
            other => Err(invalid("[]", other.to_string())),
        }
    }

    /// Map slot under `key`, inserted as [`Value::Unit`] if missing.
    pub fn lookup_mut(&mut self, key: &Value, key_code: &Coercion) -> Result<&mut Value> {
        match self {
            Value::Map(entries) => Ok(entries.entry(pack_key(key, key_code)?).or_default()),
            other => Err(invalid("[]", other.to_string())),
        }
    }

    pub fn field(&self, name: &str) -> Result<Value> {
        match self {
            Value::Struct(fields) => fields
                .get(name)
                .cloned()
                .ok_or_else(|| RuntimeError::MissingField(name.to_string())),
            other => Err(invalid(".", other.to_string())),
        }
    }

    pub fn field_mut(&mut self, name: &str) -> Result<&mut Value> {
        match self {
            Value::Struct(fields) => fields
                .get_mut(name)
                .ok_or_else(|| RuntimeError::MissingField(name.to_string())),
            other => Err(invalid(".", other.to_string())),
        }
    }

    /// The first `n` elements of an array or list, for spreading one value
    /// over several assignment targets.
    pub fn spread(self, n: usize) -> Result<Vec<Value>> {
        match self {
            Value::List(mut items) if items.len() >= n => {
                items.truncate(n);
                Ok(items)
            }
            Value::List(items) => Err(out_of_range(n as i64 - 1, items.len())),
            other => Err(invalid("spread", other.to_string())),
        }
    }
}

fn invalid(op: &'static str, operands: String) -> RuntimeError {
    RuntimeError::InvalidOperation { op, operands }
}

fn out_of_range(index: i64, len: usize) -> RuntimeError {
    RuntimeError::IndexOutOfRange { index, len }
}

fn list_index(index: &Value, len: usize) -> Result<usize> {
    let i = index
        .as_int()
        .ok_or_else(|| invalid("[]", index.to_string()))?;
    usize::try_from(i)
        .ok()
        .filter(|&i| i < len)
        .ok_or(out_of_range(i, len))
}

fn write_seq<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: impl IntoIterator<Item = T>) -> fmt::Result {
    for (i, item) in items.into_iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Unit => write!(f, "()"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{:?}", v.0),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Enum { alias, member } => write!(f, "{alias}.{member}"),
            Value::Tuple(items) => {
                write!(f, "(")?;
                write_seq(f, items)?;
                write!(f, ")")
            }
            Value::Union { label, value } => write!(f, "#{label}({value})"),
            Value::List(items) => {
                write!(f, "[")?;
                write_seq(f, items)?;
                write!(f, "]")
            }
            Value::Map(entries) => {
                write!(f, "{{")?;
                write_seq(f, entries.iter().map(|(k, v)| format!("{k}: {v}")))?;
                write!(f, "}}")
            }
            Value::Struct(fields) => {
                write!(f, "{{")?;
                write_seq(f, fields.iter().map(|(k, v)| format!("{k} = {v}")))?;
                write!(f, "}}")
            }
        }
    }
}
