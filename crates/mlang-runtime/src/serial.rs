//! Serialization contract.
//!
//! [`pack`] turns a value into a self-describing [`Packed`] form following a
//! coercion plan, applying the plan on the way (range checks, union
//! injection, struct field selection, array padding). [`unpack`] is its
//! structural inverse. [`convert`] is the composition of the two and is how
//! emitted code applies a coercion to a value.
//!
//! Map keys go through [`pack_key`], which also gives every number a single
//! encoding. Widening to `int` or `real` is a `direct` plan, so a key of a
//! `real` map can still be held as an integer or a boolean.

use std::collections::BTreeMap;
use std::fmt;

use mlang_core::Coercion;
use tracing::warn;

use crate::error::{Result, RuntimeError};
use crate::value::Value;

/// Packed (serialized) form of a value.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Packed {
    /// Padding slot of an array shorter than its declared length.
    #[default]
    Empty,
    Direct(Value),
    Tuple(Vec<Packed>),
    Union { label: usize, inner: Box<Packed> },
    List(Vec<Packed>),
    Map(Vec<(Packed, Packed)>),
    Struct(Vec<(String, Packed)>),
}

fn mismatch(value: &Value, code: &Coercion) -> RuntimeError {
    RuntimeError::CodeMismatch {
        value: value.to_string(),
        code: code.to_string(),
    }
}

/// Serialize `value` following `code`.
pub fn pack(value: &Value, code: &Coercion) -> Result<Packed> {
    match (code, value) {
        (Coercion::Direct, _) => Ok(Packed::Direct(value.clone())),

        (Coercion::Bounded { l, r }, _) => {
            let v = value.as_int().ok_or_else(|| mismatch(value, code))?;
            if v < *l || v > *r {
                return Err(RuntimeError::OutOfBounds { value: v, l: *l, r: *r });
            }
            Ok(Packed::Direct(value.clone()))
        }

        (Coercion::Tuple(codes), Value::Tuple(items)) if codes.len() == items.len() => items
            .iter()
            .zip(codes)
            .map(|(item, code)| pack(item, code))
            .collect::<Result<_>>()
            .map(Packed::Tuple),

        (Coercion::Union(codes), Value::Union { label, value: inner }) => {
            let arm = codes.get(*label).ok_or_else(|| mismatch(value, code))?;
            pack(inner, arm)
        }

        (Coercion::Inj { index, inner }, _) => Ok(Packed::Union {
            label: *index,
            inner: Box::new(pack(value, inner)?),
        }),

        (Coercion::Array { length, element }, Value::List(items)) => {
            if items.len() > *length {
                return Err(RuntimeError::ArrayOverflow {
                    len: items.len(),
                    length: *length,
                });
            }
            let mut out = items
                .iter()
                .map(|item| pack(item, element))
                .collect::<Result<Vec<_>>>()?;
            out.resize(*length, Packed::Empty);
            Ok(Packed::List(out))
        }

        (Coercion::List(element), Value::List(items)) => items
            .iter()
            .map(|item| pack(item, element))
            .collect::<Result<_>>()
            .map(Packed::List),

        (Coercion::Map { key, value: val }, Value::Map(entries)) => entries
            .iter()
            .map(|(k, v)| Ok((pack_key(&unpack(k), key)?, pack(v, val)?)))
            .collect::<Result<_>>()
            .map(Packed::Map),

        (Coercion::Struct(fields), Value::Struct(have)) => fields
            .iter()
            .map(|(name, code)| {
                let field = have
                    .get(name)
                    .ok_or_else(|| RuntimeError::MissingField(name.clone()))?;
                Ok((name.clone(), pack(field, code)?))
            })
            .collect::<Result<_>>()
            .map(Packed::Struct),

        _ => Err(mismatch(value, code)),
    }
}

/// Serialize a map key following `code`.
///
/// Integral reals and booleans are encoded as integers, so keys that compare
/// equal as numbers name the same entry.
pub fn pack_key(key: &Value, code: &Coercion) -> Result<Packed> {
    Ok(pack(key, code)?.into_key())
}

impl Packed {
    fn into_key(self) -> Packed {
        match self {
            Packed::Direct(value) => Packed::Direct(numeric_key(value)),
            Packed::Tuple(items) => Packed::Tuple(items.into_iter().map(Packed::into_key).collect()),
            Packed::Union { label, inner } => Packed::Union {
                label,
                inner: Box::new(inner.into_key()),
            },
            Packed::List(items) => Packed::List(items.into_iter().map(Packed::into_key).collect()),
            Packed::Map(pairs) => Packed::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (k.into_key(), v.into_key()))
                    .collect(),
            ),
            Packed::Struct(fields) => Packed::Struct(
                fields
                    .into_iter()
                    .map(|(name, field)| (name, field.into_key()))
                    .collect(),
            ),
            Packed::Empty => Packed::Empty,
        }
    }
}

fn numeric_key(value: Value) -> Value {
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    const MIN: f64 = i64::MIN as f64;
    const MAX: f64 = i64::MAX as f64;

    match value {
        Value::Bool(b) => Value::Int(i64::from(b)),
        Value::Real(v) if v.0.fract() == 0.0 && v.0 >= MIN && v.0 < MAX => Value::Int(v.0 as i64),
        Value::Tuple(items) => Value::Tuple(items.into_iter().map(numeric_key).collect()),
        Value::Union { label, value } => Value::union(label, numeric_key(*value)),
        Value::List(items) => Value::List(items.into_iter().map(numeric_key).collect()),
        Value::Struct(fields) => Value::Struct(
            fields
                .into_iter()
                .map(|(name, field)| (name, numeric_key(field)))
                .collect(),
        ),
        other => other,
    }
}

/// Rebuild a value from its packed form.
///
/// Array padding is dropped. A repeated map key is reported as a warning and
/// the later value is kept.
pub fn unpack(packed: &Packed) -> Value {
    match packed {
        Packed::Empty => Value::Unit,
        Packed::Direct(value) => value.clone(),
        Packed::Tuple(items) => Value::Tuple(items.iter().map(unpack).collect()),
        Packed::Union { label, inner } => Value::union(*label, unpack(inner)),
        Packed::List(items) => Value::List(
            items
                .iter()
                .filter(|item| !matches!(item, Packed::Empty))
                .map(unpack)
                .collect(),
        ),
        Packed::Map(pairs) => {
            let mut entries = BTreeMap::new();
            for (key, value) in pairs {
                if entries.insert(key.clone(), unpack(value)).is_some() {
                    warn!(key = %key, "duplicate map key while unpacking, keeping the last value");
                }
            }
            Value::Map(entries)
        }
        Packed::Struct(fields) => Value::Struct(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), unpack(field)))
                .collect(),
        ),
    }
}

/// Apply a coercion plan to a value.
pub fn convert(value: &Value, code: &Coercion) -> Result<Value> {
    Ok(unpack(&pack(value, code)?))
}

impl fmt::Display for Packed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn seq<T: fmt::Display>(f: &mut fmt::Formatter<'_>, tag: &str, items: impl IntoIterator<Item = T>) -> fmt::Result {
            write!(f, "({tag}")?;
            for item in items {
                write!(f, ", {item}")?;
            }
            write!(f, ")")
        }

        match self {
            Packed::Empty => write!(f, "empty"),
            Packed::Direct(value) => write!(f, "(direct, {value})"),
            Packed::Tuple(items) => seq(f, "tuple", items),
            Packed::Union { label, inner } => write!(f, "(union, {label}, {inner})"),
            Packed::List(items) => seq(f, "list", items),
            Packed::Map(pairs) => seq(f, "map", pairs.iter().map(|(k, v)| format!("({k}, {v})"))),
            Packed::Struct(fields) => seq(f, "struct", fields.iter().map(|(n, v)| format!("({n}, {v})"))),
        }
    }
}
